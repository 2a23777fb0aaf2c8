use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::LinkedInClient;
use crate::error::ApiError;

const PROFILE_PATH: &str = "/v2/me";
const EMAIL_PATH: &str = "/v2/emailAddress?q=members&projection=(elements*(handle~))";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Profile {
    pub id: String,
    #[serde(rename = "localizedFirstName")]
    pub first_name: String,
    #[serde(rename = "localizedLastName")]
    pub last_name: String,
}

pub async fn fetch_profile(client: &LinkedInClient) -> Result<(Profile, String), ApiError> {
    let profile = get_json(client, PROFILE_PATH).await?;
    let profile: Profile = serde_json::from_value(profile)
        .map_err(|err| ApiError::ProfileFetchFailed(format!("decode profile: {err}")))?;

    let email = get_json(client, EMAIL_PATH).await?;
    let email = primary_email(&email)
        .ok_or_else(|| ApiError::ProfileFetchFailed("response has no email address".to_string()))?;

    Ok((profile, email))
}

fn primary_email(body: &Value) -> Option<String> {
    body.get("elements")?
        .as_array()?
        .first()?
        .get("handle~")?
        .get("emailAddress")?
        .as_str()
        .map(str::to_string)
}

async fn get_json(client: &LinkedInClient, path: &str) -> Result<Value, ApiError> {
    let resp = client
        .get(path)
        .await
        .map_err(|err| ApiError::ProfileFetchFailed(format!("request {path}: {err}")))?;
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        log::error!("profile lookup {path} returned {status}");
        return Err(ApiError::ProfileFetchFailed(format!("http {}: {}", status, body)));
    }
    resp.json()
        .await
        .map_err(|err| ApiError::ProfileFetchFailed(format!("decode {path}: {err}")))
}
