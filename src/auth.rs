use anyhow::Context;
use rand::Rng;
use rand::distributions::Alphanumeric;
use reqwest::{Client, Url};
use serde::Deserialize;
use std::time::Duration;

use crate::client::normalize_endpoint;
use crate::error::ApiError;

const AUTHORIZATION_PATH: &str = "/oauth/v2/authorization";
const TOKEN_PATH: &str = "/oauth/v2/accessToken";
const SCOPES: &str = "r_liteprofile,r_basicprofile,rw_ads,r_ads,r_emailaddress,r_ads_reporting";
const STATE_LEN: usize = 22;

/// Registered OAuth application the user authorizes.
#[derive(Debug, Clone)]
pub struct OAuthApp {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub base_url: String,
    pub timeout: Option<Duration>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

pub fn new_state() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(STATE_LEN)
        .map(char::from)
        .collect()
}

pub fn authorization_url(app: &OAuthApp, state: &str) -> anyhow::Result<Url> {
    let base = format!("{}{}", normalize_endpoint(&app.base_url), AUTHORIZATION_PATH);
    Url::parse_with_params(
        &base,
        &[
            ("response_type", "code"),
            ("client_id", app.client_id.as_str()),
            ("redirect_uri", app.redirect_uri.as_str()),
            ("state", state),
            ("scope", SCOPES),
        ],
    )
    .with_context(|| format!("invalid authorization url {base}"))
}

/// Extracts the authorization code from what the user pasted back: either
/// the full redirect URL or the bare code.
pub fn parse_callback(input: &str, expected_state: &str) -> Result<String, ApiError> {
    let input = input.trim();
    let Ok(url) = Url::parse(input) else {
        if input.is_empty() {
            return Err(ApiError::AuthorizationDenied("no authorization code".to_string()));
        }
        return Ok(input.to_string());
    };

    let mut code = None;
    let mut state = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "error" if !value.is_empty() => {
                return Err(ApiError::AuthorizationDenied(value.into_owned()));
            }
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            _ => {}
        }
    }

    if state.as_deref() != Some(expected_state) {
        return Err(ApiError::StateMismatch);
    }
    code.filter(|code| !code.is_empty())
        .ok_or_else(|| ApiError::AuthorizationDenied("redirect carried no code".to_string()))
}

pub async fn exchange_token(app: &OAuthApp, code: &str) -> Result<String, ApiError> {
    let url = format!("{}{}", normalize_endpoint(&app.base_url), TOKEN_PATH);
    let mut builder = Client::builder();
    if let Some(timeout) = app.timeout {
        builder = builder.timeout(timeout);
    }
    let client = builder
        .build()
        .map_err(|err| ApiError::TokenExchangeFailed(format!("build http client: {err}")))?;
    let resp = client
        .post(url)
        .form(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", app.redirect_uri.as_str()),
            ("client_id", app.client_id.as_str()),
            ("client_secret", app.client_secret.as_str()),
        ])
        .send()
        .await
        .map_err(|err| ApiError::TokenExchangeFailed(format!("request OAuth token: {err}")))?;

    let status = resp.status();
    let body = resp
        .text()
        .await
        .map_err(|err| ApiError::TokenExchangeFailed(format!("read OAuth response: {err}")))?;
    if !status.is_success() {
        return Err(ApiError::TokenExchangeFailed(format!("oauth http {}: {}", status, body)));
    }

    let token: TokenResponse = serde_json::from_str(&body)
        .map_err(|err| ApiError::TokenExchangeFailed(format!("decode OAuth response: {err}")))?;
    match token.access_token {
        Some(token) if !token.trim().is_empty() => Ok(token),
        _ => {
            log::error!("token endpoint returned no access token");
            Err(ApiError::TokenExchangeFailed("response has no access_token".to_string()))
        }
    }
}
