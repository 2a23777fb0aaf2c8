use reqwest::{Client, RequestBuilder, Response};
use std::time::Duration;

const RESTLI_PROTOCOL_VERSION: &str = "2.0.0";

/// Authenticated client for the LinkedIn REST and v2 APIs.
///
/// Every request carries the same bearer token and protocol headers.
pub struct LinkedInClient {
    http: Client,
    base_url: String,
    access_token: String,
    api_version: Option<String>,
}

impl LinkedInClient {
    pub fn new(
        base_url: &str,
        access_token: String,
        api_version: Option<String>,
        timeout: Option<Duration>,
    ) -> reqwest::Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            http: builder.build()?,
            base_url: normalize_endpoint(base_url),
            access_token,
            api_version,
        })
    }

    /// Issues a GET for `path_and_query`, which must already be encoded.
    /// Rest.li query syntax (`List(...)`, `(start:(...))`) is passed through
    /// as written.
    pub async fn get(&self, path_and_query: &str) -> reqwest::Result<Response> {
        let url = format!("{}{}", self.base_url, path_and_query);
        log::debug!("GET {url}");
        self.build_request(self.http.get(url)).send().await
    }

    fn build_request(&self, request: RequestBuilder) -> RequestBuilder {
        let mut request = request
            .bearer_auth(self.access_token.trim())
            .header("cache-control", "no-cache")
            .header("X-Restli-Protocol-Version", RESTLI_PROTOCOL_VERSION);
        if let Some(version) = self.api_version.as_deref() {
            request = request.header("LinkedIn-Version", version);
        }
        request
    }
}

pub fn normalize_endpoint(endpoint: &str) -> String {
    let endpoint = endpoint.trim().trim_end_matches('/');
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        return endpoint.to_string();
    }
    format!("https://{}", endpoint)
}
