use thiserror::Error;

/// Failures surfaced by the login and reporting flow.
///
/// `NoReportData` is a valid outcome rather than a transport problem, and
/// callers are expected to report it differently from the other variants.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("token exchange failed: {0}")]
    TokenExchangeFailed(String),
    #[error("profile fetch failed: {0}")]
    ProfileFetchFailed(String),
    #[error("report fetch failed: {0}")]
    ReportFetchFailed(String),
    #[error("no report data available for the selected period")]
    NoReportData,
    #[error("authorization denied: {0}")]
    AuthorizationDenied(String),
    #[error("oauth state mismatch")]
    StateMismatch,
}
