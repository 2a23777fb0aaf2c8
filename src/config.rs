use anyhow::{Context, Result, anyhow};
use clap::ArgMatches;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::auth::OAuthApp;
use crate::report::{DEFAULT_REPORT_PERIOD_DAYS, MAX_REPORT_PERIOD_DAYS, ReportQuery};

pub const DEFAULT_REDIRECT_URI: &str = "http://127.0.0.1:5000/login/authorized";
pub const DEFAULT_API_BASE_URL: &str = "https://api.linkedin.com";
pub const DEFAULT_OAUTH_BASE_URL: &str = "https://www.linkedin.com";

/// Process-wide settings, read once at startup and passed down by reference.
#[derive(Debug, Clone)]
pub struct Config {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_uri: String,
    pub api_version: Option<String>,
    pub access_token: Option<String>,
    pub account_ids: Option<String>,
    pub campaign_ids: Option<String>,
    pub report_period_days: u32,
    pub api_base_url: String,
    pub oauth_base_url: String,
    pub timeout: Option<Duration>,
}

impl Config {
    pub fn oauth_app(&self) -> Result<OAuthApp> {
        let client_id = self
            .client_id
            .clone()
            .ok_or_else(|| anyhow!("CLIENT_ID missing"))?;
        let client_secret = self
            .client_secret
            .clone()
            .ok_or_else(|| anyhow!("CLIENT_SECRET missing"))?;
        Ok(OAuthApp {
            client_id,
            client_secret,
            redirect_uri: self.redirect_uri.clone(),
            base_url: self.oauth_base_url.clone(),
            timeout: self.timeout,
        })
    }

    pub fn report_query(&self) -> Result<ReportQuery> {
        let accounts = self
            .account_ids
            .as_deref()
            .ok_or_else(|| anyhow!("CMT_ACCOUNT_ID missing"))?;
        let query = ReportQuery::new(accounts, self.campaign_ids.as_deref(), self.report_period_days);
        if query.account_ids.is_empty() {
            return Err(anyhow!("CMT_ACCOUNT_ID contains no account ids"));
        }
        Ok(query)
    }
}

/// Loads `dir/.env.local` when present, otherwise `dir/.env`. Variables
/// already set in the environment win over the file. Returns the file that
/// was loaded, if any.
pub fn load_env_file(dir: &Path) -> Result<Option<PathBuf>, dotenvy::Error> {
    for name in [".env.local", ".env"] {
        let path = dir.join(name);
        if path.exists() {
            dotenvy::from_path(&path)?;
            return Ok(Some(path));
        }
    }
    Ok(None)
}

pub fn load_config(matches: &ArgMatches) -> Result<Config> {
    let report_period_days = match arg_or_env(matches, "report_period", "REPORT_PERIOD") {
        Some(value) => parse_report_period(&value)?,
        None => DEFAULT_REPORT_PERIOD_DAYS,
    };

    let timeout = matches
        .get_one::<u64>("timeout")
        .copied()
        .map(Duration::from_secs);

    Ok(Config {
        client_id: arg_or_env(matches, "client_id", "CLIENT_ID"),
        client_secret: arg_or_env(matches, "client_secret", "CLIENT_SECRET"),
        redirect_uri: arg_or_env(matches, "redirect_uri", "REDIRECT_URI")
            .unwrap_or_else(|| DEFAULT_REDIRECT_URI.to_string()),
        api_version: arg_or_env(matches, "api_version", "API_VERSION"),
        access_token: arg_or_env(matches, "access_token", "LINKEDIN_ACCESS_TOKEN"),
        account_ids: arg_or_env(matches, "account_id", "CMT_ACCOUNT_ID"),
        campaign_ids: arg_or_env(matches, "campaign_id", "CMT_CAMPAIGN_ID"),
        report_period_days,
        api_base_url: arg_or_env(matches, "api_base_url", "LINKEDIN_API_BASE_URL")
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
        oauth_base_url: arg_or_env(matches, "oauth_base_url", "LINKEDIN_OAUTH_BASE_URL")
            .unwrap_or_else(|| DEFAULT_OAUTH_BASE_URL.to_string()),
        timeout,
    })
}

fn parse_report_period(value: &str) -> Result<u32> {
    let days = value
        .trim()
        .parse::<u32>()
        .with_context(|| format!("REPORT_PERIOD invalid: {value:?}"))?;
    if days > MAX_REPORT_PERIOD_DAYS {
        return Err(anyhow!(
            "REPORT_PERIOD invalid: {days} exceeds {MAX_REPORT_PERIOD_DAYS} days"
        ));
    }
    Ok(days)
}

fn arg_or_env(matches: &ArgMatches, id: &str, var: &str) -> Option<String> {
    matches
        .get_one::<String>(id)
        .cloned()
        .or_else(|| env::var(var).ok())
        .filter(|value| !value.trim().is_empty())
}
