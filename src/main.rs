mod assemble;
mod auth;
mod client;
mod config;
mod error;
mod profile;
mod report;
mod resolver;

use anyhow::{Context, Result, anyhow};
use chrono::{Local, NaiveDate};
use clap::{Arg, ArgAction, Command, value_parser};
use serde_json::{Value, json};
use std::io::{BufRead, Write};
use std::path::Path;

use assemble::AssembledRecord;
use client::LinkedInClient;
use config::{Config, load_config, load_env_file};
use error::ApiError;

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        if let Some(ApiError::NoReportData) = err.downcast_ref::<ApiError>() {
            eprintln!("No report data available for the selected period.");
            std::process::exit(2);
        }
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let matches = build_cli().get_matches();
    let env_file = load_env_file(Path::new("."));
    init_logging(matches.get_flag("debug"));
    match env_file {
        Ok(Some(path)) => log::debug!("loaded environment from {}", path.display()),
        Ok(None) => {}
        Err(err) => log::warn!("failed to load env file: {err}"),
    }
    let config = load_config(&matches)?;

    let pretty = matches.get_flag("pretty");
    let jsonl = matches.get_flag("jsonl");

    if matches.subcommand_matches("authorize-url").is_some() {
        let app = config.oauth_app()?;
        let state = auth::new_state();
        let url = auth::authorization_url(&app, &state)?;
        return write_json(&json!({ "url": url.as_str(), "state": state }), pretty);
    }

    if let Some(matches) = matches.subcommand_matches("exchange") {
        let code = matches
            .get_one::<String>("code")
            .ok_or_else(|| anyhow!("--code required"))?;
        let app = config.oauth_app()?;
        let token = auth::exchange_token(&app, code).await?;
        return write_json(&json!({ "access_token": token }), pretty);
    }

    if matches.subcommand_matches("profile").is_some() {
        let client = api_client(&config, stored_token(&config)?)?;
        let (profile, email) = profile::fetch_profile(&client).await?;
        return write_json(&profile_json(&profile, &email), pretty);
    }

    if matches.subcommand_matches("report").is_some() {
        let query = config.report_query()?;
        let client = api_client(&config, stored_token(&config)?)?;
        let records = report::fetch_report(&client, &query, today()).await?;
        return write_records(&records, pretty, jsonl);
    }

    if matches.subcommand_matches("login").is_some() {
        return handle_login(&config, pretty, jsonl).await;
    }

    Err(anyhow!("command required"))
}

async fn handle_login(config: &Config, pretty: bool, jsonl: bool) -> Result<()> {
    let app = config.oauth_app()?;
    let query = config.report_query()?;

    let state = auth::new_state();
    let url = auth::authorization_url(&app, &state)?;
    eprintln!("Open this URL in a browser and authorize the app:\n\n  {url}\n");
    eprint!("Paste the redirect URL (or the code): ");
    std::io::stderr().flush()?;

    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("read authorization response")?;
    let code = auth::parse_callback(&line, &state)?;

    let token = auth::exchange_token(&app, &code).await?;
    let client = api_client(config, token)?;

    let (profile, email) = profile::fetch_profile(&client).await?;
    eprintln!(
        "{}, {} {}, logged in with email: {}",
        profile.id,
        profile.first_name,
        profile.last_name,
        email
    );

    let records = report::fetch_report(&client, &query, today()).await?;
    write_records(&records, pretty, jsonl)
}

fn build_cli() -> Command {
    let mut cmd = Command::new("linkedin-ads-report")
        .about("LinkedIn ad analytics by member company")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("pretty")
                .long("pretty")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Pretty-print JSON output"),
        )
        .arg(
            Arg::new("jsonl")
                .long("jsonl")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit one JSON record per line"),
        )
        .arg(
            Arg::new("client_id")
                .long("client-id")
                .global(true)
                .value_name("ID")
                .help("OAuth client id (env: CLIENT_ID)"),
        )
        .arg(
            Arg::new("client_secret")
                .long("client-secret")
                .global(true)
                .value_name("SECRET")
                .help("OAuth client secret (env: CLIENT_SECRET)"),
        )
        .arg(
            Arg::new("redirect_uri")
                .long("redirect-uri")
                .global(true)
                .value_name("URL")
                .help("OAuth redirect URI (env: REDIRECT_URI)"),
        )
        .arg(
            Arg::new("api_version")
                .long("api-version")
                .global(true)
                .value_name("YYYYMM")
                .help("LinkedIn-Version header (env: API_VERSION)"),
        )
        .arg(
            Arg::new("access_token")
                .long("access-token")
                .global(true)
                .value_name("TOKEN")
                .help("Access token (env: LINKEDIN_ACCESS_TOKEN)"),
        )
        .arg(
            Arg::new("account_id")
                .long("account-id")
                .global(true)
                .value_name("IDS")
                .help("Comma-separated sponsored account ids (env: CMT_ACCOUNT_ID)"),
        )
        .arg(
            Arg::new("campaign_id")
                .long("campaign-id")
                .global(true)
                .value_name("IDS")
                .help("Comma-separated sponsored campaign ids (env: CMT_CAMPAIGN_ID)"),
        )
        .arg(
            Arg::new("report_period")
                .long("report-period")
                .global(true)
                .value_name("DAYS")
                .help("Reporting window in days (env: REPORT_PERIOD)"),
        )
        .arg(
            Arg::new("api_base_url")
                .long("api-base-url")
                .global(true)
                .value_name("URL")
                .help("API base URL (env: LINKEDIN_API_BASE_URL)"),
        )
        .arg(
            Arg::new("oauth_base_url")
                .long("oauth-base-url")
                .global(true)
                .value_name("URL")
                .help("OAuth base URL (env: LINKEDIN_OAUTH_BASE_URL)"),
        )
        .arg(
            Arg::new("timeout")
                .long("timeout")
                .global(true)
                .value_parser(value_parser!(u64))
                .help("Request timeout in seconds"),
        )
        .arg(
            Arg::new("debug")
                .long("debug")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Enable debug logging"),
        );

    cmd = cmd.subcommand(
        Command::new("authorize-url").about("Print the OAuth authorization URL and state"),
    );

    cmd = cmd.subcommand(
        Command::new("exchange")
            .about("Exchange an authorization code for an access token")
            .arg(
                Arg::new("code")
                    .long("code")
                    .required(true)
                    .value_name("CODE")
                    .help("Authorization code from the redirect"),
            ),
    );

    cmd = cmd.subcommand(Command::new("profile").about("Show the authenticated member"));

    cmd = cmd.subcommand(
        Command::new("report").about("Ad analytics by member company with resolved names"),
    );

    cmd.subcommand(
        Command::new("login")
            .about("Authorize interactively, then fetch the profile and the report"),
    )
}

fn init_logging(debug: bool) {
    let level = if debug {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    };
    env_logger::Builder::from_env("RUST_LOG")
        .filter_level(level)
        .init();
}

fn api_client(config: &Config, access_token: String) -> Result<LinkedInClient> {
    LinkedInClient::new(
        &config.api_base_url,
        access_token,
        config.api_version.clone(),
        config.timeout,
    )
    .context("build http client")
}

fn stored_token(config: &Config) -> Result<String> {
    config
        .access_token
        .clone()
        .ok_or_else(|| anyhow!("LINKEDIN_ACCESS_TOKEN missing"))
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn profile_json(profile: &profile::Profile, email: &str) -> Value {
    json!({
        "id": profile.id,
        "firstName": profile.first_name,
        "lastName": profile.last_name,
        "email": email,
    })
}

fn write_records(records: &[AssembledRecord], pretty: bool, jsonl: bool) -> Result<()> {
    if jsonl {
        for record in records {
            write_stdout_line(&serde_json::to_string(record)?)?;
        }
        return Ok(());
    }
    write_json(&serde_json::to_value(records)?, pretty)
}

fn write_json(value: &Value, pretty: bool) -> Result<()> {
    if pretty {
        write_stdout_line(&serde_json::to_string_pretty(value)?)?;
    } else {
        write_stdout_line(&serde_json::to_string(value)?)?;
    }
    Ok(())
}

fn write_stdout_line(line: &str) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(line.as_bytes())?;
    stdout.write_all(b"\n")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        build_cli().debug_assert();
    }

    #[test]
    fn report_flags_are_global() {
        let matches = build_cli()
            .try_get_matches_from([
                "linkedin-ads-report",
                "report",
                "--account-id",
                "1, 2",
                "--report-period",
                "30",
            ])
            .unwrap();
        let config = load_config(&matches).unwrap();
        assert_eq!(config.report_period_days, 30);
        assert_eq!(
            config.report_query().unwrap().account_ids,
            vec!["1".to_string(), "2".to_string()]
        );
    }

    #[test]
    fn profile_output_uses_display_keys() {
        let profile = profile::Profile {
            id: "abc".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
        };
        assert_eq!(
            profile_json(&profile, "ada@example.com"),
            json!({"id": "abc", "firstName": "Ada", "lastName": "Lovelace", "email": "ada@example.com"})
        );
    }

    #[test]
    fn oversized_report_period_is_rejected() {
        let matches = build_cli()
            .try_get_matches_from([
                "linkedin-ads-report",
                "report",
                "--report-period",
                "4000000000",
            ])
            .unwrap();
        let err = load_config(&matches).unwrap_err();
        assert!(err.to_string().starts_with("REPORT_PERIOD invalid"));
    }
}
