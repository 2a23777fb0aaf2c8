use chrono::{Datelike, Days, NaiveDate};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::assemble::{AssembledRecord, assemble};
use crate::client::LinkedInClient;
use crate::error::ApiError;
use crate::resolver::{extract_organization_urns, organization_ids, resolve_names};

pub const DEFAULT_REPORT_PERIOD_DAYS: u32 = 60;
/// Upper bound for `REPORT_PERIOD`: ten years.
pub const MAX_REPORT_PERIOD_DAYS: u32 = 3650;

const ANALYTICS_PATH: &str = "/rest/adAnalytics";
const ACCOUNT_URN_PREFIX: &str = "urn:li:sponsoredAccount:";
const CAMPAIGN_URN_PREFIX: &str = "urn:li:sponsoredCampaign:";
const PIVOT: &str = "MEMBER_COMPANY";
const FIELDS: &[&str] = &[
    "pivotValues",
    "costInUsd",
    "impressions",
    "clicks",
    "totalEngagements",
    "externalWebsiteConversions",
    "externalWebsitePostViewConversions",
    "externalWebsitePostClickConversions",
    "oneClickLeads",
];

pub type ReportRow = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportQuery {
    pub account_ids: Vec<String>,
    pub campaign_ids: Vec<String>,
    pub period_days: u32,
}

impl ReportQuery {
    pub fn new(accounts: &str, campaigns: Option<&str>, period_days: u32) -> Self {
        Self {
            account_ids: split_ids(accounts),
            campaign_ids: campaigns.map(split_ids).unwrap_or_default(),
            period_days,
        }
    }
}

/// Inclusive reporting window, expressed in calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn lookback(end: NaiveDate, days: u32) -> Self {
        let start = end
            .checked_sub_days(Days::new(u64::from(days)))
            .unwrap_or(NaiveDate::MIN);
        Self { start, end }
    }

    fn to_restli(self) -> String {
        format!(
            "(start:(year:{},month:{},day:{}),end:(year:{},month:{},day:{}))",
            self.start.year(),
            self.start.month(),
            self.start.day(),
            self.end.year(),
            self.end.month(),
            self.end.day(),
        )
    }
}

#[derive(Debug, Deserialize)]
struct AnalyticsResponse {
    #[serde(default)]
    elements: Vec<ReportRow>,
}

/// Splits a comma-separated id list, trimming whitespace and dropping blanks.
pub fn split_ids(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

fn urn_list(prefix: &str, ids: &[String]) -> String {
    let urns: Vec<String> = ids
        .iter()
        .map(|id| urlencoding::encode(&format!("{prefix}{id}")).into_owned())
        .collect();
    format!("List({})", urns.join(","))
}

pub fn analytics_path(query: &ReportQuery, range: DateRange) -> String {
    let mut path = format!(
        "{ANALYTICS_PATH}?q=analytics&dateRange={}&timeGranularity=(value:ALL)&accounts={}",
        range.to_restli(),
        urn_list(ACCOUNT_URN_PREFIX, &query.account_ids),
    );
    if !query.campaign_ids.is_empty() {
        path.push_str("&campaigns=");
        path.push_str(&urn_list(CAMPAIGN_URN_PREFIX, &query.campaign_ids));
    }
    path.push_str("&pivot=");
    path.push_str(PIVOT);
    path.push_str("&fields=");
    path.push_str(&FIELDS.join(","));
    path
}

pub async fn fetch_rows(
    client: &LinkedInClient,
    query: &ReportQuery,
    today: NaiveDate,
) -> Result<Vec<ReportRow>, ApiError> {
    let range = DateRange::lookback(today, query.period_days);
    let path = analytics_path(query, range);
    log::info!(
        "fetching ad analytics for {} account(s) from {} to {}",
        query.account_ids.len(),
        range.start,
        range.end
    );

    let resp = client
        .get(&path)
        .await
        .map_err(|err| ApiError::ReportFetchFailed(format!("request ad analytics: {err}")))?;
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ApiError::ReportFetchFailed(format!("http {}: {}", status, body)));
    }
    let body: AnalyticsResponse = resp
        .json()
        .await
        .map_err(|err| ApiError::ReportFetchFailed(format!("decode ad analytics: {err}")))?;
    Ok(body.elements)
}

/// Fetches the report, names each organization and returns the rows that
/// could be named. An empty outcome at either stage is `NoReportData`.
pub async fn fetch_report(
    client: &LinkedInClient,
    query: &ReportQuery,
    today: NaiveDate,
) -> Result<Vec<AssembledRecord>, ApiError> {
    let rows = fetch_rows(client, query, today).await?;
    if rows.is_empty() {
        return Err(ApiError::NoReportData);
    }

    let rows = extract_organization_urns(rows);
    let ids = organization_ids(&rows);
    let names = resolve_names(client, &ids).await;
    let total = rows.len();
    let records = assemble(rows, &names);
    log::info!("assembled {} of {} report rows", records.len(), total);

    if records.is_empty() {
        return Err(ApiError::NoReportData);
    }
    Ok(records)
}
