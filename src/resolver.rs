use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};

use crate::client::LinkedInClient;

const LOOKUP_PATH: &str = "/rest/organizationsLookup";
const PIVOT_VALUES: &str = "pivotValues";

/// A report row whose `pivotValues` list has been collapsed to the single
/// organization URN it names.
#[derive(Debug, Clone, PartialEq)]
pub struct PivotedRow {
    pub organization_urn: Option<String>,
    pub fields: Map<String, Value>,
}

impl PivotedRow {
    pub fn organization_id(&self) -> Option<&str> {
        self.organization_urn.as_deref().map(organization_id)
    }
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    results: HashMap<String, LookupEntry>,
}

#[derive(Debug, Deserialize)]
struct LookupEntry {
    #[serde(rename = "localizedName")]
    localized_name: Option<String>,
}

/// Trailing segment of a URN, e.g. `111` for `urn:li:organization:111`.
pub fn organization_id(urn: &str) -> &str {
    urn.rsplit(':').next().unwrap_or(urn)
}

pub fn extract_organization_urns(rows: Vec<Map<String, Value>>) -> Vec<PivotedRow> {
    rows.into_iter()
        .map(|mut fields| {
            let organization_urn = match fields.remove(PIVOT_VALUES) {
                Some(Value::Array(values)) => values
                    .into_iter()
                    .next()
                    .and_then(|value| value.as_str().map(str::to_string)),
                _ => None,
            };
            PivotedRow {
                organization_urn,
                fields,
            }
        })
        .collect()
}

/// Distinct, non-empty organization ids in first-seen order.
pub fn organization_ids(rows: &[PivotedRow]) -> Vec<String> {
    let mut seen = HashSet::new();
    rows.iter()
        .filter_map(PivotedRow::organization_id)
        .filter(|id| !id.is_empty())
        .filter(|id| seen.insert(*id))
        .map(str::to_string)
        .collect()
}

/// Maps organization ids to display names with one batch lookup.
///
/// A failed lookup yields an empty map rather than an error, so every row
/// that depended on it is later dropped.
pub async fn resolve_names(client: &LinkedInClient, ids: &[String]) -> HashMap<String, String> {
    if ids.is_empty() {
        return HashMap::new();
    }

    let list: Vec<String> = ids
        .iter()
        .map(|id| urlencoding::encode(id).into_owned())
        .collect();
    let path = format!("{LOOKUP_PATH}?ids=List({})", list.join(","));

    let resp = match client.get(&path).await {
        Ok(resp) => resp,
        Err(err) => {
            log::warn!("organization lookup failed, no names resolved: {err}");
            return HashMap::new();
        }
    };
    let status = resp.status();
    if !status.is_success() {
        log::warn!("organization lookup returned {status}, no names resolved");
        return HashMap::new();
    }
    let body: LookupResponse = match resp.json().await {
        Ok(body) => body,
        Err(err) => {
            log::warn!("organization lookup body undecodable, no names resolved: {err}");
            return HashMap::new();
        }
    };

    let names: HashMap<String, String> = body
        .results
        .into_iter()
        .filter_map(|(id, entry)| entry.localized_name.map(|name| (id, name)))
        .collect();
    log::debug!("resolved {} of {} organizations", names.len(), ids.len());
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn row(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn client(server: &MockServer) -> LinkedInClient {
        LinkedInClient::new(&server.uri(), "tok".to_string(), Some("202406".to_string()), None)
            .unwrap()
    }

    #[test]
    fn trailing_segment_is_the_id() {
        assert_eq!(organization_id("urn:li:organization:111"), "111");
        assert_eq!(organization_id("222"), "222");
    }

    #[test]
    fn pivot_values_collapse_to_first_urn() {
        let rows = extract_organization_urns(vec![
            row(json!({"pivotValues": ["urn:li:organization:111", "urn:li:organization:9"], "clicks": 4})),
            row(json!({"pivotValues": [], "clicks": 1})),
            row(json!({"clicks": 2})),
        ]);

        assert_eq!(rows[0].organization_urn.as_deref(), Some("urn:li:organization:111"));
        assert_eq!(rows[0].organization_id(), Some("111"));
        assert!(!rows[0].fields.contains_key("pivotValues"));
        assert_eq!(rows[0].fields["clicks"], json!(4));
        assert_eq!(rows[1].organization_urn, None);
        assert_eq!(rows[2].organization_urn, None);
    }

    #[test]
    fn ids_are_distinct_and_ordered() {
        let rows = extract_organization_urns(vec![
            row(json!({"pivotValues": ["urn:li:organization:222"]})),
            row(json!({"pivotValues": ["urn:li:organization:111"]})),
            row(json!({"pivotValues": []})),
            row(json!({"pivotValues": ["urn:li:organization:222"]})),
        ]);
        assert_eq!(organization_ids(&rows), vec!["222".to_string(), "111".to_string()]);
    }

    #[tokio::test]
    async fn batch_lookup_maps_localized_names() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/organizationsLookup"))
            .and(query_param("ids", "List(111,222)"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": {
                    "111": {"localizedName": "Acme", "vanityName": "acme"},
                    "222": {"vanityName": "nameless"}
                },
                "statuses": {"111": 200, "222": 200},
                "errors": {}
            })))
            .expect(2)
            .mount(&server)
            .await;

        let client = client(&server);
        let ids = vec!["111".to_string(), "222".to_string()];
        let first = resolve_names(&client, &ids).await;
        let second = resolve_names(&client, &ids).await;

        assert_eq!(first.len(), 1);
        assert_eq!(first.get("111").map(String::as_str), Some("Acme"));
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn failed_lookup_degrades_to_empty_map() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/organizationsLookup"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let names = resolve_names(&client(&server), &["111".to_string()]).await;
        assert!(names.is_empty());
    }

    #[tokio::test]
    async fn no_ids_means_no_lookup() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        assert!(resolve_names(&client(&server), &[]).await.is_empty());
    }

    #[tokio::test]
    async fn undecodable_lookup_body_degrades_to_empty_map() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/organizationsLookup"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .expect(1)
            .mount(&server)
            .await;

        let names = resolve_names(&client(&server), &["111".to_string()]).await;
        assert!(names.is_empty());
    }

    #[tokio::test]
    async fn unreachable_lookup_degrades_to_empty_map() {
        let uri = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            format!("http://{}", listener.local_addr().unwrap())
        };
        let client = LinkedInClient::new(&uri, "tok".to_string(), None, None).unwrap();

        let names = resolve_names(&client, &["111".to_string()]).await;
        assert!(names.is_empty());
    }
}
