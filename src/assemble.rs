use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::resolver::PivotedRow;

const COST_FIELD: &str = "costInUsd";

/// A report row ready for display. Rows whose organization could not be
/// named never become records.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssembledRecord {
    pub organization_urn: String,
    pub company_name: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

pub fn assemble(rows: Vec<PivotedRow>, names: &HashMap<String, String>) -> Vec<AssembledRecord> {
    rows.into_iter()
        .filter_map(|row| {
            let company_name = names.get(row.organization_id()?)?.clone();
            let organization_urn = row.organization_urn?;
            let mut fields = row.fields;
            fields.remove("organizationUrn");
            fields.remove("companyName");
            if let Some(cost) = fields.get_mut(COST_FIELD) {
                *cost = format_cost(cost);
            }
            Some(AssembledRecord {
                organization_urn,
                company_name,
                fields,
            })
        })
        .collect()
}

/// Two-decimal string for numeric or numeric-looking values, `null` otherwise.
fn format_cost(value: &Value) -> Value {
    let amount = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match amount.filter(|x| x.is_finite()) {
        Some(x) => Value::String(format!("{:.2}", x)),
        None => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::extract_organization_urns;
    use serde_json::json;

    fn rows(values: Value) -> Vec<PivotedRow> {
        let raw = values
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_object().cloned().unwrap())
            .collect();
        extract_organization_urns(raw)
    }

    fn names(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(id, name)| (id.to_string(), name.to_string()))
            .collect()
    }

    #[test]
    fn cost_formatting() {
        assert_eq!(format_cost(&json!(12.3)), json!("12.30"));
        assert_eq!(format_cost(&json!(5)), json!("5.00"));
        assert_eq!(format_cost(&json!(" 7.4 ")), json!("7.40"));
        assert_eq!(format_cost(&json!("abc")), Value::Null);
        assert_eq!(format_cost(&json!("NaN")), Value::Null);
        assert_eq!(format_cost(&Value::Null), Value::Null);
        assert_eq!(format_cost(&json!(true)), Value::Null);
    }

    #[test]
    fn joins_names_and_drops_unresolved_rows() {
        let rows = rows(json!([
            {"pivotValues": ["urn:li:organization:111"], "costInUsd": 5},
            {"pivotValues": [], "costInUsd": 3}
        ]));
        let out = assemble(rows, &names(&[("111", "Acme")]));

        assert_eq!(out.len(), 1);
        assert_eq!(
            serde_json::to_value(&out[0]).unwrap(),
            json!({
                "organizationUrn": "urn:li:organization:111",
                "companyName": "Acme",
                "costInUsd": "5.00"
            })
        );
    }

    #[test]
    fn missing_cost_stays_absent_and_malformed_cost_is_null() {
        let rows = rows(json!([
            {"pivotValues": ["urn:li:organization:1"], "impressions": 10},
            {"pivotValues": ["urn:li:organization:2"], "costInUsd": "abc"}
        ]));
        let out = assemble(rows, &names(&[("1", "One"), ("2", "Two")]));

        let first = serde_json::to_value(&out[0]).unwrap();
        assert!(first.get("costInUsd").is_none());
        assert_eq!(first["impressions"], json!(10));
        let second = serde_json::to_value(&out[1]).unwrap();
        assert_eq!(second["costInUsd"], Value::Null);
        assert!(second.as_object().unwrap().contains_key("costInUsd"));
    }

    #[test]
    fn keeps_row_order_and_drops_names_missing_from_lookup() {
        let rows = rows(json!([
            {"pivotValues": ["urn:li:organization:3"], "clicks": 3},
            {"pivotValues": ["urn:li:organization:9"], "clicks": 9},
            {"pivotValues": ["urn:li:organization:1"], "clicks": 1}
        ]));
        let out = assemble(rows, &names(&[("1", "One"), ("3", "Three")]));

        let order: Vec<&str> = out.iter().map(|r| r.company_name.as_str()).collect();
        assert_eq!(order, vec!["Three", "One"]);
        assert_eq!(out[0].organization_urn, "urn:li:organization:3");
    }

    #[test]
    fn empty_mapping_drops_everything() {
        let rows = rows(json!([
            {"pivotValues": ["urn:li:organization:1"], "costInUsd": 1.0}
        ]));
        assert!(assemble(rows, &HashMap::new()).is_empty());
    }
}
