//! Coercion and size capping applied to pipeline output before it is returned

use serde_json::Value;

use crate::schemas::ResearchResponse;
use crate::utils::truncate_chars;

pub const MAX_RESPONSE_BYTES: usize = 10 * 1024 * 1024;
pub const TRUNCATED_REPORT_CHARS: usize = 50_000;
pub const TRUNCATION_NOTICE: &str =
    "\n\n[Report truncated: the full report exceeded the maximum response size.]";

/// Numeric cost values pass through; anything else (strings, objects, booleans) is 0.0.
pub fn coerce_cost(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().filter(|f| f.is_finite()).unwrap_or(0.0),
        _ => 0.0,
    }
}

pub fn coerce_source(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

pub fn coerce_sources(values: Vec<Value>) -> Vec<String> {
    values.into_iter().map(coerce_source).collect()
}

pub fn serialized_len(response: &ResearchResponse) -> usize {
    serde_json::to_vec(response)
        .map(|bytes| bytes.len())
        .unwrap_or(usize::MAX)
}

/// Keep the response under `ceiling` bytes. The report is cut first; if the
/// response is still too large, trailing sources are dropped until it fits.
/// Returns true when anything was removed.
pub fn enforce_size_ceiling(response: &mut ResearchResponse, ceiling: usize) -> bool {
    let mut size = serialized_len(response);
    if size <= ceiling {
        return false;
    }

    let mut report = truncate_chars(&response.report, TRUNCATED_REPORT_CHARS);
    report.push_str(TRUNCATION_NOTICE);
    response.report = report;
    size = serialized_len(response);

    while size > ceiling {
        let Some(dropped) = response.sources.pop() else {
            break;
        };
        let element = serde_json::to_string(&dropped).map(|s| s.len()).unwrap_or(0);
        let comma = usize::from(!response.sources.is_empty());
        size = size.saturating_sub(element + comma);
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cost_coercion() {
        assert_eq!(coerce_cost(&json!(1.23)), 1.23);
        assert_eq!(coerce_cost(&json!(2)), 2.0);
        assert_eq!(coerce_cost(&json!("1.23")), 0.0);
        assert_eq!(coerce_cost(&json!({"total": 1.0})), 0.0);
        assert_eq!(coerce_cost(&json!(true)), 0.0);
        assert_eq!(coerce_cost(&Value::Null), 0.0);
    }

    #[test]
    fn test_sources_coerced_to_text() {
        let sources = coerce_sources(vec![
            json!("https://a.example"),
            json!(42),
            json!({"url": "https://b.example"}),
        ]);
        assert_eq!(
            sources,
            vec![
                "https://a.example".to_string(),
                "42".to_string(),
                r#"{"url":"https://b.example"}"#.to_string(),
            ]
        );
    }

    #[test]
    fn test_small_response_untouched() {
        let mut response = ResearchResponse {
            report: "short".into(),
            ..Default::default()
        };
        assert!(!enforce_size_ceiling(&mut response, MAX_RESPONSE_BYTES));
        assert_eq!(response.report, "short");
    }

    #[test]
    fn test_sources_dropped_when_report_cut_is_not_enough() {
        let mut response = ResearchResponse {
            report: "x".repeat(200),
            sources: (0..50).map(|i| format!("https://example.com/{i}")).collect(),
            ..Default::default()
        };
        let ceiling = 400 + TRUNCATION_NOTICE.len();
        assert!(enforce_size_ceiling(&mut response, ceiling));
        assert!(serialized_len(&response) <= ceiling);
        assert!(response.sources.len() < 50);
        // order of the surviving sources is preserved
        assert_eq!(response.sources[0], "https://example.com/0");
    }
}
