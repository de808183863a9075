//! The structured access record.
//!
//! The record always serializes with every key present. A field switched off
//! in the configuration becomes `""` (or `{}` for the body), so downstream
//! parsers see one stable shape.

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct AccessRecord {
    pub timestamp: String,
    #[serde(serialize_with = "empty_if_none")]
    pub execution_time: Option<f64>,
    #[serde(serialize_with = "empty_if_none")]
    pub memory_peak_usage: Option<u64>,
    pub request: RequestRecord,
    pub response: ResponseRecord,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct RequestRecord {
    #[serde(serialize_with = "empty_if_none")]
    pub url: Option<String>,
    #[serde(serialize_with = "empty_if_none")]
    pub http_method: Option<String>,
    #[serde(serialize_with = "empty_if_none")]
    pub user_agent: Option<String>,
    #[serde(serialize_with = "empty_if_none")]
    pub ip_address: Option<String>,
    pub body: Map<String, Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ResponseRecord {
    #[serde(serialize_with = "empty_if_none")]
    pub status: Option<u16>,
    #[serde(serialize_with = "empty_if_none")]
    pub status_text: Option<String>,
}

fn empty_if_none<T: Serialize, S: Serializer>(value: &Option<T>, serializer: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(value) => value.serialize(serializer),
        None => serializer.serialize_str(""),
    }
}

/// Escapes the five HTML-significant characters so a logged URL cannot
/// inject markup into log viewers.
pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&'  => out.push_str("&amp;"),
            '<'  => out.push_str("&lt;"),
            '>'  => out.push_str("&gt;"),
            '"'  => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            c    => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_record_keeps_its_shape() {
        let record = AccessRecord { timestamp: "2026-10-16 09:30:00".into(), ..Default::default() };
        assert_eq!(
            serde_json::to_string(&record).unwrap(),
            concat!(
                r#"{"timestamp":"2026-10-16 09:30:00","execution_time":"","memory_peak_usage":"","#,
                r#""request":{"url":"","http_method":"","user_agent":"","ip_address":"","body":{}},"#,
                r#""response":{"status":"","status_text":""}}"#,
            ),
        );
    }

    #[test]
    fn populated_fields_serialize_with_their_types() {
        let record = AccessRecord {
            timestamp: "t".into(),
            execution_time: Some(1.5),
            memory_peak_usage: Some(2048),
            request: RequestRecord {
                http_method: Some("POST".into()),
                body: json!({"a": 1}).as_object().cloned().unwrap(),
                ..Default::default()
            },
            response: ResponseRecord { status: Some(201), status_text: Some("Created".into()) },
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["execution_time"], json!(1.5));
        assert_eq!(value["memory_peak_usage"], json!(2048));
        assert_eq!(value["request"]["http_method"], "POST");
        assert_eq!(value["request"]["url"], "");
        assert_eq!(value["request"]["body"], json!({"a": 1}));
        assert_eq!(value["response"], json!({"status": 201, "status_text": "Created"}));
    }

    #[test]
    fn escape_html_covers_markup_characters() {
        assert_eq!(
            escape_html(r#"/q?a=1&b=<script>"x"'y'"#),
            "/q?a=1&amp;b=&lt;script&gt;&quot;x&quot;&#039;y&#039;",
        );
        assert_eq!(escape_html("/plain/path"), "/plain/path");
    }
}
