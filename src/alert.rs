use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

use crate::error::RelayError;

const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const RANDOM_SUFFIX_LEN: usize = 5;

/// Inbound webhook body. Every field is optional at the wire level so that
/// missing required fields surface as a validation error instead of a
/// deserialization failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertPayload {
    pub title: Option<String>,
    pub message: Option<String>,
    pub status: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub common_annotations: CommonAnnotations,
    #[serde(default, deserialize_with = "null_as_default")]
    pub common_labels: HashMap<String, String>,
    pub alert_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommonAnnotations {
    pub summary: Option<String>,
}

/// A payload that passed validation.
#[derive(Debug, Clone)]
pub struct Alert {
    pub id: String,
    pub title: String,
    pub message: String,
    pub status: Option<String>,
    pub summary: Option<String>,
    pub labels: HashMap<String, String>,
}

impl AlertPayload {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            message: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn firing(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: Some("firing".to_string()),
            ..Self::new(title, message)
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.common_annotations.summary = Some(summary.into());
        self
    }

    /// Checks required fields and assigns an id when the sender did not.
    pub fn into_alert(self, id_prefix: &str) -> Result<Alert, RelayError> {
        let title = non_empty(self.title);
        let message = non_empty(self.message);

        let (title, message) = match (title, message) {
            (Some(title), Some(message)) => (title, message),
            (title, message) => {
                let mut missing = Vec::new();
                if title.is_none() {
                    missing.push("title");
                }
                if message.is_none() {
                    missing.push("message");
                }
                return Err(RelayError::MissingFields(missing));
            }
        };

        let id = non_empty(self.alert_id).unwrap_or_else(|| generate_alert_id(id_prefix));

        Ok(Alert {
            id,
            title,
            message,
            status: non_empty(self.status),
            summary: non_empty(self.common_annotations.summary),
            labels: self.common_labels,
        })
    }
}

impl Alert {
    pub fn is_firing(&self) -> bool {
        self.status
            .as_deref()
            .is_some_and(|s| s.eq_ignore_ascii_case("firing"))
    }
}

/// Treats an explicit `null` the same as an absent field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// `<prefix>-<millis in base36><5 random base36 chars>`
pub fn generate_alert_id(prefix: &str) -> String {
    let millis = chrono::Utc::now().timestamp_millis().max(0) as u64;
    let mut rng = rand::thread_rng();
    let suffix: String = (0..RANDOM_SUFFIX_LEN)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();

    format!("{}-{}{}", prefix, to_base36(millis), suffix)
}

fn to_base36(mut value: u64) -> String {
    if value == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while value > 0 {
        digits.push(BASE36[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();
    String::from_utf8(digits).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_deserialization() -> anyhow::Result<()> {
        let json = r#"{
            "title": "[FIRING:1] HighCPU (prod)",
            "message": "CPU is high\nAnnotations:\n - summary = CPU",
            "status": "firing",
            "commonAnnotations": {"summary": "CPU above 90%", "description": "ignored"},
            "commonLabels": {"alertname": "HighCPU", "severity": "critical"},
            "alertId": "grafana-123",
            "orgId": 1
        }"#;

        let payload: AlertPayload = serde_json::from_str(json)?;

        assert_eq!(payload.title.as_deref(), Some("[FIRING:1] HighCPU (prod)"));
        assert_eq!(payload.status.as_deref(), Some("firing"));
        assert_eq!(
            payload.common_annotations.summary.as_deref(),
            Some("CPU above 90%")
        );
        assert_eq!(payload.common_labels["severity"], "critical");
        assert_eq!(payload.alert_id.as_deref(), Some("grafana-123"));

        Ok(())
    }

    #[test]
    fn test_minimal_payload_deserialization() -> anyhow::Result<()> {
        let payload: AlertPayload = serde_json::from_str(r#"{"title":"t","message":"m"}"#)?;

        assert!(payload.status.is_none());
        assert!(payload.common_annotations.summary.is_none());
        assert!(payload.common_labels.is_empty());

        Ok(())
    }

    #[test]
    fn test_null_annotations_and_labels_are_absent() -> anyhow::Result<()> {
        let payload: AlertPayload = serde_json::from_value(serde_json::json!({
            "title": "t",
            "message": "m",
            "status": "firing",
            "commonAnnotations": null,
            "commonLabels": null
        }))?;

        assert!(payload.common_annotations.summary.is_none());
        assert!(payload.common_labels.is_empty());
        assert!(payload.into_alert("alert").is_ok());

        Ok(())
    }

    #[test]
    fn test_into_alert_keeps_supplied_id() {
        let payload = AlertPayload {
            alert_id: Some("ext-42".to_string()),
            ..AlertPayload::firing("Disk full", "/var is at 99%")
        };

        let alert = payload.into_alert("alert").unwrap();

        assert_eq!(alert.id, "ext-42");
        assert_eq!(alert.title, "Disk full");
        assert!(alert.is_firing());
    }

    #[test]
    fn test_into_alert_reports_missing_fields() {
        let err = AlertPayload::default().into_alert("alert").unwrap_err();
        match err {
            RelayError::MissingFields(fields) => assert_eq!(fields, vec!["title", "message"]),
            other => panic!("unexpected error: {other}"),
        }

        let payload = AlertPayload {
            message: None,
            ..AlertPayload::new("only a title", "")
        };
        match payload.into_alert("alert").unwrap_err() {
            RelayError::MissingFields(fields) => assert_eq!(fields, vec!["message"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_blank_fields_count_as_missing() {
        let err = AlertPayload::new("   ", "body").into_alert("alert").unwrap_err();
        assert!(matches!(err, RelayError::MissingFields(ref f) if f == &vec!["title"]));
    }

    #[test]
    fn test_status_is_case_insensitive() {
        let mut payload = AlertPayload::new("t", "m");
        payload.status = Some("FIRING".to_string());
        assert!(payload.clone().into_alert("a").unwrap().is_firing());

        payload.status = Some("resolved".to_string());
        assert!(!payload.into_alert("a").unwrap().is_firing());
    }

    #[test]
    fn test_generated_id_format() {
        let id = generate_alert_id("grafana");
        let rest = id.strip_prefix("grafana-").expect("prefix");

        // 2020s millisecond timestamps are 8 base36 digits
        assert_eq!(rest.len(), 8 + RANDOM_SUFFIX_LEN);
        assert!(rest.chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
        assert_ne!(generate_alert_id("grafana"), generate_alert_id("grafana"));
    }

    #[test]
    fn test_to_base36() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
        assert_eq!(to_base36(1_700_000_000_000), "loyw3v28");
    }
}
