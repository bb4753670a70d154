//! Inbound diagnosis request messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single leaf-image diagnosis request as published on NATS.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosisRequest {
    pub request_id: String,
    /// Base64-encoded image bytes (PNG or JPEG). A `data:` URL prefix is
    /// tolerated and stripped before decoding.
    pub image_base64: String,
    /// Ranked pairs to return per stage; falls back to the configured
    /// pipeline default when absent.
    #[serde(default)]
    pub top_k: Option<usize>,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl DiagnosisRequest {
    pub fn new(request_id: impl Into<String>, image_base64: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            image_base64: image_base64.into(),
            top_k: None,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization_round_trip() {
        let request = DiagnosisRequest::new("req-100", "aGVsbG8=");
        let json = serde_json::to_string(&request).unwrap();
        let parsed: DiagnosisRequest = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.request_id, "req-100");
        assert_eq!(parsed.image_base64, "aGVsbG8=");
        assert_eq!(parsed.top_k, None);
    }

    #[test]
    fn test_missing_optional_fields_get_defaults() {
        let json = r#"{"request_id": "req-101", "image_base64": "aGVsbG8="}"#;
        let parsed: DiagnosisRequest = serde_json::from_str(json).unwrap();

        assert_eq!(parsed.request_id, "req-101");
        assert_eq!(parsed.top_k, None);
    }

    #[test]
    fn test_explicit_top_k_is_preserved() {
        let json = r#"{"request_id": "req-102", "image_base64": "aGVsbG8=", "top_k": 3}"#;
        let parsed: DiagnosisRequest = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.top_k, Some(3));
    }
}
