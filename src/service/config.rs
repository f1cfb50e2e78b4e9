use crate::error::AnalysisError;
use crate::graph::{AnalysisStatus, Credentials};
use serde::{Deserialize, Serialize};

/// Settings applied by the builder to every analysis it creates.
///
/// ```json
/// {"url": "https://maps.example.com/api/v1/map", "apiKey": "KEY", "initialStatus": "pending"}
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceConfig {
    /// Fallback endpoint and credentials for descriptions that carry none.
    #[serde(flatten)]
    pub credentials: Credentials,
    /// Status of freshly created nodes whose description has none.
    pub initial_status: Option<AnalysisStatus>,
}

impl ServiceConfig {
    pub fn from_json_str(text: &str) -> Result<Self, AnalysisError> {
        let config: Self = serde_json::from_str(text).map_err(|e| AnalysisError::Config(e.to_string()))?;
        if config.initial_status == Some(AnalysisStatus::Failed) {
            return Err(AnalysisError::Config("initialStatus cannot be 'failed'".into()));
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_flat_document() {
        let config = ServiceConfig::from_json_str(
            r#"{"url": "http://x", "authToken": "T", "initialStatus": "pending"}"#,
        )
        .unwrap();
        assert_eq!(config.credentials.url.as_deref(), Some("http://x"));
        assert_eq!(config.credentials.auth_token.as_deref(), Some("T"));
        assert_eq!(config.credentials.api_key, None);
        assert_eq!(config.initial_status, Some(AnalysisStatus::Pending));
    }

    #[test]
    fn test_everything_is_optional() {
        assert_eq!(ServiceConfig::from_json_str("{}").unwrap(), ServiceConfig::default());
    }

    #[test]
    fn test_rejects_failed_initial_status() {
        let err = ServiceConfig::from_json_str(r#"{"initialStatus": "failed"}"#).unwrap_err();
        assert!(matches!(err, AnalysisError::Config(msg) if msg.contains("initialStatus")));
    }

    #[test]
    fn test_rejects_unknown_status() {
        let err = ServiceConfig::from_json_str(r#"{"initialStatus": "foo"}"#).unwrap_err();
        assert!(matches!(err, AnalysisError::Config(_)));
    }
}
