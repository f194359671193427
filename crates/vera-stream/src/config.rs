use std::collections::BTreeMap;

use serde::Deserialize;

use crate::StreamError;

pub const DEFAULT_API_BASE: &str = "http://127.0.0.1:8000/api";
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
/// Connection settings shared by the pipeline and chat streams.
pub struct StreamClientConfig {
    pub api_base: String,
    pub auth_token: Option<String>,
    pub connect_timeout_ms: u64,
    pub extra_headers: BTreeMap<String, String>,
    /// Ends the read loop right after a protocol-terminal event is dispatched.
    pub close_on_terminal_event: bool,
}

impl Default for StreamClientConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            auth_token: None,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            extra_headers: BTreeMap::new(),
            close_on_terminal_event: false,
        }
    }
}

impl StreamClientConfig {
    pub fn new(api_base: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), StreamError> {
        let base = self.api_base.trim();
        if base.is_empty() {
            return Err(StreamError::InvalidConfig("api_base is empty".to_string()));
        }
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(StreamError::InvalidConfig(format!(
                "api_base must be an http(s) URL, got '{base}'"
            )));
        }
        if let Some(token) = &self.auth_token {
            if token.trim().is_empty() {
                return Err(StreamError::InvalidConfig(
                    "auth_token is set but empty".to_string(),
                ));
            }
        }
        Ok(())
    }

    pub fn endpoint(&self, path: &str) -> String {
        let base = self.api_base.trim().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{base}/{path}")
    }

    /// `GET` subscription URL for a report's pipeline activity.
    pub fn pipeline_stream_url(&self, report_id: &str) -> Result<String, StreamError> {
        let report_id = validate_report_id(report_id)?;
        Ok(self.endpoint(&format!("reports/{report_id}/stream")))
    }

    /// `POST` URL for a chat exchange about a report.
    pub fn chat_url(&self, report_id: &str) -> Result<String, StreamError> {
        let report_id = validate_report_id(report_id)?;
        Ok(self.endpoint(&format!("reports/{report_id}/chat")))
    }
}

pub fn validate_report_id(report_id: &str) -> Result<&str, StreamError> {
    let report_id = report_id.trim();
    if report_id.is_empty() {
        return Err(StreamError::InvalidRequest("report id is empty".to_string()));
    }
    if report_id
        .chars()
        .any(|ch| matches!(ch, '/' | '?' | '#' | '%') || ch.is_whitespace())
    {
        return Err(StreamError::InvalidRequest(format!(
            "report id '{report_id}' is not a single path segment"
        )));
    }
    Ok(report_id)
}

#[cfg(test)]
mod tests {
    use super::StreamClientConfig;
    use crate::StreamError;

    #[test]
    fn unit_endpoint_normalizes_slashes() {
        let config = StreamClientConfig::new("http://localhost:9000/api/");
        assert_eq!(
            config.endpoint("/reports/r-1/stream"),
            "http://localhost:9000/api/reports/r-1/stream"
        );
        assert_eq!(
            config.pipeline_stream_url("r-1").expect("url"),
            "http://localhost:9000/api/reports/r-1/stream"
        );
        assert_eq!(
            config.chat_url(" r-1 ").expect("url"),
            "http://localhost:9000/api/reports/r-1/chat"
        );
    }

    #[test]
    fn regression_report_ids_must_be_one_path_segment() {
        let config = StreamClientConfig::default();
        assert!(matches!(
            config.pipeline_stream_url(""),
            Err(StreamError::InvalidRequest(_))
        ));
        assert!(matches!(
            config.chat_url("../admin"),
            Err(StreamError::InvalidRequest(_))
        ));
    }

    #[test]
    fn unit_validate_rejects_empty_or_non_http_bases() {
        assert!(StreamClientConfig::default().validate().is_ok());
        assert!(StreamClientConfig::new("  ").validate().is_err());
        assert!(StreamClientConfig::new("ftp://host").validate().is_err());

        let config = StreamClientConfig {
            auth_token: Some(" ".to_string()),
            ..StreamClientConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn functional_config_deserializes_with_defaults() {
        let config: StreamClientConfig = serde_json::from_value(serde_json::json!({
            "api_base": "https://vera.example/api",
            "close_on_terminal_event": true
        }))
        .expect("config");
        assert_eq!(config.api_base, "https://vera.example/api");
        assert!(config.close_on_terminal_event);
        assert_eq!(config.connect_timeout_ms, super::DEFAULT_CONNECT_TIMEOUT_MS);
        assert!(config.auth_token.is_none());
    }
}
