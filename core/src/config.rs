//! Client configuration: base URL and the Parse keys sent on every call.

use serde::Deserialize;

use crate::error::ApiError;

pub const DEFAULT_BASE_URL: &str = "https://api.parse.com/1";

/// Immutable settings captured when a `ParseClient` is built.
///
/// Optional keys that are `None` or empty are never sent.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_base_url", alias = "baseUrl")]
    pub base_url: String,
    #[serde(alias = "appId", alias = "applicationId")]
    pub application_id: String,
    #[serde(default, alias = "restAPIKey")]
    pub rest_api_key: Option<String>,
    #[serde(default, alias = "masterKey")]
    pub master_key: Option<String>,
    #[serde(default, alias = "sessionToken")]
    pub session_token: Option<String>,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

impl ClientConfig {
    pub fn new(application_id: impl Into<String>) -> Self {
        Self {
            base_url: default_base_url(),
            application_id: application_id.into(),
            rest_api_key: None,
            master_key: None,
            session_token: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_rest_api_key(mut self, key: impl Into<String>) -> Self {
        self.rest_api_key = Some(key.into());
        self
    }

    pub fn with_master_key(mut self, key: impl Into<String>) -> Self {
        self.master_key = Some(key.into());
        self
    }

    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }

    /// Create configuration from environment variables
    ///
    /// Expects:
    /// - `PARSE_APPLICATION_ID`: application id (required)
    /// - `PARSE_BASE_URL`: API root (default: `https://api.parse.com/1`)
    /// - `PARSE_REST_API_KEY`, `PARSE_MASTER_KEY`, `PARSE_SESSION_TOKEN`: optional
    pub fn from_env() -> Result<Self, ApiError> {
        let application_id = std::env::var("PARSE_APPLICATION_ID")
            .map_err(|_| ApiError::Config("PARSE_APPLICATION_ID not set".into()))?;

        Ok(Self {
            base_url: std::env::var("PARSE_BASE_URL").unwrap_or_else(|_| default_base_url()),
            application_id,
            rest_api_key: std::env::var("PARSE_REST_API_KEY").ok(),
            master_key: std::env::var("PARSE_MASTER_KEY").ok(),
            session_token: std::env::var("PARSE_SESSION_TOKEN").ok(),
        })
    }

    /// Parse a JSON configuration document.
    pub fn from_json(raw: &str) -> Result<Self, ApiError> {
        serde_json::from_str(raw).map_err(|e| ApiError::Config(e.to_string()))
    }

    /// Base URL with any trailing `/` removed.
    pub fn trimmed_base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    pub(crate) fn validate(&self) -> Result<(), ApiError> {
        if self.application_id.is_empty() {
            return Err(ApiError::Config("application id is empty".into()));
        }
        url::Url::parse(self.trimmed_base_url())
            .map_err(|e| ApiError::Config(format!("invalid base url {:?}: {e}", self.base_url)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_hosted_api_root() {
        let config = ClientConfig::new("app");
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert!(config.rest_api_key.is_none());
        assert!(config.master_key.is_none());
        assert!(config.session_token.is_none());
    }

    #[test]
    fn from_json_accepts_camel_case_keys() {
        let config = ClientConfig::from_json(
            r#"{"appId":"app","restAPIKey":"rest","masterKey":"master","sessionToken":"r:abc","baseUrl":"http://localhost:1337/parse"}"#,
        )
        .unwrap();
        assert_eq!(config.application_id, "app");
        assert_eq!(config.rest_api_key.as_deref(), Some("rest"));
        assert_eq!(config.master_key.as_deref(), Some("master"));
        assert_eq!(config.session_token.as_deref(), Some("r:abc"));
        assert_eq!(config.base_url, "http://localhost:1337/parse");
    }

    #[test]
    fn from_json_defaults_base_url() {
        let config = ClientConfig::from_json(r#"{"application_id":"app"}"#).unwrap();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn from_json_requires_application_id() {
        let err = ClientConfig::from_json(r#"{"masterKey":"m"}"#).unwrap_err();
        assert!(matches!(err, ApiError::Config(_)));
    }

    #[test]
    fn validate_rejects_bad_base_url() {
        let config = ClientConfig::new("app").with_base_url("not a url");
        assert!(matches!(config.validate(), Err(ApiError::Config(_))));
    }

    #[test]
    fn validate_rejects_empty_application_id() {
        assert!(matches!(ClientConfig::new("").validate(), Err(ApiError::Config(_))));
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let config = ClientConfig::new("app").with_base_url("http://localhost:3000/1/");
        assert_eq!(config.trimmed_base_url(), "http://localhost:3000/1");
    }
}
