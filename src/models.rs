use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One answered question. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRecord {
    pub id: Uuid,
    /// Answer text as returned by the endpoint (Markdown).
    pub value: String,
    pub question: Option<String>,
    pub date: DateTime<Utc>,
    pub is_regenerate: bool,
}

impl QueryRecord {
    pub fn new(value: String, question: Option<String>, is_regenerate: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            value,
            question,
            date: Utc::now(),
            is_regenerate,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub api_base_url: String,
    #[serde(default = "default_share_url")]
    pub share_url: String,
    /// Client timeout in seconds, 0 leaves the transport default in place.
    #[serde(default = "default_timeout")]
    pub request_timeout: u64,
    #[serde(default)]
    pub theme: ThemeConfig,
}

/// API host baked in at build time through `ASKBEND_API_BASE_URL`.
pub const BUILD_API_BASE_URL: Option<&str> = option_env!("ASKBEND_API_BASE_URL");

const FALLBACK_API_BASE_URL: &str = "https://ask.databend.rs/qa";

pub fn default_api_base_url() -> String {
    BUILD_API_BASE_URL
        .filter(|url| !url.trim().is_empty())
        .unwrap_or(FALLBACK_API_BASE_URL)
        .to_string()
}

fn default_share_url() -> String {
    "https://ask.databend.rs".to_string()
}

const fn default_timeout() -> u64 {
    0
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            share_url: default_share_url(),
            request_timeout: default_timeout(),
            theme: ThemeConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ThemeConfig {
    pub border_color: String,
    pub accent_color: String,
}

impl Default for ThemeConfig {
    fn default() -> Self {
        Self {
            border_color: "cyan".to_string(),
            accent_color: "green".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_record_new() {
        let record = QueryRecord::new("answer".to_string(), Some("what is X".to_string()), false);
        assert_eq!(record.value, "answer");
        assert_eq!(record.question.as_deref(), Some("what is X"));
        assert!(!record.is_regenerate);
        assert!(record.date <= Utc::now());
    }

    #[test]
    fn test_query_records_get_distinct_ids() {
        let a = QueryRecord::new("a".to_string(), None, false);
        let b = QueryRecord::new("a".to_string(), None, false);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_app_config_default() {
        let config = AppConfig::default();
        assert!(!config.api_base_url.is_empty());
        assert_eq!(config.share_url, "https://ask.databend.rs");
        assert_eq!(config.request_timeout, 0);
        assert_eq!(config.theme.border_color, "cyan");
    }

    #[test]
    fn test_app_config_optional_fields() {
        let config: AppConfig =
            toml::from_str(r#"api_base_url = "http://localhost:8081""#).unwrap();
        assert_eq!(config.api_base_url, "http://localhost:8081");
        assert_eq!(config.share_url, "https://ask.databend.rs");
        assert_eq!(config.theme, ThemeConfig::default());
    }
}
