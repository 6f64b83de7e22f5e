use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Where the local text runtime lives and which model to ask for.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    /// Base URL of the OpenAI-compatible API, including the version prefix
    pub base_url: String,

    /// Model identifier the runtime must list
    pub model: String,

    /// API key (optional for local runtimes)
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    120
}

impl BackendConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// `base_url` joined with `path`, tolerating a trailing slash.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080/v1".to_string(),
            model: "gemma-2-2b".to_string(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_without_double_slash() {
        let config = BackendConfig {
            base_url: "http://localhost:1234/v1/".to_string(),
            ..Default::default()
        };
        assert_eq!(config.endpoint("models"), "http://localhost:1234/v1/models");
        assert_eq!(BackendConfig::default().endpoint("completions"), "http://127.0.0.1:8080/v1/completions");
    }
}
