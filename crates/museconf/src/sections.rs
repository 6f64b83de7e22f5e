//! Config sections: filesystem paths, model bundles, the text runtime, logging.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where generated artifacts and learned state live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory generated `.mid` files are written to.
    /// Default: current directory
    #[serde(default = "PathsConfig::default_output_dir")]
    pub output_dir: PathBuf,

    /// Learned user style record.
    /// Default: ./user_style.json
    #[serde(default = "PathsConfig::default_style_file")]
    pub style_file: PathBuf,
}

impl PathsConfig {
    fn default_output_dir() -> PathBuf {
        PathBuf::from(".")
    }

    fn default_style_file() -> PathBuf {
        PathBuf::from("user_style.json")
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            output_dir: Self::default_output_dir(),
            style_file: Self::default_style_file(),
        }
    }
}

/// Generation model bundles. `None` selects the compiled-in bundle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelsConfig {
    #[serde(default)]
    pub melody_bundle: Option<PathBuf>,

    #[serde(default)]
    pub chord_bundle: Option<PathBuf>,
}

/// Locally hosted OpenAI-compatible completion runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL including the API version prefix.
    /// Default: http://127.0.0.1:8080/v1 (llama.cpp server)
    #[serde(default = "LlmConfig::default_base_url")]
    pub base_url: String,

    /// Model identifier the runtime must list.
    /// Default: gemma-2-2b
    #[serde(default = "LlmConfig::default_model")]
    pub model: String,

    /// Bearer token, only needed when the runtime sits behind auth.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Whole-request timeout in seconds.
    /// Default: 120
    #[serde(default = "LlmConfig::default_timeout_secs")]
    pub timeout_secs: u64,
}

impl LlmConfig {
    fn default_base_url() -> String {
        "http://127.0.0.1:8080/v1".to_string()
    }

    fn default_model() -> String {
        "gemma-2-2b".to_string()
    }

    fn default_timeout_secs() -> u64 {
        120
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: Self::default_base_url(),
            model: Self::default_model(),
            api_key: None,
            timeout_secs: Self::default_timeout_secs(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log level or `EnvFilter` directive string.
    /// Default: warn (stdout is reserved for the JSON result)
    #[serde(default = "TelemetryConfig::default_log_level")]
    pub log_level: String,
}

impl TelemetryConfig {
    fn default_log_level() -> String {
        "warn".to_string()
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: Self::default_log_level(),
        }
    }
}
