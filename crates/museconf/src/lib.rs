//! Configuration loading for mixmuse.
//!
//! Every mixmuse operation runs as a short-lived process, so configuration
//! is read once per invocation and never reloaded.
//!
//! # Config File Locations
//!
//! Files are loaded in order (later wins, key by key):
//! 1. `/etc/mixmuse/config.toml` (system)
//! 2. `~/.config/mixmuse/config.toml` (user)
//! 3. `./mixmuse.toml` (local override) or the `--config` path
//! 4. Environment variables (`MIXMUSE_*`)
//!
//! # Example Config
//!
//! ```toml
//! [paths]
//! output_dir = "~/Music/generated"
//! style_file = "~/.local/share/mixmuse/user_style.json"
//!
//! [models]
//! melody_bundle = "~/models/melody.json"
//! chord_bundle = "~/models/chords.json"
//!
//! [llm]
//! base_url = "http://127.0.0.1:11434/v1"
//! model = "gemma-2-2b"
//!
//! [telemetry]
//! log_level = "info"
//! ```

pub mod loader;
pub mod sections;

pub use loader::{discover_config_files_with_override, ConfigSources};
pub use sections::{LlmConfig, ModelsConfig, PathsConfig, TelemetryConfig};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Complete mixmuse configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MuseConfig {
    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub models: ModelsConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl MuseConfig {
    /// Load configuration from all standard sources.
    pub fn load() -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(None)?;
        Ok(config)
    }

    /// Load configuration, letting `config_path` replace `./mixmuse.toml`.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(config_path)?;
        Ok(config)
    }

    /// Load configuration and report which files and env vars contributed.
    pub fn load_with_sources_from(
        config_path: Option<&Path>,
    ) -> Result<(Self, ConfigSources), ConfigError> {
        let mut sources = ConfigSources::default();
        let mut config = MuseConfig::default();

        for path in loader::discover_config_files_with_override(config_path) {
            loader::overlay_file(&mut config, &path)?;
            sources.files.push(path);
        }

        loader::apply_env_overrides(&mut config, &mut sources);

        Ok((config, sources))
    }

    /// Serialize the effective config back to TOML.
    pub fn to_toml(&self) -> String {
        let mut output = String::from("# mixmuse configuration\n\n");
        match toml::to_string_pretty(self) {
            Ok(body) => output.push_str(&body),
            Err(e) => output.push_str(&format!("# failed to render config: {}\n", e)),
        }
        output
    }
}
