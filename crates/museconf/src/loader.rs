//! Config file discovery, loading, and environment variable overlay.

use crate::{ConfigError, MuseConfig};
use std::env;
use std::path::{Path, PathBuf};

/// Information about where config values came from.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ConfigSources {
    /// Config files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
}

/// Discover config files, optionally with a CLI override path.
///
/// If `cli_path` is provided and exists, it replaces the local override.
/// Returns paths in load order (system, user, local/cli).
pub fn discover_config_files_with_override(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let system = PathBuf::from("/etc/mixmuse/config.toml");
    if system.exists() {
        files.push(system);
    }

    // User config (XDG_CONFIG_HOME or ~/.config)
    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("mixmuse/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    if let Some(path) = cli_path {
        if path.exists() {
            files.push(path.to_path_buf());
            return files;
        }
    }

    let local = PathBuf::from("mixmuse.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

/// Read a TOML file and overlay every key it sets onto `config`.
pub fn overlay_file(config: &mut MuseConfig, path: &Path) -> Result<(), ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    overlay_toml(config, &contents, path)
}

/// Overlay a TOML document. Keys absent from the document keep their value,
/// so several files can each set a subset.
fn overlay_toml(config: &mut MuseConfig, contents: &str, path: &Path) -> Result<(), ConfigError> {
    let table: toml::Table = contents.parse().map_err(|e: toml::de::Error| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    if let Some(paths) = table.get("paths").and_then(|v| v.as_table()) {
        if let Some(v) = paths.get("output_dir").and_then(|v| v.as_str()) {
            config.paths.output_dir = expand_path(v);
        }
        if let Some(v) = paths.get("style_file").and_then(|v| v.as_str()) {
            config.paths.style_file = expand_path(v);
        }
    }

    if let Some(models) = table.get("models").and_then(|v| v.as_table()) {
        if let Some(v) = models.get("melody_bundle").and_then(|v| v.as_str()) {
            config.models.melody_bundle = Some(expand_path(v));
        }
        if let Some(v) = models.get("chord_bundle").and_then(|v| v.as_str()) {
            config.models.chord_bundle = Some(expand_path(v));
        }
    }

    if let Some(llm) = table.get("llm").and_then(|v| v.as_table()) {
        if let Some(v) = llm.get("base_url").and_then(|v| v.as_str()) {
            config.llm.base_url = v.to_string();
        }
        if let Some(v) = llm.get("model").and_then(|v| v.as_str()) {
            config.llm.model = v.to_string();
        }
        if let Some(v) = llm.get("api_key").and_then(|v| v.as_str()) {
            config.llm.api_key = Some(v.to_string());
        }
        if let Some(v) = llm.get("timeout_secs") {
            let secs = v.as_integer().filter(|s| *s > 0).ok_or_else(|| ConfigError::Parse {
                path: path.to_path_buf(),
                message: "llm.timeout_secs must be a positive integer".to_string(),
            })?;
            config.llm.timeout_secs = secs as u64;
        }
    }

    if let Some(telemetry) = table.get("telemetry").and_then(|v| v.as_table()) {
        if let Some(v) = telemetry.get("log_level").and_then(|v| v.as_str()) {
            config.telemetry.log_level = v.to_string();
        }
    }

    Ok(())
}

/// Apply `MIXMUSE_*` environment variable overrides to config.
pub fn apply_env_overrides(config: &mut MuseConfig, sources: &mut ConfigSources) {
    apply_overrides_from(config, sources, |key| env::var(key).ok());
}

fn apply_overrides_from<F>(config: &mut MuseConfig, sources: &mut ConfigSources, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let mut take = |key: &str| {
        let value = lookup(key)?;
        sources.env_overrides.push(key.to_string());
        Some(value)
    };

    if let Some(v) = take("MIXMUSE_OUTPUT_DIR") {
        config.paths.output_dir = expand_path(&v);
    }
    if let Some(v) = take("MIXMUSE_STYLE_FILE") {
        config.paths.style_file = expand_path(&v);
    }
    if let Some(v) = take("MIXMUSE_MELODY_BUNDLE") {
        config.models.melody_bundle = Some(expand_path(&v));
    }
    if let Some(v) = take("MIXMUSE_CHORD_BUNDLE") {
        config.models.chord_bundle = Some(expand_path(&v));
    }
    if let Some(v) = take("MIXMUSE_LLM_URL") {
        config.llm.base_url = v;
    }
    if let Some(v) = take("MIXMUSE_LLM_MODEL") {
        config.llm.model = v;
    }
    if let Some(v) = take("MIXMUSE_LLM_API_KEY") {
        config.llm.api_key = Some(v);
    }
    if let Some(v) = take("MIXMUSE_LOG_LEVEL") {
        config.telemetry.log_level = v;
    }
}

/// Expand ~ and environment variables in a path.
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf()) {
            home.join(stripped)
        } else {
            PathBuf::from(path)
        }
    } else if let Some(stripped) = path.strip_prefix('$') {
        // Handle $VAR/rest/of/path
        if let Some(slash_pos) = stripped.find('/') {
            let var_name = &stripped[..slash_pos];
            if let Ok(var_value) = env::var(var_name) {
                PathBuf::from(var_value).join(&stripped[slash_pos + 1..])
            } else {
                PathBuf::from(path)
            }
        } else {
            env::var(stripped)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(path))
        }
    } else {
        PathBuf::from(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    #[test]
    fn test_expand_path_tilde() {
        let expanded = expand_path("~/test/path");
        assert!(!expanded.to_string_lossy().starts_with('~'));
        assert!(expanded.to_string_lossy().contains("test/path"));
    }

    #[test]
    fn test_expand_path_absolute() {
        let expanded = expand_path("/absolute/path");
        assert_eq!(expanded, PathBuf::from("/absolute/path"));
    }

    #[test]
    fn test_parse_minimal_toml() {
        let mut config = MuseConfig::default();
        let toml = r#"
[paths]
output_dir = "/custom/out"
"#;
        overlay_toml(&mut config, toml, Path::new("test.toml")).unwrap();
        assert_eq!(config.paths.output_dir, PathBuf::from("/custom/out"));
        // Other values should be defaults
        assert_eq!(config.paths.style_file, PathBuf::from("user_style.json"));
        assert_eq!(config.llm.model, "gemma-2-2b");
    }

    #[test]
    fn test_parse_full_toml() {
        let mut config = MuseConfig::default();
        let toml = r#"
[paths]
output_dir = "/data/out"
style_file = "/data/style.json"

[models]
melody_bundle = "/models/melody.json"
chord_bundle = "/models/chords.json"

[llm]
base_url = "http://gpu:11434/v1"
model = "gemma-2-9b"
api_key = "secret"
timeout_secs = 30

[telemetry]
log_level = "debug"
"#;
        overlay_toml(&mut config, toml, Path::new("test.toml")).unwrap();

        assert_eq!(config.paths.output_dir, PathBuf::from("/data/out"));
        assert_eq!(config.paths.style_file, PathBuf::from("/data/style.json"));
        assert_eq!(config.models.melody_bundle, Some(PathBuf::from("/models/melody.json")));
        assert_eq!(config.models.chord_bundle, Some(PathBuf::from("/models/chords.json")));
        assert_eq!(config.llm.base_url, "http://gpu:11434/v1");
        assert_eq!(config.llm.model, "gemma-2-9b");
        assert_eq!(config.llm.api_key.as_deref(), Some("secret"));
        assert_eq!(config.llm.timeout_secs, 30);
        assert_eq!(config.telemetry.log_level, "debug");
    }

    #[test]
    fn later_files_only_override_keys_they_set() {
        let mut config = MuseConfig::default();
        overlay_toml(
            &mut config,
            "[llm]\nmodel = \"first\"\nbase_url = \"http://a/v1\"\n",
            Path::new("a.toml"),
        )
        .unwrap();
        overlay_toml(&mut config, "[llm]\nmodel = \"second\"\n", Path::new("b.toml")).unwrap();

        assert_eq!(config.llm.model, "second");
        assert_eq!(config.llm.base_url, "http://a/v1");
    }

    #[test]
    fn invalid_toml_is_a_parse_error() {
        let mut config = MuseConfig::default();
        let err = overlay_toml(&mut config, "[paths\n", Path::new("bad.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let mut config = MuseConfig::default();
        let err = overlay_toml(&mut config, "[llm]\ntimeout_secs = 0\n", Path::new("t.toml"))
            .unwrap_err();
        assert!(err.to_string().contains("timeout_secs"));
    }

    #[test]
    fn overlay_file_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mixmuse.toml");
        std::fs::write(&path, "[paths]\nstyle_file = \"/tmp/style.json\"\n").unwrap();

        let mut config = MuseConfig::default();
        overlay_file(&mut config, &path).unwrap();
        assert_eq!(config.paths.style_file, PathBuf::from("/tmp/style.json"));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let mut config = MuseConfig::default();
        let err = overlay_file(&mut config, Path::new("/nonexistent/mixmuse.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::FileRead { .. }));
    }

    #[test]
    fn env_overrides_are_recorded() {
        let env: HashMap<&str, &str> = [
            ("MIXMUSE_LLM_MODEL", "phi-3"),
            ("MIXMUSE_OUTPUT_DIR", "/renders"),
        ]
        .into_iter()
        .collect();

        let mut config = MuseConfig::default();
        let mut sources = ConfigSources::default();
        apply_overrides_from(&mut config, &mut sources, |key| {
            env.get(key).map(|v| v.to_string())
        });

        assert_eq!(config.llm.model, "phi-3");
        assert_eq!(config.paths.output_dir, PathBuf::from("/renders"));
        assert_eq!(
            sources.env_overrides,
            vec!["MIXMUSE_OUTPUT_DIR".to_string(), "MIXMUSE_LLM_MODEL".to_string()]
        );
    }
}
