//! Subcommand handlers. Each returns the JSON document to print; failures
//! are folded into `{"error": ...}` here and never escape as `Err`.

use anyhow::{Context, Result};
use audio_features::{analyze_batch, compare, MixRequest};
use llm_bridge::BackendConfig;
use museconf::{ConfigSources, MuseConfig};
use musegen::{analyze_library, Generator, StyleStore, UserStyle};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::path::PathBuf;

const NO_PROMPT: &str = "No prompt provided";

/// Effective configuration plus per-invocation overrides.
pub struct Session {
    pub config: MuseConfig,
    seed: Option<u64>,
}

impl Session {
    pub fn new(config: MuseConfig, seed: Option<u64>) -> Self {
        Self { config, seed }
    }

    fn generator(&self) -> Generator {
        Generator::new(self.config.paths.output_dir.clone(), self.seed).with_bundles(
            self.config.models.melody_bundle.clone(),
            self.config.models.chord_bundle.clone(),
        )
    }

    fn backend(&self) -> BackendConfig {
        let llm = &self.config.llm;
        BackendConfig {
            base_url: llm.base_url.clone(),
            model: llm.model.clone(),
            api_key: llm.api_key.clone(),
            timeout_secs: llm.timeout_secs,
        }
    }

    fn style_store(&self) -> StyleStore {
        StyleStore::new(self.config.paths.style_file.clone())
    }
}

pub fn error_json(message: impl std::fmt::Display) -> Value {
    json!({ "error": message.to_string() })
}

fn to_json<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or_else(|e| error_json(format!("Failed to encode result: {e}")))
}

fn parse_arg<T: DeserializeOwned>(arg: &str, what: &str) -> Result<T> {
    serde_json::from_str(arg).with_context(|| format!("Invalid {what}"))
}

pub fn features(files: Option<&str>) -> Value {
    let Some(files) = files else {
        return error_json("No files provided");
    };
    match parse_arg::<Vec<PathBuf>>(files, "file list") {
        Ok(paths) => to_json(&analyze_batch(&paths)),
        Err(e) => error_json(format!("{e:#}")),
    }
}

pub fn mix(request: Option<&str>) -> Value {
    let Some(request) = request else {
        return error_json("No paths provided");
    };
    let report = parse_arg::<MixRequest>(request, "mix request")
        .and_then(|request| compare(&request).context("Mix analysis failed"));
    match report {
        Ok(report) => to_json(&report),
        Err(e) => {
            let message = format!("{e:#}");
            tracing::warn!(error = %message, "mix comparison failed");
            error_json(message)
        }
    }
}

pub async fn ask(session: &Session, prompt: Option<&str>) -> Value {
    match prompt {
        Some(prompt) => to_json(&llm_bridge::ask(session.backend(), prompt).await),
        None => error_json(NO_PROMPT),
    }
}

pub async fn reply(session: &Session, prompt: Option<&str>) -> Value {
    match prompt {
        Some(prompt) => to_json(&llm_bridge::reply(session.backend(), prompt).await),
        None => error_json(NO_PROMPT),
    }
}

/// The prompt is required but does not steer the basic model.
pub fn midi_basic(session: &Session, prompt: Option<&str>) -> Value {
    if prompt.is_none() {
        return error_json(NO_PROMPT);
    }
    match session.generator().basic() {
        Ok(file) => json!({ "file": file.display().to_string() }),
        Err(e) => {
            tracing::warn!(error = %e, "basic generation failed");
            error_json(e)
        }
    }
}

pub fn midi_advanced(session: &Session, prompt: Option<&str>) -> Value {
    let Some(prompt) = prompt else {
        return error_json(NO_PROMPT);
    };
    match session.generator().advanced(prompt) {
        Ok(output) => {
            tracing::info!(plan = ?output.plan, "advanced generation done");
            json!({
                "success": true,
                "file": output.file.display().to_string(),
                "style": "ml_advanced",
                "prompt": prompt,
            })
        }
        Err(e) => {
            let cause = std::error::Error::source(&e).map(|s| s.to_string());
            tracing::warn!(stage = %e, cause = ?cause, "advanced generation failed");
            error_json(e)
        }
    }
}

pub fn style(session: &Session, command: Option<&str>, argument: Option<&str>) -> Value {
    match command {
        None => error_json("No command provided"),
        Some("analyze") => match argument {
            None => error_json("No MIDI files provided"),
            Some(files) => match learn_style(session, files) {
                Ok(user_style) => json!({
                    "success": true,
                    "user_style": to_json(&user_style),
                    "message": "Library analyzed and style learned",
                }),
                Err(e) => {
                    let cause = format!("{e:#}");
                    tracing::warn!(error = %cause, "style analysis failed");
                    error_json("Failed to analyze library")
                }
            },
        },
        Some("generate") => match argument {
            None => error_json(NO_PROMPT),
            Some(_) => generate_in_style(session),
        },
        Some(other) => error_json(format!("Unknown command: {other}")),
    }
}

fn learn_style(session: &Session, files: &str) -> Result<UserStyle> {
    let paths: Vec<PathBuf> = parse_arg(files, "file list")?;
    let user_style = analyze_library(&paths).context("analyzing library")?;
    let store = session.style_store();
    store
        .save(&user_style)
        .with_context(|| format!("saving style to {}", store.path().display()))?;
    Ok(user_style)
}

fn generate_in_style(session: &Session) -> Value {
    let user_style = match session.style_store().load() {
        Ok(Some(user_style)) => user_style,
        Ok(None) => return error_json("No training data found. Please analyze your library first."),
        Err(e) => {
            tracing::warn!(error = %e, "style record unreadable");
            return error_json("No training data found. Please analyze your library first.");
        }
    };

    match session.generator().personalized(&user_style) {
        Ok(file) => json!({
            "success": true,
            "file": file.display().to_string(),
            "style": "personalized",
            "user_style": to_json(&user_style),
        }),
        Err(e) => {
            tracing::warn!(error = %e, "personalized generation failed");
            error_json("Failed to generate personalized melody")
        }
    }
}

pub fn show_config(session: &Session, sources: &ConfigSources, toml: bool) -> Value {
    if toml {
        json!({ "toml": session.config.to_toml(), "sources": to_json(sources) })
    } else {
        json!({ "config": to_json(&session.config), "sources": to_json(sources) })
    }
}
