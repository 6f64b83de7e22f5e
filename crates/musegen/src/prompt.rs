//! Keyword-driven generation plans.
//!
//! A prompt is matched against a small fixed table: a style keyword picks the
//! sampling temperature, "minor"/"major" picks the key, and `<n> bpm` sets the
//! tempo. Anything else in the prompt is ignored.

use midi_analysis::KeyMode;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

pub const DEFAULT_TEMPO: u32 = 140;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Style {
    Trap,
    Jazz,
    Classical,
}

impl Style {
    pub fn temperature(self) -> f64 {
        match self {
            Style::Trap => 0.8,
            Style::Jazz => 1.2,
            Style::Classical => 0.6,
        }
    }
}

/// Checked in order; the first keyword present wins.
const STYLE_KEYWORDS: [(&str, Style); 3] = [
    ("trap", Style::Trap),
    ("jazz", Style::Jazz),
    ("classical", Style::Classical),
];

const KEY_KEYWORDS: [(&str, &str, KeyMode); 2] = [
    ("minor", "C minor", KeyMode::Minor),
    ("major", "C major", KeyMode::Major),
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationPlan {
    pub style: Style,
    pub temperature: f64,
    /// "C minor", "C major" or plain "C"
    pub key: String,
    pub mode: KeyMode,
    pub tempo: u32,
}

fn tempo_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(\d+)\s*bpm").expect("tempo pattern compiles"))
}

pub fn resolve_prompt(prompt: &str) -> GenerationPlan {
    let lower = prompt.to_lowercase();

    let style = STYLE_KEYWORDS
        .iter()
        .find(|(keyword, _)| lower.contains(keyword))
        .map(|&(_, style)| style)
        .unwrap_or(Style::Trap);

    let (key, mode) = KEY_KEYWORDS
        .iter()
        .find(|(keyword, _, _)| lower.contains(keyword))
        .map(|&(_, key, mode)| (key, mode))
        .unwrap_or(("C", KeyMode::Major));

    let tempo = tempo_pattern()
        .captures(&lower)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<u32>().ok())
        .unwrap_or(DEFAULT_TEMPO);

    let plan = GenerationPlan {
        style,
        temperature: style.temperature(),
        key: key.to_string(),
        mode,
        tempo,
    };
    tracing::debug!(?plan, "resolved prompt");
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn jazz_minor_with_tempo() {
        let plan = resolve_prompt("dark jazz in a minor key at 96 bpm");
        assert_eq!(
            plan,
            GenerationPlan {
                style: Style::Jazz,
                temperature: 1.2,
                key: "C minor".to_string(),
                mode: KeyMode::Minor,
                tempo: 96,
            }
        );
    }

    #[test]
    fn empty_prompt_uses_defaults() {
        let plan = resolve_prompt("");
        assert_eq!(plan.style, Style::Trap);
        assert_eq!(plan.temperature, 0.8);
        assert_eq!(plan.key, "C");
        assert_eq!(plan.tempo, 140);
    }

    #[test]
    fn style_precedence_follows_table_order() {
        // "classical" appears first in the text, but trap outranks it
        assert_eq!(resolve_prompt("classical meets trap").style, Style::Trap);
        assert_eq!(resolve_prompt("Classical jazz").style, Style::Jazz);
        assert_eq!(resolve_prompt("CLASSICAL etude").temperature, 0.6);
    }

    #[test]
    fn minor_beats_major() {
        assert_eq!(resolve_prompt("major or minor?").key, "C minor");
        assert_eq!(resolve_prompt("bright MAJOR tune").key, "C major");
    }

    #[test]
    fn tempo_needs_bpm_suffix() {
        assert_eq!(resolve_prompt("120BPM banger").tempo, 120);
        assert_eq!(resolve_prompt("at 90   bpm").tempo, 90);
        assert_eq!(resolve_prompt("number 90 only").tempo, 140);
        assert_eq!(resolve_prompt("first 80 bpm then 100 bpm").tempo, 80);
    }

    #[test]
    fn out_of_range_tempo_falls_back() {
        assert_eq!(resolve_prompt("99999999999 bpm").tempo, 140);
    }
}
