//! The two request flavours: an assistant answer and a plain reply.

use serde::Serialize;

use crate::config::BackendConfig;
use crate::model::LocalTextModel;
use crate::types::GenerationParams;

/// Sampled, short answers
pub const ASK_PARAMS: GenerationParams = GenerationParams {
    max_tokens: 150,
    temperature: 0.7,
};

/// Greedy, slightly longer replies
pub const REPLY_PARAMS: GenerationParams = GenerationParams {
    max_tokens: 200,
    temperature: 0.0,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AskOutcome {
    Answer {
        response: String,
        model: String,
        local: bool,
    },
    Failed {
        error: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ReplyOutcome {
    Reply { reply: String },
    Failed { error: String },
}

/// Answer a prompt. A model that cannot be loaded is an error; a failed
/// generation is still an answer whose text describes the failure.
pub async fn ask(config: BackendConfig, prompt: &str) -> AskOutcome {
    let model = match LocalTextModel::load(config).await {
        Ok(model) => model,
        Err(e) => {
            tracing::warn!(error = %e, "text model unavailable");
            return AskOutcome::Failed {
                error: format!("Failed to load model: {e}"),
            };
        }
    };

    let response = match model.generate(prompt, ASK_PARAMS).await {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(error = %e, "generation failed");
            format!("Error generating response: {e}")
        }
    };

    AskOutcome::Answer {
        response,
        model: model.model_name().to_string(),
        local: true,
    }
}

/// Reply to a prompt with greedy decoding. Any failure is an error.
pub async fn reply(config: BackendConfig, prompt: &str) -> ReplyOutcome {
    let result = match LocalTextModel::load(config).await {
        Ok(model) => model.generate(prompt, REPLY_PARAMS).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(reply) => ReplyOutcome::Reply { reply },
        Err(e) => {
            tracing::warn!(error = %e, "reply failed");
            ReplyOutcome::Failed {
                error: e.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn outcomes_serialize_flat() {
        let answer = AskOutcome::Answer {
            response: "hi".to_string(),
            model: "gemma-2-2b".to_string(),
            local: true,
        };
        assert_eq!(
            serde_json::to_value(&answer).unwrap(),
            serde_json::json!({"response": "hi", "model": "gemma-2-2b", "local": true})
        );
        assert_eq!(
            serde_json::to_value(ReplyOutcome::Failed { error: "x".to_string() }).unwrap(),
            serde_json::json!({"error": "x"})
        );
    }
}
