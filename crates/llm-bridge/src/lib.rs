pub mod config;
pub mod flavor;
pub mod model;
pub mod types;

pub use config::BackendConfig;
pub use flavor::{ask, reply, AskOutcome, ReplyOutcome, ASK_PARAMS, REPLY_PARAMS};
pub use model::{strip_echoed_prompt, LocalTextModel};
pub use types::GenerationParams;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("request to text runtime failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("text runtime returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("model {model} is not served at {base_url}")]
    ModelNotFound { model: String, base_url: String },

    #[error("completion response contained no choices")]
    EmptyCompletion,
}

pub type Result<T> = std::result::Result<T, Error>;
