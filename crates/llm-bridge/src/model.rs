use crate::config::BackendConfig;
use crate::types::{CompletionRequest, CompletionResponse, GenerationParams, ModelList};
use crate::{Error, Result};

/// Handle on a model served by a local completion runtime.
///
/// Loading checks that the runtime is reachable and lists the configured
/// model; nothing is cached between invocations.
pub struct LocalTextModel {
    config: BackendConfig,
    client: reqwest::Client,
}

impl LocalTextModel {
    #[tracing::instrument(skip_all, fields(model = %config.model, base_url = %config.base_url))]
    pub async fn load(config: BackendConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;
        let model = Self { config, client };

        let response = model
            .authorized(model.client.get(model.config.endpoint("models")))
            .send()
            .await?;
        let models: ModelList = check_status(response).await?.json().await?;

        if !models.data.iter().any(|m| m.id == model.config.model) {
            return Err(Error::ModelNotFound {
                model: model.config.model.clone(),
                base_url: model.config.base_url.clone(),
            });
        }

        tracing::info!("text model available");
        Ok(model)
    }

    pub fn model_name(&self) -> &str {
        &self.config.model
    }

    /// Complete `prompt`. An echoed prompt is stripped from the front of the
    /// text and the result trimmed.
    #[tracing::instrument(skip(self, prompt), fields(prompt_len = prompt.len()))]
    pub async fn generate(&self, prompt: &str, params: GenerationParams) -> Result<String> {
        let request = CompletionRequest {
            model: &self.config.model,
            prompt,
            max_tokens: params.max_tokens,
            temperature: params.temperature,
        };

        let response = self
            .authorized(self.client.post(self.config.endpoint("completions")))
            .json(&request)
            .send()
            .await?;
        let completion: CompletionResponse = check_status(response).await?.json().await?;

        let text = completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.text)
            .ok_or(Error::EmptyCompletion)?;

        tracing::debug!(chars = text.len(), "completion received");
        Ok(strip_echoed_prompt(prompt, &text))
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(Error::Status {
        status: status.as_u16(),
        body,
    })
}

/// Drop `prompt` from the start of `text` if the runtime echoed it, then trim.
pub fn strip_echoed_prompt(prompt: &str, text: &str) -> String {
    let body = if prompt.is_empty() {
        text
    } else {
        text.strip_prefix(prompt).unwrap_or(text)
    };
    body.trim().to_string()
}
