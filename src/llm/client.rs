use std::time::Duration;

use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use super::types::{
    ApiError, ChatCompletionRequest, ChatCompletionResponse, ChatMessage, ErrorEnvelope,
    extract_text,
};
use crate::config::LlmConfig;
use crate::retry::RetryPolicy;

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("model API rate limit exceeded")]
    RateLimited,

    #[error("model API quota exhausted: {0}")]
    QuotaExhausted(String),

    #[error("model API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("model returned an empty response")]
    EmptyResponse,

    #[error("malformed model response: {0}")]
    Malformed(String),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// A hosted text-completion model.
/// Implemented by `OpenAiClient` for production; mock implementations used in tests.
pub trait CompletionClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError>;
}

/// Client for OpenAI-compatible `/chat/completions` endpoints.
#[derive(Clone)]
pub struct OpenAiClient {
    http: Client,
    config: LlmConfig,
    request_timeout: Duration,
    retry: RetryPolicy,
}

impl OpenAiClient {
    pub fn new(
        http: Client,
        config: LlmConfig,
        request_timeout: Duration,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            http,
            config,
            request_timeout,
            retry,
        }
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    async fn chat(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let request = ChatCompletionRequest {
            model: &self.config.model,
            messages,
            temperature: self.config.temperature,
        };

        let response = self
            .http
            .post(&url)
            .bearer_auth(self.config.api_key.expose())
            .header("User-Agent", crate::USER_AGENT)
            .json(&request)
            .timeout(self.request_timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let classified = match serde_json::from_str::<ErrorEnvelope>(&text) {
                Ok(body) => classify_api_error(status, &body.error),
                Err(_) if status == StatusCode::TOO_MANY_REQUESTS => LlmError::RateLimited,
                Err(_) => {
                    let end = text.floor_char_boundary(200);
                    LlmError::Api {
                        code: status.as_u16(),
                        message: format!("HTTP {status}: {}", &text[..end]),
                    }
                }
            };
            warn!(status = %status, error = %classified, "model API error");
            return Err(classified);
        }

        let text = response.text().await?;
        let body: ChatCompletionResponse = serde_json::from_str(&text).map_err(|e| {
            warn!(error = %e, "model response is not valid JSON");
            LlmError::Malformed(e.to_string())
        })?;
        if let Some(err) = &body.error {
            let classified = classify_api_error(status, err);
            warn!(error = %classified, "model API error in 200 response");
            return Err(classified);
        }

        let text = extract_text(&body).ok_or_else(|| {
            warn!("model returned no usable content");
            LlmError::EmptyResponse
        })?;
        debug!(model = %self.config.model, chars = text.len(), "completion received");
        Ok(text)
    }
}

impl CompletionClient for OpenAiClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        self.retry.run(is_retriable, || self.chat(messages)).await
    }
}

fn is_retriable(e: &LlmError) -> bool {
    match e {
        LlmError::RateLimited => true,
        LlmError::Api { code, .. } => (500..=599).contains(code),
        LlmError::Network(err) => err.is_timeout() || err.is_connect(),
        _ => false,
    }
}

fn classify_api_error(status: StatusCode, err: &ApiError) -> LlmError {
    let message = err
        .message
        .clone()
        .unwrap_or_else(|| "Unknown error".to_string());

    if err.code_str() == Some("insufficient_quota") {
        return LlmError::QuotaExhausted(message);
    }
    match status.as_u16() {
        429 => LlmError::RateLimited,
        401 => LlmError::Api {
            code: 401,
            message: format!("{message} (check OPENAI_API_KEY)"),
        },
        code => LlmError::Api { code, message },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_error(code: Option<&str>, message: &str) -> ApiError {
        ApiError {
            message: Some(message.into()),
            code: code.map(|c| serde_json::Value::String(c.into())),
        }
    }

    #[test]
    fn classify_429_as_rate_limited() {
        let err = api_error(Some("rate_limit_exceeded"), "slow down");
        assert!(matches!(
            classify_api_error(StatusCode::TOO_MANY_REQUESTS, &err),
            LlmError::RateLimited
        ));
    }

    #[test]
    fn classify_insufficient_quota_as_quota_exhausted() {
        let err = api_error(Some("insufficient_quota"), "You exceeded your current quota");
        assert!(matches!(
            classify_api_error(StatusCode::TOO_MANY_REQUESTS, &err),
            LlmError::QuotaExhausted(_)
        ));
    }

    #[test]
    fn classify_401_hints_key() {
        let err = api_error(None, "Incorrect API key provided");
        let classified = classify_api_error(StatusCode::UNAUTHORIZED, &err);
        assert!(classified.to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn server_errors_are_retriable_client_errors_are_not() {
        assert!(is_retriable(&LlmError::Api {
            code: 503,
            message: String::new()
        }));
        assert!(is_retriable(&LlmError::RateLimited));
        assert!(!is_retriable(&LlmError::Api {
            code: 400,
            message: String::new()
        }));
        assert!(!is_retriable(&LlmError::QuotaExhausted(String::new())));
        assert!(!is_retriable(&LlmError::EmptyResponse));
        assert!(!is_retriable(&LlmError::Malformed(String::new())));
    }
}
