//! HTTP client for the Gemini generative-language API.

use super::types::{
    ApiErrorResponse, Content, GenerateContentRequest, GenerateContentResponse, SystemInstruction,
};
use crate::error::{ConfigError, ConfigResult, GenerateError, GenerateResult};
use std::sync::Arc;
use std::time::Duration;

/// Default API base URL.
pub const GEMINI_API_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 90;

/// Client for the `generateContent` endpoint of one model.
///
/// Cheap to clone; all clones share the underlying HTTP connection pool.
#[derive(Clone)]
pub struct GeminiClient {
    http_client: reqwest::Client,
    api_key: Arc<str>,
    base_url: Arc<str>,
    model: Arc<str>,
    system_instruction: Option<Arc<str>>,
    timeout_secs: u64,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl GeminiClient {
    /// Create a new client builder.
    #[must_use]
    pub fn builder() -> GeminiClientBuilder {
        GeminiClientBuilder::default()
    }

    /// The model this client generates with.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send the full conversation (ending with the new user query) and return
    /// the raw response.
    ///
    /// # Errors
    ///
    /// Maps transport problems to [`GenerateError::Transport`], request
    /// deadline overruns to [`GenerateError::Timeout`], non-success statuses
    /// to [`GenerateError::Api`] and undecodable bodies to
    /// [`GenerateError::InvalidResponse`].
    pub async fn generate(&self, contents: Vec<Content>) -> GenerateResult<GenerateContentResponse> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        let request = GenerateContentRequest {
            system_instruction: self
                .system_instruction
                .as_deref()
                .map(SystemInstruction::new),
            contents,
        };

        let response = self
            .http_client
            .post(&url)
            .header("x-goog-api-key", &*self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.map_transport_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ApiErrorResponse>()
                .await
                .map(|body| body.error.message)
                .unwrap_or_else(|_| status.to_string());
            return Err(GenerateError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<GenerateContentResponse>()
            .await
            .map_err(|e| GenerateError::InvalidResponse(e.to_string()))
    }

    fn map_transport_error(&self, err: &reqwest::Error) -> GenerateError {
        if err.is_timeout() {
            GenerateError::Timeout(self.timeout_secs)
        } else {
            GenerateError::Transport(err.to_string())
        }
    }
}

/// Builder for [`GeminiClient`].
#[derive(Debug, Default)]
pub struct GeminiClientBuilder {
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    system_instruction: Option<String>,
    timeout_secs: Option<u64>,
}

impl GeminiClientBuilder {
    /// Set the API key (required).
    #[must_use]
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set a custom base URL.
    #[must_use]
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Set the model id (required), e.g. "gemini-1.5-flash-latest".
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the system instruction attached to every request.
    #[must_use]
    pub fn system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    /// Set the request timeout in seconds.
    #[must_use]
    pub const fn timeout_secs(mut self, timeout: u64) -> Self {
        self.timeout_secs = Some(timeout);
        self
    }

    /// Build the client.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Missing`] when the API key or model id is absent, and
    /// [`ConfigError::Invalid`] when the HTTP client cannot be constructed.
    pub fn build(self) -> ConfigResult<GeminiClient> {
        let api_key = self
            .api_key
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ConfigError::missing("gemini api key"))?;
        let model = self
            .model
            .filter(|m| !m.is_empty())
            .ok_or_else(|| ConfigError::missing("gemini model"))?;
        let base_url = self
            .base_url
            .unwrap_or_else(|| GEMINI_API_BASE_URL.to_string());
        let timeout_secs = self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ConfigError::invalid(format!("http client: {e}")))?;

        Ok(GeminiClient {
            http_client,
            api_key: api_key.into(),
            base_url: base_url.into(),
            model: model.into(),
            system_instruction: self.system_instruction.map(Into::into),
            timeout_secs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let client = GeminiClient::builder()
            .api_key("test-key")
            .model("gemini-1.5-flash-latest")
            .build()
            .unwrap();
        assert_eq!(&*client.base_url, GEMINI_API_BASE_URL);
        assert_eq!(client.model(), "gemini-1.5-flash-latest");
        assert_eq!(client.timeout_secs, 90);
    }

    #[test]
    fn test_builder_custom_base_url() {
        let client = GeminiClient::builder()
            .api_key("test-key")
            .model("gemini-1.5-pro")
            .base_url("http://localhost:9090")
            .timeout_secs(5)
            .build()
            .unwrap();
        assert_eq!(&*client.base_url, "http://localhost:9090");
        assert_eq!(client.timeout_secs, 5);
    }

    #[test]
    fn test_builder_requires_api_key_and_model() {
        assert!(matches!(
            GeminiClient::builder().model("m").build(),
            Err(ConfigError::Missing(_))
        ));
        assert!(matches!(
            GeminiClient::builder().api_key("k").build(),
            Err(ConfigError::Missing(_))
        ));
        assert!(matches!(
            GeminiClient::builder().api_key("").model("m").build(),
            Err(ConfigError::Missing(_))
        ));
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let client = GeminiClient::builder()
            .api_key("super-secret")
            .model("gemini-1.5-flash-latest")
            .build()
            .unwrap();
        let debug = format!("{client:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
