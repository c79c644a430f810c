use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::errors::LlmError;
use crate::models::{DcaInsight, InsightContext};

/// Configuration for the narrative LLM layer.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub enabled: bool,
    pub provider: String,
    pub api_key: Option<String>,
    pub model: String,
    pub max_tokens: usize,
    pub temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: "openai".to_string(),
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            max_tokens: 800,
            temperature: 0.7,
        }
    }
}

impl LlmConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            enabled: std::env::var("LLM_ENABLED")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            provider: std::env::var("LLM_PROVIDER").unwrap_or(defaults.provider),
            api_key: std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty()),
            model: std::env::var("LLM_MODEL").unwrap_or(defaults.model),
            max_tokens: std::env::var("LLM_MAX_TOKENS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_tokens),
            temperature: std::env::var("LLM_TEMPERATURE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.temperature),
        }
    }
}

/// Trait for LLM providers
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate a completion from a prompt
    async fn generate_completion(&self, prompt: String) -> Result<String, LlmError>;
}

/// OpenAI API request/response structures
#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    max_tokens: usize,
    temperature: f32,
}

#[derive(Debug, Serialize, Clone)]
struct OpenAiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponseMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

/// OpenAI provider implementation
pub struct OpenAiProvider {
    api_key: String,
    model: String,
    max_tokens: usize,
    temperature: f32,
    client: Client,
}

impl OpenAiProvider {
    pub fn new(api_key: String, model: String, max_tokens: usize, temperature: f32) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            api_key,
            model,
            max_tokens,
            temperature,
            client,
        }
    }

    async fn call_openai_with_retry(
        &self,
        request: OpenAiRequest,
    ) -> Result<OpenAiResponse, LlmError> {
        let mut retry_count = 0;
        let max_retries = 3;
        let mut delay = Duration::from_secs(1);

        loop {
            match self.call_openai(&request).await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    retry_count += 1;
                    if retry_count >= max_retries {
                        error!("OpenAI API call failed after {} retries: {}", max_retries, e);
                        return Err(e);
                    }

                    warn!(
                        "OpenAI API call failed (attempt {}/{}): {}. Retrying in {:?}...",
                        retry_count, max_retries, e, delay
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2; // Exponential backoff: 1s, 2s, 4s
                }
            }
        }
    }

    async fn call_openai(&self, request: &OpenAiRequest) -> Result<OpenAiResponse, LlmError> {
        let response = self
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout
                } else {
                    LlmError::Network(e.to_string())
                }
            })?;

        let status = response.status();

        if status == 429 {
            return Err(LlmError::RateLimited);
        }

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(LlmError::Api(format!("HTTP {}: {}", status, error_text)));
        }

        response
            .json::<OpenAiResponse>()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn generate_completion(&self, prompt: String) -> Result<String, LlmError> {
        info!(
            "Generating LLM completion (model: {}, max_tokens: {})",
            self.model, self.max_tokens
        );

        let request = OpenAiRequest {
            model: self.model.clone(),
            messages: vec![
                OpenAiMessage {
                    role: "system".to_string(),
                    content: "You are a DCA investing assistant. Explain the month's \
                              allocation in plain language for a retail investor. The \
                              amounts and weights are already decided; never suggest \
                              different numbers and never give buy/sell advice."
                        .to_string(),
                },
                OpenAiMessage {
                    role: "user".to_string(),
                    content: prompt,
                },
            ],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let response = self.call_openai_with_retry(request).await?;

        let content = response
            .choices
            .first()
            .ok_or_else(|| LlmError::InvalidResponse("No choices in response".to_string()))?
            .message
            .content
            .clone();

        if let Some(usage) = response.usage {
            info!(
                "LLM completion generated. Tokens: {} prompt + {} completion = {} total",
                usage.prompt_tokens, usage.completion_tokens, usage.total_tokens
            );
        }

        Ok(content)
    }
}

/// Narrative LLM service with provider abstraction.
pub struct LlmService {
    provider: Option<Arc<dyn LlmProvider>>,
}

impl LlmService {
    pub fn new(config: LlmConfig) -> Self {
        let provider = if config.enabled {
            match (&config.api_key, config.provider.as_str()) {
                (Some(api_key), "openai") => {
                    info!("Initializing LLM service with provider: {}", config.provider);
                    let provider = OpenAiProvider::new(
                        api_key.clone(),
                        config.model.clone(),
                        config.max_tokens,
                        config.temperature,
                    );
                    Some(Arc::new(provider) as Arc<dyn LlmProvider>)
                }
                (Some(_), other) => {
                    warn!("Unknown LLM provider: {}. LLM features disabled.", other);
                    None
                }
                (None, _) => {
                    warn!("LLM API key not configured. LLM features disabled.");
                    None
                }
            }
        } else {
            info!("LLM features are disabled in configuration");
            None
        };

        Self { provider }
    }

    #[cfg(test)]
    pub fn with_provider(provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            provider: Some(provider),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.provider.is_some()
    }

    /// Generate per-symbol insights for one plan. The model is asked for a
    /// strict JSON array; anything unparseable is an `InvalidResponse`.
    pub async fn generate_insights(
        &self,
        contexts: &[InsightContext],
    ) -> Result<Vec<DcaInsight>, LlmError> {
        let provider = self.provider.as_ref().ok_or(LlmError::Disabled)?;

        let prompt = build_insight_prompt(contexts)
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
        let content = provider.generate_completion(prompt).await?;

        parse_insights(&content)
    }
}

fn build_insight_prompt(contexts: &[InsightContext]) -> Result<String, serde_json::Error> {
    let data = serde_json::to_string_pretty(contexts)?;
    Ok(format!(
        "This month's DCA allocation:\n\n{}\n\n\
         For each symbol write one short insight (max 2 sentences) explaining \
         the allocation in plain language, and classify its risk as \"low\", \
         \"medium\" or \"high\".\n\
         Respond with ONLY a JSON array of objects with keys \"symbol\", \
         \"text\" and \"risk_level\". No markdown, no commentary.",
        data
    ))
}

/// Parse the model's reply into insights, tolerating markdown code fences.
fn parse_insights(content: &str) -> Result<Vec<DcaInsight>, LlmError> {
    let trimmed = content.trim();
    let stripped = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|s| s.strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    serde_json::from_str(stripped).map_err(|e| LlmError::InvalidResponse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RiskLevel;

    #[test]
    fn config_is_disabled_by_default() {
        let config = LlmConfig::default();
        assert!(!config.enabled);
        assert_eq!(config.provider, "openai");
        assert_eq!(config.model, "gpt-4o-mini");
    }

    #[test]
    fn service_without_key_is_disabled() {
        let service = LlmService::new(LlmConfig {
            enabled: true,
            api_key: None,
            ..LlmConfig::default()
        });
        assert!(!service.is_enabled());
    }

    #[tokio::test]
    async fn disabled_service_returns_disabled_error() {
        let service = LlmService::new(LlmConfig::default());
        let result = service.generate_insights(&[]).await;
        assert!(matches!(result, Err(LlmError::Disabled)));
    }

    #[test]
    fn parses_plain_json_array() {
        let content = r#"[{"symbol": "VTI", "text": "Broad market core holding.", "risk_level": "low"}]"#;
        let insights = parse_insights(content).unwrap();
        assert_eq!(insights.len(), 1);
        assert_eq!(insights[0].symbol, "VTI");
        assert_eq!(insights[0].risk_level, RiskLevel::Low);
    }

    #[test]
    fn strips_markdown_code_fences() {
        let content = "```json\n[{\"symbol\": \"BND\", \"text\": \"Bond ballast.\"}]\n```";
        let insights = parse_insights(content).unwrap();
        assert_eq!(insights[0].symbol, "BND");
        // risk_level falls back to the default when omitted
        assert_eq!(insights[0].risk_level, RiskLevel::Medium);
    }

    #[test]
    fn rejects_non_json_reply() {
        let result = parse_insights("Sure! Here are your insights:");
        assert!(matches!(result, Err(LlmError::InvalidResponse(_))));
    }

    struct CannedProvider(&'static str);

    #[async_trait]
    impl LlmProvider for CannedProvider {
        async fn generate_completion(&self, _prompt: String) -> Result<String, LlmError> {
            Ok(self.0.to_string())
        }
    }

    #[tokio::test]
    async fn generate_insights_round_trips_through_a_provider() {
        let service = LlmService::with_provider(Arc::new(CannedProvider(
            r#"[{"symbol": "VTI", "text": "Steady core allocation.", "risk_level": "low"}]"#,
        )));

        let insights = service.generate_insights(&[]).await.unwrap();
        assert_eq!(insights.len(), 1);
        assert_eq!(insights[0].symbol, "VTI");
        assert_eq!(insights[0].risk_level, RiskLevel::Low);
    }
}
