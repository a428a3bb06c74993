use std::collections::HashMap;
use async_trait::async_trait;
use rig::completion::Prompt;
use serde_json::json;
use tracing::debug;

use crate::error::{AutoSwaggerError, Result};
use crate::config::LlmConfig;
use super::documenter::{CompletionRequest, CompletionResponse, LlmDocumenter};

const HUGGINGFACE_ROUTER: &str = "https://router.huggingface.co/v1";
const OLLAMA_LOCAL: &str = "http://localhost:11434/v1";

/// Factory function to create the appropriate LLM documenter based on config
pub fn create_documenter(config: &LlmConfig) -> Result<Box<dyn LlmDocumenter>> {
    match config.provider.as_str() {
        "openai" => Ok(Box::new(RigProvider::new(config)?)),
        "huggingface" | "openai-compatible" | "ollama" => Ok(Box::new(HttpProvider::new(config)?)),
        _ => Err(AutoSwaggerError::Config(format!(
            "Unsupported LLM provider: {}",
            config.provider
        ))),
    }
}

/// OpenAI models through rig-core
pub struct RigProvider {
    config: LlmConfig,
    client: rig::providers::openai::Client,
}

impl RigProvider {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = config.resolve_api_key().ok_or_else(|| {
            AutoSwaggerError::Config(format!(
                "API key required for OpenAI (set llm.api_key or {})",
                config.api_key_env
            ))
        })?;

        let client = match &config.base_url {
            Some(url) => rig::providers::openai::Client::from_url(&api_key, url),
            None => rig::providers::openai::Client::new(&api_key),
        };

        Ok(Self {
            config: config.clone(),
            client,
        })
    }
}

#[async_trait]
impl LlmDocumenter for RigProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let agent = self
            .client
            .agent(&self.config.model)
            .preamble(&request.system_prompt)
            .temperature(self.config.temperature as f64)
            .max_tokens(self.config.max_tokens as u64)
            .build();

        let content = agent
            .prompt(request.user_prompt.as_str())
            .await
            .map_err(|e| AutoSwaggerError::Llm(format!("OpenAI request failed: {}", e)))?;

        let mut metadata = HashMap::new();
        metadata.insert("provider".to_string(), "OpenAI".to_string());
        metadata.insert("model".to_string(), self.config.model.clone());

        Ok(CompletionResponse { content, metadata })
    }

    fn provider_name(&self) -> &str {
        "OpenAI via Rig"
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

/// Any OpenAI-style `/chat/completions` endpoint: Hugging Face router, vLLM, Ollama
pub struct HttpProvider {
    config: LlmConfig,
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpProvider {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = config.resolve_api_key();
        if api_key.is_none() && config.provider == "huggingface" {
            return Err(AutoSwaggerError::Config(format!(
                "API key required for Hugging Face (set llm.api_key or {})",
                config.api_key_env
            )));
        }

        let base_url = match (&config.base_url, config.provider.as_str()) {
            (Some(url), _) => url.trim_end_matches('/').to_string(),
            (None, "huggingface") => HUGGINGFACE_ROUTER.to_string(),
            (None, "ollama") => OLLAMA_LOCAL.to_string(),
            (None, _) => {
                return Err(AutoSwaggerError::Config(
                    "llm.base_url is required for openai-compatible providers".to_string(),
                ))
            }
        };

        Ok(Self {
            config: config.clone(),
            client: reqwest::Client::new(),
            base_url,
            api_key,
        })
    }
}

#[async_trait]
impl LlmDocumenter for HttpProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let payload = json!({
            "model": self.config.model,
            "messages": [
                {
                    "role": "system",
                    "content": request.system_prompt
                },
                {
                    "role": "user",
                    "content": request.user_prompt
                }
            ],
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
            "top_p": self.config.top_p
        });

        let mut call = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Content-Type", "application/json")
            .json(&payload);
        if let Some(key) = &self.api_key {
            call = call.header("Authorization", format!("Bearer {}", key));
        }

        let response = call.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AutoSwaggerError::Llm(format!(
                "{} API error {}: {}",
                self.provider_name(),
                status,
                error_text
            )));
        }

        let response_data: serde_json::Value = response.json().await?;

        let content = response_data["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| AutoSwaggerError::Llm("Response has no message content".to_string()))?
            .to_string();

        let mut metadata = HashMap::new();
        metadata.insert("provider".to_string(), self.provider_name().to_string());
        metadata.insert("model".to_string(), self.config.model.clone());
        if let Some(usage) = response_data.get("usage") {
            metadata.insert("tokens_used".to_string(), usage["total_tokens"].to_string());
        }
        debug!("Completion metadata: {:?}", metadata);

        Ok(CompletionResponse { content, metadata })
    }

    fn provider_name(&self) -> &str {
        match self.config.provider.as_str() {
            "huggingface" => "Hugging Face router",
            "ollama" => "Ollama",
            _ => "OpenAI-compatible endpoint",
        }
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(provider: &str) -> LlmConfig {
        LlmConfig {
            provider: provider.to_string(),
            api_key_env: "AUTO_SWAGGER_TEST_UNSET_VAR".to_string(),
            ..LlmConfig::default()
        }
    }

    #[test]
    fn test_unknown_provider_rejected() {
        assert!(matches!(
            create_documenter(&config("carrier-pigeon")),
            Err(AutoSwaggerError::Config(_))
        ));
    }

    #[test]
    fn test_huggingface_requires_key() {
        assert!(create_documenter(&config("huggingface")).is_err());

        let mut with_key = config("huggingface");
        with_key.api_key = Some("hf_test".to_string());
        let documenter = create_documenter(&with_key).unwrap();
        assert_eq!(documenter.provider_name(), "Hugging Face router");
        assert_eq!(documenter.model_name(), "deepseek-ai/deepseek-coder-1.3b-instruct");
    }

    #[test]
    fn test_ollama_needs_no_key() {
        let provider = HttpProvider::new(&config("ollama")).unwrap();
        assert_eq!(provider.base_url, OLLAMA_LOCAL);
        assert!(provider.api_key.is_none());
    }

    #[test]
    fn test_compatible_provider_needs_base_url() {
        assert!(HttpProvider::new(&config("openai-compatible")).is_err());

        let mut with_url = config("openai-compatible");
        with_url.base_url = Some("http://gpu-box:8000/v1/".to_string());
        let provider = HttpProvider::new(&with_url).unwrap();
        assert_eq!(provider.base_url, "http://gpu-box:8000/v1");
    }

    #[test]
    fn test_openai_requires_key() {
        assert!(create_documenter(&config("openai")).is_err());
    }
}
