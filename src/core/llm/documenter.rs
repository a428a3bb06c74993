use std::collections::HashMap;

use crate::error::Result;

/// Prompt pair sent to the model
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Fixed instructions describing the reply format
    pub system_prompt: String,

    /// Rendered route contexts
    pub user_prompt: String,
}

/// Raw model reply
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    /// Text exactly as returned by the provider
    pub content: String,

    /// Provider-specific details (model, token usage)
    pub metadata: HashMap<String, String>,
}

/// Trait for LLM providers that can write route documentation
#[async_trait::async_trait]
pub trait LlmDocumenter: Send + Sync {
    /// Send a prompt and return the completion text
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;

    /// Get the provider name (e.g., "OpenAI via Rig", "Hugging Face router")
    fn provider_name(&self) -> &str;

    /// Get the model name being used
    fn model_name(&self) -> &str;
}
