use async_trait::async_trait;
use radar_core::CoreError;

/// Token accounting reported by a provider for one call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_units: u64,
    pub completion_units: u64,
}

/// One completed generation.
#[derive(Debug, Clone)]
pub struct Generation {
    pub text: String,
    pub usage: Option<TokenUsage>,
}

/// The text-classifier collaborator: prompt in, generated text out.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<Generation, CoreError>;

    fn model_name(&self) -> &str;
}
