pub mod error;
pub mod gemini;
pub mod json;
pub mod prompt;
pub mod speech;

use crate::domain::query::ImagePayload;
use crate::domain::recommendation::GroundingSource;

#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub prompt: String,
    pub image: Option<ImagePayload>,
    pub enable_search_grounding: bool,
}

/// Raw model output. `text` is untrusted and may be wrapped in code fences.
#[derive(Debug, Clone, Default)]
pub struct ModelResponse {
    pub text: String,
    pub sources: Vec<GroundingSource>,
}

#[derive(Debug, Clone, Copy)]
pub enum Provider {
    Gemini,
}

#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    fn provider(&self) -> Provider;

    async fn generate_analysis(&self, request: AnalysisRequest) -> anyhow::Result<ModelResponse>;
}

#[derive(Debug, Clone)]
pub struct SpeechRequest {
    pub text: String,
    pub voice_language_hint: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechAudio {
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
}

#[async_trait::async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, request: SpeechRequest) -> anyhow::Result<SpeechAudio>;
}
