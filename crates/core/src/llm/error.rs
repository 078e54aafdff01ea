use crate::llm::Provider;
use serde_json::Value;
use std::fmt;

/// Where a model call broke down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    /// Non-2xx from the provider.
    Http,
    /// 2xx with no usable text.
    Empty,
    /// Text came back but was not an acceptable recommendation.
    Parse,
}

impl FailureStage {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureStage::Http => "http",
            FailureStage::Empty => "empty",
            FailureStage::Parse => "parse",
        }
    }
}

/// Failure of a model call, carrying what the model actually sent back so it can be logged.
#[derive(Debug, Clone)]
pub struct ModelCallError {
    pub provider: Provider,
    pub stage: FailureStage,
    pub detail: String,
    pub raw_output: Option<String>,
    pub raw_body: Option<Value>,
}

impl ModelCallError {
    pub fn new(provider: Provider, stage: FailureStage, detail: impl Into<String>) -> Self {
        Self {
            provider,
            stage,
            detail: detail.into(),
            raw_output: None,
            raw_body: None,
        }
    }

    pub fn with_raw_output(mut self, raw: impl Into<String>) -> Self {
        let raw = raw.into();
        self.raw_body = serde_json::from_str(&raw).ok();
        self.raw_output = Some(raw);
        self
    }
}

impl fmt::Display for ModelCallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} call failed at {}: {}",
            self.provider,
            self.stage.as_str(),
            self.detail
        )
    }
}

impl std::error::Error for ModelCallError {}
