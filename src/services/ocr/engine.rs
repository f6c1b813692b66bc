use async_trait::async_trait;
use image::DynamicImage;

use crate::error::EngineError;
use crate::models::config::PageSegMode;
use crate::models::recognition::Recognition;

/// Per-group engine parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineParams {
    /// Allowed characters; empty means no restriction
    pub whitelist: String,
    pub page_seg_mode: PageSegMode,
}

impl EngineParams {
    pub fn single_line(whitelist: impl Into<String>) -> Self {
        Self {
            whitelist: whitelist.into(),
            page_seg_mode: PageSegMode::SingleLine,
        }
    }
}

/// OCR engine capability - abstraction for different recognizer backends
#[async_trait]
pub trait RecognitionEngine: Send {
    /// Swap whitelist and segmentation mode for subsequent calls
    async fn configure(&mut self, params: &EngineParams) -> Result<(), EngineError>;

    /// Recognize a single line of text from an already cropped region
    async fn recognize(&mut self, image: &DynamicImage) -> Result<Recognition, EngineError>;

    /// Release the engine. Called exactly once; no calls follow.
    async fn terminate(&mut self);
}

/// Creates engines; creation may be slow (model load, server handshake)
#[async_trait]
pub trait EngineFactory: Send + Sync {
    async fn create(&self) -> Result<Box<dyn RecognitionEngine>, EngineError>;
}
