use serde::{Deserialize, Serialize};

/// Value resolved for one region, by text recognition or portrait matching
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecognitionResult {
    pub region_name: String,
    pub value: String,
    /// 0-100
    pub confidence: f32,
}

impl RecognitionResult {
    pub fn new(region_name: impl Into<String>, value: impl Into<String>, confidence: f32) -> Self {
        Self {
            region_name: region_name.into(),
            value: value.into(),
            confidence: confidence.clamp(0.0, 100.0),
        }
    }

    /// Explicit blank: unknown hash set or no acceptable match
    pub fn blank(region_name: impl Into<String>) -> Self {
        Self::new(region_name, String::new(), 0.0)
    }

    pub fn is_blank(&self) -> bool {
        self.value.is_empty()
    }
}

/// Raw engine output for a single line
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Recognition {
    pub text: String,
    pub confidence: f32,
}

impl Recognition {
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence,
        }
    }

    /// Tag with the originating region, trimming the engine's trailing newline
    pub fn into_result(self, region_name: impl Into<String>) -> RecognitionResult {
        RecognitionResult::new(region_name, self.text.trim(), self.confidence)
    }
}
