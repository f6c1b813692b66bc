use serde::{Deserialize, Serialize};
use crate::models::region::Resolution;

/// Page segmentation mode sent to the recognition engine
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PageSegMode {
    SingleLine,
    SingleWord,
    SingleBlock,
}

impl Default for PageSegMode {
    fn default() -> Self {
        Self::SingleLine
    }
}

impl PageSegMode {
    /// Tesseract `--psm` number
    pub fn as_psm(&self) -> u8 {
        match self {
            Self::SingleBlock => 6,
            Self::SingleLine => 7,
            Self::SingleWord => 8,
        }
    }
}

/// How text regions are split between the engine pool and the shared engine
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecognitionConfig {
    /// Groups with more regions than this use a pool
    pub large_group_threshold: usize,
    pub pool_size: usize,
    pub page_seg_mode: PageSegMode,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            large_group_threshold: 3,
            pool_size: 2,
            page_seg_mode: PageSegMode::SingleLine,
        }
    }
}

/// Image preprocessing configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PreprocessingConfig {
    /// Shear angle for italic regions
    pub italic_angle_degrees: f64,
    /// Gray level for pixels the shear leaves uncovered
    pub fill_gray: u8,
    /// Contrast boost for the diagnostic preview
    pub preview_contrast: f32,
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        Self {
            italic_angle_degrees: -14.0,
            fill_gray: 128,
            preview_contrast: 30.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageHashConfig {
    /// Side of the reduced grid; the hash is `hash_size²` bits wide
    pub hash_size: u32,
    /// Matches below this confidence are reported as blank
    pub min_confidence: f32,
}

impl Default for ImageHashConfig {
    fn default() -> Self {
        Self {
            hash_size: 8,
            min_confidence: 90.0,
        }
    }
}

/// OCR server connection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub language: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:39835".to_string(),
            timeout_secs: 5,
            language: "eng".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct DiagnosticsConfig {
    pub save_debug_images: bool,
    /// Defaults to the system temp dir when unset
    pub debug_dir: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Complete pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineConfig {
    #[serde(default)]
    pub recognition: RecognitionConfig,
    #[serde(default)]
    pub preprocessing: PreprocessingConfig,
    #[serde(default)]
    pub image_hash: ImageHashConfig,
    #[serde(default = "default_reference_resolution")]
    pub reference_resolution: Resolution,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_reference_resolution() -> Resolution {
    Resolution::new(2560, 1440)
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            recognition: RecognitionConfig::default(),
            preprocessing: PreprocessingConfig::default(),
            image_hash: ImageHashConfig::default(),
            reference_resolution: default_reference_resolution(),
            engine: EngineConfig::default(),
            diagnostics: DiagnosticsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.recognition.pool_size == 0 {
            return Err("Engine pool size must be at least 1".to_string());
        }

        if self.image_hash.hash_size < 2 {
            return Err(format!("Hash size {} is too small (minimum 2)", self.image_hash.hash_size));
        }

        if !(0.0..=100.0).contains(&self.image_hash.min_confidence) {
            return Err(format!(
                "Hash match confidence {} out of valid range (0-100)",
                self.image_hash.min_confidence
            ));
        }

        if self.reference_resolution.width == 0 || self.reference_resolution.height == 0 {
            return Err("Reference resolution must be non-zero".to_string());
        }

        Ok(())
    }
}
