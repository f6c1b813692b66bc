use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use chrono::Local;
use image::DynamicImage;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::models::config::DiagnosticsConfig;
use crate::models::recognition::RecognitionResult;
use crate::services::ocr::preprocessing::RegionBuffer;

/// Human-readable view of one recognition pass. Display only.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct Diagnostics {
    /// `"<regionName> (<confidence>%): <value>"`, sorted by region name
    pub lines: Vec<String>,
    /// Region name → recognized value
    pub raw: HashMap<String, String>,
    /// Region name → confidence (0-100)
    pub confidences: HashMap<String, f32>,
}

impl Diagnostics {
    pub fn from_results(results: &[RecognitionResult]) -> Self {
        let mut sorted: Vec<&RecognitionResult> = results.iter().collect();
        sorted.sort_by(|a, b| a.region_name.cmp(&b.region_name));

        Self {
            lines: sorted.iter().map(|r| format_line(r)).collect(),
            raw: results
                .iter()
                .map(|r| (r.region_name.clone(), r.value.clone()))
                .collect(),
            confidences: results
                .iter()
                .map(|r| (r.region_name.clone(), r.confidence))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// `blue_player1_e (97%): 27`
pub fn format_line(result: &RecognitionResult) -> String {
    format!(
        "{} ({:.0}%): {}",
        result.region_name, result.confidence, result.value
    )
}

/// Grayscale with boosted contrast, for showing what was scanned
pub fn preview_image(image: &DynamicImage, contrast: f32) -> DynamicImage {
    let gray = image.to_luma8();
    DynamicImage::ImageLuma8(image::imageops::contrast(&gray, contrast))
}

/// Writes the preview and every region crop to a timestamped directory
pub struct DebugImageWriter {
    base_dir: PathBuf,
}

impl DebugImageWriter {
    /// `None` when debug images are disabled
    pub fn from_config(config: &DiagnosticsConfig) -> Option<Self> {
        if !config.save_debug_images {
            return None;
        }

        let base_dir = config
            .debug_dir
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| std::env::temp_dir().join("scoreboard-reader-debug"));

        Some(Self { base_dir })
    }

    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Save everything for one run. Failures are logged, never returned.
    /// Returns the run directory when it could be created.
    pub fn write(&self, preview: &DynamicImage, regions: &[RegionBuffer]) -> Option<PathBuf> {
        let timestamp = Local::now().format("%Y%m%d_%H%M%S%.3f").to_string();
        let run_dir = self.base_dir.join(timestamp);

        if let Err(e) = fs::create_dir_all(&run_dir) {
            warn!("Failed to create debug directory {:?}: {}", run_dir, e);
            return None;
        }

        if let Err(e) = preview.save(run_dir.join("preview.png")) {
            warn!("Failed to save debug preview: {}", e);
        }

        let mut saved = 0;
        for region in regions {
            let path = run_dir.join(format!("{}.png", sanitize_file_name(&region.name)));
            match region.image.save(&path) {
                Ok(()) => saved += 1,
                Err(e) => debug!("Failed to save debug crop '{}': {}", region.name, e),
            }
        }

        info!("Saved {} debug region images to {:?}", saved, run_dir);
        Some(run_dir)
    }
}

fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect()
}
