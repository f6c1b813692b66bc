use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::engine::{EngineFactory, EngineParams, RecognitionEngine};
use crate::error::EngineError;
use crate::models::config::EngineConfig;
use crate::models::recognition::Recognition;

#[derive(Serialize)]
struct LineRequest<'a> {
    image_base64: String,
    whitelist: &'a str,
    psm: u8,
    lang: &'a str,
}

/// Single text box with bounding box coordinates
#[derive(Deserialize, Clone, Debug)]
struct TextBox {
    #[serde(rename = "box")]
    bbox: Vec<Vec<f64>>, // 4 corner points [[x1,y1], [x2,y2], [x3,y3], [x4,y4]]
    text: String,
    score: f64,
}

#[derive(Deserialize)]
struct OcrResponse {
    boxes: Vec<TextBox>,
}

impl TextBox {
    /// Get bounding box as (x_min, y_min, x_max, y_max)
    fn get_bbox_rect(&self) -> (f64, f64, f64, f64) {
        let xs = self.bbox.iter().filter_map(|p| p.first().copied());
        let ys = self.bbox.iter().filter_map(|p| p.get(1).copied());

        let (x_min, x_max) = xs.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
        let (y_min, y_max) = ys.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });

        (x_min, y_min, x_max, y_max)
    }

    /// Intersection over union with another box
    fn iou(&self, other: &TextBox) -> f64 {
        let (x1_min, y1_min, x1_max, y1_max) = self.get_bbox_rect();
        let (x2_min, y2_min, x2_max, y2_max) = other.get_bbox_rect();

        let inter_x_min = x1_min.max(x2_min);
        let inter_y_min = y1_min.max(y2_min);
        let inter_x_max = x1_max.min(x2_max);
        let inter_y_max = y1_max.min(y2_max);

        if inter_x_max <= inter_x_min || inter_y_max <= inter_y_min {
            return 0.0;
        }

        let inter_area = (inter_x_max - inter_x_min) * (inter_y_max - inter_y_min);
        let union_area = self.area() + other.area() - inter_area;

        if union_area <= 0.0 {
            return 0.0;
        }

        inter_area / union_area
    }

    fn left_x(&self) -> f64 {
        self.get_bbox_rect().0
    }

    fn area(&self) -> f64 {
        let (x_min, y_min, x_max, y_max) = self.get_bbox_rect();
        (x_max - x_min) * (y_max - y_min)
    }
}

/// Drop boxes overlapping a larger one by more than `iou_threshold`
fn filter_overlapping_boxes(boxes: Vec<TextBox>, iou_threshold: f64) -> Vec<TextBox> {
    let mut remaining = boxes;
    // Ascending, so pop() yields the largest first
    remaining.sort_by(|a, b| a.area().partial_cmp(&b.area()).unwrap_or(std::cmp::Ordering::Equal));

    let mut filtered: Vec<TextBox> = Vec::new();
    while let Some(current) = remaining.pop() {
        remaining.retain(|other| current.iou(other) <= iou_threshold);
        filtered.push(current);
    }

    filtered
}

/// Filter overlaps, sort left-to-right, join into one line.
/// Confidence is the mean box score on a 0-100 scale.
fn process_ocr_boxes(boxes: Vec<TextBox>) -> Recognition {
    if boxes.is_empty() {
        return Recognition::new(String::new(), 0.0);
    }

    let mut filtered = filter_overlapping_boxes(boxes, 0.3);
    filtered.sort_by(|a, b| a.left_x().partial_cmp(&b.left_x()).unwrap_or(std::cmp::Ordering::Equal));

    let text = filtered.iter().map(|b| b.text.as_str()).collect::<Vec<_>>().join("");
    let mean = filtered.iter().map(|b| b.score).sum::<f64>() / filtered.len() as f64;

    Recognition::new(text, normalize_confidence(mean))
}

/// Servers report either 0-1 or 0-100
fn normalize_confidence(score: f64) -> f32 {
    let score = if score <= 1.0 { score * 100.0 } else { score };
    score.clamp(0.0, 100.0) as f32
}

/// Keep only whitelisted characters (spaces always pass)
fn apply_whitelist(text: &str, whitelist: &str) -> String {
    if whitelist.is_empty() {
        return text.to_string();
    }
    text.chars()
        .filter(|c| *c == ' ' || whitelist.contains(*c))
        .collect()
}

/// Encode image to base64 PNG
fn encode_image(image: &DynamicImage) -> Result<String, EngineError> {
    let mut buffer = Vec::new();
    image
        .write_to(&mut std::io::Cursor::new(&mut buffer), image::ImageFormat::Png)
        .map_err(|e| EngineError::Recognition(format!("Failed to encode image: {}", e)))?;
    Ok(general_purpose::STANDARD.encode(&buffer))
}

/// Recognition engine backed by the local OCR server
pub struct HttpRecognitionEngine {
    client: reqwest::Client,
    base_url: String,
    language: String,
    params: EngineParams,
    terminated: bool,
}

impl HttpRecognitionEngine {
    /// Connect and verify the server answers its health check
    pub async fn connect(config: &EngineConfig) -> Result<Self, EngineError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EngineError::Provisioning(format!("Failed to create HTTP client: {}", e)))?;

        let engine = Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            language: config.language.clone(),
            params: EngineParams::single_line(""),
            terminated: false,
        };
        engine.health_check().await?;

        Ok(engine)
    }

    /// Check if server is healthy
    pub async fn health_check(&self) -> Result<(), EngineError> {
        let url = format!("{}/health", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| EngineError::Provisioning(format!("Health check failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(EngineError::Provisioning(format!(
                "OCR server unhealthy: {}",
                response.status()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl RecognitionEngine for HttpRecognitionEngine {
    async fn configure(&mut self, params: &EngineParams) -> Result<(), EngineError> {
        if self.terminated {
            return Err(EngineError::Configuration("Engine already terminated".to_string()));
        }
        self.params = params.clone();
        Ok(())
    }

    async fn recognize(&mut self, image: &DynamicImage) -> Result<Recognition, EngineError> {
        if self.terminated {
            return Err(EngineError::Recognition("Engine already terminated".to_string()));
        }

        let request = LineRequest {
            image_base64: encode_image(image)?,
            whitelist: &self.params.whitelist,
            psm: self.params.page_seg_mode.as_psm(),
            lang: &self.language,
        };
        let url = format!("{}/ocr", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(EngineError::Transport)?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(EngineError::Recognition(format!("OCR server error: {}", error_text)));
        }

        let data: OcrResponse = response.json().await.map_err(EngineError::Transport)?;

        let mut recognition = process_ocr_boxes(data.boxes);
        recognition.text = apply_whitelist(&recognition.text, &self.params.whitelist);
        Ok(recognition)
    }

    async fn terminate(&mut self) {
        self.terminated = true;
    }
}

/// Creates one HTTP engine per call
#[derive(Debug, Clone)]
pub struct HttpEngineFactory {
    config: EngineConfig,
}

impl HttpEngineFactory {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl EngineFactory for HttpEngineFactory {
    async fn create(&self) -> Result<Box<dyn RecognitionEngine>, EngineError> {
        let engine = HttpRecognitionEngine::connect(&self.config).await?;
        Ok(Box::new(engine))
    }
}
