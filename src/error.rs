//! Error types for the scoreboard pipeline.
//!
//! Only pipeline-level failures live here. Region-level problems (an unknown
//! hash set, a weak portrait match, a single failed recognition call) are
//! logged and show up as a blank field instead.

use thiserror::Error;

/// Errors raised by a recognition engine.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The engine could not be created or reached.
    #[error("engine provisioning failed: {0}")]
    Provisioning(String),

    /// The engine rejected its parameters.
    #[error("engine configuration failed: {0}")]
    Configuration(String),

    /// A single recognition call failed.
    #[error("recognition failed: {0}")]
    Recognition(String),

    /// The request to the OCR server failed.
    #[error("transport")]
    Transport(#[source] reqwest::Error),
}

/// Errors that abort a whole pipeline invocation.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The pipeline configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The source image could not be decoded.
    #[error("image decode")]
    ImageDecode(#[source] image::ImageError),

    /// A region does not fit inside the source image.
    #[error("region '{name}' ({x},{y} {width}x{height}) is outside the {image_width}x{image_height} image")]
    RegionOutOfBounds {
        name: String,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        image_width: u32,
        image_height: u32,
    },

    /// Two regions share a name.
    #[error("duplicate region name: {0}")]
    DuplicateRegion(String),

    /// A recognition engine could not be provisioned.
    #[error("recognition engine unavailable")]
    EngineProvisioning(#[source] EngineError),

    /// The match store rejected the record.
    #[error("match store: {0}")]
    Store(String),

    /// A background task panicked or was aborted.
    #[error("task failed: {0}")]
    Task(String),
}

pub type PipelineResult<T> = Result<T, PipelineError>;
