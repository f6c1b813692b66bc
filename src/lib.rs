//! Scoreboard screenshot reader.
//!
//! Crops named regions out of a scoreboard screenshot, resolves each one by
//! text recognition or hero-portrait hash matching, and parses the results
//! into a [`MatchRecord`].

pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use error::{EngineError, PipelineError, PipelineResult};
pub use models::{
    FinalScore, HashEntry, HashLibrary, ImageHash, ImageHashSet, MatchInfo, MatchRecord,
    PipelineConfig, PlayerStats, RecognitionResult, Region, Resolution, Team,
};
pub use services::ocr::{EngineFactory, EngineParams, RecognitionEngine};
pub use services::{
    decode_image, ConfigManager, Diagnostics, InMemoryMatchStore, MatchStore, PipelineOutput,
    ScoreboardPipeline, StoredMatch,
};
pub use utils::{init_tracing, CancellationFlag, ProgressCounter};
