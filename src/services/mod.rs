pub mod config;
pub mod diagnostics;
pub mod ocr;
pub mod pipeline;
pub mod store;

pub use config::ConfigManager;
pub use diagnostics::{DebugImageWriter, Diagnostics};
pub use pipeline::{decode_image, PipelineOutput, ScoreboardPipeline, StoredMatch};
pub use store::{InMemoryMatchStore, MatchStore};
