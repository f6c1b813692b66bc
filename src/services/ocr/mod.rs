pub mod engine;
pub mod http_engine;
pub mod image_hash;
pub mod parser;
pub mod partition;
pub mod preprocessing;
pub mod registry;
pub mod scheduler;
pub mod standalone;

// Re-export main types
pub use engine::{EngineFactory, EngineParams, RecognitionEngine};
pub use http_engine::{HttpEngineFactory, HttpRecognitionEngine};
pub use image_hash::{DifferenceHasher, HashMatch, ImageHashMatcher, ImageHasher};
pub use parser::parse_match_record;
pub use partition::{partition_regions, Partition, RegionGroup};
pub use preprocessing::{PreprocessingService, RegionBuffer};
pub use registry::{EngineRegistry, SharedEngine};
pub use scheduler::{EnginePool, Scheduler};
pub use standalone::StandaloneRecognizer;
