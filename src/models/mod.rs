pub mod config;
pub mod hash_set;
pub mod match_record;
pub mod recognition;
pub mod region;

pub use config::PipelineConfig;
pub use hash_set::{HashEntry, HashLibrary, ImageHash, ImageHashSet};
pub use match_record::{FinalScore, MatchInfo, MatchRecord, PlayerStats, Team, TEAM_SIZE};
pub use recognition::{Recognition, RecognitionResult};
pub use region::{resolve_regions, Region, Resolution};
