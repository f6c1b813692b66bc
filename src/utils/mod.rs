pub mod cancellation;
pub mod logging;

pub use cancellation::{CancellationFlag, ProgressCounter};
pub use logging::init_tracing;
