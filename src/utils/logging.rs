use tracing::Level;

use crate::models::config::LoggingConfig;

/// Install the global fmt subscriber, plain or JSON.
///
/// Unknown level names fall back to `info`. Returns `false` when a subscriber
/// was already installed, in which case nothing changes.
pub fn init_tracing(config: &LoggingConfig) -> bool {
    let level = parse_level(&config.level);

    let installed = if config.json {
        tracing_subscriber::fmt()
            .json()
            .with_max_level(level)
            .with_target(true)
            .try_init()
    } else {
        tracing_subscriber::fmt()
            .with_max_level(level)
            .with_target(false)
            .try_init()
    };

    installed.is_ok()
}

pub fn parse_level(name: &str) -> Level {
    name.trim().parse::<Level>().unwrap_or(Level::INFO)
}
