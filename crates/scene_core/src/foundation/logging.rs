//! Logging utilities and structured logging support

pub use log::{debug, error, info, trace, warn};

use crate::core::config::LoggingSettings;

/// Initialize the logging system with an explicit default filter.
///
/// `RUST_LOG` still wins when it is set. Calling this twice is harmless; the
/// second initialization attempt is ignored.
pub fn init_with(settings: &LoggingSettings) {
    let env = env_logger::Env::default().default_filter_or(settings.level.as_str());
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .try_init();
}
