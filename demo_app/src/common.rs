//! Settings loading shared by the demo binaries

use scene_core::config::Config;
use scene_core::core::EngineSettings;
use scene_core::foundation::logging;

/// Load settings from the first command line argument, if any, and start
/// logging with them
pub fn init() -> EngineSettings {
    let settings = match std::env::args().nth(1) {
        Some(path) => match EngineSettings::load_from_file(&path) {
            Ok(settings) => settings,
            Err(e) => {
                eprintln!("Failed to load settings from {path}: {e}, using defaults");
                EngineSettings::default()
            }
        },
        None => EngineSettings::default(),
    };
    logging::init_with(&settings.logging);
    settings
}
