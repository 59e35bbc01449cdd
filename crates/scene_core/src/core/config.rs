//! # Unified Configuration System
//!
//! Settings for the three engines plus logging, in one serializable tree.
//!
//! ## Configuration Categories
//!
//! - **Logging**: default log filter used by the demo binaries
//! - **Collision**: retry cap and collision epsilon for the slide loop
//! - **CSG**: submesh preservation and vertex merge policy for rebuilt meshes
//!
//! ```rust,no_run
//! use scene_core::config::Config;
//! use scene_core::core::config::EngineSettings;
//!
//! let settings = EngineSettings::load_from_file("engine.toml").unwrap_or_default();
//! assert!(settings.collision.maximum_retry > 0);
//! ```

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::csg::VertexDedup;

/// # Logging Configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default `env_logger` filter when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// # Collision Configuration
///
/// Drives [`CollisionCoordinator`](crate::physics::CollisionCoordinator).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollisionSettings {
    /// Base epsilon; the slide loop stops once the residual velocity is
    /// shorter than ten times this value
    pub collisions_epsilon: f32,
    /// Maximum number of slide iterations per movement request
    pub maximum_retry: u32,
}

impl Default for CollisionSettings {
    fn default() -> Self {
        Self {
            collisions_epsilon: 0.001,
            maximum_retry: 5,
        }
    }
}

impl CollisionSettings {
    /// Distance under which the slide loop considers the movement consumed
    pub fn close_distance(&self) -> f32 {
        self.collisions_epsilon * 10.0
    }
}

/// # CSG Configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CsgSettings {
    /// Regroup rebuilt triangles into per-source submeshes
    pub keep_sub_meshes: bool,
    /// Vertex merge policy used when rebuilding meshes
    pub vertex_dedup: VertexDedup,
}

impl Default for CsgSettings {
    fn default() -> Self {
        Self {
            keep_sub_meshes: true,
            vertex_dedup: VertexDedup::Exact,
        }
    }
}

/// # Engine Configuration
///
/// Root of the configuration tree, loadable from TOML or RON.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Logging settings
    pub logging: LoggingSettings,
    /// Collision settings
    pub collision: CollisionSettings,
    /// CSG settings
    pub csg: CsgSettings,
}

impl Config for EngineSettings {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigFormat;

    #[test]
    fn test_defaults_match_engine_constants() {
        let settings = EngineSettings::default();

        assert_eq!(settings.collision.maximum_retry, 5);
        assert!((settings.collision.close_distance() - 0.01).abs() < 1e-6);
        assert_eq!(settings.csg.vertex_dedup, VertexDedup::Exact);
        assert_eq!(settings.logging.level, "info");
    }

    #[test]
    fn test_partial_toml_falls_back_to_defaults() {
        let text = "[collision]\nmaximum_retry = 9\n";
        let settings = EngineSettings::from_str_with_format(text, ConfigFormat::Toml).unwrap();

        assert_eq!(settings.collision.maximum_retry, 9);
        assert_eq!(settings.csg, CsgSettings::default());
    }

    #[test]
    fn test_ron_round_trip() {
        let mut settings = EngineSettings::default();
        settings.csg.vertex_dedup = VertexDedup::Quantized { precision: 1e-4 };
        settings.collision.collisions_epsilon = 0.002;

        let text = settings.to_string_with_format(ConfigFormat::Ron).unwrap();
        let parsed = EngineSettings::from_str_with_format(&text, ConfigFormat::Ron).unwrap();

        assert_eq!(parsed, settings);
    }

    #[test]
    fn test_unsupported_extension_is_rejected() {
        let err = EngineSettings::load_from_file("settings.json").unwrap_err();
        assert!(matches!(err, crate::config::ConfigError::UnsupportedFormat(_)));
    }
}
