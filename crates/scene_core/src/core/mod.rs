//! # Core Engine Module
//!
//! Shared abstractions used by every subsystem.
//!
//! ## Organization
//!
//! - **Config**: Unified settings tree for logging, collision and CSG

pub mod config;

// Re-export foundation modules for convenience
pub use crate::foundation;

pub use config::{CollisionSettings, CsgSettings, EngineSettings, LoggingSettings};
