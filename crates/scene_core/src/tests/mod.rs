//! Cross-module scenarios
//!
//! Each file drives one engine end to end through its public API.
