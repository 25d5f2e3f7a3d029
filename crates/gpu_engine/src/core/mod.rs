//! Core engine services
//!
//! - Configuration loading and validation

pub mod config;

pub use config::{BackendKind, Config, ConfigError, EngineConfig, GraphicsConfig, WindowConfig};
