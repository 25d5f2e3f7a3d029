//! Foundation module - Core utilities and types
//!
//! This module provides fundamental utilities used throughout the engine:
//! - Math types and integer rectangles
//! - Contract checking macros
//! - Logging utilities

pub mod check;
pub mod logging;
pub mod math;
