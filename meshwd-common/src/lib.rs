//! # meshwd Common Library
//!
//! Shared code for the meshwd reconciliation tools:
//! - Error type
//! - TOML configuration file model and path resolution
//! - HTTP User-Agent string
//! - Tracing subscriber setup

pub mod config;
pub mod error;
pub mod logging;

pub use error::{Error, Result};
