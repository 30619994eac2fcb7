//! `sasverify` Core Library
//!
//! Shared functionality for `sasverify` binaries:
//! - Configuration resolution and hierarchy
//! - Tracing initialisation
//! - Common error types

pub mod config;
pub mod error;
pub mod tracing_init;

pub use config::{Config, DisplayMethod};
pub use error::{Error, Result};
