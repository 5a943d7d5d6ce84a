//! The `utils` module provides the shared plumbing used across `geopub`:
//! the crate-wide error type and the tracing subscriber setup.

pub mod error;
pub mod logging;

pub use error::{Error, Result};
