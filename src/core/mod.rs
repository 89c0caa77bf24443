//! Core traits and types for the widgetweld library.
//!
//! This module contains the error types and the source/sink traits that
//! the producers and consumers are built on.

pub mod error;
pub mod traits;

// Re-export core items
pub use error::{Error, FlagError, Result};
pub use traits::{Sink, Source};
