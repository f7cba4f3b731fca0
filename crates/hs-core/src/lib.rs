//! # hs-core
//!
//! Core types, traits, and error handling for hetstat.
//!
//! This crate provides:
//! - Common error types
//! - Core traits (`Learner`, `Predictor`)
//! - Shared data structures (`Features`, `Dataset`, `SampleSplit`)

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use traits::{Learner, Predictor};
pub use types::{CoefEstimate, Dataset, Features, SampleRole, SampleSplit};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
