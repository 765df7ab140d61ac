//! Scoreline Core
//!
//! Core types and utilities shared across Scoreline components.
//!
//! This crate provides:
//! - The request payload accepted by the scoring endpoint
//! - Prediction and response types, including the legacy `"error"` sentinel
//! - Error types and result handling

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{Prediction, RequestPayload, ScoreResponse, ERROR_SENTINEL};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::types::{Prediction, RequestPayload, ScoreResponse};
}
