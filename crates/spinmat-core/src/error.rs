//! Error types for the comparison pipeline.
//!
//! Every variant is fatal: the pipeline produces an all-or-nothing result set
//! because the matrices are indexed by the map ordering fixed at the start.

use thiserror::Error;

use crate::surface::Hemisphere;

#[derive(Error, Debug)]
pub enum Error {
    /// Invalid setup detected before any computation starts.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("geometry mismatch for {map}: {hemisphere} hemisphere has {got} vertices, reference sphere has {expected}")]
    GeometryMismatch {
        map: String,
        hemisphere: Hemisphere,
        expected: usize,
        got: usize,
    },

    #[error("shape mismatch comparing {a} with {b}: {hemisphere} hemisphere lengths {len_a} vs {len_b}")]
    ShapeMismatch {
        a: String,
        b: String,
        hemisphere: Hemisphere,
        len_a: usize,
        len_b: usize,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Error::Configuration(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
