//! Adapters layer: Concrete implementations of ports.
//!
//! - `csv`: comma-separated rows in, flat result rows out
//! - `jsonl`: one JSON object per line, in and out
//! - `memory`: in-process source and sink for embedding and tests
//! - `redact`: PII masking for log output

pub mod csv;
pub mod jsonl;
pub mod memory;
pub mod redact;

use std::convert::Infallible;

/// Error type for adapter I/O.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid header: {0}")]
    Header(String),
}

impl From<Infallible> for AdapterError {
    fn from(never: Infallible) -> Self {
        match never {}
    }
}
