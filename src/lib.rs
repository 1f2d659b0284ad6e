//! # myelodecide
//!
//! Surgical decision support for degenerative cervical myelopathy.
//!
//! Given a patient's clinical and imaging profile, the engine estimates
//! whether surgery is indicated versus a non-operative trial and, when it is,
//! which approach (anterior, posterior, circumferential) is favoured, with a
//! qualitative uncertainty label.
//!
//! ## Architecture
//!
//! The crate follows Hexagonal Architecture:
//! - `domain`: Core clinical types (patient record, recommendation result)
//! - `engine`: The pure recommendation pipeline
//! - `config`: Engine tunables from defaults, JSON file and environment
//! - `ports`: Trait definitions for record input and result output
//! - `adapters`: Concrete implementations (CSV, JSON lines, in-memory, log redaction)
//! - `application`: Use cases orchestrating the engine and ports

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod engine;
pub mod ports;

pub use config::EngineConfig;
pub use domain::{PatientRecord, RawPatientRecord, RecommendationResult};
pub use engine::{evaluate, recommend};

/// Result type for myelodecide operations
pub type Result<T> = std::result::Result<T, MyeloError>;

/// Main error type for myelodecide
#[derive(Debug, thiserror::Error)]
pub enum MyeloError {
    #[error(transparent)]
    Validation(#[from] domain::ValidationErrors),

    #[error("Adapter error: {0}")]
    Adapter(#[from] adapters::AdapterError),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
