//! Domain layer: Core clinical types.
//!
//! Pure Rust types with no I/O. Patient input, its validation errors, and the
//! recommendation result the engine produces.

mod patient;
mod recommendation;

pub use patient::{
    CanalRatio, Field, FieldError, PatientRecord, RawPatientRecord, RawValue, Severity, Sex,
    T2Signal, ValidationErrors, MILD_MJOA_THRESHOLD, SEVERE_MJOA_THRESHOLD,
};
pub use recommendation::{
    Approach, ApproachAdjustment, ApproachProbs, ApproachVariant, Contribution,
    RecommendationLabel, RecommendationResult, UncertaintyLevel, FLAT_COLUMNS,
};
