//! Application layer: Use cases and services.
//!
//! This module drives the engine from ports to implement single-patient
//! assessment and batch processing.

mod batch;
mod recommendation;

pub use batch::{BatchReport, BatchService, BatchSummary, RowFailure};
pub use recommendation::RecommendationService;
