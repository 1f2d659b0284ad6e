//! Ports layer: Trait definitions for record input and result output.
//!
//! Following Hexagonal Architecture, these traits define the boundaries
//! between the batch service and the concrete formats (CSV, JSON lines, ...).

mod sink;
mod source;

pub use sink::{ResultSink, RowOutcome};
pub use source::{RecordSource, RowError, SourceRow};
