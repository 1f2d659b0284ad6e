//! Record source port: Trait for reading raw patient records row by row.

use crate::domain::{RawPatientRecord, ValidationErrors};

/// A problem confined to one input row.
///
/// Row errors never abort a batch; they are reported against the row index.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RowError {
    #[error("expected {expected} columns, found {found}")]
    ColumnCount { expected: usize, found: usize },

    #[error("malformed row: {0}")]
    Parse(String),

    #[error(transparent)]
    Invalid(#[from] ValidationErrors),
}

impl RowError {
    /// Short tag for the error variant.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ColumnCount { .. } => "column_count",
            Self::Parse(_) => "parse",
            Self::Invalid(_) => "invalid",
        }
    }

    /// Canonical names of the rejected fields; empty unless `Invalid`.
    #[must_use]
    pub fn field_names(&self) -> Vec<&'static str> {
        match self {
            Self::Invalid(errors) => errors.fields().iter().map(|f| f.canonical_name()).collect(),
            Self::ColumnCount { .. } | Self::Parse(_) => Vec::new(),
        }
    }
}

/// One row read from a source.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRow {
    /// 1-based data row index (header and blank lines not counted)
    pub index: usize,
    /// The raw record, or why the row could not be read
    pub record: Result<RawPatientRecord, RowError>,
}

impl SourceRow {
    #[must_use]
    pub fn ok(index: usize, record: RawPatientRecord) -> Self {
        Self {
            index,
            record: Ok(record),
        }
    }

    #[must_use]
    pub fn failed(index: usize, error: RowError) -> Self {
        Self {
            index,
            record: Err(error),
        }
    }
}

/// Trait for sequential record input.
pub trait RecordSource {
    /// Error type for unrecoverable read failures (I/O, bad header).
    type Error: std::error::Error + Send + Sync + 'static;

    /// Read the next row.
    ///
    /// # Returns
    /// `None` once the input is exhausted.
    ///
    /// # Errors
    /// Returns error if the underlying input cannot be read. Problems with a
    /// single row are reported inside the returned [`SourceRow`] instead.
    fn next_row(&mut self) -> Result<Option<SourceRow>, Self::Error>;
}
