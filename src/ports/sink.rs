//! Result sink port: Trait for writing per-row outcomes.

use crate::domain::RecommendationResult;

use super::RowError;

/// What happened to one input row.
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    Assessed {
        row: usize,
        result: Box<RecommendationResult>,
    },
    Rejected {
        row: usize,
        error: RowError,
    },
}

impl RowOutcome {
    /// 1-based index of the input row.
    #[must_use]
    pub fn row(&self) -> usize {
        match self {
            Self::Assessed { row, .. } | Self::Rejected { row, .. } => *row,
        }
    }

    #[must_use]
    pub fn result(&self) -> Option<&RecommendationResult> {
        match self {
            Self::Assessed { result, .. } => Some(result),
            Self::Rejected { .. } => None,
        }
    }
}

/// Trait for sequential result output.
pub trait ResultSink {
    /// Error type for sink operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Write one outcome, in input order.
    ///
    /// # Errors
    /// Returns error if the outcome cannot be written.
    fn accept(&mut self, outcome: &RowOutcome) -> Result<(), Self::Error>;

    /// Flush everything; called once after the last row.
    ///
    /// # Errors
    /// Returns error if buffered output cannot be flushed.
    fn finish(&mut self) -> Result<(), Self::Error>;
}
