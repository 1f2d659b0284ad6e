//! Batch service: assesses every row of a record source into a result sink.
//!
//! Rows are processed sequentially in input order. A bad row is reported
//! against its 1-based index and the batch moves on; only source or sink I/O
//! failures stop the run.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::adapters::AdapterError;
use crate::ports::{RecordSource, ResultSink, RowOutcome, SourceRow};
use crate::MyeloError;

use super::RecommendationService;

/// Aggregate counts over one batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Rows with `surgeryRecommended = true`
    pub recommended: usize,
    pub by_label: BTreeMap<String, usize>,
    pub by_best_approach: BTreeMap<String, usize>,
    pub by_uncertainty: BTreeMap<String, usize>,
}

impl BatchSummary {
    fn record(&mut self, outcome: &RowOutcome) {
        self.total += 1;
        let Some(result) = outcome.result() else {
            self.failed += 1;
            return;
        };

        self.succeeded += 1;
        if result.surgery_recommended {
            self.recommended += 1;
        }
        *self
            .by_label
            .entry(result.recommendation_label.as_str().to_string())
            .or_default() += 1;
        *self
            .by_best_approach
            .entry(result.best_approach.as_str().to_string())
            .or_default() += 1;
        *self
            .by_uncertainty
            .entry(result.uncertainty_level.as_str().to_string())
            .or_default() += 1;
    }
}

/// A rejected row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowFailure {
    pub row: usize,
    pub message: String,
}

/// Outcome of a completed batch run.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub summary: BatchSummary,
    pub errors: Vec<RowFailure>,
    pub completed_at: DateTime<Utc>,
}

/// Service for batch assessment.
#[derive(Debug, Clone)]
pub struct BatchService {
    recommender: RecommendationService,
}

impl BatchService {
    #[must_use]
    pub fn new(recommender: RecommendationService) -> Self {
        Self { recommender }
    }

    /// Assess one source row.
    #[must_use]
    pub fn assess_row(&self, row: SourceRow) -> RowOutcome {
        let record = row
            .record
            .and_then(|raw| self.recommender.assess(&raw).map_err(Into::into));
        match record {
            Ok(result) => RowOutcome::Assessed {
                row: row.index,
                result: Box::new(result),
            },
            Err(error) => RowOutcome::Rejected {
                row: row.index,
                error,
            },
        }
    }

    /// Drain `source` into `sink`.
    ///
    /// # Errors
    /// Returns `MyeloError::Adapter` if the source cannot be read or the sink
    /// cannot be written. Row-level problems are reported in the sink and the
    /// returned report, never as an error.
    pub fn run<S, K>(&self, source: &mut S, sink: &mut K) -> Result<BatchReport, MyeloError>
    where
        S: RecordSource,
        S::Error: Into<AdapterError>,
        K: ResultSink,
        K::Error: Into<AdapterError>,
    {
        tracing::info!(
            variant = self.recommender.config().approach_variant.as_str(),
            mild_threshold = self.recommender.config().mild_mjoa_threshold,
            "Starting batch assessment"
        );
        let mut summary = BatchSummary::default();
        let mut errors = Vec::new();

        while let Some(row) = source.next_row().map_err(|e| MyeloError::Adapter(e.into()))? {
            let outcome = self.assess_row(row);
            if let RowOutcome::Rejected { row, error } = &outcome {
                // The message can echo cell contents; only the variant and field names are logged.
                tracing::warn!(
                    row = *row,
                    kind = error.kind(),
                    fields = ?error.field_names(),
                    "Row rejected"
                );
                errors.push(RowFailure {
                    row: *row,
                    message: error.to_string(),
                });
            }
            summary.record(&outcome);
            sink.accept(&outcome)
                .map_err(|e| MyeloError::Adapter(e.into()))?;
        }
        sink.finish().map_err(|e| MyeloError::Adapter(e.into()))?;

        tracing::info!(
            total = summary.total,
            succeeded = summary.succeeded,
            failed = summary.failed,
            recommended = summary.recommended,
            "Batch assessment complete"
        );

        Ok(BatchReport {
            summary,
            errors,
            completed_at: Utc::now(),
        })
    }
}
