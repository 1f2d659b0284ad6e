//! In-memory source and sink.

use std::convert::Infallible;

use crate::domain::RawPatientRecord;
use crate::ports::{RecordSource, ResultSink, RowOutcome, SourceRow};

/// Serves pre-built records in order, indexed from 1.
#[derive(Debug, Clone)]
pub struct MemorySource {
    records: std::vec::IntoIter<RawPatientRecord>,
    next_index: usize,
}

impl MemorySource {
    #[must_use]
    pub fn new(records: Vec<RawPatientRecord>) -> Self {
        Self {
            records: records.into_iter(),
            next_index: 1,
        }
    }
}

impl RecordSource for MemorySource {
    type Error = Infallible;

    fn next_row(&mut self) -> Result<Option<SourceRow>, Self::Error> {
        Ok(self.records.next().map(|record| {
            let row = SourceRow::ok(self.next_index, record);
            self.next_index += 1;
            row
        }))
    }
}

/// Keeps every outcome it is given.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    outcomes: Vec<RowOutcome>,
    finished: bool,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn outcomes(&self) -> &[RowOutcome] {
        &self.outcomes
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl ResultSink for MemorySink {
    type Error = Infallible;

    fn accept(&mut self, outcome: &RowOutcome) -> Result<(), Self::Error> {
        self.outcomes.push(outcome.clone());
        Ok(())
    }

    fn finish(&mut self) -> Result<(), Self::Error> {
        self.finished = true;
        Ok(())
    }
}
