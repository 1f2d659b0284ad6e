//! JSON-lines record source and result sink.

use std::io::{BufRead, Write};

use serde::Serialize;

use crate::domain::{RawPatientRecord, RecommendationResult, ValidationErrors};
use crate::ports::{RecordSource, ResultSink, RowError, RowOutcome, SourceRow};

use super::AdapterError;

/// Reads one JSON object per non-blank line.
pub struct JsonLinesSource<R> {
    reader: R,
    next_index: usize,
    line: String,
}

impl<R: BufRead> JsonLinesSource<R> {
    #[must_use]
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            next_index: 1,
            line: String::new(),
        }
    }
}

fn parse_line(line: &str) -> Result<RawPatientRecord, RowError> {
    match serde_json::from_str::<serde_json::Value>(line) {
        Ok(serde_json::Value::Object(map)) => RawPatientRecord::from_json_map(&map)
            .map_err(|e| RowError::Invalid(ValidationErrors::new(vec![e]))),
        Ok(_) => Err(RowError::Parse("expected a JSON object".to_string())),
        Err(e) => Err(RowError::Parse(e.to_string())),
    }
}

impl<R: BufRead> RecordSource for JsonLinesSource<R> {
    type Error = AdapterError;

    fn next_row(&mut self) -> Result<Option<SourceRow>, Self::Error> {
        loop {
            self.line.clear();
            if self.reader.read_line(&mut self.line)? == 0 {
                return Ok(None);
            }
            let text = self.line.trim_start_matches('\u{feff}').trim();
            if text.is_empty() {
                continue;
            }

            let index = self.next_index;
            self.next_index += 1;
            return Ok(Some(SourceRow {
                index,
                record: parse_line(text),
            }));
        }
    }
}

#[derive(Serialize)]
#[serde(untagged)]
enum Line<'a> {
    Assessed {
        row: usize,
        result: &'a RecommendationResult,
    },
    Rejected {
        row: usize,
        error: String,
    },
}

/// Writes one JSON object per outcome.
pub struct JsonLinesSink<W> {
    writer: W,
}

impl<W: Write> JsonLinesSink<W> {
    #[must_use]
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Recover the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> ResultSink for JsonLinesSink<W> {
    type Error = AdapterError;

    fn accept(&mut self, outcome: &RowOutcome) -> Result<(), Self::Error> {
        let line = match outcome {
            RowOutcome::Assessed { row, result } => Line::Assessed {
                row: *row,
                result: result.as_ref(),
            },
            RowOutcome::Rejected { row, error } => Line::Rejected {
                row: *row,
                error: error.to_string(),
            },
        };
        serde_json::to_writer(&mut self.writer, &line)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), Self::Error> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Field, RawValue};
    use std::io::Cursor;

    fn collect(text: &str) -> Vec<SourceRow> {
        let mut src = JsonLinesSource::new(Cursor::new(text.as_bytes().to_vec()));
        let mut rows = Vec::new();
        while let Some(row) = src.next_row().expect("readable") {
            rows.push(row);
        }
        rows
    }

    #[test]
    fn test_reads_objects_with_aliases() {
        let rows = collect(
            "{\"baseline_mJOA\": 13, \"t2\": \"focal\", \"gait\": true, \"note\": \"x\"}\n\n{\"age\": null}\n",
        );
        assert_eq!(rows.len(), 2);
        let first = rows[0].record.as_ref().expect("parsed");
        assert_eq!(first.get(Field::BaselineMjoa), Some(&RawValue::Number(13.0)));
        assert_eq!(first.get(Field::GaitImpairment), Some(&RawValue::Bool(true)));
        assert_eq!(first.len(), 3);

        assert_eq!(rows[1].index, 2);
        assert!(rows[1].record.as_ref().expect("parsed").is_empty());
    }

    #[test]
    fn test_non_object_lines_are_row_errors() {
        let rows = collect("[1, 2]\n{not json}\n{}\n");
        assert!(matches!(rows[0].record, Err(RowError::Parse(_))));
        assert!(matches!(rows[1].record, Err(RowError::Parse(_))));
        assert!(rows[2].record.is_ok());
        assert_eq!(rows[2].index, 3);
    }

    #[test]
    fn test_byte_order_mark_is_skipped() {
        let rows = collect("\u{feff}{\"age\": 64}\n{\"age\": 70}\n");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].index, 1);
        let first = rows[0].record.as_ref().expect("parsed");
        assert_eq!(first.get(Field::Age), Some(&RawValue::Number(64.0)));

        // A BOM-only line counts as blank.
        let rows = collect("\u{feff}\n{}\n");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].index, 1);
    }

    #[test]
    fn test_repeated_field_is_row_error() {
        let rows = collect("{\"sex\": \"F\", \"Sex\": \"M\"}\n{\"sex\": \"F\"}\n");
        let Err(RowError::Invalid(errors)) = &rows[0].record else {
            panic!("expected invalid row, got {:?}", rows[0].record);
        };
        assert_eq!(errors.fields(), vec![Field::Sex]);
        assert!(rows[1].record.is_ok());
    }

    #[test]
    fn test_sink_writes_result_and_error_lines() {
        let result = crate::engine::evaluate(&RawPatientRecord::new(), &Default::default())
            .expect("valid record");
        let mut sink = JsonLinesSink::new(Vec::new());
        sink.accept(&RowOutcome::Assessed {
            row: 1,
            result: Box::new(result),
        })
        .unwrap();
        sink.accept(&RowOutcome::Rejected {
            row: 2,
            error: RowError::Parse("expected a JSON object".to_string()),
        })
        .unwrap();
        sink.finish().unwrap();

        let text = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<serde_json::Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).expect("json line"))
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["row"], 1);
        assert_eq!(lines[0]["result"]["riskScore"], 55);
        assert!(lines[0].get("error").is_none());
        assert_eq!(lines[1]["row"], 2);
        assert_eq!(lines[1]["error"], "malformed row: expected a JSON object");
    }
}
