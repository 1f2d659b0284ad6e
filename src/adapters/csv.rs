//! CSV record source and result sink.
//!
//! Supports the subset of CSV produced by spreadsheet exports: one record per
//! line, comma separators, double-quoted fields with `""` escapes. Quoted
//! fields cannot span lines.

use std::io::{BufRead, Write};

use crate::domain::{Field, RawPatientRecord, RawValue, FLAT_COLUMNS};
use crate::ports::{RecordSource, ResultSink, RowError, RowOutcome, SourceRow};

use super::AdapterError;

/// Reads patient rows from CSV text with a header line.
pub struct CsvRecordSource<R> {
    reader: R,
    /// Field for each header column; `None` for unrecognised columns
    columns: Vec<Option<Field>>,
    next_index: usize,
    line: String,
}

impl<R: BufRead> CsvRecordSource<R> {
    /// Read the header and prepare to stream rows.
    ///
    /// # Errors
    /// Returns error if the input cannot be read, is empty, or the header
    /// line is malformed.
    pub fn new(mut reader: R) -> Result<Self, AdapterError> {
        let mut line = String::new();
        loop {
            line.clear();
            if reader.read_line(&mut line)? == 0 {
                return Err(AdapterError::Header("input has no header line".to_string()));
            }
            if !line.trim().is_empty() {
                break;
            }
        }

        let names = split_line(trim_newline(&line)).map_err(AdapterError::Header)?;
        let columns: Vec<Option<Field>> = names.iter().map(|n| Field::from_alias(n)).collect();

        for (i, field) in columns.iter().enumerate() {
            let Some(field) = field else { continue };
            if let Some(j) = columns[..i].iter().position(|c| c.as_ref() == Some(field)) {
                return Err(AdapterError::Header(format!(
                    "columns {:?} and {:?} both map to {}",
                    names[j], names[i], field
                )));
            }
        }

        let ignored: Vec<&str> = names
            .iter()
            .zip(&columns)
            .filter(|(_, c)| c.is_none())
            .map(|(n, _)| n.as_str())
            .collect();
        if !ignored.is_empty() {
            tracing::debug!("Ignoring unrecognised CSV columns: {:?}", ignored);
        }
        if columns.iter().all(Option::is_none) {
            tracing::warn!("CSV header names no patient fields; every row will use defaults");
        }

        Ok(Self {
            reader,
            columns,
            next_index: 1,
            line,
        })
    }

    /// Number of columns declared by the header.
    #[must_use]
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    fn parse_row(&self, text: &str) -> Result<RawPatientRecord, RowError> {
        let cells = split_line(text).map_err(RowError::Parse)?;
        if cells.len() != self.columns.len() {
            return Err(RowError::ColumnCount {
                expected: self.columns.len(),
                found: cells.len(),
            });
        }

        let mut record = RawPatientRecord::new();
        for (column, cell) in self.columns.iter().zip(cells) {
            if let Some(field) = column {
                record.set(*field, RawValue::Text(cell));
            }
        }
        Ok(record)
    }
}

impl<R: BufRead> RecordSource for CsvRecordSource<R> {
    type Error = AdapterError;

    fn next_row(&mut self) -> Result<Option<SourceRow>, Self::Error> {
        loop {
            self.line.clear();
            if self.reader.read_line(&mut self.line)? == 0 {
                return Ok(None);
            }
            if self.line.trim().is_empty() {
                continue;
            }

            let index = self.next_index;
            self.next_index += 1;
            let record = self.parse_row(trim_newline(&self.line));
            return Ok(Some(SourceRow { index, record }));
        }
    }
}

fn trim_newline(line: &str) -> &str {
    line.trim_end_matches(['\n', '\r'])
}

/// Split one CSV line into unescaped fields.
fn split_line(line: &str) -> Result<Vec<String>, String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                _ => field.push(c),
            }
        } else {
            match c {
                ',' => fields.push(std::mem::take(&mut field)),
                '"' if field.trim().is_empty() => {
                    field.clear();
                    in_quotes = true;
                }
                _ => field.push(c),
            }
        }
    }

    if in_quotes {
        return Err("unterminated quoted field".to_string());
    }
    fields.push(field);
    Ok(fields)
}

/// Quote a cell if it would otherwise break the row.
fn escape(cell: &str) -> std::borrow::Cow<'_, str> {
    if cell.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", cell.replace('"', "\"\"")).into()
    } else {
        cell.into()
    }
}

/// Writes one CSV line per outcome: `row`, the flat result columns, `error`.
pub struct CsvResultSink<W> {
    writer: W,
    header_written: bool,
}

impl<W: Write> CsvResultSink<W> {
    #[must_use]
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            header_written: false,
        }
    }

    /// Recover the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_header(&mut self) -> std::io::Result<()> {
        if self.header_written {
            return Ok(());
        }
        let header: Vec<&str> = std::iter::once("row")
            .chain(FLAT_COLUMNS)
            .chain(std::iter::once("error"))
            .collect();
        writeln!(self.writer, "{}", header.join(","))?;
        self.header_written = true;
        Ok(())
    }
}

impl<W: Write> ResultSink for CsvResultSink<W> {
    type Error = AdapterError;

    fn accept(&mut self, outcome: &RowOutcome) -> Result<(), Self::Error> {
        self.write_header()?;

        let mut cells: Vec<String> = Vec::with_capacity(FLAT_COLUMNS.len() + 2);
        cells.push(outcome.row().to_string());
        match outcome {
            RowOutcome::Assessed { result, .. } => {
                cells.extend(result.flat_row().iter().map(|c| escape(c).into_owned()));
                cells.push(String::new());
            }
            RowOutcome::Rejected { error, .. } => {
                cells.extend(std::iter::repeat(String::new()).take(FLAT_COLUMNS.len()));
                cells.push(escape(&error.to_string()).into_owned());
            }
        }
        writeln!(self.writer, "{}", cells.join(","))?;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), Self::Error> {
        self.write_header()?;
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FieldError;
    use std::io::Cursor;

    fn source(text: &str) -> CsvRecordSource<Cursor<Vec<u8>>> {
        CsvRecordSource::new(Cursor::new(text.as_bytes().to_vec())).expect("valid header")
    }

    fn collect(text: &str) -> Vec<SourceRow> {
        let mut src = source(text);
        let mut rows = Vec::new();
        while let Some(row) = src.next_row().expect("readable") {
            rows.push(row);
        }
        rows
    }

    #[test]
    fn test_split_line_quotes() {
        assert_eq!(split_line("a,b,,c").unwrap(), vec!["a", "b", "", "c"]);
        assert_eq!(
            split_line(r#""x, y","say ""hi""",z"#).unwrap(),
            vec!["x, y", r#"say "hi""#, "z"]
        );
        assert!(split_line(r#""open,b"#).is_err());
    }

    #[test]
    fn test_header_aliases() {
        let src = source("\u{feff}Age,baseline_mJOA,T2 Signal,notes\n");
        assert_eq!(src.width(), 4);
        assert_eq!(
            src.columns,
            vec![
                Some(Field::Age),
                Some(Field::BaselineMjoa),
                Some(Field::T2Signal),
                None
            ]
        );
    }

    #[test]
    fn test_rows_indexed_and_blank_lines_skipped() {
        let rows = collect("age,mjoa,t2\n\n65,13,multilevel\n\n70,,none\r\n");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].index, 1);
        assert_eq!(rows[1].index, 2);

        let first = rows[0].record.as_ref().expect("parsed");
        assert_eq!(first.get(Field::Age), Some(&RawValue::from("65")));
        let second = rows[1].record.as_ref().expect("parsed");
        assert_eq!(second.get(Field::BaselineMjoa), None);
        assert_eq!(second.get(Field::T2Signal), Some(&RawValue::from("none")));
    }

    #[test]
    fn test_column_count_mismatch_is_row_error() {
        let rows = collect("age,mjoa\n65\n70,14\n");
        assert_eq!(
            rows[0].record,
            Err(RowError::ColumnCount {
                expected: 2,
                found: 1
            })
        );
        assert!(rows[1].record.is_ok());
        assert_eq!(rows[1].index, 2);
    }

    #[test]
    fn test_empty_input_rejected() {
        let result = CsvRecordSource::new(Cursor::new(b"\n\n".to_vec()));
        assert!(matches!(result, Err(AdapterError::Header(_))));
    }

    #[test]
    fn test_repeated_field_column_rejected() {
        let header = b"age,baselineMJOA,Baseline_mJOA\n70,17,9\n";
        let result = CsvRecordSource::new(Cursor::new(header.to_vec()));
        let Err(AdapterError::Header(message)) = result else {
            panic!("expected header error");
        };
        assert!(message.contains("\"baselineMJOA\""), "{message}");
        assert!(message.contains("\"Baseline_mJOA\""), "{message}");

        // Unrecognised columns may repeat.
        let rows = collect("note,age,note\nx,70,y\n");
        assert!(rows[0].record.is_ok());
    }

    #[test]
    fn test_sink_writes_header_and_rows() {
        let result = crate::engine::evaluate(&RawPatientRecord::new(), &Default::default())
            .expect("valid record");
        let invalid = crate::domain::ValidationErrors::new(vec![FieldError::OutOfRange {
            field: Field::Age,
            value: 150.0,
            min: 18.0,
            max: 100.0,
        }]);

        let mut sink = CsvResultSink::new(Vec::new());
        sink.accept(&RowOutcome::Assessed {
            row: 1,
            result: Box::new(result),
        })
        .unwrap();
        sink.accept(&RowOutcome::Rejected {
            row: 2,
            error: RowError::Invalid(invalid),
        })
        .unwrap();
        sink.finish().unwrap();

        let text = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("row,age,sex,"));
        assert!(lines[0].ends_with(",uncertaintyLevel,error"));

        let assessed = split_line(lines[1]).unwrap();
        assert_eq!(assessed.len(), FLAT_COLUMNS.len() + 2);
        assert_eq!(assessed[0], "1");
        assert_eq!(assessed[1], "60");
        assert_eq!(assessed.last().map(String::as_str), Some(""));

        let rejected = split_line(lines[2]).unwrap();
        assert_eq!(rejected.len(), FLAT_COLUMNS.len() + 2);
        assert_eq!(rejected[0], "2");
        assert!(rejected.last().unwrap().contains("age: value 150 outside [18, 100]"));
    }

    #[test]
    fn test_sink_header_only_when_empty() {
        let mut sink = CsvResultSink::new(Vec::new());
        sink.finish().unwrap();
        let text = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(text.lines().count(), 1);
    }
}
