//! PII redaction for log output.
//!
//! Services log row indexes and labels rather than patient values, but free
//! text (file names, error messages echoing a bad cell) can still carry
//! identifiers. Every formatted log line is passed through [`redact`] by
//! [`RedactingMakeWriter`] before reaching its sink.
//!
//! Masked: medical record numbers, UUIDs, SSN-like numbers, e-mail addresses,
//! phone numbers, and dates of birth introduced by a DOB/birth keyword.
//!
//! Input is capped at `MYELODECIDE_REDACT_MAX_BYTES` (default 16 KiB) per call.

use std::borrow::Cow;
use std::io::Write;
use std::sync::OnceLock;

use regex::Regex;
use tracing_subscriber::fmt::MakeWriter;

const MAX_BYTES_ENV: &str = "MYELODECIDE_REDACT_MAX_BYTES";
const DEFAULT_MAX_BYTES: usize = 16 * 1024;

/// Pattern and mask, applied in order.
const RULES: &[(&str, &str)] = &[
    (
        r"(?i)\b(?:dob|date of birth|birth ?date)\b\s*[:=]?\s*(?:\d{4}-\d{2}-\d{2}|\d{1,2}/\d{1,2}/\d{2,4})",
        "[REDACTED-DOB]",
    ),
    (r"(?i)\bMRN\s*[:#=]?\s*[A-Z]{0,3}\d{5,10}\b", "[REDACTED-MRN]"),
    (
        r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}",
        "[REDACTED-UUID]",
    ),
    (r"\b\d{3}-\d{2}-\d{4}\b", "[REDACTED-SSN]"),
    (
        r"(?i)\b[a-z0-9._%+-]{1,64}@(?:[a-z0-9-]{1,63}\.)+[a-z]{2,}\b",
        "[REDACTED-EMAIL]",
    ),
    (
        r"(?:\+?\d{1,2}[-.\s])?\(?\b\d{3}\)?[-.\s]\d{3}[-.\s]\d{4}\b",
        "[REDACTED-PHONE]",
    ),
];

struct Rule {
    regex: Regex,
    mask: &'static str,
}

fn rules() -> &'static [Rule] {
    static COMPILED: OnceLock<Vec<Rule>> = OnceLock::new();
    COMPILED.get_or_init(|| {
        RULES
            .iter()
            .filter_map(|&(pattern, mask)| {
                Regex::new(pattern).ok().map(|regex| Rule { regex, mask })
            })
            .collect()
    })
}

fn max_bytes() -> usize {
    static LIMIT: OnceLock<usize> = OnceLock::new();
    *LIMIT.get_or_init(|| {
        std::env::var(MAX_BYTES_ENV)
            .ok()
            .and_then(|v| v.trim().parse::<usize>().ok())
            .filter(|&v| v > 0)
            .unwrap_or(DEFAULT_MAX_BYTES)
    })
}

/// Longest prefix of at most `limit` bytes that ends on a char boundary.
fn clip(input: &str, limit: usize) -> (&str, bool) {
    if input.len() <= limit {
        return (input, false);
    }
    let mut end = limit;
    while !input.is_char_boundary(end) {
        end -= 1;
    }
    (&input[..end], true)
}

/// Mask identifiers in `input`.
#[must_use]
pub fn redact(input: &str) -> String {
    redact_with_limit(input, max_bytes())
}

fn redact_with_limit(input: &str, limit: usize) -> String {
    let (text, clipped) = clip(input, limit);
    let mut out: Cow<'_, str> = Cow::Borrowed(text);
    for rule in rules() {
        if rule.regex.is_match(&out) {
            out = Cow::Owned(rule.regex.replace_all(&out, rule.mask).into_owned());
        }
    }

    let mut out = out.into_owned();
    if clipped {
        out.push_str(" [TRUNCATED]");
    }
    out
}

/// `MakeWriter` wrapper that redacts each formatted log line.
#[derive(Debug, Clone)]
pub struct RedactingMakeWriter<M> {
    inner: M,
}

impl<M> RedactingMakeWriter<M> {
    #[must_use]
    pub fn new(inner: M) -> Self {
        Self { inner }
    }
}

impl<'a, M> MakeWriter<'a> for RedactingMakeWriter<M>
where
    M: MakeWriter<'a>,
{
    type Writer = RedactingWriter<M::Writer>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter {
            inner: self.inner.make_writer(),
            pending: Vec::new(),
        }
    }
}

/// Line-buffering writer produced by [`RedactingMakeWriter`].
///
/// Complete lines are redacted and forwarded as they arrive; a trailing
/// partial line is forwarded on flush or drop.
pub struct RedactingWriter<W: Write> {
    inner: W,
    pending: Vec<u8>,
}

impl<W: Write> RedactingWriter<W> {
    fn emit(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        let clean = redact(&String::from_utf8_lossy(bytes));
        self.inner.write_all(clean.as_bytes())
    }

    fn drain_lines(&mut self) -> std::io::Result<()> {
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            self.emit(&line)?;
        }
        Ok(())
    }

    fn drain_rest(&mut self) -> std::io::Result<()> {
        if !self.pending.is_empty() {
            let rest = std::mem::take(&mut self.pending);
            self.emit(&rest)?;
        }
        Ok(())
    }
}

impl<W: Write> Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.pending.extend_from_slice(buf);
        self.drain_lines()?;
        // A line with no newline in sight is cut at the cap.
        if self.pending.len() > max_bytes() {
            self.drain_rest()?;
            self.inner.write_all(b"\n")?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.drain_lines()?;
        self.drain_rest()?;
        self.inner.flush()
    }
}

impl<W: Write> Drop for RedactingWriter<W> {
    fn drop(&mut self) {
        let _ = self.drain_rest();
    }
}
