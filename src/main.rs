//! myelodecide: surgical decision support for cervical myelopathy.
//!
//! Usage:
//!   myelodecide assess [--input <file|->] [--set field=value]... [--config <file>]
//!   myelodecide batch <input|-> [--input-format csv|jsonl] [--output <file>]
//!                     [--output-format csv|jsonl] [--config <file>] [--summary]

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use myelodecide::adapters::csv::{CsvRecordSource, CsvResultSink};
use myelodecide::adapters::jsonl::{JsonLinesSink, JsonLinesSource};
use myelodecide::adapters::redact::RedactingMakeWriter;
use myelodecide::adapters::AdapterError;
use myelodecide::application::{BatchReport, BatchService, RecommendationService};
use myelodecide::ports::{RecordSource, ResultSink};
use myelodecide::{EngineConfig, MyeloError, RawPatientRecord};

#[derive(Parser)]
#[command(name = "myelodecide")]
#[command(version)]
#[command(about = "Surgery indication and approach allocation for cervical myelopathy", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Assess one patient and print the result as JSON
    Assess {
        /// JSON object with patient fields, or '-' for stdin
        #[arg(short, long)]
        input: Option<String>,

        /// Set a field, e.g. --set baselineMJOA=13 (repeatable, applied after --input)
        #[arg(short, long = "set", value_name = "FIELD=VALUE")]
        set: Vec<String>,

        /// Engine configuration file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Assess every row of a CSV or JSON-lines file
    Batch {
        /// Input file, or '-' for stdin
        input: String,

        /// Input format (inferred from the file extension if omitted)
        #[arg(long, value_enum)]
        input_format: Option<Format>,

        /// Output file (stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format (inferred from the output extension, else csv)
        #[arg(long, value_enum)]
        output_format: Option<Format>,

        /// Engine configuration file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Print the batch report as JSON when done
        #[arg(long)]
        summary: bool,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    Csv,
    Jsonl,
}

impl Format {
    fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "csv" => Some(Self::Csv),
            "jsonl" | "ndjson" => Some(Self::Jsonl),
            _ => None,
        }
    }
}

fn main() -> Result<()> {
    // Results go to stdout, so logs default to stderr.
    let log_mode = std::env::var("MYELODECIDE_LOG_MODE").unwrap_or_else(|_| "stderr".to_string());

    let (writer, _guard) = if log_mode == "file" {
        let log_file = std::env::var("MYELODECIDE_LOG_FILE")
            .unwrap_or_else(|_| "myelodecide.log".to_string());

        if let Some(parent) = Path::new(&log_file).parent() {
            // Best-effort: a missing directory surfaces as an open error below.
            let _ = std::fs::create_dir_all(parent);
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .with_context(|| format!("cannot open log file {log_file}"))?;
        tracing_appender::non_blocking(file)
    } else {
        tracing_appender::non_blocking(io::stderr())
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(RedactingMakeWriter::new(writer)))
        .init();

    match Cli::parse().command {
        Commands::Assess { input, set, config } => assess(input.as_deref(), &set, config.as_deref()),
        Commands::Batch {
            input,
            input_format,
            output,
            output_format,
            config,
            summary,
        } => batch(
            &input,
            input_format,
            output.as_deref(),
            output_format,
            config.as_deref(),
            summary,
        ),
    }
}

fn open_input(input: &str) -> Result<Box<dyn BufRead>> {
    if input == "-" {
        return Ok(Box::new(BufReader::new(io::stdin())));
    }
    let file = File::open(input).with_context(|| format!("cannot open input {input}"))?;
    Ok(Box::new(BufReader::new(file)))
}

fn assess(input: Option<&str>, set: &[String], config: Option<&Path>) -> Result<()> {
    let service = RecommendationService::new(EngineConfig::load(config)?)?;

    let mut raw = match input {
        Some(input) => {
            let mut text = String::new();
            open_input(input)?.read_to_string(&mut text)?;
            serde_json::from_str::<RawPatientRecord>(&text)
                .with_context(|| format!("{input} is not a JSON object of patient fields"))?
        }
        None => RawPatientRecord::new(),
    };

    for assignment in set {
        let Some((name, value)) = assignment.split_once('=') else {
            bail!("--set expects FIELD=VALUE, got {assignment:?}");
        };
        if !raw.insert_named(name.trim(), value.trim()) {
            bail!("unknown patient field {:?}", name.trim());
        }
    }

    let result = service.assess(&raw).map_err(MyeloError::from)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    serde_json::to_writer_pretty(&mut out, &result)?;
    writeln!(out)?;
    Ok(())
}

fn batch(
    input: &str,
    input_format: Option<Format>,
    output: Option<&Path>,
    output_format: Option<Format>,
    config: Option<&Path>,
    summary: bool,
) -> Result<()> {
    let service = BatchService::new(RecommendationService::new(EngineConfig::load(config)?)?);

    let input_format = input_format
        .or_else(|| Format::from_path(Path::new(input)))
        .unwrap_or(Format::Csv);
    let output_format = output_format
        .or_else(|| output.and_then(Format::from_path))
        .unwrap_or(Format::Csv);

    let writer: Box<dyn Write> = match output {
        Some(path) => Box::new(io::BufWriter::new(
            File::create(path).with_context(|| format!("cannot create {}", path.display()))?,
        )),
        None => Box::new(io::BufWriter::new(io::stdout())),
    };
    let reader = open_input(input)?;

    let report = match input_format {
        Format::Csv => {
            let mut source = CsvRecordSource::new(reader).map_err(MyeloError::from)?;
            run_into(&service, &mut source, writer, output_format)?
        }
        Format::Jsonl => {
            let mut source = JsonLinesSource::new(reader);
            run_into(&service, &mut source, writer, output_format)?
        }
    };

    if summary {
        let text = serde_json::to_string_pretty(&report)?;
        // Keep stdout clean when it carries the results.
        if output.is_some() {
            println!("{text}");
        } else {
            eprintln!("{text}");
        }
    }
    Ok(())
}

fn run_into<S>(
    service: &BatchService,
    source: &mut S,
    writer: Box<dyn Write>,
    format: Format,
) -> Result<BatchReport>
where
    S: RecordSource,
    S::Error: Into<AdapterError>,
{
    let report = match format {
        Format::Csv => run_with(service, source, &mut CsvResultSink::new(writer))?,
        Format::Jsonl => run_with(service, source, &mut JsonLinesSink::new(writer))?,
    };
    Ok(report)
}

fn run_with<S, K>(service: &BatchService, source: &mut S, sink: &mut K) -> Result<BatchReport>
where
    S: RecordSource,
    S::Error: Into<AdapterError>,
    K: ResultSink,
    K::Error: Into<AdapterError>,
{
    service.run(source, sink).context("batch run failed")
}
