//! Run: probe and parse each input file, bounded by a semaphore.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use bytes::Bytes;
use tokio::sync::Semaphore;
use tracing::{debug, error, info};

use crate::conf::EngineConfig;
use crate::output::{JsonLinesWriter, OutputFormat, RecordSink, TableWriter};
use crate::parser::diagnostics::TracingDiagnostics;
use crate::parser::metrics::{MetricsSnapshot, ParseStats, ParsingMetrics};
use crate::parser::model::GrammarError;
use crate::parser::source::LineSource;
use crate::parser::{FormatProber, FormatRegistry};

/// Outcome of one input file.
#[derive(Debug, Clone)]
pub struct FileReport {
    pub path: PathBuf,
    /// None when no known format accepted the file
    pub format: Option<&'static str>,
    pub stats: ParseStats,
}

/// Everything a file task needs, shared across tasks.
pub struct Pipeline {
    registry: FormatRegistry,
    prober: FormatProber,
    metrics: ParsingMetrics,
    max_line_length: usize,
}

impl Pipeline {
    pub fn new(config: &EngineConfig) -> Result<Self, GrammarError> {
        Ok(Self {
            registry: FormatRegistry::new()?,
            prober: FormatProber::new(config.max_line_length, config.probe_max_lines),
            metrics: ParsingMetrics::new(),
            max_line_length: config.max_line_length,
        })
    }

    pub fn metrics(&self) -> &ParsingMetrics {
        &self.metrics
    }

    /// Probe `path` against every known format, then parse it with the first
    /// one that accepts it. Blocking.
    pub fn process_file(&self, path: &Path, sink: &mut dyn RecordSink) -> anyhow::Result<FileReport> {
        let source = source_name(path);

        let sample = self
            .read_sample(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let detected = self.registry.detect(&self.prober, &sample);
        self.metrics.record_probe(detected.is_some());

        let Some(format) = detected else {
            info!(source = %source, "No known format recognized, skipping");
            return Ok(FileReport {
                path: path.to_path_buf(),
                format: None,
                stats: ParseStats::default(),
            });
        };
        debug!(source = %source, format = format.name(), "Format detected");

        let mut lines = LineSource::open(path, self.max_line_length)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        let mut diagnostics = TracingDiagnostics::new(source.clone());

        let stats = format
            .parse(&mut lines, sink, &mut diagnostics, self.max_line_length)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        self.metrics.absorb(&stats);

        info!(
            source = %source,
            format = format.name(),
            records = stats.records_emitted,
            discarded = stats.records_discarded,
            warnings = stats.warnings.total(),
            "Finished file"
        );

        Ok(FileReport {
            path: path.to_path_buf(),
            format: Some(format.name()),
            stats,
        })
    }

    fn read_sample(&self, path: &Path) -> io::Result<Vec<Bytes>> {
        LineSource::open(path, self.max_line_length)?
            .take(self.prober.max_lines())
            .collect()
    }
}

/// Final tally of a run.
#[derive(Debug)]
pub struct RunSummary {
    pub reports: Vec<FileReport>,
    pub failed: usize,
    pub metrics: MetricsSnapshot,
}

/// Parse every file named in `files`, writing records to stdout.
///
/// Each file runs on the blocking pool; at most `max_concurrent_files` run
/// at once. A file that fails is logged and counted, the rest continue.
pub async fn run(config: EngineConfig, files: Vec<PathBuf>) -> anyhow::Result<RunSummary> {
    let pipeline = Arc::new(Pipeline::new(&config).context("Failed to build format grammars")?);
    let semaphore = Arc::new(Semaphore::new(config.max_concurrent_files));
    let display_offset = config.display_offset()?;

    if config.output.format == OutputFormat::Table {
        let mut header = TableWriter::new(io::stdout(), config.output.fields.clone(), display_offset, display_offset);
        header.write_header()?;
    }

    let config = Arc::new(config);
    let mut handles = Vec::with_capacity(files.len());

    for path in files {
        let permit = Arc::clone(&semaphore).acquire_owned().await?;
        let pipeline = Arc::clone(&pipeline);
        let config = Arc::clone(&config);

        let handle = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            let source = source_name(&path);
            let mut sink = stdout_sink(&config, &source)?;
            pipeline.process_file(&path, sink.as_mut())
        });
        handles.push(handle);
    }

    let mut reports = Vec::with_capacity(handles.len());
    let mut failed = 0;
    for handle in handles {
        match handle.await? {
            Ok(report) => reports.push(report),
            Err(e) => {
                error!("{:#}", e);
                failed += 1;
            }
        }
    }

    let metrics = pipeline.metrics().snapshot();
    info!(
        files = reports.len(),
        failed,
        metrics = %serde_json::to_string(&metrics).unwrap_or_default(),
        "Run complete"
    );

    Ok(RunSummary { reports, failed, metrics })
}

fn stdout_sink(config: &EngineConfig, source: &str) -> anyhow::Result<Box<dyn RecordSink>> {
    let sink: Box<dyn RecordSink> = match config.output.format {
        OutputFormat::Jsonl => Box::new(JsonLinesWriter::new(io::stdout(), source)),
        OutputFormat::Table => Box::new(
            TableWriter::new(
                io::stdout(),
                config.output.fields.clone(),
                config.local_offset_for(source)?,
                config.display_offset()?,
            )
            .with_source(source),
        ),
    };
    Ok(sink)
}

/// File name used to tag records and look up per-source overrides.
fn source_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
