//! Command-line front end: select images, run one batch, export the rows.

use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};

use crate::config::{DEFAULT_EXPORT_FILE, IMAGE_EXTENSIONS};
use crate::models::LabelResult;
use crate::pipeline::batch::{BatchProcessor, BatchSummary, ProgressSink};
use crate::pipeline::export::{export, CsvSink};
use crate::pipeline::vision::gemini::DEFAULT_GEMINI_MODEL;
use crate::pipeline::vision::{DEFAULT_OLLAMA_MODEL, DEFAULT_OLLAMA_URL};
use crate::pipeline_config::{ProcessorConfig, VisionBackend};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendKind {
    Ollama,
    Gemini,
}

/// Read tracking and phone numbers from shipping-label photos.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Image files or directories of images (jpg, jpeg, png)
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Maximum vision requests per minute
    #[arg(long, default_value_t = 10)]
    pub rpm: u32,

    /// Worker threads
    #[arg(long, default_value_t = 5)]
    pub workers: usize,

    /// Attempts per image, including the first
    #[arg(long, default_value_t = 2)]
    pub retries: u32,

    /// Longest image edge sent to the model, in pixels
    #[arg(long, default_value_t = 1024)]
    pub max_dimension: u32,

    /// Cap on request permits banked while idle
    #[arg(long)]
    pub max_banked: Option<u32>,

    #[arg(long, value_enum, default_value_t = BackendKind::Ollama)]
    pub backend: BackendKind,

    /// Vision model name (backend default if omitted)
    #[arg(long)]
    pub model: Option<String>,

    #[arg(long, default_value = DEFAULT_OLLAMA_URL)]
    pub ollama_url: String,

    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub gemini_api_key: Option<String>,

    /// CSV file to write
    #[arg(short, long, default_value = DEFAULT_EXPORT_FILE)]
    pub output: PathBuf,
}

impl Cli {
    pub fn processor_config(&self) -> ProcessorConfig {
        ProcessorConfig {
            rpm_limit: self.rpm,
            num_workers: self.workers,
            max_retries: self.retries,
            max_image_dimension: self.max_dimension,
            max_banked_permits: self.max_banked,
            ..ProcessorConfig::default()
        }
    }

    pub fn backend(&self) -> VisionBackend {
        match self.backend {
            BackendKind::Ollama => VisionBackend::Ollama {
                base_url: self.ollama_url.clone(),
                model: self
                    .model
                    .clone()
                    .unwrap_or_else(|| DEFAULT_OLLAMA_MODEL.to_string()),
            },
            BackendKind::Gemini => VisionBackend::Gemini {
                api_key: self.gemini_api_key.clone().unwrap_or_default(),
                model: self
                    .model
                    .clone()
                    .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            },
        }
    }
}

/// Run one batch end to end.
pub fn execute(cli: Cli) -> anyhow::Result<()> {
    let paths = collect_image_paths(&cli.inputs)?;
    if paths.is_empty() {
        bail!("No jpg/jpeg/png images found in the given inputs");
    }

    let backend = cli.backend();
    let client = backend
        .build_client()
        .context("Could not initialise the vision client")?;
    let sink: Arc<dyn ProgressSink> = Arc::new(ConsoleProgressSink::new(std::io::stdout()));
    let processor =
        BatchProcessor::start(&cli.processor_config(), client, backend.model(), sink)?;

    let handle = processor.submit(paths)?;
    let batch = handle.wait()?;

    let rows = export(&batch, &CsvSink, &cli.output)
        .with_context(|| format!("Export to {} failed", cli.output.display()))?;
    println!("Exported {rows} rows to {}", cli.output.display());
    Ok(())
}

/// Expand inputs into image files. Directories are scanned one level deep,
/// in name order. Repeated paths are kept once, first occurrence wins.
pub fn collect_image_paths(inputs: &[PathBuf]) -> anyhow::Result<Vec<PathBuf>> {
    let mut seen = HashSet::new();
    let mut paths = Vec::new();

    for input in inputs {
        if input.is_dir() {
            let mut entries: Vec<PathBuf> = std::fs::read_dir(input)
                .with_context(|| format!("Cannot read directory {}", input.display()))?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|path| path.is_file() && has_image_extension(path))
                .collect();
            entries.sort();
            for path in entries {
                if seen.insert(path.clone()) {
                    paths.push(path);
                }
            }
        } else if input.is_file() {
            if seen.insert(input.clone()) {
                paths.push(input.clone());
            } else {
                tracing::debug!(path = %input.display(), "Skipping repeated input");
            }
        } else {
            bail!("Input not found: {}", input.display());
        }
    }

    Ok(paths)
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|allowed| ext.eq_ignore_ascii_case(allowed))
        })
}

/// Human-readable outcome block for one result.
pub fn format_outcome(result: &LabelResult) -> String {
    match &result.error {
        Some(error) => format!("File: {}\n  -> ERROR: {error}\n", result.identifier),
        None => format!(
            "File: {}\n  -> Tracking Number: {}\n  -> Phone Number: {}\n",
            result.identifier, result.fields.tracking_number, result.fields.phone_number
        ),
    }
}

/// Prints each outcome as it arrives.
pub struct ConsoleProgressSink<W: Write + Send> {
    out: Mutex<W>,
}

impl<W: Write + Send> ConsoleProgressSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<W: Write + Send> ProgressSink for ConsoleProgressSink<W> {
    fn report(&self, result: &LabelResult, completed: usize, total: usize) {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = writeln!(out, "[{completed}/{total}] {}", format_outcome(result)) {
            tracing::warn!(error = %e, "Failed to print progress");
        }
    }

    fn batch_finished(&self, summary: &BatchSummary) {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        let elapsed = Duration::from_millis(summary.duration_ms);
        let _ = writeln!(
            out,
            "Done: {} labels, {} failed, {:.1}s",
            summary.total,
            summary.failed,
            elapsed.as_secs_f64()
        );
        let _ = out.flush();
    }
}
