//! CLI binary for ocr-batch.
//!
//! A thin shim over the library crate that maps CLI flags to `OcrConfig`,
//! runs single files or batches, and prints results.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use ocr_batch::descriptor::is_url;
use ocr_batch::{
    FileDescriptor, JobProgressCallback, JobStatus, OcrConfig, OcrService, ProgressCallback,
    TaskResult,
};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress for a batch: a spinner until the runner picks the job
/// up, then a bar with one log line per finished file.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Per-file wall-clock start times, keyed by submission index.
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Queued");
        bar.set_message("Waiting for a worker…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} files  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Recognising");
        self.bar.reset_eta();
    }

    fn elapsed_secs(&self, index: usize) -> f64 {
        let started = match self.start_times.lock() {
            Ok(mut times) => times.remove(&index),
            Err(_) => None,
        };
        started.map(|t| t.elapsed().as_secs_f64()).unwrap_or(0.0)
    }
}

impl JobProgressCallback for CliProgressCallback {
    fn on_job_start(&self, _job_id: &str, total_files: usize) {
        self.activate_bar(total_files);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Starting batch of {total_files} files…"))
        ));
    }

    fn on_file_start(&self, _job_id: &str, index: usize, total_files: usize) {
        if let Ok(mut times) = self.start_times.lock() {
            times.insert(index, Instant::now());
        }
        self.bar.set_message(format!("file {}/{}", index + 1, total_files));
    }

    fn on_file_complete(&self, _job_id: &str, index: usize, total_files: usize, result: &TaskResult) {
        let elapsed = self.elapsed_secs(index);
        match &result.error {
            None => self.bar.println(format!(
                "  {} {:>3}/{:<3}  {:<32}  {}  {}",
                green("✓"),
                index + 1,
                total_files,
                truncate(&result.filename, 32),
                dim(&format!("{:>5} words", result.word_count())),
                dim(&format!("{elapsed:.1}s")),
            )),
            Some(error) => {
                self.errors.fetch_add(1, Ordering::SeqCst);
                self.bar.println(format!(
                    "  {} {:>3}/{:<3}  {:<32}  {}  {}",
                    red("✗"),
                    index + 1,
                    total_files,
                    truncate(&result.filename, 32),
                    red(&truncate(error, 80)),
                    dim(&format!("{elapsed:.1}s")),
                ));
            }
        }
        self.bar.inc(1);
    }

    fn on_job_complete(&self, _job_id: &str, status: JobStatus) {
        self.bar.finish_and_clear();
        let failed = self.errors.load(Ordering::SeqCst);
        let total = self.bar.length().unwrap_or(0) as usize;
        if status == JobStatus::Failed {
            eprintln!("{} batch failed", red("✘"));
        } else if failed == 0 {
            eprintln!("{} {} files recognised", green("✔"), bold(&total.to_string()));
        } else {
            eprintln!(
                "{} {}/{} files recognised  ({} failed)",
                if failed == total { red("✘") } else { cyan("⚠") },
                bold(&total.saturating_sub(failed).to_string()),
                total,
                red(&failed.to_string()),
            );
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let head: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{head}\u{2026}")
    } else {
        s.to_string()
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Recognise one image (text to stdout)
  ocr-batch file scan.png

  # German PDF from a URL, full result as JSON
  ocr-batch --lang de file https://example.com/brief.pdf --json

  # Batch of local files and URLs
  ocr-batch batch a.png b.pdf https://example.com/c.jpg

  # Batch from a JSON manifest: [{"filepath": ...}, {"url": ...}, {"base64": ..., "filename": ...}]
  ocr-batch batch --manifest files.json --json > job.json

  # Installed languages and engine version
  ocr-batch languages
  ocr-batch version

SUPPORTED FORMATS:
  png jpg jpeg gif bmp tiff webp pnm pdf

ENVIRONMENT VARIABLES:
  OCR_LANG               Default language code (en, de, zh-TW, eng, …)
  OCR_UPLOAD_DIR         Directory for temp files and permanent PDF copies
  OCR_TESSERACT_CMD      tesseract executable to invoke
  OCR_PUBLIC_PREFIX      URL prefix under which stored PDFs are served
  PDFIUM_LIB_PATH        Directory containing the pdfium shared library
  RUST_LOG               Override the log filter
"#;

/// Recognise text in images and PDFs.
#[derive(Parser, Debug)]
#[command(
    name = "ocr-batch",
    version,
    about = "Recognise text in images and PDFs, singly or in batches",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// Default language code for files that don't name one.
    #[arg(short, long, global = true, env = "OCR_LANG", default_value = "en")]
    lang: String,

    /// Directory for temp files and permanent PDF copies.
    #[arg(long, global = true, env = "OCR_UPLOAD_DIR", default_value = "./static/uploads")]
    upload_dir: PathBuf,

    /// tesseract executable.
    #[arg(long, global = true, env = "OCR_TESSERACT_CMD", default_value = "tesseract")]
    tesseract_cmd: String,

    /// URL prefix under which stored PDF copies are served.
    #[arg(long, global = true, env = "OCR_PUBLIC_PREFIX")]
    public_prefix: Option<String>,

    /// HTTP download timeout in seconds.
    #[arg(long, global = true, env = "OCR_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Longest edge of rendered PDF pages in pixels.
    #[arg(long, global = true, env = "OCR_MAX_PIXELS", default_value_t = 2000)]
    max_pixels: u32,

    /// Output structured JSON instead of plain text.
    #[arg(long, global = true)]
    json: bool,

    /// Disable progress bar.
    #[arg(long, global = true, env = "OCR_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "OCR_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "OCR_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Recognise a single file or URL and print its text.
    File {
        /// Local file path or HTTP/HTTPS URL.
        input: String,
    },
    /// Recognise several files as one background job.
    Batch {
        /// Local file paths or HTTP/HTTPS URLs.
        inputs: Vec<String>,

        /// JSON manifest: an array of file entries or `{"files": [...]}`.
        #[arg(long, conflicts_with = "inputs")]
        manifest: Option<PathBuf>,
    },
    /// List installed recognition languages.
    Languages,
    /// Print the recognition engine version.
    Version,
}

fn descriptor_for(input: &str) -> FileDescriptor {
    if is_url(input) {
        FileDescriptor::url(input)
    } else {
        FileDescriptor::path(input)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let common = &cli.common;

    // ── Logging setup ────────────────────────────────────────────────────
    let is_batch = matches!(cli.command, Command::Batch { .. });
    let show_progress = is_batch && !common.quiet && !common.no_progress && !common.json;
    let filter = if common.verbose {
        "debug"
    } else if common.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build service ────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new_dynamic() as Arc<dyn JobProgressCallback>)
    } else {
        None
    };
    let config = build_config(common, progress_cb)?;
    let service = OcrService::new(config).context("Failed to start OCR service")?;

    match &cli.command {
        Command::File { input } => run_file(&service, common, input).await,
        Command::Batch { inputs, manifest } => {
            run_batch(&service, common, inputs, manifest.as_ref()).await
        }
        Command::Languages => {
            let langs = service
                .languages()
                .await
                .context("Failed to list languages")?;
            if common.json {
                println!("{}", serde_json::to_string_pretty(&langs)?);
            } else {
                for lang in langs {
                    println!("{lang}");
                }
            }
            Ok(())
        }
        Command::Version => {
            let version = service.engine_version().await;
            if common.json {
                println!("{}", serde_json::json!({ "engine_version": version }));
            } else {
                println!("{version}");
            }
            Ok(())
        }
    }
}

async fn run_file(service: &OcrService, common: &CommonArgs, input: &str) -> Result<()> {
    let result = service.recognize(&descriptor_for(input)).await;

    if common.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&result).context("Failed to serialise result")?
        );
    } else if let Some(text) = &result.text {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(text.as_bytes())
            .context("Failed to write to stdout")?;
        if !text.ends_with('\n') {
            handle.write_all(b"\n").ok();
        }
    }

    if let Some(error) = &result.error {
        anyhow::bail!("{}: {}", result.filename, error);
    }
    if !common.quiet && !common.json {
        eprintln!(
            "{}  {} pages  {} words  {}ms  {}",
            green("✔"),
            result.pages.len(),
            result.word_count(),
            result.duration_ms,
            dim(&result.engine_version),
        );
    }
    Ok(())
}

async fn run_batch(
    service: &OcrService,
    common: &CommonArgs,
    inputs: &[String],
    manifest: Option<&PathBuf>,
) -> Result<()> {
    let receipt = match manifest {
        Some(path) => {
            let raw = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read manifest {:?}", path))?;
            let payload: serde_json::Value =
                serde_json::from_str(&raw).context("Manifest is not valid JSON")?;
            service.submit_json(payload)
        }
        None => service.submit(inputs.iter().map(|i| descriptor_for(i)).collect()),
    }
    .context("Batch rejected")?;

    if !common.quiet && !common.json {
        eprintln!("{} job {}", cyan("◆"), dim(&receipt.job_id));
    }

    service.drain().await;
    let job = service
        .status(&receipt.job_id)
        .context("Job vanished from the job table")?;

    if common.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&job).context("Failed to serialise job")?
        );
    } else {
        for result in &job.results {
            match (&result.text, &result.error) {
                (_, Some(error)) => println!("── {} ── {}", result.filename, red(error)),
                (Some(text), None) => println!("── {} ──\n{}", bold(&result.filename), text.trim_end()),
                (None, None) => println!("── {} ──", result.filename),
            }
        }
    }

    if job.status == JobStatus::Failed {
        anyhow::bail!(
            "job {} failed: {}",
            job.job_id,
            job.error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}

/// Map CLI args to `OcrConfig`.
fn build_config(common: &CommonArgs, progress: Option<ProgressCallback>) -> Result<OcrConfig> {
    let mut builder = OcrConfig::builder()
        .upload_dir(&common.upload_dir)
        .default_language(&common.lang)
        .tesseract_cmd(&common.tesseract_cmd)
        .download_timeout_secs(common.download_timeout)
        .max_rendered_pixels(common.max_pixels);

    if let Some(prefix) = &common.public_prefix {
        builder = builder.public_prefix(prefix);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
