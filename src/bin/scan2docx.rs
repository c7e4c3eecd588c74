//! CLI binary for scan2docx.
//!
//! A thin shim over the library crate: `convert` maps flags to
//! `ConversionConfig`, `migrate` opens the job store, and `run-job`
//! converts every pending file of a stored job.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use scan2docx::{
    convert, run_job, ConversionConfig, ConversionProgressCallback, ConversionRequest,
    CorrectionPolicy, JobLayout, PageFailurePolicy, PageSelection, ProgressCallback,
    RecognizerKind, Store, StoreConfig,
};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

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

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Progress bar over recognised pages, switched to a spinner while the
/// correction request is in flight.
struct CliProgressCallback {
    bar: ProgressBar,
    errors: AtomicUsize,
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(TICKS),
        );
        bar.set_prefix("Rasterising");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
        })
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, total_pages: usize) {
        self.bar.set_length(total_pages as u64);
        self.bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}/{len} pages  \
                 ⏱ {elapsed_precise}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(TICKS),
        );
        self.bar.set_prefix("Recognising");
    }

    fn on_page_start(&self, page_num: usize, _total: usize) {
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_page_complete(&self, page_num: usize, total: usize, line_count: usize) {
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}",
            green("✓"),
            page_num,
            total,
            dim(&format!("{line_count:>4} lines")),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, total: usize, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        let msg: String = if error.chars().count() > 80 {
            error.chars().take(79).chain(['…']).collect()
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}",
            red("✗"),
            page_num,
            total,
            red(&msg),
        ));
        self.bar.inc(1);
    }

    fn on_correction_start(&self, char_count: usize) {
        self.bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(TICKS),
        );
        self.bar.set_prefix("Correcting");
        self.bar.set_message(format!("{char_count} chars"));
    }

    fn on_conversion_complete(&self, _total_pages: usize, _success_count: usize) {
        if self.errors.load(Ordering::SeqCst) > 0 {
            self.bar.set_message("with page errors");
        }
    }
}

impl Drop for CliProgressCallback {
    fn drop(&mut self) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Scanned PDF to Word
  scan2docx convert scan.pdf -o scan.docx

  # Plain text, skip unreadable pages, keep going if LanguageTool is down
  scan2docx convert scan.pdf -o scan.txt --skip-failed-pages --best-effort-correction

  # Use a vision LLM instead of tesseract
  scan2docx convert --recognizer vision --provider openai scan.pdf -o scan.docx

  # Bring the job store to the current schema version
  scan2docx migrate --db ./data/mydb.sqlite

  # Convert every pending file of job 42
  scan2docx run-job --db ./data/mydb.sqlite --job-id 42

ENVIRONMENT VARIABLES:
  SCAN2DOCX_CORRECTOR_URL  LanguageTool /v2/check endpoint
  SCAN2DOCX_DB             Job store path
  OPENAI_API_KEY           API key for the vision recogniser (or ANTHROPIC_API_KEY, …)
  RUST_LOG                 Overrides the log filter
"#;

/// Convert scanned PDFs into editable documents.
#[derive(Parser, Debug)]
#[command(
    name = "scan2docx",
    version,
    about = "Convert scanned PDFs into editable documents (OCR + grammar correction)",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "SCAN2DOCX_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "SCAN2DOCX_QUIET")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert one scanned PDF.
    Convert {
        /// Scanned PDF to convert.
        input: PathBuf,

        /// Output document; its extension (docx, txt) picks the format.
        #[arg(short, long)]
        output: PathBuf,

        /// Disable progress bar.
        #[arg(long, env = "SCAN2DOCX_NO_PROGRESS")]
        no_progress: bool,

        /// Print the ConversionOutput as JSON on stdout.
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        opts: ConvertOpts,
    },

    /// Open the job store and run schema migrations.
    Migrate {
        #[command(flatten)]
        store: StoreOpts,
    },

    /// Convert every pending file of a stored job.
    RunJob {
        #[command(flatten)]
        store: StoreOpts,

        /// Job to run.
        #[arg(long)]
        job_id: i64,

        /// Root of `<user>/<job>/<file>` uploads.
        #[arg(long, env = "SCAN2DOCX_UPLOAD_DIR", default_value = "uploads")]
        upload_dir: PathBuf,

        /// Root of `<user>/<job>/<file>` outputs.
        #[arg(long, env = "SCAN2DOCX_OUTPUT_DIR", default_value = "output")]
        output_dir: PathBuf,

        #[command(flatten)]
        opts: ConvertOpts,
    },
}

#[derive(Args, Debug)]
struct StoreOpts {
    /// SQLite job store.
    #[arg(long, env = "SCAN2DOCX_DB", default_value = "./data/mydb.sqlite")]
    db: PathBuf,
}

#[derive(Args, Debug)]
struct ConvertOpts {
    /// Page selection: all, 5, 3-15, or 1,3,5,7.
    #[arg(long, env = "SCAN2DOCX_PAGES", default_value = "all")]
    pages: String,

    /// Longest rendered edge in pixels.
    #[arg(long, env = "SCAN2DOCX_MAX_PIXELS", default_value_t = 2000,
          value_parser = clap::value_parser!(u32).range(200..=8000))]
    max_pixels: u32,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "SCAN2DOCX_PASSWORD")]
    password: Option<String>,

    /// Text recogniser.
    #[arg(long, env = "SCAN2DOCX_RECOGNIZER", value_enum, default_value = "tesseract")]
    recognizer: RecognizerArg,

    /// Tesseract language pack(s), e.g. eng or eng+deu.
    #[arg(long, env = "SCAN2DOCX_OCR_LANG", default_value = "eng")]
    ocr_lang: String,

    /// Vision LLM model ID (vision recogniser only).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// Vision LLM provider (vision recogniser only).
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Correction language sent to LanguageTool.
    #[arg(long, env = "SCAN2DOCX_LANGUAGE", default_value = "en-US")]
    language: String,

    /// LanguageTool check endpoint.
    #[arg(long, env = "SCAN2DOCX_CORRECTOR_URL")]
    corrector_url: Option<String>,

    /// Correction request timeout in seconds.
    #[arg(long, env = "SCAN2DOCX_CORRECTION_TIMEOUT", default_value_t = 30)]
    correction_timeout: u64,

    /// Per-page recognition timeout in seconds.
    #[arg(long, env = "SCAN2DOCX_RECOGNITION_TIMEOUT", default_value_t = 120)]
    recognition_timeout: u64,

    /// Skip pages whose recognition fails instead of failing the file.
    #[arg(long)]
    skip_failed_pages: bool,

    /// Keep uncorrected text when the correction service is unavailable.
    #[arg(long)]
    best_effort_correction: bool,

    /// Files converted in parallel by run-job.
    #[arg(short, long, env = "SCAN2DOCX_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Root for per-file scratch directories (default: system temp).
    #[arg(long, env = "SCAN2DOCX_SCRATCH_DIR")]
    scratch_dir: Option<PathBuf>,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum RecognizerArg {
    Tesseract,
    Vision,
}

impl From<RecognizerArg> for RecognizerKind {
    fn from(v: RecognizerArg) -> Self {
        match v {
            RecognizerArg::Tesseract => RecognizerKind::Tesseract,
            RecognizerArg::Vision => RecognizerKind::Vision,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs for single conversions.
    let bar_active = matches!(
        cli.command,
        Command::Convert { no_progress: false, json: false, .. }
    ) && !cli.quiet;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || bar_active {
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

    match cli.command {
        Command::Convert {
            input,
            output,
            json,
            opts,
            ..
        } => {
            let progress: Option<ProgressCallback> = if bar_active {
                Some(CliProgressCallback::new() as Arc<dyn ConversionProgressCallback>)
            } else {
                None
            };
            let config = build_config(&opts, progress)?;
            let request = ConversionRequest::new(&input, &output);
            let result = convert(&request, &config)
                .await
                .with_context(|| format!("Failed to convert {}", input.display()))?;
            drop(config);

            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&result).context("Failed to serialise output")?
                );
            } else if !cli.quiet {
                let stats = &result.stats;
                eprintln!(
                    "{}  {}/{} pages  {} lines  {} edits{}  {}ms  →  {}",
                    green("✔"),
                    stats.recognized_pages,
                    stats.total_pages,
                    stats.line_count,
                    stats.edits_applied,
                    if stats.corrected { "" } else { " (uncorrected)" },
                    stats.total_duration_ms,
                    bold(&result.destination.display().to_string()),
                );
            }
        }

        Command::Migrate { store } => {
            let store = open_store(&store).await?;
            let report = store.migration_report();
            if !cli.quiet {
                println!(
                    "{}",
                    serde_json::to_string_pretty(report).context("Failed to serialise report")?
                );
            }
        }

        Command::RunJob {
            store,
            job_id,
            upload_dir,
            output_dir,
            opts,
        } => {
            let store = open_store(&store).await?;
            let config = build_config(&opts, None)?;
            let layout = JobLayout::new(upload_dir, output_dir);
            let report = run_job(&store, job_id, &layout, &config)
                .await
                .with_context(|| format!("Job {job_id} could not be run"))?;

            if !cli.quiet {
                eprintln!(
                    "{}  job {}  {}  ({} converted, {} already done, {} failed)",
                    if report.failed.is_empty() { green("✔") } else { red("✘") },
                    report.job_id,
                    bold(report.status.as_str()),
                    report.converted,
                    report.skipped,
                    report.failed.len(),
                );
                for f in &report.failed {
                    eprintln!("   {} {}  {}", red("✗"), f.file_name, dim(&f.message));
                }
            }
            if !report.failed.is_empty() {
                std::process::exit(2);
            }
        }
    }

    Ok(())
}

async fn open_store(opts: &StoreOpts) -> Result<Store> {
    Store::open(&StoreConfig::new(&opts.db))
        .await
        .with_context(|| format!("Failed to open job store {}", opts.db.display()))
}

/// Map CLI args to `ConversionConfig`.
fn build_config(opts: &ConvertOpts, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .pages(parse_pages(&opts.pages)?)
        .max_rendered_pixels(opts.max_pixels)
        .recognizer(opts.recognizer.into())
        .tesseract_language(&opts.ocr_lang)
        .language(&opts.language)
        .correction_timeout_secs(opts.correction_timeout)
        .recognition_timeout_secs(opts.recognition_timeout)
        .concurrency(opts.concurrency)
        .page_failure_policy(if opts.skip_failed_pages {
            PageFailurePolicy::Skip
        } else {
            PageFailurePolicy::Abort
        })
        .correction_policy(if opts.best_effort_correction {
            CorrectionPolicy::BestEffort
        } else {
            CorrectionPolicy::Required
        });

    if let Some(ref pwd) = opts.password {
        builder = builder.password(pwd);
    }
    if let Some(ref url) = opts.corrector_url {
        builder = builder.corrector_url(url);
    }
    if let Some(ref model) = opts.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = opts.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(ref dir) = opts.scratch_dir {
        builder = builder.scratch_root(dir);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Parse `--pages` string into `PageSelection`.
fn parse_pages(s: &str) -> Result<PageSelection> {
    let s = s.trim().to_lowercase();

    if s == "all" {
        return Ok(PageSelection::All);
    }

    // Range: "3-15"
    if let Some((start, end)) = s.split_once('-') {
        let start: usize = start.trim().parse().context("Invalid start page in range")?;
        let end: usize = end.trim().parse().context("Invalid end page in range")?;
        if start < 1 {
            anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", start);
        }
        if start > end {
            anyhow::bail!("Invalid page range '{}-{}': start must be <= end", start, end);
        }
        return Ok(PageSelection::Range(start, end));
    }

    // Set: "1,3,5,7"
    if s.contains(',') {
        let pages: Vec<usize> = s
            .split(',')
            .map(|p| {
                p.trim()
                    .parse::<usize>()
                    .with_context(|| format!("Invalid page number: '{}'", p.trim()))
            })
            .collect::<Result<Vec<_>>>()?;
        if let Some(&p) = pages.iter().find(|&&p| p < 1) {
            anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", p);
        }
        return Ok(PageSelection::Set(pages));
    }

    let page: usize = s.parse().context("Invalid page number")?;
    if page < 1 {
        anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", page);
    }
    Ok(PageSelection::Single(page))
}
