//! CLI binary for edgequake-video2deck.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `PipelineConfig`, runs one job through the queue and prints the record.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use edgequake_video2deck::flashcards;
use edgequake_video2deck::pipeline::{LlmClient, LlmNotesSynthesizer};
use edgequake_video2deck::{
    Collaborators, FileJobStore, Job, JobProgressCallback, JobQueue, JobStatus, JobStore,
    Orchestrator, PipelineConfig, ProgressCallback, Stage, Submitter,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
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

/// Renders the job's persisted progress (0–100) as a bar, with one log
/// line per checkpoint above it.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(100);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}%  {msg}  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);
        bar.set_style(style);
        bar.set_prefix("Waiting");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl JobProgressCallback for CliProgressCallback {
    fn on_job_start(&self, job_id: &str) {
        self.bar.set_prefix("Processing");
        self.bar
            .println(format!("{} {}", cyan("◆"), bold(&format!("Job {job_id}"))));
    }

    fn on_stage_complete(&self, _job_id: &str, stage: Stage, progress: u8) {
        self.bar.set_position(u64::from(progress));
        self.bar.set_message(stage.label());
        self.bar.println(format!(
            "  {} {:<20} {}",
            green("✓"),
            stage.label(),
            dim(&format!("{progress:>3}%"))
        ));
    }

    fn on_stage_degraded(&self, _job_id: &str, stage: Stage, reason: &str) {
        let reason: String = if reason.chars().count() > 80 {
            format!("{}\u{2026}", reason.chars().take(79).collect::<String>())
        } else {
            reason.to_string()
        };
        self.bar
            .println(format!("  {} {:<20} {}", cyan("⚠"), stage.label(), dim(&reason)));
    }

    fn on_job_done(&self, _job_id: &str) {
        self.bar.finish_and_clear();
        eprintln!("{} job done", green("✔"));
    }

    fn on_job_failed(&self, _job_id: &str, error: &str) {
        self.bar.finish_and_clear();
        eprintln!("{} job failed: {}", red("✘"), red(error));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Process a local recording
  video2deck run lecture.mp4

  # Fetch a remote video, print the job as JSON
  video2deck run https://example.com/talk.mp4 --json > job.json

  # Keep fewer, more distinct slides
  video2deck --max-keep 15 --dedup-distance 12 run lecture.mp4

  # Look up a job later
  video2deck status 3f2b6c1e-...

  # Flashcards from a finished job
  video2deck flashcards 3f2b6c1e-... > cards.json

REQUIRED TOOLS:
  ffmpeg      frame sampling and audio extraction
  tesseract   OCR for slide text density
  libpdfium   PDF assembly (system library or --pdfium-dir)

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key (vision classification + notes)
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  GROQ_API_KEY            Key for the default Whisper endpoint
  VIDEO2DECK_PDFIUM_DIR   Directory holding libpdfium
"#;

/// Turn lecture videos into slide decks, transcripts and notes.
#[derive(Parser, Debug)]
#[command(
    name = "video2deck",
    version,
    about = "Turn lecture videos into deduplicated slide decks, transcripts and notes",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    opts: Opts,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Submit a video (file path or HTTP/HTTPS URL) and wait for the job.
    Run {
        input: String,

        /// Print the final job record as JSON.
        #[arg(long, env = "VIDEO2DECK_JSON")]
        json: bool,

        /// Disable progress bar.
        #[arg(long, env = "VIDEO2DECK_NO_PROGRESS")]
        no_progress: bool,
    },
    /// Print a persisted job record.
    Status {
        job_id: String,

        #[arg(long)]
        json: bool,
    },
    /// Generate flashcards (JSON) from a finished job's notes and transcript.
    Flashcards { job_id: String },
}

#[derive(Args, Debug)]
struct Opts {
    /// Base directory for uploads, frames, slides and job records.
    #[arg(long, global = true, env = "VIDEO2DECK_UPLOAD_ROOT", default_value = "uploads")]
    upload_root: PathBuf,

    /// Job record directory. Default: <upload-root>/jobs.
    #[arg(long, global = true, env = "VIDEO2DECK_JOBS_DIR")]
    jobs_dir: Option<PathBuf>,

    /// LLM model ID for vision classification and notes.
    #[arg(long, global = true, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, global = true, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Maximum number of slides kept.
    #[arg(long, global = true, env = "VIDEO2DECK_MAX_KEEP", default_value_t = 30)]
    max_keep: usize,

    /// Hamming distance at or below which two frames count as the same slide.
    #[arg(long, global = true, env = "VIDEO2DECK_DEDUP_DISTANCE", default_value_t = 8)]
    dedup_distance: u32,

    /// Concurrent frame classifications.
    #[arg(short, long, global = true, env = "VIDEO2DECK_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Seconds between sampled frames.
    #[arg(long, global = true, env = "VIDEO2DECK_FRAME_INTERVAL", default_value_t = 2.0)]
    frame_interval: f32,

    #[arg(long, global = true, env = "VIDEO2DECK_FFMPEG", default_value = "ffmpeg")]
    ffmpeg: PathBuf,

    #[arg(long, global = true, env = "VIDEO2DECK_TESSERACT", default_value = "tesseract")]
    tesseract: PathBuf,

    /// Tesseract language code.
    #[arg(long, global = true, env = "VIDEO2DECK_OCR_LANG", default_value = "eng")]
    ocr_lang: String,

    /// Whisper-compatible API base URL.
    #[arg(long, global = true, env = "VIDEO2DECK_TRANSCRIPTION_URL")]
    transcription_url: Option<String>,

    #[arg(long, global = true, env = "VIDEO2DECK_TRANSCRIPTION_MODEL")]
    transcription_model: Option<String>,

    /// Directory holding the pdfium shared library.
    #[arg(long, global = true, env = "VIDEO2DECK_PDFIUM_DIR")]
    pdfium_dir: Option<PathBuf>,

    /// HTTP download timeout in seconds.
    #[arg(long, global = true, env = "VIDEO2DECK_DOWNLOAD_TIMEOUT", default_value_t = 600)]
    download_timeout: u64,

    /// Per external call timeout in seconds.
    #[arg(long, global = true, env = "VIDEO2DECK_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// Retries on LLM failure.
    #[arg(long, global = true, env = "VIDEO2DECK_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "VIDEO2DECK_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "VIDEO2DECK_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level library logs when it is shown.
    let show_progress = match cli.command {
        Command::Run {
            json, no_progress, ..
        } => !cli.opts.quiet && !no_progress && !json,
        _ => false,
    };
    let filter = if cli.opts.verbose {
        "debug"
    } else if cli.opts.quiet || show_progress {
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

    let jobs_dir = cli
        .opts
        .jobs_dir
        .clone()
        .unwrap_or_else(|| cli.opts.upload_root.join("jobs"));
    let store = Arc::new(
        FileJobStore::open(&jobs_dir)
            .await
            .with_context(|| format!("Failed to open job store at {}", jobs_dir.display()))?,
    );

    match cli.command {
        Command::Run { ref input, json, .. } => {
            let progress_cb: Option<ProgressCallback> = if show_progress {
                Some(CliProgressCallback::new() as Arc<dyn JobProgressCallback>)
            } else {
                None
            };
            let config = build_config(&cli.opts, progress_cb)?;
            let job = run(input, config, store).await?;
            print_job(&job, json)?;
            if job.status == JobStatus::Failed {
                std::process::exit(1);
            }
        }
        Command::Status { ref job_id, json } => {
            let job = store
                .find(job_id)
                .await
                .context("Failed to read job store")?
                .with_context(|| format!("Job '{job_id}' not found in {}", jobs_dir.display()))?;
            print_job(&job, json)?;
        }
        Command::Flashcards { ref job_id } => {
            let job = store
                .find(job_id)
                .await
                .context("Failed to read job store")?
                .with_context(|| format!("Job '{job_id}' not found in {}", jobs_dir.display()))?;
            if job.status != JobStatus::Done {
                bail!("Job '{}' is {}, flashcards need a finished job", job.id, job.status);
            }
            let config = build_config(&cli.opts, None)?;
            let synth = LlmNotesSynthesizer::new(Arc::new(LlmClient::from_config(&config)), &config);
            let cards = flashcards::generate(&synth, &job.final_notes, &job.transcript).await;
            if let Some(reason) = cards.reason() {
                bail!("Flashcard generation failed: {reason}");
            }
            println!(
                "{}",
                serde_json::to_string_pretty(cards.value()).context("Failed to serialise flashcards")?
            );
        }
    }

    Ok(())
}

/// Submit `input`, let the queue run it, and return the terminal record.
async fn run(input: &str, config: PipelineConfig, store: Arc<FileJobStore>) -> Result<Job> {
    let collab = Collaborators::from_config(&config, store.clone())
        .context("Failed to set up pipeline collaborators")?;
    let fetcher = collab.fetcher.clone();
    let orchestrator = Arc::new(Orchestrator::new(config, collab));
    let queue = JobQueue::start(orchestrator);
    let submitter = Submitter::new(store.clone(), queue.clone(), fetcher);

    let submitted = submitter.submit(input).await.context("Submission failed")?;
    eprintln!("{} submitted job {}", cyan("◆"), bold(&submitted.id));

    let job = loop {
        let job = store
            .find(&submitted.id)
            .await
            .context("Failed to read job store")?
            .with_context(|| format!("Job '{}' disappeared", submitted.id))?;
        if job.status.is_terminal() {
            break job;
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    };

    queue.shutdown().await;
    Ok(job)
}

fn print_job(job: &Job, json: bool) -> Result<()> {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(job).context("Failed to serialise job")?
        );
        return Ok(());
    }

    let status = match job.status {
        JobStatus::Done => green(&job.status.to_string()),
        JobStatus::Failed => red(&job.status.to_string()),
        _ => cyan(&job.status.to_string()),
    };
    println!("Job:         {}", job.id);
    println!("Status:      {} ({}%)", status, job.progress);
    if let Some(ref source) = job.source {
        println!("Source:      {}", source);
    }
    println!("Slides:      {}", job.selected_frames.len());
    for frame in &job.selected_frames {
        println!("             {}", dim(frame));
    }
    match job.slides_pdf {
        Some(ref pdf) => println!("PDF:         {}", pdf),
        None => println!("PDF:         {}", dim("none")),
    }
    println!(
        "Transcript:  {} chars, {} words",
        job.transcript.chars().count(),
        job.transcription.words.len()
    );
    if let Some(ref error) = job.error {
        println!("Error:       {}", red(error));
    }
    println!("Updated:     {}", job.updated_at.to_rfc3339());
    if !job.final_notes.is_empty() {
        println!();
        println!("{}", job.final_notes.trim_end());
    }
    Ok(())
}

/// Map CLI args to `PipelineConfig`.
fn build_config(opts: &Opts, progress: Option<ProgressCallback>) -> Result<PipelineConfig> {
    let mut builder = PipelineConfig::builder()
        .upload_root(&opts.upload_root)
        .max_keep(opts.max_keep)
        .dedup_distance(opts.dedup_distance)
        .classify_concurrency(opts.concurrency)
        .frame_interval_secs(opts.frame_interval)
        .ffmpeg_bin(&opts.ffmpeg)
        .tesseract_bin(&opts.tesseract)
        .ocr_language(&opts.ocr_lang)
        .download_timeout_secs(opts.download_timeout)
        .api_timeout_secs(opts.api_timeout)
        .max_retries(opts.max_retries);

    if let Some(ref model) = opts.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = opts.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(ref url) = opts.transcription_url {
        builder = builder.transcription_base_url(url);
    }
    if let Some(ref model) = opts.transcription_model {
        builder = builder.transcription_model(model);
    }
    if let Some(ref dir) = opts.pdfium_dir {
        builder = builder.pdfium_dir(dir);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
