//! CLI binary for edgequake-study.
//!
//! A thin shim over the library crate that maps CLI flags onto
//! `PipelineConfig` / `GeneratorConfig`, runs one session against a
//! `FileStore` and prints a summary.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use edgequake_study::{
    extract_input, ArtifactKind, ExtractConfig, FileStore, GeneratorConfig, LlmGenerator, Phase,
    Pipeline, PipelineConfig, PipelineProgressCallback, ProgressCallback, SessionId, SessionStore,
    Source,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
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
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Live progress bar plus one log line per batch. Batches finish out of
/// order, so elapsed times are tracked per ordinal.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
}

impl CliProgressCallback {
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading source…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} batches  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Generating");
        self.bar.reset_eta();
    }

    fn elapsed_secs(&self, ordinal: usize) -> f64 {
        self.start_times
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&ordinal)
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl PipelineProgressCallback for CliProgressCallback {
    fn on_session_start(&self, total_batches: usize) {
        self.activate_bar(total_batches);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Generating study material from {total_batches} batch(es)…"))
        ));
    }

    fn on_batch_start(&self, ordinal: usize, _total: usize) {
        self.start_times
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(ordinal, Instant::now());
    }

    fn on_batch_complete(&self, ordinal: usize, total: usize, questions: usize) {
        let secs = self.elapsed_secs(ordinal);
        self.bar.println(format!(
            "  {} Batch {:>3}/{:<3}  {:<14}  {}",
            green("✓"),
            ordinal + 1,
            total,
            dim(&format!("{questions:>3} questions")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_batch_error(&self, ordinal: usize, total: usize, error: &str) {
        let secs = self.elapsed_secs(ordinal);
        self.bar.println(format!(
            "  {} Batch {:>3}/{:<3}  {}  {}",
            red("✗"),
            ordinal + 1,
            total,
            red(error),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_phase(&self, phase: Phase, percent: u8) {
        if phase != Phase::Generating && phase != Phase::Classifying {
            self.bar.set_prefix("Finishing");
        }
        self.bar.set_message(format!("{phase} ({percent}%)"));
    }

    fn on_session_complete(&self, succeeded: usize, total: usize, error: Option<&str>) {
        self.bar.finish_and_clear();
        match error {
            None if succeeded == total => eprintln!(
                "{} {} batches processed successfully",
                green("✔"),
                bold(&succeeded.to_string())
            ),
            None => eprintln!(
                "{} {}/{} batches processed  ({} missing)",
                cyan("⚠"),
                bold(&succeeded.to_string()),
                total,
                red(&(total - succeeded).to_string()),
            ),
            Some(e) => eprintln!("{} {}", red("✘"), e),
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Study material from a PDF
  studygen generate cardiology.pdf

  # From a bare topic (no document)
  studygen generate --topic "Cardiac arrhythmias"

  # From a URL, into a custom directory, with a fixed session id
  studygen generate https://example.org/notes.pdf -d out --session-id cardio-1

  # Use a specific model
  studygen generate --provider anthropic --model claude-sonnet-4-20250514 notes.txt

  # Check a session later
  studygen status cardio-1 -d out

OUTPUT LAYOUT:
  <output-dir>/<session-id>/state.json
  <output-dir>/<session-id>/question_bank.json
  <output-dir>/<session-id>/mock_test.json
  <output-dir>/<session-id>/mnemonic_set.json
  <output-dir>/<session-id>/cheat_sheet.json
  <output-dir>/<session-id>/notes.json
  <output-dir>/<session-id>/flashcards.json
  <output-dir>/<session-id>/diagnostics.json

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to libpdfium (file or directory)

Press Ctrl-C once to cancel: collected results are still saved.
"#;

/// Generate question banks, mock tests, notes and flashcards with LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "studygen",
    version,
    about = "Generate study material from documents or topics using LLMs",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "STUDYGEN_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "STUDYGEN_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Process a document or topic into study material.
    Generate(GenerateArgs),
    /// Show the persisted state of a session.
    Status {
        session_id: String,

        /// Directory holding session folders.
        #[arg(short = 'd', long, env = "STUDYGEN_OUTPUT_DIR", default_value = "sessions")]
        output_dir: PathBuf,
    },
}

#[derive(clap::Args, Debug)]
struct GenerateArgs {
    /// Local PDF or text file path, or HTTP/HTTPS URL.
    #[arg(required_unless_present = "topic", conflicts_with = "topic")]
    input: Option<String>,

    /// Generate from a bare topic instead of a document.
    #[arg(long, env = "STUDYGEN_TOPIC")]
    topic: Option<String>,

    /// Session id. Default: derived from the current time.
    #[arg(long, env = "STUDYGEN_SESSION_ID")]
    session_id: Option<String>,

    /// Directory holding session folders.
    #[arg(short = 'd', long, env = "STUDYGEN_OUTPUT_DIR", default_value = "sessions")]
    output_dir: PathBuf,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// LLM model ID (default gpt-4.1-mini).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// Number of concurrent LLM calls.
    #[arg(short, long, env = "STUDYGEN_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Retries per batch on transient or rate-limit failures.
    #[arg(long, env = "STUDYGEN_MAX_RETRIES", default_value_t = 2)]
    max_retries: u32,

    /// Overall session deadline in seconds.
    #[arg(long, env = "STUDYGEN_TIMEOUT")]
    timeout: Option<u64>,

    /// Per-call LLM timeout in seconds.
    #[arg(long, env = "STUDYGEN_API_TIMEOUT", default_value_t = 90)]
    api_timeout: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "STUDYGEN_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "STUDYGEN_PASSWORD")]
    password: Option<String>,

    /// Print the session report as JSON on stdout.
    #[arg(long, env = "STUDYGEN_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "STUDYGEN_NO_PROGRESS")]
    no_progress: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let show_progress = match &cli.command {
        Command::Generate(args) => !cli.quiet && !args.no_progress && !args.json,
        Command::Status { .. } => false,
    };
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
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
        Command::Generate(ref args) => generate(args, cli.quiet, show_progress).await,
        Command::Status {
            ref session_id,
            ref output_dir,
        } => status(session_id, output_dir).await,
    }
}

async fn generate(args: &GenerateArgs, quiet: bool, show_progress: bool) -> Result<()> {
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn PipelineProgressCallback>)
    } else {
        None
    };

    let config = build_config(args, progress_cb)?;

    let gen_config = GeneratorConfig {
        model: args.model.clone(),
        provider_name: args.provider.clone(),
        ..Default::default()
    };
    let generator = LlmGenerator::new(gen_config).context("Failed to set up LLM provider")?;

    let source = match (&args.topic, &args.input) {
        (Some(topic), _) => Source::topic(topic.clone()),
        (None, Some(input)) => {
            let extract = ExtractConfig {
                download_timeout_secs: args.download_timeout,
                password: args.password.clone(),
            };
            extract_input(input, &extract)
                .await
                .with_context(|| format!("Failed to read {input}"))?
        }
        (None, None) => anyhow::bail!("Either INPUT or --topic is required"),
    };

    let session_id = SessionId::new(
        args.session_id
            .clone()
            .unwrap_or_else(|| chrono::Local::now().format("session-%Y%m%d-%H%M%S").to_string()),
    );
    let store = Arc::new(FileStore::new(&args.output_dir));
    let pipeline = Arc::new(
        Pipeline::new(Arc::new(generator), store.clone(), config)
            .context("Invalid pipeline configuration")?,
    );

    let started = Instant::now();
    let mut handle = pipeline
        .start(session_id.clone(), source)
        .context("Failed to start session")?;

    let joined = tokio::select! {
        joined = &mut handle => joined,
        _ = tokio::signal::ctrl_c() => {
            if !quiet {
                eprintln!("{} cancelling, saving collected results…", cyan("⚠"));
            }
            pipeline
                .cancel(&session_id)
                .await
                .context("Failed to cancel session")?;
            handle.await
        }
    };
    let report = joined
        .context("Session task panicked")?
        .context("Session failed")?;

    let session_dir = store.session_dir(&session_id)?;
    if args.json {
        let json = serde_json::json!({
            "session_id": session_id,
            "state": report.state,
            "document_type": report.document_type,
            "questions": report.questions,
            "mnemonics": report.mnemonics,
            "cheat_points": report.cheat_points,
            "flashcards": report.flashcards,
            "mock_test": report.mock_test,
            "missing_batches": report.diagnostics.missing_ordinals,
            "artifacts": report.saved,
            "output_dir": session_dir,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&json).context("Failed to serialise report")?
        );
    } else if !quiet {
        eprintln!(
            "{}  {} questions  {} mnemonics  {} cheat points  {} flashcards  {}ms",
            if report.diagnostics.missing_ordinals.is_empty() {
                green("✔")
            } else {
                cyan("⚠")
            },
            report.questions,
            report.mnemonics,
            report.cheat_points,
            report.flashcards,
            started.elapsed().as_millis(),
        );
        if let Some(ref test) = report.mock_test {
            eprintln!(
                "   {}  {} questions, {} min",
                dim(&test.name),
                test.question_ids.len(),
                test.duration_minutes
            );
        }
        eprintln!("   →  {}", bold(&session_dir.display().to_string()));
    }
    Ok(())
}

async fn status(session_id: &str, output_dir: &Path) -> Result<()> {
    let store = FileStore::new(output_dir);
    let id = SessionId::new(session_id);
    let state = store
        .load_state(&id)
        .await
        .context("Failed to read session state")?
        .with_context(|| format!("No session '{session_id}' under {}", output_dir.display()))?;

    println!("Session:      {}", state.session_id);
    println!("Status:       {}", state.status);
    println!("Phase:        {}", state.phase);
    println!("Progress:     {}%", state.percent);
    if let Some(doc) = state.document_type {
        println!("Document:     {}", doc);
    }
    println!(
        "Batches:      {}/{} done, {} failed",
        state.batches_done, state.batches_total, state.batches_failed
    );
    if let Some(ref e) = state.error_message {
        println!("Error:        {}", e);
    }

    let mut present = Vec::new();
    for kind in ArtifactKind::ALL {
        if store.load(&id, kind).await?.is_some() {
            present.push(kind.as_str());
        }
    }
    println!("Artifacts:    {}", present.join(", "));
    Ok(())
}

/// Map CLI args to `PipelineConfig`.
fn build_config(args: &GenerateArgs, progress: Option<ProgressCallback>) -> Result<PipelineConfig> {
    let mut builder = PipelineConfig::builder()
        .concurrency(args.concurrency)
        .max_retries(args.max_retries)
        .api_timeout_secs(args.api_timeout);
    if let Some(secs) = args.timeout {
        builder = builder.session_timeout_secs(secs);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }
    builder.build().context("Invalid configuration")
}
