//! CLI binary for printfit.
//!
//! A thin shim over the library crate that maps CLI flags to a
//! `PrintConfig`, runs one batch and writes the artifacts to a directory.

use anyhow::{bail, Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use printfit::{
    generate, publish, Collaborators, FitMode, FsBlobStore, GenerationRequest,
    HttpImageGenerator, ImageGenerator, PipelineObserver, PrintConfig, StageEvent, StageStatus,
    StaticImageSource,
};
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
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
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
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

// ── CLI observer using indicatif ─────────────────────────────────────────────

/// Terminal observer: a spinner while acquiring, then one bar tick per
/// finished candidate. Candidates complete out of order.
struct CliObserver {
    bar: ProgressBar,
    total: AtomicUsize,
    processing: AtomicBool,
    /// Per-candidate start times for elapsed reporting.
    start_times: Mutex<HashMap<usize, Instant>>,
    /// Optional stages skipped per candidate.
    skipped: Mutex<HashMap<usize, Vec<String>>>,
}

impl CliObserver {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Acquiring");
        bar.set_message("waiting for the generator…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            total: AtomicUsize::new(0),
            processing: AtomicBool::new(false),
            start_times: Mutex::new(HashMap::new()),
            skipped: Mutex::new(HashMap::new()),
        })
    }

    /// Switch to the full bar once the first candidate starts.
    fn activate_bar(&self) {
        if self.processing.swap(true, Ordering::SeqCst) {
            return;
        }
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} candidates  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(self.total.load(Ordering::SeqCst) as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Preparing");
    }

    fn elapsed_secs(&self, index: usize) -> f64 {
        self.start_times
            .lock()
            .map(|mut m| m.remove(&index))
            .ok()
            .flatten()
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl PipelineObserver for CliObserver {
    fn on_batch_start(&self, target: usize) {
        self.total.store(target, Ordering::SeqCst);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Preparing {target} print candidate(s)…"))
        ));
    }

    fn on_acquisition_attempt(&self, attempt: u32, requested: usize, received: usize) {
        self.bar
            .set_message(format!("attempt {attempt}: {received}/{requested} images"));
        if received < requested {
            self.bar.println(format!(
                "  {} attempt {} returned {}/{} images",
                yellow("…"),
                attempt,
                received,
                requested
            ));
        }
    }

    fn on_stage(&self, event: &StageEvent) {
        self.activate_bar();
        match &event.status {
            StageStatus::Started => {
                if let Ok(mut m) = self.start_times.lock() {
                    m.entry(event.candidate).or_insert_with(Instant::now);
                }
                self.bar
                    .set_message(format!("#{} {}", event.candidate, event.stage));
            }
            StageStatus::Finished(outcome) if !outcome.is_ok() && !event.stage.is_mandatory() => {
                if let Ok(mut m) = self.skipped.lock() {
                    m.entry(event.candidate)
                        .or_default()
                        .push(event.stage.to_string());
                }
            }
            StageStatus::Finished(_) => {}
        }
    }

    fn on_candidate_complete(&self, index: usize) {
        let secs = self.elapsed_secs(index);
        let skipped = self
            .skipped
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&index))
            .map(|s| format!("  skipped: {}", s.join(", ")))
            .unwrap_or_default();
        self.bar.println(format!(
            "  {} Candidate {:>2}  {}{}",
            green("✓"),
            index,
            dim(&format!("{secs:.1}s")),
            yellow(&skipped),
        ));
        self.bar.inc(1);
    }

    fn on_candidate_failed(&self, index: usize, error: &str) {
        let secs = self.elapsed_secs(index);
        // Keep long errors on one line.
        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} Candidate {:>2}  {}  {}",
            red("✗"),
            index,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total: usize, succeeded: usize) {
        let failed = total.saturating_sub(succeeded);
        self.bar.finish_and_clear();
        if failed == 0 {
            eprintln!(
                "{} {} candidate(s) ready",
                green("✔"),
                bold(&succeeded.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} candidates ready  ({} dropped)",
                if succeeded == 0 { red("✘") } else { cyan("⚠") },
                bold(&succeeded.to_string()),
                total,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Three 8x10 in @ 300 DPI candidates from an HTTP generator
  printfit "a lighthouse at dusk, linocut" --endpoint https://gen.local/v1/images -n 3

  # Re-fit existing artwork to a 5x7 card with 1/8 in bleed
  printfit --input art.png --width 5 --height 7 --bleed 0.125

  # Fill the trim box instead of letterboxing
  printfit --input poster.jpg --fit cover --out-dir ./prints

  # Machine-readable summary
  printfit --input a.png --input b.webp --json > batch.json

OUTPUT:
  For each surviving candidate N, written to --out-dir:
    <slug>-N.png        final raster (trim + bleed, DPI tagged)
    <slug>-N-proof.png  same with trim (red) and safe (green) guides
    <slug>-N.svg        vector rendition, when vectorization ran

ENVIRONMENT VARIABLES:
  PRINTFIT_ENDPOINT    Generator endpoint (POST {"prompt","n","size"})
  PRINTFIT_API_TOKEN   Bearer token sent to the generator
  PRINTFIT_OUT_DIR     Output directory
  RUST_LOG             Override the log filter
"#;

/// Fit generated artwork to exact print dimensions.
#[derive(Parser, Debug)]
#[command(
    name = "printfit",
    version,
    about = "Fit generated artwork to exact print dimensions",
    long_about = "Generate or load artwork and turn every image into a print-ready raster: \
exact trim size at the requested DPI, a transparent bleed band, and an optional proof \
with trim and safe-area guides.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Prompt sent to the generator; also names the output files.
    prompt: Option<String>,

    /// Use existing images (paths or URLs) instead of a generator.
    #[arg(short, long = "input", env = "PRINTFIT_INPUT", value_delimiter = ',')]
    inputs: Vec<String>,

    /// Image generator endpoint.
    #[arg(long, env = "PRINTFIT_ENDPOINT", conflicts_with = "inputs")]
    endpoint: Option<String>,

    /// Bearer token for the generator endpoint.
    #[arg(long, env = "PRINTFIT_API_TOKEN", hide_env_values = true)]
    api_token: Option<String>,

    /// Trim width in inches.
    #[arg(long, env = "PRINTFIT_WIDTH", default_value_t = 8.0)]
    width: f64,

    /// Trim height in inches.
    #[arg(long, env = "PRINTFIT_HEIGHT", default_value_t = 10.0)]
    height: f64,

    /// Output resolution (72–2400).
    #[arg(long, env = "PRINTFIT_DPI", default_value_t = 300,
          value_parser = clap::value_parser!(u32).range(72..=2400))]
    dpi: u32,

    /// Bleed in inches on every side.
    #[arg(long, env = "PRINTFIT_BLEED", default_value_t = 0.125)]
    bleed: f64,

    /// Transparent margin as a fraction of the shorter side.
    #[arg(long, env = "PRINTFIT_MARGIN", default_value_t = 0.05)]
    margin: f64,

    /// Safe-area inset inside the trim, in inches (proof guides only).
    #[arg(long, env = "PRINTFIT_SAFETY", default_value_t = 0.125)]
    safety: f64,

    /// Number of candidates. Defaults to one per --input, else 1.
    #[arg(short = 'n', long, env = "PRINTFIT_COUNT")]
    count: Option<usize>,

    /// How the artwork fills the trim box.
    #[arg(long, env = "PRINTFIT_FIT", value_enum, default_value = "contain")]
    fit: FitArg,

    /// Skip the proof overlay.
    #[arg(long, env = "PRINTFIT_NO_PROOF")]
    no_proof: bool,

    /// Request background removal (needs a configured remover).
    #[arg(long)]
    remove_background: bool,

    /// Request vectorization (needs a configured vectorizer).
    #[arg(long)]
    vectorize: bool,

    /// Candidates processed concurrently.
    #[arg(short, long, env = "PRINTFIT_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Generator attempts before giving up on a short batch.
    #[arg(long, env = "PRINTFIT_MAX_ATTEMPTS", default_value_t = 6)]
    max_attempts: u32,

    /// Pause after an attempt that returned nothing, in milliseconds.
    #[arg(long, env = "PRINTFIT_RETRY_BACKOFF_MS", default_value_t = 1000)]
    retry_backoff_ms: u64,

    /// Directory the artifacts are written to.
    #[arg(short, long, env = "PRINTFIT_OUT_DIR", default_value = "printfit-out")]
    out_dir: PathBuf,

    /// Print a JSON summary (batch + artifacts) on stdout.
    #[arg(long, env = "PRINTFIT_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PRINTFIT_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PRINTFIT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PRINTFIT_QUIET")]
    quiet: bool,

    /// HTTP timeout in seconds for the generator and URL inputs.
    #[arg(long, env = "PRINTFIT_DOWNLOAD_TIMEOUT", default_value_t = 60)]
    download_timeout: u64,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum FitArg {
    Contain,
    Cover,
}

impl From<FitArg> for FitMode {
    fn from(v: FitArg) -> Self {
        match v {
            FitArg::Contain => FitMode::Contain,
            FitArg::Cover => FitMode::Cover,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
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

    // ── Build config ─────────────────────────────────────────────────────
    let observer = show_progress.then(CliObserver::new);
    let config = build_config(&cli, observer)?;

    // ── Collaborators ────────────────────────────────────────────────────
    let generator = build_generator(&cli, config.download_timeout_secs).await?;
    let collaborators = Collaborators::new(generator);

    let count = cli
        .count
        .unwrap_or_else(|| cli.inputs.len().max(1));
    let prompt = cli.prompt.clone().unwrap_or_default();
    let request = GenerationRequest::new(prompt, count)
        .with_background_removal(cli.remove_background)
        .with_vectorization(cli.vectorize);

    // ── Run batch ────────────────────────────────────────────────────────
    let output = generate(&request, &config, &collaborators)
        .await
        .context("Batch failed")?;

    let store = FsBlobStore::new(&cli.out_dir).context("Failed to prepare output directory")?;
    let dpi = config.embed_dpi.then_some(config.physical.dpi);
    let artifacts = publish(&output, &request, &store, dpi)
        .await
        .context("Failed to write artifacts")?;

    // ── Report ───────────────────────────────────────────────────────────
    if cli.json {
        let report = serde_json::json!({ "batch": output, "artifacts": artifacts });
        let json = serde_json::to_string_pretty(&report).context("Failed to serialise output")?;
        println!("{json}");
    } else if !cli.quiet {
        let dims = config.dimensions();
        eprintln!(
            "{}  {}/{} candidates  {}x{} px ({}x{} trim)  {}ms  →  {}",
            if output.failures.is_empty() {
                green("✔")
            } else {
                cyan("⚠")
            },
            output.stats.succeeded,
            output.stats.acquired,
            dims.final_width,
            dims.final_height,
            dims.trim_width,
            dims.trim_height,
            output.stats.total_duration_ms,
            bold(&store.root().display().to_string()),
        );
        for artifact in &artifacts {
            eprintln!("   {}", dim(&artifact.name));
        }
        for failure in &output.failures {
            eprintln!(
                "   {} candidate {} dropped at {}: {}",
                red("✗"),
                failure.index,
                failure.stage,
                failure.error
            );
        }
    }

    Ok(())
}

/// Local inputs win; otherwise an HTTP endpoint is required.
async fn build_generator(cli: &Cli, timeout_secs: u64) -> Result<Arc<dyn ImageGenerator>> {
    if !cli.inputs.is_empty() {
        let source = StaticImageSource::from_inputs(&cli.inputs, timeout_secs)
            .await
            .context("Failed to read input images")?;
        return Ok(Arc::new(source));
    }

    let Some(ref endpoint) = cli.endpoint else {
        bail!("Nothing to do: pass --input <path|url> or --endpoint <url> (or PRINTFIT_ENDPOINT)");
    };
    if cli.prompt.as_deref().map_or(true, |p| p.trim().is_empty()) {
        bail!("A prompt is required when generating from --endpoint");
    }

    let mut generator = HttpImageGenerator::new(endpoint.as_str(), timeout_secs)
        .context("Invalid generator endpoint")?;
    if let Some(ref token) = cli.api_token {
        generator = generator.with_bearer_token(token.as_str());
    }
    Ok(Arc::new(generator))
}

/// Map CLI args to `PrintConfig`.
fn build_config(cli: &Cli, observer: Option<Arc<CliObserver>>) -> Result<PrintConfig> {
    let mut builder = PrintConfig::builder()
        .size_in(cli.width, cli.height)
        .dpi(cli.dpi)
        .bleed_in(cli.bleed)
        .margin_fraction(cli.margin)
        .safety_in(cli.safety)
        .fit(cli.fit.clone().into())
        .render_proof(!cli.no_proof)
        .concurrency(cli.concurrency)
        .max_attempts(cli.max_attempts)
        .retry_backoff_ms(cli.retry_backoff_ms)
        .download_timeout_secs(cli.download_timeout);

    if let Some(observer) = observer {
        builder = builder.observer(observer as Arc<dyn PipelineObserver>);
    }

    builder.build().context("Invalid print configuration")
}
