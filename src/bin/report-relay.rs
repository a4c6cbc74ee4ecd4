//! CLI binary for report-relay.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ClientConfig`, renders the job in the terminal and prints the result.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use report_relay::{
    ClientConfig, InterfaceMode, NoopView, ProgressSnapshot, Relay, SharedView, View,
    ViewSelector,
};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
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

// ── Terminal view using indicatif ────────────────────────────────────────────

/// Renders the four views on stderr: a percentage bar while the job runs,
/// and a one-line notice when the result is ready. Errors are left to
/// `main`, which prints them on exit.
struct TerminalView {
    bar: ProgressBar,
}

impl TerminalView {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(100);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}%  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);
        bar.set_style(style);
        bar.set_prefix("Converting");
        Arc::new(Self { bar })
    }
}

impl ViewSelector for TerminalView {
    fn show(&self, view: View) {
        match view {
            View::Idle => self.bar.finish_and_clear(),
            View::Progress => {
                self.bar.reset();
                self.bar.enable_steady_tick(Duration::from_millis(80));
            }
            View::Result => {
                self.bar.set_position(100);
                self.bar.println(format!(
                    "{} {}",
                    cyan("◆"),
                    bold("Report ready, downloading…")
                ));
            }
            View::Error => self.bar.abandon(),
        }
    }

    fn render_progress(&self, snapshot: &ProgressSnapshot) {
        self.bar
            .set_position(snapshot.progress.clamp(0, 100) as u64);
        if snapshot.detail.is_empty() {
            self.bar.set_message(snapshot.message.clone());
        } else {
            self.bar
                .set_message(format!("{}  {}", snapshot.message, dim(&snapshot.detail)));
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert a spreadsheet on a local service, save into the current directory
  report-relay patients.xlsx

  # Remote service with an API key, save into ./reports
  RELAY_API_KEY=... report-relay --server https://reports.example.org -o reports patients.xlsx

  # Service that answers the upload with the file itself
  report-relay --mode direct --server http://127.0.0.1:8000 data.csv

  # Check the service is up
  report-relay --check --server http://127.0.0.1:8000

  # JSON summary for scripting
  report-relay --json patients.xlsx

ENVIRONMENT VARIABLES:
  RELAY_SERVER        Service root URL
  RELAY_API_KEY       API key sent as X-API-KEY (and ?api_key= on the progress channel)
  RELAY_OUTPUT_DIR    Directory for saved reports
  RUST_LOG            Override log filter (e.g. report_relay=debug)
"#;

/// Upload a file for conversion, follow progress, and save the report.
#[derive(Parser, Debug)]
#[command(
    name = "report-relay",
    version,
    about = "Upload a file for conversion, follow progress, and save the report",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// File to upload.
    #[arg(required_unless_present = "check")]
    input: Option<PathBuf>,

    /// Service root URL.
    #[arg(short, long, env = "RELAY_SERVER", default_value = "http://127.0.0.1:8000")]
    server: String,

    /// Progress WebSocket root (default: derived from --server).
    #[arg(long, env = "RELAY_PROGRESS_URL")]
    progress_url: Option<String>,

    /// API key for trusted deployments.
    #[arg(long, env = "RELAY_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Header carrying the API key.
    #[arg(long, env = "RELAY_API_KEY_HEADER", default_value = "X-API-KEY")]
    api_key_header: String,

    /// Do not put the API key on the progress URL.
    #[arg(long)]
    no_query_key: bool,

    /// Interface mode: streaming (task id + progress) or direct.
    #[arg(long, env = "RELAY_MODE", value_enum, default_value = "streaming")]
    mode: ModeArg,

    /// Directory to save the report into.
    #[arg(short, long, env = "RELAY_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Filename used when the server suggests none.
    #[arg(long, env = "RELAY_DEFAULT_FILENAME", default_value = "report.xlsx")]
    default_filename: String,

    /// Replace an existing file instead of saving as "name (n).ext".
    #[arg(long)]
    overwrite: bool,

    /// Give up on the upload after this many seconds (default: no limit).
    #[arg(long, env = "RELAY_UPLOAD_TIMEOUT")]
    upload_timeout: Option<u64>,

    /// Give up on the download after this many seconds (default: no limit).
    #[arg(long, env = "RELAY_DOWNLOAD_TIMEOUT")]
    download_timeout: Option<u64>,

    /// Connect timeout in seconds.
    #[arg(long, env = "RELAY_CONNECT_TIMEOUT", default_value_t = 30)]
    connect_timeout: u64,

    /// Only check the service health endpoint.
    #[arg(long)]
    check: bool,

    /// Print the job summary as JSON.
    #[arg(long)]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "RELAY_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "RELAY_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "RELAY_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum ModeArg {
    Streaming,
    Direct,
}

impl From<ModeArg> for InterfaceMode {
    fn from(v: ModeArg) -> Self {
        match v {
            ModeArg::Streaming => InterfaceMode::Streaming,
            ModeArg::Direct => InterfaceMode::Direct,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs; verbose always wins.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.check;
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

    let config = build_config(&cli)?;

    let view: SharedView = if show_progress {
        TerminalView::new() as SharedView
    } else {
        Arc::new(NoopView)
    };
    let relay = Relay::new(config, view).context("Failed to set up HTTP client")?;

    // ── Health-check mode ────────────────────────────────────────────────
    if cli.check {
        relay.check_health().await.context("Health check failed")?;
        if !cli.quiet {
            eprintln!("{} {} is up", green("✔"), bold(&cli.server));
        }
        return Ok(());
    }

    // ── Run the job ──────────────────────────────────────────────────────
    let input = cli.input.clone().unwrap_or_default();
    let report = relay.run(&input).await.context("Conversion failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialise report")?;
        println!("{json}");
    } else if !cli.quiet {
        eprintln!(
            "{}  {}  {}  →  {}",
            green("✔"),
            dim(&format!("{} bytes", report.bytes)),
            dim(&format!("{}ms", report.duration_ms)),
            bold(&report.saved_path.display().to_string()),
        );
        if let Some(ref id) = report.job_id {
            eprintln!("   {} {}", dim("job"), dim(id));
        }
    }

    Ok(())
}

/// Map CLI args to `ClientConfig`.
fn build_config(cli: &Cli) -> Result<ClientConfig> {
    let mut builder = ClientConfig::builder()
        .base_url(cli.server.clone())
        .mode(cli.mode.clone().into())
        .api_key_header(cli.api_key_header.clone())
        .api_key_in_progress_query(!cli.no_query_key)
        .output_dir(cli.output_dir.clone())
        .default_filename(cli.default_filename.clone())
        .overwrite(cli.overwrite)
        .connect_timeout_secs(cli.connect_timeout);

    if let Some(ref url) = cli.progress_url {
        builder = builder.progress_base_url(url.clone());
    }
    if let Some(ref key) = cli.api_key {
        builder = builder.api_key(key.clone());
    }
    if let Some(secs) = cli.upload_timeout {
        builder = builder.upload_timeout_secs(secs);
    }
    if let Some(secs) = cli.download_timeout {
        builder = builder.download_timeout_secs(secs);
    }

    builder.build().context("Invalid configuration")
}
