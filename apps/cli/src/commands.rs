//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use articulate_assist::AssistClient;
use articulate_core::directory::load_directory;
use articulate_core::output::write_equivalence_map;
use articulate_core::pipeline::{
    ProgressReporter, QueryEvent, QueryOutcome, RunResult, decode_payload, run_pipeline,
};
use articulate_shared::{AppConfig, DedupPolicy, RunConfig, init_config, load_config};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Articulate: build transfer-course equivalence maps from assist.org.
#[derive(Parser)]
#[command(
    name = "articulate",
    version,
    about = "Build a home-course → transfer-equivalents map from assist.org agreements.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Dedup policy as accepted on the command line.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub(crate) enum DedupArg {
    Accumulate,
    Distinct,
}

impl From<DedupArg> for DedupPolicy {
    fn from(arg: DedupArg) -> Self {
        match arg {
            DedupArg::Accumulate => DedupPolicy::Accumulate,
            DedupArg::Distinct => DedupPolicy::Distinct,
        }
    }
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Query all agreements and write the equivalence map.
    Run {
        /// Department directory file (defaults to config `directory_path`).
        #[arg(short, long)]
        directory: Option<PathBuf>,

        /// Output file (defaults to config `output_path`).
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Only query these department codes (repeatable).
        #[arg(long = "department")]
        departments: Vec<String>,

        /// Departments queried concurrently.
        #[arg(short, long)]
        concurrency: Option<usize>,

        /// How repeated equivalences are recorded.
        #[arg(long)]
        dedup: Option<DedupArg>,
    },

    /// List sending institutions known to the API.
    Institutions,

    /// Decode a saved agreement payload and print its facts in order.
    Inspect {
        /// File containing a raw agreement response body.
        payload: PathBuf,

        /// Institution name to attach to extracted courses.
        #[arg(long, default_value = "unknown institution")]
        institution: String,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "articulate=info",
        1 => "articulate=debug",
        _ => "articulate=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Run {
            directory,
            out,
            departments,
            concurrency,
            dedup,
        } => cmd_run(directory, out, departments, concurrency, dedup).await,
        Command::Institutions => cmd_institutions().await,
        Command::Inspect {
            payload,
            institution,
        } => cmd_inspect(&payload, &institution),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_run(
    directory: Option<PathBuf>,
    out: Option<PathBuf>,
    departments: Vec<String>,
    concurrency: Option<usize>,
    dedup: Option<DedupArg>,
) -> Result<()> {
    let config = load_config()?;

    let mut run_config = RunConfig::from(&config);
    run_config.departments = departments;
    if let Some(n) = concurrency {
        run_config.concurrency = n.max(1);
    }
    if let Some(policy) = dedup {
        run_config.dedup = policy.into();
    }

    let directory_path =
        directory.unwrap_or_else(|| PathBuf::from(&config.defaults.directory_path));
    let out_path = out.unwrap_or_else(|| PathBuf::from(&config.defaults.output_path));

    let directory = load_directory(&directory_path)?;
    let client = AssistClient::from_config(&config.assist)?;

    let reporter = CliProgress::new();
    reporter.phase("Loading institutions");
    let institutions = client.institutions().await?;
    if institutions.is_empty() {
        return Err(eyre!("the API returned no institutions"));
    }

    info!(
        directory = %directory_path.display(),
        out = %out_path.display(),
        institutions = institutions.len(),
        concurrency = run_config.concurrency,
        "running articulation pipeline"
    );

    let result = run_pipeline(
        &run_config,
        &directory,
        &institutions,
        Arc::new(client),
        &reporter,
    )
    .await?;

    let meta = write_equivalence_map(&out_path, &result.map)?;
    let summary = &result.summary;

    println!();
    println!("  Equivalence map written!");
    println!("  Courses:      {}", result.map.len());
    println!("  Equivalents:  {}", result.map.total_entries());
    println!(
        "  Queries:      {} ({} ok, {} failed)",
        summary.queries,
        summary.succeeded,
        summary.failed()
    );
    if summary.failed() > 0 {
        println!(
            "    transport {} / malformed {} / schema mismatch {} / lost {}",
            summary.transport_failures, summary.malformed, summary.schema_mismatches, summary.lost
        );
    }
    println!("  Dedup:        {}", run_config.dedup);
    println!("  Path:         {}", meta.path.display());
    println!("  SHA-256:      {}", meta.sha256);
    println!(
        "  Started:      {}",
        result.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!("  Time:         {:.1}s", result.elapsed.as_secs_f64());
    println!();

    Ok(())
}

async fn cmd_institutions() -> Result<()> {
    let config = load_config()?;
    let client = AssistClient::from_config(&config.assist)?;

    let institutions = client.institutions().await?;
    info!(count = institutions.len(), "listing institutions");

    for institution in &institutions {
        println!("{:>6}  {}", institution.id, institution.name);
    }
    Ok(())
}

fn cmd_inspect(payload: &Path, institution: &str) -> Result<()> {
    let raw = std::fs::read_to_string(payload)
        .map_err(|e| eyre!("cannot read '{}': {e}", payload.display()))?;

    let facts = decode_payload(&raw, institution)?;
    info!(facts = facts.len(), "payload decoded");

    println!("{}", serde_json::to_string_pretty(&facts)?);
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif bar.
struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let bar = ProgressBar::new_spinner();
        bar.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { bar }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.bar.set_message(name.to_string());
    }

    fn query_finished(&self, event: &QueryEvent, completed: usize, total: usize) {
        if completed == 1 {
            if let Ok(style) =
                ProgressStyle::with_template("{spinner:.cyan} [{pos}/{len}] {wide_msg}")
            {
                self.bar.set_style(style);
            }
            self.bar.set_length(total as u64);
        }
        self.bar.set_position(completed as u64);

        let status = match event.outcome {
            QueryOutcome::Extracted { appended } => format!("+{appended}"),
            QueryOutcome::TransportFailed => "fetch failed".to_string(),
            QueryOutcome::Malformed => "malformed".to_string(),
            QueryOutcome::SchemaMismatch => "schema mismatch".to_string(),
        };
        self.bar.set_message(format!(
            "{} · {} ({status})",
            event.department, event.institution
        ));
    }

    fn done(&self, _result: &RunResult) {
        self.bar.finish_and_clear();
    }
}
