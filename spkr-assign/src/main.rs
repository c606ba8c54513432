//! spkr-assign - Speaker label assignment
//!
//! Maps the anonymous speaker labels of a diarized transcript (A, B, S1, ...)
//! to known speaker identities by fusing voice biometrics, names mentioned in
//! the conversation, expected participants and cross-transcript agreement.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use spkr_assign::collector::{
    CachedAnalyzer, CatalogDirectory, CommandAnalyzer, CommandIdentifier, SignalCollector,
    TranscriptAgreement,
};
use spkr_assign::config::{AssignSettings, AssignToml};
use spkr_assign::fusion::AssignmentResolver;
use spkr_assign::recording_id::RecordingId;
use spkr_assign::store::{AssignmentStore, RecordingAssignment};
use spkr_assign::types::{ConversationAnalyzer, ResolutionOutcome, TrustLevel};
use spkr_assign::workflow::{AssignRequest, Assigner, RunReport};
use spkr_assign::AssignError;
use spkr_common::config::{RootFolderInitializer, RootFolderResolver};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_HASH"),
    ", built ",
    env!("BUILD_TIMESTAMP"),
    ", ",
    env!("BUILD_PROFILE"),
    ")"
);

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "spkr-assign")]
#[command(about = "Assign speaker labels in diarized transcripts to known speakers")]
#[command(version = VERSION)]
struct Cli {
    /// More log output (repeat for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Root folder for assignments, catalog and cache
    #[arg(long, global = true)]
    root_folder: Option<PathBuf>,

    /// TOML config file (default: ~/.config/spkr/spkr-assign.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Assign speaker labels for one recording
    Assign(AssignArgs),

    /// Show saved assignments for a recording
    Show {
        /// Audio file or recording id (prefix)
        target: String,

        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Delete saved assignments for a recording
    Clear {
        /// Audio file or recording id
        target: String,

        /// Confirm deletion
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args, Debug)]
struct AssignArgs {
    /// Audio file the transcript belongs to
    audio: PathBuf,

    /// Primary diarized transcript (AssemblyAI or Speechmatics JSON)
    #[arg(short, long)]
    transcript: PathBuf,

    /// Additional transcript of the same recording (repeatable)
    #[arg(long = "secondary-transcript")]
    secondary_transcripts: Vec<PathBuf>,

    /// Acceptance threshold in [0, 1]
    #[arg(long)]
    threshold: Option<f64>,

    /// Drop biometric matches below this trust level
    #[arg(long)]
    min_trust: Option<TrustLevel>,

    /// Expected participant ids (comma separated)
    #[arg(long, value_delimiter = ',')]
    expected: Vec<String>,

    /// Tags passed to the voice identifier (comma separated)
    #[arg(long, value_delimiter = ',')]
    tags: Vec<String>,

    #[arg(long)]
    no_biometric: bool,

    #[arg(long)]
    no_content: bool,

    #[arg(long)]
    no_expected: bool,

    #[arg(long)]
    no_agreement: bool,

    /// Write the assignment file here instead of the store
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Resolve and print, do not save
    #[arg(long)]
    dry_run: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Yaml,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let resolver = RootFolderResolver::new("spkr-assign")
        .with_cli_arg(cli.root_folder.clone())
        .with_config_path(cli.config.clone());

    let toml_config = match resolver.config_path() {
        Some(path) => AssignToml::load(&path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => AssignToml::default(),
    };

    init_logging(&toml_config.common.logging.level, cli.verbose, cli.quiet);
    info!("spkr-assign {}", VERSION);

    let root_folder = resolver.resolve();
    let initializer = RootFolderInitializer::new(root_folder);
    initializer
        .ensure_directory_exists()
        .context("Failed to initialize root folder")?;
    info!(root = %initializer.root_folder().display(), "Root folder ready");

    let mut settings = toml_config.assign;
    settings.apply_env().context("Invalid environment override")?;

    let store = AssignmentStore::new(initializer.assignments_dir());

    match cli.command {
        Command::Assign(args) => run_assign(args, settings, &initializer, store).await,
        Command::Show { target, format } => run_show(&target, format, &settings, &store).await,
        Command::Clear { target, force } => run_clear(&target, force, &settings, &store).await,
    }
}

/// Level from TOML, shifted by -v/-q; `RUST_LOG` wins when set
fn init_logging(configured: &str, verbose: u8, quiet: bool) {
    let level = if quiet {
        "warn"
    } else {
        match verbose {
            0 => configured,
            1 => "debug",
            _ => "trace",
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run_assign(
    args: AssignArgs,
    mut settings: AssignSettings,
    initializer: &RootFolderInitializer,
    store: AssignmentStore,
) -> Result<()> {
    if let Some(threshold) = args.threshold {
        settings.acceptance_threshold = threshold;
    }
    if let Some(min_trust) = args.min_trust {
        settings.min_trust = min_trust;
    }
    if !args.expected.is_empty() {
        settings.expected_participants = args.expected.clone();
    }
    if !args.tags.is_empty() {
        settings.tags = args.tags.clone();
    }
    settings.sources.biometric &= !args.no_biometric;
    settings.sources.content &= !args.no_content;
    settings.sources.expected &= !args.no_expected;
    settings.sources.agreement &= !args.no_agreement;

    // Bad weights or threshold stop here, before any recording is touched
    let engine = settings.engine_config().context("Invalid assignment configuration")?;
    let collector = build_collector(&settings, initializer)?;

    let assigner = Assigner::new(AssignmentResolver::new(engine), collector, Arc::new(store))
        .with_hash_algorithm(settings.hash_algorithm);

    let cancel = CancellationToken::new();
    let ctrl_c_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Received Ctrl+C, cancelling run");
            ctrl_c_token.cancel();
        }
    });

    let request = AssignRequest {
        audio_path: args.audio,
        transcript_path: args.transcript,
        secondary_transcripts: args.secondary_transcripts,
        output_path: args.output,
        dry_run: args.dry_run,
    };

    let report = match assigner.run(&request, &cancel).await {
        Ok(report) => report,
        Err(AssignError::Cancelled) => bail!("Cancelled; nothing was saved"),
        Err(e) => return Err(e).context("Assignment failed"),
    };

    match args.format {
        OutputFormat::Text => print_report(&report),
        OutputFormat::Yaml => print!("{}", report.record.to_yaml()?),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report.record)?),
    }
    Ok(())
}

fn build_collector(
    settings: &AssignSettings,
    initializer: &RootFolderInitializer,
) -> Result<SignalCollector> {
    let config = settings
        .collector_config()
        .context("Invalid collector configuration")?;
    let mut collector = SignalCollector::new(config)
        .with_catalog(Arc::new(CatalogDirectory::new(initializer.catalog_dir())))
        .with_agreement(Arc::new(TranscriptAgreement::default()));

    match &settings.biometric {
        Some(spec) => {
            collector = collector.with_voice_identifier(Arc::new(CommandIdentifier::new(
                spec.program.clone(),
                spec.args.clone(),
            )));
        }
        None if settings.sources.biometric => {
            warn!("No [assign.biometric] command configured; biometric evidence unavailable");
        }
        None => {}
    }

    match &settings.content {
        Some(spec) => {
            let mut analyzer: Arc<dyn ConversationAnalyzer> = Arc::new(CommandAnalyzer::new(
                spec.program.clone(),
                spec.args.clone(),
                spec.model.as_deref(),
            ));
            if settings.cache_analysis {
                analyzer = Arc::new(CachedAnalyzer::new(analyzer, initializer.cache_dir()));
            }
            collector = collector.with_analyzer(analyzer);
        }
        None if settings.sources.content => {
            warn!("No [assign.content] command configured; content evidence unavailable");
        }
        None => {}
    }

    Ok(collector)
}

fn print_report(report: &RunReport) {
    println!("Recording: {}", report.recording_id);
    if let Some(context) = &report.record.context {
        println!("Context: {}", context);
    }
    println!("Found {} speakers", report.labels.len());

    for label in &report.labels {
        match (&label.outcome, &label.winner) {
            (ResolutionOutcome::Assigned, Some(winner)) => println!(
                "  {} -> {} ({}, score {:.3})",
                label.label, winner, label.confidence, label.score
            ),
            (ResolutionOutcome::NoSignal, _) => println!("  {} -> (no evidence)", label.label),
            _ => println!(
                "  {} -> (unassigned, best score {:.3})",
                label.label, label.score
            ),
        }
    }

    for failure in report.failures() {
        match &failure.label {
            Some(label) => println!("  ! {} failed for {}: {}", failure.source, label, failure.reason),
            None => println!("  ! {} failed: {}", failure.source, failure.reason),
        }
    }

    match &report.saved_to {
        Some(path) => println!("Assignments saved to {}", path.display()),
        None => println!("Dry run; nothing saved"),
    }
}

fn print_record(record: &RecordingAssignment) {
    println!("Recording: {}", record.recording_id);
    if let Some(audio) = &record.audio_path {
        println!("Audio: {}", audio.display());
    }
    println!("Transcript: {}", record.transcript_path.display());
    println!(
        "Assigned: {} ({}, threshold {})",
        record.assigned_at.to_rfc3339(),
        record.method,
        record.threshold
    );
    if let Some(context) = &record.context {
        println!("Context: {}", context);
    }
    println!(
        "{} of {} labels assigned",
        record.assigned_count(),
        record.per_label.len()
    );
    for (label, assignment) in &record.per_label {
        match &assignment.winner {
            Some(winner) => println!(
                "  {} -> {} ({}, score {:.3})",
                label, winner, assignment.confidence, assignment.score
            ),
            None => println!("  {} -> (unassigned, best score {:.3})", label, assignment.score),
        }
    }
    for failure in &record.degraded_sources {
        println!("  ! {} failed: {}", failure.source, failure.reason);
    }
}

/// Existing file → hash it; anything else is taken as an id or id prefix
async fn target_id(target: &str, settings: &AssignSettings) -> Result<String> {
    let path = Path::new(target);
    if path.is_file() {
        let id = RecordingId::from_file(path, settings.hash_algorithm)
            .await
            .with_context(|| format!("Failed to identify {}", path.display()))?;
        return Ok(id.to_string());
    }
    Ok(target.trim().to_ascii_lowercase())
}

async fn run_show(
    target: &str,
    format: OutputFormat,
    settings: &AssignSettings,
    store: &AssignmentStore,
) -> Result<()> {
    let id = target_id(target, settings).await?;
    let Some(record) = store.find(&id).await? else {
        bail!("No assignments found for {}", target);
    };

    match format {
        OutputFormat::Text => print_record(&record),
        OutputFormat::Yaml => print!("{}", record.to_yaml()?),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&record)?),
    }
    Ok(())
}

async fn run_clear(
    target: &str,
    force: bool,
    settings: &AssignSettings,
    store: &AssignmentStore,
) -> Result<()> {
    if !force {
        bail!("Refusing to clear assignments for {} without --force", target);
    }

    let id = target_id(target, settings).await?;
    let recording_id = match store.find(&id).await? {
        Some(record) => record.recording_id.to_string(),
        None => id,
    };

    if store.clear(&recording_id).await? {
        println!("Cleared assignments for {}", recording_id);
    } else {
        println!("No assignments to clear for {}", recording_id);
    }
    Ok(())
}
