//! Command-line interface for sentinels.
//!
//! Provides commands for starting audits, checking status, approving
//! paused runs, rendering reports, and inspecting run history.

use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use uuid::Uuid;

use crate::adapters::Toolkit;
use crate::config;
use crate::core::{CheckpointStore, FileCheckpointStore, Orchestrator, RunJournal, SafetyLimits};
use crate::domain::{AuditRecord, Checkpoint, RunResult, RunState};
use crate::report;

/// sentinels - Checkpointed compliance-audit pipeline
#[derive(Parser, Debug)]
#[command(name = "sentinels")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start a new audit; pauses before enforcement
    Run {
        /// Session key (generated if not provided)
        #[arg(short, long)]
        session: Option<String>,

        /// Inject a simulated adversarial payload
        #[arg(long)]
        red_team: bool,

        /// Pull in federated threat intelligence
        #[arg(long)]
        federated: bool,

        /// Transaction log excerpt to scan
        #[arg(short, long, conflicts_with_all = ["input", "stdin"])]
        log_sample: Option<String>,

        /// Read the log excerpt from a file
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Read the log excerpt from stdin
        #[arg(long)]
        stdin: bool,

        /// Screenshot or scan to analyse as evidence
        #[arg(long)]
        image: Option<PathBuf>,

        /// Call recording to transcribe as evidence
        #[arg(long)]
        audio: Option<PathBuf>,

        /// Anomaly threshold (0.0-1.0); defaults to the session's last tuned value
        #[arg(long)]
        sensitivity: Option<f64>,
    },

    /// Show the checkpoint state of a session
    Status {
        /// Session key
        session: String,
    },

    /// Approve a paused session and run enforcement
    Approve {
        /// Session key
        session: String,
    },

    /// Render the audit report for a session
    Report {
        /// Session key
        session: String,
    },

    /// Show the run journal of a session
    History {
        /// Session key
        session: String,
    },

    /// List sessions with a checkpoint
    Sessions,

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Run {
                session,
                red_team,
                federated,
                log_sample,
                input,
                stdin,
                image,
                audio,
                sensitivity,
            } => {
                let inherit = sensitivity.is_none();
                let seed = build_seed(SeedArgs {
                    red_team,
                    federated,
                    log_sample,
                    input,
                    stdin,
                    image,
                    audio,
                    sensitivity,
                })?;
                let session = session.unwrap_or_else(|| Uuid::new_v4().to_string());
                start_run(seed, &session, inherit).await
            }
            Commands::Status { session } => show_status(&session).await,
            Commands::Approve { session } => approve(&session).await,
            Commands::Report { session } => show_report(&session).await,
            Commands::History { session } => show_history(&session).await,
            Commands::Sessions => list_sessions().await,
            Commands::Config => show_config(),
        }
    }
}

struct SeedArgs {
    red_team: bool,
    federated: bool,
    log_sample: Option<String>,
    input: Option<PathBuf>,
    stdin: bool,
    image: Option<PathBuf>,
    audio: Option<PathBuf>,
    sensitivity: Option<f64>,
}

/// Assemble the seed record from command-line inputs
fn build_seed(args: SeedArgs) -> Result<AuditRecord> {
    let limits = &config::config()?.safety;

    let mut seed = AuditRecord::new()
        .with_red_team(args.red_team)
        .with_federated(args.federated);

    let sample = if let Some(sample) = args.log_sample {
        Some(sample)
    } else if let Some(path) = args.input {
        Some(
            std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read input file: {}", path.display()))?,
        )
    } else if args.stdin {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read from stdin")?;
        Some(buffer)
    } else {
        None
    };

    if let Some(sample) = sample {
        if sample.trim().is_empty() {
            anyhow::bail!("Log sample is empty");
        }
        seed = seed.with_log_sample(sample.trim());
    }

    if let Some(path) = args.image {
        seed = seed.with_image(read_attachment(&path, limits)?);
    }
    if let Some(path) = args.audio {
        seed = seed.with_audio(read_attachment(&path, limits)?);
    }

    if let Some(sensitivity) = args.sensitivity {
        if !(0.0..=1.0).contains(&sensitivity) {
            anyhow::bail!("Sensitivity must be between 0.0 and 1.0, got {}", sensitivity);
        }
        seed.sensitivity = sensitivity;
    }

    Ok(seed)
}

/// Read an evidence file after checking it against the safety limits
fn read_attachment(path: &Path, limits: &SafetyLimits) -> Result<Vec<u8>> {
    let metadata = std::fs::metadata(path)
        .with_context(|| format!("Failed to read attachment: {}", path.display()))?;
    limits.validate_attachment(path, metadata.len())?;

    std::fs::read(path).with_context(|| format!("Failed to read attachment: {}", path.display()))
}

async fn build_orchestrator() -> Result<Orchestrator> {
    let cfg = config::config()?;
    let toolkit = Toolkit::from_config(cfg)?;
    let store = Arc::new(FileCheckpointStore::open_default()?);
    let journal = RunJournal::open_default().await?;

    Ok(Orchestrator::compliance(&toolkit, store)?
        .with_journal(journal)
        .with_limits(cfg.safety.clone()))
}

/// Carry the threshold enforcement tuned on the session's previous run
fn inherit_sensitivity(seed: &mut AuditRecord, previous: Option<&Checkpoint>) {
    if let Some(previous) = previous {
        seed.sensitivity = previous.record.effective_sensitivity();
    }
}

/// Start a new audit run
async fn start_run(mut seed: AuditRecord, session: &str, inherit: bool) -> Result<()> {
    let orchestrator = build_orchestrator().await?;
    if inherit {
        let previous = orchestrator.checkpoint(session).await?;
        inherit_sensitivity(&mut seed, previous.as_ref());
        debug!(sensitivity = seed.sensitivity, "Seed sensitivity");
    }
    let result = orchestrator.run(Some(seed), session).await?;
    print_outcome(&result);
    Ok(())
}

/// Resume a paused session past its pause point
async fn approve(session: &str) -> Result<()> {
    let orchestrator = build_orchestrator().await?;
    let result = orchestrator.run(None, session).await?;
    print_outcome(&result);
    Ok(())
}

fn print_outcome(result: &RunResult) {
    let record = &result.record;
    match &result.state {
        RunState::Paused { stage } => {
            println!("Session:      {}", result.session);
            println!("Risk level:   {}", record.risk_level);
            println!("Plan:         {}", record.remediation_plan);
            println!("Impact:       {}", record.financial_impact);
            println!("Stages run:   {}", result.executed.join(" -> "));
            eprintln!(
                "\n[Session {} paused before '{}'. Approve with: sentinels approve {}]",
                result.session, stage, result.session
            );
        }
        RunState::Completed => {
            println!("{}", report::render(record));
            eprintln!("\n[Session {} completed]", result.session);
        }
    }
}

/// Show the checkpoint state of a session
async fn show_status(session: &str) -> Result<()> {
    let store = FileCheckpointStore::open_default()?;
    let checkpoint = store
        .load(session)
        .await?
        .with_context(|| format!("No checkpoint for session '{}'", session))?;
    let record = &checkpoint.record;

    println!("Session:     {}", checkpoint.session);
    println!("Saved:       {}", checkpoint.saved_at);
    match checkpoint.pending_stage {
        Some(ref stage) => println!("State:       paused before '{}'", stage),
        None => println!("State:       not paused"),
    }
    println!("Risk level:  {}", record.risk_level);
    println!("Findings:    {}", record.findings.len());
    println!("Audit trail: {}", record.audit_trail.len());
    if let Some(action) = record.enforcement {
        println!("Enforcement: {}", action);
    }

    Ok(())
}

/// Render the report for a session's latest checkpoint
async fn show_report(session: &str) -> Result<()> {
    let store = FileCheckpointStore::open_default()?;
    let checkpoint = store
        .load(session)
        .await?
        .with_context(|| format!("No checkpoint for session '{}'", session))?;

    println!("{}", report::render(&checkpoint.record));
    Ok(())
}

/// Print the journal of a session
async fn show_history(session: &str) -> Result<()> {
    let journal = RunJournal::open_default().await?;
    let events = journal.replay(session).await?;

    if events.is_empty() {
        println!("No journal entries for session '{}'", session);
        return Ok(());
    }

    for event in events {
        let stage = event.stage.as_deref().unwrap_or("-");
        let duration = event
            .duration_ms
            .map(|ms| format!(" ({}ms)", ms))
            .unwrap_or_default();
        println!(
            "{}  {:<16} {:<14} {}{}",
            event.timestamp.format("%Y-%m-%d %H:%M:%S"),
            format!("{:?}", event.event_type),
            stage,
            event.summary,
            duration
        );
        if let Some(error) = event.error {
            println!("{:>22}error: {}", "", error);
        }
    }

    Ok(())
}

/// List all sessions with their state
async fn list_sessions() -> Result<()> {
    let store = FileCheckpointStore::open_default()?;
    let sessions = store.list_sessions().await?;

    if sessions.is_empty() {
        println!("No sessions found");
        return Ok(());
    }

    println!("{:<38} {:<10} {:<28} {:<20}", "SESSION", "RISK", "STATE", "SAVED");
    println!("{}", "-".repeat(96));

    for session in sessions {
        let Some(checkpoint) = store.load(&session).await? else {
            continue;
        };
        let state = match checkpoint.pending_stage {
            Some(ref stage) => format!("paused before {}", stage),
            None => checkpoint
                .record
                .enforcement
                .map(|a| a.to_string().to_lowercase())
                .unwrap_or_else(|| "not paused".to_string()),
        };
        println!(
            "{:<38} {:<10} {:<28} {:<20}",
            session,
            checkpoint.record.risk_level.to_string(),
            state,
            checkpoint.saved_at.format("%Y-%m-%d %H:%M:%S")
        );
    }

    Ok(())
}

/// Print the resolved configuration
fn show_config() -> Result<()> {
    let cfg = config::config()?;

    println!("Sentinels Configuration");
    println!("=======================");
    println!();
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Paths:");
    println!("  Home:        {}", cfg.home.display());
    println!("  Checkpoints: {}", cfg.checkpoints_dir().display());
    println!("  Journal:     {}", cfg.journal_dir().display());
    println!(
        "  Policy:      {}",
        cfg.policy_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(built-in default policy)".to_string())
    );
    println!();
    println!("Language model:");
    println!("  Model:    {}", cfg.llm.model);
    println!("  Endpoint: {}", cfg.llm.base_url);
    println!(
        "  API key:  {}",
        if cfg.llm.api_key.is_some() {
            "set"
        } else {
            "(not set - fallbacks only)"
        }
    );
    println!();
    println!("Search:");
    println!("  Enabled:  {}", cfg.search.enabled);
    println!("  Endpoint: {}", cfg.search.endpoint);
    println!();
    println!("Safety limits:");
    println!("  Max steps:           {}", cfg.safety.max_steps);
    println!("  Max attachment size: {} bytes", cfg.safety.max_attachment_bytes);
    println!("  Denylist:            {}", cfg.safety.denylist_patterns.join(", "));

    Ok(())
}
