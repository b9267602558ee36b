use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use quizdedup_core::session::{self, Preview, is_affirmative, normalize_file};
use quizdedup_core::{
    AppConfig, AssumeYes, Confirm, DedupRun, DedupSession, QuizError, ResolutionList, RunStatus,
};

// ─── CLI Definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "quizdedup",
    about = "Find and remove near-duplicate questions in a quiz database",
    version,
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Quiz database file (JSON array). Also set by QUIZDEDUP_FILE.
    #[arg(long, global = true)]
    file: Option<PathBuf>,

    /// Where to write the pre-change backup.
    #[arg(long, global = true)]
    backup: Option<PathBuf>,

    /// Config file. Also set by QUIZDEDUP_CONFIG.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output in JSON format. Also enabled by setting QUIZDEDUP_JSON=1.
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List near-duplicate pairs without changing anything.
    Scan {
        #[arg(long)]
        threshold: Option<f64>,
    },

    /// Apply curated resolutions after confirmation.
    Dedup {
        /// TOML file with [[resolution]] and [[review]] entries.
        #[arg(long)]
        resolutions: Option<PathBuf>,
        /// Skip the confirmation prompt.
        #[arg(long)]
        yes: bool,
        #[arg(long)]
        dry_run: bool,
    },

    /// Apply curated resolutions without prompting.
    Auto {
        #[arg(long)]
        resolutions: Option<PathBuf>,
    },

    /// Canonicalize field names and fill difficulty/category defaults.
    Normalize {
        #[arg(long)]
        dry_run: bool,
    },

    /// Show statistics and duplicates left above the verification threshold.
    Report {
        #[arg(long)]
        threshold: Option<f64>,
    },
}

// ─── Main ────────────────────────────────────────────────────────────────────

fn main() {
    init_tracing();

    if let Err(err) = run() {
        eprintln!("Error: {err:#}");
        let code = err
            .downcast_ref::<QuizError>()
            .map_or(quizdedup_core::ExitCode::GeneralError, QuizError::exit_code);
        std::process::exit(code as i32);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn run() -> Result<()> {
    let start = Instant::now();
    let cli = Cli::parse();

    // ── Env var overrides ──────────────────────────────────────────────────
    let json_output = cli.json || std::env::var("QUIZDEDUP_JSON").as_deref() == Ok("1");

    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    }
    .context("loading configuration")?;

    if let Some(path) = cli
        .file
        .clone()
        .or_else(|| std::env::var("QUIZDEDUP_FILE").ok().map(PathBuf::from))
    {
        config.set_database_path(path);
    }
    if let Some(backup) = cli.backup.clone() {
        config.database.backup_path = Some(backup);
    }

    match cli.command {
        None => {
            let resolutions = load_resolutions(&config, None)?;
            let run = DedupSession::new(&config, resolutions).run(&mut StdinConfirm)?;
            print_dedup(&run, json_output, start)?;
        }

        Some(Commands::Scan { threshold }) => {
            let threshold = threshold.unwrap_or(config.dedup.detection_threshold);
            let (records, pairs) = session::scan_file(&config, threshold)?;

            if json_output {
                print_json(&serde_json::json!({
                    "status": "ok",
                    "data": { "threshold": threshold, "total": records.len(), "pairs": pairs },
                    "meta": { "duration_ms": start.elapsed().as_millis() }
                }))?;
            } else if pairs.is_empty() {
                println!("No duplicates found at {threshold:.0}% similarity.");
            } else {
                println!(
                    "{} pairs at >= {threshold:.0}% similarity in {} questions:\n",
                    pairs.len(),
                    records.len()
                );
                for pair in &pairs {
                    println!("  ID {} vs ID {} ({:.1}%)", pair.first, pair.second, pair.score);
                    for key in [pair.first, pair.second] {
                        if let Some((_, record)) = records
                            .iter()
                            .enumerate()
                            .find(|(idx, r)| r.key_at(*idx) == key)
                        {
                            println!("    {key}: {}", record.preview(80));
                        }
                    }
                }
            }
        }

        Some(Commands::Dedup {
            resolutions,
            yes,
            dry_run,
        }) => {
            let list = load_resolutions(&config, resolutions)?;
            let session = DedupSession::new(&config, list).with_dry_run(dry_run);
            let run = if yes {
                session.run(&mut AssumeYes)?
            } else {
                session.run(&mut StdinConfirm)?
            };
            print_dedup(&run, json_output, start)?;
        }

        Some(Commands::Auto { resolutions }) => {
            let list = load_resolutions(&config, resolutions)?;
            let run = DedupSession::new(&config, list).run(&mut AssumeYes)?;
            print_dedup(&run, json_output, start)?;
        }

        Some(Commands::Normalize { dry_run }) => {
            let run = normalize_file(&config, dry_run)?;

            if json_output {
                print_json(&serde_json::json!({
                    "status": "ok",
                    "data": run,
                    "meta": { "duration_ms": start.elapsed().as_millis() }
                }))?;
            } else {
                for change in &run.changes.changed {
                    for note in &change.changes {
                        println!("  ID {}: {note}", change.id);
                    }
                }
                match run.status {
                    RunStatus::NothingToDo => println!("Nothing to normalize."),
                    RunStatus::DryRun => println!(
                        "\nDry run: {} changes in {} questions, nothing written.",
                        run.changes.change_count(),
                        run.changes.changed.len()
                    ),
                    _ => {
                        println!(
                            "\n{} changes in {} of {} questions.",
                            run.changes.change_count(),
                            run.changes.changed.len(),
                            run.changes.records
                        );
                        if let Some(backup) = &run.backup_path {
                            println!("Backup saved to {}", backup.display());
                        }
                    }
                }
            }
        }

        Some(Commands::Report { threshold }) => {
            let threshold = threshold.unwrap_or(config.dedup.verification_threshold);
            let report = session::report_file(&config, threshold)?;

            if json_output {
                print_json(&serde_json::json!({
                    "status": "ok",
                    "data": report,
                    "meta": { "duration_ms": start.elapsed().as_millis() }
                }))?;
            } else {
                print!("{report}");
            }
        }
    }

    Ok(())
}

// ─── Confirmation ───────────────────────────────────────────────────────────

/// Prints the planned changes and waits for an answer on stdin.
struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm(&mut self, preview: &Preview<'_>) -> quizdedup_core::Result<bool> {
        print_preview(preview);

        print!("\nProceed with removal? (s/n): ");
        io::stdout().flush()?;

        let mut answer = String::new();
        io::stdin().lock().read_line(&mut answer)?;
        Ok(is_affirmative(&answer))
    }
}

fn print_preview(preview: &Preview<'_>) {
    let rule = "=".repeat(70);
    println!("{} candidate pairs found.\n", preview.candidates.len());

    println!("{rule}");
    println!("REMOVAL PLAN");
    println!("{rule}");

    for resolution in &preview.plan.applied {
        println!(
            "\n  ID {} (keep ID {}) - action: {}",
            resolution.loser, resolution.keeper, resolution.action
        );
        for key in [resolution.loser, resolution.keeper] {
            if let Some(record) = preview.question(key) {
                println!("    {key}: {}", record.preview(100));
            }
        }
    }

    if !preview.plan.skipped.is_empty() {
        println!("\nSkipped entries:");
        for skipped in &preview.plan.skipped {
            println!(
                "  ID {} -> ID {}: {}",
                skipped.resolution.loser, skipped.resolution.keeper, skipped.conflict
            );
        }
    }
    println!("\n{rule}");
}

// ─── Helpers ────────────────────────────────────────────────────────────────

fn load_resolutions(config: &AppConfig, cli_path: Option<PathBuf>) -> Result<ResolutionList> {
    match cli_path.or_else(|| config.dedup.resolutions_path.clone()) {
        Some(path) => ResolutionList::load_from(&path)
            .with_context(|| format!("reading resolutions from {}", path.display())),
        None => {
            tracing::warn!("no resolutions file configured; only renumbering will be applied");
            Ok(ResolutionList::default())
        }
    }
}

fn print_dedup(run: &DedupRun, json_output: bool, start: Instant) -> Result<()> {
    if json_output {
        return print_json(&serde_json::json!({
            "status": "ok",
            "data": run,
            "meta": { "duration_ms": start.elapsed().as_millis() }
        }));
    }

    match run.status {
        RunStatus::NothingToDo => {
            println!("{} candidate pairs found; nothing to change.", run.candidates.len());
            return Ok(());
        }
        RunStatus::Aborted => {
            println!("Operation cancelled, no files were changed.");
            return Ok(());
        }
        RunStatus::DryRun => println!("Dry run, nothing written.\n"),
        RunStatus::Applied => {
            let changed: Vec<_> = run.rewrite.renumbered.changed().collect();
            if !changed.is_empty() {
                println!("Renumbered {} questions:", changed.len());
                for (old, new) in changed {
                    println!("  ID {old} -> {new}");
                }
                println!();
            }
        }
    }

    let rule = "=".repeat(70);
    println!("{rule}");
    println!("DEDUPLICATION SUMMARY");
    println!("{rule}");
    print!("{}", run.summary);
    println!("{rule}\n");
    print!("{}", run.report);
    Ok(())
}

fn print_json(val: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(val)?);
    Ok(())
}
