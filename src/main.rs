use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use dupcull::config::SessionConfig;
use dupcull::core::candidates::{SimilarityEdge, DEFAULT_THRESHOLD};
use dupcull::core::session::{SessionOutcome, SessionReport};
use dupcull::services::console::{Console, LineConsole, TerminalConsole};
use dupcull::services::history::{HistoryLog, RestoreSelection};
use dupcull::services::renderer::{TextOnlyRenderer, ComparisonRenderer, ViuRenderer};
use dupcull::services::similarity::{HashSimilarityProvider, JsonSimilarityProvider, SimilarityProvider};
use image_hasher::HashAlg;
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(name = "dupcull", version, about = "Interactively resolve near-duplicate images")]
struct Cli {
    /// More log output (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Review similar pairs one by one and archive the copy you don't keep
    Resolve {
        #[command(flatten)]
        source: SourceArgs,
        /// Terminal image viewer used to show comparisons
        #[arg(long, default_value = "viu")]
        viewer: String,
        /// Print file details only, without showing images
        #[arg(long)]
        no_display: bool,
        /// Do not record archive actions in `<dir>/.history.jsonl`
        #[arg(long)]
        no_history: bool,
    },

    /// List candidate pairs without changing anything
    Scan {
        #[command(flatten)]
        source: SourceArgs,
        /// Print candidates as JSON
        #[arg(long)]
        json: bool,
    },

    /// Work with archive history
    History {
        #[command(subcommand)]
        command: HistoryCmd,
    },
}

#[derive(clap::Args, Debug)]
struct SourceArgs {
    /// Directory of images
    #[arg(short, long, value_name = "DIR")]
    path: PathBuf,
    /// Minimum similarity (0.0-1.0) for a pair to be offered
    #[arg(short, long, default_value_t = DEFAULT_THRESHOLD)]
    threshold: f64,
    /// Precomputed similarity map (JSON) instead of perceptual hashing
    #[arg(long, value_name = "FILE")]
    similarity_file: Option<PathBuf>,
    /// Perceptual hash algorithm
    #[arg(long, value_enum, default_value_t = HashKind::Mean)]
    hash_alg: HashKind,
}

#[derive(Copy, Clone, Debug, ValueEnum, PartialEq, Eq)]
enum HashKind {
    Mean,
    Gradient,
    DoubleGradient,
    Blockhash,
}

impl From<HashKind> for HashAlg {
    fn from(kind: HashKind) -> Self {
        match kind {
            HashKind::Mean => HashAlg::Mean,
            HashKind::Gradient => HashAlg::Gradient,
            HashKind::DoubleGradient => HashAlg::DoubleGradient,
            HashKind::Blockhash => HashAlg::Blockhash,
        }
    }
}

#[derive(Subcommand, Debug)]
enum HistoryCmd {
    /// List all archive records
    List {
        /// Directory containing the photos
        #[arg(short, long, value_name = "DIR")]
        path: PathBuf,
    },

    /// Move archived files back to their original location
    Restore {
        /// Directory containing the photos
        #[arg(short, long, value_name = "DIR")]
        path: PathBuf,
        /// Restore a specific record index
        #[arg(long, conflicts_with = "all")]
        record: Option<usize>,
        /// Restore all records
        #[arg(long, conflicts_with = "record")]
        all: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Resolve {
            source,
            viewer,
            no_display,
            no_history,
        } => {
            let mut config = SessionConfig::new(&source.path, source.threshold)?;
            if no_history {
                config = config.without_history();
            }
            println!("▶ Finding matches in: {}", config.target_dir.display());
            let provider = make_provider(&source);

            let renderer: Box<dyn ComparisonRenderer> = if no_display {
                Box::new(TextOnlyRenderer)
            } else {
                Box::new(ViuRenderer::with_viewer(viewer))
            };
            let console: Box<dyn Console> = if io::stdin().is_terminal() {
                Box::new(TerminalConsole::new())
            } else {
                Box::new(LineConsole::new(io::stdin().lock(), io::stdout()))
            };

            let report = benchmark("resolution session", || {
                dupcull::resolve(&config, provider.as_ref(), renderer, console)
            })?;
            print_report(&report, &config);
        }

        Commands::Scan { source, json } => {
            let config = SessionConfig::new(&source.path, source.threshold)?;
            if !json {
                println!("▶ Scanning for similar pairs in: {}", config.target_dir.display());
            }
            let provider = make_provider(&source);
            let candidates = benchmark("similarity lookup", || {
                dupcull::find_candidates(&config, provider.as_ref())
            })?;
            print!("{}", format_candidates(&candidates, json)?);
        }

        Commands::History { command } => match command {
            HistoryCmd::List { path } => {
                let log = HistoryLog::for_target(&path);
                let (records, malformed) = log
                    .read()
                    .with_context(|| format!("Could not open history file {:?}", log.path()))?;

                println!("🗂️  Archive History:");
                for (i, rec) in records.iter().enumerate() {
                    println!(
                        "[{}] {}\n     kept: {}\n     archived: {} → {}\n     score: {:.3}\n",
                        i, rec.timestamp, rec.retained, rec.archived, rec.archived_to, rec.score
                    );
                }
                for bad in malformed {
                    eprintln!("⚠️  Skipping malformed entry {}: {}", bad.index, bad.error);
                }
            }

            HistoryCmd::Restore { path, record, all } => {
                let log = HistoryLog::for_target(&path);
                let selection = match (all, record) {
                    (true, _) => RestoreSelection::All,
                    (false, Some(index)) => RestoreSelection::Index(index),
                    (false, None) => RestoreSelection::Latest,
                };
                let report = log
                    .restore(selection)
                    .with_context(|| format!("Failed to restore from {:?}", log.path()))?;

                for (src, dest) in &report.restored {
                    println!("🔄 Restored {} → {}", src.display(), dest.display());
                }
                for (src, reason) in &report.skipped {
                    eprintln!("⚠️  Skipped {}: {}", src.display(), reason);
                }
                println!(
                    "🧹 Updated history, removed {} record(s)",
                    report.records_removed
                );
            }
        },
    }

    Ok(())
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn make_provider(source: &SourceArgs) -> Box<dyn SimilarityProvider> {
    match &source.similarity_file {
        Some(file) => Box::new(JsonSimilarityProvider::new(file)),
        None => Box::new(HashSimilarityProvider::new(
            source.hash_alg.into(),
            source.threshold,
        )),
    }
}

/// Scan output: pretty JSON and nothing else, or a human-readable listing.
fn format_candidates(candidates: &[SimilarityEdge], json: bool) -> serde_json::Result<String> {
    if json {
        return Ok(serde_json::to_string_pretty(candidates)? + "\n");
    }
    if candidates.is_empty() {
        return Ok("No matching images found.\n".to_string());
    }

    let mut out = format!("Found {} candidate pair(s):\n", candidates.len());
    for (i, edge) in candidates.iter().enumerate() {
        out.push_str(&format!(" Pair {} (similarity {:.3}):\n", i + 1, edge.score));
        out.push_str(&format!("   ▶ {}\n", edge.first));
        out.push_str(&format!("   ▶ {}\n", edge.second));
    }
    Ok(out)
}

fn print_report(report: &SessionReport, config: &SessionConfig) {
    match report.outcome {
        Some(SessionOutcome::Quit) => println!("\n👋 Stopped early; remaining pairs were not reviewed."),
        _ => println!("\n✅ No more candidate pairs."),
    }
    println!(
        "   Reviewed {} pair(s): {} archived, {} skipped, {} already gone",
        report.presented,
        report.archived.len(),
        report.skipped,
        report.already_gone
    );
    if report.render_failures > 0 {
        println!("   ⚠️  {} comparison(s) could not be displayed", report.render_failures);
    }
    if report.archive_failures > 0 {
        println!("   ❌ {} file(s) could not be archived", report.archive_failures);
    }
    if !report.archived.is_empty() {
        println!("   📦 Archive: {}", config.archive_dir().display());
        if config.record_history {
            println!("   🗂️  History: {}", config.history_path().display());
        }
    }
}

/// Run `f()`, log how long it took (with `label`), and return its result.
fn benchmark<T, F: FnOnce() -> T>(label: &str, f: F) -> T {
    let start = Instant::now();
    let result = f();
    log::info!("⏱ {} took {:.2?}", label, start.elapsed());
    result
}
