use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use aimark_core::{
    mutation_channel, parse_document, serialize_document, AnswerExtractor, DetectorSettings,
    DriverOptions, HostSchema, HttpDetector, MutationNotifier, PageScanner, Relay, ScanConfig,
    ScanDriver, ScoringUnit,
};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "aimark",
    author,
    version,
    about = "AI confidence badges for Q&A answer code"
)]
struct Cli {
    /// Optional TOML config file with a [detector] section
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Scan a saved Q&A page once and write the annotated document
    Scan {
        /// HTML file to scan; reads stdin when omitted
        #[arg(long, value_name = "FILE")]
        input: Option<PathBuf>,
        /// Where to write the annotated HTML; stdout when omitted
        #[arg(long, value_name = "FILE")]
        output: Option<PathBuf>,
        /// Detector base URL (overrides config file and environment)
        #[arg(long, value_name = "URL")]
        endpoint: Option<String>,
    },
    /// Watch an HTML file and re-scan whenever it changes
    Watch {
        #[arg(long, value_name = "FILE")]
        input: PathBuf,
        #[arg(long, value_name = "FILE")]
        output: PathBuf,
        /// Detector base URL (overrides config file and environment)
        #[arg(long, value_name = "URL")]
        endpoint: Option<String>,
        /// How often to poll the input file for changes, in milliseconds
        #[arg(long, default_value_t = 500)]
        poll_ms: u64,
    },
    /// List the answers a scan pass would score, without contacting the detector
    Answers {
        /// HTML file to inspect; reads stdin when omitted
        #[arg(long, value_name = "FILE")]
        input: Option<PathBuf>,
        /// Emit the listing as JSON instead of human-readable text
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Commands::Scan {
            input,
            output,
            endpoint,
        } => scan_once(cli.config.as_deref(), input.as_deref(), output.as_deref(), endpoint).await,
        Commands::Watch {
            input,
            output,
            endpoint,
            poll_ms,
        } => watch(cli.config.as_deref(), &input, &output, endpoint, poll_ms).await,
        Commands::Answers { input, json } => list_answers(input.as_deref(), json),
    }
}

async fn scan_once(
    config: Option<&Path>,
    input: Option<&Path>,
    output: Option<&Path>,
    endpoint: Option<String>,
) -> Result<()> {
    let settings = detector_settings(config, endpoint)?;
    let html = read_input(input)?;
    let document = parse_document(&html);

    let scanner = build_scanner(&settings)?;
    scanner.scan(&document).await;

    let annotated = serialize_document(&document)?;
    write_output(output, &annotated)
}

async fn watch(
    config: Option<&Path>,
    input: &Path,
    output: &Path,
    endpoint: Option<String>,
    poll_ms: u64,
) -> Result<()> {
    let settings = detector_settings(config, endpoint)?;
    let scanner = build_scanner(&settings)?;

    let (notifier, events) = mutation_channel();
    spawn_file_watcher(input.to_path_buf(), Duration::from_millis(poll_ms), notifier);
    info!(input = %input.display(), endpoint = %settings.endpoint, "watching for changes");

    let input = input.to_path_buf();
    let output = output.to_path_buf();
    let driver = ScanDriver::new(scanner, DriverOptions::default());
    driver
        .run(
            events,
            move || {
                let html = fs::read_to_string(&input)
                    .with_context(|| format!("failed to read {}", input.display()))?;
                Ok(parse_document(&html))
            },
            move |document| {
                let annotated = serialize_document(document)?;
                fs::write(&output, annotated)
                    .with_context(|| format!("failed to write {}", output.display()))
            },
        )
        .await
}

fn list_answers(input: Option<&Path>, json: bool) -> Result<()> {
    let html = read_input(input)?;
    let document = parse_document(&html);
    let extractor = AnswerExtractor::new(HostSchema::default(), ScanConfig::default());
    let snapshot = extractor.collect(&document);
    let summaries: Vec<AnswerSummary> = snapshot.units.iter().map(AnswerSummary::from).collect();

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "answers": summaries,
                "tags": snapshot.tags,
            }))?
        );
        return Ok(());
    }

    println!(
        "{} answer(s) found, {} with qualifying code",
        snapshot.answer_count,
        summaries.len()
    );
    if !snapshot.tags.is_empty() {
        let tags: Vec<String> = snapshot.tags.into_iter().collect();
        println!("question tags: {}", tags.join(", "));
    }
    for summary in &summaries {
        println!(
            "- {author:<24} votes {votes:>5} :: {blocks} block(s), {chars} chars{accepted}",
            author = summary.author,
            votes = summary.votes,
            blocks = summary.code_blocks,
            chars = summary.code_chars,
            accepted = if summary.verified { ", accepted" } else { "" },
        );
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct AnswerSummary {
    author: String,
    votes: String,
    verified: bool,
    code_blocks: usize,
    code_chars: usize,
}

impl From<&ScoringUnit> for AnswerSummary {
    fn from(unit: &ScoringUnit) -> Self {
        Self {
            author: unit.author.clone(),
            votes: unit.votes.clone(),
            verified: unit.is_verified,
            code_blocks: unit.block_count,
            code_chars: unit.combined_code.chars().count(),
        }
    }
}

fn build_scanner(settings: &DetectorSettings) -> Result<PageScanner> {
    let backend = HttpDetector::new(settings)?;
    let relay = Relay::spawn(Arc::new(backend));
    Ok(PageScanner::new(
        AnswerExtractor::new(HostSchema::default(), ScanConfig::default()),
        relay,
    ))
}

/// Settings precedence: `--endpoint` flag, then config file, then environment.
fn detector_settings(config: Option<&Path>, endpoint: Option<String>) -> Result<DetectorSettings> {
    let mut settings = match config {
        Some(path) => {
            let file: FileConfig = config::Config::builder()
                .add_source(config::File::from(path.to_path_buf()))
                .build()
                .with_context(|| format!("failed to read config file {}", path.display()))?
                .try_deserialize()
                .context("invalid config file")?;
            file.detector
        }
        None => DetectorSettings::from_env(),
    };
    if let Some(endpoint) = endpoint {
        settings.endpoint = endpoint;
    }
    Ok(settings)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    detector: DetectorSettings,
}

fn spawn_file_watcher(path: PathBuf, poll: Duration, notifier: MutationNotifier) {
    tokio::spawn(async move {
        let mut last = modified_at(&path);
        let mut ticker = tokio::time::interval(poll);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let current = modified_at(&path);
            if current != last {
                last = current;
                notifier.notify();
            }
        }
    });
}

fn modified_at(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|meta| meta.modified()).ok()
}

fn read_input(input: Option<&Path>) -> Result<String> {
    match input {
        Some(path) => {
            fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
        }
        None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("failed to read stdin")?;
            Ok(buffer)
        }
    }
}

fn write_output(output: Option<&Path>, annotated: &str) -> Result<()> {
    match output {
        Some(path) => fs::write(path, annotated)
            .with_context(|| format!("failed to write {}", path.display())),
        None => {
            print!("{annotated}");
            Ok(())
        }
    }
}

fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tokio=warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .try_init();
}
