use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing_subscriber::filter::LevelFilter;

use crate::{
    extract_encryption_params, AttackOptions, AttackStrategy, CandidatePlan, HostCommand,
    HostConfig, HostEvent, NumericSpace, ProgressSnapshot, RecoveryHost, RunOutcome,
    StartRequest, Wordlist, DEFAULT_NUMERIC_WIDTH, MAX_NUMERIC_WIDTH,
};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Clone, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser)]
#[command(
    name = "formula-pwrecover",
    version,
    about = "Recover the open password of an encrypted workbook by dictionary and numeric search."
)]
pub struct Args {
    /// Encrypted workbook.
    file: PathBuf,

    /// Candidate strategy: `dictionary`, `brute-force` or `hybrid` (dictionary, then digits).
    #[arg(long, value_name = "STRATEGY", default_value_t = AttackStrategy::Hybrid)]
    strategy: AttackStrategy,

    /// Newline-separated password list to use instead of the built-in dictionary.
    #[arg(long, value_name = "PATH")]
    wordlist: Option<PathBuf>,

    /// Width of the zero-padded numeric space (`6` => 000000..999999).
    #[arg(
        long,
        default_value_t = DEFAULT_NUMERIC_WIDTH,
        value_parser = clap::value_parser!(u8).range(1..=MAX_NUMERIC_WIDTH as i64)
    )]
    digits: u8,

    /// Report progress every N candidates.
    #[arg(long, value_name = "N", default_value_t = 1)]
    progress_every: u64,

    /// Don't draw a progress bar.
    #[arg(long)]
    no_progress: bool,

    /// Output format for the final result.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Increase log verbosity (repeatable).
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
enum JsonStatus {
    Found,
    NotFound,
    NotProtected,
    Cancelled,
    Error,
}

#[derive(Debug, Serialize)]
struct JsonReport<'a> {
    file: String,
    strategy: String,
    status: JsonStatus,
    password: Option<&'a str>,
    reason: Option<&'a str>,
    tested: u64,
    total: u64,
    elapsed_secs: f64,
}

pub fn run() -> Result<ExitCode> {
    run_with_args(Args::parse())
}

pub fn run_with_args(args: Args) -> Result<ExitCode> {
    init_logging(args.verbose);

    let bytes = std::fs::read(&args.file)
        .with_context(|| format!("read workbook {}", args.file.display()))?;
    let strategy = args.strategy;

    let params = extract_encryption_params(&bytes)
        .with_context(|| format!("read encryption parameters from {}", args.file.display()))?;
    let Some(params) = params else {
        report(&args, strategy, &Summary::not_protected())?;
        return Ok(ExitCode::from(1));
    };

    let mut plan = CandidatePlan::new(strategy);
    if let Some(path) = args.wordlist.as_deref() {
        let wordlist = Wordlist::from_path(path)
            .with_context(|| format!("read wordlist {}", path.display()))?;
        plan = plan.with_wordlist(wordlist);
    }
    let numeric = NumericSpace::new(args.digits)
        .with_context(|| format!("unsupported --digits {}", args.digits))?;
    plan = plan.with_numeric_space(numeric);
    let total = plan.len();

    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&interrupted);
    ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))
        .context("install Ctrl+C handler")?;

    let bar = progress_bar(total, args.no_progress);
    let mut host = RecoveryHost::new(HostConfig {
        attack: AttackOptions {
            progress_interval: args.progress_every,
        },
        ..HostConfig::default()
    });
    host.send(HostCommand::Start(StartRequest { plan, params }))?;

    let started = Instant::now();
    let mut tested = 0u64;
    let mut cancel_sent = false;
    let outcome = loop {
        if interrupted.load(Ordering::SeqCst) && !cancel_sent {
            host.send(HostCommand::Cancel)?;
            cancel_sent = true;
        }
        let Some(event) = host.recv_timeout(POLL_INTERVAL) else {
            if host.is_running() {
                continue;
            }
            break RunOutcome::Failed("recovery host stopped without an outcome".to_string());
        };
        match event {
            HostEvent::Progress(snapshot) => {
                tested = snapshot.tested;
                update_bar(&bar, &snapshot);
            }
            terminal => match terminal.into_outcome() {
                Some(outcome) => break outcome,
                None => continue,
            },
        }
    };
    bar.finish_and_clear();

    let summary = Summary {
        outcome: Some(outcome),
        tested,
        total,
        elapsed: started.elapsed(),
    };
    report(&args, strategy, &summary)?;
    Ok(summary.exit_code())
}

struct Summary {
    /// `None` when the workbook is not protected.
    outcome: Option<RunOutcome>,
    tested: u64,
    total: u64,
    elapsed: Duration,
}

impl Summary {
    fn not_protected() -> Self {
        Self {
            outcome: None,
            tested: 0,
            total: 0,
            elapsed: Duration::ZERO,
        }
    }

    fn exit_code(&self) -> ExitCode {
        match &self.outcome {
            Some(RunOutcome::Found(_)) => ExitCode::SUCCESS,
            Some(RunOutcome::Failed(_)) => ExitCode::from(2),
            _ => ExitCode::from(1),
        }
    }
}

fn report(args: &Args, strategy: AttackStrategy, summary: &Summary) -> Result<()> {
    match args.format {
        OutputFormat::Text => {
            match &summary.outcome {
                None => println!("Workbook is not password-protected; nothing to recover."),
                Some(RunOutcome::Found(password)) => println!("Password found: {password}"),
                Some(RunOutcome::NotFound) => println!(
                    "Password not found ({} candidates tried with the {strategy} strategy).",
                    summary.tested
                ),
                Some(RunOutcome::Cancelled) => {
                    println!("Cancelled after {} candidates.", summary.tested)
                }
                Some(RunOutcome::Failed(reason)) => eprintln!("Recovery failed: {reason}"),
            }
            Ok(())
        }
        OutputFormat::Json => {
            let (status, password, reason) = match &summary.outcome {
                None => (JsonStatus::NotProtected, None, None),
                Some(RunOutcome::Found(password)) => {
                    (JsonStatus::Found, Some(password.as_str()), None)
                }
                Some(RunOutcome::NotFound) => (JsonStatus::NotFound, None, None),
                Some(RunOutcome::Cancelled) => (JsonStatus::Cancelled, None, None),
                Some(RunOutcome::Failed(reason)) => {
                    (JsonStatus::Error, None, Some(reason.as_str()))
                }
            };
            let json = JsonReport {
                file: args.file.display().to_string(),
                strategy: strategy.to_string(),
                status,
                password,
                reason,
                tested: summary.tested,
                total: summary.total,
                elapsed_secs: summary.elapsed.as_secs_f64(),
            };
            println!("{}", serde_json::to_string_pretty(&json)?);
            Ok(())
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    // `log` records from the library are bridged into this subscriber.
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn progress_bar(total: u64, hidden: bool) -> ProgressBar {
    if hidden {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(total);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
    {
        bar.set_style(style.progress_chars("##-"));
    }
    bar
}

fn update_bar(bar: &ProgressBar, snapshot: &ProgressSnapshot) {
    bar.set_position(snapshot.tested);
    bar.set_message(format!(
        "{} ({:.0}/s, ~{}s left)",
        snapshot.current,
        snapshot.speed,
        snapshot.eta_secs.round() as u64
    ));
}
