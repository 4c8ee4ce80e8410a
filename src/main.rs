use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use orderflow_signals::journal::SignalJournal;
use orderflow_signals::notify::format_signal_card;
use orderflow_signals::replay::{load_frames, run_replay};
use orderflow_signals::{SignalConfig, SignalEngine, TradeSignal};

#[derive(Parser, Debug)]
#[command(author, version, about = "Replay market snapshots through the institutional signal pipeline")]
struct Args {
    /// Snapshot frames (JSON Lines, optionally .zst)
    #[arg(short, long, env = "SIGNAL_INPUT")]
    input: PathBuf,

    /// Engine config (JSON); defaults apply when omitted
    #[arg(short, long, env = "SIGNAL_CONFIG")]
    config: Option<PathBuf>,

    /// Signal journal to append to
    #[arg(short, long, env = "SIGNAL_JOURNAL", default_value = "signals.jsonl")]
    journal: PathBuf,

    /// Override the emission score threshold
    #[arg(long)]
    threshold: Option<f64>,

    /// Override the per-instrument cooldown in seconds
    #[arg(long)]
    cooldown: Option<u64>,

    /// Recent win rate (%) for frames that don't carry one
    #[arg(long, env = "SIGNAL_WIN_RATE")]
    win_rate: Option<f64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("orderflow_signals=info".parse()?),
        )
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => SignalConfig::load(path)?,
        None => SignalConfig::default(),
    };
    if let Some(threshold) = args.threshold {
        config.gate.score_threshold = threshold;
    }
    if let Some(cooldown) = args.cooldown {
        config.gate.cooldown_secs = cooldown;
    }
    config.validate().context("Invalid configuration")?;

    info!("Starting signal replay");
    info!("Input: {:?}", args.input);
    info!("Journal: {:?}", args.journal);
    info!(
        "Threshold: {:.1} | Cooldown: {}s | Sessions TZ: {}",
        config.gate.score_threshold, config.gate.cooldown_secs, config.sessions.timezone
    );

    let mut frames = load_frames(&args.input)?;
    if let Some(win_rate) = args.win_rate {
        for frame in frames.iter_mut().filter(|f| f.context.win_rate.is_none()) {
            frame.context.win_rate = Some(win_rate);
        }
    }

    let engine = SignalEngine::new(config)?;
    let mut journal = SignalJournal::open(&args.journal)?;

    // Fan signals out to the journal writer and the notifier. At most one
    // signal per frame, so this capacity never lags.
    let (tx, _rx) = broadcast::channel::<TradeSignal>(frames.len().max(16));

    let mut journal_rx = tx.subscribe();
    let journal_task = tokio::spawn(async move {
        loop {
            match journal_rx.recv().await {
                Ok(signal) => {
                    if let Err(e) = journal.append(&signal) {
                        error!("Journal write failed: {:#}", e);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Journal writer lagged, {} signals dropped", n);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        journal.written()
    });

    let mut notify_rx = tx.subscribe();
    let notify_task = tokio::spawn(async move {
        loop {
            match notify_rx.recv().await {
                Ok(signal) => info!("\n{}", format_signal_card(&signal)),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Notifier lagged, {} signals dropped", n);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    // Evaluation is CPU-bound (rayon inside); keep it off the async workers
    let sender = tx.clone();
    let summary = tokio::task::spawn_blocking(move || {
        run_replay(&engine, &frames, |signal| {
            if let Err(e) = sender.send(signal) {
                warn!("No subscribers for signal {} ({})", e.0.id, e.0.instrument);
            }
        })
    })
    .await
    .context("Replay task panicked")?;

    drop(tx);
    let journaled = journal_task.await.context("Journal task panicked")?;
    notify_task.await.context("Notifier task panicked")?;

    info!("=== REPLAY SUMMARY ===");
    info!("Frames:   {}", summary.frames);
    info!("Cycles:   {}", summary.cycles);
    info!("Emitted:  {}", summary.emitted);
    info!("Rejected: {}", summary.rejected);
    info!("Skipped:  {}", summary.skipped);
    info!("Journaled {} signals to {:?}", journaled, args.journal);

    Ok(())
}
