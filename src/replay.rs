//! Replay input and cycle driver
//!
//! Frames are JSON Lines, one `{ "snapshot": ..., "context": ... }` per line,
//! optionally zstd-compressed (`.zst`). Consecutive frames sharing a capture
//! time form one evaluation cycle.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use tracing::{info, warn};

use crate::signal_core::{Decision, SignalEngine};
use crate::types::{MarketContext, MarketSnapshot, TradeSignal};

/// One instrument's input for one cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayFrame {
    pub snapshot: MarketSnapshot,
    #[serde(default)]
    pub context: MarketContext,
}

fn open_reader(path: &Path) -> Result<Box<dyn BufRead>> {
    let file = File::open(path).with_context(|| format!("Failed to open file: {:?}", path))?;

    let inner: Box<dyn Read> = if path.extension().map_or(false, |ext| ext == "zst") {
        let decoder = zstd::stream::Decoder::new(file)
            .with_context(|| format!("Failed to create zstd decoder for: {:?}", path))?;
        Box::new(decoder)
    } else {
        Box::new(file)
    };

    Ok(Box::new(BufReader::new(inner)))
}

/// Parse every frame in `path`. Lines that don't parse are logged and skipped.
pub fn load_frames(path: &Path) -> Result<Vec<ReplayFrame>> {
    let reader = open_reader(path)?;
    let mut frames = Vec::new();
    let mut skipped = 0usize;

    for (idx, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read line {} of {:?}", idx + 1, path))?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<ReplayFrame>(line) {
            Ok(frame) => frames.push(frame),
            Err(e) => {
                skipped += 1;
                warn!("Skipping malformed frame at line {}: {}", idx + 1, e);
            }
        }
    }

    info!("Loaded {} frames from {:?} ({} skipped)", frames.len(), path, skipped);
    Ok(frames)
}

/// Split frames into cycles of consecutive equal capture times
pub fn group_cycles(frames: &[ReplayFrame]) -> Vec<&[ReplayFrame]> {
    let mut cycles = Vec::new();
    let mut start = 0;

    for i in 1..=frames.len() {
        if i == frames.len() || frames[i].snapshot.captured_at != frames[start].snapshot.captured_at {
            cycles.push(&frames[start..i]);
            start = i;
        }
    }

    cycles
}

/// Counters for one replay run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReplaySummary {
    pub frames: usize,
    pub cycles: usize,
    pub emitted: usize,
    pub rejected: usize,
    pub skipped: usize,
}

impl ReplaySummary {
    fn tally(&mut self, decision: &Decision) {
        match decision {
            Decision::Emitted(_) => self.emitted += 1,
            Decision::Rejected { .. } => self.rejected += 1,
            Decision::Skipped(_) => self.skipped += 1,
        }
    }
}

/// Drive the engine over `frames` cycle by cycle, handing each emitted signal to `on_signal`
pub fn run_replay<F>(engine: &SignalEngine, frames: &[ReplayFrame], mut on_signal: F) -> ReplaySummary
where
    F: FnMut(TradeSignal),
{
    let mut summary = ReplaySummary {
        frames: frames.len(),
        ..Default::default()
    };

    for cycle in group_cycles(frames) {
        summary.cycles += 1;
        // Outcomes land before the cycle they arrive with is evaluated
        for pnl in cycle.iter().flat_map(|frame| &frame.context.outcomes) {
            engine.record_outcome(*pnl);
        }
        for decision in engine.evaluate_cycle(cycle) {
            summary.tally(&decision);
            if let Decision::Emitted(signal) = decision {
                on_signal(signal);
            }
        }
    }

    summary
}
