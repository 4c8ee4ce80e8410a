//! Append-only signal journal (JSON Lines)
//!
//! One flat record per emitted signal. The statistics side reads the same
//! file to compute win rate, which comes back in as `MarketContext::win_rate`.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::types::{Direction, KillZone, Session, TradeSignal};

/// One journal line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalRecord {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub instrument: String,
    pub direction: Direction,
    pub price: f64,
    pub score: f64,
    pub entry_low: f64,
    pub entry_high: f64,
    pub stop_loss: f64,
    pub take_profit_1: f64,
    pub take_profit_2: f64,
    pub risk_pct: f64,
    pub session: Session,
    pub kill_zone: Option<KillZone>,
    pub break_retest: bool,
    pub stop_hunt: bool,
    pub consolidation: bool,
    pub false_breakout: bool,
    pub delta: f64,
    pub macro_score: f64,
}

impl From<&TradeSignal> for SignalRecord {
    fn from(signal: &TradeSignal) -> Self {
        Self {
            id: signal.id,
            timestamp: signal.captured_at,
            instrument: signal.instrument.clone(),
            direction: signal.direction,
            price: signal.price,
            score: signal.score,
            entry_low: signal.entry_low,
            entry_high: signal.entry_high,
            stop_loss: signal.stop_loss,
            take_profit_1: signal.take_profit_1,
            take_profit_2: signal.take_profit_2,
            risk_pct: signal.risk_pct,
            session: signal.tags.session,
            kill_zone: signal.tags.kill_zone,
            break_retest: signal.tags.break_retest,
            stop_hunt: signal.tags.stop_hunt,
            consolidation: signal.tags.consolidation,
            false_breakout: signal.tags.false_breakout,
            delta: signal.delta,
            macro_score: signal.macro_score,
        }
    }
}

/// Appends records to a JSONL file
pub struct SignalJournal {
    path: PathBuf,
    writer: BufWriter<File>,
    written: usize,
}

impl SignalJournal {
    /// Open (or create) the journal for appending
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create journal directory {:?}", parent))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open journal {:?}", path))?;

        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            written: 0,
        })
    }

    pub fn append(&mut self, signal: &TradeSignal) -> Result<()> {
        let line = serde_json::to_string(&SignalRecord::from(signal))
            .context("Failed to serialize signal record")?;
        writeln!(self.writer, "{}", line)
            .with_context(|| format!("Failed to write journal {:?}", self.path))?;
        self.writer
            .flush()
            .with_context(|| format!("Failed to flush journal {:?}", self.path))?;
        self.written += 1;
        Ok(())
    }

    /// Records appended through this handle
    pub fn written(&self) -> usize {
        self.written
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Read every record back. Blank lines are ignored; anything else must parse.
pub fn read_journal(path: &Path) -> Result<Vec<SignalRecord>> {
    let file = File::open(path).with_context(|| format!("Failed to open journal {:?}", path))?;
    let mut records = Vec::new();

    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read journal line {}", idx + 1))?;
        if line.trim().is_empty() {
            continue;
        }
        let record: SignalRecord = serde_json::from_str(&line)
            .with_context(|| format!("Bad journal record at line {}", idx + 1))?;
        records.push(record);
    }

    Ok(records)
}
