use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::models::signal::Signal;

/// Signals emitted during one UTC day, keyed by instrument, in emission order
#[derive(Debug, Clone)]
pub struct SignalJournal {
    day: NaiveDate,
    signals: BTreeMap<String, Vec<Signal>>,
}

#[derive(Serialize)]
struct JournalFile<'a> {
    last_update: DateTime<Utc>,
    signals: &'a BTreeMap<String, Vec<Signal>>,
}

impl SignalJournal {
    pub fn new(day: NaiveDate) -> Self {
        Self {
            day,
            signals: BTreeMap::new(),
        }
    }

    /// Start a fresh mapping when `day` differs from the current one
    pub fn roll_to(&mut self, day: NaiveDate) {
        if day != self.day {
            tracing::info!("Signal journal rolling over from {} to {}", self.day, day);
            self.day = day;
            self.signals.clear();
        }
    }

    pub fn record(&mut self, signal: Signal) {
        self.roll_to(signal.detected_at.date_naive());
        self.signals
            .entry(signal.symbol.clone())
            .or_default()
            .push(signal);
    }

    pub fn signals_for(&self, symbol: &str) -> &[Signal] {
        self.signals.get(symbol).map(Vec::as_slice).unwrap_or_default()
    }

    /// Every signal of the day, oldest first
    pub fn all(&self) -> Vec<Signal> {
        let mut all: Vec<Signal> = self.signals.values().flatten().cloned().collect();
        all.sort_by_key(|s| s.detected_at);
        all
    }

    pub fn file_name(&self) -> String {
        format!("signals_{}.json", self.day.format("%Y%m%d"))
    }

    /// Write the day's file under `dir`, replacing the previous write of the same day
    pub async fn persist(&self, dir: &Path, now: DateTime<Utc>) -> anyhow::Result<PathBuf> {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("failed to create {}", dir.display()))?;

        let path = dir.join(self.file_name());
        let body = serde_json::to_vec_pretty(&JournalFile {
            last_update: now,
            signals: &self.signals,
        })?;
        tokio::fs::write(&path, body)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path)
    }
}
