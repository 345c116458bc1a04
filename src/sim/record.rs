//! Turn records and the append-only JSON Lines log

use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::core::error::Result;
use crate::sim::state::SimulationState;

/// The outcome of one turn. Built once by the engine and never mutated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TurnRecord {
    pub turn: u64,
    /// Deep copy of the state at the end of the turn
    pub state: SimulationState,
    pub event_id: Option<String>,
    pub choice: Option<String>,
    /// Selection draw in `[0, 1)`; absent when no event was eligible
    pub rng_draw: Option<f64>,
    pub bankrupt: bool,
    pub riot: bool,
}

impl TurnRecord {
    pub fn to_json_line(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Ordered, append-only collection of turn records
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TurnLog {
    records: Vec<TurnRecord>,
}

impl TurnLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: TurnRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[TurnRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn last(&self) -> Option<&TurnRecord> {
        self.records.last()
    }

    pub fn events(&self) -> impl Iterator<Item = &TurnRecord> {
        self.records.iter().filter(|r| r.event_id.is_some())
    }

    /// Write one JSON object per line, creating parent directories as needed
    pub fn write_jsonl(&self, path: &Path) -> Result<()> {
        let written = write_json_lines(path, &self.records)?;
        tracing::debug!("Wrote {} turn records to {:?}", written, path);
        Ok(())
    }

    /// Read a log written by [`TurnLog::write_jsonl`]; blank lines are skipped
    pub fn read_jsonl(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let mut log = TurnLog::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            log.push(serde_json::from_str(&line)?);
        }
        Ok(log)
    }
}

/// Write each item as one JSON line and return how many were written.
/// Missing parent directories are created; a bare file name writes to the
/// working directory.
pub fn write_json_lines<'a, T, I>(path: &Path, items: I) -> Result<usize>
where
    T: Serialize + 'a,
    I: IntoIterator<Item = &'a T>,
{
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut writer = BufWriter::new(File::create(path)?);
    let mut written = 0;
    for item in items {
        serde_json::to_writer(&mut writer, item)?;
        writer.write_all(b"\n")?;
        written += 1;
    }
    writer.flush()?;
    Ok(written)
}

impl From<Vec<TurnRecord>> for TurnLog {
    fn from(records: Vec<TurnRecord>) -> Self {
        Self { records }
    }
}
