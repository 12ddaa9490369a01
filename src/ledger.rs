//! Per-identifier resolution status, persisted as a flat CSV table.
//!
//! The snapshot (`genome_status.txt`) is rewritten whole at checkpoints. Between
//! checkpoints every attempt is appended to the journal (`genome_status.journal`)
//! in the same row format. Loading reads the snapshot and replays the journal on
//! top of it; the last row for an id wins.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Read;

use camino::{Utf8Path, Utf8PathBuf};
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::ResolverError;

const NONE_SENTINEL: &str = "None";
const TRUE_SENTINEL: &str = "True";
const FALSE_SENTINEL: &str = "False";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolutionRecord {
    pub original_id: String,
    pub resolved_id: Option<String>,
    pub attempted: bool,
    pub filename: String,
}

impl ResolutionRecord {
    pub fn new(original_id: impl Into<String>) -> Self {
        Self {
            original_id: original_id.into(),
            resolved_id: None,
            attempted: false,
            filename: String::new(),
        }
    }

    pub fn has_archive(&self) -> bool {
        !self.filename.is_empty()
    }

    /// Attempted without producing an archive; not retried unless forced.
    pub fn is_failed(&self) -> bool {
        self.attempted && self.filename.is_empty()
    }

    pub fn reset(&mut self) {
        self.resolved_id = None;
        self.attempted = false;
        self.filename.clear();
    }

    fn to_row(&self) -> [&str; 4] {
        [
            self.original_id.as_str(),
            self.resolved_id.as_deref().unwrap_or(NONE_SENTINEL),
            if self.attempted {
                TRUE_SENTINEL
            } else {
                FALSE_SENTINEL
            },
            self.filename.as_str(),
        ]
    }

    fn from_row(row: &StringRecord) -> Option<Self> {
        if row.len() != 4 {
            return None;
        }
        let original_id = row.get(0)?.to_string();
        if original_id.is_empty() {
            return None;
        }
        let resolved_id = row
            .get(1)
            .filter(|value| !value.is_empty() && *value != NONE_SENTINEL)
            .map(str::to_string);
        let attempted = row.get(2) == Some(TRUE_SENTINEL);
        let filename = row.get(3)?.to_string();
        Some(Self {
            original_id,
            resolved_id,
            attempted,
            filename,
        })
    }
}

/// Reads a ledger table. A missing file is an empty table. Unparseable rows are
/// skipped; a later row for the same id replaces an earlier one.
pub fn load_table(path: &Utf8Path) -> Result<BTreeMap<String, ResolutionRecord>, ResolverError> {
    let mut records = BTreeMap::new();
    replay_into(path, &mut records)?;
    Ok(records)
}

fn replay_into(
    path: &Utf8Path,
    records: &mut BTreeMap<String, ResolutionRecord>,
) -> Result<usize, ResolverError> {
    if !path.as_std_path().exists() {
        return Ok(0);
    }
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path.as_std_path())
        .map_err(|err| ResolverError::Ledger(format!("open {path}: {err}")))?;

    let mut applied = 0usize;
    for (line, row) in reader.records().enumerate() {
        let row = match row {
            Ok(row) => row,
            Err(err) => {
                warn!(path = %path, line = line + 1, error = %err, "skipping unreadable ledger row");
                continue;
            }
        };
        match ResolutionRecord::from_row(&row) {
            Some(record) => {
                records.insert(record.original_id.clone(), record);
                applied += 1;
            }
            None => {
                warn!(path = %path, line = line + 1, "skipping malformed ledger row");
            }
        }
    }
    Ok(applied)
}

/// Replaces the table at `path` with `records`, via a rename so readers never
/// observe a half-written file.
pub fn write_table<'a>(
    path: &Utf8Path,
    records: impl IntoIterator<Item = &'a ResolutionRecord>,
) -> Result<(), ResolverError> {
    let parent = path
        .parent()
        .ok_or_else(|| ResolverError::Ledger(format!("invalid ledger path {path}")))?;
    fs::create_dir_all(parent.as_std_path()).map_err(ResolverError::fs)?;
    let temp = tempfile::Builder::new()
        .prefix("genome_status")
        .tempfile_in(parent.as_std_path())
        .map_err(ResolverError::fs)?;
    {
        let mut writer = WriterBuilder::new()
            .has_headers(false)
            .from_writer(temp.as_file());
        for record in records {
            writer
                .write_record(record.to_row())
                .map_err(|err| ResolverError::Ledger(err.to_string()))?;
        }
        writer
            .flush()
            .map_err(|err| ResolverError::Ledger(err.to_string()))?;
    }
    temp.as_file().sync_all().map_err(ResolverError::fs)?;
    temp.persist(path.as_std_path())
        .map_err(|err| ResolverError::Ledger(err.error.to_string()))?;
    Ok(())
}

#[derive(Debug)]
pub struct ResolutionLedger {
    snapshot: Utf8PathBuf,
    journal: Utf8PathBuf,
    records: BTreeMap<String, ResolutionRecord>,
}

impl ResolutionLedger {
    pub fn open(snapshot: Utf8PathBuf, journal: Utf8PathBuf) -> Result<Self, ResolverError> {
        let mut records = load_table(&snapshot)?;
        drop_torn_tail(&journal)?;
        let replayed = replay_into(&journal, &mut records)?;
        info!(
            snapshot = %snapshot,
            records = records.len(),
            replayed,
            "loaded genome status ledger"
        );
        Ok(Self {
            snapshot,
            journal,
            records,
        })
    }

    pub fn get(&self, original_id: &str) -> Option<&ResolutionRecord> {
        self.records.get(original_id)
    }

    /// The record for `original_id`, created unattempted on first encounter.
    pub fn entry(&mut self, original_id: &str) -> &mut ResolutionRecord {
        self.records
            .entry(original_id.to_string())
            .or_insert_with(|| ResolutionRecord::new(original_id))
    }

    /// Stores the outcome of an attempt and appends it to the journal.
    pub fn record(&mut self, record: ResolutionRecord) -> Result<(), ResolverError> {
        self.append(&record)?;
        self.records.insert(record.original_id.clone(), record);
        Ok(())
    }

    pub fn forget(&mut self, original_id: &str) -> Option<ResolutionRecord> {
        self.records.remove(original_id)
    }

    pub fn records(&self) -> impl Iterator<Item = &ResolutionRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Compacts snapshot and journal into a fresh snapshot.
    pub fn checkpoint(&mut self) -> Result<(), ResolverError> {
        write_table(&self.snapshot, self.records.values())?;
        if self.journal.as_std_path().exists() {
            fs::remove_file(self.journal.as_std_path()).map_err(ResolverError::fs)?;
        }
        debug!(snapshot = %self.snapshot, records = self.records.len(), "ledger checkpoint written");
        Ok(())
    }

    fn append(&self, record: &ResolutionRecord) -> Result<(), ResolverError> {
        if let Some(parent) = self.journal.parent() {
            fs::create_dir_all(parent.as_std_path()).map_err(ResolverError::fs)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.journal.as_std_path())
            .map_err(ResolverError::fs)?;
        let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
        writer
            .write_record(record.to_row())
            .map_err(|err| ResolverError::Ledger(err.to_string()))?;
        let file = writer
            .into_inner()
            .map_err(|err| ResolverError::Ledger(err.to_string()))?;
        file.sync_data().map_err(ResolverError::fs)
    }
}

/// A crash mid-append can leave a final row without its newline. Such a row
/// may still parse, so it is cut off before replay.
fn drop_torn_tail(journal: &Utf8Path) -> Result<(), ResolverError> {
    let Ok(mut file) = OpenOptions::new()
        .read(true)
        .write(true)
        .open(journal.as_std_path())
    else {
        return Ok(());
    };
    let mut content = Vec::new();
    file.read_to_end(&mut content).map_err(ResolverError::fs)?;
    if content.last().is_none_or(|last| *last == b'\n') {
        return Ok(());
    }
    let keep = content
        .iter()
        .rposition(|byte| *byte == b'\n')
        .map(|pos| pos + 1)
        .unwrap_or(0);
    warn!(
        journal = %journal,
        dropped_bytes = content.len() - keep,
        "journal ends with a partial row, discarding it"
    );
    file.set_len(keep as u64).map_err(ResolverError::fs)?;
    file.sync_data().map_err(ResolverError::fs)
}
