use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StoreError;
use crate::schema::{Plant, PlantId};

/// One committed write against the plant collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreRecord {
    pub record_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub op: StoreOp,
}

impl StoreRecord {
    pub fn new(op: StoreOp) -> Self {
        Self {
            record_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            op,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreOp {
    /// Full replacement of a plant, journal included.
    Upsert { plant: Plant },
    /// Removes the plant and every event it owns.
    Delete { plant_id: PlantId },
    Clear,
}

/// Append-only JSONL journal backing the plant store.
///
/// Each line is one [`StoreRecord`].  A record is the unit of atomicity: it
/// is written and fsync'd in a single append, so replay sees either the whole
/// write or none of it.
#[derive(Debug, Clone)]
pub struct PlantJournal {
    path: PathBuf,
}

impl PlantJournal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, record: &StoreRecord) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)?;

        // A crash mid-append can leave an unterminated tail; start a fresh
        // line so this record is not glued onto it.
        let committed_len = file.metadata()?.len();
        if committed_len > 0 {
            let mut last = [0u8; 1];
            file.seek(SeekFrom::End(-1))?;
            file.read_exact(&mut last)?;
            if last[0] != b'\n' {
                line.insert(0, '\n');
            }
        }

        let written = (|| -> std::io::Result<()> {
            file.write_all(line.as_bytes())?;
            file.flush()?;
            file.sync_all()
        })();
        if let Err(err) = written {
            let _ = file.set_len(committed_len);
            return Err(err.into());
        }
        Ok(())
    }

    /// Atomically replace the journal with a new set of records.
    ///
    /// The records go to a `.tmp` sibling that is fsync'd and then renamed
    /// over the original; a crash before the rename leaves the old journal
    /// untouched.
    pub fn overwrite(&self, records: &[StoreRecord]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp_path = self.sibling("tmp");
        let write_result = (|| -> Result<(), StoreError> {
            let mut file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&tmp_path)?;
            for record in records {
                let line = serde_json::to_string(record)?;
                file.write_all(line.as_bytes())?;
                file.write_all(b"\n")?;
            }
            file.flush()?;
            file.sync_all()?;
            Ok(())
        })();

        if let Err(err) = write_result {
            let _ = fs::remove_file(&tmp_path);
            return Err(err);
        }

        if let Err(err) = fs::rename(&tmp_path, &self.path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(err.into());
        }

        Ok(())
    }

    /// Read every record.  Lines that fail to parse are skipped and copied to
    /// a `.corrupt` sidecar for inspection.
    pub fn load(&self) -> Result<Vec<StoreRecord>, StoreError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = OpenOptions::new().read(true).open(&self.path)?;
        let reader = BufReader::new(file);
        let mut records = Vec::new();
        let mut corrupt_count = 0usize;

        for (line_idx, line_result) in reader.lines().enumerate() {
            let line = line_result?;
            if line.trim().is_empty() {
                continue;
            }

            match serde_json::from_str::<StoreRecord>(&line) {
                Ok(record) => records.push(record),
                Err(err) => {
                    corrupt_count += 1;
                    tracing::warn!(
                        line = line_idx + 1,
                        error = %err,
                        path = %self.path.display(),
                        "corrupt journal record — skipping line"
                    );
                    let corrupt_path = self.sibling("corrupt");
                    if let Ok(mut bad) = OpenOptions::new().create(true).append(true).open(&corrupt_path) {
                        let _ = writeln!(bad, "{line}");
                    }
                }
            }
        }

        if corrupt_count > 0 {
            tracing::warn!(
                corrupt_lines = corrupt_count,
                path = %self.path.display(),
                "journal loaded with skipped corrupt lines — inspect .corrupt sidecar"
            );
        }

        Ok(records)
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let filename = self
            .path
            .file_name()
            .map(|f| f.to_string_lossy().to_string())
            .unwrap_or_else(|| "garden.jsonl".to_string());
        self.path.with_file_name(format!("{filename}.{suffix}"))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use chrono::Utc;
    use tempfile::TempDir;

    use super::{PlantJournal, StoreOp, StoreRecord};
    use crate::schema::{IntervalDays, PlantDraft, PlantId};

    fn upsert(name: &str) -> StoreRecord {
        let plant = PlantDraft::new(name, "Monstera deliciosa")
            .into_plant(Utc::now(), IntervalDays::DEFAULT)
            .unwrap();
        StoreRecord::new(StoreOp::Upsert { plant })
    }

    fn journal(dir: &TempDir) -> PlantJournal {
        PlantJournal::new(dir.path().join("garden.jsonl"))
    }

    #[test]
    fn append_and_load_preserve_order() {
        let dir = TempDir::new().unwrap();
        let journal = journal(&dir);
        journal.append(&upsert("first")).unwrap();
        journal.append(&StoreRecord::new(StoreOp::Delete { plant_id: PlantId::new() })).unwrap();
        journal.append(&StoreRecord::new(StoreOp::Clear)).unwrap();

        let records = journal.load().unwrap();
        assert_eq!(records.len(), 3);
        assert!(matches!(&records[0].op, StoreOp::Upsert { plant } if plant.name == "first"));
        assert!(matches!(records[1].op, StoreOp::Delete { .. }));
        assert!(matches!(records[2].op, StoreOp::Clear));
    }

    #[test]
    fn load_nonexistent_returns_empty() {
        let dir = TempDir::new().unwrap();
        assert!(journal(&dir).load().unwrap().is_empty());
    }

    #[test]
    fn overwrite_replaces_all_records() {
        let dir = TempDir::new().unwrap();
        let journal = journal(&dir);
        journal.append(&upsert("old")).unwrap();
        journal.append(&upsert("also old")).unwrap();

        journal.overwrite(&[upsert("new")]).unwrap();
        let loaded = journal.load().unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(matches!(&loaded[0].op, StoreOp::Upsert { plant } if plant.name == "new"));
        assert!(!dir.path().join("garden.jsonl.tmp").exists());
    }

    #[test]
    fn load_skips_corrupt_lines_into_sidecar() {
        let dir = TempDir::new().unwrap();
        let journal = journal(&dir);
        journal.append(&upsert("valid")).unwrap();
        {
            let mut file = std::fs::OpenOptions::new()
                .append(true)
                .open(journal.path())
                .unwrap();
            writeln!(file, "{{invalid json garbage}}").unwrap();
        }
        journal.append(&upsert("also valid")).unwrap();

        let records = journal.load().unwrap();
        assert_eq!(records.len(), 2);
        let sidecar = std::fs::read_to_string(dir.path().join("garden.jsonl.corrupt")).unwrap();
        assert!(sidecar.contains("invalid json garbage"));
    }

    #[test]
    fn append_after_torn_write_starts_a_new_line() {
        let dir = TempDir::new().unwrap();
        let journal = journal(&dir);
        journal.append(&upsert("before")).unwrap();
        {
            let mut file = std::fs::OpenOptions::new()
                .append(true)
                .open(journal.path())
                .unwrap();
            write!(file, "{{\"record_id\":\"torn").unwrap();
        }
        journal.append(&upsert("after")).unwrap();

        let records = journal.load().unwrap();
        assert_eq!(records.len(), 2);
        assert!(matches!(&records[1].op, StoreOp::Upsert { plant } if plant.name == "after"));
        let sidecar = std::fs::read_to_string(dir.path().join("garden.jsonl.corrupt")).unwrap();
        assert!(sidecar.contains("torn"));
        assert!(!sidecar.contains("after"));
    }

    #[test]
    fn journal_lines_are_tagged_by_kind() {
        let dir = TempDir::new().unwrap();
        let journal = journal(&dir);
        journal.append(&StoreRecord::new(StoreOp::Clear)).unwrap();
        let raw = std::fs::read_to_string(journal.path()).unwrap();
        assert!(raw.contains("\"kind\":\"clear\""), "{raw}");
    }
}
