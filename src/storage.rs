//! Detection record persistence.
//!
//! Records are stored as JSON documents in insertion order and read back
//! with skip/limit paging. The sqlite store backs the daemon; the in-memory
//! store backs tests and one-shot runs.

use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use rusqlite::{params, Connection};

use crate::record::DetectionRecord;

pub trait DetectionStore: Send {
    fn append_record(&mut self, record: &DetectionRecord) -> Result<()>;

    /// Read records in storage (insertion) order, skipping `skip` and
    /// returning at most `limit`.
    fn read_records(&mut self, skip: usize, limit: usize) -> Result<Vec<DetectionRecord>>;
}

/// Store shared between the API server and pipeline runs.
pub type SharedStore = Arc<Mutex<dyn DetectionStore>>;

/// Per-call locking adapter so a [`SharedStore`] can be handed to code that
/// wants a plain `&mut dyn DetectionStore`.
pub struct StoreHandle(pub SharedStore);

impl DetectionStore for StoreHandle {
    fn append_record(&mut self, record: &DetectionRecord) -> Result<()> {
        self.0
            .lock()
            .map_err(|_| anyhow!("store lock poisoned"))?
            .append_record(record)
    }

    fn read_records(&mut self, skip: usize, limit: usize) -> Result<Vec<DetectionRecord>> {
        self.0
            .lock()
            .map_err(|_| anyhow!("store lock poisoned"))?
            .read_records(skip, limit)
    }
}

pub struct SqliteDetectionStore {
    conn: Connection,
}

impl SqliteDetectionStore {
    pub fn open(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path)?;
        let mut store = Self { conn };
        store.ensure_schema()?;
        Ok(store)
    }

    fn ensure_schema(&mut self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;

            CREATE TABLE IF NOT EXISTS detections (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              created_at TEXT NOT NULL,
              payload_json TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_detections_created ON detections(created_at);
            "#,
        )?;
        Ok(())
    }
}

impl DetectionStore for SqliteDetectionStore {
    fn append_record(&mut self, record: &DetectionRecord) -> Result<()> {
        let payload_json = serde_json::to_string(record)?;
        self.conn.execute(
            "INSERT INTO detections(created_at, payload_json) VALUES (?1, ?2)",
            params![record.timestamp, payload_json],
        )?;
        Ok(())
    }

    fn read_records(&mut self, skip: usize, limit: usize) -> Result<Vec<DetectionRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT payload_json FROM detections ORDER BY id ASC LIMIT ?1 OFFSET ?2")?;
        let mut rows = stmt.query(params![limit as i64, skip as i64])?;

        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let payload: String = row.get(0)?;
            out.push(serde_json::from_str(&payload)?);
        }
        Ok(out)
    }
}

#[derive(Clone, Debug, Default)]
pub struct InMemoryDetectionStore {
    records: Vec<DetectionRecord>,
}

impl InMemoryDetectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl DetectionStore for InMemoryDetectionStore {
    fn append_record(&mut self, record: &DetectionRecord) -> Result<()> {
        self.records.push(record.clone());
        Ok(())
    }

    fn read_records(&mut self, skip: usize, limit: usize) -> Result<Vec<DetectionRecord>> {
        Ok(self
            .records
            .iter()
            .skip(skip)
            .take(limit)
            .cloned()
            .collect())
    }
}
