use crate::db::db::Db;
use crate::libs::activity::{ActivityRecord, ActivityStatus, RecordTrigger};
use crate::libs::batcher::LocalStore;
use crate::libs::error::StoreError;
use anyhow::Result;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row};
use std::error::Error;
use std::sync::Arc;
use uuid::Uuid;

const INSERT_RECORD: &str = "INSERT OR IGNORE INTO activity_records
    (id, timestamp, window_title, process_name, user_identity, status, record_trigger, idle_seconds)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)";

const SELECT_RECENT: &str = "SELECT id, timestamp, window_title, process_name, user_identity, status, record_trigger, idle_seconds
    FROM activity_records ORDER BY timestamp DESC, created_at DESC LIMIT ?1";

const COUNT_RECORDS: &str = "SELECT COUNT(*) FROM activity_records";

/// SQLite-backed activity timeline.
#[derive(Clone)]
pub struct ActivityRecords {
    pub conn: Arc<Mutex<Connection>>,
}

impl ActivityRecords {
    pub fn new() -> Result<ActivityRecords> {
        Ok(Self::from_db(Db::new()?))
    }

    pub fn in_memory() -> Result<ActivityRecords> {
        Ok(Self::from_db(Db::in_memory()?))
    }

    pub fn from_db(db: Db) -> ActivityRecords {
        ActivityRecords {
            conn: Arc::new(Mutex::new(db.conn)),
        }
    }

    /// Newest records first.
    pub fn fetch_recent(&self, limit: usize) -> Result<Vec<ActivityRecord>> {
        let conn_guard = self.conn.lock();
        let mut stmt = conn_guard.prepare(SELECT_RECENT)?;
        let records = stmt
            .query_map(params![limit as i64], record_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    pub fn count(&self) -> Result<u64> {
        let conn_guard = self.conn.lock();
        let count: i64 = conn_guard.query_row(COUNT_RECORDS, [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

impl LocalStore for ActivityRecords {
    fn write_batch(&self, records: &[ActivityRecord]) -> Result<(), StoreError> {
        let mut conn_guard = self.conn.lock();
        let tx = conn_guard.transaction()?;
        {
            let mut stmt = tx.prepare_cached(INSERT_RECORD)?;
            for record in records {
                stmt.execute(params![
                    record.id.to_string(),
                    record.timestamp,
                    record.window_title,
                    record.process_name,
                    record.user_identity,
                    record.activity_status.as_str(),
                    record.trigger.as_str(),
                    record.idle_seconds.map(|secs| secs as i64),
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}

fn conversion_error(index: usize, error: impl Into<Box<dyn Error + Send + Sync>>) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(index, Type::Text, error.into())
}

fn record_from_row(row: &Row) -> rusqlite::Result<ActivityRecord> {
    let id: String = row.get(0)?;
    let status: String = row.get(5)?;
    let trigger: String = row.get(6)?;

    Ok(ActivityRecord {
        id: Uuid::parse_str(&id).map_err(|e| conversion_error(0, e))?,
        timestamp: row.get::<_, DateTime<Utc>>(1)?,
        window_title: row.get(2)?,
        process_name: row.get(3)?,
        user_identity: row.get(4)?,
        activity_status: status.parse::<ActivityStatus>().map_err(|e| conversion_error(5, e))?,
        trigger: trigger.parse::<RecordTrigger>().map_err(|e| conversion_error(6, e))?,
        idle_seconds: row.get::<_, Option<i64>>(7)?.map(|secs| secs.max(0) as u64),
    })
}
