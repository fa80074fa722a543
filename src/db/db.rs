use super::migrations::MigrationManager;
use crate::libs::data_storage::DataStorage;
use anyhow::Result;
use rusqlite::Connection;
use std::path::Path;

pub const DB_FILE_NAME: &str = "actrail.db";

/// SQLite connection with the schema brought up to date.
pub struct Db {
    pub conn: Connection,
}

impl Db {
    /// Opens the database in the data directory.
    pub fn new() -> Result<Db> {
        let db_file_path = DataStorage::new().get_path(DB_FILE_NAME)?;
        Self::open(db_file_path)
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Db> {
        Self::migrated(Connection::open(path)?)
    }

    /// Private in-memory database, used by tests and dry runs.
    pub fn in_memory() -> Result<Db> {
        Self::migrated(Connection::open_in_memory()?)
    }

    fn migrated(mut conn: Connection) -> Result<Db> {
        MigrationManager::new().run_migrations(&mut conn)?;
        Ok(Db { conn })
    }
}
