use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;
use versus_core::{Record, RecordId, RecordStore, VersusError};

/// SQLite-backed record store. Every entity shares one `records` table; the
/// full record is kept as JSON next to the columns used for lookups.
///
/// A transaction is opened by the first staged write and closed by
/// `commit`, so reads on the same connection see staged rows.
pub struct SqliteStore {
    conn: Connection,
    path: Option<PathBuf>,
    next_id: u64,
    in_tx: bool,
}

impl SqliteStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path)
            .with_context(|| format!("failed to open database {}", path.display()))?;
        Self::with_connection(conn, Some(path))
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?, None)
    }

    fn with_connection(conn: Connection, path: Option<PathBuf>) -> Result<Self> {
        let mut store = Self {
            conn,
            path,
            next_id: 0,
            in_tx: false,
        };
        store.init()?;
        store.next_id = store.max_id()?;
        Ok(store)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn init(&self) -> Result<()> {
        self.conn
            .execute_batch(
                r#"
            CREATE TABLE IF NOT EXISTS records (
                id INTEGER PRIMARY KEY,
                entity TEXT NOT NULL,
                name TEXT,
                body TEXT NOT NULL,
                created_at TEXT DEFAULT CURRENT_TIMESTAMP
            );
            CREATE INDEX IF NOT EXISTS idx_records_entity_name ON records(entity, name);
            "#,
            )
            .context("failed to initialise records table")?;
        Ok(())
    }

    fn max_id(&self) -> Result<u64> {
        let max: Option<i64> = self
            .conn
            .query_row("SELECT MAX(id) FROM records", [], |row| row.get(0))?;
        Ok(max.unwrap_or(0).max(0) as u64)
    }

    pub fn count(&self, entity: &str) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM records WHERE entity = ?1",
            [entity],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    pub fn rollback(&mut self) -> Result<()> {
        if self.in_tx {
            self.conn.execute_batch("ROLLBACK")?;
            self.in_tx = false;
        }
        Ok(())
    }

    fn begin(&mut self) -> rusqlite::Result<()> {
        if !self.in_tx {
            self.conn.execute_batch("BEGIN")?;
            self.in_tx = true;
        }
        Ok(())
    }

    fn query_records(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> versus_core::Result<Vec<Record>> {
        let mut stmt = self.conn.prepare(sql).map_err(store_error)?;
        let mut rows = stmt.query(params).map_err(store_error)?;
        let mut records = Vec::new();
        while let Some(row) = rows.next().map_err(store_error)? {
            let body: String = row.get(0).map_err(store_error)?;
            records.push(serde_json::from_str(&body)?);
        }
        Ok(records)
    }
}

fn store_error(err: rusqlite::Error) -> VersusError {
    VersusError::Store(err.to_string())
}

impl RecordStore for SqliteStore {
    fn allocate_id(&mut self) -> versus_core::Result<RecordId> {
        self.next_id += 1;
        Ok(RecordId(self.next_id))
    }

    fn get(&self, id: RecordId) -> versus_core::Result<Option<Record>> {
        let body: Option<String> = self
            .conn
            .query_row(
                "SELECT body FROM records WHERE id = ?1",
                [id.0 as i64],
                |row| row.get(0),
            )
            .optional()
            .map_err(store_error)?;
        Ok(body.map(|body| serde_json::from_str(&body)).transpose()?)
    }

    fn find_by_name(&self, entity: &str, name: &str) -> versus_core::Result<Option<Record>> {
        let mut records = self.query_records(
            "SELECT body FROM records WHERE entity = ?1 AND name = ?2 ORDER BY id LIMIT 1",
            params![entity, name],
        )?;
        Ok(records.pop())
    }

    fn find_all(&self, entity: &str) -> versus_core::Result<Vec<Record>> {
        self.query_records(
            "SELECT body FROM records WHERE entity = ?1 ORDER BY id",
            params![entity],
        )
    }

    fn save(&mut self, record: &Record) -> versus_core::Result<()> {
        let body = serde_json::to_string(record)?;
        self.begin().map_err(store_error)?;
        self.conn
            .execute(
                r#"
                INSERT INTO records (id, entity, name, body) VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(id) DO UPDATE SET
                    entity = excluded.entity,
                    name = excluded.name,
                    body = excluded.body
                "#,
                params![record.id.0 as i64, record.entity, record.name(), body],
            )
            .map_err(store_error)?;
        Ok(())
    }

    fn commit(&mut self) -> versus_core::Result<()> {
        if self.in_tx {
            self.conn.execute_batch("COMMIT").map_err(store_error)?;
            self.in_tx = false;
            debug!("sqlite commit");
        }
        Ok(())
    }

    fn delete_all(&mut self, tables: &[String]) -> versus_core::Result<()> {
        self.begin().map_err(store_error)?;
        for table in tables {
            let removed = self
                .conn
                .execute("DELETE FROM records WHERE entity = ?1", [table])
                .map_err(store_error)?;
            debug!(entity = %table, removed, "records deleted");
        }
        Ok(())
    }
}
