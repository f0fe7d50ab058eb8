//! SQLite-backed [`RecordSink`].

use rusqlite::{params, Connection};
use std::path::Path;
use tracing::debug;

use crate::model::{MetadataRecord, RawCapture};
use crate::traits::{RecordSink, SinkError};

pub struct SqliteStore {
    conn: Connection,
    listing_table: String,
    metadata_table: String,
}

impl SqliteStore {
    /// Opens (or creates) the database at `path` with the default table names.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        Self::with_tables(Connection::open(path)?, "front_matter", "metadata")
    }

    pub fn open_in_memory() -> Result<Self, SinkError> {
        Self::with_tables(Connection::open_in_memory()?, "front_matter", "metadata")
    }

    /// Wraps `conn` and creates both tables if they do not exist yet.
    pub fn with_tables(
        conn: Connection,
        listing_table: &str,
        metadata_table: &str,
    ) -> Result<Self, SinkError> {
        let store = Self {
            conn,
            listing_table: checked_table(listing_table)?.to_string(),
            metadata_table: checked_table(metadata_table)?.to_string(),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    fn initialize_schema(&self) -> Result<(), SinkError> {
        self.conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {} (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    url TEXT NOT NULL,
                    html TEXT NOT NULL,
                    page INTEGER NOT NULL
                )",
                self.listing_table
            ),
            [],
        )?;

        self.conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {} (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    url TEXT NOT NULL,
                    title TEXT NOT NULL,
                    publication_date TEXT,
                    authors TEXT,
                    status TEXT
                )",
                self.metadata_table
            ),
            [],
        )?;
        Ok(())
    }

    pub fn count(&self, table: &str) -> Result<usize, SinkError> {
        let table = checked_table(table)?;
        let n: i64 = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                row.get(0)
            })?;
        Ok(n as usize)
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn known_table(&self, table: &str) -> Result<(), SinkError> {
        checked_table(table)?;
        if table == self.listing_table || table == self.metadata_table {
            Ok(())
        } else {
            Err(SinkError::InvalidTable(table.to_string()))
        }
    }
}

/// Table names are interpolated into SQL, so only plain identifiers pass.
fn checked_table(table: &str) -> Result<&str, SinkError> {
    let valid = !table.is_empty()
        && !table.starts_with(|c: char| c.is_ascii_digit())
        && table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(table)
    } else {
        Err(SinkError::InvalidTable(table.to_string()))
    }
}

impl RecordSink for SqliteStore {
    fn append_captures(&mut self, table: &str, captures: &[RawCapture]) -> Result<usize, SinkError> {
        self.known_table(table)?;
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO {} (url, html, page) VALUES (?1, ?2, ?3)",
                table
            ))?;
            for capture in captures {
                stmt.execute(params![
                    capture.url,
                    capture.text().into_owned(),
                    capture.page_number
                ])?;
            }
        }
        tx.commit()?;

        debug!(table, rows = captures.len(), "Appended captures");
        Ok(captures.len())
    }

    fn append_metadata(
        &mut self,
        table: &str,
        records: &[MetadataRecord],
    ) -> Result<usize, SinkError> {
        self.known_table(table)?;
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO {} (url, title, publication_date, authors, status)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                table
            ))?;
            for record in records {
                stmt.execute(params![
                    record.url,
                    record.title,
                    record.publication_date,
                    record.authors,
                    record.status
                ])?;
            }
        }
        tx.commit()?;

        debug!(table, rows = records.len(), "Appended metadata");
        Ok(records.len())
    }
}
