//! Persistence of computed values.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use thiserror::Error;

use super::schema::{SchemaError, init_schema};
use super::types::{ComputationRecord, FieldKey, Status};
use crate::fields::OutputKind;
use crate::store::NotePath;

#[derive(Debug, Error)]
pub enum ValueDbError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("failed to create database directory {path}: {source}")]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// SQLite handle holding the previous value of every lookup and formula.
pub struct ValueDb {
    conn: Connection,
}

impl std::fmt::Debug for ValueDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValueDb").finish_non_exhaustive()
    }
}

impl ValueDb {
    /// Open or create the database at `path`, creating parent directories.
    pub fn open(path: &Path) -> Result<Self, ValueDbError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|source| ValueDbError::CreateDir {
                path: parent.display().to_string(),
                source,
            })?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;",
        )?;
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Create an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self, ValueDbError> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Every stored record. Rows that cannot be decoded are skipped.
    pub fn load_all(&self) -> Result<HashMap<FieldKey, ComputationRecord>, ValueDbError> {
        let mut stmt = self.conn.prepare(
            "SELECT note_path, field_id, value_json, output_kind, status, message, updated_at
             FROM computed_values",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(RawRow {
                note_path: row.get(0)?,
                field_id: row.get(1)?,
                value_json: row.get(2)?,
                output_kind: row.get(3)?,
                status: row.get(4)?,
                message: row.get(5)?,
                updated_at: row.get(6)?,
            })
        })?;

        let mut out = HashMap::new();
        for row in rows {
            let row = row?;
            match row.decode() {
                Ok((key, record)) => {
                    out.insert(key, record);
                }
                Err(e) => {
                    tracing::warn!(note = %row.note_path, field = %row.field_id, error = %e, "Skipping stored value");
                }
            }
        }
        Ok(out)
    }

    pub fn get(&self, key: &FieldKey) -> Result<Option<ComputationRecord>, ValueDbError> {
        let row = self
            .conn
            .query_row(
                "SELECT note_path, field_id, value_json, output_kind, status, message, updated_at
                 FROM computed_values WHERE note_path = ?1 AND field_id = ?2",
                params![key.note.as_str(), key.field_id],
                |row| {
                    Ok(RawRow {
                        note_path: row.get(0)?,
                        field_id: row.get(1)?,
                        value_json: row.get(2)?,
                        output_kind: row.get(3)?,
                        status: row.get(4)?,
                        message: row.get(5)?,
                        updated_at: row.get(6)?,
                    })
                },
            )
            .optional()?;
        row.map(|r| r.decode().map(|(_, record)| record)).transpose()
    }

    /// Insert or replace one record.
    pub fn upsert(&self, key: &FieldKey, record: &ComputationRecord) -> Result<(), ValueDbError> {
        upsert_with(&self.conn, key, record)
    }

    /// Write a batch of changes in one transaction. `None` deletes the key.
    pub fn apply<'a>(
        &self,
        changes: impl IntoIterator<Item = (&'a FieldKey, Option<&'a ComputationRecord>)>,
    ) -> Result<usize, ValueDbError> {
        let tx = self.conn.unchecked_transaction()?;
        let mut count = 0;
        for (key, record) in changes {
            match record {
                Some(record) => upsert_with(&tx, key, record)?,
                None => {
                    tx.execute(
                        "DELETE FROM computed_values WHERE note_path = ?1 AND field_id = ?2",
                        params![key.note.as_str(), key.field_id],
                    )?;
                }
            }
            count += 1;
        }
        tx.commit()?;
        Ok(count)
    }

    /// Delete every record of a note.
    pub fn delete_note(&self, note: &NotePath) -> Result<usize, ValueDbError> {
        Ok(self
            .conn
            .execute("DELETE FROM computed_values WHERE note_path = ?1", [note.as_str()])?)
    }

    pub fn count(&self) -> Result<usize, ValueDbError> {
        let n: i64 =
            self.conn.query_row("SELECT COUNT(*) FROM computed_values", [], |row| row.get(0))?;
        Ok(n as usize)
    }
}

fn upsert_with(
    conn: &Connection,
    key: &FieldKey,
    record: &ComputationRecord,
) -> Result<(), ValueDbError> {
    let value_json = record
        .value
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| ValueDbError::InvalidData(e.to_string()))?;
    conn.execute(
        "INSERT INTO computed_values
            (note_path, field_id, value_json, output_kind, status, message, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(note_path, field_id) DO UPDATE SET
            value_json = excluded.value_json,
            output_kind = excluded.output_kind,
            status = excluded.status,
            message = excluded.message,
            updated_at = excluded.updated_at",
        params![
            key.note.as_str(),
            key.field_id,
            value_json,
            record.output_kind.as_string(),
            record.status.as_str(),
            record.status.message(),
            record.updated_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

struct RawRow {
    note_path: String,
    field_id: String,
    value_json: Option<String>,
    output_kind: String,
    status: String,
    message: Option<String>,
    updated_at: String,
}

impl RawRow {
    fn decode(&self) -> Result<(FieldKey, ComputationRecord), ValueDbError> {
        let value = self
            .value_json
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(|e| ValueDbError::InvalidData(e.to_string()))?;
        let output_kind = OutputKind::parse(&self.output_kind).ok_or_else(|| {
            ValueDbError::InvalidData(format!("unknown output kind '{}'", self.output_kind))
        })?;
        let status = Status::from_parts(&self.status, self.message.clone())
            .ok_or_else(|| ValueDbError::InvalidData(format!("unknown status '{}'", self.status)))?;
        let updated_at = DateTime::parse_from_rfc3339(&self.updated_at)
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        Ok((
            FieldKey::new(NotePath::new(self.note_path.clone()), self.field_id.clone()),
            ComputationRecord { value, output_kind, status, updated_at },
        ))
    }
}
