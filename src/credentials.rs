//! # Credentials
//!
//! Saved form passwords for autofill, one SQLite table keyed by host and the
//! serialized form layout.

use std::path::Path;

use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("form data error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// One input of a saved login form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormField {
    pub name: String,
    pub kind: String,
    pub selector: String,
}

/// Ordered form layout. Serialization is stable, so equal layouts map to
/// identical `form_data` text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormFields(pub Vec<FormField>);

impl FormFields {
    pub fn to_column(&self) -> Result<String, CredentialError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_column(raw: &str) -> Result<Self, CredentialError> {
        Ok(serde_json::from_str(raw)?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialRecord {
    pub id: i64,
    pub host: String,
    pub password: String,
    pub form_fields: FormFields,
}

pub struct CredentialStore {
    conn: Connection,
}

impl CredentialStore {
    pub fn open(path: &Path) -> Result<Self, CredentialError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, CredentialError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, CredentialError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS autofill \
             (id INTEGER PRIMARY KEY AUTOINCREMENT, host TEXT, password TEXT, form_data TEXT)",
            [],
        )?;
        Ok(Self { conn })
    }

    /// Save `password` for this host and form layout. An existing row for the
    /// same pair is updated in place; both paths commit together.
    pub fn upsert(
        &mut self,
        host: &str,
        password: &str,
        form_fields: &FormFields,
    ) -> Result<(), CredentialError> {
        let form_data = form_fields.to_column()?;
        let tx = self.conn.transaction()?;
        let existing: Option<i64> = tx
            .query_row(
                "SELECT id FROM autofill WHERE host = ?1 AND form_data = ?2 ORDER BY id",
                params![host, form_data],
                |row| row.get(0),
            )
            .optional()?;

        match existing {
            Some(id) => {
                tx.execute(
                    "UPDATE autofill SET password = ?1 WHERE host = ?2 AND form_data = ?3",
                    params![password, host, form_data],
                )?;
                debug!("updated saved password {id} for {host}");
            }
            None => {
                tx.execute(
                    "INSERT INTO autofill (host, password, form_data) VALUES (?1, ?2, ?3)",
                    params![host, password, form_data],
                )?;
                debug!("saved new password for {host}");
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Every record for `host` with an id above `after_id`, oldest first.
    /// Rows whose `form_data` does not decode are skipped with a warning.
    pub fn query(&self, host: &str, after_id: i64) -> Result<Vec<CredentialRecord>, CredentialError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, host, password, form_data FROM autofill WHERE host = ?1 AND id > ?2 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![host, after_id], |row| {
            let id: i64 = row.get(0)?;
            let host: String = row.get(1)?;
            let password: String = row.get(2)?;
            let form_data: String = row.get(3)?;
            Ok((id, host, password, form_data))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (id, host, password, form_data) = row?;
            let form_fields = match FormFields::from_column(&form_data) {
                Ok(fields) => fields,
                Err(err) => {
                    warn!("skipping saved password {id} for {host}: {err}");
                    continue;
                }
            };
            out.push(CredentialRecord {
                id,
                host,
                password,
                form_fields,
            });
        }
        Ok(out)
    }

    /// The next candidate after `after_id`, used to cycle autofill.
    pub fn next_after(
        &self,
        host: &str,
        after_id: i64,
    ) -> Result<Option<CredentialRecord>, CredentialError> {
        Ok(self.query(host, after_id)?.into_iter().next())
    }
}
