use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

use crate::error::{Error, Result};
use crate::history::{ActionKind, ActionRecord, Outcome};

/// Persisted form of the encrypted credential. At most one row exists; the
/// `slot = 0` check in the schema enforces that structurally.
#[derive(Debug, Clone, PartialEq)]
pub struct CredentialRow {
    pub ciphertext: Vec<u8>,
    pub nonce: Vec<u8>,
    pub salt: Vec<u8>,
    pub kdf_iterations: u32,
    pub label: Option<String>,
    pub scopes: Option<String>,
}

/// Persisted password verifier. Absent entirely in weak (no-password) mode.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifierRow {
    pub verifier: Vec<u8>,
    pub salt: Vec<u8>,
    pub kdf_iterations: u32,
}

/// Persistence surface the vault operates against.
///
/// Kept as a trait so vault tests can wrap the SQLite implementation with
/// stores that fail mid-sequence, exercising the atomicity guarantees.
pub trait VaultStore {
    fn credential(&self) -> Result<Option<CredentialRow>>;
    fn verifier(&self) -> Result<Option<VerifierRow>>;

    /// Write or overwrite the credential slot in a single atomic statement.
    fn put_credential(&mut self, row: &CredentialRow) -> Result<()>;

    /// Write or overwrite the verifier slot in a single atomic statement.
    fn put_verifier(&mut self, row: &VerifierRow) -> Result<()>;

    /// Atomically replace both slots: after this call the verifier equals
    /// `verifier` and the credential equals `credential` (absent when None).
    /// Either everything is applied or nothing is.
    fn replace_all(&mut self, verifier: &VerifierRow, credential: Option<&CredentialRow>)
        -> Result<()>;

    fn clear_credential(&mut self) -> Result<()>;

    /// Atomically delete both slots.
    fn clear_all(&mut self) -> Result<()>;
}

/// Single-file SQLite store holding the credential, the password verifier,
/// and the append-only history table.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) the store at the given path and run migrations.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.run_migrations()?;
        Ok(store)
    }

    /// Open an in-memory store (unit tests only).
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.run_migrations()?;
        Ok(store)
    }

    fn run_migrations(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS credential (
                slot            INTEGER PRIMARY KEY CHECK (slot = 0),
                ciphertext      BLOB NOT NULL,
                nonce           BLOB NOT NULL,
                salt            BLOB NOT NULL,
                kdf_iterations  INTEGER NOT NULL,
                label           TEXT,
                scopes          TEXT
            );

            CREATE TABLE IF NOT EXISTS password_verifier (
                slot            INTEGER PRIMARY KEY CHECK (slot = 0),
                verifier        BLOB NOT NULL,
                salt            BLOB NOT NULL,
                kdf_iterations  INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS history (
                id       INTEGER PRIMARY KEY AUTOINCREMENT,
                ts       TEXT NOT NULL,
                action   TEXT NOT NULL,
                target   TEXT NOT NULL,
                outcome  TEXT NOT NULL,
                detail   TEXT
            );
            ",
        )?;
        log::debug!("store migrations completed");
        Ok(())
    }

    /// Append one record to the history table. Records are insert-only.
    pub fn append_history(&mut self, record: &ActionRecord) -> Result<()> {
        self.conn.execute(
            "INSERT INTO history (ts, action, target, outcome, detail)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.timestamp.to_rfc3339(),
                record.action.as_str(),
                record.target,
                record.outcome.as_str(),
                record.detail,
            ],
        )?;
        Ok(())
    }

    /// Most recent history records, newest first.
    pub fn recent_history(&self, limit: usize) -> Result<Vec<ActionRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT ts, action, target, outcome, detail
             FROM history ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, Option<String>>(4)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (ts, action, target, outcome, detail) = row?;
            records.push(ActionRecord {
                timestamp: parse_timestamp(&ts)?,
                action: ActionKind::parse(&action)
                    .ok_or_else(|| Error::VaultCorrupted(format!("unknown action kind '{action}'")))?,
                target,
                outcome: Outcome::parse(&outcome)
                    .ok_or_else(|| Error::VaultCorrupted(format!("unknown outcome '{outcome}'")))?,
                detail,
            });
        }
        Ok(records)
    }

    fn row_to_credential(row: &rusqlite::Row<'_>) -> rusqlite::Result<CredentialRow> {
        Ok(CredentialRow {
            ciphertext: row.get(0)?,
            nonce: row.get(1)?,
            salt: row.get(2)?,
            kdf_iterations: row.get(3)?,
            label: row.get(4)?,
            scopes: row.get(5)?,
        })
    }

    fn row_to_verifier(row: &rusqlite::Row<'_>) -> rusqlite::Result<VerifierRow> {
        Ok(VerifierRow {
            verifier: row.get(0)?,
            salt: row.get(1)?,
            kdf_iterations: row.get(2)?,
        })
    }
}

fn parse_timestamp(ts: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(ts)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| Error::VaultCorrupted(format!("unparseable history timestamp '{ts}'")))
}

impl VaultStore for SqliteStore {
    fn credential(&self) -> Result<Option<CredentialRow>> {
        let row = self
            .conn
            .query_row(
                "SELECT ciphertext, nonce, salt, kdf_iterations, label, scopes
                 FROM credential WHERE slot = 0",
                [],
                Self::row_to_credential,
            )
            .optional()?;
        Ok(row)
    }

    fn verifier(&self) -> Result<Option<VerifierRow>> {
        let row = self
            .conn
            .query_row(
                "SELECT verifier, salt, kdf_iterations
                 FROM password_verifier WHERE slot = 0",
                [],
                Self::row_to_verifier,
            )
            .optional()?;
        Ok(row)
    }

    fn put_credential(&mut self, row: &CredentialRow) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO credential
                 (slot, ciphertext, nonce, salt, kdf_iterations, label, scopes)
             VALUES (0, ?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                row.ciphertext,
                row.nonce,
                row.salt,
                row.kdf_iterations,
                row.label,
                row.scopes,
            ],
        )?;
        Ok(())
    }

    fn put_verifier(&mut self, row: &VerifierRow) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO password_verifier (slot, verifier, salt, kdf_iterations)
             VALUES (0, ?1, ?2, ?3)",
            params![row.verifier, row.salt, row.kdf_iterations],
        )?;
        Ok(())
    }

    fn replace_all(
        &mut self,
        verifier: &VerifierRow,
        credential: Option<&CredentialRow>,
    ) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM password_verifier", [])?;
        tx.execute("DELETE FROM credential", [])?;
        tx.execute(
            "INSERT INTO password_verifier (slot, verifier, salt, kdf_iterations)
             VALUES (0, ?1, ?2, ?3)",
            params![verifier.verifier, verifier.salt, verifier.kdf_iterations],
        )?;
        if let Some(cred) = credential {
            tx.execute(
                "INSERT INTO credential
                     (slot, ciphertext, nonce, salt, kdf_iterations, label, scopes)
                 VALUES (0, ?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    cred.ciphertext,
                    cred.nonce,
                    cred.salt,
                    cred.kdf_iterations,
                    cred.label,
                    cred.scopes,
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn clear_credential(&mut self) -> Result<()> {
        self.conn.execute("DELETE FROM credential", [])?;
        Ok(())
    }

    fn clear_all(&mut self) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM credential", [])?;
        tx.execute("DELETE FROM password_verifier", [])?;
        tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_credential() -> CredentialRow {
        CredentialRow {
            ciphertext: vec![1, 2, 3, 4],
            nonce: vec![0; 12],
            salt: vec![7; 16],
            kdf_iterations: 200_000,
            label: Some("work token".to_string()),
            scopes: Some("repo,delete_repo".to_string()),
        }
    }

    fn sample_verifier() -> VerifierRow {
        VerifierRow {
            verifier: vec![9; 32],
            salt: vec![5; 16],
            kdf_iterations: 200_000,
        }
    }

    #[test]
    fn test_migrations_create_tables() {
        let store = SqliteStore::open_in_memory().unwrap();
        for table in ["credential", "password_verifier", "history"] {
            let count: i64 = store
                .conn
                .query_row(
                    "SELECT count(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    params![table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "{table} table should exist");
        }
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(store.run_migrations().is_ok());
    }

    #[test]
    fn test_credential_slot_is_single() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        assert!(store.credential().unwrap().is_none());

        store.put_credential(&sample_credential()).unwrap();

        let mut second = sample_credential();
        second.ciphertext = vec![9, 9, 9];
        store.put_credential(&second).unwrap();

        let count: i64 = store
            .conn
            .query_row("SELECT count(*) FROM credential", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1, "second write must replace, not duplicate");
        assert_eq!(store.credential().unwrap().unwrap().ciphertext, vec![9, 9, 9]);
    }

    #[test]
    fn test_verifier_roundtrip() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        assert!(store.verifier().unwrap().is_none());

        store.put_verifier(&sample_verifier()).unwrap();
        assert_eq!(store.verifier().unwrap().unwrap(), sample_verifier());
    }

    #[test]
    fn test_replace_all_swaps_both_slots() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.put_verifier(&sample_verifier()).unwrap();
        store.put_credential(&sample_credential()).unwrap();

        let new_verifier = VerifierRow {
            verifier: vec![1; 32],
            salt: vec![2; 16],
            kdf_iterations: 200_000,
        };
        let mut new_cred = sample_credential();
        new_cred.nonce = vec![3; 12];

        store.replace_all(&new_verifier, Some(&new_cred)).unwrap();
        assert_eq!(store.verifier().unwrap().unwrap(), new_verifier);
        assert_eq!(store.credential().unwrap().unwrap().nonce, vec![3; 12]);
    }

    #[test]
    fn test_replace_all_without_credential_clears_slot() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.put_credential(&sample_credential()).unwrap();

        store.replace_all(&sample_verifier(), None).unwrap();
        assert!(store.credential().unwrap().is_none());
        assert!(store.verifier().unwrap().is_some());
    }

    #[test]
    fn test_clear_all_removes_both() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.put_verifier(&sample_verifier()).unwrap();
        store.put_credential(&sample_credential()).unwrap();

        store.clear_all().unwrap();
        assert!(store.credential().unwrap().is_none());
        assert!(store.verifier().unwrap().is_none());
    }

    #[test]
    fn test_history_preserves_order_newest_first() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store
            .append_history(&ActionRecord::success(ActionKind::Upload, "o/r/a.txt"))
            .unwrap();
        store
            .append_history(&ActionRecord::failure(
                ActionKind::DeleteFile,
                "o/r/b.txt",
                "404",
            ))
            .unwrap();
        store
            .append_history(&ActionRecord::success(ActionKind::Rename, "o/r/c.txt"))
            .unwrap();

        let records = store.recent_history(10).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].action, ActionKind::Rename);
        assert_eq!(records[1].action, ActionKind::DeleteFile);
        assert_eq!(records[1].outcome, Outcome::Failure);
        assert_eq!(records[1].detail.as_deref(), Some("404"));
        assert_eq!(records[2].action, ActionKind::Upload);
    }

    #[test]
    fn test_history_limit() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        for i in 0..5 {
            store
                .append_history(&ActionRecord::success(
                    ActionKind::ListTree,
                    format!("o/r#{i}"),
                ))
                .unwrap();
        }
        assert_eq!(store.recent_history(2).unwrap().len(), 2);
    }

    #[test]
    fn test_history_survives_reopen() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("vault.db");

        {
            let mut store = SqliteStore::open(&path).unwrap();
            store
                .append_history(&ActionRecord::success(ActionKind::CreateRepo, "o/new"))
                .unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        let records = store.recent_history(10).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].target, "o/new");
    }
}
