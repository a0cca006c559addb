//! sqlite-adapter — SQLite implementation of the UserRepository port for local/dev.
//!
//! Purpose
//! - Provide a lightweight, file-based repository to run the API locally
//!   without cloud credentials.
//! - Implements the `UserRepository` trait from the `domain` crate.
//! - Mints document ids like the hosted store does: a persistent counter fed
//!   through `Base62IdGenerator`.
//!
//! Notes
//! - Uses `rusqlite` with the `bundled` feature for portability.
//! - Stores timestamps as seconds since UNIX_EPOCH (u64); scans return rows in
//!   insertion order.

use std::path::Path;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use domain::ids::Base62IdGenerator;
use domain::{CoreError, IdGenerator, StoredUser, UserId, UserRecord, UserRepository, UserScan};
use rusqlite::{params, Connection, OptionalExtension};

/// SQLite-backed repository for local development.
pub struct SqliteRepo {
    conn: Mutex<Connection>,
    ids: Base62IdGenerator,
}

impl SqliteRepo {
    /// Open (or create) a SQLite database at the given path and ensure schema.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, CoreError> {
        let conn = Connection::open(path).map_err(map_sqerr)?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            ids: Base62IdGenerator::new(20),
        })
    }

    /// Construct from env var `DB_PATH` (defaults to `./data/users.db`).
    pub fn from_env() -> Result<Self, CoreError> {
        let path = std::env::var("DB_PATH").unwrap_or_else(|_| "./data/users.db".to_string());
        Self::open_creating_dirs(path)
    }

    /// Like `new`, but first creates the parent directory of `path`.
    pub fn open_creating_dirs<P: AsRef<Path>>(path: P) -> Result<Self, CoreError> {
        let path = path.as_ref();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|e| {
                CoreError::Repository(format!(
                    "sqlite error: cannot create directory {}: {e}",
                    dir.display()
                ))
            })?;
        }
        Self::new(path)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, CoreError> {
        self.conn
            .lock()
            .map_err(|_| CoreError::Repository("mutex poisoned".into()))
    }

    fn read_all(&self) -> Result<Vec<StoredUser>, CoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT id, name, email FROM users ORDER BY seq ASC")
            .map_err(map_sqerr)?;
        let mut rows = stmt.query([]).map_err(map_sqerr)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(map_sqerr)? {
            out.push(row_to_user(row)?);
        }
        Ok(out)
    }
}

fn init_schema(conn: &Connection) -> Result<(), CoreError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            email TEXT NOT NULL,
            created_at INTEGER NOT NULL
        );
        CREATE TABLE IF NOT EXISTS counters (
            name TEXT PRIMARY KEY,
            value INTEGER NOT NULL
        );
        "#,
    )
    .map_err(map_sqerr)
}

fn map_sqerr<E: std::fmt::Display>(e: E) -> CoreError {
    CoreError::Repository(format!("sqlite error: {e}"))
}

fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

fn row_to_user(row: &rusqlite::Row) -> Result<StoredUser, CoreError> {
    let id: String = row.get(0).map_err(map_sqerr)?;
    let name: String = row.get(1).map_err(map_sqerr)?;
    let email: String = row.get(2).map_err(map_sqerr)?;
    let id = UserId::new(id).map_err(|e| CoreError::Repository(format!("bad id in db: {e}")))?;
    Ok(StoredUser {
        id,
        record: UserRecord { name, email },
    })
}

impl UserRepository for SqliteRepo {
    fn create(&self, record: UserRecord) -> Result<UserId, CoreError> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction().map_err(map_sqerr)?;
        // Ensure counter row exists
        tx.execute(
            "INSERT OR IGNORE INTO counters(name, value) VALUES('users', 0)",
            [],
        )
        .map_err(map_sqerr)?;
        tx.execute(
            "UPDATE counters SET value = value + 1 WHERE name = 'users'",
            [],
        )
        .map_err(map_sqerr)?;
        let seq: i64 = tx
            .query_row("SELECT value FROM counters WHERE name = 'users'", [], |row| {
                row.get(0)
            })
            .map_err(map_sqerr)?;
        let id = self.ids.next_id(seq as u64);
        tx.execute(
            "INSERT INTO users(id, name, email, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![id.as_str(), record.name, record.email, now_secs()],
        )
        .map_err(map_sqerr)?;
        tx.commit().map_err(map_sqerr)?;
        Ok(id)
    }

    fn get(&self, id: &UserId) -> Result<Option<UserRecord>, CoreError> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT name, email FROM users WHERE id = ?1",
            params![id.as_str()],
            |row| {
                Ok(UserRecord {
                    name: row.get(0)?,
                    email: row.get(1)?,
                })
            },
        )
        .optional()
        .map_err(map_sqerr)
    }

    fn scan(&self) -> UserScan<'_> {
        // Rows are read eagerly so the connection lock is released before iteration
        match self.read_all() {
            Ok(users) => Box::new(users.into_iter().map(Ok)),
            Err(e) => Box::new(std::iter::once(Err(e))),
        }
    }
}
