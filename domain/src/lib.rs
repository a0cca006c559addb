//! Domain library for the Users API.
//!
//! This crate is dependency-free (inherits workspace metadata only) and holds
//! the domain types, ports (traits), and error definitions. Keep adapters and
//! IO concerns out of this crate.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Opaque document identifier assigned by the store when a record is created.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UserId(String);

impl UserId {
    /// Accept an identifier only if the document store could have issued it.
    pub fn new<S: Into<String>>(s: S) -> Result<Self, CoreError> {
        let val = s.into();
        validate::validate_document_id(&val)?;
        Ok(Self(val))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for UserId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The persisted user fields. No field is required; absent values are empty.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UserRecord {
    pub name: String,
    pub email: String,
}

impl UserRecord {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }
}

/// A record together with the id the store assigned to it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredUser {
    pub id: UserId,
    pub record: UserRecord,
}

/// Lazy enumeration of a collection. Each item is one document read; an `Err`
/// item ends the useful part of the sequence.
pub type UserScan<'a> = Box<dyn Iterator<Item = Result<StoredUser, CoreError>> + 'a>;

/// Identifier generator for stores that do not mint ids themselves.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self, seq: u64) -> UserId;
}

/// Repository port for the users collection.
pub trait UserRepository: Send + Sync {
    /// Persist a new record under a freshly generated id and return that id.
    fn create(&self, record: UserRecord) -> Result<UserId, CoreError>;
    /// Fetch a record by id. `Ok(None)` when no such document exists.
    fn get(&self, id: &UserId) -> Result<Option<UserRecord>, CoreError>;
    /// Enumerate every document in the collection.
    fn scan(&self) -> UserScan<'_>;
}

impl<R: UserRepository + ?Sized> UserRepository for Arc<R> {
    fn create(&self, record: UserRecord) -> Result<UserId, CoreError> {
        (**self).create(record)
    }

    fn get(&self, id: &UserId) -> Result<Option<UserRecord>, CoreError> {
        (**self).get(id)
    }

    fn scan(&self) -> UserScan<'_> {
        (**self).scan()
    }
}

/// Core domain errors (no external error crates to keep deps at zero).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    InvalidId(String),
    NotFound,
    Repository(String),
}

impl Display for CoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CoreError::InvalidId(msg) => write!(f, "invalid id: {}", msg),
            CoreError::NotFound => write!(f, "not found"),
            CoreError::Repository(msg) => write!(f, "repository error: {}", msg),
        }
    }
}

impl Error for CoreError {}

/// Return a short about/version line for the binary to print.
pub fn about() -> String {
    let pkg = env!("CARGO_PKG_NAME");
    let ver = env!("CARGO_PKG_VERSION");
    format!("{} v{} - users domain library", pkg, ver)
}

pub mod adapters;
pub mod base62;
pub mod ids;
pub mod service;
pub mod validate;
