use crate::{CoreError, StoredUser, UserId, UserRecord, UserRepository};

/// Result of enumerating the users collection.
///
/// The scan stops at the first read failure. `interrupted` carries that
/// failure so callers can tell a complete listing from a truncated one.
#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub users: Vec<StoredUser>,
    pub interrupted: Option<CoreError>,
}

impl ScanOutcome {
    pub fn is_complete(&self) -> bool {
        self.interrupted.is_none()
    }
}

/// Application service over the users collection.
///
/// Generic over the repository so the HTTP layer can inject the real store
/// client and tests can inject doubles.
pub struct UserService<R: UserRepository> {
    repo: R,
}

impl<R: UserRepository> UserService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Persist a new user; the store assigns the id.
    pub fn add(&self, record: UserRecord) -> Result<StoredUser, CoreError> {
        let id = self.repo.create(record.clone())?;
        Ok(StoredUser { id, record })
    }

    /// Fetch a user by id.
    pub fn get(&self, id: &UserId) -> Result<UserRecord, CoreError> {
        match self.repo.get(id)? {
            Some(record) => Ok(record),
            None => Err(CoreError::NotFound),
        }
    }

    /// Read the whole collection, stopping at the first failed read.
    pub fn list(&self) -> ScanOutcome {
        let mut outcome = ScanOutcome::default();
        for item in self.repo.scan() {
            match item {
                Ok(user) => outcome.users.push(user),
                Err(e) => {
                    outcome.interrupted = Some(e);
                    break;
                }
            }
        }
        outcome
    }
}
