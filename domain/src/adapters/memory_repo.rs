use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::ids::Base62IdGenerator;
use crate::{CoreError, IdGenerator, StoredUser, UserId, UserRecord, UserRepository, UserScan};

/// Simple in-memory repository for tests. Not thread-safe for high concurrency
/// beyond the internal mutex guarding the map.
pub struct InMemoryRepo<G: IdGenerator = Base62IdGenerator> {
    inner: Mutex<BTreeMap<String, UserRecord>>,
    ids: G,
    next_seq: AtomicU64,
}

impl InMemoryRepo {
    pub fn new() -> Self {
        Self::with_ids(Base62IdGenerator::default())
    }
}

impl<G: IdGenerator> InMemoryRepo<G> {
    pub fn with_ids(ids: G) -> Self {
        Self {
            inner: Mutex::new(BTreeMap::new()),
            ids,
            next_seq: AtomicU64::new(0),
        }
    }
}

impl Default for InMemoryRepo {
    fn default() -> Self {
        Self::new()
    }
}

impl<G: IdGenerator> UserRepository for InMemoryRepo<G> {
    fn create(&self, record: UserRecord) -> Result<UserId, CoreError> {
        let mut map = self
            .inner
            .lock()
            .map_err(|_| CoreError::Repository("mutex poisoned".into()))?;
        // Generated ids are unique per generator, but a custom generator could repeat
        for _ in 0..100 {
            let id = self.ids.next_id(self.next_seq.fetch_add(1, Ordering::Relaxed));
            if !map.contains_key(id.as_str()) {
                map.insert(id.as_str().to_string(), record);
                return Ok(id);
            }
        }
        Err(CoreError::Repository("failed to generate unique id".into()))
    }

    fn get(&self, id: &UserId) -> Result<Option<UserRecord>, CoreError> {
        let map = self
            .inner
            .lock()
            .map_err(|_| CoreError::Repository("mutex poisoned".into()))?;
        Ok(map.get(id.as_str()).cloned())
    }

    fn scan(&self) -> UserScan<'_> {
        // Snapshot under the lock so the iterator never holds it
        let snapshot: Result<Vec<_>, CoreError> = self
            .inner
            .lock()
            .map_err(|_| CoreError::Repository("mutex poisoned".into()))
            .and_then(|map| {
                map.iter()
                    .map(|(k, v)| -> Result<StoredUser, CoreError> {
                        Ok(StoredUser {
                            id: UserId::new(k.clone())?,
                            record: v.clone(),
                        })
                    })
                    .collect()
            });
        match snapshot {
            Ok(users) => Box::new(users.into_iter().map(Ok)),
            Err(e) => Box::new(std::iter::once(Err(e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ConstantIds;
    impl IdGenerator for ConstantIds {
        fn next_id(&self, _seq: u64) -> UserId {
            UserId::new("same").unwrap()
        }
    }

    #[test]
    fn create_then_get() {
        let repo = InMemoryRepo::new();
        let id = repo
            .create(UserRecord::new("Grace", "grace@example.com"))
            .unwrap();
        let got = repo.get(&id).unwrap().unwrap();
        assert_eq!(got, UserRecord::new("Grace", "grace@example.com"));
    }

    #[test]
    fn get_missing_is_none() {
        let repo = InMemoryRepo::new();
        let missing = UserId::new("doesNotExist").unwrap();
        assert!(repo.get(&missing).unwrap().is_none());
    }

    #[test]
    fn duplicate_records_get_distinct_ids() {
        let repo = InMemoryRepo::new();
        let a = repo.create(UserRecord::new("x", "x@e.com")).unwrap();
        let b = repo.create(UserRecord::new("x", "x@e.com")).unwrap();
        assert_ne!(a, b);
        assert_eq!(repo.scan().count(), 2);
    }

    #[test]
    fn scan_yields_every_record() {
        let repo = InMemoryRepo::new();
        assert_eq!(repo.scan().count(), 0);
        for i in 0..3 {
            repo.create(UserRecord::new(format!("u{i}"), format!("u{i}@e.com")))
                .unwrap();
        }
        let users: Vec<_> = repo.scan().collect::<Result<_, _>>().unwrap();
        assert_eq!(users.len(), 3);
        for u in users {
            assert_eq!(repo.get(&u.id).unwrap(), Some(u.record));
        }
    }

    #[test]
    fn exhausted_generator_reports_error() {
        let repo = InMemoryRepo::with_ids(ConstantIds);
        repo.create(UserRecord::default()).unwrap();
        let err = repo.create(UserRecord::default()).unwrap_err();
        assert!(matches!(err, CoreError::Repository(_)));
    }
}
