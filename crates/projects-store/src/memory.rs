//! In-process key-value backend
//!
//! Mirrors the subset of Redis semantics the store relies on: hashes and
//! sets share one keyspace, empty sets disappear, and removing or deleting
//! something absent is a no-op. Individual operations can be made to fail,
//! which is how partial Create/Delete failures are exercised.

use projects_domain::codec::FieldMap;
use projects_domain::{BackendError, KvBackend};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

/// Backend operation, used to target injected faults
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendOp {
    /// [`KvBackend::hash_get_all`]
    HashGetAll,
    /// [`KvBackend::hash_set_all`]
    HashSetAll,
    /// [`KvBackend::set_add`]
    SetAdd,
    /// [`KvBackend::set_remove`]
    SetRemove,
    /// [`KvBackend::set_members`]
    SetMembers,
    /// [`KvBackend::delete_key`]
    DeleteKey,
    /// [`KvBackend::keys_with_prefix`]
    KeysWithPrefix,
}

#[derive(Debug, Default)]
struct Keyspace {
    hashes: HashMap<String, FieldMap>,
    sets: HashMap<String, BTreeSet<String>>,
}

/// Thread-safe in-memory backend
#[derive(Debug, Default)]
pub struct MemoryBackend {
    keyspace: RwLock<Keyspace>,
    faults: RwLock<HashSet<BackendOp>>,
    writes: AtomicUsize,
}

impl MemoryBackend {
    /// Create an empty backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every future call of `op` fail with a connection error
    pub fn fail_on(&self, op: BackendOp) {
        if let Ok(mut faults) = self.faults.write() {
            faults.insert(op);
        }
    }

    /// Remove all injected faults
    pub fn clear_faults(&self) {
        if let Ok(mut faults) = self.faults.write() {
            faults.clear();
        }
    }

    /// Number of successful mutating calls so far
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Whether any structure exists under `key`
    pub fn contains_key(&self, key: &str) -> bool {
        self.keyspace
            .read()
            .map(|ks| ks.hashes.contains_key(key) || ks.sets.contains_key(key))
            .unwrap_or(false)
    }

    fn check(&self, op: BackendOp) -> Result<(), BackendError> {
        let faults = self.faults.read().map_err(|_| poisoned())?;
        if faults.contains(&op) {
            return Err(BackendError::Connection(format!(
                "injected failure on {:?}",
                op
            )));
        }
        Ok(())
    }

    fn wrote(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

fn poisoned() -> BackendError {
    BackendError::Connection("memory backend lock poisoned".to_string())
}

fn wrong_type(key: &str) -> BackendError {
    BackendError::Protocol(format!(
        "WRONGTYPE Operation against a key holding the wrong kind of value: {}",
        key
    ))
}

impl KvBackend for MemoryBackend {
    fn hash_get_all(&self, key: &str) -> Result<Option<FieldMap>, BackendError> {
        self.check(BackendOp::HashGetAll)?;
        let ks = self.keyspace.read().map_err(|_| poisoned())?;
        if ks.sets.contains_key(key) {
            return Err(wrong_type(key));
        }
        Ok(ks.hashes.get(key).cloned())
    }

    fn hash_set_all(&self, key: &str, fields: &FieldMap) -> Result<(), BackendError> {
        self.check(BackendOp::HashSetAll)?;
        if fields.is_empty() {
            return Err(BackendError::Protocol(
                "wrong number of arguments for 'hset' command".to_string(),
            ));
        }
        let mut ks = self.keyspace.write().map_err(|_| poisoned())?;
        if ks.sets.contains_key(key) {
            return Err(wrong_type(key));
        }
        ks.hashes
            .entry(key.to_string())
            .or_default()
            .extend(fields.iter().map(|(f, v)| (f.clone(), v.clone())));
        self.wrote();
        Ok(())
    }

    fn set_add(&self, set: &str, member: &str) -> Result<(), BackendError> {
        self.check(BackendOp::SetAdd)?;
        let mut ks = self.keyspace.write().map_err(|_| poisoned())?;
        if ks.hashes.contains_key(set) {
            return Err(wrong_type(set));
        }
        ks.sets
            .entry(set.to_string())
            .or_default()
            .insert(member.to_string());
        self.wrote();
        Ok(())
    }

    fn set_remove(&self, set: &str, member: &str) -> Result<(), BackendError> {
        self.check(BackendOp::SetRemove)?;
        let mut ks = self.keyspace.write().map_err(|_| poisoned())?;
        if ks.hashes.contains_key(set) {
            return Err(wrong_type(set));
        }
        if let Some(members) = ks.sets.get_mut(set) {
            members.remove(member);
            if members.is_empty() {
                ks.sets.remove(set);
            }
        }
        self.wrote();
        Ok(())
    }

    fn set_members(&self, set: &str) -> Result<Vec<String>, BackendError> {
        self.check(BackendOp::SetMembers)?;
        let ks = self.keyspace.read().map_err(|_| poisoned())?;
        if ks.hashes.contains_key(set) {
            return Err(wrong_type(set));
        }
        Ok(ks
            .sets
            .get(set)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default())
    }

    fn delete_key(&self, key: &str) -> Result<(), BackendError> {
        self.check(BackendOp::DeleteKey)?;
        let mut ks = self.keyspace.write().map_err(|_| poisoned())?;
        ks.hashes.remove(key);
        ks.sets.remove(key);
        self.wrote();
        Ok(())
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, BackendError> {
        self.check(BackendOp::KeysWithPrefix)?;
        let ks = self.keyspace.read().map_err(|_| poisoned())?;
        let mut keys: Vec<String> = ks
            .hashes
            .keys()
            .chain(ks.sets.keys())
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, &str)]) -> FieldMap {
        pairs
            .iter()
            .map(|(f, v)| (f.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_hash_missing_is_none() {
        let backend = MemoryBackend::new();
        assert_eq!(backend.hash_get_all("project:none").unwrap(), None);
    }

    #[test]
    fn test_hash_set_merges_fields() {
        let backend = MemoryBackend::new();
        backend
            .hash_set_all("h", &fields(&[("a", "1"), ("b", "2")]))
            .unwrap();
        backend.hash_set_all("h", &fields(&[("b", "3")])).unwrap();

        let stored = backend.hash_get_all("h").unwrap().unwrap();
        assert_eq!(stored["a"], "1");
        assert_eq!(stored["b"], "3");
    }

    #[test]
    fn test_empty_hash_write_rejected() {
        let backend = MemoryBackend::new();
        let result = backend.hash_set_all("h", &FieldMap::new());
        assert!(matches!(result, Err(BackendError::Protocol(_))));
        assert!(!backend.contains_key("h"));
    }

    #[test]
    fn test_set_remove_drops_empty_set() {
        let backend = MemoryBackend::new();
        backend.set_add("s", "a").unwrap();
        backend.set_add("s", "a").unwrap();
        assert_eq!(backend.set_members("s").unwrap(), vec!["a"]);

        backend.set_remove("s", "a").unwrap();
        assert!(!backend.contains_key("s"));
        assert!(backend.set_members("s").unwrap().is_empty());
    }

    #[test]
    fn test_removals_of_absent_are_noops() {
        let backend = MemoryBackend::new();
        assert!(backend.set_remove("s", "ghost").is_ok());
        assert!(backend.delete_key("ghost").is_ok());
    }

    #[test]
    fn test_wrong_type() {
        let backend = MemoryBackend::new();
        backend.set_add("s", "a").unwrap();
        assert!(matches!(
            backend.hash_get_all("s"),
            Err(BackendError::Protocol(_))
        ));
    }

    #[test]
    fn test_injected_fault() {
        let backend = MemoryBackend::new();
        backend.fail_on(BackendOp::SetAdd);

        let result = backend.set_add("s", "a");
        assert!(matches!(result, Err(BackendError::Connection(_))));
        assert_eq!(backend.write_count(), 0);

        backend.clear_faults();
        assert!(backend.set_add("s", "a").is_ok());
        assert_eq!(backend.write_count(), 1);
    }

    #[test]
    fn test_keys_with_prefix() {
        let backend = MemoryBackend::new();
        backend.hash_set_all("project:b", &fields(&[("name", "b")])).unwrap();
        backend.hash_set_all("project:a", &fields(&[("name", "a")])).unwrap();
        backend.set_add("projects", "a").unwrap();

        assert_eq!(
            backend.keys_with_prefix("project:").unwrap(),
            vec!["project:a", "project:b"]
        );
    }
}
