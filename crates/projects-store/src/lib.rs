//! Projects Storage Layer
//!
//! Implements project persistence on top of a [`KvBackend`].
//!
//! # Architecture
//!
//! Two structures describe the registry:
//!
//! - one hash per project at `project:<lowercase name>` holding the codec's
//!   field map
//! - the `projects` set (the index) naming every project
//!
//! Create and Delete touch both with two independent writes. Nothing wraps
//! them in a transaction, so a failure between the writes leaves the index
//! and the hashes out of step. [`ProjectStore::audit`] detects that drift and
//! [`ProjectStore::reconcile`] repairs it.
//!
//! # Examples
//!
//! ```
//! use projects_domain::Project;
//! use projects_store::{MemoryBackend, ProjectStore};
//!
//! let store = ProjectStore::new(MemoryBackend::new());
//! store.create(&Project::new("cifar", "resnet50", "/data/cifar", "http://x/cifar")).unwrap();
//!
//! let project = store.read("CIFAR").unwrap().unwrap();
//! assert_eq!(project.model, "resnet50");
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod memory;
pub mod redis_backend;

pub use error::{CrudError, ErrorClass, ErrorKind, Operation};
pub use memory::{BackendOp, MemoryBackend};
pub use redis_backend::{RedisBackend, RedisOptions};

use projects_domain::codec::{
    self, derive_key, from_field_map, index_member, to_field_map, FIELD_NAME, INDEX_SET,
    KEY_PREFIX,
};
use projects_domain::{KvBackend, Project};
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// Drift between the index set and the per-project hashes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexAudit {
    /// Index members with no hash behind them
    pub dangling: Vec<String>,
    /// Index members derived from hashes that are missing from the index
    pub orphaned: Vec<String>,
}

impl IndexAudit {
    /// True when index and hashes agree
    pub fn is_consistent(&self) -> bool {
        self.dangling.is_empty() && self.orphaned.is_empty()
    }
}

/// Project CRUD over a key-value backend
///
/// Stateless apart from the backend handle; share it behind an `Arc`.
pub struct ProjectStore<B> {
    backend: B,
}

impl<B: KvBackend> ProjectStore<B> {
    /// Create a store over `backend`
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// The underlying backend
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Every project named in the index
    ///
    /// One index read, then one hash read per member. A member whose hash is
    /// missing or partial still yields a project, with empty fields.
    pub fn list(&self) -> Result<Vec<Project>, CrudError> {
        let members = self
            .backend
            .set_members(INDEX_SET)
            .map_err(|e| CrudError::backend(e, Operation::List, INDEX_SET))?;

        let mut projects = Vec::with_capacity(members.len());
        for member in members {
            let key = derive_key(&member);
            let fields = self
                .backend
                .hash_get_all(&key)
                .map_err(|e| CrudError::backend(e, Operation::List, key.as_str()))?;

            let project = match fields {
                Some(fields) => {
                    let mut project = from_field_map(&fields);
                    if project.name.is_empty() {
                        project.name = member;
                    }
                    project
                }
                None => {
                    debug!("Index member `{}` has no hash at {}", member, key);
                    Project {
                        name: member,
                        ..Project::default()
                    }
                }
            };
            projects.push(project);
        }

        Ok(projects)
    }

    /// Read one project by name (case-insensitive)
    ///
    /// - no structure under the key: `Err` of kind [`ErrorKind::NotFound`]
    /// - a hash without a `name` field: `Ok(None)`
    pub fn read(&self, name: &str) -> Result<Option<Project>, CrudError> {
        let key = derive_key(name);
        let fields = self
            .backend
            .hash_get_all(&key)
            .map_err(|e| CrudError::backend(e, Operation::Read, key.as_str()))?
            .ok_or_else(|| CrudError::not_found(name, &key))?;

        if fields.get(FIELD_NAME).map_or(true, |n| n.is_empty()) {
            debug!("Hash {} exists without a name field", key);
            return Ok(None);
        }

        Ok(Some(from_field_map(&fields)))
    }

    /// Create (or silently overwrite) a project
    ///
    /// Writes the hash, then adds the index member. If the second write
    /// fails the hash stays behind without an index entry.
    pub fn create(&self, project: &Project) -> Result<(), CrudError> {
        if project.name.is_empty() {
            return Err(CrudError::validation(
                Operation::Create,
                "Project name must not be empty",
            ));
        }

        let key = project.key();
        self.backend
            .hash_set_all(&key, &to_field_map(project))
            .map_err(|e| CrudError::backend(e, Operation::Create, key.as_str()))?;

        let member = index_member(&project.name);
        self.backend.set_add(INDEX_SET, &member).map_err(|e| {
            warn!("Hash {} written but index entry `{}` was not added", key, member);
            CrudError::backend(e, Operation::Create, INDEX_SET)
        })?;

        debug!("Created project {}", key);
        Ok(())
    }

    /// Overwrite the fields of the project selected by `name`
    ///
    /// The body's own `name` is replaced by `name`. The index is not touched
    /// and prior existence is not checked, so updating an unknown name leaves
    /// a hash that is missing from the index.
    pub fn update(&self, name: &str, project: &Project) -> Result<(), CrudError> {
        let mut project = project.clone();
        project.name = name.to_string();

        let key = project.key();
        self.backend
            .hash_set_all(&key, &to_field_map(&project))
            .map_err(|e| CrudError::backend(e, Operation::Update, key.as_str()))?;

        debug!("Updated project {}", key);
        Ok(())
    }

    /// Remove a project from the index and delete its hash
    ///
    /// Both steps run even if the first fails; the first error is returned.
    pub fn delete(&self, name: &str) -> Result<(), CrudError> {
        let member = index_member(name);
        let key = derive_key(name);

        let unindexed = self
            .backend
            .set_remove(INDEX_SET, &member)
            .map_err(|e| CrudError::backend(e, Operation::Delete, INDEX_SET));
        let deleted = self
            .backend
            .delete_key(&key)
            .map_err(|e| CrudError::backend(e, Operation::Delete, key.as_str()));

        match (&unindexed, &deleted) {
            (Err(_), Err(second)) => {
                debug!("Delete of `{}` also failed on the hash: {}", name, second);
            }
            (Err(_), Ok(())) | (Ok(()), Err(_)) => {
                warn!("Partial delete of `{}`: index and hash now disagree", name);
            }
            (Ok(()), Ok(())) => {}
        }

        unindexed.and(deleted)
    }

    /// Compare the index with the hashes present in the backend
    pub fn audit(&self) -> Result<IndexAudit, CrudError> {
        let indexed: BTreeSet<String> = self
            .backend
            .set_members(INDEX_SET)
            .map_err(|e| CrudError::backend(e, Operation::Audit, INDEX_SET))?
            .into_iter()
            .collect();

        let stored: BTreeSet<String> = self
            .backend
            .keys_with_prefix(KEY_PREFIX)
            .map_err(|e| CrudError::backend(e, Operation::Audit, KEY_PREFIX))?
            .iter()
            .filter_map(|key| codec::member_from_key(key))
            .map(str::to_string)
            .collect();

        Ok(IndexAudit {
            dangling: indexed.difference(&stored).cloned().collect(),
            orphaned: stored.difference(&indexed).cloned().collect(),
        })
    }

    /// Bring the index back in line with the hashes
    ///
    /// Dangling members are removed and orphaned hashes are indexed. Each
    /// member is checked against its hash again right before the index
    /// write and skipped if a concurrent Create or Delete already settled
    /// it. Returns the drift that was repaired.
    ///
    /// A writer landing between that check and the index write can still
    /// be undone; the next pass sees the result as fresh drift.
    pub fn reconcile(&self) -> Result<IndexAudit, CrudError> {
        let audit = self.audit()?;
        let mut repaired = IndexAudit::default();

        for member in audit.dangling {
            if self.hash_exists(&member)? {
                debug!("Index member `{}` gained a hash since the audit", member);
                continue;
            }
            self.backend
                .set_remove(INDEX_SET, &member)
                .map_err(|e| CrudError::backend(e, Operation::Reconcile, INDEX_SET))?;
            repaired.dangling.push(member);
        }
        for member in audit.orphaned {
            if !self.hash_exists(&member)? {
                debug!("Hash for `{}` disappeared since the audit", member);
                continue;
            }
            self.backend
                .set_add(INDEX_SET, &member)
                .map_err(|e| CrudError::backend(e, Operation::Reconcile, INDEX_SET))?;
            repaired.orphaned.push(member);
        }

        if !repaired.is_consistent() {
            warn!(
                "Reconciled index: {} dangling removed, {} orphaned indexed",
                repaired.dangling.len(),
                repaired.orphaned.len()
            );
        }

        Ok(repaired)
    }

    fn hash_exists(&self, member: &str) -> Result<bool, CrudError> {
        let key = derive_key(member);
        self.backend
            .hash_get_all(&key)
            .map(|fields| fields.is_some())
            .map_err(|e| CrudError::backend(e, Operation::Reconcile, key.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use projects_domain::FieldMap;

    fn store() -> ProjectStore<MemoryBackend> {
        ProjectStore::new(MemoryBackend::new())
    }

    #[test]
    fn test_create_writes_hash_and_index() {
        let store = store();
        store
            .create(&Project::new("Cifar", "resnet50", "/data", "http://x"))
            .unwrap();

        let backend = store.backend();
        assert!(backend.contains_key("project:cifar"));
        assert_eq!(backend.set_members(INDEX_SET).unwrap(), vec!["cifar"]);
    }

    #[test]
    fn test_read_empty_name_hash_is_none() {
        let store = store();
        let mut fields = FieldMap::new();
        fields.insert("model".to_string(), "bert".to_string());
        store.backend().hash_set_all("project:ghost", &fields).unwrap();

        assert_eq!(store.read("ghost").unwrap(), None);
    }

    #[test]
    fn test_list_keeps_stored_name_case() {
        let store = store();
        store.create(&Project::new("MNIST", "", "", "")).unwrap();

        let projects = store.list().unwrap();
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].name, "MNIST");
    }

    #[test]
    fn test_list_falls_back_to_member_name() {
        let store = store();
        let mut fields = FieldMap::new();
        fields.insert("url".to_string(), "http://half".to_string());
        store.backend().hash_set_all("project:half", &fields).unwrap();
        store.backend().set_add(INDEX_SET, "half").unwrap();

        let projects = store.list().unwrap();
        assert_eq!(projects[0].name, "half");
        assert_eq!(projects[0].url, "http://half");
        assert_eq!(projects[0].model, "");
    }

    #[test]
    fn test_update_uses_path_name() {
        let store = store();
        store.create(&Project::new("a", "v1", "", "")).unwrap();

        store.update("a", &Project::new("b", "v2", "", "")).unwrap();

        let project = store.read("a").unwrap().unwrap();
        assert_eq!(project.name, "a");
        assert_eq!(project.model, "v2");
        assert!(matches!(
            store.read("b").map_err(|e| e.kind()),
            Err(ErrorKind::NotFound)
        ));
    }

    #[test]
    fn test_audit_clean_store() {
        let store = store();
        store.create(&Project::new("a", "", "", "")).unwrap();
        store.create(&Project::new("b", "", "", "")).unwrap();

        assert!(store.audit().unwrap().is_consistent());
    }
}
