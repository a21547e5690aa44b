//! StateStore: redb-backed object persistence for grouplcm.
//!
//! Provides get/create/put/delete/list over `Resource` envelopes. All values
//! are JSON-serialized into redb's `&[u8]` value columns. The store supports
//! both on-disk and in-memory backends (the latter for testing).

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable, WriteTransaction};
use tokio::sync::broadcast;
use tracing::debug;

use grouplcm_core::{ObjectKey, Resource};

use crate::client::ResourceStore;
use crate::error::{StateError, StateResult};
use crate::events::{EventKind, ResourceEvent};
use crate::tables::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Buffered change events per subscriber before it starts lagging.
const EVENT_CAPACITY: usize = 1024;

/// Thread-safe object store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
    events: broadcast::Sender<ResourceEvent>,
}

impl StateStore {
    /// Open (or create) a persistent object store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self::from_db(db)?;
        debug!(?path, "object store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory object store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self::from_db(db)?;
        debug!("in-memory object store opened");
        Ok(store)
    }

    fn from_db(db: Database) -> StateResult<Self> {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let store = Self {
            db: Arc::new(db),
            events,
        };
        store.ensure_tables()?;
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(OBJECTS).map_err(map_err!(Table))?;
        txn.open_table(COUNTERS).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Subscribe to change events for every subsequent write.
    pub fn subscribe(&self) -> broadcast::Receiver<ResourceEvent> {
        self.events.subscribe()
    }

    // ── Reads ──────────────────────────────────────────────────────

    /// Get an object by key.
    pub fn get(&self, key: &ObjectKey) -> StateResult<Option<Resource>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(OBJECTS).map_err(map_err!(Table))?;
        match table.get(key.table_key().as_str()).map_err(map_err!(Read))? {
            Some(guard) => Ok(Some(decode(guard.value())?)),
            None => Ok(None),
        }
    }

    /// List objects, optionally restricted to a kind and/or namespace.
    /// Results are ordered by `{kind}/{namespace}/{name}`.
    pub fn list(&self, kind: Option<&str>, namespace: Option<&str>) -> StateResult<Vec<Resource>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(OBJECTS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (key, value) = entry.map_err(map_err!(Read))?;
            let Some(object_key) = ObjectKey::from_table_key(key.value()) else {
                continue;
            };
            if kind.is_some_and(|k| k != object_key.kind) {
                continue;
            }
            if namespace.is_some_and(|ns| ns != object_key.namespace) {
                continue;
            }
            results.push(decode(value.value())?);
        }
        Ok(results)
    }

    /// List every object carrying an owner reference to `uid`.
    pub fn owned_by(&self, uid: &str) -> StateResult<Vec<Resource>> {
        Ok(self
            .list(None, None)?
            .into_iter()
            .filter(|obj| obj.metadata.owner_references.iter().any(|o| o.uid == uid))
            .collect())
    }

    // ── Writes ─────────────────────────────────────────────────────

    /// Create an object. Fails with `AlreadyExists` if the key is taken.
    ///
    /// The existence check and the insert share one write transaction, so at
    /// most one of several racing creators succeeds.
    pub fn create(&self, obj: &Resource) -> StateResult<Resource> {
        let key = obj.key().table_key();
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let exists = {
            let table = txn.open_table(OBJECTS).map_err(map_err!(Table))?;
            let found = table.get(key.as_str()).map_err(map_err!(Read))?.is_some();
            found
        };
        if exists {
            txn.abort().map_err(map_err!(Transaction))?;
            return Err(StateError::AlreadyExists(key));
        }

        let mut stored = obj.clone();
        stored.metadata.uid = Some(allocate_uid(&txn)?);
        write_object(&txn, &key, &stored)?;
        txn.commit().map_err(map_err!(Transaction))?;

        debug!(%key, "object created");
        self.publish(EventKind::Created, &stored);
        Ok(stored)
    }

    /// Insert or replace an object. An existing uid is preserved.
    pub fn put(&self, obj: &Resource) -> StateResult<Resource> {
        let key = obj.key().table_key();
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existing_uid = {
            let table = txn.open_table(OBJECTS).map_err(map_err!(Table))?;
            let existing = match table.get(key.as_str()).map_err(map_err!(Read))? {
                Some(guard) => Some(decode(guard.value())?),
                None => None,
            };
            existing.map(|e| e.metadata.uid)
        };

        let mut stored = obj.clone();
        let event = match existing_uid {
            Some(uid) => {
                stored.metadata.uid = uid;
                EventKind::Updated
            }
            None => {
                stored.metadata.uid = Some(allocate_uid(&txn)?);
                EventKind::Created
            }
        };
        if stored.metadata.uid.is_none() {
            stored.metadata.uid = Some(allocate_uid(&txn)?);
        }
        write_object(&txn, &key, &stored)?;
        txn.commit().map_err(map_err!(Transaction))?;

        debug!(%key, ?event, "object stored");
        self.publish(event, &stored);
        Ok(stored)
    }

    /// Delete an object and garbage-collect its dependents.
    ///
    /// Returns the keys of every removed object, the requested one first.
    /// Deleting a missing key removes nothing and returns an empty list.
    pub fn delete(&self, key: &ObjectKey) -> StateResult<Vec<ObjectKey>> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let removed = {
            let mut table = txn.open_table(OBJECTS).map_err(map_err!(Table))?;
            let mut all = Vec::new();
            for entry in table.iter().map_err(map_err!(Read))? {
                let (_, value) = entry.map_err(map_err!(Read))?;
                all.push(decode(value.value())?);
            }
            let removed = cascade(key, &all);
            for obj in &removed {
                table
                    .remove(obj.key().table_key().as_str())
                    .map_err(map_err!(Write))?;
            }
            removed
        };

        if removed.is_empty() {
            txn.abort().map_err(map_err!(Transaction))?;
            debug!(%key, "delete of missing object");
            return Ok(Vec::new());
        }
        txn.commit().map_err(map_err!(Transaction))?;

        debug!(%key, removed = removed.len(), "object deleted");
        for obj in &removed {
            self.publish(EventKind::Deleted, obj);
        }
        Ok(removed.iter().map(Resource::key).collect())
    }

    fn publish(&self, kind: EventKind, obj: &Resource) {
        // No subscribers is not an error.
        let _ = self.events.send(ResourceEvent {
            kind,
            object: obj.clone(),
        });
    }
}

impl ResourceStore for StateStore {
    fn get(&self, key: &ObjectKey) -> StateResult<Option<Resource>> {
        StateStore::get(self, key)
    }

    fn create(&self, obj: &Resource) -> StateResult<Resource> {
        StateStore::create(self, obj)
    }
}

fn decode(bytes: &[u8]) -> StateResult<Resource> {
    serde_json::from_slice(bytes).map_err(map_err!(Deserialize))
}

fn write_object(txn: &WriteTransaction, key: &str, obj: &Resource) -> StateResult<()> {
    let value = serde_json::to_vec(obj).map_err(map_err!(Serialize))?;
    let mut table = txn.open_table(OBJECTS).map_err(map_err!(Table))?;
    table
        .insert(key, value.as_slice())
        .map_err(map_err!(Write))?;
    Ok(())
}

/// Allocate the next uid from the persisted counter.
fn allocate_uid(txn: &WriteTransaction) -> StateResult<String> {
    let mut counters = txn.open_table(COUNTERS).map_err(map_err!(Table))?;
    let current = counters
        .get(UID_COUNTER)
        .map_err(map_err!(Read))?
        .map(|guard| guard.value())
        .unwrap_or(0);
    let next = current + 1;
    counters.insert(UID_COUNTER, next).map_err(map_err!(Write))?;
    Ok(format!("{next:016x}"))
}

/// Objects removed when `root` is deleted: the root itself, then every
/// dependent whose owners are all gone, to a fixed point.
fn cascade(root: &ObjectKey, all: &[Resource]) -> Vec<Resource> {
    let Some(root_obj) = all.iter().find(|obj| &obj.key() == root) else {
        return Vec::new();
    };

    let mut removed = vec![root_obj.clone()];
    let mut removed_keys: HashSet<ObjectKey> = HashSet::from([root.clone()]);
    let mut removed_uids: HashSet<String> = root_obj.metadata.uid.iter().cloned().collect();

    loop {
        let live_uids: HashSet<&str> = all
            .iter()
            .filter(|obj| !removed_keys.contains(&obj.key()))
            .filter_map(|obj| obj.metadata.uid.as_deref())
            .collect();

        let mut changed = false;
        for obj in all {
            let key = obj.key();
            if removed_keys.contains(&key) {
                continue;
            }
            let refs = &obj.metadata.owner_references;
            let orphaned = refs.iter().any(|o| removed_uids.contains(&o.uid))
                && refs.iter().all(|o| !live_uids.contains(o.uid.as_str()));
            if orphaned {
                if let Some(uid) = &obj.metadata.uid {
                    removed_uids.insert(uid.clone());
                }
                removed_keys.insert(key);
                removed.push(obj.clone());
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    removed
}
