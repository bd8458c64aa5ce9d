use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use chrono::{DateTime, Utc};

use crate::StoreError;
use crate::data_model::{
    CollectionPath, DirtyTracker, Document, DocumentId, DocumentPath, ListenerKey, ServerTimestamp,
    Snapshot,
};

type Documents<F> = BTreeMap<DocumentId, Document<F>>;

struct Listener<F> {
    collection: CollectionPath,
    on_snapshot: Rc<dyn Fn(Snapshot<F>)>,
    on_error: Rc<dyn Fn(StoreError)>,
    /// Whether the listener received its first snapshot yet
    primed: bool,
}

/// Collections keyed by path, plus the listeners watching them.
///
/// Mutations only mark collections dirty. Callers collect the owed deliveries with
/// [`CollectionStore::drain_due_notifications`] and run them once they no longer hold a borrow of the
/// store, since listeners are free to call back into it.
pub struct CollectionStore<F> {
    collections: HashMap<CollectionPath, DirtyTracker<Documents<F>>>,
    listeners: slotmap::SlotMap<slotmap::DefaultKey, Listener<F>>,
}

impl<F> Default for CollectionStore<F> {
    fn default() -> Self {
        Self {
            collections: HashMap::new(),
            listeners: Default::default(),
        }
    }
}

impl<F: Clone + 'static> CollectionStore<F> {
    pub fn register_listener(
        &mut self,
        collection: CollectionPath,
        on_snapshot: impl Fn(Snapshot<F>) + 'static,
        on_error: impl Fn(StoreError) + 'static,
    ) -> ListenerKey {
        let key = self.listeners.insert(Listener {
            collection,
            on_snapshot: Rc::new(on_snapshot),
            on_error: Rc::new(on_error),
            primed: false,
        });
        ListenerKey(key)
    }

    /// Returns false if the listener was already gone.
    pub fn unregister_listener(&mut self, key: ListenerKey) -> bool {
        self.listeners.remove(key.0).is_some()
    }

    pub fn listener_count(&self, collection: &CollectionPath) -> usize {
        self.listeners
            .values()
            .filter(|listener| &listener.collection == collection)
            .count()
    }

    pub fn snapshot(&self, collection: &CollectionPath) -> Snapshot<F> {
        let documents = self
            .collections
            .get(collection)
            .map(|documents| documents.store().values().cloned().collect())
            .unwrap_or_default();
        Snapshot {
            collection: collection.clone(),
            documents,
        }
    }

    pub fn get(&self, document: &DocumentPath) -> Option<&Document<F>> {
        self.collections
            .get(document.collection())
            .and_then(|documents| documents.store().get(document.id()))
    }

    pub fn insert(
        &mut self,
        collection: &CollectionPath,
        id: DocumentId,
        fields: F,
        created_at: ServerTimestamp,
    ) {
        let mut documents = self
            .collections
            .entry(collection.clone())
            .or_default()
            .store_mut();
        documents.insert(
            id.clone(),
            Document {
                id,
                fields,
                created_at,
            },
        );
    }

    /// Replaces the fields of an existing document. Id and creation time stay as they are.
    pub fn update(&mut self, document: &DocumentPath, fields: F) -> Result<(), StoreError> {
        let Some(tracker) = self.collections.get_mut(document.collection()) else {
            return Err(StoreError::NotFound(document.to_string()));
        };
        if !tracker.store().contains_key(document.id()) {
            return Err(StoreError::NotFound(document.to_string()));
        }
        if let Some(existing) = tracker.store_mut().get_mut(document.id()) {
            existing.fields = fields;
        }
        Ok(())
    }

    /// Returns whether the document existed.
    pub fn remove(&mut self, document: &DocumentPath) -> bool {
        let Some(tracker) = self.collections.get_mut(document.collection()) else {
            return false;
        };
        if !tracker.store().contains_key(document.id()) {
            return false;
        }
        tracker.store_mut().remove(document.id()).is_some()
    }

    /// Stamps every pending document with `at`. Returns how many were pending.
    pub fn resolve_pending(&mut self, at: DateTime<Utc>) -> usize {
        let mut resolved = 0;
        for tracker in self.collections.values_mut() {
            let has_pending = tracker
                .store()
                .values()
                .any(|document| document.created_at.is_pending());
            if !has_pending {
                continue;
            }
            for document in tracker.store_mut().values_mut() {
                if document.created_at.is_pending() {
                    document.created_at = ServerTimestamp::Resolved(at);
                    resolved += 1;
                }
            }
        }
        resolved
    }

    pub fn drain_due_notifications(&mut self) -> Vec<Box<dyn FnOnce()>> {
        let mut dirty_collections = Vec::new();
        for (path, tracker) in self.collections.iter_mut() {
            if tracker.take_dirty() {
                dirty_collections.push(path.clone());
            }
        }

        let mut notifications: Vec<Box<dyn FnOnce()>> = Vec::new();
        let mut snapshots: HashMap<CollectionPath, Snapshot<F>> = HashMap::new();
        for listener in self.listeners.values_mut() {
            if listener.primed && !dirty_collections.contains(&listener.collection) {
                continue;
            }
            listener.primed = true;

            let snapshot = snapshots
                .entry(listener.collection.clone())
                .or_insert_with(|| {
                    let documents = self
                        .collections
                        .get(&listener.collection)
                        .map(|documents| documents.store().values().cloned().collect())
                        .unwrap_or_default();
                    Snapshot {
                        collection: listener.collection.clone(),
                        documents,
                    }
                })
                .clone();
            let on_snapshot = listener.on_snapshot.clone();
            notifications.push(Box::new(move || on_snapshot(snapshot)));
        }
        notifications
    }

    /// Terminates every listener of `collection` with `error`.
    pub fn fail_listeners(
        &mut self,
        collection: &CollectionPath,
        error: StoreError,
    ) -> Vec<Box<dyn FnOnce()>> {
        let failed: Vec<_> = self
            .listeners
            .iter()
            .filter(|(_, listener)| &listener.collection == collection)
            .map(|(key, _)| key)
            .collect();

        let mut notifications: Vec<Box<dyn FnOnce()>> = Vec::new();
        for key in failed {
            if let Some(listener) = self.listeners.remove(key) {
                let on_error = listener.on_error;
                let error = error.clone();
                notifications.push(Box::new(move || on_error(error)));
            }
        }
        if !notifications.is_empty() {
            log::warn!(
                "Dropped {} listener(s) on {collection}: {error}",
                notifications.len()
            );
        }
        notifications
    }
}
