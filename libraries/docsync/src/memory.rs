//! In-process backend implementing both [`RemoteStore`] and [`IdentityProvider`].
//!
//! Behaves like the hosted services as far as callers can tell: snapshots are whole collections, a new
//! listener is primed with the current contents, a failed listener is dead, and state changes of the
//! identity provider are pushed to every registered listener. On top of that it records every write
//! request it receives and can be told to fail, hang, or hold back server timestamps.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use chrono::{DateTime, Utc};

use crate::data_model::{
    CollectionPath, CollectionStore, Document, DocumentId, DocumentPath, ServerTimestamp,
    ServerTimestampRequest, Snapshot,
};
use crate::{IdentityProvider, ProviderError, RemoteStore, StoreError, Subscription, UserId};

/// A write request as the store received it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WriteRecord<F> {
    Create {
        collection: CollectionPath,
        fields: F,
        requested_at: DateTime<Utc>,
    },
    Update {
        document: DocumentPath,
        fields: F,
    },
    Delete {
        document: DocumentPath,
    },
}

#[derive(Default)]
struct StoreFaults {
    next_write: Option<StoreError>,
    hang_writes: bool,
    refuse_subscriptions: Option<StoreError>,
}

pub struct MemoryStore<F> {
    collections: Rc<RefCell<CollectionStore<F>>>,
    faults: RefCell<StoreFaults>,
    hold_timestamps: Cell<bool>,
    write_log: RefCell<Vec<WriteRecord<F>>>,
}

impl<F: Clone + 'static> Default for MemoryStore<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: Clone + 'static> MemoryStore<F> {
    pub fn new() -> Self {
        Self {
            collections: Rc::new(RefCell::new(CollectionStore::default())),
            faults: RefCell::new(StoreFaults::default()),
            hold_timestamps: Cell::new(false),
            write_log: RefCell::new(Vec::new()),
        }
    }

    /// While held, created documents keep their pending timestamp until
    /// [`MemoryStore::resolve_server_timestamps`] is called.
    pub fn hold_server_timestamps(&self, hold: bool) {
        self.hold_timestamps.set(hold);
    }

    pub fn resolve_server_timestamps(&self) -> usize {
        let resolved = self.collections.borrow_mut().resolve_pending(Utc::now());
        self.flush();
        resolved
    }

    pub fn fail_next_write(&self, error: StoreError) {
        self.faults.borrow_mut().next_write = Some(error);
    }

    /// Writes received while hanging never complete.
    pub fn hang_writes(&self, hang: bool) {
        self.faults.borrow_mut().hang_writes = hang;
    }

    pub fn refuse_subscriptions(&self, error: Option<StoreError>) {
        self.faults.borrow_mut().refuse_subscriptions = error;
    }

    /// Kills every listener on `collection`, as a dropped push channel would.
    pub fn break_subscriptions(&self, collection: &CollectionPath, error: StoreError) {
        let notifications = self
            .collections
            .borrow_mut()
            .fail_listeners(collection, error);
        for notification in notifications {
            notification();
        }
    }

    /// Writes straight into the store, bypassing the request path and its faults.
    pub fn seed(
        &self,
        collection: &CollectionPath,
        fields: F,
        created_at: ServerTimestamp,
    ) -> Result<DocumentId, StoreError> {
        let id = new_document_id()?;
        self.collections
            .borrow_mut()
            .insert(collection, id.clone(), fields, created_at);
        self.flush();
        Ok(id)
    }

    pub fn write_log(&self) -> Vec<WriteRecord<F>> {
        self.write_log.borrow().clone()
    }

    pub fn documents(&self, collection: &CollectionPath) -> Vec<Document<F>> {
        self.collections.borrow().snapshot(collection).documents
    }

    pub fn listener_count(&self, collection: &CollectionPath) -> usize {
        self.collections.borrow().listener_count(collection)
    }

    /// Delivers owed snapshots. The store is not borrowed while listeners run, so they may call back in.
    fn flush(&self) {
        let notifications = self.collections.borrow_mut().drain_due_notifications();
        for notification in notifications {
            notification();
        }
    }

    async fn accept(&self, record: WriteRecord<F>) -> Result<(), StoreError> {
        self.write_log.borrow_mut().push(record);

        let hang = self.faults.borrow().hang_writes;
        if hang {
            futures::future::pending::<()>().await;
        }

        match self.faults.borrow_mut().next_write.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

fn new_document_id() -> Result<DocumentId, StoreError> {
    Ok(DocumentId::new(eyedee::get_document_id())?)
}

impl<F: Clone + 'static> RemoteStore<F> for MemoryStore<F> {
    fn subscribe(
        &self,
        collection: &CollectionPath,
        on_snapshot: Box<dyn Fn(Snapshot<F>)>,
        on_error: Box<dyn Fn(StoreError)>,
    ) -> Result<Subscription, StoreError> {
        if let Some(error) = self.faults.borrow().refuse_subscriptions.clone() {
            return Err(error);
        }

        let key = self
            .collections
            .borrow_mut()
            .register_listener(collection.clone(), on_snapshot, on_error);
        self.flush();

        let collections: Weak<RefCell<CollectionStore<F>>> = Rc::downgrade(&self.collections);
        Ok(Subscription::new(move || {
            if let Some(collections) = collections.upgrade() {
                collections.borrow_mut().unregister_listener(key);
            }
        }))
    }

    async fn create(
        &self,
        collection: &CollectionPath,
        fields: F,
        created_at: ServerTimestampRequest,
    ) -> Result<DocumentId, StoreError> {
        self.accept(WriteRecord::Create {
            collection: collection.clone(),
            fields: fields.clone(),
            requested_at: created_at.requested_at,
        })
        .await?;

        let timestamp = if self.hold_timestamps.get() {
            created_at.pending()
        } else {
            ServerTimestamp::Resolved(Utc::now())
        };
        let id = new_document_id()?;
        self.collections
            .borrow_mut()
            .insert(collection, id.clone(), fields, timestamp);
        self.flush();
        Ok(id)
    }

    async fn update(&self, document: &DocumentPath, fields: F) -> Result<(), StoreError> {
        self.accept(WriteRecord::Update {
            document: document.clone(),
            fields: fields.clone(),
        })
        .await?;

        self.collections.borrow_mut().update(document, fields)?;
        self.flush();
        Ok(())
    }

    async fn delete(&self, document: &DocumentPath) -> Result<(), StoreError> {
        self.accept(WriteRecord::Delete {
            document: document.clone(),
        })
        .await?;

        // deleting a missing document is not an error
        self.collections.borrow_mut().remove(document);
        self.flush();
        Ok(())
    }
}

type StateListener = Rc<dyn Fn(Option<UserId>)>;

struct IdentityState {
    current: Option<UserId>,
    listeners: slotmap::SlotMap<slotmap::DefaultKey, StateListener>,
    tokens: HashMap<String, UserId>,
    anonymous_enabled: bool,
    next_failure: Option<ProviderError>,
    sign_in_attempts: usize,
}

pub struct MemoryIdentity {
    state: Rc<RefCell<IdentityState>>,
}

impl Default for MemoryIdentity {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryIdentity {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(IdentityState {
                current: None,
                listeners: Default::default(),
                tokens: HashMap::new(),
                anonymous_enabled: true,
                next_failure: None,
                sign_in_attempts: 0,
            })),
        }
    }

    /// `token` will sign in as `user`.
    pub fn accept_token(&self, token: impl Into<String>, user: UserId) {
        self.state.borrow_mut().tokens.insert(token.into(), user);
    }

    pub fn set_anonymous_enabled(&self, enabled: bool) {
        self.state.borrow_mut().anonymous_enabled = enabled;
    }

    pub fn fail_next_sign_in(&self, error: ProviderError) {
        self.state.borrow_mut().next_failure = Some(error);
    }

    pub fn current_user(&self) -> Option<UserId> {
        self.state.borrow().current.clone()
    }

    pub fn sign_in_attempts(&self) -> usize {
        self.state.borrow().sign_in_attempts
    }

    pub fn listener_count(&self) -> usize {
        self.state.borrow().listeners.len()
    }

    /// Switches the signed in identity from outside the app, as another tab or an admin would.
    pub fn force_user(&self, user: Option<UserId>) {
        self.set_current(user);
    }

    fn begin_sign_in(&self) -> Result<(), ProviderError> {
        let mut state = self.state.borrow_mut();
        state.sign_in_attempts += 1;
        match state.next_failure.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Listeners only hear about actual changes.
    fn set_current(&self, user: Option<UserId>) {
        let listeners: Vec<StateListener> = {
            let mut state = self.state.borrow_mut();
            if state.current == user {
                return;
            }
            state.current = user.clone();
            state.listeners.values().cloned().collect()
        };
        log::info!(
            "Identity changed to {}",
            user.as_ref().map(UserId::as_str).unwrap_or("<signed out>")
        );
        for listener in listeners {
            listener(user.clone());
        }
    }
}

impl IdentityProvider for MemoryIdentity {
    async fn sign_in_anonymously(&self) -> Result<UserId, ProviderError> {
        self.begin_sign_in()?;

        let (enabled, current) = {
            let state = self.state.borrow();
            (state.anonymous_enabled, state.current.clone())
        };
        if !enabled {
            return Err(ProviderError::AnonymousDisabled);
        }
        if let Some(current) = current {
            return Ok(current);
        }

        let user = UserId::new(eyedee::get_user_id());
        self.set_current(Some(user.clone()));
        Ok(user)
    }

    async fn sign_in_with_token(&self, token: &str) -> Result<UserId, ProviderError> {
        self.begin_sign_in()?;

        let user = self.state.borrow().tokens.get(token).cloned();
        let Some(user) = user else {
            return Err(ProviderError::InvalidToken(
                "token is not recognised".to_string(),
            ));
        };
        self.set_current(Some(user.clone()));
        Ok(user)
    }

    async fn sign_out(&self) -> Result<(), ProviderError> {
        self.set_current(None);
        Ok(())
    }

    fn on_state_change(&self, listener: Box<dyn Fn(Option<UserId>)>) -> Subscription {
        let listener: StateListener = Rc::from(listener);
        let (key, current) = {
            let mut state = self.state.borrow_mut();
            let key = state.listeners.insert(listener.clone());
            (key, state.current.clone())
        };
        listener(current);

        let state: Weak<RefCell<IdentityState>> = Rc::downgrade(&self.state);
        Subscription::new(move || {
            if let Some(state) = state.upgrade() {
                state.borrow_mut().listeners.remove(key);
            }
        })
    }
}
