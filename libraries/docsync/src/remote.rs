use crate::Subscription;
use crate::data_model::{
    CollectionPath, DocumentId, DocumentPath, PathError, ServerTimestampRequest, Snapshot,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("document {0} does not exist")]
    NotFound(String),
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("invalid path: {0}")]
    Path(#[from] PathError),
}

/// A hosted document database with live collection queries.
///
/// Writes resolve once the store has accepted the request. Their effect becomes visible to readers
/// through the next snapshot delivered to `subscribe` listeners, never through the return value.
#[allow(async_fn_in_trait)]
pub trait RemoteStore<F> {
    /// Registers `on_snapshot` for `collection`. It is called with the current contents right away and
    /// again after every change. After `on_error` fires the listener is dead and receives nothing more.
    fn subscribe(
        &self,
        collection: &CollectionPath,
        on_snapshot: Box<dyn Fn(Snapshot<F>)>,
        on_error: Box<dyn Fn(StoreError)>,
    ) -> Result<Subscription, StoreError>;

    async fn create(
        &self,
        collection: &CollectionPath,
        fields: F,
        created_at: ServerTimestampRequest,
    ) -> Result<DocumentId, StoreError>;

    /// Replaces the fields of an existing document. The store keeps its id and creation time.
    async fn update(&self, document: &DocumentPath, fields: F) -> Result<(), StoreError>;

    async fn delete(&self, document: &DocumentPath) -> Result<(), StoreError>;
}
