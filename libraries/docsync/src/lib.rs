//! Client-side contract for a hosted document database with live queries.
//!
//! Model:
//! 1. Documents live in collections addressed by slash separated paths. Per-user data is namespaced as
//!    `artifacts/{application}/users/{user}/{collection}`.
//! 2. Readers never patch their local copy. They register a listener on a collection and receive the
//!    whole collection as a [`data_model::Snapshot`] every time anything in it changes.
//! 3. Writers issue create/update/delete requests. The only way a reader learns about a write, including
//!    its own, is the next snapshot.
//! 4. Creation times are stamped by the store. Until the stamp is known, documents carry the local
//!    wall-clock time of the request as an estimate.
//!
//! The [`remote::RemoteStore`] and [`identity::IdentityProvider`] traits are the seams a hosted backend
//! plugs into. The `memory` feature provides an in-process backend behind both.

pub mod data_model;
pub mod identity;
pub mod remote;
pub mod subscription;

#[cfg(feature = "memory")]
pub mod memory;

pub use data_model::{
    CollectionPath, Document, DocumentId, DocumentPath, PathError, ServerTimestamp,
    ServerTimestampRequest, Snapshot,
};
pub use identity::{IdentityProvider, ProviderError, UserId};
pub use remote::{RemoteStore, StoreError};
pub use subscription::Subscription;
