#[path = "1-path.rs"]
mod path;

#[path = "2-server-timestamp.rs"]
mod server_timestamp;

#[path = "3-snapshot.rs"]
mod snapshot;

#[path = "4-dirty-tracker.rs"]
mod dirty_tracker;

#[path = "5-collection-store.rs"]
mod collection_store;

pub use collection_store::*;
pub use dirty_tracker::*;
pub use path::*;
pub use server_timestamp::*;
pub use snapshot::*;

#[cfg_attr(target_arch = "wasm32", wasm_bindgen::prelude::wasm_bindgen)]
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct ListenerKey(pub(crate) slotmap::DefaultKey);
