//! # ServerTimestamp
//! Creation times are assigned by the store, never by the client. Between the write and the store's
//! acknowledgement the real value is unknown, so the document carries the local wall-clock time captured
//! when the write was requested. Readers can display that estimate right away; the next snapshot after
//! the store stamps the document replaces it with the authoritative value.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[cfg_attr(target_arch = "wasm32", derive(tsify::Tsify))]
#[cfg_attr(target_arch = "wasm32", tsify(from_wasm_abi, into_wasm_abi))]
#[serde(rename_all = "camelCase")]
pub enum ServerTimestamp {
    Resolved(DateTime<Utc>),
    Pending { estimate: DateTime<Utc> },
}

impl ServerTimestamp {
    pub fn is_pending(&self) -> bool {
        matches!(self, ServerTimestamp::Pending { .. })
    }

    pub fn resolved(&self) -> Option<DateTime<Utc>> {
        match self {
            ServerTimestamp::Resolved(at) => Some(*at),
            ServerTimestamp::Pending { .. } => None,
        }
    }

    /// The authoritative value when known, otherwise the local estimate.
    pub fn best_known(&self) -> DateTime<Utc> {
        match self {
            ServerTimestamp::Resolved(at) => *at,
            ServerTimestamp::Pending { estimate } => *estimate,
        }
    }

    /// Newest first. Pending timestamps count as newer than every resolved one.
    pub fn cmp_newest_first(&self, other: &Self) -> Ordering {
        use ServerTimestamp::*;
        match (self, other) {
            (Pending { estimate: a }, Pending { estimate: b }) => b.cmp(a),
            (Pending { .. }, Resolved(_)) => Ordering::Less,
            (Resolved(_), Pending { .. }) => Ordering::Greater,
            (Resolved(a), Resolved(b)) => b.cmp(a),
        }
    }
}

/// Sent along with a create: asks the store to stamp the new document.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ServerTimestampRequest {
    pub requested_at: DateTime<Utc>,
}

impl ServerTimestampRequest {
    pub fn now() -> Self {
        Self {
            requested_at: Utc::now(),
        }
    }

    pub fn pending(&self) -> ServerTimestamp {
        ServerTimestamp::Pending {
            estimate: self.requested_at,
        }
    }
}
