//! Identity types for nodes of the replicated scene graph.
//!
//! Every node carries a [`LocalId`] that is unique within the process and never
//! reused. Nodes that the server knows about additionally carry a [`ServerId`];
//! nodes without one are client-local and cannot be targeted by later
//! replication events.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifier assigned by the server. Absence is modelled with `Option`.
pub type ServerId = u32;

/// Identifier of a physical connection, pinned by the session on first connect.
pub type SessionId = u64;

static NEXT_LOCAL_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier for scenes, game objects and components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LocalId(u64);

impl LocalId {
    /// Allocates the next id. Ids increase monotonically and are never recycled.
    pub fn next() -> Self {
        LocalId(NEXT_LOCAL_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
