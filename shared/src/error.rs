//! Error types for the snapshot and delta codecs

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    /// Snapshot text could not be parsed or produced
    #[error("snapshot encoding failed: {0}")]
    Json(#[from] serde_json::Error),

    /// Packet framing failed
    #[error("packet encoding failed: {0}")]
    Bincode(#[from] bincode::Error),

    /// A capability received a delta with fewer fields than it packs
    #[error("{kind} delta needs {expected} fields, got {actual}")]
    ShortDelta {
        kind: &'static str,
        expected: usize,
        actual: usize,
    },
}
