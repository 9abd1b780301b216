use mirror_shared::{CodecError, SessionId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Neither the accelerated nor the canvas path is usable on this device
    #[error("no renderer available (gpu: {gpu}, canvas: {canvas}, force_canvas: {force_canvas})")]
    NoRenderer {
        gpu: bool,
        canvas: bool,
        force_canvas: bool,
    },

    /// The transport reconnected under a different session
    #[error("session id changed from {pinned} to {reported}; reload required")]
    SessionChanged { pinned: SessionId, reported: SessionId },

    #[error("transport closed")]
    TransportClosed,

    #[error("invalid server address: {0}")]
    Address(#[from] std::net::AddrParseError),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("asset manifest rejected: {0}")]
    Assets(String),
}

impl ClientError {
    /// Errors that stop the client instead of being logged and skipped.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ClientError::NoRenderer { .. } | ClientError::SessionChanged { .. }
        )
    }

    /// In-memory replication state can't be trusted any more; the whole client
    /// has to be rebuilt.
    pub fn requires_reload(&self) -> bool {
        matches!(self, ClientError::SessionChanged { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        let changed = ClientError::SessionChanged { pinned: 1, reported: 2 };
        assert!(changed.is_fatal());
        assert!(changed.requires_reload());

        let no_renderer = ClientError::NoRenderer {
            gpu: false,
            canvas: false,
            force_canvas: false,
        };
        assert!(no_renderer.is_fatal());
        assert!(!no_renderer.requires_reload());

        assert!(!ClientError::TransportClosed.is_fatal());
    }

    #[test]
    fn test_messages() {
        let changed = ClientError::SessionChanged { pinned: 3, reported: 9 };
        assert_eq!(changed.to_string(), "session id changed from 3 to 9; reload required");
    }
}
