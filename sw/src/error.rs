//! Wire-layer error types

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the frame transport and envelope codec
#[derive(Debug, Error)]
pub enum WireError {
    #[error("Failed to bind socket at {path}")]
    Bind {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to connect to {path}")]
    Connect {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Connection closed mid-frame")]
    ConnectionClosed,

    #[error("Frame length {len} exceeds the {max} byte limit")]
    FrameTooLarge { len: u32, max: u32 },

    #[error("Codec error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_too_large_message() {
        let err = WireError::FrameTooLarge {
            len: 20_000_000,
            max: 10_485_760,
        };
        assert!(err.to_string().contains("20000000"));
        assert!(err.to_string().contains("10485760"));
    }

    #[test]
    fn test_bind_error_carries_path() {
        let err = WireError::Bind {
            path: PathBuf::from("/tmp/sim.sock"),
            source: std::io::Error::other("in use"),
        };
        assert!(err.to_string().contains("/tmp/sim.sock"));
    }
}
