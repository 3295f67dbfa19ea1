//! Length-prefixed frame transport over Unix domain sockets
//!
//! The only I/O primitive of the coordination layer. Each frame is a 4-byte
//! big-endian length followed by that many bytes. Streams are owned values;
//! [`FrameListener::accept`] moves ownership of the connected endpoint to the
//! caller.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, warn};

use crate::envelope::Envelope;
use crate::error::WireError;

/// Hard cap on a declared frame length (10 MiB)
///
/// Bounds memory use against malformed peers: an oversized declared length is
/// rejected before any allocation is attempted.
pub const MAX_FRAME_LEN: u32 = 10 * 1024 * 1024;

/// A passive endpoint bound to a filesystem socket path
#[derive(Debug)]
pub struct FrameListener {
    inner: UnixListener,
    path: PathBuf,
}

impl FrameListener {
    /// Bind a listener at `path`, removing any stale socket file first
    pub fn bind(path: impl Into<PathBuf>) -> Result<Self, WireError> {
        let path = path.into();
        debug!(?path, "FrameListener::bind: creating listener");

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        // Clean up a stale socket from a previous run
        if path.exists() {
            debug!(?path, "FrameListener::bind: removing stale socket");
            std::fs::remove_file(&path).map_err(|source| WireError::Bind {
                path: path.clone(),
                source,
            })?;
        }

        let inner = UnixListener::bind(&path).map_err(|source| WireError::Bind {
            path: path.clone(),
            source,
        })?;

        debug!(?path, "FrameListener::bind: socket bound");
        Ok(Self { inner, path })
    }

    /// Wait for a peer to connect; ownership of the stream moves to the caller
    pub async fn accept(&self) -> Result<FrameStream, WireError> {
        let (stream, _addr) = self.inner.accept().await?;
        debug!(path = ?self.path, "FrameListener::accept: peer connected");
        Ok(FrameStream { inner: stream })
    }

    /// Bounded accept: `None` on timeout or accept failure
    pub async fn accept_timeout(&self, timeout: Duration) -> Option<FrameStream> {
        match tokio::time::timeout(timeout, self.accept()).await {
            Ok(Ok(stream)) => Some(stream),
            Ok(Err(e)) => {
                warn!(error = %e, "FrameListener::accept_timeout: accept failed");
                None
            }
            Err(_) => None,
        }
    }

    /// The filesystem path this listener is bound to
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the socket file; idempotent
    pub fn close(&self) {
        if self.path.exists() {
            debug!(path = ?self.path, "FrameListener::close: removing socket file");
            if let Err(e) = std::fs::remove_file(&self.path) {
                warn!(path = ?self.path, error = %e, "Failed to remove socket file");
            }
        }
    }
}

impl Drop for FrameListener {
    fn drop(&mut self) {
        self.close();
    }
}

/// An active, connected endpoint carrying framed messages
#[derive(Debug)]
pub struct FrameStream {
    inner: UnixStream,
}

impl FrameStream {
    /// Connect to a listener at `path`
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self, WireError> {
        let path = path.as_ref();
        let inner = UnixStream::connect(path).await.map_err(|source| WireError::Connect {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(?path, "FrameStream::connect: connected");
        Ok(Self { inner })
    }

    /// Write one frame: 4-byte big-endian length prefix, then the bytes
    ///
    /// `write_all` loops on partial writes; a gone peer surfaces as `Err`
    /// for the caller to handle per-connection.
    pub async fn send_frame(&mut self, bytes: &[u8]) -> Result<(), WireError> {
        let len = bytes.len() as u32;
        if len > MAX_FRAME_LEN {
            return Err(WireError::FrameTooLarge {
                len,
                max: MAX_FRAME_LEN,
            });
        }
        self.inner.write_all(&len.to_be_bytes()).await?;
        self.inner.write_all(bytes).await?;
        self.inner.flush().await?;
        Ok(())
    }

    /// Blocking read of one frame
    ///
    /// A declared length over [`MAX_FRAME_LEN`] fails before allocating;
    /// a stream that ends mid-frame is `WireError::ConnectionClosed`.
    pub async fn recv_frame(&mut self) -> Result<Vec<u8>, WireError> {
        let mut header = [0u8; 4];
        self.inner.read_exact(&mut header).await.map_err(map_eof)?;

        let len = u32::from_be_bytes(header);
        if len > MAX_FRAME_LEN {
            return Err(WireError::FrameTooLarge {
                len,
                max: MAX_FRAME_LEN,
            });
        }

        let mut body = vec![0u8; len as usize];
        self.inner.read_exact(&mut body).await.map_err(map_eof)?;
        Ok(body)
    }

    /// Bounded read: `None` on timeout or any read error
    pub async fn recv_frame_timeout(&mut self, timeout: Duration) -> Option<Vec<u8>> {
        match tokio::time::timeout(timeout, self.recv_frame()).await {
            Ok(Ok(frame)) => Some(frame),
            Ok(Err(e)) => {
                debug!(error = %e, "FrameStream::recv_frame_timeout: read failed");
                None
            }
            Err(_) => None,
        }
    }

    /// Send an encoded envelope as one frame
    pub async fn send_message(&mut self, envelope: &Envelope) -> Result<(), WireError> {
        self.send_frame(&envelope.encode()?).await
    }

    /// Receive one envelope
    pub async fn recv_message(&mut self) -> Result<Envelope, WireError> {
        let frame = self.recv_frame().await?;
        Ok(Envelope::decode(&frame))
    }

    /// Bounded envelope receive: `None` on timeout or read error
    pub async fn recv_message_timeout(&mut self, timeout: Duration) -> Option<Envelope> {
        let frame = self.recv_frame_timeout(timeout).await?;
        Some(Envelope::decode(&frame))
    }
}

/// read_exact reports a closed peer as UnexpectedEof
fn map_eof(e: std::io::Error) -> WireError {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        WireError::ConnectionClosed
    } else {
        WireError::Io(e)
    }
}
