//! Client session transport for parley.
//!
//! An accepted stream is split in two: the shared [`ClientSession`] owns
//! the write side and is what the registry and broadcasts hold, while the
//! [`SessionReader`] stays with the connection's lifecycle task as a
//! one-pass source of incoming lines.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

/// Shared handle to one client's transport.
pub struct ClientSession {
    /// Remote peer address (diagnostic only).
    peer_addr: SocketAddr,
    /// Current nickname; the registry keeps it in sync with its key.
    nickname: RwLock<String>,
    /// Write half, locked so concurrent senders never interleave frames.
    writer: Mutex<OwnedWriteHalf>,
    /// Set once the transport has been shut down.
    closed: AtomicBool,
}

impl ClientSession {
    /// Split a freshly accepted stream into a session and its reader.
    pub fn new(stream: TcpStream, peer_addr: SocketAddr) -> (Self, SessionReader) {
        if let Err(e) = stream.set_nodelay(true) {
            debug!("set_nodelay for {}: {}", peer_addr, e);
        }
        let (read_half, write_half) = stream.into_split();

        let session = Self {
            peer_addr,
            nickname: RwLock::new(String::new()),
            writer: Mutex::new(write_half),
            closed: AtomicBool::new(false),
        };
        let reader = SessionReader {
            reader: BufReader::new(read_half),
            buf: String::new(),
        };
        (session, reader)
    }

    /// Get the remote peer address.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Get the current nickname.
    pub async fn nickname(&self) -> String {
        self.nickname.read().await.clone()
    }

    /// Set the nickname. Called by the registry under its own lock.
    pub async fn set_nickname(&self, nickname: &str) {
        *self.nickname.write().await = nickname.to_string();
    }

    /// Send one line, appending the terminator and flushing immediately.
    ///
    /// Serialized internally: a direct reply and a concurrent broadcast
    /// to the same session cannot interleave partial frames. Embedded
    /// newlines in `line` each produce their own wire frame.
    pub async fn send(&self, line: &str) -> io::Result<()> {
        let mut frame = String::with_capacity(line.len() + 1);
        frame.push_str(line);
        frame.push('\n');

        let mut writer = self.writer.lock().await;
        writer.write_all(frame.as_bytes()).await?;
        writer.flush().await
    }

    /// Close the transport's write side.
    ///
    /// Idempotent, and safe to call after a read error already tore the
    /// connection down.
    pub async fn dispose(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut writer = self.writer.lock().await;
        if let Err(e) = writer.shutdown().await {
            debug!("shutdown for {}: {}", self.peer_addr, e);
        }
    }

    /// Whether `dispose` has run.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Owned read side of a session.
///
/// Yields each newline-delimited frame in arrival order until EOF, a read
/// error, or teardown. One consumer, one pass; not restartable.
pub struct SessionReader {
    reader: BufReader<OwnedReadHalf>,
    buf: String,
}

impl SessionReader {
    /// Read the next line, or `Ok(None)` once the peer has closed.
    ///
    /// The `\n` terminator is stripped, along with a preceding `\r` when
    /// the peer sends CRLF endings.
    pub async fn next_line(&mut self) -> io::Result<Option<String>> {
        self.buf.clear();
        let n = self.reader.read_line(&mut self.buf).await?;
        if n == 0 {
            return Ok(None);
        }
        if self.buf.ends_with('\n') {
            self.buf.pop();
            if self.buf.ends_with('\r') {
                self.buf.pop();
            }
        }
        Ok(Some(self.buf.clone()))
    }
}
