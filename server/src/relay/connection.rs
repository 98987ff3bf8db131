use std::io;
use std::mem::MaybeUninit;
use std::net::{Shutdown, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use socket2::{SockRef, Socket};
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::Mutex;

/// Result of a non-destructive liveness probe.
#[derive(Debug)]
pub enum Liveness {
    /// Nothing wrong observed; bytes may or may not be pending.
    Alive,
    /// The peer closed its write side, or we closed the connection.
    Closed,
    /// The probe itself failed.
    Failed(io::Error),
}

/// A client that completed its handshake.
///
/// The read half of the socket stays with the connection's actor; this
/// struct only exposes serialized writes, a liveness probe, and close.
pub struct Connection {
    id: String,
    username: String,
    avatar: Vec<u8>,
    peer_addr: SocketAddr,
    joined_at: DateTime<Utc>,
    /// Frames from concurrent broadcasters are written one at a time.
    writer: Mutex<OwnedWriteHalf>,
    /// Duplicate handle on the same socket, used for peek and shutdown
    /// without contending for the writer.
    control: Socket,
    closed: AtomicBool,
}

impl Connection {
    pub fn new(
        id: String,
        username: String,
        avatar: Vec<u8>,
        peer_addr: SocketAddr,
        writer: OwnedWriteHalf,
        control: Socket,
    ) -> Self {
        Self {
            id,
            username,
            avatar,
            peer_addr,
            joined_at: Utc::now(),
            writer: Mutex::new(writer),
            control,
            closed: AtomicBool::new(false),
        }
    }

    /// Duplicate the socket handle of a freshly accepted stream. Must be
    /// called before the stream is split.
    pub fn control_handle(stream: &TcpStream) -> io::Result<Socket> {
        let control = SockRef::from(stream).try_clone()?;
        control.set_nonblocking(true)?;
        Ok(control)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn avatar(&self) -> &[u8] {
        &self.avatar
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn joined_at(&self) -> DateTime<Utc> {
        self.joined_at
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Write one complete frame. Frames are never interleaved.
    pub async fn send_frame(&self, frame: &[u8]) -> io::Result<()> {
        if self.is_closed() {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "connection closed"));
        }
        let mut writer = self.writer.lock().await;
        writer.write_all(frame).await?;
        writer.flush().await
    }

    /// Peek one byte without consuming it. A zero-length peek means the
    /// peer has shut down its write side.
    pub fn probe(&self) -> Liveness {
        if self.is_closed() {
            return Liveness::Closed;
        }
        let mut buf = [MaybeUninit::<u8>::uninit(); 1];
        match self.control.peek(&mut buf) {
            Ok(0) => Liveness::Closed,
            Ok(_) => Liveness::Alive,
            Err(e)
                if e.kind() == io::ErrorKind::WouldBlock
                    || e.kind() == io::ErrorKind::Interrupted =>
            {
                Liveness::Alive
            }
            Err(e) => Liveness::Failed(e),
        }
    }

    /// Shut the socket down in both directions. The actor's pending read
    /// returns end-of-stream and the actor exits on its own. Idempotent.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Err(e) = self.control.shutdown(Shutdown::Both) {
            if e.kind() != io::ErrorKind::NotConnected {
                tracing::debug!(client_id = %self.id, error = %e, "Socket shutdown failed");
            }
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("avatar_len", &self.avatar.len())
            .field("peer_addr", &self.peer_addr)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
