//! Per-connection session state machine.
//!
//! A session lives exactly as long as its TCP connection. The server reads
//! a command tag, dispatches, and loops until a clean close at a frame
//! boundary or a protocol error.
//!
//! Deliberately permissive: `REQ_` is accepted without a prior `INIT`, a
//! repeated `INIT` simply overwrites the declared chunk count, and the count
//! is informational only. It is never checked against the number of requests
//! actually received.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use tokio::io::{AsyncRead, AsyncWrite};

use reverb_core::wire::{self, Tag, WireError};

/// Metadata for one live connection, visible in the session table.
#[derive(Debug)]
pub struct SessionMeta {
    /// Peer's remote address.
    pub peer_addr: SocketAddr,
    /// When the connection was accepted.
    pub established_at: Instant,
    /// Chunk count declared by the last `INIT`. Informational only.
    pub expected_chunks: Option<usize>,
    /// Requests served so far.
    pub chunks_served: u64,
}

impl SessionMeta {
    pub fn new(peer_addr: SocketAddr) -> Self {
        Self {
            peer_addr,
            established_at: Instant::now(),
            expected_chunks: None,
            chunks_served: 0,
        }
    }
}

/// The session table — shared across all connection tasks.
pub type SessionTable = Arc<DashMap<u64, SessionMeta>>;

/// Create a new empty session table.
pub fn new_session_table() -> SessionTable {
    Arc::new(DashMap::new())
}

/// Run one session to completion over `stream`.
///
/// Returns `Ok(())` on a clean close. Any protocol or transport error is
/// returned to the caller, which logs it and drops the connection; other
/// connections are unaffected.
pub async fn run_session<S>(
    stream: &mut S,
    sessions: &SessionTable,
    conn_id: u64,
) -> Result<(), WireError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    loop {
        let tag = match wire::read_tag(stream).await? {
            Some(tag) => tag,
            None => return Ok(()),
        };

        match tag {
            Tag::Init => {
                let count = wire::read_len(stream).await?;
                if let Some(mut meta) = sessions.get_mut(&conn_id) {
                    if meta.expected_chunks.replace(count).is_some() {
                        tracing::debug!(conn = conn_id, count, "repeat INIT overwrites chunk count");
                    }
                }
                tracing::info!(conn = conn_id, count, "session initialized");
                wire::write_tag(stream, Tag::Agree).await?;
            }
            Tag::Request => {
                let len = wire::read_len(stream).await?;
                let payload = wire::read_payload(stream, len).await?;
                let text = std::str::from_utf8(&payload)?;
                let reversed = wire::reverse_chunk(text);
                wire::write_frame(stream, Tag::Answer, reversed.as_bytes()).await?;

                let served = match sessions.get_mut(&conn_id) {
                    Some(mut meta) => {
                        meta.chunks_served += 1;
                        meta.chunks_served
                    }
                    None => 0,
                };
                tracing::debug!(conn = conn_id, len, served, "chunk reversed");
            }
            // AGRE / ANS_ are server-to-client only. The protocol has no
            // resynchronization, so the connection closes here.
            got => {
                return Err(WireError::UnexpectedTag {
                    expected: Tag::Request,
                    got,
                });
            }
        }
    }
}
