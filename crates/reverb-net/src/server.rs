//! TCP listener — accepts connections and runs one session task per client.
//!
//! Concurrency is bounded by a semaphore sized from the config: a permit is
//! taken before each accept, so at most `max_connections` sessions run at
//! once and further clients wait in the accept backlog. Sessions share no
//! mutable state beyond the session table.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, Semaphore};

use reverb_core::config::ReverbConfig;

use crate::session::{self, new_session_table, SessionMeta, SessionTable};

pub struct Listener {
    listener: TcpListener,
    sessions: SessionTable,
    permits: Arc<Semaphore>,
    next_conn_id: AtomicU64,
    shutdown: broadcast::Receiver<()>,
}

impl Listener {
    /// Bind the listen socket described by `config`.
    pub async fn bind(config: &ReverbConfig, shutdown: broadcast::Receiver<()>) -> Result<Self> {
        let addr = config.listen_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;

        Ok(Self {
            listener,
            sessions: new_session_table(),
            permits: Arc::new(Semaphore::new(config.limits.max_connections)),
            next_conn_id: AtomicU64::new(1),
            shutdown,
        })
    }

    /// The bound address. Useful when the config requested port 0.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .context("failed to read listener address")
    }

    /// Shared handle to the session table.
    pub fn sessions(&self) -> SessionTable {
        self.sessions.clone()
    }

    /// Accept loop. Returns when the shutdown channel fires.
    pub async fn run(mut self) -> Result<()> {
        loop {
            let permit = tokio::select! {
                _ = self.shutdown.recv() => {
                    tracing::info!("listener shutting down");
                    return Ok(());
                }
                permit = self.permits.clone().acquire_owned() => match permit {
                    Ok(p) => p,
                    Err(_) => return Ok(()),
                },
            };

            let (stream, peer_addr) = tokio::select! {
                _ = self.shutdown.recv() => {
                    tracing::info!("listener shutting down");
                    return Ok(());
                }
                accepted = self.listener.accept() => match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        tracing::warn!(error = %e, "accept failed");
                        continue;
                    }
                },
            };

            let conn_id = self.next_conn_id.fetch_add(1, Ordering::Relaxed);
            let sessions = self.sessions.clone();

            tokio::spawn(async move {
                let _permit = permit;
                let mut stream = stream;

                tracing::info!(conn = conn_id, peer = %peer_addr, "connection open");
                sessions.insert(conn_id, SessionMeta::new(peer_addr));

                let result = session::run_session(&mut stream, &sessions, conn_id).await;

                let served = sessions
                    .remove(&conn_id)
                    .map(|(_, meta)| meta.chunks_served)
                    .unwrap_or(0);

                match result {
                    Ok(()) => {
                        tracing::info!(conn = conn_id, peer = %peer_addr, served, "connection closed")
                    }
                    Err(e) => {
                        tracing::warn!(conn = conn_id, peer = %peer_addr, served, error = %e, "connection failed")
                    }
                }
            });
        }
    }
}
