//! # Dipamkara — TCP listener
//!
//! Accept loop with one task per connection. Each connection carries exactly
//! one request: read a frame (bounded per-read timeout), dispatch, write one
//! reply frame, close. A timed-out read closes the connection without a
//! reply. Ctrl-c stops the accept loop; in-flight connection tasks run to
//! completion on their own.

use crate::config::ServerConfig;
use crate::engine::Dipamkara;
use crate::error::DbError;
use crate::protocol::{dispatch, read_frame, write_frame};
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

/// Bind and serve until ctrl-c. Returns an error only for startup failures;
/// per-connection problems are logged and absorbed.
pub async fn serve(config: &ServerConfig, engine: Arc<Dipamkara>) -> Result<()> {
    let listener = TcpListener::bind(config.bind_addr())
        .await
        .with_context(|| format!("cannot bind {}", config.bind_addr()))?;
    info!(
        engine = %config.db_engine,
        addr = %listener.local_addr()?,
        timeout = config.timeout,
        buffer_size = config.buffer_size,
        eof = %config.eof,
        "listening"
    );

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
                break;
            }
            accepted = listener.accept() => {
                let (stream, peer) = accepted.context("accept failed")?;
                let engine = Arc::clone(&engine);
                let eof = config.eof_bytes();
                let timeout = config.read_timeout();
                let buffer_size = config.buffer_size;
                tokio::spawn(async move {
                    handle_connection(stream, peer, engine, eof, timeout, buffer_size).await;
                });
            }
        }
    }
    Ok(())
}

async fn handle_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    engine: Arc<Dipamkara>,
    eof: Vec<u8>,
    timeout: Duration,
    buffer_size: usize,
) {
    debug!(%peer, "connection accepted");
    let frame = match read_frame(&mut stream, &eof, buffer_size, timeout).await {
        Ok(frame) => frame,
        Err(DbError::ReadTimeout) => {
            warn!(%peer, "frame read timed out, closing without reply");
            return;
        }
        Err(err) => {
            warn!(%peer, error = %err, "frame read failed");
            return;
        }
    };

    let reply = dispatch(&engine, &frame).await;
    if !reply.is_ok() {
        debug!(%peer, message = %reply.message, "request failed");
    }
    let payload = match serde_json::to_vec(&reply) {
        Ok(payload) => payload,
        Err(err) => {
            error!(%peer, error = %err, "reply serialization failed");
            return;
        }
    };
    if let Err(err) = write_frame(&mut stream, &payload, &eof).await {
        warn!(%peer, error = %err, "reply write failed");
    }
    let _ = stream.shutdown().await;
    debug!(%peer, "connection closed");
}
