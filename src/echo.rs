//! Echo accept loop over a tracked listener.
//!
//! Drives `accept`/`close` the way an application server would, so the
//! binary has live traffic to observe.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::broadcast;

use crate::net::{Connection, Listener, TrackedConnection, TrackedListener};

/// Accept and echo until shutdown, then close the listener.
///
/// Connections already accepted keep running after the listener stops.
pub async fn serve_echo<L: Listener>(mut listener: TrackedListener<L>, mut shutdown: broadcast::Receiver<()>) {
    let name = listener.options().tracker_name().to_string();
    tracing::info!(listener_name = %name, "Echo server accepting");

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((conn, _)) => {
                    tokio::spawn(echo(conn));
                }
                Err(e) => {
                    tracing::warn!(listener_name = %name, error = %e, "Accept failed");
                    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
                }
            },
            _ = shutdown.recv() => break,
        }
    }

    if let Err(e) = listener.close() {
        tracing::warn!(listener_name = %name, error = %e, "Failed to close listener");
    }
    tracing::info!(listener_name = %name, "Echo server stopped");
}

async fn echo<C: Connection>(mut conn: TrackedConnection<C>) {
    let mut buf = [0u8; 4096];
    loop {
        match conn.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                if let Err(e) = conn.write_all(&buf[..n]).await {
                    tracing::debug!(connection_id = %conn.id(), error = %e, "Echo write failed");
                    break;
                }
            }
            Err(e) => {
                tracing::debug!(connection_id = %conn.id(), error = %e, "Echo read failed");
                break;
            }
        }
    }

    if let Err(e) = conn.close().await {
        tracing::debug!(connection_id = %conn.id(), error = %e, "Close failed");
    }
}
