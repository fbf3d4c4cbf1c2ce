//! Connection accounting and live events for tracked TCP listeners.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};

use conntrack::net::TrackOptions;
use conntrack::observability::events::EventLog;
use conntrack::observability::metrics::{recorder_ready, ACCEPTED_TOTAL, CLOSED_TOTAL, OPEN};
use conntrack::observability::tracing::family;

mod common;

#[tokio::test]
async fn test_metrics_preregistered() {
    let _default = common::tracked(TrackOptions::new()).await;
    assert!(recorder_ready());
    let _named = common::tracked(TrackOptions::new().name("prereg")).await;

    for (metric, name) in [
        (ACCEPTED_TOTAL, "default"),
        (CLOSED_TOTAL, "default"),
        (OPEN, "default"),
        (ACCEPTED_TOTAL, "prereg"),
        (CLOSED_TOTAL, "prereg"),
        (OPEN, "prereg"),
    ] {
        assert_ne!(
            common::metric_lines(metric, name).len(),
            0,
            "{} must exist for {} before any traffic",
            metric,
            name
        );
    }
    assert_eq!(common::metric_value(ACCEPTED_TOTAL, "prereg"), 0.0);
    assert_eq!(common::metric_value(OPEN, "prereg"), 0.0);
}

#[tokio::test]
async fn test_monitoring_normal_conns() {
    let mut listener = common::tracked(TrackOptions::new().name("svc")).await;

    let before_accepted = common::metric_value(ACCEPTED_TOTAL, "svc");
    let before_closed = common::metric_value(CLOSED_TOTAL, "svc");
    let before_open = common::metric_value(OPEN, "svc");

    let (_client, mut conn) = common::connect(&mut listener).await;
    assert_eq!(common::metric_value(ACCEPTED_TOTAL, "svc"), before_accepted + 1.0);
    assert_eq!(common::metric_value(CLOSED_TOTAL, "svc"), before_closed);
    assert_eq!(common::metric_value(OPEN, "svc"), before_open + 1.0);

    conn.close().await.unwrap();
    assert_eq!(common::metric_value(ACCEPTED_TOTAL, "svc"), before_accepted + 1.0);
    assert_eq!(common::metric_value(CLOSED_TOTAL, "svc"), before_closed + 1.0);
    assert_eq!(common::metric_value(OPEN, "svc"), before_open);
}

#[tokio::test]
async fn test_repeated_close_counts_once() {
    let mut listener = common::tracked(TrackOptions::new().name("repeat")).await;
    let (_client, mut conn) = common::connect(&mut listener).await;

    for _ in 0..5 {
        // Later closes report NotConnected; only the accounting matters here.
        let _ = conn.close().await;
    }
    drop(conn);

    assert_eq!(common::metric_value(ACCEPTED_TOTAL, "repeat"), 1.0);
    assert_eq!(common::metric_value(CLOSED_TOTAL, "repeat"), 1.0);
    assert_eq!(common::metric_value(OPEN, "repeat"), 0.0);
}

#[tokio::test]
async fn test_drop_counts_as_close() {
    let mut listener = common::tracked(TrackOptions::new().name("dropped")).await;
    let (_client, conn) = common::connect(&mut listener).await;
    assert_eq!(common::metric_value(OPEN, "dropped"), 1.0);

    drop(conn);
    assert_eq!(common::metric_value(CLOSED_TOTAL, "dropped"), 1.0);
    assert_eq!(common::metric_value(OPEN, "dropped"), 0.0);
}

#[tokio::test]
async fn test_shared_name_aggregates() {
    let mut first = common::tracked(TrackOptions::new().name("shared")).await;
    let mut second = common::tracked(TrackOptions::new().name("shared")).await;

    let mut conns = Vec::new();
    for _ in 0..3 {
        conns.push(common::connect(&mut first).await);
    }
    for _ in 0..2 {
        conns.push(common::connect(&mut second).await);
    }

    // Close 2 of the 5.
    for (_, conn) in conns.iter_mut().take(2) {
        conn.close().await.unwrap();
    }

    assert_eq!(common::metric_value(ACCEPTED_TOTAL, "shared"), 5.0);
    assert_eq!(common::metric_value(CLOSED_TOTAL, "shared"), 2.0);
    assert_eq!(common::metric_value(OPEN, "shared"), 3.0);

    drop(conns);
    assert_eq!(common::metric_value(CLOSED_TOTAL, "shared"), 5.0);
    assert_eq!(common::metric_value(OPEN, "shared"), 0.0);
}

#[tokio::test]
async fn test_closing_listener_leaves_connections_open() {
    let mut listener = common::tracked(TrackOptions::new().name("listener-close")).await;
    let (_client, mut conn) = common::connect(&mut listener).await;

    listener.close().unwrap();
    assert_eq!(common::metric_value(CLOSED_TOTAL, "listener-close"), 0.0);
    assert_eq!(common::metric_value(OPEN, "listener-close"), 1.0);

    conn.close().await.unwrap();
    assert_eq!(common::metric_value(OPEN, "listener-close"), 0.0);
}

#[tokio::test]
async fn test_concurrent_connections_balance() {
    let mut listener = common::tracked(TrackOptions::new().name("concurrent")).await;

    let mut handles = Vec::new();
    for _ in 0..20 {
        let (client, conn) = common::connect(&mut listener).await;
        handles.push(tokio::spawn(async move {
            let mut conn = conn;
            let _ = conn.close().await;
            drop(client);
        }));
    }
    assert_eq!(common::metric_value(ACCEPTED_TOTAL, "concurrent"), 20.0);

    for handle in handles {
        handle.await.unwrap();
    }
    assert_eq!(common::metric_value(CLOSED_TOTAL, "concurrent"), 20.0);
    assert_eq!(common::metric_value(OPEN, "concurrent"), 0.0);
}

#[tokio::test]
async fn test_tracing_normal_comms() {
    let mut listener = common::tracked(TrackOptions::new().name("traced").with_tracing()).await;
    let log: Arc<EventLog> = EventLog::global();
    let fam = family("traced");

    let (client, mut conn) = common::connect(&mut listener).await;
    let client_addr = client.local_addr().unwrap().to_string();

    let live = log.live(Some(&fam));
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].title, client_addr);
    assert!(
        live[0].entries[0].message.contains(&client_addr),
        "the live event must name the connection's address"
    );

    conn.close().await.unwrap();
    assert!(log.live(Some(&fam)).is_empty());

    let finished = log.finished(Some(&fam));
    assert_eq!(finished.len(), 1);
    assert_eq!(finished[0].entries.last().unwrap().message, "closing");
}

#[tokio::test]
async fn test_tracing_disabled_keeps_metrics() {
    let mut listener = common::tracked(TrackOptions::new().name("untraced")).await;
    let (_client, mut conn) = common::connect(&mut listener).await;

    assert_eq!(EventLog::global().live_count(&family("untraced")), 0);
    assert_eq!(common::metric_value(OPEN, "untraced"), 1.0);

    conn.close().await.unwrap();
    assert_eq!(common::metric_value(OPEN, "untraced"), 0.0);
}

#[tokio::test]
async fn test_without_metrics_publishes_nothing() {
    let mut listener = common::tracked(TrackOptions::new().name("unmetered").without_metrics()).await;
    let (_client, mut conn) = common::connect(&mut listener).await;
    conn.close().await.unwrap();

    assert!(common::metric_lines(ACCEPTED_TOTAL, "unmetered").is_empty());
    assert!(common::metric_lines(OPEN, "unmetered").is_empty());
}

#[tokio::test]
async fn test_close_releases_socket() {
    let mut listener = common::tracked(TrackOptions::new().name("released").with_tracing()).await;
    let (mut client, mut conn) = common::connect(&mut listener).await;

    conn.close().await.unwrap();
    assert_eq!(common::metric_value(OPEN, "released"), 0.0);
    assert_eq!(EventLog::global().live_count(&family("released")), 0);

    let mut buf = [0u8; 32];
    assert_eq!(client.read(&mut buf).await.unwrap(), 0, "peer must see EOF after close");
    let _ = client.write_all(b"after-close").await;

    let err = conn.read(&mut buf).await.unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::NotConnected);
    assert!(conn.get_ref().is_none());
}

#[tokio::test]
async fn test_keepalive_applied_on_accept() {
    let mut listener = common::tracked(
        TrackOptions::new()
            .name("keepalive")
            .tcp_keepalive(Duration::from_secs(30)),
    )
    .await;
    let (_client, conn) = common::connect(&mut listener).await;

    let stream = conn.get_ref().unwrap();
    assert!(socket2::SockRef::from(stream).keepalive().unwrap());
}

#[tokio::test]
async fn test_keepalive_off_by_default() {
    let mut listener = common::tracked(TrackOptions::new().name("no-keepalive")).await;
    let (_client, conn) = common::connect(&mut listener).await;

    let stream = conn.get_ref().unwrap();
    assert!(!socket2::SockRef::from(stream).keepalive().unwrap());
}
