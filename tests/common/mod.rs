//! Shared helpers for integration tests.

use std::future::Future;
use std::sync::OnceLock;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::{TcpListener, TcpStream};

use conntrack::net::{TrackOptions, TrackedListener};
use conntrack::observability::metrics::install_prometheus;

/// Process-wide recorder. Call before wrapping any listener in a test.
pub fn prometheus() -> &'static PrometheusHandle {
    static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
    HANDLE.get_or_init(|| install_prometheus().expect("recorder installs once per test binary"))
}

/// Rendered exposition lines for `metric` carrying `listener_name="<name>"`.
pub fn metric_lines(metric: &str, name: &str) -> Vec<String> {
    let label = format!("listener_name=\"{}\"", name);
    prometheus()
        .render()
        .lines()
        .filter(|line| line.starts_with(&format!("{}{{", metric)) && line.contains(&label))
        .map(str::to_string)
        .collect()
}

/// Sum of every sample of `metric` for `name`.
pub fn metric_value(metric: &str, name: &str) -> f64 {
    metric_lines(metric, name)
        .iter()
        .filter_map(|line| line.rsplit(' ').next())
        .filter_map(|value| value.parse::<f64>().ok())
        .sum()
}

/// Bind a loopback listener and wrap it.
pub async fn tracked(opts: TrackOptions) -> TrackedListener<TcpListener> {
    prometheus();
    let raw = TcpListener::bind("127.0.0.1:0").await.unwrap();
    TrackedListener::new(raw, opts)
}

/// Dial the listener and return the client side plus the tracked server side.
#[allow(dead_code)]
pub async fn connect(
    listener: &mut TrackedListener<TcpListener>,
) -> (TcpStream, conntrack::TrackedConnection<TcpStream>) {
    let addr = listener.local_addr().unwrap();
    let (client, accepted) = tokio::join!(TcpStream::connect(addr), listener.accept());
    let (server, _) = accepted.unwrap();
    (client.unwrap(), server)
}

/// Poll `check` until it holds or the timeout expires.
#[allow(dead_code)]
pub async fn eventually<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
