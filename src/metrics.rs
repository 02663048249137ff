use std::net::SocketAddr;

use anyhow::{Context, Result};
use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::OnceCell;

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("sync_fetch_total", "Upstream fetch attempts.");
        describe_counter!(
            "sync_fetch_skipped_total",
            "Fetches answered from the buffer because of the rate gate."
        );
        describe_counter!(
            "sync_fetch_errors_total",
            "Upstream fetch/parse failures."
        );
        describe_counter!(
            "sync_buffer_write_errors_total",
            "Snapshot or source state writes that failed."
        );
        describe_counter!(
            "sync_records_fetched_total",
            "Records returned by successful upstream fetches."
        );
        describe_counter!("publish_posts_total", "Posts created on the backend.");
        describe_counter!(
            "publish_skipped_total",
            "Records skipped as incomplete or already published."
        );
        describe_counter!("publish_errors_total", "Backend failures while publishing.");
        describe_counter!("publish_deleted_total", "Posts removed by delete-by-tag.");
        describe_counter!(
            "sync_publish_retryable_total",
            "Records a sync loop could not publish because of a transient failure."
        );
        describe_counter!(
            "sync_publish_permanent_total",
            "Records a sync loop could not publish and that will not succeed as-is."
        );
        describe_gauge!(
            "sync_last_poll_ts",
            "Unix ts when a sync loop last polled its source."
        );
    });
}

/// Install the Prometheus recorder with its own HTTP listener on `addr`.
/// Must be called from inside the tokio runtime.
pub fn install_exporter(addr: &str) -> Result<()> {
    let addr: SocketAddr = addr
        .parse()
        .with_context(|| format!("invalid metrics listen address {addr}"))?;
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("prometheus: install recorder")?;
    ensure_described();
    Ok(())
}
