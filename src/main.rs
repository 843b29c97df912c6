use std::sync::Arc;

use anyhow::{Context, bail};

use order_tracker::config::TrackerConfig;
use order_tracker::mailbox::ImapSession;
use order_tracker::pipeline::{self, OrderTracker};
use order_tracker::report;
use order_tracker::sheet;
use order_tracker::status::OrderStatus;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        bail!("Failed to install rustls crypto provider");
    }

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = TrackerConfig::from_env().context("Invalid configuration")?;

    eprintln!("📦 Order Tracker v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   IMAP: {}:{}", config.mailbox.host, config.mailbox.port);
    eprintln!("   Folder: {}", config.mailbox.folder);
    eprintln!("   Report: {}", config.report_path.display());
    eprintln!("   Workers: {}\n", config.workers);

    // ── Orders ──────────────────────────────────────────────────────
    let orders = sheet::load_orders(&config.sheet_source)
        .await
        .context("Failed to load order sheet")?;
    if orders.is_empty() {
        bail!("No rows from sheet CSV.");
    }

    // ── Mailbox ─────────────────────────────────────────────────────
    let mailbox_config = config.mailbox.clone();
    let tracker = Arc::new(OrderTracker::default());
    let records = pipeline::run_with_workers(tracker, orders, config.workers, move || {
        ImapSession::connect(&mailbox_config)
    })
    .await
    .context("Mailbox run failed")?;

    // ── Report ──────────────────────────────────────────────────────
    report::write_report(&config.report_path, &records)
        .with_context(|| format!("Failed to write {}", config.report_path.display()))?;

    let count = |status: OrderStatus| records.iter().filter(|r| r.status == status).count();
    tracing::info!(
        total = records.len(),
        delivered = count(OrderStatus::Delivered),
        shipped = count(OrderStatus::Shipped),
        pending = count(OrderStatus::Pending),
        "Run complete"
    );
    eprintln!("Wrote {}", config.report_path.display());

    Ok(())
}
