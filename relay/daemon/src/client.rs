//! Sender-side commands
//!
//! `send` pushes one report through the same transport a reporting client
//! would use; `scope` shows what that transport contributes to the client's
//! scope. Both resolve the transport through a `TransportRegistry`.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::io::AsyncReadExt;
use tracing::{debug, info};

use relay_core::{
    DeliveryObserver, DeliveryStats, DeliveryStatsSnapshot, Dsn, Headers, RelayConfig, Scope,
    Transport, TransportRegistry, UnixSocketTransport, WriteFailurePolicy,
};

/// Pick the DSN from the command line or the loaded configuration
pub fn resolve_dsn(cli_dsn: Option<&str>, config: &RelayConfig) -> Result<Dsn> {
    let raw = cli_dsn
        .or(config.dsn.as_deref())
        .context("No DSN configured (use --dsn, REPORT_RELAY_DSN or [transport] dsn)")?;

    Dsn::parse(raw).with_context(|| format!("Invalid DSN: {raw}"))
}

/// Registry whose `unix` transport reports to `observer` and uses `policy`
pub fn build_registry(
    policy: WriteFailurePolicy,
    observer: Arc<dyn DeliveryObserver>,
) -> TransportRegistry {
    let mut registry = TransportRegistry::with_defaults();
    registry.register(UnixSocketTransport::SCHEME, move |dsn| {
        let transport = UnixSocketTransport::new(dsn)?
            .with_write_failure_policy(policy)
            .with_observer(Arc::clone(&observer));
        Ok(Box::new(transport) as Box<dyn Transport>)
    });
    registry
}

/// Read the report body from `file`, or from stdin if none is given
pub async fn read_payload(file: Option<&Path>) -> Result<Vec<u8>> {
    match file {
        Some(path) => tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read payload from {path:?}")),
        None => {
            let mut payload = Vec::new();
            tokio::io::stdin()
                .read_to_end(&mut payload)
                .await
                .context("Failed to read payload from stdin")?;
            Ok(payload)
        }
    }
}

/// Deliver one report and fail if it did not reach the socket
pub fn send_report(
    dsn: &Dsn,
    policy: WriteFailurePolicy,
    payload: &[u8],
) -> Result<DeliveryStatsSnapshot> {
    let stats = Arc::new(DeliveryStats::new());
    let registry = build_registry(policy, stats.clone());

    let mut transport = registry
        .create(dsn)
        .with_context(|| format!("No transport for {dsn}"))?;
    debug!(scheme = transport.scheme(), bytes = payload.len(), "Sending report");
    transport.send(payload, &Headers::new());

    let snapshot = stats.snapshot();
    if snapshot.frames_sent == 0 {
        bail!(
            "Report was not delivered ({} dropped, {} write failures)",
            snapshot.dropped,
            snapshot.write_failures
        );
    }

    info!(bytes = snapshot.bytes_sent, "Report delivered");
    Ok(snapshot)
}

/// Scope the transport for `dsn` contributes, rendered as pretty JSON
pub fn scope_json(dsn: &Dsn) -> Result<String> {
    let registry = TransportRegistry::with_defaults();
    let transport = registry
        .create(dsn)
        .with_context(|| format!("No transport for {dsn}"))?;

    let scope = transport
        .compute_scope(dsn, Scope::new())
        .context("Failed to compute scope")?;

    // Round trip through Value for stable key order
    let value = serde_json::to_value(&scope)?;
    Ok(serde_json::to_string_pretty(&value)?)
}
