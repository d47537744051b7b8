//! Prometheus metrics.

use crate::config::MetricsConfig;
use crate::{Error, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Returns the listener address for the configured port.
#[must_use]
pub const fn listen_addr(config: &MetricsConfig) -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), config.port)
}

/// Installs the Prometheus recorder and HTTP listener when enabled.
///
/// Returns the address the listener is bound to, or `None` when disabled.
/// Without a recorder every `metrics` macro call is a no-op.
pub fn install_prometheus(config: &MetricsConfig) -> Result<Option<SocketAddr>> {
    if !config.enabled {
        return Ok(None);
    }

    let addr = listen_addr(config);
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| Error::OperationFailed {
            operation: "metrics_install".to_string(),
            cause: e.to_string(),
        })?;

    tracing::info!(%addr, "Prometheus metrics listener started");
    Ok(Some(addr))
}
