use std::net::{IpAddr, Ipv6Addr, SocketAddr};

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Port the Prometheus endpoint listens on when none is configured.
pub const DEFAULT_METRICS_PORT: u16 = 9000;

/// Installs the global metrics recorder and exposes it at `[::]:{port}/metrics`.
///
/// Must be called from within a Tokio runtime since the HTTP listener is spawned on it.
/// Installing twice fails because the recorder is process global.
pub fn init_metrics(port: u16, run_label: Option<&str>) -> Result<(), BuildError> {
    let mut builder = PrometheusBuilder::new()
        .with_http_listener(SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), port));

    if let Some(run_label) = run_label {
        builder = builder.add_global_label("definition", run_label);
    }

    builder.install()?;

    Ok(())
}
