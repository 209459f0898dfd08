use std::sync::Arc;

/// Kube Port Exporter: probes the declared container ports of every pod in a
/// Kubernetes cluster and exports their reachability as `open_ports` gauges.
///
/// This library provides pod discovery through the Kubernetes API, the
/// bounded-concurrency scanning engine, the gauge store and the HTTP surface
/// serving `/metrics` and `/healthz`.
pub mod api;
pub mod config;
pub mod discovery;
pub mod error;
pub mod metrics;
pub mod scan;

// Rescan loop:
//  acquire cycle slot -> list pods (all namespaces) -> drop hostNetwork pods ->
//  spawn one task per pod -> each task acquires a pod slot and probes its ports
//  one by one -> write 1.0/0.0 per (namespace, pod, port) -> wait for all tasks
//  -> prune series not seen in this cycle -> release cycle slot -> sleep
//
// A failed listing ends the cycle early and leaves every published series as is.

/// Runs the exporter.
///
/// Reads the configuration from the environment, connects to the Kubernetes
/// API, starts the rescan loop in the background and serves the HTTP surface
/// until it fails.
///
/// # Errors
///
/// Possible errors include:
/// - No in-cluster identity and no usable kubeconfig.
/// - Failure to bind the HTTP listener.
pub async fn run() -> error::Result<()> {
    let config = config::Config::from_env();
    log::info!("Configuration: {config:?}");

    let client = discovery::client().await.map_err(error::Error::Client)?;
    let source = discovery::KubePodSource::new(client);
    let store = Arc::new(metrics::GaugeStore::default());

    let scanner = scan::Scanner::new(
        &config,
        source,
        scan::TcpProber::new(config.probe_timeout),
        Arc::clone(&store),
    );
    tokio::spawn(async move { scanner.run_forever().await });

    api::APIServer::new(store).listen(config.listen_addr).await
}
