/// Entry point for the port exporter.
///
/// Connects to the Kubernetes API, periodically probes every declared container
/// port of every pod and serves the results as `open_ports` gauges on `/metrics`.
///
/// # Errors
///
/// Returns an error if the Kubernetes client cannot be created or the HTTP
/// listener cannot be bound.
///
/// # Examples
///
/// ```bash
/// RUST_LOG=info RESCAN_INTERVAL_MINUTES=5 cargo run
/// ```
#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    kube_port_exporter::run().await?;
    Ok(())
}
