use std::collections::HashSet;

use tokio::sync::Semaphore;

use crate::discovery::WorkloadTarget;
use crate::error::ResultOkLogExt;
use crate::metrics::{GaugeStore, MetricKey};

use super::probe::PortProber;

/// Outcome of scanning a single pod.
#[derive(Debug, Default)]
pub(crate) struct PodScan {
    /// Keys written to the store, one per probed port.
    pub observed: Vec<MetricKey>,
    pub open: usize,
}

/// Ports of `declared` that should be probed: valid TCP ports not above
/// `max_port`, each at most once, in declaration order.
pub(crate) fn eligible_ports(declared: &[i32], max_port: u32) -> Vec<u16> {
    let mut seen = HashSet::with_capacity(declared.len());
    declared
        .iter()
        .filter_map(|&port| u16::try_from(port).ok())
        .filter(|&port| port != 0 && u32::from(port) <= max_port)
        .filter(|&port| seen.insert(port))
        .collect()
}

/// Scans every eligible port of `target` while holding one slot of `slots`.
///
/// Ports are probed one after the other; concurrency is bounded at the pod
/// level only.
pub(crate) async fn scan_pod<P: PortProber>(
    target: &WorkloadTarget,
    max_port: u32,
    slots: &Semaphore,
    prober: &P,
    store: &GaugeStore,
) -> PodScan {
    let Some(_permit) = slots.acquire().await.ok_log("failed to acquire pod scan slot") else {
        return PodScan::default();
    };

    let ports = eligible_ports(&target.ports, max_port);
    let mut scan = PodScan {
        observed: Vec::with_capacity(ports.len()),
        open: 0,
    };
    for port in ports {
        let open = prober.probe(&target.ip, port).await;
        let key = MetricKey::new(target.namespace.as_str(), target.name.as_str(), port);
        store.set(key.clone(), open);
        if open {
            scan.open += 1;
        }
        scan.observed.push(key);
    }
    scan
}
