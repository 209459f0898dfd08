//! The scanning engine.
//!
//! A [`Scanner`] runs discovery-and-scan cycles. Each cycle takes one slot of
//! the cycle limiter, lists the pods, and spawns one task per eligible pod.
//! Pod tasks share a per-cycle limiter so at most `max_parallel_pod_scans`
//! pods are probed at the same time; the ports of one pod are probed
//! sequentially. The loop only sleeps once every pod task has finished, so
//! cycles never overlap.
mod pod;
mod probe;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::config::Config;
use crate::discovery::PodSource;
use crate::error::ResultOkLogExt;
use crate::metrics::{GaugeStore, MetricKey};

pub use probe::{PortProber, TcpProber, probe_tcp};

/// Summary of one completed cycle.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub pods_scanned: usize,
    pub host_network_skipped: usize,
    pub ports_probed: usize,
    pub ports_open: usize,
    /// Series removed because their pod or port disappeared.
    pub series_pruned: usize,
    pub elapsed: Duration,
}

pub struct Scanner<S, P> {
    source: S,
    prober: Arc<P>,
    store: Arc<GaugeStore>,
    cycle_slots: Semaphore,
    max_parallel_pod_scans: usize,
    max_port: u32,
    rescan_interval: Duration,
    prune_stale_series: bool,
}

impl<S, P> Scanner<S, P>
where
    S: PodSource + Send + Sync,
    P: PortProber + Send + Sync + 'static,
{
    pub fn new(config: &Config, source: S, prober: P, store: Arc<GaugeStore>) -> Self {
        Self {
            source,
            prober: Arc::new(prober),
            store,
            cycle_slots: Semaphore::new(config.cycle_workers),
            max_parallel_pod_scans: config.max_parallel_pod_scans,
            max_port: config.max_port,
            rescan_interval: config.rescan_interval,
            prune_stale_series: config.prune_stale_series,
        }
    }

    /// Runs cycles forever, sleeping the rescan interval after each one.
    pub async fn run_forever(&self) {
        loop {
            if let Some(report) = self.run_cycle().await {
                log::info!(
                    "Scan cycle finished in {:?}: pods={}, host_network_skipped={}, probed={}, open={}, pruned={}",
                    report.elapsed,
                    report.pods_scanned,
                    report.host_network_skipped,
                    report.ports_probed,
                    report.ports_open,
                    report.series_pruned,
                );
            }
            log::debug!("Next scan cycle in {:?}", self.rescan_interval);
            tokio::time::sleep(self.rescan_interval).await;
        }
    }

    /// Runs one discovery-and-scan cycle and waits for every pod to finish.
    ///
    /// Returns `None` without touching the store if the pod listing fails.
    pub async fn run_cycle(&self) -> Option<CycleReport> {
        let _cycle_permit = self
            .cycle_slots
            .acquire()
            .await
            .ok_log("failed to acquire cycle slot")?;
        let start = tokio::time::Instant::now();

        let targets = self
            .source
            .list_targets()
            .await
            .ok_log("Error listing pods")?;

        let mut report = CycleReport::default();
        let pod_slots = Arc::new(Semaphore::new(self.max_parallel_pod_scans));
        let mut seen_pods = HashSet::with_capacity(targets.len());
        let mut pod_tasks = JoinSet::new();

        for target in targets {
            if target.host_network {
                log::debug!(
                    "Skipping host network pod {}/{}",
                    target.namespace,
                    target.name
                );
                report.host_network_skipped += 1;
                continue;
            }
            if !seen_pods.insert((target.namespace.clone(), target.name.clone())) {
                log::debug!(
                    "Skipping duplicate pod {}/{}",
                    target.namespace,
                    target.name
                );
                continue;
            }

            let pod_slots = Arc::clone(&pod_slots);
            let prober = Arc::clone(&self.prober);
            let store = Arc::clone(&self.store);
            let max_port = self.max_port;
            pod_tasks.spawn(async move {
                pod::scan_pod(&target, max_port, &pod_slots, prober.as_ref(), &store).await
            });
        }

        let mut observed: HashSet<MetricKey> = HashSet::new();
        let mut failed_pods = 0;
        while let Some(joined) = pod_tasks.join_next().await {
            let Some(scan) = joined.ok_log("pod scan task failed") else {
                failed_pods += 1;
                continue;
            };
            report.pods_scanned += 1;
            report.ports_probed += scan.observed.len();
            report.ports_open += scan.open;
            observed.extend(scan.observed);
        }

        // Keys of a failed pod are unknown, so nothing can be called stale.
        if failed_pods > 0 {
            log::warn!("{failed_pods} pod scans failed, not pruning stale series this cycle");
        } else if self.prune_stale_series {
            report.series_pruned = self.store.retain_observed(&observed);
        }
        report.elapsed = start.elapsed();
        Some(report)
    }
}
