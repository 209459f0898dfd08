//! Workload discovery.
//!
//! A [`PodSource`] returns a fresh snapshot of [`WorkloadTarget`]s on every
//! call. The scanner never caches or mutates a snapshot; it is dropped at the
//! end of the cycle that requested it.
mod error;
mod kubernetes;

pub use error::{Error, Result};
pub use kubernetes::{KubePodSource, client, target_from_pod};

/// A pod as seen by the scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadTarget {
    pub namespace: String,
    pub name: String,
    /// Pod IP. May be empty for pods that have not been scheduled yet.
    pub ip: String,
    pub host_network: bool,
    /// Declared container ports of all containers, in declaration order.
    pub ports: Vec<i32>,
}

/// Source of workload snapshots.
pub trait PodSource {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Lists every pod across all namespaces.
    fn list_targets(
        &self,
    ) -> impl std::future::Future<
        Output = std::result::Result<Vec<WorkloadTarget>, Self::Error>,
    > + Send;
}
