use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, ListParams};

use super::{Error, PodSource, Result, WorkloadTarget};

/// Creates a Kubernetes client.
///
/// The in-cluster service account is tried first. Outside a cluster the
/// kubeconfig named by `KUBECONFIG` (or `~/.kube/config`) is used instead.
///
/// # Errors
///
/// Returns [`Error::Kubeconfig`] if neither identity is available and
/// [`Error::ClientBuild`] if the client cannot be built from the configuration.
pub async fn client() -> Result<kube::Client> {
    let config = match kube::Config::incluster() {
        Ok(config) => {
            log::debug!("Using in-cluster kubernetes configuration");
            config
        }
        Err(err) => {
            log::debug!("In-cluster configuration unavailable ({err}), trying kubeconfig");
            kube::Config::from_kubeconfig(&kube::config::KubeConfigOptions::default())
                .await
                .map_err(Error::Kubeconfig)?
        }
    };
    kube::Client::try_from(config).map_err(Error::ClientBuild)
}

/// Lists pods across all namespaces through the Kubernetes API.
#[derive(Clone)]
pub struct KubePodSource {
    pods: Api<Pod>,
}

impl KubePodSource {
    pub fn new(client: kube::Client) -> Self {
        Self {
            pods: Api::all(client),
        }
    }
}

impl PodSource for KubePodSource {
    type Error = Error;

    async fn list_targets(&self) -> Result<Vec<WorkloadTarget>> {
        let pods = self
            .pods
            .list(&ListParams::default())
            .await
            .map_err(Error::ListPods)?;
        log::debug!("Listed {} pods", pods.items.len());
        Ok(pods.items.into_iter().map(target_from_pod).collect())
    }
}

/// Projects a pod onto the fields the scanner needs.
///
/// Missing metadata and status fields become empty strings and a missing
/// `hostNetwork` flag counts as `false`.
pub fn target_from_pod(pod: Pod) -> WorkloadTarget {
    let spec = pod.spec.unwrap_or_default();
    let ports = spec
        .containers
        .iter()
        .flat_map(|container| container.ports.iter().flatten())
        .map(|port| port.container_port)
        .collect();

    WorkloadTarget {
        namespace: pod.metadata.namespace.unwrap_or_default(),
        name: pod.metadata.name.unwrap_or_default(),
        ip: pod
            .status
            .and_then(|status| status.pod_ip)
            .unwrap_or_default(),
        host_network: spec.host_network.unwrap_or(false),
        ports,
    }
}
