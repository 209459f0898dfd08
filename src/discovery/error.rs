#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to load kubeconfig: {0}")]
    Kubeconfig(#[source] kube::config::KubeconfigError),
    #[error("failed to build kubernetes client: {0}")]
    ClientBuild(#[source] kube::Error),
    #[error("failed to list pods: {0}")]
    ListPods(#[source] kube::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
