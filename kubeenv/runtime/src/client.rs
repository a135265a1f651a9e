use kube::config::{KubeConfigOptions, Kubeconfig};
use kubeenv_k8s_api::ClusterClient;

/// Builds clients for the clusters a handler reads from.
#[async_trait::async_trait]
pub trait ClientFactory: Send + Sync + 'static {
    type Client: ClusterClient;

    /// Builds a client from a kubeconfig file. An empty path selects the default client.
    async fn from_path(&self, path: &str) -> anyhow::Result<Self::Client>;

    /// Builds a client from the contents of a kubeconfig.
    async fn from_kubeconfig(&self, kubeconfig: &[u8]) -> anyhow::Result<Self::Client>;
}

/// Builds [`kube::Client`]s.
#[derive(Clone)]
pub struct KubeClientFactory {
    default: kube::Client,
}

// === impl KubeClientFactory ===

impl KubeClientFactory {
    /// Uses `default` when no kubeconfig path is configured.
    pub fn new(default: kube::Client) -> Self {
        Self { default }
    }

    async fn connect(kubeconfig: Kubeconfig) -> anyhow::Result<kube::Client> {
        let config =
            kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default()).await?;
        let client = kube::Client::try_from(config)?;
        Ok(client)
    }
}

#[async_trait::async_trait]
impl ClientFactory for KubeClientFactory {
    type Client = kube::Client;

    async fn from_path(&self, path: &str) -> anyhow::Result<kube::Client> {
        if path.is_empty() {
            return Ok(self.default.clone());
        }
        let kubeconfig = Kubeconfig::read_from(path)?;
        Self::connect(kubeconfig).await
    }

    async fn from_kubeconfig(&self, kubeconfig: &[u8]) -> anyhow::Result<kube::Client> {
        let kubeconfig = Kubeconfig::from_yaml(std::str::from_utf8(kubeconfig)?)?;
        Self::connect(kubeconfig).await
    }
}
