use crate::{
    discovery,
    registry::{CacheParams, ClusterRegistry},
    ClientFactory, Error, Handler,
};
use kubeenv_core::{BuildHandler, Params};
use std::{ffi::OsString, sync::Arc, time::Duration};
use tracing::{info, info_span, Instrument};

/// The process environment a handler is built in.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Env {
    /// Overrides the configured kubeconfig path.
    pub kubeconfig: Option<String>,
}

/// Builds handlers that read from a shared [`ClusterRegistry`].
pub struct Builder<F: ClientFactory> {
    registry: Arc<ClusterRegistry<F::Client>>,
    factory: F,
    params: Params,
    sync_timeout: Option<Duration>,
}

// === impl Env ===

impl Env {
    /// Reads `KUBECONFIG`.
    pub fn from_process() -> Result<Self, Error> {
        Self::from_kubeconfig_var(std::env::var_os("KUBECONFIG"))
    }

    /// Fails when the path isn't UTF-8, since the path also identifies the local cluster.
    pub(crate) fn from_kubeconfig_var(value: Option<OsString>) -> Result<Self, Error> {
        let kubeconfig = value
            .map(|path| {
                path.into_string().map_err(|path| {
                    Error::Configuration(format!("KUBECONFIG is not valid UTF-8: {path:?}"))
                })
            })
            .transpose()?;
        Ok(Self { kubeconfig })
    }
}

// === impl Builder ===

impl<F: ClientFactory> Builder<F> {
    pub fn new(registry: Arc<ClusterRegistry<F::Client>>, factory: F) -> Self {
        Self {
            registry,
            factory,
            params: Params::default(),
            sync_timeout: None,
        }
    }

    /// Fails builds whose caches don't sync within `timeout`.
    pub fn with_sync_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.sync_timeout = timeout;
        self
    }

    pub fn params(&self) -> &Params {
        &self.params
    }
}

#[async_trait::async_trait]
impl<F: ClientFactory> BuildHandler<Env> for Builder<F> {
    type Handler = Handler;
    type Error = Error;

    fn set_config(&mut self, params: Params) {
        self.params = params;
    }

    /// Builds a handler over the local cluster and every discovered remote cluster.
    ///
    /// Builds are serialized: the registry stays locked until the handler is built, so a
    /// concurrent build waits for this one's caches to sync and then reuses them.
    async fn build(&self, env: &Env) -> Result<Handler, Error> {
        let Params {
            kubeconfig_path,
            cache_refresh_duration,
        } = &self.params;
        if cache_refresh_duration.is_zero() {
            return Err(Error::Configuration(
                "cache refresh duration must be positive".to_string(),
            ));
        }
        let params = CacheParams {
            refresh: *cache_refresh_duration,
            sync_timeout: self.sync_timeout,
        };
        let path = env.kubeconfig.as_deref().unwrap_or(kubeconfig_path);

        let mut clusters = self.registry.lock().await;
        let local = clusters
            .get_or_create(path, params, self.factory.from_path(path))
            .instrument(info_span!("local", cluster = %path))
            .await?;

        discovery::discover_remote(&local.client, &self.factory, &mut clusters, params).await?;

        let handler = Handler::new(clusters.caches());
        info!(clusters = handler.cluster_count(), "Installed caches");
        Ok(handler)
    }
}
