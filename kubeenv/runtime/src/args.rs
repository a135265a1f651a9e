use crate::{metrics, Builder, ClusterRegistry, Env, KubeClientFactory};
use anyhow::{bail, Result};
use clap::Parser;
use kubeenv_core::{duration::GoDuration, BuildHandler, Params};
use prometheus_client::registry::Registry;
use tracing::info;

#[derive(Debug, Parser)]
#[clap(
    name = "kubeenv",
    about = "Resolves pod identities to Kubernetes workload attributes"
)]
pub struct Args {
    #[clap(long, default_value = "kubeenv=info,warn", env = "KUBEENV_LOG")]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain")]
    log_format: kubert::LogFormat,

    #[clap(flatten)]
    client: kubert::ClientArgs,

    #[clap(flatten)]
    admin: kubert::AdminArgs,

    /// Path to a kubeconfig for the local cluster. `KUBECONFIG` takes precedence. When neither
    /// is set, the client configured by the client arguments is used.
    #[clap(long, default_value = "")]
    kubeconfig_path: String,

    /// How often caches fully relist their resources.
    #[clap(long, default_value = "5m")]
    cache_refresh_duration: GoDuration,

    /// Fails startup if a cluster's cache doesn't sync in time.
    #[clap(long)]
    cache_sync_timeout: Option<GoDuration>,
}

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            log_level,
            log_format,
            client,
            admin,
            kubeconfig_path,
            cache_refresh_duration: GoDuration(cache_refresh_duration),
            cache_sync_timeout,
        } = self;

        let clusters = ClusterRegistry::<kube::Client>::shared();

        let mut prom = <Registry>::default();
        metrics::register(
            prom.sub_registry_with_prefix("cluster_cache"),
            clusters.clone(),
        );
        let rt_metrics = kubert::RuntimeMetrics::register(prom.sub_registry_with_prefix("kube"));

        let runtime = kubert::Runtime::builder()
            .with_log(log_level, log_format)
            .with_metrics(rt_metrics)
            .with_admin(admin.into_builder().with_prometheus(prom))
            .with_client(client)
            .build()
            .await?;

        let mut builder = Builder::new(clusters, KubeClientFactory::new(runtime.client()))
            .with_sync_timeout(cache_sync_timeout.map(Into::into));
        builder.set_config(Params {
            kubeconfig_path,
            cache_refresh_duration,
        });
        let handler = builder.build(&Env::from_process()?).await?;
        info!(clusters = handler.cluster_count(), "Ready");

        // Block the main thread on the shutdown signal. The caches keep running until the
        // registry is dropped.
        if runtime.run().await.is_err() {
            bail!("Aborted");
        }
        handler.close();

        Ok(())
    }
}
