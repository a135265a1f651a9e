use crate::ClusterRegistry;
use kubeenv_k8s_api::ClusterClient;
use prometheus_client::{
    collector::Collector,
    encoding::{DescriptorEncoder, EncodeMetric},
    metrics::{gauge::ConstGauge, MetricType},
    registry::Registry,
};
use std::sync::Arc;

struct Instrumented<C>(Arc<ClusterRegistry<C>>);

pub fn register<C: ClusterClient>(reg: &mut Registry, registry: Arc<ClusterRegistry<C>>) {
    reg.register_collector(Box::new(Instrumented(registry)));
}

impl<C> std::fmt::Debug for Instrumented<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instrumented").finish_non_exhaustive()
    }
}

impl<C: ClusterClient> Collector for Instrumented<C> {
    fn encode(&self, mut encoder: DescriptorEncoder<'_>) -> Result<(), std::fmt::Error> {
        let caches = self.0.caches();

        let registered = ConstGauge::new(caches.len() as u32);
        let registered_encoder = encoder.encode_descriptor(
            "registered",
            "The number of clusters with a registered cache",
            None,
            MetricType::Gauge,
        )?;
        registered.encode(registered_encoder)?;

        let mut pods_encoder = encoder.encode_descriptor(
            "pods",
            "The number of pods in a cluster's cache",
            None,
            MetricType::Gauge,
        )?;
        for cache in &caches {
            let labels = [("cluster", cache.cluster())];
            let pods = ConstGauge::new(cache.index().read().pods_len() as u32);
            pods.encode(pods_encoder.encode_family(&labels)?)?;
        }

        let mut owners_encoder = encoder.encode_descriptor(
            "owners",
            "The number of pod owners in a cluster's cache",
            None,
            MetricType::Gauge,
        )?;
        for cache in &caches {
            let labels = [("cluster", cache.cluster())];
            let owners = ConstGauge::new(cache.index().read().owners_len() as u32);
            owners.encode(owners_encoder.encode_family(&labels)?)?;
        }

        let mut synced_encoder = encoder.encode_descriptor(
            "synced",
            "Whether all of a cluster's watches have synced",
            None,
            MetricType::Gauge,
        )?;
        for cache in &caches {
            let labels = [("cluster", cache.cluster())];
            let synced = ConstGauge::new(u32::from(cache.synced()));
            synced.encode(synced_encoder.encode_family(&labels)?)?;
        }

        Ok(())
    }
}
