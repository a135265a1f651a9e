use crate::{Job, Pod, ReplicaSet, Secret};
use futures::prelude::*;
use kube::{
    api::{Api, ListParams},
    runtime::{watcher, WatchStreamExt},
    Resource,
};
use serde::de::DeserializeOwned;
use std::{fmt::Debug, pin::Pin};

/// A stream of watch events for a single resource kind.
///
/// Errors are yielded to the consumer; the stream itself backs off before retrying and does not
/// terminate.
pub type EventStream<K> =
    Pin<Box<dyn Stream<Item = watcher::Result<watcher::Event<K>>> + Send + 'static>>;

/// The API capabilities needed from a cluster.
///
/// Each call to a `watch_*` method starts a new watch, beginning with a full listing of the
/// resource. Resource versions are tracked by the watch so that it resumes where it left off
/// after a disconnect.
#[async_trait::async_trait]
pub trait ClusterClient: Clone + Send + Sync + 'static {
    fn watch_pods(&self) -> EventStream<Pod>;

    fn watch_replica_sets(&self) -> EventStream<ReplicaSet>;

    fn watch_jobs(&self) -> EventStream<Job>;

    /// Lists the secrets in `namespace` that match a label selector.
    async fn list_secrets(&self, namespace: &str, selector: &str) -> anyhow::Result<Vec<Secret>>;
}

/// Limits the amount of time a watch can be idle before being reset.
///
/// Must be less than 295 or Kubernetes throws an error.
const WATCH_TIMEOUT_SECS: u32 = 290;

#[async_trait::async_trait]
impl ClusterClient for kube::Client {
    fn watch_pods(&self) -> EventStream<Pod> {
        watch_all(self.clone())
    }

    fn watch_replica_sets(&self) -> EventStream<ReplicaSet> {
        watch_all(self.clone())
    }

    fn watch_jobs(&self) -> EventStream<Job> {
        watch_all(self.clone())
    }

    async fn list_secrets(&self, namespace: &str, selector: &str) -> anyhow::Result<Vec<Secret>> {
        let secrets = Api::<Secret>::namespaced(self.clone(), namespace)
            .list(&ListParams::default().labels(selector))
            .await?;
        Ok(secrets.items)
    }
}

fn watch_all<K>(client: kube::Client) -> EventStream<K>
where
    K: Resource + Clone + Debug + DeserializeOwned + Send + 'static,
    K::DynamicType: Default,
{
    let config = watcher::Config::default().timeout(WATCH_TIMEOUT_SECS);
    watcher(Api::<K>::all(client), config)
        .default_backoff()
        .boxed()
}
