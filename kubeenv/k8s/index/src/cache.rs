use crate::{reflector::Reflector, Index, SharedIndex, State};
use kube::Resource;
use kubeenv_core::{LookupPod, PodSnapshot, Workload};
use kubeenv_k8s_api::{ClusterClient, EventStream};
use kubert::index::IndexNamespacedResource;
use std::{sync::Arc, time::Duration};
use tokio::{runtime::Handle, sync::watch};
use tracing::{info_span, Instrument};

/// A continuously updated view of the pods and pod owners in one cluster.
///
/// Each resource kind is watched by a background task. The tasks run until [`WatchCache::stop`]
/// is called or the cache is dropped.
#[derive(Debug)]
pub struct WatchCache {
    cluster: String,
    index: SharedIndex,
    pods: Watch,
    replica_sets: Watch,
    jobs: Watch,
    stop: watch::Sender<bool>,
}

/// Indicates that a cache stopped before all of its watches synced.
#[derive(Debug, thiserror::Error)]
#[error("watches for cluster {cluster} stopped before syncing")]
pub struct Stopped {
    pub cluster: String,
}

#[derive(Debug)]
struct Watch {
    state: watch::Receiver<State>,
    synced: watch::Receiver<bool>,
}

// === impl WatchCache ===

impl WatchCache {
    /// Starts watching a cluster's pods, replica sets, and jobs.
    ///
    /// Fails if called outside of a Tokio runtime.
    pub fn spawn<C: ClusterClient>(
        cluster: impl Into<String>,
        client: &C,
        refresh: Duration,
    ) -> Result<Self, tokio::runtime::TryCurrentError> {
        let rt = Handle::try_current()?;
        let cluster = cluster.into();
        let index = Index::shared();
        let (stop, stop_rx) = watch::channel(false);

        let pods = {
            let client = client.clone();
            Self::spawn_watch(
                &rt,
                info_span!("watch", cluster = %cluster, kind = "pods"),
                index.clone(),
                refresh,
                move || client.watch_pods(),
                stop_rx.clone(),
            )
        };
        let replica_sets = {
            let client = client.clone();
            Self::spawn_watch(
                &rt,
                info_span!("watch", cluster = %cluster, kind = "replicasets"),
                index.clone(),
                refresh,
                move || client.watch_replica_sets(),
                stop_rx.clone(),
            )
        };
        let jobs = {
            let client = client.clone();
            Self::spawn_watch(
                &rt,
                info_span!("watch", cluster = %cluster, kind = "jobs"),
                index.clone(),
                refresh,
                move || client.watch_jobs(),
                stop_rx,
            )
        };

        Ok(Self {
            cluster,
            index,
            pods,
            replica_sets,
            jobs,
            stop,
        })
    }

    fn spawn_watch<K>(
        rt: &Handle,
        span: tracing::Span,
        index: SharedIndex,
        refresh: Duration,
        connect: impl FnMut() -> EventStream<K> + Send + 'static,
        stop: watch::Receiver<bool>,
    ) -> Watch
    where
        K: Resource + Send + 'static,
        Index: IndexNamespacedResource<K>,
    {
        let (reflector, state, synced) = Reflector::new(index, refresh);
        rt.spawn(reflector.run(connect, stop).instrument(span));
        Watch { state, synced }
    }

    pub fn cluster(&self) -> &str {
        &self.cluster
    }

    pub fn index(&self) -> &SharedIndex {
        &self.index
    }

    /// Returns the state of the pod watch.
    pub fn state(&self) -> State {
        *self.pods.state.borrow()
    }

    /// Indicates whether every watch has completed its initial listing.
    pub fn synced(&self) -> bool {
        self.watches().all(|w| *w.synced.borrow())
    }

    /// Waits for every watch to complete its initial listing.
    pub async fn wait_synced(&self) -> Result<(), Stopped> {
        for w in self.watches() {
            let mut synced = w.synced.clone();
            if synced.wait_for(|synced| *synced).await.is_err() {
                return Err(Stopped {
                    cluster: self.cluster.clone(),
                });
            }
        }
        Ok(())
    }

    /// Stops all watches. The index retains its contents.
    pub fn stop(&self) {
        self.stop.send_replace(true);
    }

    fn watches(&self) -> impl Iterator<Item = &Watch> {
        [&self.pods, &self.replica_sets, &self.jobs].into_iter()
    }
}

impl LookupPod for WatchCache {
    fn lookup(&self, key: &str) -> Option<Arc<PodSnapshot>> {
        self.index.read().lookup(key)
    }

    fn resolve_workload(&self, pod: &PodSnapshot) -> Option<Workload> {
        self.index.read().resolve_workload(pod)
    }
}
