use crate::Error;
use kubeenv_k8s_api::ClusterClient;
use kubeenv_k8s_index::WatchCache;
use parking_lot::RwLock;
use std::{collections::HashMap, future::Future, sync::Arc, time::Duration};
use tokio::{sync::Mutex, time};
use tracing::{debug, info, info_span, warn, Instrument};

/// The watch caches shared by all handlers, by cluster identity.
///
/// A cache is created at most once per identity and lives as long as the registry. Dropping the
/// registry drops its caches, which stops their watches.
#[derive(Debug)]
pub struct ClusterRegistry<C = kube::Client> {
    clusters: Mutex<Clusters<C>>,

    /// Registered caches, readable without waiting on an in-progress build.
    published: RwLock<Vec<Arc<WatchCache>>>,
}

/// Exclusive access to a [`ClusterRegistry`].
pub struct Registration<'r, C> {
    clusters: tokio::sync::MutexGuard<'r, Clusters<C>>,
    published: &'r RwLock<Vec<Arc<WatchCache>>>,
}

/// A cluster's cache and the client it watches with.
#[derive(Clone, Debug)]
pub struct Registered<C> {
    pub cache: Arc<WatchCache>,
    pub client: C,
    pub created: bool,
}

/// Tunes how new caches are started.
#[derive(Copy, Clone, Debug)]
pub struct CacheParams {
    pub refresh: Duration,

    /// Bounds the wait for a new cache to sync. When unset, the wait is unbounded.
    pub sync_timeout: Option<Duration>,
}

#[derive(Debug)]
struct Clusters<C> {
    order: Vec<String>,
    by_id: HashMap<String, Cluster<C>>,
}

#[derive(Debug)]
struct Cluster<C> {
    cache: Arc<WatchCache>,
    client: C,
}

// === impl ClusterRegistry ===

impl<C> Default for ClusterRegistry<C> {
    fn default() -> Self {
        Self {
            clusters: Mutex::new(Clusters {
                order: Vec::new(),
                by_id: HashMap::new(),
            }),
            published: RwLock::new(Vec::new()),
        }
    }
}

impl<C: ClusterClient> ClusterRegistry<C> {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Waits for exclusive access to the registry.
    pub async fn lock(&self) -> Registration<'_, C> {
        Registration {
            clusters: self.clusters.lock().await,
            published: &self.published,
        }
    }

    /// Returns all registered caches in registration order.
    pub fn caches(&self) -> Vec<Arc<WatchCache>> {
        self.published.read().clone()
    }

    pub fn len(&self) -> usize {
        self.published.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// === impl Registration ===

impl<C: ClusterClient> Registration<'_, C> {
    /// Returns the cache registered for `id`, creating it if necessary.
    ///
    /// A new cache is only registered once it has synced. `connect` is not polled when the
    /// cache already exists.
    pub async fn get_or_create(
        &mut self,
        id: &str,
        params: CacheParams,
        connect: impl Future<Output = anyhow::Result<C>> + Send,
    ) -> Result<Registered<C>, Error> {
        if let Some(Cluster { cache, client }) = self.clusters.by_id.get(id) {
            debug!(cluster = %id, "Reusing cache");
            return Ok(Registered {
                cache: cache.clone(),
                client: client.clone(),
                created: false,
            });
        }

        let client = connect.await.map_err(|source| Error::ClientConstruction {
            cluster: id.to_string(),
            source,
        })?;
        let cache = WatchCache::spawn(id, &client, params.refresh).map_err(|source| {
            Error::ControllerConstruction {
                cluster: id.to_string(),
                source,
            }
        })?;

        let synced = async {
            match params.sync_timeout {
                Some(timeout) => matches!(time::timeout(timeout, cache.wait_synced()).await, Ok(Ok(()))),
                None => cache.wait_synced().await.is_ok(),
            }
        };
        if !synced.instrument(info_span!("sync", cluster = %id)).await {
            warn!(cluster = %id, "Cache failed to sync");
            cache.stop();
            return Err(Error::CacheSync {
                cluster: id.to_string(),
            });
        }
        info!(cluster = %id, "Cache synced");

        let cache = Arc::new(cache);
        self.clusters.order.push(id.to_string());
        self.clusters.by_id.insert(
            id.to_string(),
            Cluster {
                cache: cache.clone(),
                client: client.clone(),
            },
        );
        self.published.write().push(cache.clone());

        Ok(Registered {
            cache,
            client,
            created: true,
        })
    }

    /// Returns all registered caches in registration order.
    pub fn caches(&self) -> Vec<Arc<WatchCache>> {
        self.clusters
            .order
            .iter()
            .filter_map(|id| self.clusters.by_id.get(id))
            .map(|c| c.cache.clone())
            .collect()
    }
}
