//! Discovers remote clusters from multi-cluster secrets.
//!
//! Each data entry of a secret labeled `istio/multiCluster=true` in the `istio-system` namespace
//! holds a kubeconfig for a remote cluster. The entry's key identifies the cluster.

use crate::{
    registry::{CacheParams, Registration},
    ClientFactory, Error,
};
use kubeenv_k8s_api::{ClusterClient, ResourceExt};
use tracing::{debug, info, instrument};

pub const NAMESPACE: &str = "istio-system";
pub const SELECTOR: &str = "istio/multiCluster=true";

/// Registers a cache for every remote cluster listed in multi-cluster secrets.
///
/// Stops at the first failure. Clusters registered before the failure remain registered.
#[instrument(skip_all)]
pub(crate) async fn discover_remote<F: ClientFactory>(
    local: &F::Client,
    factory: &F,
    clusters: &mut Registration<'_, F::Client>,
    params: CacheParams,
) -> Result<usize, Error> {
    let secrets = local
        .list_secrets(NAMESPACE, SELECTOR)
        .await
        .map_err(|error| {
            Error::SecretDiscovery(error.context(format!(
                "could not access secrets for namespace {NAMESPACE}"
            )))
        })?;
    debug!(secrets = secrets.len(), "Listed multi-cluster secrets");

    let mut discovered = 0;
    for secret in secrets {
        let secret_name = secret.name_any();
        for (id, kubeconfig) in secret.data.into_iter().flatten() {
            let client = factory
                .from_kubeconfig(&kubeconfig.0)
                .await
                .map_err(|source| {
                    Error::SecretDiscovery(
                        Error::ClientConstruction {
                            cluster: id.clone(),
                            source: source.context(format!("secret {secret_name}")),
                        }
                        .into(),
                    )
                })?;
            let registered = clusters
                .get_or_create(&id, params, async move { Ok(client) })
                .await
                .map_err(|error| Error::SecretDiscovery(error.into()))?;
            if registered.created {
                info!(cluster = %id, secret = %secret_name, "Discovered remote cluster");
            }
            discovered += 1;
        }
    }

    Ok(discovered)
}
