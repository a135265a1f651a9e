/// Errors that fail a handler build.
///
/// None of these are retried; the caller decides whether to build again.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("could not build client for cluster {cluster:?}: {source}")]
    ClientConstruction {
        cluster: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("could not start watches for cluster {cluster:?}: {source}")]
    ControllerConstruction {
        cluster: String,
        #[source]
        source: tokio::runtime::TryCurrentError,
    },

    #[error("cache sync failure for cluster {cluster:?}")]
    CacheSync { cluster: String },

    #[error("failure on creating remote caches: {0}")]
    SecretDiscovery(#[source] anyhow::Error),
}
