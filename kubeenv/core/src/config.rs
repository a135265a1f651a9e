use serde::Deserialize;
use std::time::Duration;

/// How often watch caches fully relist their resources.
pub const DEFAULT_REFRESH_DURATION: Duration = Duration::from_secs(5 * 60);

/// Handler configuration.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Params {
    /// Path to the kubeconfig for the local cluster. When empty, the default client configuration
    /// (e.g. in-cluster credentials) is used.
    pub kubeconfig_path: String,

    #[serde(deserialize_with = "crate::duration::deserialize")]
    pub cache_refresh_duration: Duration,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            kubeconfig_path: String::new(),
            cache_refresh_duration: DEFAULT_REFRESH_DURATION,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes() {
        let params = serde_json::from_value::<Params>(serde_json::json!({
            "kubeconfigPath": "/etc/kube/config",
            "cacheRefreshDuration": "1m30s",
        }))
        .unwrap();
        assert_eq!(
            params,
            Params {
                kubeconfig_path: "/etc/kube/config".to_string(),
                cache_refresh_duration: Duration::from_secs(90),
            }
        );
    }

    #[test]
    fn defaults() {
        let params = serde_json::from_value::<Params>(serde_json::json!({})).unwrap();
        assert_eq!(params, Params::default());
        assert_eq!(params.cache_refresh_duration, Duration::from_secs(300));
    }

    #[test]
    fn rejects_oversized_refresh() {
        let err = serde_json::from_value::<Params>(serde_json::json!({
            "cacheRefreshDuration": "5000000000000000h5000000000000000h",
        }))
        .unwrap_err();
        assert!(err.to_string().contains("too large"), "{err}");
    }
}
