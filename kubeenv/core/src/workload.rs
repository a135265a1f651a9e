//! Resolves the workload that owns a pod.
//!
//! Pods are usually created by an intermediate controller (e.g. a `ReplicaSet`) that is itself
//! owned by the object users actually deploy (e.g. a `Deployment`). Resolution follows controller
//! references upward through whatever owner objects the caller can provide, stopping at the first
//! object whose owner is unknown or unrecognized.

use crate::{OwnerRef, PodSnapshot};

/// Owner kinds that are considered workloads.
pub const WORKLOAD_KINDS: &[&str] = &[
    "CronJob",
    "DaemonSet",
    "Deployment",
    "DeploymentConfig",
    "Job",
    "ReplicaSet",
    "ReplicationController",
    "StatefulSet",
];

/// Bounds the owner walk so that a malformed reference cycle can't spin.
const MAX_DEPTH: usize = 8;

/// The entity that owns a pod.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Workload {
    pub uid: String,
    pub name: String,
    pub namespace: String,

    /// Locates the owning object in the Kubernetes API, when its API version is known.
    pub owner: Option<String>,
}

/// Resolves the top-level workload for `pod`.
///
/// `owner_refs` returns the owner references of a (kind, name) object in the pod's namespace, if
/// that object is known. Returns `None` when the pod is not managed by a recognized workload kind.
pub fn resolve<'o, F>(pod: &PodSnapshot, mut owner_refs: F) -> Option<Workload>
where
    F: FnMut(&str, &str) -> Option<&'o [OwnerRef]>,
{
    let mut owner = pod.controller().filter(|o| is_workload_kind(&o.kind))?.clone();

    for _ in 0..MAX_DEPTH {
        let parent = match owner_refs(&owner.kind, &owner.name).and_then(OwnerRef::controller_of) {
            Some(parent) if is_workload_kind(&parent.kind) => parent.clone(),
            _ => break,
        };
        owner = parent;
    }

    Some(Workload::new(&owner, &pod.namespace))
}

#[inline]
pub fn is_workload_kind(kind: &str) -> bool {
    WORKLOAD_KINDS.contains(&kind)
}

// === impl Workload ===

impl Workload {
    fn new(owner: &OwnerRef, namespace: &str) -> Self {
        let locator = (!owner.api_version.is_empty()).then(|| {
            format!(
                "kubernetes://apis/{}/namespaces/{}/{}s/{}",
                owner.api_version,
                namespace,
                owner.kind.to_ascii_lowercase(),
                owner.name,
            )
        });
        Self {
            uid: format!("istio://{}/workloads/{}", namespace, owner.name),
            name: owner.name.clone(),
            namespace: namespace.to_string(),
            owner: locator,
        }
    }
}
