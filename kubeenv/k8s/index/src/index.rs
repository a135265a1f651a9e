//! An index of the pods and owner objects known to a single cluster.
//!
//! Pods are indexed by `namespace/name` and by address. The workload that owns each pod is
//! resolved when the pod is applied and again whenever one of the owner objects in its namespace
//! changes, so lookups never have to walk owner references.

use ahash::AHashMap as HashMap;
use kubeenv_core::{pod_key, workload, OwnerRef, PodSnapshot, Workload};
use kubeenv_k8s_api::{self as k8s, ResourceExt};
use parking_lot::RwLock;
use std::{net::IpAddr, sync::Arc};
use tracing::{debug, warn};

pub type SharedIndex = Arc<RwLock<Index>>;

#[derive(Debug, Default)]
pub struct Index {
    /// Pods by namespace and name.
    pods: HashMap<String, HashMap<String, PodEntry>>,

    /// Maps each indexed address to the key of the pod that currently holds it.
    by_ip: HashMap<IpAddr, String>,

    /// The owner references of known owner objects, by namespace, kind, and name.
    owners: HashMap<String, HashMap<&'static str, HashMap<String, Vec<OwnerRef>>>>,
}

#[derive(Debug)]
struct PodEntry {
    pod: Arc<PodSnapshot>,
    workload: Option<Workload>,
}

const REPLICA_SET: &str = "ReplicaSet";
const JOB: &str = "Job";

// === impl Index ===

impl Index {
    pub fn shared() -> SharedIndex {
        Arc::new(RwLock::new(Self::default()))
    }

    /// Returns the number of indexed pods.
    pub fn pods_len(&self) -> usize {
        self.pods.values().map(|pods| pods.len()).sum()
    }

    /// Returns the number of indexed owner objects.
    pub fn owners_len(&self) -> usize {
        self.owners
            .values()
            .flat_map(|kinds| kinds.values())
            .map(|owners| owners.len())
            .sum()
    }

    /// Finds a pod by address or by `namespace/name`.
    pub fn lookup(&self, key: &str) -> Option<Arc<PodSnapshot>> {
        if let Ok(ip) = key.parse::<IpAddr>() {
            let key = self.by_ip.get(&ip)?;
            return self.entry(key).map(|e| e.pod.clone());
        }
        self.entry(key).map(|e| e.pod.clone())
    }

    /// Returns the workload that owns `pod`.
    ///
    /// Pods that were obtained from this index use the workload resolved when they were indexed.
    pub fn resolve_workload(&self, pod: &PodSnapshot) -> Option<Workload> {
        if let Some(entry) = self.pods.get(&pod.namespace).and_then(|pods| pods.get(&pod.name)) {
            if std::ptr::eq(Arc::as_ptr(&entry.pod), pod) {
                return entry.workload.clone();
            }
        }
        self.resolve(pod)
    }

    pub(crate) fn apply_pod(&mut self, pod: PodSnapshot) {
        let key = pod_key(&pod.namespace, &pod.name);
        let workload = self.resolve(&pod);
        let pod = Arc::new(pod);
        let prior = self
            .pods
            .entry(pod.namespace.clone())
            .or_default()
            .insert(pod.name.clone(), PodEntry {
                pod: pod.clone(),
                workload,
            });
        if let Some(prior) = prior {
            self.unindex_ips(&key, &prior.pod);
        }

        for ip in pod.indexed_ips() {
            if let Some(prev) = self.by_ip.insert(ip, key.clone()) {
                if prev != key {
                    debug!(%ip, pod = %key, previous = %prev, "Address reassigned");
                }
            }
        }
    }

    pub(crate) fn delete_pod(&mut self, namespace: &str, name: &str) {
        let Some(pods) = self.pods.get_mut(namespace) else {
            return;
        };
        let Some(entry) = pods.remove(name) else {
            return;
        };
        if pods.is_empty() {
            self.pods.remove(namespace);
        }
        self.unindex_ips(&pod_key(namespace, name), &entry.pod);
    }

    /// Removes the addresses of a pod's prior version, unless they now belong to another pod.
    fn unindex_ips(&mut self, key: &str, pod: &PodSnapshot) {
        for ip in pod.indexed_ips() {
            if self.by_ip.get(&ip).map(String::as_str) == Some(key) {
                self.by_ip.remove(&ip);
            }
        }
    }

    fn apply_owner(&mut self, kind: &'static str, namespace: String, name: String, refs: Vec<OwnerRef>) {
        let owners = self
            .owners
            .entry(namespace.clone())
            .or_default()
            .entry(kind)
            .or_default();
        if owners.get(&name) == Some(&refs) {
            return;
        }
        owners.insert(name, refs);
        self.reresolve(&namespace);
    }

    fn delete_owner(&mut self, kind: &'static str, namespace: &str, name: &str) {
        let Some(kinds) = self.owners.get_mut(namespace) else {
            return;
        };
        let removed = kinds
            .get_mut(kind)
            .and_then(|owners| owners.remove(name))
            .is_some();
        kinds.retain(|_, owners| !owners.is_empty());
        if kinds.is_empty() {
            self.owners.remove(namespace);
        }
        if removed {
            self.reresolve(namespace);
        }
    }

    /// Re-resolves the workloads of all pods in a namespace.
    fn reresolve(&mut self, namespace: &str) {
        let Some(mut pods) = self.pods.remove(namespace) else {
            return;
        };
        for entry in pods.values_mut() {
            entry.workload = self.resolve(&entry.pod);
        }
        self.pods.insert(namespace.to_string(), pods);
    }

    fn resolve(&self, pod: &PodSnapshot) -> Option<Workload> {
        let owners = self.owners.get(&pod.namespace);
        workload::resolve(pod, |kind, name| {
            owners?.get(kind)?.get(name).map(Vec::as_slice)
        })
    }

    fn entry(&self, key: &str) -> Option<&PodEntry> {
        let (namespace, name) = key.split_once('/')?;
        self.pods.get(namespace)?.get(name)
    }
}

impl kubert::index::IndexNamespacedResource<k8s::ReplicaSet> for Index {
    fn apply(&mut self, rs: k8s::ReplicaSet) {
        let refs = crate::pod::owner_refs(&rs.metadata);
        let Some(namespace) = rs.namespace() else {
            warn!(name = %rs.name_any(), "Ignoring ReplicaSet without a namespace");
            return;
        };
        self.apply_owner(REPLICA_SET, namespace, rs.name_any(), refs);
    }

    fn delete(&mut self, namespace: String, name: String) {
        self.delete_owner(REPLICA_SET, &namespace, &name);
    }
}

impl kubert::index::IndexNamespacedResource<k8s::Job> for Index {
    fn apply(&mut self, job: k8s::Job) {
        let refs = crate::pod::owner_refs(&job.metadata);
        let Some(namespace) = job.namespace() else {
            warn!(name = %job.name_any(), "Ignoring Job without a namespace");
            return;
        };
        self.apply_owner(JOB, namespace, job.name_any(), refs);
    }

    fn delete(&mut self, namespace: String, name: String) {
        self.delete_owner(JOB, &namespace, &name);
    }
}
