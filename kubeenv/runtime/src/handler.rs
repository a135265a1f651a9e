use kubeenv_core::{
    derive_key, Attributes, GenerateAttributes, LookupPod, PodAttributes, PodSnapshot, Request,
    Workload,
};
use kubeenv_k8s_index::WatchCache;
use std::sync::Arc;
use tracing::{debug, trace};

/// Resolves requests against the caches of one or more clusters.
///
/// Caches are consulted in order; the first cache that knows a pod wins.
#[derive(Debug)]
pub struct Handler<L = WatchCache> {
    caches: Vec<Arc<L>>,
}

// === impl Handler ===

impl<L> Handler<L> {
    pub fn new(caches: Vec<Arc<L>>) -> Self {
        Self { caches }
    }

    pub fn cluster_count(&self) -> usize {
        self.caches.len()
    }

    /// Releases the handler. Caches are owned by the registry and keep running.
    pub fn close(self) {
        debug!(clusters = self.caches.len(), "Closing handler");
    }
}

impl<L: LookupPod> Handler<L> {
    fn find_pod(&self, id: &str) -> Option<Arc<PodSnapshot>> {
        let key = derive_key(id);
        let pod = self.caches.iter().find_map(|c| c.lookup(&key));
        if pod.is_none() {
            trace!(%id, %key, "Pod not found");
        }
        pod
    }

    fn resolve_workload(&self, pod: &PodSnapshot) -> Option<Workload> {
        self.caches.iter().find_map(|c| c.resolve_workload(pod))
    }

    fn describe(&self, pod: &PodSnapshot) -> PodAttributes {
        let mut attrs = PodAttributes::from_pod(pod);
        if let Some(workload) = self.resolve_workload(pod) {
            attrs.set_workload(&workload);
        }
        attrs
    }
}

impl<L: LookupPod> GenerateAttributes for Handler<L> {
    fn generate(&self, request: &Request) -> Attributes {
        let mut attrs = Attributes::default();

        if let Some(pod) = request.destination_id().and_then(|id| self.find_pod(&id)) {
            attrs.destination = self.describe(&pod);
            attrs.destination_container_name = pod
                .container_for_port(request.destination_port)
                .map(str::to_string);
        }

        if let Some(pod) = request.source_id().and_then(|id| self.find_pod(&id)) {
            attrs.source = self.describe(&pod);
        }

        attrs
    }
}

impl<L> Clone for Handler<L> {
    fn clone(&self) -> Self {
        Self {
            caches: self.caches.clone(),
        }
    }
}
