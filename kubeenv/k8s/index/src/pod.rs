use crate::Index;
use kubeenv_core::{ContainerPort, OwnerRef, PodSnapshot};
use kubeenv_k8s_api::{self as k8s, ResourceExt};
use std::net::IpAddr;
use tracing::{debug, warn};

impl kubert::index::IndexNamespacedResource<k8s::Pod> for Index {
    fn apply(&mut self, pod: k8s::Pod) {
        if pod.namespace().is_none() {
            warn!(name = %pod.name_any(), "Ignoring pod without a namespace");
            return;
        }
        self.apply_pod(snapshot(pod));
    }

    fn delete(&mut self, namespace: String, name: String) {
        self.delete_pod(&namespace, &name);
    }
}

/// Projects the parts of a pod that attributes are generated from.
pub(crate) fn snapshot(pod: k8s::Pod) -> PodSnapshot {
    let spec = pod.spec.unwrap_or_default();
    let status = pod.status.unwrap_or_default();

    let pod_ip = parse_ip(status.pod_ip.as_deref());
    let pod_ips = status
        .pod_ips
        .iter()
        .flatten()
        .filter_map(|ip| parse_ip(Some(ip.ip.as_str())))
        .collect();
    let terminated = matches!(status.phase.as_deref(), Some("Succeeded" | "Failed"));

    let container_ports = spec
        .containers
        .into_iter()
        .flat_map(|c| {
            let name = c.name;
            c.ports
                .into_iter()
                .flatten()
                .map(move |p| ContainerPort {
                    container: name.clone(),
                    port: p.container_port,
                })
        })
        .collect();

    PodSnapshot {
        owner_references: owner_refs(&pod.metadata),
        name: pod.metadata.name.unwrap_or_default(),
        namespace: pod.metadata.namespace.unwrap_or_default(),
        labels: pod.metadata.labels.unwrap_or_default(),
        service_account: spec.service_account_name,
        pod_ip,
        pod_ips,
        host_ip: parse_ip(status.host_ip.as_deref()),
        host_network: spec.host_network.unwrap_or(false),
        terminated,
        container_ports,
    }
}

pub(crate) fn owner_refs(meta: &k8s::ObjectMeta) -> Vec<OwnerRef> {
    meta.owner_references
        .iter()
        .flatten()
        .map(|o| OwnerRef {
            api_version: o.api_version.clone(),
            kind: o.kind.clone(),
            name: o.name.clone(),
            controller: o.controller.unwrap_or(false),
        })
        .collect()
}

fn parse_ip(ip: Option<&str>) -> Option<IpAddr> {
    let ip = ip.filter(|ip| !ip.is_empty())?;
    match ip.parse() {
        Ok(ip) => Some(ip),
        Err(error) => {
            debug!(%error, %ip, "Invalid pod address");
            None
        }
    }
}
