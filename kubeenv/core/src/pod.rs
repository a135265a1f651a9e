use std::{collections::BTreeMap, net::IpAddr};

/// The parts of a pod that attributes are generated from.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PodSnapshot {
    pub name: String,
    pub namespace: String,
    pub labels: BTreeMap<String, String>,
    pub service_account: Option<String>,

    /// The pod's primary IP.
    pub pod_ip: Option<IpAddr>,

    /// All of the pod's IPs, including `pod_ip`. Dual-stack pods have one per family.
    pub pod_ips: Vec<IpAddr>,

    pub host_ip: Option<IpAddr>,

    /// Pods on the host network share the node's address, so they can't be found by IP.
    pub host_network: bool,

    /// Set once the pod has succeeded or failed. A terminated pod's address may be reused.
    pub terminated: bool,

    pub container_ports: Vec<ContainerPort>,
    pub owner_references: Vec<OwnerRef>,
}

/// A port declared by one of a pod's containers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContainerPort {
    pub container: String,
    pub port: i32,
}

/// A reference from an object to the object that manages it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OwnerRef {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    pub controller: bool,
}

// === impl PodSnapshot ===

impl PodSnapshot {
    /// Returns the name of the container that declares `port`.
    ///
    /// Ports that are not positive never match.
    pub fn container_for_port(&self, port: i64) -> Option<&str> {
        if port <= 0 {
            return None;
        }
        self.container_ports
            .iter()
            .find(|cp| i64::from(cp.port) == port)
            .map(|cp| cp.container.as_str())
    }

    /// Addresses this pod may be looked up by.
    pub fn indexed_ips(&self) -> impl Iterator<Item = IpAddr> + '_ {
        let eligible = !self.host_network && !self.terminated;
        self.pod_ip
            .iter()
            .chain(self.pod_ips.iter().filter(|ip| Some(**ip) != self.pod_ip))
            .copied()
            .filter(move |_| eligible)
    }

    /// Returns the owner reference that manages this pod.
    #[inline]
    pub fn controller(&self) -> Option<&OwnerRef> {
        OwnerRef::controller_of(&self.owner_references)
    }
}

// === impl OwnerRef ===

impl OwnerRef {
    /// Selects the managing reference from a list: the one flagged as the controller or, failing
    /// that, the first.
    pub fn controller_of(refs: &[OwnerRef]) -> Option<&OwnerRef> {
        refs.iter().find(|r| r.controller).or_else(|| refs.first())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mk_pod(ports: &[(&str, i32)]) -> PodSnapshot {
        PodSnapshot {
            name: "pod-0".to_string(),
            namespace: "ns-0".to_string(),
            container_ports: ports
                .iter()
                .map(|(container, port)| ContainerPort {
                    container: container.to_string(),
                    port: *port,
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn non_positive_ports_never_match() {
        let pod = mk_pod(&[("zero", 0), ("app", 8080)]);
        assert_eq!(pod.container_for_port(0), None);
        assert_eq!(pod.container_for_port(-8080), None);
    }

    #[test]
    fn matches_declared_port() {
        let pod = mk_pod(&[("app", 8080), ("admin", 9990)]);
        assert_eq!(pod.container_for_port(8080), Some("app"));
        assert_eq!(pod.container_for_port(9990), Some("admin"));
        assert_eq!(pod.container_for_port(80), None);
    }

    #[test]
    fn first_container_wins() {
        let pod = mk_pod(&[("app", 8080), ("sidecar", 8080)]);
        assert_eq!(pod.container_for_port(8080), Some("app"));
    }

    #[test]
    fn indexed_ips() {
        let mut pod = PodSnapshot {
            pod_ip: Some("10.1.2.3".parse().unwrap()),
            pod_ips: vec!["10.1.2.3".parse().unwrap(), "fd00::3".parse().unwrap()],
            ..Default::default()
        };
        assert_eq!(
            pod.indexed_ips().collect::<Vec<_>>(),
            vec![
                "10.1.2.3".parse::<IpAddr>().unwrap(),
                "fd00::3".parse().unwrap()
            ]
        );

        pod.host_network = true;
        assert_eq!(pod.indexed_ips().count(), 0);

        pod.host_network = false;
        pod.terminated = true;
        assert_eq!(pod.indexed_ips().count(), 0);
    }

    #[test]
    fn controller_reference() {
        let rs = OwnerRef {
            kind: "ReplicaSet".to_string(),
            name: "rs-0".to_string(),
            controller: true,
            ..Default::default()
        };
        let other = OwnerRef {
            kind: "Other".to_string(),
            name: "other".to_string(),
            ..Default::default()
        };
        assert_eq!(
            OwnerRef::controller_of(&[other.clone(), rs.clone()]),
            Some(&rs)
        );
        assert_eq!(OwnerRef::controller_of(&[other.clone()]), Some(&other));
        assert_eq!(OwnerRef::controller_of(&[]), None);
    }
}
