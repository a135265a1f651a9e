use crate::{PodSnapshot, Workload};
use serde::{ser::SerializeMap, Serialize, Serializer};
use std::{collections::BTreeMap, net::IpAddr};

/// Identifies the source and destination of a request.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Request {
    pub destination_uid: Option<String>,
    pub destination_ip: Option<IpAddr>,
    pub destination_port: i64,
    pub source_uid: Option<String>,
    pub source_ip: Option<IpAddr>,
}

/// Attributes generated for a request. Fields are unset when nothing was resolved.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Attributes {
    pub destination: PodAttributes,
    pub destination_container_name: Option<String>,
    pub source: PodAttributes,
}

/// Attributes describing one side of a request.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PodAttributes {
    pub labels: Option<BTreeMap<String, String>>,
    pub pod_name: Option<String>,
    pub namespace: Option<String>,
    pub service_account: Option<String>,
    pub pod_ip: Option<IpAddr>,
    pub host_ip: Option<IpAddr>,
    pub workload_uid: Option<String>,
    pub workload_name: Option<String>,
    pub workload_namespace: Option<String>,
    pub owner: Option<String>,
}

/// A single attribute value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Value<'a> {
    String(&'a str),
    Ip(IpAddr),
    Labels(&'a BTreeMap<String, String>),
}

// === impl Request ===

impl Request {
    /// The identifier to look the destination up by, preferring its UID over its address.
    pub fn destination_id(&self) -> Option<String> {
        identity(self.destination_uid.as_deref(), self.destination_ip)
    }

    /// The identifier to look the source up by, preferring its UID over its address.
    pub fn source_id(&self) -> Option<String> {
        identity(self.source_uid.as_deref(), self.source_ip)
    }
}

fn identity(uid: Option<&str>, ip: Option<IpAddr>) -> Option<String> {
    match uid {
        Some(uid) if !uid.is_empty() => Some(uid.to_string()),
        _ => ip.filter(|ip| !ip.is_unspecified()).map(|ip| ip.to_string()),
    }
}

// === impl Attributes ===

impl Attributes {
    /// Enumerates the attributes that are set, by their flattened names (e.g.
    /// `destination_pod_name`).
    pub fn iter(&self) -> impl Iterator<Item = (String, Value<'_>)> + '_ {
        let container = self
            .destination_container_name
            .as_deref()
            .map(|name| ("destination_container_name".to_string(), Value::String(name)));
        self.destination
            .iter("destination")
            .chain(container)
            .chain(self.source.iter("source"))
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }
}

impl Serialize for Attributes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        for (name, value) in self.iter() {
            map.serialize_entry(&name, &value)?;
        }
        map.end()
    }
}

// === impl PodAttributes ===

impl PodAttributes {
    /// Describes a pod. Empty fields are left unset.
    pub fn from_pod(pod: &PodSnapshot) -> Self {
        fn non_empty(s: &str) -> Option<String> {
            (!s.is_empty()).then(|| s.to_string())
        }

        Self {
            labels: (!pod.labels.is_empty()).then(|| pod.labels.clone()),
            pod_name: non_empty(&pod.name),
            namespace: non_empty(&pod.namespace),
            service_account: pod.service_account.as_deref().and_then(non_empty),
            pod_ip: pod.pod_ip,
            host_ip: pod.host_ip,
            ..Default::default()
        }
    }

    pub fn set_workload(&mut self, workload: &Workload) {
        self.workload_uid = Some(workload.uid.clone());
        self.workload_name = Some(workload.name.clone());
        self.workload_namespace = Some(workload.namespace.clone());
        if let Some(owner) = workload.owner.as_ref().filter(|o| !o.is_empty()) {
            self.owner = Some(owner.clone());
        }
    }

    fn iter<'a>(&'a self, side: &'static str) -> impl Iterator<Item = (String, Value<'a>)> + 'a {
        let string = |name: &'static str, v: &'a Option<String>| {
            v.as_deref().map(|v| (name, Value::String(v)))
        };
        let ip = |name: &'static str, v: Option<IpAddr>| v.map(|v| (name, Value::Ip(v)));

        [
            self.labels.as_ref().map(|l| ("labels", Value::Labels(l))),
            string("pod_name", &self.pod_name),
            string("namespace", &self.namespace),
            string("service_account", &self.service_account),
            ip("pod_ip", self.pod_ip),
            ip("host_ip", self.host_ip),
            string("workload_uid", &self.workload_uid),
            string("workload_name", &self.workload_name),
            string("workload_namespace", &self.workload_namespace),
            string("owner", &self.owner),
        ]
        .into_iter()
        .flatten()
        .map(move |(name, value)| (format!("{side}_{name}"), value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maplit::btreemap;
    use pretty_assertions::assert_eq;

    #[test]
    fn uid_is_preferred_over_ip() {
        let req = Request {
            destination_uid: Some("kubernetes://pod-0.ns-0".to_string()),
            destination_ip: Some("10.1.2.3".parse().unwrap()),
            ..Default::default()
        };
        assert_eq!(
            req.destination_id().as_deref(),
            Some("kubernetes://pod-0.ns-0")
        );
    }

    #[test]
    fn empty_uid_falls_back_to_ip() {
        let req = Request {
            source_uid: Some(String::new()),
            source_ip: Some("10.1.2.3".parse().unwrap()),
            ..Default::default()
        };
        assert_eq!(req.source_id().as_deref(), Some("10.1.2.3"));
    }

    #[test]
    fn unspecified_ip_is_ignored() {
        let req = Request {
            destination_ip: Some("0.0.0.0".parse().unwrap()),
            source_ip: Some("::".parse().unwrap()),
            ..Default::default()
        };
        assert_eq!(req.destination_id(), None);
        assert_eq!(req.source_id(), None);
        assert_eq!(Request::default().destination_id(), None);
    }

    #[test]
    fn pod_attributes_skip_empty_fields() {
        let pod = PodSnapshot {
            name: "pod-0".to_string(),
            service_account: Some(String::new()),
            ..Default::default()
        };
        let attrs = PodAttributes::from_pod(&pod);
        assert_eq!(
            attrs,
            PodAttributes {
                pod_name: Some("pod-0".to_string()),
                ..Default::default()
            }
        );
    }

    #[test]
    fn flattened_names() {
        let mut attrs = Attributes {
            destination: PodAttributes::from_pod(&PodSnapshot {
                name: "pod-0".to_string(),
                namespace: "ns-0".to_string(),
                labels: btreemap! { "app".to_string() => "web".to_string() },
                pod_ip: Some("10.1.2.3".parse().unwrap()),
                ..Default::default()
            }),
            destination_container_name: Some("app".to_string()),
            ..Default::default()
        };
        attrs.source.set_workload(&Workload {
            uid: "istio://ns-1/workloads/client".to_string(),
            name: "client".to_string(),
            namespace: "ns-1".to_string(),
            owner: None,
        });

        let names = attrs.iter().map(|(name, _)| name).collect::<Vec<_>>();
        assert_eq!(
            names,
            vec![
                "destination_labels",
                "destination_pod_name",
                "destination_namespace",
                "destination_pod_ip",
                "destination_container_name",
                "source_workload_uid",
                "source_workload_name",
                "source_workload_namespace",
            ]
        );

        assert_eq!(
            serde_json::to_value(&attrs).unwrap(),
            serde_json::json!({
                "destination_labels": { "app": "web" },
                "destination_pod_name": "pod-0",
                "destination_namespace": "ns-0",
                "destination_pod_ip": "10.1.2.3",
                "destination_container_name": "app",
                "source_workload_uid": "istio://ns-1/workloads/client",
                "source_workload_name": "client",
                "source_workload_namespace": "ns-1",
            })
        );
    }

    #[test]
    fn empty_attributes() {
        assert!(Attributes::default().is_empty());
    }
}
