//! Normalizes the identifiers carried on requests into the keys the pod index is keyed by.
//!
//! Pods are indexed by `<namespace>/<name>` and by address. Requests, however, may name a pod as
//! a `kubernetes://<name>.<namespace>` URI, as a bare `<name>.<namespace>`, or by IP address.

use std::net::IpAddr;

/// The scheme prefix that may be carried on pod identities.
pub const KUBE_PREFIX: &str = "kubernetes://";

/// Builds the canonical index key for a pod.
#[inline]
pub fn pod_key(namespace: &str, name: &str) -> String {
    format!("{namespace}/{name}")
}

/// Derives the index key for an arbitrary identifier.
///
/// IP literals are returned as-is. Otherwise, the `kubernetes://` prefix is stripped and an
/// identifier of the form `<name>.<namespace>` is reordered into `<namespace>/<name>`. Any other
/// shape is passed through, so this never fails.
pub fn derive_key(id: &str) -> String {
    if id.parse::<IpAddr>().is_ok() {
        return id.to_string();
    }

    let fullname = id.strip_prefix(KUBE_PREFIX).unwrap_or(id);
    let mut parts = fullname.split('.');
    if let (Some(name), Some(ns), None) = (parts.next(), parts.next(), parts.next()) {
        return pod_key(ns, name);
    }

    fullname.to_string()
}
