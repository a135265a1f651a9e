#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod attributes;
mod config;
pub mod duration;
pub mod key;
mod pod;
pub mod workload;

pub use self::{
    attributes::{Attributes, PodAttributes, Request},
    config::{Params, DEFAULT_REFRESH_DURATION},
    key::{derive_key, pod_key},
    pod::{ContainerPort, OwnerRef, PodSnapshot},
    workload::Workload,
};
use std::sync::Arc;

/// Looks up pods known to a single cluster.
pub trait LookupPod {
    /// Finds the pod indexed by `key` (see [`derive_key`]).
    fn lookup(&self, key: &str) -> Option<Arc<PodSnapshot>>;

    /// Resolves the workload that owns `pod`, using the owner objects known to this cluster.
    fn resolve_workload(&self, pod: &PodSnapshot) -> Option<Workload>;
}

/// Resolves request identities into attributes.
pub trait GenerateAttributes {
    /// Generates attributes for a request. Identities that can't be resolved leave their
    /// attributes unset.
    fn generate(&self, request: &Request) -> Attributes;
}

/// Configures and builds attribute handlers.
#[async_trait::async_trait]
pub trait BuildHandler<E> {
    type Handler: GenerateAttributes;
    type Error;

    fn set_config(&mut self, params: Params);

    async fn build(&self, env: &E) -> Result<Self::Handler, Self::Error>;
}
