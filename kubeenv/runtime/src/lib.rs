#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub use kubeenv_core as core;
pub use kubeenv_k8s_api as k8s;
pub use kubeenv_k8s_index as index;

mod args;
mod builder;
mod client;
pub mod discovery;
mod error;
mod handler;
mod metrics;
pub mod registry;


pub use self::{
    args::Args,
    builder::{Builder, Env},
    client::{ClientFactory, KubeClientFactory},
    error::Error,
    handler::Handler,
    registry::ClusterRegistry,
};
