#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod watches;

pub use self::watches::{ClusterClient, EventStream};
pub use k8s_openapi::{
    api::{
        self,
        apps::v1::ReplicaSet,
        batch::v1::Job,
        core::v1::{Container, ContainerPort, Pod, PodSpec, PodStatus, Secret},
    },
    apimachinery::pkg::apis::meta::v1::OwnerReference,
    ByteString,
};
pub use kube::{
    api::{ObjectMeta, ResourceExt},
    runtime::watcher::{self, Event},
    Client,
};
