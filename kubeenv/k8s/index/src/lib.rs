//! Keeps an in-memory view of the pods in a cluster, along with the objects that own them.
//!
//! Three watches feed a shared [`Index`]:
//!
//! - `Pod` resources, indexed by `namespace/name` and by address;
//! - `ReplicaSet` resources, which link pods to their `Deployment`; and
//! - `Job` resources, which link pods to their `CronJob`.
//!
//! Each watch starts with a full listing and then applies incremental updates. Watches are
//! periodically replaced so that the index is rebuilt from a fresh listing.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod cache;
mod index;
mod pod;
mod reflector;


pub use self::{
    cache::{Stopped, WatchCache},
    index::{Index, SharedIndex},
    reflector::State,
};
