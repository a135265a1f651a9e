use crate::{Index, SharedIndex};
use ahash::{AHashMap as HashMap, AHashSet as HashSet};
use futures::prelude::*;
use kube::Resource;
use kubeenv_k8s_api::{watcher, EventStream, ResourceExt};
use kubert::index::IndexNamespacedResource;
use std::time::Duration;
use tokio::{sync::watch, time};
use tracing::{debug, info, trace, warn};

/// Delays reconnecting after a watch stream ends.
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// The lifecycle of a resource watch.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum State {
    /// No watch is established. Either the watch hasn't started or it failed and is backing off.
    Disconnected,

    /// The initial listing of resources is in progress.
    Listing,

    /// The initial listing has been applied to the index.
    Synced,

    /// Incremental updates are being applied.
    Watching,

    /// Resources are being relisted to refresh the index.
    Resyncing,
}

/// Mirrors a single resource kind into an index.
pub(crate) struct Reflector {
    index: SharedIndex,
    refresh: Duration,
    state: watch::Sender<State>,
    synced: watch::Sender<bool>,

    /// The resources currently applied to the index, by namespace. A relist deletes any resource
    /// that is no longer listed.
    known: HashMap<String, HashSet<String>>,
    resource_version: Option<String>,
}

// === impl State ===

impl State {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Listing => "listing",
            Self::Synced => "synced",
            Self::Watching => "watching",
            Self::Resyncing => "resyncing",
        }
    }
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// === impl Reflector ===

impl Reflector {
    pub(crate) fn new(
        index: SharedIndex,
        refresh: Duration,
    ) -> (Self, watch::Receiver<State>, watch::Receiver<bool>) {
        let (state, state_rx) = watch::channel(State::Disconnected);
        let (synced, synced_rx) = watch::channel(false);
        let reflector = Self {
            index,
            refresh,
            state,
            synced,
            known: HashMap::default(),
            resource_version: None,
        };
        (reflector, state_rx, synced_rx)
    }

    /// Watches resources until `stop` is signaled or dropped.
    ///
    /// Each watch is replaced by a fresh one, starting with a full listing, after the refresh
    /// interval elapses.
    pub(crate) async fn run<K>(
        mut self,
        mut connect: impl FnMut() -> EventStream<K>,
        mut stop: watch::Receiver<bool>,
    ) where
        K: Resource + ResourceExt,
        Index: IndexNamespacedResource<K>,
    {
        if *stop.borrow_and_update() {
            return;
        }
        loop {
            let events = connect();
            tokio::select! {
                biased;
                _ = stop.changed() => {
                    debug!("Stopped");
                    return;
                }
                () = self.reflect(events) => {}
            }
        }
    }

    /// Applies events from a single watch until the refresh interval elapses.
    ///
    /// The refresh interval starts once the watch's listing completes, so a slow listing is
    /// never interrupted.
    async fn reflect<K>(&mut self, mut events: EventStream<K>)
    where
        K: Resource + ResourceExt,
        Index: IndexNamespacedResource<K>,
    {
        let resync = time::sleep(self.refresh);
        tokio::pin!(resync);
        let mut listed = false;

        let mut listing = None::<Vec<K>>;
        loop {
            tokio::select! {
                () = &mut resync, if listed => {
                    debug!(refresh = ?self.refresh, "Refreshing");
                    self.transition(State::Resyncing);
                    return;
                }
                ev = events.next() => match ev {
                    Some(Ok(watcher::Event::Init)) => {
                        let next = if *self.synced.borrow() {
                            State::Resyncing
                        } else {
                            State::Listing
                        };
                        self.transition(next);
                        listing = Some(Vec::new());
                    }
                    Some(Ok(watcher::Event::InitApply(resource))) => {
                        listing.get_or_insert_with(Vec::new).push(resource);
                    }
                    Some(Ok(watcher::Event::InitDone)) => {
                        self.reset(listing.take().unwrap_or_default());
                        if !listed {
                            resync.as_mut().reset(time::Instant::now() + self.refresh);
                            listed = true;
                        }
                        if self.synced.send_if_modified(|synced| !std::mem::replace(synced, true)) {
                            info!("Synced");
                            self.transition(State::Synced);
                        } else {
                            self.transition(State::Watching);
                        }
                    }
                    Some(Ok(watcher::Event::Apply(resource))) => {
                        self.apply(resource);
                        self.transition(State::Watching);
                    }
                    Some(Ok(watcher::Event::Delete(resource))) => {
                        self.delete(&resource);
                        self.transition(State::Watching);
                    }
                    Some(Err(error)) => {
                        info!(%error, resource_version = ?self.resource_version, "Watch failed");
                        listing = None;
                        self.transition(State::Disconnected);
                    }
                    None => {
                        warn!("Watch stream ended");
                        self.transition(State::Disconnected);
                        time::sleep(RECONNECT_DELAY).await;
                        return;
                    }
                }
            }
        }
    }

    fn apply<K>(&mut self, resource: K)
    where
        K: Resource + ResourceExt,
        Index: IndexNamespacedResource<K>,
    {
        let Some(namespace) = resource.namespace() else {
            warn!(name = %resource.name_any(), "Ignoring resource without a namespace");
            return;
        };
        if let Some(rv) = resource.resource_version() {
            trace!(%namespace, name = %resource.name_any(), resource_version = %rv, "Applying");
            self.resource_version = Some(rv);
        }
        self.known
            .entry(namespace)
            .or_default()
            .insert(resource.name_any());
        IndexNamespacedResource::<K>::apply(&mut *self.index.write(), resource);
    }

    fn delete<K>(&mut self, resource: &K)
    where
        K: Resource + ResourceExt,
        Index: IndexNamespacedResource<K>,
    {
        let Some(namespace) = resource.namespace() else {
            return;
        };
        let name = resource.name_any();
        if let Some(names) = self.known.get_mut(&namespace) {
            names.remove(&name);
            if names.is_empty() {
                self.known.remove(&namespace);
            }
        }
        trace!(%namespace, %name, "Deleting");
        IndexNamespacedResource::<K>::delete(&mut *self.index.write(), namespace, name);
    }

    /// Replaces the indexed resources with a complete listing.
    fn reset<K>(&mut self, resources: Vec<K>)
    where
        K: Resource + ResourceExt,
        Index: IndexNamespacedResource<K>,
    {
        let mut removed = std::mem::take(&mut self.known);
        for resource in &resources {
            if let (Some(ns), name) = (resource.namespace(), resource.name_any()) {
                if let Some(names) = removed.get_mut(&ns) {
                    names.remove(&name);
                }
            }
        }

        let listed = resources.len();
        for resource in resources {
            self.apply(resource);
        }

        let mut deleted = 0;
        let mut index = self.index.write();
        for (namespace, names) in removed {
            for name in names {
                IndexNamespacedResource::<K>::delete(&mut *index, namespace.clone(), name);
                deleted += 1;
            }
        }
        debug!(listed, deleted, "Reset");
    }

    fn transition(&self, next: State) {
        self.state.send_if_modified(|state| {
            if *state == next {
                return false;
            }
            debug!(from = %state, to = %next, "Transition");
            *state = next;
            true
        });
    }
}
