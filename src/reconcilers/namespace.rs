// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Namespace watcher - turns the namespace watch stream into controller events.

use crate::reconcile::ControllerHandle;
use crate::types::{EventKind, NamespaceEvent};
use futures::StreamExt;
use k8s_openapi::api::core::v1::Namespace;
use kube::{Api, Client, ResourceExt};
use kube_runtime::{watcher, watcher::Event, WatchStreamExt};
use std::collections::HashSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Labels watch events as first sightings, changes or deletions.
///
/// The watcher replays every namespace after each (re)list; names already
/// seen keep being reported as `Modified`.
#[derive(Debug, Default)]
pub struct EventTranslator {
    seen: HashSet<String>,
    /// Names replayed by the list in progress
    relisted: Option<HashSet<String>>,
}

impl EventTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn translate(&mut self, event: Event<Namespace>) -> Option<NamespaceEvent> {
        match event {
            Event::Init => {
                self.relisted = Some(HashSet::new());
                None
            }
            Event::InitDone => {
                // forget namespaces deleted while the watch was down
                if let Some(relisted) = self.relisted.take() {
                    self.seen.retain(|name| relisted.contains(name));
                }
                None
            }
            Event::InitApply(ns) => {
                if let Some(relisted) = self.relisted.as_mut() {
                    relisted.insert(ns.name_any());
                }
                self.applied(ns)
            }
            Event::Apply(ns) => self.applied(ns),
            Event::Delete(ns) => {
                self.seen.remove(&ns.name_any());
                NamespaceEvent::new(EventKind::Deleted, ns)
            }
        }
    }

    fn applied(&mut self, ns: Namespace) -> Option<NamespaceEvent> {
        let kind = if self.seen.insert(ns.name_any()) {
            EventKind::Added
        } else {
            EventKind::Modified
        };
        NamespaceEvent::new(kind, ns)
    }
}

/// Watches all namespaces and forwards every change to the controller
pub struct NamespaceWatcher {
    client: Client,
    handle: ControllerHandle,
    shutdown: CancellationToken,
}

impl NamespaceWatcher {
    pub fn new(client: Client, handle: ControllerHandle, shutdown: CancellationToken) -> Self {
        Self {
            client,
            handle,
            shutdown,
        }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let namespaces: Api<Namespace> = Api::all(self.client.clone());
        let stream = watcher(namespaces, watcher::Config::default()).default_backoff();
        tokio::pin!(stream);

        let mut translator = EventTranslator::new();
        info!("Namespace watcher started");

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("Namespace watcher stopping");
                    break;
                }
                event = stream.next() => match event {
                    Some(Ok(event)) => {
                        if let Some(event) = translator.translate(event) {
                            debug!(namespace = %event.name, kind = ?event.kind, "Namespace event");
                            self.handle.send(event).await;
                        }
                    }
                    Some(Err(e)) => warn!(error = %e, "Namespace watch error, will retry"),
                    None => {
                        warn!("Namespace watch stream ended");
                        break;
                    }
                },
            }
        }

        Ok(())
    }
}
