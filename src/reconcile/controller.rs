// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Per-namespace reconciliation workers.
//!
//! Events are routed to one worker per namespace. A worker runs passes until
//! its namespace settles, then picks up the latest event that arrived in the
//! meantime. Workers for different namespaces run in parallel.

use crate::config::Config;
use crate::constants::CONDITION_TYPE;
use crate::error::{ActionError, OperatorError};
use crate::kubernetes::{list_all_owned, ClusterApi};
use crate::policy::DesiredStatePolicy;
use crate::reconcile::backoff::BackoffPolicy;
use crate::reconcile::comparator::compute_plan;
use crate::reconcile::executor::ActionExecutor;
use crate::reconcile::finalizer::FinalizerManager;
use crate::types::{ActionPlan, NamespaceEvent, NamespaceRecord};
use k8s_openapi::api::core::v1::NamespaceCondition;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use k8s_openapi::chrono::Utc;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{mpsc, Notify};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Where a namespace worker currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileState {
    Observing,
    Planning,
    Executing,
    Settled,
    Finalizing,
    Backoff,
}

impl fmt::Display for ReconcileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Result of a pass that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    /// Children match the desired state; `applied` actions were executed
    Settled { applied: usize },
    /// All owned children are gone and the finalizer was released
    Finalized,
    /// The namespace no longer exists
    Gone,
    /// The namespace is outside the operator's scope
    Skipped,
}

struct Slot {
    state: ReconcileState,
    /// Latest event received while the worker was busy
    pending: Option<NamespaceEvent>,
    /// Cuts a backoff sleep short when a new event arrives
    wake: Arc<Notify>,
}

struct Inner<C: ClusterApi> {
    cluster: Arc<C>,
    policy: Arc<dyn DesiredStatePolicy>,
    executor: ActionExecutor<C>,
    finalizers: FinalizerManager<C>,
    backoff: BackoffPolicy,
    config: Config,
    slots: Mutex<HashMap<String, Slot>>,
    shutdown: CancellationToken,
    /// Signalled whenever a worker releases its slot
    idle: Notify,
}

/// Routes namespace events to per-namespace workers
pub struct NamespaceController<C: ClusterApi> {
    inner: Arc<Inner<C>>,
    event_rx: mpsc::Receiver<NamespaceEvent>,
}

/// Handle to send events to the NamespaceController
#[derive(Clone)]
pub struct ControllerHandle {
    event_tx: mpsc::Sender<NamespaceEvent>,
}

impl ControllerHandle {
    pub async fn send(&self, event: NamespaceEvent) {
        if let Err(e) = self.event_tx.send(event).await {
            error!("Failed to send event to NamespaceController: {}", e);
        }
    }
}

impl<C: ClusterApi> NamespaceController<C> {
    pub fn new(
        cluster: Arc<C>,
        policy: Arc<dyn DesiredStatePolicy>,
        config: Config,
        shutdown: CancellationToken,
    ) -> (Self, ControllerHandle) {
        let (event_tx, event_rx) = mpsc::channel(256);

        let inner = Inner {
            executor: ActionExecutor::new(cluster.clone()),
            finalizers: FinalizerManager::new(cluster.clone()),
            backoff: config.backoff(),
            cluster,
            policy,
            config,
            slots: Mutex::new(HashMap::new()),
            shutdown,
            idle: Notify::new(),
        };

        let controller = Self {
            inner: Arc::new(inner),
            event_rx,
        };
        (controller, ControllerHandle { event_tx })
    }

    /// Consume events until shutdown, then wait for running workers
    pub async fn run(mut self) -> anyhow::Result<()> {
        info!("NamespaceController started, waiting for events...");

        loop {
            tokio::select! {
                _ = self.inner.shutdown.cancelled() => break,
                event = self.event_rx.recv() => match event {
                    Some(event) => self.dispatch(event),
                    None => break,
                },
            }
        }

        info!("NamespaceController stopping, waiting for in-flight workers");
        self.wait_idle().await;
        info!("NamespaceController stopped");
        Ok(())
    }

    /// Hand an event to its namespace worker, starting one if needed
    pub fn dispatch(&self, event: NamespaceEvent) {
        if self.inner.shutdown.is_cancelled() {
            debug!(namespace = %event.name, "Dropping event during shutdown");
            return;
        }

        let mut slots = self.inner.slots();
        if let Some(slot) = slots.get_mut(&event.name) {
            debug!(namespace = %event.name, kind = ?event.kind, "Coalescing event into running worker");
            slot.pending = Some(event);
            if slot.state == ReconcileState::Backoff {
                slot.wake.notify_one();
            }
            return;
        }

        let wake = Arc::new(Notify::new());
        slots.insert(
            event.name.clone(),
            Slot {
                state: ReconcileState::Observing,
                pending: None,
                wake: wake.clone(),
            },
        );
        drop(slots);

        let inner = self.inner.clone();
        tokio::spawn(async move { inner.work(event, wake).await });
    }

    /// State of the namespace worker, `None` when no worker is running
    pub fn state(&self, namespace: &str) -> Option<ReconcileState> {
        self.inner.slots().get(namespace).map(|s| s.state)
    }

    /// Wait until no namespace has a running worker
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.inner.slots().is_empty() {
                return;
            }
            notified.await;
        }
    }

    /// Run a single pass for a namespace, outside of any worker
    pub async fn reconcile_once(&self, namespace: &str) -> Result<PassOutcome, ActionError> {
        self.inner.reconcile_once(namespace).await
    }
}

impl<C: ClusterApi> Inner<C> {
    fn slots(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, namespace: &str, state: ReconcileState) {
        if let Some(slot) = self.slots().get_mut(namespace) {
            slot.state = state;
        }
    }

    /// Take the next coalesced event, or release the slot when there is none
    fn next_event(&self, namespace: &str) -> Option<NamespaceEvent> {
        let mut slots = self.slots();
        let next = if self.shutdown.is_cancelled() {
            None
        } else {
            slots.get_mut(namespace).and_then(|s| s.pending.take())
        };
        if next.is_none() {
            slots.remove(namespace);
            drop(slots);
            self.idle.notify_waiters();
        }
        next
    }

    /// Take the coalesced event that interrupted a backoff sleep
    fn take_pending(&self, namespace: &str) -> Option<NamespaceEvent> {
        self.slots()
            .get_mut(namespace)
            .and_then(|s| s.pending.take())
    }

    async fn work(self: Arc<Self>, first: NamespaceEvent, wake: Arc<Notify>) {
        let namespace = first.name.clone();
        let mut event = first;
        loop {
            self.process(&event, &wake).await;
            match self.next_event(&namespace) {
                Some(next) => event = next,
                None => break,
            }
        }
    }

    /// Run passes for one event until the namespace settles or the retry
    /// budget is spent.
    ///
    /// A new event during backoff starts the next pass immediately, so a
    /// deletion is finalized without waiting out the timer.
    #[instrument(skip(self, event, wake), fields(namespace = %event.name, event = ?event.kind))]
    async fn process(&self, event: &NamespaceEvent, wake: &Notify) {
        let namespace = event.name.as_str();
        let mut attempt = 0u32;

        loop {
            if self.shutdown.is_cancelled() {
                return;
            }
            attempt += 1;

            match self.reconcile_once(namespace).await {
                Ok(outcome) => {
                    debug!(?outcome, attempt, "Pass complete");
                    self.set_state(namespace, ReconcileState::Settled);
                    return;
                }
                Err(err) if err.is_fatal() => {
                    error!(error = %err, "Reconciliation failed permanently");
                    self.surface_failure(namespace, &err).await;
                    self.set_state(namespace, ReconcileState::Settled);
                    return;
                }
                Err(err) => {
                    if attempt >= self.config.max_attempts {
                        error!(
                            error = %err,
                            attempt,
                            "Giving up after max retries, waiting for the next event"
                        );
                        self.set_state(namespace, ReconcileState::Settled);
                        return;
                    }

                    let delay = self.backoff.delay(attempt);
                    warn!(
                        error = %err,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Pass failed, retrying"
                    );
                    self.set_state(namespace, ReconcileState::Backoff);
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = wake.notified() => {
                            if let Some(next) = self.take_pending(namespace) {
                                debug!(event = ?next.kind, "New event during backoff, retrying now");
                                attempt = 0;
                            }
                        }
                        _ = self.shutdown.cancelled() => return,
                    }
                }
            }
        }
    }

    async fn reconcile_once(&self, namespace: &str) -> Result<PassOutcome, ActionError> {
        self.set_state(namespace, ReconcileState::Observing);
        let classify = |e: OperatorError| ActionError::classify(namespace, e);

        let Some(ns) = self.cluster.get_namespace(namespace).await.map_err(classify)? else {
            debug!(namespace, "Namespace is gone, nothing to reconcile");
            return Ok(PassOutcome::Gone);
        };
        let record = NamespaceRecord::from_namespace(&ns).map_err(classify)?;

        if self.finalizers.is_marked_for_deletion(&record) {
            if !record.has_finalizer() {
                return Ok(PassOutcome::Skipped);
            }
            return self.finalize(&record).await;
        }

        if !self.config.is_in_scope(&record) {
            debug!(namespace, "Namespace is out of scope");
            return Ok(PassOutcome::Skipped);
        }

        self.set_state(namespace, ReconcileState::Planning);
        self.finalizers
            .ensure_finalizer_present(&record)
            .await
            .map_err(classify)?;
        let desired = self.policy.derive(&record).map_err(classify)?;
        let observed = list_all_owned(self.cluster.as_ref(), namespace)
            .await
            .map_err(classify)?;
        let plan = compute_plan(&observed, &desired.resources);

        self.set_state(namespace, ReconcileState::Executing);
        self.execute(&plan).await?;

        if record.has_failure_condition() {
            let condition = reconciled_condition(
                true,
                "Reconciled",
                "Child resources match the desired state",
            );
            self.cluster
                .set_namespace_condition(namespace, condition)
                .await
                .map_err(classify)?;
        }

        if !plan.is_empty() {
            info!(namespace, actions = plan.len(), "Namespace reconciled");
        }
        Ok(PassOutcome::Settled {
            applied: plan.len(),
        })
    }

    /// Remove every owned child, then release the finalizer
    async fn finalize(&self, record: &NamespaceRecord) -> Result<PassOutcome, ActionError> {
        let namespace = record.name.as_str();
        let classify = |e: OperatorError| ActionError::classify(namespace, e);
        self.set_state(namespace, ReconcileState::Finalizing);
        info!(namespace, "Namespace is being deleted, cleaning up owned resources");

        let observed = list_all_owned(self.cluster.as_ref(), namespace)
            .await
            .map_err(classify)?;
        let plan = compute_plan(&observed, &[]);
        self.execute(&plan).await?;

        let remaining = list_all_owned(self.cluster.as_ref(), namespace)
            .await
            .map_err(classify)?;
        self.finalizers
            .ensure_finalizer_removed(record, &remaining)
            .await
            .map_err(classify)?;
        Ok(PassOutcome::Finalized)
    }

    /// Apply creates and updates, then deletes if all of them succeeded.
    ///
    /// Every action is attempted; the most severe failure is returned.
    async fn execute(&self, plan: &ActionPlan) -> Result<(), ActionError> {
        let mut failure: Option<ActionError> = None;

        for action in plan.iter().filter(|a| !a.is_delete()) {
            self.check_shutdown(action.reference().namespace.as_str())?;
            if let Err(e) = self.executor.apply(action).await {
                warn!(action = %action, error = %e, "Action failed");
                failure = Some(match failure {
                    Some(f) => f.worst(e),
                    None => e,
                });
            }
        }

        if let Some(failure) = failure {
            if plan.deletes() > 0 {
                warn!(deletes = plan.deletes(), "Skipping deletes after failed creates or updates");
            }
            return Err(failure);
        }

        for action in plan.iter().filter(|a| a.is_delete()) {
            self.check_shutdown(action.reference().namespace.as_str())?;
            if let Err(e) = self.executor.apply(action).await {
                warn!(action = %action, error = %e, "Action failed");
                failure = Some(match failure {
                    Some(f) => f.worst(e),
                    None => e,
                });
            }
        }

        failure.map_or(Ok(()), Err)
    }

    fn check_shutdown(&self, namespace: &str) -> Result<(), ActionError> {
        if self.shutdown.is_cancelled() {
            return Err(ActionError::Retryable {
                target: namespace.to_string(),
                source: OperatorError::ShuttingDown,
            });
        }
        Ok(())
    }

    /// Record a permanent failure on the namespace status, if not already recorded
    async fn surface_failure(&self, namespace: &str, err: &ActionError) {
        let reason = err.source_error().reason();
        let message = err.to_string();

        let current = match self.cluster.get_namespace(namespace).await {
            Ok(Some(ns)) => ns
                .status
                .and_then(|s| s.conditions)
                .and_then(|c| c.into_iter().find(|c| c.type_ == CONDITION_TYPE)),
            Ok(None) => return,
            Err(e) => {
                warn!(error = %e, "Failed to read namespace before recording failure");
                return;
            }
        };
        if current.is_some_and(|c| {
            c.status == "False"
                && c.reason.as_deref() == Some(reason)
                && c.message.as_deref() == Some(message.as_str())
        }) {
            return;
        }

        let condition = reconciled_condition(false, reason, &message);
        if let Err(e) = self.cluster.set_namespace_condition(namespace, condition).await {
            warn!(error = %e, "Failed to record failure condition");
        }
    }
}

fn reconciled_condition(ok: bool, reason: &str, message: &str) -> NamespaceCondition {
    NamespaceCondition {
        type_: CONDITION_TYPE.to_string(),
        status: if ok { "True" } else { "False" }.to_string(),
        reason: Some(reason.to_string()),
        message: Some(message.to_string()),
        last_transition_time: Some(Time(Utc::now())),
    }
}
