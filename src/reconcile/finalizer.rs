// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Cleanup finalizer on managed namespaces.

use crate::constants::FINALIZER;
use crate::error::{OperatorError, Result};
use crate::kubernetes::ClusterApi;
use crate::reconcile::comparator::compute_plan;
use crate::types::{NamespaceRecord, ObservedResource};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Adds and removes the operator finalizer.
///
/// Every write carries the record's resourceVersion, so a concurrent change
/// to the namespace surfaces as a retryable conflict.
pub struct FinalizerManager<C: ClusterApi> {
    cluster: Arc<C>,
}

impl<C: ClusterApi> FinalizerManager<C> {
    pub fn new(cluster: Arc<C>) -> Self {
        Self { cluster }
    }

    pub fn is_marked_for_deletion(&self, record: &NamespaceRecord) -> bool {
        record.deletion_requested
    }

    /// Add the finalizer; returns whether a write happened.
    ///
    /// A namespace already being deleted never gets a new finalizer.
    #[instrument(skip(self, record), fields(namespace = %record.name))]
    pub async fn ensure_finalizer_present(&self, record: &NamespaceRecord) -> Result<bool> {
        if record.has_finalizer() || self.is_marked_for_deletion(record) {
            return Ok(false);
        }

        let mut finalizers = record.finalizers.clone();
        finalizers.push(FINALIZER.to_string());
        self.cluster
            .set_namespace_finalizers(&record.name, finalizers, record.resource_version.as_deref())
            .await?;
        info!("Added finalizer to namespace {}", record.name);
        Ok(true)
    }

    /// Remove the finalizer once no operator-owned child remains.
    ///
    /// `observed` must be a listing taken after the cleanup pass; any owned
    /// resource left in it yields `CleanupPending` and the marker stays.
    #[instrument(skip(self, record, observed), fields(namespace = %record.name))]
    pub async fn ensure_finalizer_removed(
        &self,
        record: &NamespaceRecord,
        observed: &[ObservedResource],
    ) -> Result<bool> {
        let remaining = compute_plan(observed, &[]).len();
        if remaining > 0 {
            return Err(OperatorError::CleanupPending {
                namespace: record.name.clone(),
                remaining,
            });
        }

        if !record.has_finalizer() {
            debug!("Finalizer already absent on {}", record.name);
            return Ok(false);
        }

        let finalizers: Vec<String> = record
            .finalizers
            .iter()
            .filter(|f| *f != FINALIZER)
            .cloned()
            .collect();
        self.cluster
            .set_namespace_finalizers(&record.name, finalizers, record.resource_version.as_deref())
            .await?;
        info!("Removed finalizer from namespace {}", record.name);
        Ok(true)
    }
}
