// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Idempotent application of single plan actions.

use crate::error::{is_api_reason, is_api_status, ActionError, OperatorError};
use crate::kubernetes::ClusterApi;
use crate::types::{Action, ChildResourceRef, DesiredResource};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Applies actions against the cluster and classifies failures.
///
/// Never retries; a retryable error goes back to the controller.
pub struct ActionExecutor<C: ClusterApi> {
    cluster: Arc<C>,
}

impl<C: ClusterApi> Clone for ActionExecutor<C> {
    fn clone(&self) -> Self {
        Self {
            cluster: self.cluster.clone(),
        }
    }
}

impl<C: ClusterApi> ActionExecutor<C> {
    pub fn new(cluster: Arc<C>) -> Self {
        Self { cluster }
    }

    #[instrument(skip(self), fields(action = %action))]
    pub async fn apply(&self, action: &Action) -> Result<(), ActionError> {
        match action {
            Action::Create(desired) => self.create(desired).await,
            Action::Update {
                desired,
                resource_version,
            } => self.update(desired, resource_version.as_deref()).await,
            Action::Delete(reference) => self.delete(reference).await,
        }
    }

    async fn create(&self, desired: &DesiredResource) -> Result<(), ActionError> {
        let target = desired.reference.to_string();
        match self.cluster.create_child(desired).await {
            Ok(()) => {
                info!("Created {}", target);
                Ok(())
            }
            Err(e) if is_api_reason(&e, "AlreadyExists") => {
                debug!("{} already exists, checking ownership", target);
                self.adopt_existing(desired).await
            }
            Err(e) => Err(ActionError::classify(target, e)),
        }
    }

    /// Resolve a create that raced with an existing object of the same name
    async fn adopt_existing(&self, desired: &DesiredResource) -> Result<(), ActionError> {
        let target = desired.reference.to_string();
        let existing = self
            .cluster
            .get_child(&desired.reference)
            .await
            .map_err(|e| ActionError::classify(target.clone(), e))?;

        let Some(existing) = existing else {
            return Err(ActionError::Retryable {
                source: OperatorError::Vanished(target.clone()),
                target,
            });
        };

        if !existing.owned {
            warn!("{} exists and is not managed by the operator", target);
            return Err(ActionError::Fatal {
                source: OperatorError::ForeignResource(target.clone()),
                target,
            });
        }

        if existing.reference.spec_hash == desired.reference.spec_hash {
            debug!("{} already matches desired state", target);
            return Ok(());
        }

        let Some(version) = existing.resource_version.as_deref() else {
            return Err(ActionError::Fatal {
                source: OperatorError::MissingField(format!("{} metadata.resourceVersion", target)),
                target,
            });
        };
        self.write_update(desired, version).await
    }

    async fn update(
        &self,
        desired: &DesiredResource,
        resource_version: Option<&str>,
    ) -> Result<(), ActionError> {
        match resource_version {
            Some(version) => self.write_update(desired, version).await,
            None => {
                let target = desired.reference.to_string();
                let current = self
                    .cluster
                    .get_child(&desired.reference)
                    .await
                    .map_err(|e| ActionError::classify(target.clone(), e))?;
                match current.and_then(|c| c.resource_version) {
                    Some(version) => self.write_update(desired, &version).await,
                    None => Err(ActionError::Retryable {
                        source: OperatorError::Vanished(target.clone()),
                        target,
                    }),
                }
            }
        }
    }

    async fn write_update(&self, desired: &DesiredResource, version: &str) -> Result<(), ActionError> {
        let target = desired.reference.to_string();
        match self.cluster.update_child(desired, version).await {
            Ok(()) => {
                info!("Updated {}", target);
                Ok(())
            }
            // deleted underneath us; the next pass re-creates it
            Err(e) if is_api_status(&e, 404) => Err(ActionError::Retryable {
                source: OperatorError::Vanished(target.clone()),
                target,
            }),
            Err(e) => Err(ActionError::classify(target, e)),
        }
    }

    async fn delete(&self, reference: &ChildResourceRef) -> Result<(), ActionError> {
        match self.cluster.delete_child(reference).await {
            Ok(()) => {
                info!("Deleted {}", reference);
                Ok(())
            }
            Err(e) if is_api_status(&e, 404) => {
                debug!("{} already gone", reference);
                Ok(())
            }
            Err(e) => Err(ActionError::classify(reference.to_string(), e)),
        }
    }
}
