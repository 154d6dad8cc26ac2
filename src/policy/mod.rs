// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Desired-state derivation for namespaces.

pub mod annotations;

use crate::error::Result;
use crate::types::{DesiredState, NamespaceRecord};

pub use annotations::AnnotationPolicy;

/// Derives the child resources a namespace must have.
///
/// Implementations must be pure: the same record always yields the same
/// desired state. An `Err` is treated as a permanent failure for the
/// namespace until its metadata changes.
pub trait DesiredStatePolicy: Send + Sync {
    fn derive(&self, namespace: &NamespaceRecord) -> Result<DesiredState>;
}

impl<F> DesiredStatePolicy for F
where
    F: Fn(&NamespaceRecord) -> Result<DesiredState> + Send + Sync,
{
    fn derive(&self, namespace: &NamespaceRecord) -> Result<DesiredState> {
        self(namespace)
    }
}
