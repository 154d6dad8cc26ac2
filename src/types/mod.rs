// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Data model shared by the reconciliation engine and the reconcilers.

pub mod namespace;
pub mod namespace_set;
pub mod plan;
pub mod resource;

pub use namespace::{DesiredState, EventKind, NamespaceEvent, NamespaceRecord};
pub use namespace_set::NamespaceSet;
pub use plan::{Action, ActionPlan};
pub use resource::{ChildResourceRef, DesiredResource, ObservedResource, ResourceKey, ResourceKind};
