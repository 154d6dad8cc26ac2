// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Watch-driven entry points: the namespace event source and the NamespaceSet reconciler.

pub mod namespace;
pub mod namespace_set;

pub use namespace::{EventTranslator, NamespaceWatcher};
pub use namespace_set::NamespaceSetReconciler;
