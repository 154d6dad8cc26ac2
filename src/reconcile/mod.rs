// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Namespace reconciliation engine: comparison, execution, finalization and
//! the per-namespace controller driving them.

pub mod backoff;
pub mod comparator;
pub mod controller;
pub mod executor;
pub mod finalizer;

pub use backoff::BackoffPolicy;
pub use comparator::compute_plan;
pub use controller::{ControllerHandle, NamespaceController, PassOutcome, ReconcileState};
pub use executor::ActionExecutor;
pub use finalizer::FinalizerManager;
