// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::types::resource::{ChildResourceRef, DesiredResource};
use std::fmt;

/// A single step towards the desired state
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Create(DesiredResource),
    Update {
        desired: DesiredResource,
        /// Version of the observed object, used for optimistic concurrency
        resource_version: Option<String>,
    },
    Delete(ChildResourceRef),
}

impl Action {
    pub fn reference(&self) -> &ChildResourceRef {
        match self {
            Action::Create(desired) => &desired.reference,
            Action::Update { desired, .. } => &desired.reference,
            Action::Delete(reference) => reference,
        }
    }

    pub fn verb(&self) -> &'static str {
        match self {
            Action::Create(_) => "create",
            Action::Update { .. } => "update",
            Action::Delete(_) => "delete",
        }
    }

    pub fn is_delete(&self) -> bool {
        matches!(self, Action::Delete(_))
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.verb(), self.reference())
    }
}

/// Ordered actions for one namespace; creates and updates precede deletes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionPlan {
    pub actions: Vec<Action>,
}

impl ActionPlan {
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Action> {
        self.actions.iter()
    }

    pub fn deletes(&self) -> usize {
        self.actions.iter().filter(|a| a.is_delete()).count()
    }
}

impl<'a> IntoIterator for &'a ActionPlan {
    type Item = &'a Action;
    type IntoIter = std::slice::Iter<'a, Action>;

    fn into_iter(self) -> Self::IntoIter {
        self.actions.iter()
    }
}
