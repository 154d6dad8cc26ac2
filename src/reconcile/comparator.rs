// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Desired vs observed comparison producing an ordered action plan.

use crate::types::{Action, ActionPlan, DesiredResource, ObservedResource, ResourceKey};
use std::collections::BTreeMap;

/// Compute the actions that move `observed` to `desired`.
///
/// Creates and updates come first, in dependency order; deletes follow in
/// reverse dependency order. Only operator-owned observed resources are ever
/// updated or deleted: a foreign object sharing a desired key is planned as a
/// create so the executor can report the collision. The result does not
/// depend on the order of either input.
pub fn compute_plan(observed: &[ObservedResource], desired: &[DesiredResource]) -> ActionPlan {
    let observed: BTreeMap<ResourceKey, &ObservedResource> = observed
        .iter()
        .filter(|o| o.owned)
        .map(|o| (o.key(), o))
        .collect();

    let mut wanted: BTreeMap<ResourceKey, &DesiredResource> = BTreeMap::new();
    for resource in desired {
        wanted.entry(resource.key()).or_insert(resource);
    }

    let mut actions = Vec::new();

    for (key, resource) in &wanted {
        match observed.get(key) {
            None => actions.push(Action::Create((*resource).clone())),
            Some(existing) => {
                let current = existing.reference.spec_hash.as_deref();
                if current.is_none() || current != resource.reference.spec_hash.as_deref() {
                    actions.push(Action::Update {
                        desired: (*resource).clone(),
                        resource_version: existing.resource_version.clone(),
                    });
                }
            }
        }
    }

    for (key, existing) in observed.iter().rev() {
        if !wanted.contains_key(key) {
            actions.push(Action::Delete(existing.reference.clone()));
        }
    }

    ActionPlan { actions }
}
