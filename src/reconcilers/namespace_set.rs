// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! NamespaceSet reconciler - creates, labels and prunes team namespaces.
//!
//! Child resources inside those namespaces are left to the namespace
//! controller, which picks up the quota annotation written here.

use crate::error::{OperatorError, Result};
use crate::kubernetes::{
    delete_namespace, ensure_managed_namespace, list_set_namespaces, wait_for_namespace_set_crd,
};
use crate::types::namespace_set::{ManagedNamespace, NamespaceSet};
use futures::StreamExt;
use kube::{
    api::{Patch, PatchParams},
    runtime::{controller::Action, watcher, Controller},
    Api, Client, ResourceExt,
};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Periodic resync so namespaces deleted by hand are recreated
const RESYNC_INTERVAL: Duration = Duration::from_secs(300);

pub struct NamespaceSetReconciler {
    client: Client,
    shutdown: CancellationToken,
}

impl NamespaceSetReconciler {
    pub fn new(client: Client, shutdown: CancellationToken) -> Self {
        Self { client, shutdown }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        match wait_for_namespace_set_crd(&self.client, &self.shutdown).await {
            Ok(()) => {}
            Err(OperatorError::ShuttingDown) => return Ok(()),
            Err(e) => return Err(e.into()),
        }

        let sets: Api<NamespaceSet> = Api::all(self.client.clone());
        let shutdown = self.shutdown.clone();
        let context = Arc::new(self);

        let controller = Controller::new(sets, watcher::Config::default())
            .run(reconcile, error_policy, context)
            .for_each(|res| async move {
                match res {
                    Ok(o) => debug!("Reconciled NamespaceSet: {:?}", o),
                    Err(e) => warn!("Reconciliation error: {:?}", e),
                }
            });

        tokio::select! {
            _ = controller => {}
            _ = shutdown.cancelled() => info!("NamespaceSet reconciler stopping"),
        }

        Ok(())
    }
}

/// Namespaces labeled for a set that the set no longer asks for
pub fn namespaces_to_prune(
    desired: &BTreeMap<String, ManagedNamespace>,
    existing: &[String],
) -> Vec<String> {
    existing
        .iter()
        .filter(|name| !desired.contains_key(*name))
        .cloned()
        .collect()
}

async fn reconcile(set: Arc<NamespaceSet>, ctx: Arc<NamespaceSetReconciler>) -> Result<Action> {
    let set_name = set.name_any();
    let desired = set.desired_namespaces();

    debug!("Reconciling NamespaceSet {} with {} namespaces", set_name, desired.len());

    for managed in desired.values() {
        ensure_managed_namespace(&ctx.client, &set_name, managed).await?;
    }

    let existing = list_set_namespaces(&ctx.client, &set_name).await?;
    for name in namespaces_to_prune(&desired, &existing) {
        info!("Namespace {} is no longer part of NamespaceSet {}", name, set_name);
        delete_namespace(&ctx.client, &name).await?;
    }

    let managed = desired.len();
    let current = set.status.as_ref().map(|s| s.managed_namespaces);
    if current != Some(managed) {
        let sets: Api<NamespaceSet> = Api::all(ctx.client.clone());
        let patch = json!({ "status": { "managedNamespaces": managed } });
        sets.patch_status(&set_name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
    }

    Ok(Action::requeue(RESYNC_INTERVAL))
}

fn error_policy(
    _set: Arc<NamespaceSet>,
    error: &OperatorError,
    _ctx: Arc<NamespaceSetReconciler>,
) -> Action {
    error!("Reconciliation error: {}", error);
    Action::requeue(Duration::from_secs(60))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{namespace_json, not_found_json, MockService};
    use crate::types::namespace_set::{NamespaceSetSpec, TeamSpec};
    use kube::api::ObjectMeta;

    fn make_set(teams: Vec<TeamSpec>) -> NamespaceSet {
        NamespaceSet {
            metadata: ObjectMeta {
                name: Some("teams".to_string()),
                ..Default::default()
            },
            spec: NamespaceSetSpec { teams },
            status: None,
        }
    }

    fn team(name: &str, namespaces: &[&str]) -> TeamSpec {
        TeamSpec {
            name: Some(name.to_string()),
            namespaces: namespaces.iter().map(|s| s.to_string()).collect(),
            resource_quota: None,
        }
    }

    fn namespace_list_json(names: &[&str]) -> String {
        let items: Vec<serde_json::Value> = names
            .iter()
            .map(|n| serde_json::from_str(&namespace_json(n)).unwrap())
            .collect();
        json!({
            "apiVersion": "v1",
            "kind": "NamespaceList",
            "metadata": {"resourceVersion": "10"},
            "items": items
        })
        .to_string()
    }

    fn set_json() -> String {
        json!({
            "apiVersion": "example.com/v1",
            "kind": "NamespaceSet",
            "metadata": {"name": "teams", "resourceVersion": "2"},
            "spec": {"teams": []},
            "status": {"managedNamespaces": 1}
        })
        .to_string()
    }

    #[test]
    fn test_namespaces_to_prune() {
        let set = make_set(vec![team("Alpha", &["dev", "prod"])]);
        let desired = set.desired_namespaces();
        let existing = vec![
            "alpha-dev".to_string(),
            "alpha-test".to_string(),
            "alpha-prod".to_string(),
        ];

        assert_eq!(namespaces_to_prune(&desired, &existing), vec!["alpha-test"]);
        assert!(namespaces_to_prune(&desired, &[]).is_empty());
    }

    #[tokio::test]
    async fn test_reconcile_creates_prunes_and_updates_status() {
        let mock = MockService::new()
            .on_get(
                "/api/v1/namespaces/alpha-dev",
                404,
                &not_found_json("namespaces", "alpha-dev"),
            )
            .on_post("/api/v1/namespaces", 201, &namespace_json("alpha-dev"))
            .on_get(
                "/api/v1/namespaces",
                200,
                &namespace_list_json(&["alpha-dev", "alpha-old"]),
            )
            .on_delete("/api/v1/namespaces/alpha-old", 200, &namespace_json("alpha-old"))
            .on_patch(
                "/apis/example.com/v1/namespacesets/teams/status",
                200,
                &set_json(),
            );
        let ctx = Arc::new(NamespaceSetReconciler::new(
            mock.clone().into_client(),
            CancellationToken::new(),
        ));

        let action = reconcile(Arc::new(make_set(vec![team("alpha", &["dev"])])), ctx)
            .await
            .unwrap();
        assert_eq!(action, Action::requeue(RESYNC_INTERVAL));

        let requests = mock.requests();
        let calls: Vec<String> = requests
            .iter()
            .map(|(m, p)| format!("{} {}", m, p))
            .collect();
        assert_eq!(
            calls,
            vec![
                "GET /api/v1/namespaces/alpha-dev",
                "POST /api/v1/namespaces",
                "GET /api/v1/namespaces",
                "DELETE /api/v1/namespaces/alpha-old",
                "PATCH /apis/example.com/v1/namespacesets/teams/status",
            ]
        );
    }

    #[tokio::test]
    async fn test_reconcile_skips_status_when_unchanged() {
        let mock = MockService::new().on_get("/api/v1/namespaces", 200, &namespace_list_json(&[]));
        let ctx = Arc::new(NamespaceSetReconciler::new(
            mock.clone().into_client(),
            CancellationToken::new(),
        ));
        let mut set = make_set(vec![]);
        set.status = Some(crate::types::namespace_set::NamespaceSetStatus {
            managed_namespaces: 0,
        });

        reconcile(Arc::new(set), ctx).await.unwrap();
        assert_eq!(mock.requests().len(), 1);
    }
}
