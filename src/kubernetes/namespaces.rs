// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Namespace management utilities for NamespaceSets

use crate::constants::{annotations, labels};
use crate::error::{OperatorError, Result};
use crate::types::namespace_set::ManagedNamespace;
use k8s_openapi::api::core::v1::Namespace;
use kube::{
    api::{DeleteParams, ListParams, ObjectMeta, Patch, PatchParams, PostParams},
    Api, Client, ResourceExt,
};
use serde_json::json;
use std::collections::BTreeMap;
use tracing::{debug, info, instrument};

/// Labels identifying a namespace created for a NamespaceSet
pub fn managed_labels(set_name: &str, managed: &ManagedNamespace) -> BTreeMap<String, String> {
    BTreeMap::from([
        (labels::MANAGED_BY.to_string(), labels::MANAGED_BY_VALUE.to_string()),
        (labels::OWNER_TEAM.to_string(), managed.team.clone()),
        (labels::NS_TYPE.to_string(), managed.ns_type.clone()),
        (labels::NAMESPACE_SET.to_string(), set_name.to_string()),
    ])
}

/// Quota annotation value, or `None` when the team has no quota
pub fn quota_annotation(managed: &ManagedNamespace) -> Result<Option<String>> {
    managed
        .resource_quota
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(OperatorError::from)
}

/// Ensure a managed namespace exists with the set's labels and quota annotation.
///
/// Existing namespaces are patched so quota changes in the set reach the
/// namespace reconciler.
#[instrument(skip(client, managed), fields(namespace = %managed.name))]
pub async fn ensure_managed_namespace(
    client: &Client,
    set_name: &str,
    managed: &ManagedNamespace,
) -> Result<()> {
    let namespaces: Api<Namespace> = Api::all(client.clone());
    let labels = managed_labels(set_name, managed);
    let quota = quota_annotation(managed)?;

    match namespaces.get_opt(&managed.name).await? {
        Some(_) => {
            debug!("Namespace {} already exists, syncing labels", managed.name);
            // a null annotation value removes a quota that was dropped from the set
            let patch = json!({
                "metadata": {
                    "labels": labels,
                    "annotations": { annotations::RESOURCE_QUOTA: quota }
                }
            });
            namespaces
                .patch(&managed.name, &PatchParams::default(), &Patch::Merge(&patch))
                .await?;
            Ok(())
        }
        None => {
            info!("Creating namespace {}", managed.name);
            let ns = Namespace {
                metadata: ObjectMeta {
                    name: Some(managed.name.clone()),
                    labels: Some(labels),
                    annotations: quota.map(|q| {
                        BTreeMap::from([(annotations::RESOURCE_QUOTA.to_string(), q)])
                    }),
                    ..Default::default()
                },
                ..Default::default()
            };
            match namespaces.create(&PostParams::default(), &ns).await {
                Ok(_) => info!("Namespace {} created successfully", managed.name),
                // created concurrently, the next resync patches its labels
                Err(kube::Error::Api(err)) if err.code == 409 => {
                    debug!("Namespace {} already exists", managed.name)
                }
                Err(e) => return Err(e.into()),
            }
            Ok(())
        }
    }
}

/// Names of the namespaces currently labeled as belonging to a NamespaceSet
#[instrument(skip(client))]
pub async fn list_set_namespaces(client: &Client, set_name: &str) -> Result<Vec<String>> {
    let namespaces: Api<Namespace> = Api::all(client.clone());
    let lp = ListParams::default().labels(&format!(
        "{}={},{}={}",
        labels::MANAGED_BY,
        labels::MANAGED_BY_VALUE,
        labels::NAMESPACE_SET,
        set_name
    ));

    Ok(namespaces
        .list(&lp)
        .await?
        .items
        .iter()
        .map(|ns| ns.name_any())
        .collect())
}

/// Delete a namespace, treating "already gone" as success
#[instrument(skip(client))]
pub async fn delete_namespace(client: &Client, name: &str) -> Result<()> {
    let namespaces: Api<Namespace> = Api::all(client.clone());

    match namespaces.delete(name, &DeleteParams::default()).await {
        Ok(_) => {
            info!("Deleted namespace {}", name);
            Ok(())
        }
        Err(kube::Error::Api(err)) if err.code == 404 => {
            info!("Namespace already gone: {}", name);
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
