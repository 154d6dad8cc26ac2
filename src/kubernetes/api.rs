// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Cluster API boundary used by the reconciliation engine.

use crate::constants::OPERATOR_NAME;
use crate::error::Result;
use crate::types::resource::owned_selector;
use crate::types::{ChildResourceRef, DesiredResource, ObservedResource, ResourceKind};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Namespace, NamespaceCondition};
use kube::{
    api::{DeleteParams, DynamicObject, ListParams, Patch, PatchParams, PostParams},
    Api, Client,
};
use serde_json::json;
use tracing::{debug, instrument};

/// Operations the engine needs from the API server.
///
/// Implementations return raw API errors; classifying them as retryable or
/// fatal is the executor's job.
#[async_trait]
pub trait ClusterApi: Send + Sync + 'static {
    /// Read a namespace; `None` once it has been purged
    async fn get_namespace(&self, name: &str) -> Result<Option<Namespace>>;

    /// Replace the namespace finalizer list, guarded by `resource_version`
    async fn set_namespace_finalizers(
        &self,
        name: &str,
        finalizers: Vec<String>,
        resource_version: Option<&str>,
    ) -> Result<()>;

    /// Upsert one status condition on the namespace
    async fn set_namespace_condition(&self, name: &str, condition: NamespaceCondition)
        -> Result<()>;

    /// List operator-owned children of one kind in a namespace
    async fn list_owned(&self, namespace: &str, kind: ResourceKind) -> Result<Vec<ObservedResource>>;

    async fn get_child(&self, reference: &ChildResourceRef) -> Result<Option<ObservedResource>>;

    async fn create_child(&self, resource: &DesiredResource) -> Result<()>;

    async fn update_child(&self, resource: &DesiredResource, resource_version: &str) -> Result<()>;

    async fn delete_child(&self, reference: &ChildResourceRef) -> Result<()>;
}

/// List operator-owned children of every kind in a namespace
pub async fn list_all_owned<C: ClusterApi + ?Sized>(
    cluster: &C,
    namespace: &str,
) -> Result<Vec<ObservedResource>> {
    let mut observed = Vec::new();
    for kind in ResourceKind::ALL {
        observed.extend(cluster.list_owned(namespace, kind).await?);
    }
    Ok(observed)
}

/// `ClusterApi` backed by a kube client, using dynamic objects per kind
#[derive(Clone)]
pub struct KubeClusterApi {
    client: Client,
}

impl KubeClusterApi {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn children(&self, namespace: &str, kind: ResourceKind) -> Api<DynamicObject> {
        Api::namespaced_with(self.client.clone(), namespace, &kind.api_resource())
    }

    fn namespaces(&self) -> Api<Namespace> {
        Api::all(self.client.clone())
    }
}

#[async_trait]
impl ClusterApi for KubeClusterApi {
    #[instrument(skip(self))]
    async fn get_namespace(&self, name: &str) -> Result<Option<Namespace>> {
        Ok(self.namespaces().get_opt(name).await?)
    }

    #[instrument(skip(self))]
    async fn set_namespace_finalizers(
        &self,
        name: &str,
        finalizers: Vec<String>,
        resource_version: Option<&str>,
    ) -> Result<()> {
        // resourceVersion in a merge patch makes the API server reject stale writes
        let patch = json!({
            "metadata": {
                "finalizers": finalizers,
                "resourceVersion": resource_version,
            }
        });
        self.namespaces()
            .patch(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        debug!("Updated finalizers on namespace {}", name);
        Ok(())
    }

    #[instrument(skip(self, condition), fields(status = %condition.status))]
    async fn set_namespace_condition(
        &self,
        name: &str,
        condition: NamespaceCondition,
    ) -> Result<()> {
        // conditions merge by type, leaving the namespace controller's own entries alone
        let patch = json!({ "status": { "conditions": [condition] } });
        self.namespaces()
            .patch_status(name, &PatchParams::default(), &Patch::Strategic(&patch))
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_owned(&self, namespace: &str, kind: ResourceKind) -> Result<Vec<ObservedResource>> {
        let lp = ListParams::default().labels(&owned_selector());
        let list = self.children(namespace, kind).list(&lp).await?;

        list.items
            .iter()
            .map(|obj| ObservedResource::from_dynamic(kind, obj))
            .collect()
    }

    #[instrument(skip(self), fields(child = %reference))]
    async fn get_child(&self, reference: &ChildResourceRef) -> Result<Option<ObservedResource>> {
        let obj = self
            .children(&reference.namespace, reference.kind)
            .get_opt(&reference.name)
            .await?;

        obj.map(|o| ObservedResource::from_dynamic(reference.kind, &o))
            .transpose()
    }

    #[instrument(skip(self, resource), fields(child = %resource.reference))]
    async fn create_child(&self, resource: &DesiredResource) -> Result<()> {
        let reference = &resource.reference;
        let pp = PostParams {
            field_manager: Some(OPERATOR_NAME.to_string()),
            ..Default::default()
        };
        self.children(&reference.namespace, reference.kind)
            .create(&pp, &resource.to_dynamic_object())
            .await?;
        Ok(())
    }

    #[instrument(skip(self, resource), fields(child = %resource.reference))]
    async fn update_child(&self, resource: &DesiredResource, resource_version: &str) -> Result<()> {
        let reference = &resource.reference;
        let mut obj = resource.to_dynamic_object();
        obj.metadata.resource_version = Some(resource_version.to_string());

        let pp = PostParams {
            field_manager: Some(OPERATOR_NAME.to_string()),
            ..Default::default()
        };
        self.children(&reference.namespace, reference.kind)
            .replace(&reference.name, &pp, &obj)
            .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(child = %reference))]
    async fn delete_child(&self, reference: &ChildResourceRef) -> Result<()> {
        self.children(&reference.namespace, reference.kind)
            .delete(&reference.name, &DeleteParams::background())
            .await?;
        Ok(())
    }
}
