// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Test utilities: a mock HTTP service behind a kube `Client`, and an
//! in-memory `ClusterApi` for exercising the reconciliation engine.

use crate::constants::{CONDITION_TYPE, FINALIZER};
use crate::error::{OperatorError, Result};
use crate::kubernetes::ClusterApi;
use crate::types::{ChildResourceRef, DesiredResource, ObservedResource, ResourceKey, ResourceKind};
use async_trait::async_trait;
use http::{Request, Response};
use k8s_openapi::api::core::v1::{Namespace, NamespaceCondition, NamespaceStatus};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::api::ObjectMeta;
use kube::client::Body;
use kube::error::ErrorResponse;
use kube::Client;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;
use tower::Service;

/// A mock HTTP service that returns predefined responses based on request paths.
#[derive(Clone)]
pub struct MockService {
    responses: Arc<Mutex<HashMap<(String, String), (u16, String)>>>,
    requests: Arc<Mutex<Vec<(String, String)>>>,
}

impl MockService {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(HashMap::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn on(self, method: &str, path: &str, status: u16, body: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert((method.to_string(), path.to_string()), (status, body.to_string()));
        self
    }

    /// Add a response for GET requests matching the exact path
    pub fn on_get(self, path: &str, status: u16, body: &str) -> Self {
        self.on("GET", path, status, body)
    }

    /// Add a response for POST requests matching the exact path
    pub fn on_post(self, path: &str, status: u16, body: &str) -> Self {
        self.on("POST", path, status, body)
    }

    pub fn on_patch(self, path: &str, status: u16, body: &str) -> Self {
        self.on("PATCH", path, status, body)
    }

    pub fn on_delete(self, path: &str, status: u16, body: &str) -> Self {
        self.on("DELETE", path, status, body)
    }

    /// Method and path of every request seen so far
    pub fn requests(&self) -> Vec<(String, String)> {
        self.requests.lock().unwrap().clone()
    }

    /// Build a kube Client from this mock service
    pub fn into_client(self) -> Client {
        Client::new(self, "https://kubernetes.default.svc")
    }

    fn find_response(&self, method: &str, path: &str) -> Option<(u16, String)> {
        let responses = self.responses.lock().unwrap();

        if let Some(resp) = responses.get(&(method.to_string(), path.to_string())) {
            return Some(resp.clone());
        }

        // Try prefix match for paths like /api/v1/namespaces/foo
        for ((m, p), resp) in responses.iter() {
            if m == method && path.starts_with(p) {
                return Some(resp.clone());
            }
        }

        None
    }
}

impl Default for MockService {
    fn default() -> Self {
        Self::new()
    }
}

impl Service<Request<Body>> for MockService {
    type Response = Response<Body>;
    type Error = tower::BoxError;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = std::result::Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<std::result::Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let method = req.method().to_string();
        let path = req.uri().path().to_string();

        self.requests
            .lock()
            .unwrap()
            .push((method.clone(), path.clone()));
        let response = self.find_response(&method, &path);

        Box::pin(async move {
            let (status, body) = response.unwrap_or_else(|| (404, not_found_json("resource", &path)));
            Ok(Response::builder()
                .status(status)
                .header("content-type", "application/json")
                .body(Body::from(body.into_bytes()))
                .unwrap())
        })
    }
}

/// Create a mock namespace JSON response
pub fn namespace_json(name: &str) -> String {
    serde_json::json!({
        "apiVersion": "v1",
        "kind": "Namespace",
        "metadata": {
            "name": name,
            "uid": "test-uid",
            "resourceVersion": "1"
        }
    })
    .to_string()
}

/// Create a 404 not found response
pub fn not_found_json(resource: &str, name: &str) -> String {
    serde_json::json!({
        "kind": "Status",
        "apiVersion": "v1",
        "status": "Failure",
        "message": format!("{} \"{}\" not found", resource, name),
        "reason": "NotFound",
        "code": 404
    })
    .to_string()
}

/// An API error as the kube client would report it
pub fn api_error(code: u16, reason: &str) -> OperatorError {
    OperatorError::KubeError(kube::Error::Api(ErrorResponse {
        status: "Failure".to_string(),
        message: format!("{} ({})", reason, code),
        reason: reason.to_string(),
        code,
    }))
}

/// Calls a `FakeCluster` can be told to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    GetNamespace,
    SetFinalizers,
    SetCondition,
    List,
    Get,
    Create,
    Update,
    Delete,
}

struct Failure {
    verb: Verb,
    namespace: String,
    code: u16,
    reason: String,
    remaining: Option<u32>,
}

struct StoredChild {
    body: Value,
    spec_hash: Option<String>,
    owned: bool,
    resource_version: u64,
}

#[derive(Default)]
struct FakeState {
    namespaces: BTreeMap<String, Namespace>,
    children: BTreeMap<ResourceKey, StoredChild>,
    next_version: u64,
    failures: Vec<Failure>,
    child_writes: Vec<String>,
    in_flight: HashMap<String, usize>,
    max_in_flight: HashMap<String, usize>,
}

impl FakeState {
    fn bump(&mut self) -> u64 {
        self.next_version += 1;
        self.next_version
    }

    fn take_failure(&mut self, verb: Verb, namespace: &str) -> Option<OperatorError> {
        let idx = self
            .failures
            .iter()
            .position(|f| f.verb == verb && f.namespace == namespace)?;
        let failure = &mut self.failures[idx];
        let err = api_error(failure.code, &failure.reason);
        if let Some(remaining) = failure.remaining.as_mut() {
            *remaining -= 1;
            if *remaining == 0 {
                self.failures.remove(idx);
            }
        }
        Some(err)
    }

    fn observed(&self, key: &ResourceKey, child: &StoredChild) -> ObservedResource {
        ObservedResource {
            reference: ChildResourceRef {
                kind: key.kind,
                name: key.name.clone(),
                namespace: key.namespace.clone(),
                spec_hash: child.spec_hash.clone(),
            },
            resource_version: Some(child.resource_version.to_string()),
            owned: child.owned,
        }
    }
}

/// In-memory cluster implementing `ClusterApi`.
///
/// Mimics the API server behaviors the engine relies on: resourceVersion
/// conflicts, AlreadyExists/NotFound, refusing creates in terminating
/// namespaces, and purging a terminating namespace once its finalizers are gone.
pub struct FakeCluster {
    state: Mutex<FakeState>,
    latency: Duration,
}

impl Default for FakeCluster {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeCluster {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeState::default()),
            latency: Duration::ZERO,
        }
    }

    /// Delay child writes, to observe overlapping passes
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn add_namespace(&self, name: &str, annotations: &[(&str, &str)]) {
        let mut state = self.state.lock().unwrap();
        let version = state.bump();
        let ns = Namespace {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                resource_version: Some(version.to_string()),
                annotations: Some(
                    annotations
                        .iter()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect(),
                ),
                ..Default::default()
            },
            ..Default::default()
        };
        state.namespaces.insert(name.to_string(), ns);
    }

    pub fn set_annotation(&self, name: &str, key: &str, value: Option<&str>) {
        let mut state = self.state.lock().unwrap();
        let version = state.bump();
        if let Some(ns) = state.namespaces.get_mut(name) {
            let annotations = ns.metadata.annotations.get_or_insert_with(BTreeMap::new);
            match value {
                Some(v) => annotations.insert(key.to_string(), v.to_string()),
                None => annotations.remove(key),
            };
            ns.metadata.resource_version = Some(version.to_string());
        }
    }

    pub fn set_label(&self, name: &str, key: &str, value: &str) {
        let mut state = self.state.lock().unwrap();
        let version = state.bump();
        if let Some(ns) = state.namespaces.get_mut(name) {
            ns.metadata
                .labels
                .get_or_insert_with(BTreeMap::new)
                .insert(key.to_string(), value.to_string());
            ns.metadata.resource_version = Some(version.to_string());
        }
    }

    /// Request deletion; purges immediately when no finalizer is present
    pub fn mark_for_deletion(&self, name: &str) {
        let mut state = self.state.lock().unwrap();
        let version = state.bump();
        let purge = match state.namespaces.get_mut(name) {
            Some(ns) => {
                ns.metadata.deletion_timestamp = Some(Time(k8s_openapi::chrono::Utc::now()));
                ns.metadata.resource_version = Some(version.to_string());
                ns.metadata.finalizers.as_ref().map_or(true, |f| f.is_empty())
            }
            None => false,
        };
        if purge {
            state.namespaces.remove(name);
        }
    }

    pub fn namespace(&self, name: &str) -> Option<Namespace> {
        self.state.lock().unwrap().namespaces.get(name).cloned()
    }

    pub fn has_finalizer(&self, name: &str) -> bool {
        self.namespace(name)
            .and_then(|ns| ns.metadata.finalizers)
            .is_some_and(|f| f.iter().any(|x| x == FINALIZER))
    }

    pub fn condition(&self, name: &str) -> Option<NamespaceCondition> {
        self.namespace(name)
            .and_then(|ns| ns.status)
            .and_then(|s| s.conditions)
            .and_then(|c| c.into_iter().find(|c| c.type_ == CONDITION_TYPE))
    }

    /// Seed a child resource directly, bypassing the operator
    pub fn insert_child(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
        spec_hash: Option<&str>,
        owned: bool,
    ) {
        let mut state = self.state.lock().unwrap();
        let version = state.bump();
        state.children.insert(
            ResourceKey {
                kind,
                namespace: namespace.to_string(),
                name: name.to_string(),
            },
            StoredChild {
                body: Value::Null,
                spec_hash: spec_hash.map(str::to_string),
                owned,
                resource_version: version,
            },
        );
    }

    /// Every child in a namespace, owned or not
    pub fn children(&self, namespace: &str) -> Vec<ObservedResource> {
        let state = self.state.lock().unwrap();
        state
            .children
            .iter()
            .filter(|(k, _)| k.namespace == namespace)
            .map(|(k, c)| state.observed(k, c))
            .collect()
    }

    pub fn child_body(&self, kind: ResourceKind, namespace: &str, name: &str) -> Option<Value> {
        let key = ResourceKey {
            kind,
            namespace: namespace.to_string(),
            name: name.to_string(),
        };
        self.state
            .lock()
            .unwrap()
            .children
            .get(&key)
            .map(|c| c.body.clone())
    }

    /// Fail `verb` calls for `namespace`; `times = None` fails forever
    pub fn fail(&self, verb: Verb, namespace: &str, code: u16, reason: &str, times: Option<u32>) {
        self.state.lock().unwrap().failures.push(Failure {
            verb,
            namespace: namespace.to_string(),
            code,
            reason: reason.to_string(),
            remaining: times,
        });
    }

    pub fn clear_failures(&self) {
        self.state.lock().unwrap().failures.clear();
    }

    /// Successful child create/update/delete calls, in order
    pub fn child_writes(&self) -> Vec<String> {
        self.state.lock().unwrap().child_writes.clone()
    }

    /// Highest number of overlapping child writes seen for a namespace
    pub fn max_in_flight(&self, namespace: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .max_in_flight
            .get(namespace)
            .copied()
            .unwrap_or(0)
    }

    async fn enter(&self, namespace: &str) {
        {
            let mut state = self.state.lock().unwrap();
            let current = state.in_flight.entry(namespace.to_string()).or_insert(0);
            *current += 1;
            let current = *current;
            let max = state.max_in_flight.entry(namespace.to_string()).or_insert(0);
            *max = (*max).max(current);
        }
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    fn exit(&self, namespace: &str) {
        let mut state = self.state.lock().unwrap();
        if let Some(current) = state.in_flight.get_mut(namespace) {
            *current -= 1;
        }
    }

    fn write_child(
        &self,
        verb: Verb,
        resource: Option<&DesiredResource>,
        reference: &ChildResourceRef,
        resource_version: Option<&str>,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(err) = state.take_failure(verb, &reference.namespace) {
            return Err(err);
        }
        let key = reference.key();

        match verb {
            Verb::Create => {
                let Some(ns) = state.namespaces.get(&reference.namespace) else {
                    return Err(api_error(404, "NotFound"));
                };
                if ns.metadata.deletion_timestamp.is_some() {
                    return Err(api_error(403, "Forbidden"));
                }
                if state.children.contains_key(&key) {
                    return Err(api_error(409, "AlreadyExists"));
                }
            }
            Verb::Update => {
                let Some(existing) = state.children.get(&key) else {
                    return Err(api_error(404, "NotFound"));
                };
                if resource_version != Some(existing.resource_version.to_string().as_str()) {
                    return Err(api_error(409, "Conflict"));
                }
            }
            Verb::Delete => {
                if state.children.remove(&key).is_none() {
                    return Err(api_error(404, "NotFound"));
                }
                state.child_writes.push(format!("delete {}", reference));
                return Ok(());
            }
            _ => unreachable!("not a child write"),
        }

        let version = state.bump();
        let Some(resource) = resource else {
            unreachable!("create and update carry a body");
        };
        state.children.insert(
            key,
            StoredChild {
                body: resource.body.clone(),
                spec_hash: resource.reference.spec_hash.clone(),
                owned: true,
                resource_version: version,
            },
        );
        let verb = if verb == Verb::Create { "create" } else { "update" };
        state.child_writes.push(format!("{} {}", verb, reference));
        Ok(())
    }
}

#[async_trait]
impl ClusterApi for FakeCluster {
    async fn get_namespace(&self, name: &str) -> Result<Option<Namespace>> {
        let mut state = self.state.lock().unwrap();
        if let Some(err) = state.take_failure(Verb::GetNamespace, name) {
            return Err(err);
        }
        Ok(state.namespaces.get(name).cloned())
    }

    async fn set_namespace_finalizers(
        &self,
        name: &str,
        finalizers: Vec<String>,
        resource_version: Option<&str>,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(err) = state.take_failure(Verb::SetFinalizers, name) {
            return Err(err);
        }
        let version = state.bump();
        let Some(ns) = state.namespaces.get_mut(name) else {
            return Err(api_error(404, "NotFound"));
        };
        if resource_version.is_some() && resource_version != ns.metadata.resource_version.as_deref() {
            return Err(api_error(409, "Conflict"));
        }
        let purge = ns.metadata.deletion_timestamp.is_some() && finalizers.is_empty();
        ns.metadata.finalizers = Some(finalizers);
        ns.metadata.resource_version = Some(version.to_string());
        if purge {
            state.namespaces.remove(name);
        }
        Ok(())
    }

    async fn set_namespace_condition(
        &self,
        name: &str,
        condition: NamespaceCondition,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(err) = state.take_failure(Verb::SetCondition, name) {
            return Err(err);
        }
        let Some(ns) = state.namespaces.get_mut(name) else {
            return Err(api_error(404, "NotFound"));
        };
        let conditions = ns
            .status
            .get_or_insert_with(NamespaceStatus::default)
            .conditions
            .get_or_insert_with(Vec::new);
        conditions.retain(|c| c.type_ != condition.type_);
        conditions.push(condition);
        Ok(())
    }

    async fn list_owned(&self, namespace: &str, kind: ResourceKind) -> Result<Vec<ObservedResource>> {
        let mut state = self.state.lock().unwrap();
        if let Some(err) = state.take_failure(Verb::List, namespace) {
            return Err(err);
        }
        Ok(state
            .children
            .iter()
            .filter(|(k, c)| k.namespace == namespace && k.kind == kind && c.owned)
            .map(|(k, c)| state.observed(k, c))
            .collect())
    }

    async fn get_child(&self, reference: &ChildResourceRef) -> Result<Option<ObservedResource>> {
        let mut state = self.state.lock().unwrap();
        if let Some(err) = state.take_failure(Verb::Get, &reference.namespace) {
            return Err(err);
        }
        let key = reference.key();
        Ok(state.children.get(&key).map(|c| state.observed(&key, c)))
    }

    async fn create_child(&self, resource: &DesiredResource) -> Result<()> {
        let reference = &resource.reference;
        self.enter(&reference.namespace).await;
        let result = self.write_child(Verb::Create, Some(resource), reference, None);
        self.exit(&reference.namespace);
        result
    }

    async fn update_child(&self, resource: &DesiredResource, resource_version: &str) -> Result<()> {
        let reference = &resource.reference;
        self.enter(&reference.namespace).await;
        let result =
            self.write_child(Verb::Update, Some(resource), reference, Some(resource_version));
        self.exit(&reference.namespace);
        result
    }

    async fn delete_child(&self, reference: &ChildResourceRef) -> Result<()> {
        self.enter(&reference.namespace).await;
        let result = self.write_child(Verb::Delete, None, reference, None);
        self.exit(&reference.namespace);
        result
    }
}
