// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes utilities for the cluster API boundary, CRD discovery, and namespace management.

pub mod api;
pub mod crd;
pub mod namespaces;

pub use api::{list_all_owned, ClusterApi, KubeClusterApi};
pub use crd::wait_for_namespace_set_crd;
pub use namespaces::{delete_namespace, ensure_managed_namespace, list_set_namespaces};
