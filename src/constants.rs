// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

/// Label keys used to mark namespaces and child resources owned by the operator
pub mod labels {
    /// Ownership label, set on managed namespaces and every child resource
    pub const MANAGED_BY: &str = "managed-by";
    pub const MANAGED_BY_VALUE: &str = "namespace-operator";
    /// Team that owns a namespace created from a NamespaceSet
    pub const OWNER_TEAM: &str = "owner-team";
    /// Namespace suffix within the team (e.g. "dev", "prod")
    pub const NS_TYPE: &str = "ns-type";
    /// Name of the NamespaceSet a namespace was created for
    pub const NAMESPACE_SET: &str = "namespace-operator.example.com/namespace-set";
}

/// Annotation keys read and written by the operator
pub mod annotations {
    /// Hash of the desired body, stored on each child resource
    pub const SPEC_HASH: &str = "namespace-operator.example.com/spec-hash";
    /// JSON object of hard limits for the namespace ResourceQuota
    pub const RESOURCE_QUOTA: &str = "namespace-operator.example.com/resource-quota";
    /// JSON object of default container limits for the namespace LimitRange
    pub const LIMIT_RANGE: &str = "namespace-operator.example.com/limit-range";
    /// JSON object of string values for the bootstrap ConfigMap
    pub const BOOTSTRAP_CONFIG: &str = "namespace-operator.example.com/bootstrap-config";
    /// Comma-separated groups bound to the `admin` ClusterRole
    pub const ADMIN_GROUPS: &str = "namespace-operator.example.com/admin-groups";
    /// When "true", only same-namespace ingress is allowed
    pub const NETWORK_ISOLATION: &str = "namespace-operator.example.com/network-isolation";
}

/// Names of the child resources derived for each namespace
pub mod children {
    pub const RESOURCE_QUOTA_PREFIX: &str = "rq-";
    pub const LIMIT_RANGE: &str = "default-limits";
    pub const BOOTSTRAP_CONFIG: &str = "namespace-bootstrap";
    pub const ADMIN_BINDING: &str = "namespace-admins";
    pub const ADMIN_CLUSTER_ROLE: &str = "admin";
    pub const ISOLATION_POLICY: &str = "default-isolation";
}

/// The operator name used as field manager on writes
pub const OPERATOR_NAME: &str = "namespace-operator";

/// Finalizer placed on every namespace the operator manages
pub const FINALIZER: &str = "namespace-operator.example.com/cleanup";

/// Status condition type written on namespaces
pub const CONDITION_TYPE: &str = "NamespaceOperatorReconciled";

/// Namespaces that are never reconciled unless configured otherwise
pub const DEFAULT_EXCLUDED_NAMESPACES: &[&str] = &["kube-system", "kube-public", "kube-node-lease"];

/// CRD polling configuration
pub mod crd {
    /// Initial polling interval in seconds when waiting for CRD
    pub const POLL_INTERVAL_SECS: u64 = 10;
    /// Maximum polling interval in seconds (exponential backoff cap)
    pub const POLL_MAX_INTERVAL_SECS: u64 = 60;
}

/// Reconciliation retry defaults
pub mod retry {
    pub const MAX_ATTEMPTS: u32 = 8;
    pub const INITIAL_DELAY_MS: u64 = 500;
    pub const MAX_DELAY_SECS: u64 = 300;
    pub const MULTIPLIER: f64 = 2.0;
}
