// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OperatorError {
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("Serialization failed: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Invalid policy for namespace {namespace}: {message}")]
    InvalidPolicy { namespace: String, message: String },

    #[error("Missing field: {0}")]
    MissingField(String),

    #[error("Resource {0} exists but is not managed by the operator")]
    ForeignResource(String),

    #[error("Resource {0} disappeared during reconciliation")]
    Vanished(String),

    #[error("Cleanup of namespace {namespace} still pending: {remaining} owned resources remain")]
    CleanupPending { namespace: String, remaining: usize },

    #[error("Operator is shutting down")]
    ShuttingDown,
}

impl OperatorError {
    /// Whether the failure is transient and a fresh pass may succeed.
    ///
    /// Kubernetes errors are retryable on conflicts, throttling, server-side
    /// failures and transport errors. Any other 4xx means the request itself
    /// is wrong (malformed body, permission denied) and is not retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            OperatorError::KubeError(kube::Error::Api(ae)) => {
                matches!(ae.code, 408 | 409 | 429) || ae.code >= 500
            }
            OperatorError::KubeError(kube::Error::SerdeError(_)) => false,
            OperatorError::KubeError(_) => true,
            OperatorError::SerializationError(_) => false,
            OperatorError::InvalidPolicy { .. } => false,
            OperatorError::MissingField(_) => false,
            OperatorError::ForeignResource(_) => false,
            OperatorError::Vanished(_) => true,
            OperatorError::CleanupPending { .. } => true,
            OperatorError::ShuttingDown => true,
        }
    }

    /// Short CamelCase reason used in status conditions
    pub fn reason(&self) -> &'static str {
        match self {
            OperatorError::KubeError(kube::Error::Api(ae)) => match ae.code {
                401 | 403 => "PermissionDenied",
                409 => "Conflict",
                429 => "Throttled",
                400 | 422 => "InvalidSpec",
                404 => "NotFound",
                _ => "ApiError",
            },
            OperatorError::KubeError(_) => "ApiError",
            OperatorError::SerializationError(_) => "InvalidSpec",
            OperatorError::InvalidPolicy { .. } => "InvalidPolicy",
            OperatorError::MissingField(_) => "InvalidObject",
            OperatorError::ForeignResource(_) => "NameConflict",
            OperatorError::Vanished(_) => "Vanished",
            OperatorError::CleanupPending { .. } => "CleanupPending",
            OperatorError::ShuttingDown => "ShuttingDown",
        }
    }
}

/// Returns true when the error is an API response with the given status code
pub fn is_api_status(err: &OperatorError, code: u16) -> bool {
    matches!(err, OperatorError::KubeError(kube::Error::Api(ae)) if ae.code == code)
}

/// Returns true when the error is an API response with the given reason
pub fn is_api_reason(err: &OperatorError, reason: &str) -> bool {
    matches!(err, OperatorError::KubeError(kube::Error::Api(ae)) if ae.reason == reason)
}

/// Outcome classification of a failed action.
///
/// The executor never retries on its own; the controller decides what to do
/// with each class.
#[derive(Error, Debug)]
pub enum ActionError {
    #[error("retryable failure on {target}: {source}")]
    Retryable {
        target: String,
        #[source]
        source: OperatorError,
    },

    #[error("fatal failure on {target}: {source}")]
    Fatal {
        target: String,
        #[source]
        source: OperatorError,
    },
}

impl ActionError {
    /// Classify an error raised while working on `target`
    pub fn classify(target: impl Into<String>, source: OperatorError) -> Self {
        let target = target.into();
        if source.is_retryable() {
            ActionError::Retryable { target, source }
        } else {
            ActionError::Fatal { target, source }
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, ActionError::Fatal { .. })
    }

    pub fn source_error(&self) -> &OperatorError {
        match self {
            ActionError::Retryable { source, .. } | ActionError::Fatal { source, .. } => source,
        }
    }

    /// Keep the more severe of two failures; fatal wins over retryable
    pub fn worst(self, other: ActionError) -> ActionError {
        if self.is_fatal() || !other.is_fatal() {
            self
        } else {
            other
        }
    }
}

pub type Result<T> = std::result::Result<T, OperatorError>;
