//! The workload-source seam and the error taxonomy around it.

use crate::{Workload, WorkloadKind, WorkloadRef};

/// Failures reported by a [`WorkloadSource`].
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum SourceError {
    #[error("not found")]
    NotFound,
    #[error("source unavailable: {0}")]
    Unavailable(String),
    #[error("conflict: {0}")]
    Conflict(String),
}

/// Failures surfaced to callers of [`crate::GameServers`]. Expected outcomes
/// (not found, already in state) are values, not errors.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ServerError {
    #[error("workload source unavailable: {0}")]
    Unavailable(String),
    #[error("workload changed concurrently: {0}")]
    Conflict(String),
}

impl From<SourceError> for ServerError {
    fn from(e: SourceError) -> Self {
        match e {
            SourceError::Conflict(msg) => ServerError::Conflict(msg),
            SourceError::Unavailable(msg) => ServerError::Unavailable(msg),
            // Only lookups may legitimately report absence; elsewhere it means the source misbehaved.
            SourceError::NotFound => ServerError::Unavailable("unexpected not found".to_string()),
        }
    }
}

/// Where game-server workloads live. The Kubernetes API in production, an
/// in-memory fake in tests. Implementations own their concurrency discipline.
#[async_trait::async_trait]
pub trait WorkloadSource: Send + Sync {
    /// List workloads of `kind` in `namespace` whose `marker_key` label equals `marker_value`.
    async fn list_by_kind_and_marker(
        &self,
        namespace: &str,
        kind: WorkloadKind,
        marker_key: &str,
        marker_value: &str,
    ) -> Result<Vec<Workload>, SourceError>;

    /// Fetch one workload; `SourceError::NotFound` when absent.
    async fn get_by_name(&self, namespace: &str, name: &str, kind: WorkloadKind) -> Result<Workload, SourceError>;

    /// Request a new desired replica count.
    async fn set_desired_replicas(&self, target: &WorkloadRef, count: u32) -> Result<(), SourceError>;
}

#[async_trait::async_trait]
impl<S: WorkloadSource + ?Sized> WorkloadSource for std::sync::Arc<S> {
    async fn list_by_kind_and_marker(
        &self,
        namespace: &str,
        kind: WorkloadKind,
        marker_key: &str,
        marker_value: &str,
    ) -> Result<Vec<Workload>, SourceError> {
        (**self).list_by_kind_and_marker(namespace, kind, marker_key, marker_value).await
    }

    async fn get_by_name(&self, namespace: &str, name: &str, kind: WorkloadKind) -> Result<Workload, SourceError> {
        (**self).get_by_name(namespace, name, kind).await
    }

    async fn set_desired_replicas(&self, target: &WorkloadRef, count: u32) -> Result<(), SourceError> {
        (**self).set_desired_replicas(target, count).await
    }
}
