//! In-memory [`WorkloadSource`] for tests and local runs without a cluster.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::source::{SourceError, WorkloadSource};
use crate::{Workload, WorkloadKind, WorkloadRef, GUILDS_KEY, MARKER_KEY, MARKER_VALUE};

/// Holds workloads in insertion order and records every call made against it.
#[derive(Default)]
pub struct MockSource {
    workloads: Mutex<Vec<Workload>>,
    updates: Mutex<Vec<(WorkloadRef, u32)>>,
    calls: AtomicUsize,
    fail_with: Mutex<Option<SourceError>>,
    fail_updates_with: Mutex<Option<SourceError>>,
}

impl MockSource {
    pub fn new(workloads: Vec<Workload>) -> Self {
        Self { workloads: Mutex::new(workloads), ..Default::default() }
    }

    /// Make every subsequent call fail with `err`.
    pub fn fail_with(&self, err: SourceError) { *self.fail_with.lock().unwrap() = Some(err); }

    /// Make only replica updates fail with `err`.
    pub fn fail_updates_with(&self, err: SourceError) { *self.fail_updates_with.lock().unwrap() = Some(err); }

    /// Total calls of any operation.
    pub fn calls(&self) -> usize { self.calls.load(Ordering::SeqCst) }

    /// Replica updates issued so far, oldest first.
    pub fn updates(&self) -> Vec<(WorkloadRef, u32)> { self.updates.lock().unwrap().clone() }

    pub fn workload(&self, namespace: &str, name: &str) -> Option<Workload> {
        self.workloads.lock().unwrap().iter().find(|w| w.namespace == namespace && w.name == name).cloned()
    }

    fn enter(&self) -> Result<(), SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.fail_with.lock().unwrap().clone() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[async_trait::async_trait]
impl WorkloadSource for MockSource {
    async fn list_by_kind_and_marker(
        &self,
        namespace: &str,
        kind: WorkloadKind,
        marker_key: &str,
        marker_value: &str,
    ) -> Result<Vec<Workload>, SourceError> {
        self.enter()?;
        let items = self.workloads.lock().unwrap();
        Ok(items
            .iter()
            .filter(|w| w.namespace == namespace && w.kind == kind)
            .filter(|w| w.access_control.get(marker_key).map(|v| v == marker_value).unwrap_or(false))
            .cloned()
            .collect())
    }

    async fn get_by_name(&self, namespace: &str, name: &str, kind: WorkloadKind) -> Result<Workload, SourceError> {
        self.enter()?;
        let items = self.workloads.lock().unwrap();
        items
            .iter()
            .find(|w| w.namespace == namespace && w.name == name && w.kind == kind)
            .cloned()
            .ok_or(SourceError::NotFound)
    }

    async fn set_desired_replicas(&self, target: &WorkloadRef, count: u32) -> Result<(), SourceError> {
        self.enter()?;
        if let Some(e) = self.fail_updates_with.lock().unwrap().clone() {
            return Err(e);
        }
        let mut items = self.workloads.lock().unwrap();
        let w = items
            .iter_mut()
            .find(|w| w.namespace == target.namespace && w.name == target.name && w.kind == target.kind)
            .ok_or(SourceError::NotFound)?;
        w.desired_replicas = count;
        self.updates.lock().unwrap().push((target.clone(), count));
        Ok(())
    }
}

/// Builder for test workloads carrying the managed-server marker.
pub fn game_server(namespace: &str, name: &str, kind: WorkloadKind, guilds: Option<&str>) -> Workload {
    let mut access_control = std::collections::BTreeMap::new();
    access_control.insert(MARKER_KEY.to_string(), MARKER_VALUE.to_string());
    if let Some(g) = guilds {
        access_control.insert(GUILDS_KEY.to_string(), g.to_string());
    }
    Workload {
        namespace: namespace.to_string(),
        name: name.to_string(),
        kind,
        desired_replicas: 0,
        ready_replicas: 0,
        access_control,
        display_name: None,
        resource_version: None,
    }
}
