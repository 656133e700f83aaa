//! juicebot kubehub – Kubernetes-backed workload source for game servers.

#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::time::Instant;

use anyhow::{Context, Result};
use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::NamespaceResourceScope;
use kube::{
    api::{Api, ListParams, Patch, PatchParams},
    Client, Resource,
};
use metrics::histogram;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use juicebot_core::{SourceError, Workload, WorkloadKind, WorkloadRef, WorkloadSource, DISPLAY_NAME_KEY};

/// apps/v1 kinds that expose scale-to-zero through `spec.replicas`.
trait ReplicaControlled:
    Resource<Scope = NamespaceResourceScope, DynamicType = ()> + Clone + DeserializeOwned + Debug + Send + Sync + 'static
{
    const KIND: WorkloadKind;
    fn desired(&self) -> Option<i32>;
    fn ready(&self) -> Option<i32>;
}

impl ReplicaControlled for Deployment {
    const KIND: WorkloadKind = WorkloadKind::Deployment;
    fn desired(&self) -> Option<i32> { self.spec.as_ref().and_then(|s| s.replicas) }
    fn ready(&self) -> Option<i32> { self.status.as_ref().and_then(|s| s.ready_replicas) }
}

impl ReplicaControlled for StatefulSet {
    const KIND: WorkloadKind = WorkloadKind::StatefulSet;
    fn desired(&self) -> Option<i32> { self.spec.as_ref().and_then(|s| s.replicas) }
    fn ready(&self) -> Option<i32> { self.status.as_ref().and_then(|s| s.ready_replicas) }
}

/// Project a kube object into the core model. Unset `spec.replicas` defaults to 1 server-side.
fn to_workload<K: ReplicaControlled>(obj: &K) -> Workload {
    let meta = obj.meta();
    let mut access_control = BTreeMap::new();
    if let Some(labels) = &meta.labels {
        access_control.extend(labels.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    if let Some(annos) = &meta.annotations {
        access_control.extend(annos.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    let display_name = meta.labels.as_ref().and_then(|l| l.get(DISPLAY_NAME_KEY)).cloned();
    Workload {
        namespace: meta.namespace.clone().unwrap_or_default(),
        name: meta.name.clone().unwrap_or_default(),
        kind: K::KIND,
        desired_replicas: obj.desired().unwrap_or(1).max(0) as u32,
        ready_replicas: obj.ready().unwrap_or(0).max(0) as u32,
        access_control,
        display_name,
        resource_version: meta.resource_version.clone(),
    }
}

fn map_err(e: kube::Error) -> SourceError {
    match e {
        kube::Error::Api(ae) if ae.code == 404 => SourceError::NotFound,
        kube::Error::Api(ae) if ae.code == 409 => SourceError::Conflict(ae.message),
        other => SourceError::Unavailable(other.to_string()),
    }
}

/// Merge patch for `spec.replicas`; carrying the resourceVersion turns a concurrent edit into a 409.
fn replicas_patch(count: u32, resource_version: Option<&str>) -> serde_json::Value {
    let mut patch = serde_json::json!({ "spec": { "replicas": count } });
    if let Some(rv) = resource_version {
        patch["metadata"] = serde_json::json!({ "resourceVersion": rv });
    }
    patch
}

fn elapsed_ms(started: Instant) -> f64 { started.elapsed().as_secs_f64() * 1000.0 }

/// [`WorkloadSource`] over the cluster the process is configured for.
#[derive(Clone)]
pub struct KubeSource {
    client: Client,
}

impl KubeSource {
    pub fn new(client: Client) -> Self { Self { client } }

    /// Build a client from kubeconfig (or in-cluster config) and check the apiserver answers.
    pub async fn connect() -> Result<Self> {
        let client = Client::try_default().await.context("building kubernetes client")?;
        let version = client.apiserver_version().await.context("probing kubernetes apiserver")?;
        info!(version = %version.git_version, "connected to kubernetes");
        Ok(Self { client })
    }

    async fn list<K: ReplicaControlled>(&self, namespace: &str, selector: &str) -> Result<Vec<Workload>, SourceError> {
        let started = Instant::now();
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        let list = api.list(&ListParams::default().labels(selector)).await.map_err(map_err)?;
        histogram!("kube_request_ms", elapsed_ms(started), "op" => "list", "kind" => K::KIND.as_str());
        debug!(kind = %K::KIND, ns = %namespace, selector = %selector, count = list.items.len(), "listed");
        Ok(list.items.iter().map(to_workload).collect())
    }

    async fn get<K: ReplicaControlled>(&self, namespace: &str, name: &str) -> Result<Workload, SourceError> {
        let started = Instant::now();
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        let obj = api.get_opt(name).await.map_err(map_err)?;
        histogram!("kube_request_ms", elapsed_ms(started), "op" => "get", "kind" => K::KIND.as_str());
        obj.as_ref().map(to_workload).ok_or(SourceError::NotFound)
    }

    async fn scale<K: ReplicaControlled>(&self, target: &WorkloadRef, count: u32) -> Result<(), SourceError> {
        let started = Instant::now();
        let api: Api<K> = Api::namespaced(self.client.clone(), &target.namespace);
        let payload = replicas_patch(count, target.resource_version.as_deref());
        api.patch(&target.name, &PatchParams::default(), &Patch::Merge(&payload)).await.map_err(map_err)?;
        histogram!("kube_request_ms", elapsed_ms(started), "op" => "scale", "kind" => K::KIND.as_str());
        Ok(())
    }
}

#[async_trait::async_trait]
impl WorkloadSource for KubeSource {
    async fn list_by_kind_and_marker(
        &self,
        namespace: &str,
        kind: WorkloadKind,
        marker_key: &str,
        marker_value: &str,
    ) -> Result<Vec<Workload>, SourceError> {
        let selector = format!("{}={}", marker_key, marker_value);
        match kind {
            WorkloadKind::Deployment => self.list::<Deployment>(namespace, &selector).await,
            WorkloadKind::StatefulSet => self.list::<StatefulSet>(namespace, &selector).await,
        }
    }

    async fn get_by_name(&self, namespace: &str, name: &str, kind: WorkloadKind) -> Result<Workload, SourceError> {
        match kind {
            WorkloadKind::Deployment => self.get::<Deployment>(namespace, name).await,
            WorkloadKind::StatefulSet => self.get::<StatefulSet>(namespace, name).await,
        }
    }

    async fn set_desired_replicas(&self, target: &WorkloadRef, count: u32) -> Result<(), SourceError> {
        match target.kind {
            WorkloadKind::Deployment => self.scale::<Deployment>(target, count).await,
            WorkloadKind::StatefulSet => self.scale::<StatefulSet>(target, count).await,
        }
    }
}
