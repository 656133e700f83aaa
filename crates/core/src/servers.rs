//! Guild-scoped listing and start/stop of game servers.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::source::{ServerError, SourceError, WorkloadSource};
use crate::{is_authorized, ServerId, TargetState, Workload, WorkloadKind, MARKER_KEY, MARKER_VALUE};

/// Who is asking: the guild is the tenancy boundary, the user is recorded for audit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requester {
    pub guild_id: String,
    pub user_id: String,
}

impl Requester {
    pub fn new(guild_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self { guild_id: guild_id.into(), user_id: user_id.into() }
    }
}

/// One row of `/servers list`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerEntry {
    pub display_name: String,
    pub namespace: String,
    pub name: String,
    pub kind: WorkloadKind,
    pub running: bool,
    pub ready_replicas: u32,
    pub desired_replicas: u32,
}

impl From<&Workload> for ServerEntry {
    fn from(w: &Workload) -> Self {
        Self {
            display_name: w.display_name().to_string(),
            namespace: w.namespace.clone(),
            name: w.name.clone(),
            kind: w.kind,
            running: w.is_running(),
            ready_replicas: w.ready_replicas,
            desired_replicas: w.desired_replicas,
        }
    }
}

/// Servers visible to a guild, in source enumeration order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ListResult {
    pub servers: Vec<ServerEntry>,
}

impl ListResult {
    pub fn is_empty(&self) -> bool { self.servers.is_empty() }
    pub fn len(&self) -> usize { self.servers.len() }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ToggleOutcome {
    Started,
    Stopped,
    AlreadyInState,
    /// Absent, unauthorized, malformed or outside the managed namespace. Deliberately one case.
    NotFoundOrForbidden,
}

/// Outcome of a start/stop request. `server` echoes the identifier as requested.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToggleResult {
    pub server: String,
    pub target: TargetState,
    pub outcome: ToggleOutcome,
}

impl ToggleResult {
    fn new(server: impl Into<String>, target: TargetState, outcome: ToggleOutcome) -> Self {
        Self { server: server.into(), target, outcome }
    }

    /// Name part of `server` (the whole text when it has no `/`).
    pub fn name(&self) -> &str { self.server.rsplit_once('/').map(|(_, n)| n).unwrap_or(&self.server) }
}

/// Game-server registry over a [`WorkloadSource`], confined to one management namespace.
pub struct GameServers<S> {
    source: S,
    namespace: String,
}

impl<S: WorkloadSource> GameServers<S> {
    pub fn new(source: S, namespace: impl Into<String>) -> Self { Self { source, namespace: namespace.into() } }

    pub fn namespace(&self) -> &str { &self.namespace }

    pub fn source(&self) -> &S { &self.source }

    /// Every managed server of either kind the guild is authorized for.
    /// Unauthorized workloads are dropped silently; fetch failures propagate.
    pub async fn list(&self, guild_id: &str) -> Result<ListResult, ServerError> {
        let mut servers = Vec::new();
        for kind in WorkloadKind::ALL {
            let items = self.source.list_by_kind_and_marker(&self.namespace, kind, MARKER_KEY, MARKER_VALUE).await?;
            let total = items.len();
            servers.extend(items.iter().filter(|w| is_authorized(&w.access_control, guild_id)).map(ServerEntry::from));
            debug!(%kind, ns = %self.namespace, guild = %guild_id, total, "listed workloads");
        }
        Ok(ListResult { servers })
    }

    /// Start or stop the server named by a user-typed `namespace/name`.
    /// Unparseable input is reported as not found, before touching the source.
    pub async fn toggle(&self, raw_id: &str, who: &Requester, target: TargetState) -> Result<ToggleResult, ServerError> {
        match ServerId::parse(raw_id) {
            Some(id) => self.set_desired_state(&id.namespace, &id.name, who, target).await,
            None => {
                debug!(raw = %raw_id, guild = %who.guild_id, "malformed server id");
                Ok(ToggleResult::new(raw_id.trim(), target, ToggleOutcome::NotFoundOrForbidden))
            }
        }
    }

    pub async fn set_desired_state(
        &self,
        namespace: &str,
        name: &str,
        who: &Requester,
        target: TargetState,
    ) -> Result<ToggleResult, ServerError> {
        let server = format!("{}/{}", namespace, name);
        let not_found = || ToggleResult::new(server.clone(), target, ToggleOutcome::NotFoundOrForbidden);

        if namespace != self.namespace {
            debug!(ns = %namespace, managed = %self.namespace, "request outside managed namespace");
            return Ok(not_found());
        }
        if namespace.is_empty() || name.is_empty() || name.contains('/') {
            debug!(ns = %namespace, name = %name, "malformed server id");
            return Ok(not_found());
        }

        let Some(workload) = self.lookup(namespace, name).await? else {
            return Ok(not_found());
        };

        if !is_authorized(&workload.access_control, &who.guild_id) {
            warn!(
                target: "juicebot::audit",
                server = %server,
                user = %who.user_id,
                guild = %who.guild_id,
                ns = %namespace,
                name = %name,
                kind = %workload.kind,
                "unauthorized access to game server"
            );
            return Ok(not_found());
        }

        if TargetState::from_replicas(workload.desired_replicas) == target {
            return Ok(ToggleResult::new(server, target, ToggleOutcome::AlreadyInState));
        }

        let count = target.replicas();
        self.source.set_desired_replicas(&workload.to_ref(), count).await?;
        info!(
            user = %who.user_id,
            guild = %who.guild_id,
            ns = %namespace,
            name = %name,
            kind = %workload.kind,
            from = workload.desired_replicas,
            to = count,
            "scaled game server"
        );
        let outcome = match target {
            TargetState::Running => ToggleOutcome::Started,
            TargetState::Stopped => ToggleOutcome::Stopped,
        };
        Ok(ToggleResult::new(server, target, outcome))
    }

    /// Deployment first, then StatefulSet on absence. Other errors propagate.
    async fn lookup(&self, namespace: &str, name: &str) -> Result<Option<Workload>, SourceError> {
        for kind in WorkloadKind::ALL {
            match self.source.get_by_name(namespace, name, kind).await {
                Ok(w) => return Ok(Some(w)),
                Err(SourceError::NotFound) => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }
}
