//! juicebot core types: game-server workloads and guild-scoped access control.

#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

pub mod mock;
pub mod servers;
pub mod source;

pub use servers::{GameServers, ListResult, Requester, ServerEntry, ToggleOutcome, ToggleResult};
pub use source::{ServerError, SourceError, WorkloadSource};

/// Label marking a workload as a bot-managed game server.
pub const MARKER_KEY: &str = "juicecloud.org/juicebot-game-server";
/// Value the marker label carries on listed workloads.
pub const MARKER_VALUE: &str = "true";
/// Annotation holding the comma-separated guild ids allowed to see/operate the workload.
pub const GUILDS_KEY: &str = "juicecloud.org/juicebot-guilds";
/// Label overriding the name shown to users.
pub const DISPLAY_NAME_KEY: &str = "app.kubernetes.io/name";

pub mod prelude {
    pub use super::{
        is_authorized, AccessControl, GameServers, Requester, ServerId, TargetState, ToggleOutcome, ToggleResult,
        Workload, WorkloadKind, WorkloadRef, WorkloadSource,
    };
}

/// Replica-controlled resource kinds a game server may be deployed as.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum WorkloadKind {
    Deployment,
    StatefulSet,
}

impl WorkloadKind {
    /// Lookup order used when resolving a server by name.
    pub const ALL: [WorkloadKind; 2] = [WorkloadKind::Deployment, WorkloadKind::StatefulSet];

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkloadKind::Deployment => "Deployment",
            WorkloadKind::StatefulSet => "StatefulSet",
        }
    }
}

impl fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// A game server as observed in the cluster. Fetched fresh per request, never cached.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Workload {
    pub namespace: String,
    pub name: String,
    pub kind: WorkloadKind,
    pub desired_replicas: u32,
    pub ready_replicas: u32,
    /// Labels merged with annotations (annotations win on collision).
    pub access_control: BTreeMap<String, String>,
    pub display_name: Option<String>,
    /// Opaque version used to make replica updates conditional.
    pub resource_version: Option<String>,
}

impl Workload {
    pub fn display_name(&self) -> &str { self.display_name.as_deref().unwrap_or(&self.name) }

    pub fn is_running(&self) -> bool { self.ready_replicas > 0 }

    pub fn to_ref(&self) -> WorkloadRef {
        WorkloadRef {
            namespace: self.namespace.clone(),
            name: self.name.clone(),
            kind: self.kind,
            resource_version: self.resource_version.clone(),
        }
    }
}

/// Address of a workload for mutation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkloadRef {
    pub namespace: String,
    pub name: String,
    pub kind: WorkloadKind,
    pub resource_version: Option<String>,
}

impl fmt::Display for WorkloadRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}/{}", self.namespace, self.name) }
}

/// Parsed view of a workload's access-control metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessControl {
    pub managed: bool,
    pub guilds: Vec<String>,
}

impl AccessControl {
    pub fn from_metadata(meta: &BTreeMap<String, String>) -> Self {
        let managed = meta.contains_key(MARKER_KEY);
        let guilds = meta
            .get(GUILDS_KEY)
            .map(|v| v.split(',').map(str::trim).filter(|g| !g.is_empty()).map(str::to_string).collect())
            .unwrap_or_default();
        Self { managed, guilds }
    }

    pub fn allows(&self, guild_id: &str) -> bool { self.managed && self.guilds.iter().any(|g| g == guild_id) }
}

/// Whether `guild_id` may see and operate a workload carrying `meta`.
///
/// Fails closed: without the marker key, or with no guild list, nobody is authorized.
/// Matching is exact and case-sensitive after trimming each list entry.
pub fn is_authorized(meta: &BTreeMap<String, String>, guild_id: &str) -> bool {
    if !meta.contains_key(MARKER_KEY) {
        return false;
    }
    match meta.get(GUILDS_KEY) {
        Some(list) => list.split(',').any(|g| g.trim() == guild_id),
        None => false,
    }
}

/// `namespace/name` identifier users type into `/servers start|stop`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServerId {
    pub namespace: String,
    pub name: String,
}

impl ServerId {
    pub fn parse(raw: &str) -> Option<Self> {
        let (namespace, name) = raw.trim().split_once('/')?;
        if namespace.is_empty() || name.is_empty() || name.contains('/') {
            return None;
        }
        Some(Self { namespace: namespace.to_string(), name: name.to_string() })
    }
}

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}/{}", self.namespace, self.name) }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TargetState {
    Running,
    Stopped,
}

impl TargetState {
    pub fn replicas(&self) -> u32 {
        match self {
            TargetState::Running => 1,
            TargetState::Stopped => 0,
        }
    }

    /// State implied by a desired replica count; anything scaled up counts as running.
    pub fn from_replicas(desired: u32) -> Self {
        if desired >= 1 { TargetState::Running } else { TargetState::Stopped }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};

    fn meta(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn authorized_when_guild_listed() {
        let m = meta(&[(MARKER_KEY, "true"), (GUILDS_KEY, "100, 200")]);
        assert!(is_authorized(&m, "100"));
        assert!(is_authorized(&m, "200"));
        assert!(!is_authorized(&m, "300"));
    }

    #[test]
    fn missing_marker_denies_everyone() {
        assert!(!is_authorized(&BTreeMap::new(), "100"));
        assert!(!is_authorized(&meta(&[("app", "minecraft"), ("tier", "gold")]), "100"));
        assert!(!is_authorized(&meta(&[(GUILDS_KEY, "100")]), "100"));
    }

    #[test]
    fn empty_or_absent_guild_list_denies() {
        assert!(!is_authorized(&meta(&[(MARKER_KEY, "true")]), "100"));
        assert!(!is_authorized(&meta(&[(MARKER_KEY, "true"), (GUILDS_KEY, "")]), ""));
        assert!(!is_authorized(&meta(&[(MARKER_KEY, "true"), (GUILDS_KEY, " , ,")]), "100"));
    }

    #[test]
    fn matching_is_exact_and_case_sensitive() {
        let m = meta(&[(MARKER_KEY, "true"), (GUILDS_KEY, "abc,1000")]);
        assert!(!is_authorized(&m, "ABC"));
        assert!(!is_authorized(&m, "100"));
        assert!(!is_authorized(&m, " abc"));
    }

    #[test]
    fn randomized_padding_and_order() {
        let mut rng = StdRng::seed_from_u64(0x6a75_6963_65);
        let pads = ["", " ", "  ", "\t", " \t "];
        for _ in 0..500 {
            let mut guilds: Vec<String> = (0..rng.random_range(1..6)).map(|_| rng.random_range(1..10_000u32).to_string()).collect();
            guilds.shuffle(&mut rng);
            let value = guilds
                .iter()
                .map(|g| format!("{}{}{}", pads[rng.random_range(0..pads.len())], g, pads[rng.random_range(0..pads.len())]))
                .collect::<Vec<_>>()
                .join(",");
            let with_marker = meta(&[(MARKER_KEY, "true"), (GUILDS_KEY, &value)]);
            let without_marker = meta(&[(GUILDS_KEY, &value)]);
            let probe = rng.random_range(1..10_000u32).to_string();
            assert_eq!(is_authorized(&with_marker, &probe), guilds.contains(&probe), "value={value:?} probe={probe}");
            for g in &guilds {
                assert!(is_authorized(&with_marker, g));
                assert!(!is_authorized(&without_marker, g));
            }
            assert_eq!(AccessControl::from_metadata(&with_marker).guilds, guilds);
        }
    }

    #[test]
    fn access_control_view_agrees_with_filter() {
        let m = meta(&[(MARKER_KEY, "true"), (GUILDS_KEY, " 1 ,2,,3 ")]);
        let ac = AccessControl::from_metadata(&m);
        assert!(ac.managed);
        assert_eq!(ac.guilds, vec!["1", "2", "3"]);
        for g in ["1", "2", "3", "4", ""] {
            assert_eq!(ac.allows(g), is_authorized(&m, g));
        }
    }

    #[test]
    fn server_id_parses_namespace_and_name() {
        let id = ServerId::parse("games/minecraft").expect("ok");
        assert_eq!(id.namespace, "games");
        assert_eq!(id.name, "minecraft");
        assert_eq!(id.to_string(), "games/minecraft");
    }

    #[test]
    fn server_id_rejects_malformed() {
        for raw in ["", "a", "a/b/c", "/b", "a/", "/"] {
            assert!(ServerId::parse(raw).is_none(), "{raw:?}");
        }
    }

    #[test]
    fn target_state_replicas() {
        assert_eq!(TargetState::Running.replicas(), 1);
        assert_eq!(TargetState::Stopped.replicas(), 0);
        assert_eq!(TargetState::from_replicas(0), TargetState::Stopped);
        assert_eq!(TargetState::from_replicas(3), TargetState::Running);
    }
}
