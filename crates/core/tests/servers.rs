#![forbid(unsafe_code)]

use std::io::Write;
use std::sync::{Arc, Mutex};

use juicebot_core::mock::{game_server, MockSource};
use juicebot_core::prelude::*;
use juicebot_core::{ServerError, SourceError, ToggleOutcome, DISPLAY_NAME_KEY, MARKER_KEY};

fn who(guild: &str) -> Requester { Requester::new(guild, "42") }

fn minecraft() -> Workload { game_server("games", "minecraft", WorkloadKind::Deployment, Some("100, 200")) }

fn registry(workloads: Vec<Workload>) -> GameServers<MockSource> { GameServers::new(MockSource::new(workloads), "games") }

#[tokio::test]
async fn start_scales_to_one() {
    let gs = registry(vec![minecraft()]);
    let res = gs.set_desired_state("games", "minecraft", &who("100"), TargetState::Running).await.unwrap();
    assert_eq!(res.outcome, ToggleOutcome::Started);
    assert_eq!(res.server, "games/minecraft");
    let updates = gs.source().updates();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].0.name, "minecraft");
    assert_eq!(updates[0].0.kind, WorkloadKind::Deployment);
    assert_eq!(updates[0].1, 1);
}

#[tokio::test]
async fn unauthorized_guild_gets_not_found_and_no_update() {
    let gs = registry(vec![minecraft()]);
    let res = gs.set_desired_state("games", "minecraft", &who("300"), TargetState::Running).await.unwrap();
    assert_eq!(res.outcome, ToggleOutcome::NotFoundOrForbidden);
    assert!(gs.source().updates().is_empty());
    assert_eq!(gs.source().workload("games", "minecraft").unwrap().desired_replicas, 0);
}

#[tokio::test]
async fn foreign_namespace_never_reaches_source() {
    let gs = registry(vec![minecraft()]);
    for target in [TargetState::Running, TargetState::Stopped] {
        let res = gs.set_desired_state("other", "minecraft", &who("100"), target).await.unwrap();
        assert_eq!(res.outcome, ToggleOutcome::NotFoundOrForbidden);
    }
    assert_eq!(gs.source().calls(), 0);
}

#[tokio::test]
async fn malformed_id_never_reaches_source() {
    let gs = registry(vec![minecraft()]);
    for raw in ["minecraft", "games/minecraft/extra", "/minecraft", "games/"] {
        let res = gs.toggle(raw, &who("100"), TargetState::Running).await.unwrap();
        assert_eq!(res.outcome, ToggleOutcome::NotFoundOrForbidden, "{raw}");
    }
    assert_eq!(gs.source().calls(), 0);
}

#[tokio::test]
async fn malformed_name_never_reaches_source() {
    let gs = registry(vec![minecraft()]);
    for name in ["", "a/b", "games/minecraft"] {
        let res = gs.set_desired_state("games", name, &who("100"), TargetState::Running).await.unwrap();
        assert_eq!(res.outcome, ToggleOutcome::NotFoundOrForbidden, "{name:?}");
    }
    assert_eq!(gs.source().calls(), 0);
    assert!(gs.source().updates().is_empty());
}

/// Shared log buffer for asserting on emitted events.
#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl Write for Captured {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }
    fn flush(&mut self) -> std::io::Result<()> { Ok(()) }
}

impl Captured {
    fn audit_lines(&self) -> Vec<String> {
        let text = String::from_utf8(self.0.lock().unwrap().clone()).unwrap();
        text.lines().filter(|l| l.contains("juicebot::audit")).map(str::to_string).collect()
    }
}

fn capture() -> (Captured, tracing::subscriber::DefaultGuard) {
    let buf = Captured::default();
    let writer = buf.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_target(true)
        .with_max_level(tracing::Level::TRACE)
        .finish();
    (buf, tracing::subscriber::set_default(subscriber))
}

#[tokio::test]
async fn unauthorized_access_is_audited() {
    let (logs, _guard) = capture();
    let gs = registry(vec![minecraft()]);
    gs.set_desired_state("games", "minecraft", &who("300"), TargetState::Running).await.unwrap();
    let lines = logs.audit_lines();
    assert_eq!(lines.len(), 1, "{lines:?}");
    let line = &lines[0];
    assert!(line.contains("WARN"), "{line}");
    assert!(line.contains("server=games/minecraft"), "{line}");
    assert!(line.contains("user=42"), "{line}");
    assert!(line.contains("guild=300"), "{line}");
    assert!(line.contains("kind=Deployment"), "{line}");
}

#[tokio::test]
async fn authorized_access_is_not_audited() {
    let (logs, _guard) = capture();
    let gs = registry(vec![minecraft()]);
    let res = gs.set_desired_state("games", "minecraft", &who("100"), TargetState::Running).await.unwrap();
    assert_eq!(res.outcome, ToggleOutcome::Started);
    gs.set_desired_state("games", "minecraft", &who("200"), TargetState::Running).await.unwrap();
    gs.set_desired_state("games", "absent", &who("100"), TargetState::Running).await.unwrap();
    assert!(logs.audit_lines().is_empty());
}

#[tokio::test]
async fn stop_twice_is_idempotent() {
    let mut w = minecraft();
    w.desired_replicas = 1;
    w.ready_replicas = 1;
    let gs = registry(vec![w]);
    let first = gs.toggle("games/minecraft", &who("200"), TargetState::Stopped).await.unwrap();
    assert_eq!(first.outcome, ToggleOutcome::Stopped);
    assert_eq!(gs.source().updates().len(), 1);
    let second = gs.toggle("games/minecraft", &who("200"), TargetState::Stopped).await.unwrap();
    assert_eq!(second.outcome, ToggleOutcome::AlreadyInState);
    assert_eq!(gs.source().updates().len(), 1);
}

#[tokio::test]
async fn scaled_up_server_counts_as_running() {
    let mut w = minecraft();
    w.desired_replicas = 3;
    let gs = registry(vec![w]);
    let res = gs.toggle("games/minecraft", &who("100"), TargetState::Running).await.unwrap();
    assert_eq!(res.outcome, ToggleOutcome::AlreadyInState);
    assert!(gs.source().updates().is_empty());
}

#[tokio::test]
async fn missing_and_forbidden_are_indistinguishable() {
    let absent = registry(vec![]);
    let forbidden = registry(vec![game_server("games", "other-guilds-server", WorkloadKind::StatefulSet, Some("999"))]);
    for target in [TargetState::Running, TargetState::Stopped] {
        let a = absent.toggle("games/other-guilds-server", &who("100"), target).await.unwrap();
        let b = forbidden.toggle("games/other-guilds-server", &who("100"), target).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.outcome, ToggleOutcome::NotFoundOrForbidden);
        assert_eq!(format!("{a:?}"), format!("{b:?}"));
    }
    let missing = absent.toggle("games/missing", &who("100"), TargetState::Running).await.unwrap();
    assert_eq!(missing.outcome, ToggleOutcome::NotFoundOrForbidden);
    assert!(forbidden.source().updates().is_empty());
}

#[tokio::test]
async fn unmarked_workload_is_forbidden_even_with_guild_list() {
    let mut w = minecraft();
    w.access_control.remove(MARKER_KEY);
    let gs = registry(vec![w]);
    let res = gs.toggle("games/minecraft", &who("100"), TargetState::Running).await.unwrap();
    assert_eq!(res.outcome, ToggleOutcome::NotFoundOrForbidden);
    assert!(gs.source().updates().is_empty());
}

#[tokio::test]
async fn falls_back_to_statefulset() {
    let gs = registry(vec![game_server("games", "valheim", WorkloadKind::StatefulSet, Some("100"))]);
    let res = gs.toggle("games/valheim", &who("100"), TargetState::Running).await.unwrap();
    assert_eq!(res.outcome, ToggleOutcome::Started);
    // Deployment miss, StatefulSet hit, update.
    assert_eq!(gs.source().calls(), 3);
    assert_eq!(gs.source().updates()[0].0.kind, WorkloadKind::StatefulSet);
}

#[tokio::test]
async fn update_failure_propagates() {
    let gs = registry(vec![minecraft()]);
    gs.source().fail_updates_with(SourceError::Conflict("resourceVersion mismatch".into()));
    let err = gs.toggle("games/minecraft", &who("100"), TargetState::Running).await.unwrap_err();
    assert!(matches!(err, ServerError::Conflict(_)));
}

#[tokio::test]
async fn lookup_failure_propagates() {
    let gs = registry(vec![minecraft()]);
    gs.source().fail_with(SourceError::Unavailable("connection refused".into()));
    let err = gs.toggle("games/minecraft", &who("100"), TargetState::Running).await.unwrap_err();
    assert_eq!(err, ServerError::Unavailable("connection refused".into()));
}

#[tokio::test]
async fn list_keeps_only_authorized_in_source_order() {
    let mut fancy = game_server("games", "factorio", WorkloadKind::Deployment, Some(" 100 "));
    fancy.display_name = Some("Factorio".into());
    fancy.access_control.insert(DISPLAY_NAME_KEY.into(), "Factorio".into());
    fancy.desired_replicas = 1;
    fancy.ready_replicas = 1;
    let workloads = vec![
        game_server("games", "minecraft", WorkloadKind::Deployment, Some("200")),
        fancy,
        game_server("games", "terraria", WorkloadKind::Deployment, None),
        game_server("games", "valheim", WorkloadKind::StatefulSet, Some("300,100")),
        game_server("games", "rust", WorkloadKind::StatefulSet, Some("1000")),
    ];
    let gs = registry(workloads);
    let res = gs.list("100").await.unwrap();
    let names: Vec<_> = res.servers.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["factorio", "valheim"]);
    assert_eq!(res.servers[0].display_name, "Factorio");
    assert!(res.servers[0].running);
    assert_eq!((res.servers[0].ready_replicas, res.servers[0].desired_replicas), (1, 1));
    assert_eq!(res.servers[1].display_name, "valheim");
    assert!(!res.servers[1].running);
}

#[tokio::test]
async fn list_ignores_other_namespaces_and_unmarked() {
    let mut unmarked = game_server("games", "secret", WorkloadKind::Deployment, Some("100"));
    unmarked.access_control.remove(MARKER_KEY);
    let gs = registry(vec![game_server("default", "minecraft", WorkloadKind::Deployment, Some("100")), unmarked]);
    let res = gs.list("100").await.unwrap();
    assert!(res.is_empty());
}

#[tokio::test]
async fn list_failure_is_an_error_not_empty() {
    let gs = registry(vec![minecraft()]);
    gs.source().fail_with(SourceError::Unavailable("timeout".into()));
    assert!(gs.list("100").await.is_err());
}
