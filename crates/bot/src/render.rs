//! Text rendering for `/servers` results.

use std::fmt::Write;

use juicebot_core::{ListResult, ServerError, TargetState, ToggleOutcome, ToggleResult, GUILDS_KEY, MARKER_KEY};

/// Shown for any failure talking to the cluster; details only go to the log.
pub const UNAVAILABLE: &str = "❌ The game server service is unavailable right now, try again later.";

pub fn list(res: &ListResult, guild_id: &str) -> String {
    if res.is_empty() {
        return format!(
            "No game servers found for this guild. Make sure deployments/statefulsets have the label `{}` and this guild ID ({}) in the comma-separated `{}` annotation",
            MARKER_KEY, guild_id, GUILDS_KEY
        );
    }
    let mut out = String::from("**Game Servers:**\n");
    for s in &res.servers {
        let (emoji, status) = if s.running { ("🟢", "running") } else { ("🔴", "stopped") };
        let _ = writeln!(
            out,
            "{} **{}** ({}/{}) - {} ({}/{} replicas)",
            emoji, s.display_name, s.namespace, s.name, status, s.ready_replicas, s.desired_replicas
        );
    }
    out
}

pub fn toggle(res: &ToggleResult) -> String {
    match (res.outcome, res.target) {
        (ToggleOutcome::Started, _) => format!("🟢 Starting server **{}** ({})", res.name(), res.server),
        (ToggleOutcome::Stopped, _) => format!("🔴 Stopping server **{}** ({})", res.name(), res.server),
        (ToggleOutcome::AlreadyInState, TargetState::Running) => format!("❌ Server **{}** is already running!", res.name()),
        (ToggleOutcome::AlreadyInState, TargetState::Stopped) => format!("❌ Server **{}** is already stopped!", res.name()),
        (ToggleOutcome::NotFoundOrForbidden, _) => format!("❌ Server **{}** not found", res.server),
    }
}

pub fn error(_err: &ServerError) -> String { UNAVAILABLE.to_string() }

/// Metric label for a toggle outcome.
pub fn outcome_label(outcome: ToggleOutcome) -> &'static str {
    match outcome {
        ToggleOutcome::Started => "started",
        ToggleOutcome::Stopped => "stopped",
        ToggleOutcome::AlreadyInState => "already_in_state",
        ToggleOutcome::NotFoundOrForbidden => "not_found",
    }
}
