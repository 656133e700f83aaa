//! Random callout replies.

use rand::seq::IndexedRandom;
use rand::Rng;

use crate::config::CalloutConfig;

/// Roll for a callout on a message in `guild_id`. `None` when the guild is not
/// enabled, callouts are disabled, or the 1-in-`chance` roll misses.
pub fn pick<'a, R: Rng>(cfg: &'a CalloutConfig, guild_id: &str, rng: &mut R) -> Option<&'a str> {
    if cfg.chance == 0 || cfg.messages.is_empty() || !cfg.guilds.iter().any(|g| g == guild_id) {
        return None;
    }
    if rng.random_range(0..cfg.chance) != 0 {
        return None;
    }
    cfg.messages.choose(rng).map(String::as_str)
}
