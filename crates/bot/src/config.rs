//! YAML bot configuration. Every section is optional and falls back to defaults.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Dump the parsed config at startup.
    pub debug: bool,
    pub servers: ServersConfig,
    pub callout: CalloutConfig,
    pub dog: DogConfig,
    pub name_history: NameHistoryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServersConfig {
    /// The only namespace game servers are listed from and scaled in.
    pub namespace: String,
    /// Upper bound for one list/start/stop round trip to the cluster.
    pub timeout_secs: u64,
}

impl Default for ServersConfig {
    fn default() -> Self { Self { namespace: "games".to_string(), timeout_secs: 10 } }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CalloutConfig {
    #[serde(deserialize_with = "ids")]
    pub guilds: Vec<String>,
    pub messages: Vec<String>,
    /// A message gets a callout with probability 1/chance. 0 disables callouts.
    pub chance: u32,
}

impl Default for CalloutConfig {
    fn default() -> Self { Self { guilds: Vec::new(), messages: Vec::new(), chance: 100 } }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DogConfig {
    /// Unicode emoji or `<:name:id>` custom emoji.
    pub emote: String,
}

impl Default for DogConfig {
    fn default() -> Self { Self { emote: "🐕".to_string() } }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct NameHistoryConfig {
    #[serde(deserialize_with = "ids")]
    pub guilds: Vec<String>,
    /// Channel that gets a "has a new name!" post for each recorded change.
    pub announce_channel: Option<u64>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).with_context(|| format!("reading config {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }
}

/// Discord ids are written either quoted or as bare integers.
fn ids<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Num(u64),
        Str(String),
    }
    let raw = Vec::<Id>::deserialize(de)?;
    Ok(raw
        .into_iter()
        .map(|id| match id {
            Id::Num(n) => n.to_string(),
            Id::Str(s) => s.trim().to_string(),
        })
        .collect())
}
