use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::game_log::ExclusionRules;

pub const ENV_PREFIX: &str = "KILLTRACKER_";

pub const DEFAULT_MANUFACTURER_PREFIXES: [&str; 17] = [
    "DRAK", "ORIG", "AEGS", "ANVL", "CRUS", "BANU", "MISC", "KRIG", "XNAA", "ARGO", "VNCL", "ESPR",
    "RSI", "CNOU", "GRIN", "TMBL", "GAMA",
];

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to load settings: {0}")]
    Load(#[from] Box<figment::Error>),
    #[error("invalid exclusion pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

const DEFAULT_EXCLUDED_MODES: [&str; 2] = ["EA_FreeFlight", "EA_SquadronBattle"];
const DEFAULT_MODE_KEYWORDS: [&str; 2] = ["Crash", "SelfDestruct"];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExclusionKind {
    Substring,
    #[serde(alias = "startsWith")]
    Prefix,
    #[serde(alias = "regex")]
    Pattern,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExclusionRule {
    #[serde(alias = "type")]
    pub kind: ExclusionKind,
    pub value: String,
}

impl ExclusionRule {
    pub fn substring(value: &str) -> Self {
        Self {
            kind: ExclusionKind::Substring,
            value: value.to_string(),
        }
    }

    pub fn prefix(value: &str) -> Self {
        Self {
            kind: ExclusionKind::Prefix,
            value: value.to_string(),
        }
    }

    pub fn pattern(value: &str) -> Self {
        Self {
            kind: ExclusionKind::Pattern,
            value: value.to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExclusionSettings {
    /// Rules checked against the raw line before a kill is credited to the player.
    pub victim_rules: Vec<ExclusionRule>,
    /// Rules checked first for any kill line while the named game mode is active.
    pub mode_rules: BTreeMap<String, Vec<ExclusionRule>>,
}

impl Default for ExclusionSettings {
    fn default() -> Self {
        let mode_rules = DEFAULT_EXCLUDED_MODES
            .iter()
            .map(|mode| {
                let rules = DEFAULT_MODE_KEYWORDS
                    .iter()
                    .map(|keyword| ExclusionRule::substring(keyword))
                    .collect();
                (mode.to_string(), rules)
            })
            .collect();

        Self {
            victim_rules: Vec::new(),
            mode_rules,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerSettings {
    pub log_path: PathBuf,
    pub submission_key: Option<String>,
    pub player_handle: Option<String>,
    pub player_geid: Option<String>,
    pub poll_interval_ms: u64,
    pub startup_credential_retry_ms: u64,
    pub steady_credential_retry_ms: u64,
    pub identity_retry_ms: u64,
    pub reset_occupancy_after_replay: bool,
    pub kill_log_path: Option<PathBuf>,
    pub manufacturer_prefixes: Vec<String>,
    pub exclusions: ExclusionSettings,
    pub weapon_labels: BTreeMap<String, String>,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            log_path: PathBuf::from("Game.log"),
            submission_key: None,
            player_handle: None,
            player_geid: None,
            poll_interval_ms: 1_000,
            startup_credential_retry_ms: 1_000,
            steady_credential_retry_ms: 5_000,
            identity_retry_ms: 5_000,
            reset_occupancy_after_replay: false,
            kill_log_path: None,
            manufacturer_prefixes: DEFAULT_MANUFACTURER_PREFIXES
                .iter()
                .map(|prefix| prefix.to_string())
                .collect(),
            exclusions: ExclusionSettings::default(),
            weapon_labels: BTreeMap::new(),
        }
    }
}

impl TrackerSettings {
    /// Layers defaults, an optional TOML file and `KILLTRACKER_*` variables.
    /// Exclusion patterns are compiled once here so a bad pattern fails early.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, SettingsError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        let settings: Self = figment.extract().map_err(Box::new)?;
        ExclusionRules::compile(&settings.exclusions)?;
        Ok(settings)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn startup_credential_retry(&self) -> Duration {
        Duration::from_millis(self.startup_credential_retry_ms.max(1))
    }

    pub fn steady_credential_retry(&self) -> Duration {
        Duration::from_millis(self.steady_credential_retry_ms.max(1))
    }

    pub fn identity_retry(&self) -> Duration {
        Duration::from_millis(self.identity_retry_ms)
    }
}
