use std::time::Duration;

use serde::Serialize;

use super::stats::SessionStats;

pub const ON_FOOT_ZONE: &str = "on-foot";
pub const UNKNOWN_ZONE_ID: &str = "unknown";
pub const LOBBY_GAME_MODE: &str = "SC_Default";

pub(crate) const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1_000);
pub(crate) const DEFAULT_STARTUP_CREDENTIAL_RETRY: Duration = Duration::from_secs(1);
pub(crate) const DEFAULT_STEADY_CREDENTIAL_RETRY: Duration = Duration::from_secs(5);
pub(crate) const DEFAULT_IDENTITY_RETRY: Duration = Duration::from_secs(5);

/// Whether events produced by a line may leave the engine.
///
/// Historical replay reconstructs occupancy and game mode only; kills found
/// in old content must never reach submission or audio sinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emission {
    Live,
    Replay,
}

impl Emission {
    pub fn is_live(self) -> bool {
        matches!(self, Emission::Live)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occupancy {
    pub zone: String,
    pub zone_id: String,
}

impl Default for Occupancy {
    fn default() -> Self {
        Self {
            zone: ON_FOOT_ZONE.to_string(),
            zone_id: UNKNOWN_ZONE_ID.to_string(),
        }
    }
}

impl Occupancy {
    pub fn is_on_foot(&self) -> bool {
        self.zone == ON_FOOT_ZONE
    }

    pub fn has_known_zone_id(&self) -> bool {
        self.zone_id != UNKNOWN_ZONE_ID
    }
}

/// Mutable parser state owned by the monitoring worker.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParserState {
    pub occupancy: Occupancy,
    pub game_mode: String,
    pub stats: SessionStats,
}

impl ParserState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_in_lobby(&self) -> bool {
        self.game_mode == LOBBY_GAME_MODE
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayerIdentity {
    pub handle: Option<String>,
    pub global_entity_id: Option<String>,
}

impl PlayerIdentity {
    pub fn new(handle: Option<String>, global_entity_id: Option<String>) -> Self {
        Self {
            handle: non_empty(handle),
            global_entity_id: non_empty(global_entity_id),
        }
    }

    pub fn handle(&self) -> Option<&str> {
        self.handle.as_deref().filter(|value| !value.is_empty())
    }

    pub fn global_entity_id(&self) -> Option<&str> {
        self.global_entity_id
            .as_deref()
            .filter(|value| !value.is_empty())
    }

    pub fn is_fully_resolved(&self) -> bool {
        self.handle().is_some() && self.global_entity_id().is_some()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty() && value != "N/A")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum KillOutcome {
    Killed,
    Suicide,
    Killer,
    Reset,
    Exclusion,
}

impl KillOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            KillOutcome::Killed => "killed",
            KillOutcome::Suicide => "suicide",
            KillOutcome::Killer => "killer",
            KillOutcome::Reset => "reset",
            KillOutcome::Exclusion => "exclusion",
        }
    }

    pub fn is_death(self) -> bool {
        matches!(self, KillOutcome::Killed | KillOutcome::Suicide)
    }

    /// Reset and exclusion outcomes are never counted nor submitted.
    pub fn is_reportable(self) -> bool {
        matches!(
            self,
            KillOutcome::Killed | KillOutcome::Suicide | KillOutcome::Killer
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KillEvent {
    pub time: String,
    pub killer: String,
    pub victim: String,
    pub weapon: String,
    pub zone: String,
    pub current_ship: String,
    pub game_mode: String,
    pub outcome: KillOutcome,
}

impl KillEvent {
    pub(crate) fn excluded(state: &ParserState) -> Self {
        Self {
            time: String::new(),
            killer: String::new(),
            victim: String::new(),
            weapon: String::new(),
            zone: String::new(),
            current_ship: state.occupancy.zone.clone(),
            game_mode: state.game_mode.clone(),
            outcome: KillOutcome::Exclusion,
        }
    }
}
