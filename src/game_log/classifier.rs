use super::model::{Emission, ParserState, PlayerIdentity};

pub const VEHICLE_CONTROL_FLOW: &str = "<Vehicle Control Flow>";
const SET_DRIVER: &str = "CVehicleMovementBase::SetDriver:";
const REQUESTING_CONTROL_TOKEN: &str = "requesting control token for";
const VEHICLE_INITIALIZE: &str = "CVehicle::Initialize::<lambda_1>::operator ():";
const GRANTED_CONTROL_TOKEN: &str = "granted control token for";
const CLEAR_DRIVER: &str = "CVehicleMovementBase::ClearDriver:";
const RELEASING_CONTROL_TOKEN: &str = "releasing control token for";
const LOSING_CONTROL_TOKEN: &str = "losing control token for";

pub const CONTEXT_ESTABLISHER_DONE: &str = "<Context Establisher Done>";
pub const VEHICLE_SPAWNED: &str = "CPlayerShipRespawnManager::OnVehicleSpawned";
pub const VEHICLE_DESTRUCTION: &str = "<Vehicle Destruction>";
pub const ON_FOOT_DEATH: &str = "<local client>: Entering control state dead";
pub const ENTITY_ENTER_ZONE: &str = "OnEntityEnterZone";
pub const ACTOR_KILL: &str = "CActor::Kill";
pub const JUMP_DRIVE_STATE_CHANGED: &str = "<Jump Drive State Changed>";

/// What a single log line means for the tracker. Produced in a fixed
/// priority order; the first matching rule wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LineTag {
    ControlTokenGranted,
    ControlTokenReleased,
    GameModeEstablished,
    VehicleSpawned,
    VehicleLost,
    PlayerActivity { zone_entry: bool, actor_kill: bool },
    JumpDriveZone,
    Discard,
}

impl LineTag {
    pub fn name(&self) -> &'static str {
        match self {
            LineTag::ControlTokenGranted => "control_token_granted",
            LineTag::ControlTokenReleased => "control_token_released",
            LineTag::GameModeEstablished => "game_mode_established",
            LineTag::VehicleSpawned => "vehicle_spawned",
            LineTag::VehicleLost => "vehicle_lost",
            LineTag::PlayerActivity { .. } => "player_activity",
            LineTag::JumpDriveZone => "jump_drive_zone",
            LineTag::Discard => "discard",
        }
    }
}

pub fn classify(
    line: &str,
    state: &ParserState,
    identity: &PlayerIdentity,
    emission: Emission,
) -> LineTag {
    if emission.is_live() && line.contains(VEHICLE_CONTROL_FLOW) {
        if is_control_token_grant(line) {
            return LineTag::ControlTokenGranted;
        }
        if is_control_token_release(line) {
            return LineTag::ControlTokenReleased;
        }
    }

    if line.contains(CONTEXT_ESTABLISHER_DONE) {
        return LineTag::GameModeEstablished;
    }

    if line.contains(VEHICLE_SPAWNED)
        && !state.is_in_lobby()
        && identity
            .global_entity_id()
            .is_some_and(|global_entity_id| line.contains(global_entity_id))
    {
        return LineTag::VehicleSpawned;
    }

    if (line.contains(VEHICLE_DESTRUCTION) || line.contains(ON_FOOT_DEATH))
        && line.contains(state.occupancy.zone_id.as_str())
    {
        return LineTag::VehicleLost;
    }

    if identity.handle().is_some_and(|handle| line.contains(handle)) {
        let zone_entry = line.contains(ENTITY_ENTER_ZONE);
        let actor_kill = emission.is_live() && line.contains(ACTOR_KILL);
        if zone_entry || actor_kill {
            return LineTag::PlayerActivity {
                zone_entry,
                actor_kill,
            };
        }
        return LineTag::Discard;
    }

    if line.contains(JUMP_DRIVE_STATE_CHANGED) {
        return LineTag::JumpDriveZone;
    }

    LineTag::Discard
}

fn is_control_token_grant(line: &str) -> bool {
    (line.contains(SET_DRIVER) && line.contains(REQUESTING_CONTROL_TOKEN))
        || (line.contains(VEHICLE_INITIALIZE) && line.contains(GRANTED_CONTROL_TOKEN))
}

fn is_control_token_release(line: &str) -> bool {
    (line.contains(CLEAR_DRIVER) && line.contains(RELEASING_CONTROL_TOKEN))
        || line.contains(LOSING_CONTROL_TOKEN)
}
