use regex::Regex;

use super::error::MonitorError;
use super::model::{Occupancy, ParserState, LOBBY_GAME_MODE, ON_FOOT_ZONE, UNKNOWN_ZONE_ID};

const ENTITY_ZONE_MARKER: &str = "-> Entity ";
const JUMP_DRIVE_ZONE_MARKER: &str = "adam: ";
const GAME_MODE_FIELD_INDEX: usize = 8;
const SPAWNED_VEHICLE_FIELD_INDEX: usize = 5;

lazy_static::lazy_static! {
    static ref CONTROL_TOKEN_VEHICLE: Regex =
        Regex::new(r"for '(\w+(?:_\w+)+)_(\d+)'").expect("control token pattern is valid");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneSource {
    EntityEnterZone,
    JumpDrive,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VehicleToken {
    pub vehicle_type: String,
    pub vehicle_id: String,
}

impl Occupancy {
    pub fn enter(&mut self, vehicle_type: &str, vehicle_id: &str) {
        self.zone = vehicle_type.to_string();
        self.zone_id = vehicle_id.to_string();
    }

    pub fn exit(&mut self) {
        self.zone = ON_FOOT_ZONE.to_string();
        self.zone_id = UNKNOWN_ZONE_ID.to_string();
    }

    fn enter_unidentified(&mut self, label: &str) {
        self.zone = label.to_string();
        self.zone_id = UNKNOWN_ZONE_ID.to_string();
    }
}

/// Updates the game mode. Returns `true` when the switch forced the player
/// back on foot (entering the lobby).
pub fn set_game_mode(state: &mut ParserState, mode: &str) -> bool {
    if state.game_mode != mode {
        state.game_mode = mode.to_string();
    }

    if mode == LOBBY_GAME_MODE {
        state.occupancy.exit();
        return true;
    }

    false
}

pub fn parse_game_mode(line: &str) -> Result<String, MonitorError> {
    let field = line
        .split(' ')
        .nth(GAME_MODE_FIELD_INDEX)
        .ok_or_else(|| MonitorError::unparseable("missing game mode field", line))?;
    let (_, value) = field
        .split_once('=')
        .ok_or_else(|| MonitorError::unparseable("game mode field has no value", line))?;
    let mode = value.trim_matches('"');

    if mode.is_empty() {
        return Err(MonitorError::unparseable("empty game mode", line));
    }

    Ok(mode.to_string())
}

pub fn parse_control_token_vehicle(line: &str) -> Option<VehicleToken> {
    let captures = CONTROL_TOKEN_VEHICLE.captures(line)?;
    Some(VehicleToken {
        vehicle_type: captures.get(1)?.as_str().to_string(),
        vehicle_id: captures.get(2)?.as_str().to_string(),
    })
}

pub fn parse_spawned_vehicle(line: &str) -> Result<String, MonitorError> {
    let field = line
        .split(' ')
        .nth(SPAWNED_VEHICLE_FIELD_INDEX)
        .ok_or_else(|| MonitorError::unparseable("missing spawned vehicle field", line))?;

    let vehicle = strip_enclosing(field);
    if vehicle.is_empty() {
        return Err(MonitorError::unparseable("empty spawned vehicle", line));
    }

    Ok(vehicle.to_string())
}

/// Extracts the raw zone token following the zone marker. The token may be
/// empty; only a missing marker makes the line unparseable.
pub fn parse_zone_token(line: &str, source: ZoneSource) -> Result<String, MonitorError> {
    let marker = match source {
        ZoneSource::EntityEnterZone => ENTITY_ZONE_MARKER,
        ZoneSource::JumpDrive => JUMP_DRIVE_ZONE_MARKER,
    };

    let Some((_, remainder)) = line.split_once(marker) else {
        return Err(MonitorError::unparseable("missing zone marker", line));
    };

    let token = remainder.split(' ').next().unwrap_or_default();
    let token = match source {
        ZoneSource::EntityEnterZone => strip_enclosing(token),
        ZoneSource::JumpDrive => token,
    };

    Ok(token.to_string())
}

/// Splits `<manufacturer>..._<id>` on its last underscore, provided the token
/// starts with one of the known manufacturer codes.
pub fn split_vehicle_token<S: AsRef<str>>(
    token: &str,
    manufacturer_prefixes: &[S],
) -> Option<VehicleToken> {
    let has_known_prefix = manufacturer_prefixes
        .iter()
        .any(|prefix| !prefix.as_ref().is_empty() && token.starts_with(prefix.as_ref()));
    if !has_known_prefix {
        return None;
    }

    let (vehicle_type, vehicle_id) = token.rsplit_once('_')?;
    if vehicle_type.is_empty() || vehicle_id.is_empty() {
        return None;
    }

    Some(VehicleToken {
        vehicle_type: vehicle_type.to_string(),
        vehicle_id: vehicle_id.to_string(),
    })
}

/// Applies a zone-entry or jump-drive token. Unrecognised or empty tokens put
/// the player back on foot. Returns `true` if the player is now in a vehicle.
pub fn apply_zone_token<S: AsRef<str>>(
    occupancy: &mut Occupancy,
    token: &str,
    manufacturer_prefixes: &[S],
) -> bool {
    match split_vehicle_token(token, manufacturer_prefixes) {
        Some(vehicle) => {
            occupancy.enter(&vehicle.vehicle_type, &vehicle.vehicle_id);
            true
        }
        None => {
            occupancy.exit();
            false
        }
    }
}

/// Applies a spawned vehicle token. Tokens without a recognisable id still
/// become the zone label so the display reflects the active ship.
pub fn apply_spawned_vehicle<S: AsRef<str>>(
    occupancy: &mut Occupancy,
    token: &str,
    manufacturer_prefixes: &[S],
) {
    match split_vehicle_token(token, manufacturer_prefixes) {
        Some(vehicle) => occupancy.enter(&vehicle.vehicle_type, &vehicle.vehicle_id),
        None => occupancy.enter_unidentified(token),
    }
}

fn strip_enclosing(token: &str) -> &str {
    let mut characters = token.chars();
    characters.next();
    characters.next_back();
    characters.as_str()
}
