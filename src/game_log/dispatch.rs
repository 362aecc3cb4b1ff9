use super::classifier::{classify, LineTag};
use super::error::MonitorError;
use super::exclusion::ExclusionRules;
use super::kill_line::{apply_kill_event, interpret};
use super::model::{Emission, KillEvent, ParserState, PlayerIdentity};
use super::occupancy::{
    apply_spawned_vehicle, apply_zone_token, parse_control_token_vehicle, parse_game_mode,
    parse_spawned_vehicle, parse_zone_token, set_game_mode, ZoneSource,
};
use crate::settings::TrackerSettings;

/// Read-only rules shared by every line of a session.
#[derive(Debug, Clone, Default)]
pub struct ParserRules {
    pub manufacturer_prefixes: Vec<String>,
    pub exclusions: ExclusionRules,
}

impl ParserRules {
    pub fn from_settings(settings: &TrackerSettings) -> Result<Self, regex::Error> {
        Ok(Self {
            manufacturer_prefixes: settings.manufacturer_prefixes.clone(),
            exclusions: ExclusionRules::compile(&settings.exclusions)?,
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LineContext<'a> {
    pub identity: &'a PlayerIdentity,
    pub rules: &'a ParserRules,
    pub emission: Emission,
}

/// Result of routing one line through the classifier and its handler.
#[derive(Debug)]
pub struct LineOutcome {
    pub tag: LineTag,
    pub occupancy_changed: bool,
    pub kill: Option<KillEvent>,
    pub unparseable: bool,
}

impl LineOutcome {
    fn new(tag: LineTag) -> Self {
        Self {
            tag,
            occupancy_changed: false,
            kill: None,
            unparseable: false,
        }
    }

    fn record_error(&mut self, error: MonitorError) {
        tracing::warn!(tag = self.tag.name(), error = %error, "Skipping malformed game log line");
        self.unparseable = true;
    }
}

/// Classifies a line and applies its handler to the parser state.
///
/// Parsing failures are logged and reported through
/// [`LineOutcome::unparseable`]; they never abort the caller.
pub fn process_line(line: &str, state: &mut ParserState, context: &LineContext<'_>) -> LineOutcome {
    let line = line.trim_end_matches(['\r', '\n']);
    let tag = classify(line, state, context.identity, context.emission);
    let mut outcome = LineOutcome::new(tag);
    let prefixes = context.rules.manufacturer_prefixes.as_slice();

    match tag {
        LineTag::Discard => {}
        LineTag::ControlTokenGranted => {
            if let Some(vehicle) = parse_control_token_vehicle(line) {
                state
                    .occupancy
                    .enter(&vehicle.vehicle_type, &vehicle.vehicle_id);
                tracing::info!(
                    vehicle = %vehicle.vehicle_type,
                    vehicle_id = %vehicle.vehicle_id,
                    "Entered vehicle"
                );
                outcome.occupancy_changed = true;
            }
        }
        LineTag::ControlTokenReleased => {
            state.occupancy.exit();
            tracing::info!("Exited vehicle, now on foot");
            outcome.occupancy_changed = true;
        }
        LineTag::GameModeEstablished => match parse_game_mode(line) {
            Ok(mode) => {
                tracing::debug!(game_mode = %mode, "Game mode established");
                outcome.occupancy_changed = set_game_mode(state, &mode);
            }
            Err(error) => outcome.record_error(error),
        },
        LineTag::VehicleSpawned => match parse_spawned_vehicle(line) {
            Ok(token) => {
                apply_spawned_vehicle(&mut state.occupancy, &token, prefixes);
                tracing::debug!(vehicle = %state.occupancy.zone, "Active vehicle spawned");
                outcome.occupancy_changed = true;
            }
            Err(error) => outcome.record_error(error),
        },
        LineTag::VehicleLost => {
            tracing::debug!(
                vehicle = %state.occupancy.zone,
                vehicle_id = %state.occupancy.zone_id,
                "Vehicle destroyed"
            );
            state.occupancy.exit();
            outcome.occupancy_changed = true;
        }
        LineTag::PlayerActivity {
            zone_entry,
            actor_kill,
        } => {
            if zone_entry {
                apply_zone_line(line, state, prefixes, ZoneSource::EntityEnterZone, &mut outcome);
            }
            if actor_kill {
                apply_kill_line(line, state, context, &mut outcome);
            }
        }
        LineTag::JumpDriveZone => {
            apply_zone_line(line, state, prefixes, ZoneSource::JumpDrive, &mut outcome);
        }
    }

    outcome
}

fn apply_zone_line(
    line: &str,
    state: &mut ParserState,
    prefixes: &[String],
    source: ZoneSource,
    outcome: &mut LineOutcome,
) {
    match parse_zone_token(line, source) {
        Ok(token) => {
            apply_zone_token(&mut state.occupancy, &token, prefixes);
            tracing::debug!(
                zone = %state.occupancy.zone,
                zone_id = %state.occupancy.zone_id,
                "Active zone changed"
            );
            outcome.occupancy_changed = true;
        }
        Err(error) => outcome.record_error(error),
    }
}

fn apply_kill_line(
    line: &str,
    state: &mut ParserState,
    context: &LineContext<'_>,
    outcome: &mut LineOutcome,
) {
    let Some(handle) = context.identity.handle() else {
        return;
    };

    match interpret(line, state, handle, &context.rules.exclusions) {
        Ok(event) => {
            let zone_before = state.occupancy.clone();
            apply_kill_event(state, &event);
            if state.occupancy != zone_before {
                outcome.occupancy_changed = true;
            }
            outcome.kill = Some(event);
        }
        Err(error) => outcome.record_error(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game_log::model::KillOutcome;

    const HANDLE: &str = "PilotOne";
    const GEID: &str = "200000000001";

    fn rules() -> ParserRules {
        ParserRules::from_settings(&TrackerSettings::default()).unwrap()
    }

    fn identity() -> PlayerIdentity {
        PlayerIdentity::new(Some(HANDLE.to_string()), Some(GEID.to_string()))
    }

    fn build_line(event: &str, body: &str) -> String {
        format!("<2025-01-05T20:10:00.000Z> [Notice] {event} {body}\n")
    }

    fn kill_line(victim: &str, killer: &str) -> String {
        format!(
            "<2025-01-05T20:11:42.123Z> [Notice] <Actor Death> CActor::Kill: '{victim}' [200000000002] in zone 'ANVL_Hornet_F1_12345' killed by '{killer}' [200000000001] using 'KLWE_LaserRepeater_S3_3245' [Class unknown] with damage type 'Bullet'\r\n"
        )
    }

    fn run(lines: &[String], state: &mut ParserState, emission: Emission) -> Vec<LineOutcome> {
        let identity = identity();
        let rules = rules();
        let context = LineContext {
            identity: &identity,
            rules: &rules,
            emission,
        };
        lines
            .iter()
            .map(|line| process_line(line, state, &context))
            .collect()
    }

    #[test]
    fn grant_then_destruction_returns_on_foot() {
        let mut state = ParserState::new();
        let lines = vec![
            build_line(
                "<Vehicle Control Flow>",
                "CVehicle::Initialize::<lambda_1>::operator (): Local client node [200000000001] granted control token for 'ANVL_Hornet_F1_12345' [12345]",
            ),
            build_line(
                "<Vehicle Destruction>",
                "CVehicle::OnAdvanceDestroyLevel: Vehicle 'ANVL_Hornet_F1_12345' [12345] advanced from destroy level 0 to 1",
            ),
        ];

        let outcomes = run(&lines[..1], &mut state, Emission::Live);
        assert!(outcomes[0].occupancy_changed);
        assert_eq!(state.occupancy.zone, "ANVL_Hornet_F1");
        assert_eq!(state.occupancy.zone_id, "12345");

        let outcomes = run(&lines[1..], &mut state, Emission::Live);
        assert_eq!(outcomes[0].tag, LineTag::VehicleLost);
        assert!(state.occupancy.is_on_foot());
        assert!(!state.occupancy.has_known_zone_id());
    }

    #[test]
    fn replay_rebuilds_mode_and_zone_without_kills() {
        let mut state = ParserState::new();
        let lines = vec![
            build_line(
                "<Context Establisher Done>",
                "establisher=\"CReplicationModel\" runningTime=12.3 map=\"megamap\" gamerules=\"EA_FreeFlight\" sessionId=\"abc\"",
            ),
            build_line(
                "<Spawn Flow>",
                "CPlayerShipRespawnManager::OnVehicleSpawned: [ANVL_Arrow_67890] for player 200000000001",
            ),
            kill_line("Rival", HANDLE),
        ];

        let outcomes = run(&lines, &mut state, Emission::Replay);
        assert_eq!(state.game_mode, "EA_FreeFlight");
        assert_eq!(state.occupancy.zone, "ANVL_Arrow");
        assert!(outcomes.iter().all(|outcome| outcome.kill.is_none()));
        assert_eq!(state.stats.kill_total, 0);
    }

    #[test]
    fn identical_kill_lines_are_counted_twice() {
        let mut state = ParserState::new();
        state.game_mode = "PU".to_string();
        let line = kill_line("Rival", HANDLE);

        let outcomes = run(&[line.clone(), line], &mut state, Emission::Live);
        assert!(outcomes
            .iter()
            .all(|outcome| outcome.kill.as_ref().map(|event| event.outcome) == Some(KillOutcome::Killer)));
        assert_eq!(state.stats.kill_total, 2);
        assert_eq!(state.stats.current_killstreak, 2);
    }

    #[test]
    fn death_clears_occupancy() {
        let mut state = ParserState::new();
        state.game_mode = "PU".to_string();
        state.occupancy.enter("AEGS_Gladius", "54321");

        let outcomes = run(&[kill_line(HANDLE, "Outlaw")], &mut state, Emission::Live);
        let event = outcomes[0].kill.as_ref().unwrap();
        assert_eq!(event.outcome, KillOutcome::Killed);
        assert_eq!(event.zone, "AEGS_Gladius");
        assert!(outcomes[0].occupancy_changed);
        assert!(state.occupancy.is_on_foot());
        assert_eq!(state.stats.death_total, 1);
    }

    #[test]
    fn discarded_lines_leave_state_untouched() {
        let mut state = ParserState::new();
        state.game_mode = "PU".to_string();
        state.occupancy.enter("AEGS_Gladius", "54321");
        state.stats.record_kill();
        let before = state.clone();

        let lines = vec![
            build_line("<StatObjLoad>", "loaded 0x1234"),
            build_line("<Actor Death>", "CActor::Kill: 'Rival' killed by 'Someone'"),
            String::new(),
        ];
        let outcomes = run(&lines, &mut state, Emission::Live);

        assert!(outcomes.iter().all(|outcome| outcome.tag == LineTag::Discard));
        assert_eq!(state, before);
    }

    #[test]
    fn malformed_game_mode_line_is_skipped() {
        let mut state = ParserState::new();
        let outcomes = run(
            &[build_line("<Context Establisher Done>", "short")],
            &mut state,
            Emission::Live,
        );
        assert!(outcomes[0].unparseable);
        assert!(state.game_mode.is_empty());
    }

    #[test]
    fn zone_entry_and_jump_drive_update_occupancy() {
        let mut state = ParserState::new();
        let lines = vec![
            build_line(
                "<OnEntityEnterZone>",
                "Player 'PilotOne' [200000000001] -> Entity [AEGS_Gladius_54321] [54321]",
            ),
            build_line(
                "<Jump Drive State Changed>",
                "Now Idle adam: RSI_Aurora_MR_98765 in zone OOC_Stanton",
            ),
        ];

        run(&lines[..1], &mut state, Emission::Live);
        assert_eq!(state.occupancy.zone, "AEGS_Gladius");

        run(&lines[1..], &mut state, Emission::Live);
        assert_eq!(state.occupancy.zone, "RSI_Aurora_MR");
        assert_eq!(state.occupancy.zone_id, "98765");
    }
}
