use std::collections::BTreeMap;

use super::error::MonitorError;
use super::exclusion::ExclusionRules;
use super::model::{KillEvent, KillOutcome, ParserState};

const TIME_FIELD_INDEX: usize = 0;
const VICTIM_FIELD_INDEX: usize = 5;
const ZONE_FIELD_INDEX: usize = 9;
const KILLER_FIELD_INDEX: usize = 12;
const WEAPON_FIELD_INDEX: usize = 15;
const UNKNOWN_KILLER: &str = "unknown";

#[derive(Debug)]
struct KillLineFields {
    time: String,
    victim: String,
    zone: String,
    killer: String,
    weapon: String,
}

impl KillLineFields {
    fn parse(line: &str) -> Result<Self, MonitorError> {
        let fields = line.split(' ').collect::<Vec<&str>>();
        if fields.len() <= WEAPON_FIELD_INDEX {
            return Err(MonitorError::unparseable("too few kill line fields", line));
        }

        let weapon = unquote(fields[WEAPON_FIELD_INDEX]).trim();

        Ok(Self {
            time: unquote(fields[TIME_FIELD_INDEX]).to_string(),
            victim: unquote(fields[VICTIM_FIELD_INDEX]).to_string(),
            zone: unquote(fields[ZONE_FIELD_INDEX]).to_string(),
            killer: unquote(fields[KILLER_FIELD_INDEX]).to_string(),
            weapon: strip_instance_suffix(weapon).to_string(),
        })
    }
}

/// Turns an actor kill line into a [`KillEvent`] without touching counters.
///
/// Game-mode exclusions are checked before the line is tokenized. Victim
/// exclusions only apply when the player is credited with the kill.
pub fn interpret(
    line: &str,
    state: &ParserState,
    handle: &str,
    rules: &ExclusionRules,
) -> Result<KillEvent, MonitorError> {
    if let Some(rule) = rules.match_game_mode(&state.game_mode, line) {
        tracing::info!(
            game_mode = %state.game_mode,
            rule = %rule,
            "Kill line matched a game mode exclusion, ignoring kill"
        );
        return Ok(KillEvent::excluded(state));
    }

    let fields = KillLineFields::parse(line)?;
    let current_ship = state.occupancy.zone.clone();
    let game_mode = state.game_mode.clone();

    if fields.victim == fields.killer {
        return Ok(KillEvent {
            time: fields.time,
            killer: handle.to_string(),
            victim: handle.to_string(),
            weapon: fields.weapon,
            zone: fields.zone,
            current_ship,
            game_mode,
            outcome: KillOutcome::Suicide,
        });
    }

    if fields.victim == handle {
        return Ok(KillEvent {
            time: fields.time,
            killer: fields.killer,
            victim: handle.to_string(),
            weapon: fields.weapon,
            zone: current_ship.clone(),
            current_ship,
            game_mode,
            outcome: KillOutcome::Killed,
        });
    }

    if fields.killer.eq_ignore_ascii_case(UNKNOWN_KILLER) {
        return Ok(KillEvent {
            time: fields.time,
            killer: fields.killer,
            victim: fields.victim,
            weapon: fields.weapon,
            zone: fields.zone,
            current_ship,
            game_mode,
            outcome: KillOutcome::Reset,
        });
    }

    if let Some(rule) = rules.match_victim(line) {
        tracing::debug!(victim = %fields.victim, rule = %rule, "Kill victim is excluded");
        return Ok(KillEvent::excluded(state));
    }

    Ok(KillEvent {
        time: fields.time,
        killer: handle.to_string(),
        victim: fields.victim,
        weapon: fields.weapon,
        zone: fields.zone,
        current_ship,
        game_mode,
        outcome: KillOutcome::Killer,
    })
}

/// Applies a counted outcome to the session counters and occupancy.
pub fn apply_kill_event(state: &mut ParserState, event: &KillEvent) {
    match event.outcome {
        KillOutcome::Killed | KillOutcome::Suicide => {
            state.stats.record_death();
            state.occupancy.exit();
        }
        KillOutcome::Killer => state.stats.record_kill(),
        KillOutcome::Reset | KillOutcome::Exclusion => {}
    }
}

/// Picks the display label whose key is the longest prefix of the weapon id.
pub fn weapon_label<'a>(labels: &'a BTreeMap<String, String>, weapon: &'a str) -> &'a str {
    labels
        .iter()
        .filter(|(key, _)| !key.is_empty() && weapon.starts_with(key.as_str()))
        .max_by_key(|(key, _)| key.len())
        .map(|(_, label)| label.as_str())
        .unwrap_or(weapon)
}

pub fn describe_kill_event(event: &KillEvent, labels: &BTreeMap<String, String>) -> String {
    let weapon = weapon_label(labels, &event.weapon);
    match event.outcome {
        KillOutcome::Killed => format!("You were killed by {} with {weapon}.", event.killer),
        KillOutcome::Suicide if event.weapon == event.victim => {
            "You died via backspace.".to_string()
        }
        KillOutcome::Suicide => format!("You died from {weapon}."),
        KillOutcome::Killer => format!("You have killed {} with {weapon}.", event.victim),
        KillOutcome::Reset => format!("Probable vehicle reset of {}.", event.victim),
        KillOutcome::Exclusion => "Excluded kill.".to_string(),
    }
}

fn unquote(value: &str) -> &str {
    value.trim_matches('\'')
}

fn strip_instance_suffix(weapon: &str) -> &str {
    match weapon.rsplit_once('_') {
        Some((base, suffix))
            if !suffix.is_empty() && suffix.chars().all(|character| character.is_ascii_digit()) =>
        {
            base
        }
        _ => weapon,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{ExclusionRule, ExclusionSettings};

    const HANDLE: &str = "PilotOne";

    fn build_kill_line(victim: &str, killer: &str, weapon: &str) -> String {
        format!(
            "<2025-01-05T20:11:42.123Z> [Notice] <Actor Death> CActor::Kill: '{victim}' [200000000002] in zone 'ANVL_Hornet_F1_12345' killed by '{killer}' [200000000001] using '{weapon}' [Class unknown] with damage type 'Bullet' from direction x: 0, y: 0, z: 0 [Team_ActorTech][Actor]"
        )
    }

    fn default_rules() -> ExclusionRules {
        ExclusionRules::compile(&ExclusionSettings::default()).unwrap()
    }

    fn state_in_mode(game_mode: &str) -> ParserState {
        let mut state = ParserState::new();
        state.game_mode = game_mode.to_string();
        state
    }

    #[test]
    fn same_victim_and_killer_is_a_suicide() {
        let mut state = state_in_mode("PU");
        state.stats.record_kill();
        state.occupancy.enter("ANVL_Hornet_F1", "12345");
        let line = build_kill_line(HANDLE, HANDLE, "KLWE_LaserRepeater_S3_3245");

        let event = interpret(&line, &state, HANDLE, &default_rules()).unwrap();
        assert_eq!(event.outcome, KillOutcome::Suicide);
        assert_eq!(event.killer, HANDLE);
        assert_eq!(event.victim, HANDLE);
        assert_eq!(event.zone, "ANVL_Hornet_F1_12345");
        assert_eq!(event.weapon, "KLWE_LaserRepeater_S3");

        apply_kill_event(&mut state, &event);
        assert_eq!(state.stats.death_total, 1);
        assert_eq!(state.stats.current_killstreak, 0);
        assert_eq!(state.stats.max_killstreak, 1);
        assert!(state.occupancy.is_on_foot());
    }

    #[test]
    fn player_as_victim_is_killed_in_current_ship() {
        let mut state = state_in_mode("PU");
        state.occupancy.enter("AEGS_Gladius", "54321");
        let line = build_kill_line(HANDLE, "Outlaw", "BEHR_BallisticGatling_S4_911");

        let event = interpret(&line, &state, HANDLE, &default_rules()).unwrap();
        assert_eq!(event.outcome, KillOutcome::Killed);
        assert_eq!(event.killer, "Outlaw");
        assert_eq!(event.victim, HANDLE);
        assert_eq!(event.zone, "AEGS_Gladius");
        assert_eq!(event.current_ship, "AEGS_Gladius");
        assert_eq!(event.time, "<2025-01-05T20:11:42.123Z>");
    }

    #[test]
    fn unknown_killer_is_a_reset_in_any_case() {
        let mut state = state_in_mode("PU");
        for killer in ["unknown", "Unknown", "UNKNOWN"] {
            let line = build_kill_line("Bystander", killer, "Crash_0");
            let event = interpret(&line, &state, HANDLE, &default_rules()).unwrap();
            assert_eq!(event.outcome, KillOutcome::Reset);

            apply_kill_event(&mut state, &event);
        }
        assert_eq!(state.stats, ParserState::new().stats);
    }

    #[test]
    fn crash_in_free_flight_is_excluded_before_parsing() {
        let mut state = state_in_mode("EA_FreeFlight");
        let line = build_kill_line("Bystander", HANDLE, "Crash");

        let event = interpret(&line, &state, HANDLE, &default_rules()).unwrap();
        assert_eq!(event.outcome, KillOutcome::Exclusion);
        assert!(event.victim.is_empty());

        apply_kill_event(&mut state, &event);
        assert_eq!(state.stats.kill_total, 0);
        assert_eq!(state.stats.death_total, 0);

        let short_line = "CActor::Kill: PilotOne Crash";
        let event = interpret(short_line, &state, HANDLE, &default_rules()).unwrap();
        assert_eq!(event.outcome, KillOutcome::Exclusion);
    }

    #[test]
    fn victim_rules_only_downgrade_player_kills() {
        let rules = ExclusionRules::compile(&ExclusionSettings {
            victim_rules: vec![ExclusionRule::substring("NPC_Pirate")],
            ..ExclusionSettings::default()
        })
        .unwrap();
        let state = state_in_mode("PU");

        let npc_kill = build_kill_line("NPC_Pirate_Grunt_88", HANDLE, "GMNI_Rifle_01");
        let event = interpret(&npc_kill, &state, HANDLE, &rules).unwrap();
        assert_eq!(event.outcome, KillOutcome::Exclusion);

        let killed_by_npc = build_kill_line(HANDLE, "NPC_Pirate_Grunt_88", "GMNI_Rifle_01");
        let event = interpret(&killed_by_npc, &state, HANDLE, &rules).unwrap();
        assert_eq!(event.outcome, KillOutcome::Killed);
    }

    #[test]
    fn player_kill_updates_streaks() {
        let mut state = state_in_mode("PU");
        let line = build_kill_line("Rival", HANDLE, "KLWE_LaserRepeater_S3_3245");

        let event = interpret(&line, &state, HANDLE, &default_rules()).unwrap();
        assert_eq!(event.outcome, KillOutcome::Killer);
        assert_eq!(event.killer, HANDLE);
        assert_eq!(event.victim, "Rival");

        apply_kill_event(&mut state, &event);
        apply_kill_event(&mut state, &event);
        assert_eq!(state.stats.kill_total, 2);
        assert_eq!(state.stats.current_killstreak, 2);
        assert_eq!(state.stats.max_killstreak, 2);
    }

    #[test]
    fn short_line_is_unparseable() {
        let state = state_in_mode("PU");
        let result = interpret(
            "<2025-01-05T20:11:42.123Z> CActor::Kill: 'PilotOne'",
            &state,
            HANDLE,
            &default_rules(),
        );
        assert!(matches!(result, Err(MonitorError::UnparseableLine { .. })));
    }

    #[test]
    fn weapon_label_prefers_longest_prefix() {
        let labels = BTreeMap::from([
            ("KLWE".to_string(), "Klaus & Werner".to_string()),
            (
                "KLWE_LaserRepeater".to_string(),
                "Attrition Repeater".to_string(),
            ),
        ]);

        assert_eq!(
            weapon_label(&labels, "KLWE_LaserRepeater_S3"),
            "Attrition Repeater"
        );
        assert_eq!(weapon_label(&labels, "KLWE_MassDriver_S2"), "Klaus & Werner");
        assert_eq!(weapon_label(&labels, "BEHR_Rifle"), "BEHR_Rifle");
    }

    #[test]
    fn describes_backspace_suicide() {
        let event = KillEvent {
            time: String::new(),
            killer: HANDLE.to_string(),
            victim: HANDLE.to_string(),
            weapon: HANDLE.to_string(),
            zone: String::new(),
            current_ship: String::new(),
            game_mode: String::new(),
            outcome: KillOutcome::Suicide,
        };
        assert_eq!(
            describe_kill_event(&event, &BTreeMap::new()),
            "You died via backspace."
        );
    }
}
