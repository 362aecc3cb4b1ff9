use std::borrow::Cow;
use std::collections::BTreeMap;

use regex::Regex;

use crate::settings::{ExclusionKind, ExclusionRule, ExclusionSettings};

#[derive(Debug, Clone)]
enum CompiledRule {
    Substring(String),
    Prefix(String),
    Pattern(Regex),
}

impl CompiledRule {
    fn compile(rule: &ExclusionRule, ignore_case: bool) -> Result<Self, regex::Error> {
        let fold = |value: &str| {
            if ignore_case {
                value.to_lowercase()
            } else {
                value.to_string()
            }
        };

        let compiled = match rule.kind {
            ExclusionKind::Substring => CompiledRule::Substring(fold(&rule.value)),
            ExclusionKind::Prefix => CompiledRule::Prefix(fold(&rule.value)),
            ExclusionKind::Pattern => CompiledRule::Pattern(Regex::new(&rule.value)?),
        };
        Ok(compiled)
    }

    fn matches(&self, line: &str, folded_line: &str) -> bool {
        match self {
            CompiledRule::Substring(value) => folded_line.contains(value.as_str()),
            CompiledRule::Prefix(value) => folded_line.starts_with(value.as_str()),
            CompiledRule::Pattern(pattern) => pattern.is_match(line),
        }
    }

    fn describe(&self) -> String {
        match self {
            CompiledRule::Substring(value) => format!("substring '{value}'"),
            CompiledRule::Prefix(value) => format!("prefix '{value}'"),
            CompiledRule::Pattern(pattern) => format!("pattern '{}'", pattern.as_str()),
        }
    }
}

#[derive(Debug, Clone, Default)]
struct RuleSet {
    rules: Vec<CompiledRule>,
    ignore_case: bool,
}

impl RuleSet {
    fn compile(rules: &[ExclusionRule], ignore_case: bool) -> Result<Self, regex::Error> {
        let rules = rules
            .iter()
            .map(|rule| CompiledRule::compile(rule, ignore_case))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules, ignore_case })
    }

    fn first_match(&self, line: &str) -> Option<String> {
        let folded_line = if self.ignore_case {
            Cow::Owned(line.to_lowercase())
        } else {
            Cow::Borrowed(line)
        };

        self.rules
            .iter()
            .find(|rule| rule.matches(line, &folded_line))
            .map(CompiledRule::describe)
    }
}

/// Exclusion rules compiled once per session and evaluated read-only.
///
/// Victim substring and prefix rules compare case-insensitively. Game-mode
/// rules compare exactly, so a `Crash` rule does not catch a victim named
/// `crashdummy`. Pattern rules are regular expressions matched against the
/// raw line.
#[derive(Debug, Clone, Default)]
pub struct ExclusionRules {
    victim_rules: RuleSet,
    mode_rules: BTreeMap<String, RuleSet>,
}

impl ExclusionRules {
    pub fn compile(settings: &ExclusionSettings) -> Result<Self, regex::Error> {
        let victim_rules = RuleSet::compile(&settings.victim_rules, true)?;

        let mut mode_rules = BTreeMap::new();
        for (game_mode, rules) in &settings.mode_rules {
            mode_rules.insert(game_mode.clone(), RuleSet::compile(rules, false)?);
        }

        Ok(Self {
            victim_rules,
            mode_rules,
        })
    }

    /// Returns a description of the first game-mode rule matching the line.
    pub fn match_game_mode(&self, game_mode: &str, line: &str) -> Option<String> {
        self.mode_rules.get(game_mode)?.first_match(line)
    }

    /// Returns a description of the first victim rule matching the line.
    pub fn match_victim(&self, line: &str) -> Option<String> {
        self.victim_rules.first_match(line)
    }
}

#[cfg(test)]
mod tests {
    use super::ExclusionRules;
    use crate::settings::{ExclusionRule, ExclusionSettings};

    fn rules_with_victims(victim_rules: Vec<ExclusionRule>) -> ExclusionRules {
        ExclusionRules::compile(&ExclusionSettings {
            victim_rules,
            ..ExclusionSettings::default()
        })
        .unwrap()
    }

    #[test]
    fn mode_rules_only_apply_to_their_mode() {
        let rules = ExclusionRules::compile(&ExclusionSettings::default()).unwrap();
        let line = "CActor::Kill: 'PilotOne' killed by 'PilotOne' using 'Crash'";

        assert!(rules.match_game_mode("EA_FreeFlight", line).is_some());
        assert!(rules.match_game_mode("EA_SquadronBattle", line).is_some());
        assert!(rules.match_game_mode("PU", line).is_none());
    }

    #[test]
    fn mode_rules_are_case_sensitive() {
        let rules = ExclusionRules::compile(&ExclusionSettings::default()).unwrap();
        let line = "<2025-01-05T20:11:42.123Z> [Notice] <Actor Death> CActor::Kill: 'crashdummy' [200000000002] in zone 'ANVL_Hornet_F1_12345' killed by 'PilotOne' [200000000001] using 'KLWE_LaserRepeater_S3_3245' [Class unknown] with damage type 'Bullet'";

        assert_eq!(rules.match_game_mode("EA_FreeFlight", line), None);
        assert_eq!(
            rules.match_game_mode("EA_FreeFlight", &line.replace("crashdummy", "Crashdummy")),
            Some("substring 'Crash'".to_string())
        );
    }

    #[test]
    fn substring_and_prefix_ignore_case() {
        let rules = rules_with_victims(vec![
            ExclusionRule::substring("PU_Human_Enemy"),
            ExclusionRule::prefix("<2025-01-05"),
        ]);

        assert!(rules
            .match_victim("'pu_human_enemy_GroundCombat_NPC_123' killed by 'PilotOne'")
            .is_some());
        assert!(rules.match_victim("<2025-01-05T20:11:42.123Z> anything").is_some());
        assert!(rules.match_victim("<2025-01-06T20:11:42.123Z> anything").is_none());
    }

    #[test]
    fn pattern_rules_are_case_sensitive_regexes() {
        let rules = rules_with_victims(vec![ExclusionRule::pattern(r"Kopion_\d+")]);

        assert!(rules.match_victim("'Kopion_77' killed by 'PilotOne'").is_some());
        assert!(rules.match_victim("'kopion_77' killed by 'PilotOne'").is_none());
    }

    #[test]
    fn invalid_pattern_fails_to_compile() {
        let result = ExclusionRules::compile(&ExclusionSettings {
            victim_rules: vec![ExclusionRule::pattern("([unclosed")],
            ..ExclusionSettings::default()
        });
        assert!(result.is_err());
    }
}
