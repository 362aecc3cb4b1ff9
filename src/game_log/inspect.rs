use std::collections::BTreeMap;
use std::ops::ControlFlow;
use std::path::Path;

use serde::Serialize;

use super::dispatch::{process_line, LineContext, ParserRules};
use super::error::MonitorError;
use super::model::{Emission, KillEvent, ParserState, PlayerIdentity};
use super::stats::StatsLabels;
use super::tailer::LogTailer;

const MAX_REPORTED_KILLS: usize = 2_000;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InspectedKill {
    pub line_number: u64,
    #[serde(flatten)]
    pub event: KillEvent,
}

/// Offline pass over a whole log with every line treated as live, for
/// checking what the tracker would have reported.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InspectReport {
    pub file_path: String,
    pub file_size_bytes: u64,
    pub total_lines: u64,
    pub unparseable_lines: u64,
    pub handle: Option<String>,
    pub global_entity_id: Option<String>,
    pub kills: Vec<InspectedKill>,
    pub tag_counts: BTreeMap<String, u64>,
    pub outcome_counts: BTreeMap<String, u64>,
    pub truncated: bool,
    pub final_zone: String,
    pub final_zone_id: String,
    pub game_mode: String,
    pub stats: StatsLabels,
}

/// A trailing line without a newline is still being written and is left out.
pub fn inspect_log_file(
    path: &Path,
    identity: &PlayerIdentity,
    rules: &ParserRules,
) -> Result<InspectReport, MonitorError> {
    let mut tailer = LogTailer::open(path)?;
    let file_size_bytes = std::fs::metadata(path)
        .map_err(|source| MonitorError::FileAccess {
            path: path.to_path_buf(),
            source,
        })?
        .len();

    let context = LineContext {
        identity,
        rules,
        emission: Emission::Live,
    };
    let mut state = ParserState::new();
    let mut total_lines = 0_u64;
    let mut unparseable_lines = 0_u64;
    let mut kills: Vec<InspectedKill> = Vec::new();
    let mut tag_counts: BTreeMap<String, u64> = BTreeMap::new();
    let mut outcome_counts: BTreeMap<String, u64> = BTreeMap::new();
    let mut truncated = false;

    tailer.drain_existing(|line| {
        total_lines += 1;
        let outcome = process_line(line, &mut state, &context);

        *tag_counts.entry(outcome.tag.name().to_string()).or_insert(0) += 1;
        if outcome.unparseable {
            unparseable_lines += 1;
        }

        if let Some(event) = outcome.kill {
            *outcome_counts
                .entry(event.outcome.as_str().to_string())
                .or_insert(0) += 1;
            if kills.len() < MAX_REPORTED_KILLS {
                kills.push(InspectedKill {
                    line_number: total_lines,
                    event,
                });
            } else {
                truncated = true;
            }
        }

        ControlFlow::Continue(())
    })?;

    Ok(InspectReport {
        file_path: path.display().to_string(),
        file_size_bytes,
        total_lines,
        unparseable_lines,
        handle: identity.handle().map(str::to_string),
        global_entity_id: identity.global_entity_id().map(str::to_string),
        kills,
        tag_counts,
        outcome_counts,
        truncated,
        stats: state.stats.labels(&state.occupancy.zone),
        final_zone: state.occupancy.zone,
        final_zone_id: state.occupancy.zone_id,
        game_mode: state.game_mode,
    })
}
