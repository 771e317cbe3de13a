use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::domain::{
    CompletionStatus, DraftResult, DriverId, SessionDraft, SessionId, SessionKind,
};
use super::EngineError;

/// One lap sample from the ingestion source. A missing or non-positive
/// time means the sample was not recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLap {
    pub time: Option<Decimal>,
    pub sectors: Vec<Option<Decimal>>,
}

/// One player's raw row for a session, keyed by the platform identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPlayerResult {
    pub external_id: String,
    pub position: u32,
    pub best_lap: Option<Decimal>,
    pub total_time: Option<Decimal>,
    pub laps: Vec<RawLap>,
    pub finished: bool,
}

/// Raw per-session record supplied by the ingestion source, players ordered
/// by finishing position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSessionData {
    pub session_id: SessionId,
    pub kind: SessionKind,
    pub players: Vec<RawPlayerResult>,
}

/// Maps platform identifiers to registered drivers. An unmapped identifier
/// fails the whole ingestion batch.
pub fn resolve_driver(
    mapping: &BTreeMap<String, DriverId>,
    external_id: &str,
) -> Result<DriverId, EngineError> {
    mapping.get(external_id).copied().ok_or_else(|| EngineError::Mapping {
        external_id: external_id.to_string(),
    })
}

/// Turns a raw session record into a validated draft: one row per expected
/// roster driver, absentees synthesized with no position and zero points.
pub fn normalize_session(
    raw: &RawSessionData,
    roster: &[DriverId],
    mapping: &BTreeMap<String, DriverId>,
) -> Result<SessionDraft, EngineError> {
    let mut draft = if raw.kind.is_qualifying() {
        normalize_qualifying(raw, mapping)?
    } else {
        normalize_race(raw, mapping)?
    };

    // Contract: output length equals the number of drivers expected in the
    // category at this round.
    for driver_id in roster {
        if !draft.results.iter().any(|result| result.driver_id == *driver_id) {
            draft.results.push(DraftResult {
                driver_id: *driver_id,
                position: None,
                total_time: None,
                gap_to_first: None,
                best_lap: None,
                status: CompletionStatus::Absent,
            });
        }
    }

    validate(&draft, roster)?;
    Ok(draft)
}

fn normalize_qualifying(
    raw: &RawSessionData,
    mapping: &BTreeMap<String, DriverId>,
) -> Result<SessionDraft, EngineError> {
    let pole_lap = raw
        .players
        .first()
        .and_then(|player| player.best_lap);

    let mut results = Vec::with_capacity(raw.players.len());
    for player in &raw.players {
        let driver_id = resolve_driver(mapping, &player.external_id)?;
        let gap_to_first = match (player.best_lap, pole_lap) {
            (Some(lap), Some(pole)) => Some(lap - pole),
            _ => None,
        };
        results.push(DraftResult {
            driver_id,
            position: Some(player.position),
            total_time: player.best_lap,
            gap_to_first,
            best_lap: player.best_lap,
            status: if player.best_lap.is_some() {
                CompletionStatus::Finished
            } else {
                CompletionStatus::Retired
            },
        });
    }

    Ok(SessionDraft {
        session_id: raw.session_id,
        kind: raw.kind,
        results,
        fastest_lap_driver: None,
    })
}

fn normalize_race(
    raw: &RawSessionData,
    mapping: &BTreeMap<String, DriverId>,
) -> Result<SessionDraft, EngineError> {
    let Some(leader) = raw.players.first() else {
        return Ok(SessionDraft {
            session_id: raw.session_id,
            kind: raw.kind,
            results: Vec::new(),
            fastest_lap_driver: None,
        });
    };
    let leader_total = leader.total_time.unwrap_or(Decimal::ZERO);

    let mut fastest_lap: Option<(DriverId, Decimal)> = None;
    let mut results = Vec::with_capacity(raw.players.len());
    for player in &raw.players {
        let driver_id = resolve_driver(mapping, &player.external_id)?;
        let gap_to_first = gap_to_leader(&leader.laps, &player.laps);
        let total_racetime = leader_total + gap_to_first;

        // First minimum wins when best laps tie; attribution of identical
        // laps is an open point and not guaranteed behavior.
        if let Some(best) = player.best_lap {
            match fastest_lap {
                Some((_, current)) if current <= best => {}
                _ => fastest_lap = Some((driver_id, best)),
            }
        }

        results.push(DraftResult {
            driver_id,
            position: Some(player.position),
            total_time: Some(total_racetime),
            gap_to_first: Some(gap_to_first),
            best_lap: player.best_lap,
            status: if player.finished {
                CompletionStatus::Finished
            } else {
                CompletionStatus::Retired
            },
        });
    }

    Ok(SessionDraft {
        session_id: raw.session_id,
        kind: raw.kind,
        results,
        fastest_lap_driver: fastest_lap.map(|(driver_id, _)| driver_id),
    })
}

/// Accumulates the gap to the session leader lap by lap. When a player lap
/// sample is missing, walk the lap's sector times backwards until a sample
/// valid for both leader and player is found and use that delta instead.
fn gap_to_leader(leader_laps: &[RawLap], player_laps: &[RawLap]) -> Decimal {
    let mut gap = Decimal::ZERO;
    for (leader_lap, player_lap) in leader_laps.iter().zip(player_laps.iter()) {
        if let (Some(leader_time), Some(player_time)) = (leader_lap.time, player_lap.time) {
            gap += player_time - leader_time;
            continue;
        }
        for (leader_sector, player_sector) in leader_lap
            .sectors
            .iter()
            .rev()
            .zip(player_lap.sectors.iter().rev())
        {
            if let (Some(leader_time), Some(player_time)) = (leader_sector, player_sector) {
                gap += player_time - leader_time;
                break;
            }
        }
    }
    gap
}

fn validate(draft: &SessionDraft, roster: &[DriverId]) -> Result<(), EngineError> {
    // Every roster driver is covered (absentees were synthesized above);
    // rows beyond the roster are reserve drivers covering this round.
    if draft.results.len() < roster.len() {
        return Err(EngineError::InvalidDraft {
            detail: format!(
                "draft for session {:?} has {} rows, roster expects at least {}",
                draft.session_id,
                draft.results.len(),
                roster.len()
            ),
        });
    }

    let mut seen = Vec::with_capacity(draft.results.len());
    for result in &draft.results {
        if seen.contains(&result.driver_id) {
            return Err(EngineError::InvalidDraft {
                detail: format!(
                    "driver {:?} appears twice in session {:?}",
                    result.driver_id, draft.session_id
                ),
            });
        }
        seen.push(result.driver_id);
    }

    debug!(session = ?draft.session_id, rows = draft.results.len(), "session draft validated");
    Ok(())
}
