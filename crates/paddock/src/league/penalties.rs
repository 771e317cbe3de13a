use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::domain::{
    Category, CompletionStatus, DeferredPenalty, DriverId, Penalty, PenaltyId, RaceResult,
    SessionId, SessionKind, TeamId, TeamStanding, TimeEffect,
};
use super::points::ScoringTable;
use super::standings;
use super::EngineError;

/// Admin-supplied description of a sanction to apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PenaltySpec {
    pub driver_id: DriverId,
    pub session_id: SessionId,
    pub time_penalty: Decimal,
    pub points: Decimal,
    pub licence_points: i32,
    pub warnings: u32,
    pub reprimand: bool,
    pub reason: String,
}

/// Applies a penalty to the category, mutating historical results where a
/// time component demands it, and returns the stored record.
pub fn apply(
    category: &mut Category,
    teams: &mut Vec<TeamStanding>,
    driver_teams: &BTreeMap<DriverId, Option<TeamId>>,
    table: &ScoringTable,
    id: PenaltyId,
    spec: PenaltySpec,
) -> Result<Penalty, EngineError> {
    let round_id = category
        .round_of_session(spec.session_id)
        .map(|round| round.id)
        .ok_or_else(|| EngineError::InconsistentState {
            detail: format!(
                "session {:?} does not belong to category {:?}",
                spec.session_id, category.id
            ),
        })?;

    let mut penalty = Penalty {
        id,
        number: category.next_penalty_number(round_id),
        driver_id: spec.driver_id,
        category_id: category.id,
        round_id,
        session_id: spec.session_id,
        time_penalty: spec.time_penalty,
        points: spec.points,
        licence_points: spec.licence_points,
        warnings: spec.warnings,
        reprimand: spec.reprimand,
        reason: spec.reason,
        time_effect: TimeEffect::None,
    };

    // Step 1: licence points, warnings, and championship points on the
    // driver's entry, mirrored on the team tally.
    let category_id = category.id;
    let entry = category
        .standing_mut(spec.driver_id)
        .ok_or_else(|| EngineError::InconsistentState {
            detail: format!(
                "driver {:?} has no standing entry in category {:?}",
                spec.driver_id, category_id
            ),
        })?;
    entry.licence_points -= spec.licence_points;
    entry.warnings += spec.warnings;
    if spec.reprimand {
        entry.reprimands += 1;
    }
    if spec.points != Decimal::ZERO {
        entry.points -= spec.points;
        if let Some(Some(team_id)) = driver_teams.get(&spec.driver_id) {
            standings::credit_team(teams, *team_id, -spec.points);
        }
        standings::rerank(&mut category.standings);
    }

    if spec.time_penalty == Decimal::ZERO {
        return Ok(penalty);
    }

    let session_kind = category
        .round(round_id)
        .and_then(|round| round.session(spec.session_id))
        .map(|session| session.kind)
        .ok_or_else(|| EngineError::InconsistentState {
            detail: format!("session {:?} disappeared during apply", spec.session_id),
        })?;

    if session_kind.is_qualifying() {
        // Qualifying order never changes point math; the time is held for
        // the driver's next race-points calculation.
        let has_result = category
            .round(round_id)
            .and_then(|round| round.session(spec.session_id))
            .and_then(|session| session.qualifying_results())
            .map(|results| {
                results
                    .iter()
                    .any(|result| result.driver_id == spec.driver_id)
            })
            .unwrap_or(false);
        if !has_result {
            return Err(EngineError::MissingPriorResult {
                driver_id: spec.driver_id,
                session_id: spec.session_id,
            });
        }
        category.deferred.push(DeferredPenalty {
            penalty_id: penalty.id,
            driver_id: spec.driver_id,
            time_penalty: spec.time_penalty,
        });
        penalty.time_effect = TimeEffect::Pending;
        info!(penalty = ?penalty.id, driver = ?spec.driver_id, "qualifying time penalty deferred to next race");
        return Ok(penalty);
    }

    penalty.time_effect = apply_time_to_race(
        category,
        teams,
        driver_teams,
        table,
        round_id,
        spec.session_id,
        session_kind,
        spec.driver_id,
        spec.time_penalty,
        penalty.id,
    )?;

    Ok(penalty)
}

#[allow(clippy::too_many_arguments)]
fn apply_time_to_race(
    category: &mut Category,
    teams: &mut Vec<TeamStanding>,
    driver_teams: &BTreeMap<DriverId, Option<TeamId>>,
    table: &ScoringTable,
    round_id: super::domain::RoundId,
    session_id: SessionId,
    session_kind: SessionKind,
    driver_id: DriverId,
    time_penalty: Decimal,
    penalty_id: PenaltyId,
) -> Result<TimeEffect, EngineError> {
    if add_time_and_rescore(
        category,
        teams,
        driver_teams,
        table,
        round_id,
        session_id,
        driver_id,
        time_penalty,
    )? {
        return Ok(TimeEffect::Applied { session_id });
    }

    // The driver has no finished result in the target session: deferral
    // policy. Only the first race of a two-race round can carry the time
    // forward to the second race.
    if session_kind == SessionKind::SprintRace {
        let long_race = category
            .round(round_id)
            .and_then(|round| round.long_race())
            .map(|session| (session.id, session.has_results()));
        match long_race {
            Some((long_id, true)) => {
                if add_time_and_rescore(
                    category,
                    teams,
                    driver_teams,
                    table,
                    round_id,
                    long_id,
                    driver_id,
                    time_penalty,
                )? {
                    info!(penalty = ?penalty_id, driver = ?driver_id, "time penalty carried to the round's second race");
                    return Ok(TimeEffect::Applied {
                        session_id: long_id,
                    });
                }
                warn!(penalty = ?penalty_id, driver = ?driver_id, "driver missing from both races; time portion dropped");
                Ok(TimeEffect::Dropped)
            }
            Some((_, false)) => {
                category.deferred.push(DeferredPenalty {
                    penalty_id,
                    driver_id,
                    time_penalty,
                });
                info!(penalty = ?penalty_id, driver = ?driver_id, "time penalty held for the round's second race");
                Ok(TimeEffect::Pending)
            }
            None => {
                warn!(penalty = ?penalty_id, driver = ?driver_id, "round has no second race; time portion dropped");
                Ok(TimeEffect::Dropped)
            }
        }
    } else {
        // Last race of the round; with no later session in the calendar to
        // attach to, the time portion is dropped by policy.
        warn!(
            penalty = ?penalty_id,
            driver = ?driver_id,
            final_round = category.is_final_round(round_id),
            "no session eligible for the time penalty; time portion dropped"
        );
        Ok(TimeEffect::Dropped)
    }
}

/// Adds the time to the driver's finished result in the session, if any,
/// then re-sorts, re-gaps, re-scores, and propagates point deltas. Returns
/// false when the driver has no finished result there.
#[allow(clippy::too_many_arguments)]
fn add_time_and_rescore(
    category: &mut Category,
    teams: &mut Vec<TeamStanding>,
    driver_teams: &BTreeMap<DriverId, Option<TeamId>>,
    table: &ScoringTable,
    round_id: super::domain::RoundId,
    session_id: SessionId,
    driver_id: DriverId,
    time_delta: Decimal,
) -> Result<bool, EngineError> {
    let deltas = {
        let round = category
            .round_mut(round_id)
            .ok_or_else(|| EngineError::InconsistentState {
                detail: format!("round {:?} missing during penalty application", round_id),
            })?;
        let session = round
            .session_mut(session_id)
            .ok_or_else(|| EngineError::InconsistentState {
                detail: format!("session {:?} missing during penalty application", session_id),
            })?;
        let Some(results) = session.race_results_mut() else {
            return Err(EngineError::InconsistentState {
                detail: format!("session {:?} is not a race session", session_id),
            });
        };

        let mut touched = false;
        for result in results.iter_mut() {
            if result.driver_id == driver_id && result.status == CompletionStatus::Finished {
                if let Some(total) = result.total_racetime.as_mut() {
                    *total += time_delta;
                    touched = true;
                }
            }
        }
        if !touched {
            return Ok(false);
        }

        resort_race_session(results, table)
    };

    propagate_point_deltas(category, teams, driver_teams, &deltas)?;
    Ok(true)
}

/// Re-sorts finished results by total race time, recomputes every gap and
/// position, re-scores positions that moved, and returns the per-driver
/// point deltas (new minus old). Non-finishers keep their order and score.
pub(crate) fn resort_race_session(
    results: &mut [RaceResult],
    table: &ScoringTable,
) -> BTreeMap<DriverId, Decimal> {
    let old_points: BTreeMap<DriverId, Decimal> = results
        .iter()
        .map(|result| (result.driver_id, result.points_earned))
        .collect();

    results.sort_by(|a, b| {
        let a_finished = a.status == CompletionStatus::Finished;
        let b_finished = b.status == CompletionStatus::Finished;
        match (a_finished, b_finished) {
            (true, true) => a.total_racetime.cmp(&b.total_racetime),
            (true, false) => std::cmp::Ordering::Less,
            (false, true) => std::cmp::Ordering::Greater,
            (false, false) => std::cmp::Ordering::Equal,
        }
    });

    let best_time = results
        .iter()
        .find(|result| result.status == CompletionStatus::Finished)
        .and_then(|result| result.total_racetime);

    let mut position = 0;
    let mut deltas = BTreeMap::new();
    for result in results.iter_mut() {
        if result.status != CompletionStatus::Finished {
            continue;
        }
        position += 1;
        result.position = Some(position);
        if let (Some(total), Some(best)) = (result.total_racetime, best_time) {
            result.gap_to_first = Some(total - best);
        }
        result.points_earned = table.race_points(
            result.position,
            result.status.participated(),
            result.fastest_lap,
        );

        let old = old_points
            .get(&result.driver_id)
            .copied()
            .unwrap_or(Decimal::ZERO);
        let delta = result.points_earned - old;
        if delta != Decimal::ZERO {
            deltas.insert(result.driver_id, delta);
        }
    }

    deltas
}

/// Applies point deltas produced by a session re-sort to every affected
/// standing entry and team tally, then re-ranks both tables.
fn propagate_point_deltas(
    category: &mut Category,
    teams: &mut Vec<TeamStanding>,
    driver_teams: &BTreeMap<DriverId, Option<TeamId>>,
    deltas: &BTreeMap<DriverId, Decimal>,
) -> Result<(), EngineError> {
    for (driver_id, delta) in deltas {
        let entry = category.standing_mut(*driver_id).ok_or_else(|| {
            EngineError::InconsistentState {
                detail: format!(
                    "driver {:?} scored in a session but has no standing entry",
                    driver_id
                ),
            }
        })?;
        entry.points += *delta;
        if let Some(Some(team_id)) = driver_teams.get(driver_id) {
            standings::credit_team(teams, *team_id, *delta);
        }
    }
    standings::rerank(&mut category.standings);
    standings::rerank_teams(teams);
    Ok(())
}

/// Reverses a previously applied penalty, restoring every touched field
/// exactly. Ratings are never recomputed retroactively.
pub fn reverse(
    category: &mut Category,
    teams: &mut Vec<TeamStanding>,
    driver_teams: &BTreeMap<DriverId, Option<TeamId>>,
    table: &ScoringTable,
    penalty_id: PenaltyId,
) -> Result<Penalty, EngineError> {
    let index = category
        .penalties
        .iter()
        .position(|penalty| penalty.id == penalty_id)
        .ok_or_else(|| EngineError::InconsistentState {
            detail: format!("penalty {:?} is not on record", penalty_id),
        })?;
    let penalty = category.penalties.remove(index);

    let category_id = category.id;
    let entry = category
        .standing_mut(penalty.driver_id)
        .ok_or_else(|| EngineError::InconsistentState {
            detail: format!(
                "driver {:?} has no standing entry in category {:?}",
                penalty.driver_id, category_id
            ),
        })?;
    entry.licence_points += penalty.licence_points;
    entry.warnings -= penalty.warnings;
    if penalty.reprimand {
        entry.reprimands -= 1;
    }
    if penalty.points != Decimal::ZERO {
        entry.points += penalty.points;
        if let Some(Some(team_id)) = driver_teams.get(&penalty.driver_id) {
            standings::credit_team(teams, *team_id, penalty.points);
        }
        standings::rerank(&mut category.standings);
    }

    match penalty.time_effect {
        TimeEffect::None | TimeEffect::Dropped => {}
        TimeEffect::Pending => {
            category
                .deferred
                .retain(|deferred| deferred.penalty_id != penalty.id);
            info!(penalty = ?penalty.id, "pending time penalty withdrawn");
        }
        TimeEffect::Applied { session_id } => {
            let applied = add_time_and_rescore(
                category,
                teams,
                driver_teams,
                table,
                penalty.round_id,
                session_id,
                penalty.driver_id,
                -penalty.time_penalty,
            )?;
            if !applied {
                return Err(EngineError::MissingPriorResult {
                    driver_id: penalty.driver_id,
                    session_id,
                });
            }
        }
    }

    info!(penalty = ?penalty.id, driver = ?penalty.driver_id, "penalty reversed");
    Ok(penalty)
}
