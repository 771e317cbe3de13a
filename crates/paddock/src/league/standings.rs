use std::collections::BTreeMap;

use rust_decimal::Decimal;
use tracing::debug;

use super::domain::{
    Category, DriverId, SessionResults, StandingEntry, TeamId, TeamStanding,
};
use super::EngineError;

/// Adds a round's earned points to the category roster. Drivers without an
/// existing entry (reserves covering for the first time) get a fresh entry
/// appended after the current roster, then the whole roster is re-ranked.
pub fn apply_round_points(
    category: &mut Category,
    earned: &BTreeMap<DriverId, Decimal>,
) {
    let mut remaining = earned.clone();
    for entry in &mut category.standings {
        if let Some(points) = remaining.remove(&entry.driver_id) {
            entry.points += points;
        }
    }

    // Reserves are appended after existing members so stable ranking keeps
    // them behind on equal points.
    for (driver_id, points) in remaining {
        let mut entry = StandingEntry::reserve(driver_id);
        entry.points = points;
        debug!(driver = ?driver_id, %points, "reserve driver added to roster");
        category.standings.push(entry);
    }

    rerank(&mut category.standings);
}

/// Assigns contiguous positions by points descending. The roster vector
/// itself stays in arrival order; ranking through a stable index sort
/// breaks ties by that order, and reversing a penalty that briefly split
/// a tie restores the original positions exactly.
pub fn rerank(entries: &mut [StandingEntry]) {
    let mut order: Vec<usize> = (0..entries.len()).collect();
    order.sort_by(|&a, &b| entries[b].points.cmp(&entries[a].points));
    for (rank, index) in order.into_iter().enumerate() {
        entries[index].position = rank as u32 + 1;
    }
}

/// Credits a team's championship tally and keeps the table ranked.
pub fn credit_team(teams: &mut [TeamStanding], team_id: TeamId, delta: Decimal) {
    for team in teams.iter_mut() {
        if team.team_id == team_id {
            team.points += delta;
            break;
        }
    }
    rerank_teams(teams);
}

/// Ranks the team table by points descending, ties kept in stored order.
/// The vector itself is never reordered, for the same reason as `rerank`.
pub fn rerank_teams(teams: &mut [TeamStanding]) {
    let mut order: Vec<usize> = (0..teams.len()).collect();
    order.sort_by(|&a, &b| teams[b].points.cmp(&teams[a].points));
    for (rank, index) in order.into_iter().enumerate() {
        teams[index].position = rank as u32 + 1;
    }
}

/// Conservation invariant: roster points must equal the points earned by
/// every kept result minus the point deltas of penalties still in effect.
pub fn verify_conservation(category: &Category) -> Result<(), EngineError> {
    let mut earned = Decimal::ZERO;
    for round in &category.rounds {
        for session in &round.sessions {
            match &session.results {
                SessionResults::Qualifying(results) => {
                    earned += results
                        .iter()
                        .map(|result| result.points_earned)
                        .sum::<Decimal>();
                }
                SessionResults::Race(results) => {
                    earned += results
                        .iter()
                        .map(|result| result.points_earned)
                        .sum::<Decimal>();
                }
            }
        }
    }

    let penalised: Decimal = category
        .penalties
        .iter()
        .map(|penalty| penalty.points)
        .sum();

    let standing_total: Decimal = category
        .standings
        .iter()
        .map(|entry| entry.points)
        .sum();

    if standing_total != earned - penalised {
        return Err(EngineError::InconsistentState {
            detail: format!(
                "category {:?} standings total {} does not match earned {} minus penalties {}",
                category.id, standing_total, earned, penalised
            ),
        });
    }
    Ok(())
}

/// Rank contiguity invariant: positions must form a permutation of 1..N.
/// Roster order is arrival order, so positions are checked as a set.
pub fn verify_rank_contiguity(category: &Category) -> Result<(), EngineError> {
    let mut taken = vec![false; category.standings.len()];
    for entry in &category.standings {
        let position = entry.position as usize;
        if position == 0 || position > taken.len() || taken[position - 1] {
            return Err(EngineError::InconsistentState {
                detail: format!(
                    "category {:?} entry for driver {:?} holds position {} outside 1..={} or twice",
                    category.id,
                    entry.driver_id,
                    entry.position,
                    taken.len()
                ),
            });
        }
        taken[position - 1] = true;
    }
    Ok(())
}
