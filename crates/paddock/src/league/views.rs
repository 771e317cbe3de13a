use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use super::domain::{
    Category, CategoryId, Driver, DriverId, RoundId, SessionId, SessionKind, SessionResults,
    TeamStanding,
};
use super::points::ScoringTable;
use super::stats::CareerSummary;

/// One line of a driver's result history inside the standings view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultLine {
    pub round_number: u32,
    pub session: &'static str,
    pub position: Option<u32>,
    pub extra_points: Decimal,
    pub penalty_seconds: Decimal,
}

/// A ranked roster row with the driver's per-session history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriverStandingView {
    pub driver_id: DriverId,
    pub driver_name: String,
    pub position: u32,
    pub points: Decimal,
    pub licence_points: i32,
    pub warnings: u32,
    pub reprimands: u32,
    pub results: Vec<ResultLine>,
}

/// A team table row ordered by championship points.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamStandingView {
    pub name: String,
    pub points: Decimal,
    pub position: u32,
}

/// Full standings response for one category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StandingsView {
    pub category_id: CategoryId,
    pub category_name: String,
    pub drivers: Vec<DriverStandingView>,
    pub teams: Vec<TeamStandingView>,
}

/// Session reference inside the calendar view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionRef {
    pub session_id: SessionId,
    pub label: &'static str,
}

/// One calendar entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoundView {
    pub round_id: RoundId,
    pub number: u32,
    pub circuit: String,
    pub date: NaiveDate,
    pub completed: bool,
    pub sessions: Vec<SessionRef>,
}

/// Calendar response for one category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalendarView {
    pub category_id: CategoryId,
    pub rounds: Vec<RoundView>,
}

/// Statistics response for one driver in a category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriverStatsView {
    pub driver_id: DriverId,
    pub driver_name: String,
    pub rating_mean: Decimal,
    pub rating_uncertainty: Decimal,
    pub consistency: u32,
    pub speed: u32,
    pub race_pace: u32,
    pub sportsmanship: u32,
    pub experience: u32,
    pub summary: CareerSummary,
}

pub(crate) fn build_standings_view(
    category: &Category,
    drivers: &[Driver],
    teams: &[TeamStanding],
    table: &ScoringTable,
) -> StandingsView {
    // Stored rosters keep arrival order; views present rank order.
    let mut driver_rows: Vec<DriverStandingView> = category
        .standings
        .iter()
        .map(|entry| DriverStandingView {
            driver_id: entry.driver_id,
            driver_name: driver_name(drivers, entry.driver_id),
            position: entry.position,
            points: entry.points,
            licence_points: entry.licence_points,
            warnings: entry.warnings,
            reprimands: entry.reprimands,
            results: result_lines(category, entry.driver_id, table),
        })
        .collect();
    driver_rows.sort_by_key(|row| row.position);

    let mut team_rows: Vec<TeamStandingView> = teams
        .iter()
        .map(|team| TeamStandingView {
            name: team.name.clone(),
            points: team.points,
            position: team.position,
        })
        .collect();
    team_rows.sort_by_key(|row| row.position);

    StandingsView {
        category_id: category.id,
        category_name: category.name.clone(),
        drivers: driver_rows,
        teams: team_rows,
    }
}

pub(crate) fn build_calendar_view(category: &Category) -> CalendarView {
    let rounds = category
        .rounds
        .iter()
        .map(|round| RoundView {
            round_id: round.id,
            number: round.number,
            circuit: round.circuit.clone(),
            date: round.date,
            completed: round.completed,
            sessions: round
                .sessions
                .iter()
                .map(|session| SessionRef {
                    session_id: session.id,
                    label: session.kind.label(),
                })
                .collect(),
        })
        .collect();

    CalendarView {
        category_id: category.id,
        rounds,
    }
}

fn driver_name(drivers: &[Driver], driver_id: DriverId) -> String {
    drivers
        .iter()
        .find(|driver| driver.id == driver_id)
        .map(|driver| driver.display_name.clone())
        .unwrap_or_else(|| format!("driver-{}", driver_id.0))
}

/// Per-race history lines. Qualifying bonus points ride with the round's
/// first race line, matching how they combine into the round tally.
fn result_lines(category: &Category, driver_id: DriverId, table: &ScoringTable) -> Vec<ResultLine> {
    let mut lines = Vec::new();
    for round in &category.rounds {
        let quali_bonus = round
            .qualifying_session()
            .and_then(|session| session.qualifying_results())
            .and_then(|results| {
                results
                    .iter()
                    .find(|result| result.driver_id == driver_id)
                    .map(|result| result.points_earned)
            })
            .unwrap_or(Decimal::ZERO);

        let mut first_race_seen = false;
        for session in &round.sessions {
            let SessionResults::Race(results) = &session.results else {
                continue;
            };
            let Some(result) = results.iter().find(|result| result.driver_id == driver_id)
            else {
                continue;
            };

            let mut extra = if result.fastest_lap {
                table.fastest_lap_bonus
            } else {
                Decimal::ZERO
            };
            if !first_race_seen {
                extra += quali_bonus;
                first_race_seen = true;
            }

            let penalty_seconds: Decimal = category
                .penalties
                .iter()
                .filter(|penalty| {
                    penalty.driver_id == driver_id && penalty.session_id == session.id
                })
                .map(|penalty| penalty.time_penalty)
                .sum();

            lines.push(ResultLine {
                round_number: round.number,
                session: match session.kind {
                    SessionKind::SprintRace => SessionKind::SprintRace.label(),
                    _ => SessionKind::LongRace.label(),
                },
                position: result.position,
                extra_points: extra,
                penalty_seconds,
            });
        }
    }
    lines
}
