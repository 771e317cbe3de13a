use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;

use super::domain::{
    Category, CategoryId, DriverId, PenaltyId, QualifyingResult, RaceResult, Rating, RoundId,
    SessionDraft, SessionId, SessionResults, TeamId, TimeEffect,
};
use super::normalizer::{self, RawSessionData};
use super::penalties::{self, PenaltySpec};
use super::points::ScoringTable;
use super::ratings::{self, RatingModelConfig};
use super::repository::{LeagueStore, StoreError, UnitOfWork};
use super::standings;
use super::stats;
use super::views::{self, CalendarView, DriverStatsView, StandingsView};
use super::EngineError;

/// Service composing the normalizer, points calculator, rating updater,
/// standings aggregator, and penalty engine behind one store boundary.
pub struct LeagueService<S> {
    store: Arc<S>,
    scoring: ScoringTable,
    rating_model: RatingModelConfig,
}

/// Error raised by the league service.
#[derive(Debug, thiserror::Error)]
pub enum LeagueServiceError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Summary returned after a round's results were saved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoundIngestReport {
    pub round_id: RoundId,
    pub sessions_saved: usize,
    pub deferred_penalties_applied: usize,
}

/// Receipt returned after a penalty application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PenaltyReceipt {
    pub penalty_id: PenaltyId,
    pub number: u32,
    pub time_effect: TimeEffect,
}

impl<S: LeagueStore> LeagueService<S> {
    pub fn new(store: Arc<S>, scoring: ScoringTable, rating_model: RatingModelConfig) -> Self {
        Self {
            store,
            scoring,
            rating_model,
        }
    }

    /// Maps and normalizes raw ingestion records, then saves the round.
    pub fn ingest_raw_round(
        &self,
        category_id: CategoryId,
        round_id: RoundId,
        raw_sessions: &[RawSessionData],
    ) -> Result<RoundIngestReport, LeagueServiceError> {
        let category = self.store.category(category_id)?;
        let drivers = self.store.drivers()?;

        let mapping: BTreeMap<String, DriverId> = drivers
            .iter()
            .flat_map(|driver| {
                driver
                    .external_ids
                    .iter()
                    .map(|external| (external.clone(), driver.id))
            })
            .collect();
        let roster: Vec<DriverId> = category
            .standings
            .iter()
            .map(|entry| entry.driver_id)
            .collect();

        let mut drafts = Vec::with_capacity(raw_sessions.len());
        for raw in raw_sessions {
            drafts.push(normalizer::normalize_session(raw, &roster, &mapping)?);
        }

        self.save_round_results(category_id, round_id, drafts)
    }

    /// Saves pre-normalized session drafts for one round: computes points,
    /// applies pending deferred penalties, updates ratings, folds
    /// standings, and commits everything as one unit.
    pub fn save_round_results(
        &self,
        category_id: CategoryId,
        round_id: RoundId,
        mut drafts: Vec<SessionDraft>,
    ) -> Result<RoundIngestReport, LeagueServiceError> {
        let mut category = self.store.category(category_id)?;

        let session_order: BTreeMap<SessionId, usize> = {
            let round = category
                .round(round_id)
                .ok_or_else(|| StoreError::NotFound(format!("round {:?}", round_id)))?;
            if round.completed {
                return Err(EngineError::DuplicateSubmission {
                    detail: format!("round {:?} already has saved results", round_id),
                }
                .into());
            }
            for draft in &drafts {
                let session = round.session(draft.session_id).ok_or_else(|| {
                    EngineError::InvalidDraft {
                        detail: format!(
                            "session {:?} does not belong to round {:?}",
                            draft.session_id, round_id
                        ),
                    }
                })?;
                if session.kind != draft.kind {
                    return Err(EngineError::InvalidDraft {
                        detail: format!(
                            "draft kind mismatch for session {:?}",
                            draft.session_id
                        ),
                    }
                    .into());
                }
                if session.has_results() {
                    return Err(EngineError::DuplicateSubmission {
                        detail: format!("session {:?} already has results", draft.session_id),
                    }
                    .into());
                }
            }
            round
                .sessions
                .iter()
                .enumerate()
                .map(|(index, session)| (session.id, index))
                .collect()
        };
        // Process drafts in the round's scheduled session order so rating
        // updates and deferred time are independent of upload order.
        drafts.sort_by_key(|draft| {
            session_order
                .get(&draft.session_id)
                .copied()
                .unwrap_or(usize::MAX)
        });

        let mut drivers = self.store.drivers()?;
        // Deactivated drivers keep scoring for themselves but no longer
        // contribute to a team tally.
        let driver_teams: BTreeMap<DriverId, Option<TeamId>> = drivers
            .iter()
            .filter(|driver| driver.active)
            .map(|driver| (driver.id, driver.team_id))
            .collect();
        let mut teams = self.store.team_standings(category.championship_id)?;
        let mut rating_book: BTreeMap<DriverId, Rating> = drivers
            .iter()
            .map(|driver| (driver.id, driver.rating))
            .collect();

        let mut round_points: BTreeMap<DriverId, Decimal> = BTreeMap::new();
        let mut deferred_applied = 0usize;

        for draft in &drafts {
            if draft.kind.is_qualifying() {
                let results = self.build_qualifying_results(draft, &mut round_points);
                set_session_results(
                    &mut category,
                    round_id,
                    draft.session_id,
                    SessionResults::Qualifying(results),
                )?;
            } else {
                let results = self.build_race_results(
                    &mut category,
                    draft,
                    &mut round_points,
                    &mut deferred_applied,
                )?;
                ratings::rate_race_session(&results, &mut rating_book, &self.rating_model);
                set_session_results(
                    &mut category,
                    round_id,
                    draft.session_id,
                    SessionResults::Race(results),
                )?;
            }
        }

        standings::apply_round_points(&mut category, &round_points);
        for (driver_id, points) in &round_points {
            if *points == Decimal::ZERO {
                continue;
            }
            if let Some(Some(team_id)) = driver_teams.get(driver_id) {
                standings::credit_team(&mut teams, *team_id, *points);
            }
        }

        // A round closes once every scheduled session has results on
        // record; partial submissions leave it open for the rest.
        let mut round_starters: BTreeSet<DriverId> = BTreeSet::new();
        if let Some(round) = category.round_mut(round_id) {
            round.completed = round.sessions.iter().all(|session| session.has_results());
            if round.completed {
                for session in &round.sessions {
                    if let Some(results) = session.race_results() {
                        round_starters.extend(
                            results
                                .iter()
                                .filter(|result| result.status.participated())
                                .map(|result| result.driver_id),
                        );
                    }
                }
            }
        }

        for driver in drivers.iter_mut() {
            if let Some(rating) = rating_book.get(&driver.id) {
                driver.rating = *rating;
            }
            if round_starters.contains(&driver.id) {
                driver.rounds_disputed += 1;
            }
        }

        standings::verify_conservation(&category)?;
        standings::verify_rank_contiguity(&category)?;

        let sessions_saved = drafts.len();
        info!(
            category = ?category_id,
            round = ?round_id,
            sessions = sessions_saved,
            deferred_applied,
            "round results saved"
        );

        self.store.commit(
            UnitOfWork::default()
                .with_category(category)
                .with_drivers(drivers)
                .with_teams(teams),
        )?;

        Ok(RoundIngestReport {
            round_id,
            sessions_saved,
            deferred_penalties_applied: deferred_applied,
        })
    }

    /// Applies a penalty and commits the touched records atomically.
    pub fn apply_penalty(
        &self,
        category_id: CategoryId,
        spec: PenaltySpec,
    ) -> Result<PenaltyReceipt, LeagueServiceError> {
        let mut category = self.store.category(category_id)?;
        let drivers = self.store.drivers()?;
        let driver_teams: BTreeMap<DriverId, Option<TeamId>> = drivers
            .iter()
            .filter(|driver| driver.active)
            .map(|driver| (driver.id, driver.team_id))
            .collect();
        let mut teams = self.store.team_standings(category.championship_id)?;

        let penalty_id = category.next_penalty_id();
        let penalty = penalties::apply(
            &mut category,
            &mut teams,
            &driver_teams,
            &self.scoring,
            penalty_id,
            spec,
        )?;
        let receipt = PenaltyReceipt {
            penalty_id: penalty.id,
            number: penalty.number,
            time_effect: penalty.time_effect,
        };
        category.penalties.push(penalty);

        standings::verify_conservation(&category)?;
        standings::verify_rank_contiguity(&category)?;

        self.store.commit(
            UnitOfWork::default()
                .with_category(category)
                .with_teams(teams),
        )?;
        info!(penalty = ?receipt.penalty_id, effect = ?receipt.time_effect, "penalty applied");
        Ok(receipt)
    }

    /// Reverses a penalty, deleting its record and restoring prior state.
    pub fn reverse_penalty(
        &self,
        category_id: CategoryId,
        penalty_id: PenaltyId,
    ) -> Result<(), LeagueServiceError> {
        let mut category = self.store.category(category_id)?;
        if category.penalty(penalty_id).is_none() {
            return Err(StoreError::NotFound(format!("penalty {:?}", penalty_id)).into());
        }
        let drivers = self.store.drivers()?;
        let driver_teams: BTreeMap<DriverId, Option<TeamId>> = drivers
            .iter()
            .filter(|driver| driver.active)
            .map(|driver| (driver.id, driver.team_id))
            .collect();
        let mut teams = self.store.team_standings(category.championship_id)?;

        penalties::reverse(
            &mut category,
            &mut teams,
            &driver_teams,
            &self.scoring,
            penalty_id,
        )?;

        standings::verify_conservation(&category)?;
        standings::verify_rank_contiguity(&category)?;

        self.store.commit(
            UnitOfWork::default()
                .with_category(category)
                .with_teams(teams),
        )?;
        Ok(())
    }

    /// Current ranked standings for a category, drivers and teams.
    pub fn standings(&self, category_id: CategoryId) -> Result<StandingsView, LeagueServiceError> {
        let category = self.store.category(category_id)?;
        let drivers = self.store.drivers()?;
        let teams = self.store.team_standings(category.championship_id)?;
        Ok(views::build_standings_view(
            &category,
            &drivers,
            &teams,
            &self.scoring,
        ))
    }

    /// Calendar listing for a category.
    pub fn calendar(&self, category_id: CategoryId) -> Result<CalendarView, LeagueServiceError> {
        let category = self.store.category(category_id)?;
        Ok(views::build_calendar_view(&category))
    }

    /// Statistics panel for one driver in a category.
    pub fn driver_stats(
        &self,
        category_id: CategoryId,
        driver_id: DriverId,
    ) -> Result<DriverStatsView, LeagueServiceError> {
        let category = self.store.category(category_id)?;
        let drivers = self.store.drivers()?;
        let driver = drivers
            .iter()
            .find(|driver| driver.id == driver_id)
            .ok_or_else(|| StoreError::NotFound(format!("driver {:?}", driver_id)))?;

        let mut race_results: Vec<RaceResult> = Vec::new();
        let mut quali_results: Vec<QualifyingResult> = Vec::new();
        for round in &category.rounds {
            for session in &round.sessions {
                match &session.results {
                    SessionResults::Race(results) => race_results.extend(
                        results
                            .iter()
                            .filter(|result| result.driver_id == driver_id)
                            .cloned(),
                    ),
                    SessionResults::Qualifying(results) => quali_results.extend(
                        results
                            .iter()
                            .filter(|result| result.driver_id == driver_id)
                            .cloned(),
                    ),
                }
            }
        }
        let received: Vec<&super::domain::Penalty> = category
            .penalties
            .iter()
            .filter(|penalty| penalty.driver_id == driver_id)
            .collect();
        let max_rounds = drivers
            .iter()
            .map(|driver| driver.rounds_disputed)
            .max()
            .unwrap_or(0);

        Ok(DriverStatsView {
            driver_id,
            driver_name: driver.display_name.clone(),
            rating_mean: driver.rating.mean,
            rating_uncertainty: driver.rating.uncertainty,
            consistency: stats::consistency(&race_results),
            speed: stats::speed(&quali_results),
            race_pace: stats::race_pace(&race_results),
            sportsmanship: stats::sportsmanship(race_results.len(), &received),
            experience: stats::experience(driver.rounds_disputed, max_rounds),
            summary: stats::career_summary(&race_results, &quali_results),
        })
    }

    /// Maintenance path: rebuilds every driver's rating from default priors
    /// by replaying all saved race sessions in chronological round order.
    pub fn recompute_ratings(&self) -> Result<usize, LeagueServiceError> {
        let mut sessions = Vec::new();
        for category_id in self.store.category_ids()? {
            let category = self.store.category(category_id)?;
            for round in &category.rounds {
                for (index, session) in round.sessions.iter().enumerate() {
                    if !session.is_qualifying() && session.has_results() {
                        sessions.push((round.date, round.number, index, session.clone()));
                    }
                }
            }
        }
        sessions.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)).then(a.2.cmp(&b.2)));

        let replayed = ratings::replay_ratings(
            sessions.iter().map(|(_, _, _, session)| session),
            &self.rating_model,
        );

        let mut drivers = self.store.drivers()?;
        for driver in drivers.iter_mut() {
            driver.rating = replayed
                .get(&driver.id)
                .copied()
                .unwrap_or_else(|| self.rating_model.initial_rating());
        }
        let updated = replayed.len();
        self.store
            .commit(UnitOfWork::default().with_drivers(drivers))?;
        info!(drivers = updated, sessions = sessions.len(), "ratings recomputed from scratch");
        Ok(updated)
    }

    fn build_qualifying_results(
        &self,
        draft: &SessionDraft,
        round_points: &mut BTreeMap<DriverId, Decimal>,
    ) -> Vec<QualifyingResult> {
        draft
            .results
            .iter()
            .map(|row| {
                let participated = row.status.participated();
                let points = self
                    .scoring
                    .qualifying_points(row.position, participated);
                if points != Decimal::ZERO {
                    *round_points.entry(row.driver_id).or_default() += points;
                }
                QualifyingResult {
                    driver_id: row.driver_id,
                    position: if participated { row.position } else { None },
                    laptime: row.best_lap,
                    gap_to_first: row.gap_to_first,
                    status: row.status,
                    points_earned: points,
                }
            })
            .collect()
    }

    /// Builds race results from a draft, folding in any pending deferred
    /// time penalties before positions and points are fixed.
    fn build_race_results(
        &self,
        category: &mut Category,
        draft: &SessionDraft,
        round_points: &mut BTreeMap<DriverId, Decimal>,
        deferred_applied: &mut usize,
    ) -> Result<Vec<RaceResult>, LeagueServiceError> {
        let mut rows = draft.results.clone();

        let mut consumed: Vec<PenaltyId> = Vec::new();
        for row in rows.iter_mut() {
            if row.total_time.is_none() {
                continue;
            }
            let pending: Decimal = category
                .deferred
                .iter()
                .filter(|deferred| deferred.driver_id == row.driver_id)
                .map(|deferred| deferred.time_penalty)
                .sum();
            if pending != Decimal::ZERO {
                if let Some(total) = row.total_time.as_mut() {
                    *total += pending;
                }
                consumed.extend(
                    category
                        .deferred
                        .iter()
                        .filter(|deferred| deferred.driver_id == row.driver_id)
                        .map(|deferred| deferred.penalty_id),
                );
            }
        }

        if !consumed.is_empty() {
            // The carried time changes the order, so re-sort the timed rows
            // and recompute positions and gaps before scoring.
            rows.sort_by(|a, b| match (a.total_time, b.total_time) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            });
            let best = rows.iter().find_map(|row| row.total_time);
            let mut position = 0;
            for row in rows.iter_mut() {
                let Some(total) = row.total_time else { continue };
                position += 1;
                row.position = Some(position);
                if let Some(best) = best {
                    row.gap_to_first = Some(total - best);
                }
            }

            *deferred_applied += consumed.len();
            category
                .deferred
                .retain(|deferred| !consumed.contains(&deferred.penalty_id));
            for penalty in category.penalties.iter_mut() {
                if consumed.contains(&penalty.id) {
                    penalty.time_effect = TimeEffect::Applied {
                        session_id: draft.session_id,
                    };
                }
            }
            info!(session = ?draft.session_id, count = consumed.len(), "deferred time penalties folded into ingested results");
        }

        let results = rows
            .iter()
            .map(|row| {
                let participated = row.status.participated();
                let fastest_lap = draft.fastest_lap_driver == Some(row.driver_id);
                let position = if participated { row.position } else { None };
                let points = self.scoring.race_points(position, participated, fastest_lap);
                if points != Decimal::ZERO {
                    *round_points.entry(row.driver_id).or_default() += points;
                }
                RaceResult {
                    driver_id: row.driver_id,
                    position,
                    total_racetime: row.total_time,
                    gap_to_first: row.gap_to_first,
                    fastest_lap,
                    status: row.status,
                    points_earned: points,
                }
            })
            .collect();
        Ok(results)
    }
}

fn set_session_results(
    category: &mut Category,
    round_id: RoundId,
    session_id: SessionId,
    results: SessionResults,
) -> Result<(), LeagueServiceError> {
    let session = category
        .round_mut(round_id)
        .and_then(|round| round.session_mut(session_id))
        .ok_or_else(|| EngineError::InvalidDraft {
            detail: format!("session {:?} vanished while saving", session_id),
        })?;
    session.results = results;
    Ok(())
}
