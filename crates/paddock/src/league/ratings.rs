use std::collections::BTreeMap;

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use skillratings::trueskill::{trueskill_multi_team, TrueSkillConfig, TrueSkillRating};
use skillratings::MultiTeamOutcome;
use tracing::debug;

use super::domain::{CompletionStatus, DriverId, RaceResult, Rating, Session};

/// Stored precision for rating pairs.
const RATING_SCALE: u32 = 6;

/// Caller-supplied rating model parameters. There is no process-wide
/// environment; every update receives its configuration explicitly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingModelConfig {
    pub draw_probability: f64,
    pub beta: f64,
    pub dynamics: f64,
    pub initial_mean: Decimal,
    pub initial_uncertainty: Decimal,
}

impl Default for RatingModelConfig {
    fn default() -> Self {
        // Priors 25 and 25/3; finishing positions are unique so draws
        // cannot occur.
        Self {
            draw_probability: 0.0,
            beta: 25.0 / 6.0,
            dynamics: 25.0 / 300.0,
            initial_mean: dec!(25),
            initial_uncertainty: dec!(8.333333),
        }
    }
}

impl RatingModelConfig {
    pub fn initial_rating(&self) -> Rating {
        Rating {
            mean: self.initial_mean,
            uncertainty: self.initial_uncertainty,
        }
    }

    fn trueskill(&self) -> TrueSkillConfig {
        TrueSkillConfig {
            draw_probability: self.draw_probability,
            beta: self.beta,
            default_dynamics: self.dynamics,
        }
    }
}

/// Updates the ratings of every driver who finished the race session.
/// Non-finishers are excluded from the ranked inference entirely and keep
/// their prior rating. Qualifying sessions never reach this function.
pub fn rate_race_session(
    results: &[RaceResult],
    ratings: &mut BTreeMap<DriverId, Rating>,
    config: &RatingModelConfig,
) {
    let mut finishers: Vec<(DriverId, u32)> = Vec::new();
    for result in results {
        if result.status == CompletionStatus::Finished {
            if let Some(position) = result.position {
                finishers.push((result.driver_id, position));
            }
        }
    }
    // One finisher carries no relative information to infer from.
    if finishers.len() < 2 {
        return;
    }

    let priors: Vec<[TrueSkillRating; 1]> = finishers
        .iter()
        .map(|(driver_id, _)| {
            let rating = ratings
                .entry(*driver_id)
                .or_insert_with(|| config.initial_rating());
            [TrueSkillRating {
                rating: rating.mean.to_f64().unwrap_or(0.0),
                uncertainty: rating.uncertainty.to_f64().unwrap_or(0.0),
            }]
        })
        .collect();

    // Ranks must mirror finishing positions exactly.
    let teams_and_ranks: Vec<(&[TrueSkillRating], MultiTeamOutcome)> = priors
        .iter()
        .zip(finishers.iter())
        .map(|(group, (_, position))| (group.as_slice(), MultiTeamOutcome::new(*position as usize)))
        .collect();

    let updated = trueskill_multi_team(&teams_and_ranks, &config.trueskill());

    for ((driver_id, _), group) in finishers.iter().zip(updated.iter()) {
        let new = Rating {
            mean: decimal_from(group[0].rating),
            uncertainty: decimal_from(group[0].uncertainty),
        };
        debug!(driver = ?driver_id, mean = %new.mean, uncertainty = %new.uncertainty, "rating updated");
        ratings.insert(*driver_id, new);
    }
}

/// Rebuilds ratings from default priors by replaying finished race sessions
/// in chronological order. Qualifying sessions are skipped; the caller is
/// responsible for supplying sessions sorted by round order.
pub fn replay_ratings<'a>(
    sessions: impl Iterator<Item = &'a Session>,
    config: &RatingModelConfig,
) -> BTreeMap<DriverId, Rating> {
    let mut ratings = BTreeMap::new();
    for session in sessions {
        if let Some(results) = session.race_results() {
            rate_race_session(results, &mut ratings, config);
        }
    }
    ratings
}

fn decimal_from(value: f64) -> Decimal {
    Decimal::from_f64(value)
        .unwrap_or(Decimal::ZERO)
        .round_dp(RATING_SCALE)
}
