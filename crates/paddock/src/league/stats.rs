use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;

use super::domain::{Penalty, QualifyingResult, RaceResult};

/// Wins, podiums, poles and participation counters for one driver.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CareerSummary {
    pub wins: u32,
    pub podiums: u32,
    pub poles: u32,
    pub fastest_laps: u32,
    pub races_completed: u32,
    pub average_position: Option<Decimal>,
}

/// 0-99 score from the standard deviation of finishing positions, scaled
/// by the participation ratio. Needs at least two raced sessions.
pub fn consistency(results: &[RaceResult]) -> u32 {
    let raced: Vec<&RaceResult> = results
        .iter()
        .filter(|result| result.status.participated())
        .collect();
    if raced.len() < 2 {
        return 0;
    }
    let positions: Vec<f64> = raced
        .iter()
        .filter_map(|result| result.position.map(f64::from))
        .collect();
    if positions.len() < 2 {
        return 0;
    }
    let participation_ratio = raced.len() as f64 / results.len() as f64;
    let score = (99.0 - sample_stddev(&positions) * 10.0) * participation_ratio;
    clamp_score(score)
}

/// 0-99 score from the average gap between the driver's qualifying laps
/// and pole position.
pub fn speed(results: &[QualifyingResult]) -> u32 {
    let mut percentages: Vec<f64> = Vec::new();
    for result in results {
        if let (Some(laptime), Some(gap)) = (result.laptime, result.gap_to_first) {
            let laptime = laptime.to_f64().unwrap_or(0.0);
            let gap = gap.to_f64().unwrap_or(0.0);
            if laptime + gap > 0.0 {
                percentages.push(gap / (gap + laptime) * 100.0);
            }
        }
    }
    if percentages.is_empty() {
        return 0;
    }
    let average = percentages.iter().sum::<f64>() / percentages.len() as f64;
    clamp_score(99.0 - average * 9.0)
}

/// 0-99 score approaching 99 as the driver's disputed rounds approach the
/// most disputed by anyone in the league.
pub fn experience(rounds_disputed: u32, max_rounds: u32) -> u32 {
    if max_rounds == 0 || rounds_disputed == 0 {
        return 0;
    }
    let missing = f64::from(max_rounds - rounds_disputed.min(max_rounds));
    clamp_score(99.0 - (missing / f64::from(max_rounds) * 99.0) * 0.6)
}

/// 0-99 score weighted by the amount and gravity of sanctions received.
pub fn sportsmanship(races_disputed: usize, penalties: &[&Penalty]) -> u32 {
    if races_disputed < 2 {
        return 0;
    }
    if penalties.is_empty() {
        return 99;
    }
    let burden: f64 = penalties
        .iter()
        .map(|penalty| {
            penalty.time_penalty.to_f64().unwrap_or(0.0)
                + f64::from(penalty.warnings)
                + penalty.licence_points.max(0) as f64
                + penalty.points.to_f64().unwrap_or(0.0)
        })
        .sum();
    clamp_score(99.0 - burden * 7.0 / races_disputed as f64)
}

/// 0-99 score from the average race gap to the winner.
pub fn race_pace(results: &[RaceResult]) -> u32 {
    let raced: Vec<&RaceResult> = results
        .iter()
        .filter(|result| result.status.participated())
        .collect();
    if raced.is_empty() {
        return 0;
    }
    let total_gap: f64 = raced
        .iter()
        .filter_map(|result| result.gap_to_first)
        .map(|gap| gap.to_f64().unwrap_or(0.0))
        .sum();
    clamp_score(99.0 - total_gap / (raced.len() as f64 * 3.0))
}

/// Aggregates wins, podiums, poles, and fastest laps across a driver's
/// result history.
pub fn career_summary(races: &[RaceResult], qualifying: &[QualifyingResult]) -> CareerSummary {
    let mut wins = 0;
    let mut podiums = 0;
    let mut fastest_laps = 0;
    let mut races_completed = 0;
    let mut positions: Vec<u32> = Vec::new();

    for result in races {
        if !result.status.participated() {
            continue;
        }
        races_completed += 1;
        if let Some(position) = result.position {
            positions.push(position);
            if position == 1 {
                wins += 1;
            }
            if position <= 3 {
                podiums += 1;
            }
        }
        if result.fastest_lap {
            fastest_laps += 1;
        }
    }

    let poles = qualifying
        .iter()
        .filter(|result| result.position == Some(1))
        .count() as u32;

    let average_position = if positions.is_empty() {
        None
    } else {
        let sum: u32 = positions.iter().sum();
        Some((Decimal::from(sum) / Decimal::from(positions.len() as u32)).round_dp(2))
    };

    CareerSummary {
        wins,
        podiums,
        poles,
        fastest_laps,
        races_completed,
        average_position,
    }
}

fn sample_stddev(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values
        .iter()
        .map(|value| (value - mean).powi(2))
        .sum::<f64>()
        / (n - 1.0);
    variance.sqrt()
}

fn clamp_score(score: f64) -> u32 {
    score.round().clamp(0.0, 99.0) as u32
}
