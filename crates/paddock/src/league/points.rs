use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Table-driven scoring configuration. Positions beyond the table score
/// zero; non-participants always score zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoringTable {
    /// Race points by finishing position, best first.
    pub race_points: Vec<Decimal>,
    /// Bonus awarded to the race result flagged with the fastest lap.
    pub fastest_lap_bonus: Decimal,
    /// Qualifying bonus points by position, best first. These combine with
    /// the driver's race points for the same round.
    pub qualifying_points: Vec<Decimal>,
    /// Flat bonus for taking part in qualifying at all.
    pub qualifying_participation_bonus: Decimal,
}

impl Default for ScoringTable {
    fn default() -> Self {
        Self {
            race_points: vec![
                dec!(25),
                dec!(18),
                dec!(15),
                dec!(12),
                dec!(10),
                dec!(8),
                dec!(6),
                dec!(4),
                dec!(2),
                dec!(1),
            ],
            fastest_lap_bonus: dec!(1),
            qualifying_points: vec![dec!(3), dec!(2), dec!(1)],
            qualifying_participation_bonus: Decimal::ZERO,
        }
    }
}

impl ScoringTable {
    /// Points for a race result. Pure so penalty recomputation can re-run
    /// it and obtain identical values.
    pub fn race_points(
        &self,
        position: Option<u32>,
        participated: bool,
        fastest_lap: bool,
    ) -> Decimal {
        if !participated {
            return Decimal::ZERO;
        }
        let base = position
            .and_then(|p| self.race_points.get(p.saturating_sub(1) as usize))
            .copied()
            .unwrap_or(Decimal::ZERO);
        if fastest_lap {
            base + self.fastest_lap_bonus
        } else {
            base
        }
    }

    /// Bonus points for a qualifying result.
    pub fn qualifying_points(&self, position: Option<u32>, participated: bool) -> Decimal {
        if !participated {
            return Decimal::ZERO;
        }
        let base = position
            .and_then(|p| self.qualifying_points.get(p.saturating_sub(1) as usize))
            .copied()
            .unwrap_or(Decimal::ZERO);
        base + self.qualifying_participation_bonus
    }
}
