use std::sync::Arc;

use clap::Args;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use paddock::error::AppError;
use paddock::league::{
    CompletionStatus, DraftResult, DriverId, LeagueService, PenaltySpec, RatingModelConfig,
    ScoringTable, SessionDraft, SessionKind,
};

use crate::infra::{
    InMemoryLeagueStore, DEMO_CATEGORY, DEMO_LONG_ONE, DEMO_QUALI_ONE, DEMO_ROUND_ONE,
    DEMO_SPRINT_ONE,
};

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Time penalty handed to the sprint's third-place driver, in seconds
    #[arg(long, default_value = "5")]
    pub(crate) penalty_seconds: Decimal,
    /// Skip the stewarding portion of the demo
    #[arg(long)]
    pub(crate) skip_penalty: bool,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let store = Arc::new(InMemoryLeagueStore::seeded());
    let service = LeagueService::new(
        store,
        ScoringTable::default(),
        RatingModelConfig::default(),
    );

    let report = service.save_round_results(DEMO_CATEGORY, DEMO_ROUND_ONE, round_one_drafts())?;
    println!(
        "round 1 saved: {} sessions, {} deferred penalties folded in",
        report.sessions_saved, report.deferred_penalties_applied
    );

    if !args.skip_penalty {
        let receipt = service.apply_penalty(
            DEMO_CATEGORY,
            PenaltySpec {
                driver_id: DriverId(3),
                session_id: DEMO_SPRINT_ONE,
                time_penalty: args.penalty_seconds,
                points: Decimal::ZERO,
                licence_points: 2,
                warnings: 1,
                reprimand: false,
                reason: "gaining an advantage off track".to_string(),
            },
        )?;
        println!(
            "penalty {} applied to car 3 ({:?})",
            receipt.number, receipt.time_effect
        );
    }

    let standings = service.standings(DEMO_CATEGORY)?;
    println!("\n=== {} drivers ===", standings.category_name);
    for row in &standings.drivers {
        println!(
            "{:>2}. {:<22} {:>6} pts  (licence {:>2}, warnings {})",
            row.position, row.driver_name, row.points, row.licence_points, row.warnings
        );
    }
    println!("\n=== teams ===");
    for team in &standings.teams {
        println!("{:>2}. {:<22} {:>6} pts", team.position, team.name, team.points);
    }

    let stats = service.driver_stats(DEMO_CATEGORY, DriverId(1))?;
    println!(
        "\n{}: rating {} ± {}, wins {}, poles {}, consistency {}",
        stats.driver_name,
        stats.rating_mean,
        stats.rating_uncertainty,
        stats.summary.wins,
        stats.summary.poles,
        stats.consistency
    );

    Ok(())
}

fn qualifying_results() -> Vec<DraftResult> {
    let pole = dec!(58.5);
    (1..=10u32)
        .map(|id| {
            let lap = pole + dec!(0.3) * Decimal::from(id - 1);
            DraftResult {
                driver_id: DriverId(id),
                position: Some(id),
                total_time: Some(lap),
                gap_to_first: Some(lap - pole),
                best_lap: Some(lap),
                status: CompletionStatus::Finished,
            }
        })
        .collect()
}

fn race_results(base: Decimal, spread: Decimal) -> Vec<DraftResult> {
    (1..=10u32)
        .map(|id| {
            let total = base + spread * Decimal::from(id - 1);
            DraftResult {
                driver_id: DriverId(id),
                position: Some(id),
                total_time: Some(total),
                gap_to_first: Some(total - base),
                best_lap: Some(base / dec!(20) + Decimal::from(id)),
                status: CompletionStatus::Finished,
            }
        })
        .collect()
}

fn round_one_drafts() -> Vec<SessionDraft> {
    vec![
        SessionDraft {
            session_id: DEMO_QUALI_ONE,
            kind: SessionKind::Qualifying,
            results: qualifying_results(),
            fastest_lap_driver: None,
        },
        SessionDraft {
            session_id: DEMO_SPRINT_ONE,
            kind: SessionKind::SprintRace,
            results: race_results(dec!(1405.2), dec!(1.3)),
            fastest_lap_driver: Some(DriverId(2)),
        },
        SessionDraft {
            session_id: DEMO_LONG_ONE,
            kind: SessionKind::LongRace,
            results: race_results(dec!(2810.6), dec!(2.1)),
            fastest_lap_driver: Some(DriverId(1)),
        },
    ]
}
