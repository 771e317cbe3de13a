//! End-to-end championship flows driven through the public service API.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use paddock::league::standings::{verify_conservation, verify_rank_contiguity};
use paddock::league::{
    Category, CategoryId, ChampionshipId, CompletionStatus, DraftResult, Driver, DriverId,
    LeagueService, LeagueStore, PenaltySpec, RatingModelConfig, Round, RoundId, ScoringTable,
    Session, SessionDraft, SessionId, SessionKind, StandingEntry, StoreError, TeamId,
    TeamStanding, TimeEffect, UnitOfWork,
};

const CATEGORY: CategoryId = CategoryId(1);
const ROUND: RoundId = RoundId(1);
const QUALI: SessionId = SessionId(11);
const SPRINT: SessionId = SessionId(12);
const LONG: SessionId = SessionId(13);

#[derive(Default)]
struct WorldStore {
    world: Mutex<World>,
}

#[derive(Default)]
struct World {
    categories: BTreeMap<CategoryId, Category>,
    drivers: Vec<Driver>,
    teams: Vec<TeamStanding>,
}

impl WorldStore {
    fn seeded(category: Category, drivers: Vec<Driver>, teams: Vec<TeamStanding>) -> Self {
        let mut categories = BTreeMap::new();
        categories.insert(category.id, category);
        Self {
            world: Mutex::new(World {
                categories,
                drivers,
                teams,
            }),
        }
    }

    fn category_snapshot(&self) -> Category {
        self.world
            .lock()
            .expect("world mutex poisoned")
            .categories
            .get(&CATEGORY)
            .cloned()
            .expect("category seeded")
    }
}

impl LeagueStore for WorldStore {
    fn category(&self, id: CategoryId) -> Result<Category, StoreError> {
        self.world
            .lock()
            .expect("world mutex poisoned")
            .categories
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("category {:?}", id)))
    }

    fn category_ids(&self) -> Result<Vec<CategoryId>, StoreError> {
        Ok(self
            .world
            .lock()
            .expect("world mutex poisoned")
            .categories
            .keys()
            .copied()
            .collect())
    }

    fn drivers(&self) -> Result<Vec<Driver>, StoreError> {
        Ok(self.world.lock().expect("world mutex poisoned").drivers.clone())
    }

    fn team_standings(&self, _: ChampionshipId) -> Result<Vec<TeamStanding>, StoreError> {
        Ok(self.world.lock().expect("world mutex poisoned").teams.clone())
    }

    fn commit(&self, unit: UnitOfWork) -> Result<(), StoreError> {
        let mut world = self.world.lock().expect("world mutex poisoned");
        if let Some(category) = unit.category {
            world.categories.insert(category.id, category);
        }
        if !unit.drivers.is_empty() {
            world.drivers = unit.drivers;
        }
        if !unit.teams.is_empty() {
            world.teams = unit.teams;
        }
        Ok(())
    }
}

fn seed_category(driver_count: u32) -> Category {
    Category {
        id: CATEGORY,
        championship_id: ChampionshipId(1),
        name: "GT3 Pro".to_string(),
        standings: (1..=driver_count)
            .map(|id| StandingEntry {
                driver_id: DriverId(id),
                race_number: id,
                points: Decimal::ZERO,
                position: id,
                licence_points: 12,
                warnings: 0,
                reprimands: 0,
            })
            .collect(),
        rounds: vec![Round {
            id: ROUND,
            number: 1,
            circuit: "Monza".to_string(),
            date: NaiveDate::from_ymd_opt(2026, 3, 1).expect("valid date"),
            sessions: vec![
                Session::qualifying(QUALI),
                Session::race(SPRINT, SessionKind::SprintRace),
                Session::race(LONG, SessionKind::LongRace),
            ],
            completed: false,
        }],
        penalties: Vec::new(),
        deferred: Vec::new(),
    }
}

fn seed_drivers(count: u32) -> Vec<Driver> {
    (1..=count)
        .map(|id| Driver {
            id: DriverId(id),
            display_name: format!("Driver {id}"),
            external_ids: vec![format!("steam-{id}")],
            team_id: Some(TeamId(if id % 2 == 1 { 1 } else { 2 })),
            rating: RatingModelConfig::default().initial_rating(),
            rounds_disputed: 0,
            active: true,
        })
        .collect()
}

fn seed_teams() -> Vec<TeamStanding> {
    vec![
        TeamStanding {
            team_id: TeamId(1),
            championship_id: ChampionshipId(1),
            name: "Scuderia Nord".to_string(),
            points: Decimal::ZERO,
            position: 1,
        },
        TeamStanding {
            team_id: TeamId(2),
            championship_id: ChampionshipId(1),
            name: "Vortex Racing".to_string(),
            points: Decimal::ZERO,
            position: 2,
        },
    ]
}

fn harness(driver_count: u32) -> (Arc<WorldStore>, LeagueService<WorldStore>) {
    let store = Arc::new(WorldStore::seeded(
        seed_category(driver_count),
        seed_drivers(driver_count),
        seed_teams(),
    ));
    let service = LeagueService::new(
        store.clone(),
        ScoringTable::default(),
        RatingModelConfig::default(),
    );
    (store, service)
}

fn race_draft(session_id: SessionId, kind: SessionKind, times: &[(u32, Decimal)]) -> SessionDraft {
    let best = times.first().map(|(_, total)| *total).unwrap_or(Decimal::ZERO);
    SessionDraft {
        session_id,
        kind,
        results: times
            .iter()
            .enumerate()
            .map(|(index, (id, total))| DraftResult {
                driver_id: DriverId(*id),
                position: Some(index as u32 + 1),
                total_time: Some(*total),
                gap_to_first: Some(*total - best),
                best_lap: None,
                status: CompletionStatus::Finished,
            })
            .collect(),
        fastest_lap_driver: None,
    }
}

/// Ten finishers at 90.000s with one-second increments.
fn staircase(count: u32) -> Vec<(u32, Decimal)> {
    (1..=count)
        .map(|id| (id, dec!(90.000) + Decimal::from(id - 1)))
        .collect()
}

#[test]
fn a_time_penalty_reorders_the_classification_and_the_table() {
    let (store, service) = harness(10);
    service
        .save_round_results(
            CATEGORY,
            ROUND,
            vec![race_draft(SPRINT, SessionKind::SprintRace, &staircase(10))],
        )
        .expect("sprint saves");

    // Driver 3 sat at 92.000; 2.5 extra seconds slot them between 94.000
    // and 95.000, two classified places down.
    service
        .apply_penalty(
            CATEGORY,
            PenaltySpec {
                driver_id: DriverId(3),
                session_id: SPRINT,
                time_penalty: dec!(2.5),
                points: Decimal::ZERO,
                licence_points: 0,
                warnings: 0,
                reprimand: false,
                reason: "corner cutting".to_string(),
            },
        )
        .expect("penalty applies");

    let category = store.category_snapshot();
    let results = category
        .round(ROUND)
        .and_then(|round| round.session(SPRINT))
        .and_then(|session| session.race_results())
        .expect("sprint results");

    let penalized = results
        .iter()
        .find(|result| result.driver_id == DriverId(3))
        .expect("penalized row");
    assert_eq!(penalized.total_racetime, Some(dec!(94.500)));
    assert_eq!(penalized.position, Some(5));
    assert_eq!(penalized.gap_to_first, Some(dec!(4.500)));

    // Positions follow total race time across the whole field.
    for pair in results.windows(2) {
        assert!(pair[0].total_racetime <= pair[1].total_racetime);
        assert!(pair[0].position < pair[1].position);
    }

    // 15 - 10 on the mover, +3 and +2 on the promoted pair.
    assert_eq!(category.standing(DriverId(3)).expect("entry").points, dec!(10));
    assert_eq!(category.standing(DriverId(4)).expect("entry").points, dec!(15));
    assert_eq!(category.standing(DriverId(5)).expect("entry").points, dec!(12));
    verify_conservation(&category).expect("points conserved");
    verify_rank_contiguity(&category).expect("ranks contiguous");
}

#[test]
fn a_deferred_penalty_moves_with_the_second_race() {
    let (store, service) = harness(3);
    service
        .save_round_results(
            CATEGORY,
            ROUND,
            vec![
                SessionDraft {
                    session_id: QUALI,
                    kind: SessionKind::Qualifying,
                    results: vec![
                        DraftResult {
                            driver_id: DriverId(1),
                            position: Some(1),
                            total_time: Some(dec!(58.5)),
                            gap_to_first: Some(Decimal::ZERO),
                            best_lap: Some(dec!(58.5)),
                            status: CompletionStatus::Finished,
                        },
                        DraftResult {
                            driver_id: DriverId(2),
                            position: Some(2),
                            total_time: Some(dec!(59)),
                            gap_to_first: Some(dec!(0.5)),
                            best_lap: Some(dec!(59)),
                            status: CompletionStatus::Finished,
                        },
                        DraftResult {
                            driver_id: DriverId(3),
                            position: Some(3),
                            total_time: Some(dec!(59.5)),
                            gap_to_first: Some(dec!(1)),
                            best_lap: Some(dec!(59.5)),
                            status: CompletionStatus::Finished,
                        },
                    ],
                    fastest_lap_driver: None,
                },
                race_draft(
                    SPRINT,
                    SessionKind::SprintRace,
                    &[(1, dec!(90)), (2, dec!(91)), (3, dec!(92))],
                ),
            ],
        )
        .expect("partial round saves");

    let receipt = service
        .apply_penalty(
            CATEGORY,
            PenaltySpec {
                driver_id: DriverId(1),
                session_id: QUALI,
                time_penalty: dec!(10),
                points: Decimal::ZERO,
                licence_points: 0,
                warnings: 0,
                reprimand: false,
                reason: "impeding in qualifying".to_string(),
            },
        )
        .expect("penalty applies");
    assert_eq!(receipt.time_effect, TimeEffect::Pending);
    assert_eq!(store.category_snapshot().deferred.len(), 1);

    let report = service
        .save_round_results(
            CATEGORY,
            ROUND,
            vec![race_draft(
                LONG,
                SessionKind::LongRace,
                &[(1, dec!(180)), (2, dec!(181)), (3, dec!(182))],
            )],
        )
        .expect("long race saves");
    assert_eq!(report.deferred_penalties_applied, 1);

    let category = store.category_snapshot();
    assert!(category.deferred.is_empty());
    let results = category
        .round(ROUND)
        .and_then(|round| round.session(LONG))
        .and_then(|session| session.race_results())
        .expect("long race results");
    let penalized = results
        .iter()
        .find(|result| result.driver_id == DriverId(1))
        .expect("penalized row");
    assert_eq!(penalized.total_racetime, Some(dec!(190)));
    assert_eq!(penalized.position, Some(3));
    verify_conservation(&category).expect("points conserved");
}

#[test]
fn reversal_restores_the_pre_penalty_world() {
    let (store, service) = harness(10);
    service
        .save_round_results(
            CATEGORY,
            ROUND,
            vec![
                race_draft(SPRINT, SessionKind::SprintRace, &staircase(10)),
                race_draft(LONG, SessionKind::LongRace, &staircase(10)),
            ],
        )
        .expect("round saves");
    let pristine = store.category_snapshot();

    let receipt = service
        .apply_penalty(
            CATEGORY,
            PenaltySpec {
                driver_id: DriverId(2),
                session_id: LONG,
                time_penalty: dec!(7.25),
                points: dec!(3),
                licence_points: 4,
                warnings: 2,
                reprimand: true,
                reason: "dangerous rejoin".to_string(),
            },
        )
        .expect("penalty applies");
    assert_ne!(store.category_snapshot(), pristine);

    service
        .reverse_penalty(CATEGORY, receipt.penalty_id)
        .expect("penalty reverses");

    let restored = store.category_snapshot();
    assert_eq!(restored, pristine);
    verify_conservation(&restored).expect("points conserved");
    verify_rank_contiguity(&restored).expect("ranks contiguous");
}

#[test]
fn a_qualifying_round_keeps_the_quali_session_unscored_by_races() {
    let (store, service) = harness(3);
    service
        .save_round_results(
            CATEGORY,
            ROUND,
            vec![
                SessionDraft {
                    session_id: QUALI,
                    kind: SessionKind::Qualifying,
                    results: vec![DraftResult {
                        driver_id: DriverId(1),
                        position: Some(1),
                        total_time: Some(dec!(58.5)),
                        gap_to_first: Some(Decimal::ZERO),
                        best_lap: Some(dec!(58.5)),
                        status: CompletionStatus::Finished,
                    }],
                    fastest_lap_driver: None,
                },
                race_draft(
                    SPRINT,
                    SessionKind::SprintRace,
                    &[(2, dec!(90)), (3, dec!(91))],
                ),
                race_draft(
                    LONG,
                    SessionKind::LongRace,
                    &[(2, dec!(180)), (3, dec!(181))],
                ),
            ],
        )
        .expect("round saves");

    // Driver 1 only qualified: 3 bonus points and an untouched rating.
    let category = store.category_snapshot();
    assert_eq!(category.standing(DriverId(1)).expect("entry").points, dec!(3));
    let drivers = store.drivers().expect("drivers load");
    let quali_only = drivers.iter().find(|d| d.id == DriverId(1)).expect("driver");
    assert_eq!(
        quali_only.rating,
        RatingModelConfig::default().initial_rating()
    );
    assert_eq!(quali_only.rounds_disputed, 0);
    verify_conservation(&category).expect("points conserved");
}
