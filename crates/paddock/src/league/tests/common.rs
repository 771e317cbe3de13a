use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::league::domain::{
    Category, CategoryId, ChampionshipId, CompletionStatus, DraftResult, Driver, DriverId, Round,
    RoundId, Session, SessionDraft, SessionId, SessionKind, StandingEntry, TeamId, TeamStanding,
};
use crate::league::points::ScoringTable;
use crate::league::ratings::RatingModelConfig;
use crate::league::repository::{LeagueStore, StoreError, UnitOfWork};
use crate::league::service::LeagueService;

/// In-memory store double holding one world behind a mutex. Commits swap
/// records wholesale, which is atomic enough for single-threaded tests.
#[derive(Default)]
pub(super) struct MemoryStore {
    world: Mutex<World>,
}

#[derive(Default)]
struct World {
    categories: BTreeMap<CategoryId, Category>,
    drivers: Vec<Driver>,
    teams: Vec<TeamStanding>,
}

impl MemoryStore {
    pub(super) fn seeded(
        category: Category,
        drivers: Vec<Driver>,
        teams: Vec<TeamStanding>,
    ) -> Self {
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

    pub(super) fn category_snapshot(&self, id: CategoryId) -> Category {
        self.world
            .lock()
            .expect("world mutex poisoned")
            .categories
            .get(&id)
            .cloned()
            .expect("category seeded")
    }

    pub(super) fn drivers_snapshot(&self) -> Vec<Driver> {
        self.world.lock().expect("world mutex poisoned").drivers.clone()
    }

    pub(super) fn teams_snapshot(&self) -> Vec<TeamStanding> {
        self.world.lock().expect("world mutex poisoned").teams.clone()
    }
}

impl LeagueStore for MemoryStore {
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

/// Store double that refuses every commit, for rollback assertions.
pub(super) struct RefusingStore {
    pub(super) inner: MemoryStore,
}

impl LeagueStore for RefusingStore {
    fn category(&self, id: CategoryId) -> Result<Category, StoreError> {
        self.inner.category(id)
    }

    fn category_ids(&self) -> Result<Vec<CategoryId>, StoreError> {
        self.inner.category_ids()
    }

    fn drivers(&self) -> Result<Vec<Driver>, StoreError> {
        self.inner.drivers()
    }

    fn team_standings(&self, championship: ChampionshipId) -> Result<Vec<TeamStanding>, StoreError> {
        self.inner.team_standings(championship)
    }

    fn commit(&self, _: UnitOfWork) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("write path offline".to_string()))
    }
}

pub(super) const CATEGORY: CategoryId = CategoryId(1);
pub(super) const ROUND_ONE: RoundId = RoundId(1);
pub(super) const ROUND_TWO: RoundId = RoundId(2);
pub(super) const QUALI_ONE: SessionId = SessionId(11);
pub(super) const SPRINT_ONE: SessionId = SessionId(12);
pub(super) const LONG_ONE: SessionId = SessionId(13);
pub(super) const QUALI_TWO: SessionId = SessionId(21);
pub(super) const SPRINT_TWO: SessionId = SessionId(22);
pub(super) const LONG_TWO: SessionId = SessionId(23);

pub(super) fn driver(id: u32, team: Option<u32>) -> Driver {
    Driver {
        id: DriverId(id),
        display_name: format!("Driver {id}"),
        external_ids: vec![format!("steam-{id}")],
        team_id: team.map(TeamId),
        rating: RatingModelConfig::default().initial_rating(),
        rounds_disputed: 0,
        active: true,
    }
}

pub(super) fn standing_entry(id: u32, position: u32) -> StandingEntry {
    StandingEntry {
        driver_id: DriverId(id),
        race_number: id,
        points: Decimal::ZERO,
        position,
        licence_points: 12,
        warnings: 0,
        reprimands: 0,
    }
}

pub(super) fn two_race_round(
    id: RoundId,
    number: u32,
    quali: SessionId,
    sprint: SessionId,
    long: SessionId,
) -> Round {
    Round {
        id,
        number,
        circuit: format!("Circuit {number}"),
        date: NaiveDate::from_ymd_opt(2026, 3, number)
            .expect("valid fixture date"),
        sessions: vec![
            Session::qualifying(quali),
            Session::race(sprint, SessionKind::SprintRace),
            Session::race(long, SessionKind::LongRace),
        ],
        completed: false,
    }
}

/// Category with a ten-driver roster and two two-race rounds.
pub(super) fn league_category(driver_count: u32) -> Category {
    Category {
        id: CATEGORY,
        championship_id: ChampionshipId(1),
        name: "GT3 Pro".to_string(),
        standings: (1..=driver_count)
            .map(|id| standing_entry(id, id))
            .collect(),
        rounds: vec![
            two_race_round(ROUND_ONE, 1, QUALI_ONE, SPRINT_ONE, LONG_ONE),
            two_race_round(ROUND_TWO, 2, QUALI_TWO, SPRINT_TWO, LONG_TWO),
        ],
        penalties: Vec::new(),
        deferred: Vec::new(),
    }
}

pub(super) fn league_drivers(count: u32) -> Vec<Driver> {
    (1..=count)
        .map(|id| driver(id, Some(if id % 2 == 1 { 1 } else { 2 })))
        .collect()
}

pub(super) fn league_teams() -> Vec<TeamStanding> {
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

pub(super) fn build_service(
    driver_count: u32,
) -> (Arc<MemoryStore>, LeagueService<MemoryStore>) {
    let store = Arc::new(MemoryStore::seeded(
        league_category(driver_count),
        league_drivers(driver_count),
        league_teams(),
    ));
    let service = LeagueService::new(
        store.clone(),
        ScoringTable::default(),
        RatingModelConfig::default(),
    );
    (store, service)
}

/// Race draft whose rows arrive ordered by finishing position.
pub(super) fn race_draft(
    session_id: SessionId,
    kind: SessionKind,
    times: &[(u32, Decimal)],
) -> SessionDraft {
    let best = times.first().map(|(_, total)| *total).unwrap_or(Decimal::ZERO);
    let results = times
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
        .collect();
    SessionDraft {
        session_id,
        kind,
        results,
        fastest_lap_driver: times.first().map(|(id, _)| DriverId(*id)),
    }
}

pub(super) fn qualifying_draft(session_id: SessionId, laps: &[(u32, Decimal)]) -> SessionDraft {
    let pole = laps.first().map(|(_, lap)| *lap).unwrap_or(Decimal::ZERO);
    let results = laps
        .iter()
        .enumerate()
        .map(|(index, (id, lap))| DraftResult {
            driver_id: DriverId(*id),
            position: Some(index as u32 + 1),
            total_time: Some(*lap),
            gap_to_first: Some(*lap - pole),
            best_lap: Some(*lap),
            status: CompletionStatus::Finished,
        })
        .collect();
    SessionDraft {
        session_id,
        kind: SessionKind::Qualifying,
        results,
        fastest_lap_driver: None,
    }
}
