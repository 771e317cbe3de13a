use std::collections::BTreeMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use metrics_exporter_prometheus::PrometheusHandle;
use rust_decimal::Decimal;

use paddock::league::{
    Category, CategoryId, ChampionshipId, Driver, DriverId, LeagueStore, RatingModelConfig, Round,
    RoundId, Session, SessionId, SessionKind, StandingEntry, StoreError, TeamId, TeamStanding,
    UnitOfWork,
};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Default)]
struct LeagueWorld {
    categories: BTreeMap<CategoryId, Category>,
    drivers: Vec<Driver>,
    teams: Vec<TeamStanding>,
}

/// League record store backed by process memory. Commits swap whole
/// records under one lock, so a unit of work lands atomically.
#[derive(Default)]
pub(crate) struct InMemoryLeagueStore {
    world: Mutex<LeagueWorld>,
}

impl InMemoryLeagueStore {
    pub(crate) fn seeded() -> Self {
        Self {
            world: Mutex::new(seed_world()),
        }
    }
}

impl LeagueStore for InMemoryLeagueStore {
    fn category(&self, id: CategoryId) -> Result<Category, StoreError> {
        self.world
            .lock()
            .expect("league store mutex poisoned")
            .categories
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("category {:?}", id)))
    }

    fn category_ids(&self) -> Result<Vec<CategoryId>, StoreError> {
        Ok(self
            .world
            .lock()
            .expect("league store mutex poisoned")
            .categories
            .keys()
            .copied()
            .collect())
    }

    fn drivers(&self) -> Result<Vec<Driver>, StoreError> {
        Ok(self
            .world
            .lock()
            .expect("league store mutex poisoned")
            .drivers
            .clone())
    }

    fn team_standings(&self, championship: ChampionshipId) -> Result<Vec<TeamStanding>, StoreError> {
        Ok(self
            .world
            .lock()
            .expect("league store mutex poisoned")
            .teams
            .iter()
            .filter(|team| team.championship_id == championship)
            .cloned()
            .collect())
    }

    fn commit(&self, unit: UnitOfWork) -> Result<(), StoreError> {
        let mut world = self.world.lock().expect("league store mutex poisoned");
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

pub(crate) const DEMO_CATEGORY: CategoryId = CategoryId(1);
pub(crate) const DEMO_ROUND_ONE: RoundId = RoundId(1);
pub(crate) const DEMO_QUALI_ONE: SessionId = SessionId(11);
pub(crate) const DEMO_SPRINT_ONE: SessionId = SessionId(12);
pub(crate) const DEMO_LONG_ONE: SessionId = SessionId(13);

const TEAM_NAMES: [&str; 5] = [
    "Scuderia Nord",
    "Vortex Racing",
    "Apex Dynamics",
    "Meridian GP",
    "Borealis Motorsport",
];

const DRIVER_NAMES: [&str; 10] = [
    "Ayla Virtanen",
    "Marco Deluca",
    "Jonas Brekke",
    "Priya Nair",
    "Tom Okafor",
    "Luca Ferraro",
    "Mateus Silva",
    "Eryk Kowalski",
    "Sofia Lindqvist",
    "Dan Whitmore",
];

/// A single-category league: ten drivers across five teams and a
/// three-round calendar of qualifying plus two races.
fn seed_world() -> LeagueWorld {
    let championship = ChampionshipId(1);
    let rating = RatingModelConfig::default().initial_rating();

    let drivers = DRIVER_NAMES
        .iter()
        .enumerate()
        .map(|(index, name)| {
            let id = index as u32 + 1;
            Driver {
                id: DriverId(id),
                display_name: (*name).to_string(),
                external_ids: vec![format!("steam-{id}")],
                team_id: Some(TeamId(index as u32 / 2 + 1)),
                rating,
                rounds_disputed: 0,
                active: true,
            }
        })
        .collect();

    let teams = TEAM_NAMES
        .iter()
        .enumerate()
        .map(|(index, name)| TeamStanding {
            team_id: TeamId(index as u32 + 1),
            championship_id: championship,
            name: (*name).to_string(),
            points: Decimal::ZERO,
            position: index as u32 + 1,
        })
        .collect();

    let rounds = [("Monza", 3, 7), ("Spa", 3, 21), ("Suzuka", 4, 4)]
        .iter()
        .enumerate()
        .map(|(index, (circuit, month, day))| {
            let number = index as u32 + 1;
            let base = number * 10;
            Round {
                id: RoundId(number),
                number,
                circuit: (*circuit).to_string(),
                date: NaiveDate::from_ymd_opt(2026, *month, *day)
                    .expect("valid seed date"),
                sessions: vec![
                    Session::qualifying(SessionId(base + 1)),
                    Session::race(SessionId(base + 2), SessionKind::SprintRace),
                    Session::race(SessionId(base + 3), SessionKind::LongRace),
                ],
                completed: false,
            }
        })
        .collect();

    let category = Category {
        id: DEMO_CATEGORY,
        championship_id: championship,
        name: "GT3 Pro".to_string(),
        standings: (1..=DRIVER_NAMES.len() as u32)
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
        rounds,
        penalties: Vec::new(),
        deferred: Vec::new(),
    };

    let mut categories = BTreeMap::new();
    categories.insert(category.id, category);
    LeagueWorld {
        categories,
        drivers,
        teams,
    }
}
