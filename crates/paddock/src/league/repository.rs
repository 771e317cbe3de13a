use std::sync::Mutex;
use std::time::Duration;

use super::cache::TtlCache;
use super::domain::{Category, CategoryId, ChampionshipId, Driver, TeamStanding};

/// Error enumeration for persistence failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record not found: {0}")]
    NotFound(String),
    #[error("record already exists: {0}")]
    Conflict(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Everything a top-level operation writes back in one atomic unit. Either
/// the whole unit commits or none of it does.
#[derive(Debug, Default, Clone)]
pub struct UnitOfWork {
    pub category: Option<Category>,
    pub drivers: Vec<Driver>,
    pub teams: Vec<TeamStanding>,
}

impl UnitOfWork {
    pub fn with_category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    pub fn with_drivers(mut self, drivers: Vec<Driver>) -> Self {
        self.drivers = drivers;
        self
    }

    pub fn with_teams(mut self, teams: Vec<TeamStanding>) -> Self {
        self.teams = teams;
        self
    }
}

/// Storage abstraction over the record store. Reads return plain value
/// snapshots; the engine never holds live references into storage.
pub trait LeagueStore: Send + Sync {
    fn category(&self, id: CategoryId) -> Result<Category, StoreError>;
    fn category_ids(&self) -> Result<Vec<CategoryId>, StoreError>;
    fn drivers(&self) -> Result<Vec<Driver>, StoreError>;
    fn team_standings(&self, championship: ChampionshipId) -> Result<Vec<TeamStanding>, StoreError>;
    /// Commits the unit transactionally; a failed commit leaves every
    /// affected record unchanged.
    fn commit(&self, unit: UnitOfWork) -> Result<(), StoreError>;
}

/// Store wrapper adding a bounded, time-evicted read cache for category
/// lookups. Commits invalidate the affected entries before forwarding.
pub struct CachedStore<S> {
    inner: S,
    categories: Mutex<TtlCache<CategoryId, Category>>,
}

impl<S: LeagueStore> CachedStore<S> {
    pub fn new(inner: S, capacity: usize, ttl: Duration) -> Self {
        Self {
            inner,
            categories: Mutex::new(TtlCache::new(capacity, ttl)),
        }
    }

    fn cache(&self) -> std::sync::MutexGuard<'_, TtlCache<CategoryId, Category>> {
        self.categories.lock().expect("category cache poisoned")
    }
}

impl<S: LeagueStore> LeagueStore for CachedStore<S> {
    fn category(&self, id: CategoryId) -> Result<Category, StoreError> {
        if let Some(hit) = self.cache().get(&id) {
            return Ok(hit);
        }
        let category = self.inner.category(id)?;
        self.cache().insert(id, category.clone());
        Ok(category)
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

    fn commit(&self, unit: UnitOfWork) -> Result<(), StoreError> {
        if let Some(category) = unit.category.as_ref() {
            self.cache().invalidate(&category.id);
        }
        self.inner.commit(unit)
    }
}
