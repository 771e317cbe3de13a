//! Race result processing for a sim-racing league.
//!
//! The module takes raw session records from the ingestion source through
//! normalization, scoring, rating updates, and standings aggregation, and
//! maintains the penalty book whose entries can rewrite historical results
//! and be reversed exactly.

pub(crate) mod cache;
pub mod domain;
pub mod normalizer;
pub mod penalties;
pub mod points;
pub mod ratings;
pub mod repository;
pub mod router;
pub mod service;
pub mod standings;
pub mod stats;
pub mod views;

#[cfg(test)]
mod tests;

pub use domain::{
    Category, CategoryId, ChampionshipId, CompletionStatus, DeferredPenalty, DraftResult, Driver,
    DriverId, Penalty, PenaltyId, QualifyingResult, RaceResult, Rating, Round, RoundId, Session,
    SessionDraft, SessionId, SessionKind, SessionResults, StandingEntry, TeamId, TeamStanding,
    TimeEffect,
};
pub use normalizer::{RawLap, RawPlayerResult, RawSessionData};
pub use penalties::PenaltySpec;
pub use points::ScoringTable;
pub use ratings::RatingModelConfig;
pub use repository::{CachedStore, LeagueStore, StoreError, UnitOfWork};
pub use router::league_router;
pub use service::{LeagueService, LeagueServiceError, PenaltyReceipt, RoundIngestReport};
pub use stats::CareerSummary;
pub use views::{CalendarView, DriverStatsView, StandingsView};

/// Domain-rule violations raised while processing results and penalties.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// An ingestion row carried a platform identifier no driver claims.
    #[error("unmapped platform identifier: {external_id}")]
    Mapping { external_id: String },
    /// A penalty targets a session the driver has no recorded result in.
    #[error("driver {driver_id:?} has no result in session {session_id:?}")]
    MissingPriorResult {
        driver_id: DriverId,
        session_id: SessionId,
    },
    /// Results were submitted for a round or session that already has them.
    #[error("duplicate submission: {detail}")]
    DuplicateSubmission { detail: String },
    /// A session draft failed structural validation.
    #[error("invalid session draft: {detail}")]
    InvalidDraft { detail: String },
    /// A bookkeeping invariant does not hold; the operation was abandoned.
    #[error("inconsistent standings state: {detail}")]
    InconsistentState { detail: String },
}
