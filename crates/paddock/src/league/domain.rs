use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Identifier wrapper for registered drivers.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct DriverId(pub u32);

/// Identifier wrapper for teams.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct TeamId(pub u32);

/// Identifier wrapper for championships.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ChampionshipId(pub u32);

/// Identifier wrapper for competition categories.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct CategoryId(pub u32);

/// Identifier wrapper for calendar rounds.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct RoundId(pub u32);

/// Identifier wrapper for timed sessions.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct SessionId(pub u32);

/// Identifier wrapper for penalties.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct PenaltyId(pub u32);

/// Skill estimate pair maintained per driver. Updated only from finished
/// race sessions, never by the penalty engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rating {
    pub mean: Decimal,
    pub uncertainty: Decimal,
}

impl Rating {
    /// Conservative estimate used when ordering drivers by skill.
    pub fn conservative(&self) -> Decimal {
        self.mean - Decimal::from(3) * self.uncertainty
    }
}

/// A registered driver. Created at registration, deactivated rather than
/// deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Driver {
    pub id: DriverId,
    pub display_name: String,
    /// Platform identifiers used to cross-reference ingestion rows.
    pub external_ids: Vec<String>,
    pub team_id: Option<TeamId>,
    pub rating: Rating,
    /// Rounds in which the driver has taken the start.
    pub rounds_disputed: u32,
    pub active: bool,
}

/// How a driver's session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompletionStatus {
    Finished,
    Retired,
    Absent,
}

impl CompletionStatus {
    pub fn participated(self) -> bool {
        !matches!(self, CompletionStatus::Absent)
    }
}

/// Per-driver outcome in a qualifying session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualifyingResult {
    pub driver_id: DriverId,
    pub position: Option<u32>,
    pub laptime: Option<Decimal>,
    pub gap_to_first: Option<Decimal>,
    pub status: CompletionStatus,
    pub points_earned: Decimal,
}

/// Per-driver outcome in a race session. Mutated in place by the penalty
/// engine when a time penalty re-orders the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaceResult {
    pub driver_id: DriverId,
    pub position: Option<u32>,
    pub total_racetime: Option<Decimal>,
    pub gap_to_first: Option<Decimal>,
    pub fastest_lap: bool,
    pub status: CompletionStatus,
    pub points_earned: Decimal,
}

/// Distinguishes the timed segments a round can contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionKind {
    Qualifying,
    SprintRace,
    LongRace,
}

impl SessionKind {
    pub fn is_qualifying(self) -> bool {
        matches!(self, SessionKind::Qualifying)
    }

    pub const fn label(self) -> &'static str {
        match self {
            SessionKind::Qualifying => "qualifying",
            SessionKind::SprintRace => "race 1",
            SessionKind::LongRace => "race 2",
        }
    }
}

/// Result list owned by a session, typed by the session kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionResults {
    Qualifying(Vec<QualifyingResult>),
    Race(Vec<RaceResult>),
}

/// One timed segment belonging to a round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub kind: SessionKind,
    pub results: SessionResults,
}

impl Session {
    pub fn qualifying(id: SessionId) -> Self {
        Self {
            id,
            kind: SessionKind::Qualifying,
            results: SessionResults::Qualifying(Vec::new()),
        }
    }

    pub fn race(id: SessionId, kind: SessionKind) -> Self {
        Self {
            id,
            kind,
            results: SessionResults::Race(Vec::new()),
        }
    }

    pub fn is_qualifying(&self) -> bool {
        self.kind.is_qualifying()
    }

    pub fn has_results(&self) -> bool {
        match &self.results {
            SessionResults::Qualifying(results) => !results.is_empty(),
            SessionResults::Race(results) => !results.is_empty(),
        }
    }

    pub fn race_results(&self) -> Option<&[RaceResult]> {
        match &self.results {
            SessionResults::Race(results) => Some(results),
            SessionResults::Qualifying(_) => None,
        }
    }

    pub fn race_results_mut(&mut self) -> Option<&mut Vec<RaceResult>> {
        match &mut self.results {
            SessionResults::Race(results) => Some(results),
            SessionResults::Qualifying(_) => None,
        }
    }

    pub fn qualifying_results(&self) -> Option<&[QualifyingResult]> {
        match &self.results {
            SessionResults::Qualifying(results) => Some(results),
            SessionResults::Race(_) => None,
        }
    }

    pub fn qualifying_results_mut(&mut self) -> Option<&mut Vec<QualifyingResult>> {
        match &mut self.results {
            SessionResults::Qualifying(results) => Some(results),
            SessionResults::Race(_) => None,
        }
    }
}

/// One scheduled event in a category calendar: one or two races plus an
/// optional qualifying session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Round {
    pub id: RoundId,
    pub number: u32,
    pub circuit: String,
    pub date: NaiveDate,
    pub sessions: Vec<Session>,
    pub completed: bool,
}

impl Round {
    pub fn session(&self, id: SessionId) -> Option<&Session> {
        self.sessions.iter().find(|session| session.id == id)
    }

    pub fn session_mut(&mut self, id: SessionId) -> Option<&mut Session> {
        self.sessions.iter_mut().find(|session| session.id == id)
    }

    pub fn qualifying_session(&self) -> Option<&Session> {
        self.sessions.iter().find(|session| session.is_qualifying())
    }

    pub fn sprint_race(&self) -> Option<&Session> {
        self.sessions
            .iter()
            .find(|session| session.kind == SessionKind::SprintRace)
    }

    pub fn long_race(&self) -> Option<&Session> {
        self.sessions
            .iter()
            .find(|session| session.kind == SessionKind::LongRace)
    }

    pub fn long_race_mut(&mut self) -> Option<&mut Session> {
        self.sessions
            .iter_mut()
            .find(|session| session.kind == SessionKind::LongRace)
    }

    pub fn has_sprint_race(&self) -> bool {
        self.sprint_race().is_some()
    }
}

/// A driver's cumulative ranked state within one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandingEntry {
    pub driver_id: DriverId,
    pub race_number: u32,
    pub points: Decimal,
    pub position: u32,
    pub licence_points: i32,
    pub warnings: u32,
    pub reprimands: u32,
}

impl StandingEntry {
    /// Fresh roster entry for a reserve driver scoring in the category for
    /// the first time.
    pub fn reserve(driver_id: DriverId) -> Self {
        Self {
            driver_id,
            race_number: 0,
            points: Decimal::ZERO,
            position: 0,
            licence_points: 0,
            warnings: 0,
            reprimands: 0,
        }
    }
}

/// A team's cumulative ranked state within one championship.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamStanding {
    pub team_id: TeamId,
    pub championship_id: ChampionshipId,
    pub name: String,
    pub points: Decimal,
    pub position: u32,
}

/// Where the time component of an applied penalty ended up. Recorded at
/// apply time so reversal can undo exactly what was done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeEffect {
    /// Penalty carried no time component.
    None,
    /// Time was added to the driver's result in this session.
    Applied { session_id: SessionId },
    /// Time is waiting to be applied when the round's second race is saved.
    Pending,
    /// No eligible session existed; the time portion was dropped by policy.
    Dropped,
}

/// An administrative sanction against one driver in one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Penalty {
    pub id: PenaltyId,
    /// Per-round sequence number.
    pub number: u32,
    pub driver_id: DriverId,
    pub category_id: CategoryId,
    pub round_id: RoundId,
    pub session_id: SessionId,
    pub time_penalty: Decimal,
    pub points: Decimal,
    pub licence_points: i32,
    pub warnings: u32,
    pub reprimand: bool,
    pub reason: String,
    pub time_effect: TimeEffect,
}

/// A time penalty waiting for the driver's next race result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeferredPenalty {
    pub penalty_id: PenaltyId,
    pub driver_id: DriverId,
    pub time_penalty: Decimal,
}

/// A competition class: calendar, roster, and the penalties issued in it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub championship_id: ChampionshipId,
    pub name: String,
    pub standings: Vec<StandingEntry>,
    pub rounds: Vec<Round>,
    pub penalties: Vec<Penalty>,
    pub deferred: Vec<DeferredPenalty>,
}

impl Category {
    pub fn standing(&self, driver_id: DriverId) -> Option<&StandingEntry> {
        self.standings
            .iter()
            .find(|entry| entry.driver_id == driver_id)
    }

    pub fn standing_mut(&mut self, driver_id: DriverId) -> Option<&mut StandingEntry> {
        self.standings
            .iter_mut()
            .find(|entry| entry.driver_id == driver_id)
    }

    pub fn round(&self, id: RoundId) -> Option<&Round> {
        self.rounds.iter().find(|round| round.id == id)
    }

    pub fn round_mut(&mut self, id: RoundId) -> Option<&mut Round> {
        self.rounds.iter_mut().find(|round| round.id == id)
    }

    pub fn first_open_round(&self) -> Option<&Round> {
        self.rounds.iter().find(|round| !round.completed)
    }

    pub fn round_of_session(&self, session_id: SessionId) -> Option<&Round> {
        self.rounds
            .iter()
            .find(|round| round.session(session_id).is_some())
    }

    /// Whether the given round closes the category calendar, in which case
    /// a deferred time penalty has no session left to attach to.
    pub fn is_final_round(&self, round_id: RoundId) -> bool {
        self.rounds.last().map(|round| round.id) == Some(round_id)
    }

    pub fn penalty(&self, id: PenaltyId) -> Option<&Penalty> {
        self.penalties.iter().find(|penalty| penalty.id == id)
    }

    /// Next free penalty id, derived from the records on file so a fresh
    /// process never mints an id that collides with stored penalties.
    pub fn next_penalty_id(&self) -> PenaltyId {
        PenaltyId(
            self.penalties
                .iter()
                .map(|penalty| penalty.id.0)
                .max()
                .unwrap_or(0)
                + 1,
        )
    }

    pub fn next_penalty_number(&self, round_id: RoundId) -> u32 {
        self.penalties
            .iter()
            .filter(|penalty| penalty.round_id == round_id)
            .map(|penalty| penalty.number)
            .max()
            .unwrap_or(0)
            + 1
    }
}

/// One normalized row of a session draft, built by the result normalizer
/// and validated before commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftResult {
    pub driver_id: DriverId,
    pub position: Option<u32>,
    /// Total race time, or best lap for qualifying drafts.
    pub total_time: Option<Decimal>,
    pub gap_to_first: Option<Decimal>,
    pub best_lap: Option<Decimal>,
    pub status: CompletionStatus,
}

/// Typed intermediate session state assembled during result entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDraft {
    pub session_id: SessionId,
    pub kind: SessionKind,
    pub results: Vec<DraftResult>,
    pub fastest_lap_driver: Option<DriverId>,
}

impl SessionDraft {
    /// Participants ordered by position, which the normalizer guarantees.
    pub fn participants(&self) -> impl Iterator<Item = &DraftResult> {
        self.results
            .iter()
            .filter(|result| result.status.participated())
    }
}
