//! Competition configuration: team roster and round registry
//!
//! This module defines the static configuration a quiz session runs
//! against: the ordered team roster and the ordered sequence of rounds
//! with their question counts and time limits. Configuration is loaded
//! once at startup, validated eagerly, and immutable afterwards.

use std::time::Duration;

use garde::Validate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants;

/// An opaque team identifier
///
/// Teams are identified by name only; the roster is fixed at
/// configuration time and team names are unique within it.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
    derive_more::From,
)]
#[serde(transparent)]
#[display("{_0}")]
#[from(String, &str)]
pub struct TeamName(String);

impl TeamName {
    /// Creates a team name from anything string-like
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

type ValidationResult = garde::Result;

/// Validates that a time limit falls within the configured bounds
fn validate_time_limit(val: &Duration) -> ValidationResult {
    let secs = val.as_secs();
    if (constants::rounds::MIN_TIME_LIMIT..=constants::rounds::MAX_TIME_LIMIT).contains(&secs) {
        Ok(())
    } else {
        Err(garde::Error::new(format!(
            "time_per_question is outside of the bounds [{},{}]",
            constants::rounds::MIN_TIME_LIMIT,
            constants::rounds::MAX_TIME_LIMIT,
        )))
    }
}

/// Configuration for a single round
///
/// A round groups questions under a shared name, question count, and
/// per-question time limit. Round configurations never change after load.
#[serde_with::serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RoundConfig {
    /// The round's display name, unique across the competition
    #[garde(length(min = 1, max = constants::rounds::MAX_NAME_LENGTH))]
    name: String,
    /// How many questions the round contains
    #[garde(range(min = 1, max = constants::rounds::MAX_QUESTION_COUNT))]
    question_count: u32,
    /// How long the countdown runs for each question in this round
    #[garde(custom(|v, _| validate_time_limit(v)))]
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    time_per_question: Duration,
}

impl RoundConfig {
    /// Creates a round configuration (validated later by [`Registry::new`])
    pub fn new(name: impl Into<String>, question_count: u32, time_per_question: Duration) -> Self {
        Self {
            name: name.into(),
            question_count,
            time_per_question,
        }
    }

    /// The round's name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The number of questions in the round
    pub fn question_count(&self) -> u32 {
        self.question_count
    }

    /// The countdown duration for each question in the round
    pub fn time_per_question(&self) -> Duration {
        self.time_per_question
    }
}

/// Errors raised by configuration validation
///
/// All of these are fatal at startup: a session must not be created
/// from a malformed roster or round list.
#[derive(Debug, Error)]
pub enum Error {
    /// The roster contains no teams
    #[error("roster must contain at least one team")]
    EmptyRoster,
    /// The roster contains more teams than supported
    #[error("roster contains {0} teams, more than the supported {max}", max = constants::teams::MAX_TEAM_COUNT)]
    TooManyTeams(usize),
    /// A team name is empty or too long
    #[error("invalid team name {0:?}")]
    InvalidTeamName(String),
    /// The same team name appears twice in the roster
    #[error("duplicate team name {0}")]
    DuplicateTeam(TeamName),
    /// No rounds are configured
    #[error("at least one round must be configured")]
    NoRounds,
    /// More rounds are configured than supported
    #[error("{0} rounds configured, more than the supported {max}", max = constants::rounds::MAX_ROUND_COUNT)]
    TooManyRounds(usize),
    /// The same round name appears twice
    #[error("duplicate round name {0:?}")]
    DuplicateRound(String),
    /// A round failed field validation
    #[error("round {name:?} failed validation: {report}")]
    InvalidRound {
        /// Name of the offending round
        name: String,
        /// The validation report produced by garde
        report: garde::Report,
    },
    /// The configuration source could not be read
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
    /// The configuration source could not be parsed
    #[error("malformed configuration: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Serialization helper for the [`Registry`] struct
#[derive(Deserialize)]
struct RegistrySerde {
    teams: Vec<TeamName>,
    rounds: Vec<RoundConfig>,
}

/// The static registry of teams and rounds for one competition
///
/// Order matters: rounds and teams are kept in configuration order and
/// that order is preserved everywhere totals and columns are displayed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "RegistrySerde")]
pub struct Registry {
    /// The ordered, unique team roster
    teams: Vec<TeamName>,
    /// The ordered, unique round configurations
    rounds: Vec<RoundConfig>,
}

impl TryFrom<RegistrySerde> for Registry {
    type Error = Error;

    fn try_from(serde: RegistrySerde) -> Result<Self, Self::Error> {
        Self::new(serde.teams, serde.rounds)
    }
}

impl Registry {
    /// Validates and creates a registry from a roster and round list
    ///
    /// # Errors
    ///
    /// Returns a [`Error`] if the roster is empty or contains
    /// duplicates, if no rounds are configured, if a round name repeats,
    /// or if any round fails field validation (non-positive question
    /// count, out-of-bounds time limit).
    pub fn new(teams: Vec<TeamName>, rounds: Vec<RoundConfig>) -> Result<Self, Error> {
        if teams.is_empty() {
            return Err(Error::EmptyRoster);
        }
        if teams.len() > constants::teams::MAX_TEAM_COUNT {
            return Err(Error::TooManyTeams(teams.len()));
        }
        let mut seen_teams = std::collections::HashSet::new();
        for team in &teams {
            if team.as_str().is_empty()
                || team.as_str().len() > constants::teams::MAX_NAME_LENGTH
            {
                return Err(Error::InvalidTeamName(team.as_str().to_owned()));
            }
            if !seen_teams.insert(team.clone()) {
                return Err(Error::DuplicateTeam(team.clone()));
            }
        }

        if rounds.is_empty() {
            return Err(Error::NoRounds);
        }
        if rounds.len() > constants::rounds::MAX_ROUND_COUNT {
            return Err(Error::TooManyRounds(rounds.len()));
        }
        let mut seen_rounds = std::collections::HashSet::new();
        for round in &rounds {
            round.validate().map_err(|report| Error::InvalidRound {
                name: round.name.clone(),
                report,
            })?;
            if !seen_rounds.insert(round.name.clone()) {
                return Err(Error::DuplicateRound(round.name.clone()));
            }
        }

        Ok(Self { teams, rounds })
    }

    /// Reads and validates a registry from a JSON source
    ///
    /// The storage format is an adapter detail; any reader yielding the
    /// expected JSON shape works.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] when the JSON does not parse or
    /// fails validation.
    pub fn from_reader(reader: impl std::io::Read) -> Result<Self, Error> {
        serde_json::from_reader(reader).map_err(Error::Malformed)
    }

    /// Reads and validates a registry from a JSON file
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] when the file cannot be opened and
    /// [`Error::Malformed`] when its content does not parse or validate.
    pub fn from_path(path: impl AsRef<std::path::Path>) -> Result<Self, Error> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(std::io::BufReader::new(file))
    }

    /// The configured rounds, in configuration order
    pub fn rounds(&self) -> &[RoundConfig] {
        &self.rounds
    }

    /// Looks up a round by name
    pub fn round(&self, name: &str) -> Option<&RoundConfig> {
        self.rounds.iter().find(|round| round.name == name)
    }

    /// The team roster, in configuration order
    pub fn teams(&self) -> &[TeamName] {
        &self.teams
    }

    /// Whether a team is part of the roster
    pub fn contains_team(&self, team: &TeamName) -> bool {
        self.teams.contains(team)
    }
}
