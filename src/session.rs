//! Session state machine and host intent handling
//!
//! This module contains the orchestrator for a live quiz session: which
//! round and question are current, the countdown lifecycle, the pending
//! team/points selection, and the opened-question bookkeeping. The
//! presentation layer forwards host intents into the session and renders
//! the events it emits; the session itself performs no I/O beyond what
//! the progress snapshot carries.

use std::{
    collections::{BTreeSet, HashMap},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    bank::{Question, QuestionBank},
    config::{Registry, TeamName},
    constants,
    ledger::{self, Ledger},
    progress::Snapshot,
    timer::{Countdown, Tick, TickAlarm},
};

/// How often the presentation layer is asked to schedule the next tick
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// The phase a session is currently in
///
/// Phases advance as the host navigates: pick a round, open a question,
/// run the countdown, reveal the answer. Navigation back to the
/// question or round list returns to the earlier phases; the opened
/// sets and the ledger are never affected by navigation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// No round chosen yet
    #[default]
    Idle,
    /// A round is chosen, no question is open
    RoundSelected,
    /// A question is current, countdown not started
    QuestionOpen,
    /// The countdown is ticking
    TimerRunning,
    /// The countdown ran out, awaiting reveal or navigation
    TimeUp,
    /// The answer is shown, awaiting score assignment or navigation
    AnswerRevealed,
}

/// Host intents forwarded by the presentation layer
///
/// Each intent maps to one typed operation on [`Session`]; the
/// [`Session::apply`] dispatcher converts recoverable failures into
/// [`Event::Error`] so the presentation layer can show them.
#[derive(Debug, Clone, Deserialize)]
pub enum HostIntent {
    /// Choose a round by name
    SelectRound(String),
    /// Open a question of the current round by number
    OpenQuestion(u32),
    /// Start (or restart) the countdown for the current question
    StartTimer,
    /// Show the answer, ending any running countdown silently
    RevealAnswer,
    /// Mark a team as the pending award recipient
    SelectTeam(TeamName),
    /// Mark a point value as the pending award amount
    SelectPoints(u32),
    /// Grant the pending selection to the ledger
    ConfirmAward,
    /// Leave the question, back to the round's question list
    BackToQuestionList,
    /// Leave the round, back to the round list
    BackToRoundList,
}

/// Events emitted to the presentation collaborator
///
/// The presentation layer is solely responsible for rendering these,
/// playing media, and sounding alerts; the core only reports what
/// happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Event {
    /// A round became current
    RoundSelected {
        /// The round's name
        round: String,
    },
    /// A question became current and was marked opened
    QuestionOpened {
        /// The owning round
        round: String,
        /// The question's number within the round
        number: u32,
        /// The question text to display
        text: String,
        /// Media reference for the presentation layer to open, if any
        media: Option<String>,
        /// The round's full countdown duration in seconds
        time_limit: u64,
    },
    /// The countdown was armed to full duration
    TimerStarted {
        /// Seconds on the clock
        remaining: u64,
    },
    /// One second elapsed on the countdown
    TimerTick {
        /// Seconds left
        remaining: u64,
    },
    /// The countdown ran out; the presentation layer sounds the alert
    TimerExpired,
    /// The answer is now shown
    AnswerRevealed {
        /// The answer text
        answer: String,
    },
    /// A team was marked as the pending award recipient
    TeamSelected {
        /// The selected team
        team: TeamName,
    },
    /// A point value was marked as the pending award amount
    PointsSelected {
        /// The selected point value
        points: u32,
    },
    /// The pending selection was granted and recorded in the ledger
    AwardConfirmed {
        /// The awarded team
        team: TeamName,
        /// The round the award counts towards
        round: String,
        /// The granted point value
        points: u32,
    },
    /// The host navigated back to the round's question list
    QuestionClosed {
        /// The round still current
        round: String,
    },
    /// The host navigated back to the round list
    RoundClosed,
    /// A recoverable input error the host must be told about
    Error {
        /// Human-readable reason
        reason: String,
    },
}

impl Event {
    /// Converts the event to a JSON string for the presentation layer
    ///
    /// # Panics
    ///
    /// This method panics if serialization fails, which should never
    /// happen with the default JSON serializer for well-formed data.
    pub fn to_message(&self) -> String {
        serde_json::to_string(self).expect("default serializer cannot fail")
    }
}

/// Errors raised by session operations
///
/// All of these are recoverable: the session state is unchanged and the
/// host picks a different action.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// The named round is not configured
    #[error("unknown round {0:?}")]
    UnknownRound(String),
    /// No round is current
    #[error("no round selected")]
    NoRoundSelected,
    /// The number does not resolve to a question in the current round
    #[error("invalid question number {number} for round {round:?}")]
    InvalidQuestion {
        /// The current round
        round: String,
        /// The number the host asked for
        number: u32,
    },
    /// No question is current
    #[error("no question is open")]
    NoQuestionOpen,
    /// The countdown for this question already finished
    #[error("the countdown for this question has already finished")]
    CountdownFinished,
    /// The team is not part of the roster
    #[error("unknown team {0}")]
    UnknownTeam(TeamName),
    /// The point value is not grantable
    #[error(
        "cannot grant {0} points, only {direct} (direct) or {bonus} (bonus)",
        direct = constants::scoring::DIRECT_POINTS,
        bonus = constants::scoring::BONUS_POINTS
    )]
    UngrantablePoints(u32),
    /// Confirmation was requested without a complete pending selection
    #[error("select a team and a point value first")]
    MissingSelection,
    /// The ledger rejected the award
    #[error(transparent)]
    Ledger(#[from] ledger::Error),
}

/// One row of the score table view
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoreRow {
    /// The team the row belongs to
    pub team: TeamName,
    /// The team's total across all rounds
    pub total: u64,
    /// Per-round award display strings, in round configuration order
    pub rounds: Vec<String>,
}

/// The orchestrator of one live quiz session
///
/// Owns the immutable configuration and question bank, the mutable
/// opened-question sets and score ledger, and the per-question
/// countdown. All mutation happens on the single event-processing
/// timeline the presentation layer drives.
#[derive(Debug, Clone)]
pub struct Session {
    /// Static team roster and round configuration
    registry: Registry,
    /// Load-once question lookup
    bank: QuestionBank,
    /// Append-only award record
    ledger: Ledger,
    /// Opened question numbers per round; grows monotonically
    opened: HashMap<String, BTreeSet<u32>>,
    /// Current phase of the state machine
    phase: Phase,
    /// Name of the current round, if any
    current_round: Option<String>,
    /// The current question, if any
    current_question: Option<Question>,
    /// Pending award recipient
    pending_team: Option<TeamName>,
    /// Pending award amount
    pending_points: Option<u32>,
    /// The per-question countdown
    countdown: Countdown,
}

// Convenience methods
impl Session {
    /// Sets the current phase
    fn set_phase(&mut self, phase: Phase) {
        tracing::debug!(from = ?self.phase, to = ?phase, "phase change");
        self.phase = phase;
    }

    /// Clears the pending team/points selection
    fn clear_pending(&mut self) {
        self.pending_team = None;
        self.pending_points = None;
    }

    /// The current round's name, or the matching error
    fn require_round(&self) -> Result<&str, Error> {
        self.current_round.as_deref().ok_or(Error::NoRoundSelected)
    }

    /// The current question, or the matching error
    fn require_question(&self) -> Result<&Question, Error> {
        self.current_question.as_ref().ok_or(Error::NoQuestionOpen)
    }
}

impl Session {
    /// Creates a fresh session with an empty ledger and no opened
    /// questions
    pub fn new(registry: Registry, bank: QuestionBank) -> Self {
        let ledger = Ledger::new(&registry);
        Self {
            registry,
            bank,
            ledger,
            opened: HashMap::new(),
            phase: Phase::default(),
            current_round: None,
            current_question: None,
            pending_team: None,
            pending_points: None,
            countdown: Countdown::default(),
        }
    }

    /// Resumes a session from a persisted snapshot
    ///
    /// Snapshots written under an older configuration load fine: any
    /// (team, round) pair present in the registry but absent from the
    /// snapshot is backfilled empty. Entries unknown to the current
    /// configuration are preserved untouched.
    pub fn resume(registry: Registry, bank: QuestionBank, snapshot: Snapshot) -> Self {
        let Snapshot {
            opened_questions,
            scores: mut ledger,
        } = snapshot;
        ledger.align_with(&registry);

        Self {
            registry,
            bank,
            ledger,
            opened: opened_questions,
            phase: Phase::default(),
            current_round: None,
            current_question: None,
            pending_team: None,
            pending_points: None,
            countdown: Countdown::default(),
        }
    }

    /// Extracts the persistable state for the progress store
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            opened_questions: self.opened.clone(),
            scores: self.ledger.clone(),
        }
    }

    /// Makes a round current and returns to its question list
    ///
    /// Any current question and pending selection are discarded and an
    /// outstanding countdown timeline is superseded. Opened sets and
    /// the ledger are untouched.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownRound`] when the name is not configured;
    /// the session is unchanged.
    pub fn select_round(&mut self, name: &str) -> Result<Event, Error> {
        if self.registry.round(name).is_none() {
            return Err(Error::UnknownRound(name.to_owned()));
        }

        self.current_round = Some(name.to_owned());
        self.current_question = None;
        self.clear_pending();
        self.countdown.disarm();
        self.opened.entry(name.to_owned()).or_default();
        self.set_phase(Phase::RoundSelected);

        Ok(Event::RoundSelected {
            round: name.to_owned(),
        })
    }

    /// Opens a question of the current round by number
    ///
    /// The number is marked into the round's opened set (an idempotent
    /// add); re-opening an already-opened question is allowed and never
    /// resets its recorded award history. Opening a question discards
    /// the pending selection left over from a previous question and
    /// supersedes any outstanding countdown timeline.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoRoundSelected`] outside a round and
    /// [`Error::InvalidQuestion`] when the number does not resolve to a
    /// question; the session is unchanged in both cases.
    pub fn open_question(&mut self, number: u32) -> Result<Event, Error> {
        let round = self.require_round()?.to_owned();

        let Some(question) = self.bank.find(&round, number) else {
            return Err(Error::InvalidQuestion { round, number });
        };
        let question = question.clone();

        self.opened.entry(round.clone()).or_default().insert(number);
        self.clear_pending();
        self.countdown.disarm();
        self.current_question = Some(question.clone());
        self.set_phase(Phase::QuestionOpen);

        let time_limit = self
            .registry
            .round(&round)
            .map_or(0, |config| config.time_per_question().as_secs());

        Ok(Event::QuestionOpened {
            round,
            number,
            text: question.text().to_owned(),
            media: question.media().map(str::to_owned),
            time_limit,
        })
    }

    /// Arms the countdown for the current question and schedules the
    /// first tick
    ///
    /// The duration is the owning round's configured time per question.
    /// Starting again while the countdown runs re-arms it to full
    /// duration and invalidates the previous timeline.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoQuestionOpen`] when no question is current
    /// and [`Error::CountdownFinished`] once the question's countdown
    /// has ended or its answer is revealed.
    pub fn start_timer<S: FnMut(TickAlarm, Duration)>(
        &mut self,
        mut schedule: S,
    ) -> Result<Event, Error> {
        self.require_question()?;
        match self.phase {
            Phase::QuestionOpen | Phase::TimerRunning => {}
            Phase::TimeUp | Phase::AnswerRevealed => return Err(Error::CountdownFinished),
            Phase::Idle | Phase::RoundSelected => return Err(Error::NoQuestionOpen),
        }

        let round = self.require_round()?.to_owned();
        let seconds = self
            .registry
            .round(&round)
            .ok_or(Error::UnknownRound(round))?
            .time_per_question()
            .as_secs();

        let alarm = self.countdown.arm(seconds);
        schedule(alarm, TICK_INTERVAL);
        self.set_phase(Phase::TimerRunning);

        Ok(Event::TimerStarted { remaining: seconds })
    }

    /// Feeds a scheduled tick back into the session
    ///
    /// Ticks carry the timeline generation they were scheduled under;
    /// a tick that outlived its timeline (the question changed, the
    /// countdown was re-armed, the answer was revealed) is ignored.
    /// Live ticks re-schedule themselves until the countdown expires,
    /// at which point the session moves to [`Phase::TimeUp`] and the
    /// presentation layer is asked to sound the alert.
    pub fn receive_alarm<S: FnMut(TickAlarm, Duration)>(
        &mut self,
        alarm: TickAlarm,
        mut schedule: S,
    ) -> Option<Event> {
        match self.countdown.tick(alarm) {
            Tick::Stale => None,
            Tick::Running(remaining) => {
                schedule(alarm, TICK_INTERVAL);
                Some(Event::TimerTick { remaining })
            }
            Tick::Expired => {
                self.set_phase(Phase::TimeUp);
                Some(Event::TimerExpired)
            }
        }
    }

    /// Shows the answer of the current question
    ///
    /// Normally follows [`Phase::TimeUp`], but the host may skip the
    /// wait: revealing during [`Phase::QuestionOpen`] or
    /// [`Phase::TimerRunning`] is supported and ends the countdown
    /// silently, with no expiry event. Revealing twice is harmless.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoQuestionOpen`] when no question is current.
    pub fn reveal_answer(&mut self) -> Result<Event, Error> {
        let answer = self.require_question()?.answer().to_owned();

        if self.phase == Phase::TimerRunning {
            self.countdown.disarm();
        }
        self.set_phase(Phase::AnswerRevealed);

        Ok(Event::AnswerRevealed { answer })
    }

    /// Marks a team as the pending award recipient
    ///
    /// Selecting a different team replaces the previous pending value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoQuestionOpen`] when no question is current
    /// and [`Error::UnknownTeam`] for a team outside the roster.
    pub fn select_team(&mut self, team: TeamName) -> Result<Event, Error> {
        self.require_question()?;
        if !self.registry.contains_team(&team) {
            return Err(Error::UnknownTeam(team));
        }

        self.pending_team = Some(team.clone());
        Ok(Event::TeamSelected { team })
    }

    /// Marks a point value as the pending award amount
    ///
    /// Selecting a different value replaces the previous pending value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoQuestionOpen`] when no question is current
    /// and [`Error::UngrantablePoints`] for values outside the two
    /// grantable awards.
    pub fn select_points(&mut self, points: u32) -> Result<Event, Error> {
        self.require_question()?;
        if !constants::scoring::is_grantable(points) {
            return Err(Error::UngrantablePoints(points));
        }

        self.pending_points = Some(points);
        Ok(Event::PointsSelected { points })
    }

    /// Grants the pending selection and records it in the ledger
    ///
    /// On success both pending selections are cleared. On any failure
    /// the ledger and the pending selections are untouched, so the host
    /// can fix the selection and confirm again.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingSelection`] unless both a team and a
    /// point value are pending, plus whatever the ledger rejects.
    pub fn confirm_award(&mut self) -> Result<Event, Error> {
        let (Some(team), Some(points)) = (self.pending_team.clone(), self.pending_points) else {
            return Err(Error::MissingSelection);
        };
        let round = self.require_round()?.to_owned();

        self.ledger.award(&team, &round, points)?;
        self.clear_pending();

        Ok(Event::AwardConfirmed {
            team,
            round,
            points,
        })
    }

    /// Leaves the current question and returns to the round's question
    /// list
    ///
    /// Clears the current question and pending selections and
    /// supersedes any outstanding countdown timeline. The opened set
    /// and the ledger are never touched by navigation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoRoundSelected`] outside a round.
    pub fn return_to_question_list(&mut self) -> Result<Event, Error> {
        let round = self.require_round()?.to_owned();

        self.current_question = None;
        self.clear_pending();
        self.countdown.disarm();
        self.set_phase(Phase::RoundSelected);

        Ok(Event::QuestionClosed { round })
    }

    /// Leaves the current round and returns to the round list
    ///
    /// Clears the current round, question, and pending selections and
    /// supersedes any outstanding countdown timeline. The opened sets
    /// and the ledger are never touched by navigation.
    pub fn return_to_round_list(&mut self) -> Event {
        self.current_round = None;
        self.current_question = None;
        self.clear_pending();
        self.countdown.disarm();
        self.set_phase(Phase::Idle);

        Event::RoundClosed
    }

    /// Dispatches a host intent to the matching typed operation
    ///
    /// Recoverable failures become [`Event::Error`] so the presentation
    /// layer has a single rendering path for everything the session
    /// reports.
    pub fn apply<S: FnMut(TickAlarm, Duration)>(
        &mut self,
        intent: HostIntent,
        schedule: S,
    ) -> Event {
        let result = match intent {
            HostIntent::SelectRound(name) => self.select_round(&name),
            HostIntent::OpenQuestion(number) => self.open_question(number),
            HostIntent::StartTimer => self.start_timer(schedule),
            HostIntent::RevealAnswer => self.reveal_answer(),
            HostIntent::SelectTeam(team) => self.select_team(team),
            HostIntent::SelectPoints(points) => self.select_points(points),
            HostIntent::ConfirmAward => self.confirm_award(),
            HostIntent::BackToQuestionList => self.return_to_question_list(),
            HostIntent::BackToRoundList => Ok(self.return_to_round_list()),
        };

        result.unwrap_or_else(|error| {
            tracing::debug!(%error, "host intent rejected");
            Event::Error {
                reason: error.to_string(),
            }
        })
    }
}

// Derived views
impl Session {
    /// The current phase
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The current round's name, if any
    pub fn current_round(&self) -> Option<&str> {
        self.current_round.as_deref()
    }

    /// The current question, if any
    pub fn current_question(&self) -> Option<&Question> {
        self.current_question.as_ref()
    }

    /// The pending award recipient, if any
    pub fn pending_team(&self) -> Option<&TeamName> {
        self.pending_team.as_ref()
    }

    /// The pending award amount, if any
    pub fn pending_points(&self) -> Option<u32> {
        self.pending_points
    }

    /// Seconds left on the countdown
    pub fn remaining_seconds(&self) -> u64 {
        self.countdown.remaining()
    }

    /// The score ledger
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// The static configuration the session runs against
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// The question bank the session draws from
    pub fn bank(&self) -> &QuestionBank {
        &self.bank
    }

    /// Whether a question has been opened this session
    pub fn is_opened(&self, round: &str, number: u32) -> bool {
        self.opened
            .get(round)
            .is_some_and(|numbers| numbers.contains(&number))
    }

    /// The opened/unopened status of every question slot in a round
    ///
    /// Used to render the question grid: one entry per number from 1 to
    /// the round's configured question count.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownRound`] for an unconfigured round name.
    pub fn round_status(&self, round: &str) -> Result<Vec<(u32, bool)>, Error> {
        let config = self
            .registry
            .round(round)
            .ok_or_else(|| Error::UnknownRound(round.to_owned()))?;

        Ok((1..=config.question_count())
            .map(|number| (number, self.is_opened(round, number)))
            .collect())
    }

    /// The score table rows, teams in roster order and round columns in
    /// configuration order
    pub fn score_table(&self) -> Vec<ScoreRow> {
        self.registry
            .teams()
            .iter()
            .map(|team| ScoreRow {
                team: team.clone(),
                total: self.ledger.total_for(team),
                rounds: self
                    .registry
                    .rounds()
                    .iter()
                    .map(|round| self.ledger.display_string(team, round.name()))
                    .collect(),
            })
            .collect()
    }

    /// All teams with their totals, best first, ties broken by name
    pub fn ranking(&self) -> Vec<(TeamName, u64)> {
        self.ledger.ranking()
    }
}
