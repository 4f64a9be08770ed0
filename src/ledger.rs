//! Score ledger and ranking functionality
//!
//! This module keeps the append-only record of point awards granted to
//! teams per round, and derives the views the host presents: per-team
//! totals, the deterministic ranking, and the per-cell display strings
//! of the score table. Award sequences are an audit log: they are never
//! reordered and never shrink.

use std::collections::HashMap;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    config::{Registry, TeamName},
    constants,
};

/// Errors raised by ledger mutations
///
/// All of these are recoverable input errors; the ledger is untouched
/// when any of them is returned.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// The team is not part of the roster the ledger was built from
    #[error("unknown team {0}")]
    UnknownTeam(TeamName),
    /// The round is not part of the configuration the ledger was built from
    #[error("unknown round {0:?}")]
    UnknownRound(String),
    /// The point value is not one of the two grantable awards
    #[error(
        "cannot grant {0} points, only {direct} (direct) or {bonus} (bonus)",
        direct = constants::scoring::DIRECT_POINTS,
        bonus = constants::scoring::BONUS_POINTS
    )]
    UngrantablePoints(u32),
}

/// Serialization helper for the [`Ledger`] struct
#[derive(Deserialize)]
struct LedgerSerde {
    awards: HashMap<TeamName, HashMap<String, Vec<u32>>>,
}

/// Append-only record of point awards per team per round
///
/// Every (team, round) pair present in configuration has an entry, even
/// when no points were awarded yet. Totals are cached and rebuilt from
/// the award lists on deserialization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "LedgerSerde")]
pub struct Ledger {
    /// Awards per team per round, in assignment order
    awards: HashMap<TeamName, HashMap<String, Vec<u32>>>,

    /// Total points per team (cached)
    #[serde(skip)]
    totals: HashMap<TeamName, u64>,
}

impl From<LedgerSerde> for Ledger {
    /// Reconstructs the ledger from serialized data
    ///
    /// This rebuilds the cached totals from the award lists, which is
    /// necessary since the cached field is not serialized.
    fn from(serde: LedgerSerde) -> Self {
        let totals = serde
            .awards
            .iter()
            .map(|(team, rounds)| {
                (
                    team.clone(),
                    rounds
                        .values()
                        .flat_map(|points| points.iter().copied())
                        .map(u64::from)
                        .sum(),
                )
            })
            .collect();

        Ledger {
            awards: serde.awards,
            totals,
        }
    }
}

impl Ledger {
    /// Creates a ledger with an empty award list for every configured
    /// (team, round) pair
    pub fn new(registry: &Registry) -> Self {
        let awards: HashMap<TeamName, HashMap<String, Vec<u32>>> = registry
            .teams()
            .iter()
            .map(|team| {
                (
                    team.clone(),
                    registry
                        .rounds()
                        .iter()
                        .map(|round| (round.name().to_owned(), Vec::new()))
                        .collect(),
                )
            })
            .collect();
        let totals = registry
            .teams()
            .iter()
            .map(|team| (team.clone(), 0))
            .collect();

        Self { awards, totals }
    }

    /// Backfills any (team, round) pair present in the registry but
    /// absent from this ledger
    ///
    /// Used after loading a snapshot written under an older
    /// configuration: new teams and rounds appear with empty award
    /// lists, existing entries are left untouched.
    pub fn align_with(&mut self, registry: &Registry) {
        for team in registry.teams() {
            let rounds = self.awards.entry(team.clone()).or_default();
            for round in registry.rounds() {
                rounds.entry(round.name().to_owned()).or_default();
            }
            self.totals.entry(team.clone()).or_insert(0);
        }
    }

    /// Appends a point award to a team's record for a round
    ///
    /// The award sequence is append-only: entries are never reordered
    /// or removed.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] and leaves the ledger unchanged when the
    /// team or round is unknown or the point value is not grantable.
    pub fn award(&mut self, team: &TeamName, round: &str, points: u32) -> Result<(), Error> {
        if !constants::scoring::is_grantable(points) {
            return Err(Error::UngrantablePoints(points));
        }
        let rounds = self
            .awards
            .get_mut(team)
            .ok_or_else(|| Error::UnknownTeam(team.clone()))?;
        let sequence = rounds
            .get_mut(round)
            .ok_or_else(|| Error::UnknownRound(round.to_owned()))?;

        sequence.push(points);
        *self.totals.entry(team.clone()).or_insert(0) += u64::from(points);

        tracing::debug!(%team, round, points, "score recorded");

        Ok(())
    }

    /// Total points a team has earned across all rounds
    ///
    /// Unknown teams total zero.
    pub fn total_for(&self, team: &TeamName) -> u64 {
        self.totals.get(team).copied().unwrap_or(0)
    }

    /// The awards granted to a team for one round, in assignment order
    pub fn awards_for(&self, team: &TeamName, round: &str) -> &[u32] {
        self.awards
            .get(team)
            .and_then(|rounds| rounds.get(round))
            .map_or(&[], Vec::as_slice)
    }

    /// All teams with their totals, sorted by total descending
    ///
    /// Ties are broken by team name ascending, so the displayed medal
    /// order is deterministic regardless of award call order.
    pub fn ranking(&self) -> Vec<(TeamName, u64)> {
        self.awards
            .keys()
            .map(|team| (team.clone(), self.total_for(team)))
            .sorted_by(|(team_a, total_a), (team_b, total_b)| {
                total_b.cmp(total_a).then_with(|| team_a.cmp(team_b))
            })
            .collect_vec()
    }

    /// The awards of one (team, round) cell joined with `+` separators
    ///
    /// Purely a rendering helper, but the order is contractual: it
    /// matches assignment order exactly, never sorted.
    pub fn display_string(&self, team: &TeamName, round: &str) -> String {
        self.awards_for(team, round)
            .iter()
            .map(ToString::to_string)
            .join("+")
    }

    /// The teams recorded in this ledger (unordered)
    pub fn teams(&self) -> impl Iterator<Item = &TeamName> {
        self.awards.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RoundConfig;
    use std::time::Duration;

    fn create_test_registry() -> Registry {
        Registry::new(
            vec![TeamName::new("Red"), TeamName::new("Blue")],
            vec![RoundConfig::new("R1", 10, Duration::from_secs(60))],
        )
        .unwrap()
    }

    #[test]
    fn test_award_and_total() {
        let registry = create_test_registry();
        let mut ledger = Ledger::new(&registry);
        let red = TeamName::new("Red");

        ledger.award(&red, "R1", 5).unwrap();
        ledger.award(&red, "R1", 2).unwrap();

        assert_eq!(ledger.total_for(&red), 7);
        assert_eq!(ledger.display_string(&red, "R1"), "5+2");
        assert_eq!(
            ledger.ranking(),
            vec![(TeamName::new("Red"), 7), (TeamName::new("Blue"), 0)]
        );
    }

    #[test]
    fn test_award_order_is_preserved() {
        let registry = create_test_registry();
        let mut ledger = Ledger::new(&registry);
        let blue = TeamName::new("Blue");

        for points in [2, 5, 5, 2] {
            ledger.award(&blue, "R1", points).unwrap();
        }

        assert_eq!(ledger.awards_for(&blue, "R1"), &[2, 5, 5, 2]);
        assert_eq!(ledger.display_string(&blue, "R1"), "2+5+5+2");
    }

    #[test]
    fn test_award_rejects_unknown_team() {
        let registry = create_test_registry();
        let mut ledger = Ledger::new(&registry);
        let ghost = TeamName::new("Ghost");

        let result = ledger.award(&ghost, "R1", 5);
        assert_eq!(result, Err(Error::UnknownTeam(ghost.clone())));
        assert_eq!(ledger.total_for(&ghost), 0);
    }

    #[test]
    fn test_award_rejects_unknown_round() {
        let registry = create_test_registry();
        let mut ledger = Ledger::new(&registry);
        let red = TeamName::new("Red");

        let result = ledger.award(&red, "R9", 5);
        assert_eq!(result, Err(Error::UnknownRound("R9".to_owned())));
        assert_eq!(ledger.total_for(&red), 0);
    }

    #[test]
    fn test_award_rejects_ungrantable_points() {
        let registry = create_test_registry();
        let mut ledger = Ledger::new(&registry);
        let red = TeamName::new("Red");

        let result = ledger.award(&red, "R1", 3);
        assert_eq!(result, Err(Error::UngrantablePoints(3)));
        assert!(ledger.awards_for(&red, "R1").is_empty());
    }

    #[test]
    fn test_empty_display_string() {
        let registry = create_test_registry();
        let ledger = Ledger::new(&registry);
        assert_eq!(ledger.display_string(&TeamName::new("Red"), "R1"), "");
    }

    #[test]
    fn test_ranking_tie_break_is_lexicographic() {
        let registry = Registry::new(
            vec![
                TeamName::new("Charlie"),
                TeamName::new("Alpha"),
                TeamName::new("Bravo"),
            ],
            vec![RoundConfig::new("R1", 10, Duration::from_secs(60))],
        )
        .unwrap();
        let mut ledger = Ledger::new(&registry);

        // Alpha and Bravo tie on 7, Charlie trails on 5.
        ledger.award(&TeamName::new("Alpha"), "R1", 5).unwrap();
        ledger.award(&TeamName::new("Alpha"), "R1", 2).unwrap();
        ledger.award(&TeamName::new("Bravo"), "R1", 2).unwrap();
        ledger.award(&TeamName::new("Bravo"), "R1", 5).unwrap();
        ledger.award(&TeamName::new("Charlie"), "R1", 5).unwrap();

        assert_eq!(
            ledger.ranking(),
            vec![
                (TeamName::new("Alpha"), 7),
                (TeamName::new("Bravo"), 7),
                (TeamName::new("Charlie"), 5),
            ]
        );
    }

    #[test]
    fn test_serde_round_trip_rebuilds_totals() {
        let registry = create_test_registry();
        let mut ledger = Ledger::new(&registry);
        let red = TeamName::new("Red");
        ledger.award(&red, "R1", 5).unwrap();
        ledger.award(&red, "R1", 2).unwrap();

        let json = serde_json::to_string(&ledger).unwrap();
        let reloaded: Ledger = serde_json::from_str(&json).unwrap();

        assert_eq!(reloaded.total_for(&red), 7);
        assert_eq!(reloaded.awards_for(&red, "R1"), &[5, 2]);
    }

    #[test]
    fn test_align_with_backfills_new_pairs() {
        let registry = create_test_registry();
        let mut ledger = Ledger::new(&registry);
        ledger.award(&TeamName::new("Red"), "R1", 5).unwrap();

        let grown = Registry::new(
            vec![
                TeamName::new("Red"),
                TeamName::new("Blue"),
                TeamName::new("Green"),
            ],
            vec![
                RoundConfig::new("R1", 10, Duration::from_secs(60)),
                RoundConfig::new("R2", 5, Duration::from_secs(30)),
            ],
        )
        .unwrap();

        ledger.align_with(&grown);

        assert_eq!(ledger.total_for(&TeamName::new("Green")), 0);
        assert!(ledger.awards_for(&TeamName::new("Green"), "R2").is_empty());
        assert_eq!(ledger.awards_for(&TeamName::new("Red"), "R1"), &[5]);
        assert!(ledger.awards_for(&TeamName::new("Red"), "R2").is_empty());
    }
}
