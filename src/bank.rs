//! Question bank: load-once storage and lookup of quiz questions
//!
//! Questions arrive from a tabular source keyed by round and number; the
//! storage format (spreadsheet export, JSON, database dump) is an adapter
//! detail. The bank validates every record against the round registry at
//! load time and afterwards only answers lookups.

use std::collections::HashMap;

use garde::Validate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    config::Registry,
    constants,
};

/// A single quiz question
///
/// Questions are read-only once loaded. The `number` is unique within the
/// owning round and lies within the round's configured question count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Question {
    /// Name of the round this question belongs to
    #[garde(length(min = 1, max = constants::rounds::MAX_NAME_LENGTH))]
    round: String,
    /// The question's number within its round, starting at 1
    #[garde(range(min = 1, max = constants::rounds::MAX_QUESTION_COUNT))]
    number: u32,
    /// The question text shown to the audience
    #[garde(length(min = 1, max = constants::questions::MAX_TEXT_LENGTH))]
    text: String,
    /// The answer revealed after the countdown
    #[garde(length(min = 1, max = constants::questions::MAX_ANSWER_LENGTH))]
    answer: String,
    /// Optional reference to a media file the presentation layer opens
    #[garde(inner(length(max = constants::questions::MAX_MEDIA_LENGTH)))]
    media: Option<String>,
}

impl Question {
    /// Creates a question record (validated later by [`QuestionBank::new`])
    pub fn new(
        round: impl Into<String>,
        number: u32,
        text: impl Into<String>,
        answer: impl Into<String>,
        media: Option<String>,
    ) -> Self {
        Self {
            round: round.into(),
            number,
            text: text.into(),
            answer: answer.into(),
            media,
        }
    }

    /// Name of the round this question belongs to
    pub fn round(&self) -> &str {
        &self.round
    }

    /// The question's number within its round
    pub fn number(&self) -> u32 {
        self.number
    }

    /// The question text
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The answer text
    pub fn answer(&self) -> &str {
        &self.answer
    }

    /// The media file reference, if any
    pub fn media(&self) -> Option<&str> {
        self.media.as_deref()
    }
}

/// Errors raised while loading or querying the question bank
#[derive(Debug, Error)]
pub enum Error {
    /// A question references a round missing from the registry
    #[error("question {number} references unknown round {round:?}")]
    UnknownRound {
        /// The unconfigured round name
        round: String,
        /// The offending question's number
        number: u32,
    },
    /// Two questions share a number within one round
    #[error("duplicate question number {number} in round {round:?}")]
    DuplicateNumber {
        /// The round containing the duplicate
        round: String,
        /// The repeated number
        number: u32,
    },
    /// A question's number exceeds its round's configured count
    #[error("question number {number} exceeds the {count} questions of round {round:?}")]
    NumberOutOfRange {
        /// The owning round
        round: String,
        /// The out-of-range number
        number: u32,
        /// The round's configured question count
        count: u32,
    },
    /// A question failed field validation
    #[error("question {number} in round {round:?} failed validation: {report}")]
    InvalidQuestion {
        /// The owning round
        round: String,
        /// The offending question's number
        number: u32,
        /// The validation report produced by garde
        report: garde::Report,
    },
    /// A lookup named a round missing from the registry
    #[error("no such round {0:?}")]
    NoSuchRound(String),
    /// The question source could not be read
    #[error("failed to read questions: {0}")]
    Io(#[from] std::io::Error),
    /// The question source could not be parsed
    #[error("malformed question data: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Load-once lookup table of questions grouped by round
///
/// Every configured round has an entry, possibly empty: a round may be
/// configured before its questions are written.
#[derive(Debug, Clone)]
pub struct QuestionBank {
    /// Questions per round name, sorted by question number
    by_round: HashMap<String, Vec<Question>>,
}

impl QuestionBank {
    /// Validates records against the registry and builds the bank
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] when a record references an unknown round,
    /// repeats a number within a round, numbers past the round's
    /// configured count, or fails field validation. Loading is
    /// all-or-nothing.
    pub fn new(questions: Vec<Question>, registry: &Registry) -> Result<Self, Error> {
        let mut by_round: HashMap<String, Vec<Question>> = registry
            .rounds()
            .iter()
            .map(|round| (round.name().to_owned(), Vec::new()))
            .collect();

        for question in questions {
            question
                .validate()
                .map_err(|report| Error::InvalidQuestion {
                    round: question.round.clone(),
                    number: question.number,
                    report,
                })?;

            let Some(round) = registry.round(&question.round) else {
                return Err(Error::UnknownRound {
                    round: question.round,
                    number: question.number,
                });
            };
            if question.number > round.question_count() {
                return Err(Error::NumberOutOfRange {
                    round: question.round,
                    number: question.number,
                    count: round.question_count(),
                });
            }

            let slot = by_round
                .get_mut(&question.round)
                .expect("registry rounds were preseeded");
            if slot.iter().any(|existing| existing.number == question.number) {
                return Err(Error::DuplicateNumber {
                    round: question.round,
                    number: question.number,
                });
            }
            slot.push(question);
        }

        for slot in by_round.values_mut() {
            slot.sort_by_key(Question::number);
        }

        Ok(Self { by_round })
    }

    /// Reads question records from a JSON source and builds the bank
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] when the JSON does not parse, plus
    /// everything [`QuestionBank::new`] reports.
    pub fn from_reader(reader: impl std::io::Read, registry: &Registry) -> Result<Self, Error> {
        let questions: Vec<Question> = serde_json::from_reader(reader)?;
        Self::new(questions, registry)
    }

    /// Reads question records from a JSON file and builds the bank
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] when the file cannot be opened, plus
    /// everything [`QuestionBank::from_reader`] reports.
    pub fn from_path(
        path: impl AsRef<std::path::Path>,
        registry: &Registry,
    ) -> Result<Self, Error> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(std::io::BufReader::new(file), registry)
    }

    /// The questions of one round, sorted by number
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoSuchRound`] for a round name missing from the
    /// registry the bank was built against.
    pub fn questions_for(&self, round: &str) -> Result<&[Question], Error> {
        self.by_round
            .get(round)
            .map(Vec::as_slice)
            .ok_or_else(|| Error::NoSuchRound(round.to_owned()))
    }

    /// Looks up one question by round and number
    ///
    /// A missing number is an expected outcome (the host typed a number
    /// that does not exist), not an error.
    pub fn find(&self, round: &str, number: u32) -> Option<&Question> {
        self.by_round
            .get(round)?
            .iter()
            .find(|question| question.number == number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RoundConfig, TeamName};
    use std::time::Duration;

    fn create_test_registry() -> Registry {
        Registry::new(
            vec![TeamName::new("Red"), TeamName::new("Blue")],
            vec![
                RoundConfig::new("R1", 3, Duration::from_secs(60)),
                RoundConfig::new("R2", 2, Duration::from_secs(30)),
            ],
        )
        .unwrap()
    }

    fn create_test_questions() -> Vec<Question> {
        vec![
            Question::new("R1", 2, "Second question", "Second answer", None),
            Question::new("R1", 1, "First question", "First answer", Some("clip.mp4".into())),
            Question::new("R2", 1, "Other round", "Other answer", None),
        ]
    }

    #[test]
    fn test_bank_load_and_find() {
        let registry = create_test_registry();
        let bank = QuestionBank::new(create_test_questions(), &registry).unwrap();

        let question = bank.find("R1", 1).unwrap();
        assert_eq!(question.text(), "First question");
        assert_eq!(question.media(), Some("clip.mp4"));
        assert!(bank.find("R1", 3).is_none());
        assert!(bank.find("Nope", 1).is_none());
    }

    #[test]
    fn test_bank_sorts_by_number() {
        let registry = create_test_registry();
        let bank = QuestionBank::new(create_test_questions(), &registry).unwrap();

        let numbers: Vec<_> = bank
            .questions_for("R1")
            .unwrap()
            .iter()
            .map(Question::number)
            .collect();
        assert_eq!(numbers, [1, 2]);
    }

    #[test]
    fn test_bank_empty_round_is_present() {
        let registry = create_test_registry();
        let bank = QuestionBank::new(vec![], &registry).unwrap();
        assert!(bank.questions_for("R2").unwrap().is_empty());
    }

    #[test]
    fn test_bank_unknown_round_in_lookup() {
        let registry = create_test_registry();
        let bank = QuestionBank::new(vec![], &registry).unwrap();
        assert!(matches!(
            bank.questions_for("R9"),
            Err(Error::NoSuchRound(_))
        ));
    }

    #[test]
    fn test_bank_rejects_unknown_round() {
        let registry = create_test_registry();
        let questions = vec![Question::new("R9", 1, "Lost", "Lost", None)];
        assert!(matches!(
            QuestionBank::new(questions, &registry),
            Err(Error::UnknownRound { .. })
        ));
    }

    #[test]
    fn test_bank_rejects_duplicate_number() {
        let registry = create_test_registry();
        let questions = vec![
            Question::new("R1", 1, "One", "A", None),
            Question::new("R1", 1, "One again", "B", None),
        ];
        assert!(matches!(
            QuestionBank::new(questions, &registry),
            Err(Error::DuplicateNumber { .. })
        ));
    }

    #[test]
    fn test_bank_rejects_number_out_of_range() {
        let registry = create_test_registry();
        let questions = vec![Question::new("R2", 3, "Too far", "A", None)];
        assert!(matches!(
            QuestionBank::new(questions, &registry),
            Err(Error::NumberOutOfRange { count: 2, .. })
        ));
    }

    #[test]
    fn test_bank_rejects_empty_text() {
        let registry = create_test_registry();
        let questions = vec![Question::new("R1", 1, "", "A", None)];
        assert!(matches!(
            QuestionBank::new(questions, &registry),
            Err(Error::InvalidQuestion { .. })
        ));
    }

    #[test]
    fn test_bank_from_reader() {
        let registry = create_test_registry();
        let json = r#"[
            {"round": "R1", "number": 1, "text": "Q", "answer": "A", "media": null}
        ]"#;
        let bank = QuestionBank::from_reader(json.as_bytes(), &registry).unwrap();
        assert_eq!(bank.find("R1", 1).unwrap().answer(), "A");
    }
}
