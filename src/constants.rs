//! Configuration constants for the quiz host system
//!
//! This module contains the limits and fixed values used throughout the
//! core to validate configuration input and keep scoring consistent.

/// Team roster configuration constants
pub mod teams {
    /// Maximum number of teams in a roster
    pub const MAX_TEAM_COUNT: usize = 50;
    /// Maximum length of a team name in characters
    pub const MAX_NAME_LENGTH: usize = 100;
}

/// Round configuration constants
pub mod rounds {
    /// Maximum number of rounds in a single competition
    pub const MAX_ROUND_COUNT: usize = 50;
    /// Maximum length of a round name in characters
    pub const MAX_NAME_LENGTH: usize = 100;
    /// Maximum number of questions in a single round
    pub const MAX_QUESTION_COUNT: u32 = 200;
    /// Minimum time limit in seconds for answering a question
    pub const MIN_TIME_LIMIT: u64 = 5;
    /// Maximum time limit in seconds for answering a question
    pub const MAX_TIME_LIMIT: u64 = 600;
}

/// Question content configuration constants
pub mod questions {
    /// Maximum length of question text in characters
    pub const MAX_TEXT_LENGTH: usize = 2000;
    /// Maximum length of answer text in characters
    pub const MAX_ANSWER_LENGTH: usize = 1000;
    /// Maximum length of a media file reference in characters
    pub const MAX_MEDIA_LENGTH: usize = 260;
}

/// Scoring constants
pub mod scoring {
    /// Points granted for a direct (first-attempt) answer
    pub const DIRECT_POINTS: u32 = 5;
    /// Points granted for a bonus (passed-over) answer
    pub const BONUS_POINTS: u32 = 2;

    /// Whether a point value is one of the two grantable awards
    pub fn is_grantable(points: u32) -> bool {
        points == DIRECT_POINTS || points == BONUS_POINTS
    }
}
