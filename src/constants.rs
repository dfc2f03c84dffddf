//! Configuration limits for the quiz bot
//!
//! This module contains the hard limits used throughout the crate to keep
//! questions, answers and session settings within sane boundaries. Values
//! that operators may tune live in [`crate::config`] instead.

/// Session configuration limits
pub mod session {
    /// Minimum number of rounds in a session
    pub const MIN_ROUNDS: u32 = 1;
    /// Maximum number of rounds in a session
    pub const MAX_ROUNDS: u32 = 50;
    /// Minimum time in seconds players get to answer a question
    pub const MIN_TIME_LIMIT: u64 = 5;
    /// Maximum time in seconds players get to answer a question
    pub const MAX_TIME_LIMIT: u64 = 240;
    /// Maximum pause in seconds between a round being graded and the next question
    pub const MAX_QUESTION_DELAY: u64 = 30;
    /// Maximum number of rows printed in standings and leaderboards
    pub const MAX_STANDINGS: usize = 25;
}

/// Question content limits
pub mod question {
    /// Minimum length of a question text in characters
    pub const MIN_TEXT_LENGTH: usize = 10;
    /// Maximum length of a question text in characters
    pub const MAX_TEXT_LENGTH: usize = 200;
    /// Maximum length of the primary answer in characters
    pub const MAX_ANSWER_LENGTH: usize = 30;
    /// Maximum number of words in the primary answer
    pub const MAX_ANSWER_WORDS: usize = 3;
    /// Maximum length of the supporting fact in characters
    pub const MAX_FACT_LENGTH: usize = 300;
    /// Maximum number of accepted alternative answers
    pub const MAX_ALTERNATIVES: usize = 16;
    /// Maximum length of a category label in characters
    pub const MAX_CATEGORY_LENGTH: usize = 60;
}

/// Question supplier limits
pub mod supplier {
    /// Maximum number of external attempts per question
    pub const MAX_ATTEMPTS: u32 = 10;
    /// Maximum delay in seconds between two external attempts
    pub const MAX_RETRY_DELAY: u64 = 30;
    /// Minimum timeout in seconds for a single external request
    pub const MIN_REQUEST_TIMEOUT: u64 = 1;
    /// Maximum timeout in seconds for a single external request
    pub const MAX_REQUEST_TIMEOUT: u64 = 60;
    /// Number of recently used categories avoided when picking a hint
    pub const RECENT_CATEGORY_WINDOW: usize = 3;
}

/// Answer text limits
pub mod answer_text {
    /// Maximum length of a submitted answer in characters, longer text is ignored
    pub const MAX_LENGTH: usize = 200;
}
