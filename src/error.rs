//! Error types shared across the quiz bot
//!
//! Failures fall into four groups: refusals of misused operations
//! ([`QuizError`]), failures of the question-generation provider
//! ([`ProviderError`]) and of candidate validation ([`Rejection`]), the one
//! fatal session failure ([`SupplyError`]), and collaborator failures that are
//! logged and otherwise ignored ([`TransportError`], [`PersistenceError`]).

use thiserror::Error;

/// Typed refusal of a session operation
///
/// These are returned synchronously and never mutate any state.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuizError {
    /// A live session already exists for the channel
    #[error("a quiz is already running in this channel")]
    AlreadyActive,
    /// The requester is not allowed to perform the operation
    #[error("requester is not authorized")]
    Unauthorized,
    /// No live session exists for the channel
    #[error("no quiz is running in this channel")]
    NoActiveSession,
}

/// Failure of a single request to the question-generation provider
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The provider did not answer within the request timeout
    #[error("question request timed out")]
    Timeout,
    /// The provider could not be reached or refused the request
    #[error("question provider unavailable: {0}")]
    Unavailable(String),
    /// The provider answered with something that is not a question
    #[error("malformed provider response: {0}")]
    Malformed(String),
}

/// Reason a candidate question failed structural validation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// A required field is blank
    #[error("{0} is empty")]
    Empty(&'static str),
    /// The question text does not end with a question mark
    #[error("question does not end with a question mark")]
    Unterminated,
    /// The primary answer has too many words
    #[error("answer has {0} words")]
    AnswerTooLong(usize),
    /// The question was already asked in this session
    #[error("question was already used")]
    Duplicate,
    /// The question contains ambiguous or overly technical vocabulary
    #[error("question contains disallowed term {0:?}")]
    DisallowedTerm(String),
    /// The question or answer contains inappropriate content
    #[error("content is inappropriate")]
    Inappropriate,
    /// A length or count bound was violated
    #[error("invalid question: {0}")]
    Invalid(String),
}

/// The supplier could neither obtain nor fall back to an unused question
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupplyError {
    /// External attempts and the local fallback pool are both exhausted
    #[error("no unused question available")]
    Exhausted,
}

/// Failure to deliver a message through the transport
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("failed to send to {channel}: {reason}")]
pub struct TransportError {
    /// Channel the message was addressed to
    pub channel: String,
    /// Human-readable cause reported by the transport
    pub reason: String,
}

/// Failure of the persistence collaborator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PersistenceError {
    /// The store could not be reached
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// The store rejected the operation
    #[error("store operation failed: {0}")]
    Failed(String),
}

/// Failure to load a configuration file
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    /// The file is not valid TOML for the expected shape
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    /// A value is outside its allowed range
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl From<garde::Report> for ConfigError {
    fn from(report: garde::Report) -> Self {
        Self::Invalid(report.to_string())
    }
}
