//! Chat commands

use crate::ids::PlayerId;

/// Prefix marking a chat message as a command
pub const PREFIX: char = '!';

/// A recognized chat command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `!quiz` or `!start`
    Start,
    /// `!stop`
    Stop,
    /// `!stats [nick]`, the sender's own stats without a nickname
    Stats(Option<PlayerId>),
    /// `!leaderboard`
    Leaderboard,
    /// `!help`
    Help,
}

impl Command {
    /// Parses a chat message, returning `None` for anything that is not a
    /// known command
    ///
    /// Command names are case-insensitive. Extra words after a command other
    /// than `!stats` are ignored.
    pub fn parse(text: &str) -> Option<Self> {
        let mut words = text.trim().strip_prefix(PREFIX)?.split_whitespace();
        let name = words.next()?.to_lowercase();

        Some(match name.as_str() {
            "quiz" | "start" => Self::Start,
            "stop" => Self::Stop,
            "stats" => Self::Stats(words.next().map(PlayerId::from)),
            "leaderboard" => Self::Leaderboard,
            "help" => Self::Help,
            _ => return None,
        })
    }
}
