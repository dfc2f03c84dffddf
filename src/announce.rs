//! Everything the bot says in a channel
//!
//! Each variant renders to one or more lines of chat text. Internal error
//! details never appear here.

use std::{fmt, time::Duration};

use crate::{
    TruncatedVec,
    ids::PlayerId,
    persistence::PlayerProfile,
    scoring::{RoundSummary, ScoreBreakdown, Standing},
};

const MEDALS: [&str; 3] = ["🥇", "🥈", "🥉"];

fn medal(index: usize) -> &'static str {
    MEDALS.get(index).copied().unwrap_or("•")
}

/// A message for the channel
#[derive(Debug, Clone)]
pub enum Announcement {
    /// A quiz is starting
    Welcome {
        /// Number of rounds
        rounds: u32,
        /// Time per question
        answer_timeout: Duration,
    },
    /// A new question is up
    Question {
        /// One-based round number
        round: u32,
        /// Number of rounds
        rounds: u32,
        /// Category label
        category: String,
        /// Question text
        text: String,
    },
    /// Someone answered correctly
    Correct {
        /// Who answered
        player: PlayerId,
        /// The accepted answer
        answer: String,
        /// Points and multipliers
        breakdown: ScoreBreakdown,
    },
    /// Nobody answered in time
    TimesUp {
        /// The canonical answer
        answer: String,
    },
    /// The supporting fact of the last question
    Fact(String),
    /// Final standings of the session
    FinalResults {
        /// Best players with the total count
        standings: TruncatedVec<Standing>,
        /// Answered and timed out rounds
        summary: RoundSummary,
    },
    /// Best players of all time
    Leaderboard {
        /// Heading line
        title: &'static str,
        /// Profiles, best first
        profiles: Vec<PlayerProfile>,
    },
    /// A player's lifetime statistics
    Stats {
        /// Who was asked about
        player: PlayerId,
        /// Their profile, if any
        profile: Option<PlayerProfile>,
    },
    /// Rules and commands
    Help {
        /// Number of rounds
        rounds: u32,
        /// Time per question
        answer_timeout: Duration,
    },
    /// An administrator ended the quiz early
    Stopped {
        /// Who stopped it
        by: PlayerId,
    },
    /// No question could be found for the next round
    SupplyFailed,
    /// The bot is shutting down mid-quiz
    ShuttingDown,
    /// A start was requested while a quiz runs
    AlreadyActive,
    /// A stop was requested by someone who may not
    Unauthorized,
    /// A stop was requested while no quiz runs
    NoActiveQuiz,
    /// Statistics could not be read
    StatsUnavailable,
}

impl fmt::Display for Announcement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Welcome {
                rounds,
                answer_timeout,
            } => {
                writeln!(f, "🎯 New Quiz Starting!")?;
                writeln!(f, "• Type your answer in the channel")?;
                writeln!(f, "• {} seconds per question", answer_timeout.as_secs())?;
                writeln!(f, "• {rounds} questions total")?;
                writeln!(f, "• Faster answers = More points")?;
                writeln!(f, "• Get bonus points for answer streaks")?;
                write!(f, "Type !help for detailed rules")
            }
            Self::Question {
                round,
                rounds,
                category,
                text,
            } => write!(f, "❓ Question {round}/{rounds} [{category}]: {text}"),
            Self::Correct {
                player,
                answer,
                breakdown,
            } => {
                writeln!(f, "✅ {player} got it! The answer was: {answer}")?;
                if breakdown.multiplier() > 1.0 {
                    write!(
                        f,
                        "✨ {player} got {} points! (Base: {} × Bonus: {:.1})",
                        breakdown.points,
                        breakdown.base,
                        breakdown.multiplier()
                    )
                } else {
                    write!(f, "✨ {player} got {} points!", breakdown.points)
                }
            }
            Self::TimesUp { answer } => write!(f, "⏰ Time's up! The answer was: {answer}"),
            Self::Fact(fact) => write!(f, "💡 {fact}"),
            Self::FinalResults { standings, summary } => {
                writeln!(f, "🏁 Final Results:")?;
                if standings.items().is_empty() {
                    writeln!(f, "Nobody played this time.")?;
                }
                for (index, standing) in standings.items().iter().enumerate() {
                    writeln!(
                        f,
                        "{} {}: {} points ({} correct, best streak: {}x)",
                        medal(index),
                        standing.player,
                        standing.record.score,
                        standing.record.correct,
                        standing.record.best_streak
                    )?;
                }
                let hidden = standings.hidden();
                if hidden > 0 {
                    writeln!(f, "…and {hidden} more")?;
                }
                write!(
                    f,
                    "Rounds answered: {}, timed out: {}",
                    summary.answered, summary.timed_out
                )
            }
            Self::Leaderboard { title, profiles } => {
                if profiles.is_empty() {
                    return write!(f, "No scores yet! Start a quiz with !quiz");
                }
                write!(f, "{title}")?;
                for (index, profile) in profiles.iter().enumerate() {
                    write!(
                        f,
                        "\n{} {}: {} points ({} correct)",
                        medal(index),
                        profile.player,
                        profile.total_score,
                        profile.correct_answers
                    )?;
                }
                Ok(())
            }
            Self::Stats { player, profile } => match profile {
                Some(profile) => {
                    write!(
                        f,
                        "📊 Stats for {player}: {} total points, {} correct answers, \
                         {} games, Best streak: {}x",
                        profile.total_score,
                        profile.correct_answers,
                        profile.games_played,
                        profile.best_streak
                    )?;
                    if let Some(fastest) = profile.fastest {
                        write!(f, ", Best time: {:.1}s", fastest.as_secs_f64())?;
                    }
                    Ok(())
                }
                None => write!(f, "📊 No stats found for {player}"),
            },
            Self::Help {
                rounds,
                answer_timeout,
            } => {
                writeln!(f, "📚 QuizBot Commands & Rules:")?;
                writeln!(f, "!quiz - Start a new quiz game")?;
                writeln!(f, "!stats [nick] - View statistics")?;
                writeln!(f, "!leaderboard - Show top players")?;
                writeln!(f, "!stop - Stop current quiz (admin only)")?;
                writeln!(f, "How to Play:")?;
                writeln!(f, "• Answer questions directly in chat")?;
                writeln!(f, "• Faster answers earn more points")?;
                writeln!(f, "• Build streaks for bonus multipliers")?;
                writeln!(f, "• {} seconds per question", answer_timeout.as_secs())?;
                write!(f, "• {rounds} questions per game")
            }
            Self::Stopped { by } => write!(f, "🛑 Quiz stopped by {by}"),
            Self::SupplyFailed => write!(f, "⚠️ Could not find another question, ending the quiz"),
            Self::ShuttingDown => write!(f, "🛑 Quiz interrupted, the bot is shutting down"),
            Self::AlreadyActive => write!(f, "❌ A quiz is already in progress!"),
            Self::Unauthorized => write!(f, "❌ Only administrators can stop the quiz"),
            Self::NoActiveQuiz => write!(f, "❌ No quiz is running"),
            Self::StatsUnavailable => write!(f, "❌ Statistics are unavailable right now"),
        }
    }
}
