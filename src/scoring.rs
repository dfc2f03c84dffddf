//! Scoring and per-session standings
//!
//! Points for a correct answer start from a base that shrinks as the clock
//! runs down, capped by the difficulty of the round, and are then multiplied
//! by a streak bonus and a speed bonus. The [`Scoreboard`] keeps the running
//! records of every player who took part in a session.

use std::{collections::HashMap, time::Duration};

use itertools::Itertools;
use serde::Serialize;

use crate::{
    TruncatedVec,
    config::{BonusRules, BonusTier, MAX_BASE_POINTS},
    ids::PlayerId,
    question::Difficulty,
};

/// Points awarded for one correct answer and how they were reached
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    /// Points before multipliers
    pub base: u64,
    /// Multiplier from the pre-answer streak
    pub streak_multiplier: f64,
    /// Multiplier from the time left on the clock
    pub speed_multiplier: f64,
    /// Final points, rounded down
    pub points: u64,
}

impl ScoreBreakdown {
    /// Combined multiplier applied to the base
    pub fn multiplier(&self) -> f64 {
        self.streak_multiplier * self.speed_multiplier
    }
}

/// Picks the multiplier of the highest tier whose threshold `value` reaches
///
/// Tiers do not stack. Without a reached tier the multiplier is 1.
pub fn tier_multiplier(tiers: &[BonusTier], value: u64) -> f64 {
    tiers
        .iter()
        .filter(|tier| value >= tier.threshold)
        .max_by_key(|tier| tier.threshold)
        .map_or(1.0, |tier| tier.multiplier)
}

impl BonusRules {
    /// Base points for an answer given after `elapsed` out of `limit`
    ///
    /// Answers at or after the limit earn nothing. Otherwise the score starts
    /// at ten, decreases linearly with elapsed time, never drops below one
    /// and is capped by the round's difficulty.
    pub fn base_points(&self, elapsed: Duration, limit: Duration, difficulty: Difficulty) -> u64 {
        if limit.is_zero() || elapsed >= limit {
            return 0;
        }

        let remaining_ratio = 1.0 - elapsed.as_secs_f64() / limit.as_secs_f64();
        let time_points = ((MAX_BASE_POINTS as f64 * remaining_ratio).floor() as u64).max(1);

        time_points.min(self.base_caps[difficulty].max(1))
    }

    /// Scores a correct answer
    ///
    /// `streak_before` is the player's streak before this answer counted and
    /// `round` is the one-based round number.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use std::time::Duration;
    /// use quizbot::config::BonusRules;
    ///
    /// let rules = BonusRules::default();
    /// let fast = rules.score(Duration::ZERO, Duration::from_secs(30), 0, 9);
    /// let slow = rules.score(Duration::from_secs(29), Duration::from_secs(30), 0, 9);
    /// assert!(fast.points > slow.points);
    /// ```
    pub fn score(
        &self,
        elapsed: Duration,
        limit: Duration,
        streak_before: u32,
        round: u32,
    ) -> ScoreBreakdown {
        let base = self.base_points(elapsed, limit, Difficulty::for_round(round));
        let remaining = limit.saturating_sub(elapsed).as_secs();

        let streak_multiplier = tier_multiplier(&self.streak, u64::from(streak_before));
        let speed_multiplier = tier_multiplier(&self.speed, remaining);

        let points = (base as f64 * streak_multiplier * speed_multiplier).floor() as u64;

        ScoreBreakdown {
            base,
            streak_multiplier,
            speed_multiplier,
            points,
        }
    }
}

/// Running totals of one player within a session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PlayerRecord {
    /// Points earned this session
    pub score: u64,
    /// Correct answers this session
    pub correct: u32,
    /// Consecutive correct answers up to now
    pub streak: u32,
    /// Longest streak reached this session
    pub best_streak: u32,
    /// Quickest correct answer
    pub fastest: Option<Duration>,
}

/// A player's place in the standings
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Standing {
    /// The player
    pub player: PlayerId,
    /// Their totals
    pub record: PlayerRecord,
}

/// What happened in one round
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RoundResult {
    /// A player claimed the round
    Answered {
        /// One-based round number
        round: u32,
        /// Who answered
        player: PlayerId,
        /// Points they earned
        points: u64,
        /// Time taken to answer
        elapsed: Duration,
    },
    /// Nobody answered before the limit
    TimedOut {
        /// One-based round number
        round: u32,
    },
}

/// Counts of round outcomes over a session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RoundSummary {
    /// Rounds someone answered correctly
    pub answered: usize,
    /// Rounds that ran out of time
    pub timed_out: usize,
}

/// Player records and round log of one session
#[derive(Debug, Default)]
pub struct Scoreboard {
    records: HashMap<PlayerId, PlayerRecord>,
    rounds: Vec<RoundResult>,
    final_standings: once_cell_serde::sync::OnceCell<Vec<Standing>>,
}

impl Scoreboard {
    /// Creates an empty scoreboard
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a player on their first attempt
    pub fn record_attempt(&mut self, player: &PlayerId) {
        self.records.entry(player.clone()).or_default();
    }

    /// Credits a correct answer and returns the points awarded
    pub fn record_correct(
        &mut self,
        player: &PlayerId,
        round: u32,
        elapsed: Duration,
        limit: Duration,
        rules: &BonusRules,
    ) -> ScoreBreakdown {
        let record = self.records.entry(player.clone()).or_default();

        let breakdown = rules.score(elapsed, limit, record.streak, round);

        record.score += breakdown.points;
        record.correct += 1;
        record.streak += 1;
        record.best_streak = record.best_streak.max(record.streak);
        record.fastest = Some(record.fastest.map_or(elapsed, |fastest| fastest.min(elapsed)));

        self.rounds.push(RoundResult::Answered {
            round,
            player: player.clone(),
            points: breakdown.points,
            elapsed,
        });

        breakdown
    }

    /// Breaks the streak of a player who answered wrong
    pub fn record_miss(&mut self, player: &PlayerId) {
        self.records.entry(player.clone()).or_default().streak = 0;
    }

    /// Logs a round nobody answered and resets every streak
    pub fn record_timeout(&mut self, round: u32) {
        for record in self.records.values_mut() {
            record.streak = 0;
        }

        self.rounds.push(RoundResult::TimedOut { round });
    }

    /// Returns the record of a player, if they took part
    pub fn record(&self, player: &PlayerId) -> Option<&PlayerRecord> {
        self.records.get(player)
    }

    /// Number of players who took part
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether nobody took part
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The round log in order
    pub fn rounds(&self) -> &[RoundResult] {
        &self.rounds
    }

    /// Counts answered and timed out rounds
    pub fn summary(&self) -> RoundSummary {
        self.rounds
            .iter()
            .fold(RoundSummary::default(), |mut summary, round| {
                match round {
                    RoundResult::Answered { .. } => summary.answered += 1,
                    RoundResult::TimedOut { .. } => summary.timed_out += 1,
                }
                summary
            })
    }

    /// Current standings, best first
    ///
    /// Ordered by score, then correct answers, then nickname.
    pub fn standings(&self) -> Vec<Standing> {
        self.records
            .iter()
            .sorted_by(|(a_player, a), (b_player, b)| {
                b.score
                    .cmp(&a.score)
                    .then(b.correct.cmp(&a.correct))
                    .then(a_player.cmp(b_player))
            })
            .map(|(player, record)| Standing {
                player: player.clone(),
                record: *record,
            })
            .collect_vec()
    }

    /// Standings frozen at the first call
    ///
    /// Called once the session is over, later updates are not reflected.
    pub fn final_standings(&self) -> &[Standing] {
        self.final_standings.get_or_init(|| self.standings())
    }

    /// The best `limit` final standings with the full player count
    pub fn top(&self, limit: usize) -> TruncatedVec<Standing> {
        let standings = self.final_standings();
        TruncatedVec::new(standings.iter().cloned(), limit, standings.len())
    }
}
