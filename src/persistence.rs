//! Cross-session player statistics
//!
//! Sessions only ever add to a player's profile, once, when they finish.
//! Reads serve the `!stats` and `!leaderboard` commands and the all-time
//! leaderboard printed after a quiz.

use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::{error::PersistenceError, ids::PlayerId, scoring::Standing};

/// What one finished session adds to a player's profile
#[serde_with::serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsUpdate {
    /// The player
    pub player: PlayerId,
    /// Points earned in the session
    pub points: u64,
    /// Correct answers given in the session
    pub correct: u32,
    /// Longest streak reached in the session
    pub best_streak: u32,
    /// Quickest correct answer in the session
    #[serde_as(as = "Option<serde_with::DurationSecondsWithFrac<f64>>")]
    pub fastest: Option<Duration>,
}

impl From<&Standing> for StatsUpdate {
    fn from(standing: &Standing) -> Self {
        Self {
            player: standing.player.clone(),
            points: standing.record.score,
            correct: standing.record.correct,
            best_streak: standing.record.best_streak,
            fastest: standing.record.fastest,
        }
    }
}

/// Lifetime totals of a player
#[serde_with::serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerProfile {
    /// The player
    pub player: PlayerId,
    /// Points earned over all sessions
    pub total_score: u64,
    /// Correct answers over all sessions
    pub correct_answers: u32,
    /// Sessions the player took part in
    pub games_played: u32,
    /// Longest streak ever reached
    pub best_streak: u32,
    /// Quickest correct answer ever given
    #[serde_as(as = "Option<serde_with::DurationSecondsWithFrac<f64>>")]
    pub fastest: Option<Duration>,
}

impl PlayerProfile {
    fn new(player: PlayerId) -> Self {
        Self {
            player,
            total_score: 0,
            correct_answers: 0,
            games_played: 0,
            best_streak: 0,
            fastest: None,
        }
    }

    /// Folds a session's results into the profile
    pub fn apply(&mut self, update: &StatsUpdate) {
        self.total_score += update.points;
        self.correct_answers += update.correct;
        self.games_played += 1;
        self.best_streak = self.best_streak.max(update.best_streak);
        self.fastest = match (self.fastest, update.fastest) {
            (Some(current), Some(new)) => Some(current.min(new)),
            (current, new) => current.or(new),
        };
    }
}

/// Store of player profiles
///
/// Failures are reported to the caller, which logs them and carries on.
#[async_trait]
pub trait Persistence: Send + Sync {
    /// Adds a finished session's results to a player's profile
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`] if the store rejects the write.
    async fn update_player_stats(&self, update: &StatsUpdate) -> Result<(), PersistenceError>;

    /// Returns up to `limit` profiles, highest total score first
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`] if the store cannot be read.
    async fn leaderboard(&self, limit: usize) -> Result<Vec<PlayerProfile>, PersistenceError>;

    /// Returns the profile of a player, if they ever played
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`] if the store cannot be read.
    async fn player_stats(
        &self,
        player: &PlayerId,
    ) -> Result<Option<PlayerProfile>, PersistenceError>;
}

/// In-memory profile store, lost when the process exits
#[derive(Debug, Default)]
pub struct MemoryStore {
    profiles: RwLock<HashMap<PlayerId, PlayerProfile>>,
}

impl MemoryStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding the given profiles
    pub fn with_profiles(profiles: impl IntoIterator<Item = PlayerProfile>) -> Self {
        Self {
            profiles: RwLock::new(
                profiles
                    .into_iter()
                    .map(|profile| (profile.player.clone(), profile))
                    .collect(),
            ),
        }
    }

    /// Serializes every profile as a JSON array
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::Failed`] if serialization fails.
    pub async fn to_json(&self) -> Result<String, PersistenceError> {
        let profiles = self.profiles.read().await;
        let ordered = profiles
            .values()
            .sorted_by(|a, b| a.player.cmp(&b.player))
            .collect_vec();
        serde_json::to_string(&ordered).map_err(|error| PersistenceError::Failed(error.to_string()))
    }

    /// Reads a store back from [`MemoryStore::to_json`] output
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::Failed`] if the text is not a profile array.
    pub fn from_json(text: &str) -> Result<Self, PersistenceError> {
        let profiles: Vec<PlayerProfile> = serde_json::from_str(text)
            .map_err(|error| PersistenceError::Failed(error.to_string()))?;
        Ok(Self::with_profiles(profiles))
    }
}

#[async_trait]
impl Persistence for MemoryStore {
    async fn update_player_stats(&self, update: &StatsUpdate) -> Result<(), PersistenceError> {
        self.profiles
            .write()
            .await
            .entry(update.player.clone())
            .or_insert_with(|| PlayerProfile::new(update.player.clone()))
            .apply(update);
        Ok(())
    }

    async fn leaderboard(&self, limit: usize) -> Result<Vec<PlayerProfile>, PersistenceError> {
        Ok(self
            .profiles
            .read()
            .await
            .values()
            .sorted_by(|a, b| {
                b.total_score
                    .cmp(&a.total_score)
                    .then(b.correct_answers.cmp(&a.correct_answers))
                    .then(a.player.cmp(&b.player))
            })
            .take(limit)
            .cloned()
            .collect())
    }

    async fn player_stats(
        &self,
        player: &PlayerId,
    ) -> Result<Option<PlayerProfile>, PersistenceError> {
        Ok(self.profiles.read().await.get(player).cloned())
    }
}
