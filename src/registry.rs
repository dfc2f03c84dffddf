//! Session registry and command dispatch
//!
//! The [`Registry`] maps each channel to at most one live session. It owns no
//! game state itself: every session runs on its own task and the registry only
//! keeps the handle used to reach it. A session removes its own entry when it
//! finishes, so a channel is free for a new quiz as soon as the old one is
//! done.

use std::{collections::HashMap, sync::Arc};

use tokio::{
    sync::{Mutex, oneshot, watch},
    time::Instant,
};
use tracing::{debug, info, warn};

use crate::{
    announce::Announcement,
    commands::{Command, PREFIX},
    config::QuizConfig,
    error::QuizError,
    ids::{ChannelId, PlayerId, SessionId},
    persistence::Persistence,
    session::{AnswerOutcome, Event, FinishReason, Phase, Services, Session, SessionHandle},
    supplier::{FallbackPool, QuestionProvider},
    transport::Transport,
};

/// Live sessions by channel
#[derive(Debug, Default)]
pub(crate) struct Directory {
    sessions: Mutex<HashMap<ChannelId, SessionHandle>>,
}

impl Directory {
    async fn get(&self, channel: &ChannelId) -> Option<SessionHandle> {
        self.sessions.lock().await.get(channel).cloned()
    }

    /// Removes the entry of `channel` if it still belongs to session `id`
    pub(crate) async fn remove(&self, channel: &ChannelId, id: SessionId) {
        let mut sessions = self.sessions.lock().await;
        if sessions.get(channel).is_some_and(|handle| handle.id == id) {
            sessions.remove(channel);
        }
    }
}

/// Entry point of the quiz core
///
/// Cheap to clone, all clones share the same sessions.
#[derive(Debug, Clone)]
pub struct Registry {
    services: Services,
    directory: Arc<Directory>,
}

/// Waits until a session reports [`Phase::Finished`] or its task is gone
async fn finished(mut phase: watch::Receiver<Phase>) {
    phase.wait_for(|phase| *phase == Phase::Finished).await.ok();
}

impl Registry {
    /// Creates a registry with the built-in fallback questions
    pub fn new(
        config: QuizConfig,
        transport: Arc<dyn Transport>,
        persistence: Arc<dyn Persistence>,
        provider: Arc<dyn QuestionProvider>,
    ) -> Self {
        Self {
            services: Services {
                config: Arc::new(config),
                transport,
                persistence,
                provider,
                fallback: FallbackPool::default(),
            },
            directory: Arc::default(),
        }
    }

    /// Replaces the fallback questions new sessions start from
    #[must_use]
    pub fn with_fallback(mut self, fallback: FallbackPool) -> Self {
        self.services.fallback = fallback;
        self
    }

    /// The settings every session runs with
    pub fn config(&self) -> &QuizConfig {
        &self.services.config
    }

    /// Starts a quiz in `channel`
    ///
    /// # Errors
    ///
    /// Returns [`QuizError::AlreadyActive`] if the channel already has a live
    /// session.
    pub async fn start(
        &self,
        channel: &ChannelId,
        initiator: &PlayerId,
    ) -> Result<SessionId, QuizError> {
        let mut sessions = self.directory.sessions.lock().await;

        if sessions.contains_key(channel) {
            return Err(QuizError::AlreadyActive);
        }

        let (session, handle) =
            Session::new(channel.clone(), self.services.clone(), self.directory.clone());
        let id = handle.id;
        sessions.insert(channel.clone(), handle);
        drop(sessions);

        info!(%channel, %initiator, session = %id, "starting quiz");
        tokio::spawn(session.run());

        Ok(id)
    }

    /// Hands a possible answer to the channel's session
    ///
    /// The receive time is taken on entry, so time spent waiting for the
    /// session does not count against the player.
    ///
    /// # Errors
    ///
    /// Returns [`QuizError::NoActiveSession`] if the channel has no live
    /// session.
    pub async fn submit_answer(
        &self,
        channel: &ChannelId,
        player: &PlayerId,
        text: &str,
    ) -> Result<AnswerOutcome, QuizError> {
        let received = Instant::now();
        let handle = self
            .directory
            .get(channel)
            .await
            .ok_or(QuizError::NoActiveSession)?;

        let (reply, outcome) = oneshot::channel();
        let event = Event::Answer {
            player: player.clone(),
            text: text.to_owned(),
            received,
            reply,
        };

        if handle.events.send(event).is_err() {
            return Ok(AnswerOutcome::Ignored);
        }

        Ok(outcome.await.unwrap_or(AnswerOutcome::Ignored))
    }

    /// Ends the quiz in `channel` and waits until its results are out
    ///
    /// # Errors
    ///
    /// Returns [`QuizError::Unauthorized`] if `requester` is not an
    /// administrator, otherwise [`QuizError::NoActiveSession`] if the channel
    /// has no live session.
    pub async fn stop(&self, channel: &ChannelId, requester: &PlayerId) -> Result<(), QuizError> {
        if !self.services.config.is_admin(requester) {
            return Err(QuizError::Unauthorized);
        }

        let handle = self
            .directory
            .get(channel)
            .await
            .ok_or(QuizError::NoActiveSession)?;

        info!(%channel, %requester, "stopping quiz");
        handle
            .events
            .send(Event::Stop {
                reason: FinishReason::Stopped(requester.clone()),
            })
            .ok();

        finished(handle.phase).await;
        Ok(())
    }

    /// Current phase of the channel's session, `None` without one
    pub async fn phase(&self, channel: &ChannelId) -> Option<Phase> {
        let handle = self.directory.get(channel).await?;
        let phase = *handle.phase.borrow();
        Some(phase)
    }

    /// Subscribes to the phase changes of the channel's session
    pub async fn watch(&self, channel: &ChannelId) -> Option<watch::Receiver<Phase>> {
        Some(self.directory.get(channel).await?.phase)
    }

    /// Number of live sessions
    pub async fn len(&self) -> usize {
        self.directory.sessions.lock().await.len()
    }

    /// Whether no session is live
    pub async fn is_empty(&self) -> bool {
        self.directory.sessions.lock().await.is_empty()
    }

    /// Stops every live session and waits until their results are flushed
    pub async fn shutdown(&self) {
        let handles = self
            .directory
            .sessions
            .lock()
            .await
            .values()
            .cloned()
            .collect::<Vec<_>>();

        info!(sessions = handles.len(), "shutting down");

        for handle in &handles {
            handle
                .events
                .send(Event::Stop {
                    reason: FinishReason::Shutdown,
                })
                .ok();
        }

        for handle in handles {
            finished(handle.phase).await;
        }
    }

    async fn say(&self, channel: &ChannelId, announcement: &Announcement) {
        if let Err(error) = self
            .services
            .transport
            .send_lines(channel, &announcement.to_string())
            .await
        {
            warn!(%channel, %error, "failed to send message");
        }
    }

    /// Handles an inbound chat message
    ///
    /// Commands are dispatched and refusals announced in the channel.
    /// Unknown commands are ignored, any other text is treated as an answer.
    pub async fn on_message(&self, channel: &ChannelId, sender: &PlayerId, text: &str) {
        let Some(command) = Command::parse(text) else {
            if !text.trim_start().starts_with(PREFIX) {
                self.submit_answer(channel, sender, text).await.ok();
            }
            return;
        };

        debug!(%channel, %sender, ?command, "command received");

        match command {
            Command::Start => {
                if self.start(channel, sender).await.is_err() {
                    self.say(channel, &Announcement::AlreadyActive).await;
                }
            }
            Command::Stop => match self.stop(channel, sender).await {
                Ok(()) => {}
                Err(QuizError::Unauthorized) => {
                    self.say(channel, &Announcement::Unauthorized).await;
                }
                Err(_) => self.say(channel, &Announcement::NoActiveQuiz).await,
            },
            Command::Stats(nick) => {
                let player = nick.unwrap_or_else(|| sender.clone());
                match self.services.persistence.player_stats(&player).await {
                    Ok(profile) => {
                        self.say(channel, &Announcement::Stats { player, profile })
                            .await;
                    }
                    Err(error) => {
                        warn!(%channel, %player, %error, "failed to read player stats");
                        self.say(channel, &Announcement::StatsUnavailable).await;
                    }
                }
            }
            Command::Leaderboard => {
                match self
                    .services
                    .persistence
                    .leaderboard(self.services.config.standings_limit)
                    .await
                {
                    Ok(profiles) => {
                        self.say(
                            channel,
                            &Announcement::Leaderboard {
                                title: "🏆 Top Players:",
                                profiles,
                            },
                        )
                        .await;
                    }
                    Err(error) => {
                        warn!(%channel, %error, "failed to read leaderboard");
                        self.say(channel, &Announcement::StatsUnavailable).await;
                    }
                }
            }
            Command::Help => {
                self.say(
                    channel,
                    &Announcement::Help {
                        rounds: self.services.config.total_rounds,
                        answer_timeout: self.services.config.answer_timeout,
                    },
                )
                .await;
            }
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        config::SupplierConfig,
        persistence::MemoryStore,
        testing::{FailingStore, PanickingProvider, RecordingTransport, ScriptedProvider, candidate},
    };

    struct Harness {
        registry: Registry,
        transport: Arc<RecordingTransport>,
        store: Arc<MemoryStore>,
    }

    fn config(total_rounds: u32) -> QuizConfig {
        QuizConfig {
            total_rounds,
            admins: vec![PlayerId::from("Admin")],
            supplier: SupplierConfig {
                max_attempts: 1,
                ..SupplierConfig::default()
            },
            ..QuizConfig::default()
        }
    }

    fn harness(config: QuizConfig, provider: ScriptedProvider) -> Harness {
        let transport = Arc::new(RecordingTransport::default());
        let store = Arc::new(MemoryStore::new());
        let registry = Registry::new(
            config,
            transport.clone(),
            store.clone(),
            Arc::new(provider),
        );
        Harness {
            registry,
            transport,
            store,
        }
    }

    fn mercury() -> ScriptedProvider {
        ScriptedProvider::repeating(Ok(candidate(
            "Which metal is liquid at room temperature?",
            "mercury",
        )))
    }

    fn alice() -> PlayerId {
        PlayerId::from("alice")
    }

    #[tokio::test(start_paused = true)]
    async fn test_three_round_quiz() {
        let channel = ChannelId::from("#quiz");
        let h = harness(
            config(3),
            ScriptedProvider::new([
                Ok(candidate("Which planet do we call the Red Planet?", "mars")),
                Ok(candidate(
                    "Which gas do plants absorb from the air?",
                    "carbon dioxide",
                )),
                Ok(candidate(
                    "What is the hardest natural substance on Earth?",
                    "diamond",
                )),
            ]),
        );

        h.registry.start(&channel, &alice()).await.unwrap();
        let phase = h.registry.watch(&channel).await.unwrap();

        h.transport.wait_for(&channel, "Question 1/3").await;
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(
            h.registry
                .submit_answer(&channel, &alice(), "Mars")
                .await
                .unwrap(),
            AnswerOutcome::Correct { points: 7 }
        );

        h.transport.wait_for(&channel, "Question 2/3").await;
        h.transport.wait_for(&channel, "Time's up").await;

        h.transport.wait_for(&channel, "Question 3/3").await;
        tokio::time::sleep(Duration::from_secs(28)).await;
        assert_eq!(
            h.registry
                .submit_answer(&channel, &alice(), "diamond")
                .await
                .unwrap(),
            AnswerOutcome::Correct { points: 1 }
        );

        finished(phase).await;

        let lines = h.transport.lines(&channel);
        assert!(lines.contains(&"🥇 alice: 8 points (2 correct, best streak: 1x)".to_owned()));
        assert!(lines.contains(&"Rounds answered: 2, timed out: 1".to_owned()));
        assert!(lines.contains(&"🏆 All-Time Leaders:".to_owned()));

        let profile = h.store.player_stats(&alice()).await.unwrap().unwrap();
        assert_eq!(profile.total_score, 8);
        assert_eq!(profile.correct_answers, 2);
        assert_eq!(profile.best_streak, 1);
        assert_eq!(profile.games_played, 1);
        assert_eq!(profile.fastest, Some(Duration::from_secs(5)));

        assert_eq!(h.registry.phase(&channel).await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_session_per_channel() {
        let h = harness(config(3), mercury());
        let first = ChannelId::from("#first");
        let second = ChannelId::from("#second");

        h.registry.start(&first, &alice()).await.unwrap();
        assert_eq!(
            h.registry.start(&first, &alice()).await.unwrap_err(),
            QuizError::AlreadyActive
        );
        h.registry.start(&second, &alice()).await.unwrap();
        assert_eq!(h.registry.len().await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_channels_are_isolated() {
        let h = harness(config(3), mercury());
        let first = ChannelId::from("#first");
        let second = ChannelId::from("#second");

        h.registry.start(&first, &alice()).await.unwrap();
        h.registry.start(&second, &alice()).await.unwrap();
        h.transport.wait_for(&first, "Question 1/3").await;
        h.transport.wait_for(&second, "Question 1/3").await;

        assert!(matches!(
            h.registry
                .submit_answer(&first, &alice(), "mercury")
                .await
                .unwrap(),
            AnswerOutcome::Correct { .. }
        ));
        assert_eq!(h.registry.phase(&first).await, Some(Phase::Grading));
        assert_eq!(h.registry.phase(&second).await, Some(Phase::RoundActive));
    }

    #[tokio::test(start_paused = true)]
    async fn test_answer_without_session() {
        let h = harness(config(3), mercury());
        assert_eq!(
            h.registry
                .submit_answer(&ChannelId::from("#quiz"), &alice(), "mercury")
                .await
                .unwrap_err(),
            QuizError::NoActiveSession
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_resubmissions_score_once() {
        let h = harness(config(3), mercury());
        let channel = ChannelId::from("#quiz");
        let bob = PlayerId::from("bob");

        h.registry.start(&channel, &alice()).await.unwrap();
        h.transport.wait_for(&channel, "Question 1/3").await;

        let submit = |player: PlayerId, text: &'static str| {
            let registry = h.registry.clone();
            let channel = channel.clone();
            async move {
                registry
                    .submit_answer(&channel, &player, text)
                    .await
                    .unwrap()
            }
        };

        assert_eq!(submit(bob.clone(), "lead").await, AnswerOutcome::Incorrect);
        assert_eq!(submit(bob.clone(), "Lead").await, AnswerOutcome::Duplicate);
        assert!(matches!(
            submit(alice(), "mercury").await,
            AnswerOutcome::Correct { .. }
        ));
        assert_eq!(submit(alice(), "Mercury!").await, AnswerOutcome::Ignored);
        assert_eq!(submit(bob, "the mercury").await, AnswerOutcome::Ignored);

        let correct = h
            .transport
            .lines(&channel)
            .iter()
            .filter(|line| line.starts_with("✅"))
            .count();
        assert_eq!(correct, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_requires_admin() {
        let h = harness(config(3), mercury());
        let channel = ChannelId::from("#quiz");

        assert_eq!(
            h.registry.stop(&channel, &alice()).await.unwrap_err(),
            QuizError::Unauthorized
        );
        assert_eq!(
            h.registry
                .stop(&channel, &PlayerId::from("admin"))
                .await
                .unwrap_err(),
            QuizError::NoActiveSession
        );

        h.registry.start(&channel, &alice()).await.unwrap();
        h.transport.wait_for(&channel, "Question 1/3").await;
        h.registry
            .submit_answer(&channel, &alice(), "mercury")
            .await
            .unwrap();

        assert_eq!(
            h.registry.stop(&channel, &alice()).await.unwrap_err(),
            QuizError::Unauthorized
        );
        assert!(h.registry.phase(&channel).await.is_some());

        h.registry
            .stop(&channel, &PlayerId::from("admin"))
            .await
            .unwrap();

        assert_eq!(h.registry.phase(&channel).await, None);
        assert!(h.transport.contains(&channel, "🛑 Quiz stopped by admin"));
        assert_eq!(
            h.store
                .player_stats(&alice())
                .await
                .unwrap()
                .unwrap()
                .games_played,
            1
        );

        h.registry.start(&channel, &alice()).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_supply_exhaustion_ends_session() {
        let mut config = config(3);
        config.supplier.max_attempts = 0;
        let h = harness(config, ScriptedProvider::new([]));
        let registry = h.registry.clone().with_fallback(FallbackPool::new(vec![candidate(
            "Which planet do we live on?",
            "earth",
        )]));
        let channel = ChannelId::from("#quiz");

        registry.start(&channel, &alice()).await.unwrap();
        let phase = registry.watch(&channel).await.unwrap();
        finished(phase).await;

        assert!(h.transport.contains(&channel, "Question 1/3"));
        assert!(h.transport.contains(&channel, "Time's up! The answer was: earth"));
        assert!(h.transport.contains(&channel, "⚠️ Could not find another question"));
        assert!(h.transport.contains(&channel, "Rounds answered: 0, timed out: 1"));
        assert!(!h.transport.contains(&channel, "Question 2/3"));
        assert!(registry.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_crashing_provider_falls_back_then_finishes() {
        let transport = Arc::new(RecordingTransport::default());
        let registry = Registry::new(
            config(2),
            transport.clone(),
            Arc::new(MemoryStore::new()),
            Arc::new(PanickingProvider),
        )
        .with_fallback(FallbackPool::new(vec![candidate(
            "Which planet do we live on?",
            "earth",
        )]));
        let channel = ChannelId::from("#quiz");

        registry.start(&channel, &alice()).await.unwrap();
        let mut phase = registry.watch(&channel).await.unwrap();

        phase
            .wait_for(|phase| *phase == Phase::RoundActive)
            .await
            .unwrap();
        assert!(transport.contains(&channel, "Question 1/2"));
        assert!(transport.contains(&channel, "Which planet do we live on?"));

        finished(phase).await;
        assert!(transport.contains(&channel, "⚠️ Could not find another question"));
        assert!(registry.is_empty().await);
        registry.start(&channel, &alice()).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_flushes_every_session() {
        let h = harness(config(5), mercury());
        let first = ChannelId::from("#first");
        let second = ChannelId::from("#second");

        h.registry.start(&first, &alice()).await.unwrap();
        h.registry.start(&second, &alice()).await.unwrap();
        h.transport.wait_for(&first, "Question 1/5").await;
        h.registry
            .submit_answer(&first, &alice(), "mercury")
            .await
            .unwrap();

        h.registry.shutdown().await;

        assert!(h.registry.is_empty().await);
        assert!(h.transport.contains(&first, "shutting down"));
        assert!(h.transport.contains(&second, "shutting down"));
        let profile = h.store.player_stats(&alice()).await.unwrap().unwrap();
        assert_eq!(profile.correct_answers, 1);
        assert_eq!(profile.games_played, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistence_failures_do_not_end_session() {
        let transport = Arc::new(RecordingTransport::default());
        let registry = Registry::new(
            config(1),
            transport.clone(),
            Arc::new(FailingStore),
            Arc::new(mercury()),
        );
        let channel = ChannelId::from("#quiz");

        registry.on_message(&channel, &alice(), "!quiz").await;
        let phase = registry.watch(&channel).await.unwrap();
        transport.wait_for(&channel, "Question 1/1").await;
        registry.on_message(&channel, &alice(), "mercury").await;
        finished(phase).await;

        assert!(transport.contains(&channel, "🥇 alice"));

        registry.on_message(&channel, &alice(), "!stats").await;
        assert!(transport.contains(&channel, "❌ Statistics are unavailable right now"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_chat_commands() {
        let h = harness(config(3), mercury());
        let channel = ChannelId::from("#quiz");
        let bob = PlayerId::from("bob");

        h.registry.on_message(&channel, &bob, "!leaderboard").await;
        assert!(h.transport.contains(&channel, "No scores yet!"));

        h.registry.on_message(&channel, &bob, "!stats").await;
        assert!(h.transport.contains(&channel, "📊 No stats found for bob"));

        h.registry.on_message(&channel, &bob, "!help").await;
        assert!(h.transport.contains(&channel, "• 30 seconds per question"));

        h.registry.on_message(&channel, &bob, "!stop").await;
        assert!(h.transport.contains(&channel, "❌ Only administrators can stop the quiz"));

        h.registry.on_message(&channel, &bob, "!dance").await;
        h.registry.on_message(&channel, &bob, "hello").await;
        assert!(h.registry.is_empty().await);

        h.registry.on_message(&channel, &bob, "!quiz").await;
        h.registry.on_message(&channel, &bob, "!start").await;
        assert!(h.transport.contains(&channel, "❌ A quiz is already in progress!"));
        assert_eq!(h.registry.len().await, 1);

        h.registry
            .on_message(&channel, &PlayerId::from("ADMIN"), "!stop")
            .await;
        assert!(h.registry.is_empty().await);

        h.registry.on_message(&channel, &PlayerId::from("admin"), "!stop").await;
        assert!(h.transport.contains(&channel, "❌ No quiz is running"));
    }
}
