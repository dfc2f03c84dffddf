//! Quiz session state machine
//!
//! Each channel with a running quiz owns one [`Session`], run as a task that
//! consumes [`Event`]s from its inbox one at a time. Timers, the question
//! supplier and chat messages all feed the same inbox, so every state
//! transition happens on the session's own task and the first event to reach
//! a round decides it.
//!
//! Timers carry the round they were armed for and are cancelled as soon as a
//! round is claimed. A timer event that was already queued when its round was
//! claimed no longer matches the current phase or round and is dropped.

use std::{collections::HashSet, sync::Arc, time::Duration};

use tokio::{
    sync::{mpsc, oneshot, watch},
    task::AbortHandle,
    time::Instant,
};
use tracing::{debug, error, info, warn};

use crate::{
    announce::Announcement,
    answer,
    config::QuizConfig,
    constants::answer_text,
    error::SupplyError,
    ids::{ChannelId, PlayerId, SessionId},
    persistence::{Persistence, StatsUpdate},
    question::{Question, QuestionKey},
    registry::Directory,
    scoring::Scoreboard,
    supplier::{FallbackPool, QuestionProvider, Supplier},
    transport::Transport,
};

/// Lifecycle phase of a session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, derive_more::Display)]
pub enum Phase {
    /// Created, no round started yet
    #[default]
    Idle,
    /// Waiting for the supplier to produce the round's question
    RoundStarting,
    /// The question is out and answers are accepted
    RoundActive,
    /// The round was claimed, results are out and the next round is pending
    Grading,
    /// Deciding between the next round and the end of the quiz
    RoundEnding,
    /// Terminal, the session is gone from the registry
    Finished,
}

/// Why a session ended
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum FinishReason {
    /// Every round was played
    #[display("completed")]
    Completed,
    /// An administrator stopped the quiz
    #[display("stopped by {_0}")]
    Stopped(PlayerId),
    /// No unused question could be found
    #[display("questions exhausted")]
    SupplyExhausted,
    /// The process is shutting down
    #[display("shutdown")]
    Shutdown,
}

/// What became of a submitted answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerOutcome {
    /// Not considered, no round was accepting answers or the text was unusable
    Ignored,
    /// The player already tried this answer in this round
    Duplicate,
    /// Wrong answer, the player's streak is broken
    Incorrect,
    /// Right answer, the round is claimed
    Correct {
        /// Points awarded
        points: u64,
    },
}

/// Collaborators shared by every session
#[derive(Clone)]
pub struct Services {
    /// Settings
    pub config: Arc<QuizConfig>,
    /// Outbound chat
    pub transport: Arc<dyn Transport>,
    /// Player profiles
    pub persistence: Arc<dyn Persistence>,
    /// Question generation
    pub provider: Arc<dyn QuestionProvider>,
    /// Local questions each session starts from
    pub fallback: FallbackPool,
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services")
            .field("config", &self.config)
            .field("provider", &self.provider.name())
            .field("fallback", &self.fallback.len())
            .finish_non_exhaustive()
    }
}

/// Inputs of the session state machine
#[derive(Debug)]
pub(crate) enum Event {
    /// The supplier finished its external attempts for a round
    QuestionReady {
        round: u32,
        question: Option<Question>,
    },
    /// A chat message that may be an answer
    Answer {
        player: PlayerId,
        text: String,
        received: Instant,
        reply: oneshot::Sender<AnswerOutcome>,
    },
    /// The answer time of a round ran out
    Timeout { round: u32 },
    /// The pause after a graded round is over
    Advance { round: u32 },
    /// End the session now
    Stop { reason: FinishReason },
}

/// A background task of the session, aborted when dropped
#[derive(Debug)]
struct Task(AbortHandle);

impl Task {
    fn spawn(future: impl Future<Output = ()> + Send + 'static) -> Self {
        Self(tokio::spawn(future).abort_handle())
    }

    /// Sends `event` to the session after `delay`
    fn schedule(outbox: mpsc::UnboundedSender<Event>, event: Event, delay: Duration) -> Self {
        Self::spawn(async move {
            tokio::time::sleep(delay).await;
            outbox.send(event).ok();
        })
    }
}

impl Drop for Task {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// The registry's handle on a running session
#[derive(Debug, Clone)]
pub(crate) struct SessionHandle {
    pub(crate) id: SessionId,
    pub(crate) events: mpsc::UnboundedSender<Event>,
    pub(crate) phase: watch::Receiver<Phase>,
}

/// One channel's quiz
pub struct Session {
    id: SessionId,
    channel: ChannelId,
    services: Services,
    directory: Arc<Directory>,

    phase: Phase,
    phase_tx: watch::Sender<Phase>,
    inbox: mpsc::UnboundedReceiver<Event>,
    outbox: mpsc::UnboundedSender<Event>,

    round: u32,
    question: Option<Question>,
    round_started: Option<Instant>,
    used_questions: HashSet<QuestionKey>,
    attempted: HashSet<(PlayerId, String)>,
    timer: Option<Task>,
    fetch: Option<Task>,

    supplier: Supplier,
    scoreboard: Scoreboard,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("channel", &self.channel)
            .field("phase", &self.phase)
            .field("round", &self.round)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Creates an idle session and the handle the registry keeps
    pub(crate) fn new(
        channel: ChannelId,
        services: Services,
        directory: Arc<Directory>,
    ) -> (Self, SessionHandle) {
        let id = SessionId::new();
        let (outbox, inbox) = mpsc::unbounded_channel();
        let (phase_tx, phase_rx) = watch::channel(Phase::Idle);

        let supplier = Supplier::with_fallback(
            services.provider.clone(),
            services.config.supplier.clone(),
            services.fallback.clone(),
        );

        let handle = SessionHandle {
            id,
            events: outbox.clone(),
            phase: phase_rx,
        };

        let session = Self {
            id,
            channel,
            services,
            directory,
            phase: Phase::Idle,
            phase_tx,
            inbox,
            outbox,
            round: 0,
            question: None,
            round_started: None,
            used_questions: HashSet::new(),
            attempted: HashSet::new(),
            timer: None,
            fetch: None,
            supplier,
            scoreboard: Scoreboard::new(),
        };

        (session, handle)
    }

    /// Runs the session until it finishes
    pub(crate) async fn run(mut self) {
        info!(
            channel = %self.channel,
            session = %self.id,
            rounds = self.services.config.total_rounds,
            "quiz started"
        );

        self.say(&Announcement::Welcome {
            rounds: self.services.config.total_rounds,
            answer_timeout: self.services.config.answer_timeout,
        })
        .await;

        self.begin_round().await;

        while self.phase != Phase::Finished {
            let Some(event) = self.inbox.recv().await else {
                break;
            };
            self.handle(event).await;
        }
    }

    async fn handle(&mut self, event: Event) {
        match event {
            Event::QuestionReady { round, question } => {
                self.receive_question(round, question).await;
            }
            Event::Answer {
                player,
                text,
                received,
                reply,
            } => {
                let outcome = self.receive_answer(player, &text, received).await;
                reply.send(outcome).ok();
            }
            Event::Timeout { round } => self.receive_timeout(round).await,
            Event::Advance { round } => {
                if self.round == round && self.change_phase(Phase::Grading, Phase::RoundEnding) {
                    self.begin_round().await;
                } else {
                    debug!(channel = %self.channel, round, "stale advance dropped");
                }
            }
            Event::Stop { reason } => self.finish(reason).await,
        }
    }

    fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
        self.phase_tx.send_replace(phase);
    }

    /// Moves from `before` to `after`, returns false if not in `before`
    fn change_phase(&mut self, before: Phase, after: Phase) -> bool {
        if self.phase == before {
            self.set_phase(after);
            true
        } else {
            false
        }
    }

    async fn say(&self, announcement: &Announcement) {
        if let Err(error) = self
            .services
            .transport
            .send_lines(&self.channel, &announcement.to_string())
            .await
        {
            warn!(channel = %self.channel, %error, "failed to send message");
        }
    }

    /// Starts the next round, or finishes once the last one was played
    async fn begin_round(&mut self) {
        self.round += 1;

        if self.round > self.services.config.total_rounds {
            self.finish(FinishReason::Completed).await;
            return;
        }

        self.set_phase(Phase::RoundStarting);
        self.question = None;
        self.round_started = None;
        self.attempted.clear();

        let request = self.supplier.request_for(self.round);
        let source = self.supplier.source();
        let excluded = self.used_questions.clone();
        let outbox = self.outbox.clone();
        let round = self.round;

        debug!(channel = %self.channel, round, category = %request.category, "requesting question");

        let channel = self.channel.clone();
        self.fetch = Some(Task::spawn(async move {
            let fetch = tokio::spawn(async move { source.fetch(&request, &excluded).await });
            let _abort = Task(fetch.abort_handle());

            // a failed fetch still reports back so the round can fall back
            let question = fetch.await.unwrap_or_else(|error| {
                error!(%channel, round, %error, "question fetch failed");
                None
            });
            outbox.send(Event::QuestionReady { round, question }).ok();
        }));
    }

    async fn receive_question(&mut self, round: u32, question: Option<Question>) {
        if self.phase != Phase::RoundStarting || self.round != round {
            debug!(channel = %self.channel, round, "stale question dropped");
            return;
        }
        self.fetch = None;

        let difficulty = crate::question::Difficulty::for_round(round);
        let question = match question.filter(|q| !self.used_questions.contains(&q.key())) {
            Some(question) => Ok(question),
            None => self
                .supplier
                .draw_fallback(difficulty, &self.used_questions),
        };

        let question = match question {
            Ok(question) => question,
            Err(SupplyError::Exhausted) => {
                error!(channel = %self.channel, round, "no unused question left");
                self.say(&Announcement::SupplyFailed).await;
                self.finish(FinishReason::SupplyExhausted).await;
                return;
            }
        };

        self.used_questions.insert(question.key());

        self.say(&Announcement::Question {
            round,
            rounds: self.services.config.total_rounds,
            category: question.category().to_owned(),
            text: question.text().to_owned(),
        })
        .await;

        self.question = Some(question);
        self.round_started = Some(Instant::now());
        self.timer = Some(Task::schedule(
            self.outbox.clone(),
            Event::Timeout { round },
            self.services.config.answer_timeout,
        ));
        self.set_phase(Phase::RoundActive);
    }

    /// Closes the active round
    ///
    /// The pending timeout is cancelled before anything else happens, so a
    /// timeout can no longer act on this round.
    fn claim(&mut self) -> bool {
        if !self.change_phase(Phase::RoundActive, Phase::Grading) {
            return false;
        }
        self.timer = None;
        true
    }

    async fn receive_answer(
        &mut self,
        player: PlayerId,
        text: &str,
        received: Instant,
    ) -> AnswerOutcome {
        if self.phase != Phase::RoundActive {
            return AnswerOutcome::Ignored;
        }

        let (Some(question), Some(round_started)) = (&self.question, self.round_started) else {
            return AnswerOutcome::Ignored;
        };

        let limit = self.services.config.answer_timeout;
        let elapsed = received.saturating_duration_since(round_started);
        if elapsed >= limit {
            debug!(channel = %self.channel, %player, "late answer ignored");
            return AnswerOutcome::Ignored;
        }

        if text.chars().count() > answer_text::MAX_LENGTH {
            return AnswerOutcome::Ignored;
        }

        let normalized = answer::normalize(text);
        if normalized.is_empty() {
            return AnswerOutcome::Ignored;
        }

        if !self.attempted.insert((player.clone(), normalized)) {
            return AnswerOutcome::Duplicate;
        }

        self.scoreboard.record_attempt(&player);

        if !answer::matches(text, question.answer(), question.alternatives()) {
            self.scoreboard.record_miss(&player);
            return AnswerOutcome::Incorrect;
        }

        if !self.claim() {
            return AnswerOutcome::Ignored;
        }

        let Some(question) = self.question.take() else {
            return AnswerOutcome::Ignored;
        };

        let breakdown = self.scoreboard.record_correct(
            &player,
            self.round,
            elapsed,
            limit,
            &self.services.config.bonus,
        );

        info!(
            channel = %self.channel,
            round = self.round,
            %player,
            points = breakdown.points,
            elapsed_ms = elapsed.as_millis() as u64,
            "round answered"
        );

        self.say(&Announcement::Correct {
            player,
            answer: question.answer().to_owned(),
            breakdown,
        })
        .await;
        self.say(&Announcement::Fact(question.fact().to_owned())).await;

        self.schedule_advance();

        AnswerOutcome::Correct {
            points: breakdown.points,
        }
    }

    async fn receive_timeout(&mut self, round: u32) {
        if self.round != round || !self.claim() {
            debug!(channel = %self.channel, round, "stale timeout dropped");
            return;
        }

        self.scoreboard.record_timeout(round);
        info!(channel = %self.channel, round, "round timed out");

        if let Some(question) = self.question.take() {
            self.say(&Announcement::TimesUp {
                answer: question.answer().to_owned(),
            })
            .await;
            self.say(&Announcement::Fact(question.fact().to_owned())).await;
        }

        self.schedule_advance();
    }

    fn schedule_advance(&mut self) {
        self.timer = Some(Task::schedule(
            self.outbox.clone(),
            Event::Advance { round: self.round },
            self.services.config.question_delay,
        ));
    }

    /// Ends the session from any phase
    ///
    /// Results are announced and flushed to persistence before the session
    /// leaves the registry and reports [`Phase::Finished`].
    async fn finish(&mut self, reason: FinishReason) {
        if self.phase == Phase::Finished {
            return;
        }

        self.set_phase(Phase::RoundEnding);
        self.timer = None;
        self.fetch = None;

        match &reason {
            FinishReason::Stopped(by) => {
                self.say(&Announcement::Stopped { by: by.clone() }).await;
            }
            FinishReason::Shutdown => self.say(&Announcement::ShuttingDown).await,
            FinishReason::Completed | FinishReason::SupplyExhausted => {}
        }

        let config = self.services.config.clone();

        self.say(&Announcement::FinalResults {
            standings: self.scoreboard.top(config.standings_limit),
            summary: self.scoreboard.summary(),
        })
        .await;

        self.flush().await;

        match self
            .services
            .persistence
            .leaderboard(config.standings_limit)
            .await
        {
            Ok(profiles) if !profiles.is_empty() => {
                self.say(&Announcement::Leaderboard {
                    title: "🏆 All-Time Leaders:",
                    profiles,
                })
                .await;
            }
            Ok(_) => {}
            Err(error) => warn!(channel = %self.channel, %error, "failed to read leaderboard"),
        }

        self.directory.remove(&self.channel, self.id).await;

        info!(
            channel = %self.channel,
            session = %self.id,
            %reason,
            rounds = self.round.min(config.total_rounds),
            players = self.scoreboard.len(),
            "quiz finished"
        );

        self.set_phase(Phase::Finished);
    }

    /// Hands every player's session totals to persistence, once
    async fn flush(&self) {
        for standing in self.scoreboard.final_standings() {
            let update = StatsUpdate::from(standing);
            if let Err(error) = self.services.persistence.update_player_stats(&update).await {
                warn!(
                    channel = %self.channel,
                    player = %standing.player,
                    %error,
                    "failed to save player stats"
                );
            }
        }
    }
}
