//! Test doubles for the quiz collaborators

use std::{
    collections::{HashMap, VecDeque},
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::{
    error::{PersistenceError, ProviderError, TransportError},
    ids::{ChannelId, PlayerId},
    persistence::{Persistence, PlayerProfile, StatsUpdate},
    question::{GeneratedQuestion, GenerationRequest},
    supplier::QuestionProvider,
    transport::Transport,
};

/// Records every line sent, per channel
#[derive(Debug, Default)]
pub struct RecordingTransport {
    lines: Mutex<HashMap<ChannelId, Vec<String>>>,
    fail_on: Mutex<Option<String>>,
    sent: Notify,
}

impl RecordingTransport {
    pub fn lines(&self, channel: &ChannelId) -> Vec<String> {
        self.lines
            .lock()
            .unwrap()
            .get(channel)
            .cloned()
            .unwrap_or_default()
    }

    /// Makes every line containing `needle` fail to send
    pub fn fail_on(&self, needle: &str) {
        *self.fail_on.lock().unwrap() = Some(needle.to_owned());
    }

    pub fn contains(&self, channel: &ChannelId, needle: &str) -> bool {
        self.lines(channel).iter().any(|line| line.contains(needle))
    }

    /// Waits until a line containing `needle` was sent to `channel`
    pub async fn wait_for(&self, channel: &ChannelId, needle: &str) {
        loop {
            let sent = self.sent.notified();
            if self.contains(channel, needle) {
                return;
            }
            sent.await;
        }
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send_text(&self, channel: &ChannelId, text: &str) -> Result<(), TransportError> {
        let failing = self
            .fail_on
            .lock()
            .unwrap()
            .as_deref()
            .is_some_and(|needle| text.contains(needle));
        if failing {
            return Err(TransportError {
                channel: channel.to_string(),
                reason: "connection reset".to_owned(),
            });
        }

        self.lines
            .lock()
            .unwrap()
            .entry(channel.clone())
            .or_default()
            .push(text.to_owned());
        self.sent.notify_waiters();

        Ok(())
    }
}

/// Replays a fixed list of provider results
#[derive(Debug)]
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Result<GeneratedQuestion, ProviderError>>>,
    repeat: Option<Result<GeneratedQuestion, ProviderError>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    /// Plays `script` once, then reports the provider as unavailable
    pub fn new(
        script: impl IntoIterator<Item = Result<GeneratedQuestion, ProviderError>>,
    ) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            repeat: None,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Returns the same result forever
    pub fn repeating(result: Result<GeneratedQuestion, ProviderError>) -> Self {
        Self {
            repeat: Some(result),
            ..Self::new([])
        }
    }

    /// Sleeps before every answer
    pub fn with_delay(self, delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..self
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QuestionProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn generate(
        &self,
        _request: &GenerationRequest,
    ) -> Result<GeneratedQuestion, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let next = self.script.lock().unwrap().pop_front();
        next.or_else(|| self.repeat.clone())
            .unwrap_or_else(|| Err(ProviderError::Unavailable("script finished".into())))
    }
}

/// A provider that panics on every request
#[derive(Debug, Default)]
pub struct PanickingProvider;

#[async_trait]
impl QuestionProvider for PanickingProvider {
    fn name(&self) -> &'static str {
        "panicking"
    }

    async fn generate(
        &self,
        _request: &GenerationRequest,
    ) -> Result<GeneratedQuestion, ProviderError> {
        panic!("provider crashed");
    }
}

/// A candidate with a fact and no category
pub fn candidate(question: &str, answer: &str) -> GeneratedQuestion {
    GeneratedQuestion {
        question: question.to_owned(),
        answer: answer.to_owned(),
        alternatives: vec![],
        fact: format!("The answer is {answer}."),
        category: None,
    }
}

/// A store that refuses every operation
#[derive(Debug, Default)]
pub struct FailingStore;

#[async_trait]
impl Persistence for FailingStore {
    async fn update_player_stats(&self, _update: &StatsUpdate) -> Result<(), PersistenceError> {
        Err(PersistenceError::Unavailable("disk full".into()))
    }

    async fn leaderboard(&self, _limit: usize) -> Result<Vec<PlayerProfile>, PersistenceError> {
        Err(PersistenceError::Unavailable("disk full".into()))
    }

    async fn player_stats(
        &self,
        _player: &PlayerId,
    ) -> Result<Option<PlayerProfile>, PersistenceError> {
        Err(PersistenceError::Unavailable("disk full".into()))
    }
}
