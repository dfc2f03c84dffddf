//! Question supply
//!
//! The [`Supplier`] asks a [`QuestionProvider`] for candidates a bounded number
//! of times, validates each one, and falls back to a local
//! [`FallbackPool`] when every attempt failed. Only when the pool has nothing
//! left that the session has not used does supply fail.
//!
//! The external part of the work is split off as an [`ExternalSource`] so a
//! session can run it outside its own event loop and apply the outcome once it
//! comes back.

mod fallback;
mod provider;
mod validation;

use std::{collections::HashSet, collections::VecDeque, sync::Arc};

use tracing::{debug, warn};

pub use fallback::FallbackPool;
pub use provider::{QuestionBank, QuestionProvider};
pub use validation::check_candidate;

use crate::{
    config::SupplierConfig,
    constants::supplier::RECENT_CATEGORY_WINDOW,
    error::{ProviderError, SupplyError},
    question::{Difficulty, GenerationRequest, Question, QuestionKey},
};

/// Topics requested from the provider, each with its subtopics
pub static CATEGORIES: [(&str, &[&str]); 8] = [
    (
        "Science",
        &[
            "Physics & Space",
            "Biology & Nature",
            "Chemistry",
            "Human Body",
            "Inventions",
            "Environmental Science",
            "Computing & Tech",
        ],
    ),
    (
        "History",
        &[
            "Ancient Civilizations",
            "Middle Ages",
            "Renaissance",
            "World Wars",
            "European History",
            "Asian History",
            "African History",
            "Important Discoveries",
        ],
    ),
    (
        "Geography",
        &[
            "Countries & Capitals",
            "Mountains & Rivers",
            "Oceans & Seas",
            "Landmarks",
            "Climate & Weather",
            "Natural Wonders",
            "World Cities",
        ],
    ),
    (
        "Arts & Culture",
        &[
            "Classical Music",
            "Painting & Sculpture",
            "Literature & Authors",
            "Theater & Dance",
            "Architecture",
            "Museums & Galleries",
        ],
    ),
    (
        "Entertainment",
        &[
            "Classic Movies",
            "Television Shows",
            "Video Games",
            "Comics & Animation",
            "Awards & Honors",
        ],
    ),
    (
        "Sports",
        &[
            "Olympic Sports",
            "Team Sports",
            "Individual Sports",
            "Sports History",
            "Championships",
            "Sports Records",
        ],
    ),
    (
        "Language & Literature",
        &[
            "Classic Books",
            "Poetry",
            "World Languages",
            "Etymology",
            "Literary Characters",
            "Mythology",
        ],
    ),
    (
        "STEM",
        &[
            "Mathematics",
            "Computer Science",
            "Engineering",
            "Scientific Method",
            "Scientists",
            "Technology History",
        ],
    ),
];

/// The provider side of the supplier, cheap to clone into a task
#[derive(Clone)]
pub struct ExternalSource {
    provider: Arc<dyn QuestionProvider>,
    config: SupplierConfig,
}

impl std::fmt::Debug for ExternalSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExternalSource")
            .field("provider", &self.provider.name())
            .field("config", &self.config)
            .finish()
    }
}

impl ExternalSource {
    /// Creates a source over a provider
    pub fn new(provider: Arc<dyn QuestionProvider>, config: SupplierConfig) -> Self {
        Self { provider, config }
    }

    /// Tries to obtain a valid, unused question from the provider
    ///
    /// Makes at most `max_attempts` requests, each bounded by
    /// `request_timeout`, sleeping `retry_delay` between failures. A
    /// candidate failing validation counts as a failed attempt. Returns `None`
    /// once every attempt failed.
    pub async fn fetch(
        &self,
        request: &GenerationRequest,
        excluded: &HashSet<QuestionKey>,
    ) -> Option<Question> {
        for attempt in 1..=self.config.max_attempts {
            if attempt > 1 {
                tokio::time::sleep(self.config.retry_delay).await;
            }

            let generated =
                tokio::time::timeout(self.config.request_timeout, self.provider.generate(request))
                    .await
                    .unwrap_or(Err(ProviderError::Timeout));

            let candidate = match generated {
                Ok(candidate) => candidate,
                Err(error) => {
                    warn!(
                        provider = self.provider.name(),
                        attempt,
                        %error,
                        "question request failed"
                    );
                    continue;
                }
            };

            match check_candidate(candidate, request.difficulty, excluded) {
                Ok(question) => return Some(question),
                Err(rejection) => {
                    debug!(
                        provider = self.provider.name(),
                        attempt,
                        %rejection,
                        "question candidate rejected"
                    );
                }
            }
        }

        None
    }
}

/// Produces the questions of one session
#[derive(Debug)]
pub struct Supplier {
    source: ExternalSource,
    fallback: FallbackPool,
    recent_categories: VecDeque<&'static str>,
}

impl Supplier {
    /// Creates a supplier with the built-in fallback pool
    pub fn new(provider: Arc<dyn QuestionProvider>, config: SupplierConfig) -> Self {
        Self::with_fallback(provider, config, FallbackPool::default())
    }

    /// Creates a supplier with a custom fallback pool
    pub fn with_fallback(
        provider: Arc<dyn QuestionProvider>,
        config: SupplierConfig,
        fallback: FallbackPool,
    ) -> Self {
        Self {
            source: ExternalSource::new(provider, config),
            fallback,
            recent_categories: VecDeque::with_capacity(RECENT_CATEGORY_WINDOW),
        }
    }

    /// A handle to the provider side, for running [`ExternalSource::fetch`] elsewhere
    pub fn source(&self) -> ExternalSource {
        self.source.clone()
    }

    /// Builds the provider request for a round
    ///
    /// The topic is picked at random among the categories not used in the
    /// last few rounds, with a random subtopic. The difficulty follows the
    /// round number.
    pub fn request_for(&mut self, round: u32) -> GenerationRequest {
        let available = CATEGORIES
            .iter()
            .filter(|(name, _)| !self.recent_categories.contains(name))
            .collect::<Vec<_>>();

        let (name, subtopics) = if available.is_empty() {
            CATEGORIES[fastrand::usize(..CATEGORIES.len())]
        } else {
            *available[fastrand::usize(..available.len())]
        };

        if self.recent_categories.len() == RECENT_CATEGORY_WINDOW {
            self.recent_categories.pop_front();
        }
        self.recent_categories.push_back(name);

        let category = match fastrand::choice(subtopics.iter()) {
            Some(subtopic) => format!("{name}: {subtopic}"),
            None => name.to_owned(),
        };

        GenerationRequest {
            category,
            difficulty: Difficulty::for_round(round),
        }
    }

    /// Draws from the fallback pool
    ///
    /// # Errors
    ///
    /// Returns [`SupplyError::Exhausted`] when every fallback question is in
    /// `excluded`.
    pub fn draw_fallback(
        &mut self,
        difficulty: Difficulty,
        excluded: &HashSet<QuestionKey>,
    ) -> Result<Question, SupplyError> {
        warn!(difficulty = %difficulty, "using fallback question");
        self.fallback.draw(difficulty, excluded)
    }

    /// Obtains the question for `round` that is not in `excluded`
    ///
    /// # Errors
    ///
    /// Returns [`SupplyError::Exhausted`] when the provider attempts and the
    /// fallback pool are both used up.
    pub async fn next(
        &mut self,
        round: u32,
        excluded: &HashSet<QuestionKey>,
    ) -> Result<Question, SupplyError> {
        let request = self.request_for(round);

        match self.source.fetch(&request, excluded).await {
            Some(question) => Ok(question),
            None => self.draw_fallback(request.difficulty, excluded),
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::testing::{ScriptedProvider, candidate};

    fn config(max_attempts: u32) -> SupplierConfig {
        SupplierConfig {
            max_attempts,
            retry_delay: Duration::from_secs(1),
            request_timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_valid_candidate_is_used() {
        let provider = Arc::new(ScriptedProvider::new([Ok(candidate(
            "Which metal is liquid at room temperature?",
            "mercury",
        ))]));
        let mut supplier = Supplier::new(provider.clone(), config(3));

        let question = supplier.next(1, &HashSet::new()).await.unwrap();
        assert_eq!(question.answer(), "mercury");
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_consume_attempts_then_fall_back() {
        let provider = Arc::new(ScriptedProvider::new([
            Err(ProviderError::Unavailable("down".into())),
            Ok(candidate("What is the most spoken language?", "english")),
            Err(ProviderError::Malformed("garbage".into())),
            Ok(candidate("Which metal is liquid at room temperature?", "mercury")),
        ]));
        let mut supplier = Supplier::new(provider.clone(), config(3));

        let start = tokio::time::Instant::now();
        let question = supplier.next(1, &HashSet::new()).await.unwrap();

        assert_eq!(provider.calls(), 3);
        assert_eq!(question.answer(), "gravity");
        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_provider_times_out() {
        let provider = Arc::new(
            ScriptedProvider::new([Ok(candidate(
                "Which metal is liquid at room temperature?",
                "mercury",
            ))])
            .with_delay(Duration::from_secs(60)),
        );
        let mut supplier = Supplier::new(provider.clone(), config(1));

        let start = tokio::time::Instant::now();
        let question = supplier.next(1, &HashSet::new()).await.unwrap();

        assert_eq!(question.answer(), "gravity");
        assert_eq!(start.elapsed(), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_attempts_goes_straight_to_fallback() {
        let provider = Arc::new(ScriptedProvider::new([]));
        let mut supplier = Supplier::new(provider.clone(), config(0));

        assert!(supplier.next(1, &HashSet::new()).await.is_ok());
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_repeats_a_question() {
        let repeated = candidate("Which metal is liquid at room temperature?", "mercury");
        let provider = Arc::new(ScriptedProvider::repeating(Ok(repeated)));
        let mut supplier = Supplier::new(provider, config(2));
        let mut used = HashSet::new();

        for round in 1..=10 {
            let question = supplier.next(round, &used).await.unwrap();
            assert!(used.insert(question.key()), "round {round} repeated a question");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion() {
        let provider = Arc::new(ScriptedProvider::new([]));
        let mut supplier = Supplier::with_fallback(
            provider,
            config(0),
            FallbackPool::new(vec![candidate("Which planet do we live on?", "earth")]),
        );
        let mut used = HashSet::new();

        let question = supplier.next(1, &used).await.unwrap();
        used.insert(question.key());

        assert_eq!(
            supplier.next(2, &used).await.unwrap_err(),
            SupplyError::Exhausted
        );
    }

    #[test]
    fn test_request_avoids_recent_categories() {
        let provider = Arc::new(ScriptedProvider::new([]));
        let mut supplier = Supplier::new(provider, config(0));

        let mut recent = VecDeque::new();
        for round in 1..=40 {
            let request = supplier.request_for(round);
            let name = request
                .category
                .split(':')
                .next()
                .unwrap_or_default()
                .to_owned();

            assert!(!recent.contains(&name), "{name} repeated too soon");
            if recent.len() == RECENT_CATEGORY_WINDOW {
                recent.pop_front();
            }
            recent.push_back(name);
            assert_eq!(request.difficulty, Difficulty::for_round(round));
        }
    }
}
