//! Question-generation providers

use async_trait::async_trait;

use crate::{
    error::ProviderError,
    question::{GeneratedQuestion, GenerationRequest},
};

/// Source of candidate questions, typically a text-generation service
///
/// Implementations are shared between sessions and must tolerate concurrent
/// calls. The supplier bounds every call with its own timeout, so an
/// implementation does not need one.
#[async_trait]
pub trait QuestionProvider: Send + Sync {
    /// Human-readable name for logging
    fn name(&self) -> &'static str;

    /// Produces one candidate for the requested topic and difficulty
    ///
    /// # Errors
    ///
    /// Returns a [`ProviderError`] when the service fails or answers with
    /// something that is not a question.
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GeneratedQuestion, ProviderError>;
}

/// A fixed list of candidates served in random order
///
/// Useful offline. Candidates go through the same validation as generated
/// ones, so a bank may safely contain entries that would be rejected.
#[derive(Debug, Clone, Default)]
pub struct QuestionBank {
    candidates: Vec<GeneratedQuestion>,
}

impl QuestionBank {
    /// Creates a bank from candidates
    pub fn new(candidates: Vec<GeneratedQuestion>) -> Self {
        Self { candidates }
    }

    /// Reads a bank from a JSON array of candidates
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error when the text is not such an array.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        Ok(Self::new(serde_json::from_str(text)?))
    }

    /// Number of candidates in the bank
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    /// Whether the bank has no candidates
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

#[async_trait]
impl QuestionProvider for QuestionBank {
    fn name(&self) -> &'static str {
        "question-bank"
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GeneratedQuestion, ProviderError> {
        if self.candidates.is_empty() {
            return Err(ProviderError::Unavailable("question bank is empty".into()));
        }

        let mut candidate = self.candidates[fastrand::usize(..self.candidates.len())].clone();
        candidate
            .category
            .get_or_insert_with(|| request.category.clone());

        Ok(candidate)
    }
}
