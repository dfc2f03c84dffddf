//! Trivia questions
//!
//! A [`Question`] can only be built through [`Question::new`], which enforces
//! the structural invariants every asked question must satisfy. Candidates
//! arrive from the question-generation provider as loosely shaped
//! [`GeneratedQuestion`] values and are turned into questions (or rejected)
//! by the supplier.

use enum_map::Enum;
use garde::Validate;
use heck::ToTitleCase;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{answer::normalize, constants::question::*, error::Rejection};

/// Difficulty tier of a round
///
/// Sessions get harder as they progress: the tier only depends on the round
/// number and decides both the hint sent to the provider and the base point
/// cap applied by the score engine.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Enum, Serialize, Deserialize, derive_more::Display,
)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    /// Rounds 1 to 3
    #[display("easy")]
    Easy,
    /// Rounds 4 to 7
    #[display("medium")]
    Medium,
    /// Round 8 onwards
    #[display("hard")]
    Hard,
}

impl Difficulty {
    /// Returns the tier of a (1-indexed) round number
    pub fn for_round(round: u32) -> Self {
        match round {
            0..=3 => Self::Easy,
            4..=7 => Self::Medium,
            _ => Self::Hard,
        }
    }
}

/// Composite identity of a question within a session
///
/// Built from the normalized question text and normalized primary answer, so
/// cosmetic differences in casing, spacing or punctuation do not let the same
/// question be asked twice.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub struct QuestionKey(String);

impl QuestionKey {
    /// Computes the key of a question text and answer pair
    pub fn new(text: &str, answer: &str) -> Self {
        Self(format!("{}:{}", normalize(text), normalize(answer)))
    }
}

/// A validated trivia question
#[derive(Debug, Clone, Serialize, Validate)]
pub struct Question {
    /// What is being asked
    #[garde(length(chars, min = MIN_TEXT_LENGTH, max = MAX_TEXT_LENGTH))]
    text: String,
    /// The canonical answer, revealed on timeout
    #[garde(length(chars, min = 1, max = MAX_ANSWER_LENGTH))]
    answer: String,
    /// Explicit synonyms accepted in place of the canonical answer
    #[garde(length(max = MAX_ALTERNATIVES),
        inner(length(chars, min = 1, max = MAX_ANSWER_LENGTH))
    )]
    alternatives: Vec<String>,
    /// Supporting fact shared once the round is over
    #[garde(length(chars, min = 1, max = MAX_FACT_LENGTH))]
    fact: String,
    /// Topic label shown with the question
    #[garde(length(chars, max = MAX_CATEGORY_LENGTH))]
    category: String,
    #[garde(skip)]
    difficulty: Difficulty,
}

/// Collapses runs of whitespace and trims both ends
fn tidy(text: &str) -> String {
    text.split_whitespace().join(" ")
}

/// Title-cases each word of a label, leaving symbols such as `&` in place
fn title_case(label: &str) -> String {
    label
        .split_whitespace()
        .map(|word| {
            if word.chars().any(char::is_alphanumeric) {
                word.to_title_case()
            } else {
                word.to_owned()
            }
        })
        .join(" ")
}

impl Question {
    /// Builds a question from a generated candidate
    ///
    /// Text fields are tidied (trimmed, inner whitespace collapsed) before the
    /// checks run. Blank alternatives are dropped.
    ///
    /// # Errors
    ///
    /// Returns a [`Rejection`] when a required field is blank, the question
    /// does not end with a question mark, the answer has more than
    /// [`MAX_ANSWER_WORDS`] words, or a length bound is violated.
    pub fn new(candidate: GeneratedQuestion, difficulty: Difficulty) -> Result<Self, Rejection> {
        let text = tidy(&candidate.question);
        let answer = tidy(&candidate.answer);
        let fact = tidy(&candidate.fact);

        if text.is_empty() {
            return Err(Rejection::Empty("question"));
        }
        if answer.is_empty() {
            return Err(Rejection::Empty("answer"));
        }
        if fact.is_empty() {
            return Err(Rejection::Empty("fact"));
        }
        if !text.ends_with('?') {
            return Err(Rejection::Unterminated);
        }

        let words = answer.split(' ').count();
        if words > MAX_ANSWER_WORDS {
            return Err(Rejection::AnswerTooLong(words));
        }

        let question = Self {
            text,
            answer,
            alternatives: candidate
                .alternatives
                .iter()
                .map(|alternative| tidy(alternative))
                .filter(|alternative| !alternative.is_empty())
                .unique()
                .collect(),
            fact,
            category: candidate
                .category
                .as_deref()
                .map(title_case)
                .filter(|category| !category.is_empty())
                .unwrap_or_else(|| "General".to_owned()),
            difficulty,
        };

        question
            .validate()
            .map_err(|report| Rejection::Invalid(report.to_string()))?;

        Ok(question)
    }

    /// The question text
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The canonical answer
    pub fn answer(&self) -> &str {
        &self.answer
    }

    /// Explicitly accepted alternative answers
    pub fn alternatives(&self) -> &[String] {
        &self.alternatives
    }

    /// The supporting fact
    pub fn fact(&self) -> &str {
        &self.fact
    }

    /// The category label
    pub fn category(&self) -> &str {
        &self.category
    }

    /// The difficulty tier the question was requested for
    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    /// The de-duplication key of this question
    pub fn key(&self) -> QuestionKey {
        QuestionKey::new(&self.text, &self.answer)
    }
}

/// Hint sent to the question-generation provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationRequest {
    /// Topic the question should be about
    pub category: String,
    /// How hard the question should be
    pub difficulty: Difficulty,
}

/// A question candidate as returned by the provider, not yet validated
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedQuestion {
    /// Question text
    pub question: String,
    /// Primary answer
    pub answer: String,
    /// Optional synonyms of the answer
    #[serde(default)]
    pub alternatives: Vec<String>,
    /// Supporting fact
    #[serde(default, alias = "fun_fact")]
    pub fact: String,
    /// Optional topic label
    #[serde(default)]
    pub category: Option<String>,
}

impl GeneratedQuestion {
    /// Parses a labelled text completion
    ///
    /// Text-generation providers are prompted to answer in the form
    ///
    /// ```text
    /// Question: What force pulls objects towards Earth?
    /// Answer: gravity
    /// Fun Fact: Gravity keeps planets in orbit.
    /// ```
    ///
    /// Labels are matched case-insensitively and may appear on one line or
    /// several. An optional `Alternatives:` label holds a comma-separated list.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::ProviderError::Malformed`] when the question or
    /// answer label is missing.
    pub fn parse_completion(content: &str) -> Result<Self, crate::error::ProviderError> {
        const LABELS: [&str; 4] = ["question:", "answer:", "fun fact:", "alternatives:"];

        let lower = content.to_ascii_lowercase();
        let positions = LABELS
            .iter()
            .filter_map(|label| lower.find(label).map(|at| (at, *label)))
            .sorted()
            .collect_vec();

        let field = |label: &str| -> Option<String> {
            let index = positions.iter().position(|(_, l)| *l == label)?;
            let start = positions[index].0 + label.len();
            let end = positions
                .get(index + 1)
                .map_or(content.len(), |(next, _)| *next);
            content.get(start..end).map(|value| tidy(value))
        };

        let malformed = |what: &str| crate::error::ProviderError::Malformed(format!("missing {what}"));

        Ok(Self {
            question: field("question:").ok_or_else(|| malformed("question"))?,
            answer: field("answer:").ok_or_else(|| malformed("answer"))?,
            alternatives: field("alternatives:")
                .map(|list| {
                    list.split(',')
                        .map(str::trim)
                        .filter(|alternative| !alternative.is_empty())
                        .map(str::to_owned)
                        .collect()
                })
                .unwrap_or_default(),
            fact: field("fun fact:").unwrap_or_default(),
            category: None,
        })
    }
}
