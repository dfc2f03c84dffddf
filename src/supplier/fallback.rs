//! Local fallback questions
//!
//! When the provider keeps failing, questions are drawn from a fixed pool in
//! round-robin order. The cursor wraps around, skipping questions the session
//! has already used.

use std::collections::HashSet;

use tracing::warn;

use crate::{
    error::SupplyError,
    question::{Difficulty, GeneratedQuestion, Question, QuestionKey},
};

struct Entry {
    question: &'static str,
    answer: &'static str,
    alternatives: &'static [&'static str],
    fact: &'static str,
    category: &'static str,
}

const BUILTIN: [Entry; 14] = [
    Entry {
        question: "What force pulls objects towards Earth?",
        answer: "gravity",
        alternatives: &[],
        fact: "Gravity is one of the four fundamental forces of nature and keeps planets in orbit.",
        category: "Science",
    },
    Entry {
        question: "Which gas do plants absorb from the air?",
        answer: "carbon dioxide",
        alternatives: &["co2"],
        fact: "Plants convert carbon dioxide into oxygen through photosynthesis.",
        category: "Science",
    },
    Entry {
        question: "What is Earth's largest ocean?",
        answer: "pacific",
        alternatives: &["pacific ocean"],
        fact: "The Pacific Ocean covers more area than all of Earth's continents combined.",
        category: "Geography",
    },
    Entry {
        question: "What organ filters blood in the human body?",
        answer: "kidneys",
        alternatives: &[],
        fact: "The kidneys filter about 120 to 150 quarts of blood every day.",
        category: "Science",
    },
    Entry {
        question: "Which planet is known as the Red Planet?",
        answer: "mars",
        alternatives: &[],
        fact: "Mars gets its red color from iron oxide on its surface.",
        category: "Science",
    },
    Entry {
        question: "Which desert is the largest hot desert?",
        answer: "sahara",
        alternatives: &[],
        fact: "The Sahara covers about 3.6 million square miles in North Africa.",
        category: "Geography",
    },
    Entry {
        question: "Which mountain range crosses the equator?",
        answer: "andes",
        alternatives: &[],
        fact: "The Andes run through seven countries in South America.",
        category: "Geography",
    },
    Entry {
        question: "How many sides does a triangle have?",
        answer: "three",
        alternatives: &["3"],
        fact: "A triangle is the simplest polygon and its angles sum to 180 degrees.",
        category: "STEM",
    },
    Entry {
        question: "What molecule do plants produce in photosynthesis?",
        answer: "oxygen",
        alternatives: &["o2"],
        fact: "Plants release oxygen as a byproduct of turning sunlight into energy.",
        category: "Science",
    },
    Entry {
        question: "Which ancient wonder was located in Alexandria, Egypt?",
        answer: "lighthouse",
        alternatives: &["pharos", "lighthouse of alexandria"],
        fact: "The Lighthouse of Alexandria stood for over a thousand years.",
        category: "History",
    },
    Entry {
        question: "What is the hardest natural substance on Earth?",
        answer: "diamond",
        alternatives: &[],
        fact: "Diamonds are made of carbon atoms arranged in a rigid lattice.",
        category: "Science",
    },
    Entry {
        question: "Which artist painted 'The Starry Night'?",
        answer: "van gogh",
        alternatives: &["vincent van gogh"],
        fact: "Van Gogh painted The Starry Night while staying at an asylum in Saint-Remy.",
        category: "Arts & Culture",
    },
    Entry {
        question: "In which sport would you perform a slam dunk?",
        answer: "basketball",
        alternatives: &[],
        fact: "A slam dunk is worth the same two points as any other close-range shot.",
        category: "Sports",
    },
    Entry {
        question: "What is the only mammal that cannot jump?",
        answer: "elephant",
        alternatives: &["elephants"],
        fact: "Elephants always keep at least one foot on the ground.",
        category: "Science",
    },
];

/// Rotating pool of local questions
#[derive(Debug, Clone)]
pub struct FallbackPool {
    entries: Vec<GeneratedQuestion>,
    cursor: usize,
}

impl Default for FallbackPool {
    fn default() -> Self {
        Self::new(
            BUILTIN
                .iter()
                .map(|entry| GeneratedQuestion {
                    question: entry.question.to_owned(),
                    answer: entry.answer.to_owned(),
                    alternatives: entry
                        .alternatives
                        .iter()
                        .map(|alternative| (*alternative).to_owned())
                        .collect(),
                    fact: entry.fact.to_owned(),
                    category: Some(entry.category.to_owned()),
                })
                .collect(),
        )
    }
}

impl FallbackPool {
    /// Creates a pool over the given entries, starting at the first
    pub fn new(entries: Vec<GeneratedQuestion>) -> Self {
        Self { entries, cursor: 0 }
    }

    /// Number of entries in the pool
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the pool has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Draws the next entry not in `excluded`
    ///
    /// Entries are visited once each, starting at the cursor. The cursor moves
    /// just past the entry returned.
    ///
    /// # Errors
    ///
    /// Returns [`SupplyError::Exhausted`] when every entry is excluded.
    pub fn draw(
        &mut self,
        difficulty: Difficulty,
        excluded: &HashSet<QuestionKey>,
    ) -> Result<Question, SupplyError> {
        let len = self.entries.len();

        for offset in 0..len {
            let index = (self.cursor + offset) % len;

            let question = match Question::new(self.entries[index].clone(), difficulty) {
                Ok(question) => question,
                Err(rejection) => {
                    warn!(index, %rejection, "skipping invalid fallback question");
                    continue;
                }
            };

            if !excluded.contains(&question.key()) {
                self.cursor = (index + 1) % len;
                return Ok(question);
            }
        }

        Err(SupplyError::Exhausted)
    }
}
