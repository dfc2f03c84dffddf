//! Content rules for generated questions
//!
//! [`Question::new`] already enforces the structural rules. On top of that a
//! generated question must be new to the session and must avoid vague or
//! technical vocabulary, dates, links and inappropriate content.

use std::collections::HashSet;

use rustrict::CensorStr;

use crate::{
    error::Rejection,
    question::{Difficulty, GeneratedQuestion, Question, QuestionKey},
};

/// Words that make a question open to debate
const AMBIGUOUS_TERMS: [&str; 16] = [
    "most",
    "best",
    "first",
    "many",
    "several",
    "some",
    "few",
    "often",
    "usually",
    "typically",
    "recently",
    "current",
    "latest",
    "modern",
    "popular",
    "famous",
];

/// Words that make a question too technical for casual play
const COMPLEX_TERMS: [&str; 20] = [
    "genome",
    "algorithm",
    "quantum",
    "molecular",
    "theorem",
    "coefficient",
    "synthesis",
    "paradigm",
    "pursuant",
    "infrastructure",
    "implementation",
    "methodology",
    "heterogeneous",
    "apparatus",
    "nomenclature",
    "derivative",
    "manifold",
    "epistemology",
    "optimization",
    "polymorphic",
];

const BANNED_CHARACTERS: [char; 6] = ['@', '#', '$', '%', '&', '*'];

/// Years a question may not mention, answers tied to dates go stale
const YEARS: std::ops::RangeInclusive<u32> = 1000..=2099;

/// Turns a generated candidate into a question fit for this session
///
/// # Errors
///
/// Returns the [`Rejection`] of the first rule the candidate breaks.
pub fn check_candidate(
    candidate: GeneratedQuestion,
    difficulty: Difficulty,
    excluded: &HashSet<QuestionKey>,
) -> Result<Question, Rejection> {
    let question = Question::new(candidate, difficulty)?;

    if excluded.contains(&question.key()) {
        return Err(Rejection::Duplicate);
    }

    check_vocabulary(question.text())?;
    check_characters(question.text())?;
    check_characters(question.answer())?;

    if [question.text(), question.answer(), question.fact()]
        .iter()
        .any(|text| text.is_inappropriate())
    {
        return Err(Rejection::Inappropriate);
    }

    Ok(question)
}

fn check_vocabulary(text: &str) -> Result<(), Rejection> {
    let lower = text.to_lowercase();

    if lower.contains("http") || lower.contains("www.") {
        return Err(Rejection::Invalid("question contains a link".into()));
    }

    for word in lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
    {
        if AMBIGUOUS_TERMS.contains(&word) || COMPLEX_TERMS.contains(&word) {
            return Err(Rejection::DisallowedTerm(word.to_owned()));
        }

        if word.len() == 4
            && word
                .parse::<u32>()
                .is_ok_and(|number| YEARS.contains(&number))
        {
            return Err(Rejection::Invalid(format!("question mentions the year {word}")));
        }
    }

    Ok(())
}

fn check_characters(text: &str) -> Result<(), Rejection> {
    match text.chars().find(|c| BANNED_CHARACTERS.contains(c)) {
        Some(c) => Err(Rejection::Invalid(format!("contains {c:?}"))),
        None => Ok(()),
    }
}
