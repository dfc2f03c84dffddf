//! Answer evaluation
//!
//! Submitted answers are free text typed into a chat channel, so they are
//! normalized before comparison and then checked against a layered match
//! policy. The policy favors recall for well-known short answers while keeping
//! short strings away from the fuzzy rules.

use std::{collections::HashMap, sync::LazyLock};

use itertools::Itertools;
use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};

/// Minimum length of the shorter string before substring containment counts
const MIN_SUBSTRING_LENGTH: usize = 4;

/// Both strings must be longer than this before edit distance is consulted
const MIN_FUZZY_LENGTH: usize = 5;

/// Normalized Levenshtein similarity at or above which two answers match
const FUZZY_THRESHOLD: f64 = 0.85;

const ARTICLES: [&str; 3] = ["the ", "an ", "a "];

/// Groups of answers that mean the same thing
///
/// Entries are already normalized. A term appears in at most one group.
const SYNONYMS: &[&[&str]] = &[
    &["united states", "usa", "us", "united states of america", "america"],
    &["united kingdom", "uk", "britain", "great britain"],
    &["european union", "eu"],
    &["soviet union", "ussr", "soviet"],
    &["earth", "terra", "world", "globe"],
    &["sun", "sol"],
    &["moon", "luna"],
    &["automobile", "car"],
    &["television", "tv"],
    &["macintosh", "mac"],
    &["personal computer", "pc", "desktop computer"],
    &["world wide web", "www", "web"],
    &["telephone", "phone", "cellphone"],
    &["movie", "film", "motion picture"],
    &["airplane", "plane", "aircraft", "aeroplane"],
    &["bicycle", "bike"],
    &["internet", "net", "cyberspace"],
    &["doctor", "dr", "physician"],
    &["mathematics", "math", "maths"],
    &["laboratory", "lab"],
    &["photograph", "photo", "picture"],
    &["microphone", "mic"],
    &["application", "app"],
    &["advertisement", "ad", "advert", "commercial"],
    &["professor", "prof"],
    &["artificial intelligence", "ai"],
    &["virtual reality", "vr"],
    &["operating system", "os"],
    &["thomas edison", "edison", "thomas a edison"],
    &["leonardo da vinci", "da vinci", "davinci", "leonardo"],
    &["olympics", "olympic games"],
    &["world cup", "fifa world cup"],
    &["playstation", "sony playstation", "ps"],
    &["van gogh", "vincent van gogh"],
];

static SYNONYM_GROUPS: LazyLock<HashMap<&'static str, usize>> = LazyLock::new(|| {
    SYNONYMS
        .iter()
        .enumerate()
        .flat_map(|(group, terms)| terms.iter().map(move |term| (*term, group)))
        .collect()
});

/// Normalizes free text for comparison
///
/// Lowercases, folds diacritics away, drops punctuation other than hyphens,
/// collapses whitespace and finally strips leading articles. Normalizing a
/// normalized string changes nothing.
///
/// # Examples
///
/// ```rust
/// use quizbot::answer::normalize;
///
/// assert_eq!(normalize("  The   Pacific Ocean! "), "pacific ocean");
/// assert_eq!(normalize("\"The USA\""), "usa");
/// assert_eq!(normalize("Pelé"), "pele");
/// ```
pub fn normalize(text: &str) -> String {
    let cleaned: String = text
        .to_lowercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '-')
        .collect();
    let collapsed = cleaned.split_whitespace().join(" ");

    let mut rest = collapsed.as_str();
    while let Some(stripped) = ARTICLES
        .iter()
        .find_map(|article| rest.strip_prefix(article))
    {
        rest = stripped;
    }

    rest.to_owned()
}

/// Checks a submitted answer against the canonical answer and its alternatives
///
/// The rules are checked in order and the first hit wins:
///
/// 1. exact equality after normalization
/// 2. singular and plural forms of each other
/// 3. one contains the other, when the shorter has at least four characters
/// 4. edit-distance similarity of at least 0.85, when both exceed five characters
/// 5. equality with an alternative or a well-known synonym
///
/// # Examples
///
/// ```rust
/// use quizbot::answer::matches;
///
/// assert!(matches("the usa", "united states", &[]));
/// assert!(matches("cat", "cats", &[]));
/// assert!(!matches("ab", "abc", &[]));
/// ```
pub fn matches(submitted: &str, canonical: &str, alternatives: &[String]) -> bool {
    let submitted = normalize(submitted);
    let canonical = normalize(canonical);

    if submitted.is_empty() || canonical.is_empty() {
        return false;
    }

    submitted == canonical
        || plural_equivalent(&submitted, &canonical)
        || contains_either(&submitted, &canonical)
        || similar(&submitted, &canonical)
        || alternatives
            .iter()
            .map(|alternative| normalize(alternative))
            .any(|alternative| !alternative.is_empty() && alternative == submitted)
        || synonymous(&submitted, &canonical)
}

fn plural_equivalent(a: &str, b: &str) -> bool {
    if a.strip_suffix('s') == Some(b) || b.strip_suffix('s') == Some(a) {
        return true;
    }

    singular(a) == singular(b)
}

fn singular(word: &str) -> String {
    pluralizer::pluralize(word, 1, false)
}

fn contains_either(a: &str, b: &str) -> bool {
    let (shorter, longer) = if a.chars().count() <= b.chars().count() {
        (a, b)
    } else {
        (b, a)
    };

    shorter.chars().count() >= MIN_SUBSTRING_LENGTH && longer.contains(shorter)
}

fn similar(a: &str, b: &str) -> bool {
    a.chars().count() > MIN_FUZZY_LENGTH
        && b.chars().count() > MIN_FUZZY_LENGTH
        && strsim::normalized_levenshtein(a, b) >= FUZZY_THRESHOLD
}

fn synonymous(a: &str, b: &str) -> bool {
    match (SYNONYM_GROUPS.get(a), SYNONYM_GROUPS.get(b)) {
        (Some(left), Some(right)) => left == right,
        _ => false,
    }
}
