//! Entity extraction over raw scene text
//!
//! Linguistic analysis is a pluggable capability ([`LinguisticAnalyzer`]).
//! [`EntityExtractor`] wraps an optional analyzer and falls back to
//! capitalization/regex heuristics whenever the analyzer is absent, returns
//! an error, or panics. Extraction therefore never fails.

use crate::error::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, warn};

static RE_CAPITALIZED_RUN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b\p{Lu}[\p{L}'’-]*\p{L}(?:\s+\p{Lu}[\p{L}'’-]*\p{L})*").unwrap()
});
static RE_LOWER_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\p{Ll}{4,}\b").unwrap());
static RE_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\p{L}+\b").unwrap());
static RE_TEMPORAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:morning|afternoon|evening|night|midnight|noon|midday|dawn|dusk|sunrise|sunset|twilight|today|tonight|yesterday|tomorrow|monday|tuesday|wednesday|thursday|friday|saturday|sunday|january|february|march|april|may|june|july|august|september|october|november|december|\d{1,2}:\d{2}\s?(?:am|pm)?)\b",
    )
    .unwrap()
});

/// Entities found in a piece of text. Every list is deduplicated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entities {
    pub people: Vec<String>,
    pub nouns: Vec<String>,
    pub verbs: Vec<String>,
    pub temporal_markers: Vec<String>,
}

impl Entities {
    /// Remove duplicates, keeping first occurrences. Temporal markers are
    /// lowercased and sorted.
    pub fn deduplicated(self) -> Self {
        let mut temporal: Vec<String> = dedup(self.temporal_markers.into_iter().map(|t| t.to_lowercase()));
        temporal.sort();

        Self {
            people: dedup(self.people),
            nouns: dedup(self.nouns),
            verbs: dedup(self.verbs),
            temporal_markers: temporal,
        }
    }
}

/// A linguistic-analysis backend capable of tagging text
pub trait LinguisticAnalyzer: Send + Sync {
    /// Short backend name used in log lines
    fn name(&self) -> &str;

    /// Tag `text`, returning people, nouns, verbs and temporal markers
    fn analyze(&self, text: &str) -> Result<Entities>;
}

/// Capitalization and regex heuristics used when no analyzer is available.
///
/// - people: runs of capitalized words (each at least two characters, inner
///   capitals, apostrophes and hyphens allowed, possessive `'s` dropped)
/// - nouns: lowercase words of four or more letters
/// - verbs: none, there is no safe heuristic
/// - temporal markers: fixed vocabulary and `H:MM[am|pm]` times
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicExtractor;

impl HeuristicExtractor {
    pub fn extract(&self, text: &str) -> Entities {
        Entities {
            people: RE_CAPITALIZED_RUN
                .find_iter(text)
                .map(|m| clean_name(m.as_str()))
                .collect(),
            nouns: RE_LOWER_WORD
                .find_iter(text)
                .map(|m| m.as_str().to_string())
                .collect(),
            verbs: Vec::new(),
            temporal_markers: temporal_markers(text),
        }
        .deduplicated()
    }
}

/// Built-in lexicon tagger.
///
/// Recognizes verbs from a closed list of common narrative verbs plus
/// `-ed`/`-ing` inflections, filters function words out of nouns, and drops
/// sentence-initial function words from capitalized runs. A run made only of
/// temporal words is not a person, except that month and time-of-day words
/// which double as given names ("June", "Dawn") are kept unless they sit in
/// a date context such as "in June" or "May 5".
#[derive(Debug, Clone, Default)]
pub struct LexiconAnalyzer;

const FUNCTION_WORDS: &[&str] = &[
    "a", "about", "after", "again", "all", "also", "an", "and", "any", "are", "as", "at", "be",
    "because", "been", "before", "being", "both", "but", "by", "could", "did", "do", "does",
    "each", "even", "every", "for", "from", "had", "has", "have", "he", "her", "here", "hers",
    "him", "his", "how", "i", "if", "in", "into", "is", "it", "its", "just", "like", "more",
    "most", "my", "never", "no", "not", "now", "of", "on", "once", "only", "or", "other", "our",
    "out", "over", "she", "should", "so", "some", "still", "such", "than", "that", "the", "their",
    "them", "then", "there", "these", "they", "this", "those", "through", "to", "too", "under",
    "until", "up", "very", "was", "we", "were", "what", "when", "where", "which", "while", "who",
    "whom", "why", "will", "with", "without", "would", "yet", "you", "your",
];

/// Temporal words that are also common given names
const NAME_LIKE_TEMPORAL: &[&str] = &["april", "august", "dawn", "june", "may"];

/// Words that put a following month in a date context
const DATE_PREPOSITIONS: &[&str] = &[
    "by", "during", "early", "in", "last", "late", "next", "of", "on", "since", "until",
];

const COMMON_VERBS: &[&str] = &[
    "ask", "asks", "became", "become", "begin", "began", "bring", "brought", "call", "came",
    "come", "comes", "cried", "cry", "die", "died", "drew", "find", "finds", "found", "gave",
    "get", "gets", "give", "go", "goes", "gone", "got", "grab", "hear", "heard", "held", "hold",
    "keep", "kept", "kill", "knew", "know", "knows", "leave", "leaves", "left", "look", "looks",
    "lose", "lost", "made", "make", "makes", "meet", "meets", "met", "ran", "reach", "run",
    "runs", "said", "saw", "say", "says", "see", "sees", "seem", "seems", "sent", "sit", "sat",
    "speak", "spoke", "stand", "stood", "take", "takes", "told", "tell", "tells", "think",
    "thought", "took", "turn", "walk", "walks", "want", "went", "whisper", "write", "wrote",
];

impl LinguisticAnalyzer for LexiconAnalyzer {
    fn name(&self) -> &str {
        "lexicon"
    }

    fn analyze(&self, text: &str) -> Result<Entities> {
        let mut verbs = Vec::new();
        let mut nouns = Vec::new();

        for word in RE_WORD.find_iter(text).map(|m| m.as_str()) {
            if !word.chars().all(|c| c.is_lowercase()) {
                continue;
            }
            if FUNCTION_WORDS.contains(&word) {
                continue;
            }
            if is_verb(word) {
                verbs.push(word.to_string());
            } else if word.chars().count() >= 4 {
                nouns.push(word.to_string());
            }
        }

        let people = RE_CAPITALIZED_RUN
            .find_iter(text)
            .filter_map(|m| person_from_run(text, m))
            .collect();

        Ok(Entities {
            people,
            nouns,
            verbs,
            temporal_markers: temporal_markers(text),
        }
        .deduplicated())
    }
}

/// Entity extractor with pluggable analysis and heuristic fallback
#[derive(Clone)]
pub struct EntityExtractor {
    analyzer: Option<Arc<dyn LinguisticAnalyzer>>,
    fallback: HeuristicExtractor,
}

impl EntityExtractor {
    /// Extractor that only uses heuristics
    pub fn heuristic() -> Self {
        Self {
            analyzer: None,
            fallback: HeuristicExtractor,
        }
    }

    /// Extractor backed by the built-in [`LexiconAnalyzer`]
    pub fn lexicon() -> Self {
        Self::with_analyzer(Arc::new(LexiconAnalyzer))
    }

    /// Extractor backed by a custom analyzer
    pub fn with_analyzer(analyzer: Arc<dyn LinguisticAnalyzer>) -> Self {
        Self {
            analyzer: Some(analyzer),
            fallback: HeuristicExtractor,
        }
    }

    /// Whether a linguistic analyzer is configured
    pub fn has_analyzer(&self) -> bool {
        self.analyzer.is_some()
    }

    /// Extract entities from `text`. Never fails.
    pub fn extract(&self, text: &str) -> Entities {
        let Some(analyzer) = &self.analyzer else {
            return self.fallback.extract(text);
        };

        match panic::catch_unwind(AssertUnwindSafe(|| analyzer.analyze(text))) {
            Ok(Ok(entities)) => entities.deduplicated(),
            Ok(Err(e)) => {
                debug!("Analyzer '{}' failed, using heuristics: {}", analyzer.name(), e);
                self.fallback.extract(text)
            }
            Err(_) => {
                warn!("Analyzer '{}' panicked, using heuristics", analyzer.name());
                self.fallback.extract(text)
            }
        }
    }
}

impl Default for EntityExtractor {
    fn default() -> Self {
        Self::lexicon()
    }
}

impl std::fmt::Debug for EntityExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityExtractor")
            .field("analyzer", &self.analyzer.as_ref().map(|a| a.name().to_string()))
            .finish()
    }
}

fn temporal_markers(text: &str) -> Vec<String> {
    let mut markers: Vec<String> = RE_TEMPORAL
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase().replace(' ', ""))
        .collect();
    markers.sort();
    markers.dedup();
    markers
}

fn is_verb(word: &str) -> bool {
    if COMMON_VERBS.contains(&word) {
        return true;
    }
    let len = word.chars().count();
    (word.ends_with("ed") && len >= 5) || (word.ends_with("ing") && len >= 6)
}

/// Turn a capitalized run into a person name, or `None` when nothing
/// name-like is left after dropping leading function and temporal words.
fn person_from_run(text: &str, run: regex::Match<'_>) -> Option<String> {
    let words: Vec<&str> = run.as_str().split_whitespace().collect();
    let skipped = words
        .iter()
        .take_while(|w| FUNCTION_WORDS.contains(&w.to_lowercase().as_str()))
        .count();

    let mut preceding = if skipped > 0 {
        Some(words[skipped - 1].to_lowercase())
    } else {
        RE_WORD
            .find_iter(&text[..run.start()])
            .last()
            .map(|m| m.as_str().to_lowercase())
    };
    let followed_by_digit = text[run.end()..]
        .trim_start()
        .starts_with(|c: char| c.is_ascii_digit());

    let mut name = &words[skipped..];
    while let Some((first, rest)) = name.split_first() {
        if !is_temporal_word(first) {
            break;
        }
        let lower = first.to_lowercase();
        let date_context = (rest.is_empty() && followed_by_digit)
            || preceding
                .as_deref()
                .is_some_and(|p| DATE_PREPOSITIONS.contains(&p));
        if NAME_LIKE_TEMPORAL.contains(&lower.as_str()) && !date_context {
            break;
        }
        preceding = Some(lower);
        name = rest;
    }

    if name.is_empty() {
        None
    } else {
        Some(clean_name(&name.join(" ")))
    }
}

fn is_temporal_word(word: &str) -> bool {
    RE_TEMPORAL
        .find(word)
        .is_some_and(|m| m.start() == 0 && m.end() == word.len())
}

/// Collapse whitespace and drop possessive `'s` from each word
fn clean_name(run: &str) -> String {
    run.split_whitespace()
        .map(|w| {
            let w = w.replace('’', "'");
            w.strip_suffix("'s").map(str::to_string).unwrap_or(w)
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn dedup<I: IntoIterator<Item = String>>(items: I) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}
