//! Deterministic text canonicalization
//!
//! [`normalize`] unifies typography and strips formatting noise without
//! touching word order. It is idempotent: running it twice yields the same
//! string as running it once.

use once_cell::sync::Lazy;
use regex::Regex;

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static RE_SPACE_BEFORE_PUNCT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+([,.;:!?])").unwrap());
static RE_MISSING_SPACE_AFTER_PUNCT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([,;!?])(\p{L})").unwrap());
static RE_HONORIFIC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:mr|mrs|ms|miss|mx|dr|sir|madam|dame|lady|lord|prof|professor|capt|captain|sgt|sergeant|lt|col|rev)\b\.?",
    )
    .unwrap()
});

/// Punctuation that is collapsed when repeated (`!!!` becomes `!`)
const COLLAPSIBLE: &[char] = &['!', '?', ',', ';', ':'];

/// Punctuation dropped from the fingerprint view of a text
const SENTENCE_PUNCT: &[char] = &['.', ',', '!', '?', ';', ':'];

/// Canonicalize prose for fingerprinting.
///
/// 1. Curly quotes and guillemets become straight quotes, em/en dashes become
///    `-`, the ellipsis character becomes `...`.
/// 2. Markdown and structural punctuation (`` *_`~#>[](){}| ``) is removed.
/// 3. Whitespace runs collapse to one space, repeated punctuation collapses,
///    and spacing around punctuation is normalized.
pub fn normalize(text: &str) -> String {
    let mut unified = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}' | '\u{2039}' | '\u{203A}' => {
                unified.push('\'')
            }
            '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}' | '\u{00AB}' | '\u{00BB}' => {
                unified.push('"')
            }
            '\u{2014}' | '\u{2013}' | '\u{2012}' | '\u{2015}' => unified.push('-'),
            '\u{2026}' => unified.push_str("..."),
            '*' | '_' | '`' | '~' => {}
            '#' | '>' | '[' | ']' | '(' | ')' | '{' | '}' | '|' => unified.push(' '),
            other => unified.push(other),
        }
    }

    let collapsed = RE_WHITESPACE.replace_all(&unified, " ");
    let tightened = RE_SPACE_BEFORE_PUNCT.replace_all(collapsed.trim(), "$1");
    let deduped = collapse_repeated_punctuation(&tightened);
    let spaced = RE_MISSING_SPACE_AFTER_PUNCT.replace_all(&deduped, "$1 $2");

    spaced.trim().to_string()
}

/// Canonicalize a character name: honorifics removed, whitespace collapsed,
/// lowercased. `"Dr. Watson"` and `"watson"` normalize identically.
pub fn normalize_name(name: &str) -> String {
    let stripped = RE_HONORIFIC.replace_all(name, " ");
    RE_WHITESPACE
        .replace_all(stripped.trim(), " ")
        .trim()
        .to_lowercase()
}

/// Lowercased, punctuation-free view of already normalized text.
///
/// Sentence punctuation carries no content for continuity purposes, so
/// `"Alice walked in."` and `"Alice walked in!"` share a fingerprint text.
pub fn fingerprint_text(normalized: &str) -> String {
    let lowered: String = normalized
        .to_lowercase()
        .chars()
        .map(|c| if SENTENCE_PUNCT.contains(&c) { ' ' } else { c })
        .collect();
    RE_WHITESPACE.replace_all(lowered.trim(), " ").into_owned()
}

fn collapse_repeated_punctuation(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut previous: Option<char> = None;
    for ch in text.chars() {
        if COLLAPSIBLE.contains(&ch) && previous == Some(ch) {
            continue;
        }
        out.push(ch);
        previous = Some(ch);
    }
    out
}
