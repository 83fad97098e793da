//! Prohibited-term matching.
//!
//! Every term is compiled once per term-set version into regex sets per
//! [`MatchMode`]. Scanning a message is then one `is_match` call per set.

use std::fmt;
use std::str::FromStr;

use regex::{Regex, RegexSet, RegexSetBuilder};
use serde::Serialize;

use crate::error::{Result, WardenError};

/// Compiled size limit per regex set. Large word lists exceed the default.
const SET_SIZE_LIMIT: usize = 64 * (1 << 20);

/// Characters removed from text before a strict scan.
const PUNCTUATION: &str = r"[^\w\s]";

/// Separator run allowed inside digit-bearing terms in total mode.
const DIGIT_RUN: &str = "[0-9]*";

/// How a term has to appear in a message to count as a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Whole word, letters may be elongated ("baaad" matches "bad").
    Strict,
    /// Substring, letters may be elongated and separated by any
    /// non-letters ("b-a-d", "b a d", "b.a.d" all match "bad").
    Total,
}

impl MatchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Total => "total",
        }
    }
}

impl fmt::Display for MatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchMode {
    type Err = WardenError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "total" => Ok(Self::Total),
            other => Err(WardenError::Validation(format!(
                "Unknown match mode '{}', use strict or total",
                other
            ))),
        }
    }
}

/// Regex sets for one version of the term list.
///
/// Total mode scans a skeleton of the text instead of the text itself: the
/// letters only, or the letters and digits for terms that contain digits.
/// Separators are gone from the skeleton, so the patterns only have to
/// allow for elongation and stay as small as the strict ones.
#[derive(Debug)]
pub struct TermMatcher {
    strict: RegexSet,
    /// Total patterns for terms made of letters only.
    letters: RegexSet,
    /// Total patterns for terms that contain digits.
    alphanumeric: RegexSet,
    punctuation: Regex,
}

impl TermMatcher {
    /// Compile matchers for both modes.
    ///
    /// Terms that reduce to nothing under a mode (e.g. pure punctuation in
    /// strict mode) are left out of that mode's set.
    pub fn compile(terms: &[String]) -> Result<Self> {
        let punctuation = Regex::new(PUNCTUATION)?;

        let strict: Vec<String> = terms
            .iter()
            .filter_map(|t| strict_pattern(t, &punctuation))
            .collect();

        let mut letters = Vec::new();
        let mut alphanumeric = Vec::new();
        for slots in terms.iter().filter_map(|t| total_slots(t)) {
            if slots.iter().all(|c| c.is_alphabetic()) {
                letters.push(slots.iter().copied().map(elongated).collect::<String>());
            } else {
                alphanumeric.extend(digit_pattern(&slots));
            }
        }

        Ok(Self {
            strict: build_set(&strict)?,
            letters: build_set(&letters)?,
            alphanumeric: build_set(&alphanumeric)?,
            punctuation,
        })
    }

    /// A matcher with no terms. Never matches.
    pub fn empty() -> Result<Self> {
        Self::compile(&[])
    }

    /// Check whether `text` contains any term under `mode`.
    pub fn matches(&self, text: &str, mode: MatchMode) -> bool {
        let lowered = text.to_lowercase();
        match mode {
            MatchMode::Strict => {
                let cleaned = self.punctuation.replace_all(&lowered, "");
                self.strict.is_match(&cleaned)
            }
            MatchMode::Total => {
                let skeleton: String = lowered.chars().filter(|c| c.is_alphabetic()).collect();
                if self.letters.is_match(&skeleton) {
                    return true;
                }
                if self.alphanumeric.is_empty() {
                    return false;
                }
                let skeleton: String = lowered.chars().filter(|c| c.is_alphanumeric()).collect();
                self.alphanumeric.is_match(&skeleton)
            }
        }
    }

    /// Number of compiled patterns per mode, `(strict, total)`.
    pub fn pattern_counts(&self) -> (usize, usize) {
        (
            self.strict.len(),
            self.letters.len() + self.alphanumeric.len(),
        )
    }
}

fn build_set(patterns: &[String]) -> Result<RegexSet> {
    Ok(RegexSetBuilder::new(patterns)
        .size_limit(SET_SIZE_LIMIT)
        .build()?)
}

/// One letter that may repeat: `(?:x)+`.
fn elongated(c: char) -> String {
    format!("(?:{})+", regex::escape(c.encode_utf8(&mut [0u8; 4])))
}

/// Word-boundary pattern with elongation per letter. Whitespace inside a
/// phrase matches any run of whitespace.
fn strict_pattern(term: &str, punctuation: &Regex) -> Option<String> {
    let lowered = term.to_lowercase();
    let cleaned = punctuation.replace_all(&lowered, "");

    let words: Vec<String> = cleaned
        .split_whitespace()
        .map(|word| word.chars().map(elongated).collect())
        .collect();

    if words.is_empty() {
        return None;
    }

    Some(format!(r"\b{}\b", words.join(r"\s+")))
}

/// Letters and digits of a term, lowercased. `None` if there are none.
fn total_slots(term: &str) -> Option<Vec<char>> {
    let slots: Vec<char> = term
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect();
    (!slots.is_empty()).then_some(slots)
}

/// Total pattern for a term with digits, run against the letters-and-digits
/// skeleton. Any non-letter separates letters, digits included, so a run of
/// ASCII digits may follow every slot but the last.
fn digit_pattern(slots: &[char]) -> Option<String> {
    let (last, init) = slots.split_last()?;

    let mut pattern: String = init
        .iter()
        .map(|c| {
            format!(
                "(?:{}{})+",
                regex::escape(c.encode_utf8(&mut [0u8; 4])),
                DIGIT_RUN
            )
        })
        .collect();
    pattern.push_str(&elongated(*last));
    Some(pattern)
}
