//! Prohibited word list with atomic runtime reload.
//!
//! The live [`TermSet`] sits behind an `Arc` that is swapped in one step, so a
//! scan that took a snapshot keeps using it even while a reload runs.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use crate::error::{Result, WardenError};
use crate::filter::{MatchMode, TermMatcher};

/// One immutable version of the prohibited-term list.
#[derive(Debug)]
pub struct TermSet {
    version: u64,
    terms: Vec<String>,
    matcher: TermMatcher,
}

impl TermSet {
    /// Compile a term set. Terms are expected to be normalized already.
    pub fn new(version: u64, terms: Vec<String>) -> Result<Self> {
        let matcher = TermMatcher::compile(&terms)?;
        Ok(Self {
            version,
            terms,
            matcher,
        })
    }

    /// Check whether a message contains any of the terms.
    pub fn matches(&self, text: &str, mode: MatchMode) -> bool {
        self.matcher.matches(text, mode)
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

/// Normalize raw term source content: one term per line, trimmed and
/// lower-cased, blank lines dropped.
pub fn parse_terms(content: &str) -> Vec<String> {
    content
        .lines()
        .map(|line| line.trim().to_lowercase())
        .filter(|line| !line.is_empty())
        .collect()
}

/// Read and normalize a term source file.
pub fn load_terms(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path).map_err(|e| WardenError::Load {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    Ok(parse_terms(&content))
}

/// The live word list, backed by a file.
pub struct WordList {
    source: PathBuf,
    current: RwLock<Arc<TermSet>>,
    last_version: AtomicU64,
}

impl WordList {
    /// Create a word list with an already compiled term set.
    pub fn new(source: impl Into<PathBuf>, terms: TermSet) -> Self {
        Self {
            source: source.into(),
            last_version: AtomicU64::new(terms.version()),
            current: RwLock::new(Arc::new(terms)),
        }
    }

    /// Load the word list from its source file.
    ///
    /// An unreadable source is not fatal at startup: the list starts empty
    /// and can be reloaded later.
    pub fn open(source: impl Into<PathBuf>) -> Result<Self> {
        let source = source.into();
        let terms = match load_terms(&source) {
            Ok(terms) => terms,
            Err(e) => {
                tracing::warn!(error = %e, "Starting with an empty word list");
                Vec::new()
            }
        };

        let set = TermSet::new(1, terms)?;
        tracing::info!(
            path = %source.display(),
            terms = set.len(),
            "Word list loaded"
        );

        Ok(Self::new(source, set))
    }

    /// The current term set. Callers scan against the returned snapshot.
    pub fn snapshot(&self) -> Result<Arc<TermSet>> {
        let current = self
            .current
            .read()
            .map_err(|_| WardenError::InternalState("word list lock poisoned".to_string()))?;
        Ok(Arc::clone(&current))
    }

    /// Re-read the source and replace the live set.
    ///
    /// Returns the new term count. On failure the previous set stays live.
    pub fn reload(&self) -> Result<usize> {
        let terms = load_terms(&self.source)?;
        self.replace(terms)
    }

    /// Replace the live set with `terms` in one step.
    pub fn replace(&self, terms: Vec<String>) -> Result<usize> {
        let next_version = self.last_version.fetch_add(1, Ordering::SeqCst) + 1;
        // Compile outside the lock so scans are never blocked on it.
        let set = Arc::new(TermSet::new(next_version, terms)?);
        let count = set.len();

        let mut current = self
            .current
            .write()
            .map_err(|_| WardenError::InternalState("word list lock poisoned".to_string()))?;
        // A slower concurrent replace must not overwrite a newer set.
        if current.version() > next_version {
            return Ok(count);
        }
        *current = set;

        tracing::info!(terms = count, version = next_version, "Word list replaced");
        Ok(count)
    }
}
