use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::error::{QuarkError, Result};

/// A word list used by the spell-check pass.
#[derive(Debug, Clone, Default)]
pub struct Dictionary {
    words: HashSet<String>,
}

impl Dictionary {
    pub fn from_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let words = words
            .into_iter()
            .map(|w| w.as_ref().trim().to_string())
            .filter(|w| !w.is_empty())
            .collect();
        Self { words }
    }

    /// Loads a plain word list (one word per line). Hunspell `.dic` files work
    /// too: the leading count line is skipped and `/FLAGS` suffixes dropped.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| QuarkError::io(path, e))?;
        let mut lines = content.lines().peekable();
        if lines
            .peek()
            .is_some_and(|first| !first.trim().is_empty() && first.trim().chars().all(|c| c.is_ascii_digit()))
        {
            lines.next();
        }
        let dictionary = Self::from_words(
            lines
                .filter(|l| !l.starts_with('#'))
                .map(|l| l.split('/').next().unwrap_or(l)),
        );
        log::debug!("Loaded {} words from {}", dictionary.len(), path.display());
        Ok(dictionary)
    }

    /// Exact match, or a match of the lowercased word so that capitalized
    /// words at the start of a sentence are accepted.
    pub fn check(&self, word: &str) -> bool {
        self.words.contains(word) || self.words.contains(&word.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}
