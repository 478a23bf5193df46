//! Case-insensitive regex patterns for track titles.
//!
//! Compiled regexes are kept in a small process-wide cache so the same
//! commentary or title pattern is only compiled once, no matter how many
//! policies or files reference it.

use dashmap::DashMap;
use regex::{Regex, RegexBuilder};
use std::fmt;
use std::sync::LazyLock;
use std::time::Instant;

/// Maximum number of compiled patterns held by the global cache.
pub const MAX_CACHED_PATTERNS: usize = 64;

/// Title patterns that mark a track as commentary when none are configured.
pub const DEFAULT_COMMENTARY_PATTERNS: [&str; 3] = ["commentary", "director", "audio description"];

static GLOBAL_CACHE: LazyLock<PatternCache> =
    LazyLock::new(|| PatternCache::new(MAX_CACHED_PATTERNS));

struct CacheEntry {
    regex: Regex,
    last_accessed: Instant,
}

/// Thread-safe, bounded cache of compiled case-insensitive regexes.
pub struct PatternCache {
    entries: DashMap<String, CacheEntry>,
    max_entries: usize,
}

impl PatternCache {
    /// Create a cache holding at most `max_entries` patterns.
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            max_entries: max_entries.max(1),
        }
    }

    /// Return the compiled form of `pattern`, compiling it on first use.
    pub fn get_or_compile(&self, pattern: &str) -> Result<Regex, regex::Error> {
        if let Some(mut entry) = self.entries.get_mut(pattern) {
            entry.last_accessed = Instant::now();
            return Ok(entry.regex.clone());
        }

        let regex = RegexBuilder::new(pattern).case_insensitive(true).build()?;

        if self.entries.len() >= self.max_entries {
            self.evict_oldest();
        }
        self.entries.insert(
            pattern.to_string(),
            CacheEntry {
                regex: regex.clone(),
                last_accessed: Instant::now(),
            },
        );
        Ok(regex)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn evict_oldest(&self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|entry| entry.last_accessed)
            .map(|entry| entry.key().clone());
        if let Some(key) = oldest {
            self.entries.remove(&key);
        }
    }
}

/// Compile `pattern` case-insensitively through the global cache.
pub fn compile(pattern: &str) -> Result<Regex, regex::Error> {
    GLOBAL_CACHE.get_or_compile(pattern)
}

/// A validated title regex.
///
/// Equality compares the source pattern, which keeps [`Condition`](crate::Condition)
/// trees comparable.
#[derive(Clone)]
pub struct TitlePattern {
    regex: Regex,
}

impl TitlePattern {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            regex: compile(pattern)?,
        })
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

impl PartialEq for TitlePattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl fmt::Debug for TitlePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TitlePattern").field(&self.as_str()).finish()
    }
}

/// Compiled patterns that identify commentary tracks by title.
#[derive(Debug, Clone)]
pub struct CommentaryPatterns {
    patterns: Vec<Regex>,
}

impl CommentaryPatterns {
    /// Compile a list of patterns. Any invalid pattern fails the whole set.
    pub fn new<I, S>(patterns: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| compile(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// Source text of each pattern, in configuration order.
    pub fn sources(&self) -> Vec<&str> {
        self.patterns.iter().map(|p| p.as_str()).collect()
    }

    /// Whether a track title looks like commentary. Untitled tracks never are.
    pub fn is_commentary(&self, title: Option<&str>) -> bool {
        match title {
            Some(title) => self.patterns.iter().any(|p| p.is_match(title)),
            None => false,
        }
    }
}

impl Default for CommentaryPatterns {
    fn default() -> Self {
        let patterns = DEFAULT_COMMENTARY_PATTERNS
            .iter()
            .filter_map(|p| compile(p).ok())
            .collect();
        Self { patterns }
    }
}
