//! URL scope for response interception
//!
//! Patterns use the extension match-pattern shape (`<all_urls>`,
//! `*://*.example.com/*`); each compiles to an anchored regex.

use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

pub const ALL_URLS: &str = "<all_urls>";

lazy_static! {
    static ref SCHEME_PREFIX: Regex =
        Regex::new(r"^(\*|[a-zA-Z][a-zA-Z0-9+.-]*)://").expect("scheme prefix regex");
}

#[derive(Debug, Error)]
pub enum ScopeError {
    #[error("invalid match pattern {pattern:?}")]
    InvalidPattern { pattern: String },
}

#[derive(Debug, Clone)]
pub struct MatchPattern {
    raw: String,
    regex: Option<Regex>,
}

impl MatchPattern {
    pub fn parse(pattern: &str) -> Result<Self, ScopeError> {
        if pattern == ALL_URLS {
            return Ok(Self {
                raw: pattern.to_string(),
                regex: None,
            });
        }

        if !SCHEME_PREFIX.is_match(pattern) {
            return Err(ScopeError::InvalidPattern {
                pattern: pattern.to_string(),
            });
        }

        let mut regex = String::from("^");
        for (i, chunk) in pattern.split('*').enumerate() {
            if i > 0 {
                regex.push_str(".*");
            }
            regex.push_str(&regex::escape(chunk));
        }
        regex.push('$');

        let regex = Regex::new(&regex).map_err(|_| ScopeError::InvalidPattern {
            pattern: pattern.to_string(),
        })?;

        Ok(Self {
            raw: pattern.to_string(),
            regex: Some(regex),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn matches(&self, url: &str) -> bool {
        match &self.regex {
            None => true,
            Some(regex) => regex.is_match(url),
        }
    }
}

/// The set of URL patterns a hook applies to.
#[derive(Debug, Clone)]
pub struct InterceptScope {
    patterns: Vec<MatchPattern>,
}

impl InterceptScope {
    /// The broadest scope: every response.
    pub fn all_urls() -> Self {
        Self {
            patterns: vec![MatchPattern {
                raw: ALL_URLS.to_string(),
                regex: None,
            }],
        }
    }

    pub fn from_patterns<S: AsRef<str>>(patterns: &[S]) -> Result<Self, ScopeError> {
        let patterns = patterns
            .iter()
            .map(|p| MatchPattern::parse(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    pub fn matches(&self, url: &str) -> bool {
        self.patterns.iter().any(|pattern| pattern.matches(url))
    }

    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(MatchPattern::as_str)
    }
}

impl Default for InterceptScope {
    fn default() -> Self {
        Self::all_urls()
    }
}
