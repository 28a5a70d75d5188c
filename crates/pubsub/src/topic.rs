//! # Topic Patterns
//!
//! A pattern is either an exact topic (`market.order_created`) or a prefix
//! ending in `*` (`market.*`). A lone `*` matches every topic. Wildcards
//! anywhere but the end are taken literally.

use std::fmt;

/// Subscription filter for a broker-backed bus.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TopicPattern {
    /// Matches one topic exactly.
    Exact(String),
    /// Matches every topic starting with the prefix.
    Prefix(String),
}

impl TopicPattern {
    /// Parse a pattern string.
    #[must_use]
    pub fn parse(pattern: &str) -> Self {
        match pattern.strip_suffix('*') {
            Some(prefix) => Self::Prefix(prefix.to_string()),
            None => Self::Exact(pattern.to_string()),
        }
    }

    /// Pattern matching every topic.
    #[must_use]
    pub fn all() -> Self {
        Self::Prefix(String::new())
    }

    /// Check if a topic matches this pattern.
    #[must_use]
    pub fn matches(&self, topic: &str) -> bool {
        match self {
            Self::Exact(exact) => exact == topic,
            Self::Prefix(prefix) => topic.starts_with(prefix.as_str()),
        }
    }

    /// Whether the pattern covers more than one topic.
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        matches!(self, Self::Prefix(_))
    }

    /// True if any of `patterns` matches `topic`. An empty set matches all.
    #[must_use]
    pub fn any_matches(patterns: &[TopicPattern], topic: &str) -> bool {
        patterns.is_empty() || patterns.iter().any(|p| p.matches(topic))
    }
}

impl fmt::Display for TopicPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(exact) => f.write_str(exact),
            Self::Prefix(prefix) => write!(f, "{prefix}*"),
        }
    }
}

impl From<&str> for TopicPattern {
    fn from(pattern: &str) -> Self {
        Self::parse(pattern)
    }
}
