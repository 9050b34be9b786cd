//! Key Namespace Module
//!
//! Prefixes shared with every other reader of the store. They must stay
//! byte-for-byte stable.

use std::fmt;
use std::str::FromStr;

/// Prefix of fixed-window rate limit counters.
pub const RATE_LIMIT_PREFIX: &str = "ratelimit:";

// == Namespace ==
/// Known key namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    /// Short-term conversation context
    ChatContext,
    /// Chat session state
    ChatSession,
    /// Typing indicators
    ChatTyping,
    /// Scratch values for in-progress chat actions
    ChatTemp,
    /// Rate limit counters
    RateLimit,
}

impl Namespace {
    pub const ALL: [Namespace; 5] = [
        Namespace::ChatContext,
        Namespace::ChatSession,
        Namespace::ChatTyping,
        Namespace::ChatTemp,
        Namespace::RateLimit,
    ];

    /// Key prefix including the trailing separator.
    pub fn prefix(self) -> &'static str {
        match self {
            Namespace::ChatContext => "chat:context:",
            Namespace::ChatSession => "chat:session:",
            Namespace::ChatTyping => "chat:typing:",
            Namespace::ChatTemp => "chat:temp:",
            Namespace::RateLimit => RATE_LIMIT_PREFIX,
        }
    }

    /// Full key for `id` inside this namespace.
    pub fn key(self, id: &str) -> String {
        format!("{}{}", self.prefix(), id)
    }

    /// Glob matching every key in this namespace.
    pub fn pattern(self) -> String {
        format!("{}*", self.prefix())
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix().trim_end_matches(':'))
    }
}

impl FromStr for Namespace {
    type Err = String;

    /// Parses the prefix without its trailing colon, e.g. `chat:context`.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Namespace::ALL
            .into_iter()
            .find(|ns| ns.to_string() == s)
            .ok_or_else(|| format!("unknown namespace '{}'", s))
    }
}
