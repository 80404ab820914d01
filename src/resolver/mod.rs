//! Argument resolution
//!
//! Turns a user supplied argument (a literal UUID, a name, or a glob such as
//! `*tf-acc-test*`) into the identifiers of the live entities it matches.
//!
//! # Module Structure
//!
//! - [`cache`] - Per-invocation entity cache filled from one listing call
//! - [`provider`] - Resolution providers: list one kind, cache it, build a [`Resolver`]
//!
//! # Matching
//!
//! A UUID only matches itself (case-sensitive). A name matches exactly,
//! case-insensitively, or as a glob where `*` stands for any run of
//! characters. Without a `*` the whole name has to match.

pub mod cache;
pub mod provider;

pub use cache::Cache;
pub use provider::{CachingProvider, ResolutionProvider};

use thiserror::Error;

/// Resolution errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("nothing found matching '{0}'")]
    NotFound(String),

    #[error("'{0}' is ambiguous, found multiple matches")]
    Ambiguous(String),
}

/// How strongly an argument matched an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MatchType {
    None,
    WildCard,
    CaseInsensitive,
    Exact,
}

/// Maps one argument to the set of entities it matches
pub type Resolver = Box<dyn Fn(&str) -> Resolved + Send + Sync>;

/// Match an argument against an identifier (case-sensitive, exact)
pub fn match_uuid(arg: &str, uuid: &str) -> MatchType {
    if !uuid.is_empty() && arg == uuid {
        MatchType::Exact
    } else {
        MatchType::None
    }
}

/// Match an argument against a display name
pub fn match_title(arg: &str, title: &str) -> MatchType {
    if arg == title {
        return MatchType::Exact;
    }
    if arg.to_lowercase() == title.to_lowercase() {
        return MatchType::CaseInsensitive;
    }
    if arg.contains('*') && glob_match(arg, title) {
        return MatchType::WildCard;
    }
    MatchType::None
}

/// Case-insensitive glob match where `*` matches any run of characters
pub fn glob_match(pattern: &str, name: &str) -> bool {
    let pattern = pattern.to_lowercase();
    let name = name.to_lowercase();

    let segments: Vec<&str> = pattern.split('*').collect();
    let [first, middle @ .., last] = segments.as_slice() else {
        // No wildcard at all
        return pattern == name;
    };

    let Some(mut remaining) = name.strip_prefix(first) else {
        return false;
    };

    for segment in middle {
        if segment.is_empty() {
            continue;
        }
        match remaining.find(segment) {
            Some(idx) => remaining = &remaining[idx + segment.len()..],
            None => return false,
        }
    }

    remaining.ends_with(last)
}

/// Result of resolving one argument against one resource kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub arg: String,
    matches: Vec<(String, MatchType)>,
}

impl Resolved {
    pub fn new(arg: &str) -> Self {
        Self {
            arg: arg.to_string(),
            matches: Vec::new(),
        }
    }

    /// Record a match; the same identifier is kept once with its strongest match type
    pub fn add_match(&mut self, id: &str, match_type: MatchType) {
        if match_type == MatchType::None {
            return;
        }

        match self.matches.iter_mut().find(|(existing, _)| existing == id) {
            Some((_, current)) => *current = (*current).max(match_type),
            None => self.matches.push((id.to_string(), match_type)),
        }
    }

    pub fn matches(&self) -> &[(String, MatchType)] {
        &self.matches
    }

    /// All distinct matched identifiers in first-seen order
    pub fn get_all(&self) -> Result<Vec<String>, ResolveError> {
        if self.matches.is_empty() {
            return Err(ResolveError::NotFound(self.arg.clone()));
        }
        Ok(self.matches.iter().map(|(id, _)| id.clone()).collect())
    }

    /// The single best match
    ///
    /// Fails with `Ambiguous` when several identifiers share the strongest match type.
    pub fn get_only(&self) -> Result<String, ResolveError> {
        let Some(best) = self.matches.iter().map(|(_, m)| *m).max() else {
            return Err(ResolveError::NotFound(self.arg.clone()));
        };

        let mut candidates = self.matches.iter().filter(|(_, m)| *m == best);
        match (candidates.next(), candidates.next()) {
            (Some((id, _)), None) => Ok(id.clone()),
            _ => Err(ResolveError::Ambiguous(self.arg.clone())),
        }
    }
}
