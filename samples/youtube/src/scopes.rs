//! OAuth scopes understood by the YouTube Data API.

use std::fmt;

/// Manage your YouTube account.
pub const YOUTUBE: &str = "https://www.googleapis.com/auth/youtube";
/// View your YouTube account.
pub const YOUTUBE_READONLY: &str = "https://www.googleapis.com/auth/youtube.readonly";
/// Manage your YouTube account, over SSL only. Required for writing to live chat.
pub const YOUTUBE_FORCE_SSL: &str = "https://www.googleapis.com/auth/youtube.force-ssl";

/// An ordered, duplicate-free set of scopes requested during authorization.
///
/// Insertion order is kept so the authorization URL is stable. Once built the set
/// cannot be changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeSet(Vec<String>);

impl ScopeSet {
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether every scope in `self` is also present in `granted`.
    pub fn is_subset_of<'a>(&self, granted: impl IntoIterator<Item = &'a str> + Clone) -> bool {
        self.iter()
            .all(|s| granted.clone().into_iter().any(|g| g == s))
    }
}

impl<S: Into<String>> FromIterator<S> for ScopeSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut scopes: Vec<String> = Vec::new();
        for scope in iter {
            let scope = scope.into();
            if !scopes.contains(&scope) {
                scopes.push(scope);
            }
        }
        Self(scopes)
    }
}

impl fmt::Display for ScopeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // space-separated, as in the OAuth `scope` parameter
        write!(f, "{}", self.0.join(" "))
    }
}
