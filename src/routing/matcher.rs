//! Route matching logic.
//!
//! # Responsibilities
//! - Match path prefix (case-sensitive) on segment boundaries
//! - Rewrite the matched prefix for forwarding
//!
//! # Design Decisions
//! - `/api/books` matches `/api/books` and `/api/books/...`, never `/api/bookshelf`
//! - A prefix of `/` matches every path
//! - No regex to guarantee O(n) matching

/// Matches the request path prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPrefixMatcher {
    prefix: String,
}

impl PathPrefixMatcher {
    /// Create a new path prefix matcher. Trailing slashes are ignored.
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let trimmed = prefix.trim_end_matches('/');
        Self {
            prefix: trimmed.to_string(),
        }
    }

    /// The normalized prefix (empty for the root prefix).
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Returns true if `path` lies under this prefix.
    pub fn matches_path(&self, path: &str) -> bool {
        match path.strip_prefix(self.prefix.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('/') || self.prefix.is_empty(),
            None => false,
        }
    }

    /// Replace the matched prefix of `path_and_query` with `replacement`.
    ///
    /// The remainder of the path and the query string are kept verbatim.
    /// Returns `None` when the path does not match.
    pub fn rewrite(&self, path_and_query: &str, replacement: &str) -> Option<String> {
        let (path, query) = match path_and_query.find('?') {
            Some(idx) => path_and_query.split_at(idx),
            None => (path_and_query, ""),
        };

        if !self.matches_path(path) {
            return None;
        }

        let rest = &path[self.prefix.len()..];
        let mut rewritten = String::with_capacity(replacement.len() + rest.len() + query.len() + 1);
        rewritten.push_str(replacement.trim_end_matches('/'));
        rewritten.push_str(rest);
        if !rewritten.starts_with('/') {
            rewritten.insert(0, '/');
        }
        rewritten.push_str(query);
        Some(rewritten)
    }
}
