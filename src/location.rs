//! Visible-location model and navigation history.
//!
//! SYSTEM CONTEXT
//! ==============
//! The address bar is used as a side channel by the hosted auth service: a
//! failed OAuth round trip lands with `error=server_error` in the query, and
//! the implicit grant leaves `access_token=...` in the fragment. Both must be
//! recognized literally and cleared with a history *replacement*, never a
//! new entry.

use std::fmt;

/// Query substring left behind by a failed OAuth redirect.
pub const OAUTH_ERROR_QUERY: &str = "error=server_error";

/// Fragment substring left behind by an implicit-grant OAuth redirect.
pub const ACCESS_TOKEN_FRAGMENT: &str = "access_token";

// =============================================================================
// LOCATION
// =============================================================================

/// A parsed location: path, raw query (no `?`), raw fragment (no `#`).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Location {
    pub path: String,
    pub query: String,
    pub fragment: String,
}

impl Location {
    /// Parse a relative target (`/dashboard?x=1#y`) or an absolute URL.
    ///
    /// Scheme and host are dropped. Paths are normalized to a leading `/`
    /// and no trailing `/` (except the root).
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let rest = strip_origin(raw.trim());
        let (before_hash, fragment) = rest.split_once('#').unwrap_or((rest, ""));
        let (path, query) = before_hash.split_once('?').unwrap_or((before_hash, ""));
        Self { path: normalize_path(path), query: query.to_owned(), fragment: fragment.to_owned() }
    }

    /// A location with only a path.
    #[must_use]
    pub fn from_path(path: &str) -> Self {
        Self { path: normalize_path(path), query: String::new(), fragment: String::new() }
    }

    /// True when neither query nor fragment is present.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.query.is_empty() && self.fragment.is_empty()
    }

    /// Same path, query and fragment dropped.
    #[must_use]
    pub fn without_query_and_fragment(&self) -> Self {
        Self { path: self.path.clone(), query: String::new(), fragment: String::new() }
    }

    /// Whether the location carries a failed-OAuth or leftover-token marker.
    #[must_use]
    pub fn has_oauth_error_signature(&self) -> bool {
        self.query.contains(OAUTH_ERROR_QUERY) || self.fragment.contains(ACCESS_TOKEN_FRAGMENT)
    }

    /// Percent-decoded value of a query parameter.
    #[must_use]
    pub fn query_param(&self, key: &str) -> Option<String> {
        find_pair(&self.query, key)
    }

    /// Percent-decoded value of a fragment parameter (`#a=1&b=2`).
    #[must_use]
    pub fn fragment_param(&self, key: &str) -> Option<String> {
        find_pair(&self.fragment, key)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)?;
        if !self.query.is_empty() {
            write!(f, "?{}", self.query)?;
        }
        if !self.fragment.is_empty() {
            write!(f, "#{}", self.fragment)?;
        }
        Ok(())
    }
}

fn strip_origin(raw: &str) -> &str {
    let Some(idx) = raw.find("://") else {
        return raw;
    };
    if raw[..idx].contains(['/', '?', '#']) {
        return raw;
    }
    let after = &raw[idx + 3..];
    after.find(['/', '?', '#']).map_or("", |i| &after[i..])
}

fn normalize_path(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return "/".to_owned();
    }
    if trimmed.starts_with('/') { trimmed.to_owned() } else { format!("/{trimmed}") }
}

/// Decode `k=v&k2=v2` pairs, reusing the URL parser for percent-decoding.
pub(crate) fn decode_pairs(raw: &str) -> Vec<(String, String)> {
    if raw.is_empty() {
        return Vec::new();
    }
    reqwest::Url::parse(&format!("http://localhost/?{raw}"))
        .map(|url| {
            url.query_pairs()
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect()
        })
        .unwrap_or_default()
}

fn find_pair(raw: &str, key: &str) -> Option<String> {
    decode_pairs(raw)
        .into_iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v)
}

// =============================================================================
// HISTORY
// =============================================================================

/// The navigation surface the router writes to.
pub trait History: Send {
    /// The location currently shown.
    fn current(&self) -> &Location;
    /// Commit a new entry.
    fn push(&mut self, location: Location);
    /// Overwrite the current entry without adding one.
    fn replace(&mut self, location: Location);
    /// Full page load of `location`, discarding in-page state.
    fn reload(&mut self, location: Location);
}

/// In-process history stack.
#[derive(Debug, Clone)]
pub struct MemoryHistory {
    past: Vec<Location>,
    current: Location,
    reloads: usize,
}

impl MemoryHistory {
    #[must_use]
    pub fn new(initial: Location) -> Self {
        Self { past: Vec::new(), current: initial, reloads: 0 }
    }

    /// All entries, oldest first, ending with the current one.
    #[must_use]
    pub fn entries(&self) -> Vec<Location> {
        let mut all = self.past.clone();
        all.push(self.current.clone());
        all
    }

    /// Number of full page loads performed.
    #[must_use]
    pub fn reload_count(&self) -> usize {
        self.reloads
    }
}

impl History for MemoryHistory {
    fn current(&self) -> &Location {
        &self.current
    }

    fn push(&mut self, location: Location) {
        let previous = std::mem::replace(&mut self.current, location);
        self.past.push(previous);
    }

    fn replace(&mut self, location: Location) {
        self.current = location;
    }

    fn reload(&mut self, location: Location) {
        self.push(location);
        self.reloads += 1;
    }
}

#[cfg(test)]
#[path = "location_test.rs"]
mod tests;
