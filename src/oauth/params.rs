//! Extra authorization parameters
//!
//! Registrations may carry key/value pairs that are forwarded verbatim to
//! both the authorize redirect and the code exchange (for example
//! `access_type=offline`). [`AuthParams`] keeps them in a stable order so
//! generated URLs are reproducible.

use std::collections::BTreeMap;

/// Ordered set of extra authorization parameters.
///
/// Keys are unique; inserting an existing key replaces its value in place.
///
/// # Examples
///
/// ```
/// use authbroker::oauth::AuthParams;
///
/// let params = AuthParams::from_pairs([("prompt", "consent"), ("access_type", "offline")])
///     .with_default("type", "web_server");
///
/// let keys: Vec<&str> = params.iter().map(|(k, _)| k).collect();
/// assert_eq!(keys, vec!["access_type", "prompt", "type"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthParams {
    pairs: Vec<(String, String)>,
}

impl AuthParams {
    /// Creates an empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a parameter set sorted by key.
    ///
    /// Later duplicates win.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let sorted: BTreeMap<String, String> = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            pairs: sorted.into_iter().collect(),
        }
    }

    /// Returns a copy with `key` appended when it is not already present.
    pub fn with_default(mut self, key: &str, value: &str) -> Self {
        if !self.contains_key(key) {
            self.pairs.push((key.to_string(), value.to_string()));
        }
        self
    }

    /// Looks up the value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Iterates pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}
