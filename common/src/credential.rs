// Cookie-format session credential: ordered name/value pairs
use std::fmt;

/// Name of the cookie field that proves a live session. Exchanges that
/// need the remote service cannot start without it.
pub const SESSION_FIELD: &str = "wechatSESS_ID";

/// An ordered set of cookie pairs, preserved in first-seen order.
///
/// The remote service rotates individual fields via `Set-Cookie` while
/// leaving the rest untouched, so the credential must merge updates in
/// place rather than being replaced wholesale.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionCredential {
    pairs: Vec<(String, String)>,
}

impl SessionCredential {
    pub fn new() -> Self {
        Self { pairs: Vec::new() }
    }

    /// Parses a `name=value; name=value` string.
    ///
    /// Parts without an `=` are dropped; whitespace around names and
    /// values is trimmed. Values keep any embedded `=` intact.
    pub fn parse(raw: &str) -> Self {
        let mut credential = Self::new();
        for part in raw.split(';') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            if let Some((name, value)) = part.split_once('=') {
                credential.set(name.trim(), value.trim());
            }
        }
        credential
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Convenience accessor for the session-proving field.
    pub fn session_id(&self) -> Option<&str> {
        self.get(SESSION_FIELD)
    }

    /// Updates an existing field in place or appends a new one at the end.
    pub fn set(&mut self, name: &str, value: &str) {
        match self.pairs.iter_mut().find(|(n, _)| n == name) {
            Some((_, v)) => *v = value.to_string(),
            None => self.pairs.push((name.to_string(), value.to_string())),
        }
    }

    /// Applies every pair from `other` onto `self`, last writer wins.
    ///
    /// Existing fields keep their original position; unseen fields are
    /// appended in the order `other` lists them. Merging the same update
    /// twice leaves the credential unchanged after the first application.
    pub fn merge(&mut self, other: &SessionCredential) {
        for (name, value) in &other.pairs {
            self.set(name, value);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }
}

impl fmt::Display for SessionCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (name, value) in &self.pairs {
            if !first {
                write!(f, "; ")?;
            }
            write!(f, "{}={}", name, value)?;
            first = false;
        }
        Ok(())
    }
}
