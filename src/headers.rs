//! Header mapping and sanitization for the gateway hop.
//!
//! [`HeaderList`] keeps header names exactly as the caller wrote them and in
//! the order they were first seen, while lookups ignore ASCII case.
//! [`sanitize`] removes everything that must not cross into the new hop:
//! RFC 7230 hop-by-hop headers plus the framing and encoding headers the
//! gateway recomputes when it re-frames the request.

/// Lower-cased names dropped before a request is handed to the gateway.
pub const STRIPPED_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "content-encoding",
    "content-length",
    "host",
    "accept-encoding",
];

pub const X_TARGET_URL: &str = "x-target-url";
pub const X_PROXY_URL: &str = "x-proxy-url";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderList {
    entries: Vec<(String, String)>,
}

impl HeaderList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `name` to `value`. An existing entry matching case-insensitively
    /// is replaced in place (taking the new casing); otherwise the entry is
    /// appended.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();

        match self.position(&name) {
            Some(index) => {
                self.entries[index] = (name, value);
                let mut i = index + 1;
                while i < self.entries.len() {
                    if self.entries[i].0.eq_ignore_ascii_case(&self.entries[index].0) {
                        self.entries.remove(i);
                    } else {
                        i += 1;
                    }
                }
            }
            None => self.entries.push((name, value)),
        }
    }

    /// Adds `value` to `name`, joining with `", "` when the header is
    /// already present. Used when folding repeated response headers.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();

        match self.position(&name) {
            Some(index) => {
                let existing = &mut self.entries[index].1;
                existing.push_str(", ");
                existing.push_str(&value);
            }
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.position(name).map(|i| self.entries[i].1.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        let index = self.position(name)?;
        let (_, value) = self.entries.remove(index);
        self.entries.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        Some(value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|(k, _)| k.eq_ignore_ascii_case(name))
    }
}

impl<K, V> FromIterator<(K, V)> for HeaderList
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = HeaderList::new();
        for (k, v) in iter {
            headers.insert(k, v);
        }
        headers
    }
}

impl<K, V, const N: usize> From<[(K, V); N]> for HeaderList
where
    K: Into<String>,
    V: Into<String>,
{
    fn from(entries: [(K, V); N]) -> Self {
        entries.into_iter().collect()
    }
}

impl IntoIterator for HeaderList {
    type Item = (String, String);
    type IntoIter = std::vec::IntoIter<(String, String)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

pub fn is_stripped(name: &str) -> bool {
    STRIPPED_HEADERS
        .iter()
        .any(|h| name.eq_ignore_ascii_case(h))
}

/// Copies every header that may cross into the gateway hop, preserving the
/// caller's casing and order. `None` is treated as an empty mapping.
pub fn sanitize(headers: Option<&HeaderList>) -> HeaderList {
    let mut cleaned = HeaderList::new();
    let Some(headers) = headers else {
        return cleaned;
    };

    for (name, value) in headers.iter() {
        if name.is_empty() || is_stripped(name) {
            continue;
        }
        cleaned.insert(name, value);
    }

    cleaned
}
