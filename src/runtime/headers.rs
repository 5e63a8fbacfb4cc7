use std::collections::BTreeMap;

pub const CONTENT_TYPE: &str = "content-type";

/// Headers set by the caller before `send`.
///
/// Names are lowercased. Setting a name twice appends with `", "`, the way
/// multi-value headers combine. Iteration is sorted by name so the same set
/// of headers always serializes the same way.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestHeaders {
    map: BTreeMap<String, String>,
}

impl RequestHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    fn normalize_key(name: &str) -> String {
        name.trim().to_ascii_lowercase()
    }

    pub fn append(&mut self, name: &str, value: &str) {
        let key = Self::normalize_key(name);
        match self.map.get_mut(&key) {
            Some(existing) => {
                existing.push_str(", ");
                existing.push_str(value);
            }
            None => {
                self.map.insert(key, value.to_string());
            }
        }
    }

    /// Set `name` only if the caller did not.
    pub fn set_default(&mut self, name: &str, value: &str) {
        self.map
            .entry(Self::normalize_key(name))
            .or_insert_with(|| value.to_string());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.map.get(&Self::normalize_key(name)).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.map.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Headers reported by the relay, kept with the relay's spelling.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseHeaders {
    map: BTreeMap<String, String>,
}

impl ResponseHeaders {
    pub fn get(&self, name: &str) -> Option<&str> {
        // Case-insensitive lookup
        self.map
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// All headers as `name: value` lines, each terminated by CRLF.
    pub fn to_header_block(&self) -> String {
        let mut out = String::new();
        for (name, value) in &self.map {
            out.push_str(name);
            out.push_str(": ");
            out.push_str(value);
            out.push_str("\r\n");
        }
        out
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl From<BTreeMap<String, String>> for ResponseHeaders {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self { map }
    }
}
