use std::collections::HashMap;
use std::fmt;
use std::rc::Weak;

/// Name the relay uses for the registry in reference expressions.
pub const REGISTRY_NAME: &str = "relayRequests";

// Tokens stay below 2^53 so a relay that treats them as JS numbers keeps them exact.
const TOKEN_MASK: u64 = (1 << 53) - 1;

/// Correlation token linking an outgoing descriptor to its request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Token(u64);

impl Token {
    pub fn new(value: u64) -> Self {
        Token(value & TOKEN_MASK)
    }

    pub fn get(self) -> u64 {
        self.0
    }

    /// Reference expression the relay embeds to address this request,
    /// e.g. `relayRequests[42]`.
    pub fn object_ref(self) -> String {
        format!("{}[{}]", REGISTRY_NAME, self.0)
    }

    /// Inverse of [`object_ref`](Self::object_ref).
    pub fn from_object_ref(expr: &str) -> Option<Self> {
        let inner = expr
            .trim()
            .strip_prefix(REGISTRY_NAME)?
            .strip_prefix('[')?
            .strip_suffix(']')?;

        if inner.is_empty() || !inner.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }

        let value: u64 = inner.parse().ok()?;
        (value <= TOKEN_MASK).then_some(Token(value))
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Draw a random token candidate.
pub fn random_candidate() -> u64 {
    rand::random::<u64>()
}

/// Open requests by token. Entries never own their request.
pub struct Registry<T> {
    entries: HashMap<Token, Weak<T>>,
}

impl<T> Registry<T> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Draw candidates until one is free.
    pub fn allocate(&self, mut draw: impl FnMut() -> u64) -> Token {
        loop {
            let candidate = Token::new(draw());
            if !self.entries.contains_key(&candidate) {
                return candidate;
            }
            log::trace!("token {} already registered, drawing again", candidate);
        }
    }

    /// Returns false if the token is taken; the existing entry is kept.
    pub fn insert(&mut self, token: Token, entry: Weak<T>) -> bool {
        if self.entries.contains_key(&token) {
            return false;
        }
        self.entries.insert(token, entry);
        true
    }

    pub fn remove(&mut self, token: Token) -> bool {
        self.entries.remove(&token).is_some()
    }

    pub fn get(&self, token: Token) -> Option<&Weak<T>> {
        self.entries.get(&token)
    }

    pub fn contains(&self, token: Token) -> bool {
        self.entries.contains_key(&token)
    }

    /// Forget entries whose request has been dropped.
    pub fn prune(&mut self) {
        self.entries.retain(|_, entry| entry.strong_count() > 0);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}
