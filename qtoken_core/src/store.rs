//! Issuer-owned lookup tables: outstanding tokens and pre-shared secrets.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use zeroize::Zeroizing;

use crate::token::Token;

/// Pre-shared holder secret, wiped from memory on drop.
///
/// Serializes as a plain string; deserialization moves the decoded string
/// straight into the zeroizing buffer.
#[derive(Clone, PartialEq, Eq)]
pub struct SharedSecret(Zeroizing<String>);

impl SharedSecret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(Zeroizing::new(secret.into()))
    }

    pub fn expose(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedSecret(<redacted>)")
    }
}

impl Serialize for SharedSecret {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.expose())
    }
}

impl<'de> Deserialize<'de> for SharedSecret {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(Self::new)
    }
}

impl From<&str> for SharedSecret {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SharedSecret {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Holder identity → pre-shared secret. Populated out of band.
#[derive(Clone, Debug, Default)]
pub struct SecretRegistry {
    secrets: HashMap<String, SharedSecret>,
}

impl SecretRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a secret, returning the one it replaced.
    pub fn insert(
        &mut self,
        holder_id: impl Into<String>,
        secret: impl Into<SharedSecret>,
    ) -> Option<SharedSecret> {
        self.secrets.insert(holder_id.into(), secret.into())
    }

    pub fn get(&self, holder_id: &str) -> Option<&SharedSecret> {
        self.secrets.get(holder_id)
    }

    pub fn contains(&self, holder_id: &str) -> bool {
        self.secrets.contains_key(holder_id)
    }

    pub fn len(&self) -> usize {
        self.secrets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for SecretRegistry
where
    K: Into<String>,
    V: Into<SharedSecret>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut registry = Self::new();
        for (holder_id, secret) in iter {
            registry.insert(holder_id, secret);
        }
        registry
    }
}

/// Holder identity → unconsumed token.
#[derive(Clone, Debug, Default)]
pub struct TokenStore {
    tokens: HashMap<String, Token>,
}

impl TokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, holder_id: impl Into<String>, token: Token) -> Option<Token> {
        self.tokens.insert(holder_id.into(), token)
    }

    pub fn get(&self, holder_id: &str) -> Option<&Token> {
        self.tokens.get(holder_id)
    }

    /// Removes the token so it cannot be presented again.
    pub fn take(&mut self, holder_id: &str) -> Option<Token> {
        self.tokens.remove(holder_id)
    }

    pub fn contains(&self, holder_id: &str) -> bool {
        self.tokens.contains_key(holder_id)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}
