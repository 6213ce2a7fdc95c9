//! Credential lookup.
//!
//! The client does not own credential storage; it consumes a lookup
//! capability. Missing credentials fail the request pipeline before any
//! network I/O.

use secrecy::SecretString;
use std::collections::HashMap;

/// Injected credential lookup capability.
pub trait CredentialStore: Send + Sync {
    /// Resolve the API key for a provider id, if one is configured.
    fn get(&self, provider_id: &str) -> Option<SecretString>;
}

/// Resolves credentials from environment variables named
/// `{PROVIDER_ID}_API_KEY` (provider id uppercased, `-` mapped to `_`).
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvCredentialStore;

impl CredentialStore for EnvCredentialStore {
    fn get(&self, provider_id: &str) -> Option<SecretString> {
        let var = format!(
            "{}_API_KEY",
            provider_id.to_ascii_uppercase().replace('-', "_")
        );
        std::env::var(var).ok().map(SecretString::from)
    }
}

/// Fixed in-memory credential map, mainly for tests and embedding scenarios.
#[derive(Debug, Default)]
pub struct StaticCredentialStore {
    keys: HashMap<String, SecretString>,
}

impl StaticCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key(mut self, provider_id: impl Into<String>, key: impl Into<String>) -> Self {
        self.keys
            .insert(provider_id.into(), SecretString::from(key.into()));
        self
    }
}

impl CredentialStore for StaticCredentialStore {
    fn get(&self, provider_id: &str) -> Option<SecretString> {
        self.keys.get(provider_id).cloned()
    }
}
