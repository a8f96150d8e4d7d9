//! Layered secret lookup.
//!
//! Secrets are resolved from an ordered list of sources: the OS keychain
//! first, then environment variables (each candidate name is also tried with
//! dashes and underscores swapped, since deployment tooling disagrees on
//! spelling). The first non-empty value wins. Every layer miss is logged so a
//! misconfigured deployment is diagnosable; nothing is silently swallowed.

use tracing::{debug, warn};

/// Keychain service name under which habitd secrets are stored.
pub const KEYCHAIN_SERVICE: &str = "habitd";

/// Candidate names for the completion-service API key, in priority order.
pub const PROVIDER_API_KEY_NAMES: &[&str] = &[
    "HABITD-OPENAI-KEY",
    "HABITD_OPENAI_KEY",
    "OPENAI-API-KEY",
    "OPENAI_API_KEY",
];

/// Candidate names for the HTTP surface's bearer token.
pub const API_TOKEN_NAMES: &[&str] = &["HABITD-API-TOKEN", "HABITD_API_TOKEN"];

fn from_keychain(name: &str) -> Option<String> {
    match keyring::Entry::new(KEYCHAIN_SERVICE, name) {
        Ok(entry) => match entry.get_password() {
            Ok(value) if !value.is_empty() => {
                debug!(name, "secret resolved from OS keychain");
                Some(value)
            }
            Ok(_) => {
                debug!(name, "keychain entry present but empty");
                None
            }
            Err(e) => {
                debug!(name, "keychain lookup missed: {}", e);
                None
            }
        },
        Err(e) => {
            warn!(name, "keychain unavailable: {}", e);
            None
        }
    }
}

fn from_env(name: &str) -> Option<String> {
    let spellings = [name.to_string(), name.replace('-', "_")];
    for spelling in &spellings {
        match std::env::var(spelling) {
            Ok(value) if !value.is_empty() => {
                debug!(name = %spelling, "secret resolved from environment");
                return Some(value);
            }
            _ => {}
        }
    }
    debug!(name, "not found in environment");
    None
}

/// Resolve a secret by trying every candidate name against the keychain, then
/// every candidate name against the environment. First non-empty value wins.
pub fn resolve_secret(candidates: &[&str]) -> Option<String> {
    for name in candidates {
        if let Some(value) = from_keychain(name) {
            return Some(value);
        }
    }
    for name in candidates {
        if let Some(value) = from_env(name) {
            return Some(value);
        }
    }
    None
}
