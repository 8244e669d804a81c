//! Tickets: single-use, signed authorization tokens
//!
//! A ticket gates exactly one callback invocation. Its digest binds the
//! mint timestamp, the callback name, and a secret that never appears in
//! persisted state, so database access alone cannot forge an expected
//! answer. Rotating the secret invalidates every outstanding ticket.

use crate::ids::CallbackId;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

// ── Secret Provider ──────────────────────────────────────────────────

/// Source of the signing secret.
///
/// Injected at construction; the secret is never stored in persisted
/// state and never derivable from it.
pub trait SecretProvider: Send + Sync {
    fn secret(&self) -> &[u8];
}

/// Secret held in memory. Rotation means swapping the provider.
#[derive(Clone)]
pub struct StaticSecret(Vec<u8>);

impl StaticSecret {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self(secret.into())
    }
}

impl SecretProvider for StaticSecret {
    fn secret(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for StaticSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // never print the secret itself
        f.debug_struct("StaticSecret").finish_non_exhaustive()
    }
}

// ── Ticket ───────────────────────────────────────────────────────────

/// Opaque authorization token: `"<ISO-8601 timestamp>;<hex digest>"`.
///
/// Valid only for the exact (callback, timestamp, secret) it was minted
/// with, and only until it is consumed.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ticket(pub String);

impl Ticket {
    /// Mint a ticket for `callback` at the current instant.
    pub fn mint(callback: &CallbackId, secret: &dyn SecretProvider) -> Self {
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
        Self::assemble(&timestamp, callback, secret)
    }

    /// The timestamp portion of the ticket, if the format is intact.
    pub fn timestamp(&self) -> Option<&str> {
        self.0.split(';').next().filter(|part| !part.is_empty())
    }

    /// Recompute the digest from the ticket's own timestamp and compare.
    pub fn verify(&self, callback: &CallbackId, secret: &dyn SecretProvider) -> bool {
        match self.timestamp() {
            Some(timestamp) => Self::assemble(timestamp, callback, secret).0 == self.0,
            None => false,
        }
    }

    fn assemble(timestamp: &str, callback: &CallbackId, secret: &dyn SecretProvider) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(timestamp.as_bytes());
        hasher.update(callback.0.as_bytes());
        hasher.update(secret.secret());
        let digest = hasher.finalize().to_hex();
        Self(format!("{timestamp};{digest}"))
    }
}

impl std::fmt::Display for Ticket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret() -> StaticSecret {
        StaticSecret::new(b"keep-me-out-of-the-database".to_vec())
    }

    #[test]
    fn minted_ticket_verifies_for_its_callback() {
        let callback = CallbackId::new("approve");
        let ticket = Ticket::mint(&callback, &secret());
        assert!(ticket.verify(&callback, &secret()));
    }

    #[test]
    fn ticket_is_bound_to_the_callback_name() {
        let ticket = Ticket::mint(&CallbackId::new("approve"), &secret());
        assert!(!ticket.verify(&CallbackId::new("dismiss"), &secret()));
    }

    #[test]
    fn secret_rotation_invalidates_outstanding_tickets() {
        let callback = CallbackId::new("approve");
        let ticket = Ticket::mint(&callback, &secret());
        let rotated = StaticSecret::new(b"rotated".to_vec());
        assert!(!ticket.verify(&callback, &rotated));
    }

    #[test]
    fn format_is_timestamp_then_hex_digest() {
        let ticket = Ticket::mint(&CallbackId::new("approve"), &secret());
        let (timestamp, digest) = ticket.0.split_once(';').unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(timestamp).is_ok());
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn tampered_ticket_fails_verification() {
        let callback = CallbackId::new("approve");
        let ticket = Ticket::mint(&callback, &secret());
        let mut forged = ticket.0.clone();
        forged.pop();
        forged.push('x');
        assert!(!Ticket(forged).verify(&callback, &secret()));
        assert!(!Ticket("no-separator".into()).verify(&callback, &secret()));
    }
}
