// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Client identity resolution with a TTL-bounded identity-to-session cache.
//!
//! Resolution never fails: the resolver walks proxy headers in precedence
//! order, degrades to a hash of all header content, and finally to a random
//! identity tagged as unreliable.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use uuid::Uuid;

use parley_core::types::Session;
use parley_core::{ConversationStore, ParleyError};

/// Proxy headers consulted in order; the first present non-empty one wins.
const ADDRESS_HEADERS: [&str; 4] = ["cf-connecting-ip", "x-real-ip", "x-forwarded-for", "x-client-ip"];

/// A resolved client identity.
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    /// Stable key used to scope conversation memory.
    pub key: String,
    /// Session currently bound to this identity.
    pub session_id: Uuid,
    /// False when the key was derived from no reliable origin signal.
    pub reliable: bool,
}

struct CachedIdentity {
    session_id: Uuid,
    expires_at: Instant,
}

/// Derives a stable identity from request metadata and maps it to a session.
///
/// The identity-to-session cache is owned instance state. Cache hits within
/// the TTL skip the store round-trip entirely; expired entries are replaced
/// on next use.
pub struct IdentityResolver {
    store: Arc<dyn ConversationStore>,
    cache: DashMap<String, CachedIdentity>,
    ttl: Duration,
}

impl IdentityResolver {
    pub fn new(store: Arc<dyn ConversationStore>, ttl: Duration) -> Self {
        Self {
            store,
            cache: DashMap::new(),
            ttl,
        }
    }

    /// Resolves an identity from request headers and an optional explicit
    /// user id. Always returns an identity; store failures during session
    /// lookup degrade to a fresh unpersisted session rather than an error.
    pub async fn resolve(
        &self,
        headers: &BTreeMap<String, String>,
        user_id: Option<&str>,
    ) -> Identity {
        let (key, reliable) = derive_key(headers, user_id);

        if let Some(entry) = self.cache.get(&key) {
            if entry.expires_at > Instant::now() {
                debug!(identity = %key, "identity cache hit");
                return Identity {
                    key,
                    session_id: entry.session_id,
                    reliable,
                };
            }
        }

        let session_id = match self.find_or_create_session(&key).await {
            Ok(id) => id,
            Err(e) => {
                // Resolution never hard-fails; the turn proceeds with an
                // unpersisted session id.
                warn!(identity = %key, error = %e, "session lookup failed, using ephemeral session");
                Uuid::new_v4()
            }
        };

        self.cache.insert(
            key.clone(),
            CachedIdentity {
                session_id,
                expires_at: Instant::now() + self.ttl,
            },
        );

        Identity {
            key,
            session_id,
            reliable,
        }
    }

    /// Drops the cache entry for an identity. Used by tests and by session
    /// rotation.
    pub fn evict(&self, identity_key: &str) {
        self.cache.remove(identity_key);
    }

    async fn find_or_create_session(&self, identity_key: &str) -> Result<Uuid, ParleyError> {
        if let Some(session) = self.store.find_session(identity_key).await? {
            self.store.touch_session(session.session_id).await?;
            return Ok(session.session_id);
        }

        let session = Session::new(identity_key);
        match self.store.create_session(&session).await {
            Ok(()) => Ok(session.session_id),
            Err(e) => {
                // Duplicate-insert race: another turn created the session
                // first. Re-read and treat that one as canonical.
                debug!(identity = %identity_key, error = %e, "session insert raced, re-reading");
                match self.store.find_session(identity_key).await? {
                    Some(existing) => Ok(existing.session_id),
                    None => Err(e),
                }
            }
        }
    }
}

/// Derives the identity key from headers, most specific proxy header first.
fn derive_key(headers: &BTreeMap<String, String>, user_id: Option<&str>) -> (String, bool) {
    if let Some(id) = user_id.map(str::trim).filter(|s| !s.is_empty()) {
        return (format!("user-{id}"), true);
    }

    for header in ADDRESS_HEADERS {
        if let Some(value) = headers.get(header) {
            // x-forwarded-for carries the whole hop chain; the client is
            // the first entry.
            let first_hop = value.split(',').next().unwrap_or("").trim();
            if !first_hop.is_empty() {
                return (format!("ip-{first_hop}"), true);
            }
        }
    }

    // No address signal at all: hash everything we did receive so repeat
    // requests from the same origin still correlate.
    if !headers.is_empty() {
        let mut hasher = Sha256::new();
        for (name, value) in headers {
            hasher.update(name.as_bytes());
            hasher.update(b":");
            hasher.update(value.as_bytes());
            hasher.update(b"\n");
        }
        let digest = hasher.finalize();
        return (format!("hdr-{}", &hex::encode(digest)[..16]), false);
    }

    (format!("anon-{}", Uuid::new_v4()), false)
}
