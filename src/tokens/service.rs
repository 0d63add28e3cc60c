use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use dashmap::DashMap;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument};

use crate::config::TokenConfig;
use crate::errors::{Error, Result};
use crate::identity::{ClientIdentity, IdentityKind};
use crate::observability::metrics;

use super::store::TokenStore;

const TOKEN_BYTES: usize = 32;

/// Issues and resolves one-time provisioning tokens.
///
/// At most one live token exists per identity: issuing a new one revokes the
/// previous token.
#[derive(Debug)]
pub struct TokenService {
    store: Arc<TokenStore>,
    owners: DashMap<ClientIdentity, String>,
    application_ttl: Duration,
    cluster_ttl: Duration,
}

impl TokenService {
    pub fn new(store: Arc<TokenStore>, application_ttl: Duration, cluster_ttl: Duration) -> Self {
        Self { store, owners: DashMap::new(), application_ttl, cluster_ttl }
    }

    pub fn from_config(store: Arc<TokenStore>, config: &TokenConfig) -> Self {
        Self::new(store, config.application_ttl(), config.cluster_ttl())
    }

    fn ttl_for(&self, kind: IdentityKind) -> Duration {
        match kind {
            IdentityKind::Application => self.application_ttl,
            IdentityKind::Cluster => self.cluster_ttl,
        }
    }

    /// Store `identity` under a fresh token and return the token.
    #[instrument(skip(self, identity), fields(kind = identity.kind().as_str()))]
    pub fn save(&self, identity: &ClientIdentity) -> Result<String> {
        let payload = serde_json::to_string(identity)
            .map_err(|e| Error::serialization(format!("Failed to encode token payload: {}", e)))?;
        let token = generate_token()?;

        self.store.put(token.clone(), payload, self.ttl_for(identity.kind()));

        if let Some(previous) = self.owners.insert(identity.clone(), token.clone()) {
            self.store.delete(&previous);
            debug!("revoked previous token for identity");
        }

        metrics::record_token_issued(identity.kind().as_str());
        Ok(token)
    }

    /// Look up the payload behind `token` without consuming it.
    pub fn resolve<T: DeserializeOwned>(&self, token: &str) -> Result<T> {
        let payload = self.store.get(token).ok_or_else(|| Error::not_found("token"))?;
        decode(&payload)
    }

    /// Remove `token`. Unknown tokens are ignored.
    pub fn delete(&self, token: &str) {
        if let Some(payload) = self.store.take(token) {
            self.release_owner(&payload, token);
        } else {
            self.store.delete(token);
        }
    }

    /// Resolve and delete `token` in one step.
    ///
    /// Of several concurrent callers presenting the same token, only one gets
    /// the payload; the others see `NotFound`.
    pub fn consume<T: DeserializeOwned>(&self, token: &str) -> Result<T> {
        let payload = self.store.take(token).ok_or_else(|| Error::not_found("token"))?;
        self.release_owner(&payload, token);
        decode(&payload)
    }

    /// Drop expired tokens and their owner entries. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let purged: HashSet<String> = self.store.purge_expired().into_iter().collect();
        if !purged.is_empty() {
            self.owners.retain(|_, token| !purged.contains(token));
        }
        metrics::record_tokens_purged(purged.len(), self.store.len());
        purged.len()
    }

    /// Periodically purge expired tokens until the task is aborted.
    pub fn spawn_purge_task(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let purged = self.purge_expired();
                if purged > 0 {
                    info!(purged, "purged expired provisioning tokens");
                }
            }
        })
    }

    fn release_owner(&self, payload: &str, token: &str) {
        if let Ok(identity) = serde_json::from_str::<ClientIdentity>(payload) {
            self.owners.remove_if(&identity, |_, owned| owned == token);
        }
    }
}

fn decode<T: DeserializeOwned>(payload: &str) -> Result<T> {
    serde_json::from_str(payload)
        .map_err(|e| Error::internal(format!("Stored token payload is unreadable: {}", e)))
}

/// 32 bytes from the OS RNG, URL-safe base64 without padding.
fn generate_token() -> Result<String> {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| Error::generation(format!("Entropy source unavailable: {}", e)))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}
