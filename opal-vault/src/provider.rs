//! The scrubber-facing view of the vault.

use crate::vault::{provider_patterns, VaultState};
use opal_core::pattern::{ScrubPattern, SecretProvider};
use std::sync::{Arc, RwLock};

/// Live handle over the vault's resolved expressions.
///
/// Cheaply clonable; shares state with the vault that produced it.
/// Every [`patterns`](SecretProvider::patterns) call takes the vault's
/// read lock and recomputes the pair list, so secrets resolved after
/// the scrubber started are redacted from the next chunk onward.
#[derive(Clone)]
pub struct VaultSecretProvider {
    state: Arc<RwLock<VaultState>>,
}

impl VaultSecretProvider {
    pub(crate) fn new(state: Arc<RwLock<VaultState>>) -> Self {
        Self { state }
    }
}

impl SecretProvider for VaultSecretProvider {
    fn patterns(&self) -> Vec<ScrubPattern> {
        let state = self.state.read().expect("vault lock poisoned");
        provider_patterns(&state)
    }
}
