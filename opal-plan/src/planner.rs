//! The three-pass protocol driver and the execution-time handle.

use crate::producer::{ProduceError, ValueProducer};
use opal_core::error::VaultError;
use opal_core::id::{DisplayId, ExprId, TransportId};
use opal_core::secret_use::SecretUse;
use opal_vault::{Vault, VaultSecretProvider};
use serde_json::Value;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Errors from driving the vault through the plan protocol.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum PlanError {
    /// A vault operation failed.
    #[error("vault error: {0}")]
    Vault(#[from] VaultError),

    /// A value producer failed.
    #[error("producer error: {0}")]
    Produce(#[from] ProduceError),

    /// The producer returned no value for a raw in the batch.
    #[error("producer returned no value for: {0}")]
    MissingValue(String),
}

/// Which pruning runs during finalize. A planner decision, not a vault
/// decision: `Untouched` drops unexecuted branches, `Unused` drops
/// never-referenced expressions, `Both` runs untouched first so the
/// reference scan only sees reachable expressions.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrunePolicy {
    /// Drop expressions not on the executed path.
    #[default]
    Untouched,
    /// Drop expressions with no recorded references.
    Unused,
    /// Untouched, then unused.
    Both,
}

/// The plan-attached output of finalize: the sorted authority list and
/// its hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanContract {
    /// Sorted `(display_id, site)` authorities.
    pub secret_uses: Vec<SecretUse>,
    /// `sha256:<hex>` over the canonical JSON of `secret_uses`.
    pub contract_hash: String,
}

/// Hash of a sorted secret-use list: SHA-256 over its canonical JSON
/// serialization. Byte-stable across runs for the same program and
/// plan key.
pub fn contract_hash(uses: &[SecretUse]) -> String {
    let bytes = serde_json::to_vec(uses)
        .unwrap_or_else(|e| panic!("invariant violation: secret uses serialization failed: {e}"));
    format!("sha256:{}", hex::encode(Sha256::digest(&bytes)))
}

/// Drives a vault through the three planner passes.
///
/// 1. **Declare and track** — walk the program with the vault surface
///    ([`Planner::vault`]): push/pop path segments, declare variables,
///    track direct expressions, record references, reset decorator
///    counts at step boundaries.
/// 2. **Resolve** — [`Planner::resolve_batch`] per resolution batch:
///    mark touched, fetch the batch through one [`ValueProducer`] call,
///    store, then freeze with a single `resolve_all_touched`.
/// 3. **Finalize** — [`Planner::finalize`] prunes, builds the sorted
///    secret-use list and its contract hash, and degrades the handle to
///    an [`Executor`].
///
/// Plan-time `access` deliberately does not survive finalize: the
/// executor exposes only display-ID resolution and the scrub-pattern
/// provider, so execution code cannot reach the plan-time unwrap at
/// all.
pub struct Planner {
    vault: Vault,
}

impl Planner {
    /// Start planning with the given plan key (see [`Vault::new`]).
    pub fn new(plan_key: &[u8]) -> Self {
        Self {
            vault: Vault::new(plan_key),
        }
    }

    /// Wrap an existing vault.
    pub fn from_vault(vault: Vault) -> Self {
        Self { vault }
    }

    /// The full planning surface for pass 1.
    pub fn vault(&self) -> &Vault {
        &self.vault
    }

    /// Declare a variable that copies from another expression,
    /// inheriting its transport sensitivity. A chained variable fed by
    /// `@env.HOME` must not launder the value across a transport
    /// boundary just because it went through `@var` first.
    pub fn declare_chained(
        &self,
        name: &str,
        raw: &str,
        source: &ExprId,
    ) -> Result<ExprId, PlanError> {
        let id = if self.vault.is_expression_transport_sensitive(source)? {
            self.vault.declare_variable_transport_sensitive(name, raw)
        } else {
            self.vault.declare_variable(name, raw)
        };
        Ok(id)
    }

    /// Pass 2: resolve one batch. Marks every expression touched,
    /// produces all values in a single [`ValueProducer`] call, stores
    /// them, and freezes the batch with one `resolve_all_touched`.
    pub async fn resolve_batch(
        &self,
        producer: &dyn ValueProducer,
        ids: &[ExprId],
    ) -> Result<(), PlanError> {
        let mut raws = Vec::with_capacity(ids.len());
        for id in ids {
            self.vault.mark_touched(id)?;
            raws.push(self.vault.expression_raw(id)?);
        }
        let values = producer.produce(&raws).await?;
        for (id, raw) in ids.iter().zip(&raws) {
            let value = values
                .get(raw)
                .ok_or_else(|| PlanError::MissingValue(raw.clone()))?;
            self.vault.store_unresolved_value(id, value.clone())?;
        }
        self.vault.resolve_all_touched();
        tracing::debug!(batch = ids.len(), "plan.resolve_batch");
        Ok(())
    }

    /// Pass 3: prune per `policy`, emit the plan contract, and hand
    /// back the execution-time surface.
    pub fn finalize(self, policy: PrunePolicy) -> (PlanContract, Executor) {
        match policy {
            PrunePolicy::Untouched => self.vault.prune_untouched(),
            PrunePolicy::Unused => self.vault.prune_unused(),
            PrunePolicy::Both => {
                self.vault.prune_untouched();
                self.vault.prune_unused();
            }
        }
        let secret_uses = self.vault.build_secret_uses();
        let contract = PlanContract {
            contract_hash: contract_hash(&secret_uses),
            secret_uses,
        };
        tracing::debug!(
            uses = contract.secret_uses.len(),
            hash = %contract.contract_hash,
            "plan.finalized"
        );
        (contract, Executor { vault: self.vault })
    }
}

/// The execution-time surface of a finalized plan.
///
/// Decorators never see the vault; the runtime resolves the display IDs
/// embedded in command strings through this handle, under the transport
/// rule, and feeds the scrubber from the pattern provider. There is no
/// site authorization here — plan integrity is the contract hash's job.
#[derive(Clone)]
pub struct Executor {
    vault: Vault,
}

impl Executor {
    /// Resolve a display ID to its cleartext value, enforcing the
    /// transport boundary against the caller's current transport.
    pub fn resolve_display_id(
        &self,
        display_id: &DisplayId,
        current_transport: &TransportId,
    ) -> Result<Value, VaultError> {
        self.vault
            .resolve_display_id_with_transport(display_id, current_transport)
    }

    /// The scrubber-facing pattern provider for this plan's secrets.
    pub fn secret_provider(&self) -> VaultSecretProvider {
        self.vault.secret_provider()
    }
}
