#![deny(missing_docs)]
//! Planner-facing adapter for the opal vault.
//!
//! The vault is operated in three passes, and this crate is the
//! protocol: [`Planner`] drives declare/track (pass 1, through the raw
//! vault surface), batched resolution against a [`ValueProducer`]
//! (pass 2), and finalize (pass 3) — prune, emit the sorted
//! [`SecretUse`](opal_core::SecretUse) list with its contract hash,
//! and degrade to an [`Executor`] that can only resolve display IDs
//! and feed the scrubber.
//!
//! The degradation is the point: plan-time `access` does not exist on
//! the execution surface, so the safest reading of the two-API design
//! is enforced by construction rather than convention.

mod planner;
mod producer;

pub use planner::{contract_hash, Executor, PlanContract, PlanError, Planner, PrunePolicy};
pub use producer::{ProduceError, ValueProducer};
