//! The vault: expression registry, scopes, site tracking, access control.

use crate::expr::Expression;
use crate::hashing;
use crate::path::PathStack;
use crate::provider::VaultSecretProvider;
use crate::scope::{ScopeTable, ROOT_SCOPE};
use opal_core::error::VaultError;
use opal_core::id::{DisplayId, ExprId, SiteId, TransportId};
use opal_core::secret_use::SecretUse;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use zeroize::Zeroizing;

/// Minimum plan key length accepted for production use.
pub const MIN_PLAN_KEY_BYTES: usize = 16;

/// Authorization granted at one concrete syntactic position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteRef {
    /// Canonical site path, e.g. `root/step-1/@shell[0]/params/command`.
    pub site: String,
    /// Keyed hash of `site`; empty in test mode.
    pub site_id: SiteId,
    /// Terminal parameter segment.
    pub param_name: String,
}

pub(crate) struct VaultState {
    pub(crate) exprs: HashMap<ExprId, Expression>,
    refs: HashMap<ExprId, Vec<SiteRef>>,
    touched: HashSet<ExprId>,
    display_index: HashMap<DisplayId, ExprId>,
    scopes: ScopeTable,
    path: PathStack,
    transport: TransportId,
}

/// The secret vault.
///
/// Owned by the planner as a plain value; cheaply clonable as a shared
/// handle once execution starts. All mutations arrive from the planner
/// thread, but every operation takes the internal reader-writer lock
/// because execution-time observers (the scrubber's pattern provider,
/// [`resolve_display_id_with_transport`](Vault::resolve_display_id_with_transport))
/// run concurrently on worker threads.
///
/// Recoverable failures return [`VaultError`]. Programmer errors —
/// popping root, conflicting duplicate declarations, plan-time access
/// without a plan key, resolving a touched expression that has no
/// stored value — panic with a diagnostic.
#[derive(Clone)]
pub struct Vault {
    plan_key: Arc<Zeroizing<Vec<u8>>>,
    state: Arc<RwLock<VaultState>>,
}

impl Vault {
    /// Construct a vault with a plan key.
    ///
    /// The key must be at least [`MIN_PLAN_KEY_BYTES`] long. An *empty*
    /// key selects test-only mode: site IDs collapse to the empty
    /// string and [`access`](Vault::access) refuses to run. Production
    /// callers must supply a key.
    ///
    /// # Panics
    ///
    /// On a non-empty key shorter than [`MIN_PLAN_KEY_BYTES`].
    pub fn new(plan_key: &[u8]) -> Self {
        if !plan_key.is_empty() && plan_key.len() < MIN_PLAN_KEY_BYTES {
            panic!(
                "invariant violation: plan key must be at least {MIN_PLAN_KEY_BYTES} bytes, got {}",
                plan_key.len()
            );
        }
        Self {
            plan_key: Arc::new(Zeroizing::new(plan_key.to_vec())),
            state: Arc::new(RwLock::new(VaultState {
                exprs: HashMap::new(),
                refs: HashMap::new(),
                touched: HashSet::new(),
                display_index: HashMap::new(),
                scopes: ScopeTable::new(),
                path: PathStack::new(),
                transport: TransportId::local(),
            })),
        }
    }

    /// Construct a test-only vault with no plan key.
    pub fn unkeyed() -> Self {
        Self::new(b"")
    }

    /// Copy of the plan key. The key itself is immutable for the life
    /// of the vault.
    pub fn plan_key(&self) -> Vec<u8> {
        self.plan_key.to_vec()
    }

    fn read(&self) -> RwLockReadGuard<'_, VaultState> {
        self.state.read().expect("vault lock poisoned")
    }

    fn write(&self) -> RwLockWriteGuard<'_, VaultState> {
        self.state.write().expect("vault lock poisoned")
    }

    // ── path stack ──────────────────────────────────────────────────

    /// Add a path segment. Decorator names (leading `@`) return their
    /// 0-based per-name per-level instance index; other segments
    /// return -1.
    pub fn push(&self, name: &str) -> i32 {
        self.write().path.push(name)
    }

    /// Remove the top path segment.
    ///
    /// # Panics
    ///
    /// Popping root is a programmer error.
    pub fn pop(&self) {
        self.write().path.pop();
    }

    /// Zero the decorator counters. Called by the planner at step
    /// boundaries (and nowhere else) so sibling decorator instances
    /// restart at `[0]` within each step.
    pub fn reset_counts(&self) {
        self.write().path.reset_counts();
    }

    // ── transport context ───────────────────────────────────────────

    /// Enter a transport scope, e.g. `ssh:server1`.
    pub fn enter_transport(&self, scope: impl Into<TransportId>) {
        self.write().transport = scope.into();
    }

    /// Return to the local transport.
    pub fn exit_transport(&self) {
        self.write().transport = TransportId::local();
    }

    /// The current transport context.
    pub fn current_transport(&self) -> TransportId {
        self.read().transport.clone()
    }

    // ── declaration and tracking ────────────────────────────────────

    /// Register a variable in the current variable scope.
    pub fn declare_variable(&self, name: &str, raw: &str) -> ExprId {
        self.declare(name, raw, false)
    }

    /// Register a transport-sensitive variable in the current variable
    /// scope. Its value will never resolve outside the transport it is
    /// declared in.
    pub fn declare_variable_transport_sensitive(&self, name: &str, raw: &str) -> ExprId {
        self.declare(name, raw, true)
    }

    fn declare(&self, name: &str, raw: &str, transport_sensitive: bool) -> ExprId {
        let mut state = self.write();
        let id = state.intern(raw, transport_sensitive);
        let chain = state.path.scope_chain();
        let scope = chain.last().cloned().unwrap_or_else(|| ROOT_SCOPE.into());
        state.scopes.ensure_chain(&chain);
        state.scopes.bind(&scope, name, id.clone());
        tracing::debug!(name, expr_id = %id, scope = %scope, "vault.declare");
        id
    }

    /// Register a direct (anonymous) value expression. Deduplicated
    /// per (transport, raw).
    pub fn track_expression(&self, raw: &str) -> ExprId {
        self.write().intern(raw, false)
    }

    /// As [`track_expression`](Vault::track_expression), but
    /// transport-sensitive.
    pub fn track_expression_transport_sensitive(&self, raw: &str) -> ExprId {
        self.write().intern(raw, true)
    }

    /// Walk scope parents from the current variable scope to root and
    /// return the first binding of `name`.
    pub fn lookup_variable(&self, name: &str) -> Result<ExprId, VaultError> {
        let state = self.read();
        let scope = state.path.scope_path();
        state
            .scopes
            .lookup(&scope, name)
            .ok_or_else(|| VaultError::VariableNotFound(name.to_owned()))
    }

    /// The raw source text of an expression. Decorator providers fetch
    /// values by raw text, so resolution batches carry these.
    pub fn expression_raw(&self, id: &ExprId) -> Result<String, VaultError> {
        let state = self.read();
        state
            .exprs
            .get(id)
            .map(|e| e.raw().to_owned())
            .ok_or_else(|| VaultError::NotFound(id.to_string()))
    }

    /// Whether the expression is transport-sensitive. Planners use this
    /// to propagate sensitivity through chained variables.
    pub fn is_expression_transport_sensitive(&self, id: &ExprId) -> Result<bool, VaultError> {
        let state = self.read();
        state
            .exprs
            .get(id)
            .map(Expression::is_transport_sensitive)
            .ok_or_else(|| VaultError::NotFound(id.to_string()))
    }

    // ── references and touch tracking ───────────────────────────────

    /// Record that the current site references the expression through
    /// the named parameter. No transport or authorization checks run
    /// here; those happen at access and at plan build.
    pub fn record_reference(&self, id: &ExprId, param_name: &str) -> Result<(), VaultError> {
        let mut state = self.write();
        if !state.exprs.contains_key(id) {
            return Err(VaultError::NotFound(id.to_string()));
        }
        let site = state.path.site(param_name);
        let site_id = hashing::site_id(&self.plan_key, &site);
        tracing::debug!(expr_id = %id, site = %site, "vault.reference");
        state.refs.entry(id.clone()).or_default().push(SiteRef {
            site,
            site_id,
            param_name: param_name.to_owned(),
        });
        Ok(())
    }

    /// Mark the expression as lying on an actually-executed path.
    pub fn mark_touched(&self, id: &ExprId) -> Result<(), VaultError> {
        let mut state = self.write();
        if !state.exprs.contains_key(id) {
            return Err(VaultError::NotFound(id.to_string()));
        }
        state.touched.insert(id.clone());
        Ok(())
    }

    /// Whether the expression is marked touched.
    pub fn is_touched(&self, id: &ExprId) -> bool {
        self.read().touched.contains(id)
    }

    // ── resolution ──────────────────────────────────────────────────

    /// Store the resolved value for a declared expression. Duplicate
    /// calls are no-ops, which is what lets deduplicated expressions
    /// resolve once across many declaration sites.
    pub fn store_unresolved_value(&self, id: &ExprId, value: Value) -> Result<(), VaultError> {
        let mut state = self.write();
        let expr = state
            .exprs
            .get_mut(id)
            .ok_or_else(|| VaultError::NotFound(id.to_string()))?;
        if expr.resolved || expr.value.is_some() {
            return Ok(());
        }
        expr.value = Some(value);
        Ok(())
    }

    /// Freeze every touched expression that has a stored value:
    /// set `resolved`, compute the display ID, and index it. The
    /// declared transport is never rewritten.
    ///
    /// # Panics
    ///
    /// A touched expression with no stored value is an invariant
    /// violation.
    pub fn resolve_all_touched(&self) {
        let mut state = self.write();
        let touched: Vec<ExprId> = state.touched.iter().cloned().collect();
        let mut resolved_now = 0usize;
        for id in touched {
            let expr = state
                .exprs
                .get_mut(&id)
                .unwrap_or_else(|| panic!("invariant violation: touched unknown expression {id}"));
            if expr.resolved {
                continue;
            }
            let Some(value) = expr.value.as_ref() else {
                panic!("invariant violation: touched expression {id} has no stored value");
            };
            expr.display_id = hashing::display_id(&self.plan_key, value);
            expr.resolved = true;
            let display_id = expr.display_id.clone();
            state.display_index.insert(display_id, id);
            resolved_now += 1;
        }
        tracing::debug!(count = resolved_now, "vault.resolve_all_touched");
    }

    // ── pruning ─────────────────────────────────────────────────────

    /// Remove expressions with no recorded references.
    pub fn prune_unused(&self) {
        let mut state = self.write();
        let dead: Vec<ExprId> = state
            .exprs
            .keys()
            .filter(|id| state.refs.get(*id).is_none_or(|refs| refs.is_empty()))
            .cloned()
            .collect();
        state.remove_all(&dead);
        tracing::debug!(count = dead.len(), "vault.prune_unused");
    }

    /// Remove expressions not on the executed path.
    pub fn prune_untouched(&self) {
        let mut state = self.write();
        let dead: Vec<ExprId> = state
            .exprs
            .keys()
            .filter(|id| !state.touched.contains(*id))
            .cloned()
            .collect();
        state.remove_all(&dead);
        tracing::debug!(count = dead.len(), "vault.prune_untouched");
    }

    // ── plan output ─────────────────────────────────────────────────

    /// One [`SecretUse`] per (resolved, referenced, touched) expression
    /// × site, sorted by `(display_id, site)` for byte-stable contract
    /// hashing.
    pub fn build_secret_uses(&self) -> Vec<SecretUse> {
        let state = self.read();
        let mut uses = Vec::new();
        for (id, expr) in &state.exprs {
            if !expr.resolved || !state.touched.contains(id) {
                continue;
            }
            let Some(refs) = state.refs.get(id) else {
                continue;
            };
            for site_ref in refs {
                uses.push(SecretUse {
                    display_id: expr.display_id.clone(),
                    site: site_ref.site.clone(),
                    site_id: site_ref.site_id.clone(),
                });
            }
        }
        uses.sort();
        uses
    }

    // ── unwrap primitives ───────────────────────────────────────────

    /// Plan-time unwrap: return the value if the current site holds
    /// authority over the expression and the transport boundary allows
    /// it.
    ///
    /// # Panics
    ///
    /// In test mode (empty plan key): plan-time access requires an
    /// unforgeable site identity.
    pub fn access(&self, id: &ExprId, param_name: &str) -> Result<Value, VaultError> {
        if self.plan_key.is_empty() {
            panic!("invariant violation: access requires a plan key");
        }
        let state = self.read();
        let expr = state
            .exprs
            .get(id)
            .ok_or_else(|| VaultError::NotFound(id.to_string()))?;
        if !expr.resolved {
            return Err(VaultError::NotResolved(id.to_string()));
        }
        check_transport(expr, id, &state.transport)?;
        let site = state.path.site(param_name);
        let site_id = hashing::site_id(&self.plan_key, &site);
        let authorized = state
            .refs
            .get(id)
            .is_some_and(|refs| refs.iter().any(|r| r.site_id == site_id));
        if !authorized {
            tracing::warn!(expr_id = %id, site = %site, "vault.access.denied");
            return Err(VaultError::Unauthorized {
                expr_id: id.to_string(),
                site,
            });
        }
        Ok(expr.value.clone().expect("resolved expression has a value"))
    }

    /// Execution-time unwrap: resolve a display ID back to its value
    /// under the transport rule. No site authorization runs here — plan
    /// integrity is covered by the contract hash over the sorted
    /// [`SecretUse`] list.
    pub fn resolve_display_id_with_transport(
        &self,
        display_id: &DisplayId,
        current_transport: &TransportId,
    ) -> Result<Value, VaultError> {
        let state = self.read();
        let id = state
            .display_index
            .get(display_id)
            .ok_or_else(|| VaultError::DisplayIdNotFound(display_id.to_string()))?;
        let expr = state
            .exprs
            .get(id)
            .unwrap_or_else(|| panic!("invariant violation: display index points at pruned {id}"));
        if !expr.resolved {
            panic!("invariant violation: unresolved display id {display_id} at execution");
        }
        check_transport(expr, id, current_transport)?;
        Ok(expr.value.clone().expect("resolved expression has a value"))
    }

    /// Scrubber-facing handle over the vault's resolved expressions.
    /// Pattern reads are lazy: each call sees the current state.
    pub fn secret_provider(&self) -> VaultSecretProvider {
        VaultSecretProvider::new(Arc::clone(&self.state))
    }
}

fn check_transport(
    expr: &Expression,
    id: &ExprId,
    current: &TransportId,
) -> Result<(), VaultError> {
    if expr.transport_sensitive && expr.declared_transport != *current {
        tracing::warn!(
            expr_id = %id,
            declared = %expr.declared_transport,
            current = %current,
            "vault.transport.denied"
        );
        return Err(VaultError::TransportBoundary {
            expr_id: id.to_string(),
            declared: expr.declared_transport.to_string(),
            current: current.to_string(),
        });
    }
    Ok(())
}

impl VaultState {
    /// Register (or find) the expression for `raw` under the current
    /// transport.
    ///
    /// # Panics
    ///
    /// A duplicate declaration that disagrees on transport sensitivity
    /// is a programmer error.
    fn intern(&mut self, raw: &str, transport_sensitive: bool) -> ExprId {
        let id = hashing::expr_id(&self.transport, raw);
        match self.exprs.get(&id) {
            Some(existing) => {
                if existing.transport_sensitive != transport_sensitive {
                    panic!(
                        "invariant violation: duplicate declaration of {id} disagrees on \
                         transport sensitivity"
                    );
                }
            }
            None => {
                self.exprs.insert(
                    id.clone(),
                    Expression::new(raw.to_owned(), transport_sensitive, self.transport.clone()),
                );
            }
        }
        id
    }

    fn remove_all(&mut self, dead: &[ExprId]) {
        for id in dead {
            if let Some(expr) = self.exprs.remove(id) {
                if !expr.display_id.is_empty() {
                    self.display_index.remove(&expr.display_id);
                }
            }
            self.refs.remove(id);
            self.touched.remove(id);
        }
    }
}

pub(crate) fn provider_patterns(state: &VaultState) -> Vec<opal_core::pattern::ScrubPattern> {
    let mut patterns = Vec::new();
    for expr in state.exprs.values() {
        if !expr.resolved {
            continue;
        }
        let Some(value) = expr.value.as_ref() else {
            continue;
        };
        let bytes = opal_core::value::canonical_bytes(value);
        if bytes.is_empty() {
            continue;
        }
        patterns.push(opal_core::pattern::ScrubPattern::new(
            bytes,
            expr.display_id.as_str().as_bytes().to_vec(),
        ));
    }
    patterns
}
