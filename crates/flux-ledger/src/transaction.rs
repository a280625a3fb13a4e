//! Nested transaction scopes over energy stores.
//!
//! A [`Transaction`] is a stack of scopes. Each scope journals the stores
//! touched while it was the innermost scope, together with the amount each
//! store held just before that first touch. Stores apply their changes
//! eagerly, so reads inside the transaction see provisional values.
//!
//! - Aborting a scope hands every journaled snapshot back to its store.
//! - Committing a nested scope merges its journal into the parent; a store
//!   already journaled by the parent keeps the parent's (older) snapshot.
//! - Committing the outer scope calls [`Participant::on_final_commit`] once
//!   per journaled store, in first-touch order.
//!
//! Closing the outer scope consumes the transaction, so committing twice or
//! touching a store after commit does not compile.

use flux_types::{Energy, StoreId};
use tracing::{debug, error};

use crate::TransactionError;

// ---------------------------------------------------------------------------
// Participant seams
// ---------------------------------------------------------------------------

/// A store that can take part in a [`Transaction`].
pub trait Participant {
    /// Put back the amount recorded when the store was enlisted.
    fn restore_snapshot(&mut self, snapshot: Energy);

    /// Called exactly once when the outermost scope that touched this store
    /// commits. Never called for nested commits or aborts.
    fn on_final_commit(&mut self);
}

/// Resolves journaled store IDs back to live stores when a scope closes.
///
/// The transaction never owns stores; whoever closes a scope supplies the
/// stores that were touched under it.
pub trait Participants {
    /// Look up the participant for `id`, if it is reachable from here.
    fn participant_mut(&mut self, id: StoreId) -> Option<&mut dyn Participant>;
}

// ---------------------------------------------------------------------------
// Scope journal
// ---------------------------------------------------------------------------

/// Snapshots taken while one scope was innermost, in first-touch order.
#[derive(Debug, Default)]
struct Scope {
    journal: Vec<(StoreId, Energy)>,
}

impl Scope {
    fn contains(&self, id: StoreId) -> bool {
        self.journal.iter().any(|(entry, _)| *entry == id)
    }

    fn record(&mut self, id: StoreId, snapshot: Energy) {
        if !self.contains(id) {
            self.journal.push((id, snapshot));
        }
    }
}

// ---------------------------------------------------------------------------
// Transaction
// ---------------------------------------------------------------------------

/// A unit of provisional, rollback-capable mutation, possibly nested.
#[derive(Debug)]
#[must_use = "a transaction must be committed or aborted"]
pub struct Transaction {
    /// `scopes[0]` is the outer scope; the last element is innermost.
    scopes: Vec<Scope>,
    closed: bool,
}

impl Transaction {
    /// Open a new outer transaction.
    pub fn open_outer() -> Self {
        Self {
            scopes: vec![Scope::default()],
            closed: false,
        }
    }

    /// Number of nested scopes currently open above the outer scope.
    pub fn depth(&self) -> usize {
        self.scopes.len().saturating_sub(1)
    }

    /// Returns `true` if `id` is journaled in any open scope.
    pub fn is_enlisted(&self, id: StoreId) -> bool {
        self.scopes.iter().any(|scope| scope.contains(id))
    }

    /// Record that `id` is about to change from `snapshot`.
    ///
    /// Stores call this before every mutation. Only the first call per store
    /// per scope is kept; later calls are no-ops.
    pub fn enlist(&mut self, id: StoreId, snapshot: Energy) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.record(id, snapshot);
        }
    }

    /// Open a nested scope on top of the current innermost scope.
    pub fn open_nested(&mut self) {
        self.scopes.push(Scope::default());
    }

    /// Commit the innermost nested scope into its parent.
    ///
    /// Nothing is finalized; the parent still decides the outcome.
    ///
    /// # Errors
    ///
    /// Returns [`TransactionError::NoNestedScope`] if only the outer scope is
    /// open.
    pub fn commit_nested(&mut self) -> Result<(), TransactionError> {
        let scope = self.pop_nested()?;
        if let Some(parent) = self.scopes.last_mut() {
            for (id, snapshot) in scope.journal {
                parent.record(id, snapshot);
            }
        }
        Ok(())
    }

    /// Abort the innermost nested scope, restoring every store it touched.
    ///
    /// Changes made by enclosing scopes are left in place.
    ///
    /// # Errors
    ///
    /// Returns [`TransactionError::NoNestedScope`] if only the outer scope is
    /// open, or [`TransactionError::UnknownParticipant`] if a journaled store
    /// cannot be resolved.
    pub fn abort_nested<P>(&mut self, participants: &mut P) -> Result<(), TransactionError>
    where
        P: Participants + ?Sized,
    {
        let scope = self.pop_nested()?;
        rollback(scope, participants)
    }

    /// Run `op` inside a nested scope that is always aborted afterwards.
    ///
    /// Used to ask "how much would this move?" without moving anything.
    ///
    /// # Errors
    ///
    /// Propagates errors from closing the nested scope.
    pub fn simulate<P, R, F>(&mut self, participants: &mut P, op: F) -> Result<R, TransactionError>
    where
        P: Participants + ?Sized,
        F: FnOnce(&mut Self, &mut P) -> R,
    {
        self.open_nested();
        let result = op(self, participants);
        self.abort_nested(participants)?;
        Ok(result)
    }

    /// Commit the outer scope, finalizing every enlisted store once.
    ///
    /// Returns the number of stores finalized. Every journaled store is
    /// resolved before any of them is finalized, so a missing store leaves
    /// no store half-committed.
    ///
    /// # Errors
    ///
    /// Returns [`TransactionError::NestedScopeOpen`] if nested scopes are
    /// still open, or [`TransactionError::UnknownParticipant`] if a
    /// journaled store cannot be resolved. Either way the whole transaction
    /// is rolled back first and nothing is finalized.
    pub fn commit<P>(mut self, participants: &mut P) -> Result<usize, TransactionError>
    where
        P: Participants + ?Sized,
    {
        self.closed = true;
        let depth = self.depth();
        if depth > 0 {
            error!(depth, "commit with nested scopes open, rolling back");
            rollback_all(std::mem::take(&mut self.scopes), participants)?;
            return Err(TransactionError::NestedScopeOpen { depth });
        }

        let outer = self.scopes.pop().unwrap_or_default();
        let missing = outer
            .journal
            .iter()
            .map(|(id, _)| *id)
            .find(|id| participants.participant_mut(*id).is_none());
        if let Some(missing) = missing {
            error!(store = %missing, "commit with unresolvable store, rolling back");
            if let Err(rollback_err) = rollback(outer, participants) {
                debug!(error = %rollback_err, "rollback skipped unresolvable store");
            }
            return Err(TransactionError::UnknownParticipant(missing));
        }

        let mut finalized: usize = 0;
        for (id, _) in &outer.journal {
            if let Some(participant) = participants.participant_mut(*id) {
                participant.on_final_commit();
                finalized = finalized.saturating_add(1);
            }
        }
        debug!(finalized, "transaction committed");
        Ok(finalized)
    }

    /// Abort the whole transaction, restoring every store to the amount it
    /// held before the transaction first touched it.
    ///
    /// # Errors
    ///
    /// Returns [`TransactionError::UnknownParticipant`] if a journaled store
    /// cannot be resolved. Every resolvable store is still restored.
    pub fn abort<P>(mut self, participants: &mut P) -> Result<(), TransactionError>
    where
        P: Participants + ?Sized,
    {
        self.closed = true;
        rollback_all(std::mem::take(&mut self.scopes), participants)?;
        debug!("transaction aborted");
        Ok(())
    }

    fn pop_nested(&mut self) -> Result<Scope, TransactionError> {
        if self.scopes.len() < 2 {
            return Err(TransactionError::NoNestedScope);
        }
        self.scopes.pop().ok_or(TransactionError::NoNestedScope)
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if !self.closed {
            error!(
                depth = self.depth(),
                "transaction dropped without commit or abort; provisional changes remain applied"
            );
        }
    }
}

/// Restore every store in one scope, newest touch first.
fn rollback<P>(scope: Scope, participants: &mut P) -> Result<(), TransactionError>
where
    P: Participants + ?Sized,
{
    let mut missing = None;
    for (id, snapshot) in scope.journal.into_iter().rev() {
        match participants.participant_mut(id) {
            Some(participant) => participant.restore_snapshot(snapshot),
            None => {
                missing.get_or_insert(id);
            }
        }
    }
    missing.map_or(Ok(()), |id| Err(TransactionError::UnknownParticipant(id)))
}

/// Restore every scope, innermost first.
fn rollback_all<P>(scopes: Vec<Scope>, participants: &mut P) -> Result<(), TransactionError>
where
    P: Participants + ?Sized,
{
    let mut first_error = None;
    for scope in scopes.into_iter().rev() {
        if let Err(err) = rollback(scope, participants) {
            first_error.get_or_insert(err);
        }
    }
    first_error.map_or(Ok(()), Err)
}
