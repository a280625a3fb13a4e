//! Surplus distribution from one store to its neighbors.
//!
//! [`Distributor::spread`] runs in four steps:
//!
//! 1. **Discovery** -- probe each direction in a fixed order and keep the
//!    neighbors that expose an insertable, non-full store on the face
//!    pointing back at the source.
//! 2. **Early exit** -- with no candidates, nothing is opened or touched.
//! 3. **Distribution** -- in one outer transaction: extract everything the
//!    source will give, offer each candidate its share (simulated first in
//!    an aborted nested scope, then inserted for real), credit the shortfall
//!    back to the source, and commit.
//! 4. **Notification** -- if the source amount changed, notify the owner
//!    through the two-tier capability dispatch.
//!
//! Energy is conserved: the source loses exactly what the candidates gain.

use serde::Serialize;
use tracing::{debug, error, trace};

use flux_ledger::{Participant, Participants, StoreDelta, Transaction};
use flux_types::{BlockPos, Direction, Energy, SpreadMode, StoreId};

use crate::error::EnergyError;
use crate::owner::{Notification, StorageOwner, notify_owner};
use crate::store::SpreadSource;
use crate::world::{PositionSet, WorldContext};

// ---------------------------------------------------------------------------
// Options and outcome
// ---------------------------------------------------------------------------

/// Per-call configuration for [`Distributor::spread`].
#[derive(Clone, Copy, Default)]
pub struct SpreadOptions<'a> {
    /// Neighbor positions never offered energy.
    pub excluded: Option<&'a dyn PositionSet>,
    /// How the surplus is divided.
    pub mode: SpreadMode,
}

impl<'a> SpreadOptions<'a> {
    /// Skip every neighbor in `positions`.
    #[must_use]
    pub fn excluding(mut self, positions: &'a dyn PositionSet) -> Self {
        self.excluded = Some(positions);
        self
    }

    /// Use the given distribution mode.
    #[must_use]
    pub const fn with_mode(mut self, mode: SpreadMode) -> Self {
        self.mode = mode;
        self
    }
}

impl core::fmt::Debug for SpreadOptions<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SpreadOptions")
            .field("excluded", &self.excluded.is_some())
            .field("mode", &self.mode)
            .finish()
    }
}

/// What one [`Distributor::spread`] call did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpreadOutcome {
    /// Eligible neighbors found during discovery.
    pub candidates: usize,
    /// Energy taken out of the source.
    pub extracted: Energy,
    /// Energy placed into candidates.
    pub inserted: Energy,
    /// Energy credited back to the source.
    pub returned: Energy,
    /// Source amount before the call.
    pub source_before: Energy,
    /// Source amount after the call.
    pub source_after: Energy,
    /// Before/after amounts for the source and every candidate.
    pub deltas: Vec<StoreDelta>,
    /// How the owner was notified, if the source amount changed.
    pub notification: Option<Notification>,
}

impl SpreadOutcome {
    /// The outcome of a call that found no candidates.
    pub const fn idle(source_amount: Energy) -> Self {
        Self {
            candidates: 0,
            extracted: 0,
            inserted: 0,
            returned: 0,
            source_before: source_amount,
            source_after: source_amount,
            deltas: Vec::new(),
            notification: None,
        }
    }

    /// Returns `true` if any energy left the source.
    pub const fn moved(&self) -> bool {
        self.inserted > 0
    }
}

// ---------------------------------------------------------------------------
// Distributor
// ---------------------------------------------------------------------------

/// Stateless surplus distributor.
///
/// Holds only the adjacency it probes, which defaults to the six faces in
/// [`Direction::ALL`] order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Distributor {
    directions: Vec<Direction>,
}

impl Default for Distributor {
    fn default() -> Self {
        Self::new()
    }
}

impl Distributor {
    /// A distributor probing all six faces.
    pub fn new() -> Self {
        Self {
            directions: Direction::ALL.to_vec(),
        }
    }

    /// A distributor probing only `directions`, in the given order.
    pub fn with_directions<I>(directions: I) -> Self
    where
        I: IntoIterator<Item = Direction>,
    {
        Self {
            directions: directions.into_iter().collect(),
        }
    }

    /// The probe order.
    pub fn directions(&self) -> &[Direction] {
        &self.directions
    }

    /// Push surplus from `source` at `pos` into neighboring stores.
    ///
    /// `owner` is the entity that owns `source`; it is notified when the
    /// source amount changes. `source` must not be reachable through
    /// `world` while this runs.
    ///
    /// # Errors
    ///
    /// Returns [`EnergyError::Transaction`] if the transaction is misused
    /// (a store disappears mid-call). The transaction is rolled back first.
    pub fn spread<W, S>(
        &self,
        owner: &mut dyn StorageOwner,
        world: &mut W,
        pos: BlockPos,
        source: &mut S,
        options: SpreadOptions<'_>,
    ) -> Result<SpreadOutcome, EnergyError>
    where
        W: WorldContext + ?Sized,
        S: SpreadSource,
    {
        let candidates = self.discover(&*world, pos, source.id(), options.excluded);
        let source_before = source.amount();

        if candidates.is_empty() {
            trace!(%pos, "no eligible neighbors, skipping spread");
            return Ok(SpreadOutcome::idle(source_before));
        }

        let mut scope = SpreadScope { source, world };
        let mut txn = Transaction::open_outer();
        let totals = match distribute(&mut txn, &mut scope, &candidates, options.mode) {
            Ok(totals) => totals,
            Err(err) => {
                if let Err(abort_err) = txn.abort(&mut scope) {
                    error!(%pos, error = %abort_err, "rollback after failed spread also failed");
                }
                return Err(err.into());
            }
        };
        txn.commit(&mut scope)?;

        let SpreadScope { source, world } = scope;
        let source_after = source.amount();
        let notification = (source_after != source_before).then(|| notify_owner(owner));

        let mut deltas = Vec::with_capacity(candidates.len().saturating_add(1));
        deltas.push(StoreDelta {
            id: source.id(),
            before: source_before,
            after: source_after,
        });
        deltas.extend(candidates.iter().map(|&(id, before)| StoreDelta {
            id,
            before,
            after: world.storage(id).map_or(before, |s| s.amount()),
        }));

        debug!(
            %pos,
            candidates = candidates.len(),
            extracted = totals.extracted,
            inserted = totals.inserted,
            returned = totals.returned,
            "spread committed"
        );

        Ok(SpreadOutcome {
            candidates: candidates.len(),
            extracted: totals.extracted,
            inserted: totals.inserted,
            returned: totals.returned,
            source_before,
            source_after,
            deltas,
            notification,
        })
    }

    /// Eligible neighbor stores with their current amounts, in probe order.
    fn discover<W>(
        &self,
        world: &W,
        pos: BlockPos,
        source: StoreId,
        excluded: Option<&dyn PositionSet>,
    ) -> Vec<(StoreId, Energy)>
    where
        W: WorldContext + ?Sized,
    {
        let mut found: Vec<(StoreId, Energy)> = Vec::with_capacity(self.directions.len());
        for &direction in &self.directions {
            let Some(neighbor) = pos.offset(direction) else {
                continue;
            };
            if excluded.is_some_and(|set| set.contains_pos(&neighbor)) {
                continue;
            }
            let Some(id) = world.find_storage(neighbor, direction.opposite()) else {
                continue;
            };
            if id == source || found.iter().any(|(seen, _)| *seen == id) {
                continue;
            }
            let Some(storage) = world.storage(id) else {
                continue;
            };
            if !storage.supports_insertion() || storage.is_full() {
                continue;
            }
            found.push((id, storage.amount()));
        }
        found
    }
}

// ---------------------------------------------------------------------------
// Distribution internals
// ---------------------------------------------------------------------------

/// Running totals of one distribution.
#[derive(Debug, Clone, Copy, Default)]
struct Totals {
    extracted: Energy,
    inserted: Energy,
    returned: Energy,
}

/// The stores one spread can touch: the source plus whatever the world
/// resolves.
struct SpreadScope<'a, W: ?Sized, S> {
    source: &'a mut S,
    world: &'a mut W,
}

impl<W, S> SpreadScope<'_, W, S>
where
    W: WorldContext + ?Sized,
    S: SpreadSource,
{
    /// Insert into a candidate; a candidate that vanished accepts nothing.
    fn insert_into(&mut self, id: StoreId, amount: Energy, txn: &mut Transaction) -> Energy {
        self.world
            .storage_mut(id)
            .map_or(0, |storage| storage.insert(amount, txn))
    }
}

impl<W, S> Participants for SpreadScope<'_, W, S>
where
    W: WorldContext + ?Sized,
    S: SpreadSource,
{
    fn participant_mut(&mut self, id: StoreId) -> Option<&mut dyn Participant> {
        if id == self.source.id() {
            return Some(self.source.as_participant_mut());
        }
        self.world
            .storage_mut(id)
            .map(|storage| storage.as_participant_mut())
    }
}

fn distribute<W, S>(
    txn: &mut Transaction,
    scope: &mut SpreadScope<'_, W, S>,
    candidates: &[(StoreId, Energy)],
    mode: SpreadMode,
) -> Result<Totals, flux_ledger::TransactionError>
where
    W: WorldContext + ?Sized,
    S: SpreadSource,
{
    let extracted = scope.source.extract(Energy::MAX, txn);
    let count = Energy::try_from(candidates.len()).unwrap_or(Energy::MAX);
    let share = extracted.checked_div(count).unwrap_or(0);

    let mut inserted: Energy = 0;
    for &(id, _) in candidates {
        let offer = if mode.is_equal() {
            share
        } else {
            extracted.saturating_sub(inserted)
        };
        let insertable = txn.simulate(scope, |txn, scope| scope.insert_into(id, offer, txn))?;
        let accepted = scope.insert_into(id, insertable, txn);
        inserted = inserted.saturating_add(accepted);
    }

    let returned = extracted.saturating_sub(inserted);
    if returned > 0 {
        scope.source.credit_remainder(returned, txn);
    }

    Ok(Totals {
        extracted,
        inserted,
        returned,
    })
}
