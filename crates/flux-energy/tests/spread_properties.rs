//! Randomized checks of the distribution invariants.
//!
//! Each case builds a source surrounded by up to six neighbors with random
//! capacities, rates, and fill levels, spreads once, and checks:
//!
//! - energy is conserved across the source and every neighbor;
//! - no store ends above its capacity;
//! - in equal mode, no neighbor gains more than its share;
//! - excluded neighbors are never touched.
//!
//! Seeds are fixed so failures reproduce.

// Integration tests use expect/unwrap extensively for clarity -- panicking
// on failure is the correct behavior in test code.
#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects
)]

use std::collections::{BTreeMap, BTreeSet};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use flux_energy::{
    Distributor, EnergyStorage, EnergyStore, GenericUpdate, SpreadOptions, StorageOwner,
    SyncedEnergyStore, WorldContext,
};
use flux_types::{BlockPos, Direction, Energy, EntityId, SpreadMode, StoreId, WorldSide};

const ORIGIN: BlockPos = BlockPos::new(0, 0, 0);
const CASES: u64 = 200;

#[derive(Default)]
struct Neighbors {
    at: BTreeMap<BlockPos, StoreId>,
    stores: BTreeMap<StoreId, EnergyStore>,
}

impl Neighbors {
    fn total(&self) -> u128 {
        self.stores.values().map(|s| u128::from(s.amount())).sum()
    }

    fn amount_at(&self, pos: BlockPos) -> Option<Energy> {
        let id = self.at.get(&pos)?;
        self.stores.get(id).map(EnergyStorage::amount)
    }
}

impl WorldContext for Neighbors {
    fn find_storage(&self, pos: BlockPos, _side: Direction) -> Option<StoreId> {
        self.at.get(&pos).copied()
    }

    fn storage(&self, id: StoreId) -> Option<&dyn EnergyStorage> {
        self.stores.get(&id).map(|s| s as &dyn EnergyStorage)
    }

    fn storage_mut(&mut self, id: StoreId) -> Option<&mut dyn EnergyStorage> {
        self.stores.get_mut(&id).map(|s| s as &mut dyn EnergyStorage)
    }
}

struct Owner {
    id: EntityId,
    marks: u32,
}

impl GenericUpdate for Owner {
    fn mark_dirty(&mut self) {
        self.marks += 1;
    }
}

impl StorageOwner for Owner {
    fn entity_id(&self) -> EntityId {
        self.id
    }

    fn world_side(&self) -> Option<WorldSide> {
        Some(WorldSide::Server)
    }

    fn as_generic(&mut self) -> Option<&mut dyn GenericUpdate> {
        Some(self as &mut dyn GenericUpdate)
    }
}

fn random_store(rng: &mut StdRng) -> EnergyStore {
    let capacity = rng.random_range(1..=500);
    let max_insert = rng.random_range(0..=capacity);
    let max_extract = rng.random_range(0..=capacity);
    let amount = rng.random_range(0..=capacity);
    EnergyStore::new(capacity, max_insert, max_extract)
        .and_then(|s| s.with_amount(amount))
        .expect("valid store")
}

fn random_case(rng: &mut StdRng) -> (SyncedEnergyStore, Neighbors) {
    let source = SyncedEnergyStore::from_store(EntityId::new(), random_store(rng));
    let mut neighbors = Neighbors::default();
    for direction in Direction::ALL {
        if rng.random_bool(0.7) {
            let store = random_store(rng);
            let pos = ORIGIN.offset(direction).expect("in range");
            neighbors.at.insert(pos, store.id());
            neighbors.stores.insert(store.id(), store);
        }
    }
    (source, neighbors)
}

fn check_case(seed: u64, mode: SpreadMode) {
    let mut rng = StdRng::seed_from_u64(seed);
    let (mut source, mut neighbors) = random_case(&mut rng);
    let mut owner = Owner {
        id: source.owner_id(),
        marks: 0,
    };

    let excluded: BTreeSet<BlockPos> = Direction::ALL
        .into_iter()
        .filter(|_| rng.random_bool(0.2))
        .filter_map(|d| ORIGIN.offset(d))
        .collect();
    let excluded_before: Vec<Option<Energy>> =
        excluded.iter().map(|p| neighbors.amount_at(*p)).collect();

    let total_before = u128::from(source.amount()) + neighbors.total();

    let options = SpreadOptions::default().with_mode(mode).excluding(&excluded);
    let outcome = Distributor::new()
        .spread(&mut owner, &mut neighbors, ORIGIN, &mut source, options)
        .expect("spread");

    let total_after = u128::from(source.amount()) + neighbors.total();
    assert_eq!(total_before, total_after, "seed {seed}: energy not conserved");
    assert_eq!(outcome.extracted, outcome.inserted + outcome.returned);

    assert!(source.amount() <= source.capacity(), "seed {seed}: source over capacity");
    for store in neighbors.stores.values() {
        assert!(store.amount() <= store.capacity(), "seed {seed}: neighbor over capacity");
    }

    let excluded_after: Vec<Option<Energy>> =
        excluded.iter().map(|p| neighbors.amount_at(*p)).collect();
    assert_eq!(excluded_before, excluded_after, "seed {seed}: excluded neighbor touched");

    if mode.is_equal() && outcome.candidates > 0 {
        let share = outcome.extracted / u64::try_from(outcome.candidates).unwrap();
        for delta in outcome.deltas.iter().skip(1) {
            assert!(delta.after - delta.before <= share, "seed {seed}: share exceeded");
        }
    }

    let changed = outcome.source_after != outcome.source_before;
    assert_eq!(owner.marks, u32::from(changed), "seed {seed}: wrong notification count");
    assert_eq!(source.is_dirty(), outcome.candidates > 0);
}

#[test]
fn equal_mode_invariants_hold() {
    for seed in 0..CASES {
        check_case(seed, SpreadMode::Equal);
    }
}

#[test]
fn max_mode_invariants_hold() {
    for seed in 0..CASES {
        check_case(seed, SpreadMode::Max);
    }
}
