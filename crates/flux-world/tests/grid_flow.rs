//! Integration tests for energy moving through a `flux-world` grid.
//!
//! Each test builds a small grid, drives generation, spreading, and
//! consumption by hand, and checks that the grid's total only changes by
//! what was generated or consumed.

// Integration tests use expect/unwrap extensively for clarity -- panicking
// on failure is the correct behavior in test code.
#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects
)]

use std::collections::BTreeSet;

use flux_energy::{Distributor, EnergyStorage, EnergyStore};
use flux_ledger::conservation::verify_transfers;
use flux_types::{BlockKind, BlockPos, Direction, Energy, OwnerCapability, WorldSide};
use flux_world::{BlockEntity, GridWorld};

fn block(kind: BlockKind, capacity: Energy, rate: Energy, amount: Energy) -> BlockEntity {
    let store = EnergyStore::new(capacity, rate, rate)
        .and_then(|s| s.with_amount(amount))
        .expect("valid store");
    BlockEntity::new(kind, store)
}

fn pos(x: i32) -> BlockPos {
    BlockPos::new(x, 0, 0)
}

/// Generator at x=0, a conduit at x=1, a battery at x=2.
fn chain() -> GridWorld {
    let mut grid = GridWorld::new(WorldSide::Server);
    grid.add_block(
        pos(0),
        block(BlockKind::Generator { output_per_tick: 30 }, 100, 50, 0),
    )
    .expect("free");
    grid.add_block(pos(1), block(BlockKind::Conduit, 20, 20, 0))
        .expect("free");
    grid.add_block(pos(2), block(BlockKind::Battery, 1_000, 100, 0))
        .expect("free");
    grid
}

#[test]
fn energy_walks_down_a_chain() {
    let mut grid = chain();
    let distributor = Distributor::new();

    let produced = grid
        .block_mut(pos(0))
        .expect("generator")
        .generate()
        .expect("generate");
    assert_eq!(produced, 30);

    // Generator pushes into the conduit, which only holds 20.
    let first = grid.spread_from(pos(0), &distributor, None).expect("spread");
    assert_eq!(first.inserted, 20);
    assert!(verify_transfers(1, &first.deltas).is_balanced());

    // Conduit pushes back west and east; the generator re-accepts half.
    let second = grid.spread_from(pos(1), &distributor, None).expect("spread");
    assert_eq!(second.candidates, 2);
    assert_eq!(second.inserted, 20);
    assert!(verify_transfers(1, &second.deltas).is_balanced());

    assert_eq!(grid.total_energy(), 30);
    let battery = grid.block(pos(2)).expect("battery");
    assert_eq!(battery.store().amount(), 10);
}

#[test]
fn excluding_the_upstream_block_keeps_flow_one_way() {
    let mut grid = chain();
    let distributor = Distributor::new();
    let upstream: BTreeSet<BlockPos> = [pos(0)].into_iter().collect();

    grid.block_mut(pos(0))
        .expect("generator")
        .generate()
        .expect("generate");
    grid.spread_from(pos(0), &distributor, None).expect("spread");
    grid.spread_from(pos(1), &distributor, Some(&upstream))
        .expect("spread");

    assert_eq!(grid.block(pos(1)).expect("conduit").store().amount(), 0);
    assert_eq!(grid.block(pos(2)).expect("battery").store().amount(), 20);
    assert_eq!(grid.total_energy(), 30);
}

#[test]
fn consumer_removes_energy_and_is_never_a_source() {
    let mut grid = GridWorld::new(WorldSide::Server);
    grid.add_block(pos(0), block(BlockKind::Battery, 100, 100, 80))
        .expect("free");
    grid.add_block(
        pos(1),
        block(BlockKind::Consumer { draw_per_tick: 15 }, 100, 100, 0),
    )
    .expect("free");

    grid.spread_from(pos(0), &Distributor::new(), None)
        .expect("spread");
    assert_eq!(grid.block(pos(1)).expect("consumer").store().amount(), 80);

    let drained = grid
        .block_mut(pos(1))
        .expect("consumer")
        .consume()
        .expect("consume");
    assert_eq!(drained, 15);
    assert_eq!(grid.total_energy(), 65);
    assert!(!grid.block(pos(1)).expect("consumer").kind().spreads());
}

#[test]
fn one_sided_block_only_accepts_from_its_open_face() {
    let mut grid = GridWorld::new(WorldSide::Server);
    grid.add_block(pos(0), block(BlockKind::Battery, 100, 100, 40))
        .expect("free");
    // Open only to the east, so the battery to its west cannot reach it.
    grid.add_block(
        pos(1),
        block(BlockKind::Battery, 100, 100, 0).with_faces([Direction::East]),
    )
    .expect("free");

    let outcome = grid
        .spread_from(pos(0), &Distributor::new(), None)
        .expect("spread");
    assert_eq!(outcome.candidates, 0);
    assert_eq!(grid.block(pos(0)).expect("battery").store().amount(), 40);
}

#[test]
fn a_tick_of_sync_reaches_every_touched_owner() {
    let mut grid = chain();
    grid.add_block(
        pos(3),
        block(BlockKind::Battery, 100, 100, 0).with_capability(OwnerCapability::None),
    )
    .expect("free");
    let distributor = Distributor::new();

    grid.block_mut(pos(0))
        .expect("generator")
        .generate()
        .expect("generate");
    for p in grid.positions() {
        grid.spread_from(p, &distributor, None).expect("spread");
    }

    let report = grid.sync_all();
    assert_eq!(report.synced, 4);
    assert_eq!(report.lightweight, 0);
    assert_eq!(report.generic, 3);

    let snapshot = grid.snapshot();
    assert!(snapshot.iter().all(|s| !s.dirty));
    assert_eq!(
        snapshot.iter().map(|s| u128::from(s.amount)).sum::<u128>(),
        grid.total_energy()
    );
}
