//! Integration test: gas conservation through graph merges and splits.
//!
//! Drives real pipe layouts through the node graph and checks that the gas
//! held by pipe nets is partitioned and recombined exactly, including the
//! two worked examples: 10 + 10 units merging into 20 and splitting back,
//! and 30 units over three volumes splitting into 10 and 20.

use manifold_atmos::gas::{Gas, T20C};
use manifold_atmos::test_utils::PipeWorld;
use manifold_atmos::{GasMixture, PipeNet, ReactionSet};
use manifold_core::id::{GridId, NodeId};
use manifold_core::test_utils::approx_eq;
use manifold_graph::{GraphEvent, GraphEventKind};
use manifold_spatial::{DirectionMask, TileRef};

const TOL: f64 = 1e-6;

/// No reactions, so only transfers change the gas.
fn world() -> PipeWorld {
    PipeWorld::with_reactions(ReactionSet::empty())
}

fn x_of(w: &PipeWorld, node: NodeId) -> f64 {
    w.air_of(node).moles(Gas::Nitrogen)
}

fn move_node(w: &mut PipeWorld, node: NodeId, x: i32, y: i32) {
    let entity = w.graph.node(node).unwrap().entity();
    let event = w.spatial.move_to(entity, TileRef::new(GridId(0), x, y)).unwrap();
    w.graph.notify(&w.spatial, entity, event);
}

fn count(events: &[GraphEvent], kind: GraphEventKind) -> usize {
    events.iter().filter(|e| e.kind() == kind).count()
}

// ===========================================================================
// Worked examples
// ===========================================================================

#[test]
fn two_filled_pipes_merge_then_split_back() {
    let mut w = world();
    let mask = DirectionMask::EAST | DirectionMask::WEST;
    let a = w.pipe(0, 0, mask);
    let b = w.pipe(5, 0, mask);
    w.recompute();
    w.fill_node(a, Gas::Nitrogen, 10.0, T20C);
    w.fill_node(b, Gas::Nitrogen, 10.0, T20C);

    // Link them.
    move_node(&mut w, b, 1, 0);
    let events = w.graph.recompute(&w.spatial);
    assert_eq!(count(&events, GraphEventKind::GroupMerged), 1);
    assert_eq!(w.graph.group_id(a), w.graph.group_id(b));

    let air = w.air_of(a);
    assert!(approx_eq(air.moles(Gas::Nitrogen), 20.0, TOL));
    assert!(approx_eq(air.volume(), 2.0, TOL));
    assert!(approx_eq(air.temperature(), T20C, TOL));

    // And unlink them again.
    move_node(&mut w, b, 5, 0);
    let events = w.graph.recompute(&w.spatial);
    assert_eq!(count(&events, GraphEventKind::GroupSplit), 1);
    assert_ne!(w.graph.group_id(a), w.graph.group_id(b));
    assert!(approx_eq(x_of(&w, a), 10.0, TOL));
    assert!(approx_eq(x_of(&w, b), 10.0, TOL));
    assert!(approx_eq(w.air_of(b).temperature(), T20C, TOL));
}

#[test]
fn three_volume_net_splits_one_to_two() {
    let mut w = world();
    let row = w.pipe_row(0, 2, 0);
    w.recompute();
    w.fill_node(row[0], Gas::Nitrogen, 30.0, T20C);
    assert!(approx_eq(w.air_of(row[2]).volume(), 3.0, TOL));

    w.graph.set_connections_enabled(row[0], false).unwrap();
    w.recompute();

    assert!(approx_eq(x_of(&w, row[0]), 10.0, TOL));
    assert!(approx_eq(x_of(&w, row[1]), 20.0, TOL));
    assert_eq!(w.graph.group_id(row[1]), w.graph.group_id(row[2]));
}

#[test]
fn split_then_reconnect_restores_state() {
    let mut w = world();
    let row = w.pipe_row(0, 4, 0);
    w.recompute();
    w.fill_node(row[0], Gas::Oxygen, 12.5, 350.0);
    w.fill_node(row[0], Gas::Plasma, 3.0, 350.0);
    let before = w.air_of(row[0]).clone();

    w.graph.set_connections_enabled(row[2], false).unwrap();
    w.recompute();
    assert_eq!(w.graph.group_count(), 3);

    w.graph.set_connections_enabled(row[2], true).unwrap();
    w.recompute();
    assert_eq!(w.graph.group_count(), 1);

    let after = w.air_of(row[4]);
    for gas in Gas::ALL {
        assert!(approx_eq(after.moles(gas), before.moles(gas), TOL), "{gas:?}");
    }
    assert!(approx_eq(after.temperature(), before.temperature(), TOL));
    assert!(approx_eq(after.volume(), before.volume(), TOL));
}

// ===========================================================================
// Conservation
// ===========================================================================

#[test]
fn merging_nets_at_different_temperatures_conserves_energy() {
    let mut w = world();
    let mask = DirectionMask::EAST | DirectionMask::WEST;
    let hot = w.pipe(0, 0, mask);
    let cold = w.pipe(1, 3, mask);
    w.recompute();
    w.fill_node(hot, Gas::Plasma, 5.0, 900.0);
    w.fill_node(cold, Gas::Nitrogen, 40.0, 150.0);
    let moles = w.total_moles();
    let energy = w.total_energy();

    move_node(&mut w, cold, 1, 0);
    w.recompute();

    assert_eq!(w.graph.group_count(), 1);
    assert!(approx_eq(w.total_moles(), moles, TOL));
    assert!(approx_eq(w.total_energy(), energy, TOL));
    // 1000 J/K at 900 K and 1200 J/K at 150 K.
    let expected = (1000.0 * 900.0 + 1200.0 * 150.0) / 2200.0;
    assert!(approx_eq(w.air_of(hot).temperature(), expected, TOL));
}

#[test]
fn grid_cut_into_strips_conserves_everything() {
    let mut w = world();
    let mut grid = Vec::new();
    for y in 0..6 {
        for x in 0..6 {
            grid.push(w.pipe(x, y, DirectionMask::ALL));
        }
    }
    w.recompute();
    w.fill_node(grid[0], Gas::Nitrogen, 360.0, T20C);
    w.fill_node(grid[0], Gas::CarbonDioxide, 36.0, T20C);
    let moles = w.total_moles();
    let energy = w.total_energy();

    // Disable column 3: strips of 3 columns, 2 columns, and six singles.
    for y in 0..6 {
        w.graph.set_connections_enabled(grid[y * 6 + 3], false).unwrap();
    }
    let events = w.graph.recompute(&w.spatial);
    assert_eq!(count(&events, GraphEventKind::GroupSplit), 1);
    assert_eq!(w.graph.group_count(), 2 + 6);
    assert!(approx_eq(w.total_moles(), moles, TOL));
    assert!(approx_eq(w.total_energy(), energy, TOL));

    // Each fragment holds gas in proportion to its volume.
    let density = 360.0 / 36.0;
    assert!(approx_eq(x_of(&w, grid[0]), density * 18.0, TOL));
    assert!(approx_eq(x_of(&w, grid[5]), density * 12.0, TOL));
    assert!(approx_eq(x_of(&w, grid[3]), density, TOL));
}

#[test]
fn removing_a_pipe_keeps_gas_in_remaining_net() {
    let mut w = world();
    let row = w.pipe_row(0, 3, 0);
    w.recompute();
    w.fill_node(row[0], Gas::Nitrogen, 40.0, T20C);

    // Removing the end pipe shrinks the net; the gas stays behind.
    w.despawn_node(row[3]);
    w.recompute();
    let air = w.air_of(row[0]);
    assert!(approx_eq(air.volume(), 3.0, TOL));
    assert!(approx_eq(air.moles(Gas::Nitrogen), 40.0, TOL));
    assert!(air.pressure() > 0.0);
}

#[test]
fn removing_every_pipe_disposes_the_net() {
    let mut w = world();
    let row = w.pipe_row(0, 2, 0);
    w.recompute();
    let gid = w.graph.group_id(row[0]).unwrap();
    for node in row {
        w.despawn_node(node);
    }
    let events = w.graph.recompute(&w.spatial);
    assert!(!w.graph.contains_group(gid));
    assert_eq!(w.graph.group_count(), 0);
    assert!(events.contains(&GraphEvent::GroupDestroyed { group: gid }));
}

#[test]
fn unlinked_pipe_sees_vacuum_until_recompute() {
    let mut w = world();
    let pipe = w.pipe(0, 0, DirectionMask::EAST);
    let air: &GasMixture = w.air_of(pipe);
    assert!(air.is_immutable());
    assert_eq!(air.pressure(), 0.0);
    assert!(w.graph.state_as_mut::<PipeNet>(pipe).is_none());

    w.recompute();
    assert!(!w.air_of(pipe).is_immutable());
    assert!(approx_eq(w.air_of(pipe).volume(), 1.0, TOL));
}
