//! Property-based tests for gas conservation across topology changes.
//!
//! A randomly-masked pipe grid is filled with gas, then put through random
//! toggles, rotations and moves. No reactions run, so total moles and total
//! thermal energy over every live pipe net must stay put.

use manifold_atmos::gas::Gas;
use manifold_atmos::test_utils::PipeWorld;
use manifold_atmos::{PressurePump, ReactionSet, VolumePump};
use manifold_core::id::{GridId, NodeId};
use manifold_core::test_utils::approx_eq;
use manifold_spatial::{Direction, DirectionMask, TileRef};
use proptest::prelude::*;

const TOL: f64 = 1e-6;

#[derive(Debug, Clone)]
enum Edit {
    Toggle(usize),
    Rotate(usize),
    Move(usize, i32, i32),
    Recompute,
}

fn arb_edits() -> impl Strategy<Value = Vec<Edit>> {
    proptest::collection::vec(
        prop_oneof![
            3 => (0..64usize).prop_map(Edit::Toggle),
            2 => (0..64usize).prop_map(Edit::Rotate),
            2 => (0..64usize, 0..6i32, 0..6i32).prop_map(|(i, x, y)| Edit::Move(i, x, y)),
            1 => Just(Edit::Recompute),
        ],
        1..=30,
    )
}

fn arb_fill() -> impl Strategy<Value = Vec<(f64, f64, f64)>> {
    proptest::collection::vec((0.0f64..200.0, 0.0f64..20.0, 50.0f64..1500.0), 16)
}

fn mask_from_bits(bits: u8) -> DirectionMask {
    DirectionMask::from_directions(
        Direction::all()
            .into_iter()
            .enumerate()
            .filter(|(i, _)| bits & (1 << i) != 0)
            .map(|(_, dir)| dir),
    )
}

/// A 4x4 grid, recomputed once, with each net filled from `fill`.
fn filled_grid(masks: &[u8], fill: &[(f64, f64, f64)]) -> (PipeWorld, Vec<NodeId>) {
    let mut w = PipeWorld::with_reactions(ReactionSet::empty());
    let mut nodes = Vec::new();
    for (i, bits) in masks.iter().enumerate() {
        let (x, y) = ((i % 4) as i32, (i / 4) as i32);
        nodes.push(w.pipe(x, y, mask_from_bits(*bits)));
    }
    w.recompute();

    let groups: Vec<_> = w.graph.group_ids().collect();
    for (gid, (nitrogen, plasma, temperature)) in groups.into_iter().zip(fill) {
        let Some(&node) = w.graph.members(gid).and_then(|m| m.iter().next()) else {
            continue;
        };
        w.fill_node(node, Gas::Nitrogen, *nitrogen, *temperature);
        w.fill_node(node, Gas::Plasma, *plasma, *temperature);
    }
    (w, nodes)
}

fn apply(w: &mut PipeWorld, nodes: &[NodeId], edit: &Edit) {
    match *edit {
        Edit::Toggle(i) => {
            let node = nodes[i % nodes.len()];
            let enabled = w.graph.node(node).unwrap().connections_enabled();
            w.graph.set_connections_enabled(node, !enabled).unwrap();
        }
        Edit::Rotate(i) => {
            let entity = w.graph.node(nodes[i % nodes.len()]).unwrap().entity();
            let current = w.spatial.placement(entity).unwrap().rotation;
            let event = w.spatial.rotate(entity, current.rotate_cw()).unwrap();
            w.graph.notify(&w.spatial, entity, event);
        }
        Edit::Move(i, x, y) => {
            let entity = w.graph.node(nodes[i % nodes.len()]).unwrap().entity();
            let event = w.spatial.move_to(entity, TileRef::new(GridId(0), x, y)).unwrap();
            w.graph.notify(&w.spatial, entity, event);
        }
        Edit::Recompute => w.recompute(),
    }
}

// ===========================================================================
// Properties
// ===========================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    /// Merges and splits move gas between nets but never create or destroy it.
    #[test]
    fn moles_and_energy_are_conserved(
        masks in proptest::collection::vec(1..16u8, 16),
        fill in arb_fill(),
        edits in arb_edits(),
    ) {
        let (mut w, nodes) = filled_grid(&masks, &fill);
        let moles = w.total_moles();
        let energy = w.total_energy();

        for edit in &edits {
            apply(&mut w, &nodes, edit);
        }
        w.recompute();

        prop_assert!(approx_eq(w.total_moles(), moles, TOL), "moles {} vs {}", w.total_moles(), moles);
        prop_assert!(approx_eq(w.total_energy(), energy, TOL), "energy {} vs {}", w.total_energy(), energy);
    }

    /// Once settled, another recompute reports nothing and moves no gas.
    #[test]
    fn settled_grid_is_stable(
        masks in proptest::collection::vec(1..16u8, 16),
        fill in arb_fill(),
        edits in arb_edits(),
    ) {
        let (mut w, nodes) = filled_grid(&masks, &fill);
        for edit in &edits {
            apply(&mut w, &nodes, edit);
        }
        w.recompute();
        let before: Vec<_> = nodes.iter().map(|n| (w.graph.group_id(*n), w.air_of(*n).total_moles())).collect();

        let events = w.graph.recompute(&w.spatial);
        prop_assert!(events.is_empty());
        let after: Vec<_> = nodes.iter().map(|n| (w.graph.group_id(*n), w.air_of(*n).total_moles())).collect();
        prop_assert_eq!(before, after);
    }

    /// Appliances move gas from one net to another without losing any.
    #[test]
    fn pumps_conserve_moles(
        nitrogen in 1.0f64..500.0,
        temperature in 100.0f64..1000.0,
        target in 10.0f64..5000.0,
        rate in 0.1f64..5.0,
        ticks in 1usize..10,
    ) {
        let mut w = PipeWorld::with_reactions(ReactionSet::empty());
        let inlet = w.pipe_row(0, 2, 0);
        let device = w.device(3, 0);
        w.pipe_row(4, 6, 0);
        w.recompute();
        w.fill_node(inlet[0], Gas::Nitrogen, nitrogen, temperature);
        let total = w.total_moles();

        let pressure = PressurePump::new(device, "inlet", "outlet", target, 100.0);
        let volume = VolumePump::new(device, "inlet", "outlet", rate, target);
        for _ in 0..ticks {
            pressure.run(&mut w.graph);
            volume.run(&mut w.graph);
        }
        prop_assert!(approx_eq(w.total_moles(), total, TOL));
    }
}
