//! Integration test: data files drive the whole stack.
//!
//! Reactions and prototypes are loaded from a temporary data directory, the
//! prototypes are stamped onto placed entities, and an [`AtmosSystem`] runs
//! the pipe nets and the pump the data describes.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use manifold_atmos::gas::{Gas, T20C};
use manifold_atmos::{AtmosSystem, PipeNet, register_pipe_kind};
use manifold_core::id::{EntityId, GridId, NodeId};
use manifold_data::{DataLoadError, PrototypeSet, load_prototypes, load_reactions};
use manifold_graph::{GraphEventKind, GroupRegistryBuilder, NodeGraph};
use manifold_spatial::{Rotation, SpatialIndex, TileRef};
use slotmap::SlotMap;

const REACTIONS_TOML: &str = r#"
[[reactions]]
name = "tritium_decay"
priority = 1
rate_fraction = 0.5
reactants = { Tritium = 1.0 }
products = { WaterVapor = 1.0 }
"#;

const PROTOTYPES_RON: &str = r#"[
    (
        name: "pipe",
        nodes: [
            (slot: "pipe", kind: "gas_pipe", volume: 1.0,
             linkers: [Directional(directions: [East, West])]),
        ],
    ),
    (
        name: "pump",
        nodes: [
            (slot: "inlet", kind: "gas_pipe", volume: 1.0, linkers: [Directional(directions: [West])]),
            (slot: "outlet", kind: "gas_pipe", volume: 1.0, linkers: [Directional(directions: [East])]),
        ],
        appliance: Some(PressurePump(inlet: "inlet", outlet: "outlet",
                                     target_pressure: 500.0, max_transfer: 10.0)),
    ),
]"#;

fn make_test_dir(suffix: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "manifold_integration_{suffix}_{}",
        std::process::id()
    ));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn cleanup(dir: &Path) {
    let _ = fs::remove_dir_all(dir);
}

/// Everything a host keeps around after loading data.
struct Host {
    system: AtmosSystem,
    spatial: SpatialIndex,
    prototypes: PrototypeSet,
    entities: SlotMap<EntityId, ()>,
}

impl Host {
    fn load(dir: &Path) -> Result<Self, DataLoadError> {
        let reactions = load_reactions(dir)?;
        let mut builder = GroupRegistryBuilder::new();
        register_pipe_kind(&mut builder, "gas_pipe", Arc::new(reactions)).unwrap();
        let registry = builder.build();
        let prototypes = load_prototypes(dir, &registry)?;
        Ok(Self {
            system: AtmosSystem::new(NodeGraph::new(registry)),
            spatial: SpatialIndex::new(),
            prototypes,
            entities: SlotMap::with_key(),
        })
    }

    /// Place `prototype` at `(x, y)`, attach its nodes and register its
    /// appliance, if any.
    fn build(&mut self, prototype: &str, x: i32, y: i32) -> EntityId {
        let entity = self.entities.insert(());
        let event = self
            .spatial
            .place_anchored(entity, TileRef::new(GridId(0), x, y), Rotation::None)
            .unwrap();
        let proto = self.prototypes.get(prototype).unwrap();
        proto.attach(self.system.graph_mut(), entity).unwrap();
        if let Some(appliance) = proto.appliance_for(entity) {
            self.system.add_appliance(appliance);
        }
        self.system.graph_mut().notify(&self.spatial, entity, event);
        entity
    }

    fn node(&self, entity: EntityId, slot: &str) -> NodeId {
        self.system.graph().node_by_slot(entity, slot).unwrap()
    }

    fn net(&self, entity: EntityId, slot: &str) -> &PipeNet {
        self.system.graph().state_as::<PipeNet>(self.node(entity, slot)).unwrap()
    }

    fn net_mut(&mut self, entity: EntityId, slot: &str) -> &mut PipeNet {
        let node = self.node(entity, slot);
        self.system.graph_mut().state_as_mut::<PipeNet>(node).unwrap()
    }
}

fn write_data(suffix: &str) -> PathBuf {
    let dir = make_test_dir(suffix);
    fs::write(dir.join("reactions.toml"), REACTIONS_TOML).unwrap();
    fs::write(dir.join("prototypes.ron"), PROTOTYPES_RON).unwrap();
    dir
}

// ===========================================================================
// Tests
// ===========================================================================

#[test]
fn loaded_pump_moves_gas_between_loaded_pipes() {
    let dir = write_data("pump");
    let mut host = Host::load(&dir).unwrap();

    let left: Vec<_> = (0..3).map(|x| host.build("pipe", x, 0)).collect();
    let pump = host.build("pump", 3, 0);
    let right: Vec<_> = (4..7).map(|x| host.build("pipe", x, 0)).collect();
    assert_eq!(host.system.appliance_count(), 1);

    let report = host.system.tick(&host.spatial);
    let created = report
        .events
        .iter()
        .filter(|e| e.kind() == GraphEventKind::GroupCreated)
        .count();
    assert_eq!(created, 2);
    assert_eq!(host.system.graph().group_count(), 2);
    assert!(host.net(left[0], "pipe").air().volume() > 3.0);

    host.net_mut(left[0], "pipe")
        .air_mut()
        .set_moles(Gas::Nitrogen, 100.0);
    host.net_mut(left[0], "pipe").air_mut().set_temperature(T20C);

    let mut moved = 0.0;
    for _ in 0..5 {
        moved += host.system.tick(&host.spatial).moved();
    }
    assert!(moved > 0.0);
    let inlet = host.net(pump, "inlet").air().total_moles();
    let outlet = host.net(right[2], "pipe").air().total_moles();
    assert!(outlet > 0.0);
    assert!((inlet + outlet - 100.0).abs() < 1e-6);
    assert!(host.net(pump, "outlet").air().pressure() <= 500.0 + 1e-6);

    cleanup(&dir);
}

#[test]
fn loaded_reactions_run_in_loaded_nets() {
    let dir = write_data("reactions");
    let mut host = Host::load(&dir).unwrap();
    let pipe = host.build("pipe", 0, 0);
    host.system.tick(&host.spatial);

    host.net_mut(pipe, "pipe").air_mut().set_moles(Gas::Tritium, 8.0);
    host.net_mut(pipe, "pipe").air_mut().set_temperature(T20C);
    host.system.tick(&host.spatial);

    let air = host.net(pipe, "pipe").air();
    assert!(air.moles(Gas::Tritium) < 8.0);
    assert!(air.moles(Gas::WaterVapor) > 0.0);
    assert!((air.total_moles() - 8.0).abs() < 1e-9);

    cleanup(&dir);
}

#[test]
fn removing_a_loaded_entity_splits_its_net() {
    let dir = write_data("removal");
    let mut host = Host::load(&dir).unwrap();
    let row: Vec<_> = (0..5).map(|x| host.build("pipe", x, 0)).collect();
    host.system.tick(&host.spatial);
    assert_eq!(host.system.graph().group_count(), 1);

    let middle = row[2];
    host.system.graph_mut().remove_entity(middle);
    host.spatial.remove(middle).unwrap();
    let report = host.system.tick(&host.spatial);

    assert!(report.events.iter().any(|e| e.kind() == GraphEventKind::GroupSplit));
    assert_eq!(host.system.graph().group_count(), 2);
    assert_ne!(
        host.system.graph().group_id(host.node(row[0], "pipe")),
        host.system.graph().group_id(host.node(row[4], "pipe")),
    );

    cleanup(&dir);
}

#[test]
fn prototypes_naming_unknown_kinds_fail_to_load() {
    let dir = make_test_dir("unknown_kind");
    fs::write(
        dir.join("prototypes.json"),
        r#"[{"name": "wire", "nodes": [{"slot": "w", "kind": "power_cable"}]}]"#,
    )
    .unwrap();

    let err = Host::load(&dir).err().unwrap();
    assert!(matches!(err, DataLoadError::UnresolvedRef { .. }));
    assert!(err.to_string().contains("power_cable"));

    cleanup(&dir);
}
