//! Grid placement for node-owning entities.
//!
//! Provides the geometry the edge policies reason about (tiles, cardinal
//! directions, rotations, direction masks) and a spatial index mapping
//! anchored entities to the tiles they occupy.
//!
//! Every structural mutation on the index returns the [`StructuralEvent`]
//! it produced. The caller forwards that event to the node graph, which
//! dirties exactly the nodes whose policies care about it. There is no
//! publish/subscribe router in between.

use manifold_core::id::{EntityId, GridId};
use serde::{Deserialize, Serialize};
use slotmap::SecondaryMap;
use std::collections::{BTreeMap, BTreeSet};

pub mod mask;
pub use mask::DirectionMask;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A position on a 2D grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridPosition {
    pub x: i32,
    pub y: i32,
}

impl GridPosition {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Manhattan distance to another position.
    pub fn manhattan_distance(&self, other: &GridPosition) -> u32 {
        (self.x - other.x).unsigned_abs() + (self.y - other.y).unsigned_abs()
    }

    /// The position one step away in `dir`.
    pub fn step(&self, dir: Direction) -> GridPosition {
        let (dx, dy) = dir.offset();
        GridPosition::new(self.x + dx, self.y + dy)
    }
}

/// A tile on a specific grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileRef {
    pub grid: GridId,
    pub position: GridPosition,
}

impl TileRef {
    pub fn new(grid: GridId, x: i32, y: i32) -> Self {
        Self {
            grid,
            position: GridPosition::new(x, y),
        }
    }

    /// The adjacent tile in `dir` on the same grid.
    pub fn neighbor(&self, dir: Direction) -> TileRef {
        TileRef {
            grid: self.grid,
            position: self.position.step(dir),
        }
    }

    /// Direction from `self` to `other` if the two tiles share a grid and
    /// an edge. Diagonal, distant, or identical tiles yield `None`.
    pub fn direction_to(&self, other: &TileRef) -> Option<Direction> {
        if self.grid != other.grid {
            return None;
        }
        let delta = (
            other.position.x - self.position.x,
            other.position.y - self.position.y,
        );
        Direction::all().into_iter().find(|dir| dir.offset() == delta)
    }
}

/// Rotation (facing) of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Rotation {
    /// No rotation.
    #[default]
    None,
    /// 90 degrees clockwise.
    Cw90,
    /// 180 degrees.
    Cw180,
    /// 270 degrees clockwise (90 degrees counter-clockwise).
    Cw270,
}

impl Rotation {
    /// All four rotation values.
    pub fn all() -> [Rotation; 4] {
        [
            Rotation::None,
            Rotation::Cw90,
            Rotation::Cw180,
            Rotation::Cw270,
        ]
    }

    /// Rotate 90 degrees clockwise.
    pub fn rotate_cw(self) -> Self {
        match self {
            Rotation::None => Rotation::Cw90,
            Rotation::Cw90 => Rotation::Cw180,
            Rotation::Cw180 => Rotation::Cw270,
            Rotation::Cw270 => Rotation::None,
        }
    }

    /// Rotate 90 degrees counter-clockwise.
    pub fn rotate_ccw(self) -> Self {
        match self {
            Rotation::None => Rotation::Cw270,
            Rotation::Cw90 => Rotation::None,
            Rotation::Cw180 => Rotation::Cw90,
            Rotation::Cw270 => Rotation::Cw180,
        }
    }

    /// Number of clockwise quarter turns.
    pub fn quarter_turns(self) -> u8 {
        match self {
            Rotation::None => 0,
            Rotation::Cw90 => 1,
            Rotation::Cw180 => 2,
            Rotation::Cw270 => 3,
        }
    }
}

/// Cardinal directions. North is towards negative `y`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Direction {
    North,
    East,
    South,
    West,
}

impl Direction {
    /// All four cardinal directions, clockwise from North.
    pub fn all() -> [Direction; 4] {
        [
            Direction::North,
            Direction::East,
            Direction::South,
            Direction::West,
        ]
    }

    /// Offset for this direction.
    pub fn offset(&self) -> (i32, i32) {
        match self {
            Direction::North => (0, -1),
            Direction::East => (1, 0),
            Direction::South => (0, 1),
            Direction::West => (-1, 0),
        }
    }

    pub fn opposite(self) -> Direction {
        match self {
            Direction::North => Direction::South,
            Direction::East => Direction::West,
            Direction::South => Direction::North,
            Direction::West => Direction::East,
        }
    }

    /// This direction after turning clockwise by `rotation`.
    pub fn rotated(self, rotation: Rotation) -> Direction {
        let idx = (self.bit() + rotation.quarter_turns()) % 4;
        Direction::all()[idx as usize]
    }

    pub(crate) fn bit(self) -> u8 {
        match self {
            Direction::North => 0,
            Direction::East => 1,
            Direction::South => 2,
            Direction::West => 3,
        }
    }
}

/// Where an entity sits and whether it is fixed to its tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub tile: TileRef,
    pub rotation: Rotation,
    pub anchored: bool,
}

/// A structural change that may alter which edges a policy would propose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StructuralEvent {
    /// The entity was anchored or unanchored (including removal while anchored).
    AnchorChanged,
    /// An unanchored entity changed tile.
    Moved,
    /// The entity's facing changed.
    Rotated,
    /// An anchored entity was moved to another tile while staying anchored.
    ReAnchored,
}

/// Errors from spatial operations.
#[derive(Debug, thiserror::Error)]
pub enum SpatialError {
    #[error("entity is not placed on any grid")]
    NotPlaced,
    #[error("entity is already placed")]
    AlreadyPlaced,
    #[error("entity is already anchored")]
    AlreadyAnchored,
    #[error("entity is not anchored")]
    NotAnchored,
}

// ---------------------------------------------------------------------------
// SpatialIndex
// ---------------------------------------------------------------------------

/// A spatial index over entity placements.
///
/// Maintains a bidirectional mapping:
/// - `tiles`: tile -> anchored entities on it (several may share a tile)
/// - `placements`: entity -> placement, anchored or not
#[derive(Debug, Default)]
pub struct SpatialIndex {
    tiles: BTreeMap<TileRef, BTreeSet<EntityId>>,
    placements: SecondaryMap<EntityId, Placement>,
}

impl SpatialIndex {
    pub fn new() -> Self {
        Self::default()
    }

    // -- Placement --

    /// Put an entity on a tile, unanchored.
    pub fn place(
        &mut self,
        entity: EntityId,
        tile: TileRef,
        rotation: Rotation,
    ) -> Result<(), SpatialError> {
        if self.placements.contains_key(entity) {
            return Err(SpatialError::AlreadyPlaced);
        }
        self.placements.insert(
            entity,
            Placement {
                tile,
                rotation,
                anchored: false,
            },
        );
        Ok(())
    }

    /// Place and anchor in one step.
    pub fn place_anchored(
        &mut self,
        entity: EntityId,
        tile: TileRef,
        rotation: Rotation,
    ) -> Result<StructuralEvent, SpatialError> {
        self.place(entity, tile, rotation)?;
        self.anchor(entity)
    }

    pub fn anchor(&mut self, entity: EntityId) -> Result<StructuralEvent, SpatialError> {
        let placement = self
            .placements
            .get_mut(entity)
            .ok_or(SpatialError::NotPlaced)?;
        if placement.anchored {
            return Err(SpatialError::AlreadyAnchored);
        }
        placement.anchored = true;
        let tile = placement.tile;
        self.tiles.entry(tile).or_default().insert(entity);
        Ok(StructuralEvent::AnchorChanged)
    }

    pub fn unanchor(&mut self, entity: EntityId) -> Result<StructuralEvent, SpatialError> {
        let placement = self
            .placements
            .get_mut(entity)
            .ok_or(SpatialError::NotPlaced)?;
        if !placement.anchored {
            return Err(SpatialError::NotAnchored);
        }
        placement.anchored = false;
        let tile = placement.tile;
        self.detach_tile(entity, tile);
        Ok(StructuralEvent::AnchorChanged)
    }

    /// Move an entity to another tile. Anchored entities stay anchored and
    /// report [`StructuralEvent::ReAnchored`].
    pub fn move_to(
        &mut self,
        entity: EntityId,
        tile: TileRef,
    ) -> Result<StructuralEvent, SpatialError> {
        let placement = self
            .placements
            .get_mut(entity)
            .ok_or(SpatialError::NotPlaced)?;
        let old = placement.tile;
        placement.tile = tile;
        if !placement.anchored {
            return Ok(StructuralEvent::Moved);
        }
        self.detach_tile(entity, old);
        self.tiles.entry(tile).or_default().insert(entity);
        Ok(StructuralEvent::ReAnchored)
    }

    pub fn rotate(
        &mut self,
        entity: EntityId,
        rotation: Rotation,
    ) -> Result<StructuralEvent, SpatialError> {
        let placement = self
            .placements
            .get_mut(entity)
            .ok_or(SpatialError::NotPlaced)?;
        placement.rotation = rotation;
        Ok(StructuralEvent::Rotated)
    }

    /// Take an entity off the grid entirely. Returns its last placement.
    pub fn remove(&mut self, entity: EntityId) -> Result<Placement, SpatialError> {
        let placement = self
            .placements
            .remove(entity)
            .ok_or(SpatialError::NotPlaced)?;
        if placement.anchored {
            self.detach_tile(entity, placement.tile);
        }
        Ok(placement)
    }

    fn detach_tile(&mut self, entity: EntityId, tile: TileRef) {
        if let Some(set) = self.tiles.get_mut(&tile) {
            set.remove(&entity);
            if set.is_empty() {
                self.tiles.remove(&tile);
            }
        }
    }

    // -- Queries --

    pub fn placement(&self, entity: EntityId) -> Option<Placement> {
        self.placements.get(entity).copied()
    }

    pub fn is_anchored(&self, entity: EntityId) -> bool {
        self.placements
            .get(entity)
            .is_some_and(|placement| placement.anchored)
    }

    /// The tile an entity is anchored to, if it is anchored.
    pub fn anchored_tile(&self, entity: EntityId) -> Option<TileRef> {
        self.placements
            .get(entity)
            .filter(|placement| placement.anchored)
            .map(|placement| placement.tile)
    }

    /// Anchored entities on a tile, in id order.
    pub fn anchored_at(&self, tile: TileRef) -> impl Iterator<Item = EntityId> + '_ {
        self.tiles.get(&tile).into_iter().flatten().copied()
    }

    // -- Stats --

    /// Number of entities placed on any grid.
    pub fn entity_count(&self) -> usize {
        self.placements.len()
    }

    /// Number of tiles with at least one anchored entity.
    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use manifold_core::test_utils::make_entities;

    fn tile(x: i32, y: i32) -> TileRef {
        TileRef::new(GridId(0), x, y)
    }

    // -----------------------------------------------------------------------
    // Geometry tests
    // -----------------------------------------------------------------------

    #[test]
    fn grid_position_manhattan_distance() {
        let a = GridPosition::new(0, 0);
        let b = GridPosition::new(3, 4);
        assert_eq!(a.manhattan_distance(&b), 7);

        let c = GridPosition::new(-2, 5);
        let d = GridPosition::new(3, -1);
        assert_eq!(c.manhattan_distance(&d), 11);
        assert_eq!(a.manhattan_distance(&a), 0);
    }

    #[test]
    fn direction_opposites() {
        for dir in Direction::all() {
            assert_eq!(dir.opposite().opposite(), dir);
            assert_ne!(dir.opposite(), dir);
        }
        assert_eq!(Direction::East.opposite(), Direction::West);
    }

    #[test]
    fn direction_rotation() {
        assert_eq!(Direction::North.rotated(Rotation::Cw90), Direction::East);
        assert_eq!(Direction::West.rotated(Rotation::Cw90), Direction::North);
        assert_eq!(Direction::East.rotated(Rotation::Cw270), Direction::North);
        assert_eq!(Direction::South.rotated(Rotation::None), Direction::South);
    }

    #[test]
    fn rotation_cycles() {
        let mut rot = Rotation::None;
        for _ in 0..4 {
            rot = rot.rotate_cw();
        }
        assert_eq!(rot, Rotation::None);
        assert_eq!(Rotation::None.rotate_ccw(), Rotation::Cw270);
    }

    #[test]
    fn tile_direction_to() {
        let a = tile(0, 0);
        assert_eq!(a.direction_to(&tile(1, 0)), Some(Direction::East));
        assert_eq!(a.direction_to(&tile(0, -1)), Some(Direction::North));
        assert_eq!(a.direction_to(&tile(1, 1)), None);
        assert_eq!(a.direction_to(&a), None);
        assert_eq!(a.direction_to(&TileRef::new(GridId(1), 1, 0)), None);
        assert_eq!(a.neighbor(Direction::South), tile(0, 1));
    }

    // -----------------------------------------------------------------------
    // Anchoring tests
    // -----------------------------------------------------------------------

    #[test]
    fn place_then_anchor() {
        let (_sm, ids) = make_entities(1);
        let mut index = SpatialIndex::new();

        index.place(ids[0], tile(2, 3), Rotation::None).unwrap();
        assert!(!index.is_anchored(ids[0]));
        assert_eq!(index.anchored_at(tile(2, 3)).count(), 0);

        let ev = index.anchor(ids[0]).unwrap();
        assert_eq!(ev, StructuralEvent::AnchorChanged);
        assert_eq!(index.anchored_at(tile(2, 3)).collect::<Vec<_>>(), vec![ids[0]]);
        assert_eq!(index.anchored_tile(ids[0]), Some(tile(2, 3)));
    }

    #[test]
    fn several_entities_share_a_tile() {
        let (_sm, ids) = make_entities(2);
        let mut index = SpatialIndex::new();
        index.place_anchored(ids[0], tile(0, 0), Rotation::None).unwrap();
        index.place_anchored(ids[1], tile(0, 0), Rotation::Cw90).unwrap();

        assert_eq!(index.anchored_at(tile(0, 0)).count(), 2);
        assert_eq!(index.tile_count(), 1);
        assert_eq!(index.entity_count(), 2);
    }

    #[test]
    fn double_place_and_anchor_rejected() {
        let (_sm, ids) = make_entities(1);
        let mut index = SpatialIndex::new();
        index.place_anchored(ids[0], tile(0, 0), Rotation::None).unwrap();

        assert!(matches!(
            index.place(ids[0], tile(1, 1), Rotation::None),
            Err(SpatialError::AlreadyPlaced)
        ));
        assert!(matches!(
            index.anchor(ids[0]),
            Err(SpatialError::AlreadyAnchored)
        ));
    }

    #[test]
    fn unanchor_clears_tile() {
        let (_sm, ids) = make_entities(1);
        let mut index = SpatialIndex::new();
        index.place_anchored(ids[0], tile(0, 0), Rotation::None).unwrap();

        assert_eq!(index.unanchor(ids[0]).unwrap(), StructuralEvent::AnchorChanged);
        assert_eq!(index.tile_count(), 0);
        assert_eq!(index.anchored_tile(ids[0]), None);
        assert!(matches!(index.unanchor(ids[0]), Err(SpatialError::NotAnchored)));
    }

    #[test]
    fn unplaced_entity_errors() {
        let (_sm, ids) = make_entities(1);
        let mut index = SpatialIndex::new();
        assert!(matches!(index.anchor(ids[0]), Err(SpatialError::NotPlaced)));
        assert!(matches!(
            index.rotate(ids[0], Rotation::Cw90),
            Err(SpatialError::NotPlaced)
        ));
        assert!(matches!(index.remove(ids[0]), Err(SpatialError::NotPlaced)));
    }

    // -----------------------------------------------------------------------
    // Movement tests
    // -----------------------------------------------------------------------

    #[test]
    fn move_anchored_reanchors() {
        let (_sm, ids) = make_entities(1);
        let mut index = SpatialIndex::new();
        index.place_anchored(ids[0], tile(0, 0), Rotation::None).unwrap();

        let ev = index.move_to(ids[0], tile(5, 5)).unwrap();
        assert_eq!(ev, StructuralEvent::ReAnchored);
        assert_eq!(index.anchored_at(tile(0, 0)).count(), 0);
        assert_eq!(index.anchored_tile(ids[0]), Some(tile(5, 5)));
    }

    #[test]
    fn move_loose_entity() {
        let (_sm, ids) = make_entities(1);
        let mut index = SpatialIndex::new();
        index.place(ids[0], tile(0, 0), Rotation::None).unwrap();

        assert_eq!(index.move_to(ids[0], tile(1, 0)).unwrap(), StructuralEvent::Moved);
        assert_eq!(index.placement(ids[0]).unwrap().tile, tile(1, 0));
        assert_eq!(index.tile_count(), 0);
    }

    #[test]
    fn rotate_updates_placement() {
        let (_sm, ids) = make_entities(1);
        let mut index = SpatialIndex::new();
        index.place_anchored(ids[0], tile(0, 0), Rotation::None).unwrap();

        assert_eq!(
            index.rotate(ids[0], Rotation::Cw180).unwrap(),
            StructuralEvent::Rotated
        );
        assert_eq!(index.placement(ids[0]).unwrap().rotation, Rotation::Cw180);
    }

    #[test]
    fn remove_returns_last_placement() {
        let (_sm, ids) = make_entities(1);
        let mut index = SpatialIndex::new();
        index.place_anchored(ids[0], tile(4, 4), Rotation::Cw90).unwrap();

        let placement = index.remove(ids[0]).unwrap();
        assert_eq!(placement.tile, tile(4, 4));
        assert!(placement.anchored);
        assert_eq!(index.entity_count(), 0);
        assert_eq!(index.tile_count(), 0);
    }

    #[test]
    fn placement_serializes() {
        let placement = Placement {
            tile: tile(1, 2),
            rotation: Rotation::Cw90,
            anchored: true,
        };
        let json = serde_json::to_string(&placement).unwrap();
        let back: Placement = serde_json::from_str(&json).unwrap();
        assert_eq!(back, placement);
    }
}
