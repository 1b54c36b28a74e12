//! Compact set of cardinal directions used by directional edge policies.

use crate::{Direction, Rotation};
use serde::{Deserialize, Serialize};
use std::ops::{BitOr, BitOrAssign};

/// A set of [`Direction`]s packed into one byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct DirectionMask(u8);

impl DirectionMask {
    pub const NONE: DirectionMask = DirectionMask(0);
    pub const NORTH: DirectionMask = DirectionMask(1 << 0);
    pub const EAST: DirectionMask = DirectionMask(1 << 1);
    pub const SOUTH: DirectionMask = DirectionMask(1 << 2);
    pub const WEST: DirectionMask = DirectionMask(1 << 3);
    pub const ALL: DirectionMask = DirectionMask(0b1111);

    pub fn from_direction(dir: Direction) -> Self {
        DirectionMask(1 << dir.bit())
    }

    pub fn from_directions(dirs: impl IntoIterator<Item = Direction>) -> Self {
        dirs.into_iter()
            .fold(Self::NONE, |mask, dir| mask | Self::from_direction(dir))
    }

    pub fn contains(self, dir: Direction) -> bool {
        self.0 & (1 << dir.bit()) != 0
    }

    pub fn insert(&mut self, dir: Direction) {
        self.0 |= 1 << dir.bit();
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    /// Rotate every set direction by `rotation`.
    pub fn rotated(self, rotation: Rotation) -> Self {
        Self::from_directions(self.iter().map(|dir| dir.rotated(rotation)))
    }

    /// Iterate the set directions in N, E, S, W order.
    pub fn iter(self) -> impl Iterator<Item = Direction> {
        Direction::all().into_iter().filter(move |dir| self.contains(*dir))
    }
}

impl BitOr for DirectionMask {
    type Output = DirectionMask;

    fn bitor(self, rhs: DirectionMask) -> DirectionMask {
        DirectionMask(self.0 | rhs.0)
    }
}

impl BitOrAssign for DirectionMask {
    fn bitor_assign(&mut self, rhs: DirectionMask) {
        self.0 |= rhs.0;
    }
}

impl From<Direction> for DirectionMask {
    fn from(dir: Direction) -> Self {
        Self::from_direction(dir)
    }
}
