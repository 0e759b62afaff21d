use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::game::fixed_math::{half, FixedNum, FixedVec3};

pub type PlayerId = u8;

/// Handle into the [`SpatialIndex`](super::SpatialIndex) arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId(pub(crate) u32);

impl ItemId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Per-player visibility of a unit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct VisibleStatus(u8);

impl VisibleStatus {
    pub const UNKNOWN: Self = Self(0);
    /// The player currently sees the unit.
    pub const VISIBLE: Self = Self(1);
    /// The player has seen the unit before (facility ghosts).
    pub const EARLIER: Self = Self(2);

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }

    pub fn is_visible(self) -> bool {
        self.contains(Self::VISIBLE)
    }
}

impl std::ops::BitOr for VisibleStatus {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

#[derive(Clone, Debug, Default)]
pub struct UnitState {
    pub owner: PlayerId,
    pub flying: bool,
    pub facility: bool,
    pub destroyed: bool,
    pub moving: bool,
    /// Sight radius in cells. Zero means the unit does not see.
    pub sight_range: u32,
    visibility: SmallVec<[VisibleStatus; 8]>,
}

impl UnitState {
    pub fn new(owner: PlayerId) -> Self {
        Self { owner, ..Default::default() }
    }

    pub fn with_sight(mut self, sight_range: u32) -> Self {
        self.sight_range = sight_range;
        self
    }

    pub fn flying(mut self) -> Self {
        self.flying = true;
        self
    }

    pub fn facility(mut self) -> Self {
        self.facility = true;
        self
    }

    pub fn visible_status(&self, player: PlayerId) -> VisibleStatus {
        self.visibility.get(player as usize).copied().unwrap_or_default()
    }

    /// Returns `true` if the status changed.
    pub fn set_visible_status(&mut self, player: PlayerId, status: VisibleStatus) -> bool {
        let index = player as usize;
        if self.visibility.len() <= index {
            if status == VisibleStatus::UNKNOWN {
                return false;
            }
            self.visibility.resize(index + 1, VisibleStatus::UNKNOWN);
        }
        let changed = self.visibility[index] != status;
        self.visibility[index] = status;
        changed
    }
}

#[derive(Clone, Debug)]
pub enum ItemKind {
    Unit(UnitState),
    /// Projectiles never occupy cells.
    Shot,
    /// Static map items (wrecks, mines).
    Item,
}

impl ItemKind {
    pub fn as_unit(&self) -> Option<&UnitState> {
        match self {
            ItemKind::Unit(unit) => Some(unit),
            _ => None,
        }
    }

    pub fn as_unit_mut(&mut self) -> Option<&mut UnitState> {
        match self {
            ItemKind::Unit(unit) => Some(unit),
            _ => None,
        }
    }

    pub fn is_shot(&self) -> bool {
        matches!(self, ItemKind::Shot)
    }
}

/// A simulation item with a bounding box.
///
/// `position` is the center on the map plane and the bottom in z;
/// `size` is (width, height, depth). Geometry can only change through
/// [`SpatialIndex`](super::SpatialIndex) so that cell membership stays in sync.
#[derive(Clone, Debug)]
pub struct SpatialItem {
    pub kind: ItemKind,
    pub velocity: FixedVec3,
    pub(super) position: FixedVec3,
    pub(super) size: FixedVec3,
    pub(super) cells: SmallVec<[(i32, i32); 4]>,
    pub(super) cells_dirty: bool,
    pub(super) in_cells: bool,
}

impl SpatialItem {
    pub fn new(kind: ItemKind, position: FixedVec3, size: FixedVec3) -> Self {
        Self {
            kind,
            velocity: FixedVec3::ZERO,
            position,
            size,
            cells: SmallVec::new(),
            cells_dirty: true,
            in_cells: false,
        }
    }

    pub fn unit(unit: UnitState, position: FixedVec3, size: FixedVec3) -> Self {
        Self::new(ItemKind::Unit(unit), position, size)
    }

    pub fn position(&self) -> FixedVec3 {
        self.position
    }

    pub fn size(&self) -> FixedVec3 {
        self.size
    }

    pub fn width(&self) -> FixedNum {
        self.size.x
    }

    pub fn height(&self) -> FixedNum {
        self.size.y
    }

    pub fn depth(&self) -> FixedNum {
        self.size.z
    }

    pub fn left_edge(&self) -> FixedNum {
        self.position.x - half(self.size.x)
    }

    pub fn top_edge(&self) -> FixedNum {
        self.position.y - half(self.size.y)
    }

    pub fn right_edge(&self) -> FixedNum {
        self.left_edge() + self.size.x
    }

    pub fn bottom_edge(&self) -> FixedNum {
        self.top_edge() + self.size.y
    }

    /// Cached cell set; only meaningful while [`Self::cells_dirty`] is false.
    pub fn cells(&self) -> &[(i32, i32)] {
        &self.cells
    }

    pub fn cells_dirty(&self) -> bool {
        self.cells_dirty
    }

    pub fn is_in_cells(&self) -> bool {
        self.in_cells
    }

    /// The cell the item's center is in.
    pub fn center_cell(&self) -> (i32, i32) {
        (self.position.x.floor().to_num(), self.position.y.floor().to_num())
    }
}
