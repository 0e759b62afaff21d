use super::{ItemId, ItemKind, SpatialIndex, SpatialItem};
use crate::game::error::GridError;
use crate::game::fixed_math::{half, FixedNum, FixedVec3};

// ============================================================================
// Box Collision
// ============================================================================

impl SpatialItem {
    /// Approximate collision test against the box `v1..v2`, using this item's
    /// position advanced by its velocity.
    ///
    /// Three stages, in order:
    /// 1. Reject when the z ranges do not overlap.
    /// 2. Accept when the box center lies strictly inside this item's box
    ///    grown by half the other box, shrunk by one unit on y (first test)
    ///    or on x (second test).
    /// 3. Accept when the Manhattan distance between centers is below the
    ///    summed half extents minus one.
    ///
    /// This is not an exact overlap test and boxes touching exactly on an
    /// axis-aligned boundary may give different answers depending on which
    /// side asks. All clients must run this exact sequence to agree in
    /// lockstep.
    pub fn collides_with_box(&self, v1: FixedVec3, v2: FixedVec3) -> bool {
        let one = FixedNum::ONE;
        let z = self.position.z + self.velocity.z;
        if z.max(v1.z) >= (z + self.depth()).min(v2.z) {
            return false;
        }

        let half_w = half(v2.x - v1.x);
        let half_h = half(v2.y - v1.y);
        let center_x = v1.x + half_w;
        let center_y = v1.y + half_h;

        let my_x = self.left_edge() + self.velocity.x;
        let my_y = self.top_edge() + self.velocity.y;
        let w = self.width();
        let h = self.height();

        if center_x > my_x - half_w
            && center_x < my_x + w + half_w
            && center_y > my_y - half_h + one
            && center_y < my_y + h + half_h - one
        {
            return true;
        }

        if center_x > my_x - half_w + one
            && center_x < my_x + w + half_w - one
            && center_y > my_y - half_h
            && center_y < my_y + h + half_h
        {
            return true;
        }

        let my_center_x = my_x + half(w);
        let my_center_y = my_y + half(h);
        let distance = (my_center_x - center_x).abs() + (my_center_y - center_y).abs();
        distance < half(w) + half_w + half(h) + half_h - one
    }

    /// Collision test against another item's box advanced by its velocity.
    pub fn collides_with(&self, other: &SpatialItem) -> bool {
        let min = FixedVec3::new(
            other.left_edge() + other.velocity.x,
            other.top_edge() + other.velocity.y,
            other.position.z + other.velocity.z,
        );
        self.collides_with_box(min, min + other.size)
    }
}

// ============================================================================
// Index Queries
// ============================================================================

impl SpatialIndex {
    /// Box collision between an item and an arbitrary box. `false` for unknown items.
    pub fn test_box_collision(&self, id: ItemId, v1: FixedVec3, v2: FixedVec3) -> bool {
        self.get(id).is_some_and(|item| item.collides_with_box(v1, v2))
    }

    pub fn items_collide(&self, a: ItemId, b: ItemId) -> bool {
        match (self.get(a), self.get(b)) {
            (Some(a), Some(b)) => a.collides_with(b),
            _ => false,
        }
    }

    /// Whether any other item in the cell blocks `for_item`.
    ///
    /// Occupants count only if they share `for_item`'s flying status (ground
    /// items only block ground units). Destroyed units never count, moving
    /// units only with `include_moving`. Shots never occupy cells. Without
    /// `for_item` the query is made for a ground unit.
    pub fn cell_occupied(
        &self,
        x: i32,
        y: i32,
        for_item: Option<ItemId>,
        include_moving: bool,
    ) -> Result<bool, GridError> {
        let cell = self.grid.cell(x, y)?;
        let flying = for_item
            .and_then(|id| self.unit(id))
            .is_some_and(|unit| unit.flying);

        Ok(cell.items().iter().any(|&occupant| {
            if Some(occupant) == for_item {
                return false;
            }
            match self.get(occupant).map(|item| &item.kind) {
                Some(ItemKind::Unit(unit)) => {
                    !unit.destroyed && unit.flying == flying && (include_moving || !unit.moving)
                }
                Some(ItemKind::Item) => !flying,
                Some(ItemKind::Shot) | None => false,
            }
        }))
    }

    /// [`Self::cell_occupied`] over every cell of an inclusive rectangle.
    pub fn cells_occupied(
        &self,
        (x1, y1): (i32, i32),
        (x2, y2): (i32, i32),
        for_item: Option<ItemId>,
        include_moving: bool,
    ) -> Result<bool, GridError> {
        for y in y1..=y2 {
            for x in x1..=x2 {
                if self.cell_occupied(x, y, for_item, include_moving)? {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    /// Items in the given cells that collide with `id`, deduplicated.
    pub fn collisions_at(&self, id: ItemId, cells: &[(i32, i32)]) -> Vec<ItemId> {
        let Some(item) = self.get(id) else {
            return Vec::new();
        };
        let mut result = Vec::new();
        for &(x, y) in cells {
            let Ok(cell) = self.grid.cell(x, y) else {
                continue;
            };
            for &other in cell.items() {
                if other == id || result.contains(&other) {
                    continue;
                }
                if self.get(other).is_some_and(|o| item.collides_with(o)) {
                    result.push(other);
                }
            }
        }
        result
    }
}
