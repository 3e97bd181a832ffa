//! Spatial Field
//!
//! Positions of live agents on a toroidal square, either a discrete grid
//! (integer cells, several occupants allowed) or a continuous plane.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::ops::{Add, Mul, Neg, Sub};

use super::agent::AgentId;

/// Topology of the space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SpaceMode {
    /// Integer cells with Moore neighborhoods
    Grid,
    /// Real-valued positions with Euclidean neighborhoods
    #[default]
    Continuous,
}

/// A 2D vector used for positions, offsets and headings
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Unit vector at the given angle (radians)
    pub fn from_angle(angle: f64) -> Self {
        Self::new(angle.cos(), angle.sin())
    }

    pub fn length(&self) -> f64 {
        self.x.hypot(self.y)
    }

    pub fn is_zero(&self) -> bool {
        self.x == 0.0 && self.y == 0.0
    }

    /// Unit vector in the same direction; the zero vector stays zero.
    pub fn normalized(&self) -> Self {
        let len = self.length();
        if len == 0.0 {
            Vec2::ZERO
        } else {
            Vec2::new(self.x / len, self.y / len)
        }
    }

    /// Heading angle in radians
    pub fn angle(&self) -> f64 {
        self.y.atan2(self.x)
    }

    pub fn to_array(self) -> [f64; 2] {
        [self.x, self.y]
    }
}

impl Add for Vec2 {
    type Output = Vec2;
    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2 {
    type Output = Vec2;
    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Vec2 {
    type Output = Vec2;
    fn mul(self, rhs: f64) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

impl Neg for Vec2 {
    type Output = Vec2;
    fn neg(self) -> Vec2 {
        Vec2::new(-self.x, -self.y)
    }
}

/// Wraps a coordinate into [0, dim).
pub fn wrap(value: f64, dim: f64) -> f64 {
    let mut r = value % dim;
    if r < 0.0 {
        r += dim;
    }
    // -tiny % dim + dim can round up to dim itself
    if r >= dim {
        0.0
    } else {
        r
    }
}

/// Minimal signed per-axis difference `to - from` on a torus of size `dim`.
pub fn toroidal_delta(from: f64, to: f64, dim: f64) -> f64 {
    let mut d = to - from;
    if d > dim / 2.0 {
        d -= dim;
    } else if d < -dim / 2.0 {
        d += dim;
    }
    d
}

/// An agent found by a neighborhood query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub id: AgentId,
    /// Toroidal offset from the query position to the neighbor
    pub offset: Vec2,
    /// Euclidean length of `offset`
    pub distance: f64,
}

/// Positions of every live agent
#[derive(Debug, Clone)]
pub struct SpatialField {
    mode: SpaceMode,
    dims: u32,
    positions: BTreeMap<AgentId, Vec2>,
    /// Occupants per grid cell (grid mode only)
    cells: HashMap<(i64, i64), Vec<AgentId>>,
}

impl SpatialField {
    pub fn new(mode: SpaceMode, dims: u32) -> Self {
        Self {
            mode,
            dims,
            positions: BTreeMap::new(),
            cells: HashMap::new(),
        }
    }

    pub fn mode(&self) -> SpaceMode {
        self.mode
    }

    pub fn dims(&self) -> u32 {
        self.dims
    }

    pub fn is_continuous(&self) -> bool {
        self.mode == SpaceMode::Continuous
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Wraps a position onto the torus, snapping to a cell in grid mode.
    pub fn wrap(&self, p: Vec2) -> Vec2 {
        match self.mode {
            SpaceMode::Continuous => {
                let d = self.dims as f64;
                Vec2::new(wrap(p.x, d), wrap(p.y, d))
            }
            SpaceMode::Grid => {
                let (x, y) = self.cell_of(p);
                Vec2::new(x as f64, y as f64)
            }
        }
    }

    fn cell_of(&self, p: Vec2) -> (i64, i64) {
        let d = self.dims as i64;
        (
            (p.x.floor() as i64).rem_euclid(d),
            (p.y.floor() as i64).rem_euclid(d),
        )
    }

    /// Toroidal offset from `from` to `to`.
    pub fn delta(&self, from: Vec2, to: Vec2) -> Vec2 {
        let d = self.dims as f64;
        Vec2::new(toroidal_delta(from.x, to.x, d), toroidal_delta(from.y, to.y, d))
    }

    pub fn position(&self, id: AgentId) -> Option<Vec2> {
        self.positions.get(&id).copied()
    }

    /// Puts an agent at `p` (wrapped), moving it if it is already placed.
    pub fn place(&mut self, id: AgentId, p: Vec2) -> Vec2 {
        let p = self.wrap(p);
        if let Some(old) = self.positions.insert(id, p) {
            self.unlink_cell(id, old);
        }
        if self.mode == SpaceMode::Grid {
            let cell = self.cell_of(p);
            self.cells.entry(cell).or_default().push(id);
        }
        p
    }

    /// Moves an already placed agent.
    pub fn relocate(&mut self, id: AgentId, p: Vec2) -> Vec2 {
        self.place(id, p)
    }

    pub fn remove(&mut self, id: AgentId) -> Option<Vec2> {
        let old = self.positions.remove(&id)?;
        self.unlink_cell(id, old);
        Some(old)
    }

    fn unlink_cell(&mut self, id: AgentId, p: Vec2) {
        if self.mode != SpaceMode::Grid {
            return;
        }
        let cell = self.cell_of(p);
        if let Some(occupants) = self.cells.get_mut(&cell) {
            occupants.retain(|&other| other != id);
            if occupants.is_empty() {
                self.cells.remove(&cell);
            }
        }
    }

    /// True when some agent other than `except` sits in the cell of `p`.
    pub fn is_occupied(&self, p: Vec2, except: AgentId) -> bool {
        match self.mode {
            SpaceMode::Grid => self
                .cells
                .get(&self.cell_of(p))
                .map(|occupants| occupants.iter().any(|&id| id != except))
                .unwrap_or(false),
            SpaceMode::Continuous => {
                let p = self.wrap(p);
                self.positions
                    .iter()
                    .any(|(&id, &q)| id != except && q == p)
            }
        }
    }

    /// Agents within `radius` of `center`, in ascending id order.
    ///
    /// Continuous space uses Euclidean toroidal distance; the grid uses the
    /// Moore (Chebyshev) distance in whole cells.
    pub fn neighbors_within(
        &self,
        center: Vec2,
        radius: f64,
        exclude: Option<AgentId>,
    ) -> Vec<Neighbor> {
        let cell_radius = radius.floor();
        self.positions
            .iter()
            .filter(|(&id, _)| Some(id) != exclude)
            .filter_map(|(&id, &p)| {
                let offset = self.delta(center, p);
                let distance = offset.length();
                let inside = match self.mode {
                    SpaceMode::Continuous => distance <= radius,
                    SpaceMode::Grid => offset.x.abs().max(offset.y.abs()) <= cell_radius,
                };
                inside.then_some(Neighbor { id, offset, distance })
            })
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (AgentId, Vec2)> + '_ {
        self.positions.iter().map(|(&id, &p)| (id, p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_is_idempotent_and_in_range() {
        for v in [-250.5, -100.0, -0.0, -1e-18, 0.0, 3.2, 99.999, 100.0, 1234.5] {
            let w = wrap(v, 100.0);
            assert!((0.0..100.0).contains(&w), "{v} wrapped to {w}");
            assert_eq!(wrap(w, 100.0), w);
        }
    }

    #[test]
    fn test_toroidal_delta_takes_short_way() {
        assert_eq!(toroidal_delta(1.0, 9.0, 10.0), -2.0);
        assert_eq!(toroidal_delta(9.0, 1.0, 10.0), 2.0);
        assert_eq!(toroidal_delta(2.0, 4.0, 10.0), 2.0);
    }

    #[test]
    fn test_continuous_neighbors_across_edge() {
        let mut field = SpatialField::new(SpaceMode::Continuous, 10);
        field.place(AgentId(1), Vec2::new(0.5, 0.5));
        field.place(AgentId(2), Vec2::new(9.5, 0.5));
        field.place(AgentId(3), Vec2::new(5.0, 5.0));

        let found = field.neighbors_within(Vec2::new(0.5, 0.5), 1.5, Some(AgentId(1)));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, AgentId(2));
        assert_eq!(found[0].offset, Vec2::new(-1.0, 0.0));
    }

    #[test]
    fn test_neighbors_sorted_by_id() {
        let mut field = SpatialField::new(SpaceMode::Continuous, 20);
        field.place(AgentId(9), Vec2::new(1.0, 1.0));
        field.place(AgentId(2), Vec2::new(2.0, 1.0));
        field.place(AgentId(5), Vec2::new(1.0, 2.0));

        let ids: Vec<_> = field
            .neighbors_within(Vec2::new(1.0, 1.0), 3.0, None)
            .into_iter()
            .map(|n| n.id)
            .collect();
        assert_eq!(ids, vec![AgentId(2), AgentId(5), AgentId(9)]);
    }

    #[test]
    fn test_grid_moore_neighborhood() {
        let mut field = SpatialField::new(SpaceMode::Grid, 10);
        field.place(AgentId(0), Vec2::new(5.0, 5.0));
        field.place(AgentId(1), Vec2::new(6.0, 6.0)); // diagonal
        field.place(AgentId(2), Vec2::new(7.0, 5.0)); // two cells away

        let found = field.neighbors_within(Vec2::new(5.0, 5.0), 1.0, Some(AgentId(0)));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, AgentId(1));
    }

    #[test]
    fn test_grid_occupancy() {
        let mut field = SpatialField::new(SpaceMode::Grid, 4);
        field.place(AgentId(0), Vec2::new(1.0, 1.0));
        field.place(AgentId(1), Vec2::new(5.0, -3.0)); // wraps to (1, 1)

        assert_eq!(field.position(AgentId(1)), Some(Vec2::new(1.0, 1.0)));
        assert!(field.is_occupied(Vec2::new(1.0, 1.0), AgentId(0)));

        field.relocate(AgentId(1), Vec2::new(2.0, 2.0));
        assert!(!field.is_occupied(Vec2::new(1.0, 1.0), AgentId(0)));

        field.remove(AgentId(1));
        assert!(!field.is_occupied(Vec2::new(2.0, 2.0), AgentId(0)));
        assert_eq!(field.len(), 1);
    }

    #[test]
    fn test_normalize_zero_vector() {
        assert_eq!(Vec2::ZERO.normalized(), Vec2::ZERO);
        let n = Vec2::new(3.0, 4.0).normalized();
        assert!((n.length() - 1.0).abs() < 1e-12);
    }
}
