//! Area codes for location searches without a spatial index.
//!
//! The globe is projected onto the equator/meridian axes (see
//! [`projection`](super::projection)) and cut into square cells of
//! `cell_size` meters. A cell is identified by a packed [`AreaCode`].
//!
//! At index time a sample is stored with the codes of its own cell, the
//! nearer side neighbor on each axis and optionally the nearer corner
//! neighbor. At query time the search point's [`candidate_codes`] are
//! matched against the stored ones by overlap. Filtering this way:
//! - includes every record within `cell_size / 2` of the search point,
//! - may include records up to `(1 + sqrt(2)) * cell_size` (~2.414x) away,
//! - never includes records beyond that, given `cell_size >= MIN_CELL_SIZE`.
//!
//! Callers that need exact results post-filter with [`distance`](super::projection::distance).

use crate::core::projection::{distance_from_equator, distance_from_meridian};
use crate::models::{AreaCode, CellSize, GeoPoint};

/// Offset added to both cell indices so they pack as non-negative numbers
const INDEX_OFFSET: i64 = 50_000;

/// Base 10 multiplier reserving 5 digits for the meridian index
const PACK_BASE: i64 = 100_000;

/// Smallest cell size whose indices stay in `-50_000..50_000` all over the
/// globe (half the circumference is ~20,015 km along the Equator)
pub const MIN_CELL_SIZE: CellSize = 401;

/// Projected position of a point and the indices of the cell it falls in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellPosition {
    /// Distance from the Equator in meters
    pub d_eq: i64,
    /// Distance from the reference meridian in meters
    pub d_mer: i64,
    pub cell_eq: i64,
    pub cell_mer: i64,
}

impl CellPosition {
    /// Offset inside the cell along the equator axis, in `[0, cell_size)`
    pub fn in_eq(&self, cell_size: CellSize) -> i64 {
        self.d_eq - self.cell_eq * cell_size
    }

    /// Offset inside the cell along the meridian axis, in `[0, cell_size)`
    pub fn in_mer(&self, cell_size: CellSize) -> i64 {
        self.d_mer - self.cell_mer * cell_size
    }
}

/// Computes the projected distances of `point` and its cell indices.
///
/// Distances are floored to whole meters and the indices use floor division,
/// so index `-1` covers `[-cell_size, 0)` south of the Equator and west of
/// the meridian. `cell_size` must be positive.
pub fn cell_indices(cell_size: CellSize, point: &GeoPoint) -> CellPosition {
    let d_eq = distance_from_equator(point.latitude).floor() as i64;
    let d_mer = distance_from_meridian(point.latitude, point.longitude).floor() as i64;

    CellPosition {
        d_eq,
        d_mer,
        cell_eq: d_eq.div_euclid(cell_size),
        cell_mer: d_mer.div_euclid(cell_size),
    }
}

/// Packs two cell indices into one base 10 area code.
///
/// Collision free for indices in `-50_000..50_000`, which holds everywhere
/// for cells of at least [`MIN_CELL_SIZE`]. Finer grids wrap the meridian
/// index into the equator digits far from the reference meridian.
#[inline]
pub fn pack(cell_eq: i64, cell_mer: i64) -> AreaCode {
    AreaCode((cell_eq + INDEX_OFFSET) * PACK_BASE + (cell_mer + INDEX_OFFSET))
}

/// Area code of the cell `point` falls in, always the first of its [`candidate_codes`]
pub fn primary_code(cell_size: CellSize, point: &GeoPoint) -> AreaCode {
    let pos = cell_indices(cell_size, point);
    pack(pos.cell_eq, pos.cell_mer)
}

/// Area codes to store with a sample at `point`, 3 or 4 of them.
///
/// The first code is always the [`primary_code`]. Then one side neighbor per
/// axis, chosen by which half of the cell the point is in, and the corner
/// neighbor between the two if the point is closer than `cell_size / 2` to
/// their shared corner.
///
/// `cell_size / 2` truncates, so odd cell sizes shift the half-cell boundary
/// and the corner radius down by half a meter.
pub fn candidate_codes(cell_size: CellSize, point: &GeoPoint) -> Vec<AreaCode> {
    let pos = cell_indices(cell_size, point);
    let (c_eq, c_mer) = (pos.cell_eq, pos.cell_mer);

    let in_eq = pos.in_eq(cell_size);
    let in_mer = pos.in_mer(cell_size);

    let half = cell_size / 2;
    let half_sq = half * half;

    let south = in_eq <= half;
    let west = in_mer <= half;

    let n_eq = if south { c_eq - 1 } else { c_eq + 1 };
    let n_mer = if west { c_mer - 1 } else { c_mer + 1 };

    let mut codes = Vec::with_capacity(4);
    codes.push(pack(c_eq, c_mer));
    codes.push(pack(n_eq, c_mer));
    codes.push(pack(c_eq, n_mer));

    // Distances to the edges shared with the chosen neighbors
    let y = if south { in_eq } else { cell_size - in_eq };
    let x = if west { in_mer } else { cell_size - in_mer };
    if x * x + y * y < half_sq {
        codes.push(pack(n_eq, n_mer));
    }

    codes
}

/// Tells if two code sets share at least one area code.
pub fn area_codes_intersect(a: &[AreaCode], b: &[AreaCode]) -> bool {
    a.iter().any(|code| b.contains(code))
}
