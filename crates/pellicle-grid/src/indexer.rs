//! Mapping between continuous positions, voxels and flat cell indices.

use pellicle_core::{CellIndex, DomainGeometry, SimulationMode, Vector, Voxel};

/// Coordinate mapper for the padded voxel lattice.
///
/// The lattice covers the domain with `ceil(length / resolution)` voxels per
/// axis (the resolution is corrected so an integer number of voxels tiles
/// the substratum-normal extent exactly) plus one padding layer on each
/// side. Flat indices enumerate the padded lattice:
///
/// ```text
/// index = (i+1) + (j+1)·(nI+2) + (k+1)·(nI+2)·(nJ+2)
/// ```
///
/// with `(i, j, k)` the unpadded voxel coordinate. In chemostat mode the
/// whole domain is one well-mixed cell and every position maps to index 0.
#[derive(Clone, Debug)]
pub struct VoxelIndexer {
    n_i: i32,
    n_j: i32,
    n_k: i32,
    res: f64,
    lengths: [f64; 3],
    periodic: [bool; 3],
    is_3d: bool,
    chemostat: bool,
}

impl VoxelIndexer {
    /// Build the mapper for a validated geometry and simulation mode.
    pub fn new(geometry: &DomainGeometry, mode: SimulationMode) -> Self {
        if mode == SimulationMode::Chemostat {
            return Self {
                n_i: 1,
                n_j: 1,
                n_k: 1,
                res: geometry.resolution,
                lengths: [geometry.length_x, geometry.length_y, geometry.length_z],
                periodic: [false, false, false],
                is_3d: geometry.is_3d,
                chemostat: true,
            };
        }

        let n_i = (geometry.length_x / geometry.resolution).ceil() as i32;
        let res = geometry.length_x / n_i as f64;
        let n_j = (geometry.length_y / res).ceil() as i32;
        let n_k = if geometry.is_3d {
            (geometry.length_z / res).ceil() as i32
        } else {
            1
        };

        Self {
            n_i,
            n_j,
            n_k,
            res,
            lengths: [geometry.length_x, geometry.length_y, geometry.length_z],
            periodic: geometry.periodic,
            is_3d: geometry.is_3d,
            chemostat: false,
        }
    }

    /// Corrected voxel edge length.
    pub fn resolution(&self) -> f64 {
        self.res
    }

    /// Unpadded lattice dimensions `(nI, nJ, nK)`.
    pub fn dims(&self) -> (i32, i32, i32) {
        (self.n_i, self.n_j, self.n_k)
    }

    /// Domain extents `[x, y, z]`.
    pub fn lengths(&self) -> [f64; 3] {
        self.lengths
    }

    /// True for a three-dimensional lattice.
    pub fn is_3d(&self) -> bool {
        self.is_3d
    }

    /// True when the lattice is collapsed to a single well-mixed cell.
    pub fn is_chemostat(&self) -> bool {
        self.chemostat
    }

    /// Total number of cells, padding included.
    pub fn cell_count(&self) -> usize {
        if self.chemostat {
            1
        } else {
            ((self.n_i + 2) * (self.n_j + 2) * (self.n_k + 2)) as usize
        }
    }

    /// The voxel containing a continuous position (no bounds check).
    pub fn voxel_of(&self, position: Vector) -> Voxel {
        Voxel::new(
            (position.x / self.res).floor() as i32,
            (position.y / self.res).floor() as i32,
            (position.z / self.res).floor() as i32,
        )
    }

    /// The flat cell index for a continuous position.
    ///
    /// Returns `None` for non-finite positions and for positions beyond the
    /// padding layer; callers treat both as a geometry failure and kill the
    /// agent rather than clamping.
    pub fn index(&self, position: Vector) -> Option<CellIndex> {
        if self.chemostat {
            return Some(CellIndex(0));
        }
        if !position.is_finite() {
            return None;
        }
        self.index_of_voxel(self.voxel_of(position))
    }

    /// The flat cell index for a voxel coordinate, padding included.
    ///
    /// Accepts `-1..=n` per axis; anything further out returns `None`.
    pub fn index_of_voxel(&self, voxel: Voxel) -> Option<CellIndex> {
        if self.chemostat {
            return Some(CellIndex(0));
        }
        if voxel.i < -1
            || voxel.i > self.n_i
            || voxel.j < -1
            || voxel.j > self.n_j
            || voxel.k < -1
            || voxel.k > self.n_k
        {
            return None;
        }
        let i = (voxel.i + 1) as usize;
        let j = (voxel.j + 1) as usize;
        let k = (voxel.k + 1) as usize;
        let stride_j = (self.n_i + 2) as usize;
        let stride_k = stride_j * (self.n_j + 2) as usize;
        Some(CellIndex(i + j * stride_j + k * stride_k))
    }

    /// The unpadded voxel coordinate of a flat cell index.
    pub fn voxel_at(&self, index: CellIndex) -> Voxel {
        if self.chemostat {
            return Voxel::new(0, 0, 0);
        }
        let stride_j = (self.n_i + 2) as usize;
        let stride_k = stride_j * (self.n_j + 2) as usize;
        let k = index.0 / stride_k;
        let j = (index.0 - k * stride_k) / stride_j;
        let i = index.0 - k * stride_k - j * stride_j;
        Voxel::new(i as i32 - 1, j as i32 - 1, k as i32 - 1)
    }

    /// The centre of a cell in continuous coordinates.
    pub fn center(&self, index: CellIndex) -> Vector {
        let v = self.voxel_at(index);
        Vector::new(
            (v.i as f64 + 0.5) * self.res,
            (v.j as f64 + 0.5) * self.res,
            (v.k as f64 + 0.5) * self.res,
        )
    }

    /// True if the voxel lies inside the unpadded domain.
    pub fn is_valid_voxel(&self, voxel: Voxel) -> bool {
        voxel.i >= 0
            && voxel.i < self.n_i
            && voxel.j >= 0
            && voxel.j < self.n_j
            && voxel.k >= 0
            && voxel.k < self.n_k
    }

    /// True if the position lies inside the unpadded domain.
    pub fn is_valid(&self, position: Vector) -> bool {
        if !position.is_finite() {
            return false;
        }
        if self.chemostat {
            return true;
        }
        self.is_valid_voxel(self.voxel_of(position))
    }

    /// Step from a cell by whole voxels, honouring boundary topology.
    ///
    /// Periodic axes wrap directly to the real cell on the far side;
    /// non-periodic axes may land one layer into the padding and return
    /// `None` beyond it.
    pub fn offset(&self, index: CellIndex, di: i32, dj: i32, dk: i32) -> Option<CellIndex> {
        if self.chemostat {
            return if di == 0 && dj == 0 && dk == 0 {
                Some(index)
            } else {
                None
            };
        }
        let v = self.voxel_at(index);
        let i = resolve_axis(v.i, di, self.n_i, self.periodic[0])?;
        let j = resolve_axis(v.j, dj, self.n_j, self.periodic[1])?;
        let k = resolve_axis(v.k, dk, self.n_k, self.periodic[2])?;
        self.index_of_voxel(Voxel::new(i, j, k))
    }

    /// Wrap a position into the domain on every periodic axis.
    pub fn wrap_position(&self, position: &mut Vector) {
        if self.periodic[1] {
            position.y = position.y.rem_euclid(self.lengths[1]);
        }
        if self.is_3d && self.periodic[2] {
            position.z = position.z.rem_euclid(self.lengths[2]);
        }
    }

    /// Shortest displacement from `b` to `a` under periodic boundaries.
    pub fn shortest_difference(&self, a: Vector, b: Vector) -> Vector {
        let mut d = a - b;
        if self.periodic[1] && d.y.abs() > 0.5 * self.lengths[1] {
            d.y -= d.y.signum() * self.lengths[1];
        }
        if self.is_3d {
            if self.periodic[2] && d.z.abs() > 0.5 * self.lengths[2] {
                d.z -= d.z.signum() * self.lengths[2];
            }
        } else {
            d.z = 0.0;
        }
        d
    }
}

/// Resolve one axis of a voxel step.
fn resolve_axis(coord: i32, delta: i32, n: i32, periodic: bool) -> Option<i32> {
    let target = coord + delta;
    if periodic {
        Some(target.rem_euclid(n))
    } else if target < -1 || target > n {
        None
    } else {
        Some(target)
    }
}
