//! The voxel grid: cells, status refresh and neighbour queries.

use crate::cell::{CellStatus, GridCell};
use crate::indexer::VoxelIndexer;
use pellicle_core::{AgentArena, AgentId, CellIndex, DomainGeometry, SimulationMode, Vector};

/// Face offsets in the order −x, +x, −y, +y, −z, +z.
pub const FACES: [(i32, i32, i32); 6] = [
    (-1, 0, 0),
    (1, 0, 0),
    (0, -1, 0),
    (0, 1, 0),
    (0, 0, -1),
    (0, 0, 1),
];

/// The spatial grid owning every [`GridCell`].
///
/// Cells are created once at construction and never destroyed; only
/// membership and status change afterwards.
#[derive(Debug)]
pub struct VoxelGrid {
    indexer: VoxelIndexer,
    cells: Vec<GridCell>,
    chemostat: bool,
}

impl VoxelGrid {
    /// Build the grid for a validated geometry.
    pub fn new(geometry: &DomainGeometry, mode: SimulationMode) -> Self {
        let indexer = VoxelIndexer::new(geometry, mode);
        let chemostat = indexer.is_chemostat();
        let res = indexer.resolution();
        let (n_i, _, _) = indexer.dims();

        let mut cells = Vec::with_capacity(indexer.cell_count());
        for flat in 0..indexer.cell_count() {
            let index = CellIndex(flat);
            let voxel = indexer.voxel_at(index);
            let center = indexer.center(index);
            let mut cell = GridCell::new(index, voxel, center);

            if !chemostat {
                if !indexer.is_valid_voxel(voxel) {
                    cell.is_outside = true;
                    cell.status = if voxel.i >= n_i {
                        CellStatus::Bulk
                    } else {
                        CellStatus::Outside
                    };
                } else {
                    if geometry.has_substratum {
                        cell.distance_from_carrier = center.x;
                        cell.is_carrier = center.x < res;
                    }
                    cell.distance_from_bulk = geometry.length_x - center.x;
                    cell.is_bulk = cell.distance_from_bulk < res;
                }
            }
            cells.push(cell);
        }

        Self {
            indexer,
            cells,
            chemostat,
        }
    }

    /// The coordinate mapper.
    pub fn indexer(&self) -> &VoxelIndexer {
        &self.indexer
    }

    /// Voxel edge length.
    pub fn resolution(&self) -> f64 {
        self.indexer.resolution()
    }

    /// Number of cells, padding included.
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Shared access to a cell.
    pub fn cell(&self, index: CellIndex) -> &GridCell {
        &self.cells[index.0]
    }

    /// Exclusive access to a cell.
    pub fn cell_mut(&mut self, index: CellIndex) -> &mut GridCell {
        &mut self.cells[index.0]
    }

    /// All cells in index order.
    pub fn cells(&self) -> &[GridCell] {
        &self.cells
    }

    /// Exclusive access to all cells.
    pub fn cells_mut(&mut self) -> &mut [GridCell] {
        &mut self.cells
    }

    /// Add an agent to a cell's membership.
    pub fn add_agent(&mut self, index: CellIndex, id: AgentId) {
        self.cells[index.0].add_member(id);
    }

    /// Remove an agent from a cell's membership. An emptied cell reverts
    /// to liquid status (outside chemostat mode).
    pub fn remove_agent(&mut self, index: CellIndex, id: AgentId) -> bool {
        let cell = &mut self.cells[index.0];
        let removed = cell.remove_member(id);
        if !self.chemostat && cell.is_empty() {
            cell.status = CellStatus::Liquid;
        }
        removed
    }

    /// Refresh every cell's status and aggregate mass from its members.
    ///
    /// Status: occupied cells are biofilm, empty ones liquid, and the
    /// carrier layer is pinned to carrier. Padding cells keep `Outside`;
    /// bulk padding degrades to liquid once refreshed, matching how the
    /// bulk face behaves as free liquid for border purposes.
    pub fn refresh_status(&mut self, arena: &AgentArena) {
        for cell in &mut self.cells {
            if !self.chemostat && cell.status != CellStatus::Outside {
                cell.status = if cell.is_empty() {
                    CellStatus::Liquid
                } else {
                    CellStatus::Biofilm
                };
                if cell.is_carrier {
                    cell.status = CellStatus::Carrier;
                }
            }
            cell.total_mass = cell
                .members()
                .iter()
                .filter_map(|&id| arena.get(id))
                .map(|body| body.total_mass())
                .sum();
        }
    }

    /// One face-neighbour of a cell (`face` indexes [`FACES`]).
    pub fn face_neighbor(&self, index: CellIndex, face: usize) -> Option<CellIndex> {
        let (di, dj, dk) = FACES[face];
        self.indexer.offset(index, di, dj, dk)
    }

    /// Number of liquid-facing faces of a cell.
    ///
    /// The y faces count twice in 2D so that a one-voxel-thick domain sees
    /// the same face budget as a 3D column.
    pub fn free_faces(&self, index: CellIndex) -> u32 {
        let mut free = 0;
        let status_of = |nbh: Option<CellIndex>| {
            nbh.map(|n| self.cells[n.0].status)
                .unwrap_or(CellStatus::Outside)
        };
        for face in 0..4 {
            if status_of(self.face_neighbor(index, face)) == CellStatus::Liquid {
                free += 1;
            }
        }
        if self.indexer.is_3d() {
            for face in 4..6 {
                if status_of(self.face_neighbor(index, face)) == CellStatus::Liquid {
                    free += 1;
                }
            }
        } else {
            for face in 2..4 {
                if status_of(self.face_neighbor(index, face)) == CellStatus::Liquid {
                    free += 1;
                }
            }
        }
        free
    }

    /// Collect every agent in the cubic box of cells around `index`.
    ///
    /// The box half-width is `max(1, ceil(range / resolution))` cells. The
    /// output buffer is cleared first; callers reuse it across calls and
    /// must not hold ids across container mutations.
    pub fn potential_shovers(&self, index: CellIndex, range: f64, out: &mut Vec<AgentId>) {
        out.clear();
        let radius = ((range / self.resolution()).ceil() as i32).max(1);
        let k_range = if self.indexer.is_3d() {
            -radius..=radius
        } else {
            0..=0
        };
        for di in -radius..=radius {
            for dj in -radius..=radius {
                for dk in k_range.clone() {
                    if let Some(nbh) = self.indexer.offset(index, di, dj, dk) {
                        out.extend_from_slice(self.cells[nbh.0].members());
                    }
                }
            }
        }
    }

    /// Flat cell index of a continuous position.
    pub fn index_of(&self, position: Vector) -> Option<CellIndex> {
        self.indexer.index(position)
    }
}
