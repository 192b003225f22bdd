//! Connectivity filter: remove biomass detached from the substratum.

use crate::lifecycle::kill_cell_members;
use crate::population::Population;
use pellicle_core::{CellIndex, DeathReason};
use pellicle_grid::{CellStatus, VoxelGrid};
use tracing::info;

/// Connected-volume filter over the grid.
///
/// Returns one flag per cell: true if the cell is reachable from the
/// carrier layer through face-adjacent biofilm cells. Iterates to a fixed
/// point; cells outside the domain never participate.
pub(crate) fn connected_to_carrier(grid: &VoxelGrid) -> Vec<bool> {
    let n = grid.cell_count();
    let mut connected = vec![false; n];

    for (flat, cell) in grid.cells().iter().enumerate() {
        if cell.status == CellStatus::Outside {
            continue;
        }
        connected[flat] = cell.status == CellStatus::Carrier;
    }

    let faces = if grid.indexer().is_3d() { 6 } else { 4 };
    let mut added = 1;
    while added > 0 {
        added = 0;
        for flat in 0..n {
            let index = CellIndex(flat);
            if connected[flat] || grid.cell(index).status != CellStatus::Biofilm {
                continue;
            }
            let mut touches = false;
            for face in 0..faces {
                if let Some(neighbor) = grid.face_neighbor(index, face) {
                    touches |= connected[neighbor.0];
                }
            }
            if touches {
                connected[flat] = true;
                added += 1;
            }
        }
    }
    connected
}

/// Kill every agent in cells carrying mass that is not connected to the
/// carrier. Returns `(sloughed count, sloughed mass)`.
///
/// Runs after detachment, on freshly refreshed statuses; never interleaved
/// with shoving or continuous erosion.
pub(crate) fn mark_for_sloughing(
    grid: &mut VoxelGrid,
    population: &mut Population,
) -> (usize, f64) {
    let connected = connected_to_carrier(grid);

    let mut sloughed = 0;
    let mut sloughed_mass = 0.0;
    for flat in 0..grid.cell_count() {
        if connected[flat] {
            continue;
        }
        let index = CellIndex(flat);
        if grid.cell(index).total_mass > 0.0 {
            let (count, mass) =
                kill_cell_members(population, grid, index, DeathReason::Detachment);
            sloughed += count;
            sloughed_mass += mass;
        }
    }

    info!(sloughed, sloughed_mass, "sloughing disconnected biomass");
    (sloughed, sloughed_mass)
}
