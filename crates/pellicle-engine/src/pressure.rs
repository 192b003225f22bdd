//! Advective displacement from an external pressure field.

use crate::population::Population;
use crate::shove::commit_move;
use pellicle_core::{AgentId, CellIndex};
use pellicle_grid::VoxelGrid;
use tracing::debug;

/// Optional pressure/flow collaborator.
///
/// When present and active, the container derives a per-cell advective
/// velocity from the negative pressure gradient each sub-timestep.
pub trait PressureField {
    /// False disables advection without removing the field.
    fn is_active(&self) -> bool;

    /// Bring the field up to date for the current biomass distribution.
    fn solve(&mut self);

    /// Pressure gradient at a continuous position.
    fn gradient(&self, at: pellicle_core::Vector) -> pellicle_core::Vector;
}

/// Apply pressure-driven advection to every located agent.
///
/// Per cell the displacement over `dt` is `-∇p · dt`. To keep any agent
/// from jumping more than one voxel per commit, the sub-timestep is split
/// into `10ⁿ` iterations until the per-iteration displacement fits within
/// one resolution unit; each iteration distributes the scaled vector to
/// the cell's members and commits. Returns the summed relative
/// displacement.
pub(crate) fn follow_pressure(
    field: &mut dyn PressureField,
    population: &mut Population,
    grid: &mut VoxelGrid,
    dt: f64,
) -> f64 {
    if !field.is_active() {
        return 0.0;
    }
    field.solve();

    let mut move_max: f64 = 0.0;
    for cell in grid.cells_mut() {
        if cell.is_outside {
            cell.advect.reset();
            continue;
        }
        let mut advect = field.gradient(cell.center);
        if !advect.is_finite() {
            advect.reset();
        }
        cell.advect = advect * (-dt);
        move_max = move_max.max(cell.advect.norm());
    }
    if move_max == 0.0 {
        return 0.0;
    }

    let resolution = grid.resolution();
    let mut dt_local = dt;
    let mut iterations: u32 = 1;
    while dt_local > resolution / move_max {
        dt_local /= 10.0;
        iterations *= 10;
    }
    if iterations > 1 {
        debug!(
            dt_local,
            iterations, "pressure movement subdivided to stay within one voxel"
        );
    }
    let alpha = dt_local / dt;

    let mut total = 0.0;
    for _ in 0..iterations {
        for flat in 0..grid.cell_count() {
            let index = CellIndex(flat);
            let advect = grid.cell(index).advect.scaled(alpha);
            if advect.is_zero() {
                continue;
            }
            let members: Vec<AgentId> = grid.cell(index).members().to_vec();
            for id in members {
                if let Some(body) = population.body_mut(id) {
                    if body.is_alive() {
                        body.add_movement(advect);
                    }
                }
            }
        }
        let ids: Vec<AgentId> = population.ids().to_vec();
        for id in ids {
            total += commit_move(population, grid, id);
        }
    }
    total
}
