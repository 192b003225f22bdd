//! Border detachment policies: continuous shrink and discrete removal.

use crate::levelset::BorderTracker;
use crate::population::Population;
use pellicle_core::{AgentDriver, AgentId, CellIndex, DeathReason, StepError};
use pellicle_grid::{CellStatus, VoxelGrid};
use tracing::info;

/// Continuous erosion: shrink every border agent by its cell's ratio.
///
/// Each border cell removes the fraction `clamp(dt / erosion_time, 0, 1)`
/// of every member's every mass compartment. Agents judged no longer
/// viable by the driver die with reason detachment. Nothing carries over
/// between steps. Returns `(detached count, eroded mass)`.
pub(crate) fn shrink_on_border(
    tracker: &mut BorderTracker,
    grid: &mut VoxelGrid,
    population: &mut Population,
    driver: &dyn AgentDriver,
    dt: f64,
) -> (usize, f64) {
    tracker.refresh_border(true, grid);

    let border: Vec<CellIndex> = tracker.border().to_vec();
    let mut eroded_mass = 0.0;
    let mut detached = 0;

    for index in border {
        let ratio = (dt / grid.cell(index).erosion_time).clamp(0.0, 1.0);
        let members: Vec<AgentId> = grid.cell(index).members().to_vec();

        for id in members {
            let mut doomed = false;
            if let Some(body) = population.body_mut(id) {
                if body.is_dead() {
                    continue;
                }
                eroded_mass += body.total_mass() * ratio;
                for compartment in body.compartments.iter_mut() {
                    *compartment *= 1.0 - ratio;
                }
                driver.refresh_size(body);
                if driver.will_die(body) {
                    eroded_mass += body.total_mass();
                    doomed = true;
                }
            }
            if doomed {
                population.mark_dead(id, DeathReason::Detachment);
                detached += 1;
            }
        }
    }

    info!(detached, eroded_mass, "continuous border erosion");
    (detached, eroded_mass)
}

/// Discrete erosion: remove whole agents against a persistent mass budget.
///
/// Every step adds `Σ border-cell mass × ratio` to the budget; removal only
/// starts once the budget exceeds the lightest candidate's mass. Candidates
/// across the whole border are ranked by detachment priority and removed
/// one at a time, each spending its mass from the budget, until the next
/// candidate no longer fits. Leftover budget persists in `tally` for the
/// next step, which removes the timestep-size bias of the continuous
/// policy.
///
/// Priorities are computed once from pre-removal geometry and deliberately
/// not refreshed as agents are removed within the pass; the ranking is a
/// snapshot, not a live quantity.
///
/// Returns `(removed count, removed mass)`.
pub(crate) fn remove_on_border(
    tracker: &mut BorderTracker,
    grid: &mut VoxelGrid,
    population: &mut Population,
    dt: f64,
    tally: &mut f64,
) -> Result<(usize, f64), StepError> {
    tracker.refresh_border(true, grid);

    let border: Vec<CellIndex> = tracker.border().to_vec();
    let mut candidates: Vec<AgentId> = Vec::new();
    for &index in &border {
        let ratio = (dt / grid.cell(index).erosion_time).min(1.0);
        let cell = grid.cell_mut(index);
        cell.erosion_ratio = ratio;
        *tally += cell.total_mass * ratio;
        candidates.extend(
            grid.cell(index)
                .members()
                .iter()
                .filter(|&&id| population.body(id).is_some_and(|b| b.is_alive())),
        );
    }

    if !tally.is_finite() {
        return Err(StepError::Detachment {
            reason: format!("erosion budget is not finite ({tally})"),
        });
    }

    let lightest = candidates
        .iter()
        .filter_map(|&id| population.body(id).map(|b| b.total_mass()))
        .min_by(f64::total_cmp);
    let Some(lightest) = lightest else {
        return Ok((0, 0.0));
    };
    if *tally <= lightest {
        return Ok((0, 0.0));
    }

    for &index in &border {
        let ratio = grid.cell(index).erosion_ratio;
        calc_det_priority(grid, population, index, ratio);
    }

    let mut removed = 0;
    let mut removed_mass = 0.0;
    while !candidates.is_empty() {
        let (at, top) = match candidates.iter().enumerate().max_by(|(_, a), (_, b)| {
            priority(population, **a).total_cmp(&priority(population, **b))
        }) {
            Some((at, &top)) => (at, top),
            None => break,
        };
        let Some(mass) = population.body(top).map(|b| b.total_mass()) else {
            candidates.remove(at);
            continue;
        };
        if mass >= *tally {
            break;
        }
        removed_mass += mass;
        *tally -= mass;
        population.mark_dead(top, DeathReason::Detachment);
        removed += 1;
        candidates.remove(at);
    }

    info!(
        removed,
        removed_mass,
        leftover = *tally,
        border_cells = border.len(),
        "discrete border erosion"
    );
    Ok((removed, removed_mass))
}

fn priority(population: &Population, id: AgentId) -> f64 {
    population
        .body(id)
        .map(|b| b.det_priority)
        .unwrap_or(f64::NEG_INFINITY)
}

/// Squared distance from a coordinate to the face opposite the free side.
fn det_function(negative_side_free: bool, coordinate: f64, resolution: f64) -> f64 {
    let within = coordinate.rem_euclid(resolution);
    if negative_side_free {
        (resolution - within) * (resolution - within)
    } else {
        within * within
    }
}

/// Score one border cell's members for discrete removal.
///
/// For each face direction with a liquid neighbour, every member gains the
/// squared distance from its position to the opposite face along that axis;
/// the y axis counts double in 2D so a one-voxel-thick domain keeps the
/// same weighting symmetry as a 3D one. Scores scale with the cell's
/// erosion ratio.
pub(crate) fn calc_det_priority(
    grid: &VoxelGrid,
    population: &mut Population,
    index: CellIndex,
    ratio: f64,
) {
    let resolution = grid.resolution();
    let members: Vec<AgentId> = grid.cell(index).members().to_vec();

    for &id in &members {
        if let Some(body) = population.body_mut(id) {
            body.det_priority = 0.0;
        }
    }

    let face_is_liquid = |face: usize| {
        grid.face_neighbor(index, face)
            .map(|n| grid.cell(n).status == CellStatus::Liquid)
            .unwrap_or(false)
    };

    // x axis: faces 0 (−x) and 1 (+x).
    for (face, negative_side) in [(0, true), (1, false)] {
        if face_is_liquid(face) {
            for &id in &members {
                if let Some(body) = population.body_mut(id) {
                    body.det_priority += det_function(negative_side, body.location.x, resolution);
                }
            }
        }
    }
    // y axis, weighted double in 2D.
    let y_weight = if grid.indexer().is_3d() { 1.0 } else { 2.0 };
    for (face, negative_side) in [(2, true), (3, false)] {
        if face_is_liquid(face) {
            for &id in &members {
                if let Some(body) = population.body_mut(id) {
                    body.det_priority +=
                        y_weight * det_function(negative_side, body.location.y, resolution);
                }
            }
        }
    }
    if grid.indexer().is_3d() {
        for (face, negative_side) in [(4, true), (5, false)] {
            if face_is_liquid(face) {
                for &id in &members {
                    if let Some(body) = population.body_mut(id) {
                        body.det_priority +=
                            det_function(negative_side, body.location.z, resolution);
                    }
                }
            }
        }
    }

    for &id in &members {
        if let Some(body) = population.body_mut(id) {
            body.det_priority *= ratio;
        }
    }
}
