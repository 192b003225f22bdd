//! Biofilm/liquid border tracking and erosion-time computation.
//!
//! [`BorderTracker`] finds the grid cells where biomass touches liquid and
//! assigns each one a time-to-erode from the configured [`DetachmentLaw`].
//! [`BorderTracker::compute_level_set`] then propagates erosion times into
//! the biofilm interior with a fast-marching update, killing outright any
//! cell whose time falls below the current timestep.

use crate::lifecycle::kill_cell_members;
use crate::population::Population;
use pellicle_core::{CellIndex, DeathReason};
use pellicle_grid::{CellStatus, GridCell, VoxelGrid};
use rand::Rng;
use rand_chacha::ChaCha8Rng;

/// Local erosion speed at a border cell, micrometres per hour.
pub trait DetachmentLaw {
    /// Speed for the given cell. Zero disables erosion there.
    fn local_speed(&self, cell: &GridCell) -> f64;
}

/// Uniform erosion speed everywhere.
#[derive(Clone, Copy, Debug)]
pub struct ConstantDetachment {
    /// Erosion speed.
    pub speed: f64,
}

impl DetachmentLaw for ConstantDetachment {
    fn local_speed(&self, _cell: &GridCell) -> f64 {
        self.speed
    }
}

/// Erosion speed proportional to height above the substratum.
#[derive(Clone, Copy, Debug)]
pub struct ProportionalDetachment {
    /// Rate constant, per hour.
    pub k_det: f64,
    /// Height above which biomass erodes effectively instantly.
    pub max_height: f64,
}

impl DetachmentLaw for ProportionalDetachment {
    fn local_speed(&self, cell: &GridCell) -> f64 {
        if cell.center.x > self.max_height {
            return f64::MAX;
        }
        self.k_det * cell.center.x
    }
}

/// Erosion speed growing with the square of the height.
#[derive(Clone, Copy, Debug)]
pub struct QuadraticDetachment {
    /// Rate constant, per micrometre-hour.
    pub k_det: f64,
    /// Height above which biomass erodes effectively instantly.
    pub max_height: f64,
}

impl DetachmentLaw for QuadraticDetachment {
    fn local_speed(&self, cell: &GridCell) -> f64 {
        if cell.center.x > self.max_height {
            return f64::MAX;
        }
        self.k_det * cell.center.x * cell.center.x
    }
}

/// Fast-marching state per cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LsState {
    Unvisited,
    Close,
    Alive,
}

/// Tracks the liquid-facing border of the biofilm.
pub struct BorderTracker {
    law: Box<dyn DetachmentLaw>,
    border: Vec<CellIndex>,
}

impl std::fmt::Debug for BorderTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BorderTracker")
            .field("border_cells", &self.border.len())
            .finish()
    }
}

impl BorderTracker {
    /// Create a tracker using the given erosion-speed law.
    pub fn new(law: Box<dyn DetachmentLaw>) -> Self {
        Self {
            law,
            border: Vec::new(),
        }
    }

    /// Cells currently on the biofilm/liquid border, in index order.
    pub fn border(&self) -> &[CellIndex] {
        &self.border
    }

    /// A uniformly random border cell, e.g. as a landing point for a
    /// newly attaching agent.
    pub fn random_border_cell(&self, rng: &mut ChaCha8Rng) -> Option<CellIndex> {
        if self.border.is_empty() {
            return None;
        }
        let at = rng.random_range(0..self.border.len());
        Some(self.border[at])
    }

    /// Rebuild the border list and seed per-cell erosion times.
    ///
    /// Every cell gets a defined erosion time: outside and interior cells
    /// infinity, empty cells zero, border cells `res / (speed × faces)`
    /// (infinity when the law reports zero speed). With `eval_erosion` off
    /// only the border list and face counts are rebuilt; border cells keep
    /// their previously computed times.
    pub fn refresh_border(&mut self, eval_erosion: bool, grid: &mut VoxelGrid) {
        self.border.clear();
        let resolution = grid.resolution();

        for flat in 0..grid.cell_count() {
            let index = CellIndex(flat);
            let (is_outside, status, empty) = {
                let cell = grid.cell(index);
                (cell.is_outside, cell.status, cell.is_empty())
            };

            if is_outside {
                if status != CellStatus::Biofilm {
                    grid.cell_mut(index).erosion_time = f64::INFINITY;
                }
                continue;
            }
            // Bare carrier: biomass-free bedrock never erodes.
            if status == CellStatus::Carrier && empty {
                grid.cell_mut(index).erosion_time = f64::INFINITY;
                continue;
            }
            if empty {
                grid.cell_mut(index).erosion_time = 0.0;
                continue;
            }

            let free = grid.free_faces(index);
            if free == 0 {
                let cell = grid.cell_mut(index);
                cell.free_faces = 0;
                cell.erosion_time = f64::INFINITY;
                continue;
            }

            self.border.push(index);
            if eval_erosion {
                let speed = self.law.local_speed(grid.cell(index));
                let cell = grid.cell_mut(index);
                cell.free_faces = free;
                cell.erosion_time = if speed != 0.0 {
                    resolution / (speed * free as f64)
                } else {
                    f64::INFINITY
                };
            } else {
                grid.cell_mut(index).free_faces = free;
            }
        }
    }

    /// Propagate erosion times from the border into the biofilm interior.
    ///
    /// Fast marching: repeatedly retire the border cell with the smallest
    /// erosion time and assign each untouched occupied neighbour a time
    /// from the quadratic upwind update. A cell whose assigned time is
    /// below the current timestep loses its entire membership immediately
    /// (reason: detachment).
    pub fn compute_level_set(
        &mut self,
        grid: &mut VoxelGrid,
        population: &mut Population,
        dt: f64,
    ) {
        let mut state = vec![LsState::Unvisited; grid.cell_count()];
        let mut close: Vec<CellIndex> = self.border.clone();
        for &index in &close {
            state[index.0] = LsState::Close;
        }

        let faces = if grid.indexer().is_3d() { 6 } else { 4 };

        while !close.is_empty() {
            // Retire the smallest erosion time; first wins on ties.
            let at = close
                .iter()
                .enumerate()
                .min_by(|(_, a), (_, b)| {
                    grid.cell(**a)
                        .erosion_time
                        .total_cmp(&grid.cell(**b).erosion_time)
                })
                .map(|(at, _)| at)
                .unwrap_or(0);
            let trial = close.remove(at);
            state[trial.0] = LsState::Alive;

            for face in 0..faces {
                let Some(neighbor) = grid.face_neighbor(trial, face) else {
                    continue;
                };
                if grid.cell(neighbor).is_empty() {
                    continue;
                }
                if state[neighbor.0] != LsState::Unvisited {
                    continue;
                }
                let t = self.t_value(grid, neighbor);
                grid.cell_mut(neighbor).erosion_time = t;
                if t < dt {
                    kill_cell_members(population, grid, neighbor, DeathReason::Detachment);
                }
                state[neighbor.0] = LsState::Close;
                close.push(neighbor);
            }
        }
    }

    /// Upwind erosion time for one cell from its face neighbours.
    fn t_value(&self, grid: &VoxelGrid, index: CellIndex) -> f64 {
        let time_of = |face: usize| -> f64 {
            grid.face_neighbor(index, face)
                .map(|n| grid.cell(n).erosion_time)
                .unwrap_or(f64::INFINITY)
        };

        let t_x = time_of(0).min(time_of(1));
        let t_y = time_of(2).min(time_of(3));
        let t_z = if grid.indexer().is_3d() {
            time_of(4).min(time_of(5))
        } else {
            grid.cell(index).erosion_time
        };

        let speed = self.law.local_speed(grid.cell(index));
        if speed == 0.0 {
            return f64::INFINITY;
        }
        if t_x.is_infinite() && t_y.is_infinite() && t_z.is_infinite() {
            return f64::INFINITY;
        }

        // Try every subset of upwind directions and keep the largest valid
        // quadratic root; fall back to the largest approximate root when
        // float precision rejects them all.
        let candidates = |t: f64| -> &'static [bool] {
            if t.is_finite() {
                &[true, false]
            } else {
                &[false]
            }
        };
        let resolution = grid.resolution();
        let mut valid_solution: f64 = 0.0;
        let mut approximate: f64 = 0.0;

        for &use_x in candidates(t_x) {
            for &use_y in candidates(t_y) {
                for &use_z in candidates(t_z) {
                    let fx = if use_x { t_x } else { f64::INFINITY };
                    let fy = if use_y { t_y } else { f64::INFINITY };
                    let fz = if use_z { t_z } else { f64::INFINITY };
                    if fx.is_infinite() && fy.is_infinite() && fz.is_infinite() {
                        continue;
                    }
                    let root = quadratic_root(fx, fy, fz, speed, resolution);
                    if root.is_nan() {
                        continue;
                    }
                    approximate = approximate.max(root);
                    if solution_valid(root, fx, t_x)
                        || solution_valid(root, fy, t_y)
                        || solution_valid(root, fz, t_z)
                    {
                        valid_solution = valid_solution.max(root);
                    }
                }
            }
        }

        if valid_solution == 0.0 {
            approximate
        } else {
            valid_solution
        }
    }
}

/// Positive root of the upwind quadratic for the given direction subset.
fn quadratic_root(tx: f64, ty: f64, tz: f64, speed: f64, resolution: f64) -> f64 {
    let mut a = 0.0;
    let mut b = 0.0;
    let mut c = -(resolution / speed) * (resolution / speed);
    for t in [tx, ty, tz] {
        if t.is_finite() {
            a += 1.0;
            b += -2.0 * t;
            c += t * t;
        }
    }
    let aux = (b * b - 4.0 * a * c).sqrt();
    (-b + aux) / (2.0 * a)
}

/// Upwind consistency check for one direction.
fn solution_valid(s: f64, f: f64, t: f64) -> bool {
    if f.is_infinite() {
        s < t
    } else {
        s > t
    }
}
