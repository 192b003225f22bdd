//! Birth and death bookkeeping, and the chemostat washout policy.

use crate::population::Population;
use pellicle_core::{AgentBody, AgentId, BirthError, CellIndex, DeathReason, DetachmentMethod};
use pellicle_grid::VoxelGrid;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

/// Fallback population ceiling for chemostats configured with discrete
/// detachment, where the dilution carry-over does not apply.
const CHEMOSTAT_POP_CAP: usize = 1000;

/// Register a newborn in the population and, if located, in its grid cell.
///
/// Atomic: a located body whose position has no cell index is rejected
/// whole, leaving the population and grid untouched.
pub(crate) fn register_birth(
    population: &mut Population,
    grid: &mut VoxelGrid,
    mut body: AgentBody,
) -> Result<AgentId, BirthError> {
    if body.is_located() {
        let cell = grid
            .index_of(body.location)
            .ok_or(BirthError::UnindexableLocation {
                location: body.location,
            })?;
        body.cell = cell;
        let id = population.insert(body);
        grid.add_agent(cell, id);
        Ok(id)
    } else {
        Ok(population.insert(body))
    }
}

/// Purge every agent queued for death from the roster, the grid and the
/// arena. Returns the number removed.
///
/// This must run before the next relaxation pass in the same sub-step:
/// shoving assumes it never sees a dead body.
pub(crate) fn remove_dead(population: &mut Population, grid: &mut VoxelGrid) -> usize {
    let pending = population.take_pending();
    if pending.is_empty() {
        return 0;
    }

    let mut removed = 0;
    population.retain_roster(&pending);
    for id in pending {
        let Some(body) = population.body(id) else {
            continue;
        };
        if body.is_alive() {
            debug!(agent = %id, "purging agent queued without a death reason");
        }
        if body.is_located() {
            let cell = body.cell;
            grid.remove_agent(cell, id);
        }
        population.remove_body(id);
        removed += 1;
    }
    removed
}

/// Kill and evict every member of one cell. Returns `(count, mass)`.
///
/// Used by the level set (cells eroding within the current step) and the
/// connectivity filter. Members leave the roster and the cell at once; the
/// arena slots are reclaimed at the next [`remove_dead`] pass.
pub(crate) fn kill_cell_members(
    population: &mut Population,
    grid: &mut VoxelGrid,
    index: CellIndex,
    reason: DeathReason,
) -> (usize, f64) {
    let members = grid.cell_mut(index).take_members();
    let mut mass = 0.0;
    let mut dead = indexmap::IndexSet::new();
    for &id in &members {
        if let Some(body) = population.body_mut(id) {
            mass += body.total_mass();
            body.kill(reason);
        }
        population.note_dead(id);
        dead.insert(id);
    }
    population.retain_roster(&dead);
    (members.len(), mass)
}

/// Chemostat washout: mark agents dead from the front of the freshly
/// shuffled roster. The caller purges at its next cleanup point.
///
/// With the continuous-erosion configuration the count is
/// `floor(D·dt·N + carry)` and the fractional remainder persists in
/// `carry` across calls, so no systematic rounding bias accumulates.
/// The discrete-detachment configuration instead trims the population
/// down to a hard cap.
pub(crate) fn flush_away(
    population: &mut Population,
    rng: &mut ChaCha8Rng,
    dt: f64,
    dilution_rate: f64,
    method: DetachmentMethod,
    carry: &mut f64,
) -> usize {
    population.shuffle(rng);

    let n = population.len();
    let to_dilute = match method {
        DetachmentMethod::ShrinkOnBorder => {
            let target = dilution_rate * dt * n as f64 + *carry;
            let count = target.floor();
            *carry = target - count;
            (count as usize).min(n)
        }
        DetachmentMethod::RemoveOnBorder => n.saturating_sub(CHEMOSTAT_POP_CAP),
    };

    let doomed: Vec<AgentId> = population.ids()[..to_dilute].to_vec();
    for id in doomed {
        population.mark_dead(id, DeathReason::Dilution);
    }
    to_dilute
}
