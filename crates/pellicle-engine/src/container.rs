//! The spatial agent container and its macro-step pipeline.

use crate::detach::{remove_on_border, shrink_on_border};
use crate::levelset::{BorderTracker, DetachmentLaw};
use crate::lifecycle::{flush_away, register_birth, remove_dead};
use crate::population::Population;
use crate::pressure::{follow_pressure, PressureField};
use crate::shove::shove_all_located;
use crate::slough::mark_for_sloughing;
use pellicle_core::{
    AgentBody, AgentDriver, AgentId, BirthError, CellIndex, ContainerConfig, DeathReason,
    DetachmentMethod, DomainGeometry, Nursery, SimulationMode, StepError, Vector, Voxel,
};
use pellicle_grid::{CellStatus, VoxelGrid};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{info, warn};

/// Iteration cap for the moderate relaxation inside each sub-step.
const SUBSTEP_RELAX_ITER: u32 = 15;

/// Push-style sink for the external reporting hooks.
///
/// The container deposits per-agent values at continuous positions; how
/// they are binned, padded or written is the consumer's business.
pub trait FieldSink {
    /// Record `value` at `at`.
    fn deposit(&mut self, at: Vector, value: f64);
}

/// Counters for one macro step.
#[derive(Clone, Debug, Default)]
pub struct StepSummary {
    /// Population size when the step began.
    pub stepped: usize,
    /// Agents registered by the driver during the step.
    pub births: usize,
    /// Agents purged (all causes).
    pub deaths: usize,
    /// Agents washed out by chemostat dilution.
    pub diluted: usize,
    /// Interaction passes of the final relaxation.
    pub relax_iterations: u32,
    /// Agents still moving significantly after the final relaxation.
    pub still_moving: usize,
    /// Agents removed by border erosion.
    pub eroded: usize,
    /// Mass removed by border erosion.
    pub eroded_mass: f64,
    /// Agents removed by the connectivity filter.
    pub sloughed: usize,
    /// Mass removed by the connectivity filter.
    pub sloughed_mass: f64,
    /// False once the population cap asks the simulation to stop.
    pub keep_running: bool,
}

/// Stores all agents, sorts them into grid cells, and manages shoving,
/// erosion and dilution of the population.
pub struct AgentContainer {
    config: ContainerConfig,
    grid: VoxelGrid,
    population: Population,
    border: BorderTracker,
    pressure: Option<Box<dyn PressureField>>,
    rng: ChaCha8Rng,
    erosion_tally: f64,
    dilution_carry: f64,
}

impl AgentContainer {
    /// Build a container for the given geometry, configuration and
    /// detachment-speed law.
    pub fn new(
        geometry: &DomainGeometry,
        config: ContainerConfig,
        law: Box<dyn DetachmentLaw>,
    ) -> Self {
        let grid = VoxelGrid::new(geometry, config.mode);
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        let (n_i, n_j, n_k) = grid.indexer().dims();
        info!(
            mode = %config.mode,
            cells = grid.cell_count(),
            n_i,
            n_j,
            n_k,
            resolution = grid.resolution(),
            "agent container initialised"
        );
        Self {
            config,
            grid,
            population: Population::new(),
            border: BorderTracker::new(law),
            pressure: None,
            rng,
            erosion_tally: 0.0,
            dilution_carry: 0.0,
        }
    }

    /// Attach an optional pressure field for advective movement.
    pub fn set_pressure_field(&mut self, field: Box<dyn PressureField>) {
        self.pressure = Some(field);
    }

    // ── Population interface ────────────────────────────────────

    /// Register a newborn agent.
    ///
    /// Located agents are placed in the grid cell containing their
    /// position (cell 0 in chemostat mode). A located body whose position
    /// has no cell index is rejected whole.
    pub fn register_birth(&mut self, body: AgentBody) -> Result<AgentId, BirthError> {
        register_birth(&mut self.population, &mut self.grid, body)
    }

    /// Mark an agent for removal at the next cleanup point. Idempotent.
    pub fn register_death(&mut self, id: AgentId, reason: DeathReason) {
        self.population.mark_dead(id, reason);
    }

    /// Purge every agent marked dead from roster, grid and storage.
    pub fn remove_all_dead(&mut self) -> usize {
        remove_dead(&mut self.population, &mut self.grid)
    }

    /// Number of agents in the population.
    pub fn population(&self) -> usize {
        self.population.len()
    }

    /// The population roster in its current order.
    pub fn agent_ids(&self) -> &[AgentId] {
        self.population.ids()
    }

    /// Shared access to an agent body.
    pub fn body(&self, id: AgentId) -> Option<&AgentBody> {
        self.population.body(id)
    }

    /// Sum of all live agents' mass.
    pub fn total_mass(&self) -> f64 {
        self.population.total_mass()
    }

    // ── Grid interface ──────────────────────────────────────────

    /// The voxel grid.
    pub fn grid(&self) -> &VoxelGrid {
        &self.grid
    }

    /// Cell index of a continuous position, if it has one.
    pub fn indexed_position(&self, position: Vector) -> Option<CellIndex> {
        self.grid.index_of(position)
    }

    /// Cell index of a discrete voxel coordinate (padding included).
    pub fn indexed_voxel(&self, voxel: Voxel) -> Option<CellIndex> {
        self.grid.indexer().index_of_voxel(voxel)
    }

    /// Continuous centre of a cell.
    pub fn cell_center(&self, index: CellIndex) -> Vector {
        self.grid.indexer().center(index)
    }

    /// Unpadded voxel coordinate of a cell.
    pub fn cell_voxel(&self, index: CellIndex) -> Voxel {
        self.grid.indexer().voxel_at(index)
    }

    /// Status of a cell.
    pub fn voxel_status(&self, index: CellIndex) -> CellStatus {
        self.grid.cell(index).status
    }

    /// Agents located in a cell.
    pub fn group_in_voxel(&self, index: CellIndex) -> &[AgentId] {
        self.grid.cell(index).members()
    }

    /// Collect all agents within `range` of a cell into `out`.
    pub fn potential_shovers(&self, index: CellIndex, range: f64, out: &mut Vec<AgentId>) {
        self.grid.potential_shovers(index, range, out);
    }

    /// Border cells from the most recent refresh.
    pub fn border(&self) -> &[CellIndex] {
        self.border.border()
    }

    /// A uniformly random border cell, e.g. as the landing point for an
    /// agent attaching from the bulk liquid. `None` while no border exists.
    pub fn random_border_cell(&mut self) -> Option<CellIndex> {
        self.border.random_border_cell(&mut self.rng)
    }

    /// Unused erosion budget carried by the discrete detachment policy.
    pub fn erosion_tally(&self) -> f64 {
        self.erosion_tally
    }

    // ── Reporting hooks ─────────────────────────────────────────

    /// Deposit every located agent's total mass into a sink.
    pub fn fit_agent_mass_on_grid(&self, sink: &mut dyn FieldSink) {
        for cell in self.grid.cells() {
            for &id in cell.members() {
                if let Some(body) = self.population.body(id) {
                    sink.deposit(body.location, body.total_mass());
                }
            }
        }
    }

    /// Deposit every located agent's net volume rate into a sink.
    pub fn fit_agent_volume_rate_on_grid(&self, sink: &mut dyn FieldSink) {
        for cell in self.grid.cells() {
            for &id in cell.members() {
                if let Some(body) = self.population.body(id) {
                    sink.deposit(body.location, body.net_volume_rate);
                }
            }
        }
    }

    // ── Stepping ────────────────────────────────────────────────

    /// Fully relax the grid from an arbitrary initial placement.
    ///
    /// Used once after seeding so the first macro step starts from a
    /// geometrically coherent state.
    pub fn relax(&mut self) {
        if self.config.mode == SimulationMode::Chemostat {
            return;
        }
        self.population.shuffle(&mut self.rng);
        let half_cap = (self.config.shoving.max_iter / 2).max(1);
        for _ in 0..2 {
            shove_all_located(
                &mut self.population,
                &mut self.grid,
                &self.config.shoving,
                true,
                true,
                half_cap,
                &mut self.rng,
            );
        }
    }

    /// Run one macro step of `global_dt` hours.
    ///
    /// Sub-steps at the configured agent timestep: advect, drive every
    /// agent, dilute (chemostat), purge dead, relax moderately. After the
    /// sub-steps, biofilm mode relaxes to convergence, refreshes the
    /// border, applies the configured detachment policy and finally runs
    /// the connectivity filter.
    pub fn step(&mut self, driver: &mut dyn AgentDriver, global_dt: f64) -> Result<StepSummary, StepError> {
        if !global_dt.is_finite() || global_dt <= 0.0 {
            return Err(StepError::InvalidTimestep { value: global_dt });
        }
        if self.config.agent_dt > global_dt {
            return Err(StepError::AgentTimestepExceedsGlobal {
                agent_dt: self.config.agent_dt,
                global_dt,
            });
        }

        let mut summary = StepSummary {
            stepped: self.population.len(),
            keep_running: true,
            ..StepSummary::default()
        };
        let chemostat = self.config.mode == SimulationMode::Chemostat;
        let local_dt = self.config.agent_dt.min(global_dt);

        self.population.shuffle(&mut self.rng);

        let mut elapsed = 0.0;
        while elapsed < global_dt {
            let dt = local_dt.min(global_dt - elapsed);
            if dt <= 0.0 {
                break;
            }
            elapsed += dt;
            self.sub_step(driver, dt, chemostat, &mut summary);
        }

        if !chemostat {
            let relax = shove_all_located(
                &mut self.population,
                &mut self.grid,
                &self.config.shoving,
                false,
                true,
                self.config.shoving.max_iter,
                &mut self.rng,
            );
            summary.relax_iterations = relax.iterations;
            summary.still_moving = relax.moved;
            info!(
                moved = relax.moved,
                population = self.population.len(),
                iterations = relax.iterations,
                "relaxation finished"
            );

            self.grid.refresh_status(self.population.arena());
            self.border.refresh_border(true, &mut self.grid);
            self.border
                .compute_level_set(&mut self.grid, &mut self.population, global_dt);

            let (eroded, eroded_mass) = match self.config.detachment {
                DetachmentMethod::ShrinkOnBorder => shrink_on_border(
                    &mut self.border,
                    &mut self.grid,
                    &mut self.population,
                    driver,
                    global_dt,
                ),
                DetachmentMethod::RemoveOnBorder => remove_on_border(
                    &mut self.border,
                    &mut self.grid,
                    &mut self.population,
                    global_dt,
                    &mut self.erosion_tally,
                )?,
            };
            summary.eroded = eroded;
            summary.eroded_mass = eroded_mass;
            summary.deaths += self.remove_all_dead();

            if self.config.sloughing {
                self.grid.refresh_status(self.population.arena());
                let (sloughed, sloughed_mass) =
                    mark_for_sloughing(&mut self.grid, &mut self.population);
                summary.sloughed = sloughed;
                summary.sloughed_mass = sloughed_mass;
                summary.deaths += self.remove_all_dead();
            }
        }

        if self.config.max_population > 0 && self.population.len() >= self.config.max_population {
            info!(
                population = self.population.len(),
                cap = self.config.max_population,
                "population cap reached; requesting stop"
            );
            summary.keep_running = false;
        }

        info!(
            stepped = summary.stepped,
            births = summary.births,
            deaths = summary.deaths,
            diluted = summary.diluted,
            "agents stepped/born/dead"
        );
        Ok(summary)
    }

    /// One agent sub-timestep.
    fn sub_step(
        &mut self,
        driver: &mut dyn AgentDriver,
        dt: f64,
        chemostat: bool,
        summary: &mut StepSummary,
    ) {
        if !chemostat {
            if let Some(field) = self.pressure.as_mut() {
                follow_pressure(field.as_mut(), &mut self.population, &mut self.grid, dt);
            }
        }

        // Drive every agent's own biology.
        let mut nursery = Nursery::new();
        let ids: Vec<AgentId> = self.population.ids().to_vec();
        for id in ids {
            let Some(body) = self.population.body_mut(id) else {
                continue;
            };
            if body.is_dead() {
                continue;
            }
            driver.step_agent(id, body, dt, &mut nursery);
            if body.is_dead() {
                self.population.note_dead(id);
            }
        }

        // Register this pass's newborns.
        let births: Vec<AgentBody> = nursery.drain().collect();
        for body in births {
            match register_birth(&mut self.population, &mut self.grid, body) {
                Ok(_) => summary.births += 1,
                Err(err) => warn!(%err, "dropping newborn"),
            }
        }

        self.population.shuffle(&mut self.rng);

        if chemostat {
            summary.diluted += flush_away(
                &mut self.population,
                &mut self.rng,
                dt,
                self.config.dilution_rate,
                self.config.detachment,
                &mut self.dilution_carry,
            );
        }

        // Dead agents must be gone before the relaxation pass.
        summary.deaths += self.remove_all_dead();

        if !chemostat {
            shove_all_located(
                &mut self.population,
                &mut self.grid,
                &self.config.shoving,
                false,
                true,
                SUBSTEP_RELAX_ITER,
                &mut self.rng,
            );
        }
    }
}

impl std::fmt::Debug for AgentContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentContainer")
            .field("mode", &self.config.mode)
            .field("population", &self.population.len())
            .field("cells", &self.grid.cell_count())
            .finish()
    }
}
