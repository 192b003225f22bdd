//! The physical agent body and the driver seam for per-agent biology.
//!
//! The container never interprets what an agent's mass compartments *mean*;
//! it only moves bodies around, shrinks compartments during erosion, and
//! asks the [`AgentDriver`] for the biology-side judgements (growth,
//! division, viability, radius refresh).

use crate::id::{AgentId, CellIndex};
use crate::vector::Vector;
use smallvec::{smallvec, SmallVec};
use std::fmt;

/// Default ratio of shove radius to total radius.
const DEFAULT_SHOVE_FACTOR: f64 = 1.15;

/// Whether an agent participates in the spatial grid.
///
/// Fixed at creation; the container never re-derives it from other state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AgentKind {
    /// Has a position, lives in exactly one grid cell, is shoved and eroded.
    Located,
    /// Suspended in the well-mixed phase; tracked in the population only.
    Planktonic,
}

/// Why an agent died.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeathReason {
    /// Washed out by chemostat dilution.
    Dilution,
    /// Eroded or sloughed off the biofilm.
    Detachment,
    /// Moved to a position outside the valid domain.
    InvalidMove,
    /// Crossed the bulk-liquid face and was carried away.
    OverBoard,
    /// Killed by its own biology (reported by the driver).
    Starvation,
}

impl fmt::Display for DeathReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dilution => write!(f, "dilution"),
            Self::Detachment => write!(f, "detachment"),
            Self::InvalidMove => write!(f, "invalid move"),
            Self::OverBoard => write!(f, "over board"),
            Self::Starvation => write!(f, "starvation"),
        }
    }
}

/// Live/dead state with the recorded cause of death.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fate {
    /// Participating in the simulation.
    Alive,
    /// Marked for removal at the next cleanup point.
    Dead(DeathReason),
}

/// The container-visible physical state of one agent.
///
/// Biology-side state (reaction rates, genome, division thresholds) belongs
/// to the driver; the container only reads and writes what is needed for
/// spatial bookkeeping, relaxation and detachment.
#[derive(Clone, Debug)]
pub struct AgentBody {
    /// Spatial participation, fixed at creation.
    pub kind: AgentKind,
    /// Continuous position. Meaningless for planktonic agents.
    pub location: Vector,
    /// Displacement accumulated since the last commit.
    pub movement: Vector,
    /// Core radius (cytoplasm only).
    pub radius: f64,
    /// Radius including any capsule.
    pub total_radius: f64,
    /// Multiplier turning total radius into shove radius.
    pub shove_factor: f64,
    /// Absolute slack added to the contact distance.
    pub shove_limit: f64,
    /// Mass compartments (e.g. active biomass, capsule). Femtograms.
    pub compartments: SmallVec<[f64; 2]>,
    /// Net volume production rate, consumed by the reporting hooks.
    pub net_volume_rate: f64,
    /// Cached index of the grid cell that owns this agent.
    pub cell: CellIndex,
    /// Live/dead state.
    pub fate: Fate,
    /// Scratch score used by discrete detachment removal.
    pub det_priority: f64,
}

impl AgentBody {
    /// Create a located agent with a single mass compartment.
    pub fn located(location: Vector, radius: f64, mass: f64) -> Self {
        Self {
            kind: AgentKind::Located,
            location,
            movement: Vector::ZERO,
            radius,
            total_radius: radius,
            shove_factor: DEFAULT_SHOVE_FACTOR,
            shove_limit: 0.0,
            compartments: smallvec![mass],
            net_volume_rate: 0.0,
            cell: CellIndex(0),
            fate: Fate::Alive,
            det_priority: 0.0,
        }
    }

    /// Create a planktonic agent with a single mass compartment.
    pub fn planktonic(mass: f64) -> Self {
        Self {
            kind: AgentKind::Planktonic,
            location: Vector::ZERO,
            movement: Vector::ZERO,
            radius: 0.0,
            total_radius: 0.0,
            shove_factor: DEFAULT_SHOVE_FACTOR,
            shove_limit: 0.0,
            compartments: smallvec![mass],
            net_volume_rate: 0.0,
            cell: CellIndex(0),
            fate: Fate::Alive,
            det_priority: 0.0,
        }
    }

    /// Sum of all mass compartments.
    pub fn total_mass(&self) -> f64 {
        self.compartments.iter().sum()
    }

    /// Radius within which this agent pushes neighbours away.
    pub fn shove_radius(&self) -> f64 {
        self.total_radius * self.shove_factor
    }

    /// Search range for neighbour interaction.
    pub fn interact_distance(&self) -> f64 {
        2.0 * self.shove_radius() + self.shove_limit
    }

    /// True while the agent participates in the simulation.
    pub fn is_alive(&self) -> bool {
        matches!(self.fate, Fate::Alive)
    }

    /// True once the agent is marked for removal.
    pub fn is_dead(&self) -> bool {
        !self.is_alive()
    }

    /// True if this agent lives in the spatial grid.
    pub fn is_located(&self) -> bool {
        self.kind == AgentKind::Located
    }

    /// Mark the agent dead. The first recorded reason wins; later calls
    /// are no-ops so that death registration stays idempotent.
    pub fn kill(&mut self, reason: DeathReason) {
        if self.is_alive() {
            self.fate = Fate::Dead(reason);
        }
    }

    /// The recorded cause of death, if any.
    pub fn death_reason(&self) -> Option<DeathReason> {
        match self.fate {
            Fate::Alive => None,
            Fate::Dead(reason) => Some(reason),
        }
    }

    /// Accumulate a displacement to be applied at the next commit.
    pub fn add_movement(&mut self, delta: Vector) {
        self.movement += delta;
    }

    /// True if the pending displacement is large relative to the body.
    pub fn is_moving(&self) -> bool {
        self.movement.norm() > self.total_radius / 10.0
    }
}

/// Buffer collecting agents spawned during a stepping pass.
///
/// Division happens while the population is being iterated, so newborns are
/// parked here and registered with the container once the pass completes.
#[derive(Debug, Default)]
pub struct Nursery {
    births: Vec<AgentBody>,
}

impl Nursery {
    /// Create an empty nursery.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a newborn for registration after the current pass.
    pub fn spawn(&mut self, body: AgentBody) {
        self.births.push(body);
    }

    /// Number of queued newborns.
    pub fn len(&self) -> usize {
        self.births.len()
    }

    /// True if no newborns are queued.
    pub fn is_empty(&self) -> bool {
        self.births.is_empty()
    }

    /// Drain the queued newborns in spawn order.
    pub fn drain(&mut self) -> impl Iterator<Item = AgentBody> + '_ {
        self.births.drain(..)
    }
}

/// The per-agent biology collaborator.
///
/// Implementations own growth, division and death logic. The container
/// calls [`step_agent`](AgentDriver::step_agent) once per agent per
/// sub-timestep and consults the two predicates during detachment.
pub trait AgentDriver {
    /// Advance one agent by `dt`. The driver may mutate the body (grow,
    /// shrink, move, kill) and queue daughters in the nursery.
    fn step_agent(&mut self, id: AgentId, body: &mut AgentBody, dt: f64, nursery: &mut Nursery);

    /// Minimum-viability judgement used by continuous border erosion:
    /// would this body, at its current mass, die on its next step?
    fn will_die(&self, body: &AgentBody) -> bool;

    /// Rederive radii after the container has changed compartment masses.
    fn refresh_size(&self, body: &mut AgentBody);
}
