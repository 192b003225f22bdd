//! Validated configuration for the agent container.
//!
//! Every mode switch is explicit configuration fixed at construction;
//! nothing in the container branches on ambient global state.

use crate::error::ConfigError;
use std::fmt;

/// Which large-scale regime the container runs in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SimulationMode {
    /// Spatially resolved biofilm: full grid, shoving, detachment, sloughing.
    Biofilm,
    /// Well-mixed reactor: the grid collapses to one cell and detachment is
    /// replaced by stochastic dilution.
    Chemostat,
}

impl fmt::Display for SimulationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Biofilm => write!(f, "biofilm"),
            Self::Chemostat => write!(f, "chemostat"),
        }
    }
}

/// Domain extent, grid resolution and boundary topology.
///
/// The `x` axis is substratum-normal and never periodic; `y` and `z` wrap
/// when the corresponding flag is set. Construction corrects the resolution
/// so that an integer number of voxels exactly tiles the `x` extent.
#[derive(Clone, Copy, Debug)]
pub struct DomainGeometry {
    /// Extent along the substratum-normal axis, micrometres.
    pub length_x: f64,
    /// Extent along the first substratum-plane axis.
    pub length_y: f64,
    /// Extent along the second substratum-plane axis (one voxel thick in 2D).
    pub length_z: f64,
    /// Requested voxel edge length.
    pub resolution: f64,
    /// Periodic wrap per axis, `[x, y, z]`.
    pub periodic: [bool; 3],
    /// True for a three-dimensional domain.
    pub is_3d: bool,
    /// True if biomass attaches to a carrier at `x = 0`.
    pub has_substratum: bool,
}

impl DomainGeometry {
    /// A 2D domain (one voxel thick in `z`), periodic in `y`, with a
    /// substratum at `x = 0`.
    pub fn sheet(length_x: f64, length_y: f64, resolution: f64) -> Result<Self, ConfigError> {
        let geom = Self {
            length_x,
            length_y,
            length_z: resolution,
            resolution,
            periodic: [false, true, false],
            is_3d: false,
            has_substratum: true,
        };
        geom.validate()?;
        Ok(geom)
    }

    /// A 3D domain, periodic in `y` and `z`, with a substratum at `x = 0`.
    pub fn cuboid(
        length_x: f64,
        length_y: f64,
        length_z: f64,
        resolution: f64,
    ) -> Result<Self, ConfigError> {
        let geom = Self {
            length_x,
            length_y,
            length_z,
            resolution,
            periodic: [false, true, true],
            is_3d: true,
            has_substratum: true,
        };
        geom.validate()?;
        Ok(geom)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("length_x", self.length_x),
            ("length_y", self.length_y),
            ("length_z", self.length_z),
            ("resolution", self.resolution),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::NonPositiveDimension { name, value });
            }
        }
        let min_extent = if self.is_3d {
            self.length_x.min(self.length_y).min(self.length_z)
        } else {
            self.length_x.min(self.length_y)
        };
        if self.resolution > min_extent {
            return Err(ConfigError::ResolutionTooCoarse {
                resolution: self.resolution,
                min_extent,
            });
        }
        if self.periodic[0] {
            return Err(ConfigError::PeriodicSubstratumAxis);
        }
        Ok(())
    }
}

/// Tuning of the overlap-relaxation loop.
#[derive(Clone, Copy, Debug)]
pub struct ShovingParams {
    /// The loop stops once fewer than `fraction × population` agents still
    /// move significantly.
    pub fraction: f64,
    /// Iteration cap for one relaxation call (×5 for a full relax).
    pub max_iter: u32,
    /// Resolve each overlap by moving both agents half the distance rather
    /// than pushing only the visiting agent.
    pub mutual: bool,
}

impl Default for ShovingParams {
    fn default() -> Self {
        Self {
            fraction: 0.025,
            max_iter: 250,
            mutual: true,
        }
    }
}

/// Which border-removal policy the detachment engine applies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DetachmentMethod {
    /// Continuously shrink every agent in a border cell by the cell's
    /// erosion ratio each step.
    ShrinkOnBorder,
    /// Accumulate an erosion mass budget and remove whole agents in
    /// priority order, carrying unused budget across steps.
    RemoveOnBorder,
}

/// Validated container configuration. Build via [`ContainerConfig::builder`].
#[derive(Clone, Debug)]
pub struct ContainerConfig {
    /// Simulation regime.
    pub mode: SimulationMode,
    /// Agent sub-timestep, hours. Clamped down to the global step at run
    /// time; a value larger than the global step is a step error.
    pub agent_dt: f64,
    /// Relaxation tuning.
    pub shoving: ShovingParams,
    /// Border-removal policy.
    pub detachment: DetachmentMethod,
    /// Run the connectivity filter after detachment (biofilm mode only).
    pub sloughing: bool,
    /// Population size at which the simulation asks to stop. Zero disables
    /// the check.
    pub max_population: usize,
    /// Chemostat dilution rate `D`, per hour.
    pub dilution_rate: f64,
    /// Seed for every stochastic decision the container makes.
    pub seed: u64,
}

impl ContainerConfig {
    /// Start building a configuration for the given mode.
    pub fn builder(mode: SimulationMode) -> ContainerConfigBuilder {
        ContainerConfigBuilder {
            mode,
            agent_dt: 0.05,
            shoving: ShovingParams::default(),
            detachment: DetachmentMethod::ShrinkOnBorder,
            sloughing: true,
            max_population: 0,
            dilution_rate: 0.0,
            seed: 0,
        }
    }
}

/// Builder for [`ContainerConfig`].
#[derive(Clone, Debug)]
pub struct ContainerConfigBuilder {
    mode: SimulationMode,
    agent_dt: f64,
    shoving: ShovingParams,
    detachment: DetachmentMethod,
    sloughing: bool,
    max_population: usize,
    dilution_rate: f64,
    seed: u64,
}

impl ContainerConfigBuilder {
    /// Set the agent sub-timestep (default 0.05 h).
    pub fn agent_dt(mut self, dt: f64) -> Self {
        self.agent_dt = dt;
        self
    }

    /// Set the relaxation tuning (default: fraction 0.025, 250 iterations,
    /// mutual).
    pub fn shoving(mut self, params: ShovingParams) -> Self {
        self.shoving = params;
        self
    }

    /// Set the border-removal policy (default: continuous shrink).
    pub fn detachment(mut self, method: DetachmentMethod) -> Self {
        self.detachment = method;
        self
    }

    /// Enable or disable sloughing (default: enabled).
    pub fn sloughing(mut self, enabled: bool) -> Self {
        self.sloughing = enabled;
        self
    }

    /// Set the stop-signal population cap (default: 0, disabled).
    pub fn max_population(mut self, cap: usize) -> Self {
        self.max_population = cap;
        self
    }

    /// Set the chemostat dilution rate (default: 0).
    pub fn dilution_rate(mut self, rate: f64) -> Self {
        self.dilution_rate = rate;
        self
    }

    /// Set the random seed (default: 0).
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Validate and produce the configuration.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the agent timestep is not positive and finite, the
    /// shoving fraction is outside `[0, 1]`, the iteration cap is zero, or
    /// the dilution rate is negative or not finite.
    pub fn build(self) -> Result<ContainerConfig, ConfigError> {
        if !self.agent_dt.is_finite() || self.agent_dt <= 0.0 {
            return Err(ConfigError::InvalidAgentTimestep {
                value: self.agent_dt,
            });
        }
        if !self.shoving.fraction.is_finite()
            || !(0.0..=1.0).contains(&self.shoving.fraction)
        {
            return Err(ConfigError::InvalidShovingFraction {
                value: self.shoving.fraction,
            });
        }
        if self.shoving.max_iter == 0 {
            return Err(ConfigError::ZeroShovingIterations);
        }
        if !self.dilution_rate.is_finite() || self.dilution_rate < 0.0 {
            return Err(ConfigError::InvalidDilutionRate {
                value: self.dilution_rate,
            });
        }
        Ok(ContainerConfig {
            mode: self.mode,
            agent_dt: self.agent_dt,
            shoving: self.shoving,
            detachment: self.detachment,
            sloughing: self.sloughing,
            max_population: self.max_population,
            dilution_rate: self.dilution_rate,
            seed: self.seed,
        })
    }
}
