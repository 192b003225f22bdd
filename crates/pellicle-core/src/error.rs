//! Error types for the Pellicle container.
//!
//! Three classes, matching the container's failure policy: configuration
//! errors are fatal at construction, birth errors reject a single
//! registration atomically, and step errors signal conditions the caller
//! should treat as unrecoverable for the whole simulation.

use crate::vector::Vector;
use std::error::Error;
use std::fmt;

/// Invalid geometry or container configuration.
///
/// Construction-time failures; there is no partial-initialisation recovery.
#[derive(Clone, Debug, PartialEq)]
pub enum ConfigError {
    /// A domain length or the resolution is zero, negative or not finite.
    NonPositiveDimension {
        /// Which dimension was rejected.
        name: &'static str,
        /// The offending value.
        value: f64,
    },
    /// The voxel edge is larger than the smallest domain extent.
    ResolutionTooCoarse {
        /// Requested voxel edge length.
        resolution: f64,
        /// Smallest domain extent.
        min_extent: f64,
    },
    /// The substratum-normal axis cannot wrap.
    PeriodicSubstratumAxis,
    /// The agent sub-timestep is zero, negative or not finite.
    InvalidAgentTimestep {
        /// The offending value.
        value: f64,
    },
    /// The shoving fraction is outside `[0, 1]` or not finite.
    InvalidShovingFraction {
        /// The offending value.
        value: f64,
    },
    /// The shoving iteration cap is zero.
    ZeroShovingIterations,
    /// The dilution rate is negative or not finite.
    InvalidDilutionRate {
        /// The offending value.
        value: f64,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonPositiveDimension { name, value } => {
                write!(f, "{name} must be positive and finite, got {value}")
            }
            Self::ResolutionTooCoarse {
                resolution,
                min_extent,
            } => write!(
                f,
                "resolution {resolution} exceeds smallest domain extent {min_extent}"
            ),
            Self::PeriodicSubstratumAxis => {
                write!(f, "the substratum-normal axis cannot be periodic")
            }
            Self::InvalidAgentTimestep { value } => {
                write!(f, "agent timestep must be positive and finite, got {value}")
            }
            Self::InvalidShovingFraction { value } => {
                write!(f, "shoving fraction must lie in [0, 1], got {value}")
            }
            Self::ZeroShovingIterations => write!(f, "shoving iteration cap must be at least 1"),
            Self::InvalidDilutionRate { value } => {
                write!(f, "dilution rate must be non-negative and finite, got {value}")
            }
        }
    }
}

impl Error for ConfigError {}

/// A birth registration was rejected as a whole.
#[derive(Clone, Debug, PartialEq)]
pub enum BirthError {
    /// The newborn's location has no finite cell index. The agent was not
    /// added to the population or the grid.
    UnindexableLocation {
        /// The rejected location.
        location: Vector,
    },
}

impl fmt::Display for BirthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnindexableLocation { location } => {
                write!(f, "birth location {location} maps to no grid cell")
            }
        }
    }
}

impl Error for BirthError {}

/// A macro step could not run to completion.
///
/// These indicate caller mistakes or internal invariant violations; the
/// container makes no attempt to retry, and callers are expected to stop
/// the simulation.
#[derive(Clone, Debug, PartialEq)]
pub enum StepError {
    /// The global timestep passed to `step()` is zero, negative or not
    /// finite.
    InvalidTimestep {
        /// The offending value.
        value: f64,
    },
    /// The configured agent sub-timestep exceeds the global timestep.
    AgentTimestepExceedsGlobal {
        /// Configured agent sub-timestep.
        agent_dt: f64,
        /// Global timestep for this call.
        global_dt: f64,
    },
    /// Discrete detachment removal hit a non-finite mass or budget, which
    /// can only come from corrupted agent state.
    Detachment {
        /// Description of the violated invariant.
        reason: String,
    },
}

impl fmt::Display for StepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidTimestep { value } => {
                write!(f, "global timestep must be positive and finite, got {value}")
            }
            Self::AgentTimestepExceedsGlobal {
                agent_dt,
                global_dt,
            } => write!(
                f,
                "agent timestep {agent_dt} exceeds global timestep {global_dt}"
            ),
            Self::Detachment { reason } => write!(f, "detachment removal failed: {reason}"),
        }
    }
}

impl Error for StepError {}
