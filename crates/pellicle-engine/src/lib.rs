//! Engine crate: the spatial agent container and its moving parts.
//!
//! [`AgentContainer`] owns the population and the voxel grid, and runs the
//! macro step: agent sub-timesteps with pressure advection and overlap
//! relaxation, then border detachment and the connectivity filter.
//!
//! # Step pipeline (each macro step)
//!
//! 1. sub-steps: advect ([`PressureField`]), drive agents
//!    ([`pellicle_core::AgentDriver`]), dilute (chemostat), purge dead,
//!    relax moderately
//! 2. final relaxation to convergence
//! 3. border refresh + level-set erosion times ([`BorderTracker`])
//! 4. detachment policy (continuous shrink or discrete removal)
//! 5. connectivity filter from the substratum (sloughing)

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod container;
pub mod detach;
pub mod levelset;
pub mod lifecycle;
pub mod population;
pub mod pressure;
pub mod shove;
pub mod slough;

pub use container::{AgentContainer, FieldSink, StepSummary};
pub use levelset::{
    BorderTracker, ConstantDetachment, DetachmentLaw, ProportionalDetachment, QuadraticDetachment,
};
pub use population::Population;
pub use pressure::PressureField;
