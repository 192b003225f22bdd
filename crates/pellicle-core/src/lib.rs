//! Core types and traits for Pellicle simulations.
//!
//! This crate defines the value types shared by every other Pellicle crate:
//! continuous and discrete coordinates, strongly-typed identifiers, the
//! physical agent body and its storage arena, the [`AgentDriver`] seam
//! through which per-agent biology plugs into the container, and the
//! validated configuration types.
//!
//! Nothing in this crate knows about the spatial grid or the step loop;
//! those live in `pellicle-grid` and `pellicle-engine`.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod agent;
pub mod arena;
pub mod config;
pub mod error;
pub mod id;
pub mod vector;

pub use agent::{AgentBody, AgentDriver, AgentKind, DeathReason, Fate, Nursery};
pub use arena::AgentArena;
pub use config::{
    ContainerConfig, ContainerConfigBuilder, DetachmentMethod, DomainGeometry, ShovingParams,
    SimulationMode,
};
pub use error::{BirthError, ConfigError, StepError};
pub use id::{AgentId, CellIndex};
pub use vector::{Vector, Voxel};
