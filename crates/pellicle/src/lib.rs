//! Pellicle: a spatial agent container for individual-based microbial
//! simulations.
//!
//! This is the top-level facade crate re-exporting the public API from the
//! Pellicle sub-crates. For most users, adding `pellicle` as a single
//! dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use pellicle::prelude::*;
//!
//! // Biology stub: inert agents that never grow, divide or die.
//! struct Inert;
//! impl AgentDriver for Inert {
//!     fn step_agent(&mut self, _: AgentId, _: &mut AgentBody, _: f64, _: &mut Nursery) {}
//!     fn will_die(&self, _: &AgentBody) -> bool { false }
//!     fn refresh_size(&self, _: &mut AgentBody) {}
//! }
//!
//! // A 2D biofilm domain, 32×32 µm at 4 µm resolution.
//! let geometry = DomainGeometry::sheet(32.0, 32.0, 4.0).unwrap();
//! let config = ContainerConfig::builder(SimulationMode::Biofilm)
//!     .agent_dt(0.05)
//!     .seed(42)
//!     .build()
//!     .unwrap();
//! let mut container = AgentContainer::new(
//!     &geometry,
//!     config,
//!     Box::new(ConstantDetachment { speed: 0.0 }),
//! );
//!
//! // Seed one agent on the substratum and run a macro step.
//! let body = AgentBody::located(Vector::new(2.0, 16.0, 0.0), 1.0, 150.0);
//! container.register_birth(body).unwrap();
//! let summary = container.step(&mut Inert, 0.5).unwrap();
//! assert!(summary.keep_running);
//! assert_eq!(container.population(), 1);
//! ```
//!
//! # Crates
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `pellicle-core` | Bodies, ids, configuration, errors |
//! | [`grid`] | `pellicle-grid` | Voxel indexing, cells, neighbour queries |
//! | [`engine`] | `pellicle-engine` | Container, shoving, detachment, sloughing |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types: bodies, ids, configuration, errors.
pub mod types {
    pub use pellicle_core::*;
}

/// Spatial grid: voxel indexing, cells, neighbour queries.
pub mod grid {
    pub use pellicle_grid::*;
}

/// Engine: the container and its relaxation/detachment machinery.
pub mod engine {
    pub use pellicle_engine::*;
}

/// The commonly-used subset of the API.
pub mod prelude {
    pub use pellicle_core::{
        AgentBody, AgentDriver, AgentId, AgentKind, BirthError, CellIndex, ConfigError,
        ContainerConfig, DeathReason, DetachmentMethod, DomainGeometry, Nursery, ShovingParams,
        SimulationMode, StepError, Vector, Voxel,
    };
    pub use pellicle_engine::{
        AgentContainer, BorderTracker, ConstantDetachment, DetachmentLaw, FieldSink,
        PressureField, ProportionalDetachment, QuadraticDetachment, StepSummary,
    };
    pub use pellicle_grid::{CellStatus, GridCell, VoxelGrid, VoxelIndexer};
}

pub use prelude::*;
