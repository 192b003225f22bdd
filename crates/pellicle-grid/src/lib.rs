//! Spatial grid for Pellicle simulations.
//!
//! A biofilm domain is covered by a regular voxel lattice padded by one
//! layer on every axis. [`VoxelIndexer`] owns the complete mapping between
//! continuous positions, discrete voxel coordinates and flat cell indices
//! (including the chemostat collapse to a single cell), so the padded
//! addressing arithmetic never leaks into call sites. [`VoxelGrid`] holds
//! the per-cell bookkeeping ([`GridCell`]) and answers the cubic-box
//! neighbour queries that drive overlap relaxation.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod cell;
pub mod grid;
pub mod indexer;

pub use cell::{CellStatus, GridCell};
pub use grid::VoxelGrid;
pub use indexer::VoxelIndexer;
