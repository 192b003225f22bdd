//! Strongly-typed identifiers.

use std::fmt;

/// Identifies an agent within the container's arena.
///
/// Ids are arena slot numbers; a slot is only recycled after the dead agent
/// occupying it has been purged from the population roster and its grid
/// cell, so a live `AgentId` never aliases a different agent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AgentId(pub u32);

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for AgentId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Index of a cell in the flattened, padded voxel grid.
///
/// The mapping between continuous positions, voxel coordinates and cell
/// indices is owned by the grid crate's indexer; other code treats this as
/// an opaque handle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellIndex(pub usize);

impl fmt::Display for CellIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<usize> for CellIndex {
    fn from(v: usize) -> Self {
        Self(v)
    }
}
