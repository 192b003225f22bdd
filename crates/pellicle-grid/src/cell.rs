//! Per-cell bookkeeping.

use pellicle_core::{AgentId, CellIndex, Vector, Voxel};
use std::fmt;

/// Space-occupation status of a grid cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CellStatus {
    /// Padding cell beyond a non-periodic boundary.
    Outside,
    /// First layer of cells above the substratum.
    Carrier,
    /// Occupied by at least one agent.
    Biofilm,
    /// Inside the domain, no biomass.
    Liquid,
    /// Padding cell beyond the bulk-liquid face.
    Bulk,
}

impl fmt::Display for CellStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Outside => write!(f, "outside"),
            Self::Carrier => write!(f, "carrier"),
            Self::Biofilm => write!(f, "biofilm"),
            Self::Liquid => write!(f, "liquid"),
            Self::Bulk => write!(f, "bulk"),
        }
    }
}

/// One voxel's worth of container state.
///
/// Owns the set of agents physically located in the voxel, a cached
/// aggregate mass (refreshed, never live), and the border-erosion
/// bookkeeping used by the detachment engine.
#[derive(Clone, Debug)]
pub struct GridCell {
    /// Flat index of this cell.
    pub index: CellIndex,
    /// Unpadded voxel coordinate.
    pub voxel: Voxel,
    /// Continuous centre of the voxel.
    pub center: Vector,
    /// Space-occupation status.
    pub status: CellStatus,
    /// True for padding cells.
    pub is_outside: bool,
    /// True for the first inside layer above the substratum.
    pub is_carrier: bool,
    /// True for the last inside layer below the bulk liquid.
    pub is_bulk: bool,
    /// Distance from the cell centre to the substratum face.
    pub distance_from_carrier: f64,
    /// Distance from the cell centre to the bulk face.
    pub distance_from_bulk: f64,
    /// Sum of member masses at the last refresh.
    pub total_mass: f64,
    /// Estimated time for this cell's biomass to fully erode.
    pub erosion_time: f64,
    /// Fraction of this cell's biomass the current step should remove.
    pub erosion_ratio: f64,
    /// Number of liquid-facing faces at the last border refresh.
    pub free_faces: u32,
    /// Advective displacement assigned by the pressure solver.
    pub advect: Vector,
    members: Vec<AgentId>,
}

impl GridCell {
    /// Create an empty liquid cell.
    pub fn new(index: CellIndex, voxel: Voxel, center: Vector) -> Self {
        Self {
            index,
            voxel,
            center,
            status: CellStatus::Liquid,
            is_outside: false,
            is_carrier: false,
            is_bulk: false,
            distance_from_carrier: f64::INFINITY,
            distance_from_bulk: f64::INFINITY,
            total_mass: 0.0,
            erosion_time: f64::NAN,
            erosion_ratio: 0.0,
            free_faces: 0,
            advect: Vector::ZERO,
            members: Vec::new(),
        }
    }

    /// Agents located in this cell.
    pub fn members(&self) -> &[AgentId] {
        &self.members
    }

    /// True if no agents are located here.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Membership test.
    pub fn contains(&self, id: AgentId) -> bool {
        self.members.contains(&id)
    }

    /// Add an agent and mark the cell as biofilm.
    pub fn add_member(&mut self, id: AgentId) {
        self.members.push(id);
        self.status = CellStatus::Biofilm;
    }

    /// Remove an agent, preserving the order of the remaining members.
    /// Returns true if the agent was present.
    pub fn remove_member(&mut self, id: AgentId) -> bool {
        match self.members.iter().position(|&m| m == id) {
            Some(at) => {
                self.members.remove(at);
                true
            }
            None => false,
        }
    }

    /// Remove and return every member, leaving the cell empty.
    pub fn take_members(&mut self) -> Vec<AgentId> {
        std::mem::take(&mut self.members)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_marks_biofilm() {
        let mut cell = GridCell::new(CellIndex(0), Voxel::new(0, 0, 0), Vector::ZERO);
        assert_eq!(cell.status, CellStatus::Liquid);
        cell.add_member(AgentId(7));
        assert_eq!(cell.status, CellStatus::Biofilm);
        assert!(cell.contains(AgentId(7)));
    }

    #[test]
    fn remove_preserves_order() {
        let mut cell = GridCell::new(CellIndex(0), Voxel::new(0, 0, 0), Vector::ZERO);
        for id in [1, 2, 3] {
            cell.add_member(AgentId(id));
        }
        assert!(cell.remove_member(AgentId(2)));
        assert_eq!(cell.members(), &[AgentId(1), AgentId(3)]);
        assert!(!cell.remove_member(AgentId(2)), "second removal is a no-op");
    }

    #[test]
    fn take_members_empties_cell() {
        let mut cell = GridCell::new(CellIndex(0), Voxel::new(0, 0, 0), Vector::ZERO);
        cell.add_member(AgentId(1));
        cell.add_member(AgentId(2));
        let taken = cell.take_members();
        assert_eq!(taken.len(), 2);
        assert!(cell.is_empty());
    }
}
