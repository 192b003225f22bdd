//! Shared scenario builders for the Pellicle benchmarks.

#![forbid(unsafe_code)]
#![allow(missing_docs)]

use pellicle_core::{AgentBody, ContainerConfig, DomainGeometry, SimulationMode, Vector};
use pellicle_engine::{AgentContainer, ConstantDetachment};

/// A biofilm container seeded with `columns × layers` unit-mass agents,
/// one per voxel centre, deliberately overlapping their neighbours.
pub fn seeded_biofilm(length: f64, resolution: f64, columns: usize, layers: usize) -> AgentContainer {
    let geometry = DomainGeometry::sheet(length, length, resolution).expect("bench geometry");
    let config = ContainerConfig::builder(SimulationMode::Biofilm)
        .agent_dt(0.05)
        .seed(2024)
        .build()
        .expect("bench config");
    let mut container = AgentContainer::new(
        &geometry,
        config,
        Box::new(ConstantDetachment { speed: 0.05 }),
    );
    for j in 0..columns {
        for i in 0..layers {
            let x = (i as f64 + 0.5) * resolution;
            let y = (j as f64 + 0.5) * resolution;
            let body = AgentBody::located(Vector::new(x, y, 0.0), resolution * 0.45, 1.0);
            container.register_birth(body).expect("bench birth");
        }
    }
    container
}
