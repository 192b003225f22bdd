//! Pre-built bodies and containers for test scenarios.

use pellicle_core::{
    AgentBody, ContainerConfig, DomainGeometry, SimulationMode, Vector,
};
use pellicle_engine::{AgentContainer, ConstantDetachment};

/// A located agent body with a mass-matched radius.
pub fn ball(x: f64, y: f64, mass: f64) -> AgentBody {
    let radius = (mass * 3.0 / (0.2 * 4.0 * std::f64::consts::PI)).cbrt();
    AgentBody::located(Vector::new(x, y, 0.0), radius, mass)
}

/// A 2D biofilm container over a sheet domain with a constant-speed
/// detachment law.
pub fn biofilm_container(
    length_x: f64,
    length_y: f64,
    resolution: f64,
    detachment_speed: f64,
    seed: u64,
) -> AgentContainer {
    let geometry = DomainGeometry::sheet(length_x, length_y, resolution).expect("valid fixture");
    let config = ContainerConfig::builder(SimulationMode::Biofilm)
        .agent_dt(0.05)
        .seed(seed)
        .build()
        .expect("valid fixture");
    AgentContainer::new(
        &geometry,
        config,
        Box::new(ConstantDetachment {
            speed: detachment_speed,
        }),
    )
}

/// A chemostat container with the given dilution rate.
pub fn chemostat_container(dilution_rate: f64, seed: u64) -> AgentContainer {
    let geometry = DomainGeometry::sheet(32.0, 32.0, 4.0).expect("valid fixture");
    let config = ContainerConfig::builder(SimulationMode::Chemostat)
        .agent_dt(0.05)
        .dilution_rate(dilution_rate)
        .seed(seed)
        .build()
        .expect("valid fixture");
    AgentContainer::new(
        &geometry,
        config,
        Box::new(ConstantDetachment { speed: 0.0 }),
    )
}

/// Seed a flat film: `columns` voxel columns filled `layers` deep, one
/// agent per voxel centre.
pub fn seed_film(container: &mut AgentContainer, columns: usize, layers: usize) {
    let resolution = container.grid().resolution();
    for j in 0..columns {
        for i in 0..layers {
            let x = (i as f64 + 0.5) * resolution;
            let y = (j as f64 + 0.5) * resolution;
            container
                .register_birth(ball(x, y, 1.0))
                .expect("fixture births are valid");
        }
    }
}
