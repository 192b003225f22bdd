//! Test utilities and mock types for Pellicle development.
//!
//! Provides [`MockDriver`], a minimal implementation of the
//! [`AgentDriver`] biology seam (linear growth, mass-threshold division
//! and death, density-based radius refresh), plus fixtures for building
//! pre-seeded containers.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

use pellicle_core::{AgentBody, AgentDriver, AgentId, Nursery, Vector};

pub mod fixtures;

pub use fixtures::{ball, biofilm_container, chemostat_container, seed_film};

/// Configurable stand-in for the per-agent biology.
///
/// Grows compartment 0 linearly, divides in half past a mass threshold,
/// dies below another, and rederives radii from a fixed density. Any
/// behaviour can be disabled by setting its threshold to zero.
#[derive(Clone, Debug)]
pub struct MockDriver {
    /// Mass added to compartment 0 per hour. Zero disables growth.
    pub growth_rate: f64,
    /// Total mass at which an agent splits in two. Zero disables division.
    pub division_mass: f64,
    /// Total mass below which an agent dies. Zero disables starvation.
    pub death_mass: f64,
    /// Mass per cubic micrometre, for the radius refresh.
    pub density: f64,
    /// Number of `step_agent` calls made so far.
    pub stepped: usize,
}

impl Default for MockDriver {
    fn default() -> Self {
        Self {
            growth_rate: 0.0,
            division_mass: 0.0,
            death_mass: 0.0,
            density: 0.2,
            stepped: 0,
        }
    }
}

impl MockDriver {
    /// A driver that does nothing but answer the predicates.
    pub fn inert() -> Self {
        Self::default()
    }

    /// A driver that grows agents at `rate` and splits them at `division_mass`.
    pub fn growing(rate: f64, division_mass: f64) -> Self {
        Self {
            growth_rate: rate,
            division_mass,
            ..Self::default()
        }
    }

    fn radius_for(&self, mass: f64) -> f64 {
        let volume = (mass / self.density).max(0.0);
        (volume * 3.0 / (4.0 * std::f64::consts::PI)).cbrt()
    }
}

impl AgentDriver for MockDriver {
    fn step_agent(&mut self, _id: AgentId, body: &mut AgentBody, dt: f64, nursery: &mut Nursery) {
        self.stepped += 1;

        if self.growth_rate != 0.0 {
            body.compartments[0] += self.growth_rate * dt;
            self.refresh_size(body);
        }

        if self.death_mass > 0.0 && body.total_mass() < self.death_mass {
            body.kill(pellicle_core::DeathReason::Starvation);
            return;
        }

        if self.division_mass > 0.0 && body.total_mass() >= self.division_mass {
            for compartment in body.compartments.iter_mut() {
                *compartment *= 0.5;
            }
            self.refresh_size(body);

            let mut daughter = body.clone();
            daughter.movement = Vector::ZERO;
            daughter.location.y += body.radius.max(0.1);
            nursery.spawn(daughter);
        }
    }

    fn will_die(&self, body: &AgentBody) -> bool {
        self.death_mass > 0.0 && body.total_mass() < self.death_mass
    }

    fn refresh_size(&self, body: &mut AgentBody) {
        body.radius = self.radius_for(body.total_mass());
        body.total_radius = body.radius;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn growth_adds_mass_and_radius() {
        let mut driver = MockDriver::growing(2.0, 0.0);
        let mut body = ball(4.0, 4.0, 1.0);
        let r0 = body.radius;
        let mut nursery = Nursery::new();
        driver.step_agent(AgentId(0), &mut body, 0.5, &mut nursery);
        assert!((body.total_mass() - 2.0).abs() < 1e-12);
        assert!(body.radius > r0);
        assert!(nursery.is_empty());
    }

    #[test]
    fn division_halves_and_spawns() {
        let mut driver = MockDriver::growing(0.0, 2.0);
        let mut body = ball(4.0, 4.0, 2.5);
        let mut nursery = Nursery::new();
        driver.step_agent(AgentId(0), &mut body, 0.1, &mut nursery);
        assert!((body.total_mass() - 1.25).abs() < 1e-12);
        assert_eq!(nursery.len(), 1);
    }

    #[test]
    fn starvation_kills() {
        let mut driver = MockDriver {
            death_mass: 0.5,
            ..MockDriver::default()
        };
        let mut body = ball(4.0, 4.0, 0.25);
        let mut nursery = Nursery::new();
        driver.step_agent(AgentId(0), &mut body, 0.1, &mut nursery);
        assert!(body.is_dead());
    }
}
