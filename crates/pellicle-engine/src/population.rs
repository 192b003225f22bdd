//! The ordered population roster and its backing arena.

use indexmap::IndexSet;
use pellicle_core::{AgentArena, AgentBody, AgentId, DeathReason};
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;

/// Every agent in the simulation, in a deterministic shuffled order.
///
/// The roster order is load-bearing: agent stepping, shoving and dilution
/// all follow it, and it is re-randomized from the container's seeded
/// generator at the points the step pipeline prescribes. Dead agents stay
/// in the roster (and their grid cell) until the next cleanup point; all
/// traversals skip them.
#[derive(Debug, Default)]
pub struct Population {
    arena: AgentArena,
    roster: Vec<AgentId>,
    pending: IndexSet<AgentId>,
}

impl Population {
    /// Create an empty population.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of agents in the roster, dead-but-unpurged included.
    pub fn len(&self) -> usize {
        self.roster.len()
    }

    /// True if the roster is empty.
    pub fn is_empty(&self) -> bool {
        self.roster.is_empty()
    }

    /// The roster in its current order.
    pub fn ids(&self) -> &[AgentId] {
        &self.roster
    }

    /// Re-randomize the roster order.
    pub fn shuffle(&mut self, rng: &mut ChaCha8Rng) {
        self.roster.shuffle(rng);
    }

    /// Shared access to a body.
    pub fn body(&self, id: AgentId) -> Option<&AgentBody> {
        self.arena.get(id)
    }

    /// Exclusive access to a body.
    pub fn body_mut(&mut self, id: AgentId) -> Option<&mut AgentBody> {
        self.arena.get_mut(id)
    }

    /// Exclusive access to two distinct bodies at once.
    pub fn pair_mut(
        &mut self,
        a: AgentId,
        b: AgentId,
    ) -> Option<(&mut AgentBody, &mut AgentBody)> {
        self.arena.pair_mut(a, b)
    }

    /// The backing arena (for aggregate refreshes).
    pub fn arena(&self) -> &AgentArena {
        &self.arena
    }

    /// Store a body and append it to the roster.
    pub(crate) fn insert(&mut self, body: AgentBody) -> AgentId {
        let id = self.arena.insert(body);
        self.roster.push(id);
        id
    }

    /// Mark an agent dead and queue it for the next cleanup pass.
    ///
    /// Idempotent: the first recorded reason wins and re-registration is a
    /// no-op.
    pub fn mark_dead(&mut self, id: AgentId, reason: DeathReason) {
        if let Some(body) = self.arena.get_mut(id) {
            body.kill(reason);
            self.pending.insert(id);
        }
    }

    /// Queue an agent whose driver already set its fate.
    pub(crate) fn note_dead(&mut self, id: AgentId) {
        self.pending.insert(id);
    }

    /// Number of agents queued for cleanup.
    pub fn pending_dead(&self) -> usize {
        self.pending.len()
    }

    /// Take the queued ids, leaving the queue empty.
    pub(crate) fn take_pending(&mut self) -> IndexSet<AgentId> {
        std::mem::take(&mut self.pending)
    }

    /// Drop a set of ids from the roster, preserving order of the rest.
    pub(crate) fn retain_roster(&mut self, dead: &IndexSet<AgentId>) {
        self.roster.retain(|id| !dead.contains(id));
    }

    /// Remove a body from the arena, freeing its slot.
    pub(crate) fn remove_body(&mut self, id: AgentId) -> Option<AgentBody> {
        self.arena.remove(id)
    }

    /// Sum of every live agent's mass.
    pub fn total_mass(&self) -> f64 {
        self.roster
            .iter()
            .filter_map(|&id| self.arena.get(id))
            .filter(|body| body.is_alive())
            .map(|body| body.total_mass())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pellicle_core::Vector;
    use rand::SeedableRng;

    fn body(mass: f64) -> AgentBody {
        AgentBody::located(Vector::new(1.0, 1.0, 0.0), 0.5, mass)
    }

    #[test]
    fn insert_appends_to_roster() {
        let mut pop = Population::new();
        let a = pop.insert(body(1.0));
        let b = pop.insert(body(2.0));
        assert_eq!(pop.ids(), &[a, b]);
        assert_eq!(pop.len(), 2);
    }

    #[test]
    fn mark_dead_is_idempotent() {
        let mut pop = Population::new();
        let a = pop.insert(body(1.0));
        pop.mark_dead(a, DeathReason::Detachment);
        pop.mark_dead(a, DeathReason::Dilution);
        assert_eq!(pop.pending_dead(), 1);
        assert_eq!(
            pop.body(a).unwrap().death_reason(),
            Some(DeathReason::Detachment)
        );
    }

    #[test]
    fn shuffle_is_seed_deterministic() {
        let build = |seed: u64| {
            let mut pop = Population::new();
            for i in 0..20 {
                pop.insert(body(i as f64));
            }
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            pop.shuffle(&mut rng);
            pop.ids().to_vec()
        };
        assert_eq!(build(7), build(7), "same seed, same order");
        assert_ne!(build(7), build(8), "different seed, different order");
    }

    #[test]
    fn total_mass_skips_dead() {
        let mut pop = Population::new();
        let a = pop.insert(body(1.0));
        pop.insert(body(2.0));
        pop.mark_dead(a, DeathReason::Dilution);
        assert_eq!(pop.total_mass(), 2.0);
    }
}
