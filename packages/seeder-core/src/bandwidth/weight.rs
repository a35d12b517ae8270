//! Per-torrent weights derived from swarm peer counts.
use std::collections::HashMap;
use std::hash::Hash;

use ghostseed_primitives::peers::Peers;

/// Weighs a swarm so that torrents with hungry leecher populations get the
/// bigger share of the fabricated upload budget.
///
/// A swarm with no seeders or no leechers weighs nothing: nobody would be
/// downloading from us there.
#[derive(Debug, Default, Clone, Copy)]
pub struct PeersAwareWeightCalculator;

impl PeersAwareWeightCalculator {
    #[must_use]
    pub fn calculate(&self, peers: &Peers) -> f64 {
        if peers.seeders == 0 || peers.leechers == 0 {
            return 0.0;
        }

        f64::from(peers.leechers) * peers.leechers_ratio() * f64::from(peers.seeders)
    }
}

/// Keeps one weight per key plus the running total.
#[derive(Debug)]
pub struct WeightHolder<K: Eq + Hash> {
    calculator: PeersAwareWeightCalculator,
    weights: HashMap<K, f64>,
    total: f64,
}

impl<K: Eq + Hash> Default for WeightHolder<K> {
    fn default() -> Self {
        Self {
            calculator: PeersAwareWeightCalculator,
            weights: HashMap::new(),
            total: 0.0,
        }
    }
}

impl<K: Eq + Hash> WeightHolder<K> {
    pub fn add_or_update(&mut self, key: K, peers: Peers) {
        self.weights.insert(key, self.calculator.calculate(&peers));
        self.recompute_total();
    }

    pub fn remove(&mut self, key: &K) {
        self.weights.remove(key);
        self.recompute_total();
    }

    #[must_use]
    pub fn weight_for(&self, key: &K) -> f64 {
        self.weights.get(key).copied().unwrap_or(0.0)
    }

    #[must_use]
    pub fn total_weight(&self) -> f64 {
        self.total
    }

    fn recompute_total(&mut self) {
        self.total = self.weights.values().sum();
    }
}

#[cfg(test)]
mod tests {
    use ghostseed_primitives::peers::Peers;

    use super::{PeersAwareWeightCalculator, WeightHolder};

    #[test]
    fn it_should_weigh_zero_when_either_peer_count_is_zero() {
        let calculator = PeersAwareWeightCalculator;

        assert!((calculator.calculate(&Peers::new(0, 100))).abs() < f64::EPSILON);
        assert!((calculator.calculate(&Peers::new(100, 0))).abs() < f64::EPSILON);
    }

    #[test]
    fn it_should_weigh_more_leechers_heavier_for_the_same_seeders() {
        let calculator = PeersAwareWeightCalculator;

        let few = calculator.calculate(&Peers::new(10, 5));
        let many = calculator.calculate(&Peers::new(10, 50));

        assert!(many > few);
    }

    #[test]
    fn it_should_keep_the_total_equal_to_the_sum_of_all_weights() {
        let mut holder: WeightHolder<u32> = WeightHolder::default();

        holder.add_or_update(1, Peers::new(10, 5));
        holder.add_or_update(2, Peers::new(3, 30));

        let expected = holder.weight_for(&1) + holder.weight_for(&2);
        assert!((holder.total_weight() - expected).abs() < 1e-9);
    }

    #[test]
    fn it_should_drop_the_weight_of_a_removed_key_from_the_total() {
        let mut holder: WeightHolder<u32> = WeightHolder::default();
        holder.add_or_update(1, Peers::new(10, 5));
        holder.add_or_update(2, Peers::new(3, 30));

        holder.remove(&1);

        assert!((holder.total_weight() - holder.weight_for(&2)).abs() < 1e-9);
        assert!((holder.weight_for(&1)).abs() < f64::EPSILON);
    }

    #[test]
    fn it_should_update_an_existing_weight_in_place() {
        let mut holder: WeightHolder<u32> = WeightHolder::default();
        holder.add_or_update(1, Peers::new(10, 5));

        holder.add_or_update(1, Peers::new(0, 0));

        assert!((holder.total_weight()).abs() < f64::EPSILON);
    }
}
