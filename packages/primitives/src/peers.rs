use derive_more::Constructor;

/// Peer counts for one swarm, as reported by a tracker announce response.
///
/// `seeders` maps to the `complete` field and `leechers` to `incomplete`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default, Constructor)]
pub struct Peers {
    pub seeders: u32,
    pub leechers: u32,
}

impl Peers {
    /// The share of the swarm that is still downloading, in `0.0..=1.0`.
    #[must_use]
    pub fn leechers_ratio(&self) -> f64 {
        let total = u64::from(self.seeders) + u64::from(self.leechers);
        if total == 0 {
            return 0.0;
        }
        f64::from(self.leechers) / total as f64
    }
}
