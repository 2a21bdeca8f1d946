//! Observability counters.
//!
//! Every engine entry point takes a `&mut Metrics` instead of touching any
//! global state; the driver owns one sink per unit of work and folds them
//! together, so re-executing a unit cannot double-count.

use std::collections::BTreeMap;

/// Monotonic named counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metrics {
    counts: BTreeMap<&'static str, u64>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn incr(&mut self, name: &'static str) {
        self.add(name, 1);
    }

    pub fn add(&mut self, name: &'static str, n: u64) {
        *self.counts.entry(name).or_insert(0) += n;
    }

    pub fn get(&self, name: &str) -> u64 {
        self.counts.get(name).copied().unwrap_or(0)
    }

    /// Fold another sink into this one.
    pub fn merge(&mut self, other: &Metrics) {
        for (name, n) in &other.counts {
            *self.counts.entry(name).or_insert(0) += n;
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, u64)> + '_ {
        self.counts.iter().map(|(name, n)| (*name, *n))
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incr_and_merge() {
        let mut a = Metrics::new();
        a.incr("merged_records");
        a.incr("merged_records");

        let mut b = Metrics::new();
        b.incr("merged_records");
        b.incr("dup_same_topology");

        a.merge(&b);
        assert_eq!(a.get("merged_records"), 3);
        assert_eq!(a.get("dup_same_topology"), 1);
        assert_eq!(a.get("never_seen"), 0);
    }
}
