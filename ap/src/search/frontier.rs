//! Size-bounded best-first frontier
//!
//! Backed by a `BTreeSet` ordered by the `SearchNode` ordering, so both ends
//! are reachable in O(log n): `pop` takes the minimum and eviction trims the
//! maximum once capacity is exceeded. Every entry carries a unique `seq`, so
//! the set behaves as a multiset over scores.

use std::collections::BTreeSet;
use tracing::debug;

use super::node::SearchNode;

#[derive(Debug)]
pub struct Frontier {
    entries: BTreeSet<SearchNode>,
    capacity: usize,
    high_water: usize,
    evicted: u64,
}

impl Frontier {
    /// Create a frontier holding at most `capacity` nodes (minimum 1)
    pub fn new(capacity: usize) -> Self {
        debug!(%capacity, "Frontier::new: called");
        Self {
            entries: BTreeSet::new(),
            capacity: capacity.max(1),
            high_water: 0,
            evicted: 0,
        }
    }

    /// Insert a node; returns the worst entries evicted to stay within capacity
    ///
    /// The returned list may contain the node just pushed if it was the worst.
    pub fn push(&mut self, node: SearchNode) -> Vec<SearchNode> {
        self.entries.insert(node);
        let mut evicted = Vec::new();
        while self.entries.len() > self.capacity {
            if let Some(worst) = self.entries.pop_last() {
                debug!(seq = worst.seq, f = %worst.f_score, "Frontier::push: evicted worst entry");
                evicted.push(worst);
            }
        }
        self.evicted += evicted.len() as u64;
        self.high_water = self.high_water.max(self.entries.len());
        evicted
    }

    /// Remove and return the global minimum
    pub fn pop(&mut self) -> Option<SearchNode> {
        self.entries.pop_first()
    }

    pub fn peek(&self) -> Option<&SearchNode> {
        self.entries.first()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Largest size ever held
    pub fn high_water(&self) -> usize {
        self.high_water
    }

    /// Total entries evicted so far
    pub fn evicted(&self) -> u64 {
        self.evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::node::Estimate;
    use crate::search::state::StateId;
    use proptest::prelude::*;
    use std::cmp::Reverse;
    use std::collections::BinaryHeap;

    fn node(g: u64, h: Option<u64>, seq: u64) -> SearchNode {
        let h = h.map_or(Estimate::Unknown, Estimate::Finite);
        SearchNode::new(StateId(seq as u32), g, h, seq)
    }

    #[test]
    fn test_pop_returns_lowest_f_first() {
        let mut frontier = Frontier::new(10);
        frontier.push(node(1, Some(9), 0));
        frontier.push(node(1, Some(4), 1));
        frontier.push(node(1, None, 2));
        frontier.push(node(1, Some(6), 3));

        assert_eq!(frontier.peek().map(|n| n.seq), Some(1));
        let order: Vec<u64> = std::iter::from_fn(|| frontier.pop()).map(|n| n.seq).collect();
        assert_eq!(order, vec![1, 3, 0, 2]);
        assert!(frontier.is_empty());
    }

    #[test]
    fn test_equal_scores_are_kept_as_multiset() {
        let mut frontier = Frontier::new(10);
        frontier.push(node(2, Some(2), 0));
        frontier.push(node(2, Some(2), 1));
        assert_eq!(frontier.len(), 2);
        assert_eq!(frontier.pop().map(|n| n.seq), Some(0));
    }

    #[test]
    fn test_eviction_drops_worst() {
        let mut frontier = Frontier::new(2);
        assert!(frontier.push(node(0, Some(5), 0)).is_empty());
        assert!(frontier.push(node(0, Some(1), 1)).is_empty());
        let evicted = frontier.push(node(0, Some(3), 2));

        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].seq, 0);
        assert_eq!(frontier.len(), 2);
        assert_eq!(frontier.evicted(), 1);
        assert_eq!(frontier.high_water(), 2);

        // pushing something worse than everything evicts the new node itself
        let evicted = frontier.push(node(0, None, 3));
        assert_eq!(evicted[0].seq, 3);
    }

    #[test]
    fn test_zero_capacity_is_raised_to_one() {
        let mut frontier = Frontier::new(0);
        frontier.push(node(0, Some(1), 0));
        assert_eq!(frontier.capacity(), 1);
        assert_eq!(frontier.len(), 1);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Push(u64, Option<u64>),
        Pop,
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            3 => (0u64..20, proptest::option::weighted(0.9, 0u64..20)).prop_map(|(g, h)| Op::Push(g, h)),
            1 => Just(Op::Pop),
        ]
    }

    proptest! {
        #[test]
        fn prop_pop_matches_reference_heap(ops in proptest::collection::vec(op_strategy(), 1..200)) {
            let mut frontier = Frontier::new(usize::MAX);
            let mut reference: BinaryHeap<Reverse<SearchNode>> = BinaryHeap::new();
            let mut seq = 0u64;

            for op in ops {
                match op {
                    Op::Push(g, h) => {
                        let n = node(g, h, seq);
                        seq += 1;
                        prop_assert!(frontier.push(n).is_empty());
                        reference.push(Reverse(n));
                    }
                    Op::Pop => {
                        let got = frontier.pop();
                        let want = reference.pop().map(|r| r.0);
                        prop_assert_eq!(got, want);
                    }
                }
                prop_assert_eq!(frontier.len(), reference.len());
                prop_assert_eq!(frontier.peek().copied(), reference.peek().map(|r| r.0));
            }
        }

        #[test]
        fn prop_bounded_frontier_keeps_best(
            entries in proptest::collection::vec((0u64..20, 0u64..20), 1..100),
            capacity in 1usize..16,
        ) {
            let mut frontier = Frontier::new(capacity);
            let mut all = Vec::new();
            for (seq, (g, h)) in entries.into_iter().enumerate() {
                let n = node(g, Some(h), seq as u64);
                all.push(n);
                frontier.push(n);
                prop_assert!(frontier.len() <= capacity);
            }
            all.sort();
            all.truncate(capacity);
            let kept: Vec<SearchNode> = std::iter::from_fn(|| frontier.pop()).collect();
            prop_assert_eq!(kept, all);
        }
    }
}
