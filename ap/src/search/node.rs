//! Search nodes and heuristic estimates

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use super::state::StateId;

/// Heuristic estimate of remaining cost
///
/// `Unknown` marks an oracle failure. It orders after every finite value,
/// so such nodes are expanded last but never discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Estimate {
    Finite(u64),
    Unknown,
}

impl Estimate {
    pub fn is_unknown(&self) -> bool {
        matches!(self, Estimate::Unknown)
    }

    pub fn finite(&self) -> Option<u64> {
        match self {
            Estimate::Finite(v) => Some(*v),
            Estimate::Unknown => None,
        }
    }

    /// `g + self`; stays `Unknown` when the estimate is unknown
    pub fn plus(&self, g: u64) -> Estimate {
        match self {
            Estimate::Finite(h) => Estimate::Finite(h.saturating_add(g)),
            Estimate::Unknown => Estimate::Unknown,
        }
    }
}

impl Ord for Estimate {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Estimate::Finite(a), Estimate::Finite(b)) => a.cmp(b),
            (Estimate::Finite(_), Estimate::Unknown) => Ordering::Less,
            (Estimate::Unknown, Estimate::Finite(_)) => Ordering::Greater,
            (Estimate::Unknown, Estimate::Unknown) => Ordering::Equal,
        }
    }
}

impl PartialOrd for Estimate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Estimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Estimate::Finite(v) => write!(f, "{}", v),
            Estimate::Unknown => write!(f, "unknown"),
        }
    }
}

/// A scored frontier entry pointing at a state in the arena
///
/// Ordering: ascending `f_score`, then descending `g_score` (prefer deeper,
/// better-informed nodes), then ascending `seq` (insertion order).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchNode {
    pub state: StateId,
    pub g_score: u64,
    pub h_score: Estimate,
    pub f_score: Estimate,
    /// Monotonic insertion sequence, unique per planning call
    pub seq: u64,
}

impl SearchNode {
    pub fn new(state: StateId, g_score: u64, h_score: Estimate, seq: u64) -> Self {
        Self {
            state,
            g_score,
            h_score,
            f_score: h_score.plus(g_score),
            seq,
        }
    }
}

impl Ord for SearchNode {
    fn cmp(&self, other: &Self) -> Ordering {
        self.f_score
            .cmp(&other.f_score)
            .then_with(|| other.g_score.cmp(&self.g_score))
            .then_with(|| self.seq.cmp(&other.seq))
            .then_with(|| self.state.cmp(&other.state))
    }
}

impl PartialOrd for SearchNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(g: u64, h: Estimate, seq: u64) -> SearchNode {
        SearchNode::new(StateId(seq as u32), g, h, seq)
    }

    #[test]
    fn test_unknown_sorts_last() {
        assert!(Estimate::Finite(u64::MAX) < Estimate::Unknown);
        assert!(Estimate::Finite(0) < Estimate::Finite(1));
        assert_eq!(Estimate::Unknown.cmp(&Estimate::Unknown), Ordering::Equal);
    }

    #[test]
    fn test_f_score() {
        let n = node(3, Estimate::Finite(4), 0);
        assert_eq!(n.f_score, Estimate::Finite(7));
        let u = node(3, Estimate::Unknown, 1);
        assert_eq!(u.f_score, Estimate::Unknown);
        let sat = node(u64::MAX, Estimate::Finite(5), 2);
        assert_eq!(sat.f_score, Estimate::Finite(u64::MAX));
    }

    #[test]
    fn test_order_f_then_deeper_then_seq() {
        let low_f = node(5, Estimate::Finite(0), 9);
        let shallow = node(1, Estimate::Finite(5), 1);
        let deep = node(3, Estimate::Finite(3), 2);
        let deep_later = node(3, Estimate::Finite(3), 3);

        assert!(low_f < shallow);
        // equal f = 6: higher g wins
        assert!(deep < shallow);
        // equal f and g: earlier insertion wins
        assert!(deep < deep_later);
    }

    #[test]
    fn test_estimate_display() {
        assert_eq!(Estimate::Finite(12).to_string(), "12");
        assert_eq!(Estimate::Unknown.to_string(), "unknown");
    }
}
