//! Node ranking for placement decisions.
//!
//! Qualifying nodes are ordered by how many more instances they can take:
//! - **Pack** (best-fit): fill the tightest node first, keep large nodes free
//! - **Spread**: prefer the roomiest node, spreading load across the cluster

use serde::{Deserialize, Serialize};

use podgrid_resources::NodeInfo;

/// Ordering applied to qualifying nodes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankingPolicy {
    #[default]
    Pack,
    Spread,
}

/// Ranked placement result for a single node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeScore {
    pub name: String,
    /// Deployable count on this node.
    pub capacity: usize,
    /// Higher = placed earlier. Range: 0.0..=100.0.
    pub score: f64,
}

/// Score a node with the given deployable count.
pub fn score_node(info: &NodeInfo, largest: usize, policy: RankingPolicy) -> NodeScore {
    let fill = if largest > 0 {
        info.capacity as f64 / largest as f64
    } else {
        0.0
    };
    let score = match policy {
        RankingPolicy::Pack => (1.0 - fill) * 100.0,
        RankingPolicy::Spread => fill * 100.0,
    };
    NodeScore {
        name: info.name.clone(),
        capacity: info.capacity,
        score,
    }
}

/// Sort `nodes` best first and return their scores in the same order.
///
/// Ties are broken by node name so plans are deterministic.
pub fn rank_nodes(nodes: &mut [NodeInfo], policy: RankingPolicy) -> Vec<NodeScore> {
    let largest = nodes.iter().map(|n| n.capacity).max().unwrap_or(0);

    nodes.sort_by(|a, b| {
        let sa = score_node(a, largest, policy).score;
        let sb = score_node(b, largest, policy).score;
        sb.partial_cmp(&sa)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.name.cmp(&b.name))
    });

    nodes
        .iter()
        .map(|n| score_node(n, largest, policy))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(name: &str, capacity: usize) -> NodeInfo {
        NodeInfo {
            name: name.to_string(),
            capacity,
            ..Default::default()
        }
    }

    #[test]
    fn pack_prefers_tightest_node() {
        let mut nodes = vec![node("n1", 8), node("n2", 2), node("n3", 5)];

        let scores = rank_nodes(&mut nodes, RankingPolicy::Pack);

        let order: Vec<_> = nodes.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(order, vec!["n2", "n3", "n1"]);
        assert!(scores[0].score >= scores[1].score);
        assert!(scores[1].score >= scores[2].score);
    }

    #[test]
    fn spread_prefers_roomiest_node() {
        let mut nodes = vec![node("n1", 8), node("n2", 2), node("n3", 5)];

        rank_nodes(&mut nodes, RankingPolicy::Spread);

        assert_eq!(nodes[0].name, "n1");
        assert_eq!(nodes[2].name, "n2");
    }

    #[test]
    fn ties_break_by_name() {
        let mut nodes = vec![node("b", 3), node("a", 3), node("c", 3)];

        rank_nodes(&mut nodes, RankingPolicy::Pack);

        let order: Vec<_> = nodes.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn scores_stay_in_range() {
        let largest = 10;
        for capacity in [0, 1, 5, 10] {
            for policy in [RankingPolicy::Pack, RankingPolicy::Spread] {
                let s = score_node(&node("n", capacity), largest, policy);
                assert!((0.0..=100.0).contains(&s.score));
            }
        }
    }

    #[test]
    fn empty_input_ranks_nothing() {
        let mut nodes: Vec<NodeInfo> = Vec::new();
        assert!(rank_nodes(&mut nodes, RankingPolicy::Pack).is_empty());
    }
}
