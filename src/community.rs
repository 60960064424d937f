//! Community detection over the genre similarity graph.
//!
//! Greedy modularity optimization in the Louvain style:
//!
//! 1. **Local moving**: every node starts alone. Nodes are visited in index
//!    order and moved to the neighboring community with the largest modularity
//!    gain, until a full sweep moves nothing.
//! 2. **Aggregation**: each community collapses into a super-node whose
//!    self-loop carries the internal weight, and the process repeats.
//!
//! The result is fully deterministic for a given graph: visitation order is
//! fixed, a move needs a strictly positive improvement over staying put, and
//! equal gains go to the lowest community id.

use crate::similarity::SimilarityGraph;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Gains closer than this count as equal.
const GAIN_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LouvainConfig {
    /// Maximum number of aggregation levels.
    pub max_levels: usize,
    /// Maximum local-moving sweeps per level.
    pub max_sweeps: usize,
}

impl Default for LouvainConfig {
    fn default() -> Self {
        Self {
            max_levels: 10,
            max_sweeps: 100,
        }
    }
}

/// Community assignment for every genre of a similarity graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Communities {
    /// Same order as [`SimilarityGraph::genres`].
    pub genres: Vec<String>,
    /// `membership[i]` is the community of `genres[i]`. Ids are contiguous and
    /// numbered by first appearance.
    pub membership: Vec<i64>,
    /// Aggregation levels that improved modularity.
    pub levels: usize,
    pub modularity: f64,
}

impl Communities {
    #[must_use]
    pub fn get(&self, genre: &str) -> Option<i64> {
        self.genres
            .binary_search_by(|g| g.as_str().cmp(genre))
            .ok()
            .map(|index| self.membership[index])
    }

    /// Number of distinct communities.
    #[must_use]
    pub fn count(&self) -> usize {
        self.membership.iter().max().map_or(0, |&max| {
            usize::try_from(max).map_or(0, |max| max + 1)
        })
    }

    /// `(genre, community)` pairs in genre order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> + '_ {
        self.genres
            .iter()
            .map(String::as_str)
            .zip(self.membership.iter().copied())
    }
}

/// Weighted undirected graph in the shape the optimizer works on.
#[derive(Debug, Clone)]
struct WeightedGraph {
    /// Neighbor lists without self-loops, sorted by neighbor.
    adjacency: Vec<Vec<(usize, f64)>>,
    self_loops: Vec<f64>,
    /// Weighted degree; a self-loop counts twice.
    degrees: Vec<f64>,
    /// Sum of all degrees, i.e. twice the total edge weight.
    total: f64,
}

impl WeightedGraph {
    fn from_similarity(graph: &SimilarityGraph) -> Self {
        let adjacency = graph.adjacency();
        let degrees: Vec<f64> = adjacency
            .iter()
            .map(|neighbors| neighbors.iter().map(|&(_, w)| w).sum())
            .collect();
        let total = degrees.iter().sum();
        Self {
            self_loops: vec![0.0; adjacency.len()],
            adjacency,
            degrees,
            total,
        }
    }

    fn len(&self) -> usize {
        self.adjacency.len()
    }
}

/// Run community detection on `graph`.
#[must_use]
pub fn detect(graph: &SimilarityGraph, config: &LouvainConfig) -> Communities {
    let mut current = WeightedGraph::from_similarity(graph);
    let mut membership: Vec<usize> = (0..graph.node_count()).collect();
    let mut levels = 0;

    for level in 0..config.max_levels {
        let (community, improved) = local_moving(&current, config.max_sweeps);
        if !improved {
            break;
        }
        let (next, renumber) = aggregate(&current, &community);
        for slot in &mut membership {
            *slot = renumber[community[*slot]];
        }
        debug!(
            "Louvain level {level}: {} nodes collapsed into {}",
            current.len(),
            next.len()
        );
        current = next;
        levels += 1;
    }

    let membership = relabel(&membership);
    let modularity = modularity(graph, &membership);
    Communities {
        genres: graph.genres.clone(),
        membership,
        levels,
        modularity,
    }
}

/// Modularity of an assignment over the similarity graph.
///
/// `Q = Σ_c [ in_c / m − (tot_c / 2m)² ]`, with `in_c` the weight inside
/// community `c` and `tot_c` the summed degree of its members. An edgeless
/// graph has modularity 0.
#[must_use]
pub fn modularity(graph: &SimilarityGraph, membership: &[i64]) -> f64 {
    let total_weight: f64 = graph.edges.iter().map(|e| e.score).sum();
    if total_weight <= 0.0 {
        return 0.0;
    }

    let mut inside: BTreeMap<i64, f64> = BTreeMap::new();
    let mut degree: BTreeMap<i64, f64> = BTreeMap::new();
    for edge in &graph.edges {
        let (ca, cb) = (membership[edge.a], membership[edge.b]);
        if ca == cb {
            *inside.entry(ca).or_insert(0.0) += edge.score;
        }
        *degree.entry(ca).or_insert(0.0) += edge.score;
        *degree.entry(cb).or_insert(0.0) += edge.score;
    }

    degree
        .iter()
        .map(|(community, &tot)| {
            let internal = inside.get(community).copied().unwrap_or(0.0);
            internal / total_weight - (tot / (2.0 * total_weight)).powi(2)
        })
        .sum()
}

/// One level of local moving. Returns the community of every node and
/// whether any node changed community.
fn local_moving(graph: &WeightedGraph, max_sweeps: usize) -> (Vec<usize>, bool) {
    let n = graph.len();
    let mut community: Vec<usize> = (0..n).collect();
    if graph.total <= 0.0 {
        return (community, false);
    }

    let mut totals = graph.degrees.clone();
    let mut improved = false;

    for _ in 0..max_sweeps {
        let mut moved = false;

        for node in 0..n {
            let current = community[node];
            let degree = graph.degrees[node];

            // Ordered by community id, which fixes the tie-break.
            let mut links: BTreeMap<usize, f64> = BTreeMap::new();
            for &(neighbor, weight) in &graph.adjacency[node] {
                *links.entry(community[neighbor]).or_insert(0.0) += weight;
            }

            totals[current] -= degree;
            let gain = |target: usize, weight: f64| weight - totals[target] * degree / graph.total;

            let mut best = current;
            let mut best_gain = gain(current, links.get(&current).copied().unwrap_or(0.0));
            for (&target, &weight) in &links {
                if target == current {
                    continue;
                }
                let candidate = gain(target, weight);
                if candidate > best_gain + GAIN_EPSILON {
                    best = target;
                    best_gain = candidate;
                }
            }

            totals[best] += degree;
            if best != current {
                community[node] = best;
                moved = true;
                improved = true;
            }
        }

        if !moved {
            break;
        }
    }

    (community, improved)
}

/// Collapse communities into super-nodes. Returns the new graph and the
/// old-community → super-node mapping.
fn aggregate(graph: &WeightedGraph, community: &[usize]) -> (WeightedGraph, Vec<usize>) {
    let mut renumber = vec![usize::MAX; graph.len()];
    let mut count = 0;
    for &c in community {
        if renumber[c] == usize::MAX {
            renumber[c] = count;
            count += 1;
        }
    }

    let mut self_loops = vec![0.0; count];
    let mut degrees = vec![0.0; count];
    let mut between: BTreeMap<(usize, usize), f64> = BTreeMap::new();

    for node in 0..graph.len() {
        let c = renumber[community[node]];
        self_loops[c] += graph.self_loops[node];
        degrees[c] += graph.degrees[node];
        for &(neighbor, weight) in &graph.adjacency[node] {
            if neighbor <= node {
                continue;
            }
            let d = renumber[community[neighbor]];
            if c == d {
                self_loops[c] += weight;
            } else {
                *between.entry((c.min(d), c.max(d))).or_insert(0.0) += weight;
            }
        }
    }

    let mut adjacency = vec![Vec::new(); count];
    for (&(a, b), &weight) in &between {
        adjacency[a].push((b, weight));
        adjacency[b].push((a, weight));
    }
    for neighbors in &mut adjacency {
        neighbors.sort_by_key(|&(n, _)| n);
    }

    (
        WeightedGraph {
            adjacency,
            self_loops,
            degrees,
            total: graph.total,
        },
        renumber,
    )
}

/// Renumber labels by first appearance so ids come out as 0, 1, 2, ...
fn relabel(membership: &[usize]) -> Vec<i64> {
    let mut seen: BTreeMap<usize, i64> = BTreeMap::new();
    membership
        .iter()
        .map(|label| {
            let next = i64::try_from(seen.len()).unwrap_or(i64::MAX);
            *seen.entry(*label).or_insert(next)
        })
        .collect()
}
