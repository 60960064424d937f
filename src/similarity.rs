//! Genre-to-genre similarity from the genre/artist bipartite graph.
//!
//! Two genres are similar in proportion to the artists they share:
//!
//! ```text
//! score(a, b) = |artists(a) ∩ artists(b)| / |artists(a) ∪ artists(b)|
//! ```
//!
//! Candidate pairs come from an artist → genres index, so only pairs that share
//! at least one artist are ever looked at. Pairs with nothing in common get no
//! edge at all, which keeps the graph sparse.

use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Undirected weighted edge between two genres; `a < b` always.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityEdge {
    pub a: usize,
    pub b: usize,
    pub score: f64,
}

/// Weighted similarity graph over genres. Node `i` is `genres[i]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimilarityGraph {
    /// Sorted genre names. Genres without any edge are isolated nodes.
    pub genres: Vec<String>,
    /// Sorted by `(a, b)`.
    pub edges: Vec<SimilarityEdge>,
}

impl SimilarityGraph {
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.genres.len()
    }

    #[must_use]
    pub fn index_of(&self, genre: &str) -> Option<usize> {
        self.genres.binary_search_by(|g| g.as_str().cmp(genre)).ok()
    }

    /// Score between two genres, if they share any artist.
    #[must_use]
    pub fn score(&self, first: &str, second: &str) -> Option<f64> {
        let (i, j) = (self.index_of(first)?, self.index_of(second)?);
        let (a, b) = if i < j { (i, j) } else { (j, i) };
        self.edges
            .binary_search_by(|e| (e.a, e.b).cmp(&(a, b)))
            .ok()
            .map(|pos| self.edges[pos].score)
    }

    /// Adjacency lists, each sorted by neighbor index.
    #[must_use]
    pub fn adjacency(&self) -> Vec<Vec<(usize, f64)>> {
        let mut adjacency = vec![Vec::new(); self.genres.len()];
        for edge in &self.edges {
            adjacency[edge.a].push((edge.b, edge.score));
            adjacency[edge.b].push((edge.a, edge.score));
        }
        for neighbors in &mut adjacency {
            neighbors.sort_by_key(|&(n, _)| n);
        }
        adjacency
    }
}

/// Build the similarity graph from each genre's set of artist ids.
#[must_use]
pub fn compute(genre_artists: &BTreeMap<String, BTreeSet<String>>) -> SimilarityGraph {
    let genres: Vec<String> = genre_artists.keys().cloned().collect();
    let sizes: Vec<usize> = genre_artists.values().map(BTreeSet::len).collect();

    // Genre indices pushed in ascending order, so each list stays sorted.
    let mut genres_by_artist: HashMap<&str, Vec<usize>> = HashMap::new();
    for (index, artists) in genre_artists.values().enumerate() {
        for artist in artists {
            genres_by_artist.entry(artist.as_str()).or_default().push(index);
        }
    }

    let mut shared: HashMap<(usize, usize), usize> = HashMap::new();
    for members in genres_by_artist.values() {
        for (pos, &a) in members.iter().enumerate() {
            for &b in &members[pos + 1..] {
                *shared.entry((a, b)).or_insert(0) += 1;
            }
        }
    }

    let mut edges: Vec<SimilarityEdge> = shared
        .into_iter()
        .map(|((a, b), common)| {
            let union = sizes[a] + sizes[b] - common;
            #[allow(clippy::cast_precision_loss)]
            let score = common as f64 / union as f64;
            SimilarityEdge { a, b, score }
        })
        .collect();
    edges.sort_by_key(|e| (e.a, e.b));

    SimilarityGraph { genres, edges }
}
