//! Super-genre aggregation.
//!
//! Turns raw community ids into the persisted super-genre layer:
//!
//! 1. Count the distinct tracks each community reaches through
//!    Track → Artist → Genre. Communities below the minimum support are folded
//!    into the noise super-genre (`-1`).
//! 2. One super-genre per surviving id, noise included when it has tracks.
//! 3. Genre → super-genre links, and Track → super-genre links as the
//!    deduplicated transitive closure.
//! 4. Mean energy and valence over each super-genre's distinct tracks.
//!
//! The layer is recomputed from scratch every run.

use crate::community::Communities;
use crate::model::{SuperGenre, NOISE_COMMUNITY};
use log::{debug, warn};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Everything the store needs to materialize the super-genre layer.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SuperGenreLayer {
    /// Ordered by id, so noise comes first when present.
    pub super_genres: Vec<SuperGenre>,
    pub genre_assignments: BTreeMap<String, i64>,
    /// Distinct `(track id, super-genre id)` pairs.
    pub track_links: Vec<(String, i64)>,
}

impl SuperGenreLayer {
    /// Genres that ended up in the noise super-genre.
    #[must_use]
    pub fn noise_genres(&self) -> usize {
        self.genre_assignments
            .values()
            .filter(|&&id| id == NOISE_COMMUNITY)
            .count()
    }

    #[must_use]
    pub fn get(&self, id: i64) -> Option<&SuperGenre> {
        self.super_genres.iter().find(|s| s.id == id)
    }
}

/// Build the super-genre layer.
///
/// `genre_tracks` maps each genre to the distinct tracks reaching it and
/// `features` maps track ids to `(energy, valence)`.
#[must_use]
pub fn aggregate(
    communities: &Communities,
    genre_tracks: &BTreeMap<String, BTreeSet<String>>,
    features: &HashMap<String, (f64, f64)>,
    min_support: usize,
) -> SuperGenreLayer {
    let empty = BTreeSet::new();
    let tracks_of = |genre: &str| genre_tracks.get(genre).unwrap_or(&empty);

    let mut reach: BTreeMap<i64, BTreeSet<&str>> = BTreeMap::new();
    for (genre, community) in communities.iter() {
        reach
            .entry(community)
            .or_default()
            .extend(tracks_of(genre).iter().map(String::as_str));
    }

    let surviving: BTreeSet<i64> = reach
        .iter()
        .filter(|(_, tracks)| tracks.len() >= min_support)
        .map(|(&community, _)| community)
        .collect();
    debug!(
        "{} of {} communities reach at least {min_support} tracks",
        surviving.len(),
        reach.len()
    );

    let mut genre_assignments = BTreeMap::new();
    let mut members: BTreeMap<i64, BTreeSet<&str>> = BTreeMap::new();
    for (genre, community) in communities.iter() {
        let id = if surviving.contains(&community) {
            community
        } else {
            NOISE_COMMUNITY
        };
        genre_assignments.insert(genre.to_string(), id);
        members
            .entry(id)
            .or_default()
            .extend(tracks_of(genre).iter().map(String::as_str));
    }

    let mut super_genres = Vec::with_capacity(members.len());
    let mut track_links = Vec::new();
    let mut dropped = BTreeSet::new();
    for (&id, tracks) in &members {
        let linked: Vec<(&str, (f64, f64))> = tracks
            .iter()
            .filter_map(|&track| features.get(track).map(|&point| (track, point)))
            .collect();
        if linked.is_empty() {
            warn!("Super-genre {id} has no tracks; dropping it");
            dropped.insert(id);
            continue;
        }

        #[allow(clippy::cast_precision_loss)]
        let n = linked.len() as f64;
        let energy = linked.iter().map(|(_, (e, _))| e).sum::<f64>() / n;
        let valence = linked.iter().map(|(_, (_, v))| v).sum::<f64>() / n;

        super_genres.push(SuperGenre {
            id,
            energy,
            valence,
            track_count: linked.len(),
        });
        track_links.extend(linked.iter().map(|(track, _)| ((*track).to_string(), id)));
    }

    if !dropped.is_empty() {
        genre_assignments.retain(|_, id| !dropped.contains(id));
    }

    SuperGenreLayer {
        super_genres,
        genre_assignments,
        track_links,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn communities(entries: &[(&str, i64)]) -> Communities {
        let mut entries = entries.to_vec();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        Communities {
            genres: entries.iter().map(|(g, _)| (*g).to_string()).collect(),
            membership: entries.iter().map(|&(_, c)| c).collect(),
            levels: 1,
            modularity: 0.0,
        }
    }

    fn reach(entries: &[(&str, &[&str])]) -> BTreeMap<String, BTreeSet<String>> {
        entries
            .iter()
            .map(|(g, tracks)| {
                (
                    (*g).to_string(),
                    tracks.iter().map(|t| (*t).to_string()).collect(),
                )
            })
            .collect()
    }

    fn features(entries: &[(&str, f64, f64)]) -> HashMap<String, (f64, f64)> {
        entries
            .iter()
            .map(|&(t, e, v)| (t.to_string(), (e, v)))
            .collect()
    }

    #[test]
    fn test_mean_features() {
        let layer = aggregate(
            &communities(&[("lofi", 0)]),
            &reach(&[("lofi", &["t1", "t2", "t3"])]),
            &features(&[("t1", 0.1, 0.2), ("t2", 0.3, 0.4), ("t3", 0.5, 0.6)]),
            1,
        );
        let super_genre = layer.get(0).unwrap();
        assert_eq!(super_genre.track_count, 3);
        assert!((super_genre.valence - 0.4).abs() < 1e-12);
        assert!((super_genre.energy - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_low_support_communities_become_noise() {
        let layer = aggregate(
            &communities(&[("jazz", 0), ("lofi", 0), ("metal", 1), ("polka", 2)]),
            &reach(&[
                ("jazz", &["t1", "t2"]),
                ("lofi", &["t2", "t3"]),
                ("metal", &["t4"]),
                ("polka", &["t5"]),
            ]),
            &features(&[
                ("t1", 0.1, 0.1),
                ("t2", 0.2, 0.2),
                ("t3", 0.3, 0.3),
                ("t4", 0.4, 0.4),
                ("t5", 0.5, 0.5),
            ]),
            3,
        );

        assert_eq!(layer.genre_assignments["jazz"], 0);
        assert_eq!(layer.genre_assignments["lofi"], 0);
        assert_eq!(layer.genre_assignments["metal"], NOISE_COMMUNITY);
        assert_eq!(layer.genre_assignments["polka"], NOISE_COMMUNITY);
        assert_eq!(layer.noise_genres(), 2);

        let ids: Vec<i64> = layer.super_genres.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![NOISE_COMMUNITY, 0]);
        assert_eq!(layer.get(NOISE_COMMUNITY).unwrap().track_count, 2);
        assert_eq!(layer.get(0).unwrap().track_count, 3);
    }

    #[test]
    fn test_track_links_are_deduplicated() {
        let layer = aggregate(
            &communities(&[("jazz", 0), ("lofi", 0)]),
            &reach(&[("jazz", &["t1", "t2"]), ("lofi", &["t1", "t2"])]),
            &features(&[("t1", 0.0, 0.0), ("t2", 1.0, 1.0)]),
            1,
        );
        assert_eq!(
            layer.track_links,
            vec![("t1".to_string(), 0), ("t2".to_string(), 0)]
        );
    }

    #[test]
    fn test_every_genre_assigned_exactly_once() {
        let input = communities(&[("a", 0), ("b", 1), ("c", 1), ("d", 2)]);
        let layer = aggregate(
            &input,
            &reach(&[("a", &["t1"]), ("b", &["t2", "t3"]), ("c", &["t3"]), ("d", &["t4"])]),
            &features(&[("t1", 0.0, 0.0), ("t2", 0.0, 0.0), ("t3", 0.0, 0.0), ("t4", 0.0, 0.0)]),
            2,
        );
        assert_eq!(layer.genre_assignments.len(), 4);
        assert_eq!(layer.genre_assignments["b"], 1);
        assert_eq!(layer.genre_assignments["c"], 1);
        assert_eq!(layer.genre_assignments["a"], NOISE_COMMUNITY);
        assert_eq!(layer.genre_assignments["d"], NOISE_COMMUNITY);
    }

    #[test]
    fn test_super_genre_without_tracks_is_dropped() {
        let layer = aggregate(
            &communities(&[("orphan", 0)]),
            &BTreeMap::new(),
            &HashMap::new(),
            0,
        );
        assert!(layer.super_genres.is_empty());
        assert!(layer.genre_assignments.is_empty());
        assert!(layer.track_links.is_empty());
    }

    #[test]
    fn test_no_noise_super_genre_when_everything_survives() {
        let layer = aggregate(
            &communities(&[("jazz", 0)]),
            &reach(&[("jazz", &["t1"])]),
            &features(&[("t1", 0.5, 0.5)]),
            1,
        );
        assert!(layer.get(NOISE_COMMUNITY).is_none());
        assert_eq!(layer.noise_genres(), 0);
    }
}
