//! Playlist partitioning.
//!
//! A super-genre with at least `limit` tracks is split into
//! `k = ceil(n / limit)` playlists by seeded k-means over each track's
//! `(energy, valence)` point. Each playlist's centroid is the mean of its
//! member tracks.

use crate::error::PipelineError;
use crate::kmeans::{self, KMeansConfig, Point};
use crate::model::{playlist_id, Playlist, TrackPoint};
use log::debug;

/// Whether a super-genre with `track_count` tracks gets playlists at all.
#[must_use]
pub const fn is_eligible(track_count: usize, limit: usize) -> bool {
    limit > 0 && track_count >= limit
}

/// Number of playlists for `track_count` tracks.
#[must_use]
pub const fn cluster_count(track_count: usize, limit: usize) -> usize {
    track_count.div_ceil(limit)
}

/// Split one super-genre's tracks into playlists.
///
/// Tracks are expected in a stable order (the store returns them by id), which
/// together with the seed makes the result reproducible. Playlists come back
/// ordered by cluster label and only labels that own tracks produce one.
///
/// # Errors
///
/// [`PipelineError::EmptyInput`] when `tracks` is empty and
/// [`PipelineError::InvalidConfig`] for a zero limit.
pub fn partition_super_genre(
    super_genre_id: i64,
    tracks: &[TrackPoint],
    limit: usize,
    config: &KMeansConfig,
) -> Result<Vec<Playlist>, PipelineError> {
    if tracks.is_empty() {
        return Err(PipelineError::EmptyInput { stage: "partition" });
    }
    if limit == 0 {
        return Err(PipelineError::InvalidConfig(
            "playlist limit must be at least 1".into(),
        ));
    }

    let k = cluster_count(tracks.len(), limit);
    let points: Vec<Point> = tracks.iter().map(|t| [t.energy, t.valence]).collect();
    let fit = kmeans::fit(&points, k, config)?;
    debug!(
        "Super-genre {super_genre_id}: {} tracks into {k} playlists after {} iterations, inertia {:.4}",
        tracks.len(),
        fit.iterations,
        fit.inertia(&points)
    );

    let mut members: Vec<Vec<String>> = vec![Vec::new(); k];
    for (track, &label) in tracks.iter().zip(&fit.labels) {
        members[label].push(track.id.clone());
    }

    Ok(members
        .into_iter()
        .zip(&fit.centroids)
        .enumerate()
        .filter(|(_, (track_ids, _))| !track_ids.is_empty())
        .map(|(label, (track_ids, centroid))| Playlist {
            id: playlist_id(super_genre_id, label),
            super_genre_id,
            label,
            energy: centroid[0],
            valence: centroid[1],
            track_ids,
        })
        .collect())
}
