//! # Pipeline
//!
//! Runs the stages in order against one [`GraphStore`]:
//!
//! ```text
//! ingest → similarity → community → aggregate → partition
//! ```
//!
//! Each stage reads what the previous one committed and writes its own output
//! in a single transaction, so a failure leaves the graph at the last
//! completed stage. Later stages can be re-run on their own with
//! [`recluster`] and [`partition`].

use crate::catalog::{self, CatalogSource};
use crate::community::{self, Communities};
use crate::config::PipelineConfig;
use crate::db::GraphStore;
use crate::error::PipelineError;
use crate::kmeans::KMeansConfig;
use crate::model::{Catalog, Playlist};
use crate::playlist;
use crate::similarity::{self, SimilarityGraph};
use crate::supergenre::{self, SuperGenreLayer};
use anyhow::{Context, Result};
use log::{debug, info, warn};
use serde::Serialize;

/// What a run produced.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub tracks: usize,
    pub skipped_tracks: usize,
    pub genres: usize,
    pub similarities: usize,
    pub communities: usize,
    pub modularity: f64,
    pub super_genres: usize,
    pub noise_genres: usize,
    pub playlists: usize,
}

/// Full run: wipe the graph, ingest the catalog and rebuild every layer.
///
/// # Errors
///
/// Fails if ingestion exhausts its retries or any store write fails.
pub fn run(
    store: &mut GraphStore,
    source: &dyn CatalogSource,
    config: &PipelineConfig,
) -> Result<RunSummary> {
    config.validate()?;
    let catalog = ingest(store, source, config)?;
    let mut summary = recluster(store, config)?;
    summary.skipped_tracks = catalog.skipped_tracks.len();
    Ok(summary)
}

/// Fetch a fresh catalog and swap it in for the stored graph.
///
/// The store is only touched once the whole catalog has been fetched, so a
/// failed fetch leaves the previous graph in place.
///
/// # Errors
///
/// Fails if the catalog cannot be fetched or stored.
pub fn ingest(
    store: &mut GraphStore,
    source: &dyn CatalogSource,
    config: &PipelineConfig,
) -> Result<Catalog> {
    let catalog = catalog::ingest(source, config).context("Catalog ingestion failed")?;
    store.replace_catalog(&catalog)?;
    debug!("Catalog stored");
    Ok(catalog)
}

/// Rebuild similarity, super-genres and playlists from the stored catalog.
///
/// # Errors
///
/// Fails on store errors or an invalid config.
pub fn recluster(store: &mut GraphStore, config: &PipelineConfig) -> Result<RunSummary> {
    config.validate()?;

    let graph = build_similarity(store)?;
    let communities = detect_communities(store, config)?;
    let layer = build_super_genres(store, &communities, config)?;
    let playlists = partition(store, config)?;

    let summary = RunSummary {
        tracks: store.counts()?.tracks,
        skipped_tracks: 0,
        genres: graph.node_count(),
        similarities: graph.edges.len(),
        communities: communities.count(),
        modularity: communities.modularity,
        super_genres: layer.super_genres.len(),
        noise_genres: layer.noise_genres(),
        playlists: playlists.len(),
    };
    info!(
        "Run complete: {} genres, {} similarity edges, {} communities, {} super-genres, {} playlists",
        summary.genres, summary.similarities, summary.communities, summary.super_genres, summary.playlists
    );
    Ok(summary)
}

/// Score genre pairs by shared artists and store the edges.
///
/// # Errors
///
/// Fails on store errors.
pub fn build_similarity(store: &mut GraphStore) -> Result<SimilarityGraph> {
    let genre_artists = store.genre_artists()?;
    let graph = similarity::compute(&genre_artists);
    store.replace_similarities(&graph)?;
    info!(
        "Similarity: {} genres, {} weighted edges",
        graph.node_count(),
        graph.edges.len()
    );
    Ok(graph)
}

/// Louvain over the stored similarity graph.
///
/// # Errors
///
/// Fails on store errors.
pub fn detect_communities(store: &GraphStore, config: &PipelineConfig) -> Result<Communities> {
    let graph = store.similarity_graph()?;
    let communities = community::detect(&graph, &config.louvain);
    info!(
        "Community detection: {} communities over {} levels, modularity {:.4}",
        communities.count(),
        communities.levels,
        communities.modularity
    );
    Ok(communities)
}

/// Filter communities by support and store the super-genre layer.
///
/// # Errors
///
/// Fails on store errors.
pub fn build_super_genres(
    store: &mut GraphStore,
    communities: &Communities,
    config: &PipelineConfig,
) -> Result<SuperGenreLayer> {
    let genre_tracks = store.genre_tracks()?;
    let features = store.track_features()?;
    let layer = supergenre::aggregate(communities, &genre_tracks, &features, config.min_support);
    store.replace_super_genres(&layer)?;
    info!(
        "Super-genres: {} stored, {} genres folded into noise",
        layer.super_genres.len(),
        layer.noise_genres()
    );
    Ok(layer)
}

/// Recompute every playlist from the stored super-genre layer.
///
/// Super-genres are handled in ascending id order. One that turns out empty
/// is skipped with a warning.
///
/// # Errors
///
/// Fails on store errors or an invalid playlist limit.
pub fn partition(store: &mut GraphStore, config: &PipelineConfig) -> Result<Vec<Playlist>> {
    let limit = config.playlist_limit;
    let kmeans = KMeansConfig {
        seed: config.kmeans_seed,
        max_iterations: config.kmeans_max_iterations,
    };

    let mut playlists = Vec::new();
    for (super_genre_id, track_count) in store.super_genre_track_counts()? {
        if !playlist::is_eligible(track_count, limit) {
            continue;
        }
        let tracks = store.super_genre_tracks(super_genre_id)?;
        match playlist::partition_super_genre(super_genre_id, &tracks, limit, &kmeans) {
            Ok(mut partitioned) => playlists.append(&mut partitioned),
            Err(err @ PipelineError::EmptyInput { .. }) => {
                warn!("Skipping super-genre {super_genre_id}: {err}");
            }
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("Partitioning super-genre {super_genre_id} failed"))
            }
        }
    }

    store.replace_playlists(&playlists)?;
    info!("Partition: {} playlists", playlists.len());
    Ok(playlists)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{JsonCatalog, PlaylistItem, TrackFeatures, TrackPage};
    use crate::model::{Album, AudioFeatures, Artist};
    use crate::retry::RetryPolicy;

    /// A catalog that never answers.
    struct Offline;

    impl CatalogSource for Offline {
        fn playlist_tracks(&self, _: Option<&str>, _: usize) -> Result<TrackPage, PipelineError> {
            Err(PipelineError::fetch("playlist_tracks", "connection refused"))
        }

        fn audio_features(
            &self,
            _: &[String],
        ) -> Result<Vec<Option<TrackFeatures>>, PipelineError> {
            Err(PipelineError::fetch("audio_features", "connection refused"))
        }

        fn albums(&self, _: &[String]) -> Result<Vec<Option<Album>>, PipelineError> {
            Err(PipelineError::fetch("albums", "connection refused"))
        }

        fn artists(&self, _: &[String]) -> Result<Vec<Option<Artist>>, PipelineError> {
            Err(PipelineError::fetch("artists", "connection refused"))
        }
    }

    fn catalog(tracks_per_genre: usize) -> JsonCatalog {
        let mut source = JsonCatalog {
            artists: vec![
                Artist {
                    id: "a1".into(),
                    name: "Mellow".into(),
                    genres: vec!["lofi".into(), "chillhop".into()],
                    ..Default::default()
                },
                Artist {
                    id: "a2".into(),
                    name: "Heavy".into(),
                    genres: vec!["metal".into()],
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        for (artist, base) in [("a1", 0.2), ("a2", 0.8)] {
            for i in 0..tracks_per_genre {
                let id = format!("{artist}-t{i:03}");
                #[allow(clippy::cast_precision_loss)]
                let offset = i as f64 * 0.001;
                source.tracks.push(PlaylistItem {
                    id: Some(id.clone()),
                    name: id.clone(),
                    artists: vec![artist.into()],
                    ..Default::default()
                });
                source.audio_features.push(TrackFeatures {
                    id,
                    features: AudioFeatures {
                        energy: base + offset,
                        valence: base - offset,
                        ..Default::default()
                    },
                });
            }
        }
        source
    }

    fn config(limit: usize, min_support: usize) -> PipelineConfig {
        PipelineConfig {
            playlist_limit: limit,
            min_support,
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn test_run_builds_every_layer() {
        let mut store = GraphStore::open_in_memory().unwrap();
        let summary = run(&mut store, &catalog(30), &config(20, 10)).unwrap();

        assert_eq!(summary.tracks, 60);
        assert_eq!(summary.genres, 3);
        assert_eq!(summary.similarities, 1);
        assert_eq!(summary.communities, 2);
        assert_eq!(summary.super_genres, 2);
        assert_eq!(summary.noise_genres, 0);
        // 30 tracks per super-genre at limit 20 → 2 playlists each.
        assert_eq!(summary.playlists, 4);
        assert_eq!(store.counts().unwrap().playlists, 4);
    }

    #[test]
    fn test_small_communities_fold_into_noise() {
        let mut store = GraphStore::open_in_memory().unwrap();
        let summary = run(&mut store, &catalog(5), &config(100, 10)).unwrap();

        assert_eq!(summary.super_genres, 1);
        assert_eq!(summary.noise_genres, 3);
        assert_eq!(summary.playlists, 0);
        let assignments = store.genre_assignments().unwrap();
        assert!(assignments.values().all(|&id| id == -1));
    }

    #[test]
    fn test_partition_is_idempotent() {
        let mut store = GraphStore::open_in_memory().unwrap();
        let config = config(20, 10);
        run(&mut store, &catalog(30), &config).unwrap();

        let first = store.playlists().unwrap();
        partition(&mut store, &config).unwrap();
        assert_eq!(store.playlists().unwrap(), first);
    }

    #[test]
    fn test_recluster_matches_full_run() {
        let mut store = GraphStore::open_in_memory().unwrap();
        let config = config(20, 10);
        let full = run(&mut store, &catalog(30), &config).unwrap();
        let again = recluster(&mut store, &config).unwrap();
        assert_eq!(again.playlists, full.playlists);
        assert_eq!(again.super_genres, full.super_genres);
    }

    #[test]
    fn test_invalid_config_is_rejected_before_writing() {
        let mut store = GraphStore::open_in_memory().unwrap();
        let bad = config(0, 10);
        assert!(run(&mut store, &catalog(3), &bad).is_err());
        assert_eq!(store.counts().unwrap().tracks, 0);
    }

    #[test]
    fn test_failed_fetch_keeps_previous_graph() {
        let mut store = GraphStore::open_in_memory().unwrap();
        let config = PipelineConfig {
            retry: RetryPolicy::immediate(2),
            ..config(20, 10)
        };
        run(&mut store, &catalog(30), &config).unwrap();
        let counts = store.counts().unwrap();
        let assignments = store.genre_assignments().unwrap();
        let playlists = store.playlists().unwrap();

        let err = run(&mut store, &Offline, &config).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::RetriesExhausted { attempts: 2, .. })
        ));
        assert_eq!(store.counts().unwrap(), counts);
        assert_eq!(store.genre_assignments().unwrap(), assignments);
        assert_eq!(store.playlists().unwrap(), playlists);
    }
}
