//! # Catalog Ingestion Module
//!
//! Pulls a playlist's tracks, their audio features, albums and artists out of a
//! [`CatalogSource`] and turns them into typed entities ready for the graph store.
//!
//! ## Pagination
//!
//! The playlist listing is cursor based. Ingestion fetches a page, consumes it,
//! and only then looks at the `next` cursor; the loop ends on the first page
//! without one. Id lookups are batched by the configured page sizes, and the
//! last batch is allowed to be short.
//!
//! ## Failures
//!
//! Every catalog call runs under the configured [`RetryPolicy`]. Tracks the
//! catalog has no audio features for are skipped and reported, never fatal.

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::model::{Album, Artist, AudioFeatures, Catalog, Track};
use crate::retry::RetryPolicy;
use anyhow::Context;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs;
use std::path::Path;

/// A playlist entry as the catalog lists it. `id` is absent for local files.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaylistItem {
    pub id: Option<String>,
    pub name: String,
    pub album: Option<String>,
    pub artists: Vec<String>,
    pub duration_ms: u64,
    pub popularity: u32,
}

/// Audio features keyed by the track they describe.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackFeatures {
    pub id: String,
    #[serde(flatten)]
    pub features: AudioFeatures,
}

/// One page of the playlist listing.
#[derive(Debug, Default, Clone)]
pub struct TrackPage {
    pub items: Vec<PlaylistItem>,
    /// Cursor for the following page, `None` on the last one.
    pub next: Option<String>,
}

/// The external music catalog.
///
/// Batch lookups return one slot per requested id; `None` marks an id the
/// catalog does not know.
pub trait CatalogSource {
    /// # Errors
    ///
    /// [`PipelineError::ExternalFetch`] on transport or API failure.
    fn playlist_tracks(&self, cursor: Option<&str>, limit: usize)
        -> Result<TrackPage, PipelineError>;

    /// # Errors
    ///
    /// [`PipelineError::ExternalFetch`] on transport or API failure.
    fn audio_features(&self, ids: &[String]) -> Result<Vec<Option<TrackFeatures>>, PipelineError>;

    /// # Errors
    ///
    /// [`PipelineError::ExternalFetch`] on transport or API failure.
    fn albums(&self, ids: &[String]) -> Result<Vec<Option<Album>>, PipelineError>;

    /// # Errors
    ///
    /// [`PipelineError::ExternalFetch`] on transport or API failure.
    fn artists(&self, ids: &[String]) -> Result<Vec<Option<Artist>>, PipelineError>;
}

/// Offline catalog backed by a JSON export.
///
/// The cursor is the stringified offset of the next page.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JsonCatalog {
    pub tracks: Vec<PlaylistItem>,
    pub audio_features: Vec<TrackFeatures>,
    pub albums: Vec<Album>,
    pub artists: Vec<Artist>,
}

impl JsonCatalog {
    /// # Errors
    ///
    /// Fails if the file cannot be read or is not a catalog export.
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog export {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Malformed catalog export {}", path.display()))
    }
}

impl CatalogSource for JsonCatalog {
    fn playlist_tracks(
        &self,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<TrackPage, PipelineError> {
        let offset = match cursor {
            None => 0,
            Some(raw) => raw
                .parse::<usize>()
                .map_err(|_| PipelineError::fetch("playlist_tracks", format!("bad cursor `{raw}`")))?,
        };
        let start = offset.min(self.tracks.len());
        let end = start.saturating_add(limit.max(1)).min(self.tracks.len());
        Ok(TrackPage {
            items: self.tracks[start..end].to_vec(),
            next: (end < self.tracks.len()).then(|| end.to_string()),
        })
    }

    fn audio_features(&self, ids: &[String]) -> Result<Vec<Option<TrackFeatures>>, PipelineError> {
        Ok(ids
            .iter()
            .map(|id| self.audio_features.iter().find(|f| &f.id == id).cloned())
            .collect())
    }

    fn albums(&self, ids: &[String]) -> Result<Vec<Option<Album>>, PipelineError> {
        Ok(ids
            .iter()
            .map(|id| self.albums.iter().find(|a| &a.id == id).cloned())
            .collect())
    }

    fn artists(&self, ids: &[String]) -> Result<Vec<Option<Artist>>, PipelineError> {
        Ok(ids
            .iter()
            .map(|id| self.artists.iter().find(|a| &a.id == id).cloned())
            .collect())
    }
}

/// Fetch the whole catalog for one run.
///
/// # Errors
///
/// Propagates [`PipelineError::RetriesExhausted`] (or any non-retryable
/// error) from the catalog source. Missing features are not errors.
pub fn ingest(source: &dyn CatalogSource, config: &PipelineConfig) -> Result<Catalog, PipelineError> {
    let policy = &config.retry;

    let items = fetch_playlist(source, policy, config.track_page_size)?;
    info!("Fetched {} playlist entries", items.len());

    let (mut tracks, skipped_tracks) = attach_features(source, policy, items, config.feature_page_size)?;

    let album_ids: BTreeSet<String> = tracks.iter().filter_map(|t| t.album_id.clone()).collect();
    let albums = fetch_batched(&album_ids, config.album_page_size, |batch| {
        policy.run("albums", || source.albums(batch))
    })?;

    let artist_ids: BTreeSet<String> = tracks
        .iter()
        .flat_map(|t| t.artist_ids.iter().cloned())
        .collect();
    let artists = fetch_batched(&artist_ids, config.artist_page_size, |batch| {
        policy.run("artists", || source.artists(batch))
    })?;

    // Edges may only point at entities the catalog actually returned.
    let known_albums: HashSet<&str> = albums.iter().map(|a| a.id.as_str()).collect();
    let known_artists: HashSet<&str> = artists.iter().map(|a| a.id.as_str()).collect();
    for track in &mut tracks {
        if track
            .album_id
            .as_deref()
            .is_some_and(|id| !known_albums.contains(id))
        {
            debug!("Album of track {} not found in catalog", track.id);
            track.album_id = None;
        }
        track.artist_ids.retain(|id| known_artists.contains(id.as_str()));
    }

    info!(
        "Ingested {} tracks, {} albums, {} artists ({} tracks skipped)",
        tracks.len(),
        albums.len(),
        artists.len(),
        skipped_tracks.len()
    );

    Ok(Catalog {
        tracks,
        albums,
        artists,
        skipped_tracks,
    })
}

/// Walk the playlist pages, keeping the first occurrence of every track id.
fn fetch_playlist(
    source: &dyn CatalogSource,
    policy: &RetryPolicy,
    page_size: usize,
) -> Result<Vec<PlaylistItem>, PipelineError> {
    let mut items = Vec::new();
    let mut seen = HashSet::new();
    let mut cursor: Option<String> = None;

    loop {
        let page = policy.run("playlist_tracks", || {
            source.playlist_tracks(cursor.as_deref(), page_size)
        })?;
        debug!("Playlist page with {} entries", page.items.len());

        for item in page.items {
            let Some(id) = item.id.clone() else {
                debug!("Skipping local track `{}`", item.name);
                continue;
            };
            if item.artists.is_empty() {
                debug!("Skipping track {id} without artists");
                continue;
            }
            if seen.insert(id) {
                items.push(item);
            }
        }

        match page.next {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    Ok(items)
}

/// Join playlist entries with their audio features. Entries without features
/// are returned separately by id.
fn attach_features(
    source: &dyn CatalogSource,
    policy: &RetryPolicy,
    items: Vec<PlaylistItem>,
    page_size: usize,
) -> Result<(Vec<Track>, Vec<String>), PipelineError> {
    let ids: Vec<String> = items.iter().filter_map(|item| item.id.clone()).collect();

    let mut features: HashMap<String, AudioFeatures> = HashMap::with_capacity(ids.len());
    for batch in ids.chunks(page_size.max(1)) {
        let found = policy.run("audio_features", || source.audio_features(batch))?;
        features.extend(found.into_iter().flatten().map(|f| (f.id, f.features)));
    }

    let mut tracks = Vec::with_capacity(items.len());
    let mut skipped = Vec::new();
    for item in items {
        let Some(id) = item.id else { continue };
        match features.remove(&id) {
            Some(features) => tracks.push(Track {
                id,
                name: item.name,
                album_id: item.album,
                artist_ids: item.artists,
                duration_ms: item.duration_ms,
                popularity: item.popularity,
                features,
            }),
            None => {
                warn!("{}; skipping", PipelineError::MissingFeature(id.clone()));
                skipped.push(id);
            }
        }
    }

    Ok((tracks, skipped))
}

/// Look ids up in batches of `page_size`, dropping the ones the catalog
/// does not know.
fn fetch_batched<T>(
    ids: &BTreeSet<String>,
    page_size: usize,
    mut fetch: impl FnMut(&[String]) -> Result<Vec<Option<T>>, PipelineError>,
) -> Result<Vec<T>, PipelineError> {
    let ids: Vec<String> = ids.iter().cloned().collect();
    let mut found = Vec::with_capacity(ids.len());
    for batch in ids.chunks(page_size.max(1)) {
        found.extend(fetch(batch)?.into_iter().flatten());
    }
    Ok(found)
}
