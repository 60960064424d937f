//! Typed catalog and taxonomy entities.
//!
//! Catalog records are flattened into these structs at the ingestion boundary.
//! Nested sub-objects the catalog hands back (images, external urls, copyrights)
//! never make it past `serde`; unknown fields are simply ignored.

use serde::{Deserialize, Serialize};

/// Community id reserved for genres whose community failed the support filter.
pub const NOISE_COMMUNITY: i64 = -1;

/// Scalar audio features of a track.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioFeatures {
    pub danceability: f64,
    pub energy: f64,
    pub valence: f64,
    pub tempo: f64,
    pub acousticness: f64,
    pub instrumentalness: f64,
    pub liveness: f64,
    pub loudness: f64,
    pub speechiness: f64,
}

/// A track as stored in the graph. Immutable for the duration of a run.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub name: String,
    pub album_id: Option<String>,
    /// Always at least one artist for tracks coming out of ingestion.
    pub artist_ids: Vec<String>,
    pub duration_ms: u64,
    pub popularity: u32,
    pub features: AudioFeatures,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Album {
    pub id: String,
    pub name: String,
    pub release_date: Option<String>,
    pub total_tracks: u32,
    pub label: Option<String>,
    pub popularity: u32,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Artist {
    pub id: String,
    pub name: String,
    /// Raw genre labels as supplied by the catalog.
    pub genres: Vec<String>,
    pub popularity: u32,
    pub followers: u64,
}

/// Everything ingestion produced for one run.
#[derive(Debug, Default, Clone)]
pub struct Catalog {
    pub tracks: Vec<Track>,
    pub albums: Vec<Album>,
    pub artists: Vec<Artist>,
    /// Tracks dropped because the catalog had no audio features for them.
    pub skipped_tracks: Vec<String>,
}

impl Catalog {
    /// Distinct genre labels referenced by at least one artist, sorted.
    #[must_use]
    pub fn genres(&self) -> Vec<String> {
        let mut genres: Vec<String> = self
            .artists
            .iter()
            .flat_map(|artist| artist.genres.iter().cloned())
            .collect();
        genres.sort();
        genres.dedup();
        genres
    }
}

/// A cluster of genres surfaced as one taxonomy node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuperGenre {
    pub id: i64,
    /// Mean energy over all distinct linked tracks.
    pub energy: f64,
    /// Mean valence over all distinct linked tracks.
    pub valence: f64,
    pub track_count: usize,
}

impl SuperGenre {
    #[must_use]
    pub const fn is_noise(&self) -> bool {
        self.id == NOISE_COMMUNITY
    }
}

/// One bounded-size slice of a super-genre.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Playlist {
    pub id: String,
    pub super_genre_id: i64,
    pub label: usize,
    /// Centroid energy.
    pub energy: f64,
    /// Centroid valence.
    pub valence: f64,
    pub track_ids: Vec<String>,
}

/// Playlist key: `{superGenreId}-{clusterLabel}`.
#[must_use]
pub fn playlist_id(super_genre_id: i64, label: usize) -> String {
    format!("{super_genre_id}-{label}")
}

/// A track reduced to the 2-D feature point used for partitioning.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackPoint {
    pub id: String,
    pub energy: f64,
    pub valence: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_playlist_id_format() {
        assert_eq!(playlist_id(7, 0), "7-0");
        assert_eq!(playlist_id(NOISE_COMMUNITY, 2), "-1-2");
    }

    #[test]
    fn test_catalog_genres_are_sorted_and_distinct() {
        let catalog = Catalog {
            artists: vec![
                Artist {
                    id: "a1".into(),
                    genres: vec!["jazz".into(), "lofi".into()],
                    ..Default::default()
                },
                Artist {
                    id: "a2".into(),
                    genres: vec!["lofi".into(), "ambient".into()],
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        assert_eq!(catalog.genres(), vec!["ambient", "jazz", "lofi"]);
    }

    #[test]
    fn test_artist_ignores_nested_catalog_objects() {
        let json = r#"{
            "id": "a1",
            "name": "Someone",
            "genres": ["lofi"],
            "images": [{"url": "http://x"}],
            "external_urls": {"spotify": "http://y"},
            "followers": 12
        }"#;
        let artist: Artist = serde_json::from_str(json).unwrap();
        assert_eq!(artist.genres, vec!["lofi"]);
        assert_eq!(artist.followers, 12);
        assert_eq!(artist.popularity, 0);
    }
}
