//! # Graph Store
//!
//! Property graph kept in SQLite: one table per node type and one per edge
//! type. Uniqueness constraints are the primary keys.
//!
//! | Nodes         | Edges                                   |
//! |---------------|-----------------------------------------|
//! | `track`       | `has_artist` (Track → Artist)           |
//! | `album`       | `in_album` (Track → Album)              |
//! | `artist`      | `has_genre` (Artist → Genre)            |
//! | `genre`       | `genre_similarity` (Genre <-> Genre)    |
//! | `super_genre` | `part_of` (Genre → SuperGenre)          |
//! | `playlist`    | `has_super_genre` (Track → SuperGenre)  |
//! |               | `in_playlist` (Track → Playlist)        |
//!
//! Every write that replaces a stage's output runs in one transaction: the
//! stage's previous rows are deleted and the new ones inserted, or nothing
//! changes at all.

use crate::model::{Catalog, Playlist, SuperGenre, TrackPoint};
use crate::similarity::{SimilarityEdge, SimilarityGraph};
use crate::supergenre::SuperGenreLayer;
use anyhow::{Context, Result};
use log::{debug, trace};
use rusqlite::{params, Connection, Transaction};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS track (
        id               TEXT    PRIMARY KEY,
        name             TEXT    NOT NULL,
        duration_ms      INTEGER NOT NULL,
        popularity       INTEGER NOT NULL,
        danceability     REAL    NOT NULL,
        energy           REAL    NOT NULL,
        valence          REAL    NOT NULL,
        tempo            REAL    NOT NULL,
        acousticness     REAL    NOT NULL,
        instrumentalness REAL    NOT NULL,
        liveness         REAL    NOT NULL,
        loudness         REAL    NOT NULL,
        speechiness      REAL    NOT NULL
    );
    CREATE TABLE IF NOT EXISTS album (
        id           TEXT    PRIMARY KEY,
        name         TEXT    NOT NULL,
        release_date TEXT,
        total_tracks INTEGER NOT NULL,
        label        TEXT,
        popularity   INTEGER NOT NULL
    );
    CREATE TABLE IF NOT EXISTS artist (
        id         TEXT    PRIMARY KEY,
        name       TEXT    NOT NULL,
        popularity INTEGER NOT NULL,
        followers  INTEGER NOT NULL
    );
    CREATE TABLE IF NOT EXISTS genre (
        name TEXT PRIMARY KEY
    );
    CREATE TABLE IF NOT EXISTS super_genre (
        id          INTEGER PRIMARY KEY,
        energy      REAL    NOT NULL,
        valence     REAL    NOT NULL,
        track_count INTEGER NOT NULL
    );
    CREATE TABLE IF NOT EXISTS playlist (
        id             TEXT    PRIMARY KEY,
        super_genre_id INTEGER NOT NULL,
        label          INTEGER NOT NULL,
        energy         REAL    NOT NULL,
        valence        REAL    NOT NULL
    );
    CREATE TABLE IF NOT EXISTS has_artist (
        track_id  TEXT NOT NULL,
        artist_id TEXT NOT NULL,
        PRIMARY KEY (track_id, artist_id)
    );
    CREATE TABLE IF NOT EXISTS in_album (
        track_id TEXT PRIMARY KEY,
        album_id TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS has_genre (
        artist_id TEXT NOT NULL,
        genre     TEXT NOT NULL,
        PRIMARY KEY (artist_id, genre)
    );
    CREATE TABLE IF NOT EXISTS genre_similarity (
        genre_a TEXT NOT NULL,
        genre_b TEXT NOT NULL,
        score   REAL NOT NULL,
        PRIMARY KEY (genre_a, genre_b)
    );
    CREATE TABLE IF NOT EXISTS part_of (
        genre          TEXT    PRIMARY KEY,
        super_genre_id INTEGER NOT NULL
    );
    CREATE TABLE IF NOT EXISTS has_super_genre (
        track_id       TEXT    NOT NULL,
        super_genre_id INTEGER NOT NULL,
        PRIMARY KEY (track_id, super_genre_id)
    );
    CREATE TABLE IF NOT EXISTS in_playlist (
        track_id    TEXT NOT NULL,
        playlist_id TEXT NOT NULL,
        PRIMARY KEY (track_id, playlist_id)
    );
    CREATE INDEX IF NOT EXISTS idx_has_artist_artist ON has_artist(artist_id);
    CREATE INDEX IF NOT EXISTS idx_has_genre_genre ON has_genre(genre);
    CREATE INDEX IF NOT EXISTS idx_has_super_genre_id ON has_super_genre(super_genre_id);
    CREATE INDEX IF NOT EXISTS idx_in_playlist_playlist ON in_playlist(playlist_id);
";

const TABLES: [&str; 13] = [
    "in_playlist",
    "has_super_genre",
    "part_of",
    "genre_similarity",
    "has_genre",
    "in_album",
    "has_artist",
    "playlist",
    "super_genre",
    "genre",
    "artist",
    "album",
    "track",
];

/// Node counts per type, for summaries.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GraphCounts {
    pub tracks: usize,
    pub albums: usize,
    pub artists: usize,
    pub genres: usize,
    pub similarities: usize,
    pub super_genres: usize,
    pub playlists: usize,
}

/// Handle to the graph database. Every stage gets it passed explicitly.
#[derive(Debug)]
pub struct GraphStore {
    conn: Connection,
}

impl GraphStore {
    /// Open (or create) the database at `path` and make sure the schema exists.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be opened or the schema cannot be created.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Graph database connection refused. Location: {}", path.display()))?;
        let store = Self { conn };
        store.ensure_schema()?;
        Ok(store)
    }

    /// # Errors
    ///
    /// Fails if SQLite cannot allocate the database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory graph database")?;
        let store = Self { conn };
        store.ensure_schema()?;
        Ok(store)
    }

    /// # Errors
    ///
    /// Fails on invalid SQL or a read-only database.
    pub fn ensure_schema(&self) -> Result<()> {
        self.conn
            .execute_batch(SCHEMA)
            .context("Failed to create graph schema")
    }

    /// Swap the stored catalog for `catalog`.
    ///
    /// Every table is dropped and recreated, constraints and derived layers
    /// alike, and the catalog is inserted, all in one transaction. On failure
    /// the previous graph is left untouched.
    ///
    /// # Errors
    ///
    /// Fails on any constraint violation or lost connection.
    pub fn replace_catalog(&mut self, catalog: &Catalog) -> Result<()> {
        let tx = self.conn.transaction()?;
        for table in TABLES {
            tx.execute_batch(&format!("DROP TABLE IF EXISTS {table}"))
                .with_context(|| format!("Failed to drop table `{table}`"))?;
        }
        tx.execute_batch(SCHEMA).context("Failed to recreate graph schema")?;
        insert_catalog(&tx, catalog)?;
        tx.commit().context("Committing catalog replacement failed")?;
        debug!(
            "Replaced catalog: {} tracks, {} albums, {} artists",
            catalog.tracks.len(),
            catalog.albums.len(),
            catalog.artists.len()
        );
        Ok(())
    }

    /// Genre → ids of the artists carrying that label. Every genre appears,
    /// even one no artist is linked to anymore.
    ///
    /// # Errors
    ///
    /// Fails on query errors.
    pub fn genre_artists(&self) -> Result<BTreeMap<String, BTreeSet<String>>> {
        let mut stmt = self.conn.prepare(
            "SELECT g.name, hg.artist_id FROM genre g
             LEFT JOIN has_genre hg ON hg.genre = g.name
             ORDER BY g.name",
        )?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?)))
            .context("Cannot query genre/artist adjacency")?;

        let mut adjacency: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for row in rows {
            let (genre, artist) = row.context("Queried genre row unwrap failed")?;
            let artists = adjacency.entry(genre).or_default();
            if let Some(artist) = artist {
                artists.insert(artist);
            }
        }
        Ok(adjacency)
    }

    /// Genre → distinct tracks reachable through Track → Artist → Genre.
    ///
    /// # Errors
    ///
    /// Fails on query errors.
    pub fn genre_tracks(&self) -> Result<BTreeMap<String, BTreeSet<String>>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT hg.genre, ha.track_id FROM has_genre hg
             JOIN has_artist ha ON ha.artist_id = hg.artist_id",
        )?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
            .context("Cannot query genre/track reachability")?;

        let mut reach: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for row in rows {
            let (genre, track) = row.context("Queried genre track unwrap failed")?;
            reach.entry(genre).or_default().insert(track);
        }
        Ok(reach)
    }

    /// Track id → (energy, valence).
    ///
    /// # Errors
    ///
    /// Fails on query errors.
    pub fn track_features(&self) -> Result<HashMap<String, (f64, f64)>> {
        let mut stmt = self.conn.prepare("SELECT id, energy, valence FROM track")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, (row.get(1)?, row.get(2)?))))
            .context("Cannot query track features")?;
        rows.collect::<rusqlite::Result<_>>()
            .context("Queried track features unwrap failed")
    }

    /// Replace the materialized similarity graph.
    ///
    /// # Errors
    ///
    /// Fails on write errors; the previous graph stays in place then.
    pub fn replace_similarities(&mut self, graph: &SimilarityGraph) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM genre_similarity", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO genre_similarity (genre_a, genre_b, score) VALUES (?1, ?2, ?3)",
            )?;
            for edge in &graph.edges {
                stmt.execute(params![graph.genres[edge.a], graph.genres[edge.b], edge.score])
                    .with_context(|| {
                        format!(
                            "Failed to store similarity {} <-> {}",
                            graph.genres[edge.a], graph.genres[edge.b]
                        )
                    })?;
            }
        }
        tx.commit().context("Committing similarity graph failed")?;
        debug!("Stored {} similarity edges", graph.edges.len());
        Ok(())
    }

    /// Read the similarity graph back, with every genre as a node.
    ///
    /// # Errors
    ///
    /// Fails on query errors.
    pub fn similarity_graph(&self) -> Result<SimilarityGraph> {
        let mut stmt = self.conn.prepare("SELECT name FROM genre ORDER BY name")?;
        let genres: Vec<String> = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<_>>()
            .context("Cannot query genres")?;

        let index: HashMap<&str, usize> = genres
            .iter()
            .enumerate()
            .map(|(i, g)| (g.as_str(), i))
            .collect();

        let mut stmt = self
            .conn
            .prepare("SELECT genre_a, genre_b, score FROM genre_similarity")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, f64>(2)?))
            })
            .context("Cannot query similarity edges")?;

        let mut edges = Vec::new();
        for row in rows {
            let (a, b, score) = row?;
            match (index.get(a.as_str()), index.get(b.as_str())) {
                (Some(&i), Some(&j)) if i != j => edges.push(SimilarityEdge {
                    a: i.min(j),
                    b: i.max(j),
                    score,
                }),
                _ => trace!("Ignoring similarity edge {a} <-> {b}"),
            }
        }
        edges.sort_by_key(|e| (e.a, e.b));

        Ok(SimilarityGraph { genres, edges })
    }

    /// Replace the whole super-genre layer. Playlists hang off super-genres,
    /// so they go too.
    ///
    /// # Errors
    ///
    /// Fails on write errors; the previous layer stays in place then.
    pub fn replace_super_genres(&mut self, layer: &SuperGenreLayer) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute_batch(
            "DELETE FROM in_playlist;
             DELETE FROM playlist;
             DELETE FROM has_super_genre;
             DELETE FROM part_of;
             DELETE FROM super_genre;",
        )?;
        {
            let mut insert_super_genre = tx.prepare(
                "INSERT INTO super_genre (id, energy, valence, track_count) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for super_genre in &layer.super_genres {
                insert_super_genre
                    .execute(params![
                        super_genre.id,
                        super_genre.energy,
                        super_genre.valence,
                        i64::try_from(super_genre.track_count).unwrap_or(i64::MAX),
                    ])
                    .with_context(|| format!("Failed to store super-genre {}", super_genre.id))?;
            }

            let mut insert_part_of =
                tx.prepare("INSERT INTO part_of (genre, super_genre_id) VALUES (?1, ?2)")?;
            for (genre, id) in &layer.genre_assignments {
                insert_part_of.execute(params![genre, id])?;
            }

            let mut insert_link = tx.prepare(
                "INSERT OR IGNORE INTO has_super_genre (track_id, super_genre_id) VALUES (?1, ?2)",
            )?;
            for (track_id, id) in &layer.track_links {
                insert_link.execute(params![track_id, id])?;
            }
        }
        tx.commit().context("Committing super-genre layer failed")?;
        debug!(
            "Stored {} super-genres, {} track links",
            layer.super_genres.len(),
            layer.track_links.len()
        );
        Ok(())
    }

    /// Genre → super-genre id.
    ///
    /// # Errors
    ///
    /// Fails on query errors.
    pub fn genre_assignments(&self) -> Result<BTreeMap<String, i64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT genre, super_genre_id FROM part_of ORDER BY genre")?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        rows.collect::<rusqlite::Result<_>>()
            .context("Cannot query genre assignments")
    }

    /// # Errors
    ///
    /// Fails on query errors.
    pub fn super_genres(&self) -> Result<Vec<SuperGenre>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, energy, valence, track_count FROM super_genre ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            Ok(SuperGenre {
                id: row.get(0)?,
                energy: row.get(1)?,
                valence: row.get(2)?,
                track_count: to_count(row.get(3)?),
            })
        })?;
        rows.collect::<rusqlite::Result<_>>()
            .context("Cannot query super-genres")
    }

    /// Distinct linked tracks per super-genre, ordered by id.
    ///
    /// # Errors
    ///
    /// Fails on query errors.
    pub fn super_genre_track_counts(&self) -> Result<Vec<(i64, usize)>> {
        let mut stmt = self.conn.prepare(
            "SELECT s.id, COUNT(DISTINCT h.track_id) FROM super_genre s
             LEFT JOIN has_super_genre h ON h.super_genre_id = s.id
             GROUP BY s.id ORDER BY s.id",
        )?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, to_count(row.get(1)?))))?;
        rows.collect::<rusqlite::Result<_>>()
            .context("Cannot count super-genre tracks")
    }

    /// Tracks linked to one super-genre with their feature point, by track id.
    ///
    /// # Errors
    ///
    /// Fails on query errors.
    pub fn super_genre_tracks(&self, super_genre_id: i64) -> Result<Vec<TrackPoint>> {
        let mut stmt = self.conn.prepare(
            "SELECT t.id, t.energy, t.valence FROM has_super_genre h
             JOIN track t ON t.id = h.track_id
             WHERE h.super_genre_id = ?1
             ORDER BY t.id",
        )?;
        let rows = stmt.query_map([super_genre_id], |row| {
            Ok(TrackPoint {
                id: row.get(0)?,
                energy: row.get(1)?,
                valence: row.get(2)?,
            })
        })?;
        rows.collect::<rusqlite::Result<_>>()
            .with_context(|| format!("Cannot query tracks of super-genre {super_genre_id}"))
    }

    /// Delete every playlist and membership, then store `playlists`.
    ///
    /// # Errors
    ///
    /// Fails on write errors; the previous playlists stay in place then.
    pub fn replace_playlists(&mut self, playlists: &[Playlist]) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute_batch("DELETE FROM in_playlist; DELETE FROM playlist;")?;
        {
            let mut insert_playlist = tx.prepare(
                "INSERT INTO playlist (id, super_genre_id, label, energy, valence) VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            let mut insert_member =
                tx.prepare("INSERT INTO in_playlist (track_id, playlist_id) VALUES (?1, ?2)")?;
            for playlist in playlists {
                insert_playlist
                    .execute(params![
                        playlist.id,
                        playlist.super_genre_id,
                        i64::try_from(playlist.label).unwrap_or(i64::MAX),
                        playlist.energy,
                        playlist.valence,
                    ])
                    .with_context(|| format!("Failed to store playlist {}", playlist.id))?;
                for track_id in &playlist.track_ids {
                    insert_member.execute(params![track_id, playlist.id])?;
                }
            }
        }
        tx.commit().context("Committing playlists failed")?;
        debug!("Stored {} playlists", playlists.len());
        Ok(())
    }

    /// All playlists with their member tracks.
    ///
    /// # Errors
    ///
    /// Fails on query errors.
    pub fn playlists(&self) -> Result<Vec<Playlist>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, super_genre_id, label, energy, valence FROM playlist
             ORDER BY super_genre_id, label",
        )?;
        let mut playlists: Vec<Playlist> = stmt
            .query_map([], |row| {
                Ok(Playlist {
                    id: row.get(0)?,
                    super_genre_id: row.get(1)?,
                    label: to_count(row.get(2)?),
                    energy: row.get(3)?,
                    valence: row.get(4)?,
                    track_ids: Vec::new(),
                })
            })?
            .collect::<rusqlite::Result<_>>()
            .context("Cannot query playlists")?;

        let mut stmt = self
            .conn
            .prepare("SELECT playlist_id, track_id FROM in_playlist ORDER BY playlist_id, track_id")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;
        let mut members: HashMap<String, Vec<String>> = HashMap::new();
        for row in rows {
            let (playlist_id, track_id) = row.context("Queried playlist member unwrap failed")?;
            members.entry(playlist_id).or_default().push(track_id);
        }
        for playlist in &mut playlists {
            playlist.track_ids = members.remove(&playlist.id).unwrap_or_default();
        }
        Ok(playlists)
    }

    /// # Errors
    ///
    /// Fails on query errors.
    pub fn counts(&self) -> Result<GraphCounts> {
        let count = |table: &str| -> Result<usize> {
            let n: i64 = self
                .conn
                .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
                .with_context(|| format!("Could not count `{table}` rows"))?;
            Ok(to_count(n))
        };
        Ok(GraphCounts {
            tracks: count("track")?,
            albums: count("album")?,
            artists: count("artist")?,
            genres: count("genre")?,
            similarities: count("genre_similarity")?,
            super_genres: count("super_genre")?,
            playlists: count("playlist")?,
        })
    }
}

/// Upsert every node and edge of `catalog` inside `tx`.
fn insert_catalog(tx: &Transaction<'_>, catalog: &Catalog) -> Result<()> {
    let mut insert_track = tx.prepare(
        "INSERT OR REPLACE INTO track (id, name, duration_ms, popularity, danceability, energy,
            valence, tempo, acousticness, instrumentalness, liveness, loudness, speechiness)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
    )?;
    let mut insert_has_artist =
        tx.prepare("INSERT OR IGNORE INTO has_artist (track_id, artist_id) VALUES (?1, ?2)")?;
    let mut insert_in_album =
        tx.prepare("INSERT OR REPLACE INTO in_album (track_id, album_id) VALUES (?1, ?2)")?;

    for track in &catalog.tracks {
        let f = &track.features;
        insert_track
            .execute(params![
                track.id,
                track.name,
                i64::try_from(track.duration_ms).unwrap_or(i64::MAX),
                track.popularity,
                f.danceability,
                f.energy,
                f.valence,
                f.tempo,
                f.acousticness,
                f.instrumentalness,
                f.liveness,
                f.loudness,
                f.speechiness,
            ])
            .with_context(|| format!("Failed to upsert track {}", track.id))?;
        for artist_id in &track.artist_ids {
            insert_has_artist.execute(params![track.id, artist_id])?;
        }
        if let Some(album_id) = &track.album_id {
            insert_in_album.execute(params![track.id, album_id])?;
        }
    }

    let mut insert_album = tx.prepare(
        "INSERT OR REPLACE INTO album (id, name, release_date, total_tracks, label, popularity)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;
    for album in &catalog.albums {
        insert_album
            .execute(params![
                album.id,
                album.name,
                album.release_date,
                album.total_tracks,
                album.label,
                album.popularity,
            ])
            .with_context(|| format!("Failed to upsert album {}", album.id))?;
    }

    let mut insert_artist = tx.prepare(
        "INSERT OR REPLACE INTO artist (id, name, popularity, followers) VALUES (?1, ?2, ?3, ?4)",
    )?;
    let mut insert_genre = tx.prepare("INSERT OR IGNORE INTO genre (name) VALUES (?1)")?;
    let mut insert_has_genre =
        tx.prepare("INSERT OR IGNORE INTO has_genre (artist_id, genre) VALUES (?1, ?2)")?;
    for artist in &catalog.artists {
        insert_artist
            .execute(params![
                artist.id,
                artist.name,
                artist.popularity,
                i64::try_from(artist.followers).unwrap_or(i64::MAX),
            ])
            .with_context(|| format!("Failed to upsert artist {}", artist.id))?;
        for genre in &artist.genres {
            insert_genre.execute([genre])?;
            insert_has_genre.execute(params![artist.id, genre])?;
        }
    }
    Ok(())
}

fn to_count(value: i64) -> usize {
    usize::try_from(value).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Album, Artist, AudioFeatures, Track};

    fn track(id: &str, artists: &[&str], energy: f64, valence: f64) -> Track {
        Track {
            id: id.to_string(),
            name: format!("Track {id}"),
            album_id: Some("alb".to_string()),
            artist_ids: artists.iter().map(|a| (*a).to_string()).collect(),
            duration_ms: 200_000,
            popularity: 10,
            features: AudioFeatures {
                energy,
                valence,
                ..Default::default()
            },
        }
    }

    fn artist(id: &str, genres: &[&str]) -> Artist {
        Artist {
            id: id.to_string(),
            name: id.to_uppercase(),
            genres: genres.iter().map(|g| (*g).to_string()).collect(),
            ..Default::default()
        }
    }

    fn sample() -> Catalog {
        Catalog {
            tracks: vec![
                track("t1", &["a1"], 0.2, 0.3),
                track("t2", &["a1", "a2"], 0.4, 0.5),
                track("t3", &["a2"], 0.6, 0.7),
            ],
            albums: vec![Album {
                id: "alb".into(),
                name: "Album".into(),
                ..Default::default()
            }],
            artists: vec![artist("a1", &["jazz", "lofi"]), artist("a2", &["lofi"])],
            skipped_tracks: Vec::new(),
        }
    }

    fn loaded() -> GraphStore {
        let mut store = GraphStore::open_in_memory().unwrap();
        store.replace_catalog(&sample()).unwrap();
        store
    }

    #[test]
    fn test_replace_catalog_creates_nodes() {
        let store = loaded();
        let counts = store.counts().unwrap();
        assert_eq!(counts.tracks, 3);
        assert_eq!(counts.albums, 1);
        assert_eq!(counts.artists, 2);
        assert_eq!(counts.genres, 2);
    }

    #[test]
    fn test_replace_discards_previous_catalog() {
        let mut store = loaded();
        let mut smaller = sample();
        smaller.tracks.truncate(1);
        smaller.artists.truncate(1);
        store.replace_catalog(&smaller).unwrap();

        let counts = store.counts().unwrap();
        assert_eq!(counts.tracks, 1);
        assert_eq!(counts.artists, 1);
        assert!(store.genre_tracks().unwrap()["lofi"].contains("t1"));
    }

    #[test]
    fn test_genre_artist_adjacency() {
        let adjacency = loaded().genre_artists().unwrap();
        assert_eq!(adjacency["jazz"].iter().collect::<Vec<_>>(), vec!["a1"]);
        assert_eq!(adjacency["lofi"].iter().collect::<Vec<_>>(), vec!["a1", "a2"]);
    }

    #[test]
    fn test_genre_tracks_are_distinct() {
        let reach = loaded().genre_tracks().unwrap();
        // t2 reaches lofi through both artists but is counted once.
        assert_eq!(reach["lofi"].len(), 3);
        assert_eq!(reach["jazz"].len(), 2);
    }

    #[test]
    fn test_empty_catalog_clears_everything() {
        let mut store = loaded();
        store
            .replace_similarities(&SimilarityGraph {
                genres: vec!["jazz".into(), "lofi".into()],
                edges: vec![SimilarityEdge { a: 0, b: 1, score: 0.5 }],
            })
            .unwrap();
        store.replace_catalog(&Catalog::default()).unwrap();
        assert_eq!(store.counts().unwrap(), GraphCounts::default());
    }

    #[test]
    fn test_similarity_round_trip_replaces_previous() {
        let mut store = loaded();
        let graph = SimilarityGraph {
            genres: vec!["jazz".into(), "lofi".into()],
            edges: vec![SimilarityEdge { a: 0, b: 1, score: 0.5 }],
        };
        store.replace_similarities(&graph).unwrap();
        store.replace_similarities(&graph).unwrap();
        assert_eq!(store.similarity_graph().unwrap(), graph);
        assert_eq!(store.counts().unwrap().similarities, 1);
    }

    #[test]
    fn test_super_genre_layer_and_playlists() {
        let mut store = loaded();
        let layer = SuperGenreLayer {
            super_genres: vec![SuperGenre {
                id: 0,
                energy: 0.4,
                valence: 0.5,
                track_count: 3,
            }],
            genre_assignments: [("jazz".to_string(), 0), ("lofi".to_string(), 0)]
                .into_iter()
                .collect(),
            track_links: vec![
                ("t1".to_string(), 0),
                ("t2".to_string(), 0),
                ("t3".to_string(), 0),
            ],
        };
        store.replace_super_genres(&layer).unwrap();
        assert_eq!(store.super_genre_track_counts().unwrap(), vec![(0, 3)]);
        assert_eq!(store.genre_assignments().unwrap().len(), 2);

        let tracks = store.super_genre_tracks(0).unwrap();
        let ids: Vec<&str> = tracks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["t1", "t2", "t3"]);

        let playlist = Playlist {
            id: "0-0".into(),
            super_genre_id: 0,
            label: 0,
            energy: 0.4,
            valence: 0.5,
            track_ids: vec!["t1".into(), "t2".into()],
        };
        store.replace_playlists(&[playlist.clone()]).unwrap();
        assert_eq!(store.playlists().unwrap(), vec![playlist]);

        store.replace_playlists(&[]).unwrap();
        assert!(store.playlists().unwrap().is_empty());
        // Super-genres survive a playlist rebuild.
        assert_eq!(store.super_genres().unwrap().len(), 1);
    }

    #[test]
    fn test_replacing_super_genres_drops_playlists() {
        let mut store = loaded();
        store
            .replace_playlists(&[Playlist {
                id: "9-0".into(),
                super_genre_id: 9,
                label: 0,
                energy: 0.0,
                valence: 0.0,
                track_ids: vec!["t1".into()],
            }])
            .unwrap();
        store.replace_super_genres(&SuperGenreLayer::default()).unwrap();
        assert_eq!(store.counts().unwrap().playlists, 0);
    }

    #[test]
    fn test_open_file_database() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("graph.db");
        {
            let mut store = GraphStore::open(&path).unwrap();
            store.replace_catalog(&sample()).unwrap();
        }
        let store = GraphStore::open(&path).unwrap();
        assert_eq!(store.counts().unwrap().tracks, 3);
    }
}
