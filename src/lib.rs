//! Genre taxonomy and playlist partitioning over a music catalog graph.
//!
//! Core modules:
//! - [`catalog`] - Paginated, retried catalog ingestion
//! - [`db`] - SQLite property graph store
//! - [`similarity`] - Jaccard genre similarity over shared artists
//! - [`community`] - Deterministic Louvain community detection
//! - [`supergenre`] - Support filter and super-genre aggregation
//! - [`playlist`] - k-means partitioning into bounded playlists
//! - [`pipeline`] - Stage orchestration
//!
//! ### Supporting Modules
//!
//! - [`config`] - Data directory and pipeline tuning parameters
//! - [`cli`] - Command-line interface definitions with clap integration
//! - [`completion`] - Shell completion generation
//! - [`error`] - Pipeline error taxonomy
//! - [`kmeans`] - Seeded k-means
//! - [`model`] - Catalog and taxonomy entities
//! - [`retry`] - Bounded exponential backoff
//!
//! ## Quick Start Example
//!
//! ```no_run
//! use supergenre::{catalog::JsonCatalog, config::PipelineConfig, db::GraphStore, pipeline};
//! use std::path::Path;
//!
//! let mut store = GraphStore::open(Path::new("graph.db"))?;
//! let source = JsonCatalog::from_path(Path::new("export.json"))?;
//! let summary = pipeline::run(&mut store, &source, &PipelineConfig::default())?;
//! println!("{} super-genres, {} playlists", summary.super_genres, summary.playlists);
//!
//! for playlist in store.playlists()? {
//!     println!("{}: {} tracks", playlist.id, playlist.track_ids.len());
//! }
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## Stages
//!
//! 1. **Ingest** walks the playlist pages, joins audio features in batches and
//!    resolves albums and artists. Tracks without features are skipped.
//! 2. **Similarity** scores every genre pair sharing an artist by Jaccard index.
//! 3. **Community** runs Louvain on the similarity graph, visiting nodes in
//!    sorted order so the same graph always yields the same partition.
//! 4. **Aggregate** folds communities reaching fewer than `min_support` tracks
//!    into the noise super-genre (`-1`) and averages energy and valence.
//! 5. **Partition** splits every super-genre with at least `playlist_limit`
//!    tracks into `ceil(n / playlist_limit)` playlists by seeded k-means.

pub mod catalog;
pub mod cli;
pub mod community;
pub mod completion;
pub mod config;
pub mod db;
pub mod error;
pub mod kmeans;
pub mod model;
pub mod pipeline;
pub mod playlist;
pub mod retry;
pub mod similarity;
pub mod supergenre;
