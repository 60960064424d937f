//! # Supergenre
//!
//! Builds a genre taxonomy and bounded-size playlists from a music catalog
//! export, persisted as a property graph in SQLite.
//!
//! ## Usage
//!
//! ```bash
//! # Full run from a catalog export
//! supergenre run --catalog export.json
//!
//! # Re-cluster with a different playlist size
//! supergenre --playlist-limit 50 cluster
//!
//! # Inspect the results
//! supergenre super-genres
//! supergenre playlists --json
//! ```

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use log::{debug, info};
use supergenre::catalog::JsonCatalog;
use supergenre::config::RuntimeConfig;
use supergenre::db::GraphStore;
use supergenre::pipeline::{self, RunSummary};
use supergenre::{cli, completion};

/// Main entry point.
///
/// Logging is controlled via `RUST_LOG`:
/// - `RUST_LOG=info supergenre run --catalog export.json` - Stage summaries
/// - `RUST_LOG=supergenre::community=debug supergenre cluster` - Module-specific logging
fn main() -> Result<()> {
    env_logger::init();

    let args = cli::Args::parse();

    if let cli::Command::Completion { shell } = args.command {
        let mut cmd = cli::Args::command();
        completion::generate_completions(completion::shell_to_completion_shell(shell), &mut cmd);
        return Ok(());
    }

    let mut runtime = RuntimeConfig::resolve(args.db, args.config)?;
    if let Some(limit) = args.playlist_limit {
        runtime.pipeline.playlist_limit = limit;
    }
    if let Some(min_support) = args.min_support {
        runtime.pipeline.min_support = min_support;
    }
    runtime.pipeline.validate()?;
    debug!("Using graph database at {}", runtime.db_path.display());

    let mut store = GraphStore::open(&runtime.db_path)?;

    match args.command {
        cli::Command::Run { catalog } => {
            info!("Running full pipeline from: {}", catalog.display());
            let source = JsonCatalog::from_path(&catalog)?;
            let summary = pipeline::run(&mut store, &source, &runtime.pipeline)?;
            print_summary(&summary);
        }
        cli::Command::Ingest { catalog } => {
            let source = JsonCatalog::from_path(&catalog)?;
            let ingested = pipeline::ingest(&mut store, &source, &runtime.pipeline)?;
            println!(
                "Ingested {} tracks, {} albums, {} artists, {} genres ({} skipped)",
                ingested.tracks.len(),
                ingested.albums.len(),
                ingested.artists.len(),
                ingested.genres().len(),
                ingested.skipped_tracks.len()
            );
        }
        cli::Command::Cluster => {
            let summary = pipeline::recluster(&mut store, &runtime.pipeline)?;
            print_summary(&summary);
        }
        cli::Command::Partition => {
            let playlists = pipeline::partition(&mut store, &runtime.pipeline)?;
            println!("Stored {} playlists", playlists.len());
        }
        cli::Command::SuperGenres => {
            let assignments = store.genre_assignments()?;
            println!("{:>6} {:>8} {:>8} {:>8}  genres", "id", "tracks", "energy", "valence");
            for super_genre in store.super_genres()? {
                let genres: Vec<&str> = assignments
                    .iter()
                    .filter(|&(_, &id)| id == super_genre.id)
                    .map(|(genre, _)| genre.as_str())
                    .collect();
                let label = if super_genre.is_noise() { " (noise)" } else { "" };
                println!(
                    "{:>6} {:>8} {:>8.3} {:>8.3}  {}{label}",
                    super_genre.id,
                    super_genre.track_count,
                    super_genre.energy,
                    super_genre.valence,
                    genres.join(", ")
                );
            }
        }
        cli::Command::Playlists { json } => {
            let playlists = store.playlists()?;
            if json {
                let rendered = serde_json::to_string_pretty(&playlists)
                    .context("Failed to serialize playlists")?;
                println!("{rendered}");
            } else {
                println!("{:<10} {:>6} {:>8} {:>8}", "playlist", "tracks", "energy", "valence");
                for playlist in &playlists {
                    println!(
                        "{:<10} {:>6} {:>8.3} {:>8.3}",
                        playlist.id,
                        playlist.track_ids.len(),
                        playlist.energy,
                        playlist.valence
                    );
                }
            }
        }
        cli::Command::Completion { .. } => {}
    }

    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!("Tracks:        {} ({} skipped)", summary.tracks, summary.skipped_tracks);
    println!("Genres:        {}", summary.genres);
    println!("Similarities:  {}", summary.similarities);
    println!(
        "Communities:   {} (modularity {:.4})",
        summary.communities, summary.modularity
    );
    println!(
        "Super-genres:  {} ({} noise genres)",
        summary.super_genres, summary.noise_genres
    );
    println!("Playlists:     {}", summary.playlists);
}
