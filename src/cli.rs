//! # Command-Line Interface Module
//!
//! Clap derive definitions for the `supergenre` binary.
//!
//! ## Commands
//!
//! - `run`: Ingest a catalog export and build every layer
//! - `ingest`: Load a catalog export without clustering
//! - `cluster`: Rebuild similarity, super-genres and playlists from the stored catalog
//! - `partition`: Recompute playlists only
//! - `super-genres`: List super-genres with their mean features
//! - `playlists`: List playlists with centroids
//!
//! ## Examples
//!
//! ```bash
//! supergenre run --catalog export.json
//! supergenre --playlist-limit 50 cluster
//! supergenre playlists --json
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Shell types supported for completion generation
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    /// Bash shell
    Bash,
    /// Zsh shell
    Zsh,
    /// Fish shell
    Fish,
    /// PowerShell
    PowerShell,
    /// Elvish shell
    Elvish,
}

/// Main application arguments structure.
///
/// Global flags override the values from `config.json`.
#[derive(Parser, Debug)]
#[command(name = "supergenre")]
#[command(about = "Supergenre: genre taxonomy and bounded playlists from a music catalog")]
#[command(version)]
pub struct Args {
    /// Graph database file (defaults to the data directory)
    #[arg(long, global = true, env = "SUPERGENRE_DB", value_hint = clap::ValueHint::FilePath)]
    pub db: Option<PathBuf>,

    /// Pipeline config file (JSON)
    #[arg(long, global = true, value_hint = clap::ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Target playlist size; super-genres this large get partitioned
    #[arg(long, global = true)]
    pub playlist_limit: Option<usize>,

    /// Minimum distinct tracks for a community to stay a super-genre
    #[arg(long, global = true)]
    pub min_support: Option<usize>,

    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Enumeration of all available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Ingest a catalog export and build the full taxonomy
    ///
    /// Wipes the graph, loads tracks, albums, artists and genres, then runs
    /// similarity, community detection, super-genre aggregation and playlist
    /// partitioning in order.
    Run {
        /// Catalog export (JSON with tracks, audio_features, albums, artists)
        #[arg(long, value_hint = clap::ValueHint::FilePath)]
        catalog: PathBuf,
    },

    /// Load a catalog export into a fresh graph without clustering
    Ingest {
        /// Catalog export (JSON with tracks, audio_features, albums, artists)
        #[arg(long, value_hint = clap::ValueHint::FilePath)]
        catalog: PathBuf,
    },

    /// Rebuild similarity, super-genres and playlists from the stored catalog
    Cluster,

    /// Recompute playlists from the stored super-genres
    Partition,

    /// List super-genres with track counts and mean energy/valence
    SuperGenres,

    /// List playlists with their centroids
    Playlists {
        /// Print JSON including track ids
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completions
    ///
    /// Usage: supergenre completion bash > ~/.local/share/bash-completion/completions/supergenre
    Completion {
        /// Shell to generate completions for
        shell: Shell,
    },
}
