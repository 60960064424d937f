//! # Configuration Module
//!
//! Data directory setup and pipeline tuning parameters.
//!
//! ## Data Storage
//!
//! The graph database and the optional config file live in the
//! platform-standard data directory:
//! - Linux: `~/.local/share/supergenre/`
//! - macOS: `~/Library/Application Support/supergenre/`
//! - Windows: `%APPDATA%\supergenre\`
//!
//! `config.json` is optional; any field it leaves out keeps its default.

use crate::community::LouvainConfig;
use crate::error::PipelineError;
use crate::retry::RetryPolicy;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Returns the platform-appropriate data directory, creating it if needed.
///
/// # Errors
///
/// Fails if the system data directory cannot be determined or the
/// `supergenre` subdirectory cannot be created.
pub fn get_data_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir().ok_or_else(|| {
        anyhow::anyhow!(
            "Could not determine system data directory. Pass --db explicitly on this platform."
        )
    })?;

    let app_dir = data_dir.join("supergenre");
    fs::create_dir_all(&app_dir).with_context(|| {
        format!(
            "Failed to create data directory at {}. Please check file permissions.",
            app_dir.display()
        )
    })?;

    Ok(app_dir)
}

/// Default location of the graph database.
///
/// # Errors
///
/// See [`get_data_dir`].
pub fn get_db_path() -> Result<PathBuf> {
    Ok(get_data_dir()?.join("graph.db"))
}

/// Default location of the optional config file.
///
/// # Errors
///
/// See [`get_data_dir`].
pub fn get_config_path() -> Result<PathBuf> {
    Ok(get_data_dir()?.join("config.json"))
}

/// Tuning parameters for one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Super-genres with at least this many tracks get partitioned into
    /// playlists of roughly this size.
    pub playlist_limit: usize,
    /// Communities reaching fewer distinct tracks are folded into the noise
    /// super-genre.
    pub min_support: usize,
    pub track_page_size: usize,
    pub feature_page_size: usize,
    pub album_page_size: usize,
    pub artist_page_size: usize,
    pub kmeans_seed: u64,
    pub kmeans_max_iterations: usize,
    pub louvain: LouvainConfig,
    pub retry: RetryPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            playlist_limit: 100,
            min_support: 10,
            track_page_size: 100,
            feature_page_size: 100,
            album_page_size: 20,
            artist_page_size: 50,
            kmeans_seed: 0,
            kmeans_max_iterations: 300,
            louvain: LouvainConfig::default(),
            retry: RetryPolicy::default(),
        }
    }
}

impl PipelineConfig {
    /// Read a JSON config file. A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Fails on unreadable or malformed files and on invalid values.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("Malformed config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] for a zero playlist limit or
    /// a zero page size.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.playlist_limit == 0 {
            return Err(PipelineError::InvalidConfig(
                "playlist_limit must be at least 1".into(),
            ));
        }
        let pages = [
            ("track_page_size", self.track_page_size),
            ("feature_page_size", self.feature_page_size),
            ("album_page_size", self.album_page_size),
            ("artist_page_size", self.artist_page_size),
        ];
        if let Some((name, _)) = pages.iter().find(|(_, size)| *size == 0) {
            return Err(PipelineError::InvalidConfig(format!(
                "{name} must be at least 1"
            )));
        }
        Ok(())
    }
}

/// Configuration for runtime behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Path to the graph database file
    pub db_path: PathBuf,
    pub pipeline: PipelineConfig,
}

impl RuntimeConfig {
    /// Resolve paths and settings. Explicit arguments win over the defaults.
    ///
    /// # Errors
    ///
    /// Fails when the data directory is unusable or the config file is invalid.
    pub fn resolve(db_path: Option<PathBuf>, config_path: Option<PathBuf>) -> Result<Self> {
        let db_path = match db_path {
            Some(path) => path,
            None => get_db_path()?,
        };
        let config_path = match config_path {
            Some(path) => path,
            None => get_config_path()?,
        };
        Ok(Self {
            db_path,
            pipeline: PipelineConfig::load(&config_path)?,
        })
    }
}
