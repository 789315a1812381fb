//! # Catalog and Playlist Storage
//!
//! Owns the track catalog and the playlist aggregate of the music-social
//! platform, persisted in SQLite.
//!
//! ## Overview
//!
//! This crate manages:
//! - SQLite schema, migrations and connection pooling
//! - Repositories for tracks, artists and playlists
//! - Ordered, de-duplicated playlist membership with batch track loading
//! - Service-layer operations taking boundary identifiers and pagination
//! - Decoding of upload and transcoding events into catalog changes
//!
//! [`Library`] wires everything together from a [`CoreConfig`].

pub mod db;
pub mod error;
pub mod events;
pub mod models;
pub mod query;
pub mod repositories;
pub mod service;

pub use error::{ErrorKind, LibraryError, Result};

use crate::db::DatabaseConfig;
use crate::repositories::{
    ArtistRepository, SqliteArtistRepository, SqlitePlaylistRepository, SqliteTrackRepository,
};
use crate::service::{PlaylistService, TrackService};
use core_runtime::CoreConfig;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::info;

/// Catalog and playlist services sharing one connection pool
pub struct Library {
    pool: SqlitePool,
    artists: Arc<dyn ArtistRepository>,
    tracks: TrackService,
    playlists: PlaylistService,
}

impl Library {
    /// Validate `config`, open the pool and apply migrations
    pub async fn open(config: &CoreConfig) -> Result<Self> {
        config.validate()?;

        let pool = db::create_pool(DatabaseConfig::from_core_config(config)).await?;
        let library = Self::from_pool(pool, config);

        info!(in_memory = config.is_in_memory(), "Library opened");
        Ok(library)
    }

    /// Build services over an existing, migrated pool
    pub fn from_pool(pool: SqlitePool, config: &CoreConfig) -> Self {
        let artists: Arc<dyn ArtistRepository> =
            Arc::new(SqliteArtistRepository::new(pool.clone()));
        let track_repo = Arc::new(
            SqliteTrackRepository::new(pool.clone())
                .with_default_cover_url(config.default_cover_url.clone()),
        );
        let playlist_repo = Arc::new(SqlitePlaylistRepository::new(pool.clone()));

        let tracks = TrackService::new(track_repo, artists.clone())
            .with_query_timeout(config.query_timeout);
        let playlists = PlaylistService::new(playlist_repo).with_query_timeout(config.query_timeout);

        Self {
            pool,
            artists,
            tracks,
            playlists,
        }
    }

    pub fn tracks(&self) -> &TrackService {
        &self.tracks
    }

    pub fn playlists(&self) -> &PlaylistService {
        &self.playlists
    }

    /// Local projection of artists owned by the artist service
    pub fn artists(&self) -> &Arc<dyn ArtistRepository> {
        &self.artists
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the pool, waiting for checked-out connections to return
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
