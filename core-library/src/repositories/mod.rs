//! # Repository Pattern Implementation
//!
//! Repository traits and their SQLite implementations.
//!
//! ## Architecture
//!
//! - Traits define the interface for each store and are the seam the service
//!   layer mocks in tests
//! - SQLite implementations use sqlx for async database access
//! - Multi-statement writes run inside one `sqlx::Transaction`
//! - Listing takes a [`PageRequest`] that is normalized before use
//!
//! ## Available Repositories
//!
//! - `TrackRepository` - Catalog tracks and their artist credits
//! - `PlaylistRepository` - Playlists, ordered track membership, subscriptions
//! - `ArtistRepository` - Local artist projection used for credits

pub mod artist;
pub mod pagination;
pub mod playlist;
pub mod track;

pub use artist::{ArtistRepository, SqliteArtistRepository};
pub use pagination::{PageRequest, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
pub use playlist::{PlaylistRepository, SqlitePlaylistRepository};
pub use track::{SqliteTrackRepository, TrackRepository};
