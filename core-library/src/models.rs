//! Domain models for the catalog and playlist stores
//!
//! Rows map onto these types through `sqlx::FromRow`; nested collections
//! (`Track::artists`, `Playlist::tracks`) are filled by the batch loaders
//! after the primary rows are fetched.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// =============================================================================
// ID Types
// =============================================================================

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
        )]
        #[sqlx(transparent)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
                Ok(Self(Uuid::parse_str(s.trim())?))
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::from_string(s)
            }
        }
    };
}

uuid_id!(
    /// Unique identifier for a track
    TrackId
);
uuid_id!(
    /// Unique identifier for an artist (owned by the artist context)
    ArtistId
);
uuid_id!(
    /// Unique identifier for a playlist
    PlaylistId
);
uuid_id!(
    /// Unique identifier for a user (owned by the auth context)
    UserId
);

/// Parse a boundary identifier, reporting the offending field on failure.
pub(crate) fn parse_id<T>(field: &str, raw: &str) -> crate::error::Result<T>
where
    T: FromStr<Err = uuid::Error>,
{
    raw.parse().map_err(|e| crate::error::LibraryError::InvalidInput {
        field: field.to_string(),
        message: format!("Invalid UUID '{}': {}", raw, e),
    })
}

/// Current time as Unix epoch milliseconds.
pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

// =============================================================================
// Track catalog
// =============================================================================

/// Lifecycle of an uploaded track.
///
/// `uploaded → processing → ready`, or `failed` from any non-ready state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TrackStatus {
    Uploaded,
    Processing,
    Ready,
    Failed,
}

impl TrackStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uploaded => "uploaded",
            Self::Processing => "processing",
            Self::Ready => "ready",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for TrackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrackStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "uploaded" => Ok(Self::Uploaded),
            "processing" => Ok(Self::Processing),
            "ready" => Ok(Self::Ready),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown track status: {}", other)),
        }
    }
}

/// Local projection of an artist record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Artist {
    pub id: ArtistId,
    pub name: String,
}

impl Artist {
    pub fn new(id: ArtistId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Artist name cannot be empty".to_string());
        }
        Ok(())
    }
}

/// Catalog track with its artists
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Track {
    pub id: TrackId,
    pub title: String,
    pub genre: Option<String>,
    /// Empty until transcoding completes
    pub audio_url: Option<String>,
    pub cover_url: Option<String>,
    pub duration_seconds: i64,
    pub status: TrackStatus,
    /// Unix epoch milliseconds
    pub created_at: i64,
    /// Unix epoch milliseconds
    pub updated_at: i64,

    /// Ordered by artist name
    #[sqlx(skip)]
    pub artists: Vec<Artist>,
}

impl Track {
    pub fn is_ready(&self) -> bool {
        self.status == TrackStatus::Ready
    }
}

/// Input for a new catalog track
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTrack {
    pub id: TrackId,
    pub title: String,
    pub genre: Option<String>,
    pub artist_ids: Vec<ArtistId>,
}

impl NewTrack {
    pub fn new(title: impl Into<String>, artist_ids: Vec<ArtistId>) -> Self {
        Self {
            id: TrackId::new(),
            title: title.into(),
            genre: None,
            artist_ids,
        }
    }

    /// Use an identifier assigned upstream (the upload service)
    pub fn with_id(mut self, id: TrackId) -> Self {
        self.id = id;
        self
    }

    pub fn with_genre(mut self, genre: impl Into<String>) -> Self {
        let genre = genre.into();
        self.genre = if genre.trim().is_empty() {
            None
        } else {
            Some(genre)
        };
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("Track title cannot be empty".to_string());
        }
        if self.artist_ids.is_empty() {
            return Err("Track must have at least one artist".to_string());
        }
        Ok(())
    }

    /// Artist ids with duplicates removed, first occurrence wins.
    pub fn distinct_artist_ids(&self) -> Vec<ArtistId> {
        dedup_preserving_order(&self.artist_ids)
    }
}

/// Partial edit of a catalog track. `None` or blank values leave a field as is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackUpdate {
    pub title: Option<String>,
    pub genre: Option<String>,
    /// A non-empty list replaces the artist set
    pub artist_ids: Option<Vec<ArtistId>>,
}

impl TrackUpdate {
    pub fn title(&self) -> Option<&str> {
        non_blank(self.title.as_deref())
    }

    pub fn genre(&self) -> Option<&str> {
        non_blank(self.genre.as_deref())
    }

    pub fn replacement_artists(&self) -> Option<Vec<ArtistId>> {
        self.artist_ids
            .as_ref()
            .filter(|ids| !ids.is_empty())
            .map(|ids| dedup_preserving_order(ids))
    }
}

/// Media produced by the transcoder for the ready transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackMedia {
    pub audio_url: String,
    pub cover_url: Option<String>,
    pub duration_seconds: i64,
}

impl TrackMedia {
    pub fn validate(&self) -> Result<(), String> {
        if self.audio_url.trim().is_empty() {
            return Err("Audio URL cannot be empty".to_string());
        }
        if self.duration_seconds < 0 {
            return Err("Duration cannot be negative".to_string());
        }
        Ok(())
    }
}

// =============================================================================
// Playlists
// =============================================================================

/// Playlist with its ordered track entries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Playlist {
    pub id: PlaylistId,
    pub owner_id: UserId,
    pub name: String,
    pub description: Option<String>,
    pub is_private: bool,
    pub created_at: i64,
    pub updated_at: i64,

    #[sqlx(skip)]
    pub tracks: Vec<PlaylistTrack>,
}

/// One playlist membership row, optionally hydrated with the catalog track
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistTrack {
    pub track_id: TrackId,
    pub position: i64,
    pub added_at: i64,
    /// `None` when the catalog holds no row for `track_id`
    pub track: Option<Track>,
}

/// Requested placement of a track inside a playlist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistTrackEntry {
    pub track_id: TrackId,
    pub position: i64,
}

impl PlaylistTrackEntry {
    pub fn new(track_id: TrackId, position: i64) -> Self {
        Self { track_id, position }
    }
}

/// Positions written for a batch of entries: the supplied one when positive,
/// the index in the input otherwise.
pub fn effective_positions(entries: &[PlaylistTrackEntry]) -> Vec<(TrackId, i64)> {
    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            let position = if entry.position > 0 {
                entry.position
            } else {
                index as i64
            };
            (entry.track_id, position)
        })
        .collect()
}

/// Input for a new playlist
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPlaylist {
    pub id: PlaylistId,
    pub owner_id: UserId,
    pub name: String,
    pub description: Option<String>,
    pub is_private: bool,
    pub tracks: Vec<PlaylistTrackEntry>,
}

impl NewPlaylist {
    pub fn new(owner_id: UserId, name: impl Into<String>) -> Self {
        Self {
            id: PlaylistId::new(),
            owner_id,
            name: name.into(),
            description: None,
            is_private: false,
            tracks: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn private(mut self, is_private: bool) -> Self {
        self.is_private = is_private;
        self
    }

    pub fn with_tracks(mut self, tracks: Vec<PlaylistTrackEntry>) -> Self {
        self.tracks = tracks;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Playlist name cannot be empty".to_string());
        }
        Ok(())
    }
}

/// Partial edit of a playlist
///
/// `tracks: Some(vec![])` clears the playlist; `None` leaves membership alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistUpdate {
    pub id: PlaylistId,
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_private: Option<bool>,
    pub tracks: Option<Vec<PlaylistTrackEntry>>,
}

impl PlaylistUpdate {
    pub fn new(id: PlaylistId) -> Self {
        Self {
            id,
            name: None,
            description: None,
            is_private: None,
            tracks: None,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if matches!(&self.name, Some(name) if name.trim().is_empty()) {
            return Err("Playlist name cannot be empty".to_string());
        }
        Ok(())
    }
}

/// Playlist row with its track count, as listed on a user's library page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct PlaylistSummary {
    pub id: PlaylistId,
    pub owner_id: UserId,
    pub name: String,
    pub description: Option<String>,
    pub is_private: bool,
    pub track_count: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A user following a playlist they do not own
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct PlaylistSubscription {
    pub user_id: UserId,
    pub playlist_id: PlaylistId,
    pub created_at: i64,
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

pub(crate) fn dedup_preserving_order<T: Copy + Eq + std::hash::Hash>(ids: &[T]) -> Vec<T> {
    let mut seen = std::collections::HashSet::with_capacity(ids.len());
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}
