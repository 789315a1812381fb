//! Playlist aggregate service

use crate::error::{LibraryError, Result};
use crate::models::{
    parse_id, NewPlaylist, Playlist, PlaylistId, PlaylistSummary, PlaylistTrack,
    PlaylistTrackEntry, PlaylistUpdate, TrackId, UserId,
};
use crate::repositories::{PageRequest, PlaylistRepository};
use crate::service::with_deadline;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument};

/// Track and requested position inside a playlist request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackPlacement {
    pub track_id: String,
    /// Non-positive values fall back to the index in the request
    #[serde(default)]
    pub position: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePlaylistRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub tracks: Vec<TrackPlacement>,
}

/// Partial playlist edit; `tracks: Some(..)` replaces membership wholesale
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdatePlaylistRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_private: Option<bool>,
    #[serde(default)]
    pub tracks: Option<Vec<TrackPlacement>>,
}

fn parse_placements(raw: &[TrackPlacement]) -> Result<Vec<PlaylistTrackEntry>> {
    raw.iter()
        .map(|p| {
            let track_id = parse_id::<TrackId>("tracks", &p.track_id)?;
            Ok(PlaylistTrackEntry::new(track_id, p.position))
        })
        .collect()
}

fn parse_optional_user(raw: Option<&str>) -> Result<Option<UserId>> {
    raw.filter(|id| !id.trim().is_empty())
        .map(|id| parse_id::<UserId>("owner_id", id))
        .transpose()
}

/// Playlist operations at the service boundary
pub struct PlaylistService {
    playlists: Arc<dyn PlaylistRepository>,
    query_timeout: Option<Duration>,
}

impl PlaylistService {
    pub fn new(playlists: Arc<dyn PlaylistRepository>) -> Self {
        Self {
            playlists,
            query_timeout: None,
        }
    }

    pub fn with_query_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.query_timeout = timeout;
        self
    }

    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create_playlist(
        &self,
        owner_id: &str,
        request: CreatePlaylistRequest,
    ) -> Result<Playlist> {
        let owner: UserId = parse_id("owner_id", owner_id)?;
        let mut playlist = NewPlaylist::new(owner, request.name)
            .private(request.is_private)
            .with_tracks(parse_placements(&request.tracks)?);
        if let Some(description) = request.description {
            playlist = playlist.with_description(description);
        }

        let created = with_deadline(
            self.query_timeout,
            "create_playlist",
            self.playlists.create(&playlist),
        )
        .await?;

        info!(playlist_id = %created.id, tracks = created.tracks.len(), "Playlist created");
        Ok(created)
    }

    #[instrument(skip(self))]
    pub async fn get_playlist(&self, id: &str) -> Result<Playlist> {
        let playlist_id: PlaylistId = parse_id("playlist_id", id)?;

        with_deadline(
            self.query_timeout,
            "get_playlist",
            self.playlists.find_by_id(playlist_id),
        )
        .await?
        .ok_or_else(|| LibraryError::not_found("Playlist", playlist_id))
    }

    #[instrument(skip(self))]
    pub async fn list_playlists(
        &self,
        limit: i64,
        offset: i64,
        owner_id: Option<&str>,
    ) -> Result<Vec<Playlist>> {
        let owner = parse_optional_user(owner_id)?;
        let page = PageRequest::new(limit, offset).normalized();

        with_deadline(
            self.query_timeout,
            "list_playlists",
            self.playlists.list(page, owner),
        )
        .await
    }

    /// Playlists the user owns or follows
    #[instrument(skip(self))]
    pub async fn get_user_playlists(
        &self,
        user_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<PlaylistSummary>> {
        let user: UserId = parse_id("user_id", user_id)?;
        let page = PageRequest::new(limit, offset).normalized();

        with_deadline(
            self.query_timeout,
            "get_user_playlists",
            self.playlists.user_playlists(user, page),
        )
        .await
    }

    #[instrument(skip(self, request))]
    pub async fn update_playlist(
        &self,
        id: &str,
        request: UpdatePlaylistRequest,
    ) -> Result<Playlist> {
        let playlist_id: PlaylistId = parse_id("playlist_id", id)?;
        let update = PlaylistUpdate {
            name: request.name,
            description: request.description,
            is_private: request.is_private,
            tracks: request
                .tracks
                .as_deref()
                .map(parse_placements)
                .transpose()?,
            ..PlaylistUpdate::new(playlist_id)
        };

        with_deadline(
            self.query_timeout,
            "update_playlist",
            self.playlists.update(&update),
        )
        .await?;

        self.get_playlist(id).await
    }

    #[instrument(skip(self))]
    pub async fn delete_playlist(&self, id: &str) -> Result<()> {
        let playlist_id: PlaylistId = parse_id("playlist_id", id)?;

        let deleted = with_deadline(
            self.query_timeout,
            "delete_playlist",
            self.playlists.delete(playlist_id),
        )
        .await?;
        if !deleted {
            return Err(LibraryError::not_found("Playlist", playlist_id));
        }

        info!(playlist_id = %playlist_id, "Playlist deleted");
        Ok(())
    }

    /// Add a track, or move it when already present
    #[instrument(skip(self))]
    pub async fn add_track_to_playlist(
        &self,
        playlist_id: &str,
        track_id: &str,
        position: i64,
    ) -> Result<()> {
        let playlist_id: PlaylistId = parse_id("playlist_id", playlist_id)?;
        let track_id: TrackId = parse_id("track_id", track_id)?;

        with_deadline(
            self.query_timeout,
            "add_track_to_playlist",
            self.playlists.add_track(playlist_id, track_id, position),
        )
        .await
    }

    #[instrument(skip(self))]
    pub async fn remove_track_from_playlist(&self, playlist_id: &str, track_id: &str) -> Result<()> {
        let playlist_id: PlaylistId = parse_id("playlist_id", playlist_id)?;
        let track_id: TrackId = parse_id("track_id", track_id)?;

        let removed = with_deadline(
            self.query_timeout,
            "remove_track_from_playlist",
            self.playlists.remove_track(playlist_id, track_id),
        )
        .await?;
        if !removed {
            return Err(LibraryError::not_found(
                "PlaylistTrack",
                format!("{}/{}", playlist_id, track_id),
            ));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn subscribe_user(&self, user_id: &str, playlist_id: &str) -> Result<()> {
        let user: UserId = parse_id("user_id", user_id)?;
        let playlist_id: PlaylistId = parse_id("playlist_id", playlist_id)?;

        with_deadline(
            self.query_timeout,
            "subscribe_user",
            self.playlists.subscribe_user(user, playlist_id),
        )
        .await
    }

    #[instrument(skip(self))]
    pub async fn unsubscribe_user(&self, user_id: &str, playlist_id: &str) -> Result<()> {
        let user: UserId = parse_id("user_id", user_id)?;
        let playlist_id: PlaylistId = parse_id("playlist_id", playlist_id)?;

        let removed = with_deadline(
            self.query_timeout,
            "unsubscribe_user",
            self.playlists.unsubscribe_user(user, playlist_id),
        )
        .await?;
        if !removed {
            return Err(LibraryError::not_found(
                "PlaylistSubscription",
                format!("{}/{}", user, playlist_id),
            ));
        }
        Ok(())
    }

    /// Ordered tracks of an existing playlist
    ///
    /// An unknown playlist is `NotFound` rather than an empty list.
    #[instrument(skip(self))]
    pub async fn get_playlist_tracks(&self, playlist_id: &str) -> Result<Vec<PlaylistTrack>> {
        let playlist_id: PlaylistId = parse_id("playlist_id", playlist_id)?;

        let exists = with_deadline(
            self.query_timeout,
            "playlist_exists",
            self.playlists.exists(playlist_id),
        )
        .await?;
        if !exists {
            return Err(LibraryError::not_found("Playlist", playlist_id));
        }

        with_deadline(
            self.query_timeout,
            "get_playlist_tracks",
            self.playlists.playlist_tracks(playlist_id),
        )
        .await
    }

    #[instrument(skip(self))]
    pub async fn get_playlist_owner(&self, playlist_id: &str) -> Result<UserId> {
        let playlist_id: PlaylistId = parse_id("playlist_id", playlist_id)?;

        with_deadline(
            self.query_timeout,
            "get_playlist_owner",
            self.playlists.owner_of(playlist_id),
        )
        .await?
        .ok_or_else(|| LibraryError::not_found("Playlist", playlist_id))
    }
}
