//! Playlist repository trait and implementation
//!
//! A playlist owns an ordered association to catalog tracks
//! (`playlist_tracks`) and a subscription relation to users
//! (`playlist_users`). Track membership never checks the catalog: a track id
//! with no catalog row loads as an entry with `track: None`.
//!
//! Reads go through one batch loader. For any set of playlist ids it issues a
//! single `playlist_tracks LEFT JOIN tracks` query ordered by
//! `(playlist_id, position, added_at, rowid)` and a single artist query for
//! the distinct track ids, so a page of playlists costs three round trips no
//! matter how many tracks it holds.

use crate::error::{LibraryError, Result};
use crate::models::{
    effective_positions, now_millis, NewPlaylist, Playlist, PlaylistId, PlaylistSummary,
    PlaylistTrack, PlaylistTrackEntry, PlaylistUpdate, Track, TrackId, TrackStatus, UserId,
};
use crate::query::{InList, MAX_IN_LIST_PARAMS};
use crate::repositories::artist::artists_for_tracks;
use crate::repositories::PageRequest;
use async_trait::async_trait;
use sqlx::{query, query_as, FromRow, QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use std::collections::HashMap;
use tracing::debug;

const PLAYLIST_COLUMNS: &str =
    "p.id, p.owner_id, p.name, p.description, p.is_private, p.created_at, p.updated_at";

/// Binds per row written to `playlist_tracks`
const MEMBERSHIP_BINDS: usize = 4;

/// Playlist repository interface for data access operations
#[async_trait]
pub trait PlaylistRepository: Send + Sync {
    /// Insert a playlist and its initial tracks in one transaction
    ///
    /// # Errors
    /// - `InvalidInput` for an empty name
    /// - `Conflict` if a playlist with the same ID exists
    async fn create(&self, playlist: &NewPlaylist) -> Result<Playlist>;

    /// Find a playlist by its ID, with ordered and hydrated tracks
    async fn find_by_id(&self, id: PlaylistId) -> Result<Option<Playlist>>;

    /// Whether a playlist row exists
    async fn exists(&self, id: PlaylistId) -> Result<bool>;

    /// Owner of the playlist, if it exists
    async fn owner_of(&self, id: PlaylistId) -> Result<Option<UserId>>;

    /// Playlists newest first, optionally restricted to one owner
    async fn list(&self, page: PageRequest, owner_id: Option<UserId>) -> Result<Vec<Playlist>>;

    /// Playlists the user owns or subscribes to, each once, with track counts
    async fn user_playlists(
        &self,
        user_id: UserId,
        page: PageRequest,
    ) -> Result<Vec<PlaylistSummary>>;

    /// Edit playlist fields and optionally replace its tracks
    ///
    /// # Errors
    /// - `NotFound` if the playlist does not exist
    async fn update(&self, update: &PlaylistUpdate) -> Result<()>;

    /// Delete a playlist; memberships and subscriptions cascade
    ///
    /// # Returns
    /// - `Ok(true)` if the playlist was deleted
    /// - `Ok(false)` if the playlist was not found
    async fn delete(&self, id: PlaylistId) -> Result<bool>;

    /// Add a track, or move it when already present
    ///
    /// # Errors
    /// - `NotFound` if the playlist does not exist
    /// - `InvalidInput` for a negative position
    async fn add_track(
        &self,
        playlist_id: PlaylistId,
        track_id: TrackId,
        position: i64,
    ) -> Result<()>;

    /// Remove a track from a playlist
    async fn remove_track(&self, playlist_id: PlaylistId, track_id: TrackId) -> Result<bool>;

    /// Subscribe a user; subscribing twice is a no-op
    ///
    /// # Errors
    /// - `NotFound` if the playlist does not exist
    async fn subscribe_user(&self, user_id: UserId, playlist_id: PlaylistId) -> Result<()>;

    /// Remove a subscription
    async fn unsubscribe_user(&self, user_id: UserId, playlist_id: PlaylistId) -> Result<bool>;

    /// Ordered tracks of one playlist
    async fn playlist_tracks(&self, playlist_id: PlaylistId) -> Result<Vec<PlaylistTrack>>;

    /// Ordered tracks of many playlists; playlists without tracks are absent
    async fn tracks_for_playlists(
        &self,
        ids: &[PlaylistId],
    ) -> Result<HashMap<PlaylistId, Vec<PlaylistTrack>>>;
}

/// SQLite implementation of PlaylistRepository
pub struct SqlitePlaylistRepository {
    pool: SqlitePool,
}

impl SqlitePlaylistRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn attach_tracks(&self, playlists: &mut [Playlist]) -> Result<()> {
        let ids: Vec<PlaylistId> = playlists.iter().map(|p| p.id).collect();
        let mut tracks = self.load_tracks(&ids).await?;

        for playlist in playlists.iter_mut() {
            playlist.tracks = tracks.remove(&playlist.id).unwrap_or_default();
        }

        Ok(())
    }

    async fn load_tracks(
        &self,
        playlist_ids: &[PlaylistId],
    ) -> Result<HashMap<PlaylistId, Vec<PlaylistTrack>>> {
        let ids: InList<PlaylistId> = playlist_ids.iter().copied().collect();
        let mut by_playlist: HashMap<PlaylistId, Vec<PlaylistTrack>> = HashMap::new();
        if ids.is_empty() {
            return Ok(by_playlist);
        }

        for chunk in ids.chunks() {
            let mut builder = QueryBuilder::<Sqlite>::new(
                "SELECT pt.playlist_id, pt.track_id, pt.position, pt.added_at, \
                 t.id AS t_id, t.title AS t_title, t.genre AS t_genre, \
                 t.audio_url AS t_audio_url, t.cover_url AS t_cover_url, \
                 t.duration_seconds AS t_duration_seconds, t.status AS t_status, \
                 t.created_at AS t_created_at, t.updated_at AS t_updated_at \
                 FROM playlist_tracks pt \
                 LEFT JOIN tracks t ON t.id = pt.track_id \
                 WHERE ",
            );
            chunk.push_filter(&mut builder, "pt.playlist_id");
            builder.push(" ORDER BY pt.playlist_id, pt.position, pt.added_at, pt.rowid");

            let rows = builder
                .build_query_as::<MembershipRow>()
                .fetch_all(&self.pool)
                .await?;

            for row in rows {
                let (playlist_id, entry) = row.into_entry();
                by_playlist.entry(playlist_id).or_default().push(entry);
            }
        }

        let track_ids: InList<TrackId> = by_playlist
            .values()
            .flatten()
            .filter(|entry| entry.track.is_some())
            .map(|entry| entry.track_id)
            .collect();

        debug!(
            playlists = ids.len(),
            tracks = track_ids.len(),
            "Loaded playlist tracks"
        );

        let artists = artists_for_tracks(&self.pool, &track_ids).await?;
        for entry in by_playlist.values_mut().flatten() {
            if let Some(track) = entry.track.as_mut() {
                track.artists = artists.get(&entry.track_id).cloned().unwrap_or_default();
            }
        }

        Ok(by_playlist)
    }
}

/// One `playlist_tracks` row with its optional catalog track
#[derive(FromRow)]
struct MembershipRow {
    playlist_id: PlaylistId,
    track_id: TrackId,
    position: i64,
    added_at: i64,
    t_id: Option<TrackId>,
    t_title: Option<String>,
    t_genre: Option<String>,
    t_audio_url: Option<String>,
    t_cover_url: Option<String>,
    t_duration_seconds: Option<i64>,
    t_status: Option<TrackStatus>,
    t_created_at: Option<i64>,
    t_updated_at: Option<i64>,
}

impl MembershipRow {
    fn into_entry(self) -> (PlaylistId, PlaylistTrack) {
        let track = match (self.t_id, self.t_title, self.t_status) {
            (Some(id), Some(title), Some(status)) => Some(Track {
                id,
                title,
                genre: self.t_genre,
                audio_url: self.t_audio_url,
                cover_url: self.t_cover_url,
                duration_seconds: self.t_duration_seconds.unwrap_or_default(),
                status,
                created_at: self.t_created_at.unwrap_or_default(),
                updated_at: self.t_updated_at.unwrap_or_default(),
                artists: Vec::new(),
            }),
            _ => None,
        };

        (
            self.playlist_id,
            PlaylistTrack {
                track_id: self.track_id,
                position: self.position,
                added_at: self.added_at,
                track,
            },
        )
    }
}

/// Write membership rows, upserting the position of tracks already present.
async fn insert_memberships(
    conn: &mut SqliteConnection,
    playlist_id: PlaylistId,
    entries: &[PlaylistTrackEntry],
) -> Result<()> {
    if entries.is_empty() {
        return Ok(());
    }

    let rows = effective_positions(entries);
    let added_at = now_millis();

    for chunk in rows.chunks(MAX_IN_LIST_PARAMS / MEMBERSHIP_BINDS) {
        let mut builder = QueryBuilder::<Sqlite>::new(
            "INSERT INTO playlist_tracks (playlist_id, track_id, position, added_at) ",
        );
        builder.push_values(chunk, |mut row, (track_id, position)| {
            row.push_bind(playlist_id)
                .push_bind(*track_id)
                .push_bind(*position)
                .push_bind(added_at);
        });
        builder.push(
            " ON CONFLICT(playlist_id, track_id) DO UPDATE SET position = excluded.position",
        );
        builder.build().execute(&mut *conn).await?;
    }

    debug!(playlist_id = %playlist_id, tracks = rows.len(), "Wrote playlist tracks");
    Ok(())
}

#[async_trait]
impl PlaylistRepository for SqlitePlaylistRepository {
    async fn create(&self, playlist: &NewPlaylist) -> Result<Playlist> {
        playlist
            .validate()
            .map_err(|e| LibraryError::InvalidInput {
                field: "Playlist".to_string(),
                message: e,
            })?;

        let now = now_millis();
        let mut tx = self.pool.begin().await?;

        query(
            r#"
            INSERT INTO playlists (id, owner_id, name, description, is_private, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(playlist.id)
        .bind(playlist.owner_id)
        .bind(playlist.name.trim())
        .bind(&playlist.description)
        .bind(playlist.is_private)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| LibraryError::conflict_on_unique(e, "Playlist", playlist.id))?;

        insert_memberships(&mut tx, playlist.id, &playlist.tracks).await?;

        tx.commit().await?;

        self.find_by_id(playlist.id)
            .await?
            .ok_or_else(|| LibraryError::not_found("Playlist", playlist.id))
    }

    async fn find_by_id(&self, id: PlaylistId) -> Result<Option<Playlist>> {
        let sql = format!("SELECT {} FROM playlists p WHERE p.id = ?", PLAYLIST_COLUMNS);
        let playlist = query_as::<_, Playlist>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(mut playlist) = playlist else {
            return Ok(None);
        };

        playlist.tracks = self.playlist_tracks(id).await?;
        Ok(Some(playlist))
    }

    async fn exists(&self, id: PlaylistId) -> Result<bool> {
        let row: Option<(i64,)> = query_as("SELECT 1 FROM playlists WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.is_some())
    }

    async fn owner_of(&self, id: PlaylistId) -> Result<Option<UserId>> {
        let row: Option<(UserId,)> = query_as("SELECT owner_id FROM playlists WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|(owner,)| owner))
    }

    async fn list(&self, page: PageRequest, owner_id: Option<UserId>) -> Result<Vec<Playlist>> {
        let page = page.normalized();

        let mut builder = QueryBuilder::<Sqlite>::new("SELECT ");
        builder.push(PLAYLIST_COLUMNS);
        builder.push(" FROM playlists p");
        if let Some(owner_id) = owner_id {
            builder.push(" WHERE p.owner_id = ");
            builder.push_bind(owner_id);
        }
        builder.push(" ORDER BY p.created_at DESC, p.rowid DESC LIMIT ");
        builder.push_bind(page.limit);
        builder.push(" OFFSET ");
        builder.push_bind(page.offset);

        let mut playlists = builder
            .build_query_as::<Playlist>()
            .fetch_all(&self.pool)
            .await?;

        self.attach_tracks(&mut playlists).await?;
        Ok(playlists)
    }

    async fn user_playlists(
        &self,
        user_id: UserId,
        page: PageRequest,
    ) -> Result<Vec<PlaylistSummary>> {
        let page = page.normalized();

        let summaries = query_as::<_, PlaylistSummary>(
            r#"
            SELECT p.id, p.owner_id, p.name, p.description, p.is_private,
                   COUNT(DISTINCT pt.track_id) AS track_count,
                   p.created_at, p.updated_at
            FROM playlists p
            LEFT JOIN playlist_users pu ON pu.playlist_id = p.id AND pu.user_id = ?
            LEFT JOIN playlist_tracks pt ON pt.playlist_id = p.id
            WHERE p.owner_id = ? OR pu.user_id IS NOT NULL
            GROUP BY p.id
            ORDER BY p.created_at DESC, p.rowid DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(user_id)
        .bind(user_id)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(summaries)
    }

    async fn update(&self, update: &PlaylistUpdate) -> Result<()> {
        update.validate().map_err(|e| LibraryError::InvalidInput {
            field: "Playlist".to_string(),
            message: e,
        })?;

        let description = update.description.as_deref().map(str::trim);
        let mut tx = self.pool.begin().await?;

        // An empty description clears the column
        let result = query(
            r#"
            UPDATE playlists
            SET name = COALESCE(?, name),
                description = CASE WHEN ? IS NULL THEN description ELSE NULLIF(?, '') END,
                is_private = COALESCE(?, is_private),
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(update.name.as_deref().map(str::trim))
        .bind(description)
        .bind(description)
        .bind(update.is_private)
        .bind(now_millis())
        .bind(update.id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(LibraryError::not_found("Playlist", update.id));
        }

        if let Some(tracks) = &update.tracks {
            query("DELETE FROM playlist_tracks WHERE playlist_id = ?")
                .bind(update.id)
                .execute(&mut *tx)
                .await?;

            insert_memberships(&mut tx, update.id, tracks).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn delete(&self, id: PlaylistId) -> Result<bool> {
        let result = query("DELETE FROM playlists WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn add_track(
        &self,
        playlist_id: PlaylistId,
        track_id: TrackId,
        position: i64,
    ) -> Result<()> {
        if position < 0 {
            return Err(LibraryError::invalid(
                "position",
                "Position cannot be negative",
            ));
        }

        if !self.exists(playlist_id).await? {
            return Err(LibraryError::not_found("Playlist", playlist_id));
        }

        query(
            r#"
            INSERT INTO playlist_tracks (playlist_id, track_id, position, added_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(playlist_id, track_id) DO UPDATE SET position = excluded.position
            "#,
        )
        .bind(playlist_id)
        .bind(track_id)
        .bind(position)
        .bind(now_millis())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn remove_track(&self, playlist_id: PlaylistId, track_id: TrackId) -> Result<bool> {
        let result = query("DELETE FROM playlist_tracks WHERE playlist_id = ? AND track_id = ?")
            .bind(playlist_id)
            .bind(track_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn subscribe_user(&self, user_id: UserId, playlist_id: PlaylistId) -> Result<()> {
        if !self.exists(playlist_id).await? {
            return Err(LibraryError::not_found("Playlist", playlist_id));
        }

        query(
            r#"
            INSERT INTO playlist_users (user_id, playlist_id, created_at)
            VALUES (?, ?, ?)
            ON CONFLICT(user_id, playlist_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(playlist_id)
        .bind(now_millis())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn unsubscribe_user(&self, user_id: UserId, playlist_id: PlaylistId) -> Result<bool> {
        let result = query("DELETE FROM playlist_users WHERE user_id = ? AND playlist_id = ?")
            .bind(user_id)
            .bind(playlist_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn playlist_tracks(&self, playlist_id: PlaylistId) -> Result<Vec<PlaylistTrack>> {
        let mut tracks = self.load_tracks(&[playlist_id]).await?;
        Ok(tracks.remove(&playlist_id).unwrap_or_default())
    }

    async fn tracks_for_playlists(
        &self,
        ids: &[PlaylistId],
    ) -> Result<HashMap<PlaylistId, Vec<PlaylistTrack>>> {
        self.load_tracks(ids).await
    }
}
