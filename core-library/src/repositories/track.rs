//! Track repository trait and implementation
//!
//! The catalog owns track rows and the `track_artists` association. Listing
//! and search only ever expose `ready` tracks; every page is hydrated with its
//! artists through one batch query instead of one query per track.

use crate::error::{LibraryError, Result};
use crate::models::{
    now_millis, Artist, ArtistId, NewTrack, Track, TrackId, TrackMedia, TrackStatus, TrackUpdate,
};
use crate::query::{InList, MAX_IN_LIST_PARAMS};
use crate::repositories::artist::{artists_for_tracks, ensure_artists_exist};
use crate::repositories::PageRequest;
use async_trait::async_trait;
use core_runtime::config::DEFAULT_COVER_URL;
use sqlx::{query, query_as, QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use std::collections::HashMap;
use tracing::debug;

const TRACK_COLUMNS: &str = "t.id, t.title, t.genre, t.audio_url, t.cover_url, \
     t.duration_seconds, t.status, t.created_at, t.updated_at";

/// Track repository interface for data access operations
#[async_trait]
pub trait TrackRepository: Send + Sync {
    /// Insert a new track in `uploaded` state with its artist credits
    ///
    /// # Errors
    /// Returns error if:
    /// - Validation fails (empty title, no artists)
    /// - An artist id is unknown (`NotFound`)
    /// - A track with the same ID already exists (`Conflict`)
    async fn create(&self, track: &NewTrack) -> Result<Track>;

    /// Find a track by its ID, with artists
    ///
    /// # Returns
    /// - `Ok(Some(track))` if found
    /// - `Ok(None)` if not found
    async fn find_by_id(&self, id: TrackId) -> Result<Option<Track>>;

    /// Ready tracks, newest first, optionally credited to one artist
    async fn list(&self, page: PageRequest, artist_id: Option<ArtistId>) -> Result<Vec<Track>>;

    /// Ready tracks whose title contains `text`, ignoring case
    async fn search(&self, text: &str, page: PageRequest) -> Result<Vec<Track>>;

    /// Apply a partial edit
    ///
    /// # Errors
    /// - `NotFound` if the track does not exist or a new artist id is unknown
    async fn update(&self, id: TrackId, update: &TrackUpdate) -> Result<()>;

    /// Record transcoder output and move the track to `ready`
    ///
    /// # Errors
    /// - `InvalidInput` for an empty audio URL or negative duration; the row
    ///   is not touched
    /// - `NotFound` if the track does not exist
    async fn mark_ready(&self, id: TrackId, media: &TrackMedia) -> Result<()>;

    /// Write the status column directly
    async fn update_status(&self, id: TrackId, status: TrackStatus) -> Result<()>;

    /// Delete a track and its artist credits
    ///
    /// # Returns
    /// - `Ok(true)` if the track was deleted
    /// - `Ok(false)` if the track was not found
    async fn delete(&self, id: TrackId) -> Result<bool>;

    /// Artists credited on each track, ordered by name
    async fn artists_for_tracks(&self, ids: &[TrackId]) -> Result<HashMap<TrackId, Vec<Artist>>>;

    /// Artist ids credited on each track
    async fn artist_ids_for_tracks(
        &self,
        ids: &[TrackId],
    ) -> Result<HashMap<TrackId, Vec<ArtistId>>>;
}

/// SQLite implementation of TrackRepository
pub struct SqliteTrackRepository {
    pool: SqlitePool,
    default_cover_url: String,
}

impl SqliteTrackRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            default_cover_url: DEFAULT_COVER_URL.to_string(),
        }
    }

    /// Cover written by `mark_ready` when the transcoder supplies none
    pub fn with_default_cover_url(mut self, url: impl Into<String>) -> Self {
        self.default_cover_url = url.into();
        self
    }

    async fn hydrate(&self, tracks: &mut [Track]) -> Result<()> {
        let ids: InList<TrackId> = tracks.iter().map(|t| t.id).collect();
        let mut artists = artists_for_tracks(&self.pool, &ids).await?;

        for track in tracks.iter_mut() {
            track.artists = artists.remove(&track.id).unwrap_or_default();
        }

        Ok(())
    }

    async fn fetch_page(
        &self,
        mut builder: QueryBuilder<'_, Sqlite>,
        page: PageRequest,
    ) -> Result<Vec<Track>> {
        let page = page.normalized();
        builder.push(" ORDER BY t.created_at DESC, t.rowid DESC LIMIT ");
        builder.push_bind(page.limit);
        builder.push(" OFFSET ");
        builder.push_bind(page.offset);

        let mut tracks = builder
            .build_query_as::<Track>()
            .fetch_all(&self.pool)
            .await?;

        self.hydrate(&mut tracks).await?;
        Ok(tracks)
    }
}

/// Insert one credit row per artist id; `artist_ids` must be distinct.
async fn insert_track_artists(
    conn: &mut SqliteConnection,
    track_id: TrackId,
    artist_ids: &[ArtistId],
) -> Result<()> {
    for chunk in artist_ids.chunks(MAX_IN_LIST_PARAMS / 2) {
        let mut builder =
            QueryBuilder::<Sqlite>::new("INSERT INTO track_artists (track_id, artist_id) ");
        builder.push_values(chunk, |mut row, artist_id| {
            row.push_bind(track_id).push_bind(*artist_id);
        });
        builder.build().execute(&mut *conn).await?;
    }

    Ok(())
}

/// Folded form of a title stored in `title_search`.
///
/// SQLite's `LIKE` only folds ASCII, so both sides are lowercased here with
/// Unicode rules and compared as-is.
fn search_key(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Escape `LIKE` wildcards so user text matches literally.
fn like_pattern(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len() + 2);
    escaped.push('%');
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

#[async_trait]
impl TrackRepository for SqliteTrackRepository {
    async fn create(&self, track: &NewTrack) -> Result<Track> {
        track.validate().map_err(|e| LibraryError::InvalidInput {
            field: "Track".to_string(),
            message: e,
        })?;

        let artist_ids = track.distinct_artist_ids();
        let now = now_millis();

        let mut tx = self.pool.begin().await?;

        ensure_artists_exist(&mut tx, &artist_ids).await?;

        query(
            r#"
            INSERT INTO tracks
                (id, title, title_search, genre, duration_seconds, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, 0, ?, ?, ?)
            "#,
        )
        .bind(track.id)
        .bind(track.title.trim())
        .bind(search_key(&track.title))
        .bind(&track.genre)
        .bind(TrackStatus::Uploaded)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| LibraryError::conflict_on_unique(e, "Track", track.id))?;

        insert_track_artists(&mut tx, track.id, &artist_ids).await?;

        tx.commit().await?;

        debug!(track_id = %track.id, artists = artist_ids.len(), "Track created");

        self.find_by_id(track.id)
            .await?
            .ok_or_else(|| LibraryError::not_found("Track", track.id))
    }

    async fn find_by_id(&self, id: TrackId) -> Result<Option<Track>> {
        let sql = format!("SELECT {} FROM tracks t WHERE t.id = ?", TRACK_COLUMNS);
        let track = query_as::<_, Track>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(track) = track else {
            return Ok(None);
        };

        let mut tracks = [track];
        self.hydrate(&mut tracks).await?;
        let [track] = tracks;
        Ok(Some(track))
    }

    async fn list(&self, page: PageRequest, artist_id: Option<ArtistId>) -> Result<Vec<Track>> {
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT ");
        builder.push(TRACK_COLUMNS);
        builder.push(" FROM tracks t WHERE t.status = ");
        builder.push_bind(TrackStatus::Ready);

        if let Some(artist_id) = artist_id {
            builder.push(
                " AND EXISTS (SELECT 1 FROM track_artists ta \
                 WHERE ta.track_id = t.id AND ta.artist_id = ",
            );
            builder.push_bind(artist_id);
            builder.push(")");
        }

        self.fetch_page(builder, page).await
    }

    async fn search(&self, text: &str, page: PageRequest) -> Result<Vec<Track>> {
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT ");
        builder.push(TRACK_COLUMNS);
        builder.push(" FROM tracks t WHERE t.status = ");
        builder.push_bind(TrackStatus::Ready);
        builder.push(" AND t.title_search LIKE ");
        builder.push_bind(like_pattern(&search_key(text)));
        builder.push(" ESCAPE '\\'");

        self.fetch_page(builder, page).await
    }

    async fn update(&self, id: TrackId, update: &TrackUpdate) -> Result<()> {
        let replacement = update.replacement_artists();

        let mut tx = self.pool.begin().await?;

        let result = query(
            r#"
            UPDATE tracks
            SET title = COALESCE(?, title),
                title_search = COALESCE(?, title_search),
                genre = COALESCE(?, genre),
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(update.title().map(str::trim))
        .bind(update.title().map(search_key))
        .bind(update.genre())
        .bind(now_millis())
        .bind(id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(LibraryError::not_found("Track", id));
        }

        if let Some(artist_ids) = replacement {
            ensure_artists_exist(&mut tx, &artist_ids).await?;

            query("DELETE FROM track_artists WHERE track_id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?;

            insert_track_artists(&mut tx, id, &artist_ids).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn mark_ready(&self, id: TrackId, media: &TrackMedia) -> Result<()> {
        media.validate().map_err(|e| LibraryError::InvalidInput {
            field: "TrackMedia".to_string(),
            message: e,
        })?;

        let cover_url = media
            .cover_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or(&self.default_cover_url);

        let result = query(
            r#"
            UPDATE tracks
            SET audio_url = ?, cover_url = ?, duration_seconds = ?, status = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&media.audio_url)
        .bind(cover_url)
        .bind(media.duration_seconds)
        .bind(TrackStatus::Ready)
        .bind(now_millis())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(LibraryError::not_found("Track", id));
        }

        debug!(track_id = %id, "Track marked ready");
        Ok(())
    }

    async fn update_status(&self, id: TrackId, status: TrackStatus) -> Result<()> {
        let result = query("UPDATE tracks SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status)
            .bind(now_millis())
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(LibraryError::not_found("Track", id));
        }

        Ok(())
    }

    async fn delete(&self, id: TrackId) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        query("DELETE FROM track_artists WHERE track_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let result = query("DELETE FROM tracks WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(result.rows_affected() > 0)
    }

    async fn artists_for_tracks(&self, ids: &[TrackId]) -> Result<HashMap<TrackId, Vec<Artist>>> {
        let ids: InList<TrackId> = ids.iter().copied().collect();
        artists_for_tracks(&self.pool, &ids).await
    }

    async fn artist_ids_for_tracks(
        &self,
        ids: &[TrackId],
    ) -> Result<HashMap<TrackId, Vec<ArtistId>>> {
        let ids: InList<TrackId> = ids.iter().copied().collect();
        let mut by_track: HashMap<TrackId, Vec<ArtistId>> = HashMap::new();

        for chunk in ids.chunks() {
            let mut builder = QueryBuilder::<Sqlite>::new(
                "SELECT ta.track_id, ta.artist_id FROM track_artists ta \
                 INNER JOIN artists a ON a.id = ta.artist_id \
                 WHERE ",
            );
            chunk.push_filter(&mut builder, "ta.track_id");
            builder.push(" ORDER BY ta.track_id, a.name, a.id");

            let rows = builder
                .build_query_as::<(TrackId, ArtistId)>()
                .fetch_all(&self.pool)
                .await?;

            for (track_id, artist_id) in rows {
                by_track.entry(track_id).or_default().push(artist_id);
            }
        }

        Ok(by_track)
    }
}
