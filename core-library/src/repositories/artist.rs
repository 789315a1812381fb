//! Artist projection repository and batch artist hydration
//!
//! Artists are owned by another bounded context; this store keeps the
//! `(id, name)` projection it needs to validate track credits and to show
//! artist names without a cross-service call.

use crate::error::{LibraryError, Result};
use crate::models::{now_millis, Artist, ArtistId, TrackId};
use crate::query::InList;
use async_trait::async_trait;
use sqlx::{query, query_as, QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Artist repository interface for data access operations
#[async_trait]
pub trait ArtistRepository: Send + Sync {
    /// Find an artist by its ID
    async fn find_by_id(&self, id: ArtistId) -> Result<Option<Artist>>;

    /// Insert the artist or rename the existing row
    async fn upsert(&self, artist: &Artist) -> Result<()>;

    /// Fetch every known artist among `ids`, ordered by name
    async fn find_by_ids(&self, ids: &[ArtistId]) -> Result<Vec<Artist>>;
}

/// SQLite implementation of ArtistRepository
pub struct SqliteArtistRepository {
    pool: SqlitePool,
}

impl SqliteArtistRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ArtistRepository for SqliteArtistRepository {
    async fn find_by_id(&self, id: ArtistId) -> Result<Option<Artist>> {
        let artist = query_as::<_, Artist>("SELECT id, name FROM artists WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(artist)
    }

    async fn upsert(&self, artist: &Artist) -> Result<()> {
        artist.validate().map_err(|e| LibraryError::InvalidInput {
            field: "Artist".to_string(),
            message: e,
        })?;

        let now = now_millis();
        query(
            r#"
            INSERT INTO artists (id, name, created_at, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET name = excluded.name, updated_at = excluded.updated_at
            "#,
        )
        .bind(artist.id)
        .bind(&artist.name)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_ids(&self, ids: &[ArtistId]) -> Result<Vec<Artist>> {
        let ids: InList<ArtistId> = ids.iter().copied().collect();
        let mut artists = Vec::with_capacity(ids.len());

        for chunk in ids.chunks() {
            let mut builder = QueryBuilder::<Sqlite>::new("SELECT id, name FROM artists WHERE ");
            chunk.push_filter(&mut builder, "id");
            builder.push(" ORDER BY name, id");

            let rows = builder
                .build_query_as::<Artist>()
                .fetch_all(&self.pool)
                .await?;
            artists.extend(rows);
        }

        // Chunks are ordered individually
        artists.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));

        Ok(artists)
    }
}

#[derive(sqlx::FromRow)]
struct TrackArtistRow {
    track_id: TrackId,
    id: ArtistId,
    name: String,
}

/// Artists credited on each track, ordered by name.
///
/// Issues one query per IN-list chunk regardless of how many tracks are asked
/// for. Tracks without credits are absent from the map.
pub(crate) async fn artists_for_tracks(
    pool: &SqlitePool,
    track_ids: &InList<TrackId>,
) -> Result<HashMap<TrackId, Vec<Artist>>> {
    let mut by_track: HashMap<TrackId, Vec<Artist>> = HashMap::new();
    if track_ids.is_empty() {
        return Ok(by_track);
    }

    debug!(tracks = track_ids.len(), "Hydrating track artists");

    for chunk in track_ids.chunks() {
        let mut builder = QueryBuilder::<Sqlite>::new(
            "SELECT ta.track_id, a.id, a.name \
             FROM track_artists ta \
             INNER JOIN artists a ON a.id = ta.artist_id \
             WHERE ",
        );
        chunk.push_filter(&mut builder, "ta.track_id");
        builder.push(" ORDER BY ta.track_id, a.name, a.id");

        let rows = builder
            .build_query_as::<TrackArtistRow>()
            .fetch_all(pool)
            .await?;

        for row in rows {
            by_track
                .entry(row.track_id)
                .or_default()
                .push(Artist::new(row.id, row.name));
        }
    }

    Ok(by_track)
}

/// Ids from `artist_ids` with no row in the projection, in input order.
pub(crate) async fn missing_artist_ids(
    conn: &mut SqliteConnection,
    artist_ids: &[ArtistId],
) -> Result<Vec<ArtistId>> {
    let ids: InList<ArtistId> = artist_ids.iter().copied().collect();
    let mut known = HashSet::with_capacity(ids.len());

    for chunk in ids.chunks() {
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT id FROM artists WHERE ");
        chunk.push_filter(&mut builder, "id");

        let rows = builder
            .build_query_as::<(ArtistId,)>()
            .fetch_all(&mut *conn)
            .await?;
        known.extend(rows.into_iter().map(|(id,)| id));
    }

    Ok(ids
        .values()
        .iter()
        .copied()
        .filter(|id| !known.contains(id))
        .collect())
}

/// NotFound for the first artist id the projection does not know.
pub(crate) async fn ensure_artists_exist(
    conn: &mut SqliteConnection,
    artist_ids: &[ArtistId],
) -> Result<()> {
    match missing_artist_ids(conn, artist_ids).await?.first() {
        Some(missing) => Err(LibraryError::not_found("Artist", missing)),
        None => Ok(()),
    }
}
