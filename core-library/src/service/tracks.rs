//! Track catalog service

use crate::error::{LibraryError, Result};
use crate::events::{TrackEvent, TranscodeOutcome};
use crate::models::{
    parse_id, Artist, ArtistId, NewTrack, Track, TrackId, TrackMedia, TrackStatus, TrackUpdate,
};
use crate::repositories::{ArtistRepository, PageRequest, TrackRepository};
use crate::service::with_deadline;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Admin request to register a track
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTrackRequest {
    /// Identifier assigned upstream; generated when absent
    #[serde(default)]
    pub track_id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub genre: Option<String>,
    pub artist_ids: Vec<String>,
}

/// Admin request to edit a track; absent or blank fields are left unchanged
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateTrackRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub artist_ids: Option<Vec<String>>,
}

fn parse_artist_ids(raw: &[String]) -> Result<Vec<ArtistId>> {
    raw.iter()
        .map(|id| parse_id::<ArtistId>("artist_ids", id))
        .collect()
}

/// Track catalog operations at the service boundary
pub struct TrackService {
    tracks: Arc<dyn TrackRepository>,
    artists: Arc<dyn ArtistRepository>,
    query_timeout: Option<Duration>,
}

impl TrackService {
    pub fn new(tracks: Arc<dyn TrackRepository>, artists: Arc<dyn ArtistRepository>) -> Self {
        Self {
            tracks,
            artists,
            query_timeout: None,
        }
    }

    /// Deadline applied to every storage call
    pub fn with_query_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.query_timeout = timeout;
        self
    }

    #[instrument(skip(self, request), fields(title = %request.title))]
    pub async fn create_track(&self, request: CreateTrackRequest) -> Result<Track> {
        let mut track = NewTrack::new(request.title, parse_artist_ids(&request.artist_ids)?);
        if let Some(id) = request.track_id.as_deref() {
            track = track.with_id(parse_id("track_id", id)?);
        }
        if let Some(genre) = request.genre {
            track = track.with_genre(genre);
        }

        let created =
            with_deadline(self.query_timeout, "create_track", self.tracks.create(&track)).await?;
        info!(track_id = %created.id, "Track created");
        Ok(created)
    }

    #[instrument(skip(self))]
    pub async fn get_track(&self, id: &str) -> Result<Track> {
        let track_id: TrackId = parse_id("track_id", id)?;

        with_deadline(self.query_timeout, "get_track", self.tracks.find_by_id(track_id))
            .await?
            .ok_or_else(|| LibraryError::not_found("Track", track_id))
    }

    #[instrument(skip(self))]
    pub async fn list_tracks(
        &self,
        limit: i64,
        offset: i64,
        artist_id: Option<&str>,
    ) -> Result<Vec<Track>> {
        let artist_id = artist_id
            .filter(|id| !id.trim().is_empty())
            .map(|id| parse_id::<ArtistId>("artist_id", id))
            .transpose()?;
        let page = PageRequest::new(limit, offset).normalized();

        with_deadline(
            self.query_timeout,
            "list_tracks",
            self.tracks.list(page, artist_id),
        )
        .await
    }

    #[instrument(skip(self))]
    pub async fn search_tracks(&self, query: &str, limit: i64, offset: i64) -> Result<Vec<Track>> {
        let page = PageRequest::new(limit, offset).normalized();

        with_deadline(
            self.query_timeout,
            "search_tracks",
            self.tracks.search(query, page),
        )
        .await
    }

    /// Apply an admin edit and return the updated track
    #[instrument(skip(self, request))]
    pub async fn update_track(&self, id: &str, request: UpdateTrackRequest) -> Result<Track> {
        let track_id: TrackId = parse_id("track_id", id)?;
        let update = TrackUpdate {
            title: request.title,
            genre: request.genre,
            artist_ids: request
                .artist_ids
                .as_deref()
                .map(parse_artist_ids)
                .transpose()?,
        };

        with_deadline(
            self.query_timeout,
            "update_track",
            self.tracks.update(track_id, &update),
        )
        .await?;

        self.get_track(id).await
    }

    /// Ready transition from transcoder output
    #[instrument(skip(self, media))]
    pub async fn mark_ready(&self, id: &str, media: TrackMedia) -> Result<()> {
        let track_id: TrackId = parse_id("track_id", id)?;

        with_deadline(
            self.query_timeout,
            "mark_ready",
            self.tracks.mark_ready(track_id, &media),
        )
        .await
    }

    #[instrument(skip(self))]
    pub async fn mark_failed(&self, id: &str) -> Result<()> {
        let track_id: TrackId = parse_id("track_id", id)?;
        self.set_status(track_id, TrackStatus::Failed).await
    }

    #[instrument(skip(self))]
    pub async fn update_status(&self, id: &str, status: &str) -> Result<()> {
        let track_id: TrackId = parse_id("track_id", id)?;
        let status: TrackStatus = status
            .parse()
            .map_err(|e: String| LibraryError::invalid("status", e))?;

        self.set_status(track_id, status).await
    }

    async fn set_status(&self, track_id: TrackId, status: TrackStatus) -> Result<()> {
        with_deadline(
            self.query_timeout,
            "update_status",
            self.tracks.update_status(track_id, status),
        )
        .await
    }

    #[instrument(skip(self))]
    pub async fn delete_track(&self, id: &str) -> Result<()> {
        let track_id: TrackId = parse_id("track_id", id)?;

        let deleted =
            with_deadline(self.query_timeout, "delete_track", self.tracks.delete(track_id)).await?;
        if !deleted {
            return Err(LibraryError::not_found("Track", track_id));
        }

        info!(track_id = %track_id, "Track deleted");
        Ok(())
    }

    /// Batch artist hydration for callers holding track ids
    #[instrument(skip(self, ids), fields(count = ids.len()))]
    pub async fn artists_for_tracks(
        &self,
        ids: &[String],
    ) -> Result<HashMap<TrackId, Vec<Artist>>> {
        let track_ids = ids
            .iter()
            .map(|id| parse_id::<TrackId>("track_ids", id))
            .collect::<Result<Vec<_>>>()?;

        with_deadline(
            self.query_timeout,
            "artists_for_tracks",
            self.tracks.artists_for_tracks(&track_ids),
        )
        .await
    }

    /// Apply an upload or transcoding event to the catalog
    ///
    /// A redelivered upload for a track that already exists is acknowledged
    /// without error.
    #[instrument(skip(self, event), fields(event_type = event.event_type()))]
    pub async fn handle_event(&self, event: TrackEvent) -> Result<()> {
        match event {
            TrackEvent::Uploaded(uploaded) => {
                if let Some(artist) = uploaded.inline_artist()? {
                    with_deadline(
                        self.query_timeout,
                        "upsert_artist",
                        self.artists.upsert(&artist),
                    )
                    .await?;
                }

                let track = uploaded.to_new_track()?;
                match with_deadline(self.query_timeout, "create_track", self.tracks.create(&track))
                    .await
                {
                    Ok(_) => Ok(()),
                    Err(LibraryError::Conflict { id, .. }) => {
                        debug!(track_id = %id, "Upload already recorded");
                        Ok(())
                    }
                    Err(e) => Err(e),
                }
            }
            TrackEvent::TranscodingCompleted(done) => {
                let track_id = done.track_id()?;
                match done.outcome() {
                    TranscodeOutcome::Ready(media) => {
                        with_deadline(
                            self.query_timeout,
                            "mark_ready",
                            self.tracks.mark_ready(track_id, &media),
                        )
                        .await
                    }
                    TranscodeOutcome::Failed => self.set_status(track_id, TrackStatus::Failed).await,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use async_trait::async_trait;
    use mockall::mock;
    use mockall::predicate::eq;

    mock! {
        Tracks {}

        #[async_trait]
        impl TrackRepository for Tracks {
            async fn create(&self, track: &NewTrack) -> Result<Track>;
            async fn find_by_id(&self, id: TrackId) -> Result<Option<Track>>;
            async fn list(&self, page: PageRequest, artist_id: Option<ArtistId>) -> Result<Vec<Track>>;
            async fn search(&self, text: &str, page: PageRequest) -> Result<Vec<Track>>;
            async fn update(&self, id: TrackId, update: &TrackUpdate) -> Result<()>;
            async fn mark_ready(&self, id: TrackId, media: &TrackMedia) -> Result<()>;
            async fn update_status(&self, id: TrackId, status: TrackStatus) -> Result<()>;
            async fn delete(&self, id: TrackId) -> Result<bool>;
            async fn artists_for_tracks(&self, ids: &[TrackId]) -> Result<HashMap<TrackId, Vec<Artist>>>;
            async fn artist_ids_for_tracks(&self, ids: &[TrackId]) -> Result<HashMap<TrackId, Vec<ArtistId>>>;
        }
    }

    mock! {
        Artists {}

        #[async_trait]
        impl ArtistRepository for Artists {
            async fn find_by_id(&self, id: ArtistId) -> Result<Option<Artist>>;
            async fn upsert(&self, artist: &Artist) -> Result<()>;
            async fn find_by_ids(&self, ids: &[ArtistId]) -> Result<Vec<Artist>>;
        }
    }

    fn service(tracks: MockTracks, artists: MockArtists) -> TrackService {
        TrackService::new(Arc::new(tracks), Arc::new(artists))
    }

    fn sample_track(id: TrackId) -> Track {
        Track {
            id,
            title: "Teardrop".to_string(),
            genre: None,
            audio_url: None,
            cover_url: None,
            duration_seconds: 0,
            status: TrackStatus::Uploaded,
            created_at: 0,
            updated_at: 0,
            artists: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_get_track_maps_absent_to_not_found() {
        let mut tracks = MockTracks::new();
        tracks.expect_find_by_id().returning(|_| Ok(None));

        let err = service(tracks, MockArtists::new())
            .get_track(&TrackId::new().to_string())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_malformed_id_never_reaches_storage() {
        let svc = service(MockTracks::new(), MockArtists::new());

        let err = svc.get_track("not-a-uuid").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let err = svc.delete_track("").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[tokio::test]
    async fn test_list_tracks_normalizes_page() {
        let mut tracks = MockTracks::new();
        tracks
            .expect_list()
            .with(eq(PageRequest::new(20, 0)), eq(None::<ArtistId>))
            .times(1)
            .returning(|_, _| Ok(Vec::new()));
        tracks
            .expect_list()
            .with(eq(PageRequest::new(100, 0)), eq(None::<ArtistId>))
            .times(1)
            .returning(|_, _| Ok(Vec::new()));

        let svc = service(tracks, MockArtists::new());
        assert!(svc.list_tracks(0, -10, None).await.unwrap().is_empty());
        assert!(svc.list_tracks(500, 0, Some("")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_missing_track_is_not_found() {
        let mut tracks = MockTracks::new();
        tracks.expect_delete().returning(|_| Ok(false));

        let err = service(tracks, MockArtists::new())
            .delete_track(&TrackId::new().to_string())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_update_status_rejects_unknown_status() {
        let svc = service(MockTracks::new(), MockArtists::new());
        let err = svc
            .update_status(&TrackId::new().to_string(), "archived")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[tokio::test]
    async fn test_create_track_parses_request() {
        let id = TrackId::new();
        let artist = ArtistId::new();

        let mut tracks = MockTracks::new();
        tracks
            .expect_create()
            .withf(move |t| t.id == id && t.artist_ids == vec![artist] && t.genre.is_none())
            .times(1)
            .returning(|t| Ok(sample_track(t.id)));

        let created = service(tracks, MockArtists::new())
            .create_track(CreateTrackRequest {
                track_id: Some(id.to_string()),
                title: "Teardrop".to_string(),
                genre: Some(" ".to_string()),
                artist_ids: vec![artist.to_string()],
            })
            .await
            .unwrap();
        assert_eq!(created.id, id);
    }

    #[tokio::test]
    async fn test_upload_event_refreshes_artist_and_creates_track() {
        let track_id = TrackId::new();
        let artist_id = ArtistId::new();

        let mut artists = MockArtists::new();
        artists
            .expect_upsert()
            .withf(move |a| a.id == artist_id && a.name == "Massive Attack")
            .times(1)
            .returning(|_| Ok(()));

        let mut tracks = MockTracks::new();
        tracks
            .expect_create()
            .withf(move |t| t.id == track_id)
            .times(1)
            .returning(|t| {
                Err(LibraryError::Conflict {
                    entity_type: "Track".to_string(),
                    id: t.id.to_string(),
                })
            });

        let payload = format!(
            r#"{{"track_id":"{}","title":"Teardrop","artist_id":"{}","artist_name":"Massive Attack"}}"#,
            track_id, artist_id
        );
        let event = TrackEvent::from_message("track.uploaded", payload.as_bytes())
            .unwrap()
            .unwrap();

        // redelivery of an upload already in the catalog is acknowledged
        service(tracks, artists).handle_event(event).await.unwrap();
    }

    #[tokio::test]
    async fn test_transcoding_events() {
        let ready_id = TrackId::new();
        let failed_id = TrackId::new();

        let mut tracks = MockTracks::new();
        tracks
            .expect_mark_ready()
            .withf(move |id, media| *id == ready_id && media.duration_seconds == 95)
            .times(1)
            .returning(|_, _| Ok(()));
        tracks
            .expect_update_status()
            .with(eq(failed_id), eq(TrackStatus::Failed))
            .times(1)
            .returning(|_, _| Ok(()));

        let svc = service(tracks, MockArtists::new());

        let ready = format!(
            r#"{{"track_id":"{}","status":"ready","audio_url":"https://cdn/x.mp3","duration_seconds":95}}"#,
            ready_id
        );
        let failed = format!(r#"{{"track_id":"{}","status":"failed"}}"#, failed_id);

        for payload in [ready, failed] {
            let event =
                TrackEvent::from_message("track.transcoding.completed", payload.as_bytes())
                    .unwrap()
                    .unwrap();
            svc.handle_event(event).await.unwrap();
        }
    }
}
