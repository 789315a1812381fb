//! Track lifecycle events
//!
//! The upload service and the transcoder announce track progress on the
//! `track-events` topic. Each message carries its type in an `event-type`
//! header and a JSON body; [`TrackEvent::from_message`] turns that pair into a
//! typed event. Broker plumbing lives with the host service.

use crate::error::{LibraryError, Result};
use crate::models::{parse_id, Artist, ArtistId, NewTrack, TrackId, TrackMedia};
use serde::{Deserialize, Serialize};

pub const TRACK_UPLOADED: &str = "track.uploaded";
pub const TRACK_TRANSCODING_COMPLETED: &str = "track.transcoding.completed";

/// Decoded track event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackEvent {
    Uploaded(TrackUploaded),
    TranscodingCompleted(TranscodingCompleted),
}

impl TrackEvent {
    /// Decode a message by its `event-type` header.
    ///
    /// Unknown event types yield `Ok(None)` so the consumer can acknowledge
    /// and move on; a known type with a malformed body is `InvalidInput`.
    pub fn from_message(event_type: &str, payload: &[u8]) -> Result<Option<Self>> {
        let event = match event_type.trim() {
            TRACK_UPLOADED => Self::Uploaded(decode(event_type, payload)?),
            TRACK_TRANSCODING_COMPLETED => Self::TranscodingCompleted(decode(event_type, payload)?),
            _ => return Ok(None),
        };

        Ok(Some(event))
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Uploaded(_) => TRACK_UPLOADED,
            Self::TranscodingCompleted(_) => TRACK_TRANSCODING_COMPLETED,
        }
    }
}

fn decode<T: for<'de> Deserialize<'de>>(event_type: &str, payload: &[u8]) -> Result<T> {
    serde_json::from_slice(payload).map_err(|e| {
        LibraryError::invalid(event_type, format!("Malformed event payload: {}", e))
    })
}

/// A file finished uploading and awaits transcoding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackUploaded {
    pub track_id: String,
    pub title: String,
    #[serde(default)]
    pub artist_ids: Vec<String>,
    /// Single-artist uploads name the artist inline
    #[serde(default)]
    pub artist_id: Option<String>,
    #[serde(default)]
    pub artist_name: Option<String>,
    #[serde(default)]
    pub genre: Option<String>,
}

impl TrackUploaded {
    /// Catalog input for this upload
    pub fn to_new_track(&self) -> Result<NewTrack> {
        let track_id = parse_id::<TrackId>("track_id", &self.track_id)?;

        let mut artist_ids = Vec::with_capacity(self.artist_ids.len() + 1);
        for raw in self.artist_id.iter().chain(self.artist_ids.iter()) {
            artist_ids.push(parse_id::<ArtistId>("artist_ids", raw)?);
        }

        let mut track = NewTrack::new(self.title.clone(), artist_ids).with_id(track_id);
        if let Some(genre) = &self.genre {
            track = track.with_genre(genre.clone());
        }
        Ok(track)
    }

    /// Artist named inline, to refresh the local projection
    pub fn inline_artist(&self) -> Result<Option<Artist>> {
        match (&self.artist_id, &self.artist_name) {
            (Some(id), Some(name)) if !name.trim().is_empty() => {
                let id = parse_id::<ArtistId>("artist_id", id)?;
                Ok(Some(Artist::new(id, name.trim())))
            }
            _ => Ok(None),
        }
    }
}

/// Transcoder result for an uploaded track
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscodingCompleted {
    pub track_id: String,
    pub status: String,
    #[serde(default)]
    pub audio_url: String,
    #[serde(default)]
    pub cover_url: Option<String>,
    #[serde(default)]
    pub duration_seconds: i64,
}

/// What a transcoding result does to the catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscodeOutcome {
    Ready(TrackMedia),
    Failed,
}

impl TranscodingCompleted {
    pub fn track_id(&self) -> Result<TrackId> {
        parse_id::<TrackId>("track_id", &self.track_id)
    }

    /// Any status other than `ready` fails the track
    pub fn outcome(&self) -> TranscodeOutcome {
        if self.status.trim().eq_ignore_ascii_case("ready") {
            TranscodeOutcome::Ready(TrackMedia {
                audio_url: self.audio_url.clone(),
                cover_url: self.cover_url.clone(),
                duration_seconds: self.duration_seconds,
            })
        } else {
            TranscodeOutcome::Failed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRACK: &str = "6f1c3c1e-8a4b-4a38-9d55-0c5b4d3c2a10";
    const ARTIST: &str = "9a8b7c6d-5e4f-4a3b-8c2d-1e0f9a8b7c6d";

    #[test]
    fn test_decode_uploaded() {
        let payload = format!(
            r#"{{"track_id":"{}","title":"Intro","artist_id":"{}","artist_name":"The xx","genre":"indie"}}"#,
            TRACK, ARTIST
        );

        let event = TrackEvent::from_message("track.uploaded", payload.as_bytes())
            .unwrap()
            .unwrap();
        let TrackEvent::Uploaded(uploaded) = event else {
            panic!("expected upload event");
        };

        let track = uploaded.to_new_track().unwrap();
        assert_eq!(track.id.to_string(), TRACK);
        assert_eq!(track.title, "Intro");
        assert_eq!(track.genre.as_deref(), Some("indie"));
        assert_eq!(track.artist_ids.len(), 1);

        let artist = uploaded.inline_artist().unwrap().unwrap();
        assert_eq!(artist.name, "The xx");
    }

    #[test]
    fn test_decode_transcoding_outcomes() {
        let ready = format!(
            r#"{{"track_id":"{}","status":"ready","audio_url":"https://cdn/a.m3u8","duration_seconds":128}}"#,
            TRACK
        );
        let event = TrackEvent::from_message(TRACK_TRANSCODING_COMPLETED, ready.as_bytes())
            .unwrap()
            .unwrap();
        assert_eq!(event.event_type(), TRACK_TRANSCODING_COMPLETED);

        let TrackEvent::TranscodingCompleted(done) = event else {
            panic!("expected transcoding event");
        };
        assert_eq!(done.track_id().unwrap().to_string(), TRACK);
        assert!(matches!(
            done.outcome(),
            TranscodeOutcome::Ready(TrackMedia { duration_seconds: 128, .. })
        ));

        let failed = TranscodingCompleted {
            status: "error".to_string(),
            ..done
        };
        assert_eq!(failed.outcome(), TranscodeOutcome::Failed);
    }

    #[test]
    fn test_unknown_event_is_ignored() {
        let result = TrackEvent::from_message("track.liked", b"not even json").unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_malformed_payload() {
        let err = TrackEvent::from_message(TRACK_UPLOADED, b"{").unwrap_err();
        assert!(matches!(err, LibraryError::InvalidInput { .. }));
    }

    #[test]
    fn test_bad_uuid_in_payload() {
        let uploaded = TrackUploaded {
            track_id: "nope".to_string(),
            title: "x".to_string(),
            artist_ids: vec![],
            artist_id: None,
            artist_name: None,
            genre: None,
        };
        assert!(matches!(
            uploaded.to_new_track(),
            Err(LibraryError::InvalidInput { .. })
        ));
    }
}
