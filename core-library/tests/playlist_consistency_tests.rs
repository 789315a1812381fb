//! End-to-end behaviour of the catalog and playlist services over an
//! in-memory database.

use core_library::events::TrackEvent;
use core_library::models::{Artist, ArtistId, TrackId, TrackMedia, TrackStatus, UserId};
use core_library::service::{
    CreatePlaylistRequest, CreateTrackRequest, TrackPlacement, UpdatePlaylistRequest,
};
use core_library::{ErrorKind, Library};
use core_runtime::CoreConfig;

async fn open_library() -> Library {
    let config = CoreConfig::builder()
        .database_url("sqlite::memory:")
        .build()
        .unwrap();
    Library::open(&config).await.unwrap()
}

async fn seed_artist(library: &Library, name: &str) -> ArtistId {
    let id = ArtistId::new();
    library.artists().upsert(&Artist::new(id, name)).await.unwrap();
    id
}

async fn seed_track(library: &Library, title: &str, artist: ArtistId) -> TrackId {
    library
        .tracks()
        .create_track(CreateTrackRequest {
            track_id: None,
            title: title.to_string(),
            genre: None,
            artist_ids: vec![artist.to_string()],
        })
        .await
        .unwrap()
        .id
}

async fn seed_ready_track(library: &Library, title: &str, artist: ArtistId) -> TrackId {
    let id = seed_track(library, title, artist).await;
    library
        .tracks()
        .mark_ready(
            &id.to_string(),
            TrackMedia {
                audio_url: format!("https://cdn.example/{}.m3u8", id),
                cover_url: None,
                duration_seconds: 200,
            },
        )
        .await
        .unwrap();
    id
}

fn placements(ids: &[TrackId]) -> Vec<TrackPlacement> {
    ids.iter()
        .enumerate()
        .map(|(i, id)| TrackPlacement {
            track_id: id.to_string(),
            position: i as i64,
        })
        .collect()
}

fn playlist_request(name: &str, tracks: Vec<TrackPlacement>) -> CreatePlaylistRequest {
    CreatePlaylistRequest {
        name: name.to_string(),
        description: None,
        is_private: false,
        tracks,
    }
}

#[tokio::test]
async fn test_created_playlist_keeps_requested_order() {
    let library = open_library().await;
    let artist = seed_artist(&library, "Portishead").await;
    let t1 = seed_track(&library, "Roads", artist).await;
    let t2 = seed_track(&library, "Sour Times", artist).await;
    let owner = UserId::new();

    let created = library
        .playlists()
        .create_playlist(&owner.to_string(), playlist_request("Dummy", placements(&[t1, t2])))
        .await
        .unwrap();

    let fetched = library
        .playlists()
        .get_playlist(&created.id.to_string())
        .await
        .unwrap();
    let order: Vec<TrackId> = fetched.tracks.iter().map(|t| t.track_id).collect();
    assert_eq!(order, vec![t1, t2]);

    let first = fetched.tracks[0].track.as_ref().unwrap();
    assert_eq!(first.title, "Roads");
    assert_eq!(first.artists[0].name, "Portishead");
}

#[tokio::test]
async fn test_road_trip_remove_middle_track() {
    let library = open_library().await;
    let artist = seed_artist(&library, "Kraftwerk").await;
    let a = seed_track(&library, "Autobahn", artist).await;
    let b = seed_track(&library, "Trans-Europe Express", artist).await;
    let c = seed_track(&library, "Computer Love", artist).await;

    let playlists = library.playlists();
    let playlist = playlists
        .create_playlist(
            &UserId::new().to_string(),
            playlist_request("Road Trip", placements(&[a, b, c])),
        )
        .await
        .unwrap();
    let id = playlist.id.to_string();

    playlists
        .remove_track_from_playlist(&id, &b.to_string())
        .await
        .unwrap();

    let tracks = playlists.get_playlist_tracks(&id).await.unwrap();
    let order: Vec<TrackId> = tracks.iter().map(|t| t.track_id).collect();
    assert_eq!(order, vec![a, c]);

    // removing it again is an error
    let err = playlists
        .remove_track_from_playlist(&id, &b.to_string())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_adding_twice_moves_the_track() {
    let library = open_library().await;
    let playlists = library.playlists();
    let playlist = playlists
        .create_playlist(&UserId::new().to_string(), playlist_request("Queue", Vec::new()))
        .await
        .unwrap();
    let id = playlist.id.to_string();
    let track = TrackId::new().to_string();

    playlists.add_track_to_playlist(&id, &track, 3).await.unwrap();
    playlists.add_track_to_playlist(&id, &track, 9).await.unwrap();

    let tracks = playlists.get_playlist_tracks(&id).await.unwrap();
    assert_eq!(tracks.len(), 1);
    assert_eq!(tracks[0].position, 9);
    assert!(tracks[0].track.is_none());
}

#[tokio::test]
async fn test_equal_positions_keep_insertion_order() {
    let library = open_library().await;
    let playlists = library.playlists();
    let playlist = playlists
        .create_playlist(&UserId::new().to_string(), playlist_request("Ties", Vec::new()))
        .await
        .unwrap();
    let id = playlist.id.to_string();

    let inserted: Vec<TrackId> = (0..4).map(|_| TrackId::new()).collect();
    for track in &inserted {
        playlists
            .add_track_to_playlist(&id, &track.to_string(), 1)
            .await
            .unwrap();
    }

    let order: Vec<TrackId> = playlists
        .get_playlist_tracks(&id)
        .await
        .unwrap()
        .iter()
        .map(|t| t.track_id)
        .collect();
    assert_eq!(order, inserted);
}

#[tokio::test]
async fn test_subscribing_twice_lists_playlist_once() {
    let library = open_library().await;
    let playlists = library.playlists();
    let owner = UserId::new();
    let follower = UserId::new().to_string();

    let playlist = playlists
        .create_playlist(&owner.to_string(), playlist_request("Shared", Vec::new()))
        .await
        .unwrap();
    let id = playlist.id.to_string();

    playlists.subscribe_user(&follower, &id).await.unwrap();
    playlists.subscribe_user(&follower, &id).await.unwrap();

    let listed = playlists.get_user_playlists(&follower, 0, 0).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, playlist.id);
    assert_eq!(listed[0].owner_id, owner);

    playlists.unsubscribe_user(&follower, &id).await.unwrap();
    assert!(playlists
        .get_user_playlists(&follower, 0, 0)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_list_limits_are_normalized() {
    let library = open_library().await;
    let playlists = library.playlists();
    let owner = UserId::new().to_string();

    for i in 0..105 {
        playlists
            .create_playlist(&owner, playlist_request(&format!("Mix {}", i), Vec::new()))
            .await
            .unwrap();
    }

    assert_eq!(playlists.list_playlists(0, 0, None).await.unwrap().len(), 20);
    assert_eq!(playlists.list_playlists(500, 0, None).await.unwrap().len(), 100);
    assert_eq!(
        playlists.list_playlists(50, -5, Some(&owner)).await.unwrap().len(),
        50
    );
}

#[tokio::test]
async fn test_catalog_reads_only_return_ready_tracks() {
    let library = open_library().await;
    let artist = seed_artist(&library, "Burial").await;
    let ready = seed_ready_track(&library, "Archangel", artist).await;
    let pending = seed_track(&library, "Archangel (demo)", artist).await;

    let tracks = library.tracks();
    let listed = tracks.list_tracks(0, 0, None).await.unwrap();
    assert_eq!(listed.iter().map(|t| t.id).collect::<Vec<_>>(), vec![ready]);

    let by_artist = tracks
        .list_tracks(10, 0, Some(&artist.to_string()))
        .await
        .unwrap();
    assert_eq!(by_artist.len(), 1);

    let found = tracks.search_tracks("archangel", 10, 0).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, ready);
    assert!(found.iter().all(|t| t.status == TrackStatus::Ready));

    // the pending track is still readable by id
    let direct = tracks.get_track(&pending.to_string()).await.unwrap();
    assert_eq!(direct.status, TrackStatus::Uploaded);
}

#[tokio::test]
async fn test_ready_without_audio_leaves_row_unchanged() {
    let library = open_library().await;
    let artist = seed_artist(&library, "Moderat").await;
    let id = seed_track(&library, "Bad Kingdom", artist).await.to_string();

    let err = library
        .tracks()
        .mark_ready(
            &id,
            TrackMedia {
                audio_url: String::new(),
                cover_url: None,
                duration_seconds: 240,
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    let track = library.tracks().get_track(&id).await.unwrap();
    assert_eq!(track.status, TrackStatus::Uploaded);
    assert!(track.audio_url.is_none());
    assert_eq!(track.duration_seconds, 0);
}

#[tokio::test]
async fn test_deleting_missing_rows_is_not_found() {
    let library = open_library().await;

    let err = library
        .playlists()
        .delete_playlist(&UserId::new().to_string())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = library
        .tracks()
        .delete_track(&TrackId::new().to_string())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_update_replaces_tracks_and_clears_description() {
    let library = open_library().await;
    let playlists = library.playlists();
    let first = TrackId::new();
    let second = TrackId::new();

    let playlist = playlists
        .create_playlist(
            &UserId::new().to_string(),
            CreatePlaylistRequest {
                description: Some("for the drive".to_string()),
                ..playlist_request("Evening", placements(&[first]))
            },
        )
        .await
        .unwrap();
    let id = playlist.id.to_string();

    let updated = playlists
        .update_playlist(
            &id,
            UpdatePlaylistRequest {
                description: Some(String::new()),
                tracks: Some(placements(&[second, first])),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.name, "Evening");
    assert!(updated.description.is_none());
    let order: Vec<TrackId> = updated.tracks.iter().map(|t| t.track_id).collect();
    assert_eq!(order, vec![second, first]);
}

#[tokio::test]
async fn test_upload_and_transcode_events() {
    let library = open_library().await;
    let track_id = TrackId::new();
    let artist_id = ArtistId::new();

    let uploaded = format!(
        r#"{{"track_id":"{}","title":"Nightcall","artist_id":"{}","artist_name":"Kavinsky"}}"#,
        track_id, artist_id
    );
    let event = TrackEvent::from_message("track.uploaded", uploaded.as_bytes())
        .unwrap()
        .unwrap();
    library.tracks().handle_event(event.clone()).await.unwrap();
    // redelivery is harmless
    library.tracks().handle_event(event).await.unwrap();

    let transcoded = format!(
        r#"{{"track_id":"{}","status":"ready","audio_url":"https://cdn.example/nightcall.m3u8","duration_seconds":258}}"#,
        track_id
    );
    let event = TrackEvent::from_message("track.transcoding.completed", transcoded.as_bytes())
        .unwrap()
        .unwrap();
    library.tracks().handle_event(event).await.unwrap();

    let track = library
        .tracks()
        .get_track(&track_id.to_string())
        .await
        .unwrap();
    assert!(track.is_ready());
    assert_eq!(track.duration_seconds, 258);
    assert_eq!(track.cover_url.as_deref(), Some("/static/covers/default.png"));
    assert_eq!(track.artists[0].name, "Kavinsky");
}
