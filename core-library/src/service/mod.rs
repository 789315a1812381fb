//! # Service Layer
//!
//! Boundary-facing operations over the repositories. Services accept the
//! identifiers and pagination values a transport hands them, so they:
//!
//! - parse UUID strings (malformed input is `InvalidInput`)
//! - normalize `limit`/`offset`
//! - turn absent rows and zero-row deletes into `NotFound`
//! - bound each storage call by the configured query deadline
//!
//! Callers cancel an operation by dropping its future; an open transaction is
//! rolled back when it is dropped.

pub mod playlists;
pub mod tracks;

pub use playlists::{
    CreatePlaylistRequest, PlaylistService, TrackPlacement, UpdatePlaylistRequest,
};
pub use tracks::{CreateTrackRequest, TrackService, UpdateTrackRequest};

use crate::error::{LibraryError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;
use tracing::warn;

/// Await `operation`, failing with `Timeout` once `deadline` elapses.
pub(crate) async fn with_deadline<T, F>(
    deadline: Option<Duration>,
    operation: &'static str,
    future: F,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    let Some(limit) = deadline else {
        return future.await;
    };

    match timeout(limit, future).await {
        Ok(result) => result,
        Err(_) => {
            warn!(operation, timeout_ms = limit.as_millis() as u64, "Operation timed out");
            Err(LibraryError::Timeout(limit))
        }
    }
}
