//! Access to the external music catalog.

use crate::domain::{artist::Artist, track::Track};

pub mod credential;
pub mod error;
#[cfg(test)]
pub(crate) mod fake;
pub mod spotify;

use error::{AuthError, UpstreamError};

/// Operations the server needs from the catalog service.
///
/// Implementations are shared by every connection worker and the credential
/// refresher, so they must be usable from many threads at once.
pub trait Catalog: Send + Sync {
    /// obtains a new credential and publishes it for subsequent calls
    fn authenticate(&self) -> Result<(), AuthError>;

    fn search_tracks(&self, query: &str, limit: u32) -> Result<Vec<Track>, UpstreamError>;

    /// best matches first; an empty list when nothing matches or the
    /// catalog answers with something unusable
    fn search_artist_by_name(&self, name: &str) -> Result<Vec<Artist>, UpstreamError>;

    fn get_top_tracks_for_artist(
        &self,
        artist_id: &str,
        market: &str,
    ) -> Result<Vec<Track>, UpstreamError>;

    fn get_track_by_id(&self, id: &str) -> Result<Track, UpstreamError>;
}
