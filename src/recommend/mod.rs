//! Artist-based recommendations.
//!
//! The seed track's primary artist is resolved through a name search (first
//! match wins, no scoring) and that artist's top tracks are the answer.

use log::debug;
use thiserror::Error;

use crate::{
    catalog::{Catalog, error::UpstreamError},
    domain::track::Track,
};

pub mod engine;
pub mod strategy;

pub use engine::RecommendationEngine;
pub use strategy::ArtistTopTracks;

#[derive(Debug, Error)]
pub enum RecommendError {
    #[error("no seed tracks provided")]
    NoSeed,

    #[error("No artist found for track ID: {track_id}")]
    NoArtist { track_id: String },

    #[error("Artist not found: {0}")]
    ArtistNotFound(String),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

/// Something that turns seed tracks into recommended tracks.
///
/// Implementations never fail: anything that goes wrong yields an empty list.
pub trait RecommendationStrategy: Send + Sync {
    fn recommend(&self, seeds: &[Track], count: usize) -> Vec<Track>;

    fn name(&self) -> &str;
}

/// top tracks of the seed's primary artist in `market`
pub fn artist_top_tracks(
    catalog: &dyn Catalog,
    seed: &Track,
    market: &str,
) -> Result<Vec<Track>, RecommendError> {
    let artist_name = seed.primary_artist().ok_or_else(|| RecommendError::NoArtist {
        track_id: seed.id.clone(),
    })?;

    debug!("Getting top tracks for artist: {artist_name}");
    let artist = catalog
        .search_artist_by_name(artist_name)?
        .into_iter()
        .next()
        .ok_or_else(|| RecommendError::ArtistNotFound(artist_name.to_string()))?;
    debug!("Resolved '{artist_name}' to {artist} ({})", artist.id);

    Ok(catalog.get_top_tracks_for_artist(&artist.id, market)?)
}
