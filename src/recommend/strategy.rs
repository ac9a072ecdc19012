use std::sync::Arc;

use log::warn;

use crate::{
    catalog::Catalog,
    domain::track::Track,
    recommend::{RecommendError, RecommendationStrategy, artist_top_tracks},
};

/// Recommends the top tracks of the first seed's primary artist.
///
/// `truncate` decides whether the answer is cut down to the requested count.
pub struct ArtistTopTracks {
    catalog: Arc<dyn Catalog>,
    market: String,
    truncate: bool,
}

impl ArtistTopTracks {
    pub fn new(catalog: Arc<dyn Catalog>, market: impl Into<String>, truncate: bool) -> Self {
        Self {
            catalog,
            market: market.into(),
            truncate,
        }
    }

    pub fn truncating(catalog: Arc<dyn Catalog>, market: impl Into<String>) -> Self {
        Self::new(catalog, market, true)
    }

    pub fn passthrough(catalog: Arc<dyn Catalog>, market: impl Into<String>) -> Self {
        Self::new(catalog, market, false)
    }

    fn try_recommend(&self, seeds: &[Track], count: usize) -> Result<Vec<Track>, RecommendError> {
        let seed = seeds.first().ok_or(RecommendError::NoSeed)?;
        let mut tracks = artist_top_tracks(self.catalog.as_ref(), seed, &self.market)?;
        if self.truncate {
            tracks.truncate(count);
        }
        Ok(tracks)
    }
}

impl RecommendationStrategy for ArtistTopTracks {
    fn recommend(&self, seeds: &[Track], count: usize) -> Vec<Track> {
        match self.try_recommend(seeds, count) {
            Ok(tracks) => tracks,
            Err(e) => {
                warn!("{} produced no recommendations: {e}", self.name());
                Vec::new()
            }
        }
    }

    fn name(&self) -> &str {
        if self.truncate {
            "Artist-Based Top Tracks"
        } else {
            "Artist Top Tracks (untruncated)"
        }
    }
}
