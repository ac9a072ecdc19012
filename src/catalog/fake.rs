//! In-memory catalog used by the server and recommendation tests.

use std::{
    collections::HashMap,
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
    thread,
    time::Duration,
};

use crate::{
    catalog::{
        Catalog,
        credential::{Credential, CredentialStore},
        error::{AuthError, UpstreamError},
    },
    domain::{artist::Artist, track::Track},
};

#[derive(Default)]
pub struct FakeCatalog {
    pub tracks: HashMap<String, Track>,
    pub search_results: Vec<Track>,
    pub artists: HashMap<String, Vec<Artist>>,
    pub top_tracks: HashMap<String, Vec<Track>>,
    /// slows every query down, to keep workers busy
    pub delay: Duration,
    pub fail_auth: AtomicBool,
    pub fail_upstream: AtomicBool,
    pub auth_calls: AtomicUsize,
    pub credential: CredentialStore,
}

impl FakeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_track(mut self, track: Track) -> Self {
        self.tracks.insert(track.id.clone(), track);
        self
    }

    pub fn with_search_results(mut self, tracks: Vec<Track>) -> Self {
        self.search_results = tracks;
        self
    }

    pub fn with_artist(mut self, name: &str, id: &str) -> Self {
        self.artists.entry(name.to_string()).or_default().push(Artist {
            id: id.to_string(),
            name: name.to_string(),
        });
        self
    }

    pub fn with_top_tracks(mut self, artist_id: &str, tracks: Vec<Track>) -> Self {
        self.top_tracks.insert(artist_id.to_string(), tracks);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// publishes a first credential, as server startup would
    pub fn authenticated(self) -> Self {
        self.credential
            .publish(Credential::new("token-0", "Bearer", 3600));
        self
    }

    pub fn set_fail_auth(&self, fail: bool) {
        self.fail_auth.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_upstream(&self, fail: bool) {
        self.fail_upstream.store(fail, Ordering::SeqCst);
    }

    pub fn auth_calls(&self) -> usize {
        self.auth_calls.load(Ordering::SeqCst)
    }

    fn query(&self) -> Result<(), UpstreamError> {
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        if self.fail_upstream.load(Ordering::SeqCst) {
            return Err(UpstreamError::Transport("connection reset".to_string()));
        }
        if self.credential.is_empty() {
            return Err(UpstreamError::NoCredential);
        }
        Ok(())
    }
}

impl Catalog for FakeCatalog {
    fn authenticate(&self) -> Result<(), AuthError> {
        let n = self.auth_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_auth.load(Ordering::SeqCst) {
            return Err(AuthError::Transport("token endpoint unreachable".to_string()));
        }
        self.credential
            .publish(Credential::new(format!("token-{n}"), "Bearer", 3600));
        Ok(())
    }

    fn search_tracks(&self, _query: &str, limit: u32) -> Result<Vec<Track>, UpstreamError> {
        self.query()?;
        Ok(self
            .search_results
            .iter()
            .take(limit as usize)
            .cloned()
            .collect())
    }

    fn search_artist_by_name(&self, name: &str) -> Result<Vec<Artist>, UpstreamError> {
        self.query()?;
        Ok(self.artists.get(name).cloned().unwrap_or_default())
    }

    fn get_top_tracks_for_artist(
        &self,
        artist_id: &str,
        _market: &str,
    ) -> Result<Vec<Track>, UpstreamError> {
        self.query()?;
        Ok(self.top_tracks.get(artist_id).cloned().unwrap_or_default())
    }

    fn get_track_by_id(&self, id: &str) -> Result<Track, UpstreamError> {
        self.query()?;
        self.tracks
            .get(id)
            .cloned()
            .ok_or_else(|| UpstreamError::NotFound(format!("track {id}")))
    }
}
