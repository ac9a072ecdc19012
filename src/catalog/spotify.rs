//! Catalog client for the Spotify Web API, backed by a blocking `ureq` agent.

use std::{sync::Arc, time::Duration};

use base64::{Engine as _, engine::general_purpose::STANDARD};
use log::{debug, info, warn};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::Value;

use crate::{
    catalog::{
        Catalog,
        credential::{Credential, CredentialStore},
        error::{AuthError, UpstreamError},
    },
    config::CatalogConfig,
    domain::{artist::Artist, track::Track},
};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

pub struct SpotifyCatalog {
    agent: ureq::Agent,
    api_base_url: String,
    token_url: String,
    client_id: String,
    client_secret: String,
    artist_search_limit: u32,
    credential: CredentialStore,
}

impl SpotifyCatalog {
    pub fn new(config: &CatalogConfig, client_id: String, client_secret: String) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(CONNECT_TIMEOUT.min(config.timeout()))
            .timeout(config.timeout())
            .build();

        Self {
            agent,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            token_url: config.token_url.clone(),
            client_id,
            client_secret,
            artist_search_limit: config.artist_search_limit.max(1),
            credential: CredentialStore::new(),
        }
    }

    /// builds a client whose id/secret come from the config file or the environment
    pub fn from_config(config: &CatalogConfig) -> Result<Self, AuthError> {
        let (id, secret) = config
            .client_credentials()
            .map_err(|e| AuthError::MissingClientCredentials(e.to_string()))?;
        Ok(Self::new(config, id, secret))
    }

    pub fn credential(&self) -> Option<Arc<Credential>> {
        self.credential.load()
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.api_base_url, path)
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, UpstreamError> {
        let credential = self.credential.load().ok_or(UpstreamError::NoCredential)?;

        let mut request = self
            .agent
            .get(&self.api_url(path))
            .set("Authorization", &credential.authorization_header());
        for (key, value) in query {
            request = request.query(key, value);
        }

        debug!("GET {path}");
        let response = request.call()?;
        response
            .into_json::<T>()
            .map_err(|e| UpstreamError::Decode(e.to_string()))
    }

    fn parse_artists(body: &Value) -> Vec<Artist> {
        if let Some(error) = body.get("error") {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("Unknown error");
            warn!("Catalog API error during artist search: {message}");
            return Vec::new();
        }

        let Some(items) = body
            .get("artists")
            .and_then(|artists| artists.get("items"))
            .and_then(Value::as_array)
        else {
            warn!("Artist search response has no artists.items array");
            return Vec::new();
        };

        items
            .iter()
            .filter_map(|item| match ArtistObject::deserialize(item) {
                Ok(artist) => Some(artist.into()),
                Err(e) => {
                    warn!("Skipping malformed artist in search response: {e}");
                    None
                }
            })
            .collect()
    }
}

impl Catalog for SpotifyCatalog {
    fn authenticate(&self) -> Result<(), AuthError> {
        let basic = STANDARD.encode(format!("{}:{}", self.client_id, self.client_secret));

        let response = match self
            .agent
            .post(&self.token_url)
            .set("Authorization", &format!("Basic {basic}"))
            .send_form(&[("grant_type", "client_credentials")])
        {
            Ok(response) => response,
            Err(ureq::Error::Status(status, response)) => {
                let body = response.into_string().unwrap_or_default();
                return Err(AuthError::Rejected { status, body });
            }
            Err(ureq::Error::Transport(transport)) => {
                return Err(AuthError::Transport(transport.to_string()));
            }
        };

        let token: TokenResponse = response
            .into_json()
            .map_err(|e| AuthError::Decode(e.to_string()))?;

        let credential = Credential::new(token.access_token, token.token_type, token.expires_in);
        let expires_at = credential.expires_at();
        self.credential.publish(credential);

        info!("Authenticated with catalog API, token advertised until {expires_at}");
        Ok(())
    }

    fn search_tracks(&self, query: &str, limit: u32) -> Result<Vec<Track>, UpstreamError> {
        let limit = limit.to_string();
        let page: SearchTracksResponse = self.get_json(
            "/search",
            &[("q", query), ("type", "track"), ("limit", &limit)],
        )?;

        Ok(page
            .tracks
            .items
            .into_iter()
            .flatten()
            .map(Track::from)
            .collect())
    }

    fn search_artist_by_name(&self, name: &str) -> Result<Vec<Artist>, UpstreamError> {
        let limit = self.artist_search_limit.to_string();
        let result = self.get_json::<Value>(
            "/search",
            &[("q", name), ("type", "artist"), ("limit", &limit)],
        );

        match result {
            Ok(body) => Ok(Self::parse_artists(&body)),
            Err(e @ (UpstreamError::Transport(_) | UpstreamError::NoCredential)) => Err(e),
            Err(e) => {
                warn!("Artist search for '{name}' failed, treating as no match: {e}");
                Ok(Vec::new())
            }
        }
    }

    fn get_top_tracks_for_artist(
        &self,
        artist_id: &str,
        market: &str,
    ) -> Result<Vec<Track>, UpstreamError> {
        let path = format!("/artists/{}/top-tracks", urlencoding::encode(artist_id));
        let top: TopTracksResponse = self.get_json(&path, &[("market", market)])?;
        Ok(top.tracks.into_iter().map(Track::from).collect())
    }

    fn get_track_by_id(&self, id: &str) -> Result<Track, UpstreamError> {
        let path = format!("/tracks/{}", urlencoding::encode(id));
        match self.get_json::<TrackObject>(&path, &[]) {
            Ok(track) => Ok(track.into()),
            // the API answers 400 for ids that are not even well-formed
            Err(UpstreamError::Status(400 | 404)) => {
                Err(UpstreamError::NotFound(format!("track {id}")))
            }
            Err(e) => Err(e),
        }
    }
}

// Wire objects. Only the fields the server exposes are decoded; a missing
// required field fails the whole object so no half-built Track escapes.

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_token_type")]
    token_type: String,
    #[serde(default)]
    expires_in: u32,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

#[derive(Debug, Deserialize)]
struct Paging<T> {
    items: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct SearchTracksResponse {
    tracks: Paging<Option<TrackObject>>,
}

#[derive(Debug, Deserialize)]
struct TopTracksResponse {
    tracks: Vec<TrackObject>,
}

#[derive(Debug, Deserialize)]
struct NamedObject {
    name: String,
}

#[derive(Debug, Deserialize)]
struct TrackObject {
    id: String,
    name: String,
    artists: Vec<NamedObject>,
    album: NamedObject,
    duration_ms: u32,
    #[serde(default)]
    popularity: u32,
    #[serde(default)]
    preview_url: Option<String>,
}

impl From<TrackObject> for Track {
    fn from(object: TrackObject) -> Self {
        Track {
            id: object.id,
            name: object.name,
            artists: object.artists.into_iter().map(|a| a.name).collect(),
            album_name: object.album.name,
            duration_ms: object.duration_ms,
            popularity: object.popularity,
            preview_url: object.preview_url,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ArtistObject {
    id: String,
    name: String,
}

impl From<ArtistObject> for Artist {
    fn from(object: ArtistObject) -> Self {
        Artist {
            id: object.id,
            name: object.name,
        }
    }
}
