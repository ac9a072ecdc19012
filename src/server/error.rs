use std::io;

use thiserror::Error;

use crate::{
    catalog::error::{AuthError, UpstreamError},
    recommend::RecommendError,
    server::protocol::{ProtocolError, Response},
};

/// Failures that stop the server from starting.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("initial authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("failed to start server thread: {0}")]
    Spawn(#[source] io::Error),
}

/// Failures that end a single client connection.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("failed to configure socket: {0}")]
    Setup(#[source] io::Error),

    #[error("read failed: {0}")]
    Read(#[source] io::Error),

    #[error("write failed: {0}")]
    Write(#[source] io::Error),
}

/// A request that could not be answered with data. Every variant becomes an
/// error envelope; the connection stays open.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("Search failed: {0}")]
    Search(UpstreamError),

    #[error("Track not found: {0}")]
    TrackNotFound(String),

    #[error("Recommendation failed: {0}")]
    Upstream(UpstreamError),

    #[error(transparent)]
    Recommend(RecommendError),
}

impl From<RecommendError> for HandlerError {
    fn from(err: RecommendError) -> Self {
        match err {
            RecommendError::Upstream(e) => HandlerError::Upstream(e),
            other => HandlerError::Recommend(other),
        }
    }
}

impl HandlerError {
    /// the catalog turned the current credential down
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            HandlerError::Search(UpstreamError::Unauthorized)
                | HandlerError::Upstream(UpstreamError::Unauthorized)
        )
    }

    pub fn into_response(self) -> Response {
        Response::error(self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(err: HandlerError) -> String {
        match err.into_response() {
            Response::Error { message } => message,
            other => panic!("expected an error envelope, got {other:?}"),
        }
    }

    #[test]
    fn test_handler_error_messages() {
        assert_eq!(
            message(ProtocolError::UnknownAction("FOO".into()).into()),
            "Unknown action: FOO"
        );
        assert_eq!(
            message(HandlerError::TrackNotFound("abc".into())),
            "Track not found: abc"
        );
        assert_eq!(
            message(HandlerError::Search(UpstreamError::Status(503))),
            "Search failed: status code: 503"
        );
        assert_eq!(
            message(RecommendError::ArtistNotFound("Nobody".into()).into()),
            "Artist not found: Nobody"
        );
        assert_eq!(
            message(
                RecommendError::NoArtist {
                    track_id: "abc".into()
                }
                .into()
            ),
            "No artist found for track ID: abc"
        );
    }

    #[test]
    fn test_upstream_recommend_failure_is_wrapped() {
        let err: HandlerError = RecommendError::Upstream(UpstreamError::Unauthorized).into();

        assert!(err.is_auth_failure());
        assert!(message(err).starts_with("Recommendation failed: "));
    }
}
