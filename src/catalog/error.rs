use thiserror::Error;

/// Failure to obtain or refresh the catalog credential
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("client credentials missing: {0}")]
    MissingClientCredentials(String),

    #[error("token grant rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("token request failed: {0}")]
    Transport(String),

    #[error("token response could not be decoded: {0}")]
    Decode(String),
}

/// Failure of a single catalog query
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("no credential available yet")]
    NoCredential,

    #[error("request unauthorized")]
    Unauthorized,

    #[error("{0} not found")]
    NotFound(String),

    #[error("status code: {0}")]
    Status(u16),

    #[error("request error: {0}")]
    Transport(String),

    #[error("json parse error: {0}")]
    Decode(String),
}

impl From<ureq::Error> for UpstreamError {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::Status(401, _) => Self::Unauthorized,
            ureq::Error::Status(code, _) => Self::Status(code),
            ureq::Error::Transport(transport) => Self::Transport(transport.to_string()),
        }
    }
}
