//! The catalog access token and the holder it is published through.

use std::{fmt, sync::Arc};

use arc_swap::ArcSwapOption;
use chrono::{DateTime, TimeDelta, Utc};

/// Access token for catalog calls.
///
/// The advertised lifetime is informational: the refresher works on a fixed
/// cadence and nothing checks expiry before a call.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    access_token: String,
    pub token_type: String,
    pub obtained_at: DateTime<Utc>,
    pub expires_in_secs: u32,
}

impl Credential {
    pub fn new(
        access_token: impl Into<String>,
        token_type: impl Into<String>,
        expires_in_secs: u32,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: token_type.into(),
            obtained_at: Utc::now(),
            expires_in_secs,
        }
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.obtained_at + TimeDelta::seconds(i64::from(self.expires_in_secs))
    }

    pub fn authorization_header(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("obtained_at", &self.obtained_at)
            .field("expires_in_secs", &self.expires_in_secs)
            .finish()
    }
}

/// Single process-wide slot for the current credential.
///
/// Writers replace the whole `Arc`, so a reader holds either the old or the
/// new credential, never a mix of both.
#[derive(Default)]
pub struct CredentialStore {
    current: ArcSwapOption<Credential>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&self) -> Option<Arc<Credential>> {
        self.current.load_full()
    }

    /// publishes a fresh credential, returning the one it replaced
    pub fn publish(&self, credential: Credential) -> Option<Arc<Credential>> {
        self.current.swap(Some(Arc::new(credential)))
    }

    pub fn is_empty(&self) -> bool {
        self.current.load().is_none()
    }
}
