//! Channel credential entities.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Seconds of slack before the recorded expiry at which a token counts as expired.
const EXPIRY_SKEW_SECS: i64 = 60;

/// Opaque token bundle for one authorized channel.
///
/// Carries everything needed to call the platform API and to refresh the
/// access token without going through the browser flow again.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthMaterial {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub token_uri: String,
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    /// When the access token stops being accepted, if the token endpoint said.
    #[serde(default)]
    pub expiry: Option<DateTime<Utc>>,
}

impl AuthMaterial {
    /// `true` when the access token is past (or about to pass) its expiry.
    ///
    /// Material without a recorded expiry is assumed valid; the platform
    /// answers with `AuthExpired` if it is not.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiry
            .is_some_and(|expiry| expiry - Duration::seconds(EXPIRY_SKEW_SECS) <= now)
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }
}

// Tokens stay out of Debug output so they never reach diagnostic logs.
impl fmt::Debug for AuthMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthMaterial")
            .field("access_token", &"<redacted>")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "<redacted>"),
            )
            .field("token_uri", &self.token_uri)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("scopes", &self.scopes)
            .field("expiry", &self.expiry)
            .finish()
    }
}

/// Authorization material saved for a named channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelCredential {
    pub channel_name: String,
    pub channel_id: String,
    pub auth_material: AuthMaterial,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
}
