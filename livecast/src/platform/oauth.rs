//! OAuth client configuration and token responses.
//!
//! The browser redirect is the caller's concern; this module builds the
//! authorization URL and turns token endpoint answers into [`AuthMaterial`].

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use super::PlatformError;
use crate::domain::AuthMaterial;

/// Scope needed to manage live broadcasts.
pub const YOUTUBE_SCOPE: &str = "https://www.googleapis.com/auth/youtube";

pub const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// OAuth client settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    pub redirect_uri: String,
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
}

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

fn default_scopes() -> Vec<String> {
    vec![YOUTUBE_SCOPE.to_string()]
}

/// Shape of a Google `client_secrets.json` entry.
#[derive(Debug, Deserialize)]
struct ClientSecretsEntry {
    client_id: String,
    client_secret: String,
    #[serde(default)]
    auth_uri: Option<String>,
    #[serde(default)]
    token_uri: Option<String>,
    #[serde(default)]
    redirect_uris: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ClientSecretsFile {
    #[serde(default)]
    installed: Option<ClientSecretsEntry>,
    #[serde(default)]
    web: Option<ClientSecretsEntry>,
}

impl OAuthConfig {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            auth_uri: default_auth_uri(),
            token_uri: default_token_uri(),
            redirect_uri: redirect_uri.into(),
            scopes: default_scopes(),
        }
    }

    /// Parse a `client_secrets.json` document (`installed` or `web` shape).
    ///
    /// `redirect_uri` overrides the first redirect URI listed in the file.
    pub fn from_client_secrets_json(
        json: &str,
        redirect_uri: Option<&str>,
    ) -> Result<Self, PlatformError> {
        let file: ClientSecretsFile = serde_json::from_str(json)
            .map_err(|e| PlatformError::ConfigInvalid(format!("client secrets: {e}")))?;
        let entry = file.installed.or(file.web).ok_or_else(|| {
            PlatformError::ConfigInvalid(
                "client secrets must contain an 'installed' or 'web' section".to_string(),
            )
        })?;

        let redirect_uri = redirect_uri
            .map(str::to_string)
            .or_else(|| entry.redirect_uris.into_iter().next())
            .ok_or_else(|| PlatformError::ConfigInvalid("no redirect URI configured".to_string()))?;

        let config = Self {
            client_id: entry.client_id,
            client_secret: entry.client_secret,
            auth_uri: entry.auth_uri.unwrap_or_else(default_auth_uri),
            token_uri: entry.token_uri.unwrap_or_else(default_token_uri),
            redirect_uri,
            scopes: default_scopes(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), PlatformError> {
        if self.client_id.trim().is_empty() {
            return Err(PlatformError::ConfigInvalid("client_id is empty".to_string()));
        }
        if self.client_secret.trim().is_empty() {
            return Err(PlatformError::ConfigInvalid(
                "client_secret is empty".to_string(),
            ));
        }
        if self.scopes.is_empty() {
            return Err(PlatformError::ConfigInvalid("no scopes configured".to_string()));
        }
        for (name, value) in [
            ("auth_uri", &self.auth_uri),
            ("token_uri", &self.token_uri),
            ("redirect_uri", &self.redirect_uri),
        ] {
            Url::parse(value)
                .map_err(|e| PlatformError::ConfigInvalid(format!("{name} '{value}': {e}")))?;
        }
        Ok(())
    }

    /// URL the user opens to grant access. `state` is echoed back on redirect.
    pub fn authorization_url(&self, state: Option<&str>) -> Result<String, PlatformError> {
        self.validate()?;
        let mut url = Url::parse(&self.auth_uri)
            .map_err(|e| PlatformError::ConfigInvalid(format!("auth_uri: {e}")))?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("response_type", "code")
                .append_pair("client_id", &self.client_id)
                .append_pair("redirect_uri", &self.redirect_uri)
                .append_pair("scope", &self.scopes.join(" "))
                .append_pair("access_type", "offline")
                .append_pair("prompt", "consent");
            if let Some(state) = state {
                query.append_pair("state", state);
            }
        }
        Ok(url.into())
    }
}

/// Token endpoint response.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub scope: Option<String>,
}

impl TokenResponse {
    /// Build the stored bundle.
    ///
    /// Refresh responses usually omit `refresh_token`; `previous_refresh`
    /// carries the one already held.
    pub fn into_auth_material(
        self,
        client_id: &str,
        client_secret: &str,
        token_uri: &str,
        previous_refresh: Option<String>,
    ) -> AuthMaterial {
        let scopes = self
            .scope
            .map(|s| s.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();
        AuthMaterial {
            access_token: self.access_token,
            refresh_token: self.refresh_token.or(previous_refresh),
            token_uri: token_uri.to_string(),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            scopes,
            expiry: self.expires_in.map(|secs| Utc::now() + Duration::seconds(secs)),
        }
    }
}
