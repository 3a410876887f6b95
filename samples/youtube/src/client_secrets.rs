//! Loading of the OAuth client identity from a Google client secrets file.

use crate::error::Error;
use serde::Deserialize;
use std::path::Path;

const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// The client id/secret pair (plus provider endpoints) of an OAuth application.
///
/// Mirrors the `installed` (or `web`) section of the JSON file the Google API
/// console hands out.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

#[derive(Debug, Deserialize)]
struct ClientSecretsFile {
    installed: Option<ClientSecrets>,
    web: Option<ClientSecrets>,
}

impl ClientSecrets {
    /// Reads and validates the client secrets file at `path`.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!(
                "cannot read client secrets from {}: {e}",
                path.display()
            ))
        })?;
        let secrets = Self::from_json(&raw)?;
        tracing::debug!(path = %path.display(), client_id = %secrets.client_id, "loaded client secrets");
        Ok(secrets)
    }

    /// Parses and validates client secrets JSON.
    pub fn from_json(raw: &str) -> Result<Self, Error> {
        let file: ClientSecretsFile = serde_json::from_str(raw)
            .map_err(|e| Error::Configuration(format!("malformed client secrets: {e}")))?;
        let secrets = file.installed.or(file.web).ok_or_else(|| {
            Error::Configuration(
                "client secrets contain neither an `installed` nor a `web` section".to_string(),
            )
        })?;
        secrets.validate()?;
        Ok(secrets)
    }

    // The downloadable template ships with "Enter Client ID" / "Enter Client Secret".
    fn validate(&self) -> Result<(), Error> {
        let is_placeholder = |v: &str| v.trim().is_empty() || v.starts_with("Enter");
        if is_placeholder(&self.client_id) || is_placeholder(&self.client_secret) {
            return Err(Error::Configuration(
                "client secrets still contain placeholder values; download the real file \
                 from https://console.developers.google.com/project/_/apiui/credential"
                    .to_string(),
            ));
        }
        Ok(())
    }
}
