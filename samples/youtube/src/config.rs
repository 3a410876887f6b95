//! Command-line and environment configuration shared by the sample programs.

use crate::error::Error;
use std::path::PathBuf;

/// Default port for the local OAuth redirect listener.
///
/// Must match a redirect URI registered for the OAuth client.
pub const DEFAULT_REDIRECT_PORT: u16 = 8080;

/// Where to find client secrets and where to keep cached credentials.
#[derive(Debug, Clone, clap::Args)]
pub struct AuthSettings {
    /// Path to the OAuth client secrets JSON downloaded from the Google API console.
    #[arg(
        long,
        env = "YOUTUBE_CLIENT_SECRETS",
        default_value = "client_secrets.json"
    )]
    pub client_secrets: PathBuf,

    /// Directory holding one cached credential file per datastore.
    ///
    /// Defaults to `~/.oauth-credentials`.
    #[arg(long, env = "YOUTUBE_CREDENTIALS_DIR")]
    pub credentials_dir: Option<PathBuf>,

    /// Local port the OAuth provider redirects back to after consent.
    #[arg(long, env = "YOUTUBE_REDIRECT_PORT", default_value_t = DEFAULT_REDIRECT_PORT)]
    pub redirect_port: u16,
}

impl AuthSettings {
    /// Resolves the credential store directory, falling back to `~/.oauth-credentials`.
    pub fn credentials_dir(&self) -> Result<PathBuf, Error> {
        if let Some(dir) = &self.credentials_dir {
            return Ok(dir.clone());
        }
        let home = dirs::home_dir().ok_or_else(|| {
            Error::Configuration(
                "cannot determine home directory; pass --credentials-dir".to_string(),
            )
        })?;
        Ok(home.join(".oauth-credentials"))
    }
}
