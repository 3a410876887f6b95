use crate::scopes::ScopeSet;
use jiff::{SignedDuration, Timestamp};
use oauth2::TokenResponse;
use oauth2::basic::BasicTokenResponse;
use serde::{Deserialize, Serialize};

/// How long before the provider-reported expiry we already consider a token stale.
const EXPIRY_MARGIN: SignedDuration = SignedDuration::from_secs(300);

/// Lifetime assumed when the provider doesn't report `expires_in`.
const ASSUMED_LIFETIME: SignedDuration = SignedDuration::from_secs(3600);

/// An OAuth access/refresh token pair plus the metadata needed to reuse it.
///
/// This is what gets persisted in the token store, so it (de)serializes as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    /// The raw token response from the provider.
    token: BasicTokenResponse,
    /// When the access token stops being valid.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at: Option<Timestamp>,
    /// The scopes this credential was requested for.
    scopes: Vec<String>,
}

impl Credential {
    /// Wraps a fresh token response obtained for `scopes`.
    ///
    /// The expiry is computed from the response's `expires_in` relative to now.
    pub fn new(token: BasicTokenResponse, scopes: &ScopeSet) -> Self {
        Self {
            expires_at: Self::calculate_expiry(&token, Timestamp::now()),
            scopes: scopes.iter().map(String::from).collect(),
            token,
        }
    }

    pub fn access_token(&self) -> &str {
        self.token.access_token().secret()
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.token.refresh_token().map(|t| t.secret().as_str())
    }

    pub fn expires_at(&self) -> Option<Timestamp> {
        self.expires_at
    }

    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    /// Whether the access token should be refreshed before use at `now`.
    ///
    /// A stored credential without an expiry is treated as expired.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        let Some(expires_at) = self.expires_at else {
            return true;
        };
        match now.checked_add(EXPIRY_MARGIN) {
            Ok(deadline) => deadline >= expires_at,
            Err(_) => true,
        }
    }

    /// Replaces the token with a refreshed one.
    ///
    /// Google usually omits the refresh token from refresh responses, in which case the
    /// original refresh token is kept so that the credential stays refreshable.
    pub fn apply_refresh(&mut self, new_token: BasicTokenResponse) {
        let old_token = std::mem::replace(&mut self.token, new_token);
        if self.token.refresh_token().is_none() {
            tracing::trace!("new token lacks refresh token, preserving original");
            self.token
                .set_refresh_token(old_token.refresh_token().cloned());
        } else {
            tracing::debug!("new token includes refresh token");
        }
        self.expires_at = Self::calculate_expiry(&self.token, Timestamp::now());
    }

    fn calculate_expiry(token: &BasicTokenResponse, now: Timestamp) -> Option<Timestamp> {
        let expires_in = token
            .expires_in()
            .and_then(|d| SignedDuration::try_from(d).ok())
            .unwrap_or(ASSUMED_LIFETIME);
        now.checked_add(expires_in).ok()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::scopes::YOUTUBE_READONLY;
    use oauth2::basic::BasicTokenType;
    use oauth2::{AccessToken, EmptyExtraTokenFields, RefreshToken};
    use std::time::Duration;

    pub(crate) fn token(
        access: &str,
        refresh: Option<&str>,
        expires_in: Option<Duration>,
    ) -> BasicTokenResponse {
        let mut token = BasicTokenResponse::new(
            AccessToken::new(access.to_string()),
            BasicTokenType::Bearer,
            EmptyExtraTokenFields {},
        );
        token.set_refresh_token(refresh.map(|r| RefreshToken::new(r.to_string())));
        token.set_expires_in(expires_in.as_ref());
        token
    }

    fn readonly() -> ScopeSet {
        [YOUTUBE_READONLY].into_iter().collect()
    }

    #[test]
    fn fresh_token_is_not_expired() {
        let cred = Credential::new(
            token("a", Some("r"), Some(Duration::from_secs(3600))),
            &readonly(),
        );
        assert!(!cred.is_expired(Timestamp::now()));
        assert_eq!(cred.access_token(), "a");
        assert_eq!(cred.refresh_token(), Some("r"));
        assert_eq!(cred.scopes(), [YOUTUBE_READONLY.to_string()]);
    }

    #[test]
    fn token_inside_margin_is_expired() {
        let cred = Credential::new(token("a", None, Some(Duration::from_secs(60))), &readonly());
        assert!(cred.is_expired(Timestamp::now()));
    }

    #[test]
    fn token_without_expiry_assumes_an_hour() {
        let now = Timestamp::now();
        let cred = Credential::new(token("a", None, None), &readonly());
        let expires_at = cred.expires_at().unwrap();
        assert!(expires_at > now.checked_add(SignedDuration::from_mins(59)).unwrap());
        assert!(!cred.is_expired(now));
        // usable for 55 minutes once the margin is taken off
        assert!(cred.is_expired(now.checked_add(SignedDuration::from_mins(56)).unwrap()));
    }

    #[test]
    fn credential_without_stored_expiry_is_expired() {
        let mut cred = Credential::new(token("a", Some("r"), None), &readonly());
        cred.expires_at = None;
        assert!(cred.is_expired(Timestamp::now()));
    }

    #[test]
    fn refresh_preserves_refresh_token() {
        let mut cred = Credential::new(
            token("old", Some("keep-me"), Some(Duration::from_secs(10))),
            &readonly(),
        );
        cred.apply_refresh(token("new", None, Some(Duration::from_secs(3600))));
        assert_eq!(cred.access_token(), "new");
        assert_eq!(cred.refresh_token(), Some("keep-me"));
        assert!(!cred.is_expired(Timestamp::now()));
    }

    #[test]
    fn refresh_takes_rotated_refresh_token() {
        let mut cred = Credential::new(token("old", Some("r1"), None), &readonly());
        cred.apply_refresh(token("new", Some("r2"), None));
        assert_eq!(cred.refresh_token(), Some("r2"));
    }

    #[test]
    fn survives_json_round_trip() {
        let cred = Credential::new(
            token("a", Some("r"), Some(Duration::from_secs(3600))),
            &readonly(),
        );
        let json = serde_json::to_string(&cred).unwrap();
        let back: Credential = serde_json::from_str(&json).unwrap();
        assert_eq!(back.access_token(), "a");
        assert_eq!(back.refresh_token(), Some("r"));
        assert_eq!(back.expires_at(), cred.expires_at());
    }
}
