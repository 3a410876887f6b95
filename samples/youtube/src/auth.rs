//! Authorization with a file-backed credential cache.
//!
//! [`Authorizer::authorize`] hands out a [`Credential`] for a set of scopes. A credential
//! cached under the same datastore name is reused (refreshing it first if it has expired);
//! only when there is nothing usable on disk does the user get sent through the browser
//! consent flow.

use crate::client_secrets::ClientSecrets;
use crate::config::AuthSettings;
use crate::credential::Credential;
use crate::error::Error;
use crate::oauth::OAuthManager;
use crate::scopes::ScopeSet;
use crate::token_store::{FileTokenStore, USER_KEY};
use jiff::Timestamp;
use oauth2::basic::BasicTokenResponse;
use std::future::Future;
use std::sync::Arc;
use tracing::instrument;

/// Something that can obtain tokens from an OAuth provider.
///
/// [`OAuthManager`] is the real implementation.
pub trait TokenProvider {
    /// Runs the interactive consent flow for `scopes`.
    fn authenticate(
        &self,
        scopes: &ScopeSet,
    ) -> impl Future<Output = eyre::Result<BasicTokenResponse>> + Send;

    /// Exchanges a refresh token; `Ok(None)` means the grant is no longer valid.
    fn refresh_token(
        &self,
        refresh_token: &str,
    ) -> impl Future<Output = eyre::Result<Option<BasicTokenResponse>>> + Send;
}

impl TokenProvider for OAuthManager {
    async fn authenticate(&self, scopes: &ScopeSet) -> eyre::Result<BasicTokenResponse> {
        OAuthManager::authenticate(self, scopes).await
    }

    async fn refresh_token(&self, refresh_token: &str) -> eyre::Result<Option<BasicTokenResponse>> {
        OAuthManager::refresh_token(self, refresh_token).await
    }
}

impl<P: TokenProvider + Send + Sync> TokenProvider for Arc<P> {
    async fn authenticate(&self, scopes: &ScopeSet) -> eyre::Result<BasicTokenResponse> {
        (**self).authenticate(scopes).await
    }

    async fn refresh_token(&self, refresh_token: &str) -> eyre::Result<Option<BasicTokenResponse>> {
        (**self).refresh_token(refresh_token).await
    }
}

/// Obtains credentials, preferring ones cached in a [`FileTokenStore`].
#[derive(Debug, Clone)]
pub struct Authorizer<P = Arc<OAuthManager>> {
    provider: P,
    store: FileTokenStore,
}

impl Authorizer<Arc<OAuthManager>> {
    /// Builds an authorizer from command-line/environment settings.
    ///
    /// Fails with [`Error::Configuration`] if the client secrets are missing or still hold
    /// placeholder values.
    pub fn from_settings(settings: &AuthSettings) -> Result<Self, Error> {
        let secrets = ClientSecrets::load(&settings.client_secrets)?;
        let provider = Arc::new(OAuthManager::new(secrets, settings.redirect_port));
        let store = FileTokenStore::new(settings.credentials_dir()?);
        Ok(Self::new(provider, store))
    }
}

impl<P: TokenProvider> Authorizer<P> {
    pub fn new(provider: P, store: FileTokenStore) -> Self {
        Self { provider, store }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn store(&self) -> &FileTokenStore {
        &self.store
    }

    /// Returns a credential for `scopes`, cached under `datastore`.
    ///
    /// 1. A stored, unexpired credential is returned as is.
    /// 2. A stored, expired credential with a refresh token is refreshed and re-stored.
    /// 3. Otherwise the user goes through the consent flow and the result is stored.
    #[instrument(skip(self, scopes), fields(%scopes))]
    pub async fn authorize(&self, scopes: &ScopeSet, datastore: &str) -> Result<Credential, Error> {
        if let Some(credential) = self.store.load(datastore, USER_KEY).await? {
            if !scopes.is_subset_of(credential.scopes().iter().map(String::as_str)) {
                tracing::warn!(
                    stored = ?credential.scopes(),
                    "cached credential was granted for different scopes"
                );
            }
            if let Some(credential) = self.reuse(credential, datastore).await? {
                return Ok(credential);
            }
        }

        tracing::info!("no usable cached credential, starting consent flow");
        let token = self
            .provider
            .authenticate(scopes)
            .await
            .map_err(Error::from_provider)?;
        let credential = Credential::new(token, scopes);
        self.store.save(datastore, USER_KEY, &credential).await?;
        Ok(credential)
    }

    async fn reuse(
        &self,
        mut credential: Credential,
        datastore: &str,
    ) -> Result<Option<Credential>, Error> {
        if !credential.is_expired(Timestamp::now()) {
            tracing::debug!("using cached credential");
            return Ok(Some(credential));
        }
        let Some(refresh_token) = credential.refresh_token().map(str::to_string) else {
            tracing::debug!("cached credential expired and cannot be refreshed");
            return Ok(None);
        };

        tracing::debug!("cached credential expired, refreshing");
        match self
            .provider
            .refresh_token(&refresh_token)
            .await
            .map_err(Error::from_provider)?
        {
            Some(new_token) => {
                credential.apply_refresh(new_token);
                self.store.save(datastore, USER_KEY, &credential).await?;
                Ok(Some(credential))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::tests::token;
    use crate::scopes::{YOUTUBE_FORCE_SSL, YOUTUBE_READONLY};
    use crate::test_support::{http_client, secrets};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Hands out numbered tokens and counts how often each flow ran.
    #[derive(Debug, Default)]
    struct FakeProvider {
        consents: AtomicUsize,
        refreshes: AtomicUsize,
        reject_refresh: bool,
        without_refresh_token: bool,
        expires_in: Option<Duration>,
    }

    impl TokenProvider for FakeProvider {
        async fn authenticate(&self, _: &ScopeSet) -> eyre::Result<BasicTokenResponse> {
            let n = self.consents.fetch_add(1, Ordering::SeqCst) + 1;
            let refresh = format!("refresh-{n}");
            Ok(token(
                &format!("consent-{n}"),
                (!self.without_refresh_token).then_some(refresh.as_str()),
                self.expires_in,
            ))
        }

        async fn refresh_token(&self, refresh_token: &str) -> eyre::Result<Option<BasicTokenResponse>> {
            self.refreshes.fetch_add(1, Ordering::SeqCst);
            if self.reject_refresh {
                return Ok(None);
            }
            Ok(Some(token(
                &format!("refreshed-from-{refresh_token}"),
                None,
                Some(Duration::from_secs(3600)),
            )))
        }
    }

    struct FailingProvider;

    impl TokenProvider for FailingProvider {
        async fn authenticate(&self, _: &ScopeSet) -> eyre::Result<BasicTokenResponse> {
            eyre::bail!("redirect server exit prematurely")
        }

        async fn refresh_token(&self, _: &str) -> eyre::Result<Option<BasicTokenResponse>> {
            eyre::bail!("token endpoint unreachable")
        }
    }

    fn readonly() -> ScopeSet {
        [YOUTUBE_READONLY].into_iter().collect()
    }

    #[tokio::test]
    async fn second_call_hits_the_cache() {
        let dir = tempfile::tempdir().unwrap();
        let authorizer = Authorizer::new(
            FakeProvider {
                expires_in: Some(Duration::from_secs(3600)),
                ..Default::default()
            },
            FileTokenStore::new(dir.path()),
        );

        let first = authorizer
            .authorize(&readonly(), "listlivechatmessages")
            .await
            .unwrap();
        let second = authorizer
            .authorize(&readonly(), "listlivechatmessages")
            .await
            .unwrap();

        assert_eq!(first.access_token(), "consent-1");
        assert_eq!(second.access_token(), "consent-1");
        assert_eq!(authorizer.provider().consents.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cache_survives_a_new_authorizer() {
        let dir = tempfile::tempdir().unwrap();
        let first = Authorizer::new(FakeProvider::default(), FileTokenStore::new(dir.path()));
        first.authorize(&readonly(), "getlivechatid").await.unwrap();

        let second = Authorizer::new(FakeProvider::default(), FileTokenStore::new(dir.path()));
        let credential = second.authorize(&readonly(), "getlivechatid").await.unwrap();
        assert_eq!(credential.access_token(), "consent-1");
        assert_eq!(second.provider().consents.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn datastores_are_separate_caches() {
        let dir = tempfile::tempdir().unwrap();
        let authorizer = Authorizer::new(FakeProvider::default(), FileTokenStore::new(dir.path()));
        let force_ssl: ScopeSet = [YOUTUBE_FORCE_SSL].into_iter().collect();

        authorizer.authorize(&readonly(), "getlivechatid").await.unwrap();
        let other = authorizer
            .authorize(&force_ssl, "insertlivechatmessage")
            .await
            .unwrap();

        assert_eq!(other.access_token(), "consent-2");
        assert_eq!(other.scopes(), [YOUTUBE_FORCE_SSL.to_string()]);
    }

    #[tokio::test]
    async fn expired_credential_is_refreshed_not_reconsented() {
        let dir = tempfile::tempdir().unwrap();
        let authorizer = Authorizer::new(
            FakeProvider {
                // inside the expiry margin, so immediately stale
                expires_in: Some(Duration::from_secs(10)),
                ..Default::default()
            },
            FileTokenStore::new(dir.path()),
        );

        authorizer.authorize(&readonly(), "listbroadcasts").await.unwrap();
        let credential = authorizer.authorize(&readonly(), "listbroadcasts").await.unwrap();

        assert_eq!(credential.access_token(), "refreshed-from-refresh-1");
        assert_eq!(credential.refresh_token(), Some("refresh-1"));
        assert_eq!(authorizer.provider().consents.load(Ordering::SeqCst), 1);
        assert_eq!(authorizer.provider().refreshes.load(Ordering::SeqCst), 1);

        // the refreshed credential was written back
        let stored = authorizer
            .store()
            .load("listbroadcasts", USER_KEY)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.access_token(), "refreshed-from-refresh-1");
    }

    #[tokio::test]
    async fn invalid_grant_falls_back_to_consent() {
        let dir = tempfile::tempdir().unwrap();
        let authorizer = Authorizer::new(
            FakeProvider {
                expires_in: Some(Duration::from_secs(10)),
                reject_refresh: true,
                ..Default::default()
            },
            FileTokenStore::new(dir.path()),
        );

        authorizer.authorize(&readonly(), "listbroadcasts").await.unwrap();
        let credential = authorizer.authorize(&readonly(), "listbroadcasts").await.unwrap();

        assert_eq!(credential.access_token(), "consent-2");
        assert_eq!(authorizer.provider().consents.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn expired_credential_without_refresh_token_goes_to_consent() {
        let dir = tempfile::tempdir().unwrap();
        let authorizer = Authorizer::new(
            FakeProvider {
                expires_in: Some(Duration::from_secs(10)),
                without_refresh_token: true,
                ..Default::default()
            },
            FileTokenStore::new(dir.path()),
        );

        authorizer.authorize(&readonly(), "listbroadcasts").await.unwrap();
        let credential = authorizer.authorize(&readonly(), "listbroadcasts").await.unwrap();

        assert_eq!(credential.access_token(), "consent-2");
        assert_eq!(authorizer.provider().consents.load(Ordering::SeqCst), 2);
        assert_eq!(authorizer.provider().refreshes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn busy_redirect_port_is_an_io_error() {
        let held = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = held.local_addr().unwrap().port();
        let dir = tempfile::tempdir().unwrap();
        let authorizer = Authorizer::new(
            Arc::new(OAuthManager::new(
                secrets("https://example.test/token"),
                port,
            )),
            FileTokenStore::new(dir.path()),
        );

        let err = authorizer
            .authorize(&readonly(), "listbroadcasts")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Io { .. }), "{err:?}");
        drop(held);
    }

    #[tokio::test]
    async fn unreachable_token_endpoint_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path());
        let stale = Credential::new(
            token("stale", Some("r1"), Some(Duration::from_secs(10))),
            &readonly(),
        );
        store.save("listbroadcasts", USER_KEY, &stale).await.unwrap();

        // a port nothing listens on
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let oauth = OAuthManager::with_http_client(
            secrets(format!("http://127.0.0.1:{port}/token")),
            0,
            http_client(),
        );
        let authorizer = Authorizer::new(Arc::new(oauth), store);

        let err = authorizer
            .authorize(&readonly(), "listbroadcasts")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Io { .. }), "{err:?}");
    }

    #[tokio::test]
    async fn failed_consent_is_an_authorization_error() {
        let dir = tempfile::tempdir().unwrap();
        let authorizer = Authorizer::new(FailingProvider, FileTokenStore::new(dir.path()));
        let err = authorizer
            .authorize(&readonly(), "listbroadcasts")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Authorization(_)), "{err:?}");
        assert!(
            authorizer
                .store()
                .load("listbroadcasts", USER_KEY)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn placeholder_secrets_are_a_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let secrets = dir.path().join("client_secrets.json");
        std::fs::write(
            &secrets,
            r#"{"installed": {"client_id": "Enter Client ID", "client_secret": "Enter Client Secret"}}"#,
        )
        .unwrap();
        let settings = AuthSettings {
            client_secrets: secrets,
            credentials_dir: Some(dir.path().to_path_buf()),
            redirect_port: 0,
        };
        let err = Authorizer::from_settings(&settings).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)), "{err:?}");
    }
}
