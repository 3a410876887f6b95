//! OAuth 2.0 management for YouTube API authentication.
//!
//! This module encapsulates the provider-facing half of authorization: the interactive
//! authorization-code flow (with a short-lived local redirect listener) and token refresh.
//! Caching of the resulting credentials lives in [`crate::auth`].

use crate::client_secrets::ClientSecrets;
use crate::error::Error;
use crate::scopes::ScopeSet;
use eyre::Context;
use http::StatusCode;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::service::service_fn;
use hyper::{Request, Response, body};
use oauth2::basic::{BasicClient, BasicErrorResponseType, BasicRequestTokenError, BasicTokenResponse};
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, HttpClientError,
    PkceCodeChallenge, RedirectUrl, RefreshToken, RequestTokenError, Scope, TokenUrl,
};
use oauth2::reqwest;
use std::convert::Infallible;
use std::future::Future;
use tokio::sync::{mpsc, oneshot};

/// Path the provider redirects to on the local listener.
pub const CALLBACK_PATH: &str = "/Callback";

const OAUTH_DONE_HTML: &str = "<html><head><title>OAuth 2.0 Authentication Token Received</title></head>\
    <body>Received verification code. You may now close this window.</body></html>";

const OAUTH_DENIED_HTML: &str = "<html><head><title>OAuth 2.0 Authorization Denied</title></head>\
    <body>Authorization was not granted. You may now close this window.</body></html>";

/// Manages OAuth 2.0 flows against the provider described by a [`ClientSecrets`] file.
#[derive(Debug, Clone)]
pub struct OAuthManager {
    secrets: ClientSecrets,
    redirect_port: u16,
    http_client: reqwest::Client,
}

impl OAuthManager {
    /// Creates a manager for the given OAuth application.
    ///
    /// `redirect_port` is the local port the consent redirect will land on; pass `0` to
    /// let the operating system choose one.
    pub fn new(secrets: ClientSecrets, redirect_port: u16) -> Self {
        let http_client = reqwest::ClientBuilder::new()
            // SSRF no thank you.
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .expect("building reqwest client should not fail");
        Self::with_http_client(secrets, redirect_port, http_client)
    }

    /// Like [`OAuthManager::new`], but talks to the token endpoint through `http_client`.
    ///
    /// The client should not follow redirects.
    pub fn with_http_client(
        secrets: ClientSecrets,
        redirect_port: u16,
        http_client: reqwest::Client,
    ) -> Self {
        Self {
            secrets,
            redirect_port,
            http_client,
        }
    }

    /// Performs a complete authorization-code flow for `scopes`.
    ///
    /// 1. Start a local HTTP listener for the redirect.
    /// 2. Print the authorization URL and try to open it in the user's browser.
    /// 3. Wait (without a timeout) for the provider to redirect back with a code.
    /// 4. Exchange the code for an access/refresh token pair.
    ///
    /// Failures that leave the user or provider saying no surface as
    /// [`Error::Authorization`]; a listener or connection failure surfaces as [`Error::Io`].
    pub async fn authenticate(&self, scopes: &ScopeSet) -> eyre::Result<BasicTokenResponse> {
        let csrf = CsrfToken::new_random();
        let (redirect_url, eventually_authorization_code) = self
            .setup_redirect(csrf.clone())
            .await
            .map_err(|e| Error::io("set up redirect endpoint", e))?;

        let auth_url =
            AuthUrl::new(self.secrets.auth_uri.clone()).context("parse authorization endpoint")?;
        let token_url =
            TokenUrl::new(self.secrets.token_uri.clone()).context("parse token endpoint")?;
        let client = BasicClient::new(ClientId::new(self.secrets.client_id.clone()))
            .set_client_secret(ClientSecret::new(self.secrets.client_secret.clone()))
            .set_auth_uri(auth_url)
            .set_token_uri(token_url)
            .set_redirect_uri(redirect_url);

        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();
        let (auth_url, _csrf_token) = client
            // We never re-use the CSRF since we only go through the flow exactly once.
            .authorize_url(move || csrf.clone())
            .add_scopes(scopes.iter().map(|s| Scope::new(s.to_string())))
            .add_extra_param("access_type", "offline")
            .set_pkce_challenge(pkce_challenge)
            .url();

        tracing::info!(url = %auth_url, %scopes, "asking user to follow OAuth flow");
        eprintln!("Please open the following address in your browser:");
        eprintln!("  {auth_url}");
        if let Err(e) = webbrowser::open(auth_url.as_ref()) {
            tracing::warn!(error = %e, "could not open browser, visit the URL manually");
        }

        let authorization_code = eventually_authorization_code.await?;

        let token_result = client
            .exchange_code(authorization_code)
            .set_pkce_verifier(pkce_verifier)
            .request_async(&self.http_client)
            .await
            .map_err(|e| token_error("exchange authorization code with access token", e))?;

        Ok(token_result)
    }

    /// Attempts to exchange `refresh_token` for a new access token.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(new_token))` - Refresh succeeded
    /// * `Ok(None)` - The provider no longer accepts the refresh token (invalid grant)
    /// * `Err(_)` - Network or other error occurred during the refresh attempt
    pub async fn refresh_token(
        &self,
        refresh_token: &str,
    ) -> eyre::Result<Option<BasicTokenResponse>> {
        tracing::debug!("attempting to refresh OAuth token");

        // no redirect URL needed for refresh
        let token_url =
            TokenUrl::new(self.secrets.token_uri.clone()).context("parse token endpoint")?;
        let client = BasicClient::new(ClientId::new(self.secrets.client_id.clone()))
            .set_client_secret(ClientSecret::new(self.secrets.client_secret.clone()))
            .set_token_uri(token_url);

        match client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .request_async(&self.http_client)
            .await
        {
            Ok(new_token) => {
                tracing::debug!("successfully refreshed OAuth token");
                Ok(Some(new_token))
            }
            Err(ref e @ RequestTokenError::ServerResponse(ref sr))
                if matches!(sr.error(), BasicErrorResponseType::InvalidGrant) =>
            {
                tracing::warn!("OAuth refresh token considered invalid grant: {}", e);
                Ok(None)
            }
            Err(e) => Err(token_error("exchange refresh token", e).into()),
        }
    }

    /// Sets up a local HTTP server to receive the OAuth authorization callback.
    ///
    /// Returns the redirect URL to hand to the provider, and a future that resolves to the
    /// authorization code once a callback carrying the expected `state` arrives. The listener
    /// is closed as soon as that future resolves.
    async fn setup_redirect(
        &self,
        csrf: CsrfToken,
    ) -> eyre::Result<(
        RedirectUrl,
        impl Future<Output = eyre::Result<AuthorizationCode>>,
    )> {
        let socket = tokio::net::TcpListener::bind(("127.0.0.1", self.redirect_port))
            .await
            .with_context(|| format!("bind to 127.0.0.1:{}", self.redirect_port))?;
        let addr = socket.local_addr().context("get local address")?;
        let url = RedirectUrl::new(format!(
            "http://{}:{}{CALLBACK_PATH}",
            addr.ip(),
            addr.port()
        ))
        .context("construct redirect url")?;
        tracing::debug!(%addr, "listening for OAuth redirect");

        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            let r = async move {
                let (got, mut gotten) = mpsc::channel::<eyre::Result<AuthorizationCode>>(1);
                loop {
                    tokio::select! {
                        accepted = socket.accept() => {
                            let (conn, peer) = accepted
                                .map_err(|e| Error::io("accept redirect connection", e))?;
                            tracing::trace!(%peer, "redirect listener accepted connection");
                            let conn = hyper_util::rt::TokioIo::new(conn);
                            let csrf = csrf.clone();
                            let got = got.clone();
                            let service = service_fn(move |req: Request<body::Incoming>| {
                                let outcome = parse_callback(&req, &csrf);
                                let got = got.clone();
                                async move { Ok::<_, Infallible>(respond(outcome, &got)) }
                            });
                            tokio::spawn(async move {
                                if let Err(e) = hyper::server::conn::http1::Builder::new()
                                    .serve_connection(conn, service)
                                    .await
                                {
                                    tracing::debug!(error = %e, "redirect connection ended with error");
                                }
                            });
                        }
                        code = gotten.recv() => {
                            return code.expect("a sender is held for as long as we loop");
                        }
                    }
                }
            };
            let _ = tx.send(r.await);
        });
        Ok((url, async move {
            match rx.await {
                Ok(code) => code,
                Err(e) => Err(Error::io("redirect listener exited prematurely", e).into()),
            }
        }))
    }
}

/// Sorts a failed token request into the error taxonomy.
///
/// The provider answering with an OAuth error is an authorization failure. Not reaching
/// it, or not understanding its answer, is an I/O failure.
fn token_error(
    what: &'static str,
    e: BasicRequestTokenError<HttpClientError<reqwest::Error>>,
) -> Error {
    match e {
        RequestTokenError::ServerResponse(_) => {
            Error::authorization(eyre::Report::new(e).wrap_err(what))
        }
        e => Error::io(what, e),
    }
}

/// What a single request to the redirect listener amounted to.
#[derive(Debug, PartialEq, Eq)]
enum CallbackOutcome {
    Code(String),
    Denied(String),
    NotFound,
    Invalid(&'static str),
}

fn parse_callback<B>(req: &Request<B>, csrf: &CsrfToken) -> CallbackOutcome {
    if req.uri().path() != CALLBACK_PATH {
        return CallbackOutcome::NotFound;
    }

    let mut presented_state = None;
    let mut presented_code = None;
    let mut presented_error = None;
    for (k, v) in form_urlencoded::parse(req.uri().query().unwrap_or("").as_bytes()) {
        match &*k {
            "state" => presented_state = Some(v),
            "code" => presented_code = Some(v),
            "error" => presented_error = Some(v),
            _ => {}
        }
    }
    if presented_state.as_deref() != Some(csrf.secret().as_str()) {
        return CallbackOutcome::Invalid("invalid csrf token");
    }
    if let Some(error) = presented_error {
        return CallbackOutcome::Denied(error.into_owned());
    }
    match presented_code {
        Some(code) => CallbackOutcome::Code(code.into_owned()),
        None => CallbackOutcome::Invalid("no authorization code found"),
    }
}

fn respond(
    outcome: CallbackOutcome,
    got: &mpsc::Sender<eyre::Result<AuthorizationCode>>,
) -> Response<Full<Bytes>> {
    let (status, body) = match outcome {
        CallbackOutcome::Code(code) => {
            // only the first code counts; the listener shuts down right after
            let _ = got.try_send(Ok(AuthorizationCode::new(code)));
            (StatusCode::OK, OAUTH_DONE_HTML)
        }
        CallbackOutcome::Denied(error) => {
            let _ = got.try_send(Err(Error::authorization(format!(
                "user did not grant access: {error}"
            ))
            .into()));
            (StatusCode::FORBIDDEN, OAUTH_DENIED_HTML)
        }
        CallbackOutcome::NotFound => (StatusCode::NOT_FOUND, "not found"),
        CallbackOutcome::Invalid(reason) => {
            tracing::warn!(reason, "rejected OAuth redirect");
            (StatusCode::BAD_REQUEST, reason)
        }
    };
    let mut response = Response::new(Full::<Bytes>::from(body));
    *response.status_mut() = status;
    response
}
