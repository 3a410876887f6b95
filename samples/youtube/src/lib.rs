//! Building blocks for small command-line programs against the YouTube Live APIs.
//!
//! [`auth::Authorizer`] turns a set of scopes and a datastore name into a usable
//! [`credential::Credential`], running the browser consent flow only when nothing usable is
//! cached. [`youtube_api::YouTubeClient`] wraps that credential for API calls, and
//! [`chat_poller::ChatPoller`] follows a live chat at the pace the server asks for.

pub mod auth;
pub mod chat_poller;
pub mod client_secrets;
pub mod config;
pub mod credential;
pub mod error;
pub mod oauth;
pub mod scopes;
pub mod token_store;
pub mod youtube_api;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::Error;
