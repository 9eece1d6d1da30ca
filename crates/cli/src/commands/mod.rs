//! CLI subcommands: thin callers of the `avalanche-common` components.

pub mod login;
pub mod logout;
pub mod session;
pub mod user;

use std::sync::Arc;

use avalanche_common::{HttpOidcClient, KeyringTokenStore, OidcConfig, SessionManager};

/// The concrete session manager every command works with.
pub(crate) type CliSession = SessionManager<HttpOidcClient, KeyringTokenStore>;

/// Build the session manager over the real HTTP client and the platform
/// credential store.
pub(crate) fn session_manager(config: &OidcConfig) -> CliSession {
    SessionManager::new(
        Arc::new(HttpOidcClient::new(config.clone())),
        Arc::new(KeyringTokenStore::default()),
        config.near_expiry_threshold_secs,
    )
}
