//! Command implementations.

pub mod actions;
pub mod login;
pub mod post;
pub mod profile;
pub mod stream;

use std::error::Error;
use std::sync::Arc;

use skylark_session::{CredentialStore, SessionManager, XrpcFacade};

use crate::config::Config;
use crate::http::ReqwestClient;

/// Builds the session manager for a loaded config.
pub(crate) fn open_session(config: &Config) -> Result<Arc<SessionManager>, Box<dyn Error>> {
    let client = ReqwestClient::new()?;
    let facade = XrpcFacade::new(config.service.clone(), client);
    let store = CredentialStore::new(config.credential_path()?);

    Ok(Arc::new(SessionManager::new(
        store,
        Arc::new(facade),
        config.identifier.clone(),
        config.secret.clone(),
    )))
}

/// Current timestamp in the wire format records carry.
pub(crate) fn now_timestamp() -> String {
    chrono::Utc::now()
        .to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
