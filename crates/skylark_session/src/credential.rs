//! Bearer credentials.

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A bearer credential: the access/refresh token pair authenticating one
/// account against its host.
///
/// A credential only exists with both tokens; there is no half-state to
/// represent. It is created on login or refresh success, persisted by
/// the store after every successful refresh, and owned in memory
/// exclusively by the `SessionManager`. Token material is wiped when the
/// value is dropped.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    /// Stable account identifier assigned by the host.
    pub account: String,
    /// Human-readable handle.
    pub handle: String,
    /// Short-lived access token.
    pub access_token: String,
    /// Long-lived refresh token.
    pub refresh_token: String,
}

impl Credential {
    /// Creates a credential from a login or refresh response.
    pub fn new(
        account: impl Into<String>,
        handle: impl Into<String>,
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> Self {
        Self {
            account: account.into(),
            handle: handle.into(),
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }

    /// Authorization header value for regular calls.
    pub fn auth_header(&self) -> String {
        format!("Bearer {}", self.access_token)
    }

    /// Authorization header value for the refresh endpoint, which
    /// authenticates with the refresh token instead.
    pub fn refresh_header(&self) -> String {
        format!("Bearer {}", self.refresh_token)
    }
}

// Token material must never leak through logs or debug dumps.
impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("account", &self.account)
            .field("handle", &self.handle)
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}
