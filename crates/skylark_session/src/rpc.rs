//! The authenticated remote-call contract.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use skylark_codec::ContentHash;
use skylark_proto::{Record, RecordRef};

use crate::credential::Credential;
use crate::error::{SessionError, SessionResult};

/// A profile view returned by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    /// Stable account identifier.
    pub account: String,
    /// Human-readable handle.
    pub handle: String,
    /// Display name, when set.
    pub display_name: Option<String>,
    /// Profile description, when set.
    pub description: Option<String>,
    /// Follower count.
    pub followers: u64,
    /// Following count.
    pub follows: u64,
}

/// Executes authenticated remote calls against the host.
///
/// This trait abstracts the network layer, allowing different bindings
/// (HTTP/JSON, mock for testing). Implementations take the credential
/// per call rather than holding one: the `SessionManager` owns it.
pub trait RpcFacade: Send + Sync {
    /// Exchanges an identifier and secret for a fresh credential.
    fn create_session(&self, identifier: &str, secret: &str) -> SessionResult<Credential>;

    /// Exchanges a refresh token for a fresh credential.
    fn refresh_session(&self, credential: &Credential) -> SessionResult<Credential>;

    /// Creates a record in the caller's repository and returns its
    /// strong reference.
    fn create_record(
        &self,
        credential: &Credential,
        collection: &str,
        record: &Record,
    ) -> SessionResult<RecordRef>;

    /// Fetches a record by URI.
    fn get_record(&self, credential: &Credential, uri: &str) -> SessionResult<(RecordRef, Record)>;

    /// Deletes a record from the caller's repository.
    fn delete_record(&self, credential: &Credential, uri: &str) -> SessionResult<()>;

    /// Fetches an account's profile view.
    fn get_profile(&self, credential: &Credential, actor: &str) -> SessionResult<Profile>;
}

/// A scriptable facade for tests.
///
/// Responses are set up front; every call is counted so tests can assert
/// on how many round trips a flow actually performed.
#[derive(Default)]
pub struct MockRpc {
    login_response: Mutex<Option<SessionResult<Credential>>>,
    refresh_response: Mutex<Option<SessionResult<Credential>>>,
    record_response: Mutex<Option<(RecordRef, Record)>>,
    profile_response: Mutex<Option<Profile>>,
    created: Mutex<Vec<(String, Record)>>,
    deleted: Mutex<Vec<String>>,
    login_calls: AtomicU64,
    refresh_calls: AtomicU64,
}

impl MockRpc {
    /// Creates a mock with no scripted responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the login response.
    pub fn set_login_response(&self, response: SessionResult<Credential>) {
        *self.login_response.lock() = Some(response);
    }

    /// Scripts the refresh response.
    pub fn set_refresh_response(&self, response: SessionResult<Credential>) {
        *self.refresh_response.lock() = Some(response);
    }

    /// Scripts the `get_record` response.
    pub fn set_record_response(&self, reference: RecordRef, record: Record) {
        *self.record_response.lock() = Some((reference, record));
    }

    /// Scripts the `get_profile` response.
    pub fn set_profile_response(&self, profile: Profile) {
        *self.profile_response.lock() = Some(profile);
    }

    /// Number of login round trips performed.
    pub fn login_calls(&self) -> u64 {
        self.login_calls.load(Ordering::SeqCst)
    }

    /// Number of refresh round trips performed.
    pub fn refresh_calls(&self) -> u64 {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    /// Records created through this mock, in call order.
    pub fn created_records(&self) -> Vec<(String, Record)> {
        self.created.lock().clone()
    }

    /// URIs deleted through this mock, in call order.
    pub fn deleted_uris(&self) -> Vec<String> {
        self.deleted.lock().clone()
    }
}

impl RpcFacade for MockRpc {
    fn create_session(&self, identifier: &str, _secret: &str) -> SessionResult<Credential> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        self.login_response
            .lock()
            .clone()
            .unwrap_or_else(|| Err(SessionError::Authentication(format!("no account {identifier}"))))
    }

    fn refresh_session(&self, _credential: &Credential) -> SessionResult<Credential> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        self.refresh_response
            .lock()
            .clone()
            .unwrap_or_else(|| Err(SessionError::transport_retryable("no refresh scripted")))
    }

    fn create_record(
        &self,
        credential: &Credential,
        collection: &str,
        record: &Record,
    ) -> SessionResult<RecordRef> {
        let mut created = self.created.lock();
        let rkey = format!("mock-{}", created.len() + 1);
        created.push((collection.to_string(), record.clone()));

        let uri = RecordRef::uri_for(&credential.account, collection, &rkey);
        let bytes = skylark_codec::to_canonical_cbor(&record.to_value())
            .map_err(|err| SessionError::Protocol(err.to_string()))?;
        Ok(RecordRef::new(uri, ContentHash::of(&bytes)))
    }

    fn get_record(&self, _credential: &Credential, uri: &str) -> SessionResult<(RecordRef, Record)> {
        self.record_response
            .lock()
            .clone()
            .ok_or_else(|| SessionError::Protocol(format!("no record scripted for {uri}")))
    }

    fn delete_record(&self, _credential: &Credential, uri: &str) -> SessionResult<()> {
        self.deleted.lock().push(uri.to_string());
        Ok(())
    }

    fn get_profile(&self, _credential: &Credential, actor: &str) -> SessionResult<Profile> {
        self.profile_response
            .lock()
            .clone()
            .ok_or_else(|| SessionError::Protocol(format!("no profile scripted for {actor}")))
    }
}
