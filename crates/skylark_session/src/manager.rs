//! The refresh-or-login session state machine.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::credential::Credential;
use crate::error::{SessionError, SessionResult};
use crate::rpc::RpcFacade;
use crate::store::CredentialStore;

/// Where an `acquire()` call currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No credential has been looked at yet.
    Unloaded,
    /// A persisted credential was found.
    Loaded,
    /// The persisted credential is being refreshed.
    Refreshing,
    /// A valid credential is held.
    Authenticated,
    /// The last acquire failed; the next call starts over.
    Failed,
}

/// Owns the in-memory bearer credential and keeps it alive.
///
/// `acquire()` loads the persisted credential, refreshes it when
/// present, and falls back to a fresh login otherwise. The whole
/// sequence runs inside one critical section, so concurrent callers
/// share a single in-flight result instead of racing duplicate
/// refreshes: whoever enters second finds the first caller's credential
/// already in memory and refreshes it rather than logging in again.
pub struct SessionManager {
    store: CredentialStore,
    rpc: Arc<dyn RpcFacade>,
    identifier: String,
    secret: Zeroizing<String>,
    credential: Mutex<Option<Credential>>,
    state: RwLock<SessionState>,
}

impl SessionManager {
    /// Creates a manager for one account.
    pub fn new(
        store: CredentialStore,
        rpc: Arc<dyn RpcFacade>,
        identifier: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        Self {
            store,
            rpc,
            identifier: identifier.into(),
            secret: Zeroizing::new(secret.into()),
            credential: Mutex::new(None),
            state: RwLock::new(SessionState::Unloaded),
        }
    }

    /// Returns the state of the most recent `acquire()`.
    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    /// Returns a handle to the RPC facade this manager authenticates
    /// against, for callers that issue their own requests.
    pub fn rpc(&self) -> Arc<dyn RpcFacade> {
        Arc::clone(&self.rpc)
    }

    /// Produces a valid credential, refreshing or logging in as needed.
    ///
    /// A failed login leaves the call in `Failed` and surfaces
    /// `SessionError::Authentication`; it is never retried here. The
    /// caller may re-invoke `acquire()`, which starts from scratch with
    /// no state carried over from the failed attempt.
    pub fn acquire(&self) -> SessionResult<Credential> {
        let mut held = self.credential.lock();
        self.set_state(SessionState::Unloaded);

        let persisted = match held.clone() {
            Some(credential) => Some(credential),
            None => self.store.load().unwrap_or_else(|err| {
                warn!(error = %err, "ignoring unreadable credential file");
                None
            }),
        };

        if let Some(credential) = persisted {
            self.set_state(SessionState::Loaded);
            self.set_state(SessionState::Refreshing);

            match self.rpc.refresh_session(&credential) {
                Ok(fresh) => {
                    self.persist_best_effort(&fresh);
                    *held = Some(fresh.clone());
                    self.set_state(SessionState::Authenticated);
                    return Ok(fresh);
                }
                Err(err) => {
                    // Any refresh failure, network included, just means
                    // we must log in; it is not fatal by itself.
                    debug!(error = %err, "refresh failed, falling back to login");
                }
            }
        }

        match self.rpc.create_session(&self.identifier, &self.secret) {
            Ok(fresh) => {
                self.persist_best_effort(&fresh);
                *held = Some(fresh.clone());
                self.set_state(SessionState::Authenticated);
                Ok(fresh)
            }
            Err(err) => {
                *held = None;
                self.set_state(SessionState::Failed);
                match err {
                    SessionError::Authentication(_) => Err(err),
                    other => Err(SessionError::Authentication(other.to_string())),
                }
            }
        }
    }

    /// Persists a credential, downgrading failure to a warning: the
    /// network already accepted us, so the in-memory credential stays
    /// valid for this process even if the disk copy is stale.
    fn persist_best_effort(&self, credential: &Credential) {
        if let Err(err) = self.store.save(credential) {
            warn!(
                path = %self.store.path().display(),
                error = %err,
                "credential persisted in memory only",
            );
        }
    }

    fn set_state(&self, state: SessionState) {
        *self.state.write() = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::MockRpc;
    use std::thread;
    use tempfile::TempDir;

    fn cred(access: &str) -> Credential {
        Credential::new("acct:alice", "alice.example", access, "ref")
    }

    fn manager_with(dir: &TempDir, rpc: Arc<MockRpc>) -> SessionManager {
        SessionManager::new(
            CredentialStore::new(dir.path().join("alice.auth")),
            rpc,
            "alice.example",
            "hunter2",
        )
    }

    #[test]
    fn no_persisted_credential_logs_in_and_persists() {
        let dir = TempDir::new().unwrap();
        let rpc = Arc::new(MockRpc::new());
        rpc.set_login_response(Ok(cred("fresh")));

        let manager = manager_with(&dir, Arc::clone(&rpc));
        let credential = manager.acquire().unwrap();

        assert_eq!(credential.access_token, "fresh");
        assert_eq!(rpc.login_calls(), 1);
        assert_eq!(rpc.refresh_calls(), 0);
        assert_eq!(manager.state(), SessionState::Authenticated);

        let store = CredentialStore::new(dir.path().join("alice.auth"));
        assert_eq!(store.load().unwrap(), Some(cred("fresh")));
    }

    #[test]
    fn persisted_credential_refreshes_without_login() {
        let dir = TempDir::new().unwrap();
        let store = CredentialStore::new(dir.path().join("alice.auth"));
        store.save(&cred("stale")).unwrap();

        let rpc = Arc::new(MockRpc::new());
        rpc.set_refresh_response(Ok(cred("refreshed")));

        let manager = manager_with(&dir, Arc::clone(&rpc));
        let credential = manager.acquire().unwrap();

        assert_eq!(credential.access_token, "refreshed");
        assert_eq!(rpc.refresh_calls(), 1);
        assert_eq!(rpc.login_calls(), 0);
        assert_eq!(store.load().unwrap(), Some(cred("refreshed")));
    }

    #[test]
    fn refresh_failure_falls_back_to_login() {
        let dir = TempDir::new().unwrap();
        let store = CredentialStore::new(dir.path().join("alice.auth"));
        store.save(&cred("stale")).unwrap();

        let rpc = Arc::new(MockRpc::new());
        rpc.set_refresh_response(Err(SessionError::transport_retryable("network down")));
        rpc.set_login_response(Ok(cred("relogged")));

        let manager = manager_with(&dir, Arc::clone(&rpc));
        let credential = manager.acquire().unwrap();

        assert_eq!(credential.access_token, "relogged");
        assert_eq!(rpc.refresh_calls(), 1);
        assert_eq!(rpc.login_calls(), 1);
    }

    #[test]
    fn login_failure_is_terminal_for_the_call() {
        let dir = TempDir::new().unwrap();
        let rpc = Arc::new(MockRpc::new());
        rpc.set_login_response(Err(SessionError::Authentication("bad secret".into())));

        let manager = manager_with(&dir, Arc::clone(&rpc));
        let result = manager.acquire();

        assert!(matches!(result, Err(SessionError::Authentication(_))));
        assert_eq!(manager.state(), SessionState::Failed);
        assert_eq!(rpc.login_calls(), 1);

        // A later call starts over; nothing from the failed attempt
        // leaks into it.
        rpc.set_login_response(Ok(cred("second-try")));
        let credential = manager.acquire().unwrap();
        assert_eq!(credential.access_token, "second-try");
        assert_eq!(manager.state(), SessionState::Authenticated);
    }

    #[test]
    fn disk_write_failure_is_non_fatal() {
        let dir = TempDir::new().unwrap();
        // A store pointed at a directory cannot be written.
        let store = CredentialStore::new(dir.path());

        let rpc = Arc::new(MockRpc::new());
        rpc.set_login_response(Ok(cred("memory-only")));

        let manager = SessionManager::new(
            store,
            Arc::clone(&rpc) as Arc<dyn RpcFacade>,
            "alice.example",
            "hunter2",
        );
        let credential = manager.acquire().unwrap();

        assert_eq!(credential.access_token, "memory-only");
        assert_eq!(manager.state(), SessionState::Authenticated);
    }

    #[test]
    fn concurrent_acquires_share_one_login() {
        let dir = TempDir::new().unwrap();
        let rpc = Arc::new(MockRpc::new());
        rpc.set_login_response(Ok(cred("shared")));
        rpc.set_refresh_response(Ok(cred("shared")));

        let manager = Arc::new(manager_with(&dir, Arc::clone(&rpc)));

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let manager = Arc::clone(&manager);
                thread::spawn(move || manager.acquire().unwrap())
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap().access_token, "shared");
        }

        // The critical section serializes the two calls: the first
        // logs in, the second finds that credential and refreshes.
        assert_eq!(rpc.login_calls(), 1);
    }
}
