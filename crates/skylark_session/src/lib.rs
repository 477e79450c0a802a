//! # Skylark Session
//!
//! Authenticated session management for skylark.
//!
//! This crate provides:
//! - `Credential`, the bearer access/refresh token pair
//! - `CredentialStore`, the per-profile on-disk credential file
//! - `SessionManager`, the refresh-or-login state machine
//! - `RpcFacade`, the authenticated remote-call contract, with its
//!   HTTP/JSON binding (`XrpcFacade`) over an injected `HttpClient`
//!
//! The manager keeps one credential alive across process runs: every
//! `acquire()` refreshes the persisted credential when it can and falls
//! back to a fresh login when it cannot. Login failures are never
//! retried silently; the caller decides whether to try again.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod credential;
mod error;
mod manager;
mod rpc;
mod store;
mod xrpc;

pub use credential::Credential;
pub use error::{SessionError, SessionResult};
pub use manager::{SessionManager, SessionState};
pub use rpc::{MockRpc, Profile, RpcFacade};
pub use store::CredentialStore;
pub use xrpc::{json_to_value, value_to_json, HttpClient, HttpError, XrpcFacade};
