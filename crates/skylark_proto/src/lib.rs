//! # Skylark Proto
//!
//! Protocol types and frame decoding for skylark.
//!
//! This crate provides:
//! - Typed repository records (`Record` and friends)
//! - `RepoOperation` for classified repository mutations
//! - `RawFrame` and its content-addressed block store
//! - `FrameDecoder`, which turns one frame into ordered, hash-verified
//!   operations
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod decode;
mod error;
mod frame;
mod operation;
mod record;

pub use decode::FrameDecoder;
pub use error::{ProtoError, ProtoResult};
pub use frame::{BlockStore, ManifestEntry, RawFrame};
pub use operation::{OpKind, RepoOperation};
pub use record::{
    collections, FollowRecord, LikeRecord, PostRecord, Record, RecordRef, ReplyRef, RepostRecord,
};
