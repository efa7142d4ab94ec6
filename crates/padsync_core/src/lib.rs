//! # padsync core
//!
//! Document synchronization engine for padsync.
//!
//! This crate provides:
//! - A per-session document store with a revision counter
//! - A registry of live client connections
//! - The sync engine: serialized accept path and peer fan-out
//!
//! ## Protocol
//!
//! Clients send the full document on every edit. The engine stamps it with
//! the next revision, replaces the session's content, and pushes
//! `(content, revision)` to every other connection of the session:
//!
//! 1. A connecting client immediately receives the current document
//! 2. Updates are totally ordered per session
//! 3. The origin of an update never gets it echoed back
//! 4. Last write wins; concurrent edits are not merged
//!
//! ## Usage
//!
//! ```
//! use padsync_core::{MemorySink, SessionId, SyncEngine};
//! use std::sync::Arc;
//!
//! let engine = SyncEngine::new();
//! let session = SessionId::default();
//!
//! let alice = engine.connect(&session, Arc::new(MemorySink::new()))?;
//! let bob_inbox = Arc::new(MemorySink::new());
//! engine.connect(&session, bob_inbox.clone())?;
//!
//! engine.apply(&session, alice, "hello")?;
//! assert_eq!(&*bob_inbox.last().unwrap().content, "hello");
//! # Ok::<(), padsync_core::SyncError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
// Production code MUST NOT use panic!/unwrap()/expect()
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

mod engine;
mod error;
mod registry;
mod sink;
mod store;
mod types;

pub use engine::{EngineStats, SyncEngine};
pub use error::{SinkError, SyncError, SyncResult};
pub use registry::{ConnectionInfo, ConnectionRegistry};
pub use sink::{ConnectionSink, MemorySink};
pub use store::DocumentStore;
pub use types::{ConnectionId, DocumentSnapshot, DocumentUpdate, Revision, SessionId};
