//! # padsync server
//!
//! Network front end for padsync: a WebSocket gateway into the sync
//! engine plus a small JSON API for files and secure save.
//!
//! ## Endpoints
//!
//! | Route | Method | Purpose |
//! |-------|--------|---------|
//! | `/ws` | GET | Live editing in the default session |
//! | `/ws/:session_id` | GET | Live editing in a named session |
//! | `/api/open` | POST | Read an uploaded text file (multipart field `file`) |
//! | `/api/secure/save` | POST | Encrypt `{content, password}` |
//! | `/api/secure/open` | POST | Decrypt `{content, password}` |
//! | `/api/login` | POST | Simulated login, returns a redirect URL |
//! | `/success` | GET | Plain-text landing page for that redirect |
//! | `/api/status` | GET | Engine counters |
//! | `/api/exit` | POST | Stop the server |
//!
//! ## WebSocket protocol
//!
//! Every frame in either direction is the full document text. On connect
//! the server sends the current document; afterwards it sends whatever
//! another collaborator last wrote. Binary frames holding UTF-8 are
//! accepted; other malformed frames are skipped.

#![deny(unsafe_code)]
#![warn(missing_docs)]
// Production code MUST NOT use panic!/unwrap()/expect()
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

mod api;
mod config;
mod error;
mod gateway;
mod server;
mod shutdown;

pub use api::{
    Done, LoginRequest, OpenedFile, OpenedText, Redirect, Reply, SealedFile, SecureRequest,
    PLAIN_FILENAME, SECURE_FILENAME,
};
pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use server::{AppState, PadServer};
pub use shutdown::ShutdownHandle;
