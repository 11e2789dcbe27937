//! # Mitter
//!
//! A microblogging client library built around a threaded HTTP dispatcher.
//!
//! ## Overview
//!
//! Front-ends (desktop, REPL, one-shot console) talk to the server through a
//! [`Session`]. Each session operation becomes a request descriptor that a
//! pool of worker threads executes; the caller's callback gets the
//! post-processed result exactly once.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Front-end                            │
//! │      calls Session operations, receives callbacks           │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Session                             │
//! │  • Credentials / scheme   • Headers   • Post-processing     │
//! └─────────────────────────────────────────────────────────────┘
//!                              │  Request { url, headers, body, callback }
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       WorkerPool                            │
//! │   shared queue ──► worker 1 … worker N ──► Transport (ureq) │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`api`] — Session and endpoint operations
//! - [`http`] — Request descriptors, worker pool, transport
//! - [`error`] — Error taxonomy delivered to callbacks
//! - [`models`] — Status, User, `RateLimit`
//! - [`timestamp`] — Server date parsing
//! - [`config`] — Configuration management
//!
//! ## Example
//!
//! ```no_run
//! use mitter::Session;
//!
//! let mut session = Session::new("user", "password", true, 2);
//! session.friends_timeline(|result| match result {
//!     Ok(statuses) => println!("{} new statuses", statuses.len()),
//!     Err(e) => eprintln!("refresh failed: {e}"),
//! });
//! session.close();
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::uninlined_format_args)]

pub mod api;
pub mod config;
pub mod error;
pub mod http;
pub mod models;
pub mod timestamp;

// Re-export main types for convenience
pub use api::{Credentials, Session};
pub use config::Config;
pub use error::{ApiFailure, RequestError, TransportFailure};
pub use http::{Payload, Request, Transport, UreqTransport, WorkerPool};
pub use models::{RateLimit, Status, User};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
