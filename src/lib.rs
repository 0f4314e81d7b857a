//! # driftkv - A TTL-Aware In-Memory Keyspace
//!
//! driftkv is an in-memory keyspace engine that speaks the Redis protocol.
//! Clients share a set of numbered databases and manage keys through the
//! generic Redis key commands: existence checks, deletion, renaming,
//! expiration, type introspection and pattern-based enumeration.
//!
//! ## Features
//!
//! - **Redis-Compatible**: RESP2 wire protocol and Redis error strings
//! - **Wall-Clock Expiry**: a record is live until `created_at + ttl`; reads
//!   never observe an expired record
//! - **Atomic Conditional Writes**: RENAME, RENAMENX and EXPIRE with
//!   NX/XX/GT/LT run their check and their write under the same lock
//! - **Sharded Storage**: 64 `RwLock` shards per database
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              driftkv                                    │
//! │                                                                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐                  │
//! │  │ TCP Server  │───>│ Connection  │───>│ Dispatcher  │                  │
//! │  │ (Listener)  │    │  (Session)  │    │             │                  │
//! │  └─────────────┘    └─────────────┘    └──────┬──────┘                  │
//! │                                               ▼                         │
//! │  ┌─────────────┐    ┌──────────────────────────────────────────────┐    │
//! │  │  Request    │    │ GenericCommands ──> Databases                │    │
//! │  │  Parser     │    │   ┌──────────┐ ┌──────────┐    ┌──────────┐  │    │
//! │  └─────────────┘    │   │Keyspace 0│ │Keyspace 1│ ...│Keyspace N│  │    │
//! │                     │   └──────────┘ └──────────┘    └──────────┘  │    │
//! │                     └──────────────────────────────────────────────┘    │
//! │                                               ▲                         │
//! │                     ┌─────────────────────────┴───────────────────────┐ │
//! │                     │           ExpirySweeper                         │ │
//! │                     │      (Background Tokio Task)                    │ │
//! │                     └─────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```
//! use driftkv::commands::{Dispatcher, Session};
//! use driftkv::protocol::RespValue;
//! use driftkv::storage::{Databases, ManualClock};
//! use bytes::Bytes;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let clock = Arc::new(ManualClock::new());
//! let databases = Databases::with_clock(16, clock.clone());
//! let dispatcher = Dispatcher::new(Arc::new(databases));
//! let mut session = Session::default();
//!
//! let request = |args: &[&str]| -> Vec<Bytes> {
//!     args.iter().map(|s| Bytes::from(s.to_string())).collect()
//! };
//!
//! dispatcher.execute(&mut session, &request(&["SET", "k1", "v"]));
//! dispatcher.execute(&mut session, &request(&["EXPIRE", "k1", "5"]));
//! assert_eq!(
//!     dispatcher.execute(&mut session, &request(&["TTL", "k1"])),
//!     RespValue::integer(5)
//! );
//!
//! clock.advance(Duration::from_millis(1500));
//! assert_eq!(
//!     dispatcher.execute(&mut session, &request(&["TTL", "k1"])),
//!     RespValue::integer(3)
//! );
//! ```
//!
//! ## Module Overview
//!
//! - [`storage`]: records, keyspaces, the database registry and the sweeper
//! - [`pattern`]: glob matching for KEYS
//! - [`commands`]: generic key commands and request dispatch
//! - [`protocol`]: RESP request decoding and reply encoding
//! - [`connection`]: per-client read/execute/respond loop
//! - [`config`]: command-line configuration
//!
//! ## Lazy + Active Expiry
//!
//! 1. **Lazy**: every read treats an expired record as absent and removes it
//! 2. **Active**: a background task periodically reclaims expired records
//!    that are never read again

pub mod commands;
pub mod config;
pub mod connection;
pub mod error;
pub mod options;
pub mod pattern;
pub mod protocol;
pub mod storage;

pub use commands::{Dispatcher, GenericCommands, Reply, Session};
pub use config::Config;
pub use connection::{handle_connection, ConnectionStats};
pub use error::{CommandError, KeyspaceError};
pub use protocol::{RequestParser, RespValue};
pub use storage::{Databases, ExpiryConfig, ExpirySweeper, Keyspace};

/// Version of driftkv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
