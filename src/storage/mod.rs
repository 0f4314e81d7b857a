//! Storage Module
//!
//! The keyspace engine: records with expiration metadata, the sharded
//! per-database keyspace, the registry of numbered databases and the
//! background expiry sweeper.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Databases                             │
//! │  ┌────────────┐ ┌────────────┐          ┌────────────┐      │
//! │  │ Keyspace 0 │ │ Keyspace 1 │   ...    │ Keyspace N │      │
//! │  │ 64 shards  │ │ 64 shards  │          │ 64 shards  │      │
//! │  └────────────┘ └────────────┘          └────────────┘      │
//! └─────────────────────────────────────────────────────────────┘
//!                            ▲
//!                            │
//!              ┌─────────────┴─────────────┐
//!              │     ExpirySweeper         │
//!              │  (Background Tokio Task)  │
//!              └───────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use driftkv::storage::{Databases, TtlState, Value};
//! use bytes::Bytes;
//! use std::time::Duration;
//!
//! let databases = Databases::new(16);
//! let db = databases.get(0).unwrap();
//!
//! db.insert(
//!     Bytes::from("session"),
//!     Value::String(Bytes::from("token")),
//!     Some(Duration::from_secs(3600)),
//! );
//! assert!(matches!(db.ttl(b"session"), TtlState::Remaining(_)));
//! assert!(databases.get(16).is_err());
//! ```

pub mod clock;
pub mod expiry;
pub mod keyspace;
pub mod record;
pub mod registry;

pub use clock::{Clock, ManualClock, SystemClock};
pub use expiry::{ExpiryConfig, ExpirySweeper};
pub use keyspace::{Keyspace, SetOutcome, TtlState};
pub use record::{Record, Value, ValueType};
pub use registry::{Databases, DEFAULT_DATABASES};
