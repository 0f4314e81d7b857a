//! Command Module
//!
//! This module implements the command processing layer. It receives decoded
//! requests, executes them against the database registry, and returns
//! replies.
//!
//! ## Architecture
//!
//! ```text
//! Client Request
//!       │
//!       ▼
//! ┌─────────────────┐
//! │ Request Parser  │  (protocol module)
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │   Dispatcher    │  arity, options, errors → replies
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ GenericCommands │  DEL, EXISTS, EXPIRE, TYPE, KEYS, RENAME, TTL, ...
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │   Databases     │  (storage module)
//! └─────────────────┘
//! ```

pub mod dispatch;
pub mod generic;
pub mod reply;

pub use dispatch::Dispatcher;
pub use generic::{GenericCommands, Session};
pub use reply::Reply;
