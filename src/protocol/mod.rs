//! RESP Protocol Implementation
//!
//! The wire side of the server: requests are decoded by [`RequestParser`]
//! into argument lists, and replies are encoded from [`RespValue`].
//!
//! ## Modules
//!
//! - `types`: Defines the `RespValue` enum and serialization
//! - `parser`: Incremental decoder for incoming requests
//!
//! ## Example
//!
//! ```
//! use driftkv::protocol::{RequestParser, RespValue};
//!
//! let (args, _) = RequestParser::new().parse(b"PING\r\n").unwrap().unwrap();
//! assert_eq!(args, vec!["PING"]);
//!
//! assert_eq!(RespValue::pong().serialize(), b"+PONG\r\n");
//! ```

pub mod parser;
pub mod types;

pub use parser::{ParseError, ParseResult, Request, RequestParser};
pub use types::RespValue;
