//! RESP Request Parser
//!
//! Clients send requests as a RESP array of bulk strings:
//!
//! ```text
//! *3\r\n$6\r\nEXPIRE\r\n$3\r\nkey\r\n$2\r\n10\r\n
//! ```
//!
//! or, from a terminal, as an inline command terminated by CRLF:
//!
//! ```text
//! EXPIRE key 10\r\n
//! ```
//!
//! The parser returns either:
//! - `Ok(Some((args, consumed)))` - a complete request, `consumed` bytes were used
//! - `Ok(None)` - the request is incomplete, read more data and retry
//! - `Err(ParseError)` - the client sent something that is not a request
//!
//! An empty inline line or `*0\r\n` yields an empty argument list, which the
//! connection skips.

use crate::protocol::types::{prefix, CRLF};
use bytes::Bytes;
use thiserror::Error;

/// Errors that can occur while decoding a request.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// A length header was not a valid integer
    #[error("invalid integer: {0}")]
    InvalidInteger(String),

    /// Bulk string length is negative
    #[error("invalid bulk string length: {0}")]
    InvalidBulkLength(i64),

    /// Array length is negative or above the limit
    #[error("invalid array length: {0}")]
    InvalidArrayLength(i64),

    /// An array element was not a bulk string
    #[error("expected '$', got {0:?}")]
    ExpectedBulkString(char),

    /// Protocol violation (missing CRLF, etc.)
    #[error("protocol error: {0}")]
    ProtocolError(String),

    /// The bulk string exceeds the maximum allowed size
    #[error("message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: usize },
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Maximum size for a single bulk string (512 MB, same as Redis)
pub const MAX_BULK_SIZE: usize = 512 * 1024 * 1024;

/// Maximum number of arguments in one request (same as Redis)
pub const MAX_ARGS: usize = 1024 * 1024;

/// A decoded request: the command name followed by its arguments.
pub type Request = Vec<Bytes>;

/// Stateless request decoder.
///
/// # Example
///
/// ```
/// use driftkv::protocol::RequestParser;
///
/// let parser = RequestParser::new();
/// let (args, consumed) = parser
///     .parse(b"*2\r\n$3\r\nTTL\r\n$3\r\nkey\r\n")
///     .unwrap()
///     .unwrap();
/// assert_eq!(args, vec!["TTL", "key"]);
/// assert_eq!(consumed, 22);
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct RequestParser;

impl RequestParser {
    pub fn new() -> Self {
        Self
    }

    /// Attempts to decode one request from the start of `buf`.
    pub fn parse(&self, buf: &[u8]) -> ParseResult<Option<(Request, usize)>> {
        match buf.first() {
            None => Ok(None),
            Some(&prefix::ARRAY) => parse_array(buf),
            Some(_) => parse_inline(buf),
        }
    }
}

/// Parses `*<count>\r\n` followed by `count` bulk strings.
fn parse_array(buf: &[u8]) -> ParseResult<Option<(Request, usize)>> {
    let Some((count, mut consumed)) = parse_header(buf)? else {
        return Ok(None);
    };

    if count < 0 || count as u64 > MAX_ARGS as u64 {
        return Err(ParseError::InvalidArrayLength(count));
    }

    let count = count as usize;
    let mut args = Vec::with_capacity(count.min(64));

    for _ in 0..count {
        match parse_bulk_string(&buf[consumed..])? {
            Some((arg, used)) => {
                args.push(arg);
                consumed += used;
            }
            None => return Ok(None),
        }
    }

    Ok(Some((args, consumed)))
}

/// Parses `$<length>\r\n<data>\r\n`.
fn parse_bulk_string(buf: &[u8]) -> ParseResult<Option<(Bytes, usize)>> {
    match buf.first() {
        None => return Ok(None),
        Some(&prefix::BULK_STRING) => {}
        Some(&other) => return Err(ParseError::ExpectedBulkString(other as char)),
    }

    let Some((length, data_start)) = parse_header(buf)? else {
        return Ok(None);
    };

    if length < 0 {
        return Err(ParseError::InvalidBulkLength(length));
    }
    let length = length as usize;
    if length > MAX_BULK_SIZE {
        return Err(ParseError::MessageTooLarge {
            size: length,
            max: MAX_BULK_SIZE,
        });
    }

    let total = data_start + length + CRLF.len();
    if buf.len() < total {
        return Ok(None);
    }
    if &buf[data_start + length..total] != CRLF {
        return Err(ParseError::ProtocolError(
            "bulk string missing trailing CRLF".to_string(),
        ));
    }

    let data = Bytes::copy_from_slice(&buf[data_start..data_start + length]);
    Ok(Some((data, total)))
}

/// Parses the `<prefix><integer>\r\n` line shared by arrays and bulk strings.
///
/// Returns the integer and the number of bytes in the line.
fn parse_header(buf: &[u8]) -> ParseResult<Option<(i64, usize)>> {
    let Some(pos) = find_crlf(&buf[1..]) else {
        return Ok(None);
    };

    let digits = &buf[1..1 + pos];
    let n = std::str::from_utf8(digits)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| ParseError::InvalidInteger(String::from_utf8_lossy(digits).into_owned()))?;

    Ok(Some((n, 1 + pos + CRLF.len())))
}

/// Parses an inline command: whitespace-separated words ending in CRLF.
fn parse_inline(buf: &[u8]) -> ParseResult<Option<(Request, usize)>> {
    let Some(pos) = find_crlf(buf) else {
        return Ok(None);
    };

    let args = buf[..pos]
        .split(|b| b.is_ascii_whitespace())
        .filter(|word| !word.is_empty())
        .map(Bytes::copy_from_slice)
        .collect();

    Ok(Some((args, pos + CRLF.len())))
}

/// Finds the position of CRLF in the buffer.
#[inline]
fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == CRLF)
}
