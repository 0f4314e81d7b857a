//! Protocol-neutral command results.
//!
//! Handlers return a [`Reply`]; the wire encoding lives in
//! [`crate::protocol`], which converts a `Reply` into a `RespValue`.

use bytes::Bytes;

/// The successful result of one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// A signed integer (counts, flags, TTLs)
    Integer(i64),
    /// A short status line such as `OK` or a type name
    Status(&'static str),
    /// A binary-safe string
    Bulk(Bytes),
    /// Absence of a value
    Null,
    /// An ordered list of replies
    Array(Vec<Reply>),
}

impl Reply {
    /// The `OK` status.
    pub fn ok() -> Self {
        Reply::Status("OK")
    }

    /// 1 for true, 0 for false.
    pub fn flag(value: bool) -> Self {
        Reply::Integer(i64::from(value))
    }

    /// Integer reply from a count.
    pub fn count(n: usize) -> Self {
        Reply::Integer(i64::try_from(n).unwrap_or(i64::MAX))
    }

    /// Bulk string or null.
    pub fn bulk_or_null(value: Option<Bytes>) -> Self {
        value.map_or(Reply::Null, Reply::Bulk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_helpers() {
        assert_eq!(Reply::ok(), Reply::Status("OK"));
        assert_eq!(Reply::flag(true), Reply::Integer(1));
        assert_eq!(Reply::flag(false), Reply::Integer(0));
        assert_eq!(Reply::count(3), Reply::Integer(3));
        assert_eq!(Reply::bulk_or_null(None), Reply::Null);
        assert_eq!(
            Reply::bulk_or_null(Some(Bytes::from("v"))),
            Reply::Bulk(Bytes::from("v"))
        );
    }
}
