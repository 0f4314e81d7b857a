//! Per-command modifiers.
//!
//! These are plain data: the dispatcher builds them from the wire arguments
//! and the keyspace interprets them while it holds the shard lock.

use std::time::{Duration, SystemTime};

/// Modifiers for the EXPIRE family.
///
/// `deadline` is always absolute; relative forms (EXPIRE, PEXPIRE) are
/// converted by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpireOption {
    pub deadline: SystemTime,
    /// Only set the deadline if the key has no expiration
    pub nx: bool,
    /// Only set the deadline if the key already has an expiration
    pub xx: bool,
    /// Only set the deadline if it is later than the current one
    pub gt: bool,
    /// Only set the deadline if it is earlier than the current one
    pub lt: bool,
}

impl ExpireOption {
    /// An unconditional expiration at `deadline`.
    pub fn at(deadline: SystemTime) -> Self {
        Self {
            deadline,
            nx: false,
            xx: false,
            gt: false,
            lt: false,
        }
    }

    /// Decides whether the new deadline may replace `current`.
    ///
    /// A key without an expiration counts as expiring infinitely far in
    /// the future, so GT never applies to it and LT always does.
    pub fn admits(&self, current: Option<SystemTime>) -> bool {
        if self.nx && current.is_some() {
            return false;
        }
        if self.xx && current.is_none() {
            return false;
        }
        if self.gt && !current.is_some_and(|c| self.deadline > c) {
            return false;
        }
        if self.lt && !current.map_or(true, |c| self.deadline < c) {
            return false;
        }
        true
    }
}

/// Modifiers for RENAME.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenameOption {
    /// Only rename if the destination has no live record
    pub nx: bool,
}

/// Expiration requested by SET.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SetExpiry {
    /// No expiration (clears any existing one unless `keep_ttl`)
    #[default]
    Persist,
    /// Expire after a duration (EX / PX)
    After(Duration),
    /// Expire at an absolute time (EXAT / PXAT)
    At(SystemTime),
}

/// Modifiers for SET.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetOption {
    pub expiry: SetExpiry,
    /// Only set if the key does not exist
    pub nx: bool,
    /// Only set if the key already exists
    pub xx: bool,
    /// Retain the existing expiration
    pub keep_ttl: bool,
    /// Return the previous string value
    pub get: bool,
}
