//! Stored value cells.
//!
//! A [`Record`] is what a key maps to: a typed payload plus the expiration
//! metadata (`created_at`, `ttl`). A zero `ttl` means the record never
//! expires; otherwise it is live strictly before `created_at + ttl`.

use bytes::Bytes;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::time::{Duration, SystemTime};

/// The payload of a record.
///
/// The generic command layer never looks inside a payload; it only reads
/// the discriminant through [`Value::value_type`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(Bytes),
    Hash(HashMap<Bytes, Bytes>),
    List(VecDeque<Bytes>),
    Set(HashSet<Bytes>),
    /// Member -> score
    SortedSet(HashMap<Bytes, f64>),
}

impl Value {
    /// Returns the discriminant of this payload.
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::String(_) => ValueType::String,
            Value::Hash(_) => ValueType::Hash,
            Value::List(_) => ValueType::List,
            Value::Set(_) => ValueType::Set,
            Value::SortedSet(_) => ValueType::SortedSet,
        }
    }
}

/// Type tag of a record's payload, as reported by TYPE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    String,
    Hash,
    List,
    Set,
    SortedSet,
}

impl ValueType {
    /// The name TYPE reports for this tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::String => "string",
            ValueType::Hash => "hash",
            ValueType::List => "list",
            ValueType::Set => "set",
            ValueType::SortedSet => "zset",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value cell with expiration metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// The stored payload
    pub value: Value,
    /// When the record was installed or its TTL last reset
    pub created_at: SystemTime,
    /// Time to live measured from `created_at` (zero = no expiration)
    pub ttl: Duration,
}

impl Record {
    /// Creates a record that never expires.
    pub fn new(value: Value, now: SystemTime) -> Self {
        Self {
            value,
            created_at: now,
            ttl: Duration::ZERO,
        }
    }

    /// Creates a record that expires `ttl` after `now`.
    pub fn with_ttl(value: Value, now: SystemTime, ttl: Duration) -> Self {
        Self {
            value,
            created_at: now,
            ttl,
        }
    }

    /// Returns true if an expiration is set.
    #[inline]
    pub fn has_ttl(&self) -> bool {
        !self.ttl.is_zero()
    }

    /// The absolute expiration time, or None if the record persists.
    ///
    /// A deadline beyond what `SystemTime` can represent is treated as no
    /// deadline at all.
    #[inline]
    pub fn deadline(&self) -> Option<SystemTime> {
        if self.has_ttl() {
            self.created_at.checked_add(self.ttl)
        } else {
            None
        }
    }

    /// Checks whether the record is live at `now`.
    #[inline]
    pub fn is_live_at(&self, now: SystemTime) -> bool {
        self.deadline().map(|d| d > now).unwrap_or(true)
    }

    /// Time left before expiry at `now`.
    ///
    /// Returns `None` for a persistent record and `Some(Duration::ZERO)` once
    /// the deadline has passed.
    pub fn remaining_at(&self, now: SystemTime) -> Option<Duration> {
        self.deadline()
            .map(|d| d.duration_since(now).unwrap_or(Duration::ZERO))
    }

    /// Re-bases the record's expiration so that it ends exactly at
    /// `deadline`, using `now` as the new creation time.
    pub fn expire_at(&mut self, deadline: SystemTime, now: SystemTime) {
        self.created_at = now;
        self.ttl = deadline.duration_since(now).unwrap_or(Duration::ZERO);
    }

    /// Removes the expiration. Returns true if one was set.
    pub fn persist(&mut self) -> bool {
        if self.has_ttl() {
            self.ttl = Duration::ZERO;
            true
        } else {
            false
        }
    }
}
