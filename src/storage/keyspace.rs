//! Thread-Safe Keyspace with Expiry Support
//!
//! A [`Keyspace`] holds the key → [`Record`] mapping of one logical
//! database. It is shared by every connection that has that database
//! selected.
//!
//! ## Design Decisions
//!
//! 1. **Sharded Locks**: keys are spread over 64 shards, each behind its own
//!    `RwLock`, so unrelated keys rarely contend.
//! 2. **Lazy Expiry**: a record past its deadline is treated as absent by
//!    every read and removed the next time it is looked up.
//! 3. **Whole-operation locking**: every public operation performs its
//!    check-then-act sequence while holding the lock(s) it needs.
//!
//! ## Concurrency Model
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Keyspace                             │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐           │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │ Shard N │           │
//! │  │ RwLock  │ │ RwLock  │ │ RwLock  │ │ RwLock  │           │
//! │  │ HashMap │ │ HashMap │ │ HashMap │ │ HashMap │           │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Operations spanning several shards (RENAME, KEYS) always acquire shard
//! locks in ascending index order.

use crate::error::KeyspaceError;
use crate::options::{ExpireOption, SetExpiry, SetOption};
use crate::storage::clock::{Clock, SystemClock};
use crate::storage::record::{Record, Value, ValueType};
use bytes::Bytes;
use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, SystemTime};

/// Number of shards per keyspace.
const NUM_SHARDS: usize = 64;

type ShardMap = HashMap<Bytes, Record>;

/// Expiration state of a key, as seen by TTL/PTTL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtlState {
    /// No live record
    Missing,
    /// Live record without expiration
    Persistent,
    /// Live record expiring after the given duration
    Remaining(Duration),
}

/// Result of a SET.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetOutcome {
    /// Whether the value was written (false when NX/XX vetoed it)
    pub written: bool,
    /// Previous string value, only collected when GET was requested
    pub previous: Option<Bytes>,
}

/// One logical database.
///
/// Wrap it in an `Arc` (the [`Databases`](crate::storage::Databases)
/// registry does) to share it across connection tasks.
///
/// # Example
///
/// ```
/// use driftkv::storage::{Keyspace, Value};
/// use bytes::Bytes;
///
/// let keyspace = Keyspace::new();
/// keyspace.insert(Bytes::from("k1"), Value::String(Bytes::from("v1")), None);
///
/// keyspace.rename(b"k1", b"k2").unwrap();
/// assert!(keyspace.get(b"k1").is_none());
/// assert!(keyspace.get(b"k2").is_some());
/// ```
pub struct Keyspace {
    shards: Vec<RwLock<ShardMap>>,
    clock: Arc<dyn Clock>,
    /// Records reclaimed after expiring, lazily or by the sweeper
    expired_count: AtomicU64,
}

impl std::fmt::Debug for Keyspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keyspace")
            .field("shards", &self.shards.len())
            .field("keys", &self.len())
            .field("expired", &self.expired_count.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for Keyspace {
    fn default() -> Self {
        Self::new()
    }
}

/// Write guards over the shards touched by a rename.
struct ShardPair<'a> {
    low_index: usize,
    low: RwLockWriteGuard<'a, ShardMap>,
    high: Option<RwLockWriteGuard<'a, ShardMap>>,
}

impl ShardPair<'_> {
    fn map(&mut self, index: usize) -> &mut ShardMap {
        match &mut self.high {
            Some(high) if index != self.low_index => &mut **high,
            _ => &mut *self.low,
        }
    }
}

impl Keyspace {
    /// Creates an empty keyspace driven by the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates an empty keyspace that reads time from `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            shards: (0..NUM_SHARDS).map(|_| RwLock::new(HashMap::new())).collect(),
            clock,
            expired_count: AtomicU64::new(0),
        }
    }

    /// The clock this keyspace evaluates expiration against.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    #[inline]
    fn shard_index(&self, key: &[u8]) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() as usize) % NUM_SHARDS
    }

    #[inline]
    fn read_shard(&self, index: usize) -> RwLockReadGuard<'_, ShardMap> {
        self.shards[index]
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    #[inline]
    fn write_shard(&self, index: usize) -> RwLockWriteGuard<'_, ShardMap> {
        self.shards[index]
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the live record under `key`, evicting it first if it has
    /// expired. Caller must hold the shard's write lock.
    fn live_record<'a>(
        &self,
        data: &'a mut ShardMap,
        key: &[u8],
        now: SystemTime,
    ) -> Option<&'a mut Record> {
        let live = data.get(key)?.is_live_at(now);
        if !live {
            data.remove(key);
            self.expired_count.fetch_add(1, Ordering::Relaxed);
            return None;
        }
        data.get_mut(key)
    }

    /// Runs `f` against the live record under `key`.
    ///
    /// Live records are served under a read lock. An expired record is
    /// evicted under the write lock, re-checked first since another writer
    /// may have replaced it in between.
    fn with_live<R>(&self, key: &[u8], f: impl FnOnce(&Record, SystemTime) -> R) -> Option<R> {
        let index = self.shard_index(key);

        {
            let data = self.read_shard(index);
            let now = self.clock.now();
            match data.get(key) {
                None => return None,
                Some(record) if record.is_live_at(now) => return Some(f(record, now)),
                Some(_) => {}
            }
        }

        let mut data = self.write_shard(index);
        let now = self.clock.now();
        self.live_record(&mut data, key, now)
            .map(|record| f(record, now))
    }

    /// Returns a copy of the live record for `key`.
    ///
    /// Expired records are removed during the call and reported as absent.
    pub fn get(&self, key: &[u8]) -> Option<Record> {
        self.with_live(key, |record, _| record.clone())
    }

    /// Checks whether `key` has a live record.
    pub fn exists(&self, key: &[u8]) -> bool {
        self.with_live(key, |_, _| ()).is_some()
    }

    /// Returns the payload type of the live record for `key`.
    pub fn value_type(&self, key: &[u8]) -> Option<ValueType> {
        self.with_live(key, |record, _| record.value.value_type())
    }

    /// Returns the expiration state of `key`.
    pub fn ttl(&self, key: &[u8]) -> TtlState {
        self.with_live(key, |record, now| match record.remaining_at(now) {
            None => TtlState::Persistent,
            Some(remaining) => TtlState::Remaining(remaining),
        })
        .unwrap_or(TtlState::Missing)
    }

    /// Removes `key` whether or not its record is still live.
    ///
    /// Returns true if any record was removed. An expired record is also
    /// counted in [`expired_total`](Self::expired_total).
    pub fn remove(&self, key: &[u8]) -> bool {
        let index = self.shard_index(key);
        let mut data = self.write_shard(index);
        let now = self.clock.now();

        match data.remove(key) {
            Some(record) => {
                if !record.is_live_at(now) {
                    self.expired_count.fetch_add(1, Ordering::Relaxed);
                }
                true
            }
            None => false,
        }
    }

    /// Moves the record at `old` to `new`, replacing anything at `new`.
    ///
    /// The record keeps its value and its expiration. Fails with
    /// `KeyNotFound` if `old` has no live record, leaving the keyspace as
    /// it was.
    pub fn rename(&self, old: &[u8], new: &[u8]) -> Result<(), KeyspaceError> {
        self.rename_inner(old, new, false).map(|_| ())
    }

    /// Like [`rename`](Self::rename), but leaves both keys untouched and
    /// returns `Ok(false)` if `new` already has a live record.
    pub fn rename_nx(&self, old: &[u8], new: &[u8]) -> Result<bool, KeyspaceError> {
        self.rename_inner(old, new, true)
    }

    fn rename_inner(&self, old: &[u8], new: &[u8], nx: bool) -> Result<bool, KeyspaceError> {
        let src = self.shard_index(old);
        let dst = self.shard_index(new);
        let (low_index, high_index) = (src.min(dst), src.max(dst));

        let mut shards = ShardPair {
            low_index,
            low: self.write_shard(low_index),
            high: (high_index != low_index).then(|| self.write_shard(high_index)),
        };
        let now = self.clock.now();

        if self.live_record(shards.map(src), old, now).is_none() {
            return Err(KeyspaceError::KeyNotFound);
        }

        if old == new {
            return Ok(!nx);
        }

        if nx && self.live_record(shards.map(dst), new, now).is_some() {
            return Ok(false);
        }

        let Some(record) = shards.map(src).remove(old) else {
            return Err(KeyspaceError::KeyNotFound);
        };
        shards.map(dst).insert(Bytes::copy_from_slice(new), record);

        Ok(true)
    }

    /// Returns a snapshot of all live keys.
    ///
    /// Every shard is read-locked before scanning, so a concurrent rename
    /// is observed either completely or not at all.
    pub fn keys(&self) -> Vec<Bytes> {
        let shards: Vec<_> = (0..NUM_SHARDS).map(|i| self.read_shard(i)).collect();
        let now = self.clock.now();

        shards
            .iter()
            .flat_map(|data| {
                data.iter()
                    .filter(|(_, record)| record.is_live_at(now))
                    .map(|(key, _)| key.clone())
            })
            .collect()
    }

    /// Applies the deadline in `option` to `key`.
    ///
    /// Returns false if the key has no live record or the NX/XX/GT/LT
    /// conditions reject the new deadline. A deadline that is not in the
    /// future deletes the key.
    pub fn set_ttl(&self, key: &[u8], option: &ExpireOption) -> bool {
        let index = self.shard_index(key);
        let mut data = self.write_shard(index);
        let now = self.clock.now();

        let admitted = match self.live_record(&mut data, key, now) {
            Some(record) => option.admits(record.deadline()),
            None => return false,
        };
        if !admitted {
            return false;
        }

        if option.deadline <= now {
            data.remove(key);
        } else if let Some(record) = data.get_mut(key) {
            record.expire_at(option.deadline, now);
        }
        true
    }

    /// Clears the expiration of `key`.
    ///
    /// Returns true if the key has a live record that had an expiration.
    pub fn persist(&self, key: &[u8]) -> bool {
        let index = self.shard_index(key);
        let mut data = self.write_shard(index);
        let now = self.clock.now();

        self.live_record(&mut data, key, now)
            .map(Record::persist)
            .unwrap_or(false)
    }

    /// Returns the string stored at `key`.
    ///
    /// Fails with `WrongType` if the live record holds another payload.
    pub fn get_string(&self, key: &[u8]) -> Result<Option<Bytes>, KeyspaceError> {
        self.with_live(key, |record, _| match &record.value {
            Value::String(s) => Ok(s.clone()),
            _ => Err(KeyspaceError::WrongType),
        })
        .transpose()
    }

    /// Stores a string value, honouring the SET modifiers.
    pub fn set(
        &self,
        key: Bytes,
        value: Bytes,
        option: &SetOption,
    ) -> Result<SetOutcome, KeyspaceError> {
        let index = self.shard_index(&key);
        let mut data = self.write_shard(index);
        let now = self.clock.now();

        let mut previous = None;
        let existing = match self.live_record(&mut data, &key, now) {
            Some(record) => {
                if option.get {
                    match &record.value {
                        Value::String(s) => previous = Some(s.clone()),
                        _ => return Err(KeyspaceError::WrongType),
                    }
                }
                Some((record.created_at, record.ttl))
            }
            None => None,
        };

        if (option.nx && existing.is_some()) || (option.xx && existing.is_none()) {
            return Ok(SetOutcome {
                written: false,
                previous,
            });
        }

        let value = Value::String(value);
        let record = match option.expiry {
            SetExpiry::Persist => match existing {
                Some((created_at, ttl)) if option.keep_ttl => Record {
                    value,
                    created_at,
                    ttl,
                },
                _ => Record::new(value, now),
            },
            SetExpiry::After(ttl) => Record::with_ttl(value, now, ttl),
            SetExpiry::At(deadline) if deadline <= now => {
                data.remove(&key);
                return Ok(SetOutcome {
                    written: true,
                    previous,
                });
            }
            SetExpiry::At(deadline) => {
                let mut record = Record::new(value, now);
                record.expire_at(deadline, now);
                record
            }
        };

        data.insert(key, record);
        Ok(SetOutcome {
            written: true,
            previous,
        })
    }

    /// Installs `value` at `key`, replacing anything there.
    ///
    /// This is the entry point for type-specific collaborators and tests.
    pub fn insert(&self, key: Bytes, value: Value, ttl: Option<Duration>) {
        let index = self.shard_index(&key);
        let mut data = self.write_shard(index);
        let now = self.clock.now();

        let record = match ttl {
            Some(ttl) => Record::with_ttl(value, now, ttl),
            None => Record::new(value, now),
        };
        data.insert(key, record);
    }

    /// Number of stored records, including expired ones not yet reclaimed.
    pub fn len(&self) -> usize {
        (0..NUM_SHARDS).map(|i| self.read_shard(i).len()).sum()
    }

    /// Returns true if no records are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every record (FLUSHDB).
    pub fn clear(&self) {
        for index in 0..NUM_SHARDS {
            self.write_shard(index).clear();
        }
    }

    /// Total records reclaimed after expiring.
    pub fn expired_total(&self) -> u64 {
        self.expired_count.load(Ordering::Relaxed)
    }

    /// Removes every expired record. Returns how many were removed.
    ///
    /// Called by the background expiry sweeper; shards are locked one at a
    /// time.
    pub fn cleanup_expired(&self) -> u64 {
        let mut cleaned = 0u64;

        for index in 0..NUM_SHARDS {
            let mut data = self.write_shard(index);
            let now = self.clock.now();
            let before = data.len();
            data.retain(|_, record| record.is_live_at(now));
            cleaned += (before - data.len()) as u64;
        }

        if cleaned > 0 {
            self.expired_count.fetch_add(cleaned, Ordering::Relaxed);
        }
        cleaned
    }
}
