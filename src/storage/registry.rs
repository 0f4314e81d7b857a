//! Database Registry
//!
//! Maps a numeric database index to its [`Keyspace`]. All keyspaces are
//! created up front and share one clock.

use crate::error::KeyspaceError;
use crate::storage::clock::{Clock, SystemClock};
use crate::storage::keyspace::Keyspace;
use std::sync::Arc;

/// Number of databases when none is configured (same as Redis).
pub const DEFAULT_DATABASES: usize = 16;

/// The set of logical databases served by one process.
///
/// There is no global instance: construct one, wrap it in an `Arc`, and hand
/// it to whatever needs it.
#[derive(Debug)]
pub struct Databases {
    keyspaces: Vec<Keyspace>,
    clock: Arc<dyn Clock>,
}

impl Default for Databases {
    fn default() -> Self {
        Self::new(DEFAULT_DATABASES)
    }
}

impl Databases {
    /// Creates `count` empty databases driven by the system clock.
    pub fn new(count: usize) -> Self {
        Self::with_clock(count, Arc::new(SystemClock))
    }

    /// Creates `count` empty databases that all read time from `clock`.
    pub fn with_clock(count: usize, clock: Arc<dyn Clock>) -> Self {
        let keyspaces = (0..count)
            .map(|_| Keyspace::with_clock(Arc::clone(&clock)))
            .collect();

        Self { keyspaces, clock }
    }

    /// Resolves `index` to its keyspace.
    pub fn get(&self, index: usize) -> Result<&Keyspace, KeyspaceError> {
        self.keyspaces
            .get(index)
            .ok_or(KeyspaceError::UnknownDatabase(index))
    }

    /// Number of databases.
    pub fn count(&self) -> usize {
        self.keyspaces.len()
    }

    /// Iterates over every keyspace in index order.
    pub fn iter(&self) -> impl Iterator<Item = &Keyspace> {
        self.keyspaces.iter()
    }

    /// The shared clock.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Total stored records across all databases.
    pub fn total_keys(&self) -> usize {
        self.iter().map(Keyspace::len).sum()
    }
}
