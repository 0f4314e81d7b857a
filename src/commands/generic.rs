//! Generic Key Commands
//!
//! Type-agnostic operations over the keyspace of the caller's selected
//! database: DEL, EXISTS, EXPIRE, TYPE, KEYS, RENAME, TTL, PTTL and PERSIST.
//!
//! Handlers receive already-parsed arguments. Argument counting and option
//! parsing happen in the [dispatcher](super::dispatch); here we only resolve
//! the database and run the operation.

use crate::commands::reply::Reply;
use crate::error::CommandResult;
use crate::options::{ExpireOption, RenameOption};
use crate::pattern::GlobPattern;
use crate::storage::{Databases, Keyspace, TtlState};
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// TTL reply for a key with no live record.
const TTL_MISSING: i64 = -2;
/// TTL reply for a live key without expiration.
const TTL_PERSISTENT: i64 = -1;

/// Per-connection state visible to command handlers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Session {
    /// Index of the selected database
    pub db: usize,
}

impl Session {
    /// A session with database `db` selected.
    pub fn new(db: usize) -> Self {
        Self { db }
    }
}

/// Generic command handlers bound to a database registry.
#[derive(Debug, Clone)]
pub struct GenericCommands {
    databases: Arc<Databases>,
}

impl GenericCommands {
    pub fn new(databases: Arc<Databases>) -> Self {
        Self { databases }
    }

    /// The registry these handlers operate on.
    pub fn databases(&self) -> &Arc<Databases> {
        &self.databases
    }

    fn keyspace(&self, session: &Session) -> CommandResult<&Keyspace> {
        Ok(self.databases.get(session.db)?)
    }

    /// DEL key [key ...]
    ///
    /// Counts the keys that had a record, expired or not. Repeating a key
    /// does not count it twice.
    pub fn del(&self, session: &Session, keys: &[Bytes]) -> CommandResult<Reply> {
        let keyspace = self.keyspace(session)?;
        let removed = keys.iter().filter(|key| keyspace.remove(key)).count();
        Ok(Reply::count(removed))
    }

    /// EXISTS key [key ...]
    ///
    /// Each argument is checked on its own, so a repeated key is counted
    /// once per occurrence.
    pub fn exists(&self, session: &Session, keys: &[Bytes]) -> CommandResult<Reply> {
        let keyspace = self.keyspace(session)?;
        let found = keys.iter().filter(|key| keyspace.exists(key)).count();
        Ok(Reply::count(found))
    }

    /// EXPIRE family. `option.deadline` is absolute.
    pub fn expire(
        &self,
        session: &Session,
        key: &[u8],
        option: &ExpireOption,
    ) -> CommandResult<Reply> {
        let keyspace = self.keyspace(session)?;
        Ok(Reply::flag(keyspace.set_ttl(key, option)))
    }

    /// PERSIST key
    pub fn persist(&self, session: &Session, key: &[u8]) -> CommandResult<Reply> {
        let keyspace = self.keyspace(session)?;
        Ok(Reply::flag(keyspace.persist(key)))
    }

    /// TYPE key
    pub fn key_type(&self, session: &Session, key: &[u8]) -> CommandResult<Reply> {
        let keyspace = self.keyspace(session)?;
        let name = keyspace
            .value_type(key)
            .map_or("none", |value_type| value_type.as_str());
        Ok(Reply::Status(name))
    }

    /// KEYS pattern
    pub fn keys(&self, session: &Session, pattern: &[u8]) -> CommandResult<Reply> {
        let keyspace = self.keyspace(session)?;
        let pattern = GlobPattern::new(pattern).inspect_err(|e| {
            debug!(error = %e, "KEYS pattern rejected");
        })?;

        let matched = keyspace
            .keys()
            .into_iter()
            .filter(|key| pattern.matches(key))
            .map(Reply::Bulk)
            .collect();
        Ok(Reply::Array(matched))
    }

    /// RENAME / RENAMENX
    ///
    /// Plain RENAME answers `OK`; the NX form answers 1 or 0.
    pub fn rename(
        &self,
        session: &Session,
        key: &[u8],
        new_key: &[u8],
        option: RenameOption,
    ) -> CommandResult<Reply> {
        let keyspace = self.keyspace(session)?;

        if option.nx {
            Ok(Reply::flag(keyspace.rename_nx(key, new_key)?))
        } else {
            keyspace.rename(key, new_key)?;
            Ok(Reply::ok())
        }
    }

    /// TTL key, in whole seconds. Partial seconds are truncated.
    pub fn ttl(&self, session: &Session, key: &[u8]) -> CommandResult<Reply> {
        self.remaining(session, key, |remaining| u128::from(remaining.as_secs()))
    }

    /// PTTL key, in milliseconds.
    pub fn pttl(&self, session: &Session, key: &[u8]) -> CommandResult<Reply> {
        self.remaining(session, key, |remaining| remaining.as_millis())
    }

    fn remaining(
        &self,
        session: &Session,
        key: &[u8],
        unit: impl Fn(Duration) -> u128,
    ) -> CommandResult<Reply> {
        let keyspace = self.keyspace(session)?;

        let value = match keyspace.ttl(key) {
            TtlState::Missing => TTL_MISSING,
            TtlState::Persistent => TTL_PERSISTENT,
            TtlState::Remaining(remaining) => i64::try_from(unit(remaining)).unwrap_or(i64::MAX),
        };
        Ok(Reply::Integer(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CommandError, KeyspaceError};
    use crate::storage::{Clock, ManualClock, Value};
    use std::collections::{HashMap, HashSet, VecDeque};

    fn create_commands() -> (GenericCommands, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let databases = Databases::with_clock(4, clock.clone());
        (GenericCommands::new(Arc::new(databases)), clock)
    }

    fn set(commands: &GenericCommands, session: &Session, key: &str, ttl: Option<Duration>) {
        commands.databases().get(session.db).unwrap().insert(
            Bytes::from(key.to_string()),
            Value::String(Bytes::from("value")),
            ttl,
        );
    }

    fn keys(names: &[&str]) -> Vec<Bytes> {
        names.iter().map(|s| Bytes::from(s.to_string())).collect()
    }

    fn expire_in(clock: &ManualClock, secs: u64) -> ExpireOption {
        ExpireOption::at(clock.now() + Duration::from_secs(secs))
    }

    fn sorted(reply: Reply) -> Vec<Bytes> {
        let items = match reply {
            Reply::Array(items) => items,
            other => panic!("expected array, got {:?}", other),
        };
        let mut keys: Vec<Bytes> = items
            .into_iter()
            .map(|item| match item {
                Reply::Bulk(key) => key,
                other => panic!("expected bulk, got {:?}", other),
            })
            .collect();
        keys.sort();
        keys
    }

    #[test]
    fn test_ttl_scenario_with_simulated_time() {
        let (commands, clock) = create_commands();
        let session = Session::default();
        set(&commands, &session, "k1", None);
        set(&commands, &session, "k2", Some(Duration::from_secs(10)));

        assert_eq!(commands.ttl(&session, b"k1").unwrap(), Reply::Integer(-1));
        assert_eq!(commands.ttl(&session, b"k2").unwrap(), Reply::Integer(10));

        let reply = commands
            .expire(&session, b"k1", &expire_in(&clock, 5))
            .unwrap();
        assert_eq!(reply, Reply::Integer(1));
        assert_eq!(commands.ttl(&session, b"k1").unwrap(), Reply::Integer(5));

        let reply = commands
            .rename(&session, b"k1", b"k3", RenameOption::default())
            .unwrap();
        assert_eq!(reply, Reply::ok());
        assert_eq!(
            commands.exists(&session, &keys(&["k3"])).unwrap(),
            Reply::Integer(1)
        );
        assert_eq!(commands.ttl(&session, b"k3").unwrap(), Reply::Integer(5));

        clock.advance(Duration::from_secs(11));
        assert_eq!(
            commands.exists(&session, &keys(&["k2"])).unwrap(),
            Reply::Integer(0)
        );
        assert_eq!(
            commands.key_type(&session, b"k2").unwrap(),
            Reply::Status("none")
        );
        assert_eq!(commands.ttl(&session, b"k2").unwrap(), Reply::Integer(-2));
    }

    #[test]
    fn test_del_counts_each_key_once() {
        let (commands, _) = create_commands();
        let session = Session::default();
        set(&commands, &session, "k", None);

        let reply = commands.del(&session, &keys(&["k", "k"])).unwrap();
        assert_eq!(reply, Reply::Integer(1));
        assert_eq!(
            commands.exists(&session, &keys(&["k"])).unwrap(),
            Reply::Integer(0)
        );

        // idempotent
        let reply = commands.del(&session, &keys(&["k"])).unwrap();
        assert_eq!(reply, Reply::Integer(0));
    }

    #[test]
    fn test_del_counts_expired_records_it_reclaims() {
        let (commands, clock) = create_commands();
        let session = Session::default();
        set(&commands, &session, "a", None);
        set(&commands, &session, "b", Some(Duration::from_secs(1)));
        clock.advance(Duration::from_secs(2));

        let reply = commands.del(&session, &keys(&["a", "b", "c"])).unwrap();
        assert_eq!(reply, Reply::Integer(2));
        assert_eq!(commands.databases().get(0).unwrap().len(), 0);
    }

    #[test]
    fn test_exists_counts_duplicates() {
        let (commands, _) = create_commands();
        let session = Session::default();
        set(&commands, &session, "k", None);

        let reply = commands
            .exists(&session, &keys(&["k", "k", "missing"]))
            .unwrap();
        assert_eq!(reply, Reply::Integer(2));
    }

    #[test]
    fn test_expire_missing_key() {
        let (commands, clock) = create_commands();
        let session = Session::default();

        let reply = commands
            .expire(&session, b"missing", &expire_in(&clock, 10))
            .unwrap();
        assert_eq!(reply, Reply::Integer(0));
    }

    #[test]
    fn test_expire_past_deadline_deletes() {
        let (commands, clock) = create_commands();
        let session = Session::default();
        set(&commands, &session, "k", None);

        let past = ExpireOption::at(clock.now() - Duration::from_secs(1));
        assert_eq!(
            commands.expire(&session, b"k", &past).unwrap(),
            Reply::Integer(1)
        );
        assert_eq!(commands.ttl(&session, b"k").unwrap(), Reply::Integer(-2));
    }

    #[test]
    fn test_expire_conditions() {
        let (commands, clock) = create_commands();
        let session = Session::default();
        set(&commands, &session, "k", None);

        let xx = ExpireOption {
            xx: true,
            ..expire_in(&clock, 10)
        };
        assert_eq!(
            commands.expire(&session, b"k", &xx).unwrap(),
            Reply::Integer(0)
        );

        let nx = ExpireOption {
            nx: true,
            ..expire_in(&clock, 10)
        };
        assert_eq!(
            commands.expire(&session, b"k", &nx).unwrap(),
            Reply::Integer(1)
        );
        assert_eq!(
            commands.expire(&session, b"k", &nx).unwrap(),
            Reply::Integer(0)
        );

        let gt = ExpireOption {
            gt: true,
            ..expire_in(&clock, 5)
        };
        assert_eq!(
            commands.expire(&session, b"k", &gt).unwrap(),
            Reply::Integer(0)
        );

        let lt = ExpireOption {
            lt: true,
            ..expire_in(&clock, 5)
        };
        assert_eq!(
            commands.expire(&session, b"k", &lt).unwrap(),
            Reply::Integer(1)
        );
        assert_eq!(commands.ttl(&session, b"k").unwrap(), Reply::Integer(5));
    }

    #[test]
    fn test_persist() {
        let (commands, _) = create_commands();
        let session = Session::default();
        set(&commands, &session, "temp", Some(Duration::from_secs(30)));
        set(&commands, &session, "perm", None);

        assert_eq!(
            commands.persist(&session, b"temp").unwrap(),
            Reply::Integer(1)
        );
        assert_eq!(commands.ttl(&session, b"temp").unwrap(), Reply::Integer(-1));
        assert_eq!(
            commands.persist(&session, b"perm").unwrap(),
            Reply::Integer(0)
        );
        assert_eq!(
            commands.persist(&session, b"missing").unwrap(),
            Reply::Integer(0)
        );
    }

    #[test]
    fn test_pttl() {
        let (commands, clock) = create_commands();
        let session = Session::default();
        set(&commands, &session, "k", Some(Duration::from_millis(1500)));

        assert_eq!(commands.pttl(&session, b"k").unwrap(), Reply::Integer(1500));
        assert_eq!(commands.ttl(&session, b"k").unwrap(), Reply::Integer(1));

        clock.advance(Duration::from_millis(1200));
        assert_eq!(commands.pttl(&session, b"k").unwrap(), Reply::Integer(300));
        assert_eq!(commands.ttl(&session, b"k").unwrap(), Reply::Integer(0));
        assert_eq!(
            commands.pttl(&session, b"missing").unwrap(),
            Reply::Integer(-2)
        );
    }

    #[test]
    fn test_ttl_truncates_partial_seconds() {
        let (commands, clock) = create_commands();
        let session = Session::default();
        set(&commands, &session, "k", Some(Duration::from_secs(10)));

        clock.advance(Duration::from_millis(400));
        assert_eq!(commands.ttl(&session, b"k").unwrap(), Reply::Integer(9));
        assert_eq!(commands.pttl(&session, b"k").unwrap(), Reply::Integer(9600));

        clock.advance(Duration::from_millis(9_500));
        assert_eq!(commands.ttl(&session, b"k").unwrap(), Reply::Integer(0));
    }

    #[test]
    fn test_type_reports_every_payload() {
        let (commands, _) = create_commands();
        let session = Session::default();
        let keyspace = commands.databases().get(0).unwrap();

        keyspace.insert(Bytes::from("s"), Value::String(Bytes::from("v")), None);
        keyspace.insert(Bytes::from("h"), Value::Hash(HashMap::new()), None);
        keyspace.insert(Bytes::from("l"), Value::List(VecDeque::new()), None);
        keyspace.insert(Bytes::from("t"), Value::Set(HashSet::new()), None);
        keyspace.insert(Bytes::from("z"), Value::SortedSet(HashMap::new()), None);

        for (key, expected) in [
            ("s", "string"),
            ("h", "hash"),
            ("l", "list"),
            ("t", "set"),
            ("z", "zset"),
            ("missing", "none"),
        ] {
            assert_eq!(
                commands.key_type(&session, key.as_bytes()).unwrap(),
                Reply::Status(expected),
                "TYPE {}",
                key
            );
        }
    }

    #[test]
    fn test_keys_glob() {
        let (commands, _) = create_commands();
        let session = Session::default();
        for key in ["user:1", "user:2", "order:1", "abc", "axc", "abbc"] {
            set(&commands, &session, key, None);
        }

        assert_eq!(
            sorted(commands.keys(&session, b"user:*").unwrap()),
            keys(&["user:1", "user:2"])
        );
        assert_eq!(
            sorted(commands.keys(&session, b"a?c").unwrap()),
            keys(&["abc", "axc"])
        );
        assert_eq!(sorted(commands.keys(&session, b"*").unwrap()).len(), 6);
        assert!(sorted(commands.keys(&session, b"nothing*").unwrap()).is_empty());
    }

    #[test]
    fn test_keys_metacharacters_are_literal() {
        let (commands, _) = create_commands();
        let session = Session::default();
        set(&commands, &session, "a.b", None);
        set(&commands, &session, "axb", None);
        set(&commands, &session, "(x)+", None);

        assert_eq!(
            sorted(commands.keys(&session, b"a.b").unwrap()),
            keys(&["a.b"])
        );
        assert_eq!(
            sorted(commands.keys(&session, b"(x)+").unwrap()),
            keys(&["(x)+"])
        );
    }

    #[test]
    fn test_keys_skips_expired() {
        let (commands, clock) = create_commands();
        let session = Session::default();
        set(&commands, &session, "live", None);
        set(&commands, &session, "gone", Some(Duration::from_secs(1)));
        clock.advance(Duration::from_secs(1));

        assert_eq!(
            sorted(commands.keys(&session, b"*").unwrap()),
            keys(&["live"])
        );
    }

    #[test]
    fn test_rename_missing_source() {
        let (commands, _) = create_commands();
        let session = Session::default();

        let err = commands
            .rename(&session, b"missing", b"other", RenameOption::default())
            .unwrap_err();
        assert_eq!(err, CommandError::Keyspace(KeyspaceError::KeyNotFound));
        assert_eq!(err.to_string(), "ERR no such key");
    }

    #[test]
    fn test_rename_nx() {
        let (commands, _) = create_commands();
        let session = Session::default();
        set(&commands, &session, "a", None);
        set(&commands, &session, "b", None);
        let nx = RenameOption { nx: true };

        assert_eq!(
            commands.rename(&session, b"a", b"b", nx).unwrap(),
            Reply::Integer(0)
        );
        assert_eq!(
            commands.exists(&session, &keys(&["a", "b"])).unwrap(),
            Reply::Integer(2)
        );

        assert_eq!(
            commands.rename(&session, b"a", b"c", nx).unwrap(),
            Reply::Integer(1)
        );
        assert_eq!(
            commands.exists(&session, &keys(&["a", "c"])).unwrap(),
            Reply::Integer(1)
        );
    }

    #[test]
    fn test_rename_overwrites_and_keeps_ttl() {
        let (commands, _) = create_commands();
        let session = Session::default();
        set(&commands, &session, "src", Some(Duration::from_secs(20)));
        set(&commands, &session, "dst", None);

        commands
            .rename(&session, b"src", b"dst", RenameOption::default())
            .unwrap();
        assert_eq!(commands.ttl(&session, b"dst").unwrap(), Reply::Integer(20));
        assert_eq!(commands.ttl(&session, b"src").unwrap(), Reply::Integer(-2));
    }

    #[test]
    fn test_sessions_select_independent_databases() {
        let (commands, _) = create_commands();
        let db0 = Session::new(0);
        let db1 = Session::new(1);
        set(&commands, &db0, "k", None);

        assert_eq!(
            commands.exists(&db0, &keys(&["k"])).unwrap(),
            Reply::Integer(1)
        );
        assert_eq!(
            commands.exists(&db1, &keys(&["k"])).unwrap(),
            Reply::Integer(0)
        );
    }

    #[test]
    fn test_unknown_database_is_an_error_everywhere() {
        let (commands, clock) = create_commands();
        let session = Session::new(99);
        let expected = CommandError::Keyspace(KeyspaceError::UnknownDatabase(99));
        let deadline = ExpireOption::at(clock.now() + Duration::from_secs(1));

        assert_eq!(commands.del(&session, &keys(&["k"])), Err(expected.clone()));
        assert_eq!(commands.exists(&session, &keys(&["k"])), Err(expected.clone()));
        assert_eq!(commands.expire(&session, b"k", &deadline), Err(expected.clone()));
        assert_eq!(commands.key_type(&session, b"k"), Err(expected.clone()));
        assert_eq!(commands.keys(&session, b"*"), Err(expected.clone()));
        assert_eq!(
            commands.rename(&session, b"k", b"j", RenameOption::default()),
            Err(expected.clone())
        );
        assert_eq!(commands.ttl(&session, b"k"), Err(expected));
    }
}
