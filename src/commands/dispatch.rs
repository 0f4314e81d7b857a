//! Command Dispatch
//!
//! Maps a decoded request (command name plus raw arguments) to its handler.
//! Argument counts and command options are validated here so the handlers
//! in [`generic`](super::generic) only ever see well-formed input.
//!
//! ## Supported Commands
//!
//! ### Key Commands
//! - `DEL key [key ...]`, `EXISTS key [key ...]`
//! - `EXPIRE key seconds [NX|XX|GT|LT]`, `PEXPIRE key milliseconds [...]`
//! - `EXPIREAT key unix-seconds [...]`, `PEXPIREAT key unix-milliseconds [...]`
//! - `TTL key`, `PTTL key`, `PERSIST key`
//! - `TYPE key`, `KEYS pattern`, `RENAME key newkey`, `RENAMENX key newkey`
//!
//! ### String Commands
//! - `SET key value [NX|XX] [GET] [EX s|PX ms|EXAT ts|PXAT ts|KEEPTTL]`
//! - `GET key`
//!
//! ### Connection and Server Commands
//! - `SELECT index`, `PING [message]`, `ECHO message`
//! - `DBSIZE`, `FLUSHDB [ASYNC|SYNC]`, `QUIT`

use crate::commands::generic::{GenericCommands, Session};
use crate::commands::reply::Reply;
use crate::error::{CommandError, CommandResult, KeyspaceError};
use crate::options::{ExpireOption, RenameOption, SetExpiry, SetOption};
use crate::protocol::RespValue;
use crate::storage::{Databases, Keyspace};
use bytes::Bytes;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, trace};

/// Allowed number of arguments after the command name.
#[derive(Debug, Clone, Copy)]
enum Arity {
    Exact(usize),
    AtLeast(usize),
    Between(usize, usize),
}

impl Arity {
    fn check(self, name: &'static str, args: &[Bytes]) -> CommandResult<()> {
        let n = args.len();
        let ok = match self {
            Arity::Exact(expected) => n == expected,
            Arity::AtLeast(min) => n >= min,
            Arity::Between(min, max) => (min..=max).contains(&n),
        };
        if ok {
            Ok(())
        } else {
            Err(CommandError::WrongArity(name))
        }
    }
}

/// Unit of the time argument of an EXPIRE-family command.
#[derive(Debug, Clone, Copy)]
enum TimeUnit {
    Seconds,
    Milliseconds,
}

/// What the time argument is relative to.
#[derive(Debug, Clone, Copy)]
enum TimeBase {
    /// Offset from now (EXPIRE, PEXPIRE)
    Now,
    /// Unix timestamp (EXPIREAT, PEXPIREAT)
    Epoch,
}

/// Executes requests against a database registry.
///
/// Cheap to clone; every connection holds its own copy.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    generic: GenericCommands,
}

impl Dispatcher {
    pub fn new(databases: Arc<Databases>) -> Self {
        Self {
            generic: GenericCommands::new(databases),
        }
    }

    /// The registry requests are executed against.
    pub fn databases(&self) -> &Arc<Databases> {
        self.generic.databases()
    }

    /// Executes one request and returns the wire reply.
    ///
    /// `request[0]` is the command name (case-insensitive). Errors are
    /// turned into RESP error replies; they never end the connection.
    pub fn execute(&self, session: &mut Session, request: &[Bytes]) -> RespValue {
        let result = match request.split_first() {
            Some((name, args)) => {
                let name = String::from_utf8_lossy(name).to_ascii_uppercase();
                trace!(command = %name, args = args.len(), db = session.db, "Executing command");
                self.dispatch(session, &name, args)
            }
            None => Err(CommandError::EmptyCommand),
        };

        match result {
            Ok(reply) => reply.into(),
            Err(e) => {
                trace!(error = %e, "Command failed");
                RespValue::error(e.to_string())
            }
        }
    }

    fn dispatch(&self, session: &mut Session, name: &str, args: &[Bytes]) -> CommandResult<Reply> {
        let generic = &self.generic;

        match name {
            // Key commands
            "DEL" => {
                Arity::AtLeast(1).check("del", args)?;
                generic.del(session, args)
            }
            "EXISTS" => {
                Arity::AtLeast(1).check("exists", args)?;
                generic.exists(session, args)
            }
            "EXPIRE" => self.expire(session, "expire", args, TimeUnit::Seconds, TimeBase::Now),
            "PEXPIRE" => {
                self.expire(session, "pexpire", args, TimeUnit::Milliseconds, TimeBase::Now)
            }
            "EXPIREAT" => {
                self.expire(session, "expireat", args, TimeUnit::Seconds, TimeBase::Epoch)
            }
            "PEXPIREAT" => {
                self.expire(session, "pexpireat", args, TimeUnit::Milliseconds, TimeBase::Epoch)
            }
            "TTL" => {
                Arity::Exact(1).check("ttl", args)?;
                generic.ttl(session, &args[0])
            }
            "PTTL" => {
                Arity::Exact(1).check("pttl", args)?;
                generic.pttl(session, &args[0])
            }
            "PERSIST" => {
                Arity::Exact(1).check("persist", args)?;
                generic.persist(session, &args[0])
            }
            "TYPE" => {
                Arity::Exact(1).check("type", args)?;
                generic.key_type(session, &args[0])
            }
            "KEYS" => {
                Arity::Exact(1).check("keys", args)?;
                generic.keys(session, &args[0])
            }
            "RENAME" => {
                Arity::Exact(2).check("rename", args)?;
                generic.rename(session, &args[0], &args[1], RenameOption { nx: false })
            }
            "RENAMENX" => {
                Arity::Exact(2).check("renamenx", args)?;
                generic.rename(session, &args[0], &args[1], RenameOption { nx: true })
            }

            // String commands
            "SET" => self.set(session, args),
            "GET" => {
                Arity::Exact(1).check("get", args)?;
                let value = self.keyspace(session)?.get_string(&args[0])?;
                Ok(Reply::bulk_or_null(value))
            }

            // Connection and server commands
            "SELECT" => self.select(session, args),
            "PING" => match args {
                [] => Ok(Reply::Status("PONG")),
                [message] => Ok(Reply::Bulk(message.clone())),
                _ => Err(CommandError::WrongArity("ping")),
            },
            "ECHO" => {
                Arity::Exact(1).check("echo", args)?;
                Ok(Reply::Bulk(args[0].clone()))
            }
            "DBSIZE" => {
                Arity::Exact(0).check("dbsize", args)?;
                Ok(Reply::count(self.keyspace(session)?.len()))
            }
            "FLUSHDB" => {
                Arity::Between(0, 1).check("flushdb", args)?;
                if let Some(mode) = args.first() {
                    if !mode.eq_ignore_ascii_case(b"ASYNC") && !mode.eq_ignore_ascii_case(b"SYNC") {
                        return Err(CommandError::Syntax);
                    }
                }
                self.keyspace(session)?.clear();
                debug!(db = session.db, "Database flushed");
                Ok(Reply::ok())
            }
            "QUIT" => Ok(Reply::ok()),

            _ => Err(CommandError::UnknownCommand(name.to_ascii_lowercase())),
        }
    }

    fn keyspace(&self, session: &Session) -> CommandResult<&Keyspace> {
        Ok(self.databases().get(session.db)?)
    }

    /// EXPIRE / PEXPIRE / EXPIREAT / PEXPIREAT key time [NX|XX|GT|LT ...]
    fn expire(
        &self,
        session: &Session,
        name: &'static str,
        args: &[Bytes],
        unit: TimeUnit,
        base: TimeBase,
    ) -> CommandResult<Reply> {
        Arity::AtLeast(2).check(name, args)?;

        let amount = parse_int(&args[1])?;
        let millis = match unit {
            TimeUnit::Seconds => amount.checked_mul(1000),
            TimeUnit::Milliseconds => Some(amount),
        };
        let origin = match base {
            TimeBase::Now => self.databases().clock().now(),
            TimeBase::Epoch => UNIX_EPOCH,
        };
        let deadline = millis
            .and_then(|millis| offset_millis(origin, millis))
            .ok_or(CommandError::InvalidExpireTime(name))?;

        let mut option = ExpireOption::at(deadline);
        for flag in &args[2..] {
            match flag.to_ascii_uppercase().as_slice() {
                b"NX" => option.nx = true,
                b"XX" => option.xx = true,
                b"GT" => option.gt = true,
                b"LT" => option.lt = true,
                _ => return Err(CommandError::Syntax),
            }
        }
        if option.nx && (option.xx || option.gt || option.lt) {
            return Err(CommandError::IncompatibleExpireFlags);
        }
        if option.gt && option.lt {
            return Err(CommandError::IncompatibleGtLt);
        }

        self.generic.expire(session, &args[0], &option)
    }

    /// SET key value [NX|XX] [GET] [EX s|PX ms|EXAT ts|PXAT ts|KEEPTTL]
    fn set(&self, session: &Session, args: &[Bytes]) -> CommandResult<Reply> {
        Arity::AtLeast(2).check("set", args)?;

        let mut option = SetOption::default();
        let mut expiry_given = false;
        let mut rest = args[2..].iter();

        while let Some(flag) = rest.next() {
            let flag = flag.to_ascii_uppercase();
            match flag.as_slice() {
                b"NX" if !option.xx => option.nx = true,
                b"XX" if !option.nx => option.xx = true,
                b"GET" => option.get = true,
                b"KEEPTTL" if !expiry_given => {
                    option.keep_ttl = true;
                    expiry_given = true;
                }
                b"EX" | b"PX" | b"EXAT" | b"PXAT" if !expiry_given => {
                    let amount = parse_int(rest.next().ok_or(CommandError::Syntax)?)?;
                    option.expiry = set_expiry(&flag, amount)?;
                    expiry_given = true;
                }
                _ => return Err(CommandError::Syntax),
            }
        }

        let outcome = self
            .keyspace(session)?
            .set(args[0].clone(), args[1].clone(), &option)?;

        Ok(if option.get {
            Reply::bulk_or_null(outcome.previous)
        } else if outcome.written {
            Reply::ok()
        } else {
            Reply::Null
        })
    }

    /// SELECT index
    fn select(&self, session: &mut Session, args: &[Bytes]) -> CommandResult<Reply> {
        Arity::Exact(1).check("select", args)?;

        let index = parse_int(&args[0])?;
        let index = usize::try_from(index)
            .map_err(|_| KeyspaceError::UnknownDatabase(usize::MAX))?;
        self.databases().get(index)?;

        session.db = index;
        debug!(db = index, "Database selected");
        Ok(Reply::ok())
    }
}

/// Builds the SET expiry for one of EX / PX / EXAT / PXAT.
fn set_expiry(flag: &[u8], amount: i64) -> CommandResult<SetExpiry> {
    const INVALID: CommandError = CommandError::InvalidExpireTime("set");

    if amount <= 0 {
        return Err(INVALID);
    }
    let millis = match flag {
        b"EX" | b"EXAT" => amount.checked_mul(1000).ok_or(INVALID)?,
        _ => amount,
    };
    let duration = Duration::from_millis(millis.unsigned_abs());

    match flag {
        b"EX" | b"PX" => Ok(SetExpiry::After(duration)),
        _ => UNIX_EPOCH
            .checked_add(duration)
            .map(SetExpiry::At)
            .ok_or(INVALID),
    }
}

/// `origin` shifted by a signed number of milliseconds.
fn offset_millis(origin: SystemTime, millis: i64) -> Option<SystemTime> {
    let delta = Duration::from_millis(millis.unsigned_abs());
    if millis >= 0 {
        origin.checked_add(delta)
    } else {
        origin.checked_sub(delta)
    }
}

/// Parses a base-10 signed integer argument.
fn parse_int(arg: &[u8]) -> CommandResult<i64> {
    std::str::from_utf8(arg)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or(CommandError::NotInteger)
}
