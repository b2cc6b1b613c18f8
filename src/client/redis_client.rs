//! A [`Commands`] implementation over the `redis` crate.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use redis::aio::{ConnectionLike, ConnectionManager};
use redis::{Cmd, ErrorKind, FromRedisValue, RedisError, Value as RedisValue};

use crate::client::{CommandFuture, Commands};
use crate::tracing_support::CallContext;
use crate::types::Value;

/// A Redis client speaking the [`Commands`] surface.
///
/// Wraps any async `redis` connection, by default a [`ConnectionManager`]
/// that reconnects on its own. Errors are the `redis` crate's own
/// [`RedisError`], so an [`Instrumented`](crate::Instrumented) wrapper
/// hands them back exactly as the server or driver produced them.
///
/// Clones share the connection and the closed state.
///
/// ## Example
///
/// ```rust,ignore
/// use cachetrace::prelude::*;
/// use cachetrace::RedisClient;
///
/// let redis = RedisClient::connect("redis://127.0.0.1:6379").await?;
/// let client = Instrumented::new(redis, TraceOptions::all());
///
/// client.set(&ctx, "session:42", payload, Some(Duration::from_secs(60))).await?;
/// ```
#[derive(Clone)]
pub struct RedisClient<C = ConnectionManager> {
    conn: C,
    closed: Arc<AtomicBool>,
}

impl RedisClient<ConnectionManager> {
    /// Opens a managed connection to the server at `url`.
    pub async fn connect(url: &str) -> Result<Self, RedisError> {
        let client = redis::Client::open(url)?;
        let addr = client.get_connection_info().addr.to_string();
        let conn = ConnectionManager::new(client).await?;

        tracing::info!(%addr, "connected to redis");
        Ok(Self::new(conn))
    }
}

impl<C> RedisClient<C>
where
    C: ConnectionLike + Clone + Send + Sync + 'static,
{
    /// Wraps an existing connection.
    pub fn new(conn: C) -> Self {
        Self { conn, closed: Arc::new(AtomicBool::new(false)) }
    }

    /// Returns `true` once [`Commands::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn run<'a, T, U>(
        &'a self,
        cmd: Cmd,
        map: impl FnOnce(T) -> U + Send + 'a,
    ) -> CommandFuture<'a, U, RedisError>
    where
        T: FromRedisValue + Send + 'a,
        U: Send + 'a,
    {
        let mut conn = self.conn.clone();
        Box::pin(async move {
            if self.is_closed() {
                return Err(closed_error());
            }
            let reply: T = cmd.query_async(&mut conn).await?;
            Ok(map(reply))
        })
    }
}

impl<C> fmt::Debug for RedisClient<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisClient")
            .field("closed", &self.closed.load(Ordering::Acquire))
            .finish_non_exhaustive()
    }
}

fn closed_error() -> RedisError {
    RedisError::from((ErrorKind::ClientError, "client is closed"))
}

// Whole seconds go out as `EX`/`EXPIRE`, anything finer in milliseconds.
fn use_precise(ttl: Duration) -> bool {
    ttl < Duration::from_secs(1) || ttl.subsec_nanos() != 0
}

fn millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

fn key_cmd(name: &str, key: &str) -> Cmd {
    let mut cmd = redis::cmd(name);
    cmd.arg(key);
    cmd
}

fn push_cmd(name: &str, key: &str, values: &[Bytes]) -> Cmd {
    let mut cmd = key_cmd(name, key);
    for value in values {
        cmd.arg(&value[..]);
    }
    cmd
}

fn into_value(value: RedisValue) -> Value {
    match value {
        RedisValue::Nil => Value::Nil,
        RedisValue::Int(i) => Value::Int(i),
        RedisValue::BulkString(data) => Value::Data(Bytes::from(data)),
        RedisValue::SimpleString(status) => Value::Status(status),
        RedisValue::Okay => Value::Status("OK".to_string()),
        RedisValue::Array(items) | RedisValue::Set(items) => {
            Value::Array(items.into_iter().map(into_value).collect())
        },
        RedisValue::Map(pairs) => Value::Array(
            pairs.into_iter().flat_map(|(k, v)| [into_value(k), into_value(v)]).collect(),
        ),
        RedisValue::Boolean(b) => Value::Int(i64::from(b)),
        RedisValue::VerbatimString { text, .. } => Value::Data(Bytes::from(text)),
        other => Value::Status(format!("{other:?}")),
    }
}

impl<C> Commands for RedisClient<C>
where
    C: ConnectionLike + Clone + Send + Sync + 'static,
{
    type Error = RedisError;

    fn get<'a>(
        &'a self,
        _ctx: &'a CallContext,
        key: &'a str,
    ) -> CommandFuture<'a, Option<Bytes>, RedisError> {
        self.run(key_cmd("GET", key), |v: Option<Vec<u8>>| v.map(Bytes::from))
    }

    fn set<'a>(
        &'a self,
        _ctx: &'a CallContext,
        key: &'a str,
        value: Bytes,
        ttl: Option<Duration>,
    ) -> CommandFuture<'a, (), RedisError> {
        let mut cmd = key_cmd("SET", key);
        cmd.arg(&value[..]);
        match ttl.filter(|ttl| !ttl.is_zero()) {
            Some(ttl) if use_precise(ttl) => {
                cmd.arg("PX").arg(millis(ttl));
            },
            Some(ttl) => {
                cmd.arg("EX").arg(ttl.as_secs());
            },
            None => {},
        }
        self.run(cmd, |_: ()| ())
    }

    fn incr<'a>(&'a self, _ctx: &'a CallContext, key: &'a str) -> CommandFuture<'a, i64, RedisError> {
        self.run(key_cmd("INCR", key), |n: i64| n)
    }

    fn ping<'a>(&'a self, _ctx: &'a CallContext) -> CommandFuture<'a, String, RedisError> {
        self.run(redis::cmd("PING"), |reply: String| reply)
    }

    fn del<'a>(
        &'a self,
        _ctx: &'a CallContext,
        keys: &'a [&'a str],
    ) -> CommandFuture<'a, i64, RedisError> {
        let mut cmd = redis::cmd("DEL");
        for key in keys {
            cmd.arg(*key);
        }
        self.run(cmd, |n: i64| n)
    }

    fn set_nx<'a>(
        &'a self,
        _ctx: &'a CallContext,
        key: &'a str,
        value: Bytes,
    ) -> CommandFuture<'a, bool, RedisError> {
        let mut cmd = key_cmd("SETNX", key);
        cmd.arg(&value[..]);
        self.run(cmd, |set: bool| set)
    }

    /// Marks the client closed. Later calls, including a second close, fail
    /// with a client error. The connection itself is released when the last
    /// clone is dropped.
    fn close<'a>(&'a self, _ctx: &'a CallContext) -> CommandFuture<'a, (), RedisError> {
        Box::pin(async move {
            if self.closed.swap(true, Ordering::AcqRel) {
                return Err(closed_error());
            }
            tracing::debug!("redis client closed");
            Ok(())
        })
    }

    fn eval<'a>(
        &'a self,
        _ctx: &'a CallContext,
        script: &'a str,
        keys: &'a [&'a str],
        args: &'a [Bytes],
    ) -> CommandFuture<'a, Value, RedisError> {
        let mut cmd = redis::cmd("EVAL");
        cmd.arg(script).arg(keys.len());
        for key in keys {
            cmd.arg(*key);
        }
        for arg in args {
            cmd.arg(&arg[..]);
        }
        self.run(cmd, into_value)
    }

    fn lpop<'a>(
        &'a self,
        _ctx: &'a CallContext,
        key: &'a str,
    ) -> CommandFuture<'a, Option<Bytes>, RedisError> {
        self.run(key_cmd("LPOP", key), |v: Option<Vec<u8>>| v.map(Bytes::from))
    }

    fn rpop<'a>(
        &'a self,
        _ctx: &'a CallContext,
        key: &'a str,
    ) -> CommandFuture<'a, Option<Bytes>, RedisError> {
        self.run(key_cmd("RPOP", key), |v: Option<Vec<u8>>| v.map(Bytes::from))
    }

    fn lpush<'a>(
        &'a self,
        _ctx: &'a CallContext,
        key: &'a str,
        values: Vec<Bytes>,
    ) -> CommandFuture<'a, i64, RedisError> {
        self.run(push_cmd("LPUSH", key, &values), |n: i64| n)
    }

    fn rpush<'a>(
        &'a self,
        _ctx: &'a CallContext,
        key: &'a str,
        values: Vec<Bytes>,
    ) -> CommandFuture<'a, i64, RedisError> {
        self.run(push_cmd("RPUSH", key, &values), |n: i64| n)
    }

    fn hset<'a>(
        &'a self,
        _ctx: &'a CallContext,
        key: &'a str,
        field: &'a str,
        value: Bytes,
    ) -> CommandFuture<'a, bool, RedisError> {
        let mut cmd = key_cmd("HSET", key);
        cmd.arg(field).arg(&value[..]);
        self.run(cmd, |added: i64| added > 0)
    }

    fn hget<'a>(
        &'a self,
        _ctx: &'a CallContext,
        key: &'a str,
        field: &'a str,
    ) -> CommandFuture<'a, Option<Bytes>, RedisError> {
        let mut cmd = key_cmd("HGET", key);
        cmd.arg(field);
        self.run(cmd, |v: Option<Vec<u8>>| v.map(Bytes::from))
    }

    fn hlen<'a>(&'a self, _ctx: &'a CallContext, key: &'a str) -> CommandFuture<'a, i64, RedisError> {
        self.run(key_cmd("HLEN", key), |n: i64| n)
    }

    fn expire<'a>(
        &'a self,
        _ctx: &'a CallContext,
        key: &'a str,
        ttl: Duration,
    ) -> CommandFuture<'a, bool, RedisError> {
        let cmd = if use_precise(ttl) {
            let mut cmd = key_cmd("PEXPIRE", key);
            cmd.arg(millis(ttl));
            cmd
        } else {
            let mut cmd = key_cmd("EXPIRE", key);
            cmd.arg(ttl.as_secs());
            cmd
        };
        self.run(cmd, |set: bool| set)
    }

    fn expire_at<'a>(
        &'a self,
        _ctx: &'a CallContext,
        key: &'a str,
        at: DateTime<Utc>,
    ) -> CommandFuture<'a, bool, RedisError> {
        let mut cmd = key_cmd("EXPIREAT", key);
        cmd.arg(at.timestamp());
        self.run(cmd, |set: bool| set)
    }
}
