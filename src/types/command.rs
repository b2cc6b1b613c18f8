//! The store commands that can be instrumented.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A store command supported by the instrumentation layer.
///
/// Every command has a span name (used when a trace span is opened for the
/// call) and a metric name (used when the call is recorded).
///
/// ## Example
///
/// ```rust
/// use cachetrace::Command;
///
/// assert_eq!(Command::SetNx.name(), "SetNX");
/// assert_eq!(Command::SetNx.metric_name(), "redis.setnx");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Command {
    /// `GET key`
    Get,
    /// `SET key value [EX seconds]`
    Set,
    /// `INCR key`
    Incr,
    /// `PING`
    Ping,
    /// `DEL key [key ...]`
    Del,
    /// `SETNX key value`
    SetNx,
    /// Closes the client connection.
    Close,
    /// `EVAL script numkeys key [key ...] arg [arg ...]`
    Eval,
    /// `LPOP key`
    LPop,
    /// `RPOP key`
    RPop,
    /// `LPUSH key value [value ...]`
    LPush,
    /// `RPUSH key value [value ...]`
    RPush,
    /// `HSET key field value`
    HSet,
    /// `HGET key field`
    HGet,
    /// `HLEN key`
    HLen,
    /// `EXPIRE key seconds`
    Expire,
    /// `EXPIREAT key timestamp`
    ExpireAt,
}

impl Command {
    /// Every supported command, in declaration order.
    pub const ALL: [Command; 17] = [
        Command::Get,
        Command::Set,
        Command::Incr,
        Command::Ping,
        Command::Del,
        Command::SetNx,
        Command::Close,
        Command::Eval,
        Command::LPop,
        Command::RPop,
        Command::LPush,
        Command::RPush,
        Command::HSet,
        Command::HGet,
        Command::HLen,
        Command::Expire,
        Command::ExpireAt,
    ];

    /// Returns the span name for this command.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Get => "Get",
            Command::Set => "Set",
            Command::Incr => "Incr",
            Command::Ping => "Ping",
            Command::Del => "Del",
            Command::SetNx => "SetNX",
            Command::Close => "Close",
            Command::Eval => "Eval",
            Command::LPop => "LPop",
            Command::RPop => "RPop",
            Command::LPush => "LPush",
            Command::RPush => "RPush",
            Command::HSet => "HSet",
            Command::HGet => "HGet",
            Command::HLen => "HLen",
            Command::Expire => "Expire",
            Command::ExpireAt => "ExpireAt",
        }
    }

    /// Returns the operation name reported to metrics recorders.
    pub fn metric_name(&self) -> &'static str {
        match self {
            Command::Get => "redis.get",
            Command::Set => "redis.set",
            Command::Incr => "redis.incr",
            Command::Ping => "redis.ping",
            Command::Del => "redis.del",
            Command::SetNx => "redis.setnx",
            Command::Close => "redis.close",
            Command::Eval => "redis.eval",
            Command::LPop => "redis.lpop",
            Command::RPop => "redis.rpop",
            Command::LPush => "redis.lpush",
            Command::RPush => "redis.rpush",
            Command::HSet => "redis.hset",
            Command::HGet => "redis.hget",
            Command::HLen => "redis.hlen",
            Command::Expire => "redis.expire",
            Command::ExpireAt => "redis.expireat",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
