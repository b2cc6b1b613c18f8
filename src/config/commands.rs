//! Per-command trace toggles.

use serde::{Deserialize, Serialize};

use crate::types::Command;

/// Which commands open trace spans.
///
/// Every flag defaults to `false`. Use [`CommandToggles::ALL`] to trace
/// everything, or start from [`CommandToggles::NONE`] and pick commands:
///
/// ```rust
/// use cachetrace::{Command, CommandToggles};
///
/// let toggles = CommandToggles { get: true, set: true, ..CommandToggles::NONE };
/// assert!(toggles.is_enabled(Command::Get));
/// assert!(!toggles.is_enabled(Command::Del));
///
/// let toggles = CommandToggles::ALL.with(Command::Ping, false);
/// assert!(!toggles.is_enabled(Command::Ping));
/// ```
///
/// Toggles deserialize from any serde format; missing flags are `false`:
///
/// ```rust
/// use cachetrace::CommandToggles;
///
/// let toggles: CommandToggles = serde_json::from_str(r#"{"get": true, "hset": true}"#).unwrap();
/// assert!(toggles.get && toggles.hset && !toggles.set);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandToggles {
    /// Trace `GET`.
    pub get: bool,
    /// Trace `SET`.
    pub set: bool,
    /// Trace `INCR`.
    pub incr: bool,
    /// Trace `PING`.
    pub ping: bool,
    /// Trace `DEL`.
    pub del: bool,
    /// Trace `SETNX`.
    pub set_nx: bool,
    /// Trace connection close.
    pub close: bool,
    /// Trace `EVAL`.
    pub eval: bool,
    /// Trace `LPOP`.
    pub lpop: bool,
    /// Trace `RPOP`.
    pub rpop: bool,
    /// Trace `LPUSH`.
    pub lpush: bool,
    /// Trace `RPUSH`.
    pub rpush: bool,
    /// Trace `HSET`.
    pub hset: bool,
    /// Trace `HGET`.
    pub hget: bool,
    /// Trace `HLEN`.
    pub hlen: bool,
    /// Trace `EXPIRE`.
    pub expire: bool,
    /// Trace `EXPIREAT`.
    pub expire_at: bool,
}

impl CommandToggles {
    /// No command is traced.
    pub const NONE: Self = Self::uniform(false);

    /// Every command is traced.
    pub const ALL: Self = Self::uniform(true);

    const fn uniform(on: bool) -> Self {
        Self {
            get: on,
            set: on,
            incr: on,
            ping: on,
            del: on,
            set_nx: on,
            close: on,
            eval: on,
            lpop: on,
            rpop: on,
            lpush: on,
            rpush: on,
            hset: on,
            hget: on,
            hlen: on,
            expire: on,
            expire_at: on,
        }
    }

    /// Returns whether `command` is traced.
    pub fn is_enabled(&self, command: Command) -> bool {
        match command {
            Command::Get => self.get,
            Command::Set => self.set,
            Command::Incr => self.incr,
            Command::Ping => self.ping,
            Command::Del => self.del,
            Command::SetNx => self.set_nx,
            Command::Close => self.close,
            Command::Eval => self.eval,
            Command::LPop => self.lpop,
            Command::RPop => self.rpop,
            Command::LPush => self.lpush,
            Command::RPush => self.rpush,
            Command::HSet => self.hset,
            Command::HGet => self.hget,
            Command::HLen => self.hlen,
            Command::Expire => self.expire,
            Command::ExpireAt => self.expire_at,
        }
    }

    /// Returns a copy with `command` switched on or off.
    #[must_use]
    pub fn with(mut self, command: Command, enabled: bool) -> Self {
        *self.flag_mut(command) = enabled;
        self
    }

    /// Iterates over the traced commands.
    pub fn enabled(&self) -> impl Iterator<Item = Command> + '_ {
        Command::ALL.into_iter().filter(|c| self.is_enabled(*c))
    }

    fn flag_mut(&mut self, command: Command) -> &mut bool {
        match command {
            Command::Get => &mut self.get,
            Command::Set => &mut self.set,
            Command::Incr => &mut self.incr,
            Command::Ping => &mut self.ping,
            Command::Del => &mut self.del,
            Command::SetNx => &mut self.set_nx,
            Command::Close => &mut self.close,
            Command::Eval => &mut self.eval,
            Command::LPop => &mut self.lpop,
            Command::RPop => &mut self.rpop,
            Command::LPush => &mut self.lpush,
            Command::RPush => &mut self.rpush,
            Command::HSet => &mut self.hset,
            Command::HGet => &mut self.hget,
            Command::HLen => &mut self.hlen,
            Command::Expire => &mut self.expire,
            Command::ExpireAt => &mut self.expire_at,
        }
    }
}

impl FromIterator<Command> for CommandToggles {
    fn from_iter<I: IntoIterator<Item = Command>>(iter: I) -> Self {
        iter.into_iter().fold(Self::NONE, |toggles, c| toggles.with(c, true))
    }
}
