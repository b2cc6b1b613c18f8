//! An in-memory key-value store with Redis semantics.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::{Mutex, RwLock};

use crate::client::{CommandFuture, Commands};
use crate::testing::StoreError;
use crate::tracing_support::CallContext;
use crate::types::{Command, Value};

/// A script handler registered with [`InMemoryStore::register_script`].
///
/// Receives the `KEYS` and `ARGV` of the `EVAL` call.
pub type ScriptHandler = dyn Fn(&[&str], &[Bytes]) -> Result<Value, StoreError> + Send + Sync;

/// An in-memory [`Commands`] implementation.
///
/// Strings, counters, lists and hashes behave like their Redis
/// counterparts, including `WRONGTYPE` errors and lazily evicted
/// expirations. After [`close`](Commands::close), every call fails with
/// [`StoreError::Closed`].
///
/// Clones share the same data, so a test can keep one handle for
/// inspection and fault injection while another is wrapped by the client
/// under test.
///
/// ## Fault Injection
///
/// - [`fail_next`](Self::fail_next): the next call of a command fails
/// - [`fail_always`](Self::fail_always): every call of a command fails
/// - [`hang_next`](Self::hang_next): the next call of a command never
///   completes
/// - [`panic_next`](Self::panic_next): the next call of a command panics
///
/// ## Example
///
/// ```rust
/// use cachetrace::{CallContext, Command, Commands};
/// use cachetrace::testing::{InMemoryStore, StoreError};
///
/// # tokio_test::block_on(async {
/// let store = InMemoryStore::new();
/// let ctx = CallContext::background();
///
/// store.rpush(&ctx, "queue", vec!["a".into(), "b".into()]).await.unwrap();
/// assert_eq!(store.lpop(&ctx, "queue").await.unwrap().as_deref(), Some(&b"a"[..]));
///
/// store.fail_next(Command::HGet, StoreError::injected("LOADING"));
/// assert!(store.hget(&ctx, "h", "f").await.is_err());
/// assert_eq!(store.calls(), vec![Command::RPush, Command::LPop, Command::HGet]);
/// # });
/// ```
#[derive(Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<StoreInner>,
}

#[derive(Default)]
struct StoreInner {
    data: Mutex<HashMap<String, Entry>>,
    scripts: RwLock<HashMap<String, Arc<ScriptHandler>>>,
    faults: Mutex<Faults>,
    calls: Mutex<Vec<Command>>,
    closed: AtomicBool,
}

#[derive(Default)]
struct Faults {
    next: HashMap<Command, VecDeque<Fault>>,
    always: HashMap<Command, StoreError>,
}

enum Fault {
    Fail(StoreError),
    Hang,
    Panic(String),
}

#[derive(Debug)]
struct Entry {
    value: Stored,
    expires_at: Option<DateTime<Utc>>,
}

impl Entry {
    fn new(value: Stored) -> Self {
        Self { value, expires_at: None }
    }

    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

#[derive(Debug)]
enum Stored {
    Str(Bytes),
    List(VecDeque<Bytes>),
    Hash(HashMap<String, Bytes>),
}

fn evict_expired(data: &mut HashMap<String, Entry>, key: &str) {
    let now = Utc::now();
    if data.get(key).is_some_and(|e| e.is_expired(now)) {
        data.remove(key);
    }
}

/// Returns the entry at `key`, evicting it first if it has expired.
fn live<'m>(data: &'m mut HashMap<String, Entry>, key: &str) -> Option<&'m mut Entry> {
    evict_expired(data, key);
    data.get_mut(key)
}

fn deadline(ttl: Duration) -> Option<DateTime<Utc>> {
    TimeDelta::from_std(ttl).ok().and_then(|delta| Utc::now().checked_add_signed(delta))
}

fn len_i64(len: usize) -> i64 {
    i64::try_from(len).unwrap_or(i64::MAX)
}

impl InMemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler run by `EVAL` for `script`.
    pub fn register_script<F>(&self, script: impl Into<String>, handler: F)
    where
        F: Fn(&[&str], &[Bytes]) -> Result<Value, StoreError> + Send + Sync + 'static,
    {
        self.inner.scripts.write().insert(script.into(), Arc::new(handler));
    }

    /// Makes the next call of `command` fail with `error`.
    ///
    /// Queued faults are consumed in order, one per call.
    pub fn fail_next(&self, command: Command, error: StoreError) {
        self.push_fault(command, Fault::Fail(error));
    }

    /// Makes every call of `command` fail with `error`.
    pub fn fail_always(&self, command: Command, error: StoreError) {
        self.inner.faults.lock().always.insert(command, error);
    }

    /// Makes the next call of `command` never complete.
    pub fn hang_next(&self, command: Command) {
        self.push_fault(command, Fault::Hang);
    }

    /// Makes the next call of `command` panic with `message`.
    pub fn panic_next(&self, command: Command, message: impl Into<String>) {
        self.push_fault(command, Fault::Panic(message.into()));
    }

    /// Removes every injected fault.
    pub fn clear_faults(&self) {
        let mut faults = self.inner.faults.lock();
        faults.next.clear();
        faults.always.clear();
    }

    /// Returns the commands received, in order.
    pub fn calls(&self) -> Vec<Command> {
        self.inner.calls.lock().clone()
    }

    /// Returns how many times `command` was received.
    pub fn call_count(&self, command: Command) -> usize {
        self.inner.calls.lock().iter().filter(|c| **c == command).count()
    }

    /// Returns `true` if `key` exists and has not expired.
    pub fn contains_key(&self, key: &str) -> bool {
        live(&mut self.inner.data.lock(), key).is_some()
    }

    /// Returns `true` once the store has been closed.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    fn push_fault(&self, command: Command, fault: Fault) {
        self.inner.faults.lock().next.entry(command).or_default().push_back(fault);
    }

    fn take_fault(&self, command: Command) -> Option<Fault> {
        let mut faults = self.inner.faults.lock();
        if let Some(fault) = faults.next.get_mut(&command).and_then(VecDeque::pop_front) {
            return Some(fault);
        }
        faults.always.get(&command).cloned().map(Fault::Fail)
    }

    /// Runs `op` as `command`, after logging the call and applying faults.
    fn run<'a, T, F>(&'a self, command: Command, op: F) -> CommandFuture<'a, T, StoreError>
    where
        T: Send + 'a,
        F: FnOnce(&StoreInner) -> Result<T, StoreError> + Send + 'a,
    {
        Box::pin(async move {
            self.inner.calls.lock().push(command);
            match self.take_fault(command) {
                Some(Fault::Fail(err)) => return Err(err),
                Some(Fault::Hang) => futures::future::pending::<()>().await,
                Some(Fault::Panic(message)) => std::panic::panic_any(message),
                None => {},
            }
            if command != Command::Close && self.is_closed() {
                return Err(StoreError::Closed);
            }
            op(&self.inner)
        })
    }

    fn pop(
        &self,
        command: Command,
        key: &str,
        front: bool,
    ) -> CommandFuture<'_, Option<Bytes>, StoreError> {
        let key = key.to_string();
        self.run(command, move |inner| {
            let mut data = inner.data.lock();
            let Some(entry) = live(&mut data, &key) else {
                return Ok(None);
            };
            let Stored::List(list) = &mut entry.value else {
                return Err(StoreError::WrongType);
            };
            let value = if front { list.pop_front() } else { list.pop_back() };
            if list.is_empty() {
                data.remove(&key);
            }
            Ok(value)
        })
    }

    fn push(
        &self,
        command: Command,
        key: &str,
        values: Vec<Bytes>,
        front: bool,
    ) -> CommandFuture<'_, i64, StoreError> {
        let key = key.to_string();
        self.run(command, move |inner| {
            let mut data = inner.data.lock();
            evict_expired(&mut data, &key);
            let entry =
                data.entry(key).or_insert_with(|| Entry::new(Stored::List(VecDeque::new())));
            let Stored::List(list) = &mut entry.value else {
                return Err(StoreError::WrongType);
            };
            for value in values {
                if front {
                    list.push_front(value);
                } else {
                    list.push_back(value);
                }
            }
            Ok(len_i64(list.len()))
        })
    }

    fn expire_with(
        &self,
        command: Command,
        key: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> CommandFuture<'_, bool, StoreError> {
        let key = key.to_string();
        self.run(command, move |inner| {
            let mut data = inner.data.lock();
            let Some(entry) = live(&mut data, &key) else {
                return Ok(false);
            };
            entry.expires_at = expires_at;
            Ok(true)
        })
    }
}

impl fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryStore")
            .field("keys", &self.inner.data.lock().len())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl Commands for InMemoryStore {
    type Error = StoreError;

    fn get<'a>(
        &'a self,
        _ctx: &'a CallContext,
        key: &'a str,
    ) -> CommandFuture<'a, Option<Bytes>, StoreError> {
        self.run(Command::Get, move |inner| match live(&mut inner.data.lock(), key) {
            None => Ok(None),
            Some(Entry { value: Stored::Str(value), .. }) => Ok(Some(value.clone())),
            Some(_) => Err(StoreError::WrongType),
        })
    }

    fn set<'a>(
        &'a self,
        _ctx: &'a CallContext,
        key: &'a str,
        value: Bytes,
        ttl: Option<Duration>,
    ) -> CommandFuture<'a, (), StoreError> {
        self.run(Command::Set, move |inner| {
            let entry = Entry { value: Stored::Str(value), expires_at: ttl.and_then(deadline) };
            inner.data.lock().insert(key.to_string(), entry);
            Ok(())
        })
    }

    fn incr<'a>(&'a self, _ctx: &'a CallContext, key: &'a str) -> CommandFuture<'a, i64, StoreError> {
        self.run(Command::Incr, move |inner| {
            let mut data = inner.data.lock();
            let Some(entry) = live(&mut data, key) else {
                data.insert(key.to_string(), Entry::new(Stored::Str(Bytes::from_static(b"1"))));
                return Ok(1);
            };
            let Stored::Str(current) = &entry.value else {
                return Err(StoreError::WrongType);
            };
            let next = std::str::from_utf8(current)
                .ok()
                .and_then(|s| s.parse::<i64>().ok())
                .and_then(|n| n.checked_add(1))
                .ok_or(StoreError::NotInteger)?;
            entry.value = Stored::Str(Bytes::from(next.to_string()));
            Ok(next)
        })
    }

    fn ping<'a>(&'a self, _ctx: &'a CallContext) -> CommandFuture<'a, String, StoreError> {
        self.run(Command::Ping, |_| Ok("PONG".to_string()))
    }

    fn del<'a>(
        &'a self,
        _ctx: &'a CallContext,
        keys: &'a [&'a str],
    ) -> CommandFuture<'a, i64, StoreError> {
        self.run(Command::Del, move |inner| {
            let mut data = inner.data.lock();
            let removed = keys
                .iter()
                .filter(|key| live(&mut data, key).is_some() && data.remove(**key).is_some())
                .count();
            Ok(len_i64(removed))
        })
    }

    fn set_nx<'a>(
        &'a self,
        _ctx: &'a CallContext,
        key: &'a str,
        value: Bytes,
    ) -> CommandFuture<'a, bool, StoreError> {
        self.run(Command::SetNx, move |inner| {
            let mut data = inner.data.lock();
            if live(&mut data, key).is_some() {
                return Ok(false);
            }
            data.insert(key.to_string(), Entry::new(Stored::Str(value)));
            Ok(true)
        })
    }

    fn close<'a>(&'a self, _ctx: &'a CallContext) -> CommandFuture<'a, (), StoreError> {
        self.run(Command::Close, |inner| {
            if inner.closed.swap(true, Ordering::AcqRel) {
                return Err(StoreError::Closed);
            }
            Ok(())
        })
    }

    fn eval<'a>(
        &'a self,
        _ctx: &'a CallContext,
        script: &'a str,
        keys: &'a [&'a str],
        args: &'a [Bytes],
    ) -> CommandFuture<'a, Value, StoreError> {
        self.run(Command::Eval, move |inner| {
            let handler = inner
                .scripts
                .read()
                .get(script)
                .cloned()
                .ok_or_else(|| StoreError::UnknownScript(script.to_string()))?;
            (*handler)(keys, args)
        })
    }

    fn lpop<'a>(
        &'a self,
        _ctx: &'a CallContext,
        key: &'a str,
    ) -> CommandFuture<'a, Option<Bytes>, StoreError> {
        self.pop(Command::LPop, key, true)
    }

    fn rpop<'a>(
        &'a self,
        _ctx: &'a CallContext,
        key: &'a str,
    ) -> CommandFuture<'a, Option<Bytes>, StoreError> {
        self.pop(Command::RPop, key, false)
    }

    fn lpush<'a>(
        &'a self,
        _ctx: &'a CallContext,
        key: &'a str,
        values: Vec<Bytes>,
    ) -> CommandFuture<'a, i64, StoreError> {
        self.push(Command::LPush, key, values, true)
    }

    fn rpush<'a>(
        &'a self,
        _ctx: &'a CallContext,
        key: &'a str,
        values: Vec<Bytes>,
    ) -> CommandFuture<'a, i64, StoreError> {
        self.push(Command::RPush, key, values, false)
    }

    fn hset<'a>(
        &'a self,
        _ctx: &'a CallContext,
        key: &'a str,
        field: &'a str,
        value: Bytes,
    ) -> CommandFuture<'a, bool, StoreError> {
        self.run(Command::HSet, move |inner| {
            let mut data = inner.data.lock();
            evict_expired(&mut data, key);
            let entry = data
                .entry(key.to_string())
                .or_insert_with(|| Entry::new(Stored::Hash(HashMap::new())));
            let Stored::Hash(hash) = &mut entry.value else {
                return Err(StoreError::WrongType);
            };
            Ok(hash.insert(field.to_string(), value).is_none())
        })
    }

    fn hget<'a>(
        &'a self,
        _ctx: &'a CallContext,
        key: &'a str,
        field: &'a str,
    ) -> CommandFuture<'a, Option<Bytes>, StoreError> {
        self.run(Command::HGet, move |inner| match live(&mut inner.data.lock(), key) {
            None => Ok(None),
            Some(Entry { value: Stored::Hash(hash), .. }) => Ok(hash.get(field).cloned()),
            Some(_) => Err(StoreError::WrongType),
        })
    }

    fn hlen<'a>(&'a self, _ctx: &'a CallContext, key: &'a str) -> CommandFuture<'a, i64, StoreError> {
        self.run(Command::HLen, move |inner| match live(&mut inner.data.lock(), key) {
            None => Ok(0),
            Some(Entry { value: Stored::Hash(hash), .. }) => Ok(len_i64(hash.len())),
            Some(_) => Err(StoreError::WrongType),
        })
    }

    fn expire<'a>(
        &'a self,
        _ctx: &'a CallContext,
        key: &'a str,
        ttl: Duration,
    ) -> CommandFuture<'a, bool, StoreError> {
        let expires_at = deadline(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.expire_with(Command::Expire, key, Some(expires_at))
    }

    fn expire_at<'a>(
        &'a self,
        _ctx: &'a CallContext,
        key: &'a str,
        at: DateTime<Utc>,
    ) -> CommandFuture<'a, bool, StoreError> {
        self.expire_with(Command::ExpireAt, key, Some(at))
    }
}
