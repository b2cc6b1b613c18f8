//! Reply values returned by scripted commands.

use bytes::Bytes;

/// A generic store reply, as returned by `EVAL`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Value {
    /// The nil reply.
    #[default]
    Nil,
    /// An integer reply.
    Int(i64),
    /// A bulk string reply.
    Data(Bytes),
    /// A simple status reply such as `OK`.
    Status(String),
    /// A multi-bulk reply.
    Array(Vec<Value>),
}

impl Value {
    /// Returns `true` for the nil reply.
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Returns the integer, if this is an integer reply.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the payload, if this is a bulk string reply.
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Value::Data(b) => Some(b),
            _ => None,
        }
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<Bytes> for Value {
    fn from(b: Bytes) -> Self {
        Value::Data(b)
    }
}

impl From<&'static str> for Value {
    fn from(s: &'static str) -> Self {
        Value::Data(Bytes::from_static(s.as_bytes()))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map(Into::into).unwrap_or(Value::Nil)
    }
}
