//! The outcome of one delegated command, as seen by metrics recorders.

use std::error::Error as StdError;
use std::fmt;

use serde::{Deserialize, Serialize};

/// How a call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    /// The delegate returned a value.
    Ok,
    /// The delegate returned an error.
    Error,
    /// The call never produced an outcome: the delegate panicked or the
    /// caller dropped the future before it completed.
    Abandoned,
}

impl CallStatus {
    /// Returns the label used for this status in metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            CallStatus::Ok => "ok",
            CallStatus::Error => "error",
            CallStatus::Abandoned => "abandoned",
        }
    }
}

impl fmt::Display for CallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A borrowed view of a command outcome.
///
/// The outcome itself stays owned by the caller and is returned to it
/// untouched; recorders only get to look at it.
///
/// ## Example
///
/// ```rust
/// use cachetrace::{CallOutcome, CallStatus};
///
/// let result: Result<i64, std::io::Error> = Ok(1);
/// let outcome = CallOutcome::from_result(&result);
/// assert_eq!(outcome.status(), CallStatus::Ok);
/// assert!(outcome.error().is_none());
/// ```
#[derive(Clone, Copy)]
pub struct CallOutcome<'a> {
    status: CallStatus,
    error: Option<&'a (dyn StdError + Send + Sync + 'static)>,
}

impl<'a> CallOutcome<'a> {
    /// A successful outcome.
    pub fn ok() -> Self {
        Self { status: CallStatus::Ok, error: None }
    }

    /// A failed outcome carrying the delegate's error.
    pub fn failed(error: &'a (dyn StdError + Send + Sync + 'static)) -> Self {
        Self { status: CallStatus::Error, error: Some(error) }
    }

    /// An outcome for a call that never completed.
    pub fn abandoned() -> Self {
        Self { status: CallStatus::Abandoned, error: None }
    }

    /// Borrows the outcome of a delegate call.
    pub fn from_result<T, E>(result: &'a Result<T, E>) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        match result {
            Ok(_) => Self::ok(),
            Err(err) => Self::failed(err),
        }
    }

    /// Returns how the call ended.
    pub fn status(&self) -> CallStatus {
        self.status
    }

    /// Returns the delegate's error, if the call failed.
    pub fn error(&self) -> Option<&'a (dyn StdError + Send + Sync + 'static)> {
        self.error
    }

    /// Returns `true` if the call succeeded.
    pub fn is_ok(&self) -> bool {
        self.status == CallStatus::Ok
    }
}

impl fmt::Debug for CallOutcome<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallOutcome")
            .field("status", &self.status)
            .field("error", &self.error.map(ToString::to_string))
            .finish()
    }
}
