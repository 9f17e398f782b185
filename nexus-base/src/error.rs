// We want a few things here:
// 1. A way to create a new error with a backtrace
// 2. A way to centralize setting a breakpoint to trap any error in the system fairly soon
//    after it's created (or at least when it's propagated from a library we use back to us)
// 3. Same but for logging / emitting error messages into the tracing/logging system

use std::borrow::Cow;
use std::fmt;

use backtrace_error::DynBacktraceError;
use tracing::error;

#[cfg(test)]
use test_log::test;

#[derive(Debug)]
pub struct Error(DynBacktraceError);
pub type Result<T> = std::result::Result<T, Error>;

struct SimpleErr(Cow<'static, str>);
impl fmt::Debug for SimpleErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl fmt::Display for SimpleErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl std::error::Error for SimpleErr {}

impl<E: std::error::Error + Send + Sync + 'static> From<E> for Error {
    fn from(err: E) -> Error {
        Error::new(err)
    }
}

impl Error {
    pub fn new<E: std::error::Error + Send + Sync + 'static>(err: E) -> Error {
        error!(target: "nexus", "{:?}", err);
        let dbe = DynBacktraceError::from(err);
        Error(dbe)
    }
}

pub fn err(msg: impl Into<Cow<'static, str>>) -> Error {
    let err = SimpleErr(msg.into());
    Error::new(err)
}

/// The error taxonomy a failed `submit` surfaces through its return value.
///
/// `ReentrantSubmissionError` from the spec's taxonomy is deliberately absent
/// here: it is not a recoverable outcome of `submit`, it is a programming
/// error raised as a panic by the manager's re-entrancy guard (see
/// `nexus-core`'s `pipeline` module), matching §7's "propagates through
/// whatever ambient fault channel the host language provides" and "never
/// swallowed".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubmitErrorKind {
    /// A requested value could not be normalized to immutable form (§4.1, Step 1).
    Normalization,
    /// Two pending entries disagree on the same nexus (Step 2 or Step 4).
    Conflict,
    /// Completion (Step 4) did not reach a fixed point within `MAX_ITERATIONS`.
    CompletionCycle,
    /// An owner or floating hook rejected the complete view (Step 5).
    Validation,
    /// A join's underlying submission failed, so the join itself failed.
    JoinRejected,
}

impl fmt::Display for SubmitErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SubmitErrorKind::Normalization => "normalization",
            SubmitErrorKind::Conflict => "conflict",
            SubmitErrorKind::CompletionCycle => "completion-cycle",
            SubmitErrorKind::Validation => "validation",
            SubmitErrorKind::JoinRejected => "join-rejected",
        };
        f.write_str(s)
    }
}

/// A failed `submit`/`join`: the pipeline step it failed at, plus a message.
///
/// Unlike [`Error`], this is a plain value type (no backtrace capture) since
/// every `SubmitError` is an expected, returned-not-thrown outcome of
/// ordinary validation logic, not a defect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitError {
    pub kind: SubmitErrorKind,
    pub message: String,
}

impl SubmitError {
    pub fn new(kind: SubmitErrorKind, message: impl Into<String>) -> Self {
        SubmitError {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for SubmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for SubmitError {}

#[test]
fn test_error() {
    let _err = err("test error");
}

#[test]
fn test_submit_error_display() {
    let e = SubmitError::new(SubmitErrorKind::Conflict, "x and y disagree");
    assert_eq!(format!("{e}"), "conflict: x and y disagree");
}
