mod error;
mod limits;

pub use error::{err, Error, Result, SubmitError, SubmitErrorKind};
pub use limits::{DEFAULT_TOLERANCE, MAX_ITERATIONS};
