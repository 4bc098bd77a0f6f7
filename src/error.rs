//! Error types.
//!
//! Three layers, kept apart on purpose:
//!
//! - [`HandlerError`]: a failure raised by application code (a handler, an
//!   access hook, a typed argument that did not fit).
//! - [`DispatchError`]: everything that can end a dispatch early. Always
//!   rendered into an envelope; it never escapes [`Mount::run`](crate::Mount::run).
//! - [`Error`]: infrastructure failures outside of a request: binding a
//!   socket, building a controller.

use std::backtrace::{Backtrace, BacktraceStatus};
use std::fmt;
use std::panic::Location;

use thiserror::Error;

use crate::status::Status;

/// The error type returned by baton's fallible setup and server operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid socket address `{0}`")]
    InvalidAddress(String),

    #[error("error during initialisation of {0}")]
    ControllerInit(String),
}

/// A request that ended before (or instead of) producing data.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Argument '{0}' is missing.")]
    MissingRequiredArgument(String),

    #[error("There is no route for '{0}'.")]
    RouteNotFound(String),

    #[error("Method {member} in class {controller} not found.")]
    MethodNotFound { member: String, controller: String },

    #[error("{}", .0.message())]
    Handler(HandlerError),
}

impl DispatchError {
    /// The `error` field of the envelope.
    pub fn kind(&self) -> &str {
        match self {
            Self::MissingRequiredArgument(_) => "MissingRequiredArgumentException",
            Self::RouteNotFound(_)           => "RouteNotFoundException",
            Self::MethodNotFound { .. }      => "MethodNotFoundException",
            Self::Handler(e)                 => e.kind(),
        }
    }

    pub fn status(&self) -> Status {
        match self {
            Self::MissingRequiredArgument(_) | Self::RouteNotFound(_) => Status::BadRequest,
            Self::MethodNotFound { .. } | Self::Handler(_)            => Status::InternalServerError,
        }
    }
}

impl From<HandlerError> for DispatchError {
    fn from(e: HandlerError) -> Self {
        Self::Handler(e)
    }
}

/// A failure raised by application code.
///
/// Carries a kind (the error's type name, shown to clients as `error`), a
/// message, the location it was created at and a backtrace. Location and
/// backtrace reach the client only when the mount runs in debug mode.
///
/// Any `std::error::Error` converts with `?`; the kind becomes the error's
/// type name:
///
/// ```rust
/// use baton::HandlerError;
///
/// fn parse(raw: &str) -> Result<u32, HandlerError> {
///     Ok(raw.parse::<u32>()?)
/// }
///
/// let err = parse("x").unwrap_err();
/// assert_eq!(err.kind(), "ParseIntError");
/// ```
pub struct HandlerError {
    kind: String,
    message: String,
    location: &'static Location<'static>,
    backtrace: Backtrace,
}

impl HandlerError {
    #[track_caller]
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            location: Location::caller(),
            backtrace: Backtrace::capture(),
        }
    }

    /// A generic application failure, kind `Exception`.
    #[track_caller]
    pub fn msg(message: impl Into<String>) -> Self {
        Self::new("Exception", message)
    }

    /// An argument that could not be converted to the declared type.
    #[track_caller]
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new("TypeError", message)
    }

    pub fn kind(&self) -> &str { &self.kind }
    pub fn message(&self) -> &str { &self.message }
    pub fn file(&self) -> &str { self.location.file() }
    pub fn line(&self) -> u32 { self.location.line() }

    /// The captured backtrace, or an empty string when capturing is disabled
    /// (`RUST_BACKTRACE` unset).
    pub fn trace(&self) -> String {
        match self.backtrace.status() {
            BacktraceStatus::Captured => self.backtrace.to_string(),
            _                         => String::new(),
        }
    }
}

impl<E> From<E> for HandlerError
where
    E: std::error::Error + Send + Sync + 'static,
{
    #[track_caller]
    fn from(e: E) -> Self {
        Self::new(short_type_name::<E>(), e.to_string())
    }
}

impl fmt::Debug for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerError")
            .field("kind", &self.kind)
            .field("message", &self.message)
            .field("location", &format_args!("{}:{}", self.file(), self.line()))
            .finish()
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// `core::num::ParseIntError` → `ParseIntError`. Generic arguments are kept.
pub(crate) fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let head = full.split('<').next().unwrap_or(full);
    match head.rfind("::") {
        Some(idx) => &full[idx + 2..],
        None      => full,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_error_wire_kinds() {
        let missing = DispatchError::MissingRequiredArgument("username".into());
        assert_eq!(missing.kind(), "MissingRequiredArgumentException");
        assert_eq!(missing.to_string(), "Argument 'username' is missing.");
        assert_eq!(missing.status(), Status::BadRequest);

        let route = DispatchError::RouteNotFound("login".into());
        assert_eq!(route.to_string(), "There is no route for 'login'.");

        let method = DispatchError::MethodNotFound { member: "getX".into(), controller: "Api".into() };
        assert_eq!(method.status(), Status::InternalServerError);
        assert_eq!(method.to_string(), "Method getX in class Api not found.");
    }

    #[test]
    fn handler_error_records_its_origin() {
        let line = line!() + 1;
        let err = HandlerError::msg("boom");
        assert_eq!(err.kind(), "Exception");
        assert_eq!(err.line(), line);
        assert!(err.file().ends_with("error.rs"));

        let wrapped = DispatchError::from(err);
        assert_eq!(wrapped.kind(), "Exception");
        assert_eq!(wrapped.to_string(), "boom");
    }

    #[test]
    fn foreign_errors_keep_their_type_name() {
        let err: HandlerError = "x".parse::<i32>().unwrap_err().into();
        assert_eq!(err.kind(), "ParseIntError");
    }
}
