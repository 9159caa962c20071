use backtrace::Backtrace;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::result::Result;

/// Error kinds for Cinder operations.
///
/// Each kind names one category of failure so callers can branch on
/// [`CinderError::kind`] instead of matching on message text.
///
/// # Examples
///
/// ```rust
/// use cinder::errors::{CinderError, CinderResult, ErrorKind};
///
/// fn example() -> CinderResult<()> {
///     Err(CinderError::new("users/ is not a valid path", ErrorKind::InvalidPath))
/// }
///
/// assert_eq!(example().unwrap_err().kind(), &ErrorKind::InvalidPath);
/// ```
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ErrorKind {
    /// Malformed collection or document path. Never worth retrying.
    InvalidPath,
    /// The operation required an existing document that is absent.
    NotFound,
    /// A rate governor ceiling was exceeded. Retry after backoff.
    RateLimited,
    /// Unsupported operator, malformed operand or cursor without ordering.
    InvalidQuery,
    /// A committed batch was reused.
    BatchSpent,
    /// A value cannot be represented in storage, or stored bytes are malformed.
    CodecError,
    /// A document field name is empty.
    InvalidFieldName,
    /// Journal file I/O failed.
    IOError,
    /// The store handle was closed.
    StoreClosed,
    /// A subscriber callback reported failure.
    SubscriptionError,
    /// A builder setting was rejected.
    InvalidConfig,
    /// Internal error (usually indicates a bug)
    InternalError,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::InvalidPath => write!(f, "Invalid path"),
            ErrorKind::NotFound => write!(f, "Not found"),
            ErrorKind::RateLimited => write!(f, "Rate limited"),
            ErrorKind::InvalidQuery => write!(f, "Invalid query"),
            ErrorKind::BatchSpent => write!(f, "Batch spent"),
            ErrorKind::CodecError => write!(f, "Codec error"),
            ErrorKind::InvalidFieldName => write!(f, "Invalid field name"),
            ErrorKind::IOError => write!(f, "IO error"),
            ErrorKind::StoreClosed => write!(f, "Store closed"),
            ErrorKind::SubscriptionError => write!(f, "Subscription error"),
            ErrorKind::InvalidConfig => write!(f, "Invalid configuration"),
            ErrorKind::InternalError => write!(f, "Internal error"),
        }
    }
}

/// Custom Cinder error type.
///
/// `CinderError` carries the error message, its kind, an optional cause and a
/// backtrace captured at construction. The backtrace is captured unresolved
/// and only symbolized when the error is debug-printed, so frequent and
/// expected failures such as [`ErrorKind::NotFound`] stay cheap.
///
/// # Examples
///
/// ```rust
/// use cinder::errors::{CinderError, ErrorKind};
///
/// let cause = CinderError::new("disk unplugged", ErrorKind::IOError);
/// let err = CinderError::new_with_cause("commit failed", ErrorKind::IOError, cause);
/// assert!(err.cause().is_some());
/// ```
#[derive(Clone)]
pub struct CinderError {
    message: String,
    error_kind: ErrorKind,
    cause: Option<Box<CinderError>>,
    backtrace: Backtrace,
}

impl CinderError {
    /// Creates a new `CinderError` with the specified message and error kind.
    pub fn new(message: &str, error_kind: ErrorKind) -> Self {
        CinderError {
            message: message.to_string(),
            error_kind,
            cause: None,
            backtrace: Backtrace::new_unresolved(),
        }
    }

    /// Creates a new `CinderError` that preserves the error which caused it.
    pub fn new_with_cause(message: &str, error_kind: ErrorKind, cause: CinderError) -> Self {
        CinderError {
            message: message.to_string(),
            error_kind,
            cause: Some(Box::new(cause)),
            backtrace: Backtrace::new_unresolved(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.error_kind
    }

    pub fn cause(&self) -> Option<&CinderError> {
        self.cause.as_deref()
    }
}

impl Display for CinderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Debug for CinderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        // print error message with stack trace followed by cause
        match &self.cause {
            Some(cause) => write!(f, "[{}] {}\nCaused by: {:?}", self.error_kind, self.message, cause),
            None => {
                let mut backtrace = self.backtrace.clone();
                backtrace.resolve();
                write!(f, "[{}] {}\n{:?}", self.error_kind, self.message, backtrace)
            }
        }
    }
}

impl Error for CinderError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.cause {
            Some(cause) => Some(cause.as_ref()),
            None => None,
        }
    }
}

/// A result type alias for Cinder operations.
pub type CinderResult<T> = Result<T, CinderError>;

impl From<std::io::Error> for CinderError {
    fn from(err: std::io::Error) -> Self {
        CinderError::new(&format!("IO error: {}", err), ErrorKind::IOError)
    }
}

impl From<bincode::error::EncodeError> for CinderError {
    fn from(err: bincode::error::EncodeError) -> Self {
        CinderError::new(&format!("Failed to encode record: {}", err), ErrorKind::CodecError)
    }
}

impl From<bincode::error::DecodeError> for CinderError {
    fn from(err: bincode::error::DecodeError) -> Self {
        CinderError::new(&format!("Failed to decode record: {}", err), ErrorKind::CodecError)
    }
}
