//! Contains the `Error` and `Result` types that this crate uses.

use thiserror::Error;

/// The result type for all fallible operations in this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// An error that can occur while registering, running, or tearing down a
/// subscription.
///
/// The inner [`ErrorKind`] is wrapped in a `Box` to keep `Error` cheap to
/// move and to leave room for the kind enum to grow without widening every
/// `Result`.
#[derive(Clone, Debug, Error)]
#[error("{kind}")]
pub struct Error {
    /// The kind of error that occurred.
    pub kind: Box<ErrorKind>,
}

impl Error {
    pub(crate) fn new(kind: ErrorKind) -> Self {
        Self {
            kind: Box::new(kind),
        }
    }

    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        ErrorKind::Configuration {
            message: message.into(),
        }
        .into()
    }

    pub(crate) fn filter_compilation(message: impl Into<String>) -> Self {
        ErrorKind::FilterCompilation {
            message: message.into(),
        }
        .into()
    }

    pub(crate) fn conversion(from: impl Into<String>, to: impl Into<String>) -> Self {
        ErrorKind::Conversion {
            from: from.into(),
            to: to.into(),
        }
        .into()
    }

    /// Returns `true` if this error originated from the driver rather than
    /// from this crate's own configuration or conversion logic.
    pub fn is_driver_error(&self) -> bool {
        matches!(&*self.kind, ErrorKind::Driver(_))
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error::new(kind)
    }
}

impl From<mongodb::error::Error> for Error {
    fn from(source: mongodb::error::Error) -> Self {
        ErrorKind::Driver(source).into()
    }
}

/// The category of error that occurred.
#[derive(Clone, Debug, Error)]
#[non_exhaustive]
pub enum ErrorKind {
    /// A `SubscriptionRequest` or `RequestOptions` was invalid: a null
    /// listener, an unknown request variant, or a malformed filter value.
    #[error("configuration error: {message}")]
    Configuration {
        /// A human-readable description of what was wrong.
        message: String,
    },

    /// A structured aggregation filter could not be compiled into a
    /// change-stream pipeline.
    #[error("filter compilation error: {message}")]
    FilterCompilation {
        /// A human-readable description of what was wrong.
        message: String,
    },

    /// A message body could not be converted into the caller's requested
    /// target type.
    #[error("could not convert {from} into {to}")]
    Conversion {
        /// The runtime type (or "document") the body held before conversion.
        from: String,
        /// The type name the caller requested.
        to: String,
    },

    /// The underlying driver returned an error while opening, polling, or
    /// closing a cursor.
    #[error("driver error: {0}")]
    Driver(#[source] mongodb::error::Error),

    /// An operation was attempted on a task that had already reached the
    /// terminal `Cancelled` state.
    #[error("task has already been cancelled")]
    Cancelled,
}
