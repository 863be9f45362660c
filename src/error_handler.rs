//! Pluggable error policy for the task run loop.
//!
//! These mirror the specification's `ExceptionTranslator` and `ErrorHandler`
//! external interfaces: the task run loop never decides to terminate on its
//! own account on error — that decision belongs entirely to the
//! [`ErrorHandler`].

use crate::error::Error;

/// Optionally rewrites a driver-level error into a different shape before it
/// reaches the [`ErrorHandler`]. Returning `None` means "no translation",
/// and the original error is used.
pub trait ExceptionTranslator: Send + Sync {
    /// Attempts to translate `error` into a more specific error.
    fn translate(&self, error: &Error) -> Option<Error>;
}

/// The terminal receiver for errors raised while polling a cursor.
///
/// The run loop does not itself cancel a subscription on error; an
/// [`ErrorHandler`] that wants that behavior must trigger cancellation
/// through its own side channel (for example, by holding a
/// [`crate::Subscription`] and calling `cancel()`).
pub trait ErrorHandler: Send + Sync {
    /// Handles a translated (or untranslated) error.
    fn handle(&self, error: Error);
}

/// The default [`ErrorHandler`]: logs via `tracing` at `warn` and otherwise
/// does nothing. Non-fatal, matching the specification's default policy.
#[derive(Clone, Copy, Debug, Default)]
pub struct LoggingErrorHandler;

impl ErrorHandler for LoggingErrorHandler {
    fn handle(&self, error: Error) {
        #[cfg(feature = "tracing-unstable")]
        tracing::warn!(error = %error, "error while polling subscription cursor");
        #[cfg(not(feature = "tracing-unstable"))]
        let _ = error;
    }
}

pub(crate) fn translate(error: Error, translator: Option<&dyn ExceptionTranslator>) -> Error {
    match translator {
        Some(translator) => translator.translate(&error).unwrap_or(error),
        None => error,
    }
}
