//! Error type for the analysis job.
//!
//! `hist-config` reports `ConfigurationError` and `hist-core` reports `HistogramError`. Where both meet, such as
//! building a histogram manager from configuration or running `analyze-3l`, they are wrapped into a [`GenericError`]
//! with a sentence saying which step of the job failed. The original error stays reachable as the source.
#![deny(warnings)]
#![deny(missing_docs)]

use std::fmt::Display;

/// Error returned by the job-level steps of an analysis run.
pub type GenericError = anyhow::Error;

/// Builds a [`GenericError`] from a message, a format string with arguments, or an existing error.
#[macro_export]
macro_rules! generic_error {
    ($msg:literal $(,)?) => { $crate::_anyhow!($msg) };
    ($err:expr $(,)?) => { $crate::_anyhow!($err) };
    ($fmt:expr, $($arg:tt)*) => { $crate::_anyhow!($fmt, $($arg)*) };
}

#[doc(hidden)]
pub use anyhow::anyhow as _anyhow;

mod private {
    pub trait Sealed {}

    impl<T, E> Sealed for Result<T, E> {}
}

/// Attaches a description of the failed job step to a `Result`.
///
/// Named apart from `snafu::ResultExt::context` so both traits can be in scope in the same module.
pub trait ErrorContext<T, E>: private::Sealed {
    /// Wraps the error with `context`.
    fn error_context<C>(self, context: C) -> Result<T, GenericError>
    where
        C: Display + Send + Sync + 'static;

    /// Wraps the error with the context returned by `f`, which only runs on failure.
    fn with_error_context<C, F>(self, f: F) -> Result<T, GenericError>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C;
}

impl<T, E> ErrorContext<T, E> for Result<T, E>
where
    Result<T, E>: anyhow::Context<T, E>,
{
    fn error_context<C>(self, context: C) -> Result<T, GenericError>
    where
        C: Display + Send + Sync + 'static,
    {
        <Self as anyhow::Context<T, E>>::context(self, context)
    }

    fn with_error_context<C, F>(self, f: F) -> Result<T, GenericError>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        <Self as anyhow::Context<T, E>>::with_context(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_is_prepended_to_chain() {
        let result: Result<(), std::io::Error> = Err(std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"));
        let err = result.error_context("Failed to open event file.").unwrap_err();

        assert_eq!(err.to_string(), "Failed to open event file.");
        assert_eq!(err.root_cause().to_string(), "no such file");
    }

    #[test]
    fn lazy_context_only_built_on_error() {
        let ok: Result<u32, std::io::Error> = Ok(7);
        let value = ok
            .with_error_context(|| -> String { panic!("context should not be evaluated") })
            .unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn macro_formats_arguments() {
        let err = generic_error!("Invalid era '{}'.", "2015");
        assert_eq!(err.to_string(), "Invalid era '2015'.");
    }
}
