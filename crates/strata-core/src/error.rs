mod adhoc;
mod caster;
mod connection;
mod execution;
mod instance;
mod query;
mod relation;
mod structure;

use adhoc::AdhocError;
use caster::CasterError;
use connection::ConnectionError;
use execution::ExecutionError;
use instance::InstanceError;
use query::QueryError;
use relation::RelationError;
use std::sync::Arc;
use structure::StructureError;

pub use execution::ExecutionErrorCode;
pub use instance::InstanceErrorKind;
pub use structure::StructureErrorKind;

/// Returns early with an ad-hoc error built from a format string.
#[macro_export]
macro_rules! bail {
    ($($arg:tt)*) => {
        return Err($crate::Error::from_args(format_args!($($arg)*)))
    };
}

/// Creates an ad-hoc error from a format string.
#[macro_export]
macro_rules! err {
    ($($arg:tt)*) => {
        $crate::Error::from_args(format_args!($($arg)*))
    };
}

/// An error that can occur in Strata.
#[derive(Clone)]
pub struct Error {
    inner: Option<Arc<ErrorInner>>,
}

#[derive(Debug)]
struct ErrorInner {
    kind: ErrorKind,
    cause: Option<Error>,
}

impl Error {
    /// Adds context to this error.
    ///
    /// Context is displayed in reverse order: the most recently added context is shown first,
    /// followed by earlier context, ending with the root cause.
    #[inline(always)]
    pub fn context(self, consequent: impl IntoError) -> Error {
        self.context_impl(consequent.into_error())
    }

    #[inline(never)]
    #[cold]
    fn context_impl(self, consequent: Error) -> Error {
        let mut err = consequent;
        if err.inner.is_none() {
            err = Error::from(ErrorKind::Unknown);
        }

        // A consequent shared with another handle, or with a cause of its
        // own, cannot take `self` as its cause in place. It is wrapped in a
        // fresh node that reports the same kind.
        let unique = err
            .inner
            .as_mut()
            .and_then(Arc::get_mut)
            .is_some_and(|inner| inner.cause.is_none());

        if !unique {
            err = Error::from(ErrorKind::Shared(err));
        }

        if let Some(inner) = err.inner.as_mut().and_then(Arc::get_mut) {
            inner.cause = Some(self);
        }
        err
    }

    /// Returns the innermost error of the context chain.
    pub fn root(&self) -> &Error {
        let mut err = self;
        while let Some(cause) = err.inner.as_ref().and_then(|inner| inner.cause.as_ref()) {
            err = cause;
        }
        err
    }

    fn chain(&self) -> impl Iterator<Item = &Error> {
        let mut err = self;
        core::iter::once(err).chain(core::iter::from_fn(move || {
            err = err.inner.as_ref().and_then(|inner| inner.cause.as_ref())?;
            Some(err)
        }))
    }

    fn kind(&self) -> &ErrorKind {
        match self.inner.as_ref().map(|inner| &inner.kind) {
            Some(ErrorKind::Shared(err)) => err.kind(),
            Some(kind) => kind,
            None => &ErrorKind::Unknown,
        }
    }

    /// Finds the first error in the chain whose kind matches `f`.
    fn find_kind<T>(&self, f: impl Fn(&ErrorKind) -> Option<T>) -> Option<T> {
        self.chain().find_map(|err| f(err.kind()))
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self.kind() {
            ErrorKind::Anyhow(err) => Some(err.as_ref()),
            ErrorKind::Connection(err) => std::error::Error::source(err),
            _ => self
                .inner
                .as_ref()
                .and_then(|inner| inner.cause.as_ref())
                .map(|cause| cause as &(dyn std::error::Error + 'static)),
        }
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        let mut it = self.chain().peekable();
        while let Some(err) = it.next() {
            core::fmt::Display::fmt(err.kind(), f)?;
            if it.peek().is_some() {
                f.write_str(": ")?;
            }
        }
        Ok(())
    }
}

impl core::fmt::Debug for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        if !f.alternate() {
            core::fmt::Display::fmt(self, f)
        } else {
            let Some(ref inner) = self.inner else {
                return f.debug_struct("Error").field("kind", &"None").finish();
            };
            f.debug_struct("Error")
                .field("kind", &inner.kind)
                .field("cause", &inner.cause)
                .finish()
        }
    }
}

#[derive(Debug)]
enum ErrorKind {
    Anyhow(anyhow::Error),
    Adhoc(AdhocError),
    Connection(ConnectionError),
    Execution(ExecutionError),
    Query(QueryError),
    Structure(StructureError),
    Relation(RelationError),
    Caster(CasterError),
    Instance(InstanceError),
    /// Another error used as context, standing in for its kind.
    Shared(Error),
    Unknown,
}

impl core::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        use self::ErrorKind::*;

        match self {
            Anyhow(err) => core::fmt::Display::fmt(err, f),
            Adhoc(err) => core::fmt::Display::fmt(err, f),
            Connection(err) => core::fmt::Display::fmt(err, f),
            Execution(err) => core::fmt::Display::fmt(err, f),
            Query(err) => core::fmt::Display::fmt(err, f),
            Structure(err) => core::fmt::Display::fmt(err, f),
            Relation(err) => core::fmt::Display::fmt(err, f),
            Caster(err) => core::fmt::Display::fmt(err, f),
            Instance(err) => core::fmt::Display::fmt(err, f),
            Shared(err) => core::fmt::Display::fmt(err.kind(), f),
            Unknown => f.write_str("unknown strata error"),
        }
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Error {
        Error {
            inner: Some(Arc::new(ErrorInner { kind, cause: None })),
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Error {
        Error::from(ErrorKind::Anyhow(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Error {
        Error::from(anyhow::Error::from(err))
    }
}

impl From<std::num::ParseIntError> for Error {
    fn from(err: std::num::ParseIntError) -> Error {
        Error::from(anyhow::Error::from(err))
    }
}

/// Trait for types that can be converted into an Error.
pub trait IntoError {
    /// Converts this type into an Error.
    fn into_error(self) -> Error;
}

impl IntoError for Error {
    #[inline(always)]
    fn into_error(self) -> Error {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_size() {
        let expected_size = core::mem::size_of::<usize>();
        assert_eq!(expected_size, core::mem::size_of::<Error>());
    }

    #[test]
    fn error_from_args() {
        let err = Error::from_args(format_args!("test error: {}", 42));
        assert_eq!(err.to_string(), "test error: 42");
    }

    #[test]
    fn error_chain_display() {
        let root = Error::from_args(format_args!("root cause"));
        let mid = Error::from_args(format_args!("middle context"));
        let top = Error::from_args(format_args!("top context"));

        let chained = root.context(mid).context(top);
        assert_eq!(
            chained.to_string(),
            "top context: middle context: root cause"
        );
    }

    #[test]
    fn context_with_shared_consequent() {
        let shared = err!("shared");
        let _other = shared.clone();

        let err = Error::query("bad fragment").context(shared);
        assert_eq!(err.to_string(), "shared: query error: bad fragment");
    }

    #[test]
    fn shared_consequent_keeps_its_kind() {
        let missing = Error::structure(StructureErrorKind::MissingPrimaryKey, "Tag has no key");
        let _cached = missing.clone();

        let err = Error::query("bad fragment").context(missing);
        assert_eq!(
            err.structure_error_kind(),
            Some(StructureErrorKind::MissingPrimaryKey)
        );
        assert!(err.is_query());
        assert_eq!(
            err.to_string(),
            "structure error: missing primary key: Tag has no key: query error: bad fragment"
        );
    }

    #[test]
    fn consequent_with_a_cause_keeps_both_chains_apart() {
        let caused = Error::connection("pool closed").context(err!("opening `default`"));

        let err = Error::caster("not a date").context(caused.clone());
        assert!(err.is_caster());
        assert_eq!(err.to_string(), "opening `default`: caster error: not a date");
        assert_eq!(caused.to_string(), "opening `default`: connection error: pool closed");
    }

    #[test]
    fn kind_predicates_see_through_context() {
        let err = Error::caster("not a date").context(err!("decoding `created_at`"));

        assert!(err.is_caster());
        assert!(!err.is_query());
        assert_eq!(err.root().to_string(), "caster error: not a date");
    }

    #[test]
    fn anyhow_bridge() {
        let anyhow_err = anyhow::anyhow!("something failed");
        let our_err: Error = anyhow_err.into();
        assert_eq!(our_err.to_string(), "something failed");
    }
}
