use super::Error;

/// Error raised while composing or compiling a query.
#[derive(Debug)]
pub(super) struct QueryError {
    message: Box<str>,
}

impl std::error::Error for QueryError {}

impl core::fmt::Display for QueryError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "query error: {}", self.message)
    }
}

impl Error {
    /// Creates a query error.
    ///
    /// Used for malformed fragment composition and for values the connection
    /// failed to quote.
    pub fn query(message: impl Into<String>) -> Error {
        Error::from(super::ErrorKind::Query(QueryError {
            message: message.into().into(),
        }))
    }

    /// Returns `true` if this error, or any error it wraps, is a query error.
    pub fn is_query(&self) -> bool {
        self.find_kind(|kind| matches!(kind, super::ErrorKind::Query(_)).then_some(()))
            .is_some()
    }
}
