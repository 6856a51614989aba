use super::Error;

/// Error raised while establishing or talking to a connection.
///
/// Connection implementations either report a plain message (authentication
/// rejected, unknown connection id, ...) or wrap the error of the underlying
/// client library.
#[derive(Debug)]
pub(super) struct ConnectionError {
    message: Box<str>,
    inner: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl std::error::Error for ConnectionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.inner
            .as_deref()
            .map(|inner| inner as &(dyn std::error::Error + 'static))
    }
}

impl core::fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "connection error: {}", self.message)?;
        if let Some(inner) = &self.inner {
            write!(f, ": {inner}")?;
        }
        Ok(())
    }
}

impl Error {
    /// Creates a connection error from a message.
    pub fn connection(message: impl Into<String>) -> Error {
        Error::from(super::ErrorKind::Connection(ConnectionError {
            message: message.into().into(),
            inner: None,
        }))
    }

    /// Creates a connection error wrapping the error of a client library.
    pub fn connection_failed(
        message: impl Into<String>,
        err: impl std::error::Error + Send + Sync + 'static,
    ) -> Error {
        Error::from(super::ErrorKind::Connection(ConnectionError {
            message: message.into().into(),
            inner: Some(Box::new(err)),
        }))
    }

    /// Returns `true` if this error, or any error it wraps, is a connection
    /// error.
    pub fn is_connection(&self) -> bool {
        self.find_kind(|kind| matches!(kind, super::ErrorKind::Connection(_)).then_some(()))
            .is_some()
    }
}
