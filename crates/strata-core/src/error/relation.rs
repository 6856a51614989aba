use super::Error;

/// Error raised when a relation cannot be constructed or resolved.
#[derive(Debug)]
pub(super) struct RelationError {
    message: Box<str>,
}

impl std::error::Error for RelationError {}

impl core::fmt::Display for RelationError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "relation error: {}", self.message)
    }
}

impl Error {
    /// Creates a relation error.
    pub fn relation(message: impl Into<String>) -> Error {
        Error::from(super::ErrorKind::Relation(RelationError {
            message: message.into().into(),
        }))
    }

    /// Returns `true` if this error, or any error it wraps, is a relation
    /// error.
    pub fn is_relation(&self) -> bool {
        self.find_kind(|kind| matches!(kind, super::ErrorKind::Relation(_)).then_some(()))
            .is_some()
    }
}
