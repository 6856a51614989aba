use super::Error;

/// Error raised by a caster that refuses its input.
#[derive(Debug)]
pub(super) struct CasterError {
    message: Box<str>,
}

impl std::error::Error for CasterError {}

impl core::fmt::Display for CasterError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "caster error: {}", self.message)
    }
}

impl Error {
    /// Creates a caster error carrying the caster's bail message.
    pub fn caster(message: impl Into<String>) -> Error {
        Error::from(super::ErrorKind::Caster(CasterError {
            message: message.into().into(),
        }))
    }

    /// Returns `true` if this error, or any error it wraps, is a caster error.
    pub fn is_caster(&self) -> bool {
        self.find_kind(|kind| matches!(kind, super::ErrorKind::Caster(_)).then_some(()))
            .is_some()
    }
}
