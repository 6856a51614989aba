use super::Error;

/// What went wrong while reading or writing a model instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceErrorKind {
    /// Write to an immutable property, such as a persisted primary key.
    Immutable,

    /// Write to a macro property.
    ImmutableMacro,

    /// Write to a relation that cannot be assigned.
    ImmutableRelation,

    /// A lookup returned no record.
    NotFound,

    /// A macro was declared without an implementation.
    MissingMacroImplementation,
}

impl InstanceErrorKind {
    fn as_str(self) -> &'static str {
        use InstanceErrorKind::*;

        match self {
            Immutable => "immutable property",
            ImmutableMacro => "immutable macro",
            ImmutableRelation => "immutable relation",
            NotFound => "not found",
            MissingMacroImplementation => "missing macro implementation",
        }
    }
}

#[derive(Debug)]
pub(super) struct InstanceError {
    kind: InstanceErrorKind,
    message: Box<str>,
}

impl std::error::Error for InstanceError {}

impl core::fmt::Display for InstanceError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "{}: {}", self.kind.as_str(), self.message)
    }
}

impl Error {
    /// Creates an instance error.
    pub fn instance(kind: InstanceErrorKind, message: impl Into<String>) -> Error {
        Error::from(super::ErrorKind::Instance(InstanceError {
            kind,
            message: message.into().into(),
        }))
    }

    /// Shorthand for an [`InstanceErrorKind::NotFound`] error.
    pub fn not_found(message: impl Into<String>) -> Error {
        Error::instance(InstanceErrorKind::NotFound, message)
    }

    /// Returns `true` if this error, or any error it wraps, is an instance
    /// error.
    pub fn is_instance(&self) -> bool {
        self.instance_error_kind().is_some()
    }

    /// Returns `true` if this error is a not-found instance error.
    pub fn is_not_found(&self) -> bool {
        self.instance_error_kind() == Some(InstanceErrorKind::NotFound)
    }

    /// Returns the instance error kind, if this is an instance error.
    pub fn instance_error_kind(&self) -> Option<InstanceErrorKind> {
        self.find_kind(|kind| match kind {
            super::ErrorKind::Instance(err) => Some(err.kind),
            _ => None,
        })
    }
}
