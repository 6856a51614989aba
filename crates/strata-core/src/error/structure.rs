use super::Error;

/// What went wrong while discovering or consulting a structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructureErrorKind {
    /// The model does not declare a table, or the table does not exist.
    MissingTable,

    /// A root model declares no primary key.
    MissingPrimaryKey,

    /// Two properties share a name or alias.
    DuplicateProperty,

    /// A caster declaration is invalid for its property.
    InvalidCaster,

    /// A macro declaration is invalid.
    InvalidMacro,

    /// A relation declaration is invalid.
    InvalidRelation,

    /// A property was requested that the structure does not declare.
    UnknownProperty,

    /// The polymorphic discriminator column is not declared or missing from a row.
    MissingPolymorphicColumn,

    /// A discriminator value has no registered subtype.
    UnknownPolymorphicType,
}

impl StructureErrorKind {
    fn as_str(self) -> &'static str {
        use StructureErrorKind::*;

        match self {
            MissingTable => "missing table",
            MissingPrimaryKey => "missing primary key",
            DuplicateProperty => "duplicate property",
            InvalidCaster => "invalid caster",
            InvalidMacro => "invalid macro",
            InvalidRelation => "invalid relation",
            UnknownProperty => "unknown property",
            MissingPolymorphicColumn => "missing polymorphic column",
            UnknownPolymorphicType => "unknown polymorphic type",
        }
    }
}

/// Error raised by schema discovery.
///
/// Discovery failures are raised on the first access to a model's structure
/// and cached; later accesses observe the same error.
#[derive(Debug)]
pub(super) struct StructureError {
    kind: StructureErrorKind,
    message: Box<str>,
}

impl std::error::Error for StructureError {}

impl core::fmt::Display for StructureError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "structure error: {}: {}", self.kind.as_str(), self.message)
    }
}

impl Error {
    /// Creates a structure error.
    pub fn structure(kind: StructureErrorKind, message: impl Into<String>) -> Error {
        Error::from(super::ErrorKind::Structure(StructureError {
            kind,
            message: message.into().into(),
        }))
    }

    /// Shorthand for an [`StructureErrorKind::UnknownProperty`] error.
    pub fn unknown_property(model: &str, key: &str) -> Error {
        Error::structure(
            StructureErrorKind::UnknownProperty,
            format!("{model} has no property `{key}`"),
        )
    }

    /// Returns `true` if this error, or any error it wraps, is a structure
    /// error.
    pub fn is_structure(&self) -> bool {
        self.structure_error_kind().is_some()
    }

    /// Returns the structure error kind, if this is a structure error.
    pub fn structure_error_kind(&self) -> Option<StructureErrorKind> {
        self.find_kind(|kind| match kind {
            super::ErrorKind::Structure(err) => Some(err.kind),
            _ => None,
        })
    }
}
