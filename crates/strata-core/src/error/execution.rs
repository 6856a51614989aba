use super::Error;

/// Driver-independent classification of execution failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionErrorCode {
    /// A unique or primary key constraint rejected the row.
    DuplicateKey,

    /// A foreign key constraint rejected the row.
    ForeignKeyViolation,

    /// A `NOT NULL` column received `NULL`.
    NotNullViolation,

    /// A check constraint rejected the row.
    CheckViolation,

    /// The statement text could not be parsed.
    SyntaxError,

    /// The statement referenced an unknown table.
    UndefinedTable,

    /// The statement referenced an unknown column.
    UndefinedColumn,

    /// The transaction was chosen as a deadlock victim.
    Deadlock,

    /// The transaction could not be serialized.
    SerializationFailure,

    /// The server refused the operation due to missing privileges.
    PermissionDenied,

    /// Anything the driver reported that does not map to a known code.
    Unknown,
}

impl ExecutionErrorCode {
    /// Maps a SQLSTATE code onto the normalized code space.
    pub fn from_sqlstate(sqlstate: &str) -> ExecutionErrorCode {
        use ExecutionErrorCode::*;

        match sqlstate {
            "23505" | "23000" => DuplicateKey,
            "23503" => ForeignKeyViolation,
            "23502" => NotNullViolation,
            "23514" => CheckViolation,
            "42601" | "42000" => SyntaxError,
            "42P01" | "42S02" => UndefinedTable,
            "42703" | "42S22" => UndefinedColumn,
            "40P01" => Deadlock,
            "40001" => SerializationFailure,
            "42501" => PermissionDenied,
            _ => Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        use ExecutionErrorCode::*;

        match self {
            DuplicateKey => "duplicate_key",
            ForeignKeyViolation => "foreign_key_violation",
            NotNullViolation => "not_null_violation",
            CheckViolation => "check_violation",
            SyntaxError => "syntax_error",
            UndefinedTable => "undefined_table",
            UndefinedColumn => "undefined_column",
            Deadlock => "deadlock",
            SerializationFailure => "serialization_failure",
            PermissionDenied => "permission_denied",
            Unknown => "unknown",
        }
    }
}

/// Error reported by the connection while executing a statement.
#[derive(Debug)]
pub(super) struct ExecutionError {
    code: ExecutionErrorCode,
    message: Box<str>,
}

impl std::error::Error for ExecutionError {}

impl core::fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(
            f,
            "execution failed [{}]: {}",
            self.code.as_str(),
            self.message
        )
    }
}

impl Error {
    /// Creates an execution error with a normalized code.
    pub fn execution(code: ExecutionErrorCode, message: impl Into<String>) -> Error {
        Error::from(super::ErrorKind::Execution(ExecutionError {
            code,
            message: message.into().into(),
        }))
    }

    /// Creates an execution error from a SQLSTATE reported by a driver.
    pub fn execution_sqlstate(sqlstate: &str, message: impl Into<String>) -> Error {
        Error::execution(ExecutionErrorCode::from_sqlstate(sqlstate), message)
    }

    /// Returns `true` if this error, or any error it wraps, is an execution
    /// error.
    pub fn is_execution(&self) -> bool {
        self.execution_code().is_some()
    }

    /// Returns the normalized execution code, if this is an execution error.
    pub fn execution_code(&self) -> Option<ExecutionErrorCode> {
        self.find_kind(|kind| match kind {
            super::ErrorKind::Execution(err) => Some(err.code),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlstate_mapping() {
        assert_eq!(
            ExecutionErrorCode::from_sqlstate("23505"),
            ExecutionErrorCode::DuplicateKey
        );
        assert_eq!(
            ExecutionErrorCode::from_sqlstate("42S02"),
            ExecutionErrorCode::UndefinedTable
        );
        assert_eq!(
            ExecutionErrorCode::from_sqlstate("HY000"),
            ExecutionErrorCode::Unknown
        );
    }

    #[test]
    fn display_includes_code() {
        let err = Error::execution_sqlstate("23503", "posts.user_id references users.id");
        assert_eq!(
            err.to_string(),
            "execution failed [foreign_key_violation]: posts.user_id references users.id"
        );
        assert_eq!(
            err.execution_code(),
            Some(ExecutionErrorCode::ForeignKeyViolation)
        );
    }
}
