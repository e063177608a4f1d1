use repokit_domain::DomainError;
use sqlx::error::ErrorKind;

/// Classifies sqlx failures into `DomainError` variants.
///
/// The original driver message is kept verbatim, prefixed with the
/// operation that failed.
pub struct RepositoryErrorMapper;

impl RepositoryErrorMapper {
    pub fn map_sqlx_error(err: sqlx::Error, context: &str) -> DomainError {
        let message = format!("{}: {}", context, err);

        match &err {
            sqlx::Error::Database(db_err) => match db_err.kind() {
                ErrorKind::UniqueViolation
                | ErrorKind::ForeignKeyViolation
                | ErrorKind::NotNullViolation
                | ErrorKind::CheckViolation => DomainError::ConstraintViolation(message),
                _ => DomainError::Repository(message),
            },
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_) => DomainError::Connection(message),
            sqlx::Error::ColumnDecode { .. }
            | sqlx::Error::Decode(_)
            | sqlx::Error::ColumnNotFound(_)
            | sqlx::Error::ColumnIndexOutOfBounds { .. }
            | sqlx::Error::TypeNotFound { .. } => DomainError::Mapping(message),
            sqlx::Error::Configuration(_) => DomainError::Configuration(message),
            _ => DomainError::Repository(message),
        }
    }
}

/// `?`-friendly form of [`RepositoryErrorMapper::map_sqlx_error`]
pub trait ResultExt<T> {
    fn map_repo_error(self, context: &str) -> Result<T, DomainError>;
}

impl<T> ResultExt<T> for Result<T, sqlx::Error> {
    fn map_repo_error(self, context: &str) -> Result<T, DomainError> {
        self.map_err(|e| RepositoryErrorMapper::map_sqlx_error(e, context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_timeout_is_connection_error() {
        let err = RepositoryErrorMapper::map_sqlx_error(sqlx::Error::PoolTimedOut, "Count rows");
        match err {
            DomainError::Connection(msg) => assert!(msg.starts_with("Count rows: ")),
            other => panic!("Expected Connection error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_column_is_mapping_error() {
        let result: Result<(), sqlx::Error> = Err(sqlx::Error::ColumnNotFound("age".into()));
        assert!(matches!(
            result.map_repo_error("Read row"),
            Err(DomainError::Mapping(_))
        ));
    }

    #[test]
    fn test_row_not_found_is_repository_error() {
        let result: Result<(), sqlx::Error> = Err(sqlx::Error::RowNotFound);
        assert!(matches!(
            result.map_repo_error("Fetch one"),
            Err(DomainError::Repository(_))
        ));
    }
}
