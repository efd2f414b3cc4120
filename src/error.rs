use std::fmt;

#[derive(Debug)]
pub enum AppError {
    /// Connection, bind or search failure against the directory server
    DirectoryUnavailable(String),
    /// Malformed mapping, unknown hook or post-processor, invalid settings
    Configuration(String),
    Database(String),
    Serialization(serde_json::Error),
    Internal(String),
}

/// Coarse classification used by the reconciler to pick a run status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Directory,
    Configuration,
    Store,
    Internal,
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::DirectoryUnavailable(_) => ErrorKind::Directory,
            AppError::Configuration(_) => ErrorKind::Configuration,
            AppError::Database(_) | AppError::Serialization(_) => ErrorKind::Store,
            AppError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn is_directory_unavailable(&self) -> bool {
        self.kind() == ErrorKind::Directory
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::DirectoryUnavailable(e) => write!(f, "Directory unavailable: {}", e),
            AppError::Configuration(e) => write!(f, "Configuration error: {}", e),
            AppError::Database(e) => write!(f, "Database error: {}", e),
            AppError::Serialization(e) => write!(f, "Serialization error: {}", e),
            AppError::Internal(e) => write!(f, "Internal error: {}", e),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Serialization(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<ldap3::LdapError> for AppError {
    fn from(err: ldap3::LdapError) -> Self {
        AppError::DirectoryUnavailable(err.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;
