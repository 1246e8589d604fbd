use thiserror::Error;

/// Application-wide error types.
///
/// A failed catalog fetch escapes a reconciliation run. Everything that goes
/// wrong while processing records is absorbed into the run's counters and
/// error text; transport-level store failures (see
/// [`AppError::is_transport`]) additionally escalate the run's status.
///
/// # Error Conversion
///
/// - `sqlx::Error` → `AppError::DatabaseError`
/// - `serde_json::Error` → `AppError::SerializationError`
///
/// # Examples
///
/// ```no_run
/// use fruitsync_core::error::AppError;
///
/// fn example() -> Result<(), AppError> {
///     Err(AppError::Generic("Something went wrong".to_string()))
/// }
/// ```
#[derive(Error, Debug)]
pub enum AppError {
    /// Database operation failed.
    ///
    /// Wraps connection failures, query errors and constraint violations.
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    /// HTTP client request failed for a reason other than connectivity.
    #[error("API Client error: {0}")]
    ClientError(String),

    /// JSON serialization or deserialization failed.
    ///
    /// Raised when the catalog body cannot be decoded at all.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// URL parsing failed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// A single upstream record failed the presence checks.
    #[error("Invalid fruit record: {0}")]
    InvalidRecord(String),

    /// A named status row is missing from the status catalog.
    #[error("Status not found in catalog: {0}")]
    StatusNotFound(String),

    /// Configuration file could not be read or parsed.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Network or connection error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Request timeout.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Generic application error for cases not covered by specific variants.
    #[error("Error: {0}")]
    Generic(String),
}

impl AppError {
    /// Returns a user-friendly error message suitable for CLI output.
    pub fn user_message(&self) -> String {
        match self {
            AppError::DatabaseError(e) => {
                if e.to_string().contains("connection") {
                    "Cannot connect to database. Is PostgreSQL running?\n   Check DATABASE_URL."
                        .to_string()
                } else {
                    format!("Database error: {}", e)
                }
            }
            AppError::ClientError(msg) => {
                if msg.contains("timeout") || msg.contains("timed out") {
                    "Request timed out. The fruit API may be slow or unreachable.".to_string()
                } else {
                    format!("API error: {}", msg)
                }
            }
            AppError::SerializationError(e) => {
                format!("The fruit API returned a body that could not be decoded: {}", e)
            }
            AppError::StatusNotFound(name) => {
                format!(
                    "Status '{}' is missing from the statuses table.\n   Run `fruitsync sync` once to seed it.",
                    name
                )
            }
            AppError::NetworkError(msg) => {
                format!("Network error: {}\n   Check your internet connection.", msg)
            }
            AppError::Timeout(secs) => {
                format!(
                    "Request timed out after {} seconds.\n   The fruit API may be overloaded. Try again later.",
                    secs
                )
            }
            _ => self.to_string(),
        }
    }

    /// Returns true if this error means a collaborator could not be reached
    /// or spoke garbage: the catalog API, or the database connection itself.
    ///
    /// Query-level database errors such as constraint violations are not
    /// transport errors.
    ///
    /// # Examples
    ///
    /// ```
    /// use fruitsync_core::error::AppError;
    ///
    /// let err = AppError::NetworkError("connection reset".to_string());
    /// assert!(err.is_transport());
    ///
    /// let err = AppError::DatabaseError(sqlx::Error::PoolTimedOut);
    /// assert!(err.is_transport());
    ///
    /// let err = AppError::InvalidRecord("missing field `genus`".to_string());
    /// assert!(!err.is_transport());
    /// ```
    pub fn is_transport(&self) -> bool {
        match self {
            AppError::DatabaseError(e) => matches!(
                e,
                sqlx::Error::PoolTimedOut
                    | sqlx::Error::PoolClosed
                    | sqlx::Error::Io(_)
                    | sqlx::Error::Tls(_)
                    | sqlx::Error::WorkerCrashed
            ),
            AppError::NetworkError(_)
            | AppError::Timeout(_)
            | AppError::ClientError(_)
            | AppError::SerializationError(_)
            | AppError::InvalidUrl(_) => true,
            _ => false,
        }
    }
}
