//! Error types for timekeep-core.

use thiserror::Error;

/// Result type alias using timekeep-core Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for registry operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // Validation errors
    #[error("milestone_id is required.")]
    MissingMilestoneId,

    #[error("task_ids is required and must not be empty.")]
    MissingTaskIds,

    #[error("session_id is required.")]
    MissingSessionId,

    #[error("task_id is required.")]
    MissingTaskId,

    // Lifecycle errors
    #[error("Session '{0}' not found.")]
    SessionNotFound(String),

    #[error("Session '{0}' has already ended.")]
    SessionEnded(String),

    #[error("Task '{0}' not found in session.")]
    TaskNotFound(String),

    #[error("Task '{task_id}' is not in progress (current status: {status}).")]
    TaskNotStarted { task_id: String, status: String },

    // Capacity errors
    #[error("Maximum session limit ({0}) reached. End existing sessions or wait for expiration.")]
    MaxSessionsReached(usize),

    #[error("Maximum tasks per session limit ({0}) reached.")]
    MaxTasksReached(usize),

    #[error("Failed to create session. Please try again.")]
    SessionCreationFailed,

    // Timezone resolution errors
    #[error("Unknown timezone: '{0}'. Use 'local', 'UTC', or a valid IANA timezone name (e.g., 'America/New_York').")]
    UnknownTimezone(String),

    #[error("Failed to resolve timezone '{timezone}': {message}")]
    TimezoneResolutionError { timezone: String, message: String },

    // Internal errors
    #[error("Registry lock poisoned")]
    LockPoisoned,
}

impl Error {
    /// Stable wire code for this error, returned to tool callers.
    pub fn code(&self) -> &'static str {
        match self {
            Error::MissingMilestoneId => "MISSING_MILESTONE_ID",
            Error::MissingTaskIds => "MISSING_TASK_IDS",
            Error::MissingSessionId => "MISSING_SESSION_ID",
            Error::MissingTaskId => "MISSING_TASK_ID",
            Error::SessionNotFound(_) => "SESSION_NOT_FOUND",
            Error::SessionEnded(_) => "SESSION_ENDED",
            Error::TaskNotFound(_) => "TASK_NOT_FOUND",
            Error::TaskNotStarted { .. } => "TASK_NOT_STARTED",
            Error::MaxSessionsReached(_) => "MAX_SESSIONS_REACHED",
            Error::MaxTasksReached(_) => "MAX_TASKS_REACHED",
            Error::SessionCreationFailed => "SESSION_CREATION_FAILED",
            Error::UnknownTimezone(_) => "UNKNOWN_TIMEZONE",
            Error::TimezoneResolutionError { .. } => "TIMEZONE_RESOLUTION_ERROR",
            Error::LockPoisoned => "LOCK_POISONED",
        }
    }
}
