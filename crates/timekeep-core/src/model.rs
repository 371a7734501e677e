//! Session and TaskRecord entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::clock;

/// Task status within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    NotStarted,
    InProgress,
    Completed,
    Skipped,
}

impl TaskStatus {
    /// Coerce a caller-supplied end status. Exactly "skipped" yields
    /// Skipped; any other value is normalized to Completed.
    pub fn from_request(status: &str) -> Self {
        if status == "skipped" {
            TaskStatus::Skipped
        } else {
            TaskStatus::Completed
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::NotStarted => "not_started",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Skipped => "skipped",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A task timing record within a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    /// Task identifier (from the session's task list, or ad-hoc).
    pub task_id: String,
    /// Optional human-readable task name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_name: Option<String>,
    /// Optional external task ID (e.g., from a project management tool).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_task_id: Option<String>,
    /// Optional work item ID (e.g., Azure DevOps, Jira).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub work_item_id: Option<String>,
    /// Wall-clock time when the task started.
    pub start_time: Option<DateTime<Utc>>,
    /// Monotonic tick count when the task started.
    pub start_ticks: Option<i64>,
    /// Wall-clock time when the task ended.
    pub end_time: Option<DateTime<Utc>>,
    /// Monotonic tick count when the task ended.
    pub end_ticks: Option<i64>,
    /// Duration in milliseconds (computed from monotonic ticks).
    pub duration_ms: Option<i64>,
    /// Task status: not_started, in_progress, completed, skipped.
    pub status: TaskStatus,
    /// Optional metadata key-value pairs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, String>>,
    /// Set when a start call found the task already running.
    pub already_running: bool,
}

impl TaskRecord {
    /// Create a fresh record in the not_started state.
    pub fn new(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            task_name: None,
            external_task_id: None,
            work_item_id: None,
            start_time: None,
            start_ticks: None,
            end_time: None,
            end_ticks: None,
            duration_ms: None,
            status: TaskStatus::NotStarted,
            metadata: None,
            already_running: false,
        }
    }

    pub fn is_in_progress(&self) -> bool {
        self.status == TaskStatus::InProgress
    }

    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }

    pub fn is_skipped(&self) -> bool {
        self.status == TaskStatus::Skipped
    }

    /// Duration in milliseconds from monotonic ticks. Present iff both
    /// start and end ticks are set.
    pub fn calculate_duration_ms(&self) -> Option<i64> {
        match (self.start_ticks, self.end_ticks) {
            (Some(start), Some(end)) => Some(clock::duration_ms(start, end)),
            _ => None,
        }
    }

    /// Elapsed milliseconds since task start, against a fresh tick sample.
    pub fn elapsed_ms(&self) -> Option<i64> {
        self.start_ticks.map(clock::elapsed_ms)
    }
}

/// A time tracking session for a milestone with associated tasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Unique identifier for this session (32-char hex token).
    pub session_id: String,
    /// MCP protocol session ID (if bound).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mcp_session_id: Option<String>,
    /// Milestone identifier being tracked.
    pub milestone_id: String,
    /// Optional human-readable milestone name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub milestone_name: Option<String>,
    /// Task IDs as requested at creation, in input order. Duplicates are
    /// kept as-is, each with its own record.
    pub task_ids: Vec<String>,
    /// Wall-clock time when the session started.
    pub start_time: DateTime<Utc>,
    /// Monotonic tick count when the session started.
    pub start_ticks: i64,
    /// Wall-clock time when the session ended (None while active).
    pub end_time: Option<DateTime<Utc>>,
    /// Monotonic tick count when the session ended (None while active).
    pub end_ticks: Option<i64>,
    /// Resolved timezone identifier for this session.
    pub timezone: String,
    /// Optional metadata key-value pairs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, String>>,
    /// Optional tags for categorization.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    /// Last activity time, bumped by mutating operations and summary reads.
    pub last_activity_time: DateTime<Utc>,
    /// Task records, append-only and never reordered.
    pub tasks: Vec<TaskRecord>,
}

impl Session {
    /// Whether the session has ended. End fields are set together, once.
    pub fn is_ended(&self) -> bool {
        self.end_time.is_some()
    }

    /// Session duration in milliseconds from monotonic ticks, once ended.
    pub fn duration_ms(&self) -> Option<i64> {
        self.end_ticks
            .map(|end| clock::duration_ms(self.start_ticks, end))
    }

    /// Elapsed milliseconds since session start, for active sessions.
    pub fn elapsed_ms(&self) -> i64 {
        clock::elapsed_ms(self.start_ticks)
    }

    /// Count of tasks currently in the given status.
    pub fn count_by_status(&self, status: TaskStatus) -> usize {
        self.tasks.iter().filter(|t| t.status == status).count()
    }

    /// Find a task record by ID.
    pub fn find_task(&self, task_id: &str) -> Option<&TaskRecord> {
        self.tasks.iter().find(|t| t.task_id == task_id)
    }

    /// Find a task record by ID, mutably.
    pub fn find_task_mut(&mut self, task_id: &str) -> Option<&mut TaskRecord> {
        self.tasks.iter_mut().find(|t| t.task_id == task_id)
    }
}
