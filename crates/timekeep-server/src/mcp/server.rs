//! MCP server implementation.
//!
//! Thin adapter over the core registry: each tool parses its input,
//! delegates to one registry operation, and marshals the result (or a
//! structured error) back as JSON text.

use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{ServerCapabilities, ServerInfo},
    schemars::{self, JsonSchema},
    tool, tool_handler, tool_router, ServerHandler,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use timekeep_core::registry::{EndTaskRequest, StartSessionRequest, StartTaskRequest};
use timekeep_core::{format, Session, TaskStatus};
use tracing::debug;

use crate::mcp::tools::{error_json, error_json_raw, friendly_time, parse_task_ids};
use crate::state::AppState;

/// Timekeep MCP Server
///
/// Provides time tracking tools for AI assistant integration.
#[derive(Clone)]
pub struct TimekeepServer {
    state: Arc<AppState>,
    tool_router: ToolRouter<Self>,
}

impl TimekeepServer {
    pub fn new(state: Arc<AppState>) -> Self {
        Self {
            state,
            tool_router: Self::tool_router(),
        }
    }
}

/// Parameters for time_get_current tool
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
struct GetCurrentTimeParams {
    /// Output format: iso8601, unix, unix_ms, or friendly
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<String>,
    /// Timezone: 'local', 'UTC', or an IANA name (e.g. 'America/New_York')
    #[serde(skip_serializing_if = "Option::is_none")]
    timezone: Option<String>,
}

/// Parameters for time_session_start tool
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
struct SessionStartParams {
    /// Milestone identifier being tracked
    milestone_id: String,
    /// Task IDs as a comma-separated list or a JSON array string
    task_ids: String,
    /// Optional human-readable milestone name
    #[serde(skip_serializing_if = "Option::is_none")]
    milestone_name: Option<String>,
    /// Timezone for the session ('local', 'UTC', or IANA name)
    #[serde(skip_serializing_if = "Option::is_none")]
    timezone: Option<String>,
    /// Optional metadata key-value pairs
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<HashMap<String, String>>,
    /// Optional tags for categorization
    #[serde(skip_serializing_if = "Option::is_none")]
    tags: Option<Vec<String>>,
}

/// Parameters for time_session_end and time_session_summary tools
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
struct SessionIdParams {
    /// The session ID
    session_id: String,
}

/// Parameters for time_task_start tool
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
struct TaskStartParams {
    /// The session ID
    session_id: String,
    /// Task identifier to start
    task_id: String,
    /// Optional human-readable task name
    #[serde(skip_serializing_if = "Option::is_none")]
    task_name: Option<String>,
    /// Optional external task ID (e.g., from a project management tool)
    #[serde(skip_serializing_if = "Option::is_none")]
    external_task_id: Option<String>,
    /// Optional work item ID (e.g., Azure DevOps, Jira)
    #[serde(skip_serializing_if = "Option::is_none")]
    work_item_id: Option<String>,
    /// Optional metadata key-value pairs
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<HashMap<String, String>>,
}

/// Parameters for time_task_end tool
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
struct TaskEndParams {
    /// The session ID
    session_id: String,
    /// Task identifier to end
    task_id: String,
    /// Final status: 'completed' (default) or 'skipped'
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<String>,
    /// Optional metadata merged into the task's existing metadata
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<HashMap<String, String>>,
}

/// Per-status task counts for summary payloads.
fn task_counts(session: &Session) -> (usize, usize, usize, usize) {
    (
        session.count_by_status(TaskStatus::Completed),
        session.count_by_status(TaskStatus::Skipped),
        session.count_by_status(TaskStatus::InProgress),
        session.count_by_status(TaskStatus::NotStarted),
    )
}

#[tool_router]
impl TimekeepServer {
    /// Get the current time in a chosen format and timezone
    #[tool(
        description = "Get the current time. Formats: iso8601, unix, unix_ms, friendly. Timezone: 'local', 'UTC', or an IANA name."
    )]
    fn time_get_current(&self, Parameters(params): Parameters<GetCurrentTimeParams>) -> String {
        let resolved = match self
            .state
            .resolver
            .resolve(params.timezone.as_deref().unwrap_or("local"))
        {
            Ok(tz) => tz,
            Err(e) => return error_json(&e),
        };

        let now = resolved.now();
        let format = params.format.as_deref().unwrap_or("iso8601");
        let timestamp = match format {
            "iso8601" => now.to_rfc3339(),
            "unix" => now.timestamp().to_string(),
            "unix_ms" => now.timestamp_millis().to_string(),
            "friendly" => friendly_time(&now),
            other => {
                return error_json_raw(
                    "UNKNOWN_FORMAT",
                    &format!(
                        "Unknown format: '{other}'. Use one of: iso8601, unix, unix_ms, friendly."
                    ),
                );
            }
        };

        serde_json::json!({
            "timestamp": timestamp,
            "timezone": resolved.id,
            "utc_offset": resolved.offset_string(),
        })
        .to_string()
    }

    /// Start a time tracking session for a milestone
    #[tool(
        description = "Start a time tracking session for a milestone with its task list. Returns the session ID."
    )]
    fn time_session_start(&self, Parameters(params): Parameters<SessionStartParams>) -> String {
        let request = StartSessionRequest {
            milestone_id: params.milestone_id,
            task_ids: parse_task_ids(&params.task_ids),
            milestone_name: params.milestone_name,
            timezone: params.timezone,
            metadata: params.metadata,
            tags: params.tags,
            mcp_session_id: None,
        };

        let session = match self.state.registry.start_session(request) {
            Ok(s) => s,
            Err(e) => return error_json(&e),
        };

        debug!(session_id = %session.session_id, "time_session_start");
        serde_json::json!({
            "session_id": session.session_id,
            "milestone_id": session.milestone_id,
            "milestone_name": session.milestone_name,
            "task_count": session.tasks.len(),
            "start_time": session.start_time,
            "timezone": session.timezone,
        })
        .to_string()
    }

    /// End a time tracking session
    #[tool(
        description = "End a time tracking session. Idempotent; in-progress tasks are completed with the session."
    )]
    fn time_session_end(&self, Parameters(params): Parameters<SessionIdParams>) -> String {
        let session = match self.state.registry.end_session(&params.session_id) {
            Ok(s) => s,
            Err(e) => return error_json(&e),
        };

        let (completed, skipped, _, _) = task_counts(&session);
        let duration_ms = session.duration_ms().unwrap_or(0);
        serde_json::json!({
            "session_id": session.session_id,
            "is_ended": session.is_ended(),
            "end_time": session.end_time,
            "duration_ms": duration_ms,
            "duration": format::format(duration_ms),
            "task_count": session.tasks.len(),
            "tasks_completed": completed,
            "tasks_skipped": skipped,
        })
        .to_string()
    }

    /// Get a session summary with task counts and elapsed time
    #[tool(
        description = "Get a summary of a session: status, elapsed time, and per-status task counts. Counts as session activity."
    )]
    fn time_session_summary(&self, Parameters(params): Parameters<SessionIdParams>) -> String {
        let session = match self.state.registry.get_session_summary(&params.session_id) {
            Ok(s) => s,
            Err(e) => return error_json(&e),
        };

        let (completed, skipped, in_progress, not_started) = task_counts(&session);
        // Elapsed-so-far for active sessions, final duration once ended
        let duration_ms = session.duration_ms().unwrap_or_else(|| session.elapsed_ms());
        serde_json::json!({
            "session_id": session.session_id,
            "milestone_id": session.milestone_id,
            "milestone_name": session.milestone_name,
            "is_ended": session.is_ended(),
            "start_time": session.start_time,
            "end_time": session.end_time,
            "duration_ms": duration_ms,
            "duration": format::format(duration_ms),
            "timezone": session.timezone,
            "task_count": session.tasks.len(),
            "tasks_completed": completed,
            "tasks_skipped": skipped,
            "tasks_in_progress": in_progress,
            "tasks_not_started": not_started,
            "tasks_remaining": in_progress + not_started,
        })
        .to_string()
    }

    /// Start a task within a session
    #[tool(
        description = "Start timing a task within a session. Starting an already-running task is a flagged no-op."
    )]
    fn time_task_start(&self, Parameters(params): Parameters<TaskStartParams>) -> String {
        let session_id = params.session_id.clone();
        let request = StartTaskRequest {
            session_id: params.session_id,
            task_id: params.task_id,
            task_name: params.task_name,
            external_task_id: params.external_task_id,
            work_item_id: params.work_item_id,
            metadata: params.metadata,
        };

        let task = match self.state.registry.start_task(request) {
            Ok(t) => t,
            Err(e) => return error_json(&e),
        };

        let Some(session) = self.state.registry.get_session(&session_id) else {
            return error_json(&timekeep_core::Error::SessionNotFound(session_id));
        };
        let (completed, skipped, in_progress, not_started) = task_counts(&session);
        let start_time_friendly = task
            .start_time
            .as_ref()
            .map(|t| match self.state.resolver.resolve(&session.timezone) {
                Ok(tz) => friendly_time(&t.with_timezone(&tz.tz)),
                Err(_) => friendly_time(t),
            });

        serde_json::json!({
            "session_id": session.session_id,
            "task_id": task.task_id,
            "task_name": task.task_name,
            "status": task.status,
            "already_running": task.already_running,
            "start_time": task.start_time,
            "start_time_friendly": start_time_friendly,
            "session_elapsed_ms": session.elapsed_ms(),
            "tasks_completed": completed + skipped,
            "tasks_remaining": in_progress + not_started,
        })
        .to_string()
    }

    /// End a task within a session
    #[tool(
        description = "Stop timing a task. Status 'skipped' marks it skipped; anything else completes it."
    )]
    fn time_task_end(&self, Parameters(params): Parameters<TaskEndParams>) -> String {
        let session_id = params.session_id.clone();
        let request = EndTaskRequest {
            session_id: params.session_id,
            task_id: params.task_id,
            status: params.status,
            metadata: params.metadata,
        };

        let task = match self.state.registry.end_task(request) {
            Ok(t) => t,
            Err(e) => return error_json(&e),
        };

        let Some(session) = self.state.registry.get_session(&session_id) else {
            return error_json(&timekeep_core::Error::SessionNotFound(session_id));
        };
        let (completed, skipped, in_progress, not_started) = task_counts(&session);
        let duration_ms = task.duration_ms.unwrap_or(0);

        serde_json::json!({
            "session_id": session.session_id,
            "task_id": task.task_id,
            "status": task.status,
            "duration_ms": duration_ms,
            "duration": format::format(duration_ms),
            "end_time": task.end_time,
            "tasks_completed": completed + skipped,
            "tasks_remaining": in_progress + not_started,
        })
        .to_string()
    }
}

#[tool_handler]
impl ServerHandler for TimekeepServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Timekeep MCP Server - Track wall-clock-accurate durations for milestone sessions and their tasks."
                    .to_string(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}
