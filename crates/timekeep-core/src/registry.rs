//! Concurrency-safe session registry.
//!
//! Sessions are independent units: the map lock covers insert/remove/lookup
//! only, and every mutation of a single session runs under that session's
//! own mutex. Operations on different sessions proceed fully in parallel;
//! operations on the same session serialize, which is what makes
//! end-session exactly-once and start/end-task free of torn updates.

use chrono::{DateTime, Utc};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use tracing::debug;
use uuid::Uuid;

use crate::clock;
use crate::error::{Error, Result};
use crate::model::{Session, TaskRecord, TaskStatus};
use crate::retention;
use crate::timezone::TimeZoneResolver;

/// Maximum number of concurrently tracked sessions.
pub const MAX_SESSIONS: usize = 100;

/// Maximum number of started (non-not_started) tasks per session.
pub const MAX_TASKS_PER_SESSION: usize = 500;

type SharedSession = Arc<Mutex<Session>>;

/// Parameters for creating a session.
#[derive(Debug, Clone, Default)]
pub struct StartSessionRequest {
    pub milestone_id: String,
    pub task_ids: Vec<String>,
    pub milestone_name: Option<String>,
    pub timezone: Option<String>,
    pub metadata: Option<HashMap<String, String>>,
    pub tags: Option<Vec<String>>,
    pub mcp_session_id: Option<String>,
}

/// Parameters for starting a task.
#[derive(Debug, Clone, Default)]
pub struct StartTaskRequest {
    pub session_id: String,
    pub task_id: String,
    pub task_name: Option<String>,
    pub external_task_id: Option<String>,
    pub work_item_id: Option<String>,
    pub metadata: Option<HashMap<String, String>>,
}

/// Parameters for ending a task.
#[derive(Debug, Clone, Default)]
pub struct EndTaskRequest {
    pub session_id: String,
    pub task_id: String,
    /// "skipped" marks the task skipped; anything else completes it.
    pub status: Option<String>,
    pub metadata: Option<HashMap<String, String>>,
}

/// In-memory session store with retention limits.
///
/// Explicitly constructed and owned; pass it by `Arc` to whatever needs
/// it. No process-wide singleton, so tests can run registries in
/// isolation.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, SharedSession>>,
    resolver: Arc<dyn TimeZoneResolver>,
}

impl SessionRegistry {
    /// Create a registry with the given timezone resolver collaborator.
    pub fn new(resolver: Arc<dyn TimeZoneResolver>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            resolver,
        }
    }

    /// Number of tracked sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.read().map(|s| s.len()).unwrap_or(0)
    }

    /// Create a new session for a milestone with its task list.
    ///
    /// When the registry is full, one retention sweep runs inline before
    /// the request is rejected with `MAX_SESSIONS_REACHED`.
    pub fn start_session(&self, req: StartSessionRequest) -> Result<Session> {
        if self.session_count() >= MAX_SESSIONS {
            self.cleanup_expired()?;
            if self.session_count() >= MAX_SESSIONS {
                return Err(Error::MaxSessionsReached(MAX_SESSIONS));
            }
        }

        if req.milestone_id.trim().is_empty() {
            return Err(Error::MissingMilestoneId);
        }
        if req.task_ids.is_empty() {
            return Err(Error::MissingTaskIds);
        }

        let resolved = self
            .resolver
            .resolve(req.timezone.as_deref().unwrap_or("local"))?;

        // Wall clock and monotonic tick sampled together
        let now = Utc::now();
        let ticks = clock::timestamp_ticks();

        let session = Session {
            session_id: Uuid::new_v4().simple().to_string(),
            mcp_session_id: req.mcp_session_id,
            milestone_id: req.milestone_id,
            milestone_name: req.milestone_name,
            tasks: req
                .task_ids
                .iter()
                .map(|id| TaskRecord::new(id.clone()))
                .collect(),
            task_ids: req.task_ids,
            start_time: now,
            start_ticks: ticks,
            end_time: None,
            end_ticks: None,
            timezone: resolved.id,
            metadata: req.metadata,
            tags: req.tags,
            last_activity_time: now,
        };

        let mut sessions = self.sessions.write().map_err(|_| Error::LockPoisoned)?;
        // Re-check under the write lock so parallel creates cannot
        // overshoot the limit between check and insert
        if sessions.len() >= MAX_SESSIONS {
            return Err(Error::MaxSessionsReached(MAX_SESSIONS));
        }
        match sessions.entry(session.session_id.clone()) {
            Entry::Occupied(_) => Err(Error::SessionCreationFailed),
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(Mutex::new(session.clone())));
                debug!(session_id = %session.session_id, milestone_id = %session.milestone_id,
                    "Created session");
                Ok(session)
            }
        }
    }

    /// End a session. Idempotent: once ended, further calls observe the
    /// original end timestamp and never stamp a second one.
    pub fn end_session(&self, session_id: &str) -> Result<Session> {
        let shared = self.shared(session_id)?;
        let mut session = shared.lock().map_err(|_| Error::LockPoisoned)?;

        if session.is_ended() {
            return Ok(session.clone());
        }

        let now = Utc::now();
        let ticks = clock::timestamp_ticks();

        // Force-complete in-progress tasks with the session's end stamp
        for task in session.tasks.iter_mut().filter(|t| t.is_in_progress()) {
            task.end_time = Some(now);
            task.end_ticks = Some(ticks);
            task.duration_ms = task.calculate_duration_ms();
            task.status = TaskStatus::Completed;
        }

        session.end_time = Some(now);
        session.end_ticks = Some(ticks);
        session.last_activity_time = now;

        debug!(session_id = %session.session_id, "Ended session");
        Ok(session.clone())
    }

    /// Look up a session. Pure read: does not touch last-activity.
    pub fn get_session(&self, session_id: &str) -> Option<Session> {
        if session_id.trim().is_empty() {
            return None;
        }
        let shared = {
            let sessions = self.sessions.read().ok()?;
            sessions.get(session_id).cloned()?
        };
        let session = shared.lock().ok()?;
        Some(session.clone())
    }

    /// Look up a session and bump its last-activity timestamp.
    ///
    /// Summary reads count as activity so that a session being actively
    /// polled is not evicted as inactive.
    pub fn get_session_summary(&self, session_id: &str) -> Result<Session> {
        let shared = self.shared(session_id)?;
        let mut session = shared.lock().map_err(|_| Error::LockPoisoned)?;
        session.last_activity_time = Utc::now();
        Ok(session.clone())
    }

    /// Start (or restart) a task within a session.
    ///
    /// Unrecognized task IDs get an ad-hoc record appended. Starting an
    /// already-running task is a flagged no-op, not an error. Restarting
    /// a completed or skipped task is intentional and overwrites its
    /// prior timing on the next end.
    pub fn start_task(&self, req: StartTaskRequest) -> Result<TaskRecord> {
        if req.task_id.trim().is_empty() {
            return Err(Error::MissingTaskId);
        }
        let shared = self.shared(&req.session_id)?;
        let mut session = shared.lock().map_err(|_| Error::LockPoisoned)?;

        if session.is_ended() {
            return Err(Error::SessionEnded(req.session_id));
        }

        let started = session
            .tasks
            .iter()
            .filter(|t| t.status != TaskStatus::NotStarted)
            .count();
        if started >= MAX_TASKS_PER_SESSION {
            return Err(Error::MaxTasksReached(MAX_TASKS_PER_SESSION));
        }

        let now = Utc::now();
        let ticks = clock::timestamp_ticks();

        let index = match session.tasks.iter().position(|t| t.task_id == req.task_id) {
            Some(i) => i,
            None => {
                // Ad-hoc task beyond the initial set
                session.tasks.push(TaskRecord::new(req.task_id.clone()));
                session.tasks.len() - 1
            }
        };

        let task = &mut session.tasks[index];
        if task.is_in_progress() {
            task.already_running = true;
            return Ok(task.clone());
        }

        task.start_time = Some(now);
        task.start_ticks = Some(ticks);
        task.status = TaskStatus::InProgress;
        task.task_name = req.task_name;
        task.external_task_id = req.external_task_id;
        task.work_item_id = req.work_item_id;
        task.metadata = req.metadata;
        task.already_running = false;
        let record = task.clone();

        session.last_activity_time = now;
        Ok(record)
    }

    /// End an in-progress task, computing its duration from monotonic
    /// ticks and merging any supplied metadata into the existing map.
    pub fn end_task(&self, req: EndTaskRequest) -> Result<TaskRecord> {
        if req.task_id.trim().is_empty() {
            return Err(Error::MissingTaskId);
        }
        let shared = self.shared(&req.session_id)?;
        let mut session = shared.lock().map_err(|_| Error::LockPoisoned)?;

        let Some(index) = session.tasks.iter().position(|t| t.task_id == req.task_id) else {
            return Err(Error::TaskNotFound(req.task_id));
        };

        let task = &mut session.tasks[index];
        if !task.is_in_progress() {
            return Err(Error::TaskNotStarted {
                task_id: req.task_id,
                status: task.status.to_string(),
            });
        }

        let now = Utc::now();
        let ticks = clock::timestamp_ticks();

        task.end_time = Some(now);
        task.end_ticks = Some(ticks);
        task.duration_ms = task.calculate_duration_ms();
        task.status = TaskStatus::from_request(req.status.as_deref().unwrap_or("completed"));

        if let Some(metadata) = req.metadata {
            let existing = task.metadata.get_or_insert_with(HashMap::new);
            for (key, value) in metadata {
                existing.insert(key, value);
            }
        }
        let record = task.clone();

        session.last_activity_time = now;
        Ok(record)
    }

    /// Run one retention sweep against the current wall clock.
    pub fn cleanup_expired(&self) -> Result<usize> {
        self.cleanup_expired_at(Utc::now())
    }

    /// Run one retention sweep as of `now`, returning the count removed.
    ///
    /// Operates on a snapshot of entries, so insertions and mutations
    /// racing the scan are tolerated: a session mutated after its check
    /// simply waits for the next sweep.
    pub fn cleanup_expired_at(&self, now: DateTime<Utc>) -> Result<usize> {
        let snapshot: Vec<(String, SharedSession)> = {
            let sessions = self.sessions.read().map_err(|_| Error::LockPoisoned)?;
            sessions
                .iter()
                .map(|(id, shared)| (id.clone(), Arc::clone(shared)))
                .collect()
        };

        let mut expired = Vec::new();
        for (id, shared) in snapshot {
            let session = shared.lock().map_err(|_| Error::LockPoisoned)?;
            if retention::is_expired(&session, now) {
                expired.push(id);
            }
        }

        if expired.is_empty() {
            return Ok(0);
        }

        let mut sessions = self.sessions.write().map_err(|_| Error::LockPoisoned)?;
        let mut removed = 0;
        for id in expired {
            if sessions.remove(&id).is_some() {
                debug!(session_id = %id, "Evicted expired session");
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Shift a session's start and last-activity timestamps into the
    /// past, for exercising the retention rules against the real clock.
    #[cfg(test)]
    pub(crate) fn backdate_session(&self, session_id: &str, by: chrono::TimeDelta) {
        let sessions = self.sessions.read().unwrap();
        if let Some(shared) = sessions.get(session_id) {
            let mut session = shared.lock().unwrap();
            session.start_time -= by;
            session.last_activity_time -= by;
        }
    }

    fn shared(&self, session_id: &str) -> Result<SharedSession> {
        if session_id.trim().is_empty() {
            return Err(Error::MissingSessionId);
        }
        let sessions = self.sessions.read().map_err(|_| Error::LockPoisoned)?;
        sessions
            .get(session_id)
            .cloned()
            .ok_or_else(|| Error::SessionNotFound(session_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timezone::SystemTimeZoneResolver;
    use chrono::TimeDelta;
    use std::thread;
    use std::time::Duration;

    fn test_registry() -> SessionRegistry {
        SessionRegistry::new(Arc::new(SystemTimeZoneResolver::new()))
    }

    fn start_request(milestone_id: &str, task_ids: &[&str]) -> StartSessionRequest {
        StartSessionRequest {
            milestone_id: milestone_id.to_string(),
            task_ids: task_ids.iter().map(|s| s.to_string()).collect(),
            timezone: Some("UTC".to_string()),
            ..Default::default()
        }
    }

    fn create_session(registry: &SessionRegistry, task_ids: &[&str]) -> String {
        registry
            .start_session(start_request("milestone", task_ids))
            .unwrap()
            .session_id
    }

    #[test]
    fn test_start_session_initializes_tasks_in_order() {
        let registry = test_registry();
        let session = registry
            .start_session(start_request("m1", &["t1", "t2", "t3"]))
            .unwrap();

        assert_eq!(session.session_id.len(), 32);
        assert_eq!(session.tasks.len(), 3);
        let ids: Vec<&str> = session.tasks.iter().map(|t| t.task_id.as_str()).collect();
        assert_eq!(ids, vec!["t1", "t2", "t3"]);
        assert!(session
            .tasks
            .iter()
            .all(|t| t.status == TaskStatus::NotStarted));
        assert!(!session.is_ended());
        assert_eq!(registry.session_count(), 1);
    }

    #[test]
    fn test_start_session_keeps_duplicate_task_ids() {
        let registry = test_registry();
        let session = registry
            .start_session(start_request("m1", &["t1", "t1", "t2"]))
            .unwrap();
        // Duplicates are not deduplicated; each becomes its own record
        assert_eq!(session.tasks.len(), 3);
        assert_eq!(session.task_ids, vec!["t1", "t1", "t2"]);
    }

    #[test]
    fn test_start_session_validation_errors() {
        let registry = test_registry();

        let err = registry
            .start_session(start_request("", &["t1"]))
            .unwrap_err();
        assert_eq!(err.code(), "MISSING_MILESTONE_ID");

        let err = registry.start_session(start_request("m1", &[])).unwrap_err();
        assert_eq!(err.code(), "MISSING_TASK_IDS");

        assert_eq!(registry.session_count(), 0);
    }

    #[test]
    fn test_start_session_propagates_timezone_error() {
        let registry = test_registry();
        let mut req = start_request("m1", &["t1"]);
        req.timezone = Some("Invalid/Timezone".to_string());
        let err = registry.start_session(req).unwrap_err();
        assert_eq!(err.code(), "UNKNOWN_TIMEZONE");
        assert_eq!(registry.session_count(), 0);
    }

    #[test]
    fn test_start_session_stores_optional_fields() {
        let registry = test_registry();
        let mut req = start_request("m1", &["t1"]);
        req.milestone_name = Some("Milestone One".to_string());
        req.tags = Some(vec!["sprint-4".to_string()]);
        req.metadata = Some(HashMap::from([("team".to_string(), "core".to_string())]));
        req.mcp_session_id = Some("mcp-123".to_string());

        let session = registry.start_session(req).unwrap();
        assert_eq!(session.milestone_name.as_deref(), Some("Milestone One"));
        assert_eq!(session.tags.as_deref(), Some(&["sprint-4".to_string()][..]));
        assert_eq!(
            session.metadata.as_ref().unwrap().get("team"),
            Some(&"core".to_string())
        );
        assert_eq!(session.mcp_session_id.as_deref(), Some("mcp-123"));
        assert_eq!(session.timezone, "UTC");
    }

    #[test]
    fn test_end_session_computes_duration() {
        let registry = test_registry();
        let id = create_session(&registry, &["t1"]);

        thread::sleep(Duration::from_millis(50));
        let session = registry.end_session(&id).unwrap();

        assert!(session.is_ended());
        let duration = session.duration_ms().unwrap();
        assert!(duration >= 40, "duration should be at least 40ms, was {duration}ms");
    }

    #[test]
    fn test_end_session_is_idempotent() {
        let registry = test_registry();
        let id = create_session(&registry, &["t1"]);

        let first = registry.end_session(&id).unwrap();
        thread::sleep(Duration::from_millis(20));
        let second = registry.end_session(&id).unwrap();

        assert_eq!(first.end_time, second.end_time);
        assert_eq!(first.end_ticks, second.end_ticks);
        assert_eq!(first.duration_ms(), second.duration_ms());
    }

    #[test]
    fn test_end_session_errors() {
        let registry = test_registry();
        assert_eq!(registry.end_session("").unwrap_err().code(), "MISSING_SESSION_ID");
        assert_eq!(
            registry.end_session("no-such-session").unwrap_err().code(),
            "SESSION_NOT_FOUND"
        );
    }

    #[test]
    fn test_end_session_force_completes_in_progress_tasks() {
        let registry = test_registry();
        let id = create_session(&registry, &["t1", "t2"]);
        registry
            .start_task(StartTaskRequest {
                session_id: id.clone(),
                task_id: "t1".to_string(),
                ..Default::default()
            })
            .unwrap();

        let session = registry.end_session(&id).unwrap();

        let t1 = session.find_task("t1").unwrap();
        assert_eq!(t1.status, TaskStatus::Completed);
        // Forced completion uses the session's own end stamp
        assert_eq!(t1.end_ticks, session.end_ticks);
        assert_eq!(t1.end_time, session.end_time);
        assert!(t1.duration_ms.is_some());

        // Untouched tasks stay not_started
        let t2 = session.find_task("t2").unwrap();
        assert_eq!(t2.status, TaskStatus::NotStarted);
        assert!(t2.end_time.is_none());
    }

    #[test]
    fn test_concurrent_end_session_single_transition() {
        let registry = Arc::new(test_registry());
        let id = create_session(&registry, &["t1"]);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let registry = Arc::clone(&registry);
            let id = id.clone();
            handles.push(thread::spawn(move || registry.end_session(&id).unwrap()));
        }

        let results: Vec<Session> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let end_time = results[0].end_time.unwrap();
        // Every caller observes the one real transition
        assert!(results.iter().all(|s| s.end_time == Some(end_time)));
        assert!(results
            .iter()
            .all(|s| s.end_ticks == results[0].end_ticks));
    }

    #[test]
    fn test_parallel_session_creation_distinct_ids() {
        let registry = Arc::new(test_registry());

        let mut handles = Vec::new();
        for i in 0..16 {
            let registry = Arc::clone(&registry);
            handles.push(thread::spawn(move || {
                registry
                    .start_session(start_request(&format!("m{i}"), &["t1"]))
                    .unwrap()
                    .session_id
            }));
        }

        let ids: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let mut unique = ids.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), 16);
        assert_eq!(registry.session_count(), 16);
    }

    #[test]
    fn test_get_session_does_not_bump_activity() {
        let registry = test_registry();
        let id = create_session(&registry, &["t1"]);
        let before = registry.get_session(&id).unwrap().last_activity_time;

        thread::sleep(Duration::from_millis(20));
        let after = registry.get_session(&id).unwrap().last_activity_time;
        assert_eq!(before, after);

        assert!(registry.get_session("no-such-session").is_none());
        assert!(registry.get_session("").is_none());
    }

    #[test]
    fn test_get_session_summary_bumps_activity() {
        let registry = test_registry();
        let id = create_session(&registry, &["t1"]);
        let before = registry.get_session(&id).unwrap().last_activity_time;

        thread::sleep(Duration::from_millis(20));
        let summary = registry.get_session_summary(&id).unwrap();
        assert!(summary.last_activity_time > before);
        // Summary never ends the session
        assert!(!summary.is_ended());
        assert!(summary.end_time.is_none());

        assert_eq!(
            registry.get_session_summary("missing").unwrap_err().code(),
            "SESSION_NOT_FOUND"
        );
    }

    #[test]
    fn test_start_task_lifecycle() {
        let registry = test_registry();
        let id = create_session(&registry, &["t1", "t2"]);

        let task = registry
            .start_task(StartTaskRequest {
                session_id: id.clone(),
                task_id: "t1".to_string(),
                task_name: Some("First Task".to_string()),
                external_task_id: Some("EXT-1".to_string()),
                work_item_id: Some("WI-42".to_string()),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(task.status, TaskStatus::InProgress);
        assert!(!task.already_running);
        assert!(task.start_time.is_some());
        assert!(task.start_ticks.is_some());
        assert_eq!(task.task_name.as_deref(), Some("First Task"));
        assert_eq!(task.external_task_id.as_deref(), Some("EXT-1"));
        assert_eq!(task.work_item_id.as_deref(), Some("WI-42"));
    }

    #[test]
    fn test_start_task_idempotent_when_running() {
        let registry = test_registry();
        let id = create_session(&registry, &["t1"]);

        let first = registry
            .start_task(StartTaskRequest {
                session_id: id.clone(),
                task_id: "t1".to_string(),
                ..Default::default()
            })
            .unwrap();
        assert!(!first.already_running);

        let second = registry
            .start_task(StartTaskRequest {
                session_id: id.clone(),
                task_id: "t1".to_string(),
                ..Default::default()
            })
            .unwrap();
        assert!(second.already_running);
        // Start time is not reset
        assert_eq!(first.start_ticks, second.start_ticks);
        assert_eq!(first.start_time, second.start_time);
    }

    #[test]
    fn test_start_task_appends_ad_hoc_record() {
        let registry = test_registry();
        let id = create_session(&registry, &["t1"]);

        let task = registry
            .start_task(StartTaskRequest {
                session_id: id.clone(),
                task_id: "surprise-task".to_string(),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(task.status, TaskStatus::InProgress);

        let session = registry.get_session(&id).unwrap();
        assert_eq!(session.tasks.len(), 2);
        assert!(session.find_task("surprise-task").is_some());
        // The requested list is unchanged
        assert_eq!(session.task_ids, vec!["t1"]);
    }

    #[test]
    fn test_start_task_on_ended_session_fails() {
        let registry = test_registry();
        let id = create_session(&registry, &["t1"]);
        registry.end_session(&id).unwrap();

        let err = registry
            .start_task(StartTaskRequest {
                session_id: id,
                task_id: "t1".to_string(),
                ..Default::default()
            })
            .unwrap_err();
        assert_eq!(err.code(), "SESSION_ENDED");
    }

    #[test]
    fn test_start_task_validation_errors() {
        let registry = test_registry();
        let err = registry
            .start_task(StartTaskRequest {
                session_id: "".to_string(),
                task_id: "t1".to_string(),
                ..Default::default()
            })
            .unwrap_err();
        assert_eq!(err.code(), "MISSING_SESSION_ID");

        let id = create_session(&registry, &["t1"]);
        let err = registry
            .start_task(StartTaskRequest {
                session_id: id,
                task_id: "".to_string(),
                ..Default::default()
            })
            .unwrap_err();
        assert_eq!(err.code(), "MISSING_TASK_ID");
    }

    #[test]
    fn test_restart_of_completed_task_is_allowed() {
        let registry = test_registry();
        let id = create_session(&registry, &["t1"]);

        registry
            .start_task(StartTaskRequest {
                session_id: id.clone(),
                task_id: "t1".to_string(),
                ..Default::default()
            })
            .unwrap();
        registry
            .end_task(EndTaskRequest {
                session_id: id.clone(),
                task_id: "t1".to_string(),
                ..Default::default()
            })
            .unwrap();

        let restarted = registry
            .start_task(StartTaskRequest {
                session_id: id,
                task_id: "t1".to_string(),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(restarted.status, TaskStatus::InProgress);
        assert!(!restarted.already_running);
    }

    #[test]
    fn test_end_task_computes_duration() {
        let registry = test_registry();
        let id = create_session(&registry, &["t1"]);
        registry
            .start_task(StartTaskRequest {
                session_id: id.clone(),
                task_id: "t1".to_string(),
                ..Default::default()
            })
            .unwrap();

        thread::sleep(Duration::from_millis(50));
        let task = registry
            .end_task(EndTaskRequest {
                session_id: id,
                task_id: "t1".to_string(),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(task.status, TaskStatus::Completed);
        let duration = task.duration_ms.unwrap();
        assert!(duration >= 40, "duration should be at least 40ms, was {duration}ms");
        // Duration matches the tick formula exactly
        assert_eq!(
            duration,
            clock::duration_ms(task.start_ticks.unwrap(), task.end_ticks.unwrap())
        );
    }

    #[test]
    fn test_end_task_skipped_status() {
        let registry = test_registry();
        let id = create_session(&registry, &["t1", "t2"]);
        for task_id in ["t1", "t2"] {
            registry
                .start_task(StartTaskRequest {
                    session_id: id.clone(),
                    task_id: task_id.to_string(),
                    ..Default::default()
                })
                .unwrap();
        }

        let skipped = registry
            .end_task(EndTaskRequest {
                session_id: id.clone(),
                task_id: "t1".to_string(),
                status: Some("skipped".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(skipped.status, TaskStatus::Skipped);

        // Any other status string is silently normalized to completed
        let coerced = registry
            .end_task(EndTaskRequest {
                session_id: id,
                task_id: "t2".to_string(),
                status: Some("abandoned".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(coerced.status, TaskStatus::Completed);
    }

    #[test]
    fn test_end_task_errors() {
        let registry = test_registry();
        let id = create_session(&registry, &["t1"]);

        // Never registered
        let err = registry
            .end_task(EndTaskRequest {
                session_id: id.clone(),
                task_id: "ghost".to_string(),
                ..Default::default()
            })
            .unwrap_err();
        assert_eq!(err.code(), "TASK_NOT_FOUND");

        // Registered but never started
        let err = registry
            .end_task(EndTaskRequest {
                session_id: id.clone(),
                task_id: "t1".to_string(),
                ..Default::default()
            })
            .unwrap_err();
        assert_eq!(err.code(), "TASK_NOT_STARTED");

        // Double end without intervening restart
        registry
            .start_task(StartTaskRequest {
                session_id: id.clone(),
                task_id: "t1".to_string(),
                ..Default::default()
            })
            .unwrap();
        registry
            .end_task(EndTaskRequest {
                session_id: id.clone(),
                task_id: "t1".to_string(),
                ..Default::default()
            })
            .unwrap();
        let err = registry
            .end_task(EndTaskRequest {
                session_id: id,
                task_id: "t1".to_string(),
                ..Default::default()
            })
            .unwrap_err();
        assert_eq!(err.code(), "TASK_NOT_STARTED");
    }

    #[test]
    fn test_end_task_merges_metadata() {
        let registry = test_registry();
        let id = create_session(&registry, &["t1"]);
        registry
            .start_task(StartTaskRequest {
                session_id: id.clone(),
                task_id: "t1".to_string(),
                metadata: Some(HashMap::from([
                    ("reviewer".to_string(), "alex".to_string()),
                    ("branch".to_string(), "main".to_string()),
                ])),
                ..Default::default()
            })
            .unwrap();

        let task = registry
            .end_task(EndTaskRequest {
                session_id: id,
                task_id: "t1".to_string(),
                metadata: Some(HashMap::from([
                    ("branch".to_string(), "release".to_string()),
                    ("outcome".to_string(), "merged".to_string()),
                ])),
                ..Default::default()
            })
            .unwrap();

        let metadata = task.metadata.unwrap();
        // Supplied keys overwrite, unrelated keys are preserved
        assert_eq!(metadata.get("branch"), Some(&"release".to_string()));
        assert_eq!(metadata.get("reviewer"), Some(&"alex".to_string()));
        assert_eq!(metadata.get("outcome"), Some(&"merged".to_string()));
    }

    #[test]
    fn test_parallel_tasks_compute_independently() {
        let registry = test_registry();
        let id = create_session(&registry, &["fast", "slow"]);

        for task_id in ["fast", "slow"] {
            registry
                .start_task(StartTaskRequest {
                    session_id: id.clone(),
                    task_id: task_id.to_string(),
                    ..Default::default()
                })
                .unwrap();
        }

        thread::sleep(Duration::from_millis(20));
        let fast = registry
            .end_task(EndTaskRequest {
                session_id: id.clone(),
                task_id: "fast".to_string(),
                ..Default::default()
            })
            .unwrap();

        thread::sleep(Duration::from_millis(40));
        let slow = registry
            .end_task(EndTaskRequest {
                session_id: id,
                task_id: "slow".to_string(),
                ..Default::default()
            })
            .unwrap();

        assert!(slow.duration_ms.unwrap() > fast.duration_ms.unwrap());
    }

    #[test]
    fn test_max_tasks_per_session_enforced() {
        let registry = test_registry();
        let id = create_session(&registry, &["seed"]);

        for i in 0..MAX_TASKS_PER_SESSION {
            registry
                .start_task(StartTaskRequest {
                    session_id: id.clone(),
                    task_id: format!("task-{i}"),
                    ..Default::default()
                })
                .unwrap();
        }

        let err = registry
            .start_task(StartTaskRequest {
                session_id: id,
                task_id: "one-too-many".to_string(),
                ..Default::default()
            })
            .unwrap_err();
        assert_eq!(err.code(), "MAX_TASKS_REACHED");
    }

    #[test]
    fn test_max_sessions_enforced_at_100() {
        let registry = test_registry();
        for i in 0..MAX_SESSIONS {
            registry
                .start_session(start_request(&format!("m{i}"), &["t1"]))
                .unwrap();
        }
        assert_eq!(registry.session_count(), MAX_SESSIONS);

        let err = registry
            .start_session(start_request("overflow", &["t1"]))
            .unwrap_err();
        assert_eq!(err.code(), "MAX_SESSIONS_REACHED");
        assert_eq!(registry.session_count(), MAX_SESSIONS);
    }

    #[test]
    fn test_capacity_frees_after_expiry() {
        let registry = test_registry();
        let first = create_session(&registry, &["t1"]);
        for i in 1..MAX_SESSIONS {
            registry
                .start_session(start_request(&format!("m{i}"), &["t1"]))
                .unwrap();
        }

        // Backdate one session past the age limit; the opportunistic
        // sweep inside start_session then frees its slot
        registry.backdate_session(&first, TimeDelta::hours(25));

        let session = registry
            .start_session(start_request("after-expiry", &["t1"]))
            .unwrap();
        assert_eq!(registry.session_count(), MAX_SESSIONS);
        assert!(registry.get_session(&first).is_none());
        assert!(registry.get_session(&session.session_id).is_some());
    }

    #[test]
    fn test_cleanup_removes_only_expired() {
        let registry = test_registry();
        let first = create_session(&registry, &["t1"]);
        let second = create_session(&registry, &["t1"]);

        // Freshly created sessions survive a sweep with zero removals
        assert_eq!(registry.cleanup_expired().unwrap(), 0);

        // As of 25 hours out both are past the age limit
        let now = Utc::now() + TimeDelta::hours(25);
        assert_eq!(registry.cleanup_expired_at(now).unwrap(), 2);
        assert!(registry.get_session(&first).is_none());
        assert!(registry.get_session(&second).is_none());
        assert_eq!(registry.session_count(), 0);
    }

    #[test]
    fn test_cleanup_inactivity_spares_ended_sessions() {
        let registry = test_registry();
        let active = create_session(&registry, &["t1"]);
        let ended = create_session(&registry, &["t1"]);
        registry.end_session(&ended).unwrap();

        // Five hours out: the active session is past the inactivity
        // limit, the ended one is only subject to the age limit
        let now = Utc::now() + TimeDelta::hours(5);
        assert_eq!(registry.cleanup_expired_at(now).unwrap(), 1);
        assert!(registry.get_session(&active).is_none());
        assert!(registry.get_session(&ended).is_some());
    }

    #[test]
    fn test_summary_keeps_session_alive() {
        let registry = test_registry();
        let id = create_session(&registry, &["t1"]);

        // The summary read refreshes last-activity, so a sweep 3 hours
        // out spares the session while 5 hours out evicts it
        registry.get_session_summary(&id).unwrap();
        assert_eq!(
            registry
                .cleanup_expired_at(Utc::now() + TimeDelta::hours(3))
                .unwrap(),
            0
        );
        assert_eq!(
            registry
                .cleanup_expired_at(Utc::now() + TimeDelta::hours(5))
                .unwrap(),
            1
        );
    }
}
