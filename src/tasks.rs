//! Background ingestion tasks.
//!
//! [`TaskRunner::submit`] hands a query to a fresh tokio task and returns a
//! handle immediately; [`TaskRunner::status`] polls the recorded state.
//! Concurrent submissions for the same query are not deduplicated.
//! Only the most recent `retention` finished tasks are remembered; pending
//! and running tasks are never evicted.
//!
//! ```text
//! Pending ──▶ Running ──▶ Finished { succeeded, report }
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::ingest::Ingestor;

/// Opaque identifier of a submitted ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TaskHandle(Uuid);

impl TaskHandle {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TaskHandle {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TaskState {
    Pending,
    Running,
    Finished { succeeded: bool, report: String },
}

impl TaskState {
    pub fn is_finished(&self) -> bool {
        matches!(self, TaskState::Finished { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskStatus {
    pub task_id: TaskHandle,
    pub query: String,
    pub submitted_at: DateTime<Utc>,
    #[serde(flatten)]
    pub state: TaskState,
}

#[derive(Default)]
struct TaskTable {
    tasks: HashMap<TaskHandle, TaskStatus>,
    /// Finished handles, oldest first.
    finished: VecDeque<TaskHandle>,
}

impl TaskTable {
    fn set_state(&mut self, handle: TaskHandle, state: TaskState) {
        if let Some(task) = self.tasks.get_mut(&handle) {
            task.state = state;
        }
    }

    fn finish(&mut self, handle: TaskHandle, state: TaskState, retention: usize) {
        self.set_state(handle, state);
        self.finished.push_back(handle);
        while self.finished.len() > retention {
            if let Some(evicted) = self.finished.pop_front() {
                self.tasks.remove(&evicted);
                tracing::debug!(task_id = %evicted, "evicted finished task");
            }
        }
    }
}

/// Spawns ingestions and remembers the outcome of the most recent ones.
#[derive(Clone)]
pub struct TaskRunner {
    ingestor: Arc<Ingestor>,
    tasks: Arc<RwLock<TaskTable>>,
    retention: usize,
}

impl TaskRunner {
    /// `retention` is the number of finished tasks kept for polling.
    pub fn new(ingestor: Arc<Ingestor>, retention: usize) -> Self {
        Self {
            ingestor,
            tasks: Arc::new(RwLock::new(TaskTable::default())),
            retention: retention.max(1),
        }
    }

    pub fn ingestor(&self) -> &Arc<Ingestor> {
        &self.ingestor
    }

    /// Start ingesting `query` in the background.
    pub async fn submit(&self, query: impl Into<String>) -> TaskHandle {
        let query = query.into();
        let handle = TaskHandle::new();
        self.tasks.write().await.tasks.insert(
            handle,
            TaskStatus {
                task_id: handle,
                query: query.clone(),
                submitted_at: Utc::now(),
                state: TaskState::Pending,
            },
        );
        tracing::info!(task_id = %handle, query = %query, "ingestion submitted");

        let ingestor = self.ingestor.clone();
        let tasks = self.tasks.clone();
        let retention = self.retention;
        tokio::spawn(async move {
            tasks.write().await.set_state(handle, TaskState::Running);
            let outcome = ingestor.run(&query).await;
            let succeeded = outcome.is_success();
            let report = outcome.to_string();
            if succeeded {
                tracing::info!(task_id = %handle, %report, "ingestion finished");
            } else {
                tracing::error!(task_id = %handle, %report, "ingestion failed");
            }
            tasks.write().await.finish(
                handle,
                TaskState::Finished { succeeded, report },
                retention,
            );
        });

        handle
    }

    pub async fn status(&self, handle: TaskHandle) -> Option<TaskStatus> {
        self.tasks.read().await.tasks.get(&handle).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::Clock;
    use crate::fetch::{ProductSearch, Throttle};
    use crate::ingest::IngestSettings;
    use crate::store::{InMemoryStore, ProductStore};
    use crate::test_support::{product_json, ManualClock, ScriptedSearch};
    use std::time::Duration;

    fn runner(search: ScriptedSearch, store: Arc<InMemoryStore>) -> TaskRunner {
        runner_keeping(search, store, 100)
    }

    fn runner_keeping(
        search: ScriptedSearch,
        store: Arc<InMemoryStore>,
        retention: usize,
    ) -> TaskRunner {
        let settings = IngestSettings {
            max_pages: 5,
            throttle: Throttle {
                min: Duration::ZERO,
                max: Duration::ZERO,
            },
            batch_size: 50,
            user_agents: vec!["ua".to_string()],
        };
        let search: Arc<dyn ProductSearch> = Arc::new(search);
        let store: Arc<dyn ProductStore> = store;
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::default());
        TaskRunner::new(
            Arc::new(Ingestor::new(search, store, clock, settings)),
            retention,
        )
    }

    async fn wait(runner: &TaskRunner, handle: TaskHandle) -> Option<TaskStatus> {
        for _ in 0..400 {
            let status = runner.status(handle).await?;
            if status.state.is_finished() {
                return Some(status);
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("task {} did not finish", handle);
    }

    #[tokio::test]
    async fn submitted_task_reports_counts() {
        let store = Arc::new(InMemoryStore::new());
        let runner = runner(
            ScriptedSearch::with_pages(vec![vec![
                product_json(1, 100, None),
                product_json(2, 200, None),
            ]]),
            store.clone(),
        );

        let handle = runner.submit("телефоны").await;
        let status = wait(&runner, handle).await.unwrap();

        assert_eq!(status.query, "телефоны");
        assert_eq!(
            status.state,
            TaskState::Finished {
                succeeded: true,
                report: "Processed: 2 | New: 2 | Updated: 0".to_string(),
            }
        );
        assert_eq!(store.products().len(), 2);
    }

    #[tokio::test]
    async fn failed_task_records_report() {
        let store = Arc::new(InMemoryStore::new());
        store.fail_writes(true);
        let runner = runner(
            ScriptedSearch::with_pages(vec![vec![product_json(1, 100, None)]]),
            store,
        );

        let handle = runner.submit("q").await;
        let status = wait(&runner, handle).await.unwrap();
        match status.state {
            TaskState::Finished { succeeded, report } => {
                assert!(!succeeded);
                assert!(report.starts_with("Ingestion failed:"));
            }
            other => panic!("unexpected state {:?}", other),
        }
    }

    #[tokio::test]
    async fn unknown_handle_has_no_status() {
        let runner = runner(ScriptedSearch::with_pages(vec![]), Arc::new(InMemoryStore::new()));
        let handle: TaskHandle = "6f9619ff-8b86-d011-b42d-00cf4fc964ff".parse().unwrap();
        assert!(runner.status(handle).await.is_none());
        assert!(wait(&runner, handle).await.is_none());
    }

    #[tokio::test]
    async fn oldest_finished_tasks_are_evicted() {
        let runner = runner_keeping(
            ScriptedSearch::with_pages(vec![vec![product_json(1, 100, None)]]),
            Arc::new(InMemoryStore::new()),
            2,
        );

        let mut handles = Vec::new();
        for query in ["a", "b", "c"] {
            let handle = runner.submit(query).await;
            wait(&runner, handle).await.unwrap();
            handles.push(handle);
        }

        assert!(runner.status(handles[0]).await.is_none());
        assert_eq!(runner.status(handles[1]).await.unwrap().query, "b");
        assert_eq!(runner.status(handles[2]).await.unwrap().query, "c");
    }

    #[test]
    fn status_serializes_flat() {
        let status = TaskStatus {
            task_id: "6f9619ff-8b86-d011-b42d-00cf4fc964ff".parse().unwrap(),
            query: "q".to_string(),
            submitted_at: Utc::now(),
            state: TaskState::Finished {
                succeeded: true,
                report: "Processed: 0 | New: 0 | Updated: 0".to_string(),
            },
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["state"], "finished");
        assert_eq!(json["succeeded"], true);
        assert_eq!(json["task_id"], "6f9619ff-8b86-d011-b42d-00cf4fc964ff");
    }
}
