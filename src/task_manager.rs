//! Task management for the controller's periodic activities.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use log::{debug, error, info, warn};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// How long [`TaskManager::shutdown_all`] waits for each task.
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Manages named background tasks with cancellation and shutdown.
///
/// Every task gets a child of `global_token`, so it can be cancelled on
/// its own or together with all the others.
pub struct TaskManager {
    tasks: HashMap<&'static str, TaskInfo>,
    pub global_token: CancellationToken,
}

impl TaskManager {
    /// Creates a new TaskManager.
    pub fn new() -> Self {
        Self {
            tasks: HashMap::new(),
            global_token: CancellationToken::new(),
        }
    }

    /// Spawns and registers a task under `name`.
    ///
    /// A task already registered under the same name is cancelled first.
    pub fn spawn_task<F, Fut>(&mut self, name: &'static str, task_fn: F)
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = Result<()>> + Send + 'static,
    {
        self.cancel(name);

        let task_token = self.global_token.child_token();
        let task_token_clone = task_token.clone();

        let handle = tokio::spawn(async move {
            debug!("Starting task: {}", name);
            match task_fn(task_token_clone).await {
                Ok(()) => {
                    debug!("Task '{}' completed", name);
                    Ok(())
                }
                Err(e) => {
                    error!("Task '{}' failed: {}", name, e);
                    Err(e)
                }
            }
        });

        self.tasks.insert(
            name,
            TaskInfo {
                handle,
                cancel_token: task_token,
            },
        );
    }

    /// Cancels the task registered under `name` without waiting for it.
    ///
    /// Returns `false` when no such task is running; that is not an error.
    pub fn cancel(&mut self, name: &str) -> bool {
        match self.tasks.remove(name) {
            Some(info) => {
                info.cancel_token.cancel();
                debug!("Task '{}' cancelled", name);
                true
            }
            None => false,
        }
    }

    /// Checks if a task with the given name is currently registered.
    pub fn is_running(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    /// Returns the count of registered tasks.
    pub fn active_count(&self) -> usize {
        self.tasks.len()
    }

    /// Cancels all registered tasks and waits for them to finish.
    ///
    /// Each task gets [`SHUTDOWN_TIMEOUT`] to exit. Every task is awaited
    /// even when an earlier one fails; the first failure is returned.
    pub async fn shutdown_all(&mut self) -> Result<()> {
        info!("Stopping all {} tasks", self.tasks.len());
        self.global_token.cancel();

        let mut first_error = None;
        for (name, info) in self.tasks.drain() {
            let outcome = match tokio::time::timeout(SHUTDOWN_TIMEOUT, info.handle).await {
                Ok(Ok(result)) => result,
                Ok(Err(join_error)) => Err(anyhow!("panicked: {join_error}")),
                Err(_) => Err(anyhow!("did not stop within {SHUTDOWN_TIMEOUT:?}")),
            };

            if let Err(e) = outcome {
                warn!("Task '{name}' {e}");
                first_error.get_or_insert(e.context(format!("Task '{name}' failed")));
            }
        }

        match first_error {
            Some(error) => Err(error).context("One or more tasks failed during shutdown"),
            None => {
                info!("All tasks stopped");
                Ok(())
            }
        }
    }
}

impl Default for TaskManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TaskManager {
    fn drop(&mut self) {
        self.global_token.cancel();
    }
}

struct TaskInfo {
    handle: JoinHandle<Result<()>>,
    cancel_token: CancellationToken,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::time::sleep;

    async fn count_until_cancelled(token: CancellationToken, counter: Arc<AtomicUsize>) -> Result<()> {
        loop {
            tokio::select! {
                () = token.cancelled() => break,
                () = sleep(Duration::from_millis(100)) => {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            }
        }
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_only_the_named_task() {
        let mut manager = TaskManager::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let counter = first.clone();
        manager.spawn_task("first", move |token| count_until_cancelled(token, counter));
        let counter = second.clone();
        manager.spawn_task("second", move |token| count_until_cancelled(token, counter));
        sleep(Duration::from_millis(250)).await;

        assert!(manager.cancel("first"));
        let frozen = first.load(Ordering::SeqCst);
        sleep(Duration::from_millis(500)).await;

        assert_eq!(first.load(Ordering::SeqCst), frozen);
        assert!(second.load(Ordering::SeqCst) > frozen);
        assert!(!manager.is_running("first"));
        assert!(manager.is_running("second"));

        manager.shutdown_all().await.unwrap();
    }

    #[tokio::test]
    async fn cancel_is_idempotent() {
        let mut manager = TaskManager::new();
        assert!(!manager.cancel("never-started"));

        manager.spawn_task("task", |token| async move {
            token.cancelled().await;
            Ok(())
        });
        assert!(manager.cancel("task"));
        assert!(!manager.cancel("task"));
        assert_eq!(manager.active_count(), 0);
    }

    #[tokio::test]
    async fn respawn_replaces_previous_task() {
        let mut manager = TaskManager::new();
        let first_cancelled = Arc::new(AtomicBool::new(false));

        let flag = first_cancelled.clone();
        manager.spawn_task("render", move |token| async move {
            token.cancelled().await;
            flag.store(true, Ordering::SeqCst);
            Ok(())
        });
        manager.spawn_task("render", |token| async move {
            token.cancelled().await;
            Ok(())
        });
        sleep(Duration::from_millis(10)).await;

        assert!(first_cancelled.load(Ordering::SeqCst));
        assert_eq!(manager.active_count(), 1);
        manager.shutdown_all().await.unwrap();
    }

    #[tokio::test]
    async fn shutdown_reports_task_errors() {
        let mut manager = TaskManager::new();
        manager.spawn_task("failing", |_token| async { Err(anyhow::anyhow!("boom")) });

        let result = manager.shutdown_all().await;
        assert!(result.is_err());
        assert_eq!(manager.active_count(), 0);
    }
}
