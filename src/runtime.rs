//! Task spawning for layer sessions: debounce timers and fetch tasks are
//! spawned on the ambient tokio runtime and held through cancellable handles.

use crate::prelude::{Duration, Future};
use tokio::task::JoinHandle;

/// Handle to a spawned task
#[derive(Debug)]
pub struct TaskHandle(JoinHandle<()>);

impl TaskHandle {
    pub fn is_finished(&self) -> bool {
        self.0.is_finished()
    }

    /// Stops the task at its next suspension point
    pub fn cancel(&self) {
        self.0.abort();
    }
}

/// Spawns `future` on the current tokio runtime
pub fn spawn<F>(future: F) -> TaskHandle
where
    F: Future<Output = ()> + Send + 'static,
{
    TaskHandle(tokio::spawn(future))
}

/// Suspends for `duration` on the runtime's timer
pub async fn async_delay(duration: Duration) {
    tokio::time::sleep(duration).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_spawned_task_finishes() {
        let handle = spawn(async {
            tokio::time::sleep(Duration::from_millis(10)).await;
        });
        assert!(!handle.is_finished());

        tokio::time::sleep(Duration::from_millis(20)).await;
        tokio::task::yield_now().await;
        assert!(handle.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_task_never_completes() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<()>();
        let handle = spawn(async move {
            async_delay(Duration::from_secs(1)).await;
            let _ = tx.send(());
        });
        handle.cancel();
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(rx.recv().await.is_none());
    }
}
