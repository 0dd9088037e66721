//! Single-consumer marshaling queue.

use tokio::sync::mpsc;

type Action = Box<dyn FnOnce() + Send + 'static>;

enum Job {
    Run(Action),
    Close,
}

/// FIFO queue drained by exactly one consumer task.
///
/// Everything subscribers observe (state changes, messages, failures) is
/// delivered from this queue, regardless of which task produced it, so
/// callbacks never run concurrently with each other and never see events out
/// of enqueue order. An action may enqueue further actions; they run only
/// after the current one returns.
///
/// One queue per session, owned by the session and torn down with it.
#[derive(Clone)]
pub struct DispatchQueue {
    tx: mpsc::UnboundedSender<Job>,
}

impl DispatchQueue {
    /// Spawn the consumer loop. Must be called from within a tokio runtime.
    pub fn new() -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                match job {
                    Job::Run(action) => action(),
                    Job::Close => break,
                }
            }
        });
        Self { tx }
    }

    /// Append an action; never blocks. Actions enqueued after [`Self::close`]
    /// are dropped.
    pub fn enqueue(&self, action: impl FnOnce() + Send + 'static) {
        if self.tx.send(Job::Run(Box::new(action))).is_err() {
            tracing::debug!("dispatch queue closed, dropping action");
        }
    }

    /// Stop the consumer once the actions already queued have run.
    pub fn close(&self) {
        let _ = self.tx.send(Job::Close);
    }
}

impl Default for DispatchQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    async fn drain(queue: &DispatchQueue) {
        let (tx, rx) = tokio::sync::oneshot::channel();
        queue.enqueue(move || {
            let _ = tx.send(());
        });
        rx.await.expect("queue consumer alive");
    }

    #[tokio::test]
    async fn runs_actions_in_enqueue_order() {
        let queue = DispatchQueue::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        for i in 0..16 {
            let log = Arc::clone(&log);
            queue.enqueue(move || log.lock().expect("lock").push(i));
        }
        drain(&queue).await;

        assert_eq!(*log.lock().expect("lock"), (0..16).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn nested_actions_run_after_the_current_one() {
        let queue = DispatchQueue::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let inner_queue = queue.clone();
        let outer_log = Arc::clone(&log);
        queue.enqueue(move || {
            outer_log.lock().expect("lock").push("outer-start");
            let nested_log = Arc::clone(&outer_log);
            inner_queue.enqueue(move || nested_log.lock().expect("lock").push("nested"));
            outer_log.lock().expect("lock").push("outer-end");
        });
        drain(&queue).await;

        assert_eq!(
            *log.lock().expect("lock"),
            vec!["outer-start", "outer-end", "nested"]
        );
    }

    #[tokio::test]
    async fn close_drops_later_actions() {
        let queue = DispatchQueue::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let first_log = Arc::clone(&log);
        queue.enqueue(move || first_log.lock().expect("lock").push("before"));
        drain(&queue).await;
        queue.close();
        // Give the consumer a chance to observe the close marker.
        tokio::task::yield_now().await;

        let late_log = Arc::clone(&log);
        queue.enqueue(move || late_log.lock().expect("lock").push("after"));
        tokio::task::yield_now().await;

        assert_eq!(*log.lock().expect("lock"), vec!["before"]);
    }
}
