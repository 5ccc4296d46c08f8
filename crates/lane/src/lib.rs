//! Lane Queue: guarantees at most one tool call executes at a time for any
//! given session, in the order the ReAct loop submitted them.
//!
//! Each session gets its own lane — a single worker task draining an
//! unbounded FIFO channel. A call queued behind another waits; it never
//! races it. A call still sitting in the queue when its session's
//! cancellation token fires is dropped without ever running and reported
//! back as a cancelled result — only the call already in flight has to
//! cooperate with cancellation itself (the Sandbox Executor does this via
//! the same token).
//!
//! Lane state lives in memory only. A process restart loses any call that
//! was queued or in flight; the caller is expected to surface that as an
//! error event rather than silently resuming, since there is nothing here
//! to resume from.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use sa_domain::cancel::CancelToken;
use sa_domain::tool::ToolResultEnvelope;

type BoxedCall = Pin<Box<dyn Future<Output = ToolResultEnvelope> + Send>>;

struct QueuedCall {
    call_id: String,
    cancel: CancelToken,
    task: BoxedCall,
    reply: oneshot::Sender<ToolResultEnvelope>,
}

/// Handle to one session's FIFO worker.
#[derive(Clone)]
struct Lane {
    sender: mpsc::UnboundedSender<QueuedCall>,
}

/// Registry of per-session lanes, created lazily on first submission.
pub struct LaneQueue {
    lanes: Mutex<HashMap<String, Lane>>,
}

impl Default for LaneQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl LaneQueue {
    pub fn new() -> Self {
        Self {
            lanes: Mutex::new(HashMap::new()),
        }
    }

    /// Submit a tool call future for serialized execution on `session_id`'s
    /// lane. Returns the envelope once the call has run (or been dropped
    /// as cancelled while still queued).
    pub async fn submit(
        &self,
        session_id: &str,
        call_id: impl Into<String>,
        cancel: CancelToken,
        task: impl Future<Output = ToolResultEnvelope> + Send + 'static,
    ) -> ToolResultEnvelope {
        let (reply_tx, reply_rx) = oneshot::channel();
        let lane = self.lane_for(session_id);

        let queued = QueuedCall {
            call_id: call_id.into(),
            cancel,
            task: Box::pin(task),
            reply: reply_tx,
        };

        if lane.sender.send(queued).is_err() {
            return ToolResultEnvelope::error("lane worker is gone", "internal");
        }

        reply_rx
            .await
            .unwrap_or_else(|_| ToolResultEnvelope::error("lane dropped the reply channel", "internal"))
    }

    /// Drop the lane for a session, e.g. once that session is deleted.
    /// Any call still queued on it is simply abandoned — its sender side
    /// was already consumed by `submit`, so this only affects future
    /// submissions, which will spin up a fresh lane.
    pub fn remove(&self, session_id: &str) {
        self.lanes.lock().remove(session_id);
    }

    fn lane_for(&self, session_id: &str) -> Lane {
        let mut lanes = self.lanes.lock();
        if let Some(lane) = lanes.get(session_id) {
            return lane.clone();
        }
        let lane = spawn_worker(session_id.to_string());
        lanes.insert(session_id.to_string(), lane.clone());
        lane
    }
}

fn spawn_worker(session_id: String) -> Lane {
    let (tx, mut rx) = mpsc::unbounded_channel::<QueuedCall>();

    tokio::spawn(async move {
        while let Some(call) = rx.recv().await {
            let result = if call.cancel.is_cancelled() {
                debug!(session_id, call_id = %call.call_id, "dropping queued tool call, session cancelled");
                ToolResultEnvelope::cancelled()
            } else {
                call.task.await
            };
            let _ = call.reply.send(result);
        }
    });

    Lane { sender: tx }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn calls_on_the_same_lane_run_strictly_in_order() {
        let queue = Arc::new(LaneQueue::new());
        let order = Arc::new(Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for i in 0..5 {
            let queue = queue.clone();
            let order = order.clone();
            handles.push(tokio::spawn(async move {
                queue
                    .submit("s1", format!("c{i}"), CancelToken::new(), async move {
                        // later submissions would finish first if run concurrently
                        tokio::time::sleep(Duration::from_millis(5)).await;
                        order.lock().push(i);
                        ToolResultEnvelope::ok("done", serde_json::json!(i))
                    })
                    .await
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        assert_eq!(*order.lock(), vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn queued_call_is_dropped_as_cancelled_without_running() {
        let queue = LaneQueue::new();
        let cancel = CancelToken::new();
        let ran = Arc::new(AtomicU32::new(0));

        cancel.cancel();
        let ran2 = ran.clone();
        let env = queue
            .submit("s1", "c1", cancel, async move {
                ran2.fetch_add(1, Ordering::SeqCst);
                ToolResultEnvelope::ok("done", serde_json::Value::Null)
            })
            .await;

        assert!(!env.success);
        assert_eq!(env.metadata["error_kind"], "cancelled");
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn different_sessions_get_independent_lanes() {
        let queue = Arc::new(LaneQueue::new());

        let a = queue.submit("a", "c1", CancelToken::new(), async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            ToolResultEnvelope::ok("a", serde_json::Value::Null)
        });
        let b = queue.submit("b", "c1", CancelToken::new(), async {
            ToolResultEnvelope::ok("b", serde_json::Value::Null)
        });

        let (ra, rb) = tokio::join!(a, b);
        assert!(ra.success && rb.success);
    }
}
