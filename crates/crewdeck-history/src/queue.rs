use crate::log::ExecutionLog;
use chrono::{DateTime, Utc};
use crewdeck_core::GroupContext;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::warn;

/// Producer side of the execution log channel.
///
/// Cloned into every component that emits logs. Enqueueing never blocks:
/// when the writer falls behind and the queue is full, the entry is
/// dropped and `false` is returned.
#[derive(Debug, Clone)]
pub struct LogQueue {
    tx: mpsc::Sender<ExecutionLog>,
}

/// Consumer side, owned by the [`LogWriter`](crate::LogWriter).
#[derive(Debug)]
pub struct LogReceiver {
    rx: mpsc::Receiver<ExecutionLog>,
}

impl LogQueue {
    /// Create a queue holding at most `capacity` pending entries.
    pub fn bounded(capacity: usize) -> (LogQueue, LogReceiver) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (LogQueue { tx }, LogReceiver { rx })
    }

    /// Queue a log line for `execution_id`.
    ///
    /// `timestamp` defaults to now. The group context, when given, scopes
    /// the entry to the caller's primary group.
    pub fn enqueue(
        &self,
        execution_id: &str,
        content: impl Into<String>,
        timestamp: Option<DateTime<Utc>>,
        group: Option<&GroupContext>,
    ) -> bool {
        let mut entry = ExecutionLog::new(execution_id, content);
        if let Some(ts) = timestamp {
            entry = entry.at(ts);
        }
        if let Some(ctx) = group {
            entry = entry.with_group(ctx);
        }
        self.push(entry)
    }

    /// Queue a prepared entry. Same drop rules as [`enqueue`](Self::enqueue).
    pub fn push(&self, entry: ExecutionLog) -> bool {
        match self.tx.try_send(entry) {
            Ok(()) => true,
            Err(TrySendError::Full(entry)) => {
                warn!(execution_id = %entry.execution_id, "Log queue full, dropping entry");
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    /// Maximum number of pending entries.
    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }

    /// True once the receiving side is gone.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl LogReceiver {
    /// Wait for the next entry. `None` once every sender is gone and the queue is empty.
    pub async fn recv(&mut self) -> Option<ExecutionLog> {
        self.rx.recv().await
    }

    /// Next entry if one is already queued.
    pub fn try_recv(&mut self) -> Option<ExecutionLog> {
        self.rx.try_recv().ok()
    }

    /// Wait for at least one entry and take up to `max` of them.
    ///
    /// Returns an empty batch once every [`LogQueue`] is dropped and the
    /// channel is drained.
    pub async fn recv_batch(&mut self, max: usize) -> Vec<ExecutionLog> {
        let mut batch = Vec::with_capacity(max.max(1));
        self.rx.recv_many(&mut batch, max.max(1)).await;
        batch
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crewdeck_core::GroupRole;

    #[tokio::test]
    async fn test_enqueue_and_receive() {
        let (queue, mut rx) = LogQueue::bounded(4);
        let ctx = GroupContext::new("team-a", GroupRole::User);
        assert!(queue.enqueue("exec-1", "started", None, Some(&ctx)));

        let entry = rx.recv().await.unwrap();
        assert_eq!(entry.execution_id, "exec-1");
        assert_eq!(entry.content, "started");
        assert_eq!(entry.group_id.as_deref(), Some("team-a"));
    }

    #[tokio::test]
    async fn test_explicit_timestamp_kept() {
        let (queue, mut rx) = LogQueue::bounded(1);
        let ts = DateTime::parse_from_rfc3339("2024-05-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert!(queue.enqueue("exec-1", "x", Some(ts), None));
        assert_eq!(rx.recv().await.unwrap().timestamp, ts);
    }

    #[test]
    fn test_full_queue_returns_false() {
        let (queue, _rx) = LogQueue::bounded(2);
        assert!(queue.enqueue("e", "1", None, None));
        assert!(queue.enqueue("e", "2", None, None));
        assert!(!queue.enqueue("e", "3", None, None));
    }

    #[test]
    fn test_closed_queue_returns_false() {
        let (queue, rx) = LogQueue::bounded(2);
        drop(rx);
        assert!(queue.is_closed());
        assert!(!queue.enqueue("e", "1", None, None));
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let (queue, _rx) = LogQueue::bounded(0);
        assert_eq!(queue.capacity(), 1);
    }

    #[tokio::test]
    async fn test_recv_batch_respects_max_and_ends_on_close() {
        let (queue, mut rx) = LogQueue::bounded(8);
        for i in 0..5 {
            assert!(queue.enqueue("e", format!("line {i}"), None, None));
        }
        drop(queue);

        assert_eq!(rx.recv_batch(3).await.len(), 3);
        assert_eq!(rx.recv_batch(3).await.len(), 2);
        assert!(rx.recv_batch(3).await.is_empty());
    }
}
