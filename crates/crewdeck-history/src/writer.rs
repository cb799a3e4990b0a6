use crate::queue::LogReceiver;
use crate::sink::ExecutionLogSink;
use crewdeck_core::{CrewError, CrewResult};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Background task that drains a [`LogReceiver`] into a sink.
///
/// The task ends when every [`LogQueue`](crate::LogQueue) clone has been
/// dropped and the remaining entries are written.
pub struct LogWriter {
    handle: JoinHandle<usize>,
}

impl LogWriter {
    /// Spawn the writer on the current tokio runtime.
    pub fn spawn(
        mut receiver: LogReceiver,
        sink: Arc<dyn ExecutionLogSink>,
        batch_size: usize,
    ) -> Self {
        let handle = tokio::spawn(async move {
            let mut written = 0usize;
            loop {
                let batch = receiver.recv_batch(batch_size).await;
                if batch.is_empty() {
                    break;
                }
                match sink.write_batch(&batch).await {
                    Ok(()) => {
                        written += batch.len();
                        debug!(count = batch.len(), "Wrote execution log batch");
                    }
                    // Logs are best effort; a failed batch is dropped.
                    Err(e) => warn!(count = batch.len(), error = %e, "Failed to write execution logs"),
                }
            }
            written
        });

        Self { handle }
    }

    /// Wait for the writer to drain and return how many entries were written.
    pub async fn finish(self) -> CrewResult<usize> {
        self.handle
            .await
            .map_err(|e| CrewError::Storage(format!("log writer task failed: {e}")))
    }

    /// Stop the writer without draining. Pending entries are lost.
    pub fn abort(&self) {
        self.handle.abort();
    }
}
