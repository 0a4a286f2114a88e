use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::{DirProbeError, Result};
use crate::session::ScanResult;

/// Consumer of qualifying scan results. `emit` may block (backpressure) and
/// must be safe for concurrent push from multiple workers; an error means the
/// sink permanently refuses emission and the session fails fatally.
#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn emit(&self, result: ScanResult) -> Result<()>;
}

/// Bounded channel sender as a sink: a full channel suspends the producing
/// worker, a closed channel is the unrecoverable sink fault.
#[async_trait]
impl ResultSink for mpsc::Sender<ScanResult> {
    async fn emit(&self, result: ScanResult) -> Result<()> {
        self.send(result).await.map_err(|_| DirProbeError::SinkClosed)
    }
}
