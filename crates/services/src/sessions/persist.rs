use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};

use quiz_core::model::{SessionKind, SessionSnapshot};
use storage::repository::SessionStore;

enum WriteOp {
    Save(Box<SessionSnapshot>),
    Clear,
    Flush(oneshot::Sender<()>),
}

/// Background writer for one persisted session.
///
/// Operations are queued in order and applied by a single task, so the
/// last snapshot queued is the one left in storage. Callers never wait on
/// storage; failures are logged and the in-memory session stays
/// authoritative.
#[derive(Debug, Clone)]
pub(crate) struct SnapshotWriter {
    tx: mpsc::UnboundedSender<WriteOp>,
}

impl std::fmt::Debug for WriteOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Save(_) => f.write_str("Save"),
            Self::Clear => f.write_str("Clear"),
            Self::Flush(_) => f.write_str("Flush"),
        }
    }
}

impl SnapshotWriter {
    /// Spawn the writer task on the current Tokio runtime. Returns `None`
    /// when called outside one.
    pub(crate) fn spawn(store: SessionStore, kind: SessionKind) -> Option<Self> {
        let runtime = Handle::try_current().ok()?;
        let (tx, mut rx) = mpsc::unbounded_channel::<WriteOp>();

        runtime.spawn(async move {
            while let Some(op) = rx.recv().await {
                match op {
                    WriteOp::Save(snapshot) => {
                        if let Err(err) = store.save(kind, &snapshot).await {
                            tracing::warn!(
                                error = %err,
                                kind = kind.as_str(),
                                "failed to persist session"
                            );
                        }
                    }
                    WriteOp::Clear => {
                        if let Err(err) = store.clear(kind).await {
                            tracing::warn!(
                                error = %err,
                                kind = kind.as_str(),
                                "failed to clear persisted session"
                            );
                        }
                    }
                    WriteOp::Flush(done) => {
                        let _ = done.send(());
                    }
                }
            }
            tracing::debug!(kind = kind.as_str(), "snapshot writer stopped");
        });

        Some(Self { tx })
    }

    pub(crate) fn save(&self, snapshot: SessionSnapshot) {
        self.send(WriteOp::Save(Box::new(snapshot)));
    }

    pub(crate) fn clear(&self) {
        self.send(WriteOp::Clear);
    }

    /// Wait until every operation queued before this call has been applied.
    pub(crate) async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        self.send(WriteOp::Flush(done));
        let _ = wait.await;
    }

    fn send(&self, op: WriteOp) {
        if self.tx.send(op).is_err() {
            tracing::warn!("snapshot writer is gone; dropping write");
        }
    }
}
