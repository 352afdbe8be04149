//! Remote worker for background store operations.
//!
//! Runs on a dedicated thread so remote round-trips never block the
//! coordination context. Receives RemoteOp messages, sends outcomes back.
//! Blocking ops carry their own respond channel; fire-and-forget ops report
//! on the shared outcome channel.

use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam::channel::{unbounded, Receiver, Sender};
use tracing::{debug, warn};

use crate::core::{RemoteRef, Timestamp, WorldName};
use crate::store::{RemoteError, RemoteMapStore};

/// Operations sent from the coordination context to the remote thread.
pub enum RemoteOp {
    /// Upload an artifact (blocking - the save path waits for the result).
    Upload {
        name: WorldName,
        bytes: Vec<u8>,
        last_modified: Timestamp,
        respond: Sender<Result<RemoteRef, RemoteError>>,
    },

    /// Delete a remote record (non-blocking - outcome on the result channel).
    /// Failure leaves eventually-consistent garbage that a later listing may
    /// rediscover; the local delete is never undone.
    Delete { name: WorldName },

    /// Shutdown the remote thread.
    Shutdown,
}

/// Result of a non-blocking operation.
#[derive(Debug)]
pub enum RemoteOutcome {
    Deleted(WorldName, Result<(), RemoteError>),
}

/// Handle to the remote worker thread.
pub struct WorkerHandle {
    op_tx: Sender<RemoteOp>,
    outcome_rx: Receiver<RemoteOutcome>,
    thread: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    pub fn sender(&self) -> Sender<RemoteOp> {
        self.op_tx.clone()
    }

    pub fn outcomes(&self) -> &Receiver<RemoteOutcome> {
        &self.outcome_rx
    }

    /// Stop the worker after draining already-queued ops.
    pub fn shutdown(mut self) {
        let _ = self.op_tx.send(RemoteOp::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        let _ = self.op_tx.send(RemoteOp::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Spawn the remote worker thread.
pub fn spawn(remote: Arc<dyn RemoteMapStore>) -> WorkerHandle {
    let (op_tx, op_rx) = unbounded::<RemoteOp>();
    let (outcome_tx, outcome_rx) = unbounded::<RemoteOutcome>();

    let thread = std::thread::Builder::new()
        .name("waymark-remote".to_string())
        .spawn(move || run_loop(remote, op_rx, outcome_tx))
        .expect("spawn remote worker thread");

    WorkerHandle {
        op_tx,
        outcome_rx,
        thread: Some(thread),
    }
}

fn run_loop(
    remote: Arc<dyn RemoteMapStore>,
    op_rx: Receiver<RemoteOp>,
    outcome_tx: Sender<RemoteOutcome>,
) {
    while let Ok(op) = op_rx.recv() {
        match op {
            RemoteOp::Upload {
                name,
                bytes,
                last_modified,
                respond,
            } => {
                debug!(world = %name, bytes = bytes.len(), "uploading artifact");
                let result = remote.upload(&name, &bytes, last_modified);
                if let Err(err) = &result {
                    warn!(world = %name, error = %err, "artifact upload failed");
                }
                let _ = respond.send(result);
            }
            RemoteOp::Delete { name } => {
                let result = remote.delete(&name);
                if let Err(err) = &result {
                    warn!(world = %name, error = %err, "remote delete failed, record left behind");
                }
                let _ = outcome_tx.send(RemoteOutcome::Deleted(name, result));
            }
            RemoteOp::Shutdown => break,
        }
    }
}
