//! Per-source serialization of debuggee breakpoint operations.
//!
//! The target misbehaves (spurious duplicate-breakpoint errors) when adds
//! and removes for one source interleave, so all mutation for a source runs
//! through a single queue. Queues for different sources are independent.
//!
//! Each queued operation is bounded by a timeout. A timed-out operation
//! fails its own caller but releases the queue, so one stuck round-trip
//! cannot wedge every later `setBreakpoints` for the source.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::{DebugError, DebugResult};

pub struct SourceQueue {
    timeout: Duration,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl SourceQueue {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `operation` once every previously queued operation for
    /// `source_key` has finished.
    pub async fn run<T>(
        &self,
        source_key: &str,
        operation: impl Future<Output = DebugResult<T>>,
    ) -> DebugResult<T> {
        let lock = {
            let mut locks = self.locks.lock();
            locks.entry(source_key.to_string()).or_default().clone()
        };
        let _guard = lock.lock().await;

        match tokio::time::timeout(self.timeout, operation).await {
            Ok(result) => result,
            Err(_) => Err(DebugError::Timeout {
                source_key: source_key.to_string(),
                timeout_ms: self.timeout.as_millis() as u64,
            }),
        }
    }
}
