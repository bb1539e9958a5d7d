//! Generation gate.
//!
//! Bounds concurrent backend calls globally across all chats. With
//! `allow_concurrent` every turn proceeds immediately; otherwise a single
//! admission slot serializes calls and a turn that cannot acquire it within
//! the wait timeout is rejected instead of queued indefinitely.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

#[derive(Debug, Error)]
#[error("generation slot not acquired within {0:?}")]
pub struct GateTimeout(pub Duration);

/// RAII admission token. Dropping it releases the slot, so release is
/// guaranteed on every exit path.
#[derive(Debug)]
pub struct GatePermit {
    _permit: Option<OwnedSemaphorePermit>,
}

#[derive(Debug, Clone)]
pub struct GenerationGate {
    slot: Option<Arc<Semaphore>>,
    wait: Duration,
}

impl GenerationGate {
    pub fn new(allow_concurrent: bool, wait: Duration) -> Self {
        let slot = if allow_concurrent {
            None
        } else {
            Some(Arc::new(Semaphore::new(1)))
        };
        Self { slot, wait }
    }

    /// Wait up to the configured timeout for the admission slot.
    pub async fn acquire(&self) -> Result<GatePermit, GateTimeout> {
        let Some(slot) = &self.slot else {
            return Ok(GatePermit { _permit: None });
        };

        match tokio::time::timeout(self.wait, Arc::clone(slot).acquire_owned()).await {
            Ok(Ok(permit)) => Ok(GatePermit {
                _permit: Some(permit),
            }),
            // The semaphore is never closed while the gate is alive.
            Ok(Err(_)) => Err(GateTimeout(self.wait)),
            Err(_) => Err(GateTimeout(self.wait)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_concurrent_gate_never_blocks() {
        let gate = GenerationGate::new(true, Duration::from_millis(1));
        let _first = gate.acquire().await.unwrap();
        let _second = gate.acquire().await.unwrap();
    }

    #[tokio::test]
    async fn test_serialized_gate_times_out_while_held() {
        let gate = GenerationGate::new(false, Duration::from_millis(20));
        let held = gate.acquire().await.unwrap();
        let err = gate.acquire().await.unwrap_err();
        assert_eq!(err.0, Duration::from_millis(20));
        drop(held);
    }

    #[tokio::test]
    async fn test_slot_released_on_drop() {
        let gate = GenerationGate::new(false, Duration::from_millis(20));
        let held = gate.acquire().await.unwrap();
        drop(held);
        let _reacquired = gate.acquire().await.unwrap();
    }

    #[tokio::test]
    async fn test_waiter_admitted_after_release() {
        let gate = GenerationGate::new(false, Duration::from_millis(500));
        let held = gate.acquire().await.unwrap();

        let waiter = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.acquire().await.map(|_| ()) })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        drop(held);

        waiter.await.unwrap().unwrap();
    }
}
