//! Send gate: binary semaphore gating outbound media frames.
//!
//! Writers take the permit per frame and release it right after. `MEDIA_XOFF`
//! takes the same permit and keeps it until `MEDIA_XON`, which arrives on a
//! different path, so the permit is held as an owned value rather than a
//! scoped guard.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore, SemaphorePermit};

use ariwire_core::error::{AriWireError, Result};

pub struct SendGate {
    permits: Arc<Semaphore>,
    held: Mutex<Option<OwnedSemaphorePermit>>,
    paused: AtomicBool,
}

impl Default for SendGate {
    fn default() -> Self {
        Self::new()
    }
}

impl SendGate {
    pub fn new() -> Self {
        Self {
            permits: Arc::new(Semaphore::new(1)),
            held: Mutex::new(None),
            paused: AtomicBool::new(false),
        }
    }

    /// Wait for the gate. Fails once the gate is closed.
    pub async fn acquire(&self) -> Result<SemaphorePermit<'_>> {
        self.permits
            .acquire()
            .await
            .map_err(|_| AriWireError::ConnectionClosed)
    }

    /// Take the permit and keep it. Waits for an in-progress frame write to
    /// finish. Returns false if the gate was already paused.
    pub async fn pause(&self) -> Result<bool> {
        let mut held = self.held.lock().await;
        if held.is_some() {
            return Ok(false);
        }
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| AriWireError::ConnectionClosed)?;
        *held = Some(permit);
        self.paused.store(true, Ordering::SeqCst);
        Ok(true)
    }

    /// Give back a permit held by `pause`. Returns false if not paused.
    pub async fn resume(&self) -> bool {
        let permit = self.held.lock().await.take();
        self.paused.store(false, Ordering::SeqCst);
        permit.is_some()
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Wake every waiter with an error; used at session teardown.
    pub fn close(&self) {
        self.permits.close();
    }
}
