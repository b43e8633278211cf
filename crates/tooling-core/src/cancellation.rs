//! Cancellation of the in-flight build
//!
//! The controller owns a single slot holding the signal for the build that is
//! currently running. Each build gets a fresh generation number, so a build
//! that finishes late can only clear its own entry and never one installed by
//! a later build. Cancel and finish both run under the slot lock; whichever
//! takes it first wins and the other observes an empty slot.

use crate::error::ToolingResult;
use crate::messages::CancellationRequestResult;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Something that can ask a running build to stop
pub trait CancelSignal: Send + Sync {
    fn signal(&self) -> ToolingResult<()>;
}

impl CancelSignal for CancellationToken {
    fn signal(&self) -> ToolingResult<()> {
        self.cancel();
        Ok(())
    }
}

struct ActiveBuild {
    generation: u64,
    signal: Arc<dyn CancelSignal>,
}

/// Owner of the current build's cancellation signal
#[derive(Default)]
pub struct CancellationController {
    slot: Mutex<Option<ActiveBuild>>,
    generations: AtomicU64,
}

impl CancellationController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a fresh token for a build that is about to start.
    ///
    /// The returned ticket clears the slot when dropped, unless the slot has
    /// since been cleared or taken over by a newer build.
    pub fn begin(&self) -> BuildTicket<'_> {
        let token = CancellationToken::new();
        self.begin_with(token.clone(), Arc::new(token))
    }

    /// Like [`begin`](Self::begin) but with a custom signal for the slot
    pub fn begin_with(
        &self,
        token: CancellationToken,
        signal: Arc<dyn CancelSignal>,
    ) -> BuildTicket<'_> {
        let generation = self.generations.fetch_add(1, Ordering::SeqCst) + 1;

        let previous = self.slot.lock().replace(ActiveBuild { generation, signal });
        if let Some(previous) = previous {
            debug!(
                "Replacing stale cancellation token (generation {})",
                previous.generation
            );
        }

        BuildTicket {
            controller: self,
            generation,
            token,
        }
    }

    /// Signal the running build, if any
    pub fn cancel_current(&self) -> CancellationRequestResult {
        let mut slot = self.slot.lock();

        let Some(active) = slot.as_ref() else {
            return CancellationRequestResult::no_running_build();
        };

        match active.signal.signal() {
            Ok(()) => {
                debug!("Cancellation requested (generation {})", active.generation);
                *slot = None;
                CancellationRequestResult::enqueued()
            }
            Err(e) => {
                warn!("Failed to cancel build: {}", e);
                CancellationRequestResult::error(e.to_string())
            }
        }
    }

    /// Signal and clear unconditionally. Returns whether a build was active.
    pub fn cancel_and_clear(&self) -> bool {
        let Some(active) = self.slot.lock().take() else {
            return false;
        };

        if let Err(e) = active.signal.signal() {
            warn!("Failed to cancel build: {}", e);
        }
        true
    }

    pub fn is_active(&self) -> bool {
        self.slot.lock().is_some()
    }

    fn finish(&self, generation: u64) -> bool {
        let mut slot = self.slot.lock();
        match slot.as_ref() {
            Some(active) if active.generation == generation => {
                *slot = None;
                true
            }
            _ => false,
        }
    }
}

/// Handle held by a running build
pub struct BuildTicket<'a> {
    controller: &'a CancellationController,
    generation: u64,
    token: CancellationToken,
}

impl BuildTicket<'_> {
    /// Token to hand to the build invocation
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl Drop for BuildTicket<'_> {
    fn drop(&mut self) {
        self.controller.finish(self.generation);
    }
}
