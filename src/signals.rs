//! Ctrl+C handling
//!
//! The handler only records the interrupt and stops the collection run that
//! is registered at the time; the run then winds down on its own.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::runner::CollectionRunner;

static INTERRUPTED: AtomicBool = AtomicBool::new(false);
static ACTIVE_RUN: Mutex<Option<CollectionRunner>> = Mutex::new(None);

#[inline]
pub fn was_interrupted() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}

/// Called from the Ctrl+C handler
pub fn set_interrupted() {
    INTERRUPTED.store(true, Ordering::SeqCst);
    let active = ACTIVE_RUN.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(runner) = active.as_ref() {
        if let Err(e) = runner.stop() {
            tracing::debug!(error = %e, "Interrupt arrived with no active run");
        }
    }
}

#[inline]
pub fn reset_interrupted() {
    INTERRUPTED.store(false, Ordering::SeqCst);
}

/// Route interrupts to `runner` until [`clear_active_run`] is called
pub fn set_active_run(runner: &CollectionRunner) {
    *ACTIVE_RUN.lock().unwrap_or_else(PoisonError::into_inner) = Some(runner.clone());
}

pub fn clear_active_run() {
    ACTIVE_RUN.lock().unwrap_or_else(PoisonError::into_inner).take();
}
