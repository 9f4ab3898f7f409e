// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Observability join points (§6 "Observability join points").
//!
//! `error_corrected()` and `synchronizer_lock_error()` are deliberately
//! empty in the default build, but also count occurrences and offer a
//! pluggable callback, so embedders and tests have something concrete to
//! hook without needing a build-time code generator.

use core::sync::atomic::{AtomicU64, Ordering};
use spin::Once;

/// An observable event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// A `repair` call corrected a real corruption.
    ErrorCorrected,
    /// The ANB counting lock failed its arithmetic check.
    SynchronizerLockError,
}

static ERROR_CORRECTED_COUNT: AtomicU64 = AtomicU64::new(0);
static LOCK_ERROR_COUNT: AtomicU64 = AtomicU64::new(0);
static HOOK: Once<fn(Event)> = Once::new();

/// Installs a callback invoked synchronously from within `repair`/`check`
/// whenever an [`Event`] fires. Only the first call takes effect, the same
/// one-shot `spin::Once` discipline used for installing the global
/// logger.
pub fn set_hook(hook: fn(Event)) {
    HOOK.call_once(|| hook);
}

/// Join point: signalled on any successful correction (§6, §7(b)).
pub fn error_corrected() {
    ERROR_CORRECTED_COUNT.fetch_add(1, Ordering::Relaxed);
    log::debug!("gop: error corrected");
    if let Some(hook) = HOOK.get() {
        hook(Event::ErrorCorrected);
    }
}

/// Join point: signalled on an ANB code violation (§6, §7(d)).
pub fn synchronizer_lock_error() {
    LOCK_ERROR_COUNT.fetch_add(1, Ordering::Relaxed);
    log::error!("gop: synchronizer lock error");
    if let Some(hook) = HOOK.get() {
        hook(Event::SynchronizerLockError);
    }
}

/// Total number of corrections observed since process start.
pub fn error_corrected_count() -> u64 {
    ERROR_CORRECTED_COUNT.load(Ordering::Relaxed)
}

/// Total number of ANB lock violations observed since process start.
pub fn lock_error_count() -> u64 {
    LOCK_ERROR_COUNT.load(Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_increment() {
        let before = error_corrected_count();
        error_corrected();
        assert_eq!(error_corrected_count(), before + 1);
    }
}
