// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Repair coordinator (C8, §4.6): serializes `repair` against concurrent
//! mutators via a scoped preemption-stopping block, and re-checks the
//! consistency metadata once inside it.

use crate::consistency::{classify_mismatch, Consistency, MismatchVerdict};
use crate::error::Verdict;

#[cfg(not(feature = "bare-metal"))]
mod backend {
    #[cfg(feature = "std")]
    use std::sync::Mutex;

    #[cfg(not(feature = "std"))]
    use spin::Mutex;

    /// Process-wide serializing primitive. `repair` is the only caller.
    static PREEMPTION: Mutex<()> = Mutex::new(());

    /// Runs `f` with the scoped preemption block held for its entire
    /// duration.
    pub fn with_preemption_stopped<R>(f: impl FnOnce() -> R) -> R {
        #[cfg(feature = "std")]
        let _guard = PREEMPTION.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        #[cfg(not(feature = "std"))]
        let _guard = PREEMPTION.lock();
        f()
    }
}

#[cfg(feature = "bare-metal")]
mod backend {
    use percore::exception_free;

    /// Runs `f` with interrupts disabled for its entire duration, standing
    /// in for a process-wide mutex on targets with no OS-level thread to
    /// block.
    pub fn run_under_preemption_stop<R>(f: impl FnOnce() -> R) -> R {
        exception_free(|_token| f())
    }
}

#[cfg(not(feature = "bare-metal"))]
fn run_under_preemption_stop<R>(f: impl FnOnce() -> R) -> R {
    backend::with_preemption_stopped(f)
}

#[cfg(feature = "bare-metal")]
fn run_under_preemption_stop<R>(f: impl FnOnce() -> R) -> R {
    backend::run_under_preemption_stop(f)
}

/// Runs `repair_fn` under the scoped preemption block, after re-checking
/// that the mismatch observed by the caller is still real.
///
/// `repair_fn` is only invoked when the re-check still finds a real
/// mismatch; otherwise this returns `Verdict::Ok` without calling it,
/// matching §4.6: "if violated it returns OK (somebody else resolved or
/// legitimate mutation is in flight)".
///
/// Marked `#[inline(never)]` so the common, lock-free `check` path is not
/// bloated by code that only ever runs on the rare corruption path
/// (§4.6 "repair is marked non-inlinable").
#[inline(never)]
pub fn coordinate_repair(
    consistency: &Consistency,
    v0: usize,
    repair_fn: impl FnOnce() -> Verdict,
) -> Verdict {
    run_under_preemption_stop(|| match classify_mismatch(consistency, v0) {
        MismatchVerdict::Transient => Verdict::Ok,
        MismatchVerdict::Real => repair_fn(),
    })
}
