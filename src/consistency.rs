// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Consistency metadata (C5): dirty marker + version counter + the
//! memory-barrier discipline from §4.4.

use core::sync::atomic::{AtomicUsize, Ordering};

/// Issues the memory fence required at `check`/`generate`/`repair`
/// boundaries (§4.4).
///
/// With the `smp` feature this is a full fence; otherwise it is a
/// compiler-only reorder barrier, toggled by the `smp` cargo feature.
#[inline(always)]
pub fn barrier() {
    #[cfg(feature = "smp")]
    core::sync::atomic::fence(Ordering::SeqCst);
    #[cfg(not(feature = "smp"))]
    core::sync::atomic::compiler_fence(Ordering::SeqCst);
}

/// `d = null` sentinel for the dirty marker.
const CLEAN: usize = 0;

/// Dirty marker + version counter pair, embedded in every `A(T)` (§4.4).
///
/// `d` identifies the writer currently mutating `T` (a non-zero opaque
/// token; a natural choice is the mutator's frame address or thread id,
/// per §9 "Frame-address-as-thread-id"). This accepts any non-zero
/// `usize` the caller supplies, so embedders can use a real thread id.
#[derive(Debug)]
pub struct Consistency {
    dirty: AtomicUsize,
    version: AtomicUsize,
}

impl Consistency {
    /// A fresh, clean consistency block at version 0.
    pub const fn new() -> Self {
        Self {
            dirty: AtomicUsize::new(CLEAN),
            version: AtomicUsize::new(0),
        }
    }

    /// A consistency block in the bootstrap state required for static
    /// variants (§3 "Lifecycle"): dirty-set, version 0, so that the first
    /// `generate` during construction clears it normally.
    pub const fn new_dirty(writer_token: usize) -> Self {
        Self {
            dirty: AtomicUsize::new(non_zero_or_sentinel(writer_token)),
            version: AtomicUsize::new(0),
        }
    }

    /// Marks `T` dirty under `writer_token` (must be non-zero). Caller
    /// must do this BEFORE mutating `T` (§4.4 "Generation protocol").
    pub fn mark_dirty(&self, writer_token: usize) {
        barrier();
        self.dirty
            .store(non_zero_or_sentinel(writer_token), Ordering::Release);
        barrier();
    }

    /// Clears the dirty marker via CAS from `writer_token` to clean,
    /// called at the end of `generate`.
    pub fn reset_dirty(&self, writer_token: usize) {
        barrier();
        let _ = self.dirty.compare_exchange(
            non_zero_or_sentinel(writer_token),
            CLEAN,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        barrier();
    }

    /// Increments the version counter (wrapping), called at the end of
    /// `generate`, after the redundancy bytes are fully rebuilt.
    pub fn inc_version(&self) {
        self.version.fetch_add(1, Ordering::AcqRel);
    }

    /// Current version, for the `v0` snapshot in `check`'s verification
    /// protocol.
    pub fn version(&self) -> usize {
        self.version.load(Ordering::Acquire)
    }

    /// Whether the dirty marker is currently clear.
    pub fn is_clean(&self) -> bool {
        self.dirty.load(Ordering::Acquire) == CLEAN
    }
}

impl Default for Consistency {
    fn default() -> Self {
        Self::new()
    }
}

const fn non_zero_or_sentinel(token: usize) -> usize {
    if token == CLEAN {
        // A caller-supplied writer token of 0 would be indistinguishable
        // from "clean"; fold it onto a reserved nonzero sentinel instead
        // of silently no-oping the dirty bracket.
        usize::MAX
    } else {
        token
    }
}

/// The outcome of `check`'s §4.4 verification protocol: whether an
/// observed redundancy mismatch is a real corruption or coincided with an
/// in-flight legitimate mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MismatchVerdict {
    /// No legitimate writer was active across the check; investigate via
    /// `repair`.
    Real,
    /// A writer held the dirty marker, or the version changed mid-check;
    /// the mismatch is expected and must be ignored (P6).
    Transient,
}

/// Runs the "is this mismatch real" half of §4.4's verification protocol.
///
/// `v0` must be the version snapshotted *before* recomputing the fresh
/// redundancy; this function re-snapshots `d` and `v` and decides.
pub fn classify_mismatch(consistency: &Consistency, v0: usize) -> MismatchVerdict {
    barrier();
    let transient = !consistency.is_clean() || consistency.version() != v0;
    barrier();
    if transient {
        MismatchVerdict::Transient
    } else {
        MismatchVerdict::Real
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_after_mark_and_reset() {
        let c = Consistency::new();
        assert!(c.is_clean());
        c.mark_dirty(42);
        assert!(!c.is_clean());
        c.reset_dirty(42);
        assert!(c.is_clean());
    }

    #[test]
    fn mismatch_is_transient_while_dirty() {
        let c = Consistency::new();
        let v0 = c.version();
        c.mark_dirty(1);
        assert_eq!(classify_mismatch(&c, v0), MismatchVerdict::Transient);
        c.reset_dirty(1);
        c.inc_version();
        assert_eq!(classify_mismatch(&c, v0), MismatchVerdict::Transient);
    }

    #[test]
    fn mismatch_is_real_when_clean_and_version_stable() {
        let c = Consistency::new();
        let v0 = c.version();
        assert_eq!(classify_mismatch(&c, v0), MismatchVerdict::Real);
    }
}
