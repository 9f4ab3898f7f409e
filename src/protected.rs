// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! The outer wrapper (§3 "Lifecycle", §4.6): ties a target's member table,
//! [`Consistency`], [`CountingLock`] and chosen [`Scheme`] together behind
//! one `check`/`generate` surface, and owns the crate's only `unsafe`
//! byte-access boundary.

use core::cell::UnsafeCell;
use core::mem::size_of;

use spin::Mutex;

use crate::consistency::Consistency;
use crate::error::Verdict;
use crate::layout::Plan;
use crate::lock::CountingLock;
use crate::member::Target;
use crate::repair::coordinate_repair;
use crate::scheme::{ExposesChecksum, Scheme};

/// Reads `value` as a byte slice spanning `size_of::<T>()`.
///
/// # Safety
///
/// Sound for any `T: Target`: [`crate::member::ChecksummedLayout`]'s
/// safety contract guarantees every participating member's byte range
/// lies within `size_of::<T>()` and contains no byte pattern a raw copy
/// could make invalid, which is all `gather`/`verify` ever read.
fn target_bytes<T>(value: &T) -> &[u8] {
    // SAFETY: see function doc.
    unsafe { core::slice::from_raw_parts(value as *const T as *const u8, size_of::<T>()) }
}

/// The mutable counterpart of [`target_bytes`], used only by `repair`,
/// which is restricted to overwriting bytes belonging to participating
/// members and therefore covered by the same safety contract.
///
/// # Safety
///
/// See [`target_bytes`].
fn target_bytes_mut<T>(value: &mut T) -> &mut [u8] {
    // SAFETY: see function doc.
    unsafe { core::slice::from_raw_parts_mut(value as *mut T as *mut u8, size_of::<T>()) }
}

/// A writer token used for the bootstrap `generate` static variants run
/// before any caller-supplied token exists.
const STATIC_BOOTSTRAP_WRITER: usize = usize::MAX;

/// A per-instance protected target (§3: instance variant).
///
/// `S` defaults to [`crate::DefaultScheme`], resolved from the
/// `scheme-*`/`scheme-auto` cargo features.
pub struct Protected<T: Target, S: Scheme<T> = crate::DefaultScheme> {
    value: T,
    consistency: Consistency,
    lock: CountingLock,
    aux: S::Aux,
}

impl<T: Target, S: Scheme<T>> Protected<T, S> {
    const ALLOW_PUBLIC: bool = cfg!(feature = "public-members");
    const PLAN: Plan = Plan::compute(T::MEMBERS, Self::ALLOW_PUBLIC);

    /// Wraps `value`, running the initial `generate` before returning.
    pub fn new(value: T, writer_token: usize) -> Self {
        let consistency = Consistency::new();
        let lock = CountingLock::new();
        let mut aux = S::init(T::HASHCODE);

        consistency.mark_dirty(writer_token);
        if T::SYNCHRONIZED {
            lock.lock();
        }
        S::generate(&Self::PLAN, &mut aux, target_bytes(&value));
        consistency.inc_version();
        consistency.reset_dirty(writer_token);
        if T::SYNCHRONIZED {
            lock.unlock();
        }

        Self {
            value,
            consistency,
            lock,
            aux,
        }
    }

    /// Read-only access to the wrapped target.
    pub fn get(&self) -> &T {
        &self.value
    }

    /// Whether the counting lock currently reports more than one holder
    /// (§4.5). Only meaningful when `T::SYNCHRONIZED`.
    pub fn is_locked(&self) -> bool {
        self.lock.is_locked()
    }

    /// Mutates the target under the generation protocol (§4.4): marks the
    /// consistency block dirty before `f` runs, then rebuilds redundancy
    /// and clears it afterwards.
    pub fn with_mut<R>(&mut self, writer_token: usize, f: impl FnOnce(&mut T) -> R) -> R {
        self.consistency.mark_dirty(writer_token);
        if T::SYNCHRONIZED {
            self.lock.lock();
        }
        let result = f(&mut self.value);
        S::generate(&Self::PLAN, &mut self.aux, target_bytes(&self.value));
        self.consistency.inc_version();
        self.consistency.reset_dirty(writer_token);
        if T::SYNCHRONIZED {
            self.lock.unlock();
        }
        result
    }

    /// Verifies the target against its redundancy, running `repair` under
    /// the scoped preemption block if a mismatch is found (§4.6).
    pub fn check(&mut self) -> Verdict {
        let v0 = self.consistency.version();
        if S::verify(&Self::PLAN, &self.aux, target_bytes(&self.value)) {
            return Verdict::Ok;
        }
        let Self {
            value,
            consistency,
            aux,
            ..
        } = self;
        let verdict = coordinate_repair(consistency, v0, || {
            S::repair(&Self::PLAN, aux, target_bytes_mut(value))
        });
        // P5 (Version contract): a correction must leave `v` strictly
        // greater than before, so concurrent readers can tell a repaired
        // snapshot from the one they raced against.
        if verdict == Verdict::Corrected {
            consistency.inc_version();
        }
        verdict
    }
}

impl<T: Target, S: ExposesChecksum<T>> Protected<T, S> {
    /// The stored checksum (§4.3), for schemes where one scalar checksum
    /// is meaningful.
    pub fn get_checksum(&self) -> u64 {
        S::checksum(&self.aux)
    }
}

#[cfg(any(test, feature = "testing"))]
impl<T: Target, S: Scheme<T>> Protected<T, S> {
    /// Exposes the target for fault injection (§3.5), bypassing
    /// `with_mut`'s generation protocol so the corruption is visible to
    /// the next `check`.
    pub fn corrupt_for_testing(&mut self) -> &mut T {
        &mut self.value
    }
}

/// A process-wide protected target (§3: static variant).
///
/// Built with a `const fn` constructor so it can back a `static`; the
/// first call to any accessor clears the bootstrap dirty/locked state
/// left by [`Self::new`] by running the initial `generate`.
pub struct StaticProtected<T: Target, S: Scheme<T> = crate::DefaultScheme> {
    value: UnsafeCell<T>,
    consistency: Consistency,
    lock: CountingLock,
    aux: Mutex<Option<S::Aux>>,
}

// SAFETY: all shared mutable state is reached only through `consistency`
// (atomics), `lock` (atomics) and `aux` (a `spin::Mutex`); `value` is
// written only from within `with_mut`/`repair`, both entered while the
// target is marked dirty or the preemption block is held (§4.4, §4.6), so
// concurrent readers never observe a torn write.
unsafe impl<T: Target + Sync, S: Scheme<T>> Sync for StaticProtected<T, S> where S::Aux: Send {}

impl<T: Target, S: Scheme<T>> StaticProtected<T, S> {
    const ALLOW_PUBLIC: bool = cfg!(feature = "public-members");
    const PLAN: Plan = Plan::compute(T::MEMBERS, Self::ALLOW_PUBLIC);

    /// Builds a static in its bootstrap state: dirty-set, single-holder
    /// locked, no redundancy computed yet.
    pub const fn new(value: T) -> Self {
        Self {
            value: UnsafeCell::new(value),
            consistency: Consistency::new_dirty(STATIC_BOOTSTRAP_WRITER),
            lock: CountingLock::new_locked(),
            aux: Mutex::new(None),
        }
    }

    /// Runs the bootstrap `generate` on first use, clearing the dirty
    /// marker and single-holder lock `new` left set.
    fn ensure_initialized(&self) {
        let mut guard = self.aux.lock();
        if guard.is_some() {
            return;
        }
        let mut aux = S::init(T::HASHCODE);
        // SAFETY: exclusive access is guaranteed by `guard` still being
        // held: only the thread that observes `guard.is_none()` runs this
        // branch, and every other accessor blocks on the same mutex.
        let bytes = target_bytes(unsafe { &*self.value.get() });
        S::generate(&Self::PLAN, &mut aux, bytes);
        *guard = Some(aux);
        self.consistency.inc_version();
        self.consistency.reset_dirty(STATIC_BOOTSTRAP_WRITER);
        self.lock.unlock();
    }

    /// Read-only access to the wrapped target.
    pub fn get(&self) -> &T {
        self.ensure_initialized();
        // SAFETY: `get` deliberately does not take `self.aux`'s mutex, so
        // readers never block on a concurrent writer (§4.4: "readers do
        // not block on the dirty marker"); a concurrent `with_mut` may be
        // observed mid-mutation, which is exactly the transient state
        // `check`'s verification protocol is built to tolerate.
        unsafe { &*self.value.get() }
    }

    /// Mutates the target under the generation protocol (§4.4).
    ///
    /// The `aux` mutex is taken only around `generate`, after `f`
    /// returns, not across `f` itself: a concurrent `check`/`get` must
    /// never block on an in-flight mutation (§5 "lock-free hot path"),
    /// it observes the dirty marker instead (§4.4, P6).
    pub fn with_mut<R>(&self, writer_token: usize, f: impl FnOnce(&mut T) -> R) -> R {
        self.ensure_initialized();
        self.consistency.mark_dirty(writer_token);
        if T::SYNCHRONIZED {
            self.lock.lock();
        }
        // SAFETY: `d` is set for the duration of `f`, so any concurrent
        // reader that observes `value` mid-mutation also observes a
        // dirty marker and treats the stale/torn bytes as `Transient`
        // rather than trusting them (§4.4).
        let value = unsafe { &mut *self.value.get() };
        let result = f(value);
        // SAFETY: serialized by `self.aux`'s mutex for the duration of
        // `generate` only.
        let mut guard = self.aux.lock();
        let aux = guard.as_mut().expect("ensure_initialized runs first");
        S::generate(&Self::PLAN, aux, target_bytes(value));
        drop(guard);
        self.consistency.inc_version();
        self.consistency.reset_dirty(writer_token);
        if T::SYNCHRONIZED {
            self.lock.unlock();
        }
        result
    }

    /// Verifies the target against its redundancy, running `repair` under
    /// the scoped preemption block if a mismatch is found (§4.6).
    pub fn check(&self) -> Verdict {
        self.ensure_initialized();
        let v0 = self.consistency.version();
        // SAFETY: see `get`.
        let bytes = target_bytes(unsafe { &*self.value.get() });
        let mut guard = self.aux.lock();
        let aux = guard.as_mut().expect("ensure_initialized runs first");
        if S::verify(&Self::PLAN, aux, bytes) {
            return Verdict::Ok;
        }
        let verdict = coordinate_repair(&self.consistency, v0, || {
            // SAFETY: `repair` only overwrites bytes belonging to
            // participating members, as guaranteed for `target_bytes`.
            let bytes = target_bytes_mut(unsafe { &mut *self.value.get() });
            S::repair(&Self::PLAN, aux, bytes)
        });
        // P5 (Version contract): see `Protected::check`.
        if verdict == Verdict::Corrected {
            self.consistency.inc_version();
        }
        verdict
    }
}

impl<T: Target, S: ExposesChecksum<T>> StaticProtected<T, S> {
    /// The stored checksum (§4.3), for schemes where one scalar checksum
    /// is meaningful.
    pub fn get_checksum(&self) -> u64 {
        self.ensure_initialized();
        let guard = self.aux.lock();
        S::checksum(guard.as_ref().expect("ensure_initialized runs first"))
    }
}

#[cfg(any(test, feature = "testing"))]
impl<T: Target, S: Scheme<T>> StaticProtected<T, S> {
    /// Exposes the target for fault injection (§3.5), bypassing
    /// `with_mut`'s generation protocol so the corruption is visible to
    /// the next `check`.
    pub fn corrupt_for_testing(&self) -> &mut T {
        self.ensure_initialized();
        // SAFETY: test-only escape hatch; callers are expected not to
        // race this against a concurrent `with_mut`/`check`, the same
        // caller discipline fault injection requires in general.
        unsafe { &mut *self.value.get() }
    }
}
