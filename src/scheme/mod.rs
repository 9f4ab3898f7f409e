// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Scheme engines (C4) and the dispatcher (C7).
//!
//! All five engines share one abstract interface (§4.3): `generate`
//! rebuilds the auxiliary block from scratch, `verify` recomputes and
//! compares without mutating anything, and `repair` performs the
//! scheme-specific recovery once the outer wrapper
//! ([`crate::protected::Protected`]) has confirmed, via
//! [`crate::consistency`], that a mismatch is real rather than transient.

pub mod crc_dmr;
pub mod crc_only;
pub mod dispatch;
pub mod hamming;
pub mod sum_dmr;
pub mod tmr;
pub mod tmr_debug;

use crate::error::Verdict;
use crate::layout::Plan;
use crate::member::ChecksummedLayout;

/// Upper bound on the packed shadow/replica region any single scheme
/// instantiation may use.
///
/// Rust const generics cannot derive an array length from an associated
/// const of a generic type parameter on stable (`T::TOTAL_BYTES` is not
/// usable as `[u8; T::TOTAL_BYTES]` without `generic_const_exprs`), so
/// auxiliary storage below is a fixed-capacity [`arrayvec::ArrayVec`]
/// rather than an exactly-sized array, trading a documented per-target
/// memory ceiling for staying on stable Rust. See DESIGN.md.
pub const MAX_SHADOW_BYTES: usize = 256;

/// Upper bound on the number of Hamming redundancy words.
/// `hamming_dim(members)` must not exceed this for a given target.
pub const MAX_HAMMING_WORDS: usize = 16;

/// One of the five redundancy schemes plus the size-conditional
/// dispatcher (§4.3.6).
pub trait Scheme<T: ChecksummedLayout> {
    /// The scheme's auxiliary state (checksum / shadow / replicas /
    /// Hamming words), embedded alongside `T` in a `Protected<T, Self>`.
    type Aux: Clone;

    /// Builds the initial, empty auxiliary state. `hashcode` seeds
    /// SUM+DMR's accumulator (§4.3.1); schemes that do not need it ignore
    /// it.
    fn init(hashcode: u32) -> Self::Aux;

    /// Rebuilds `aux` from `bytes` (the target's current contents). Never
    /// fails (§7).
    fn generate(plan: &Plan, aux: &mut Self::Aux, bytes: &[u8]);

    /// Recomputes fresh redundancy over `bytes` and compares against
    /// `aux` without mutating either. Returns `true` when they match.
    fn verify(plan: &Plan, aux: &Self::Aux, bytes: &[u8]) -> bool;

    /// Scheme-specific recovery, run only after the caller has confirmed
    /// the mismatch is real. May rewrite `bytes` and/or `aux`.
    fn repair(plan: &Plan, aux: &mut Self::Aux, bytes: &mut [u8]) -> Verdict;
}

/// Implemented by the three schemes for which `get_checksum` (§4.3) is
/// meaningful: SUM+DMR, CRC+DMR, CRC-only. TMR and Hamming have no single
/// scalar "the checksum", so they do not implement this.
pub trait ExposesChecksum<T: ChecksummedLayout>: Scheme<T> {
    /// Returns the stored checksum value. Callers should only trust it
    /// immediately after a `check`/`generate` that returned fresh data;
    /// `Protected::get_checksum` pairs this with a freshness flag.
    fn checksum(aux: &Self::Aux) -> u64;
}
