// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Generic Object Protection: per-instance redundancy and in-memory
//! bit-error detection/correction for arbitrary `#[repr(C)]` record
//! types.
//!
//! A target opts in with `#[derive(gop_derive::Protect)]` (re-exported
//! here as [`Protect`]), which implements [`member::ChecksummedLayout`]
//! and describes which fields participate in redundancy (§4.2). The
//! target is then wrapped in [`Protected`] (per-instance) or
//! [`StaticProtected`] (process-wide), picking one of five schemes
//! (§4.3): SUM+DMR, CRC+DMR, CRC-only, TMR, Hamming SEC-DED, or the
//! size-conditional [`DefaultScheme`] dispatcher between SUM+DMR and
//! Hamming.
//!
//! `check()` recomputes fresh redundancy and compares; on a mismatch it
//! runs the scheme's `repair()` under the scoped preemption block from
//! [`repair`], first re-confirming via [`consistency`] that the mismatch
//! was not simply a legitimate write caught mid-flight (§4.4).

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(missing_docs)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod consistency;
pub mod error;
pub mod layout;
pub mod lock;
pub mod member;
pub mod observe;
pub mod primitives;
mod protected;
mod repair;
pub mod scheme;

#[cfg(any(test, feature = "testing"))]
#[doc(hidden)]
pub mod testing;

pub use error::Verdict;
pub use gop_derive::Protect;
pub use member::{ChecksummedLayout, Target};
pub use protected::{Protected, StaticProtected};

macro_rules! select_default_scheme {
    ($($feature:literal => $ty:path),+ $(,)?) => {
        select_default_scheme!(@pick $($feature => $ty),+);
    };
    (@pick $feature:literal => $ty:path $(, $rest_feature:literal => $rest_ty:path)*) => {
        #[cfg(feature = $feature)]
        /// The scheme selected by this crate's `scheme-*`/`scheme-auto`
        /// cargo features (§3.4 "Configuration surface"). Exactly one of
        /// those features should be enabled for a given binary; when more
        /// than one is, the earliest-declared one here wins.
        pub type DefaultScheme = $ty;
        #[cfg(not(feature = $feature))]
        select_default_scheme!(@pick $($rest_feature => $rest_ty),*);
    };
    (@pick) => {
        compile_error!(
            "gop: enable exactly one of the `scheme-auto`, `sum-dmr`, `crc-dmr`, \
             `crc-only`, `tmr`, `tmr-debug` or `hamming` cargo features"
        );
    };
}

select_default_scheme! {
    "scheme-auto" => scheme::dispatch::Auto,
    "sum-dmr" => scheme::sum_dmr::SumDmr,
    "crc-dmr" => scheme::crc_dmr::CrcDmr,
    "crc-only" => scheme::crc_only::CrcOnly,
    "tmr" => scheme::tmr::Tmr,
    "tmr-debug" => scheme::tmr_debug::TmrDebug,
    "hamming" => scheme::hamming::Hamming,
}
