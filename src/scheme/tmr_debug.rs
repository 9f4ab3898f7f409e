// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! TMR_DEBUG: a diagnostic variant of TMR (§4.3.4) supplemented from
//! `Checksumming_TMR_DEBUG.h`. Behaves like TMR for `generate`/`verify`,
//! but `repair` always trusts shadow1 unconditionally instead of voting
//! across all three copies — useful for forcing the "always correct from
//! shadow1" path under test without needing shadow2 to agree.

use super::tmr::Aux;
use super::Scheme;
use crate::error::Verdict;
use crate::layout::{self, Plan};
use crate::member::ChecksummedLayout;
use crate::observe;

/// The TMR_DEBUG scheme marker type.
pub struct TmrDebug;

impl<T: ChecksummedLayout> Scheme<T> for TmrDebug {
    type Aux = Aux;

    fn init(hashcode: u32) -> Self::Aux {
        <super::tmr::Tmr as Scheme<T>>::init(hashcode)
    }

    fn generate(plan: &Plan, aux: &mut Self::Aux, bytes: &[u8]) {
        <super::tmr::Tmr as Scheme<T>>::generate(plan, aux, bytes)
    }

    fn verify(plan: &Plan, aux: &Self::Aux, bytes: &[u8]) -> bool {
        <super::tmr::Tmr as Scheme<T>>::verify(plan, aux, bytes)
    }

    fn repair(plan: &Plan, aux: &mut Self::Aux, bytes: &mut [u8]) -> Verdict {
        layout::scatter(plan, &aux.shadow1, bytes);
        observe::error_corrected();
        Verdict::Corrected
    }
}
