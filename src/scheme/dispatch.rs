// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Size-conditional dispatcher (C7, §4.3.6): SUM+DMR for small targets,
//! Hamming for large ones.

use super::{hamming, sum_dmr, Scheme};
use crate::error::Verdict;
use crate::layout::{Plan, UNROLL_THRESHOLD_WORDS, WORD};
use crate::member::ChecksummedLayout;

fn is_small(plan: &Plan) -> bool {
    plan.total_bytes() <= UNROLL_THRESHOLD_WORDS * WORD
}

/// The auxiliary state is resolved to one scheme's shape the first time
/// `generate` runs, since the scheme choice depends on `plan` (known only
/// once a `Plan` is available) rather than on `hashcode` alone.
#[derive(Clone)]
pub enum Aux {
    /// Not yet resolved: `init` ran, but `generate` has not.
    Pending {
        /// Seed forwarded to whichever scheme gets chosen.
        hashcode: u32,
    },
    /// Resolved to SUM+DMR (`plan.total_bytes() <= 3 words`).
    Small(sum_dmr::Aux),
    /// Resolved to Hamming (`plan.total_bytes() > 3 words`).
    Large(hamming::Aux),
}

/// The size-conditional dispatcher marker type.
pub struct Auto;

impl<T: ChecksummedLayout> Scheme<T> for Auto {
    type Aux = Aux;

    fn init(hashcode: u32) -> Self::Aux {
        Aux::Pending { hashcode }
    }

    fn generate(plan: &Plan, aux: &mut Self::Aux, bytes: &[u8]) {
        if let Aux::Pending { hashcode } = *aux {
            *aux = if is_small(plan) {
                Aux::Small(<sum_dmr::SumDmr as Scheme<T>>::init(hashcode))
            } else {
                Aux::Large(<hamming::Hamming as Scheme<T>>::init(hashcode))
            };
        }
        match aux {
            Aux::Small(a) => <sum_dmr::SumDmr as Scheme<T>>::generate(plan, a, bytes),
            Aux::Large(a) => <hamming::Hamming as Scheme<T>>::generate(plan, a, bytes),
            Aux::Pending { .. } => unreachable!("resolved above"),
        }
    }

    fn verify(plan: &Plan, aux: &Self::Aux, bytes: &[u8]) -> bool {
        match aux {
            Aux::Small(a) => <sum_dmr::SumDmr as Scheme<T>>::verify(plan, a, bytes),
            Aux::Large(a) => <hamming::Hamming as Scheme<T>>::verify(plan, a, bytes),
            // Nothing has been generated yet; there is nothing to
            // contradict.
            Aux::Pending { .. } => true,
        }
    }

    fn repair(plan: &Plan, aux: &mut Self::Aux, bytes: &mut [u8]) -> Verdict {
        match aux {
            Aux::Small(a) => <sum_dmr::SumDmr as Scheme<T>>::repair(plan, a, bytes),
            Aux::Large(a) => <hamming::Hamming as Scheme<T>>::repair(plan, a, bytes),
            Aux::Pending { .. } => Verdict::Ok,
        }
    }
}
