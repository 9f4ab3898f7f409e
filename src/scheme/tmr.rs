// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! TMR (§4.3.4): triple modular redundancy — the target's live bytes plus
//! two independent shadow copies, repaired by majority vote.

use arrayvec::ArrayVec;

use super::{Scheme, MAX_SHADOW_BYTES};
use crate::error::Verdict;
use crate::layout::{self, Plan};
use crate::member::ChecksummedLayout;
use crate::observe;
use crate::primitives::memcmp;

/// TMR's auxiliary state: two independent shadow copies.
#[derive(Clone)]
pub struct Aux {
    pub(crate) shadow1: ArrayVec<u8, MAX_SHADOW_BYTES>,
    pub(crate) shadow2: ArrayVec<u8, MAX_SHADOW_BYTES>,
}

fn gathered(plan: &Plan, bytes: &[u8]) -> ArrayVec<u8, MAX_SHADOW_BYTES> {
    let mut out = ArrayVec::new();
    out.extend(core::iter::repeat(0u8).take(plan.total_bytes()));
    layout::gather(plan, bytes, &mut out);
    out
}

/// The TMR scheme marker type.
pub struct Tmr;

impl<T: ChecksummedLayout> Scheme<T> for Tmr {
    type Aux = Aux;

    fn init(_hashcode: u32) -> Self::Aux {
        Aux {
            shadow1: ArrayVec::new(),
            shadow2: ArrayVec::new(),
        }
    }

    fn generate(plan: &Plan, aux: &mut Self::Aux, bytes: &[u8]) {
        let fresh = gathered(plan, bytes);
        aux.shadow1 = fresh.clone();
        aux.shadow2 = fresh;
    }

    fn verify(plan: &Plan, aux: &Self::Aux, bytes: &[u8]) -> bool {
        let fresh = gathered(plan, bytes);
        memcmp(&fresh, &aux.shadow1).is_none()
    }

    fn repair(plan: &Plan, aux: &mut Self::Aux, bytes: &mut [u8]) -> Verdict {
        let fresh = gathered(plan, bytes);

        if memcmp(&aux.shadow1, &aux.shadow2).is_none() {
            // The two shadows agree with each other; T disagreed with
            // shadow1 in `verify`, so T is the faulty copy.
            layout::scatter(plan, &aux.shadow1, bytes);
            observe::error_corrected();
            Verdict::Corrected
        } else if memcmp(&fresh, &aux.shadow2).is_none() {
            // T agrees with shadow2: shadow1 is the faulty copy. T's
            // bytes need no change; shadow1 is left faulty and will be
            // overwritten wholesale by the next `generate` (§4.3.4 step
            // 2), so no correction to T is signalled here.
            Verdict::Ok
        } else {
            // All three copies disagree pairwise.
            Verdict::Unrecoverable
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::member::{Kind, Member, Variant, Visibility};

    const MEMBERS: &[Member] = &[Member {
        name: "v",
        offset: 0,
        size: 4,
        kind: Kind::Scalar,
        visibility: Visibility::Private,
        variant: Variant::Instance,
        is_const: false,
    }];

    struct Fixture;
    // SAFETY: `Fixture` is `#[repr(C)]` wrapping a single `u32`, and
    // `MEMBERS` describes exactly that one field.
    unsafe impl ChecksummedLayout for Fixture {
        const MEMBERS: &'static [Member] = MEMBERS;
        const HASHCODE: u32 = 0;
    }

    #[test]
    fn target_faulty_is_restored_from_agreeing_shadows() {
        let plan = Plan::compute(MEMBERS, false);
        let mut aux = <Tmr as Scheme<Fixture>>::init(0);
        let mut bytes = 99u32.to_ne_bytes();
        <Tmr as Scheme<Fixture>>::generate(&plan, &mut aux, &bytes);
        bytes[0] ^= 0xFF;
        assert!(!<Tmr as Scheme<Fixture>>::verify(&plan, &aux, &bytes));
        let verdict = <Tmr as Scheme<Fixture>>::repair(&plan, &mut aux, &mut bytes);
        assert_eq!(verdict, Verdict::Corrected);
        assert_eq!(u32::from_ne_bytes(bytes), 99);
    }

    #[test]
    fn triple_disagreement_is_unrecoverable() {
        let plan = Plan::compute(MEMBERS, false);
        let mut aux = <Tmr as Scheme<Fixture>>::init(0);
        let mut bytes = 1u32.to_ne_bytes();
        <Tmr as Scheme<Fixture>>::generate(&plan, &mut aux, &bytes);
        bytes = 2u32.to_ne_bytes();
        aux.shadow1.clear();
        aux.shadow1.extend(3u32.to_ne_bytes());
        aux.shadow2.clear();
        aux.shadow2.extend(4u32.to_ne_bytes());
        let before = observe::error_corrected_count();
        let verdict = <Tmr as Scheme<Fixture>>::repair(&plan, &mut aux, &mut bytes);
        assert_eq!(verdict, Verdict::Unrecoverable);
        assert_eq!(observe::error_corrected_count(), before);
    }
}
