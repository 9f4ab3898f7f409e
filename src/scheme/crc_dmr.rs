// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! CRC+DMR (§4.3.2): CRC32C (reflected Castagnoli) plus a full shadow
//! copy. Same repair shape as SUM+DMR, with the two's-complement sum
//! swapped for a hardware-accelerated-where-available CRC.

use arrayvec::ArrayVec;

use super::{ExposesChecksum, Scheme, MAX_SHADOW_BYTES};
use crate::error::Verdict;
use crate::layout::{self, Plan};
use crate::member::ChecksummedLayout;
use crate::observe;
use crate::primitives::crc32c_fold;

const CRC_INIT: u32 = 0xFFFF_FFFF;

/// CRC+DMR's auxiliary state: the CRC32C value plus a packed shadow copy.
#[derive(Clone)]
pub struct Aux {
    crc: u32,
    shadow: ArrayVec<u8, MAX_SHADOW_BYTES>,
}

fn crc_over(plan: &Plan, bytes: &[u8], scratch: &mut ArrayVec<u8, MAX_SHADOW_BYTES>) -> u32 {
    scratch.clear();
    scratch.extend(core::iter::repeat(0u8).take(plan.total_bytes()));
    layout::gather(plan, bytes, scratch);
    crc32c_fold(CRC_INIT, plan, scratch.as_slice())
}

/// The CRC+DMR scheme marker type.
pub struct CrcDmr;

impl<T: ChecksummedLayout> Scheme<T> for CrcDmr {
    type Aux = Aux;

    fn init(_hashcode: u32) -> Self::Aux {
        Aux {
            crc: CRC_INIT,
            shadow: ArrayVec::new(),
        }
    }

    fn generate(plan: &Plan, aux: &mut Self::Aux, bytes: &[u8]) {
        aux.shadow.clear();
        aux.shadow
            .extend(core::iter::repeat(0u8).take(plan.total_bytes()));
        layout::gather(plan, bytes, &mut aux.shadow);
        aux.crc = crc32c_fold(CRC_INIT, plan, aux.shadow.as_slice());
    }

    fn verify(plan: &Plan, aux: &Self::Aux, bytes: &[u8]) -> bool {
        let mut scratch = ArrayVec::new();
        crc_over(plan, bytes, &mut scratch) == aux.crc
    }

    fn repair(plan: &Plan, aux: &mut Self::Aux, bytes: &mut [u8]) -> Verdict {
        let mut scratch = ArrayVec::new();
        let crc_t = crc_over(plan, bytes, &mut scratch);
        let crc_shadow = crc32c_fold(CRC_INIT, plan, aux.shadow.as_slice());

        if crc_shadow == aux.crc {
            // Shadow agrees with the stored CRC: T is faulty. Park a
            // guaranteed-mismatch value while copying the shadow back, so
            // a concurrent reader never sees a half-restored T paired
            // with the old, now-stale CRC.
            aux.crc = !crc_shadow;
            layout::scatter(plan, &aux.shadow, bytes);
            aux.crc = crc_shadow;
            observe::error_corrected();
            Verdict::Corrected
        } else if crc_shadow == crc_t {
            // The stored CRC field is faulty (or T and shadow share an
            // identical corruption that still agrees with each other); either
            // way T's current bytes are trusted and the stored CRC is
            // simply refreshed. No heuristic is applied to tell the two
            // cases apart.
            aux.crc = crc_t;
            observe::error_corrected();
            Verdict::Corrected
        } else {
            Verdict::Unrecoverable
        }
    }
}

impl<T: ChecksummedLayout> ExposesChecksum<T> for CrcDmr {
    fn checksum(aux: &Self::Aux) -> u64 {
        aux.crc as u64
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
    fn detects_and_corrects_single_bit_flip_in_target() {
        let plan = Plan::compute(MEMBERS, false);
        let mut aux = <CrcDmr as Scheme<Fixture>>::init(0);
        let mut bytes = 0xDEAD_BEEFu32.to_ne_bytes();
        <CrcDmr as Scheme<Fixture>>::generate(&plan, &mut aux, &bytes);
        assert!(<CrcDmr as Scheme<Fixture>>::verify(&plan, &aux, &bytes));

        bytes[2] ^= 0x40;
        assert!(!<CrcDmr as Scheme<Fixture>>::verify(&plan, &aux, &bytes));
        let verdict = <CrcDmr as Scheme<Fixture>>::repair(&plan, &mut aux, &mut bytes);
        assert_eq!(verdict, Verdict::Corrected);
        assert_eq!(u32::from_ne_bytes(bytes), 0xDEAD_BEEF);
    }

    #[test]
    fn stored_crc_faulty_is_refreshed_from_agreeing_target_and_shadow() {
        let plan = Plan::compute(MEMBERS, false);
        let mut aux = <CrcDmr as Scheme<Fixture>>::init(0);
        let bytes = 123u32.to_ne_bytes();
        <CrcDmr as Scheme<Fixture>>::generate(&plan, &mut aux, &bytes);
        aux.crc ^= 1; // corrupt only the stored CRC field
        let mut bytes = bytes;
        let verdict = <CrcDmr as Scheme<Fixture>>::repair(&plan, &mut aux, &mut bytes);
        assert_eq!(verdict, Verdict::Corrected);
        assert_eq!(u32::from_ne_bytes(bytes), 123);
    }
}
