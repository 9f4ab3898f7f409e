// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! CRC-only (§4.3.3): detection with no shadow, and therefore no recovery
//! path.

use arrayvec::ArrayVec;

use super::{ExposesChecksum, Scheme, MAX_SHADOW_BYTES};
use crate::error::Verdict;
use crate::layout::{self, Plan};
use crate::member::ChecksummedLayout;
use crate::primitives::crc32c_fold;

const CRC_INIT: u32 = 0xFFFF_FFFF;

/// CRC-only's auxiliary state: just the CRC32C value.
#[derive(Clone, Copy)]
pub struct Aux {
    crc: u32,
}

fn crc_over(plan: &Plan, bytes: &[u8]) -> u32 {
    let mut scratch: ArrayVec<u8, MAX_SHADOW_BYTES> = ArrayVec::new();
    scratch.extend(core::iter::repeat(0u8).take(plan.total_bytes()));
    layout::gather(plan, bytes, &mut scratch);
    crc32c_fold(CRC_INIT, plan, &scratch)
}

/// The CRC-only scheme marker type.
pub struct CrcOnly;

impl<T: ChecksummedLayout> Scheme<T> for CrcOnly {
    type Aux = Aux;

    fn init(_hashcode: u32) -> Self::Aux {
        Aux { crc: CRC_INIT }
    }

    fn generate(plan: &Plan, aux: &mut Self::Aux, bytes: &[u8]) {
        aux.crc = crc_over(plan, bytes);
    }

    fn verify(plan: &Plan, aux: &Self::Aux, bytes: &[u8]) -> bool {
        crc_over(plan, bytes) == aux.crc
    }

    fn repair(_plan: &Plan, _aux: &mut Self::Aux, _bytes: &mut [u8]) -> Verdict {
        // No shadow, no replica: a real mismatch has no redundancy to
        // recover from (§4.3.3, P3 "For CRC-only, check returns
        // Unrecoverable").
        Verdict::Unrecoverable
    }
}

impl<T: ChecksummedLayout> ExposesChecksum<T> for CrcOnly {
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
    fn single_bit_flip_is_unrecoverable() {
        let plan = Plan::compute(MEMBERS, false);
        let mut aux = <CrcOnly as Scheme<Fixture>>::init(0);
        let mut bytes = 1u32.to_ne_bytes();
        <CrcOnly as Scheme<Fixture>>::generate(&plan, &mut aux, &bytes);
        bytes[0] ^= 1;
        assert!(!<CrcOnly as Scheme<Fixture>>::verify(&plan, &aux, &bytes));
        let verdict = <CrcOnly as Scheme<Fixture>>::repair(&plan, &mut aux, &mut bytes);
        assert_eq!(verdict, Verdict::Unrecoverable);
    }
}
