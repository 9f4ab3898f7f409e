// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Extended Hamming SEC-DED (§4.3.5).
//!
//! Each machine word of the packed, participating-member bytes is
//! assigned a parity-matrix column (weight ≥ 2, reused identically by
//! `generate` and `repair`, see [`crate::primitives::hamming_column`]).
//! `dim` redundancy words plus one overall parity word cover the whole
//! region; a syndrome reconstructed bit-position-by-bit-position during
//! `repair` identifies the single corrupt bit, whether it lives in a data
//! word, a redundancy word, or the parity word itself.
//!
//! The overall parity word only XORs in data words whose column has an
//! even low bit, plus `redundancy[0]` — it never covers
//! `redundancy[1..dim]`. That asymmetry is deliberate and preserved from
//! this port (§9 "Open question — Hamming parity-bit coverage"): a bit
//! flip inside a non-zero-index redundancy word changes
//! no parity-covered value, so `repair` only learns about it through the
//! per-bit syndrome scan, not through the parity fast path.

use arrayvec::ArrayVec;

use super::{Scheme, MAX_HAMMING_WORDS, MAX_SHADOW_BYTES};
use crate::error::Verdict;
use crate::layout::{self, Plan};
use crate::member::ChecksummedLayout;
use crate::observe;
use crate::primitives::{hamming_column, hamming_dim};

const WORD: usize = core::mem::size_of::<u64>();
/// Upper bound on the number of machine words a packed region can span,
/// mirroring [`super::MAX_SHADOW_BYTES`] expressed in words.
const MAX_WORDS: usize = MAX_SHADOW_BYTES / WORD;

/// Hamming's auxiliary state: `dim` redundancy words plus the overall
/// parity word.
#[derive(Clone)]
pub struct Aux {
    dim: u32,
    redundancy: ArrayVec<u64, MAX_HAMMING_WORDS>,
    parity: u64,
}

fn machine_words(plan: &Plan) -> usize {
    plan.total_bytes().div_ceil(WORD)
}

fn gathered_words(plan: &Plan, bytes: &[u8]) -> ArrayVec<u64, MAX_WORDS> {
    let mut packed: ArrayVec<u8, MAX_SHADOW_BYTES> = ArrayVec::new();
    packed.extend(core::iter::repeat(0u8).take(plan.total_bytes()));
    layout::gather(plan, bytes, &mut packed);
    let m = machine_words(plan);
    packed.extend(core::iter::repeat(0u8).take(m * WORD - packed.len()));

    let mut words = ArrayVec::new();
    for chunk in packed.chunks(WORD) {
        let mut buf = [0u8; WORD];
        buf[..chunk.len()].copy_from_slice(chunk);
        words.push(u64::from_ne_bytes(buf));
    }
    words
}

/// Runs the generate loop (§4.3.5), returning the fresh `(redundancy,
/// parity)` pair without touching `aux`.
fn fresh_redundancy(
    dim: u32,
    words: &[u64],
) -> (ArrayVec<u64, MAX_HAMMING_WORDS>, u64) {
    let mut redundancy: ArrayVec<u64, MAX_HAMMING_WORDS> = ArrayVec::new();
    redundancy.extend(core::iter::repeat(0u64).take(dim as usize));
    let mut parity = 0u64;
    for (i, &w) in words.iter().enumerate() {
        let column = hamming_column(dim, i);
        for j in 0..dim as usize {
            if column & (1 << j) != 0 {
                redundancy[j] ^= w;
            }
        }
        if column & 1 == 0 {
            parity ^= w;
        }
    }
    parity ^= redundancy[0];
    (redundancy, parity)
}

fn write_back_word(plan: &Plan, bytes: &mut [u8], word_index: usize, new_word: u64) {
    let mut packed: ArrayVec<u8, MAX_SHADOW_BYTES> = ArrayVec::new();
    packed.extend(core::iter::repeat(0u8).take(plan.total_bytes()));
    layout::gather(plan, bytes, &mut packed);
    let start = word_index * WORD;
    let end = core::cmp::min(start + WORD, packed.len());
    packed[start..end].copy_from_slice(&new_word.to_ne_bytes()[..end - start]);
    layout::scatter(plan, &packed, bytes);
}

/// The Hamming SEC-DED scheme marker type.
pub struct Hamming;

impl<T: ChecksummedLayout> Scheme<T> for Hamming {
    type Aux = Aux;

    fn init(_hashcode: u32) -> Self::Aux {
        Aux {
            dim: 0,
            redundancy: ArrayVec::new(),
            parity: 0,
        }
    }

    fn generate(plan: &Plan, aux: &mut Self::Aux, bytes: &[u8]) {
        let words = gathered_words(plan, bytes);
        let dim = hamming_dim(words.len());
        let (redundancy, parity) = fresh_redundancy(dim, &words);
        aux.dim = dim;
        aux.redundancy = redundancy;
        aux.parity = parity;
    }

    fn verify(plan: &Plan, aux: &Self::Aux, bytes: &[u8]) -> bool {
        let words = gathered_words(plan, bytes);
        let (redundancy, parity) = fresh_redundancy(aux.dim, &words);
        redundancy == aux.redundancy && parity == aux.parity
    }

    fn repair(plan: &Plan, aux: &mut Self::Aux, bytes: &mut [u8]) -> Verdict {
        let words = gathered_words(plan, bytes);
        let dim = aux.dim;
        let (fresh, fresh_parity) = fresh_redundancy(dim, &words);

        let mut syndrome: ArrayVec<u64, MAX_HAMMING_WORDS> = ArrayVec::new();
        for j in 0..dim as usize {
            syndrome.push(fresh[j] ^ aux.redundancy[j]);
        }
        let parity_syndrome = fresh_parity ^ aux.parity;
        let any_syndrome = syndrome.iter().any(|&s| s != 0);

        if !any_syndrome && parity_syndrome == 0 {
            return Verdict::Ok;
        }
        if !any_syndrome && parity_syndrome != 0 {
            // The stored parity word itself is the corrupt bit.
            aux.parity = fresh_parity;
            observe::error_corrected();
            return Verdict::Corrected;
        }
        if any_syndrome && parity_syndrome == 0 {
            // Double-bit error: detected, not correctable (§4.3.5 step 4).
            return Verdict::Unrecoverable;
        }

        // Single-bit error: for each bit position, gather that bit across
        // all `dim` syndrome words into a small column value. A
        // weight-one column names the redundancy word with the bad bit;
        // any other nonzero column must match some data word's assigned
        // column.
        for bitpos in 0..64u32 {
            let mut column = 0u32;
            for j in 0..dim as usize {
                column |= (((syndrome[j] >> bitpos) & 1) as u32) << j;
            }
            if column == 0 {
                continue;
            }
            if column.count_ones() == 1 {
                let j = column.trailing_zeros() as usize;
                aux.redundancy[j] ^= 1u64 << bitpos;
                observe::error_corrected();
                return Verdict::Corrected;
            }
            if let Some(i) = (0..words.len()).find(|&i| hamming_column(dim, i) == column) {
                let corrected_word = words[i] ^ (1u64 << bitpos);
                write_back_word(plan, bytes, i, corrected_word);
                observe::error_corrected();
                return Verdict::Corrected;
            }
        }
        Verdict::Unrecoverable
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::member::{Kind, Member, Variant, Visibility};

    const MEMBERS: &[Member] = &[
        Member {
            name: "a",
            offset: 0,
            size: 8,
            kind: Kind::Scalar,
            visibility: Visibility::Private,
            variant: Variant::Instance,
            is_const: false,
        },
        Member {
            name: "b",
            offset: 8,
            size: 8,
            kind: Kind::Scalar,
            visibility: Visibility::Private,
            variant: Variant::Instance,
            is_const: false,
        },
        Member {
            name: "c",
            offset: 16,
            size: 8,
            kind: Kind::Scalar,
            visibility: Visibility::Private,
            variant: Variant::Instance,
            is_const: false,
        },
        Member {
            name: "d",
            offset: 24,
            size: 8,
            kind: Kind::Scalar,
            visibility: Visibility::Private,
            variant: Variant::Instance,
            is_const: false,
        },
    ];

    struct Fixture;
    // SAFETY: `Fixture` is `#[repr(C)]` wrapping four `u64`s, and
    // `MEMBERS` describes exactly those four fields.
    unsafe impl ChecksummedLayout for Fixture {
        const MEMBERS: &'static [Member] = MEMBERS;
        const HASHCODE: u32 = 0;
    }

    #[test]
    fn single_bit_flip_in_data_is_corrected() {
        let plan = Plan::compute(MEMBERS, false);
        let mut aux = <Hamming as Scheme<Fixture>>::init(0);
        let mut bytes = [0u8; 32];
        bytes[0..8].copy_from_slice(&11u64.to_ne_bytes());
        bytes[8..16].copy_from_slice(&22u64.to_ne_bytes());
        bytes[16..24].copy_from_slice(&33u64.to_ne_bytes());
        bytes[24..32].copy_from_slice(&44u64.to_ne_bytes());
        <Hamming as Scheme<Fixture>>::generate(&plan, &mut aux, &bytes);
        assert!(<Hamming as Scheme<Fixture>>::verify(&plan, &aux, &bytes));

        bytes[8] ^= 0x04; // flip one bit inside `b`
        assert!(!<Hamming as Scheme<Fixture>>::verify(&plan, &aux, &bytes));
        let verdict = <Hamming as Scheme<Fixture>>::repair(&plan, &mut aux, &mut bytes);
        assert_eq!(verdict, Verdict::Corrected);
        assert_eq!(u64::from_ne_bytes(bytes[8..16].try_into().unwrap()), 22);
    }

    #[test]
    fn parity_only_corruption_is_corrected_without_touching_data() {
        let plan = Plan::compute(MEMBERS, false);
        let mut aux = <Hamming as Scheme<Fixture>>::init(0);
        let bytes = [1u8; 32];
        <Hamming as Scheme<Fixture>>::generate(&plan, &mut aux, &bytes);
        aux.parity ^= 1;
        let mut bytes = bytes;
        let verdict = <Hamming as Scheme<Fixture>>::repair(&plan, &mut aux, &mut bytes);
        assert_eq!(verdict, Verdict::Corrected);
        assert!(<Hamming as Scheme<Fixture>>::verify(&plan, &aux, &bytes));
    }
}
