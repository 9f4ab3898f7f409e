// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Word-wise primitives (C3): CRC32C, two's-complement sum, XOR sum,
//! Hamming parity-matrix column rotation, and bulk memcpy/memcmp.
//!
//! All functions here operate on plain `&[u8]` slices rather than typed
//! pointers: every caller in this crate first obtains a target's bytes
//! through the single `unsafe` boundary in [`crate::protected`], so
//! everything below this layer is safe code.

use zerocopy::byteorder::native_endian::U64;
use zerocopy::FromBytes;

use crate::layout::{Plan, WORD};

/// Reads up to 8 bytes from `chunk` as a native-endian word, zero-extended.
///
/// Used by the Hamming overall-parity fold to handle a short trailing
/// chunk the same way a full 8-byte chunk would be folded, without
/// reading out of bounds.
fn read_word_zero_extended(chunk: &[u8]) -> u64 {
    if chunk.len() == 8 {
        U64::read_from_bytes(chunk).unwrap().get()
    } else {
        let mut buf = [0u8; 8];
        buf[..chunk.len()].copy_from_slice(chunk);
        U64::read_from_bytes(&buf).unwrap().get()
    }
}

/// Reads `chunk` (1, 2, 4 or 8 bytes, little end first) as a
/// sign-extended two's-complement `i64`.
fn read_word_sign_extended(chunk: &[u8]) -> i64 {
    let mut buf = [0u8; 8];
    let len = chunk.len();
    buf[..len].copy_from_slice(chunk);
    if len < 8 && len > 0 && chunk[len - 1] & 0x80 != 0 {
        buf[len..].fill(0xFF);
    }
    i64::from_ne_bytes(buf)
}

/// Two's-complement sum (§4.3.1): folds each participating member of
/// `plan` independently, from its own packed byte range in `packed`,
/// sign-extending a member narrower than a machine word to its own
/// natural width rather than treating the whole packed region as one
/// undifferentiated byte stream.
///
/// `seed` is the per-target hash (instance) or the static constant `1`
/// (static variant) that combats zero blindness for the empty/all-zero
/// case.
pub fn sum_fold(seed: u64, plan: &Plan, packed: &[u8]) -> u64 {
    let mut acc = seed;
    for p in plan.iter() {
        let bytes = &packed[p.shadow_offset..p.shadow_offset + p.member.size];
        let chunk_size = core::cmp::min(WORD, p.member.size.max(1));
        for chunk in bytes.chunks(chunk_size) {
            acc = acc.wrapping_add(read_word_sign_extended(chunk) as u64);
        }
    }
    acc
}

/// XOR-fold (used by the Hamming overall-parity word) over `bytes`.
pub fn xor_fold(seed: u64, bytes: &[u8]) -> u64 {
    let mut acc = seed;
    for chunk in bytes.chunks(8) {
        acc ^= read_word_zero_extended(chunk);
    }
    acc
}

/// CRC32C (reflected Castagnoli, poly 0x1EDC6F41) lookup table, generated
/// at compile time via the standard reflected-polynomial construction.
const CRC32C_TABLE: [u32; 256] = {
    const POLY: u32 = 0x82F6_3B78; // reflected 0x1EDC6F41
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u32;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 1 != 0 {
                (crc >> 1) ^ POLY
            } else {
                crc >> 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
};

/// CRC32C over `bytes`, continuing from `crc` (already inverted/XORed
/// state, i.e. pass `0xFFFF_FFFF` to start a new computation per §4.3.2).
///
/// The original reaches for hardware `crc32` instructions where available
/// and falls back to a narrower-width software table otherwise; this port
/// keeps the pluggability (§9 "Hardware CRC intrinsics") at the call site:
/// [`crc32c_hw`] is tried first on `x86_64`, falling back to this table.
pub fn crc32c_sw(mut crc: u32, bytes: &[u8]) -> u32 {
    for &byte in bytes {
        let idx = ((crc ^ byte as u32) & 0xFF) as usize;
        crc = (crc >> 8) ^ CRC32C_TABLE[idx];
    }
    crc
}

/// Hardware-accelerated CRC32C on `x86_64` (SSE4.2 `crc32` instruction),
/// software fallback everywhere else. Matches the reflected-Castagnoli
/// polynomial computed by [`crc32c_sw`] bit-for-bit.
///
/// Runtime feature detection needs `std`; builds without it (e.g.
/// bare-metal targets) always take the software path.
#[cfg(all(target_arch = "x86_64", feature = "std"))]
pub fn crc32c(crc: u32, bytes: &[u8]) -> u32 {
    if !std::is_x86_feature_detected!("sse4.2") {
        return crc32c_sw(crc, bytes);
    }
    // SAFETY: guarded by the `sse4.2` runtime feature check above; the
    // intrinsics only read `bytes`, performing no unaligned access wider
    // than the slice itself guarantees via `chunks`.
    unsafe { crc32c_hw(crc, bytes) }
}

/// Software-only CRC32C on non-x86_64 targets, or `x86_64` without `std`
/// (no runtime feature detection available).
#[cfg(not(all(target_arch = "x86_64", feature = "std")))]
pub fn crc32c(crc: u32, bytes: &[u8]) -> u32 {
    crc32c_sw(crc, bytes)
}

/// CRC32C over each participating member of `plan` in turn (§4.3.2:
/// "per-word processing... byte/halfword/word/doubleword variants"),
/// rather than over the packed region as one undifferentiated byte
/// stream. This skips inter-member alignment padding entirely, so it is
/// not simply `crc32c` over the packed buffer with the gaps left in —
/// only each member's own bytes ever feed the CRC.
pub fn crc32c_fold(crc_init: u32, plan: &Plan, packed: &[u8]) -> u32 {
    let mut crc = crc_init;
    for p in plan.iter() {
        let bytes = &packed[p.shadow_offset..p.shadow_offset + p.member.size];
        crc = crc32c(crc, bytes);
    }
    crc
}

#[cfg(all(target_arch = "x86_64", feature = "std"))]
#[target_feature(enable = "sse4.2")]
unsafe fn crc32c_hw(mut crc: u32, bytes: &[u8]) -> u32 {
    use core::arch::x86_64::{_mm_crc32_u8, _mm_crc32_u32, _mm_crc32_u64};

    let mut chunks = bytes.chunks_exact(8);
    for chunk in &mut chunks {
        let word = u64::from_ne_bytes(chunk.try_into().unwrap());
        // SAFETY: caller (crc32c) verified SSE4.2 support.
        crc = unsafe { _mm_crc32_u64(crc as u64, word) as u32 };
    }
    let mut rest = chunks.remainder();
    if rest.len() >= 4 {
        let word = u32::from_ne_bytes(rest[..4].try_into().unwrap());
        // SAFETY: caller (crc32c) verified SSE4.2 support.
        crc = unsafe { _mm_crc32_u32(crc, word) };
        rest = &rest[4..];
    }
    for &byte in rest {
        // SAFETY: caller (crc32c) verified SSE4.2 support.
        crc = unsafe { _mm_crc32_u8(crc, byte) };
    }
    crc
}

/// Returns the next bit pattern with the same population count as `v`
/// (Gosper's hack), used to step a Hamming parity-matrix column to the
/// next candidate (§4.3.5).
pub const fn next_same_popcount(v: u32) -> u32 {
    let c = v & v.wrapping_neg();
    let r = v.wrapping_add(c);
    (((r ^ v) >> 2) / c) | r
}

/// Generates the parity-matrix column assigned to machine-word position
/// `index`, within a `dim`-bit redundancy space (§4.3.5).
///
/// Columns start at the lexicographically smallest weight-≥2 pattern
/// (`0b11`) and step via [`next_same_popcount`]; on overflowing past
/// `2^dim` the popcount increases by one and the scan restarts. Because
/// this is a pure function of `(dim, index)`, `generate` and `repair` -
/// call it independently and always agree (§4.3.5 "reused across generate
/// and repair").
pub const fn hamming_column(dim: u32, index: usize) -> u32 {
    let limit: u32 = 1 << dim;
    let mut popcount: u32 = 2;
    let mut seen: usize = 0;
    let mut value: u32 = (1 << popcount) - 1;
    loop {
        if value < limit {
            if seen == index {
                return value;
            }
            seen += 1;
            let next = next_same_popcount(value);
            if next < limit {
                value = next;
                continue;
            }
        }
        popcount += 1;
        assert!(popcount <= dim, "hamming_column: index exceeds capacity for dim");
        value = (1 << popcount) - 1;
    }
}

/// Smallest `dim` (number of redundancy words) satisfying
/// `members + dim + 1 <= 2^dim` (§4.3.5).
pub const fn hamming_dim(members: usize) -> u32 {
    let mut dim: u32 = 1;
    while (members as u64) + dim as u64 + 1 > (1u64 << dim) {
        dim += 1;
    }
    dim
}

/// Byte-for-byte comparison, returning the index of the first mismatching
/// byte, if any. Used by TMR's `check` (§4.3.4).
pub fn memcmp(a: &[u8], b: &[u8]) -> Option<usize> {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b.iter()).position(|(x, y)| x != y)
}
