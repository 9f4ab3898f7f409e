// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Runs three of this crate's worked examples: a SUM+DMR-protected
//! `Rectangle`, a Hamming-protected `Square`, and a CRC+DMR-protected
//! process-wide `Circle` singleton.

use gop::{testing, Protect, Protected, StaticProtected, Target, Verdict};

#[repr(C)]
#[derive(Protect)]
struct Rectangle {
    width: i64,
    height: i64,
}

impl Target for Rectangle {}

#[repr(C)]
#[derive(Protect)]
struct Square {
    side: i64,
    diagonal: i64,
}

impl Target for Square {}

#[repr(C)]
#[derive(Protect)]
struct Circle {
    radius: i32,
    instances: i32,
}

impl Target for Circle {
    const SYNCHRONIZED: bool = true;
}

static CIRCLE: StaticProtected<Circle, gop::scheme::crc_dmr::CrcDmr> =
    StaticProtected::new(Circle {
        radius: 0,
        instances: 1,
    });

fn main() {
    env_logger::init();

    println!("--- Rectangle (SUM+DMR) ---");
    let mut rectangle = Protected::<Rectangle, gop::scheme::sum_dmr::SumDmr>::new(
        Rectangle {
            width: 2,
            height: 3,
        },
        1,
    );
    println!(
        "before fault: {} x {}",
        rectangle.get().width,
        rectangle.get().height
    );
    testing::flip_bit(rectangle.corrupt_for_testing(), 8, 1);
    println!(
        "after fault:  {} x {}",
        rectangle.get().width,
        rectangle.get().height
    );
    report("Rectangle", rectangle.check());
    println!(
        "after check:  {} x {}",
        rectangle.get().width,
        rectangle.get().height
    );

    println!("\n--- Square (Hamming) ---");
    let mut square = Protected::<Square, gop::scheme::hamming::Hamming>::new(
        Square {
            side: 5,
            diagonal: 7,
        },
        1,
    );
    testing::flip_bit(square.corrupt_for_testing(), 0, 2);
    println!("after fault:  side = {}", square.get().side);
    report("Square", square.check());
    println!("after check:  side = {}", square.get().side);

    println!("\n--- Circle.single (CRC+DMR, static) ---");
    println!(
        "before fault: radius = {}, instances = {}",
        CIRCLE.get().radius,
        CIRCLE.get().instances
    );
    testing::flip_bit(CIRCLE.corrupt_for_testing(), 0, 3);
    report("Circle.single", CIRCLE.check());
    println!(
        "after check:  radius = {}, instances = {}",
        CIRCLE.get().radius,
        CIRCLE.get().instances
    );

    println!("\n--- Circle.single: every byte corrupted (no recovery possible) ---");
    for byte_offset in 0..core::mem::size_of::<Circle>() {
        for bit in 0..8 {
            testing::flip_bit(CIRCLE.corrupt_for_testing(), byte_offset, bit);
        }
    }
    report("Circle.single", CIRCLE.check());
}

fn report(label: &str, verdict: Verdict) {
    match verdict {
        Verdict::Ok => println!("{label}: check passed, no corruption detected"),
        Verdict::Corrected => println!("{label}: corruption detected and corrected"),
        Verdict::Unrecoverable => println!("{label}: corruption detected, unrecoverable"),
    }
}
