//! LocoNet link layer for rust IoT devices.
//!
//! Turns the shared, collision-prone LocoNet bus into a queued packet
//! service: carrier-sense transmission with CD backoff and bounded
//! retries, interrupt-driven receive framing with checksum validation,
//! and a fixed pool of packet buffers handed between interrupt and
//! mainloop context without allocation.
//
// https://github.com/rust-iot/rust-loconet
// Copyright 2021 Ryan Kurte

#![no_std]

#[cfg(any(test, feature="std"))]
extern crate std;

pub mod error;

pub mod packet;

pub mod queue;

pub mod pool;

pub mod phy;

pub mod timer;

pub mod link;

pub mod opc;

#[cfg(feature = "critical-section")]
pub mod sync;

pub mod prelude;


/// Timestamps are 16-bit CD backoff timer ticks (10 us each)
pub type Ticks = u16;
