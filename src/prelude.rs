//! LocoNet crate prelude
//
// https://github.com/rust-iot/rust-loconet
// Copyright 2021 Ryan Kurte

pub use crate::Ticks;

pub use crate::error::Error;

pub use crate::link::{Config, LinkLayer, Stats};

pub use crate::packet::{Packet, PACKET_SIZE_MAX};

pub use crate::pool::{PacketHandle, TxDoneCb, TxResult, POOL_PACKETS};

pub use crate::phy::{Phy, TxIrq};

pub use crate::timer::Timer as CdTimer;

pub use crate::opc::{Message, Opcode};

#[cfg(feature = "critical-section")]
pub use crate::sync::SharedLink;
