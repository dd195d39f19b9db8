//! LocoNet opcodes and message shapes.
//!
//! The frame shapes here are a closed set of fixed layouts over the
//! positional packet buffer; they are modelled as a tagged enum
//! rather than overlapping views. Encoding fills the payload bytes
//! only; the checksum is written by
//! [`send`][crate::link::LinkLayer::send].
//
// https://github.com/rust-iot/rust-loconet
// Copyright 2021 Ryan Kurte

use strum::Display;

use crate::error::Error;
use crate::packet::Packet;

/// Known LocoNet opcodes
#[derive(Copy, Clone, Debug, PartialEq, Display)]
pub enum Opcode {
    // 2-byte messages
    #[strum(serialize = "OPC_BUSY")]
    Busy = 0x81,
    #[strum(serialize = "OPC_GPOFF")]
    GpOff = 0x82,
    #[strum(serialize = "OPC_GPON")]
    GpOn = 0x83,
    #[strum(serialize = "OPC_IDLE")]
    Idle = 0x85,

    // 4-byte messages
    #[strum(serialize = "OPC_LOCO_SPD")]
    LocoSpd = 0xa0,
    #[strum(serialize = "OPC_LOCO_DIRF")]
    LocoDirf = 0xa1,
    #[strum(serialize = "OPC_LOCO_SND")]
    LocoSnd = 0xa2,
    #[strum(serialize = "OPC_SW_REQ")]
    SwReq = 0xb0,
    #[strum(serialize = "OPC_SW_REP")]
    SwRep = 0xb1,
    #[strum(serialize = "OPC_INPUT_REP")]
    InputRep = 0xb2,
    #[strum(serialize = "OPC_LONG_ACK")]
    LongAck = 0xb4,
    #[strum(serialize = "OPC_SLOT_STAT1")]
    SlotStat1 = 0xb5,
    #[strum(serialize = "OPC_CONSIST_FUNC")]
    ConsistFunc = 0xb6,
    #[strum(serialize = "OPC_UNLINK_SLOTS")]
    UnlinkSlots = 0xb8,
    #[strum(serialize = "OPC_LINK_SLOTS")]
    LinkSlots = 0xb9,
    #[strum(serialize = "OPC_MOVE_SLOTS")]
    MoveSlots = 0xba,
    #[strum(serialize = "OPC_RQ_SL_DATA")]
    RqSlData = 0xbb,
    #[strum(serialize = "OPC_SW_STATE")]
    SwState = 0xbc,
    #[strum(serialize = "OPC_SW_ACK")]
    SwAck = 0xbd,
    #[strum(serialize = "OPC_LOCO_ADR")]
    LocoAdr = 0xbf,

    // Variable length messages
    #[strum(serialize = "OPC_PEER_XFER")]
    PeerXfer = 0xe5,
    #[strum(serialize = "OPC_SL_RD_DATA")]
    SlRdData = 0xe7,
    #[strum(serialize = "OPC_IMM_PACKET")]
    ImmPacket = 0xed,
    #[strum(serialize = "OPC_WR_SL_DATA")]
    WrSlData = 0xef,
}

impl Opcode {
    /// Resolve an opcode byte, if known
    pub fn from_op(op: u8) -> Option<Opcode> {
        use Opcode::*;

        let o = match op {
            0x81 => Busy,
            0x82 => GpOff,
            0x83 => GpOn,
            0x85 => Idle,
            0xa0 => LocoSpd,
            0xa1 => LocoDirf,
            0xa2 => LocoSnd,
            0xb0 => SwReq,
            0xb1 => SwRep,
            0xb2 => InputRep,
            0xb4 => LongAck,
            0xb5 => SlotStat1,
            0xb6 => ConsistFunc,
            0xb8 => UnlinkSlots,
            0xb9 => LinkSlots,
            0xba => MoveSlots,
            0xbb => RqSlData,
            0xbc => SwState,
            0xbd => SwAck,
            0xbf => LocoAdr,
            0xe5 => PeerXfer,
            0xe7 => SlRdData,
            0xed => ImmPacket,
            0xef => WrSlData,
            _ => return None,
        };

        Some(o)
    }
}

/// Decoded LocoNet message.
///
/// Covers the switch/feedback shapes this stack works with; anything
/// else decodes to `Unknown` with the raw packet still available to
/// the caller.
///
/// Addresses are 1-based as printed on the layout: 1..=2048 for
/// switches, 1..=4096 for inputs.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Message {
    /// Master busy
    Busy,
    /// Global power off
    GpOff,
    /// Global power on
    GpOn,
    /// Force idle / emergency stop
    ForceIdle,
    /// Request switch function
    SwReq { adr: u16, dir: bool, on: bool },
    /// Switch sensor report
    SwRep { adr: u16, lt: bool, ic: bool, sel: bool },
    /// Occupancy sensor report
    InputRep { adr: u16, l: bool, x: bool },
    /// Long acknowledge of an immediately preceding opcode
    LongAck { lopc: u8, ack1: u8 },
    /// Request switch state
    SwState { adr: u16, dir: bool, on: bool },
    /// Request switch, with acknowledge
    SwAck { adr: u16, dir: bool, on: bool },
    /// No decoder for this opcode
    Unknown(u8),
}

/// Common 11-bit address field: 7 low bits in byte 1, 4 high bits in
/// the low nibble of byte 2, 1-based on the wire
fn decode_adr(b1: u8, b2: u8) -> u16 {
    (u16::from(b1 & 0x7f) | (u16::from(b2 & 0x0f) << 7)) + 1
}

fn encode_adr(adr: u16) -> (u8, u8) {
    let a = adr.saturating_sub(1);
    ((a & 0x7f) as u8, ((a >> 7) & 0x0f) as u8)
}

/// Switch request family share one layout
fn encode_sw(p: &mut Packet, op: Opcode, adr: u16, dir: bool, on: bool) {
    let (adrl, adrh) = encode_adr(adr);
    let raw = p.raw_mut();
    raw[0] = op as u8;
    raw[1] = adrl;
    raw[2] = adrh | (u8::from(on) << 4) | (u8::from(dir) << 5);
}

impl Message {
    /// Decode the message shape of a received packet
    pub fn decode(p: &Packet) -> Message {
        let raw = p.raw();
        let (b1, b2) = (raw[1], raw[2]);

        let op = match Opcode::from_op(p.op()) {
            Some(op) => op,
            None => return Message::Unknown(p.op()),
        };

        match op {
            Opcode::Busy => Message::Busy,
            Opcode::GpOff => Message::GpOff,
            Opcode::GpOn => Message::GpOn,
            Opcode::Idle => Message::ForceIdle,
            Opcode::SwReq => Message::SwReq {
                adr: decode_adr(b1, b2),
                dir: b2 & 0x20 != 0,
                on: b2 & 0x10 != 0,
            },
            Opcode::SwRep => Message::SwRep {
                adr: decode_adr(b1, b2),
                lt: b2 & 0x10 != 0,
                ic: b2 & 0x20 != 0,
                sel: b2 & 0x40 != 0,
            },
            Opcode::InputRep => {
                // Input addresses pack an extra low bit into the
                // status byte, doubling the range
                let base = u16::from(b1 & 0x7f) | (u16::from(b2 & 0x0f) << 7);
                let i = u16::from(b2 & 0x20 != 0);
                Message::InputRep {
                    adr: (base << 1) + i + 1,
                    l: b2 & 0x10 != 0,
                    x: b2 & 0x40 != 0,
                }
            }
            Opcode::LongAck => Message::LongAck { lopc: b1, ack1: b2 },
            Opcode::SwState => Message::SwState {
                adr: decode_adr(b1, b2),
                dir: b2 & 0x20 != 0,
                on: b2 & 0x10 != 0,
            },
            Opcode::SwAck => Message::SwAck {
                adr: decode_adr(b1, b2),
                dir: b2 & 0x20 != 0,
                on: b2 & 0x10 != 0,
            },
            _ => Message::Unknown(p.op()),
        }
    }

    /// Encode this message into a packet buffer.
    ///
    /// Writes opcode and payload bytes only; the checksum is added
    /// when the packet is sent.
    pub fn encode(&self, p: &mut Packet) -> Result<(), Error> {
        match *self {
            Message::Busy => p.raw_mut()[0] = Opcode::Busy as u8,
            Message::GpOff => p.raw_mut()[0] = Opcode::GpOff as u8,
            Message::GpOn => p.raw_mut()[0] = Opcode::GpOn as u8,
            Message::ForceIdle => p.raw_mut()[0] = Opcode::Idle as u8,
            Message::SwReq { adr, dir, on } => encode_sw(p, Opcode::SwReq, adr, dir, on),
            Message::SwState { adr, dir, on } => encode_sw(p, Opcode::SwState, adr, dir, on),
            Message::SwAck { adr, dir, on } => encode_sw(p, Opcode::SwAck, adr, dir, on),
            Message::SwRep { adr, lt, ic, sel } => {
                let (adrl, adrh) = encode_adr(adr);
                let raw = p.raw_mut();
                raw[0] = Opcode::SwRep as u8;
                raw[1] = adrl;
                raw[2] = adrh
                    | (u8::from(lt) << 4)
                    | (u8::from(ic) << 5)
                    | (u8::from(sel) << 6);
            }
            Message::InputRep { adr, l, x } => {
                let a = adr.saturating_sub(1);
                let raw = p.raw_mut();
                raw[0] = Opcode::InputRep as u8;
                raw[1] = ((a >> 1) & 0x7f) as u8;
                raw[2] = ((a >> 8) & 0x0f) as u8
                    | (u8::from(l) << 4)
                    | (((a & 0x01) as u8) << 5)
                    | (u8::from(x) << 6);
            }
            Message::LongAck { lopc, ack1 } => {
                let raw = p.raw_mut();
                raw[0] = Opcode::LongAck as u8;
                raw[1] = lopc & 0x7f;
                raw[2] = ack1 & 0x7f;
            }
            Message::Unknown(op) => return Err(Error::UnknownOpcode(op)),
        }

        Ok(())
    }
}
