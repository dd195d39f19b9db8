//! LocoNet bus interface.
//
// https://github.com/rust-iot/rust-loconet
// Copyright 2021 Ryan Kurte

/// Transmit interrupt source selection.
///
/// Mirrors the two USART interrupt phases of a transmission: one
/// callback per byte accepted into the shift register, then one when
/// the final byte has fully left the wire.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum TxIrq {
    /// No transmit interrupts
    Off,
    /// Request `on_byte_consumed` when the data register empties
    DataEmpty,
    /// Request `on_transmit_complete` when the last byte has shifted
    /// out. Selecting this clears any pending completion flag and
    /// stops `DataEmpty` delivery.
    Complete,
}

/// Bus transceiver and collision detection front end.
///
/// The comparator/logic fabric that produces the collision flag, the
/// asynchronous serial transceiver and the XDIR arbitration line are
/// all hardware; implementations are thin register accessors and are
/// infallible. The implementation is responsible for routing the
/// corresponding interrupts back into the link layer's `on_*` methods.
pub trait Phy {
    /// Collision detection flag.
    ///
    /// Set by the front end when a transmitted bit did not match the
    /// bus; sticky until cleared.
    fn collision(&mut self) -> bool;

    /// Clear the collision detection flag
    fn collision_clear(&mut self);

    /// Drive the XDIR bus arbitration output.
    ///
    /// Asserted only while this node is actively transmitting.
    fn set_xdir(&mut self, active: bool);

    /// Write one byte to the transceiver data register
    fn send_byte(&mut self, b: u8);

    /// Select which transmit interrupt is delivered
    fn set_tx_irq(&mut self, irq: TxIrq);
}

#[cfg(any(test, feature="mocks"))]
pub mod mock {
    use std::sync::{Arc, Mutex};
    use std::vec::Vec;

    use super::TxIrq;

    #[derive(Debug)]
    struct State {
        collision: bool,
        xdir: bool,
        irq: TxIrq,
        sent: Vec<u8>,
    }

    /// Mock bus implementation to assist with testing
    #[derive(Clone, Debug)]
    pub struct MockPhy(Arc<Mutex<State>>);

    impl MockPhy {
        pub fn new() -> Self {
            Self(Arc::new(Mutex::new(State {
                collision: false,
                xdir: false,
                irq: TxIrq::Off,
                sent: Vec::new(),
            })))
        }

        /// Raise the collision flag, as the comparator front end would
        pub fn set_collision(&self) {
            self.0.lock().unwrap().collision = true;
        }

        pub fn xdir(&self) -> bool {
            self.0.lock().unwrap().xdir
        }

        pub fn tx_irq(&self) -> TxIrq {
            self.0.lock().unwrap().irq
        }

        /// Take the bytes written to the transceiver so far
        pub fn take_sent(&self) -> Vec<u8> {
            core::mem::take(&mut self.0.lock().unwrap().sent)
        }
    }

    impl super::Phy for MockPhy {
        fn collision(&mut self) -> bool {
            self.0.lock().unwrap().collision
        }

        fn collision_clear(&mut self) {
            self.0.lock().unwrap().collision = false;
        }

        fn set_xdir(&mut self, active: bool) {
            self.0.lock().unwrap().xdir = active;
        }

        fn send_byte(&mut self, b: u8) {
            self.0.lock().unwrap().sent.push(b);
        }

        fn set_tx_irq(&mut self, irq: TxIrq) {
            self.0.lock().unwrap().irq = irq;
        }
    }
}
