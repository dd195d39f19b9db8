//! CD backoff timer API.
//
// https://github.com/rust-iot/rust-loconet
// Copyright 2021 Ryan Kurte

use crate::Ticks;

/// Timer trait provides access to the CD backoff counter.
///
/// The counter is hardware-gated: it runs (10 us per tick) only while
/// the bus is idle, and restarts from zero when bus activity ends, so
/// its value is "ticks of quiet time so far". A compare match fires
/// the link layer's `on_timer_fired` callback once armed.
///
/// `random` exposes a free-running counter as a weak entropy source
/// for backoff jitter. No statistical quality is assumed; only the low
/// couple of bits are ever used.
pub trait Timer {
    /// Current backoff counter value
    fn ticks(&self) -> Ticks;

    /// Whether the backoff counter is currently counting (bus idle)
    fn running(&self) -> bool;

    /// Arm the compare match to fire at `deadline` ticks
    fn arm(&mut self, deadline: Ticks);

    /// Disarm the compare match
    fn disarm(&mut self);

    /// Free-running counter readout
    fn random(&mut self) -> u16;
}

#[cfg(any(test, feature="mocks"))]
pub mod mock {
    use std::sync::{Arc, Mutex};

    use crate::Ticks;

    #[derive(Debug)]
    struct State {
        ticks: Ticks,
        running: bool,
        armed: Option<Ticks>,
        random: u16,
    }

    /// Mock timer implementation to assist with testing
    #[derive(Clone, Debug)]
    pub struct MockTimer(Arc<Mutex<State>>);

    impl MockTimer {
        pub fn new() -> Self {
            Self(Arc::new(Mutex::new(State {
                ticks: 0,
                running: false,
                armed: None,
                random: 0,
            })))
        }

        pub fn set_ticks(&self, val: Ticks) {
            self.0.lock().unwrap().ticks = val;
        }

        pub fn set_running(&self, running: bool) {
            self.0.lock().unwrap().running = running;
        }

        pub fn set_random(&self, val: u16) {
            self.0.lock().unwrap().random = val;
        }

        /// Currently armed compare match, if any
        pub fn armed(&self) -> Option<Ticks> {
            self.0.lock().unwrap().armed
        }
    }

    impl super::Timer for MockTimer {
        fn ticks(&self) -> Ticks {
            self.0.lock().unwrap().ticks
        }

        fn running(&self) -> bool {
            self.0.lock().unwrap().running
        }

        fn arm(&mut self, deadline: Ticks) {
            self.0.lock().unwrap().armed = Some(deadline);
        }

        fn disarm(&mut self) {
            self.0.lock().unwrap().armed = None;
        }

        fn random(&mut self) -> u16 {
            self.0.lock().unwrap().random
        }
    }
}
