//! LocoNet link layer engine.
//!
//! Owns the packet pool and the free/rx/tx/done queues, and runs the
//! two per-bus state machines: transmit (CD backoff, collision retry)
//! and receive (framing, checksum). Interrupt handlers are the `on_*`
//! methods; the embedding is expected to dispatch the hardware
//! interrupts into them. [`poll`][LinkLayer::poll] is the only method
//! the mainloop needs to call regularly, with no timing constraint.
//
// https://github.com/rust-iot/rust-loconet
// Copyright 2021 Ryan Kurte

use log::{debug, trace, warn};

use crate::error::Error;
use crate::packet::{Packet, PACKET_SIZE_MAX};
use crate::phy::{Phy, TxIrq};
use crate::pool::{PacketHandle, Pool, TxDoneCb, TxResult, POOL_PACKETS};
use crate::queue::Queue;
use crate::timer::Timer;
use crate::Ticks;

pub mod config;
pub use config::Config;

/// Receive framing state
#[derive(Copy, Clone, Debug, PartialEq)]
enum RxState {
    Idle,
    Data,
}

/// Link layer statistics
#[derive(Debug, Clone, PartialEq)]
pub struct Stats {
    pub tx_max_attempts: u8,
    pub tx_total: u32,
    pub tx_success: u32,
    pub tx_fail: u32,
    pub tx_collisions: u32,
    pub rx_success: u32,
    pub rx_checksum: u32,
    pub rx_partial: u32,
    pub rx_extradata: u32,
    pub rx_collisions: u32,
    pub rx_nomem: u32,
}

impl Stats {
    pub fn new() -> Self {
        Self {
            tx_max_attempts: 0,
            tx_total: 0,
            tx_success: 0,
            tx_fail: 0,
            tx_collisions: 0,
            rx_success: 0,
            rx_checksum: 0,
            rx_partial: 0,
            rx_extradata: 0,
            rx_collisions: 0,
            rx_nomem: 0,
        }
    }
}

/// LocoNet link layer.
///
/// Generic over the bus interface (P) and CD backoff timer (T).
///
/// All methods take `&mut self`: when the engine is shared between
/// interrupt handlers and the mainloop, the embedding must provide
/// exclusive access for each call (see the `sync` module).
pub struct LinkLayer<P, T> {
    phy: P,
    timer: T,
    config: Config,

    pool: Pool,
    queue_rx: Queue,
    queue_tx: Queue,
    queue_done: Queue,

    // Transmit session, valid while tx_buf is set
    tx_buf: Option<u8>,
    tx_len: u8,
    tx_idx: u8,
    tx_delay: Ticks,
    tx_attempt: u8,

    // Receive session
    rx_state: RxState,
    rx_buf: Option<u8>,
    rx_idx: u8,
    rx_cksum: u8,
    rx_len: u8,

    stats: Stats,
}

impl<P, T> LinkLayer<P, T>
where
    P: Phy,
    T: Timer,
{
    /// Create a new link layer over the provided bus and timer.
    ///
    /// Call before interrupts are enabled; hardware setup belongs to
    /// the `Phy`/`Timer` implementations.
    pub fn new(phy: P, timer: T, config: Config) -> Self {
        debug!("Link layer init with {} packet buffers", POOL_PACKETS);

        Self {
            phy,
            timer,
            config,

            pool: Pool::new(),
            queue_rx: Queue::new(),
            queue_tx: Queue::new(),
            queue_done: Queue::new(),

            tx_buf: None,
            tx_len: 0,
            tx_idx: 0,
            tx_delay: 0,
            tx_attempt: 0,

            rx_state: RxState::Idle,
            rx_buf: None,
            rx_idx: 0,
            rx_cksum: 0,
            rx_len: 0,

            stats: Stats::new(),
        }
    }

    /// Get a free packet buffer, or None if the pool is exhausted.
    ///
    /// The buffer may contain data from earlier use. Return it with
    /// [`packet_free`][Self::packet_free] or hand it to
    /// [`send`][Self::send].
    pub fn packet_get(&mut self) -> Option<PacketHandle> {
        let idx = self.pool.acquire()?;
        Some(PacketHandle(idx))
    }

    /// Return a packet buffer to the pool
    pub fn packet_free(&mut self, handle: PacketHandle) {
        self.pool.release(handle.index());
    }

    /// Access the packet behind a handle
    pub fn packet(&self, handle: &PacketHandle) -> &Packet {
        &self.pool.slot(handle.index()).packet
    }

    /// Mutably access the packet behind a handle
    pub fn packet_mut(&mut self, handle: &PacketHandle) -> &mut Packet {
        &mut self.pool.slot_mut(handle.index()).packet
    }

    /// Length of the packet behind a handle, including checksum
    pub fn packet_len(&self, handle: &PacketHandle) -> u8 {
        self.pool.slot(handle.index()).packet.len()
    }

    /// Queue a packet for transmission.
    ///
    /// Masks payload bytes to 7 bits and writes the checksum in place,
    /// then returns immediately; the packet is sent as soon as the bus
    /// allows. Completion is reported through the optional callback,
    /// invoked from [`poll`][Self::poll] with `ctx` and the result.
    ///
    /// Fails without losing the buffer if the length field resolves
    /// outside the valid 2..=127 range (only possible for the
    /// variable-length opcode class).
    pub fn send(
        &mut self,
        handle: PacketHandle,
        cb: Option<TxDoneCb>,
        ctx: usize,
    ) -> Result<(), Error> {
        let idx = handle.index();

        let len = self.pool.slot(idx).packet.len();
        if len < 2 || usize::from(len) > PACKET_SIZE_MAX {
            return Err(Error::InvalidLength(handle));
        }

        trace!("Queueing {} byte packet (op {:#04x})", len, self.pool.slot(idx).packet.op());

        let entry = self.pool.slot_mut(idx);
        entry.packet.seal();
        entry.cb = cb;
        entry.ctx = ctx;

        self.queue_tx.push(self.pool.slots_mut(), idx);

        Ok(())
    }

    /// Take the next received packet, if any.
    ///
    /// Packets are delivered in arrival order. The caller must
    /// eventually return the handle with [`packet_free`][Self::packet_free].
    pub fn receive(&mut self) -> Option<PacketHandle> {
        let idx = self.queue_rx.pop(self.pool.slots_mut())?;
        Some(PacketHandle(idx))
    }

    /// Update the link layer.
    ///
    /// Call regularly from the mainloop. Promotes the next queued
    /// packet when the transmitter is idle, and drains at most one
    /// completed transmission (invoking its callback and returning the
    /// buffer to the pool) so a slow callback cannot monopolise the
    /// loop.
    pub fn poll(&mut self) {
        self.tx_update();
        self.tx_done_update();
    }

    /// Link layer statistics
    pub fn stats(&self) -> Stats {
        self.stats.clone()
    }

    /// Whether a transmission is currently in flight
    pub fn tx_busy(&self) -> bool {
        self.tx_buf.is_some()
    }

    /// Free packet buffers, O(n)
    pub fn free_count(&self) -> u8 {
        self.pool.free_len()
    }

    /// Received packets waiting for the application, O(n)
    pub fn rx_pending(&self) -> u8 {
        self.queue_rx.len(self.pool.slots())
    }

    /// Packets queued for transmission, O(n)
    pub fn tx_pending(&self) -> u8 {
        self.queue_tx.len(self.pool.slots())
    }

    /// Completed transmissions not yet drained by poll, O(n)
    pub fn done_pending(&self) -> u8 {
        self.queue_done.len(self.pool.slots())
    }

    /// Timer compare match: the CD backoff window has elapsed, start
    /// transmitting.
    pub fn on_timer_fired(&mut self) {
        self.timer.disarm();
        self.tx_start();
    }

    /// Transceiver data register empty: feed the next byte.
    ///
    /// On a detected collision no further bytes are queued; the byte
    /// already in the shift register is allowed to finish so the bus
    /// returns to idle cleanly.
    pub fn on_byte_consumed(&mut self) {
        let idx = match self.tx_buf {
            Some(idx) => idx,
            None => return,
        };

        if !self.phy.collision() {
            let b = self.pool.slot(idx).packet.raw()[usize::from(self.tx_idx)];
            self.phy.send_byte(b);
            self.tx_idx += 1;

            if self.tx_idx < self.tx_len {
                return;
            }
        }

        // Last byte has been written, or a collision cut the frame
        // short: wait for the shift register to drain
        self.phy.set_tx_irq(TxIrq::Complete);
    }

    /// Transceiver shift register empty: end of this attempt.
    ///
    /// Checks the collision flag to decide between success, a retry
    /// with a shrunken backoff window, and terminal failure.
    pub fn on_transmit_complete(&mut self) {
        self.phy.set_xdir(false);
        self.phy.set_tx_irq(TxIrq::Off);

        let idx = match self.tx_buf {
            Some(idx) => idx,
            None => return,
        };

        let mut fail = false;

        if self.phy.collision() {
            self.stats.tx_collisions = self.stats.tx_collisions.saturating_add(1);

            if self.tx_attempt < self.config.max_attempts {
                if self.tx_delay > self.config.backoff_min {
                    // Subtract 0.5 to 1 bit time from the window, and
                    // try again
                    let step = self.config.backoff_step + (self.timer.random() & 0x03);
                    self.tx_delay = self.tx_delay.saturating_sub(step);
                    if self.tx_delay < self.config.backoff_min {
                        self.tx_delay = self.config.backoff_min;
                    }
                }
                self.arm_backoff(self.tx_delay);
                return;
            }

            fail = true;
        }

        let entry = self.pool.slot_mut(idx);
        if fail {
            entry.res = TxResult::Fail;
            self.stats.tx_fail = self.stats.tx_fail.saturating_add(1);
        } else {
            entry.res = TxResult::Success;
            self.stats.tx_success = self.stats.tx_success.saturating_add(1);
        }

        if self.stats.tx_max_attempts < self.tx_attempt {
            self.stats.tx_max_attempts = self.tx_attempt;
        }

        // Hand the packet to the done queue for callback and freeing
        // outside interrupt context
        self.queue_done.push(self.pool.slots_mut(), idx);
        self.tx_buf = None;
    }

    /// Byte received from the bus.
    ///
    /// Runs the receive framing state machine. A byte with bit 7 set
    /// always restarts reception, even mid-frame; the dropped partial
    /// frame is only visible as a counter.
    pub fn on_byte_received(&mut self, data: u8, framing_error: bool) {
        if framing_error {
            // Framing error: restart rx packet
            self.rx_state = RxState::Idle;
            self.rx_idx = 0;
            self.stats.rx_collisions = self.stats.rx_collisions.saturating_add(1);
        }

        if data & 0x80 != 0 {
            // Always restart reception when receiving an opcode
            self.rx_state = RxState::Idle;
            if self.rx_idx != 0 {
                self.rx_idx = 0;
                self.stats.rx_partial = self.stats.rx_partial.saturating_add(1);
            }
        }

        match self.rx_state {
            RxState::Idle => {
                let idx = match self.rx_buf {
                    Some(idx) => idx,
                    None => match self.pool.acquire() {
                        Some(idx) => {
                            self.rx_buf = Some(idx);
                            idx
                        }
                        None => {
                            self.stats.rx_nomem = self.stats.rx_nomem.saturating_add(1);
                            return;
                        }
                    },
                };

                if data & 0x80 != 0 {
                    self.pool.slot_mut(idx).packet.raw_mut()[0] = data;
                    self.rx_cksum = data;
                    self.rx_idx = 1;
                    self.rx_state = RxState::Data;
                } else {
                    self.stats.rx_extradata = self.stats.rx_extradata.saturating_add(1);
                }
            }

            RxState::Data => {
                let idx = match self.rx_buf {
                    Some(idx) => idx,
                    None => {
                        self.rx_state = RxState::Idle;
                        self.rx_idx = 0;
                        return;
                    }
                };

                let packet = &mut self.pool.slot_mut(idx).packet;
                packet.raw_mut()[usize::from(self.rx_idx)] = data;
                self.rx_cksum ^= data;
                self.rx_idx += 1;

                if self.rx_idx == 2 {
                    self.rx_len = packet.len();
                }

                if self.rx_idx >= self.rx_len {
                    // Full packet received, check checksum
                    if self.rx_cksum == 0xff {
                        // Packet valid, hand to the rx queue; the held
                        // buffer stays out of the pool
                        self.queue_rx.push(self.pool.slots_mut(), idx);
                        self.rx_buf = None;
                        self.stats.rx_success = self.stats.rx_success.saturating_add(1);
                    } else {
                        // Discarded; the buffer is reused for the next
                        // frame
                        self.stats.rx_checksum = self.stats.rx_checksum.saturating_add(1);
                    }
                    self.rx_state = RxState::Idle;
                    self.rx_idx = 0;
                }
            }
        }
    }

    /// Start a transmission attempt
    fn tx_start(&mut self) {
        let idx = match self.tx_buf {
            Some(idx) => idx,
            None => return,
        };

        self.phy.collision_clear();
        self.phy.set_xdir(true);

        let b = self.pool.slot(idx).packet.raw()[0];
        self.phy.send_byte(b);
        self.tx_idx = 1;

        self.phy.set_tx_irq(TxIrq::DataEmpty);
        self.tx_attempt += 1;
    }

    /// Arm the backoff timer, pushing the deadline past the current
    /// count if it has already been reached
    fn arm_backoff(&mut self, deadline: Ticks) {
        let mut deadline = deadline;
        let now = self.timer.ticks();

        if now >= deadline.saturating_sub(1) {
            deadline = now.wrapping_add(2);
        }

        self.timer.arm(deadline);
    }

    /// Promote the next queued packet when the transmitter is idle
    fn tx_update(&mut self) {
        if self.tx_buf.is_some() {
            // Tx in progress
            return;
        }

        let idx = match self.queue_tx.pop(self.pool.slots_mut()) {
            Some(idx) => idx,
            None => return,
        };

        self.stats.tx_total = self.stats.tx_total.saturating_add(1);

        self.tx_len = self.pool.slot(idx).packet.len();
        self.tx_buf = Some(idx);
        self.tx_delay = self.config.backoff_max;
        self.tx_attempt = 0;

        debug!(
            "Promoting {} byte packet (op {:#04x}) for tx",
            self.tx_len,
            self.pool.slot(idx).packet.op()
        );

        // Transmit right away if the mandatory quiet time has already
        // passed, otherwise wait for the timer
        if self.timer.ticks() >= self.tx_delay && self.timer.running() {
            self.tx_start();
        } else {
            self.arm_backoff(self.tx_delay);
        }
    }

    /// Drain one completed transmission: callback, then free
    fn tx_done_update(&mut self) {
        let idx = match self.queue_done.pop(self.pool.slots_mut()) {
            Some(idx) => idx,
            None => return,
        };

        let entry = self.pool.slot(idx);
        let (cb, ctx, res) = (entry.cb, entry.ctx, entry.res);

        if res == TxResult::Fail {
            warn!("Packet tx failed (op {:#04x})", entry.packet.op());
        } else {
            trace!("Packet tx done (op {:#04x})", entry.packet.op());
        }

        if let Some(cb) = cb {
            cb(ctx, res);
        }

        self.pool.release(idx);
    }
}


#[cfg(test)]
mod test {
    use core::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

    use crate::phy::mock::MockPhy;
    use crate::timer::mock::MockTimer;

    use super::config::{CD_BACKOFF_MAX, CD_BACKOFF_MIN, TX_ATTEMPTS_MAX};
    use super::*;

    fn link() -> (LinkLayer<MockPhy, MockTimer>, MockPhy, MockTimer) {
        let phy = MockPhy::new();
        let timer = MockTimer::new();
        let link = LinkLayer::new(phy.clone(), timer.clone(), Config::default());
        (link, phy, timer)
    }

    /// Feed a sealed frame through the byte-consumed path after
    /// tx_start has pushed the first byte
    fn drive_tx_bytes(link: &mut LinkLayer<MockPhy, MockTimer>, len: u8) {
        for _ in 1..len {
            assert_eq!(link.tx_busy(), true);
            link.on_byte_consumed();
        }
    }

    #[test]
    fn tx_clean_first_attempt() {
        let _ = simplelog::SimpleLogger::init(log::LevelFilter::Debug, simplelog::Config::default());

        static RES: AtomicU8 = AtomicU8::new(0xff);
        static CTX: AtomicUsize = AtomicUsize::new(0);
        fn done(ctx: usize, res: TxResult) {
            CTX.store(ctx, Ordering::SeqCst);
            RES.store(res as u8, Ordering::SeqCst);
        }

        let (mut link, phy, timer) = link();

        let handle = link.packet_get().unwrap();
        let p = link.packet_mut(&handle);
        p.raw_mut()[0] = 0xb2;
        p.raw_mut()[1] = 0x12;
        p.raw_mut()[2] = 0x34;
        link.send(handle, Some(done), 0x55).unwrap();

        assert_eq!(link.tx_pending(), 1);

        // Bus busy (timer not running): promotion arms the full window
        link.poll();
        assert_eq!(link.tx_busy(), true);
        assert_eq!(timer.armed(), Some(CD_BACKOFF_MAX));
        assert!(phy.take_sent().is_empty());

        // Window elapses
        link.on_timer_fired();
        assert_eq!(timer.armed(), None);
        assert_eq!(phy.xdir(), true);
        assert_eq!(phy.tx_irq(), TxIrq::DataEmpty);

        drive_tx_bytes(&mut link, 4);
        assert_eq!(phy.tx_irq(), TxIrq::Complete);
        assert_eq!(phy.take_sent(), std::vec![0xb2, 0x12, 0x34, (!0xb2u8) ^ 0x12 ^ 0x34]);

        link.on_transmit_complete();
        assert_eq!(phy.xdir(), false);
        assert_eq!(link.tx_busy(), false);
        assert_eq!(link.done_pending(), 1);

        // Callback fires from poll, not from the interrupt path
        assert_eq!(RES.load(Ordering::SeqCst), 0xff);
        link.poll();
        assert_eq!(RES.load(Ordering::SeqCst), TxResult::Success as u8);
        assert_eq!(CTX.load(Ordering::SeqCst), 0x55);
        assert_eq!(link.free_count(), POOL_PACKETS as u8);

        let stats = link.stats();
        assert_eq!(stats.tx_total, 1);
        assert_eq!(stats.tx_success, 1);
        assert_eq!(stats.tx_fail, 0);
        assert_eq!(stats.tx_max_attempts, 1);
    }

    #[test]
    fn tx_immediate_when_bus_quiet() {
        let (mut link, phy, timer) = link();

        let handle = link.packet_get().unwrap();
        link.packet_mut(&handle).raw_mut()[0] = 0x81;
        link.send(handle, None, 0).unwrap();

        // Backoff counter already past the window: no timer round trip
        timer.set_running(true);
        timer.set_ticks(CD_BACKOFF_MAX);
        link.poll();

        assert_eq!(timer.armed(), None);
        assert_eq!(phy.xdir(), true);
        assert_eq!(phy.take_sent(), std::vec![0x81]);
    }

    #[test]
    fn tx_collision_retry_and_fail() {
        let (mut link, phy, timer) = link();

        let handle = link.packet_get().unwrap();
        link.packet_mut(&handle).raw_mut()[0] = 0x83;
        link.send(handle, None, 0).unwrap();

        timer.set_random(0x0002);
        link.poll();

        let mut last_window = CD_BACKOFF_MAX + 1;
        let mut attempts = 0u32;

        // Collide on every attempt
        loop {
            let armed = match timer.armed() {
                Some(deadline) => deadline,
                None => break,
            };

            // Window shrinks monotonically down to the floor
            assert!(armed < last_window || armed == CD_BACKOFF_MIN);
            assert!(armed >= CD_BACKOFF_MIN);
            last_window = armed;

            link.on_timer_fired();
            attempts += 1;

            phy.set_collision();
            link.on_byte_consumed();
            assert_eq!(phy.tx_irq(), TxIrq::Complete);
            link.on_transmit_complete();
        }

        assert_eq!(attempts, u32::from(TX_ATTEMPTS_MAX));
        assert_eq!(last_window, CD_BACKOFF_MIN);
        assert_eq!(link.tx_busy(), false);
        assert_eq!(link.done_pending(), 1);

        link.poll();
        assert_eq!(link.free_count(), POOL_PACKETS as u8);

        let stats = link.stats();
        assert_eq!(stats.tx_fail, 1);
        assert_eq!(stats.tx_success, 0);
        assert_eq!(stats.tx_collisions, u32::from(TX_ATTEMPTS_MAX));
        assert_eq!(stats.tx_max_attempts, TX_ATTEMPTS_MAX);
    }

    #[test]
    fn tx_collision_stops_remaining_bytes() {
        let (mut link, phy, timer) = link();

        let handle = link.packet_get().unwrap();
        let p = link.packet_mut(&handle);
        p.raw_mut()[0] = 0xa0;
        p.raw_mut()[1] = 0x01;
        p.raw_mut()[2] = 0x02;
        link.send(handle, None, 0).unwrap();

        timer.set_running(true);
        timer.set_ticks(CD_BACKOFF_MAX);
        link.poll();

        // First byte went out, then the front end flags a collision
        assert_eq!(phy.take_sent(), std::vec![0xa0]);
        phy.set_collision();

        link.on_byte_consumed();

        // No further bytes; the in-flight byte drains out
        assert!(phy.take_sent().is_empty());
        assert_eq!(phy.tx_irq(), TxIrq::Complete);
    }

    #[test]
    fn tx_rejects_bad_length() {
        let (mut link, _phy, _timer) = link();

        let handle = link.packet_get().unwrap();
        let p = link.packet_mut(&handle);
        p.raw_mut()[0] = 0xe5;
        p.raw_mut()[1] = 1;

        let handle = match link.send(handle, None, 0) {
            Err(Error::InvalidLength(handle)) => handle,
            other => panic!("unexpected: {:?}", other),
        };

        // Ownership came back with the error
        link.packet_free(handle);
        assert_eq!(link.free_count(), POOL_PACKETS as u8);
        assert_eq!(link.tx_pending(), 0);
    }

    fn feed(link: &mut LinkLayer<MockPhy, MockTimer>, bytes: &[u8]) {
        for b in bytes {
            link.on_byte_received(*b, false);
        }
    }

    #[test]
    fn rx_valid_frame() {
        let (mut link, _phy, _timer) = link();

        feed(&mut link, &[0xb2, 0x12, 0x34, (!0xb2u8) ^ 0x12 ^ 0x34]);

        assert_eq!(link.rx_pending(), 1);
        let handle = link.receive().unwrap();
        assert_eq!(link.packet_len(&handle), 4);
        assert_eq!(link.packet(&handle).frame(), &[0xb2, 0x12, 0x34, (!0xb2u8) ^ 0x12 ^ 0x34]);
        link.packet_free(handle);

        assert_eq!(link.stats().rx_success, 1);
        assert_eq!(link.free_count(), POOL_PACKETS as u8);
    }

    #[test]
    fn rx_checksum_error_discards() {
        let (mut link, _phy, _timer) = link();

        feed(&mut link, &[0xb2, 0x12, 0x34, 0x00]);

        assert_eq!(link.receive(), None);
        assert_eq!(link.stats().rx_checksum, 1);

        // Held buffer is reused, not leaked: a good frame still fits
        // even with the rest of the pool drained
        let mut held = std::vec::Vec::new();
        while let Some(handle) = link.packet_get() {
            held.push(handle);
        }
        assert_eq!(held.len(), POOL_PACKETS - 1);

        feed(&mut link, &[0x85, !0x85]);
        assert_eq!(link.stats().rx_success, 1);
        assert!(link.receive().is_some());
    }

    #[test]
    fn rx_framing_error_resets() {
        let (mut link, _phy, _timer) = link();

        // Frame cut short by a framing error, then a clean frame
        link.on_byte_received(0xb2, false);
        link.on_byte_received(0x12, false);
        link.on_byte_received(0x00, true);

        assert_eq!(link.stats().rx_collisions, 1);
        assert_eq!(link.receive(), None);

        feed(&mut link, &[0x85, !0x85]);
        assert_eq!(link.receive().map(|h| {
            let op = link.packet(&h).op();
            link.packet_free(h);
            op
        }), Some(0x85));
    }

    #[test]
    fn rx_opcode_mid_frame_restarts() {
        let (mut link, _phy, _timer) = link();

        // New opcode lands before the 4 byte frame finishes
        link.on_byte_received(0xb2, false);
        link.on_byte_received(0x12, false);
        feed(&mut link, &[0x85, !0x85]);

        assert_eq!(link.stats().rx_partial, 1);
        assert_eq!(link.rx_pending(), 1);

        let handle = link.receive().unwrap();
        assert_eq!(link.packet(&handle).op(), 0x85);
        link.packet_free(handle);

        // Nothing leaked across the restart
        assert_eq!(link.free_count(), POOL_PACKETS as u8);
    }

    #[test]
    fn rx_stray_byte_ignored() {
        let (mut link, _phy, _timer) = link();

        link.on_byte_received(0x12, false);

        assert_eq!(link.stats().rx_extradata, 1);
        assert_eq!(link.receive(), None);
    }

    #[test]
    fn rx_pool_exhausted_drops_byte() {
        let (mut link, _phy, _timer) = link();

        let mut held = std::vec::Vec::new();
        while let Some(handle) = link.packet_get() {
            held.push(handle);
        }

        link.on_byte_received(0x85, false);
        assert_eq!(link.stats().rx_nomem, 1);
        assert_eq!(link.receive(), None);

        // Once a buffer is back the receiver recovers
        link.packet_free(held.pop().unwrap());
        feed(&mut link, &[0x85, !0x85]);
        assert_eq!(link.stats().rx_success, 1);
    }

    #[test]
    fn pool_conservation() {
        let (mut link, phy, timer) = link();

        let total = |link: &LinkLayer<MockPhy, MockTimer>, held: u8| {
            link.free_count()
                + link.rx_pending()
                + link.tx_pending()
                + link.done_pending()
                + if link.tx_busy() { 1 } else { 0 }
                + held
        };

        assert_eq!(total(&link, 0), POOL_PACKETS as u8);

        // One held by the caller, one queued for tx
        let held = link.packet_get().unwrap();
        let outbound = link.packet_get().unwrap();
        link.packet_mut(&outbound).raw_mut()[0] = 0x82;
        link.send(outbound, None, 0).unwrap();
        assert_eq!(total(&link, 1), POOL_PACKETS as u8);

        // In flight
        timer.set_running(true);
        timer.set_ticks(CD_BACKOFF_MAX);
        link.poll();
        assert_eq!(link.tx_busy(), true);
        assert_eq!(total(&link, 1), POOL_PACKETS as u8);

        // Completed, then drained
        link.on_byte_consumed();
        link.on_transmit_complete();
        assert_eq!(total(&link, 1), POOL_PACKETS as u8);
        link.poll();
        assert_eq!(total(&link, 1), POOL_PACKETS as u8);

        // One mid-reassembly on the receive side
        link.on_byte_received(0xb2, false);
        link.on_byte_received(0x12, false);
        assert_eq!(total(&link, 1), POOL_PACKETS as u8 - 1);

        link.packet_free(held);
        let _ = phy.take_sent();
        assert_eq!(total(&link, 0), POOL_PACKETS as u8 - 1);
    }

    #[test]
    fn end_to_end_loopback() {
        let _ = simplelog::SimpleLogger::init(log::LevelFilter::Debug, simplelog::Config::default());

        let (mut link, phy, timer) = link();

        // 4 byte class opcode with a single meaningful payload byte
        let handle = link.packet_get().unwrap();
        let p = link.packet_mut(&handle);
        p.raw_mut()[0] = 0xa0;
        p.raw_mut()[1] = 0x05;
        p.raw_mut()[2] = 0x00;
        link.send(handle, None, 0).unwrap();

        timer.set_running(true);
        timer.set_ticks(CD_BACKOFF_MAX);
        link.poll();
        drive_tx_bytes(&mut link, 4);
        link.on_transmit_complete();
        link.poll();

        // Checksum collapses to (~op) ^ 0x05 with the zero pad byte
        let sent = phy.take_sent();
        assert_eq!(sent, std::vec![0xa0, 0x05, 0x00, (!0xa0u8) ^ 0x05]);

        // A node hears its own transmission: loop the frame back in
        for b in &sent {
            link.on_byte_received(*b, false);
        }

        let handle = link.receive().unwrap();
        assert_eq!(link.packet(&handle).frame(), &sent[..]);
        link.packet_free(handle);

        let stats = link.stats();
        assert_eq!(stats.tx_success, 1);
        assert_eq!(stats.rx_success, 1);
        assert_eq!(link.free_count(), POOL_PACKETS as u8);
    }
}
