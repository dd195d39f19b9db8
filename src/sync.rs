//! ISR-safe sharing support.
//!
//! The link layer's interrupt handlers and `poll` all take `&mut
//! self`; when one instance is driven from both interrupt and
//! mainloop context every access must happen inside a critical
//! section. [`SharedLink`] packages that discipline: a static cell
//! whose `with` runs the closure with interrupts of the bus class
//! masked, so queue and pool mutations stay indivisible.
//!
//! Critical sections are only held for the duration of the closure;
//! callers must not block inside `with`.

use core::cell::RefCell;

use critical_section::Mutex;

use crate::link::LinkLayer;
use crate::phy::Phy;
use crate::timer::Timer;

/// Critical-section protected link layer cell.
///
/// ```ignore
/// static LINK: SharedLink<Bus, BackoffTimer> = SharedLink::new();
///
/// fn main() {
///     LINK.init(LinkLayer::new(bus, timer, Config::default()));
///     loop {
///         LINK.with(|link| link.poll());
///     }
/// }
///
/// #[interrupt]
/// fn USART_RXC() {
///     LINK.with(|link| link.on_byte_received(data, ferr));
/// }
/// ```
pub struct SharedLink<P, T>(Mutex<RefCell<Option<LinkLayer<P, T>>>>);

impl<P, T> SharedLink<P, T>
where
    P: Phy,
    T: Timer,
{
    pub const fn new() -> Self {
        Self(Mutex::new(RefCell::new(None)))
    }

    /// Install the link layer instance.
    ///
    /// Call once before interrupts are enabled.
    pub fn init(&self, link: LinkLayer<P, T>) {
        critical_section::with(|cs| {
            *self.0.borrow_ref_mut(cs) = Some(link);
        });
    }

    /// Run `f` with exclusive access to the link layer.
    ///
    /// Returns None if `init` has not run yet.
    pub fn with<R>(&self, f: impl FnOnce(&mut LinkLayer<P, T>) -> R) -> Option<R> {
        critical_section::with(|cs| {
            let mut link = self.0.borrow_ref_mut(cs);
            link.as_mut().map(f)
        })
    }
}
