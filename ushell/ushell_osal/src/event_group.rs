use core::cell::RefCell;
use core::future::poll_fn;
use core::task::Poll;

use critical_section::Mutex;
use embassy_sync::waitqueue::WakerRegistration;

struct State {
    bits: u32,
    waker: WakerRegistration,
}

/// Event bitset with wait-any / wait-all and clear-on-read semantics.
///
/// `set` may be called from interrupt context; producers coalesce into a
/// single wakeup. One task at a time may wait — registering a second
/// waiter displaces the first, which matches the one-worker-per-port
/// model this crate serves.
pub struct EventGroup {
    state: Mutex<RefCell<State>>,
}

impl EventGroup {
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(RefCell::new(State {
                bits: 0,
                waker: WakerRegistration::new(),
            })),
        }
    }

    /// Atomically OR `bits` into the group and wake the waiter.
    pub fn set(&self, bits: u32) {
        critical_section::with(|cs| {
            let mut state = self.state.borrow_ref_mut(cs);
            state.bits |= bits;
            state.waker.wake();
        });
    }

    /// Current bits, without consuming them.
    pub fn peek(&self) -> u32 {
        critical_section::with(|cs| self.state.borrow_ref(cs).bits)
    }

    /// Drop `bits` without waking anyone.
    pub fn clear(&self, bits: u32) {
        critical_section::with(|cs| {
            self.state.borrow_ref_mut(cs).bits &= !bits;
        });
    }

    /// Wait until any bit in `mask` is set; the matching bits are cleared
    /// and returned.
    pub async fn wait_any(&self, mask: u32) -> u32 {
        poll_fn(|cx| {
            critical_section::with(|cs| {
                let mut state = self.state.borrow_ref_mut(cs);
                let hit = state.bits & mask;
                if hit != 0 {
                    state.bits &= !hit;
                    Poll::Ready(hit)
                } else {
                    state.waker.register(cx.waker());
                    Poll::Pending
                }
            })
        })
        .await
    }

    /// Wait until every bit in `mask` is set; the whole mask is cleared
    /// and returned.
    pub async fn wait_all(&self, mask: u32) -> u32 {
        poll_fn(|cx| {
            critical_section::with(|cs| {
                let mut state = self.state.borrow_ref_mut(cs);
                if state.bits & mask == mask {
                    state.bits &= !mask;
                    Poll::Ready(mask)
                } else {
                    state.waker.register(cx.waker());
                    Poll::Pending
                }
            })
        })
        .await
    }
}

impl Default for EventGroup {
    fn default() -> Self {
        Self::new()
    }
}

// =================================
// ============= TESTS =============
// =================================
