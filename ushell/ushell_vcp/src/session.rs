use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};

use ushell_config::VCP_BUFFER_SIZE;
use ushell_osal::StreamBuffer;

/// Opaque client identity; the close key for a session. Must be unique
/// among the sessions open on one port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OwnerId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Read,
    Write,
}

impl Direction {
    const fn as_u8(self) -> u8 {
        match self {
            Direction::Read => 0,
            Direction::Write => 1,
        }
    }

    fn from_u8(raw: u8) -> Self {
        if raw == 0 {
            Direction::Read
        } else {
            Direction::Write
        }
    }
}

/// Session-open request.
#[derive(Debug, Clone, Copy)]
pub struct SessionParam {
    pub owner: OwnerId,
    pub direction: Direction,
}

/// One entry of the session table. Slot contents are only written under
/// the port lock; `used` is published with release/acquire ordering so
/// the worker may scan the table lock-free on its fast path.
pub(crate) struct Slot {
    used: AtomicBool,
    owner: AtomicU32,
    dir: AtomicU8,
    pub(crate) stream: StreamBuffer<VCP_BUFFER_SIZE>,
}

impl Slot {
    pub(crate) const fn new() -> Self {
        Self {
            used: AtomicBool::new(false),
            owner: AtomicU32::new(0),
            dir: AtomicU8::new(0),
            stream: StreamBuffer::new(),
        }
    }

    /// Claim the slot. Caller holds the port lock.
    pub(crate) fn publish(&self, owner: OwnerId, dir: Direction) {
        self.owner.store(owner.0, Ordering::Relaxed);
        self.dir.store(dir.as_u8(), Ordering::Relaxed);
        self.used.store(true, Ordering::Release);
    }

    /// Free the slot. Caller holds the port lock.
    pub(crate) fn retire(&self) {
        self.used.store(false, Ordering::Release);
        self.stream.reset();
    }

    pub(crate) fn is_used(&self) -> bool {
        self.used.load(Ordering::Acquire)
    }

    pub(crate) fn direction(&self) -> Direction {
        Direction::from_u8(self.dir.load(Ordering::Relaxed))
    }

    pub(crate) fn owned_by(&self, owner: OwnerId) -> bool {
        self.is_used() && self.owner.load(Ordering::Relaxed) == owner.0
    }
}
