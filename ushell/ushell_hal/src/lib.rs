//! Contract between the uShell core and a port's serial driver.
//!
//! A port implements [`ByteChannel`] over its UART or CDC endpoint and
//! wires its interrupt handlers to the [`ChannelListener`] the core hands
//! it at init. The core guarantees that all `ByteChannel` calls come from
//! a single worker task; the listener side may fire from interrupt
//! context at any time.

#![cfg_attr(not(test), no_std)]

use thiserror::Error;

/// Transceiver direction for half-duplex transports. Full-duplex ports
/// treat mode switches as no-ops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Rx,
    Tx,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HalError {
    /// Driver rejected the operation or the transceiver faulted.
    #[error("port failure")]
    Port,
    /// Channel used before `open` (or after `close`).
    #[error("channel not open")]
    NotOpen,
}

/// Half-duplex byte channel owned exclusively by one VCP worker.
pub trait ByteChannel {
    /// Bring the channel up. Reopening an open channel drops any bytes
    /// still buffered in the driver.
    fn open(&mut self) -> Result<(), HalError>;

    fn close(&mut self) -> Result<(), HalError>;

    /// Whether the driver holds received bytes. Never blocks.
    fn rx_pending(&self) -> bool;

    /// Copy up to `buf.len()` already-received bytes. Returns 0 when the
    /// driver has nothing buffered. Never blocks.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, HalError>;

    /// Hand `buf` to the driver for transmission. Returns once the
    /// request is accepted; completion arrives via
    /// [`ChannelListener::tx_complete`].
    fn write(&mut self, buf: &[u8]) -> Result<(), HalError>;

    /// Reconfigure the direction pin. No-op on full-duplex transports.
    fn set_mode(&mut self, mode: Mode) -> Result<(), HalError>;

    /// Install the notification target for the three async events. The
    /// port stores the reference and calls it from its IRQ glue.
    fn attach(&mut self, listener: &'static dyn ChannelListener);
}

/// Notifications a port delivers from interrupt or driver-thread
/// context. Implementations only set an event bit or enqueue one queue
/// item; they must not block and must not call back into user code.
pub trait ChannelListener: Sync {
    /// One or more bytes arrived in the driver's rx buffer.
    fn rx_received(&self);

    /// The transmission started by the last `write` finished.
    fn tx_complete(&self);

    /// The transceiver faulted mid-transfer, either direction.
    fn rx_tx_error(&self);
}
