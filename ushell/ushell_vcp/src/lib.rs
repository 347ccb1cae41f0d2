//! Virtual communication port: the serial-multiplex core of uShell.
//!
//! One [`VcpCore`] owns one half-duplex byte channel. Any number of
//! in-process clients open read or write [`Socket`]s against it; a
//! single worker ([`Runner`]) fans wire bytes out to the read sessions
//! and serialises the write sessions onto the wire with tx-complete
//! handshakes from the port's interrupt glue.

#![cfg_attr(not(test), no_std)]

mod error;
mod session;
mod socket;
mod stdio;
mod vcp;

pub use error::UshellError;
pub use session::{Direction, OwnerId, SessionParam};
pub use socket::Socket;
pub use stdio::VcpLogWriter;
pub use vcp::{Runner, StdioSockets, TransferMsg, Vcp, VcpConfig, VcpCore};
