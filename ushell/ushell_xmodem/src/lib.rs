//! Receiver half of the XMODEM-CRC file-transfer protocol, riding on a
//! pair of uShell sockets: 128-byte packets, CRC-16 integrity, ack/nak
//! flow control, duplicate suppression, and a bounded error budget.

#![cfg_attr(not(test), no_std)]

mod crc;
mod receiver;

pub use crc::crc16_xmodem;
pub use receiver::{
    PacketSink, SinkError, SocketPort, XmodemConfig, XmodemError, XmodemPort, XmodemReceiver,
    ACK, CAN, EOT, NAK, POLL, SOH, STX,
};
