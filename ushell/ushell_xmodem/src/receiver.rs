use core::future::Future;

use embassy_time::Duration;
use thiserror::Error;
use ushell_config::{
    XMODEM_MAX_ERRORS, XMODEM_PACKET_SIZE, XMODEM_PACKET_TIMEOUT_MS, XMODEM_START_POLL_MS,
};
use ushell_logger::{log_debug, log_warn};
use ushell_vcp::{Direction, Socket, UshellError};

use crate::crc::crc16_xmodem;

pub const SOH: u8 = 0x01;
pub const STX: u8 = 0x02;
pub const EOT: u8 = 0x04;
pub const ACK: u8 = 0x06;
pub const NAK: u8 = 0x15;
pub const CAN: u8 = 0x18;
/// Handshake byte requesting the CRC variant.
pub const POLL: u8 = b'C';

/// The payload consumer refused more bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkError;

/// Destination for accepted packet payloads: a file writer, a flash
/// programmer, or a plain closure.
pub trait PacketSink {
    fn accept(&mut self, data: &[u8]) -> Result<(), SinkError>;
}

impl<F> PacketSink for F
where
    F: FnMut(&[u8]) -> Result<(), SinkError>,
{
    fn accept(&mut self, data: &[u8]) -> Result<(), SinkError> {
        self(data)
    }
}

/// Byte transport the receiver runs over. Implemented for a socket pair
/// below; test doubles script the remote end.
pub trait XmodemPort {
    /// Next byte from the remote, or `None` once `timeout` passes with
    /// nothing arriving.
    fn recv_byte(
        &mut self,
        timeout: Duration,
    ) -> impl Future<Output = Result<Option<u8>, UshellError>>;

    /// Deliver response bytes to the remote.
    fn send(&mut self, bytes: &[u8]) -> impl Future<Output = Result<(), UshellError>>;
}

/// The usual transport: one read and one write session on a VCP.
pub struct SocketPort {
    reader: Socket,
    writer: Socket,
}

impl SocketPort {
    pub fn new(reader: Socket, writer: Socket) -> Result<Self, UshellError> {
        if reader.direction() != Direction::Read || writer.direction() != Direction::Write {
            return Err(UshellError::InvalidType);
        }
        Ok(Self { reader, writer })
    }
}

impl XmodemPort for SocketPort {
    async fn recv_byte(&mut self, timeout: Duration) -> Result<Option<u8>, UshellError> {
        let mut byte = [0u8; 1];
        match self.reader.read(&mut byte, timeout).await {
            Ok(_) => Ok(Some(byte[0])),
            Err(UshellError::Timeout { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn send(&mut self, bytes: &[u8]) -> Result<(), UshellError> {
        self.writer.write_all(bytes).await
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum XmodemError {
    #[error("invalid receiver configuration")]
    InvalidArgs,
    /// Sender aborted with CAN at the block-number position.
    #[error("transfer cancelled by sender")]
    Canceled,
    /// The sink refused a payload; the sender was cancelled.
    #[error("sink rejected packet payload")]
    Sink,
    /// The underlying socket failed.
    #[error("transport failed")]
    Port(#[from] UshellError),
    // Budget exhaustion, labelled by the fault that tripped it.
    #[error("error budget exhausted by timeouts")]
    Timeout,
    #[error("error budget exhausted by checksum mismatches")]
    Crc,
    #[error("error budget exhausted by block numbering")]
    Block,
    #[error("error budget exhausted by framing garbage")]
    Unexpected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fault {
    Timeout,
    Crc,
    Block,
    Unexpected,
}

impl Fault {
    fn into_error(self) -> XmodemError {
        match self {
            Fault::Timeout => XmodemError::Timeout,
            Fault::Crc => XmodemError::Crc,
            Fault::Block => XmodemError::Block,
            Fault::Unexpected => XmodemError::Unexpected,
        }
    }
}

#[derive(Clone, Copy)]
pub struct XmodemConfig {
    /// Inter-byte idle budget in any state past the initial handshake.
    pub packet_timeout: Duration,
    /// How long to wait after each 'C' before re-emitting it.
    pub start_poll: Duration,
    /// Consecutive protocol errors tolerated before cancelling.
    pub max_errors: u8,
    /// Acknowledge re-sent blocks whose first ACK was lost. Senders
    /// stall without this; disable only against peers that treat the
    /// second ACK as a protocol violation.
    pub ack_duplicates: bool,
}

impl Default for XmodemConfig {
    fn default() -> Self {
        Self {
            packet_timeout: Duration::from_millis(XMODEM_PACKET_TIMEOUT_MS),
            start_poll: Duration::from_millis(XMODEM_START_POLL_MS),
            max_errors: XMODEM_MAX_ERRORS,
            ack_duplicates: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Start,
    AwaitSoh,
    BlockNum,
    BlockNeg,
    Data,
    Crc0,
    Crc1,
}

/// Receiver half of XMODEM-CRC, 128-byte packets. Constructed for one
/// transfer; [`run`](Self::run) drives it to `Success` (total payload
/// bytes delivered) or a terminal error.
pub struct XmodemReceiver<P: XmodemPort, S: PacketSink> {
    port: P,
    sink: S,
    config: XmodemConfig,
    state: State,
    /// Last accepted block number; the next unique frame carries
    /// `accepted + 1 (mod 256)`.
    accepted: u8,
    packet: [u8; XMODEM_PACKET_SIZE],
    pos: usize,
    crc_hi: u8,
    repeating: bool,
    errors: u8,
    last_fault: Fault,
    delivered: usize,
}

impl<P: XmodemPort, S: PacketSink> XmodemReceiver<P, S> {
    pub fn new(port: P, sink: S, config: XmodemConfig) -> Result<Self, XmodemError> {
        if config.max_errors == 0
            || config.packet_timeout == Duration::from_ticks(0)
            || config.start_poll == Duration::from_ticks(0)
        {
            return Err(XmodemError::InvalidArgs);
        }
        Ok(Self {
            port,
            sink,
            config,
            state: State::Start,
            accepted: 0,
            packet: [0; XMODEM_PACKET_SIZE],
            pos: 0,
            crc_hi: 0,
            repeating: false,
            errors: 0,
            last_fault: Fault::Timeout,
            delivered: 0,
        })
    }

    /// Drive the transfer to completion. One transfer per receiver;
    /// construct a fresh one to receive again.
    pub async fn run(&mut self) -> Result<usize, XmodemError> {
        loop {
            if self.state == State::Start {
                self.port.send(&[POLL]).await?;
                match self.port.recv_byte(self.config.start_poll).await? {
                    Some(byte) => {
                        self.state = State::AwaitSoh;
                        if let Some(total) = self.step(byte).await? {
                            return Ok(total);
                        }
                    }
                    None => {
                        // Stay in Start; the next pass re-emits the poll.
                        self.errors += 1;
                        self.last_fault = Fault::Timeout;
                        if self.errors >= self.config.max_errors {
                            return Err(self.fail().await);
                        }
                    }
                }
                continue;
            }
            match self.port.recv_byte(self.config.packet_timeout).await? {
                Some(byte) => {
                    if let Some(total) = self.step(byte).await? {
                        return Ok(total);
                    }
                }
                None => self.reject(Fault::Timeout, true).await?,
            }
        }
    }

    async fn step(&mut self, byte: u8) -> Result<Option<usize>, XmodemError> {
        match self.state {
            State::Start | State::AwaitSoh => match byte {
                SOH => self.state = State::BlockNum,
                EOT => {
                    self.port.send(&[ACK]).await?;
                    log_debug!("xmodem: transfer complete, {} bytes", self.delivered);
                    return Ok(Some(self.delivered));
                }
                _ => self.reject(Fault::Unexpected, true).await?,
            },
            State::BlockNum => {
                let expected = self.accepted.wrapping_add(1);
                if byte == expected {
                    self.repeating = false;
                    self.state = State::BlockNeg;
                } else if byte == self.accepted {
                    // Re-send of the previous block; our ACK was lost.
                    self.repeating = true;
                    self.state = State::BlockNeg;
                } else if byte == SOH || byte == STX {
                    // Fresh frame start; keep waiting for a block number.
                } else if byte == CAN {
                    log_warn!("xmodem: cancelled by sender");
                    return Err(XmodemError::Canceled);
                } else {
                    self.reject(Fault::Block, false).await?;
                }
            }
            State::BlockNeg => {
                let reference = if self.repeating {
                    self.accepted
                } else {
                    self.accepted.wrapping_add(1)
                };
                if byte == !reference {
                    self.pos = 0;
                    self.state = State::Data;
                } else {
                    self.reject(Fault::Block, false).await?;
                }
            }
            State::Data => {
                self.packet[self.pos] = byte;
                self.pos += 1;
                if self.pos == self.packet.len() {
                    self.state = State::Crc0;
                }
            }
            State::Crc0 => {
                self.crc_hi = byte;
                self.state = State::Crc1;
            }
            State::Crc1 => {
                let wire = u16::from_be_bytes([self.crc_hi, byte]);
                if wire != crc16_xmodem(&self.packet) {
                    self.reject(Fault::Crc, true).await?;
                } else if self.repeating {
                    if self.config.ack_duplicates {
                        self.port.send(&[ACK]).await?;
                    }
                    self.reset_frame();
                    self.state = State::AwaitSoh;
                } else {
                    self.deliver().await?;
                }
            }
        }
        Ok(None)
    }

    /// Accept the packet: sink it, ack it, advance the block counter.
    async fn deliver(&mut self) -> Result<(), XmodemError> {
        if self.sink.accept(&self.packet).is_err() {
            self.port.send(&[CAN]).await?;
            log_warn!("xmodem: sink refused payload, cancelling");
            return Err(XmodemError::Sink);
        }
        self.port.send(&[ACK]).await?;
        self.accepted = self.accepted.wrapping_add(1);
        self.delivered += self.packet.len();
        self.errors = 0;
        self.reset_frame();
        self.state = State::AwaitSoh;
        Ok(())
    }

    /// Count one protocol fault, optionally NAK, and resynchronise.
    /// Errors propagate the budget-exhaustion verdict.
    async fn reject(&mut self, fault: Fault, nak: bool) -> Result<(), XmodemError> {
        self.errors += 1;
        self.last_fault = fault;
        self.reset_frame();
        self.state = State::AwaitSoh;
        if self.errors >= self.config.max_errors {
            return Err(self.fail().await);
        }
        if nak {
            self.port.send(&[NAK]).await?;
        }
        Ok(())
    }

    /// Terminal failure: cancel the sender (best effort) and report the
    /// fault that tripped the budget.
    async fn fail(&mut self) -> XmodemError {
        let _ = self.port.send(&[CAN]).await;
        log_warn!("xmodem: error budget exhausted");
        self.last_fault.into_error()
    }

    fn reset_frame(&mut self) {
        self.pos = 0;
        self.crc_hi = 0;
        self.repeating = false;
    }
}

// =================================
// ============= TESTS =============
// =================================
