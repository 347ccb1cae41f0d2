#![no_std]

//! Compile-time tuning knobs for the uShell runtime.

/// Per-session stream and worker scratch capacity, in bytes.
pub const VCP_BUFFER_SIZE: usize = 128;

/// How long the worker waits for a tx-complete ack per HAL write.
pub const VCP_TX_TIMEOUT_MS: u64 = 500;

/// Cadence of the periodic inspect pass (missed-interrupt guard).
pub const VCP_INSPECT_PERIOD_MS: u64 = 1000;

/// Number of concurrently open sessions per port.
pub const VCP_SESSION_MAX: usize = 6;

/// Depth of the transfer-ack queue fed from interrupt context.
pub const VCP_ACK_QUEUE_DEPTH: usize = 4;

/// Scratch capacity for one formatted socket print.
pub const SOCK_PRINT_BUFFER: usize = 256;

/// XMODEM payload size. The CRC variant carries 128-byte packets only.
pub const XMODEM_PACKET_SIZE: usize = 128;

/// Inter-byte idle budget in any non-terminal XMODEM state.
pub const XMODEM_PACKET_TIMEOUT_MS: u64 = 1000;

/// How often the receiver re-emits 'C' while waiting for the first frame.
pub const XMODEM_START_POLL_MS: u64 = 1000;

/// Consecutive protocol errors tolerated before the transfer is cancelled.
pub const XMODEM_MAX_ERRORS: u8 = 10;

/// Formatting scratch for one log line.
pub const LOGGER_MAX_LEN: usize = 256;

/// Log modules that can be registered over a program's lifetime.
pub const LOGGER_MODULE_MAX: usize = 16;

/// Upper bound on tokens in one command line (name + arguments).
pub const CMD_MAX_ARGS: usize = 12;
