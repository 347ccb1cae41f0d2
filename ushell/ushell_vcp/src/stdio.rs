use ushell_logger::LogWriter;

use crate::error::UshellError;
use crate::session::Direction;
use crate::socket::Socket;

/// Adapter that lets the process-wide logger emit through a VCP write
/// socket — the stdio redirection target of a port opened with
/// `stdio: true`.
///
/// Log lines are queued with the lossy non-blocking path: the logger
/// may be invoked from contexts that cannot wait on stream capacity, so
/// output beyond what the session buffer holds is dropped rather than
/// stalling the caller.
pub struct VcpLogWriter {
    socket: Socket,
}

impl VcpLogWriter {
    pub fn new(socket: Socket) -> Result<Self, UshellError> {
        if socket.direction() != Direction::Write {
            return Err(UshellError::InvalidType);
        }
        Ok(Self { socket })
    }
}

impl LogWriter for VcpLogWriter {
    fn write_str(&mut self, s: &str) {
        let _ = self.socket.write_nonblocking(s.as_bytes());
    }
}
