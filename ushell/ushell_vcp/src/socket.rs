use core::fmt::{self, Write as _};

use embassy_time::{Duration, Instant};
use heapless::String;
use ushell_config::SOCK_PRINT_BUFFER;
use ushell_osal::StreamBuffer;

use crate::error::UshellError;
use crate::session::Direction;
use crate::vcp::{VcpCore, EV_TX};

/// Typed handle into one session's stream. Read-only or write-only,
/// fixed at open; transfers are chunked so one caller cannot occupy the
/// stream for longer than `chunk` bytes at a time.
///
/// Handles are plain copies of the slot reference. They must not be used
/// after the session that produced them is closed.
#[derive(Clone, Copy)]
pub struct Socket {
    core: &'static VcpCore,
    slot: usize,
    dir: Direction,
    chunk: usize,
}

impl Socket {
    pub(crate) fn new(
        core: &'static VcpCore,
        slot: usize,
        dir: Direction,
        chunk: usize,
    ) -> Result<Self, UshellError> {
        if chunk == 0 {
            return Err(UshellError::InvalidArgs);
        }
        Ok(Self {
            core,
            slot,
            dir,
            chunk,
        })
    }

    pub fn direction(&self) -> Direction {
        self.dir
    }

    fn stream(&self) -> &'static StreamBuffer<{ ushell_config::VCP_BUFFER_SIZE }> {
        self.core.slot_stream(self.slot)
    }

    fn check(&self, want: Direction) -> Result<(), UshellError> {
        if self.dir != want {
            return Err(UshellError::InvalidType);
        }
        if !self.core.slot_used(self.slot) {
            return Err(UshellError::NotInit);
        }
        Ok(())
    }

    /// Queue all of `buf` for transmission, waiting on stream capacity.
    /// The worker is nudged after every chunk so draining starts while
    /// the caller is still producing.
    pub async fn write_all(&self, buf: &[u8]) -> Result<(), UshellError> {
        self.check(Direction::Write)?;
        if buf.is_empty() {
            return Err(UshellError::InvalidArgs);
        }
        for chunk in buf.chunks(self.chunk) {
            self.stream().send(chunk).await;
            self.core.events().set(EV_TX);
        }
        Ok(())
    }

    /// Timed variant of [`write_all`](Self::write_all). On expiry the
    /// accepted prefix stays queued and is reported in the error.
    pub async fn write(&self, buf: &[u8], timeout: Duration) -> Result<usize, UshellError> {
        self.check(Direction::Write)?;
        if buf.is_empty() {
            return Err(UshellError::InvalidArgs);
        }
        let deadline = Instant::now() + timeout;
        let mut done = 0;
        while done < buf.len() {
            let now = Instant::now();
            if now >= deadline {
                return Err(UshellError::Timeout { done });
            }
            let end = usize::min(done + self.chunk, buf.len());
            let want = end - done;
            let sent = self.stream().send_timed(&buf[done..end], deadline - now).await;
            if sent > 0 {
                self.core.events().set(EV_TX);
            }
            done += sent;
            if sent < want {
                return Err(UshellError::Timeout { done });
            }
        }
        Ok(done)
    }

    /// Queue whatever fits right now; never waits. Used from contexts
    /// that must not block (the log writer bridge). Bytes that do not
    /// fit are dropped by the caller's choice of this method.
    pub fn write_nonblocking(&self, buf: &[u8]) -> Result<usize, UshellError> {
        self.check(Direction::Write)?;
        let sent = self.stream().try_send(buf);
        if sent > 0 {
            self.core.events().set(EV_TX);
        }
        Ok(sent)
    }

    /// Fill `buf` from the wire, waiting for bytes as needed.
    pub async fn read_exact(&self, buf: &mut [u8]) -> Result<(), UshellError> {
        self.check(Direction::Read)?;
        if buf.is_empty() {
            return Err(UshellError::InvalidArgs);
        }
        for chunk in buf.chunks_mut(self.chunk) {
            self.stream().recv_exact(chunk).await;
        }
        Ok(())
    }

    /// Timed variant of [`read_exact`](Self::read_exact). On expiry the
    /// bytes copied so far are reported in the error; they are already
    /// in `buf`.
    pub async fn read(&self, buf: &mut [u8], timeout: Duration) -> Result<usize, UshellError> {
        self.check(Direction::Read)?;
        if buf.is_empty() {
            return Err(UshellError::InvalidArgs);
        }
        let deadline = Instant::now() + timeout;
        let mut done = 0;
        while done < buf.len() {
            let now = Instant::now();
            if now >= deadline {
                return Err(UshellError::Timeout { done });
            }
            let end = usize::min(done + self.chunk, buf.len());
            let want = end - done;
            let got = self
                .stream()
                .recv_timed(&mut buf[done..end], deadline - now)
                .await;
            done += got;
            if got < want {
                return Err(UshellError::Timeout { done });
            }
        }
        Ok(done)
    }

    /// Copy whatever is buffered right now. `Empty` when there is none.
    pub fn try_read(&self, buf: &mut [u8]) -> Result<usize, UshellError> {
        self.check(Direction::Read)?;
        let got = self.stream().try_recv(buf);
        if got == 0 {
            return Err(UshellError::Empty);
        }
        Ok(got)
    }

    pub fn is_empty(&self) -> Result<bool, UshellError> {
        if !self.core.slot_used(self.slot) {
            return Err(UshellError::NotInit);
        }
        Ok(self.stream().is_empty())
    }

    /// Render `args` into a local scratch buffer and queue the result.
    /// Renders longer than the scratch are truncated at its boundary.
    pub async fn print(&self, args: fmt::Arguments<'_>) -> Result<(), UshellError> {
        self.check(Direction::Write)?;
        let mut scratch: String<SOCK_PRINT_BUFFER> = String::new();
        let _ = scratch.write_fmt(args);
        if scratch.is_empty() {
            return Ok(());
        }
        self.write_all(scratch.as_bytes()).await
    }
}

/// Format and queue text on a write socket. Expands to a future; await
/// it in place.
#[macro_export]
macro_rules! sock_print {
    ($sock:expr, $($arg:tt)*) => {
        $sock.print(::core::format_args!($($arg)*))
    };
}

/// [`sock_print!`] with a trailing CRLF.
#[macro_export]
macro_rules! sock_println {
    ($sock:expr, $($arg:tt)*) => {
        $sock.print(::core::format_args!(
            "{}\r\n",
            ::core::format_args!($($arg)*)
        ))
    };
}
