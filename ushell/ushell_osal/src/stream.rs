use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::pipe::Pipe;
use embassy_time::{with_timeout, Duration, Instant};

/// Bounded byte FIFO with blocking, timed, and non-blocking access on
/// both ends. One producer and one consumer at a time; order preserved.
///
/// Timed operations report progress by count: a short return means the
/// deadline expired with the prefix durably queued (sends) or the bytes
/// so far delivered (receives).
pub struct StreamBuffer<const N: usize> {
    pipe: Pipe<CriticalSectionRawMutex, N>,
}

impl<const N: usize> StreamBuffer<N> {
    pub const fn new() -> Self {
        Self { pipe: Pipe::new() }
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    /// Queue all of `buf`, waiting for space as needed.
    pub async fn send(&self, buf: &[u8]) {
        let mut sent = 0;
        while sent < buf.len() {
            sent += self.pipe.write(&buf[sent..]).await;
        }
    }

    /// Queue as much of `buf` as fits before `timeout` elapses.
    pub async fn send_timed(&self, buf: &[u8], timeout: Duration) -> usize {
        let deadline = Instant::now() + timeout;
        let mut sent = 0;
        while sent < buf.len() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            match with_timeout(deadline - now, self.pipe.write(&buf[sent..])).await {
                Ok(n) => sent += n,
                Err(_) => break,
            }
        }
        sent
    }

    /// Queue whatever fits right now; never waits.
    pub fn try_send(&self, buf: &[u8]) -> usize {
        let mut sent = 0;
        while sent < buf.len() {
            match self.pipe.try_write(&buf[sent..]) {
                Ok(n) => sent += n,
                Err(_) => break,
            }
        }
        sent
    }

    /// Receive at least one byte, up to `buf.len()`.
    pub async fn recv(&self, buf: &mut [u8]) -> usize {
        self.pipe.read(buf).await
    }

    /// Fill `buf` completely, waiting for bytes as needed.
    pub async fn recv_exact(&self, buf: &mut [u8]) {
        let mut got = 0;
        while got < buf.len() {
            got += self.pipe.read(&mut buf[got..]).await;
        }
    }

    /// Fill as much of `buf` as arrives before `timeout` elapses.
    pub async fn recv_timed(&self, buf: &mut [u8], timeout: Duration) -> usize {
        let deadline = Instant::now() + timeout;
        let mut got = 0;
        while got < buf.len() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            match with_timeout(deadline - now, self.pipe.read(&mut buf[got..])).await {
                Ok(n) => got += n,
                Err(_) => break,
            }
        }
        got
    }

    /// Receive whatever is buffered right now; never waits.
    pub fn try_recv(&self, buf: &mut [u8]) -> usize {
        let mut got = 0;
        while got < buf.len() {
            match self.pipe.try_read(&mut buf[got..]) {
                Ok(n) => got += n,
                Err(_) => break,
            }
        }
        got
    }

    /// Discard all buffered bytes. Safe while producer and consumer are
    /// parked; in-flight operations resume against the emptied buffer.
    pub fn reset(&self) {
        self.pipe.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.pipe.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pipe.len()
    }
}

impl<const N: usize> Default for StreamBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

// =================================
// ============= TESTS =============
// =================================

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_futures::block_on;
    use embassy_futures::join::join;

    #[test]
    fn test_fifo_order() {
        let stream: StreamBuffer<8> = StreamBuffer::new();
        assert_eq!(stream.try_send(b"abc"), 3);
        let mut out = [0u8; 3];
        assert_eq!(stream.try_recv(&mut out), 3);
        assert_eq!(&out, b"abc");
    }

    #[test]
    fn test_try_send_respects_capacity() {
        let stream: StreamBuffer<4> = StreamBuffer::new();
        assert_eq!(stream.try_send(b"abcdef"), 4);
        assert_eq!(stream.len(), 4);
        let mut out = [0u8; 6];
        assert_eq!(stream.try_recv(&mut out), 4);
        assert_eq!(&out[..4], b"abcd");
    }

    #[test]
    fn test_try_recv_empty() {
        let stream: StreamBuffer<4> = StreamBuffer::new();
        let mut out = [0u8; 2];
        assert_eq!(stream.try_recv(&mut out), 0);
    }

    #[test]
    fn test_send_blocks_until_drained() {
        let stream: StreamBuffer<4> = StreamBuffer::new();
        assert_eq!(stream.try_send(b"xxxx"), 4);
        // A full send of 4 more bytes can only finish once the consumer
        // side makes room.
        let mut out = [0u8; 4];
        block_on(join(stream.send(b"abcd"), async {
            stream.recv_exact(&mut out).await;
        }));
        assert_eq!(&out, b"xxxx");
        let mut rest = [0u8; 4];
        assert_eq!(stream.try_recv(&mut rest), 4);
        assert_eq!(&rest, b"abcd");
    }

    #[test]
    fn test_send_timed_partial_on_full() {
        let stream: StreamBuffer<4> = StreamBuffer::new();
        let sent = block_on(stream.send_timed(b"abcdef", Duration::from_millis(20)));
        // The prefix that fit stays durably queued.
        assert_eq!(sent, 4);
        assert_eq!(stream.len(), 4);
    }

    #[test]
    fn test_recv_timed_partial() {
        let stream: StreamBuffer<8> = StreamBuffer::new();
        assert_eq!(stream.try_send(b"ab"), 2);
        let mut out = [0u8; 4];
        let got = block_on(stream.recv_timed(&mut out, Duration::from_millis(20)));
        assert_eq!(got, 2);
        assert_eq!(&out[..2], b"ab");
    }

    #[test]
    fn test_reset_discards() {
        let stream: StreamBuffer<8> = StreamBuffer::new();
        assert_eq!(stream.try_send(b"abc"), 3);
        stream.reset();
        assert!(stream.is_empty());
        let mut out = [0u8; 3];
        assert_eq!(stream.try_recv(&mut out), 0);
    }
}
