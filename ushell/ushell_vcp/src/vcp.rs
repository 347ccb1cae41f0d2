use core::cell::Cell;

use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::mutex::Mutex;
use embassy_time::{with_timeout, Duration, Ticker};
use ushell_config::{
    VCP_ACK_QUEUE_DEPTH, VCP_BUFFER_SIZE, VCP_INSPECT_PERIOD_MS, VCP_SESSION_MAX,
    VCP_TX_TIMEOUT_MS,
};
use ushell_hal::{ByteChannel, ChannelListener, Mode};
use ushell_logger::{log_debug, log_warn, ModuleId};
use ushell_osal::EventGroup;

use crate::error::UshellError;
use crate::session::{Direction, OwnerId, SessionParam, Slot};
use crate::socket::Socket;

// Worker event bits.
pub(crate) const EV_RX: u32 = 1 << 0;
pub(crate) const EV_TX: u32 = 1 << 1;
pub(crate) const EV_ERR: u32 = 1 << 2;
pub(crate) const EV_INSPECT: u32 = 1 << 3;
pub(crate) const EV_SHUTDOWN: u32 = 1 << 4;
const EV_ALL: u32 = EV_RX | EV_TX | EV_ERR | EV_INSPECT | EV_SHUTDOWN;

// Owners of the sessions opened on behalf of process stdio.
const STDIO_RX_OWNER: OwnerId = OwnerId(u32::MAX - 1);
const STDIO_TX_OWNER: OwnerId = OwnerId(u32::MAX);

/// Ack carried from the port's tx path back to the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMsg {
    TxComplete,
    TxRxErr,
}

/// The stdio session pair published when a port is opened with
/// `stdio: true`.
#[derive(Clone, Copy)]
pub struct StdioSockets {
    pub reader: Socket,
    pub writer: Socket,
}

pub struct VcpConfig {
    /// Name under which the port registers with the logger.
    pub name: &'static str,
    /// Ack wait per HAL write.
    pub tx_timeout: Duration,
    /// Cadence of the missed-interrupt guard.
    pub inspect_period: Duration,
    /// Open a read/write session pair at init and publish it as the
    /// process stdio redirection target.
    pub stdio: bool,
}

impl Default for VcpConfig {
    fn default() -> Self {
        Self {
            name: "vcp",
            tx_timeout: Duration::from_millis(VCP_TX_TIMEOUT_MS),
            inspect_period: Duration::from_millis(VCP_INSPECT_PERIOD_MS),
            stdio: false,
        }
    }
}

/// Shared state of one virtual communication port. Lives in a `static`
/// so sockets and the port's interrupt glue can hold plain references:
///
/// ```ignore
/// static CORE: VcpCore = VcpCore::new();
/// let (vcp, runner) = Vcp::new(&CORE, hal, VcpConfig::default())?;
/// spawner.spawn(vcp_task(runner))?;
/// ```
pub struct VcpCore {
    events: EventGroup,
    acks: Channel<CriticalSectionRawMutex, TransferMsg, VCP_ACK_QUEUE_DEPTH>,
    lock: Mutex<CriticalSectionRawMutex, ()>,
    slots: [Slot; VCP_SESSION_MAX],
    stdio: critical_section::Mutex<Cell<Option<StdioSockets>>>,
}

impl VcpCore {
    pub const fn new() -> Self {
        const FREE: Slot = Slot::new();
        Self {
            events: EventGroup::new(),
            acks: Channel::new(),
            lock: Mutex::new(()),
            slots: [FREE; VCP_SESSION_MAX],
            stdio: critical_section::Mutex::new(Cell::new(None)),
        }
    }

    pub(crate) fn events(&self) -> &EventGroup {
        &self.events
    }

    pub(crate) fn slot_stream(&self, idx: usize) -> &ushell_osal::StreamBuffer<VCP_BUFFER_SIZE> {
        &self.slots[idx].stream
    }

    pub(crate) fn slot_used(&self, idx: usize) -> bool {
        self.slots[idx].is_used()
    }

    /// Find a free slot and bind it. Caller holds the port lock.
    fn open_slot(&'static self, param: SessionParam) -> Result<Socket, UshellError> {
        if self.slots.iter().any(|s| s.owned_by(param.owner)) {
            return Err(UshellError::InvalidArgs);
        }
        let (idx, slot) = self
            .slots
            .iter()
            .enumerate()
            .find(|(_, s)| !s.is_used())
            .ok_or(UshellError::SessionSlot)?;
        slot.stream.reset();
        let socket = Socket::new(self, idx, param.direction, VCP_BUFFER_SIZE)?;
        slot.publish(param.owner, param.direction);
        Ok(socket)
    }

    /// Release the slot bound to `owner`. Caller holds the port lock.
    fn close_slot(&self, owner: OwnerId) -> Result<(), UshellError> {
        let slot = self
            .slots
            .iter()
            .find(|s| s.owned_by(owner))
            .ok_or(UshellError::SessionSlot)?;
        slot.retire();
        Ok(())
    }
}

// The port's interrupt glue holds `&'static VcpCore` as its listener.
// Each notification is one event-bit set or one queue push; nothing here
// blocks or re-enters user code.
impl ChannelListener for VcpCore {
    fn rx_received(&self) {
        self.events.set(EV_RX);
    }

    fn tx_complete(&self) {
        let _ = self.acks.try_send(TransferMsg::TxComplete);
    }

    fn rx_tx_error(&self) {
        let _ = self.acks.try_send(TransferMsg::TxRxErr);
    }
}

/// Client-facing handle. Cheap to copy around; all session management
/// funnels through the port lock.
#[derive(Clone, Copy)]
pub struct Vcp {
    core: &'static VcpCore,
}

impl Vcp {
    /// Bring the port up: open the HAL, attach the listener, and hand
    /// back the client handle plus the worker future. The caller spawns
    /// `Runner::run` on its executor.
    pub fn new<H: ByteChannel>(
        core: &'static VcpCore,
        mut hal: H,
        config: VcpConfig,
    ) -> Result<(Vcp, Runner<H>), UshellError> {
        hal.open()?;
        hal.attach(core);
        let log = ushell_logger::register_module(config.name);
        let vcp = Vcp { core };
        if config.stdio {
            let _guard = core.lock.try_lock().map_err(|_| UshellError::Port)?;
            let reader = core.open_slot(SessionParam {
                owner: STDIO_RX_OWNER,
                direction: Direction::Read,
            })?;
            let writer = core.open_slot(SessionParam {
                owner: STDIO_TX_OWNER,
                direction: Direction::Write,
            })?;
            critical_section::with(|cs| {
                core.stdio.borrow(cs).set(Some(StdioSockets { reader, writer }));
            });
        }
        if let Some(log) = log {
            log_debug!(log => "port up, {} session slots", VCP_SESSION_MAX);
        }
        Ok((
            vcp,
            Runner {
                core,
                hal,
                config,
                log,
                scratch: [0; VCP_BUFFER_SIZE],
            },
        ))
    }

    /// Open a session and return its socket. `SessionSlot` when the
    /// table is full; `InvalidArgs` when the owner already has one.
    pub async fn session_open(&self, param: SessionParam) -> Result<Socket, UshellError> {
        let _guard = self.core.lock.lock().await;
        self.core.open_slot(param)
    }

    /// Close the session opened under `owner`. Buffered bytes are
    /// discarded; outstanding socket copies become invalid.
    pub async fn session_close(&self, owner: OwnerId) -> Result<(), UshellError> {
        let _guard = self.core.lock.lock().await;
        self.core.close_slot(owner)
    }

    /// The stdio redirection pair, when the port was opened with it.
    pub fn stdio(&self) -> Option<StdioSockets> {
        critical_section::with(|cs| self.core.stdio.borrow(cs).get())
    }

    /// Ask the worker to exit. Sessions must be closed first; blocked
    /// socket calls on a stopped port do not complete.
    pub fn shutdown(&self) {
        self.core.events.set(EV_SHUTDOWN);
    }
}

/// The port worker: sole owner of the HAL. Fans received bytes out to
/// read sessions and serialises write sessions onto the wire with
/// tx-complete handshakes.
pub struct Runner<H: ByteChannel> {
    core: &'static VcpCore,
    hal: H,
    config: VcpConfig,
    log: Option<ModuleId>,
    scratch: [u8; VCP_BUFFER_SIZE],
}

impl<H: ByteChannel> Runner<H> {
    /// Event loop. Runs until [`Vcp::shutdown`]; every HAL touch in the
    /// process happens on this future.
    pub async fn run(&mut self) {
        let mut ticker = Ticker::every(self.config.inspect_period);
        loop {
            let bits = match select(self.core.events.wait_any(EV_ALL), ticker.next()).await {
                Either::First(bits) => bits,
                Either::Second(()) => EV_INSPECT,
            };
            if bits & EV_SHUTDOWN != 0 {
                break;
            }
            if bits & EV_ERR != 0 {
                self.recover().await;
                continue;
            }
            if bits & EV_INSPECT != 0 {
                self.inspect();
            }
            if bits & EV_RX != 0 {
                if self.read_from_port().await.is_err() {
                    self.core.events.set(EV_ERR);
                    continue;
                }
            }
            if bits & EV_TX != 0 {
                if self.write_to_port().await.is_err() {
                    self.core.events.set(EV_ERR);
                }
            }
        }
        let _ = self.hal.close();
        if let Some(log) = self.log {
            log_debug!(log => "worker stopped");
        }
    }

    /// Drain the HAL rx buffer and fan the bytes out to every read
    /// session. Fan-out is lossy per session: a consumer slower than
    /// the wire drops bytes once its stream is full, the worker never
    /// stalls on it.
    async fn read_from_port(&mut self) -> Result<(), UshellError> {
        let core = self.core;
        let _guard = core.lock.lock().await;
        loop {
            let used = self.hal.read(&mut self.scratch)?;
            if used == 0 {
                break;
            }
            for slot in core.slots.iter() {
                if slot.is_used() && slot.direction() == Direction::Read {
                    let _ = slot.stream.try_send(&self.scratch[..used]);
                }
            }
        }
        Ok(())
    }

    /// Drain every write session through the HAL, in slot order, with a
    /// tx-complete handshake per chunk. Holds tx mode for the whole
    /// pass and restores rx before returning, error or not.
    async fn write_to_port(&mut self) -> Result<(), UshellError> {
        let core = self.core;
        let _guard = core.lock.lock().await;
        let pending = core
            .slots
            .iter()
            .any(|s| s.is_used() && s.direction() == Direction::Write && !s.stream.is_empty());
        if !pending {
            return Ok(());
        }
        self.hal.set_mode(Mode::Tx)?;
        let drained = self.drain_write_sessions().await;
        let restored = self.hal.set_mode(Mode::Rx);
        drained?;
        restored?;
        Ok(())
    }

    async fn drain_write_sessions(&mut self) -> Result<(), UshellError> {
        let core = self.core;
        for slot in core.slots.iter() {
            if !slot.is_used() || slot.direction() != Direction::Write {
                continue;
            }
            loop {
                let len = slot.stream.try_recv(&mut self.scratch);
                if len == 0 {
                    break;
                }
                // Drop acks left over from transfers the reset path
                // abandoned, then start the transmission.
                while core.acks.try_receive().is_ok() {}
                self.hal.write(&self.scratch[..len])?;
                match with_timeout(self.config.tx_timeout, core.acks.receive()).await {
                    Ok(TransferMsg::TxComplete) => {}
                    Ok(TransferMsg::TxRxErr) | Err(_) => return Err(UshellError::Port),
                }
            }
        }
        Ok(())
    }

    /// Missed-interrupt guard: re-post whatever work is visibly
    /// outstanding.
    fn inspect(&mut self) {
        if self.hal.rx_pending() {
            self.core.events.set(EV_RX);
        }
        let pending_tx = self
            .core
            .slots
            .iter()
            .any(|s| s.is_used() && s.direction() == Direction::Write && !s.stream.is_empty());
        if pending_tx {
            self.core.events.set(EV_TX);
        }
    }

    /// Reset path: flush acks, drop all session buffers, force rx.
    /// Sessions survive; in-flight callers see `Port` and may retry.
    async fn recover(&mut self) {
        let core = self.core;
        let _guard = core.lock.lock().await;
        while core.acks.try_receive().is_ok() {}
        for slot in core.slots.iter() {
            if slot.is_used() {
                slot.stream.reset();
            }
        }
        self.scratch.fill(0);
        let _ = self.hal.set_mode(Mode::Rx);
        if let Some(log) = self.log {
            log_warn!(log => "transfer error, port reset");
        }
    }
}
