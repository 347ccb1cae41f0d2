use thiserror::Error;
use ushell_hal::HalError;

/// Error surface of the VCP and its sockets. Public calls return one of
/// these; internal helpers propagate them unchanged.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum UshellError {
    /// Null-ish input: zero length, duplicate owner, bad parameter.
    #[error("invalid argument")]
    InvalidArgs,

    /// Read attempted on a write socket or vice versa.
    #[error("socket direction mismatch")]
    InvalidType,

    /// Operation against a closed session or uninitialised port.
    #[error("not initialised")]
    NotInit,

    /// The HAL or an OS primitive underneath failed. Recoverable: the
    /// worker resets the port and the next call may succeed.
    #[error("port failure")]
    Port,

    /// Timed operation expired. `done` bytes were durably transferred
    /// before the deadline; stream state is otherwise unchanged.
    #[error("timed out after {done} bytes")]
    Timeout { done: usize },

    /// No free session slot, or no session for the given owner.
    #[error("session slot unavailable")]
    SessionSlot,

    /// Non-blocking read found nothing buffered.
    #[error("no data available")]
    Empty,
}

impl From<HalError> for UshellError {
    fn from(_: HalError) -> Self {
        UshellError::Port
    }
}
