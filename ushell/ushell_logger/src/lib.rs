// A minimal logger for no_std shell environments.
// Output is colored by severity and may be scoped to registered modules,
// each with its own level override.

#![cfg_attr(not(test), no_std)]

use core::cell::RefCell;
use core::fmt;

use critical_section::Mutex;
use heapless::Vec;
use ushell_config::LOGGER_MODULE_MAX;

// Re-exports needed by the macros.
pub use core::fmt::Write as FmtWrite;
pub use heapless;
pub use ushell_config::LOGGER_MAX_LEN;

// ANSI color codes
const RESET: &str = "\x1b[0m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const GREEN: &str = "\x1b[32m";
const BLUE: &str = "\x1b[94m";
const CYAN: &str = "\x1b[36m";
const GRAY: &str = "\x1b[90m";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Verbose,
    Trace,
}

impl LogLevel {
    #[inline]
    pub const fn color(&self) -> &'static str {
        match self {
            LogLevel::Error => RED,
            LogLevel::Warn => YELLOW,
            LogLevel::Info => GREEN,
            LogLevel::Debug => BLUE,
            LogLevel::Verbose => CYAN,
            LogLevel::Trace => GRAY,
        }
    }

    #[inline]
    pub const fn label(&self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warn => " WARN",
            LogLevel::Info => " INFO",
            LogLevel::Debug => "DEBUG",
            LogLevel::Verbose => " VERB",
            LogLevel::Trace => "TRACE",
        }
    }

    /// Allows early exit before string formatting
    #[inline]
    pub const fn is_enabled(&self, min_level: LogLevel) -> bool {
        (*self as u8) <= (min_level as u8)
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.color(), self.label(), RESET)
    }
}

// ============================================================================
// Writer trait
// ============================================================================

/// Byte sink for rendered log lines. Must tolerate being called from any
/// task context; implementations must not block.
pub trait LogWriter: Send {
    fn write_str(&mut self, s: &str);

    /// Flush the output (if buffered)
    fn flush(&mut self) {}
}

// ============================================================================
// Module registry
// ============================================================================

/// Handle for a registered log module. Index into the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleId(usize);

struct ModuleEntry {
    name: &'static str,
    // None means: inherit the global minimum level.
    level: Option<LogLevel>,
}

// ============================================================================
// Global logger state
// ============================================================================

#[derive(Clone, Copy)]
pub struct LoggerConfig {
    pub min_level: LogLevel,
    pub color_entire_line: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Info,
            color_entire_line: false,
        }
    }
}

struct Inner {
    config: LoggerConfig,
    writer: Option<&'static mut dyn LogWriter>,
    modules: Vec<ModuleEntry, LOGGER_MODULE_MAX>,
}

static LOGGER: Mutex<RefCell<Inner>> = Mutex::new(RefCell::new(Inner {
    config: LoggerConfig {
        min_level: LogLevel::Info,
        color_entire_line: false,
    },
    writer: None,
    modules: Vec::new(),
}));

/// Install the global writer and configuration. The writer is typically a
/// `StaticCell`-allocated UART or socket adapter.
pub fn init_logger(config: LoggerConfig, writer: &'static mut dyn LogWriter) {
    critical_section::with(|cs| {
        let mut inner = LOGGER.borrow_ref_mut(cs);
        inner.config = config;
        inner.writer = Some(writer);
    });
}

pub fn set_min_level(level: LogLevel) {
    critical_section::with(|cs| {
        LOGGER.borrow_ref_mut(cs).config.min_level = level;
    });
}

/// Register a named module. Registration is append-only; registering the
/// same name twice returns the existing handle. `None` when the registry
/// is full.
pub fn register_module(name: &'static str) -> Option<ModuleId> {
    critical_section::with(|cs| {
        let mut inner = LOGGER.borrow_ref_mut(cs);
        if let Some(idx) = inner.modules.iter().position(|m| m.name == name) {
            return Some(ModuleId(idx));
        }
        let idx = inner.modules.len();
        inner
            .modules
            .push(ModuleEntry { name, level: None })
            .ok()?;
        Some(ModuleId(idx))
    })
}

/// Override one module's level; `None` restores inheritance from the
/// global minimum.
pub fn set_module_level(id: ModuleId, level: Option<LogLevel>) {
    critical_section::with(|cs| {
        let mut inner = LOGGER.borrow_ref_mut(cs);
        if let Some(entry) = inner.modules.get_mut(id.0) {
            entry.level = level;
        }
    });
}

pub fn module_name(id: ModuleId) -> Option<&'static str> {
    critical_section::with(|cs| LOGGER.borrow_ref(cs).modules.get(id.0).map(|m| m.name))
}

/// Whether a message at `level` would currently be emitted for `module`.
pub fn enabled(level: LogLevel, module: Option<ModuleId>) -> bool {
    critical_section::with(|cs| {
        let inner = LOGGER.borrow_ref(cs);
        let min = module
            .and_then(|id| inner.modules.get(id.0))
            .and_then(|m| m.level)
            .unwrap_or(inner.config.min_level);
        level.is_enabled(min)
    })
}

/// Render one line through the installed writer. Called by the macros
/// after the enabled-check and formatting already happened.
pub fn log_with_level(level: LogLevel, module: Option<ModuleId>, message: &str) {
    critical_section::with(|cs| {
        let mut inner = LOGGER.borrow_ref_mut(cs);
        let min = module
            .and_then(|id| inner.modules.get(id.0))
            .and_then(|m| m.level)
            .unwrap_or(inner.config.min_level);
        if !level.is_enabled(min) {
            return;
        }
        let name = module
            .and_then(|id| inner.modules.get(id.0))
            .map(|m| m.name);
        let color_line = inner.config.color_entire_line;
        let Some(writer) = inner.writer.as_mut() else {
            return;
        };
        if color_line {
            writer.write_str(level.color());
        }
        writer.write_str("[");
        writer.write_str(level.label());
        writer.write_str("] ");
        if let Some(name) = name {
            writer.write_str(name);
            writer.write_str(": ");
        }
        writer.write_str(message);
        if color_line {
            writer.write_str(RESET);
        }
        writer.write_str("\r\n");
        writer.flush();
    });
}

/// Write a bare message with no level prefix (banner/headless output).
pub fn log_simple_message(message: &str) {
    critical_section::with(|cs| {
        let mut inner = LOGGER.borrow_ref_mut(cs);
        let Some(writer) = inner.writer.as_mut() else {
            return;
        };
        writer.write_str(message);
        writer.write_str("\r\n");
        writer.flush();
    });
}

// ============================================================================
// Macros
// ============================================================================

#[macro_export]
macro_rules! log {
    ($level:expr, $module:expr => $($arg:tt)*) => {{
        if $crate::enabled($level, ::core::option::Option::Some($module)) {
            use $crate::FmtWrite as _;
            let mut msg_buf = $crate::heapless::String::<{ $crate::LOGGER_MAX_LEN }>::new();
            let _ = ::core::write!(&mut msg_buf, $($arg)*);
            $crate::log_with_level($level, ::core::option::Option::Some($module), msg_buf.as_str());
        }
    }};
    ($level:expr, $($arg:tt)*) => {{
        if $crate::enabled($level, ::core::option::Option::None) {
            use $crate::FmtWrite as _;
            let mut msg_buf = $crate::heapless::String::<{ $crate::LOGGER_MAX_LEN }>::new();
            let _ = ::core::write!(&mut msg_buf, $($arg)*);
            $crate::log_with_level($level, ::core::option::Option::None, msg_buf.as_str());
        }
    }};
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::log!($crate::LogLevel::Error, $($arg)*)
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::log!($crate::LogLevel::Warn, $($arg)*)
    };
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::log!($crate::LogLevel::Info, $($arg)*)
    };
}

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        $crate::log!($crate::LogLevel::Debug, $($arg)*)
    };
}

#[macro_export]
macro_rules! log_verbose {
    ($($arg:tt)*) => {
        $crate::log!($crate::LogLevel::Verbose, $($arg)*)
    };
}

#[macro_export]
macro_rules! log_trace {
    ($($arg:tt)*) => {
        $crate::log!($crate::LogLevel::Trace, $($arg)*)
    };
}

/// Simple/headless logging without level prefix
#[macro_export]
macro_rules! log_simple {
    ($($arg:tt)*) => {{
        use $crate::FmtWrite as _;
        let mut msg_buf = $crate::heapless::String::<{ $crate::LOGGER_MAX_LEN }>::new();
        let _ = ::core::write!(&mut msg_buf, $($arg)*);
        $crate::log_simple_message(msg_buf.as_str());
    }};
}

// =================================
// ============= TESTS =============
// =================================
