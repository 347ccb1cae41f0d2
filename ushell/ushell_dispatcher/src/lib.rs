//! The contract between the shell runtime and its command modules.
//!
//! A command is invoked with a read socket, a write socket, and the
//! tokenized arguments (command name excluded). Commands borrow the
//! sockets for the duration of the call and must not retain them.
//!
//! [`dispatch_line!`] expands to the match-on-name dispatcher for a
//! fixed command set:
//!
//! ```ignore
//! let result = dispatch_line!(line, &reader, &writer, [Echo, Transfer]).await;
//! ```

#![cfg_attr(not(test), no_std)]

use core::future::Future;

use heapless::Vec;
use thiserror::Error;
use ushell_config::CMD_MAX_ARGS;
use ushell_vcp::{Socket, UshellError};

/// Failure reported by a command body.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmdError {
    #[error("bad usage")]
    Usage,
    #[error("{0}")]
    Failed(&'static str),
    #[error("socket i/o failed")]
    Io,
}

impl From<UshellError> for CmdError {
    fn from(_: UshellError) -> Self {
        CmdError::Io
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchError {
    #[error("empty command line")]
    Empty,
    #[error("unknown command")]
    UnknownCommand,
    #[error("too many arguments")]
    TooManyArgs,
    #[error("unterminated quote")]
    UnterminatedQuote,
    #[error("command failed: {0}")]
    Exec(CmdError),
}

/// One shell command.
pub trait ShellCommand {
    fn name(&self) -> &'static str;

    fn help(&self) -> &'static str {
        ""
    }

    /// Run the command. `argv` excludes the command name; entries keep
    /// the order they were typed, quotes stripped.
    fn exec(
        &self,
        reader: &Socket,
        writer: &Socket,
        argv: &[&str],
    ) -> impl Future<Output = Result<(), CmdError>>;
}

/// Split one input line into tokens. Whitespace separates; double
/// quotes group a token and are stripped; no escape sequences.
pub fn split_line(line: &str) -> Result<Vec<&str, CMD_MAX_ARGS>, DispatchError> {
    let bytes = line.as_bytes();
    let mut tokens: Vec<&str, CMD_MAX_ARGS> = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= bytes.len() {
            break;
        }
        let (start, end) = if bytes[i] == b'"' {
            i += 1;
            let start = i;
            while i < bytes.len() && bytes[i] != b'"' {
                i += 1;
            }
            if i >= bytes.len() {
                return Err(DispatchError::UnterminatedQuote);
            }
            let end = i;
            i += 1;
            (start, end)
        } else {
            let start = i;
            while i < bytes.len() && !bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            (start, i)
        };
        tokens
            .push(&line[start..end])
            .map_err(|_| DispatchError::TooManyArgs)?;
    }
    Ok(tokens)
}

/// Tokenize `line` and run the matching command from the bracketed set.
/// Expands to a future resolving to `Result<(), DispatchError>`.
#[macro_export]
macro_rules! dispatch_line {
    ($line:expr, $reader:expr, $writer:expr, [$($cmd:expr),+ $(,)?]) => {
        async {
            let tokens = $crate::split_line($line)?;
            let (name, argv) = tokens
                .split_first()
                .ok_or($crate::DispatchError::Empty)?;
            $(
                if $crate::ShellCommand::name(&$cmd) == *name {
                    return $crate::ShellCommand::exec(&$cmd, $reader, $writer, argv)
                        .await
                        .map_err($crate::DispatchError::Exec);
                }
            )+
            ::core::result::Result::Err($crate::DispatchError::UnknownCommand)
        }
    };
}

// =================================
// ============= TESTS =============
// =================================

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_futures::block_on;
    use embassy_time::Duration;
    use ushell_hal::{ByteChannel, ChannelListener, HalError, Mode};
    use ushell_vcp::{sock_print, Direction, OwnerId, SessionParam, Vcp, VcpConfig, VcpCore};

    // ------------------------------------------------------------------
    // Tokenizer
    // ------------------------------------------------------------------

    #[test]
    fn test_split_plain_tokens() {
        let tokens = split_line("read 0 128").unwrap();
        assert_eq!(tokens.as_slice(), &["read", "0", "128"]);
    }

    #[test]
    fn test_split_collapses_whitespace() {
        let tokens = split_line("  led \t on  ").unwrap();
        assert_eq!(tokens.as_slice(), &["led", "on"]);
    }

    #[test]
    fn test_split_quoted_token() {
        let tokens = split_line("echo \"two words\" tail").unwrap();
        assert_eq!(tokens.as_slice(), &["echo", "two words", "tail"]);
    }

    #[test]
    fn test_split_empty_quotes() {
        let tokens = split_line("set \"\"").unwrap();
        assert_eq!(tokens.as_slice(), &["set", ""]);
    }

    #[test]
    fn test_split_unterminated_quote() {
        assert_eq!(
            split_line("echo \"oops").unwrap_err(),
            DispatchError::UnterminatedQuote
        );
    }

    #[test]
    fn test_split_empty_line() {
        assert!(split_line("   ").unwrap().is_empty());
    }

    #[test]
    fn test_split_too_many_tokens() {
        let line = "c 1 2 3 4 5 6 7 8 9 10 11 12";
        assert_eq!(split_line(line).unwrap_err(), DispatchError::TooManyArgs);
    }

    // ------------------------------------------------------------------
    // Dispatch over live sockets
    // ------------------------------------------------------------------

    struct NullHal;

    impl ByteChannel for NullHal {
        fn open(&mut self) -> Result<(), HalError> {
            Ok(())
        }
        fn close(&mut self) -> Result<(), HalError> {
            Ok(())
        }
        fn rx_pending(&self) -> bool {
            false
        }
        fn read(&mut self, _buf: &mut [u8]) -> Result<usize, HalError> {
            Ok(0)
        }
        fn write(&mut self, _buf: &[u8]) -> Result<(), HalError> {
            Ok(())
        }
        fn set_mode(&mut self, _mode: Mode) -> Result<(), HalError> {
            Ok(())
        }
        fn attach(&mut self, _listener: &'static dyn ChannelListener) {}
    }

    struct Greet;

    impl ShellCommand for Greet {
        fn name(&self) -> &'static str {
            "greet"
        }

        fn help(&self) -> &'static str {
            "greet <name>"
        }

        async fn exec(
            &self,
            _reader: &Socket,
            writer: &Socket,
            argv: &[&str],
        ) -> Result<(), CmdError> {
            if argv.len() != 1 {
                return Err(CmdError::Usage);
            }
            sock_print!(writer, "hello {}", argv[0]).await?;
            Ok(())
        }
    }

    struct Fail;

    impl ShellCommand for Fail {
        fn name(&self) -> &'static str {
            "fail"
        }

        async fn exec(
            &self,
            _reader: &Socket,
            _writer: &Socket,
            _argv: &[&str],
        ) -> Result<(), CmdError> {
            Err(CmdError::Failed("broken"))
        }
    }

    fn open_pair(vcp: &Vcp) -> (Socket, Socket) {
        block_on(async {
            let reader = vcp
                .session_open(SessionParam {
                    owner: OwnerId(1),
                    direction: Direction::Read,
                })
                .await
                .unwrap();
            let writer = vcp
                .session_open(SessionParam {
                    owner: OwnerId(2),
                    direction: Direction::Write,
                })
                .await
                .unwrap();
            (reader, writer)
        })
    }

    #[test]
    fn test_dispatch_runs_matching_command() {
        static CORE: VcpCore = VcpCore::new();
        let config = VcpConfig {
            tx_timeout: Duration::from_millis(50),
            inspect_period: Duration::from_millis(50),
            ..VcpConfig::default()
        };
        let (vcp, _runner) = Vcp::new(&CORE, NullHal, config).unwrap();
        let (reader, writer) = open_pair(&vcp);

        block_on(async {
            let result =
                dispatch_line!("greet world", &reader, &writer, [Greet, Fail]).await;
            assert_eq!(result, Ok(()));
            // The command's output is queued on the write session.
            assert_eq!(writer.is_empty(), Ok(false));

            assert_eq!(
                dispatch_line!("greet", &reader, &writer, [Greet, Fail]).await,
                Err(DispatchError::Exec(CmdError::Usage))
            );
            assert_eq!(
                dispatch_line!("fail now", &reader, &writer, [Greet, Fail]).await,
                Err(DispatchError::Exec(CmdError::Failed("broken")))
            );
            assert_eq!(
                dispatch_line!("nope", &reader, &writer, [Greet, Fail]).await,
                Err(DispatchError::UnknownCommand)
            );
            assert_eq!(
                dispatch_line!("", &reader, &writer, [Greet, Fail]).await,
                Err(DispatchError::Empty)
            );
        });
    }
}
