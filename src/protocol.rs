//! Line protocol spoken with a game over its standard streams.
//!
//! * Server -> Game : `W\n` (do one unit of work) or `Q\n` (quit)
//! * Game -> Server : at least one byte answering the last `W`
//!
//! A response is whatever a single successful read returns, up to the buffer size. There is
//! no further framing.

use std::io::{ErrorKind, Read, Write};

use tracing::error;

use crate::error::ProtocolError;

/// Commands understood by a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Request one unit of work; the game must answer.
    Work,
    /// Request a graceful shutdown.
    Quit,
}

impl Command {
    /// The full line sent on the wire, terminator included.
    pub const fn line(self) -> &'static [u8] {
        match self {
            Command::Work => b"W\n",
            Command::Quit => b"Q\n",
        }
    }
}

/// Write one command line with a single `write` call.
///
/// A partial write is an error, the game would see a truncated line.
pub fn write_command<W: Write>(sink: &mut W, command: Command) -> Result<(), ProtocolError> {
    let msg = command.line();
    match sink.write(msg) {
        Ok(n) if n < msg.len() => {
            error!("only {}/{} bytes of {:?} were sent", n, msg.len(), command);
            return Err(ProtocolError::ShortWrite {
                written: n,
                expected: msg.len(),
            });
        }
        Ok(_) => {}
        Err(e) => return Err(ProtocolError::Write(e)),
    }
    sink.flush().map_err(ProtocolError::Write)
}

/// Block until at least one byte is available and return at most `max_len` bytes.
pub fn read_response<R: Read>(source: &mut R, max_len: usize) -> Result<Vec<u8>, ProtocolError> {
    let mut buf = vec![0; max_len.max(1)];
    loop {
        match source.read(&mut buf) {
            Ok(0) => return Err(ProtocolError::EndOfStream),
            Ok(n) => {
                buf.truncate(n);
                return Ok(buf);
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(ProtocolError::Read(e)),
        }
    }
}
