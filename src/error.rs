//! Error types for the game pool.
//!
//! Each layer has its own error: [`SpawnError`] and [`ShutdownError`] for the lifecycle of a
//! single game process, [`ProtocolError`] for one `W` round trip, and [`PoolError`] for
//! everything the pool reports to its callers.

use std::{io, process::ExitStatus, time::Duration};

use crate::GameId;

/// Launching a game process failed. No handle exists afterwards.
#[derive(Debug, thiserror::Error)]
pub enum SpawnError {
    /// The program could not be started at all.
    #[error("could not start '{command}'")]
    Start {
        /// Program that was launched.
        command: String,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },

    /// The process started but one of its pipes was not captured.
    #[error("could not capture the {0} pipe of the game process")]
    Pipe(&'static str),
}

/// One interaction (`W` then a response) with a game failed.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The game was already terminated.
    #[error("game process is no longer running")]
    Closed,

    /// The command was only partially written.
    #[error("only {written}/{expected} bytes of the command were sent")]
    ShortWrite {
        /// Bytes accepted by the pipe.
        written: usize,
        /// Length of the command line.
        expected: usize,
    },

    /// Writing the command failed (a game that exited shows up as a broken pipe).
    #[error("I/O error while sending command")]
    Write(#[source] io::Error),

    /// The game closed its output without sending a single byte.
    #[error("game closed its output before responding")]
    EndOfStream,

    /// Reading the response failed.
    #[error("I/O error while reading response")]
    Read(#[source] io::Error),
}

/// The quit sequence of a game failed. The game is unusable regardless.
#[derive(Debug, thiserror::Error)]
pub enum ShutdownError {
    /// `Q` could not be written.
    #[error("could not send quit command")]
    Write(#[source] io::Error),

    /// Waiting for the process failed.
    #[error("could not wait for game process")]
    Wait(#[source] io::Error),

    /// The process exited, but not successfully.
    #[error("game process exited with {0}")]
    Status(ExitStatus),

    /// The process ignored `Q` and was killed.
    #[error("game process did not exit within {0:?} and was killed")]
    Timeout(Duration),

    /// An interaction was still waiting on the game after the given time, so it was killed.
    #[error("game was stuck in an interaction for {0:?} and was killed")]
    Busy(Duration),
}

/// Errors reported by [`GamePool`](crate::pool::GamePool).
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    /// A new game could not be spawned. Its slot was left empty.
    #[error("could not spawn game {id}")]
    Spawn {
        /// Requested identifier.
        id: GameId,
        /// Cause.
        #[source]
        source: SpawnError,
    },

    /// The occupant of the slot under the cursor did not shut down cleanly.
    /// The slot was cleared anyway.
    #[error("could not evict game {id} from slot {slot}")]
    Eviction {
        /// Identifier of the evicted game.
        id: GameId,
        /// Slot it occupied.
        slot: usize,
        /// Cause.
        #[source]
        source: ShutdownError,
    },

    /// An explicit termination failed. The slot was cleared anyway.
    #[error("could not shut down game {id} in slot {slot}")]
    Shutdown {
        /// Identifier of the terminated game.
        id: GameId,
        /// Slot it occupied.
        slot: usize,
        /// Cause.
        #[source]
        source: ShutdownError,
    },

    /// Interaction with a live game failed. The game stays in its slot.
    #[error("interaction with game {id} failed")]
    Protocol {
        /// Identifier of the game.
        id: GameId,
        /// Cause.
        #[source]
        source: ProtocolError,
    },

    /// At least one game failed to shut down during a flush. Every slot was still cleared.
    #[error("{failed} game(s) failed to shut down during flush")]
    Flush {
        /// Number of slots whose shutdown failed.
        failed: usize,
        /// First failure encountered.
        #[source]
        source: Box<PoolError>,
    },
}
