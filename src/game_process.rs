//! One running game and its pipes.
//!
//! A [`GameHandle`] is created by the pool and shared with callers through an `Arc`. The pipes
//! sit behind a per-handle lock, so one interaction (`W` then a response) is never interleaved
//! with another one or with the quit sequence. The process itself sits behind a second lock
//! that is only ever held briefly, so a game stuck in an interaction can still be killed.

use std::{
    process::{Child, ChildStdin, ChildStdout, Command as Process, ExitStatus, Stdio},
    sync::{Mutex, MutexGuard, PoisonError, TryLockError},
    thread,
    time::{Duration, Instant},
};

use tracing::{debug, instrument, trace, warn};

use crate::{
    configuration::Configuration,
    error::{ProtocolError, ShutdownError, SpawnError},
    protocol::{read_response, write_command, Command},
    GameId,
};

/// Both pipe ends, present until the game is terminated.
#[derive(Debug)]
struct Pipes {
    input: ChildStdin,
    output: ChildStdout,
}

/// Handle to one game process, addressed by its identifier.
///
/// Lock order: `pipes` before `child`. `terminate` never holds `child` while waiting on `pipes`.
#[derive(Debug)]
pub struct GameHandle {
    id: GameId,
    max_response_bytes: usize,
    quit_timeout: Option<Duration>,
    child: Mutex<Option<Child>>,
    pipes: Mutex<Option<Pipes>>,
}

impl GameHandle {
    /// Launch `command args... id` with piped stdin/stdout.
    ///
    /// If a pipe cannot be captured the half-started process is killed before returning.
    #[instrument(skip(config), fields(command = %config.command))]
    pub(crate) fn spawn(id: GameId, config: &Configuration) -> Result<GameHandle, SpawnError> {
        let mut cmd = Process::new(&config.command);
        cmd.args(config.game_args(id))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped());
        if !config.debug_game_stderr {
            cmd.stderr(Stdio::null());
        }

        let mut child = cmd.spawn().map_err(|source| SpawnError::Start {
            command: config.command.clone(),
            source,
        })?;

        let pipes = match (child.stdin.take(), child.stdout.take()) {
            (Some(input), Some(output)) => Ok(Pipes { input, output }),
            (None, _) => Err(SpawnError::Pipe("stdin")),
            (_, None) => Err(SpawnError::Pipe("stdout")),
        };
        let pipes = match pipes {
            Ok(pipes) => pipes,
            Err(e) => {
                kill_and_reap(&mut child);
                return Err(e);
            }
        };

        debug!(pid = child.id(), "game process started");

        Ok(GameHandle {
            id,
            max_response_bytes: config.max_response_bytes,
            quit_timeout: config.quit_timeout,
            child: Mutex::new(Some(child)),
            pipes: Mutex::new(Some(pipes)),
        })
    }

    /// Identifier this game was created for.
    pub fn id(&self) -> GameId {
        self.id
    }

    /// OS process id, or `None` once terminated.
    pub fn pid(&self) -> Option<u32> {
        self.child().as_ref().map(Child::id)
    }

    /// False as soon as [`terminate`](Self::terminate) has started, whatever its outcome.
    pub fn is_running(&self) -> bool {
        self.child().is_some()
    }

    /// Send `W` and return the response (between 1 and `max_response_bytes` bytes).
    ///
    /// Holds the pipe lock for the whole round trip. Blocks until the game answers or
    /// closes its output, which includes being killed by [`terminate`](Self::terminate).
    #[instrument(skip(self), fields(game_id = self.id))]
    pub fn interact(&self) -> Result<Vec<u8>, ProtocolError> {
        let mut pipes = self.pipes();
        if !self.is_running() {
            // terminated while we queued for the pipes
            pipes.take();
            return Err(ProtocolError::Closed);
        }
        let Pipes { input, output } = pipes.as_mut().ok_or(ProtocolError::Closed)?;

        write_command(input, Command::Work)?;
        let response = read_response(output, self.max_response_bytes)?;

        trace!(bytes = response.len(), "game responded");
        Ok(response)
    }

    /// Send `Q`, close both pipes and wait for the process to exit.
    ///
    /// An interaction in flight gets `quit_timeout` to finish. After that the game is killed,
    /// which ends the blocked read, and [`ShutdownError::Busy`] is returned. The handle is
    /// unusable afterwards even if this fails. Terminating twice is a no-op.
    #[instrument(skip(self), fields(game_id = self.id))]
    pub fn terminate(&self) -> Result<(), ShutdownError> {
        let Some(mut child) = self.child().take() else {
            trace!("game already terminated");
            return Ok(());
        };

        let Some(mut pipes) = self.pipes_within(self.quit_timeout) else {
            warn!(pid = child.id(), "game is stuck in an interaction, killing it");
            kill_and_reap(&mut child);
            return Err(ShutdownError::Busy(self.quit_timeout.unwrap_or_default()));
        };

        // None when a queued interaction already dropped the pipes, the game then sees EOF
        if let Some(Pipes { mut input, output }) = pipes.take() {
            let sent = write_command(&mut input, Command::Quit);
            drop(input);
            drop(output);

            if let Err(e) = sent {
                // the process may still be alive without a way to reach it
                kill_and_reap(&mut child);
                return Err(match e {
                    ProtocolError::Write(io) => ShutdownError::Write(io),
                    other => ShutdownError::Write(std::io::Error::other(other)),
                });
            }
        }
        drop(pipes);

        let status = match self.quit_timeout {
            Some(max_duration) => wait_with_deadline(&mut child, max_duration)?,
            None => child.wait().map_err(ShutdownError::Wait)?,
        };

        if !status.success() {
            return Err(ShutdownError::Status(status));
        }
        debug!("game exited");
        Ok(())
    }

    fn child(&self) -> MutexGuard<'_, Option<Child>> {
        self.child.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn pipes(&self) -> MutexGuard<'_, Option<Pipes>> {
        self.pipes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Pipe lock, polled for at most `max_duration`. `None` waits forever.
    fn pipes_within(
        &self,
        max_duration: Option<Duration>,
    ) -> Option<MutexGuard<'_, Option<Pipes>>> {
        let Some(max_duration) = max_duration else {
            return Some(self.pipes());
        };
        let deadline = Instant::now() + max_duration;
        loop {
            match self.pipes.try_lock() {
                Ok(guard) => return Some(guard),
                Err(TryLockError::Poisoned(poisoned)) => return Some(poisoned.into_inner()),
                Err(TryLockError::WouldBlock) if Instant::now() > deadline => return None,
                Err(TryLockError::WouldBlock) => thread::sleep(poll_interval(max_duration)),
            }
        }
    }
}

impl Drop for GameHandle {
    fn drop(&mut self) {
        let child = self
            .child
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(mut child) = child {
            warn!(
                game_id = self.id,
                "game was not terminated before dropping, killing it"
            );
            kill_and_reap(&mut child);
        }
    }
}

fn poll_interval(max_duration: Duration) -> Duration {
    Duration::from_millis(10).min(max_duration / 10)
}

/// Poll the child until it exits, killing it when `max_duration` runs out.
fn wait_with_deadline(
    child: &mut Child,
    max_duration: Duration,
) -> Result<ExitStatus, ShutdownError> {
    let deadline = Instant::now() + max_duration;
    loop {
        if let Some(status) = child.try_wait().map_err(ShutdownError::Wait)? {
            return Ok(status);
        }
        if Instant::now() > deadline {
            warn!(pid = child.id(), "game ignored quit command, killing it");
            kill_and_reap(child);
            return Err(ShutdownError::Timeout(max_duration));
        }
        thread::sleep(poll_interval(max_duration));
    }
}

fn kill_and_reap(child: &mut Child) {
    if let Err(e) = child.kill().and_then(|()| child.wait().map(drop)) {
        warn!(pid = child.id(), "could not kill game process: {e}");
    }
}
