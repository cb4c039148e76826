//! # Game Pool
//!
//! A bounded pool of long-lived game processes, each addressed by an integer identifier, and
//! the tiny line protocol used to talk to them over their standard streams.
//!
//! It provides:
//! - A fixed-capacity [`GamePool`](crate::pool::GamePool) with round-robin eviction
//! - [`GameHandle`](crate::game_process::GameHandle), owning one process and its pipes
//! - The `W`/`Q` line [`protocol`]
//! - An HTTP front built on axum ([`server`])
//!
//! # Documentation Overview
//!
//! - For slot assignment, lookup and eviction, see the [`pool`] module.
//! - For the lifecycle of a single game (spawn, interaction, shutdown), see [`game_process`].
//! - For launch command, capacity, timeouts and logging, see
//!   [`Configuration`](crate::configuration::Configuration).
//! - For the error taxonomy, see [`error`].
//!
//! # Usage Example
//!
//! ```no_run
//! use std::time::Duration;
//! use game_pool::prelude::*;
//!
//! fn main() -> Result<(), PoolError> {
//!     let config = Configuration::new()
//!         .with_command("./my-game", ["--seed", "42"]) // launched as `./my-game --seed 42 <id>`
//!         .with_capacity(4)
//!         .with_quit_timeout(Some(Duration::from_secs(2)));
//!     let pool = GamePool::new(config);
//!
//!     for id in [1, 2, 1] {
//!         let response = pool.interact(id)?;
//!         println!("game {id}: {}", String::from_utf8_lossy(&response));
//!     }
//!
//!     pool.flush_all()
//! }
//! ```
//!
//! # Example Game
//!
//! A game reads commands line by line on stdin and answers on stdout:
//!
//! ```no_run
//! use std::io::{self, BufRead, Write};
//!
//! fn main() -> io::Result<()> {
//!     let id = std::env::args().last().unwrap_or_default();
//!     let mut out = io::stdout();
//!     for line in io::stdin().lock().lines() {
//!         match line?.as_str() {
//!             "W" => {
//!                 writeln!(out, "hello from game {id}")?;
//!                 out.flush()?;
//!             }
//!             "Q" => break,
//!             _ => {}
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Game Requirements
//!
//! - The identifier is the last command line argument
//! - Every `W\n` must be answered with at least one byte, flushed
//! - `Q\n` must make the game exit with a success status
#![warn(missing_docs)]

pub mod configuration;
pub mod error;
pub mod game_process;
mod logger;
pub mod pool;
pub mod protocol;
pub mod server;

pub use logger::init_logger;

/// Caller-supplied key of a game.
pub type GameId = i64;

/// Commonly used types for quick access.
///
/// ```rust
/// use game_pool::prelude::*;
/// ```
pub mod prelude {
    pub use crate::configuration::Configuration;
    pub use crate::error::{PoolError, ProtocolError, ShutdownError, SpawnError};
    pub use crate::game_process::GameHandle;
    pub use crate::pool::GamePool;
    pub use crate::GameId;
}
