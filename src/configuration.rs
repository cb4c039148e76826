//! Config for the game pool and the server around it
//!
//! Configuration can be created programmatically using [`Configuration::new()`] or by reading
//! environment variables using [`Configuration::from_env()`].
//!
//! # Environment Variables
//!
//! All values are optional. Unset or unparsable values keep their default. Flags are
//! case-insensitive, set the value to `"true"` to enable one.
//!
//! - `GAMES_COMMAND`: Program and leading arguments, whitespace separated (default: `zig build run -- hello world from`)
//! - `GAMES_CAPACITY`: Number of slots in the pool, at least 1 (default: `4`)
//! - `GAMES_MAX_RESPONSE_BYTES`: Largest response read in one interaction (default: `8192`)
//! - `GAMES_QUIT_TIMEOUT_MS`: How long a game may take to exit after `Q`, `0` waits forever (default: `5000`)
//! - `GAMES_INTERACTION_TIMEOUT_MS`: How long an HTTP request waits for a game (default: `10000`)
//! - `GAMES_LISTEN_ADDR`: Address the HTTP server binds to (default: `0.0.0.0:3000`)
//! - `GAMES_LOG`: Log to a timestamped file instead of stderr (default: `false`)
//! - `GAMES_LOG_LEVEL`: Maximum log level (default: `info`)
//! - `GAMES_DEBUG_STDERR`: Let game stderr through (default: `false`)

use std::{net::SocketAddr, str::FromStr, time::Duration};

use tracing::Level;

use crate::GameId;

/// Configuration for the pool, its games and the HTTP server.
#[derive(Debug, Clone)]
pub struct Configuration {
    pub(crate) command: String,
    pub(crate) args: Vec<String>,
    pub(crate) capacity: usize,
    pub(crate) max_response_bytes: usize,
    pub(crate) quit_timeout: Option<Duration>,
    pub(crate) interaction_timeout: Duration,
    pub(crate) listen_addr: SocketAddr,
    pub(crate) log: bool,
    pub(crate) log_level: Level,
    pub(crate) debug_game_stderr: bool,
}

impl Configuration {
    const DEFAULT_COMMAND: &'static str = "zig build run -- hello world from";

    /// Create a new configuration with default parameters.
    ///
    /// By default:
    /// - Games are launched with `zig build run -- hello world from <id>`.
    /// - The pool holds 4 games.
    /// - Responses are read into an 8 KiB buffer.
    /// - A game gets 5 seconds to exit after `Q` before being killed.
    /// - HTTP interactions give up after 10 seconds.
    /// - The server listens on `0.0.0.0:3000`.
    /// - Logs go to stderr at `INFO` level.
    /// - Game stderr is discarded.
    pub fn new() -> Self {
        let mut words = Self::DEFAULT_COMMAND.split_whitespace().map(str::to_owned);
        Self {
            command: words.next().unwrap_or_default(),
            args: words.collect(),
            capacity: 4,
            max_response_bytes: 8192,
            quit_timeout: Some(Duration::from_secs(5)),
            interaction_timeout: Duration::from_secs(10),
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            log: false,
            log_level: Level::INFO,
            debug_game_stderr: false,
        }
    }

    /// Create configuration from environment variables (see the [module documentation](self)).
    pub fn from_env() -> Self {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        fn parsed<T: FromStr>(value: Option<String>) -> Option<T> {
            value.and_then(|v| v.trim().parse().ok())
        }

        let flag = |var: &str, default: bool| match lookup(var) {
            Some(val) => val.eq_ignore_ascii_case("true"),
            None => default,
        };

        let mut config = Self::new();

        if let Some(line) = lookup("GAMES_COMMAND") {
            let mut words = line.split_whitespace().map(str::to_owned);
            if let Some(command) = words.next() {
                config.command = command;
                config.args = words.collect();
            }
        }
        if let Some(capacity) = parsed::<usize>(lookup("GAMES_CAPACITY")).filter(|&c| c > 0) {
            config.capacity = capacity;
        }
        if let Some(bytes) = parsed::<usize>(lookup("GAMES_MAX_RESPONSE_BYTES")).filter(|&b| b > 0)
        {
            config.max_response_bytes = bytes;
        }
        if let Some(ms) = parsed::<u64>(lookup("GAMES_QUIT_TIMEOUT_MS")) {
            config.quit_timeout = (ms > 0).then(|| Duration::from_millis(ms));
        }
        if let Some(ms) = parsed::<u64>(lookup("GAMES_INTERACTION_TIMEOUT_MS")).filter(|&m| m > 0)
        {
            config.interaction_timeout = Duration::from_millis(ms);
        }
        if let Some(addr) = parsed(lookup("GAMES_LISTEN_ADDR")) {
            config.listen_addr = addr;
        }
        if let Some(level) = parsed(lookup("GAMES_LOG_LEVEL")) {
            config.log_level = level;
        }
        config.log = flag("GAMES_LOG", false);
        config.debug_game_stderr = flag("GAMES_DEBUG_STDERR", false);

        config
    }

    /// Set the program used to launch games and its leading arguments.
    ///
    /// The game identifier is always appended after `args`.
    pub fn with_command<I, S>(mut self, command: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.command = command.into();
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Set the number of slots. Values below 1 are raised to 1.
    pub fn with_capacity(mut self, value: usize) -> Self {
        self.capacity = value.max(1);
        self
    }

    /// Set the largest response returned by one interaction. Values below 1 are raised to 1.
    pub fn with_max_response_bytes(mut self, value: usize) -> Self {
        self.max_response_bytes = value.max(1);
        self
    }

    /// Set how long a game may take to exit after `Q`. `None` waits forever.
    pub fn with_quit_timeout(mut self, value: Option<Duration>) -> Self {
        self.quit_timeout = value;
        self
    }

    /// Set how long the HTTP layer waits for one interaction.
    pub fn with_interaction_timeout(mut self, value: Duration) -> Self {
        self.interaction_timeout = value;
        self
    }

    /// Set the HTTP listen address.
    pub fn with_listen_addr(mut self, value: SocketAddr) -> Self {
        self.listen_addr = value;
        self
    }

    /// Enable or disable logging to file.
    pub fn with_log(mut self, value: bool) -> Self {
        self.log = value;
        self
    }

    /// Set the maximum log level.
    pub fn with_log_level(mut self, value: Level) -> Self {
        self.log_level = value;
        self
    }

    /// Enable or disable game stderr output (debug purposes only).
    pub fn with_debug_game_stderr(mut self, value: bool) -> Self {
        self.debug_game_stderr = value;
        self
    }

    /// Number of slots in the pool.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Address the HTTP server binds to.
    pub fn listen_addr(&self) -> SocketAddr {
        self.listen_addr
    }

    /// How long the HTTP layer waits for one interaction.
    pub fn interaction_timeout(&self) -> Duration {
        self.interaction_timeout
    }

    /// Full argument list for the game `id`: leading arguments then the identifier.
    pub(crate) fn game_args(&self, id: GameId) -> Vec<String> {
        let mut args = self.args.clone();
        args.push(id.to_string());
        args
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod configuration_tests {
    use std::collections::HashMap;

    use super::*;

    fn from_pairs(pairs: &[(&str, &str)]) -> Configuration {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Configuration::from_lookup(|var| env.get(var).cloned())
    }

    #[test]
    fn defaults_launch_zig_with_id_last() {
        let config = Configuration::new();
        assert_eq!(config.command, "zig");
        assert_eq!(
            config.game_args(42),
            ["build", "run", "--", "hello", "world", "from", "42"]
        );
        assert_eq!(config.capacity, 4);
        assert_eq!(config.max_response_bytes, 8192);
        assert_eq!(config.quit_timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn empty_environment_keeps_defaults() {
        let config = from_pairs(&[]);
        let default = Configuration::new();
        assert_eq!(config.command, default.command);
        assert_eq!(config.args, default.args);
        assert_eq!(config.capacity, default.capacity);
        assert_eq!(config.listen_addr, default.listen_addr);
        assert!(!config.log);
        assert!(!config.debug_game_stderr);
    }

    #[test]
    fn environment_overrides() {
        let config = from_pairs(&[
            ("GAMES_COMMAND", "  ./game   --fast "),
            ("GAMES_CAPACITY", "8"),
            ("GAMES_MAX_RESPONSE_BYTES", "16"),
            ("GAMES_QUIT_TIMEOUT_MS", "0"),
            ("GAMES_INTERACTION_TIMEOUT_MS", "250"),
            ("GAMES_LISTEN_ADDR", "127.0.0.1:8080"),
            ("GAMES_LOG", "TRUE"),
            ("GAMES_LOG_LEVEL", "debug"),
            ("GAMES_DEBUG_STDERR", "true"),
        ]);
        assert_eq!(config.command, "./game");
        assert_eq!(config.game_args(-3), ["--fast", "-3"]);
        assert_eq!(config.capacity, 8);
        assert_eq!(config.max_response_bytes, 16);
        assert_eq!(config.quit_timeout, None);
        assert_eq!(config.interaction_timeout, Duration::from_millis(250));
        assert_eq!(config.listen_addr, "127.0.0.1:8080".parse().unwrap());
        assert!(config.log);
        assert_eq!(config.log_level, Level::DEBUG);
        assert!(config.debug_game_stderr);
    }

    #[test]
    fn invalid_values_are_ignored() {
        let config = from_pairs(&[
            ("GAMES_COMMAND", "   "),
            ("GAMES_CAPACITY", "0"),
            ("GAMES_MAX_RESPONSE_BYTES", "lots"),
            ("GAMES_LISTEN_ADDR", "nowhere"),
            ("GAMES_LOG", "yes"),
        ]);
        assert_eq!(config.command, "zig");
        assert_eq!(config.capacity, 4);
        assert_eq!(config.max_response_bytes, 8192);
        assert_eq!(config.listen_addr, Configuration::new().listen_addr);
        assert!(!config.log);
    }

    #[test]
    fn builder_clamps_sizes() {
        let config = Configuration::new()
            .with_capacity(0)
            .with_max_response_bytes(0)
            .with_command("sh", ["-c", "cat"]);
        assert_eq!(config.capacity(), 1);
        assert_eq!(config.max_response_bytes, 1);
        assert_eq!(config.game_args(7), ["-c", "cat", "7"]);
    }
}
