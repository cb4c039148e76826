//! Games written as `sh -c` scripts. The pool appends the identifier, which the script sees
//! as `$1`.

#![allow(dead_code)]

use std::time::Duration;

use game_pool::prelude::*;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Answers every `W` with `game <id>`, exits cleanly on `Q`.
pub const ECHO_GAME: &str = r#"while IFS= read -r line; do
  case "$line" in
    W) echo "game $1" ;;
    Q) exit 0 ;;
  esac
done"#;

/// Counts its `W`s, so a fresh process is visible from its answers.
pub const COUNTING_GAME: &str = r#"n=0
while IFS= read -r line; do
  case "$line" in
    W) n=$((n + 1)); echo "game $1 turn $n" ;;
    Q) exit 0 ;;
  esac
done"#;

/// Like [`ECHO_GAME`] but exits with an error on `Q`.
pub const GRUMPY_GAME: &str = r#"while IFS= read -r line; do
  case "$line" in
    W) echo "game $1" ;;
    Q) exit 3 ;;
  esac
done"#;

/// Answers normally, except identifiers below zero fail to shut down.
pub const NEGATIVE_IDS_FAIL_GAME: &str = r#"while IFS= read -r line; do
  case "$line" in
    W) echo "game $1" ;;
    Q) if [ "$1" -lt 0 ]; then exit 1; else exit 0; fi ;;
  esac
done"#;

/// Never answers `W` for identifiers below zero. `exec` so a kill closes its output.
pub const STALLING_GAME: &str = r#"while IFS= read -r line; do
  case "$line" in
    W) if [ "$1" -lt 0 ]; then exec sleep 30; fi; echo "game $1" ;;
    Q) exit 0 ;;
  esac
done"#;

/// Takes two seconds to exit after `Q`.
pub const SLOW_QUIT_GAME: &str = r#"while IFS= read -r line; do
  case "$line" in
    W) echo "game $1" ;;
    Q) sleep 2; exit 0 ;;
  esac
done"#;

/// Exits after answering once.
pub const ONE_SHOT_GAME: &str = r#"read -r line; echo "game $1 bye""#;

pub fn config(script: &str) -> Configuration {
    Configuration::new()
        .with_command("sh", ["-c", script, "stub-game"])
        .with_quit_timeout(Some(Duration::from_secs(5)))
}

pub fn pool(script: &str, capacity: usize) -> GamePool {
    GamePool::new(config(script).with_capacity(capacity))
}

pub fn init_test_logger() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::DEBUG)
        .with_ansi(false)
        .with_test_writer()
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}
