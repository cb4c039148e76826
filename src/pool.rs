//! Fixed-capacity pool of games.
//!
//! The pool maps identifiers to live [`GameHandle`]s. It owns a fixed number of slots and a
//! round-robin cursor: a new game always goes into the slot under the cursor, evicting whatever
//! game lives there, and the cursor then moves to the next slot. Eviction ignores how recently a
//! game was used.
//!
//! Every operation that reads or changes the slots runs under a single lock, so two concurrent
//! misses can never claim the same slot. Interactions only hold the lock of the handle they
//! talk to.
//!
//! # Example
//!
//! ```no_run
//! use game_pool::prelude::*;
//!
//! fn main() -> Result<(), PoolError> {
//!     let pool = GamePool::new(Configuration::new().with_capacity(2));
//!
//!     let game = pool.lookup_or_create(7)?;
//!     let response = game.interact().map_err(|source| PoolError::Protocol { id: 7, source })?;
//!     println!("{}", String::from_utf8_lossy(&response));
//!
//!     pool.flush_all()
//! }
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, instrument, warn};

use crate::{
    configuration::Configuration, error::PoolError, game_process::GameHandle, GameId,
};

/// Slots and cursor, always changed together.
struct Slots {
    slots: Vec<Option<Arc<GameHandle>>>,
    next_slot: usize,
}

impl Slots {
    fn position(&self, id: GameId) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| slot.as_ref().is_some_and(|game| game.id() == id))
    }

    fn ids(&self) -> Vec<Option<GameId>> {
        self.slots
            .iter()
            .map(|slot| slot.as_ref().map(|game| game.id()))
            .collect()
    }
}

/// Bounded set of game processes addressed by identifier.
pub struct GamePool {
    config: Configuration,
    state: Mutex<Slots>,
}

impl GamePool {
    /// Create an empty pool with `config.capacity()` slots.
    pub fn new(config: Configuration) -> GamePool {
        let capacity = config.capacity();
        info!(capacity, command = %config.command, "creating game pool");
        GamePool {
            config,
            state: Mutex::new(Slots {
                slots: (0..capacity).map(|_| None).collect(),
                next_slot: 0,
            }),
        }
    }

    /// Number of slots.
    pub fn capacity(&self) -> usize {
        self.lock().slots.len()
    }

    /// Slot that will receive the next new game.
    pub fn next_slot(&self) -> usize {
        self.lock().next_slot
    }

    /// Number of occupied slots.
    pub fn live_count(&self) -> usize {
        self.lock().slots.iter().flatten().count()
    }

    /// Slot currently holding game `id`.
    pub fn slot_of(&self, id: GameId) -> Option<usize> {
        self.lock().position(id)
    }

    /// Identifier held by each slot, in slot order.
    pub fn snapshot(&self) -> Vec<Option<GameId>> {
        self.lock().ids()
    }

    /// [`snapshot`](Self::snapshot) and [`next_slot`](Self::next_slot), read under one lock.
    pub fn snapshot_with_cursor(&self) -> (Vec<Option<GameId>>, usize) {
        let state = self.lock();
        (state.ids(), state.next_slot)
    }

    /// Live game `id`, without creating it.
    pub fn get(&self, id: GameId) -> Option<Arc<GameHandle>> {
        let state = self.lock();
        state.position(id).and_then(|i| state.slots[i].clone())
    }

    /// Return the live game `id`, or spawn it into the slot under the cursor.
    ///
    /// On a miss, the current occupant of that slot is terminated first. Its slot is cleared
    /// even if the shutdown fails, in which case [`PoolError::Eviction`] is returned and
    /// nothing is spawned. A spawn failure leaves the slot empty. The cursor only moves once
    /// the new game is stored.
    #[instrument(skip(self))]
    pub fn lookup_or_create(&self, id: GameId) -> Result<Arc<GameHandle>, PoolError> {
        let mut state = self.lock();

        if let Some(game) = state.position(id).and_then(|i| state.slots[i].clone()) {
            debug!("cache hit");
            return Ok(game);
        }

        let slot = state.next_slot;
        debug_assert!(slot < state.slots.len(), "next_slot must be in range");

        if let Some(evicted) = state.slots[slot].take() {
            info!(slot, evicted = evicted.id(), "evicting game");
            evicted.terminate().map_err(|source| PoolError::Eviction {
                id: evicted.id(),
                slot,
                source,
            })?;
        }

        let game = GameHandle::spawn(id, &self.config)
            .map(Arc::new)
            .map_err(|source| PoolError::Spawn { id, source })?;

        state.slots[slot] = Some(game.clone());
        state.next_slot = (slot + 1) % state.slots.len();
        info!(slot, pid = ?game.pid(), "game created");

        Ok(game)
    }

    /// Look up or create game `id` and run one interaction with it.
    ///
    /// The pool lock is released before talking to the game, only the game's own lock is held
    /// during the round trip.
    pub fn interact(&self, id: GameId) -> Result<Vec<u8>, PoolError> {
        let game = self.lookup_or_create(id)?;
        game.interact()
            .map_err(|source| PoolError::Protocol { id, source })
    }

    /// Terminate game `id` and free its slot. The cursor does not move.
    ///
    /// Returns `Ok(false)` when no such game is live.
    ///
    /// The slot is freed before the game is asked to quit, so the quit handshake runs without
    /// the pool lock.
    #[instrument(skip(self))]
    pub fn terminate(&self, id: GameId) -> Result<bool, PoolError> {
        let (slot, game) = {
            let mut state = self.lock();
            let Some(slot) = state.position(id) else {
                return Ok(false);
            };
            let Some(game) = state.slots[slot].take() else {
                return Ok(false);
            };
            (slot, game)
        };
        game.terminate()
            .map_err(|source| PoolError::Shutdown { id, slot, source })?;
        info!(slot, "game terminated");
        Ok(true)
    }

    /// Terminate every live game and clear every slot.
    ///
    /// Every slot is attempted even after a failure. The first failure is returned together with
    /// the number of failed slots. Handles that no longer own a process are cleared without
    /// being terminated.
    #[instrument(skip(self))]
    pub fn flush_all(&self) -> Result<(), PoolError> {
        let mut state = self.lock();
        let mut first_error = None;
        let mut failed = 0;
        let mut terminated = 0;

        for (slot, entry) in state.slots.iter_mut().enumerate() {
            let Some(game) = entry.take() else {
                continue;
            };
            if !game.is_running() {
                debug!(slot, game_id = game.id(), "clearing stopped game");
                continue;
            }
            match game.terminate() {
                Ok(()) => terminated += 1,
                Err(source) => {
                    warn!(slot, game_id = game.id(), "game failed to shut down: {source}");
                    failed += 1;
                    first_error.get_or_insert(PoolError::Shutdown {
                        id: game.id(),
                        slot,
                        source,
                    });
                }
            }
        }

        info!(terminated, failed, "pool flushed");
        match first_error {
            None => Ok(()),
            Some(source) => Err(PoolError::Flush {
                failed,
                source: Box::new(source),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slots> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for GamePool {
    fn drop(&mut self) {
        if let Err(e) = self.flush_all() {
            warn!("could not shut down every game when dropping the pool: {e}");
        }
    }
}

#[cfg(all(test, unix))]
mod pool_tests {
    use super::*;

    const ECHO_GAME: &str = r#"while IFS= read -r line; do
  case "$line" in
    W) echo "game $1" ;;
    Q) exit 0 ;;
  esac
done"#;

    fn pool(capacity: usize) -> GamePool {
        GamePool::new(
            Configuration::new()
                .with_command("sh", ["-c", ECHO_GAME, "pool-test"])
                .with_capacity(capacity),
        )
    }

    #[test]
    fn new_pool_is_empty() {
        let pool = pool(3);
        assert_eq!(pool.capacity(), 3);
        assert_eq!(pool.live_count(), 0);
        assert_eq!(pool.next_slot(), 0);
        assert_eq!(pool.snapshot(), [None, None, None]);
        assert!(pool.get(1).is_none());
    }

    #[test]
    fn get_never_spawns() {
        let pool = pool(2);
        assert!(pool.get(4).is_none());
        let game = pool.lookup_or_create(4).unwrap();
        assert!(Arc::ptr_eq(&game, &pool.get(4).unwrap()));
        assert_eq!(pool.live_count(), 1);
    }

    #[test]
    fn capacity_of_one_always_evicts() {
        let pool = pool(1);
        let first = pool.lookup_or_create(1).unwrap();
        let second = pool.lookup_or_create(2).unwrap();
        assert!(!first.is_running());
        assert!(second.is_running());
        assert_eq!(pool.snapshot(), [Some(2)]);
        assert_eq!(pool.next_slot(), 0);
    }

    #[test]
    fn snapshot_and_cursor_agree() {
        let pool = pool(2);
        pool.lookup_or_create(1).unwrap();
        assert_eq!(pool.snapshot_with_cursor(), (vec![Some(1), None], 1));
        pool.lookup_or_create(2).unwrap();
        assert_eq!(pool.snapshot_with_cursor(), (vec![Some(1), Some(2)], 0));
    }

    #[test]
    fn terminate_unknown_game_is_not_an_error() {
        let pool = pool(2);
        assert!(!pool.terminate(9).unwrap());
    }

    #[test]
    fn drop_flushes_live_games() {
        let pool = pool(2);
        let game = pool.lookup_or_create(1).unwrap();
        drop(pool);
        assert!(!game.is_running());
    }
}
