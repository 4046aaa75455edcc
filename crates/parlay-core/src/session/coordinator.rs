//! Per-user turn lock.
//!
//! One agent binding backs all of a user's conversations, and the binding's
//! upstream memory state is not safe for concurrent mutation, so mutual
//! exclusion is scoped to the user rather than the conversation. A second
//! caller is rejected immediately with `Busy` -- turns are never queued.
//!
//! Never hold a `DashMap` guard across an await point; every map access in
//! this module completes synchronously.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use uuid::Uuid;

use parlay_types::error::ChatError;

/// Occupant of a user's turn slot.
struct ActiveTurn {
    turn_id: Uuid,
    token: CancellationToken,
}

/// Grants and tracks at most one in-flight generation turn per user.
#[derive(Clone)]
pub struct TurnCoordinator {
    active: Arc<DashMap<Uuid, ActiveTurn>>,
    hard_timeout: Duration,
}

impl TurnCoordinator {
    /// Create a coordinator with the given hard-timeout backstop.
    pub fn new(hard_timeout: Duration) -> Self {
        Self {
            active: Arc::new(DashMap::new()),
            hard_timeout,
        }
    }

    /// Acquire the turn slot for a user.
    ///
    /// Returns `ChatError::Busy` immediately if a turn is already in flight.
    /// On success, spawns a watchdog that force-releases the slot (and
    /// cancels the turn's token) if the guard is still the occupant when the
    /// hard timeout fires, so one failed client can never permanently wedge
    /// a conversation.
    pub fn begin_turn(&self, user_id: Uuid) -> Result<TurnGuard, ChatError> {
        let turn_id = Uuid::now_v7();
        let token = CancellationToken::new();

        match self.active.entry(user_id) {
            Entry::Occupied(_) => return Err(ChatError::Busy),
            Entry::Vacant(slot) => {
                slot.insert(ActiveTurn {
                    turn_id,
                    token: token.clone(),
                });
            }
        }

        self.spawn_watchdog(user_id, turn_id);

        Ok(TurnGuard {
            user_id,
            turn_id,
            token,
            active: Arc::clone(&self.active),
            released: false,
        })
    }

    /// Whether a turn is currently in flight for the user.
    pub fn is_busy(&self, user_id: &Uuid) -> bool {
        self.active.contains_key(user_id)
    }

    fn spawn_watchdog(&self, user_id: Uuid, turn_id: Uuid) {
        let active = Arc::clone(&self.active);
        let timeout = self.hard_timeout;
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let evicted = active.remove_if(&user_id, |_, turn| turn.turn_id == turn_id);
            if let Some((_, turn)) = evicted {
                warn!(%user_id, %turn_id, "turn exceeded hard timeout, force-releasing");
                turn.token.cancel();
            }
        });
    }
}

/// RAII handle for an acquired turn slot.
///
/// Released on every exit path: explicitly via [`release`](Self::release),
/// or on drop (success, upstream failure, cancellation, client disconnect).
/// Release is generation-checked, so a guard that was already force-released
/// by the watchdog cannot evict a newer turn.
pub struct TurnGuard {
    user_id: Uuid,
    turn_id: Uuid,
    token: CancellationToken,
    active: Arc<DashMap<Uuid, ActiveTurn>>,
    released: bool,
}

impl TurnGuard {
    /// Cancellation token for this turn. Fires when the watchdog
    /// force-releases the slot; pipelines select on it next to the
    /// upstream fragment stream.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// The user whose slot this guard holds.
    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    /// Release the slot now.
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.active
            .remove_if(&self.user_id, |_, turn| turn.turn_id == self.turn_id);
    }
}

impl Drop for TurnGuard {
    fn drop(&mut self) {
        self.release_inner();
    }
}
