//! Client-side session state and the channel it is published through
//!
//! The server is authoritative for everything here: the client never moves
//! snakes or spawns food, it only stores the latest snapshot. Writes go
//! through [`StateSink`] (owned by the dispatch handlers) and readers hold a
//! `watch::Receiver`, so the view always sees the most recent complete update.

use shared::{Arena, Player, Point, RegisterPayload, TurnPayload};
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    /// Arena size; `None` until the server has registered us
    pub arena: Option<Arena>,
    /// Identity the server assigned to this connection
    pub local_id: Option<String>,
    pub players: Vec<Player>,
    pub food: Vec<Point>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a registration. A new registration means a new connection,
    /// so the identity is replaced even when the server omits it.
    pub fn apply_register(&mut self, register: &RegisterPayload) {
        self.arena = Some(register.arena());
        self.local_id = register.uuid.clone();
    }

    /// Replaces roster and food wholesale with the broadcast contents.
    pub fn apply_turn(&mut self, turn: &TurnPayload) {
        self.players = turn.players.clone();
        self.food = turn.food.clone();
    }

    pub fn is_registered(&self) -> bool {
        self.arena.is_some()
    }

    pub fn local_player(&self) -> Option<&Player> {
        let local_id = self.local_id.as_deref()?;
        self.players.iter().find(|player| player.id == local_id)
    }
}

/// Write side of the session state channel.
#[derive(Debug, Clone)]
pub struct StateSink {
    tx: Arc<watch::Sender<SessionState>>,
}

impl StateSink {
    pub fn new() -> (Self, watch::Receiver<SessionState>) {
        let (tx, rx) = watch::channel(SessionState::new());
        (Self { tx: Arc::new(tx) }, rx)
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.tx.subscribe()
    }

    /// Applies `f` as one update; receivers never observe a partial write.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut SessionState),
    {
        self.tx.send_modify(f);
    }

    pub fn snapshot(&self) -> SessionState {
        self.tx.borrow().clone()
    }
}

/// The snapshot being displayed, plus the one before it so that a snapshot
/// which fails to materialize can be backed out.
#[derive(Debug, Default)]
pub struct SnapshotHistory {
    current: SessionState,
    previous: Option<SessionState>,
}

impl SnapshotHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> &SessionState {
        &self.current
    }

    pub fn advance(&mut self, snapshot: SessionState) {
        self.previous = Some(std::mem::replace(&mut self.current, snapshot));
    }

    /// Restores the previous snapshot. With nothing to restore the view
    /// falls back to an empty session.
    pub fn rollback(&mut self) {
        self.current = self.previous.take().unwrap_or_default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{Colour, Snake};

    fn player(id: &str, x: i64) -> Player {
        Player::new(
            id,
            format!("name-{}", id),
            Snake::new(vec![Point::new(x, 0)], Colour::new(1, 2, 3)),
            0,
        )
    }

    #[test]
    fn test_register_sets_arena_and_identity() {
        let mut state = SessionState::new();
        assert!(!state.is_registered());

        state.apply_register(&RegisterPayload {
            field_width: 15,
            field_height: 10,
            uuid: Some("me".to_string()),
        });

        assert!(state.is_registered());
        assert_eq!(state.arena, Some(Arena::new(15, 10)));
        assert_eq!(state.local_id.as_deref(), Some("me"));
    }

    #[test]
    fn test_reregister_without_uuid_clears_identity() {
        let mut state = SessionState::new();
        state.apply_register(&RegisterPayload {
            field_width: 5,
            field_height: 5,
            uuid: Some("old".to_string()),
        });
        state.apply_register(&RegisterPayload {
            field_width: 5,
            field_height: 5,
            uuid: None,
        });
        assert_eq!(state.local_id, None);
    }

    #[test]
    fn test_turn_replaces_roster_wholesale() {
        let mut state = SessionState::new();
        state.apply_turn(&TurnPayload {
            players: vec![player("a", 0), player("b", 1)],
            food: vec![Point::new(3, 3)],
        });
        state.apply_turn(&TurnPayload {
            players: vec![player("b", 2)],
            food: Vec::new(),
        });

        assert_eq!(state.players.len(), 1);
        assert_eq!(state.players[0].id, "b");
        assert!(state.food.is_empty());
    }

    #[test]
    fn test_local_player_lookup() {
        let mut state = SessionState::new();
        state.apply_turn(&TurnPayload {
            players: vec![player("a", 0), player("b", 1)],
            food: Vec::new(),
        });
        assert!(state.local_player().is_none());

        state.local_id = Some("b".to_string());
        assert_eq!(state.local_player().map(|p| p.name.as_str()), Some("name-b"));
    }

    #[test]
    fn test_sink_publishes_to_receivers() {
        let (sink, mut rx) = StateSink::new();
        let mut late = sink.subscribe();
        assert!(!rx.has_changed().unwrap());

        sink.update(|state| state.food.push(Point::new(1, 1)));

        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().food, vec![Point::new(1, 1)]);
        assert_eq!(late.borrow_and_update().food.len(), 1);
        assert_eq!(sink.snapshot().food.len(), 1);
    }

    #[test]
    fn test_history_rollback_restores_previous() {
        let mut history = SnapshotHistory::new();
        let good = SessionState {
            arena: Some(Arena::new(3, 3)),
            ..SessionState::new()
        };
        let bad = SessionState {
            arena: Some(Arena::new(3, 3)),
            food: vec![Point::new(9, 9)],
            ..SessionState::new()
        };

        history.advance(good.clone());
        history.advance(bad);
        assert_eq!(history.current().food.len(), 1);

        history.rollback();
        assert_eq!(history.current(), &good);

        // Only one step is kept
        history.rollback();
        assert_eq!(history.current(), &SessionState::new());
    }

    #[test]
    fn test_receiver_wakes_on_update() {
        let (sink, mut rx) = StateSink::new();
        let mut changed = tokio_test::task::spawn(rx.changed());
        tokio_test::assert_pending!(changed.poll());

        sink.update(|state| state.local_id = Some("me".to_string()));

        assert!(changed.is_woken());
        tokio_test::assert_ready_ok!(changed.poll());
        drop(changed);
        assert_eq!(rx.borrow().local_id.as_deref(), Some("me"));
    }
}
