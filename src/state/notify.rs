use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use crate::{
    services::challenge_tracker::ChallengeCounts,
    state::session::{GamePhase, Player, Session, SessionStatus, TeamScores},
};

/// Notification published to the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A snapshot that differs structurally from the previous one was stored.
    SessionChanged(Arc<Session>),
    /// A player appeared in the roster.
    PlayerJoined(Player),
    /// A player disappeared from the roster.
    PlayerLeft {
        /// Identifier of the departed player.
        player_id: String,
    },
    /// The session status moved forward.
    StatusChanged(SessionStatus),
    /// The gameplay phase changed.
    PhaseChanged(GamePhase),
    /// Team scores changed, optimistically or through reconciliation.
    ScoresChanged(TeamScores),
    /// Challenge aggregation changed.
    ChallengesUpdated(ChallengeCounts),
}

/// Broadcast hub fanning session events out to any number of subscribers.
///
/// Late subscribers do not see past events. Closing the hub ends every subscription.
pub struct EventHub {
    sender: Mutex<Option<broadcast::Sender<SessionEvent>>>,
}

impl EventHub {
    /// Construct a new hub backed by a Tokio broadcast channel with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity.max(1));
        Self {
            sender: Mutex::new(Some(sender)),
        }
    }

    /// Register a new subscriber that will receive subsequent events.
    ///
    /// After [`close`](Self::close) the returned receiver is already closed.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        let guard = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.as_ref() {
            Some(sender) => sender.subscribe(),
            None => broadcast::channel(1).1,
        }
    }

    /// Same as [`subscribe`](Self::subscribe), as a `Stream`.
    pub fn stream(&self) -> BroadcastStream<SessionEvent> {
        BroadcastStream::new(self.subscribe())
    }

    /// Send an event to all current subscribers, ignoring delivery errors.
    pub fn broadcast(&self, event: SessionEvent) {
        let guard = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(sender) = guard.as_ref() {
            let _ = sender.send(event);
        }
    }

    /// Drop the sender so every subscriber observes the end of the stream.
    pub fn close(&self) {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    /// Whether [`close`](Self::close) was called.
    pub fn is_closed(&self) -> bool {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::broadcast::error::{RecvError, TryRecvError};

    use super::*;

    #[tokio::test]
    async fn every_subscriber_receives_events_without_replay() {
        let hub = EventHub::new(8);
        hub.broadcast(SessionEvent::StatusChanged(SessionStatus::Lobby));

        let mut first = hub.subscribe();
        let mut second = hub.subscribe();
        hub.broadcast(SessionEvent::StatusChanged(SessionStatus::Challenge));

        for rx in [&mut first, &mut second] {
            assert_eq!(
                rx.recv().await.unwrap(),
                SessionEvent::StatusChanged(SessionStatus::Challenge)
            );
            assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
        }
    }

    #[tokio::test]
    async fn close_ends_existing_and_future_subscriptions() {
        let hub = EventHub::new(8);
        let mut existing = hub.subscribe();
        hub.close();

        assert!(hub.is_closed());
        assert_eq!(existing.recv().await, Err(RecvError::Closed));
        assert_eq!(hub.subscribe().recv().await, Err(RecvError::Closed));
    }
}
