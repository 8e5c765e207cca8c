//! Sync phase state machine for docsync.
//!
//! This module tracks how far the initial synchronization with the server
//! has progressed. Like the rest of this crate it performs no I/O: it takes
//! events and produces a new phase plus a list of actions for the caller.
//!
//! The phase never resets. A reconnect keeps whatever phase was reached, so
//! the initial-sync milestone is reported exactly once per session.

/// How far the initial synchronization has progressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncPhase {
    /// Holding a freshly initialized empty document; never connected.
    #[default]
    Uninitialized,
    /// Connected and receiving the server's change backlog.
    Syncing,
    /// The server reported that its backlog has been fully delivered.
    Synced,
}

impl SyncPhase {
    /// Create a new phase machine in the Uninitialized state.
    pub fn new() -> Self {
        Self::Uninitialized
    }

    /// Process an event and return the new phase plus actions to execute.
    pub fn on_event(self, event: PhaseEvent) -> (Self, Vec<Action>) {
        match (self, event) {
            (Self::Uninitialized, PhaseEvent::ConnectionOpened) => (Self::Syncing, vec![]),

            (Self::Uninitialized | Self::Syncing, PhaseEvent::BacklogComplete) => {
                (Self::Synced, vec![Action::NotifyInitialSync])
            }

            // Reconnects, repeated milestones and losses leave the phase alone
            (phase, _) => (phase, vec![]),
        }
    }

    /// Check if the initial backlog has been delivered.
    pub fn is_synced(&self) -> bool {
        matches!(self, Self::Synced)
    }
}

/// Events that drive the phase machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseEvent {
    /// The transport (re)opened a connection.
    ConnectionOpened,
    /// A `ChangeBacklogComplete` frame arrived.
    BacklogComplete,
    /// The transport lost its connection.
    ConnectionLost,
}

/// Actions to be executed by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Fire the one-shot "initial sync complete" notification.
    NotifyInitialSync,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_uninitialized() {
        assert_eq!(SyncPhase::new(), SyncPhase::Uninitialized);
        assert_eq!(SyncPhase::default(), SyncPhase::Uninitialized);
    }

    #[test]
    fn connection_opened_starts_syncing() {
        let (phase, actions) = SyncPhase::Uninitialized.on_event(PhaseEvent::ConnectionOpened);
        assert_eq!(phase, SyncPhase::Syncing);
        assert!(actions.is_empty());
    }

    #[test]
    fn backlog_complete_notifies_and_syncs() {
        let (phase, actions) = SyncPhase::Syncing.on_event(PhaseEvent::BacklogComplete);
        assert_eq!(phase, SyncPhase::Synced);
        assert_eq!(actions, vec![Action::NotifyInitialSync]);
    }

    #[test]
    fn backlog_complete_before_open_still_notifies() {
        let (phase, actions) = SyncPhase::Uninitialized.on_event(PhaseEvent::BacklogComplete);
        assert_eq!(phase, SyncPhase::Synced);
        assert_eq!(actions, vec![Action::NotifyInitialSync]);
    }

    #[test]
    fn second_backlog_complete_is_silent() {
        let (phase, _) = SyncPhase::Syncing.on_event(PhaseEvent::BacklogComplete);
        let (phase, actions) = phase.on_event(PhaseEvent::BacklogComplete);
        assert_eq!(phase, SyncPhase::Synced);
        assert!(actions.is_empty());
    }

    #[test]
    fn reconnect_does_not_reset_phase() {
        let phase = SyncPhase::Synced;
        let (phase, _) = phase.on_event(PhaseEvent::ConnectionLost);
        let (phase, actions) = phase.on_event(PhaseEvent::ConnectionOpened);
        assert_eq!(phase, SyncPhase::Synced);
        assert!(actions.is_empty());

        let (phase, _) = SyncPhase::Syncing.on_event(PhaseEvent::ConnectionLost);
        assert_eq!(phase, SyncPhase::Syncing);
    }

    #[test]
    fn milestone_fires_once_across_reconnects() {
        let events = [
            PhaseEvent::ConnectionOpened,
            PhaseEvent::BacklogComplete,
            PhaseEvent::ConnectionLost,
            PhaseEvent::ConnectionOpened,
            PhaseEvent::BacklogComplete,
        ];

        let mut phase = SyncPhase::new();
        let mut notifications = 0;
        for event in events {
            let (next, actions) = phase.on_event(event);
            notifications += actions
                .iter()
                .filter(|a| matches!(a, Action::NotifyInitialSync))
                .count();
            phase = next;
        }
        assert_eq!(notifications, 1);
        assert!(phase.is_synced());
    }
}
