//! Link state machine for reconnecting transports.
//!
//! A pure, side-effect-free state machine for the lifecycle of one
//! auto-reconnecting connection. It takes events and produces a new state
//! plus the actions the transport should perform. The transport owns the
//! socket and the timers; this module only decides.

use std::time::Duration;

/// Link state - NO I/O, just state transitions.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LinkState {
    /// Not connected and not trying to.
    #[default]
    Disconnected,
    /// Connection attempt in progress.
    Connecting {
        /// Attempts made since the link was last up (0 for the first).
        attempt: u32,
    },
    /// Socket is open.
    Connected,
    /// Waiting for the reconnect timer.
    Reconnecting {
        /// Number of the next reconnection attempt.
        attempt: u32,
    },
}

impl LinkState {
    /// Create a new link in the Disconnected state.
    pub fn new() -> Self {
        Self::Disconnected
    }

    /// Process an event and return the new state plus actions to execute.
    pub fn on_event(self, event: LinkEvent) -> (Self, Vec<LinkAction>) {
        match (self, event) {
            (Self::Disconnected, LinkEvent::ConnectRequested) => {
                (Self::Connecting { attempt: 0 }, vec![LinkAction::Connect])
            }

            (Self::Connecting { .. }, LinkEvent::ConnectSucceeded) => {
                (Self::Connected, vec![LinkAction::EmitOpened])
            }
            (Self::Connecting { attempt }, LinkEvent::ConnectFailed) => {
                let next = attempt.saturating_add(1);
                (
                    Self::Reconnecting { attempt: next },
                    vec![LinkAction::StartReconnectTimer { attempt: next }],
                )
            }

            (Self::Connected, LinkEvent::Dropped) => (
                Self::Reconnecting { attempt: 1 },
                vec![
                    LinkAction::EmitClosed,
                    LinkAction::StartReconnectTimer { attempt: 1 },
                ],
            ),

            (Self::Reconnecting { attempt }, LinkEvent::ReconnectTimer) => {
                (Self::Connecting { attempt }, vec![LinkAction::Connect])
            }

            (Self::Connected, LinkEvent::CloseRequested) => (
                Self::Disconnected,
                vec![LinkAction::Disconnect, LinkAction::EmitClosed],
            ),
            (Self::Connecting { .. }, LinkEvent::CloseRequested) => {
                (Self::Disconnected, vec![LinkAction::Disconnect])
            }
            (Self::Reconnecting { .. }, LinkEvent::CloseRequested) => {
                (Self::Disconnected, vec![LinkAction::CancelReconnect])
            }

            // Invalid transitions - stay in current state
            (state, _) => (state, vec![]),
        }
    }

    /// Check if the socket is open.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Check if currently trying to (re)connect.
    pub fn is_connecting(&self) -> bool {
        matches!(self, Self::Connecting { .. } | Self::Reconnecting { .. })
    }
}

/// Events in the link lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    /// Owner asked to connect.
    ConnectRequested,
    /// Socket opened.
    ConnectSucceeded,
    /// Socket could not be opened.
    ConnectFailed,
    /// An open socket was lost.
    Dropped,
    /// Owner asked to close for good.
    CloseRequested,
    /// Reconnect timer fired.
    ReconnectTimer,
}

/// Actions for the transport to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkAction {
    /// Open a socket.
    Connect,
    /// Close the socket.
    Disconnect,
    /// Report that the link is open.
    EmitOpened,
    /// Report that the link went down.
    EmitClosed,
    /// Wait before the given reconnection attempt.
    StartReconnectTimer {
        /// Attempt number, starting at 1.
        attempt: u32,
    },
    /// Cancel any pending reconnect timer.
    CancelReconnect,
}

/// Reconnection backoff policy.
///
/// Exponential backoff with random jitter so that many clients do not
/// reconnect in lockstep after a server restart:
/// `min(max, initial * 2^(attempt-1)) + random(0..=jitter)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    /// Delay before the first reconnection attempt.
    pub initial: Duration,
    /// Cap on the exponential part.
    pub max: Duration,
    /// Upper bound of the random jitter added on top.
    pub jitter: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(30),
            jitter: Duration::from_secs(1),
        }
    }
}

impl Backoff {
    /// Delay before reconnection attempt `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let base = self.initial.saturating_mul(1u32 << exponent).min(self.max);
        base.saturating_add(self.random_jitter())
    }

    fn random_jitter(&self) -> Duration {
        let bound = u64::try_from(self.jitter.as_millis()).unwrap_or(u64::MAX);
        if bound == 0 {
            return Duration::ZERO;
        }
        let mut bytes = [0u8; 8];
        getrandom::getrandom(&mut bytes).expect("getrandom failed");
        let random = u64::from_le_bytes(bytes);
        // A bound of u64::MAX covers every value
        let millis = match bound.checked_add(1) {
            Some(modulus) => random % modulus,
            None => random,
        };
        Duration::from_millis(millis)
    }
}
