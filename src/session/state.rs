//! Session state machine.

use serde::Serialize;

/// Lifecycle state of the WhatsApp session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No driver is running.
    #[default]
    Uninitialized,
    /// A driver is being constructed or is starting up.
    Initializing,
    /// A pairing code is available and waiting to be scanned.
    AwaitingScan,
    /// Authenticated; messages can be sent.
    Ready,
    /// The phone rejected the stored credentials.
    AuthFailed,
    /// The connection dropped.
    Disconnected,
}

impl SessionState {
    /// Check if transition to target state is valid.
    ///
    /// Valid transitions:
    /// - any -> Initializing, Uninitialized, AuthFailed
    /// - Initializing/AwaitingScan -> AwaitingScan, Ready, Disconnected
    /// - Ready -> Disconnected
    pub fn can_transition_to(&self, target: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (*self, target),
            (_, Initializing)
                | (_, Uninitialized)
                | (_, AuthFailed)
                | (Initializing | AwaitingScan, AwaitingScan | Ready | Disconnected)
                | (Ready, Disconnected)
        )
    }

    /// Attempt to transition to a new state.
    ///
    /// Returns `Ok(())` if the transition is valid, or an error otherwise.
    pub fn transition_to(&mut self, target: SessionState) -> crate::Result<()> {
        if self.can_transition_to(target) {
            *self = target;
            Ok(())
        } else {
            Err(crate::error::WaSenderError::InvalidStateTransition {
                from: *self,
                to: target,
            })
        }
    }

    /// A driver is starting or waiting for its code to be scanned.
    pub fn is_pairing(&self) -> bool {
        matches!(self, SessionState::Initializing | SessionState::AwaitingScan)
    }

    /// Check if the session can send messages.
    pub fn is_ready(&self) -> bool {
        matches!(self, SessionState::Ready)
    }
}
