//! Store session state machine.

use serde::Serialize;

/// Lifecycle state of a store session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum SessionState {
    /// No store handle is held yet.
    #[default]
    Uninitialized,
    /// A create or open call is in progress.
    Opening,
    /// A store handle is held and can be loaded and queried.
    Ready,
    /// The store has been released; the session cannot be reused.
    Closed,
}

impl SessionState {
    /// Check if transition to target state is valid.
    ///
    /// Valid transitions:
    /// - Uninitialized -> Opening
    /// - Opening -> Ready
    /// - Opening -> Uninitialized (open failed)
    /// - Ready -> Closed
    pub fn can_transition_to(&self, target: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (*self, target),
            (Uninitialized, Opening) | (Opening, Ready) | (Opening, Uninitialized) | (Ready, Closed)
        )
    }

    /// Attempt to transition to a new state.
    ///
    /// Returns `Ok(())` if the transition is valid, or an error otherwise.
    /// Any transition out of `Closed` reports [`SessionClosed`](crate::StoreSessionError::SessionClosed).
    pub fn transition_to(&mut self, target: SessionState) -> crate::Result<()> {
        if self.can_transition_to(target) {
            *self = target;
            Ok(())
        } else if self.is_terminal() {
            Err(crate::error::StoreSessionError::SessionClosed)
        } else {
            Err(crate::error::StoreSessionError::InvalidStateTransition {
                from: *self,
                to: target,
            })
        }
    }

    /// Check if this is a terminal state (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Closed)
    }

    /// Fail with the error matching this state unless a store is held.
    pub fn require_store(&self) -> crate::Result<()> {
        match self {
            SessionState::Ready => Ok(()),
            SessionState::Closed => Err(crate::error::StoreSessionError::SessionClosed),
            SessionState::Uninitialized | SessionState::Opening => {
                Err(crate::error::StoreSessionError::NoStore)
            }
        }
    }
}
