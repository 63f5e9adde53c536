//! Instance lifecycle state machine.
//!
//! ```text
//! Created --open--> Opened --close--> Closed --open--> Opened
//!    |                 |                 |
//!    +----destroy------+--(rejected)     +--destroy--> Destroyed
//! ```
//!
//! A failed open leaves the instance `Closed`. Closing is idempotent.

use playdeck_runtime::{RuntimeError, RuntimeResult};
use serde::Serialize;
use std::fmt;

/// State of a playback instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Created,
    Opened,
    Closed,
    Destroyed,
}

/// Entry points that move or depend on the lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Open,
    Read,
    Seek,
    SettingsChanged,
    Close,
    Destroy,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Open => "open",
            Operation::Read => "read",
            Operation::Seek => "seek",
            Operation::SettingsChanged => "apply settings",
            Operation::Close => "close",
            Operation::Destroy => "destroy",
        }
    }
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Created => "created",
            LifecycleState::Opened => "opened",
            LifecycleState::Closed => "closed",
            LifecycleState::Destroyed => "destroyed",
        }
    }

    /// State after `op`, or an error if `op` is not allowed now.
    ///
    /// Reads, seeks and settings changes require an open resource and leave
    /// the state unchanged.
    pub fn transition(self, op: Operation) -> RuntimeResult<LifecycleState> {
        use LifecycleState::*;

        let next = match (self, op) {
            (Created | Closed, Operation::Open) => Some(Opened),
            (Opened, Operation::Read | Operation::Seek | Operation::SettingsChanged) => {
                Some(Opened)
            }
            (Created | Opened | Closed, Operation::Close) => Some(Closed),
            (Created | Closed, Operation::Destroy) => Some(Destroyed),
            _ => None,
        };

        next.ok_or(RuntimeError::InvalidTransition {
            operation: op.as_str(),
            state: self.as_str(),
        })
    }

    /// Check if `op` is allowed without changing state.
    pub fn allows(self, op: Operation) -> bool {
        self.transition(op).is_ok()
    }

    pub fn is_open(self) -> bool {
        self == LifecycleState::Opened
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use LifecycleState::*;

    #[test]
    fn test_open_close_reopen() {
        let state = Created.transition(Operation::Open).unwrap();
        assert_eq!(state, Opened);
        assert!(state.allows(Operation::Read));

        let state = state.transition(Operation::Close).unwrap();
        assert_eq!(state, Closed);
        assert!(!state.allows(Operation::Read));

        assert_eq!(state.transition(Operation::Open).unwrap(), Opened);
    }

    #[test]
    fn test_open_twice_rejected() {
        assert!(matches!(
            Opened.transition(Operation::Open),
            Err(RuntimeError::InvalidTransition {
                operation: "open",
                state: "opened"
            })
        ));
    }

    #[test]
    fn test_close_is_idempotent() {
        assert_eq!(Closed.transition(Operation::Close).unwrap(), Closed);
        assert_eq!(Created.transition(Operation::Close).unwrap(), Closed);
        assert!(Destroyed.transition(Operation::Close).is_err());
    }

    #[test]
    fn test_destroy_requires_closed() {
        assert!(Opened.transition(Operation::Destroy).is_err());
        assert_eq!(Created.transition(Operation::Destroy).unwrap(), Destroyed);
        assert_eq!(Closed.transition(Operation::Destroy).unwrap(), Destroyed);
        assert!(Destroyed.transition(Operation::Destroy).is_err());
    }

    #[test]
    fn test_destroyed_is_terminal() {
        for op in [
            Operation::Open,
            Operation::Read,
            Operation::Seek,
            Operation::SettingsChanged,
        ] {
            assert!(!Destroyed.allows(op));
        }
    }
}
