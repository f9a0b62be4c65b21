use crate::env::Pos;

/// Errors produced while building or querying a solver
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// A solver parameter is outside its allowed range
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The environment broke its contract (bad distribution, out-of-bounds successor, ...)
    #[error("environment contract violated at {state:?}: {reason}")]
    Environment { state: Pos, reason: String },

    /// The goal is out of bounds or not a valid state
    #[error("goal {0:?} is not a valid state of the grid")]
    InvalidGoal(Pos),

    /// The queried state lies outside the grid
    #[error("state {0:?} is outside the grid")]
    OutOfBounds(Pos),

    /// No policy entry exists for the state (invalid state, goal, or goal unreachable)
    #[error("no action is defined for state {0:?}")]
    NoAction(Pos),

    /// Policy extraction was requested before the value function was computed
    #[error("value function has not been computed yet")]
    NotComputed,

    /// Following the policy revisited a state without reaching the goal
    #[error("policy loops at state {0:?}")]
    PolicyLoop(Pos),
}

pub type Result<T> = std::result::Result<T, Error>;
