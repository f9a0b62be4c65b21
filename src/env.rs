/// Grid coordinates `(row, col)`
///
/// Signed so that transitions can name successors that fall off the grid;
/// such states are never valid.
pub type Pos = (i32, i32);

/// A discrete 2-D grid world that a planner can sweep over.
///
/// This trait only describes the state space and the action set. The dynamics
/// are provided separately through [`DeterministicDynamics`] and/or
/// [`StochasticDynamics`], so a world can support either solver or both.
pub trait GridEnvironment {
    /// An action that moves the agent between grid cells
    type Action: Copy;

    /// Grid dimensions as `(rows, cols)`, fixed for the lifetime of the environment
    fn shape(&self) -> (usize, usize);

    /// The ordered action set
    ///
    /// The order must be stable: solvers snapshot this list once and store
    /// indices into it. The returned list should never be empty.
    fn actions(&self) -> Vec<Self::Action>;

    /// Whether the state is in bounds and collision free
    ///
    /// Must be a pure function of `state`.
    fn is_valid(&self, state: Pos) -> bool;

    /// Whether the state lies within the grid shape, regardless of obstacles
    fn in_bounds(&self, state: Pos) -> bool {
        let (rows, cols) = self.shape();
        state.0 >= 0 && state.1 >= 0 && (state.0 as usize) < rows && (state.1 as usize) < cols
    }
}

/// Deterministic transition model
pub trait DeterministicDynamics: GridEnvironment {
    /// The successor of `state` under `action`, or `None` if the action is infeasible there
    fn transition(&self, state: Pos, action: Self::Action) -> Option<Pos>;
}

/// A single possible result of taking an action
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Outcome {
    pub next_state: Pos,
    pub prob: f32,
}

/// Probabilistic transition model
pub trait StochasticDynamics: GridEnvironment {
    /// The distribution over successors of `state` under `action`
    ///
    /// Probabilities must sum to 1. Outcomes may name invalid states; the solver
    /// decides how those are treated.
    fn transition_distribution(&self, state: Pos, action: Self::Action) -> Vec<Outcome>;
}

impl<T: GridEnvironment + ?Sized> GridEnvironment for &T {
    type Action = T::Action;

    fn shape(&self) -> (usize, usize) {
        (**self).shape()
    }

    fn actions(&self) -> Vec<Self::Action> {
        (**self).actions()
    }

    fn is_valid(&self, state: Pos) -> bool {
        (**self).is_valid(state)
    }

    fn in_bounds(&self, state: Pos) -> bool {
        (**self).in_bounds(state)
    }
}

impl<T: DeterministicDynamics + ?Sized> DeterministicDynamics for &T {
    fn transition(&self, state: Pos, action: Self::Action) -> Option<Pos> {
        (**self).transition(state, action)
    }
}

impl<T: StochasticDynamics + ?Sized> StochasticDynamics for &T {
    fn transition_distribution(&self, state: Pos, action: Self::Action) -> Vec<Outcome> {
        (**self).transition_distribution(state, action)
    }
}
