use crate::{
    ds::Grid,
    env::{Outcome, Pos, StochasticDynamics},
    error::{Error, Result},
    util::check_interval,
};

use super::{
    active_states, check_distribution, extract_policy, iterate, policy_entry, snapshot_actions,
    successor_is_valid, Budget, Objective, Sweeps,
};

/// Reward for a transition that lands on the goal
const GOAL_REWARD: f32 = 1.0;

/// Configuration for the [`DiscountedValueIteration`] solver
#[derive(Debug, Clone)]
pub struct DiscountedConfig {
    /// Discount factor, must be in `[0, 1]`
    ///
    /// **Default**: `0.99`
    pub gamma: f32,
    /// Number of full-grid sweeps to run
    ///
    /// **Default**: `100`
    pub max_sweeps: usize,
    /// Stop early once no value changes by more than this amount in a sweep
    ///
    /// **Default**: `None` (always run `max_sweeps` sweeps)
    pub tolerance: Option<f32>,
    /// Reward for probability mass that lands on an invalid state
    ///
    /// With `None` such outcomes are dropped and contribute nothing.
    ///
    /// **Default**: `None`
    pub collision_reward: Option<f32>,
}

impl Default for DiscountedConfig {
    fn default() -> Self {
        Self {
            gamma: 0.99,
            max_sweeps: 100,
            tolerance: None,
            collision_reward: None,
        }
    }
}

/// Value iteration for a discounted, infinite-horizon reward over stochastic dynamics
///
/// Reaching the goal earns a reward of `1`; every other transition earns `0`.
/// The goal's own value is fixed at `0`, so the value of a state reflects how
/// likely and how soon the goal is reached from it.
///
/// ### Generics
/// - `E` - The [`StochasticDynamics`] environment being planned over. Pass a
///   reference to keep ownership of the environment.
pub struct DiscountedValueIteration<E: StochasticDynamics> {
    env: E,
    goal: Pos,
    actions: Vec<E::Action>,
    config: DiscountedConfig,
    values: Grid<f32>,
    policy: Grid<Option<usize>>,
    values_computed: bool,
    policy_computed: bool,
}

impl<E: StochasticDynamics> DiscountedValueIteration<E> {
    /// Initialize a new solver for `env` with default configuration
    pub fn new(env: E, goal: Pos) -> Result<Self> {
        Self::with_config(env, goal, DiscountedConfig::default())
    }

    /// Initialize a new solver for `env`
    ///
    /// **Errors** if `gamma` is not in `[0, 1]`, the budget is empty, or `goal` is not a valid state
    pub fn with_config(env: E, goal: Pos, config: DiscountedConfig) -> Result<Self> {
        check_interval!(config.gamma, 0.0, 1.0);
        Budget::from(&config).validate()?;
        if let Some(r) = config.collision_reward {
            if !r.is_finite() {
                return Err(Error::Config(format!("`collision_reward` must be finite, got {r}")));
            }
        }
        let actions = snapshot_actions(&env, goal)?;

        let (rows, cols) = env.shape();
        Ok(Self {
            env,
            goal,
            actions,
            config,
            values: Grid::new(rows, cols, 0.0),
            policy: Grid::new(rows, cols, None),
            values_computed: false,
            policy_computed: false,
        })
    }

    /// Run value iteration, overwriting the value table in place
    ///
    /// Sweeps continue from the current table, so a second call starts from the
    /// previous result.
    pub fn compute_value_function(&mut self) -> Result<Sweeps> {
        let Self {
            env,
            goal,
            actions,
            config,
            values,
            policy,
            policy_computed,
            ..
        } = self;

        // A policy from an older table no longer matches the values
        policy.fill(None);
        *policy_computed = false;

        let states = active_states(&*env, &*values, *goal);
        let report = iterate(
            values,
            &states,
            actions.len(),
            Objective::Maximize,
            Budget::from(&*config),
            |values, state, a| {
                expected_value(&*env, *goal, &*config, values, state, actions[a]).map(Some)
            },
        )?;

        self.values_computed = true;
        Ok(report)
    }

    /// Extract the greedy policy from the computed value table
    ///
    /// **Errors** with [`Error::NotComputed`] if the value function has not been computed
    pub fn compute_policy(&mut self) -> Result<&Grid<Option<usize>>> {
        if !self.values_computed {
            return Err(Error::NotComputed);
        }

        let Self {
            env,
            goal,
            actions,
            config,
            values,
            policy,
            ..
        } = self;

        let states = active_states(&*env, &*values, *goal);
        extract_policy(policy, &states, actions.len(), Objective::Maximize, |state, a| {
            expected_value(&*env, *goal, &*config, &*values, state, actions[a]).map(Some)
        })?;

        self.policy_computed = true;
        Ok(&self.policy)
    }

    /// The index of the greedy action for `state`, into [`Self::actions`]
    pub fn policy(&self, state: Pos) -> Result<usize> {
        if !self.policy_computed {
            return Err(Error::NotComputed);
        }
        policy_entry(&self.policy, state)
    }

    /// The greedy action for `state`
    pub fn action(&self, state: Pos) -> Result<E::Action> {
        self.policy(state).map(|a| self.actions[a])
    }

    /// The action list policy indices refer to
    pub fn actions(&self) -> &[E::Action] {
        &self.actions
    }

    pub fn value(&self, state: Pos) -> Result<f32> {
        self.values.get(state).copied().ok_or(Error::OutOfBounds(state))
    }

    pub fn values(&self) -> &Grid<f32> {
        &self.values
    }

    pub fn policy_table(&self) -> &Grid<Option<usize>> {
        &self.policy
    }

    pub fn goal(&self) -> Pos {
        self.goal
    }

    pub fn env(&self) -> &E {
        &self.env
    }
}

impl From<&DiscountedConfig> for Budget {
    fn from(config: &DiscountedConfig) -> Self {
        Budget {
            max_sweeps: config.max_sweeps,
            tolerance: config.tolerance,
        }
    }
}

/// Expected one-step return of taking `action` in `state`
fn expected_value<E: StochasticDynamics>(
    env: &E,
    goal: Pos,
    config: &DiscountedConfig,
    values: &Grid<f32>,
    state: Pos,
    action: E::Action,
) -> Result<f32> {
    let outcomes = env.transition_distribution(state, action);
    check_distribution(state, outcomes.iter().map(|o| o.prob))?;

    let mut value = 0.0;
    for Outcome { next_state, prob } in outcomes {
        if !successor_is_valid(env, values, state, next_state)? {
            if let Some(r) = config.collision_reward {
                value += prob * r;
            }
            continue;
        }

        let reward = if next_state == goal { GOAL_REWARD } else { 0.0 };
        value += prob * (reward + config.gamma * values[next_state]);
    }

    Ok(value)
}
