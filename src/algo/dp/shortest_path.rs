use std::collections::HashSet;

use crate::{
    ds::Grid,
    env::{DeterministicDynamics, Pos},
    error::{Error, Result},
};

use super::{
    active_states, extract_policy, iterate, policy_entry, snapshot_actions, successor_is_valid,
    Budget, Objective, Sweeps,
};

/// Cost-to-go of a state from which the goal has not been reached
pub const UNREACHED: f32 = f32::MAX;

/// Cost of a single transition
const STEP_COST: f32 = 1.0;

/// Configuration for the [`ShortestPathValueIteration`] solver
#[derive(Debug, Clone)]
pub struct ShortestPathConfig {
    /// Number of full-grid sweeps to run
    ///
    /// Exact costs need at least as many sweeps as the longest shortest path.
    ///
    /// **Default**: `100`
    pub max_sweeps: usize,
    /// Stop early once no cost changes by more than this amount in a sweep
    ///
    /// **Default**: `None` (always run `max_sweeps` sweeps)
    pub tolerance: Option<f32>,
}

impl Default for ShortestPathConfig {
    fn default() -> Self {
        Self {
            max_sweeps: 100,
            tolerance: None,
        }
    }
}

impl From<&ShortestPathConfig> for Budget {
    fn from(config: &ShortestPathConfig) -> Self {
        Budget {
            max_sweeps: config.max_sweeps,
            tolerance: config.tolerance,
        }
    }
}

/// Value iteration for the minimal number of steps to the goal over deterministic dynamics
///
/// Every transition costs `1`. The cost-to-go of the goal is `0`; states that
/// cannot reach the goal keep [`UNREACHED`] and have no policy entry.
///
/// ### Generics
/// - `E` - The [`DeterministicDynamics`] environment being planned over
pub struct ShortestPathValueIteration<E: DeterministicDynamics> {
    env: E,
    goal: Pos,
    actions: Vec<E::Action>,
    config: ShortestPathConfig,
    costs: Grid<f32>,
    policy: Grid<Option<usize>>,
    costs_computed: bool,
    policy_computed: bool,
}

impl<E: DeterministicDynamics> ShortestPathValueIteration<E> {
    /// Initialize a new solver for `env` with default configuration
    pub fn new(env: E, goal: Pos) -> Result<Self> {
        Self::with_config(env, goal, ShortestPathConfig::default())
    }

    /// Initialize a new solver for `env`
    ///
    /// **Errors** if the budget is empty or `goal` is not a valid state
    pub fn with_config(env: E, goal: Pos, config: ShortestPathConfig) -> Result<Self> {
        Budget::from(&config).validate()?;
        let actions = snapshot_actions(&env, goal)?;

        let (rows, cols) = env.shape();
        let mut costs = Grid::new(rows, cols, UNREACHED);
        costs[goal] = 0.0;

        Ok(Self {
            env,
            goal,
            actions,
            config,
            costs,
            policy: Grid::new(rows, cols, None),
            costs_computed: false,
            policy_computed: false,
        })
    }

    /// Run value iteration, overwriting the cost table in place
    pub fn compute_value_function(&mut self) -> Result<Sweeps> {
        let Self {
            env,
            goal,
            actions,
            config,
            costs,
            policy,
            policy_computed,
            ..
        } = self;

        // A policy from an older table no longer matches the costs
        policy.fill(None);
        *policy_computed = false;

        costs[*goal] = 0.0;
        let states = active_states(&*env, &*costs, *goal);
        let report = iterate(
            costs,
            &states,
            actions.len(),
            Objective::Minimize,
            Budget::from(&*config),
            |costs, state, a| step_cost(&*env, costs, state, actions[a]),
        )?;

        self.costs_computed = true;
        Ok(report)
    }

    /// Extract the greedy policy from the computed cost table
    ///
    /// **Errors** with [`Error::NotComputed`] if the value function has not been computed
    pub fn compute_policy(&mut self) -> Result<&Grid<Option<usize>>> {
        if !self.costs_computed {
            return Err(Error::NotComputed);
        }

        let Self {
            env,
            goal,
            actions,
            costs,
            policy,
            ..
        } = self;

        let states = active_states(&*env, &*costs, *goal);
        extract_policy(policy, &states, actions.len(), Objective::Minimize, |state, a| {
            step_cost(&*env, &*costs, state, actions[a])
        })?;

        self.policy_computed = true;
        Ok(&self.policy)
    }

    /// The index of the greedy action for `state`, into [`Self::actions`]
    ///
    /// **Errors** with [`Error::NoAction`] for the goal, invalid states, and
    /// states that cannot reach the goal
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

    /// Follow the policy from `start` to the goal
    ///
    /// **Returns** every visited state, `start` and the goal included
    pub fn trace(&self, start: Pos) -> Result<Vec<Pos>> {
        let mut path = vec![start];
        let mut visited = HashSet::from([start]);
        let mut state = start;

        while state != self.goal {
            let action = self.action(state)?;
            let next = self.env.transition(state, action).ok_or_else(|| Error::Environment {
                state,
                reason: "policy action is infeasible".into(),
            })?;
            if !visited.insert(next) {
                return Err(Error::PolicyLoop(next));
            }
            path.push(next);
            state = next;
        }

        Ok(path)
    }

    pub fn actions(&self) -> &[E::Action] {
        &self.actions
    }

    /// The cost-to-go of `state`, [`UNREACHED`] if the goal was not reached from it
    pub fn cost(&self, state: Pos) -> Result<f32> {
        self.costs.get(state).copied().ok_or(Error::OutOfBounds(state))
    }

    pub fn costs(&self) -> &Grid<f32> {
        &self.costs
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

/// Cost of taking `action` in `state` and then following the cost table
///
/// `None` if the action is infeasible or leads to a state with no known path to the goal.
fn step_cost<E: DeterministicDynamics>(
    env: &E,
    costs: &Grid<f32>,
    state: Pos,
    action: E::Action,
) -> Result<Option<f32>> {
    let Some(next) = env.transition(state, action) else {
        return Ok(None);
    };
    if !successor_is_valid(env, costs, state, next)? {
        return Ok(None);
    }

    let cost = costs[next];
    Ok((cost < UNREACHED).then(|| STEP_COST + cost))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::tests::{MockGrid, UnboundedGrid, DELTAS};

    const GOAL: Pos = (4, 4);

    fn solve(env: &MockGrid, config: ShortestPathConfig) -> ShortestPathValueIteration<&MockGrid> {
        let mut solver = ShortestPathValueIteration::with_config(env, GOAL, config).unwrap();
        solver.compute_value_function().unwrap();
        solver.compute_policy().unwrap();
        solver
    }

    #[test]
    fn open_grid_manhattan_distance() {
        let env = MockGrid::open(5, 5);
        let solver = solve(&env, ShortestPathConfig::default());

        for (state, &cost) in solver.costs().iter() {
            let d = (state.0 - GOAL.0).abs() + (state.1 - GOAL.1).abs();
            assert_eq!(cost, d as f32, "{state:?} costs its Manhattan distance");
        }
        assert_eq!(solver.cost((0, 0)).unwrap(), 8.0);
    }

    #[test]
    fn greedy_path_reaches_goal() {
        let env = MockGrid::open(5, 5);
        let solver = solve(&env, ShortestPathConfig::default());

        let path = solver.trace((0, 0)).unwrap();
        assert_eq!(path.len(), 9, "8 steps");
        assert_eq!(path.first(), Some(&(0, 0)));
        assert_eq!(path.last(), Some(&GOAL));

        let unique = path.iter().collect::<HashSet<_>>();
        assert_eq!(unique.len(), path.len(), "no state is revisited");

        assert_eq!(solver.trace(GOAL).unwrap(), [GOAL], "goal is its own path");
    }

    #[test]
    fn wall_blocks_goal() {
        let wall = (0..5).map(|r| (r, 2));
        let env = MockGrid::open(5, 5).with_obstacles(wall);
        let solver = solve(&env, ShortestPathConfig::default());

        assert_eq!(solver.cost((0, 0)).unwrap(), UNREACHED, "start stays unreached");
        assert_eq!(solver.policy((0, 0)), Err(Error::NoAction((0, 0))));
        assert_eq!(solver.trace((0, 0)), Err(Error::NoAction((0, 0))));
        assert_eq!(solver.cost((0, 4)).unwrap(), 4.0, "goal side is solved");
    }

    #[test]
    fn detour_around_obstacles() {
        // Wall across row 2 with a single gap at column 0
        let wall = (1..5).map(|c| (2, c));
        let env = MockGrid::open(5, 5).with_obstacles(wall);
        let solver = solve(&env, ShortestPathConfig::default());

        assert_eq!(solver.cost((0, 4)).unwrap(), 12.0, "around through the gap");
        assert_eq!(solver.trace((0, 4)).unwrap().len(), 13);
    }

    #[test]
    fn costs_never_increase() {
        let env = MockGrid::open(5, 5).with_obstacles([(1, 1), (3, 2)]);
        let mut previous = Grid::new(5, 5, UNREACHED);

        for max_sweeps in 1..=10 {
            let mut solver = ShortestPathValueIteration::with_config(
                &env,
                GOAL,
                ShortestPathConfig {
                    max_sweeps,
                    tolerance: None,
                },
            )
            .unwrap();
            solver.compute_value_function().unwrap();

            for (state, &cost) in solver.costs().iter() {
                assert!(cost >= 0.0, "{state:?} has a non-negative cost");
                assert!(cost <= previous[state], "{state:?} cost did not increase");
            }
            assert_eq!(solver.cost(GOAL).unwrap(), 0.0, "goal stays at zero");
            previous = solver.costs().clone();
        }
    }

    #[test]
    fn policy_matches_recomputed_argmin() {
        let env = MockGrid::open(5, 5).with_obstacles([(1, 1), (2, 3), (3, 1)]);
        let mut solver = ShortestPathValueIteration::new(&env, GOAL).unwrap();
        solver.compute_value_function().unwrap();
        let first = solver.compute_policy().unwrap().clone();
        assert_eq!(solver.compute_policy().unwrap(), &first, "extraction is idempotent");

        for (state, entry) in first.iter() {
            let Some(chosen) = *entry else {
                continue;
            };
            let cost_after = |a: usize| {
                env.transition(state, a)
                    .map(|next| 1.0 + solver.costs()[next])
                    .unwrap_or(f32::INFINITY)
            };
            let best = (0..DELTAS.len()).map(cost_after).fold(f32::INFINITY, f32::min);
            assert_eq!(cost_after(chosen), best, "{state:?} takes a minimizing action");
            assert_eq!(best, solver.costs()[state], "{state:?} is consistent with its cost");
            assert!((0..chosen).all(|a| cost_after(a) > best), "first minimizer wins");
        }
    }

    #[test]
    fn recomputation_is_idempotent() {
        let env = MockGrid::open(6, 4).with_obstacles([(2, 1), (2, 2)]);
        let mut solver = ShortestPathValueIteration::new(&env, (5, 0)).unwrap();
        solver.compute_value_function().unwrap();
        let costs = solver.costs().clone();

        let report = solver.compute_value_function().unwrap();
        assert_eq!(report.delta, 0.0, "fixed point reached");
        assert!(report.converged);
        assert_eq!(solver.costs(), &costs);
    }

    #[test]
    fn tolerance_stops_early() {
        let env = MockGrid::open(5, 5);
        let mut solver = ShortestPathValueIteration::with_config(
            &env,
            GOAL,
            ShortestPathConfig {
                max_sweeps: 100,
                tolerance: Some(0.0),
            },
        )
        .unwrap();

        let report = solver.compute_value_function().unwrap();
        assert!(report.converged);
        assert!(report.sweeps < 100, "stopped after {} sweeps", report.sweeps);
        assert_eq!(solver.cost((0, 0)).unwrap(), 8.0);
    }

    #[test]
    fn queries_before_compute() {
        let env = MockGrid::open(3, 3);
        let mut solver = ShortestPathValueIteration::new(&env, (1, 1)).unwrap();
        assert_eq!(solver.cost((1, 1)).unwrap(), 0.0, "goal starts at zero");
        assert_eq!(solver.cost((0, 0)).unwrap(), UNREACHED, "others start unreached");
        assert_eq!(solver.policy((0, 0)), Err(Error::NotComputed));
        assert_eq!(solver.compute_policy().err(), Some(Error::NotComputed));
    }

    #[test]
    fn recomputing_values_invalidates_policy() {
        let env = MockGrid::open(5, 5);
        let config = ShortestPathConfig {
            max_sweeps: 1,
            tolerance: None,
        };
        let mut solver = ShortestPathValueIteration::with_config(&env, GOAL, config).unwrap();
        solver.compute_value_function().unwrap();
        solver.compute_policy().unwrap();
        assert_eq!(solver.policy((0, 0)), Err(Error::NoAction((0, 0))), "not reached after one sweep");

        for _ in 0..20 {
            solver.compute_value_function().unwrap();
        }
        assert_eq!(solver.cost((0, 0)).unwrap(), 8.0, "costs converged");
        assert_eq!(solver.policy((0, 0)), Err(Error::NotComputed), "stale policy is dropped");
        assert!(solver.policy_table().view().iter().all(Option::is_none), "table cleared");

        solver.compute_policy().unwrap();
        assert_eq!(solver.policy((0, 0)), Ok(1), "fresh policy heads down");
        assert_eq!(solver.trace((0, 0)).unwrap().len(), 9, "8 steps to the goal");
    }

    #[test]
    fn out_of_bounds_queries() {
        let env = MockGrid::open(3, 3);
        let solver = {
            let mut s = ShortestPathValueIteration::new(&env, (2, 2)).unwrap();
            s.compute_value_function().unwrap();
            s.compute_policy().unwrap();
            s
        };
        assert_eq!(solver.policy((3, 3)), Err(Error::OutOfBounds((3, 3))));
        assert_eq!(solver.cost((0, -1)), Err(Error::OutOfBounds((0, -1))));
        assert_eq!(solver.policy((2, 2)), Err(Error::NoAction((2, 2))), "goal");
        assert_eq!(solver.action((2, 1)), Ok(3), "resolves to the action value");
    }

    #[test]
    fn out_of_bounds_successor_fails_fast() {
        let env = UnboundedGrid(MockGrid::open(3, 3));
        let mut solver = ShortestPathValueIteration::new(env, (2, 2)).unwrap();
        assert!(matches!(
            solver.compute_value_function(),
            Err(Error::Environment { state: (0, 0), .. })
        ));
    }

    #[test]
    fn zero_sweeps_rejected() {
        let env = MockGrid::open(3, 3);
        let config = ShortestPathConfig {
            max_sweeps: 0,
            tolerance: None,
        };
        assert!(matches!(
            ShortestPathValueIteration::with_config(&env, (0, 0), config),
            Err(Error::Config(_))
        ));
    }
}
