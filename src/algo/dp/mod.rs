//! Dynamic programming over a fully known grid model
//!
//! Both solvers follow the same two-phase protocol: sweep the value table to a
//! fixed budget (or tolerance), then extract a greedy policy from it in one pass.
//! The scaffolding for both phases lives here; the solvers only supply the
//! per-action backup and the optimization direction.

use log::{debug, info, warn};

use crate::{
    ds::Grid,
    env::{GridEnvironment, Pos},
    error::{Error, Result},
};

pub mod discounted;
pub mod shortest_path;

pub use discounted::{DiscountedConfig, DiscountedValueIteration};
pub use shortest_path::{ShortestPathConfig, ShortestPathValueIteration, UNREACHED};

/// Tolerance on the total probability mass of a transition distribution
const PROB_TOLERANCE: f32 = 1e-4;

/// Summary of a value function computation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sweeps {
    /// Number of full-grid sweeps performed
    pub sweeps: usize,
    /// Largest absolute change of any entry during the last sweep
    pub delta: f32,
    /// Whether the last sweep changed no entry by more than the tolerance
    /// (or at all, when no tolerance is configured)
    pub converged: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Objective {
    Maximize,
    Minimize,
}

impl Objective {
    fn improves(self, candidate: f32, best: f32) -> bool {
        match self {
            Objective::Maximize => candidate > best,
            Objective::Minimize => candidate < best,
        }
    }
}

/// Sweep budget shared by both solvers
#[derive(Debug, Clone, Copy)]
pub(crate) struct Budget {
    pub max_sweeps: usize,
    pub tolerance: Option<f32>,
}

impl Budget {
    pub fn validate(&self) -> Result<()> {
        if self.max_sweeps == 0 {
            return Err(Error::Config("`max_sweeps` must be at least 1".into()));
        }
        if let Some(tolerance) = self.tolerance {
            if !(tolerance >= 0.0) {
                return Err(Error::Config(format!(
                    "`tolerance` must be non-negative, got {tolerance}"
                )));
            }
        }
        Ok(())
    }
}

/// Check the environment against the goal and snapshot its action list
pub(crate) fn snapshot_actions<E: GridEnvironment>(env: &E, goal: Pos) -> Result<Vec<E::Action>> {
    let (rows, cols) = env.shape();
    if rows == 0 || cols == 0 {
        return Err(Error::Config(format!("grid shape {rows}x{cols} is empty")));
    }
    let in_grid = goal.0 >= 0 && goal.1 >= 0 && (goal.0 as usize) < rows && (goal.1 as usize) < cols;
    if !in_grid || !env.is_valid(goal) {
        return Err(Error::InvalidGoal(goal));
    }

    let actions = env.actions();
    if actions.is_empty() {
        return Err(Error::Config("environment reports no actions".into()));
    }

    Ok(actions)
}

/// The states a sweep updates: valid and not the goal, in raster order
pub(crate) fn active_states<E: GridEnvironment, T>(env: &E, table: &Grid<T>, goal: Pos) -> Vec<Pos> {
    table
        .positions()
        .filter(|&s| s != goal && env.is_valid(s))
        .collect()
}

/// Whether `next` can be read from the table
///
/// A successor the environment calls valid but that lies outside the grid is a
/// broken environment, not an invalid state.
pub(crate) fn successor_is_valid<E: GridEnvironment, T>(
    env: &E,
    table: &Grid<T>,
    state: Pos,
    next: Pos,
) -> Result<bool> {
    match (env.is_valid(next), table.contains(next)) {
        (true, true) => Ok(true),
        (false, _) => Ok(false),
        (true, false) => Err(Error::Environment {
            state,
            reason: format!("successor {next:?} is reported valid but lies outside the grid"),
        }),
    }
}

/// Reject distributions with negative, non-finite, or non-normalized probabilities
pub(crate) fn check_distribution(state: Pos, probs: impl IntoIterator<Item = f32>) -> Result<()> {
    let mut total = 0.0;
    for p in probs {
        if !p.is_finite() || p < 0.0 {
            return Err(Error::Environment {
                state,
                reason: format!("transition probability {p} is not a finite non-negative number"),
            });
        }
        total += p;
    }

    if (total - 1.0).abs() > PROB_TOLERANCE {
        return Err(Error::Environment {
            state,
            reason: format!("transition probabilities sum to {total}, not 1"),
        });
    }

    Ok(())
}

/// Pick the best action index
///
/// `action_value` returns `None` for actions that have no value in this state.
/// Comparison is strict, so the lowest index wins ties.
///
/// **Returns** `(action_index, value)`, or `None` when no action has a value
pub(crate) fn greedy<F>(
    n_actions: usize,
    objective: Objective,
    mut action_value: F,
) -> Result<Option<(usize, f32)>>
where
    F: FnMut(usize) -> Result<Option<f32>>,
{
    let mut best: Option<(usize, f32)> = None;
    for a in 0..n_actions {
        let Some(value) = action_value(a)? else {
            continue;
        };
        match best {
            Some((_, b)) if !objective.improves(value, b) => {}
            _ => best = Some((a, value)),
        }
    }

    Ok(best)
}

/// Run Bellman sweeps over `states` until the budget is spent
///
/// Updates happen in place, so later states in a sweep already see the values
/// written earlier in the same sweep. States for which no action has a value
/// keep their previous entry.
pub(crate) fn iterate<F>(
    table: &mut Grid<f32>,
    states: &[Pos],
    n_actions: usize,
    objective: Objective,
    budget: Budget,
    mut action_value: F,
) -> Result<Sweeps>
where
    F: FnMut(&Grid<f32>, Pos, usize) -> Result<Option<f32>>,
{
    let mut report = Sweeps {
        sweeps: 0,
        delta: 0.0,
        converged: false,
    };

    for sweep in 1..=budget.max_sweeps {
        let mut delta = 0.0f32;
        for &state in states {
            let best = greedy(n_actions, objective, |a| action_value(&*table, state, a))?;
            if let Some((_, value)) = best {
                let cell = &mut table[state];
                delta = delta.max((value - *cell).abs());
                *cell = value;
            }
        }

        debug!("sweep {sweep}: max delta {delta}");
        report.sweeps = sweep;
        report.delta = delta;
        report.converged = delta <= budget.tolerance.unwrap_or(0.0);

        if report.converged && budget.tolerance.is_some() {
            info!("value iteration converged after {sweep} sweeps (delta {delta})");
            return Ok(report);
        }
    }

    if budget.tolerance.is_some() {
        warn!(
            "value iteration did not converge within {} sweeps (delta {})",
            budget.max_sweeps, report.delta
        );
    } else {
        info!(
            "value iteration finished {} sweeps (delta {})",
            report.sweeps, report.delta
        );
    }

    Ok(report)
}

/// Fill `policy` with the greedy action for each of `states`
///
/// Every other entry is reset to `None`.
pub(crate) fn extract_policy<F>(
    policy: &mut Grid<Option<usize>>,
    states: &[Pos],
    n_actions: usize,
    objective: Objective,
    mut action_value: F,
) -> Result<()>
where
    F: FnMut(Pos, usize) -> Result<Option<f32>>,
{
    policy.fill(None);
    for &state in states {
        policy[state] = greedy(n_actions, objective, |a| action_value(state, a))?.map(|(a, _)| a);
    }

    Ok(())
}

/// Look up a policy entry
pub(crate) fn policy_entry(policy: &Grid<Option<usize>>, state: Pos) -> Result<usize> {
    policy
        .get(state)
        .copied()
        .ok_or(Error::OutOfBounds(state))?
        .ok_or(Error::NoAction(state))
}
