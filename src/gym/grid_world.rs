use std::collections::HashSet;

use rand::{
    distributions::{Distribution, WeightedIndex},
    Rng,
};
use strum::{EnumIter, VariantArray};

use crate::{
    env::{DeterministicDynamics, GridEnvironment, Outcome, Pos, StochasticDynamics},
    error::{Error, Result},
    util::check_interval,
};

#[derive(EnumIter, VariantArray, Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum Move {
    Up,
    Down,
    Left,
    Right,
}

impl Move {
    /// `(row, col)` offset of the move
    pub fn delta(self) -> Pos {
        match self {
            Move::Up => (-1, 0),
            Move::Down => (1, 0),
            Move::Left => (0, -1),
            Move::Right => (0, 1),
        }
    }

    /// The two moves at right angles to this one
    pub fn perpendicular(self) -> [Move; 2] {
        match self {
            Move::Up | Move::Down => [Move::Left, Move::Right],
            Move::Left | Move::Right => [Move::Up, Move::Down],
        }
    }

    pub fn arrow(self) -> char {
        match self {
            Move::Up => '^',
            Move::Down => 'v',
            Move::Left => '<',
            Move::Right => '>',
        }
    }

    fn apply(self, pos: Pos) -> Pos {
        let (dr, dc) = self.delta();
        (pos.0 + dr, pos.1 + dc)
    }
}

/// A rectangular grid with static obstacles and slippery floor
///
/// Moving into a wall or off the grid is infeasible under the deterministic
/// model. Under the stochastic model the intended move succeeds with probability
/// `1 - slip` and each perpendicular move happens with probability `slip / 2`;
/// outcomes that land on a wall are reported as is and left for the planner to handle.
#[derive(Debug, Clone)]
pub struct GridWorld {
    rows: usize,
    cols: usize,
    obstacles: HashSet<Pos>,
    slip: f32,
}

impl GridWorld {
    /// An obstacle-free `rows x cols` grid without slip
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            obstacles: HashSet::new(),
            slip: 0.0,
        }
    }

    /// Parse a map where `#` marks an obstacle and `.` a free cell
    ///
    /// Leading and trailing blank lines and surrounding whitespace are ignored.
    pub fn from_map(map: &str) -> Result<Self> {
        let lines = map
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect::<Vec<_>>();

        let cols = lines.first().map_or(0, |l| l.chars().count());
        let mut world = Self::new(lines.len(), cols);
        for (r, line) in lines.iter().enumerate() {
            if line.chars().count() != cols {
                return Err(Error::Config(format!(
                    "map row {r} has {} cells, expected {cols}",
                    line.chars().count()
                )));
            }
            for (c, cell) in line.chars().enumerate() {
                match cell {
                    '#' => {
                        world.obstacles.insert((r as i32, c as i32));
                    }
                    '.' => {}
                    other => {
                        return Err(Error::Config(format!(
                            "unknown map cell {other:?} at ({r}, {c})"
                        )))
                    }
                }
            }
        }

        Ok(world)
    }

    pub fn with_obstacles(mut self, obstacles: impl IntoIterator<Item = Pos>) -> Self {
        self.obstacles.extend(obstacles);
        self
    }

    /// Set the probability of slipping sideways
    ///
    /// **Errors** if `slip` is not in `[0, 1]`
    pub fn with_slip(mut self, slip: f32) -> Result<Self> {
        check_interval!(slip, 0.0, 1.0);
        self.slip = slip;
        Ok(self)
    }

    pub fn slip(&self) -> f32 {
        self.slip
    }

    pub fn is_obstacle(&self, pos: Pos) -> bool {
        self.obstacles.contains(&pos)
    }

    /// Sample a successor from the stochastic model
    ///
    /// Landing on an invalid state leaves the agent where it was.
    pub fn sample<R: Rng + ?Sized>(&self, state: Pos, action: Move, rng: &mut R) -> Pos {
        let outcomes = self.transition_distribution(state, action);
        let next = match WeightedIndex::new(outcomes.iter().map(|o| o.prob)) {
            Ok(dist) => outcomes[dist.sample(rng)].next_state,
            Err(_) => state,
        };

        if self.is_valid(next) {
            next
        } else {
            state
        }
    }
}

impl GridEnvironment for GridWorld {
    type Action = Move;

    fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    fn actions(&self) -> Vec<Self::Action> {
        Move::VARIANTS.to_vec()
    }

    fn is_valid(&self, state: Pos) -> bool {
        self.in_bounds(state) && !self.is_obstacle(state)
    }
}

impl DeterministicDynamics for GridWorld {
    fn transition(&self, state: Pos, action: Move) -> Option<Pos> {
        let next = action.apply(state);
        self.is_valid(next).then_some(next)
    }
}

impl StochasticDynamics for GridWorld {
    fn transition_distribution(&self, state: Pos, action: Move) -> Vec<Outcome> {
        let mut outcomes = vec![Outcome {
            next_state: action.apply(state),
            prob: 1.0 - self.slip,
        }];

        if self.slip > 0.0 {
            outcomes.extend(action.perpendicular().map(|m| Outcome {
                next_state: m.apply(state),
                prob: self.slip / 2.0,
            }));
        }

        outcomes
    }
}
