use std::{error::Error, fs};

use gridplan::{
    algo::{
        dp::UNREACHED, DiscountedConfig, DiscountedValueIteration, ShortestPathValueIteration,
    },
    ds::Grid,
    env::{GridEnvironment, Pos},
    gym::GridWorld,
};
use rand::thread_rng;

const MAP: &str = "
    ..........
    .####.....
    ....#..##.
    .##.#...#.
    .#..####..
    .#........
    ...##.###.
    ..........
";

const START: Pos = (0, 0);
const GOAL: Pos = (7, 9);

fn print_policy<A: Copy>(
    world: &GridWorld,
    policy: impl Fn(Pos) -> Option<A>,
    arrow: impl Fn(A) -> char,
) {
    let (rows, cols) = world.shape();
    for r in 0..rows as i32 {
        let line = (0..cols as i32)
            .map(|c| match (r, c) {
                p if p == GOAL => 'G',
                p if world.is_obstacle(p) => '#',
                p => policy(p).map(&arrow).unwrap_or('?'),
            })
            .collect::<String>();
        println!("    {line}");
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let world = GridWorld::from_map(MAP)?;

    // Shortest path over deterministic moves

    let mut vi = ShortestPathValueIteration::new(&world, GOAL)?;
    let report = vi.compute_value_function()?;
    vi.compute_policy()?;
    println!("Shortest path: {} sweeps, last delta {}", report.sweeps, report.delta);
    println!("  cost from {START:?}: {}", vi.cost(START)?);
    print_policy(&world, |p| vi.action(p).ok(), |m| m.arrow());
    println!("  path: {:?}", vi.trace(START)?);

    // Discounted reward over slippery moves

    let slippery = world.clone().with_slip(0.2)?;
    let mut mdp = DiscountedValueIteration::with_config(
        &slippery,
        GOAL,
        DiscountedConfig {
            tolerance: Some(1e-6),
            max_sweeps: 1000,
            ..Default::default()
        },
    )?;
    let report = mdp.compute_value_function()?;
    mdp.compute_policy()?;
    println!(
        "Discounted: {} sweeps, converged: {}",
        report.sweeps, report.converged
    );
    println!("  value of {START:?}: {:.4}", mdp.value(START)?);
    print_policy(&slippery, |p| mdp.action(p).ok(), |m| m.arrow());

    let mut rng = thread_rng();
    let mut state = START;
    let mut steps = 0;
    while state != GOAL && steps < 200 {
        state = slippery.sample(state, mdp.action(state)?, &mut rng);
        steps += 1;
    }
    println!("  sampled episode reached {state:?} after {steps} steps");

    // Write data to CSV

    fs::create_dir_all("demos/value_iteration_gridworld/out")?;
    write_table("demos/value_iteration_gridworld/out/values.csv", mdp.values(), |v| {
        v.to_string()
    })?;
    write_table("demos/value_iteration_gridworld/out/costs.csv", vi.costs(), |c| {
        if c < UNREACHED {
            c.to_string()
        } else {
            String::new()
        }
    })?;

    Ok(())
}

fn write_table(
    path: &str,
    table: &Grid<f32>,
    fmt: impl Fn(f32) -> String,
) -> Result<(), Box<dyn Error>> {
    let mut wtr = csv::Writer::from_path(path)?;
    for row in table.rows() {
        wtr.write_record(row.iter().map(|&v| fmt(v)))?;
    }
    wtr.flush()?;
    Ok(())
}
