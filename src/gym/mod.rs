pub mod grid_world;

pub use grid_world::{GridWorld, Move};
