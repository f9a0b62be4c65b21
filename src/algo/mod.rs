/// Dynamic programming planners
pub mod dp;

pub use dp::{
    DiscountedConfig, DiscountedValueIteration, ShortestPathConfig, ShortestPathValueIteration,
    Sweeps,
};
