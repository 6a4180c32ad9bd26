//! Space-time A* planner for the cooperative MAPF motion layer.
//!
//! The planner strategy accepted by `mapf-sim`'s scheduler is any function
//! of this crate's `plan` signature; this is the default implementation.

mod astar;

pub use astar::plan;
