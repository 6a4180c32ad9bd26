//! Core MAPF types: graph primitives, the interval reservation table, the
//! runner state machine, and the plain `JobRequest` value.
//!
//! This crate has no knowledge of planning strategy or tick scheduling;
//! those live in `mapf-astar` and `mapf-sim` respectively.

mod graph;
mod job;
mod reservation;
mod runner;

pub use graph::{extract_path, intersection, path_length, shortest_paths_dijkstra, Edge, Graph, Path, Position, Vertex};
pub use job::JobRequest;
pub use reservation::{ReservationTable, RunnerId, Time, UNBOUNDED};
pub use runner::{Runner, RunnerError};
