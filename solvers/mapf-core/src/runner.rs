//! Per-agent state machine: assigned path, current vertex, position, progress.

use thiserror::Error;

use crate::graph::{Graph, Path, Position, Vertex};
use crate::reservation::RunnerId;

/// Errors raised by [`Runner::travel`].
#[derive(Debug, Error, PartialEq)]
pub enum RunnerError {
    /// `travel` was called with `allow_teleport = false` and a trajectory
    /// that does not start at the runner's current vertex.
    #[error(
        "runner {runner} rejects trajectory starting at vertex {trajectory_start}: \
         currently at vertex {current}"
    )]
    TrajectoryStartMismatch {
        runner: RunnerId,
        current: Vertex,
        trajectory_start: Vertex,
    },
}

/// `Idle(at v) -> Traveling(v -> ... -> d) -> InDestination(d) = Idle(at d)`.
#[derive(Debug, Clone)]
pub struct Runner {
    id: RunnerId,
    path: Path,
    index: usize,
    position: Position,
    last_visited: Vertex,
    destination: Vertex,
}

impl Runner {
    /// Construct a runner at `initial_vertex` with no assigned path.
    ///
    /// `id` is assigned by the caller (the scheduler owns the monotonic
    /// counter) rather than by a process-global variable.
    pub fn new(id: RunnerId, graph: &Graph, initial_vertex: Vertex) -> Self {
        Self {
            id,
            path: Vec::new(),
            index: 0,
            position: graph.position(initial_vertex),
            last_visited: initial_vertex,
            destination: initial_vertex,
        }
    }

    pub fn id(&self) -> RunnerId {
        self.id
    }

    pub fn path(&self) -> &[Vertex] {
        &self.path
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn last_visited(&self) -> Vertex {
        self.last_visited
    }

    pub fn destination(&self) -> Vertex {
        self.destination
    }

    pub fn is_traveling(&self) -> bool {
        self.last_visited != self.destination
    }

    pub fn is_in_destination(&self) -> bool {
        self.last_visited == self.destination
    }

    /// `path[index..]`: the not-yet-visited tail of the current trajectory.
    pub fn remaining_path(&self) -> &[Vertex] {
        &self.path[self.index..]
    }

    /// `path[index + 1]` if a next step exists, otherwise `last_visited`
    /// (an at-rest runner "wants" to stay).
    pub fn next_vertex(&self) -> Vertex {
        if !self.path.is_empty() && self.index + 1 <= self.path.len() - 1 {
            self.path[self.index + 1]
        } else {
            self.last_visited
        }
    }

    /// Install a new trajectory.
    ///
    /// An empty trajectory clears the assignment: the runner stays put and
    /// is immediately in its destination. Otherwise the destination becomes
    /// `trajectory.last()`. If the trajectory does not start at the
    /// runner's current vertex, either teleport there (`allow_teleport`) or
    /// fail with [`RunnerError::TrajectoryStartMismatch`].
    pub fn travel(&mut self, graph: &Graph, trajectory: Path, allow_teleport: bool) -> Result<(), RunnerError> {
        if trajectory.is_empty() {
            self.path = trajectory;
            self.index = 0;
            self.destination = self.last_visited;
            return Ok(());
        }

        let trajectory_start = trajectory[0];
        if trajectory_start != self.last_visited {
            if !allow_teleport {
                return Err(RunnerError::TrajectoryStartMismatch {
                    runner: self.id,
                    current: self.last_visited,
                    trajectory_start,
                });
            }
            self.last_visited = trajectory_start;
            self.position = graph.position(trajectory_start);
        }

        self.destination = *trajectory.last().expect("checked non-empty above");
        self.index = 0;
        self.path = trajectory;
        Ok(())
    }

    /// Advance one step along the current path. A no-op once the runner has
    /// reached its destination.
    pub fn advance(&mut self, graph: &Graph) {
        if !self.path.is_empty() && self.index + 1 <= self.path.len() - 1 {
            self.index += 1;
            self.last_visited = self.path[self.index];
            self.position = graph.position(self.last_visited);
        }
    }
}
