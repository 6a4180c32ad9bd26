//! Space-time A*: search over the product space `Vertex x Time`, consulting
//! a reservation table so the returned path never steps onto a vertex
//! another runner holds at that instant.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use mapf_core::{Graph, Path, ReservationTable, RunnerId, Time, Vertex};

/// A single search state: a vertex occupied at a given tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct State {
    vertex: Vertex,
    time: Time,
}

#[derive(Debug, Clone, PartialEq)]
struct OpenEntry {
    f_score: f64,
    state: State,
}

impl Eq for OpenEntry {}

impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse for a min-heap; ties favor insertion order, which
        // `BinaryHeap` preserves only loosely, but the wait penalty below
        // already discourages indefinite waiting over an equal-cost move.
        other
            .f_score
            .partial_cmp(&self.f_score)
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn heuristic(graph: &Graph, v: Vertex, goal: Vertex) -> f64 {
    graph.position(v).distance(&graph.position(goal))
}

/// Compute a collision-free timed path from `start` to `goal`, consulting
/// `reservations` on behalf of `runner_id`. The returned path is consumed
/// one tick per vertex starting at `start_time`, the caller's current
/// simulation tick: stepping from a vertex held at tick `t` probes the next
/// vertex (or a wait in place) at that same tick `t`, matching the window
/// the scheduler later actually commits the move into.
///
/// Returns an empty path if `goal` is unreachable within the safety cap.
pub fn plan(
    graph: &Graph,
    start: Vertex,
    goal: Vertex,
    reservations: &ReservationTable,
    runner_id: RunnerId,
    start_time: Time,
) -> Path {
    let safety_cap: Time = start_time + 10 * graph.vertex_count() as Time;

    let start_state = State { vertex: start, time: start_time };
    let mut best_g: HashMap<State, f64> = HashMap::new();
    let mut came_from: HashMap<State, State> = HashMap::new();
    let mut open = BinaryHeap::new();

    best_g.insert(start_state, 0.0);
    open.push(OpenEntry { f_score: heuristic(graph, start, goal), state: start_state });

    let mut goal_state = None;
    while let Some(OpenEntry { state: current, .. }) = open.pop() {
        if current.vertex == goal {
            goal_state = Some(current);
            break;
        }

        let current_g = best_g[&current];
        if current.time > safety_cap {
            continue; // pathological waiting guard: stop expanding this state
        }

        for edge in graph.out_edges(current.vertex) {
            // The step into `edge.to` lands in the same tick `current` was
            // entered in (the scheduler commits a path's k-th vertex to
            // `[t+k-1, t+k)`, one tick earlier than the state's own index),
            // so the occupancy probe uses `current.time`, not `current.time + 1`.
            if !reservations.is_vertex_free_for(edge.to, runner_id, current.time, current.time + 1) {
                continue;
            }
            let candidate_g = current_g + edge.weight;
            let next_time = current.time + 1;
            let next_state = State { vertex: edge.to, time: next_time };
            if candidate_g < *best_g.get(&next_state).unwrap_or(&f64::INFINITY) {
                best_g.insert(next_state, candidate_g);
                came_from.insert(next_state, current);
                let f = candidate_g + heuristic(graph, edge.to, goal);
                open.push(OpenEntry { f_score: f, state: next_state });
            }
        }

        // Wait: stay at the current vertex for one more tick. Pushing
        // carries a penalty proportional to ticks elapsed since `start_time`,
        // to discourage indefinite waiting when a move of equal cost exists.
        if reservations.is_vertex_free_for(current.vertex, runner_id, current.time, current.time + 1) {
            let wait_time = current.time + 1;
            let wait_state = State { vertex: current.vertex, time: wait_time };
            if current_g < *best_g.get(&wait_state).unwrap_or(&f64::INFINITY) {
                best_g.insert(wait_state, current_g);
                came_from.insert(wait_state, current);
                let f = current_g + heuristic(graph, current.vertex, goal) + (current.time - start_time) as f64;
                open.push(OpenEntry { f_score: f, state: wait_state });
            }
        }
    }

    let Some(goal_state) = goal_state else {
        return Vec::new();
    };

    let mut path = vec![goal_state.vertex];
    let mut state = goal_state;
    while state != start_state {
        state = came_from[&state];
        path.push(state.vertex);
    }
    path.reverse();
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use mapf_core::Position;
    use pretty_assertions::assert_eq;

    fn default_graph() -> Graph {
        let mut g = Graph::new(vec![
            Position::new(0.0, 0.0),
            Position::new(1.0, 0.0),
            Position::new(1.0, 1.0),
            Position::new(0.0, 1.0),
        ]);
        g.add_edge(0, 1, 2.0);
        g.add_edge(0, 2, 3.0);
        g.add_edge(1, 2, 1.0);
        g.add_edge(0, 3, 1.0);
        g.add_edge(3, 2, 1.0);
        g
    }

    #[test]
    fn plain_shortest_path_with_empty_reservations() {
        let graph = default_graph();
        let reservations = ReservationTable::new(graph.vertex_count());
        let path = plan(&graph, 0, 2, &reservations, 1, 0);
        assert_eq!(path, vec![0, 3, 2]);
    }

    #[test]
    fn detour_prefers_cheaper_two_hop_route() {
        // (0,1,2),(0,2,1),(1,3,2),(2,1,2),(2,3,6),(2,4,3),(3,4,7),(3,5,2),(4,5,4)
        // Positions alternate so 0->1 (weight 2) is cheaper overall than 0->2->...
        let mut g = Graph::new(vec![
            Position::new(0.0, 0.0),
            Position::new(1.0, 0.0),
            Position::new(0.0, 1.0),
            Position::new(1.0, 1.0),
            Position::new(0.0, 2.0),
            Position::new(1.0, 2.0),
        ]);
        g.add_edge(0, 1, 2.0);
        g.add_edge(0, 2, 1.0);
        g.add_edge(1, 3, 2.0);
        g.add_edge(2, 1, 2.0);
        g.add_edge(2, 3, 6.0);
        g.add_edge(2, 4, 3.0);
        g.add_edge(3, 4, 7.0);
        g.add_edge(3, 5, 2.0);
        g.add_edge(4, 5, 4.0);

        let reservations = ReservationTable::new(g.vertex_count());
        let path = plan(&g, 0, 5, &reservations, 1, 0);
        assert_eq!(path, vec![0, 1, 3, 5]);
    }

    #[test]
    fn unreachable_goal_returns_empty_path() {
        let graph = Graph::new(vec![Position::new(0.0, 0.0), Position::new(1.0, 0.0)]);
        let reservations = ReservationTable::new(graph.vertex_count());
        let path = plan(&graph, 0, 1, &reservations, 1, 0);
        assert!(path.is_empty());
    }

    #[test]
    fn start_equals_goal_returns_single_vertex_path() {
        let graph = default_graph();
        let reservations = ReservationTable::new(graph.vertex_count());
        let path = plan(&graph, 2, 2, &reservations, 1, 0);
        assert_eq!(path, vec![2]);
    }

    #[test]
    fn planner_waits_out_a_reservation_rather_than_colliding() {
        let graph = default_graph();
        let mut reservations = ReservationTable::new(graph.vertex_count());
        // Another runner holds vertex 3 for tick [0, 1) — the very tick a
        // direct 0->3 move would need.
        reservations.lock_vertex(3, 99, 0, 1);
        let path = plan(&graph, 0, 2, &reservations, 1, 0);
        // The cheapest remaining option is to wait out tick 0 at vertex 0,
        // then take 0->3->2 once vertex 3 is free again.
        assert_eq!(path, vec![0, 0, 3, 2]);
    }
}
