//! Tick-driven simulation scheduler: job assignment, conflict-free
//! advancement, deadlock detection, job completion.

use mapf_core::{Graph, JobRequest, Path, ReservationTable, Runner, RunnerId, Time, Vertex, UNBOUNDED};

use crate::config::SchedulerConfig;
use crate::error::SchedulerError;

/// The planner strategy the scheduler consults when assigning a job.
///
/// Any function of this shape implements the trait, so the default
/// space-time planner (`mapf_astar::plan`) and a single-agent planner
/// shimmed to ignore `reservations`/`runner_id` are interchangeable.
pub trait Planner {
    fn plan(&self, graph: &Graph, start: Vertex, goal: Vertex, reservations: &ReservationTable, runner_id: RunnerId, start_time: Time) -> Path;
}

impl<F> Planner for F
where
    F: Fn(&Graph, Vertex, Vertex, &ReservationTable, RunnerId, Time) -> Path,
{
    fn plan(&self, graph: &Graph, start: Vertex, goal: Vertex, reservations: &ReservationTable, runner_id: RunnerId, start_time: Time) -> Path {
        self(graph, start, goal, reservations, runner_id, start_time)
    }
}

/// Tick loop coupling job assignment, reservation-guarded advancement,
/// completion, and deadlock diagnosis.
pub struct Scheduler<P: Planner> {
    graph: Graph,
    runners: Vec<Runner>,
    /// FIFO queue of unassigned jobs, stored reversed so the next job pops
    /// off the back in original order.
    new_jobs: Vec<JobRequest>,
    /// Indexed by runner index; runner ids are dense `0..runners.len()`.
    assignments: Vec<Option<JobRequest>>,
    finished_jobs: Vec<JobRequest>,
    reservations: ReservationTable,
    time: Time,
    no_move_streak: u64,
    deadlock_ticks: u64,
    planner: P,
}

impl<P: Planner> Scheduler<P> {
    /// Construct a scheduler with `number_of_runners` runners, all starting
    /// at vertex 0, and `jobs` as the initial new-job queue.
    pub fn new(jobs: Vec<JobRequest>, graph: Graph, number_of_runners: usize, planner: P) -> Self {
        Self::with_config(jobs, graph, number_of_runners, planner, SchedulerConfig::default())
    }

    pub fn with_config(
        jobs: Vec<JobRequest>,
        graph: Graph,
        number_of_runners: usize,
        planner: P,
        config: SchedulerConfig,
    ) -> Self {
        let deadlock_ticks = config.resolve_deadlock_ticks(graph.vertex_count());
        let reservations = ReservationTable::new(graph.vertex_count());
        let runners = (0..number_of_runners as RunnerId)
            .map(|id| Runner::new(id, &graph, 0))
            .collect();

        let mut new_jobs = jobs;
        new_jobs.reverse();

        Self {
            graph,
            runners,
            new_jobs,
            assignments: vec![None; number_of_runners],
            finished_jobs: Vec::new(),
            reservations,
            time: 0,
            no_move_streak: 0,
            deadlock_ticks,
            planner,
        }
    }

    pub fn time(&self) -> Time {
        self.time
    }

    pub fn runners(&self) -> &[Runner] {
        &self.runners
    }

    pub fn new_jobs(&self) -> &[JobRequest] {
        &self.new_jobs
    }

    pub fn assignments(&self) -> &[Option<JobRequest>] {
        &self.assignments
    }

    pub fn finished_jobs(&self) -> &[JobRequest] {
        &self.finished_jobs
    }

    pub fn is_finished(&self) -> bool {
        self.new_jobs.is_empty() && self.all_runners_finished()
    }

    pub fn is_deadlock(&self) -> bool {
        !self.is_finished() && self.no_move_streak >= self.deadlock_ticks
    }

    fn all_runners_finished(&self) -> bool {
        self.assignments.iter().all(Option::is_none) && self.runners.iter().all(Runner::is_in_destination)
    }

    /// Execute exactly one tick: assign, move, finish, advance time.
    pub fn advance(&mut self) -> Result<(), SchedulerError> {
        self.assign_new_jobs_to_runners()?;
        let moved = self.move_runners();
        self.finish_runner_jobs()?;

        if moved {
            self.no_move_streak = 0;
        } else {
            self.no_move_streak += 1;
        }
        self.time += 1;
        Ok(())
    }

    fn assign_new_jobs_to_runners(&mut self) -> Result<(), SchedulerError> {
        for index in 0..self.runners.len() {
            if self.assignments[index].is_none() {
                self.assign_next_job_to_runner(index)?;
            }
        }
        Ok(())
    }

    fn assign_next_job_to_runner(&mut self, index: usize) -> Result<(), SchedulerError> {
        if self.assignments[index].is_some() {
            let runner = self.runners[index].id();
            return Err(SchedulerError::DoubleAssignment { runner });
        }

        let Some(job) = self.new_jobs.pop() else {
            return Ok(());
        };

        let runner_id = self.runners[index].id();
        let path = self.planner.plan(&self.graph, job.start_vertex, job.end_vertex, &self.reservations, runner_id, self.time);

        // Release whatever this runner currently holds from now on, then
        // teleport it to the plan's start vertex (newly assigned runners
        // may start at an arbitrary vertex in this design).
        let current_vertex = self.runners[index].last_visited();
        self.reservations.unlock_vertex(current_vertex, runner_id, self.time, UNBOUNDED);

        self.runners[index]
            .travel(&self.graph, path.clone(), true)
            .expect("teleport is always allowed during assignment");

        // `path[0]` is where this runner already stands; it needs no
        // reservation of its own (that would only contend with whatever a
        // simultaneously-idle runner already occupies there). `path[1]`
        // lands in the same transition window as `path[0]`, `[self.time,
        // self.time + 1)`, since it's the move `move_runners` performs
        // immediately after this; each step beyond that gets its own tick.
        for (offset, &vertex) in path.iter().enumerate().skip(1) {
            let start = self.time + (offset - 1) as Time;
            if !self.reservations.lock_vertex(vertex, runner_id, start, start + 1) {
                tracing::warn!(
                    runner = runner_id,
                    vertex,
                    tick = start,
                    "path reservation conflict while committing trajectory"
                );
            }
        }

        tracing::debug!(
            tick = self.time,
            runner = runner_id,
            start = job.start_vertex,
            goal = job.end_vertex,
            "assigned new job"
        );
        self.assignments[index] = Some(job);
        Ok(())
    }

    /// Returns true iff at least one runner's last-visited vertex changed.
    fn move_runners(&mut self) -> bool {
        let mut any_moved = false;
        for index in 0..self.runners.len() {
            let runner_id = self.runners[index].id();
            let next_vertex = self.runners[index].next_vertex();
            if self.reservations.lock_vertex(next_vertex, runner_id, self.time, self.time + 1) {
                let previous = self.runners[index].last_visited();
                self.runners[index].advance(&self.graph);
                let moved = previous != self.runners[index].last_visited();
                any_moved |= moved;
                if moved {
                    tracing::trace!(tick = self.time, runner = runner_id, vertex = next_vertex, "runner moved");
                }
            } else {
                tracing::trace!(tick = self.time, runner = runner_id, vertex = next_vertex, "runner stays: vertex locked");
            }
        }
        any_moved
    }

    fn finish_runner_jobs(&mut self) -> Result<(), SchedulerError> {
        for index in 0..self.runners.len() {
            if self.runners[index].is_in_destination() && self.assignments[index].is_some() {
                self.finish_runner_job(index)?;
            }
        }
        Ok(())
    }

    fn finish_runner_job(&mut self, index: usize) -> Result<(), SchedulerError> {
        let job = self.assignments[index].take().ok_or_else(|| SchedulerError::MissingAssignmentOnFinish {
            runner: self.runners[index].id(),
        })?;

        // Hold the resting vertex indefinitely until reassignment, mirroring
        // the unbounded release `assign_next_job_to_runner` performs against
        // this same holding when the runner next gets work.
        let runner_id = self.runners[index].id();
        let resting_vertex = self.runners[index].last_visited();
        self.reservations.lock_vertex(resting_vertex, runner_id, self.time, UNBOUNDED);

        tracing::debug!(
            tick = self.time,
            runner = self.runners[index].id(),
            start = job.start_vertex,
            goal = job.end_vertex,
            "finished job"
        );
        self.finished_jobs.push(job);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mapf_core::Position;
    use pretty_assertions::assert_eq;

    fn square_graph() -> Graph {
        let mut g = Graph::new(vec![
            Position::new(0.0, 0.0),
            Position::new(1.0, 0.0),
            Position::new(1.0, 1.0),
            Position::new(0.0, 1.0),
        ]);
        g.add_bidirectional_edge(0, 1, 1.0);
        g.add_bidirectional_edge(1, 2, 1.0);
        g.add_bidirectional_edge(2, 3, 1.0);
        g.add_bidirectional_edge(3, 0, 1.0);
        g
    }

    fn chain_graph() -> Graph {
        let mut g = Graph::new(vec![Position::new(0.0, 0.0), Position::new(1.0, 0.0), Position::new(2.0, 0.0)]);
        g.add_bidirectional_edge(0, 1, 1.0);
        g.add_bidirectional_edge(1, 2, 1.0);
        g
    }

    fn run_until_finished_or(scheduler: &mut Scheduler<impl Planner>, max_ticks: u32) -> bool {
        for _ in 0..max_ticks {
            if scheduler.is_finished() {
                return true;
            }
            scheduler.advance().unwrap();
        }
        scheduler.is_finished()
    }

    #[test]
    fn no_two_runners_ever_share_a_vertex_at_the_same_tick() {
        // Distinct start vertices: both runners are idle at vertex 0 before
        // assignment, so distinct job starts keep their post-teleport
        // positions from colliding on the very first tick.
        let jobs = vec![JobRequest::new(0, 2), JobRequest::new(1, 3)];
        let mut scheduler = Scheduler::new(jobs, square_graph(), 2, mapf_astar::plan);

        for _ in 0..10 {
            scheduler.advance().unwrap();
            let mut seen = std::collections::HashMap::new();
            for runner in scheduler.runners() {
                let slot = (runner.last_visited(), scheduler.time());
                assert!(seen.insert(slot, runner.id()).is_none(), "two runners share vertex+time {:?}", slot);
            }
        }
    }

    #[test]
    fn single_runner_reaches_its_goal_via_the_shortest_path() {
        let jobs = vec![JobRequest::new(0, 2)];
        let mut scheduler = Scheduler::new(jobs, square_graph(), 1, mapf_astar::plan);

        assert!(run_until_finished_or(&mut scheduler, 10));
        assert_eq!(scheduler.finished_jobs(), &[JobRequest::new(0, 2)]);
        assert_eq!(scheduler.runners()[0].last_visited(), 2);
    }

    #[test]
    fn is_finished_implies_no_outstanding_work() {
        let jobs = vec![JobRequest::new(0, 1)];
        let mut scheduler = Scheduler::new(jobs, chain_graph(), 1, mapf_astar::plan);

        assert!(run_until_finished_or(&mut scheduler, 10));
        assert!(scheduler.new_jobs().is_empty());
        assert!(scheduler.assignments().iter().all(Option::is_none));
        assert!(scheduler.runners().iter().all(Runner::is_in_destination));
    }

    #[test]
    fn is_deadlock_implies_some_runner_still_assigned_and_nothing_moved() {
        // A planner that never consults `reservations` lets one runner
        // permanently claim the chain's middle vertex (job 0->1, finishing
        // there and holding it forever) while the other runner's committed
        // trajectory (0->2) is fixed in advance and can never be revised to
        // route around the block: it is stuck forever one hop short of its
        // goal, and the whole system stops moving.
        let jobs = vec![JobRequest::new(0, 1), JobRequest::new(0, 2)];
        let graph = chain_graph();
        let mut scheduler = Scheduler::new(jobs, graph, 2, naive_dijkstra_planner);

        for _ in 0..20 {
            scheduler.advance().unwrap();
        }
        assert!(scheduler.is_deadlock());
        assert!(!scheduler.is_finished());
        assert!(scheduler.assignments().iter().any(Option::is_some));
    }

    /// A stand-in planner that always proposes the direct shortest path and
    /// ignores reservations entirely, so its commitments can go stale the
    /// instant another runner claims part of the route (exercising deadlock
    /// diagnosis without depending on `mapf-astar`'s own collision-avoiding
    /// wait/detour behaviour).
    fn naive_dijkstra_planner(graph: &Graph, start: Vertex, goal: Vertex, _reservations: &ReservationTable, _runner_id: RunnerId, _start_time: Time) -> Path {
        let predecessor = mapf_core::shortest_paths_dijkstra(graph, start);
        mapf_core::extract_path(&predecessor, start, goal)
    }
}
