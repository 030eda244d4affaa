mod repair;

use crate::encoding::{
    end_point, first_point, is_start, second_point, start_point, step_of, TimePoint, EPSILON,
};
use crate::heuristic::{LandmarkHeuristic, LandmarkProgress};
use crate::plan::{PlanId, PlanTree};
use crate::state::State;
use crate::task::{Action, Task};

use std::cmp::Ordering;
use std::collections::BTreeSet;
use tracing::trace;

const INITIAL_MATRIX_SIZE: usize = 400;
const MATRIX_INCREASE: usize = 200;

/// Time point waiting to be executed at `time`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct ScheduledPoint {
    time: f64,
    point: TimePoint,
}

impl Eq for ScheduledPoint {}

impl Ord for ScheduledPoint {
    fn cmp(&self, other: &Self) -> Ordering {
        self.time
            .total_cmp(&other.time)
            .then_with(|| self.point.cmp(&other.point))
    }
}

impl PartialOrd for ScheduledPoint {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

type ScheduleQueue = BTreeSet<ScheduledPoint>;

/// Result of a successful linearization.
#[derive(Debug, Clone, PartialEq)]
pub struct Linearization {
    pub state: State,
    pub makespan: f64,
    pub unsatisfied_numeric_conditions: bool,
    pub progress: Option<LandmarkProgress>,
}

/// Action of a linearized plan with its start time.
#[derive(Debug, Clone, PartialEq)]
pub struct TimedStep {
    pub step: usize,
    pub name: String,
    pub start: f64,
    pub duration: f64,
}

/// Turns the partial order of a plan into a schedule and the frontier
/// state. Orderings live in a square matrix stamped with the current
/// iteration, so a new base plan invalidates all of them at once.
#[derive(Debug, Clone)]
pub struct Linearizer {
    matrix: Vec<Vec<u32>>,
    iteration: u32,
    components: Vec<PlanId>,
    plan: Option<PlanId>,
    time: Vec<f64>,
    duration: Vec<f64>,
    initial_state: State,
}

impl Linearizer {
    pub fn new(initial_state: State) -> Self {
        Linearizer {
            matrix: vec![vec![0; INITIAL_MATRIX_SIZE]; INITIAL_MATRIX_SIZE],
            iteration: 0,
            components: Vec::new(),
            plan: None,
            time: Vec::new(),
            duration: Vec::new(),
            initial_state,
        }
    }

    pub fn set_current_base_plan(&mut self, tree: &PlanTree, base: PlanId) {
        self.iteration = self.iteration.wrapping_add(1);
        if self.iteration == u32::MAX || self.iteration == 0 {
            self.iteration = 1;
            for row in &mut self.matrix {
                row.fill(0);
            }
        }
        self.components = tree.components(base);
        self.compute_order_matrix(tree);
    }

    /// Candidate built on top of the base plan; its orderings are already
    /// in the matrix.
    pub fn set_current_plan(&mut self, plan: Option<PlanId>) {
        self.plan = plan;
    }

    fn compute_order_matrix(&mut self, tree: &PlanTree) {
        let new_step = self.components.len();
        let last_point = end_point(new_step) as usize;
        if last_point >= self.matrix.len() {
            self.resize_matrix(last_point + 1);
        }
        let it = self.iteration;
        for i in 0..self.components.len() {
            self.matrix[start_point(i) as usize][end_point(i) as usize] = it;
        }
        self.matrix[last_point - 1][last_point] = it;
        for (i, c) in self.components.iter().enumerate() {
            for o in &tree.get(*c).orderings {
                self.matrix[first_point(*o) as usize][second_point(*o) as usize] = it;
            }
            if i > 0 {
                self.matrix[1][start_point(i) as usize] = it;
                self.matrix[1][end_point(i) as usize] = it;
            }
        }
        // The step being added also follows the initial state.
        self.matrix[1][last_point - 1] = it;
        self.matrix[1][last_point] = it;
    }

    fn resize_matrix(&mut self, min_size: usize) {
        let mut size = self.matrix.len();
        while size < min_size {
            size += MATRIX_INCREASE;
        }
        self.matrix.resize_with(size, Vec::new);
        for row in &mut self.matrix {
            row.resize(size, 0);
        }
    }

    #[inline]
    pub fn exist_order(&self, t1: TimePoint, t2: TimePoint) -> bool {
        self.matrix[t1 as usize][t2 as usize] == self.iteration
    }

    #[inline]
    pub fn set_order(&mut self, t1: TimePoint, t2: TimePoint) {
        self.matrix[t1 as usize][t2 as usize] = self.iteration;
    }

    #[inline]
    pub fn clear_order(&mut self, t1: TimePoint, t2: TimePoint) {
        self.matrix[t1 as usize][t2 as usize] = 0;
    }

    #[inline]
    pub fn check_iteration(&self, it: u32) -> bool {
        it == self.iteration
    }

    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    pub fn num_components(&self) -> usize {
        self.components.len()
    }

    pub fn component(&self, step: usize) -> PlanId {
        self.components[step]
    }

    pub fn components(&self) -> &[PlanId] {
        &self.components
    }

    fn step_plan(&self, step: usize) -> PlanId {
        match self.components.get(step) {
            Some(id) => *id,
            None => self.plan.unwrap_or(self.components[self.components.len() - 1]),
        }
    }

    fn step_action<'a>(&self, tree: &'a PlanTree, task: &'a Task, step: usize) -> &'a Action {
        tree.plan_action(task, self.step_plan(step))
    }

    fn last_action<'a>(&self, tree: &'a PlanTree, task: &'a Task) -> &'a Action {
        let last = self
            .plan
            .or_else(|| self.components.last().copied())
            .unwrap_or(tree.root());
        tree.plan_action(task, last)
    }

    pub fn time(&self, point: TimePoint) -> f64 {
        self.time[point as usize]
    }

    pub fn duration(&self, step: usize) -> f64 {
        self.duration[step]
    }

    /// Linearizes the base plan plus the current plan, if any.
    pub fn frontier_state(
        &mut self,
        tree: &PlanTree,
        task: &Task,
        landmarks: Option<&LandmarkHeuristic>,
    ) -> Option<Linearization> {
        let num_actions = self.components.len() + usize::from(self.plan.is_some());
        self.linearize(tree, task, num_actions, landmarks)
    }

    fn linearize(
        &mut self,
        tree: &PlanTree,
        task: &Task,
        num_actions: usize,
        landmarks: Option<&LandmarkHeuristic>,
    ) -> Option<Linearization> {
        let num_time_steps = num_actions * 2;
        let is_solution = self.last_action(tree, task).is_goal;
        let mut linear_order = self.topological_order(num_time_steps);
        self.initialize_time_array(num_time_steps);
        self.duration = vec![0.0; num_actions];
        self.initial_plan_schedule(tree, task, &linear_order);
        if task.has_til() && !self.check_valid_initial_schedule(num_time_steps) {
            trace!("initial schedule violates a fixed time");
            return None;
        }

        let mut repairs = 0;
        let (state, unsatisfied) = loop {
            let mut state = self.initial_state.clone();
            let outcome = if is_solution {
                self.fix_scheduled_times_for_goal(tree, task, &mut state, &mut linear_order)
            } else {
                self.fix_scheduled_times(tree, task, &mut state, &mut linear_order)
            };
            match outcome {
                repair::Repair::Invalid => return None,
                repair::Repair::Repeat => {
                    repairs += 1;
                    if repairs >= num_time_steps {
                        trace!("schedule repair limit reached");
                        return None;
                    }
                }
                repair::Repair::Done { unsatisfied } => break (state, unsatisfied),
            }
        };
        if is_solution && !self.check_solution(tree, task, num_time_steps) {
            return None;
        }

        let mut makespan: f64 = 0.0;
        for i in 2..num_time_steps {
            if self.time[i] > makespan && !self.step_action(tree, task, i >> 1).is_til {
                makespan = self.time[i];
            }
        }
        let progress = landmarks.map(|h| self.compute_achieved_landmarks(tree, task, num_time_steps, h));
        Some(Linearization {
            state,
            makespan,
            unsatisfied_numeric_conditions: unsatisfied,
            progress,
        })
    }

    /// Depth-first order over the time points reachable from the end of the
    /// initial step.
    fn topological_order(&self, size: usize) -> Vec<TimePoint> {
        let mut order: Vec<TimePoint> = vec![0; size];
        let mut visited = vec![false; size];
        let mut pos = size - 1;
        let mut stack: Vec<(TimePoint, usize)> = vec![(1, 2)];
        visited[1] = true;
        while let Some((orig, next)) = stack.last().copied() {
            let child = (next..size).find(|i| !visited[*i] && self.exist_order(orig, *i as TimePoint));
            match child {
                Some(i) => {
                    if let Some(top) = stack.last_mut() {
                        top.1 = i + 1;
                    }
                    visited[i] = true;
                    stack.push((i as TimePoint, 2));
                }
                None => {
                    stack.pop();
                    order[pos] = orig;
                    pos = pos.saturating_sub(1);
                }
            }
        }
        order
    }

    fn initialize_time_array(&mut self, num_time_steps: usize) {
        self.time = vec![EPSILON; num_time_steps];
        self.time[0] = -EPSILON;
        self.time[1] = 0.0;
    }

    /// Earliest times respecting the orderings, with durations computed
    /// along the order.
    fn initial_plan_schedule(&mut self, tree: &PlanTree, task: &Task, order: &[TimePoint]) {
        let mut num_state = self.initial_state.numbers.clone();
        for i in 2..order.len() {
            let p1 = order[i];
            let step1 = step_of(p1);
            let a1 = self.step_action(tree, task, step1);
            if is_start(p1) {
                self.duration[step1] = task.action_duration(a1, &num_state);
            }
            let effects = if is_start(p1) { &a1.start_num_eff } else { &a1.end_num_eff };
            for e in effects {
                e.apply(&mut num_state, self.duration[step1]);
            }
            for &p2 in &order[i + 1..] {
                if !self.exist_order(p1, p2) {
                    continue;
                }
                let (t1, t2) = (p1 as usize, p2 as usize);
                if is_start(p1) && p2 == p1 + 1 {
                    self.time[t2] = self.time[t1] + self.duration[step1];
                } else if self.time[t2] < self.time[t1] + EPSILON {
                    self.time[t2] = (100.0 * (self.time[t1] + EPSILON)).ceil() / 100.0;
                }
            }
        }
    }

    fn check_valid_initial_schedule(&self, num_time_points: usize) -> bool {
        for p1 in 2..num_time_points {
            for p2 in 2..num_time_points {
                if self.exist_order(p1 as TimePoint, p2 as TimePoint) && self.time[p1] > self.time[p2] {
                    return false;
                }
            }
        }
        true
    }

    /// Queue with every time point after the initial step.
    fn schedule_queue(&self, num_time_steps: usize) -> ScheduleQueue {
        (2..num_time_steps)
            .map(|i| ScheduledPoint {
                time: self.time[i],
                point: i as TimePoint,
            })
            .collect()
    }

    fn apply_point(&self, point: TimePoint, action: &Action, state: &mut State, duration: f64) {
        let (effects, num_effects) = if is_start(point) {
            (&action.start_eff, &action.start_num_eff)
        } else {
            (&action.end_eff, &action.end_num_eff)
        };
        for e in effects {
            state.set_value(e.var, e.value);
        }
        for e in num_effects {
            let value = e.exp.evaluate(&state.numbers, duration);
            state.set_num_value(e.var, e.op, value);
        }
    }

    fn compute_achieved_landmarks(
        &self,
        tree: &PlanTree,
        task: &Task,
        num_time_steps: usize,
        landmarks: &LandmarkHeuristic,
    ) -> LandmarkProgress {
        let mut progress = LandmarkProgress::new(landmarks);
        let mut state = self.initial_state.clone();
        let mut queue = self.schedule_queue(num_time_steps);
        while let Some(sp) = queue.pop_first() {
            let step = step_of(sp.point);
            let action = self.step_action(tree, task, step);
            self.apply_point(sp.point, action, &mut state, self.duration[step]);
            progress.advance(landmarks, &state);
        }
        progress
    }

    /// Replays the schedule in time order and checks every condition and
    /// duration against the evolving state.
    fn check_solution(&self, tree: &PlanTree, task: &Task, num_time_steps: usize) -> bool {
        let mut ongoing: Vec<usize> = Vec::new();
        let mut state = self.initial_state.clone();
        let mut queue = self.schedule_queue(num_time_steps);
        while let Some(sp) = queue.pop_first() {
            let tp = sp.point;
            let step = step_of(tp);
            let a = self.step_action(tree, task, step);
            let t = tp as usize;
            if is_start(tp) {
                ongoing.push(step);
                let dur = task.action_duration(a, &state.numbers);
                if (dur - (self.time[t + 1] - self.time[t])).abs() > EPSILON / 2.0 {
                    return false;
                }
                if !a.start_cond.iter().all(|c| state.holds(c))
                    || !a.start_num_cond.iter().all(|c| c.holds(&state.numbers, dur))
                {
                    return false;
                }
                self.apply_point(tp, a, &mut state, dur);
            } else {
                ongoing.retain(|s| *s != step);
                let dur = self.duration[step];
                let conditions_hold = a
                    .over_cond
                    .iter()
                    .chain(a.end_cond.iter())
                    .all(|c| state.holds(c))
                    && a
                        .over_num_cond
                        .iter()
                        .chain(a.end_num_cond.iter())
                        .all(|c| c.holds(&state.numbers, dur));
                if !conditions_hold {
                    return false;
                }
                self.apply_point(tp, a, &mut state, dur);
            }
            for s in &ongoing {
                let a = self.step_action(tree, task, *s);
                let dur = self.duration[*s];
                if !a.over_cond.iter().all(|c| state.holds(c))
                    || !a.over_num_cond.iter().all(|c| c.holds(&state.numbers, dur))
                {
                    return false;
                }
            }
        }
        true
    }

    /// Real actions of `plan` with their scheduled start times, sorted by
    /// start, and the makespan. A trailing goal step is left out.
    pub fn timed_steps(&mut self, tree: &PlanTree, task: &Task, plan: PlanId) -> Option<(Vec<TimedStep>, f64)> {
        self.set_current_base_plan(tree, plan);
        self.set_current_plan(None);
        let num_actions = self.components.len();
        self.linearize(tree, task, num_actions, None)?;
        let last = if tree.get(plan).is_goal_action() {
            num_actions - 1
        } else {
            num_actions
        };
        let mut makespan: f64 = 0.0;
        let mut steps = Vec::new();
        for i in 1..last {
            let a = self.step_action(tree, task, i);
            let start = self.time[start_point(i) as usize];
            makespan = makespan.max(start + self.duration[i]);
            if !a.name.starts_with('#') {
                steps.push(TimedStep {
                    step: i,
                    name: a.name.clone(),
                    start,
                    duration: self.duration[i],
                });
            }
        }
        steps.sort_by(|a, b| a.start.total_cmp(&b.start));
        Some((steps, makespan))
    }
}
