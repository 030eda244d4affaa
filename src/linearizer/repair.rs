use super::{Linearizer, ScheduleQueue, ScheduledPoint};
use crate::encoding::{is_start, step_of, TimePoint, EPSILON};
use crate::plan::PlanTree;
use crate::state::State;
use crate::task::{Action, NumericCondition, NumericEffect, Task};

/// Outcome of one pass over the schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Repair {
    Invalid,
    /// Times were moved; run the pass again from the initial state.
    Repeat,
    Done { unsatisfied: bool },
}

/// Bookkeeping shared by both repair passes.
#[derive(Default)]
struct Pending {
    unsatisfied: Vec<TimePoint>,
    already_delayed: Vec<TimePoint>,
}

impl Linearizer {
    fn check_fixed_ends(&self, tree: &PlanTree) -> bool {
        for i in 2..self.time.len() {
            let tp = i as TimePoint;
            let Some(fixed) = tree.get(self.step_plan(step_of(tp))).fixed_end else {
                continue;
            };
            let valid = if is_start(tp) {
                self.time[i] < 1.5 * EPSILON
            } else {
                (self.time[i] - fixed - EPSILON).abs() < EPSILON
            };
            if !valid {
                return false;
            }
        }
        true
    }

    fn numeric_conditions_hold(&self, tp: TimePoint, a: &Action, state: &State, duration: f64) -> bool {
        let point_cond = if is_start(tp) { &a.start_num_cond } else { &a.end_num_cond };
        point_cond
            .iter()
            .chain(a.over_num_cond.iter())
            .all(|c| c.holds(&state.numbers, duration))
    }

    /// Moves every queued point ordered after `tp` to the unsatisfied list.
    fn postpone(&self, tp: TimePoint, queue: &mut ScheduleQueue, pending: &mut Pending) {
        pending.unsatisfied.push(tp);
        let later: Vec<ScheduledPoint> = queue
            .iter()
            .filter(|q| self.exist_order(tp, q.point))
            .copied()
            .collect();
        for q in later {
            queue.remove(&q);
            pending.unsatisfied.push(q.point);
        }
    }

    /// A start scheduled too early for its end is moved later. `None` when
    /// the start has no slack.
    fn close_slack(
        &mut self,
        tree: &PlanTree,
        tp: TimePoint,
        duration: f64,
        order: &mut [TimePoint],
    ) -> Option<Repair> {
        let t = tp as usize;
        if !is_start(tp) || self.time[t + 1] - self.time[t] < duration + EPSILON {
            return None;
        }
        if tree.get(self.step_plan(step_of(tp))).fixed_end.is_some() {
            return Some(Repair::Invalid);
        }
        self.time[t] = self.time[t + 1] - duration;
        if self.check_topological_order(tp, order) {
            Some(Repair::Invalid)
        } else {
            Some(Repair::Repeat)
        }
    }

    pub(super) fn fix_scheduled_times(
        &mut self,
        tree: &PlanTree,
        task: &Task,
        state: &mut State,
        order: &mut [TimePoint],
    ) -> Repair {
        if !self.check_fixed_ends(tree) {
            return Repair::Invalid;
        }
        let mut queue = self.schedule_queue(self.time.len());
        let mut pending = Pending::default();
        while let Some(sp) = queue.pop_first() {
            let tp = sp.point;
            let step = step_of(tp);
            let a = self.step_action(tree, task, step);
            let duration = self.duration[step];
            if let Some(res) = self.close_slack(tree, tp, duration, order) {
                return res;
            }
            if !self.numeric_conditions_hold(tp, a, state, duration) {
                self.postpone(tp, &mut queue, &mut pending);
                continue;
            }
            self.apply_point(tp, a, state, duration);
            if !pending.unsatisfied.is_empty() {
                if pending.unsatisfied.iter().any(|u| self.exist_order(*u, tp)) {
                    return Repair::Invalid;
                }
                self.check_unsatisfied_conditions(tree, task, state, sp.time + EPSILON, &mut queue, &mut pending);
            }
        }
        Repair::Done {
            unsatisfied: !pending.unsatisfied.is_empty(),
        }
    }

    /// Stricter pass for plans ending in a goal: durations are recomputed on
    /// the evolving state, and points interfering on numeric variables must
    /// not share a time.
    pub(super) fn fix_scheduled_times_for_goal(
        &mut self,
        tree: &PlanTree,
        task: &Task,
        state: &mut State,
        order: &mut [TimePoint],
    ) -> Repair {
        if !self.check_fixed_ends(tree) {
            return Repair::Invalid;
        }
        let n = self.time.len();
        let mut queue = self.schedule_queue(n);
        let mut pending = Pending::default();
        let mut same_time: Vec<TimePoint> = Vec::new();
        let mut current_time = -1.0;
        while let Some(mut sp) = queue.pop_first() {
            let tp = sp.point;
            let t = tp as usize;
            let step = step_of(tp);
            let a = self.step_action(tree, task, step);
            if is_start(tp) {
                let duration = task.action_duration(a, &state.numbers);
                if (duration - self.duration[step]).abs() > EPSILON / 2.0 {
                    self.duration[step] = duration;
                    self.time[t + 1] = self.time[t] + duration;
                    self.push_successors_later(tp + 1, n);
                    return Repair::Repeat;
                }
            }
            let duration = self.duration[step];
            if let Some(res) = self.close_slack(tree, tp, duration, order) {
                return res;
            }
            if (sp.time - current_time).abs() < EPSILON / 2.0 {
                if same_time.iter().any(|p| self.check_numeric_mutex(tree, task, *p, tp)) {
                    if is_start(tp) {
                        self.time[t] += EPSILON;
                        if self.delay_time_points(&mut sp, &mut queue) {
                            continue;
                        }
                        return Repair::Repeat;
                    }
                    self.time[t - 1] += EPSILON;
                    for j in 2..n {
                        if self.exist_order(tp - 1, j as TimePoint) {
                            self.time[j] += EPSILON;
                        }
                    }
                    return Repair::Repeat;
                }
            } else {
                current_time = sp.time;
                same_time.clear();
            }
            if !self.numeric_conditions_hold(tp, a, state, duration) {
                self.postpone(tp, &mut queue, &mut pending);
                continue;
            }
            same_time.push(tp);
            self.apply_point(tp, a, state, duration);
            if !pending.unsatisfied.is_empty() {
                self.check_unsatisfied_conditions(tree, task, state, sp.time + EPSILON, &mut queue, &mut pending);
            }
        }
        if !self.check_valid_initial_schedule(n) {
            return Repair::Invalid;
        }
        Repair::Done {
            unsatisfied: !pending.unsatisfied.is_empty(),
        }
    }

    /// Every point ordered after `from` starts at least `EPSILON` after it.
    fn push_successors_later(&mut self, from: TimePoint, n: usize) {
        let mut work = vec![from];
        while let Some(p) = work.pop() {
            for j in 2..n {
                let q = j as TimePoint;
                if self.exist_order(p, q) && self.time[j] < self.time[p as usize] + EPSILON {
                    self.time[j] = self.time[p as usize] + EPSILON;
                    work.push(q);
                }
            }
        }
    }

    /// Requeues the postponed points whose conditions hold now, delaying them
    /// to `current_time`. Later postponed points move by the same delay.
    fn check_unsatisfied_conditions(
        &mut self,
        tree: &PlanTree,
        task: &Task,
        state: &State,
        current_time: f64,
        queue: &mut ScheduleQueue,
        pending: &mut Pending,
    ) {
        let mut i = 0;
        while i < pending.unsatisfied.len() {
            let tp = pending.unsatisfied[i];
            let blocked = pending
                .unsatisfied
                .iter()
                .any(|u| *u != tp && self.exist_order(*u, tp));
            let step = step_of(tp);
            let a = self.step_action(tree, task, step);
            if blocked || !self.numeric_conditions_hold(tp, a, state, self.duration[step]) {
                i += 1;
                continue;
            }
            pending.unsatisfied.remove(i);
            let t = tp as usize;
            if !pending.already_delayed.contains(&tp) {
                let delay = (current_time - self.time[t]).max(0.0);
                self.time[t] += delay;
                for u in &pending.unsatisfied {
                    if self.exist_order(tp, *u) {
                        self.time[*u as usize] += delay;
                        if !pending.already_delayed.contains(u) {
                            pending.already_delayed.push(*u);
                        }
                    }
                }
            }
            queue.insert(ScheduledPoint {
                time: self.time[t],
                point: tp,
            });
        }
    }

    /// Shifts `sp` to its updated time and every queued point ordered after
    /// it by the same amount. False if some action got stretched beyond its
    /// duration.
    fn delay_time_points(&mut self, sp: &mut ScheduledPoint, queue: &mut ScheduleQueue) -> bool {
        let tp = sp.point;
        let delay = self.time[tp as usize] - sp.time;
        sp.time = self.time[tp as usize];
        let mut valid = true;
        let points: Vec<ScheduledPoint> = std::mem::take(queue).into_iter().collect();
        for mut q in points {
            if self.exist_order(tp, q.point) {
                let j = q.point as usize;
                self.time[j] += delay;
                q.time = self.time[j];
                if !is_start(q.point)
                    && self.time[j] > self.time[j - 1] + self.duration[step_of(q.point)] + EPSILON
                {
                    valid = false;
                }
            }
            queue.insert(q);
        }
        queue.insert(*sp);
        valid
    }

    /// Moves `tp` back in the linear order past points scheduled later. True
    /// if that crosses an existing ordering.
    pub(super) fn check_topological_order(&self, tp: TimePoint, order: &mut [TimePoint]) -> bool {
        let Some(mut i) = order.iter().position(|p| *p == tp) else {
            return false;
        };
        let time = self.time[tp as usize];
        while i > 2 {
            let prev = order[i - 1];
            if self.time[prev as usize] <= time {
                break;
            }
            if self.exist_order(prev, tp) {
                return true;
            }
            order.swap(i - 1, i);
            i -= 1;
        }
        false
    }

    /// Two points interfere when they touch the same numeric variable and
    /// at least one of them writes it.
    pub(super) fn check_numeric_mutex(&self, tree: &PlanTree, task: &Task, p1: TimePoint, p2: TimePoint) -> bool {
        let a1 = self.step_action(tree, task, step_of(p1));
        let a2 = self.step_action(tree, task, step_of(p2));
        let (e1, c1) = numeric_parts(p1, a1);
        let (e2, c2) = numeric_parts(p2, a2);
        let written1: Vec<usize> = e1.iter().map(|e| e.var).collect();
        let written2: Vec<usize> = e2.iter().map(|e| e.var).collect();
        if written1.iter().any(|v| written2.contains(v)) {
            return true;
        }
        let reads = |conds: &[NumericCondition], written: &[usize]| {
            let mut vars = Vec::new();
            for c in conds {
                c.collect_vars(&mut vars);
            }
            vars.iter().any(|v| written.contains(v))
        };
        reads(c1, &written2) || reads(c2, &written1)
    }
}

fn numeric_parts(tp: TimePoint, a: &Action) -> (&[NumericEffect], &[NumericCondition]) {
    if is_start(tp) {
        (&a.start_num_eff, &a.start_num_cond)
    } else {
        (&a.end_num_eff, &a.end_num_cond)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::{end_point, start_point, EPSILON};
    use crate::plan::Plan;
    use crate::task::{
        ActionId, Assignment, Comparator, Condition, Duration, NumericExpression, OBJECT_FALSE,
        OBJECT_TRUE,
    };
    use crate::testing::binary_var;

    /// `refuel` adds 5 fuel at its end, `burn` needs 4 fuel to start.
    fn fuel_task() -> Task {
        let mut task = Task::new();
        let done = binary_var(&mut task, "done", OBJECT_FALSE);
        let fuel = task.create_numeric_variable("fuel");
        task.add_numeric_initial_value(fuel, 0.0, 0.0).unwrap();
        let refuel = task.create_action("refuel");
        refuel.duration = vec![Duration::fixed(2.0)];
        refuel.end_num_eff.push(NumericEffect {
            op: Assignment::Increase,
            var: fuel,
            exp: NumericExpression::Number(5.0),
        });
        let burn = task.create_action("burn");
        burn.duration = vec![Duration::fixed(1.0)];
        burn.start_num_cond.push(NumericCondition {
            comp: Comparator::GreaterEq,
            lhs: NumericExpression::Var(fuel),
            rhs: NumericExpression::Number(4.0),
        });
        burn.end_num_eff.push(NumericEffect {
            op: Assignment::Decrease,
            var: fuel,
            exp: NumericExpression::Number(4.0),
        });
        burn.end_eff.push(Condition::new(done, OBJECT_TRUE));
        task.create_goal().start_cond.push(Condition::new(done, OBJECT_TRUE));
        task.finalize().unwrap();
        task
    }

    fn initial(task: &Task) -> Action {
        let mut initial = Action {
            name: "#initial".to_string(),
            duration: vec![Duration::fixed(EPSILON)],
            ..Action::default()
        };
        for (var, value) in task.initial_state.iter().enumerate() {
            initial.end_eff.push(Condition::new(var, *value as usize));
        }
        initial
    }

    #[test]
    fn test_unsatisfied_numeric_condition_is_delayed() {
        let task = fuel_task();
        let mut tree = PlanTree::new(initial(&task));
        let refuel = Plan::new(ActionId::Task(0), Some(tree.get(tree.root())));
        let refuel = tree.push(refuel);
        let burn = Plan::new(ActionId::Task(1), Some(tree.get(refuel)));
        let burn = tree.push(burn);
        let mut lin = Linearizer::new(State::initial(&task));
        lin.set_current_base_plan(&tree, burn);
        let res = lin.frontier_state(&tree, &task, None).unwrap();
        // burn waits until refuel has finished.
        assert!(!res.unsatisfied_numeric_conditions);
        assert!(lin.time(start_point(2)) > lin.time(end_point(1)));
        assert_eq!(res.state.numbers, vec![1.0]);
        assert!(res.state.holds(&Condition::new(0, OBJECT_TRUE)));
    }

    #[test]
    fn test_never_satisfied_condition_is_reported() {
        let task = fuel_task();
        let tree_initial = initial(&task);
        let mut tree = PlanTree::new(tree_initial);
        let burn = Plan::new(ActionId::Task(1), Some(tree.get(tree.root())));
        let burn = tree.push(burn);
        let mut lin = Linearizer::new(State::initial(&task));
        lin.set_current_base_plan(&tree, burn);
        let res = lin.frontier_state(&tree, &task, None).unwrap();
        assert!(res.unsatisfied_numeric_conditions);
        assert_eq!(res.state.numbers, vec![0.0]);
    }

    #[test]
    fn test_numeric_mutex_detection() {
        let task = fuel_task();
        let mut tree = PlanTree::new(initial(&task));
        let refuel = Plan::new(ActionId::Task(0), Some(tree.get(tree.root())));
        let refuel = tree.push(refuel);
        let burn = Plan::new(ActionId::Task(1), Some(tree.get(refuel)));
        let burn = tree.push(burn);
        let mut lin = Linearizer::new(State::initial(&task));
        lin.set_current_base_plan(&tree, burn);
        // Both ends write fuel; the burn start reads what refuel writes.
        assert!(lin.check_numeric_mutex(&tree, &task, end_point(1), end_point(2)));
        assert!(lin.check_numeric_mutex(&tree, &task, end_point(1), start_point(2)));
        assert!(!lin.check_numeric_mutex(&tree, &task, start_point(1), start_point(2)));
    }
}
