use crate::encoding::{value_of, var_of, var_value, VarValue, EPSILON};
use crate::state::State;
use crate::task::{Action, Task};

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use tracing::trace;

#[derive(Debug, PartialEq)]
struct FluentLevel {
    vv: VarValue,
    level: f64,
}

impl Eq for FluentLevel {}

// Min-heap on the generation time.
impl Ord for FluentLevel {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .level
            .total_cmp(&self.level)
            .then_with(|| other.vv.cmp(&self.vv))
    }
}

impl PartialOrd for FluentLevel {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Fact of the temporal graph, with the actions that reach it earlier.
#[derive(Debug, Clone)]
pub struct LmFluent {
    pub var: usize,
    pub value: usize,
    pub level: f64,
    pub index: usize,
    pub is_goal: bool,
    pub producers: Vec<usize>,
}

impl LmFluent {
    pub fn code(&self) -> VarValue {
        var_value(self.var, self.value)
    }
}

/// Delete-relaxed graph whose levels are the earliest generation times of
/// each fact, taking action durations into account.
pub struct TemporalRpg<'a> {
    task: &'a Task,
    tils: &'a [Action],
    first_generation_time: HashMap<VarValue, f64>,
    queue: BinaryHeap<FluentLevel>,
    visited_action: Vec<bool>,
    fluent_list: Vec<LmFluent>,
    fluent_index: HashMap<VarValue, usize>,
    fluent_levels: Vec<Vec<VarValue>>,
    level_times: Vec<f64>,
    action_levels: Vec<f64>,
}

impl<'a> TemporalRpg<'a> {
    pub fn new(task: &'a Task, tils: &'a [Action]) -> Self {
        TemporalRpg {
            task,
            tils,
            first_generation_time: HashMap::new(),
            queue: BinaryHeap::new(),
            visited_action: vec![false; task.actions.len()],
            fluent_list: Vec::new(),
            fluent_index: HashMap::new(),
            fluent_levels: Vec::new(),
            level_times: Vec::new(),
            action_levels: Vec::new(),
        }
    }

    /// Builds the graph from `state` and computes the literal and action
    /// levels.
    pub fn explore(task: &'a Task, tils: &'a [Action], state: &State) -> Self {
        let mut rpg = TemporalRpg::new(task, tils);
        rpg.build(state);
        rpg.compute_literal_levels();
        rpg.compute_action_levels(state);
        rpg
    }

    fn first_generation_time(&self, var: usize, value: usize) -> Option<f64> {
        self.first_generation_time.get(&var_value(var, value)).copied()
    }

    fn program(&mut self, vv: VarValue, level: f64) {
        self.first_generation_time.insert(vv, level);
        self.queue.push(FluentLevel { vv, level });
    }

    /// Earliest generation time of every fact reachable from `state`.
    pub fn build(&mut self, state: &State) {
        self.init(state);
        let task = self.task;
        while let Some(fl) = self.queue.pop() {
            for &a in task.requirers(var_of(fl.vv), value_of(fl.vv)) {
                if self.visited_action[a] {
                    continue;
                }
                let action = &task.actions[a];
                let applicable = action
                    .start_cond
                    .iter()
                    .chain(action.over_cond.iter())
                    .all(|c| {
                        self.first_generation_time(c.var, c.value)
                            .is_some_and(|t| t <= fl.level)
                    });
                if !applicable {
                    continue;
                }
                self.visited_action[a] = true;
                let start_level = fl.level + EPSILON;
                for e in &action.start_eff {
                    if self
                        .first_generation_time(e.var, e.value)
                        .map_or(true, |t| t > start_level)
                    {
                        self.program(e.code(), start_level);
                    }
                }
                let end_level = start_level + task.action_duration(action, &state.numbers);
                for e in &action.end_eff {
                    if self
                        .first_generation_time(e.var, e.value)
                        .map_or(true, |t| t > end_level)
                    {
                        self.program(e.code(), end_level);
                    }
                }
            }
        }
        trace!(
            "temporal graph reached {} facts",
            self.first_generation_time.len()
        );
    }

    fn init(&mut self, state: &State) {
        for (var, value) in state.values.iter().enumerate() {
            self.first_generation_time
                .insert(var_value(var, *value as usize), 0.0);
        }
        let task = self.task;
        for action in &task.actions {
            if !self.visited_action[action.index] {
                self.program_action(action, state, true);
            }
        }
        for til in self.tils {
            self.program_action(til, state, false);
        }
    }

    /// Programs the effects of an action applicable in `state` at their
    /// earliest times.
    fn program_action(&mut self, action: &Action, state: &State, mark: bool) {
        let applicable = action
            .start_cond
            .iter()
            .chain(action.over_cond.iter())
            .all(|c| state.holds(c));
        if !applicable {
            return;
        }
        if mark {
            self.visited_action[action.index] = true;
        }
        for e in &action.start_eff {
            if self.first_generation_time(e.var, e.value).is_none() {
                self.program(e.code(), EPSILON);
            }
        }
        let end_level = EPSILON + self.task.action_duration(action, &state.numbers);
        for e in &action.end_eff {
            if self.first_generation_time(e.var, e.value).is_none() {
                self.program(e.code(), end_level);
            }
        }
    }

    /// Groups the reached facts by generation time, in ascending order.
    pub fn compute_literal_levels(&mut self) {
        self.queue.clear();
        let mut reached: Vec<(VarValue, f64)> = self
            .first_generation_time
            .iter()
            .map(|(vv, t)| (*vv, *t))
            .collect();
        reached.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));

        self.fluent_list.clear();
        self.fluent_index.clear();
        self.fluent_levels.clear();
        self.level_times.clear();
        for (index, (vv, level)) in reached.into_iter().enumerate() {
            self.fluent_list.push(LmFluent {
                var: var_of(vv),
                value: value_of(vv),
                level,
                index,
                is_goal: false,
                producers: Vec::new(),
            });
            self.fluent_index.insert(vv, index);
            if self.level_times.last().map_or(true, |t| level > *t) {
                self.level_times.push(level);
                self.fluent_levels.push(Vec::new());
            }
            if let Some(group) = self.fluent_levels.last_mut() {
                group.push(vv);
            }
        }
    }

    /// Earliest start of every action and, for each fact, the producers
    /// that start strictly before the fact is first reached.
    pub fn compute_action_levels(&mut self, state: &State) {
        let task = self.task;
        self.action_levels = task
            .actions
            .iter()
            .map(|a| self.earliest_start(a, state).unwrap_or(-1.0))
            .collect();
        for f in &mut self.fluent_list {
            f.producers = task
                .producers(f.var, f.value)
                .iter()
                .copied()
                .filter(|a| {
                    let level = self.action_levels[*a];
                    level >= 0.0 && level < f.level
                })
                .collect();
        }
    }

    fn earliest_start(&self, action: &Action, state: &State) -> Option<f64> {
        let mut res: f64 = 0.0;
        for c in action.start_cond.iter().chain(action.over_cond.iter()) {
            res = res.max(self.first_generation_time(c.var, c.value)?);
        }
        let duration = self.task.action_duration(action, &state.numbers);
        for c in &action.end_cond {
            res = res.max(self.first_generation_time(c.var, c.value)? - duration);
        }
        Some(res)
    }

    /// Earliest start time of `action`, or a negative value if unreachable.
    pub fn action_level(&self, action: usize) -> f64 {
        self.action_levels[action]
    }

    pub fn fluent_index(&self, var: usize, value: usize) -> Option<usize> {
        self.fluent_index.get(&var_value(var, value)).copied()
    }

    pub fn fluent(&self, index: usize) -> &LmFluent {
        &self.fluent_list[index]
    }

    pub fn fluent_mut(&mut self, index: usize) -> &mut LmFluent {
        &mut self.fluent_list[index]
    }

    pub fn num_fluents(&self) -> usize {
        self.fluent_list.len()
    }

    pub fn num_levels(&self) -> usize {
        self.fluent_levels.len()
    }

    /// Position of the level with generation time `time`.
    pub fn level_index(&self, time: f64) -> usize {
        self.level_times
            .binary_search_by(|t| t.total_cmp(&time))
            .unwrap_or_else(|i| i.min(self.level_times.len().saturating_sub(1)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::OBJECT_TRUE;
    use crate::testing::chain_task;

    #[test]
    fn test_generation_times_follow_durations() {
        let task = chain_task(3);
        let state = State::initial(&task);
        let rpg = TemporalRpg::explore(&task, &[], &state);
        let p1 = rpg.fluent_index(1, OBJECT_TRUE).unwrap();
        let p3 = rpg.fluent_index(3, OBJECT_TRUE).unwrap();
        assert!((rpg.fluent(p1).level - (1.0 + EPSILON)).abs() < 1e-9);
        assert!((rpg.fluent(p3).level - 3.0 * (1.0 + EPSILON)).abs() < 1e-9);
        assert_eq!(rpg.action_level(0), 0.0);
        assert!(rpg.action_level(2) > rpg.action_level(1));
    }

    #[test]
    fn test_levels_are_sorted_and_producers_precede() {
        let task = chain_task(2);
        let state = State::initial(&task);
        let rpg = TemporalRpg::explore(&task, &[], &state);
        // Initial facts share level 0; each chain step adds one level.
        assert_eq!(rpg.num_levels(), 3);
        for i in 0..rpg.num_fluents() {
            let f = rpg.fluent(i);
            assert_eq!(rpg.fluent_index(f.var, f.value), Some(i));
            for a in &f.producers {
                assert!(rpg.action_level(*a) < f.level);
            }
        }
        let p2 = rpg.fluent_index(2, OBJECT_TRUE).unwrap();
        assert_eq!(rpg.fluent(p2).producers, vec![1]);
        assert_eq!(rpg.level_index(rpg.fluent(p2).level), 2);
    }
}
