use crate::encoding::{value_of, var_of, var_value, VarValue, H_INFINITY, UNREACHED};
use crate::state::State;
use crate::task::{Action, Condition, Task};

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use tracing::trace;

/// Open condition of the relaxed-plan extraction; the highest level pops
/// first.
#[derive(Debug, PartialEq, Eq)]
struct OpenCondition {
    level: i32,
    vv: VarValue,
}

impl Ord for OpenCondition {
    fn cmp(&self, other: &Self) -> Ordering {
        self.level
            .cmp(&other.level)
            .then_with(|| other.vv.cmp(&self.vv))
    }
}

impl PartialOrd for OpenCondition {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Delete-relaxed planning graph and the FF heuristic computed on it.
pub struct Rpg<'a> {
    task: &'a Task,
    force_at_end: bool,
    literal_levels: Vec<Vec<i32>>,
    action_levels: Vec<i32>,
    num_levels: i32,
    /// Literals marked during the last extraction; their levels are negated
    /// until the next reset.
    reached_values: Vec<VarValue>,
    pub relaxed_plan: Vec<usize>,
}

impl<'a> Rpg<'a> {
    fn empty(task: &'a Task, force_at_end: bool) -> Self {
        Rpg {
            task,
            force_at_end,
            literal_levels: vec![vec![UNREACHED; task.values.len()]; task.variables.len()],
            action_levels: vec![UNREACHED; task.actions.len()],
            num_levels: 0,
            reached_values: Vec::new(),
            relaxed_plan: Vec::new(),
        }
    }

    /// Graph seeded with the literals of `state` and the effects of the timed
    /// initial literals.
    pub fn from_state(state: &State, task: &'a Task, force_at_end: bool, tils: &[Action]) -> Self {
        let mut rpg = Rpg::empty(task, force_at_end);
        let mut last_level = Vec::with_capacity(state.values.len());
        for (var, value) in state.values.iter().enumerate() {
            rpg.literal_levels[var][*value as usize] = 0;
            last_level.push(var_value(var, *value as usize));
        }
        rpg.add_til_actions(tils, &mut last_level);
        rpg.expand(last_level);
        rpg
    }

    /// Graph seeded with every value listed for each variable.
    pub fn from_values(var_values: &[Vec<usize>], task: &'a Task, force_at_end: bool, tils: &[Action]) -> Self {
        let mut rpg = Rpg::empty(task, force_at_end);
        let mut last_level = Vec::new();
        for (var, values) in var_values.iter().enumerate() {
            for value in values {
                if rpg.literal_levels[var][*value] != 0 {
                    rpg.literal_levels[var][*value] = 0;
                    last_level.push(var_value(var, *value));
                }
            }
        }
        rpg.add_til_actions(tils, &mut last_level);
        rpg.expand(last_level);
        rpg
    }

    fn add_til_actions(&mut self, tils: &[Action], last_level: &mut Vec<VarValue>) {
        for e in tils.iter().flat_map(|a| a.end_eff.iter()) {
            if self.literal_levels[e.var][e.value] != 0 {
                self.literal_levels[e.var][e.value] = 0;
                last_level.push(e.code());
            }
        }
    }

    fn expand(&mut self, mut last_level: Vec<VarValue>) {
        let task = self.task;
        let mut new_level: Vec<VarValue> = Vec::new();
        self.num_levels = 0;
        while !last_level.is_empty() {
            new_level.clear();
            for vv in &last_level {
                for &a in task.requirers(var_of(*vv), value_of(*vv)) {
                    if self.action_levels[a] == UNREACHED && self.is_executable(&task.actions[a]) {
                        self.action_levels[a] = self.num_levels;
                        self.add_effects(&task.actions[a], &mut new_level);
                    }
                }
            }
            if self.num_levels == 0 {
                for &a in &task.actions_without_conditions {
                    self.action_levels[a] = 0;
                    self.add_effects(&task.actions[a], &mut new_level);
                }
            }
            self.num_levels += 1;
            for vv in &new_level {
                self.literal_levels[var_of(*vv)][value_of(*vv)] = self.num_levels;
            }
            std::mem::swap(&mut last_level, &mut new_level);
        }
        trace!("relaxed graph expanded to {} levels", self.num_levels);
    }

    fn add_effects(&self, a: &Action, new_level: &mut Vec<VarValue>) {
        for e in a.all_effects() {
            if self.literal_levels[e.var][e.value] == UNREACHED {
                let vv = e.code();
                if !new_level.contains(&vv) {
                    new_level.push(vv);
                }
            }
        }
    }

    /// Start and over-all conditions are reached, and end conditions as well
    /// when they are forced.
    pub fn is_executable(&self, a: &Action) -> bool {
        let reached = |c: &Condition| self.literal_levels[c.var][c.value] != UNREACHED;
        a.start_cond.iter().all(reached)
            && a.over_cond.iter().all(reached)
            && (!self.force_at_end || a.end_cond.iter().all(reached))
    }

    pub fn is_reachable(&self, var: usize, value: usize) -> bool {
        self.literal_levels[var][value] != UNREACHED
    }

    pub fn literal_level(&self, var: usize, value: usize) -> i32 {
        self.literal_levels[var][value]
    }

    pub fn action_level(&self, action: usize) -> i32 {
        self.action_levels[action]
    }

    pub fn num_levels(&self) -> i32 {
        self.num_levels
    }

    fn reset_reached_values(&mut self) {
        for vv in self.reached_values.drain(..) {
            let level = &mut self.literal_levels[var_of(vv)][value_of(vv)];
            if *level < 0 {
                *level = -*level;
            }
        }
        self.relaxed_plan.clear();
    }

    /// FF heuristic of the task goals.
    pub fn evaluate(&mut self, mutex: bool) -> u16 {
        let task = self.task;
        self.evaluate_goals(task.goal_list(), mutex)
    }

    pub fn evaluate_one(&mut self, goal: VarValue, mutex: bool) -> u16 {
        self.evaluate_goals(&[goal], mutex)
    }

    pub fn evaluate_goals(&mut self, goals: &[VarValue], mutex: bool) -> u16 {
        self.reset_reached_values();
        let mut open = BinaryHeap::with_capacity(128);
        for vv in goals {
            self.add_subgoal(var_of(*vv), value_of(*vv), &mut open);
        }
        self.compute_heuristic(mutex, &mut open)
    }

    fn add_subgoal(&self, var: usize, value: usize, open: &mut BinaryHeap<OpenCondition>) {
        let level = self.literal_levels[var][value];
        if level > 0 {
            open.push(OpenCondition {
                level,
                vv: var_value(var, value),
            });
        }
    }

    fn add_action_subgoals(&self, a: &Action, open: &mut BinaryHeap<OpenCondition>) {
        for c in a.start_cond.iter().chain(a.over_cond.iter()) {
            self.add_subgoal(c.var, c.value, open);
        }
        if self.force_at_end {
            for c in &a.end_cond {
                self.add_subgoal(c.var, c.value, open);
            }
        }
    }

    fn compute_heuristic(&mut self, mutex: bool, open: &mut BinaryHeap<OpenCondition>) -> u16 {
        let task = self.task;
        let mut h: u16 = 0;
        while let Some(g) = open.pop() {
            let (var, value) = (var_of(g.vv), value_of(g.vv));
            let g_level = self.literal_levels[var][value];
            if g_level <= 0 {
                continue;
            }
            if g_level == UNREACHED {
                return H_INFINITY;
            }
            self.literal_levels[var][value] = -g_level;
            self.reached_values.push(g.vv);

            let mut best: Option<(usize, u32)> = None;
            for &a in task.producers(var, value) {
                if g_level != self.action_levels[a].saturating_add(1) {
                    continue;
                }
                let cost = if mutex {
                    self.difficulty_with_permanent_mutex(a)
                } else {
                    self.difficulty(&task.actions[a])
                };
                if best.map_or(true, |(_, best_cost)| cost < best_cost) {
                    best = Some((a, cost));
                    if cost == 0 {
                        break;
                    }
                }
            }
            let Some((best_action, _)) = best else {
                return H_INFINITY;
            };
            h = h.saturating_add(1).min(H_INFINITY - 1);
            self.relaxed_plan.push(best_action);
            self.add_action_subgoals(&task.actions[best_action], open);
        }
        h
    }

    fn condition_difficulty(&self, c: &Condition) -> u32 {
        self.literal_levels[c.var][c.value].max(0) as u32
    }

    fn difficulty(&self, a: &Action) -> u32 {
        let mut cost: u32 = a
            .start_cond
            .iter()
            .chain(a.over_cond.iter())
            .map(|c| self.condition_difficulty(c))
            .fold(0, u32::saturating_add);
        if self.force_at_end {
            cost = a
                .end_cond
                .iter()
                .map(|c| self.condition_difficulty(c))
                .fold(cost, u32::saturating_add);
        }
        cost
    }

    fn difficulty_with_permanent_mutex(&self, a: usize) -> u32 {
        if self
            .relaxed_plan
            .iter()
            .any(|b| self.task.is_permanent_mutex_action(a, *b))
        {
            return H_INFINITY as u32;
        }
        self.difficulty(&self.task.actions[a])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{chain_task, unreachable_task};

    #[test]
    fn test_levels_and_heuristic_on_chain() {
        let task = chain_task(3);
        let state = State::initial(&task);
        let mut rpg = Rpg::from_state(&state, &task, true, &[]);
        assert_eq!(rpg.literal_level(0, 0), 0);
        assert_eq!(rpg.action_level(0), 0);
        assert_eq!(rpg.action_level(2), 2);
        assert_eq!(rpg.evaluate(false), 3);
        assert_eq!(rpg.relaxed_plan.len(), 3);
        // Repeated evaluation resets the marks left by the previous one.
        assert_eq!(rpg.evaluate(false), 3);
    }

    #[test]
    fn test_goal_in_state_costs_nothing() {
        let task = chain_task(2);
        let mut state = State::initial(&task);
        let last = task.variables.len() - 1;
        state.set_value(last, crate::task::OBJECT_TRUE);
        let mut rpg = Rpg::from_state(&state, &task, true, &[]);
        assert_eq!(rpg.evaluate(false), 0);
    }

    #[test]
    fn test_unreachable_goal_reports_infinity() {
        let task = unreachable_task();
        let state = State::initial(&task);
        let mut rpg = Rpg::from_state(&state, &task, true, &[]);
        assert!(!rpg.is_reachable(0, crate::task::OBJECT_TRUE));
        assert_eq!(rpg.evaluate(false), H_INFINITY);
        assert_eq!(rpg.evaluate(true), H_INFINITY);
    }

    #[test]
    fn test_removing_an_action_never_lowers_h() {
        let full = chain_task(3);
        let mut pruned = full.clone();
        // Drop the middle step: the goal becomes unreachable.
        pruned.requirers[1][crate::task::OBJECT_TRUE].clear();
        pruned.producers[2][crate::task::OBJECT_TRUE].clear();
        let h_full = Rpg::from_state(&State::initial(&full), &full, true, &[]).evaluate(false);
        let h_pruned =
            Rpg::from_state(&State::initial(&pruned), &pruned, true, &[]).evaluate(false);
        assert!(h_pruned >= h_full);
        assert_eq!(h_pruned, H_INFINITY);
    }
}
