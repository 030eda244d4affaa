use super::model::{Action, Condition, Task};
use crate::encoding::{action_pair_code, mutex_code, var_of, value_of, var_value, VarValue};

use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::debug;

impl Task {
    /// Facts that, once achieved, can never coexist with a mutex partner
    /// again, and the action pairs that such facts forbid in either order.
    pub(super) fn compute_permanent_mutex(&mut self) {
        self.permanent_mutex.clear();
        self.permanent_mutex_actions.clear();

        let mut mutex_with: BTreeMap<VarValue, Vec<VarValue>> = BTreeMap::new();
        for code in &self.mutex {
            let vv1 = (code >> 32) as VarValue;
            let vv2 = (code & 0xFFFF_FFFF) as VarValue;
            mutex_with.entry(vv1).or_default().push(vv2);
        }

        for (vv, partners) in &mutex_with {
            let mut pending: BTreeSet<VarValue> = partners.iter().copied().collect();
            self.check_reachability(*vv, &mut pending);
            for unreached in pending {
                self.permanent_mutex.insert(mutex_code(*vv, unreached));
            }
        }

        if self.permanent_mutex.is_empty() {
            return;
        }
        for i in 0..self.actions.len() {
            for j in i + 1..self.actions.len() {
                if self.check_action_mutex(&self.actions[i], &self.actions[j]) {
                    self.permanent_mutex_actions.insert(action_pair_code(i, j));
                    self.permanent_mutex_actions.insert(action_pair_code(j, i));
                }
            }
        }
        debug!(
            "permanent mutex: {} facts, {} action pairs",
            self.permanent_mutex.len(),
            self.permanent_mutex_actions.len() / 2
        );
    }

    /// Delete-free forward exploration from `vv` that erases every target it
    /// reaches.
    fn check_reachability(&self, vv: VarValue, targets: &mut BTreeSet<VarValue>) {
        let mut visited_actions = vec![false; self.actions.len()];
        let mut visited: HashSet<VarValue> = HashSet::new();
        let mut queue = vec![vv];
        visited.insert(vv);
        let mut next = 0;
        while next < queue.len() && !targets.is_empty() {
            let current = queue[next];
            next += 1;
            for &a in &self.requirers[var_of(current)][value_of(current)] {
                if visited_actions[a] {
                    continue;
                }
                visited_actions[a] = true;
                for e in self.actions[a].all_effects() {
                    let code = e.code();
                    targets.remove(&code);
                    if visited.insert(code) {
                        queue.push(code);
                    }
                }
            }
        }
    }

    fn check_action_mutex(&self, a1: &Action, a2: &Action) -> bool {
        self.check_action_ordering(a1, a2) && self.check_action_ordering(a2, a1)
    }

    /// Some effect of `a1` is permanently mutex with a condition of `a2`.
    fn check_action_ordering(&self, a1: &Action, a2: &Action) -> bool {
        a1.all_effects().any(|e| {
            a2.all_conditions()
                .any(|c| self.is_permanent_mutex(e.var, e.value, c.var, c.value))
        })
    }

    pub fn is_permanent_mutex(&self, var1: usize, value1: usize, var2: usize, value2: usize) -> bool {
        self.permanent_mutex
            .contains(&mutex_code(var_value(var1, value1), var_value(var2, value2)))
    }

    pub fn is_permanent_mutex_condition(&self, c1: &Condition, c2: &Condition) -> bool {
        self.is_permanent_mutex(c1.var, c1.value, c2.var, c2.value)
    }

    pub fn is_permanent_mutex_action(&self, a1: usize, a2: usize) -> bool {
        self.permanent_mutex_actions.contains(&action_pair_code(a1, a2))
    }

    pub fn has_permanent_mutex_action(&self) -> bool {
        !self.permanent_mutex_actions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use crate::task::{OBJECT_FALSE, OBJECT_TRUE};
    use crate::testing::irreversible_task;

    #[test]
    fn test_permanent_mutex_facts() {
        let task = irreversible_task();
        assert!(task.is_mutex(0, OBJECT_TRUE, 0, OBJECT_FALSE));
        // fuel=false never leads back to fuel=true.
        assert!(task.is_permanent_mutex(0, OBJECT_FALSE, 0, OBJECT_TRUE));
        // fuel=true reaches fuel=false through burn.
        assert!(!task.is_permanent_mutex(0, OBJECT_TRUE, 0, OBJECT_FALSE));
    }

    #[test]
    fn test_permanent_mutex_actions() {
        let task = irreversible_task();
        assert!(task.has_permanent_mutex_action());
        assert!(task.is_permanent_mutex_action(0, 1));
        assert!(task.is_permanent_mutex_action(1, 0));
    }
}
