use crate::linearizer::Linearizer;
use crate::plan::{PlanId, PlanTree};
use crate::state::State;
use crate::task::Task;

use std::collections::HashMap;
use tracing::trace;

/// Frontier states seen so far, bucketed by state code. States are not
/// stored; a bucket entry is re-linearized to compare. `None` stands for
/// the initial state.
#[derive(Debug, Clone)]
pub struct Memoization {
    linearizer: Linearizer,
    initial_state: State,
    states: HashMap<u64, Vec<Option<PlanId>>>,
}

impl Memoization {
    pub fn new(initial_state: &State) -> Self {
        let mut memo = Memoization {
            linearizer: Linearizer::new(initial_state.clone()),
            initial_state: initial_state.clone(),
            states: HashMap::new(),
        };
        memo.clear();
        memo
    }

    pub fn clear(&mut self) {
        self.states.clear();
        self.states.insert(self.initial_state.code(), vec![None]);
    }

    pub fn len(&self) -> usize {
        self.states.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// True if `state`, the frontier of plan `id`, was already reached at no
    /// higher cost. A cheaper plan replaces the stored one.
    pub fn is_repeated(&mut self, task: &Task, tree: &PlanTree, id: PlanId, state: &State) -> bool {
        let code = state.code();
        let Some(bucket) = self.states.get(&code) else {
            self.states.insert(code, vec![Some(id)]);
            return false;
        };
        let gc = tree.get(id).gc;
        for (i, entry) in bucket.clone().into_iter().enumerate() {
            let same = match entry {
                None => *state == self.initial_state,
                Some(pc) => {
                    self.linearizer.set_current_base_plan(tree, pc);
                    self.linearizer.set_current_plan(None);
                    match self.linearizer.frontier_state(tree, task, None) {
                        Some(lin) => lin.state == *state,
                        None => false,
                    }
                }
            };
            if !same {
                continue;
            }
            let Some(pc) = entry else {
                trace!("plan {id} reaches the initial state again");
                return true;
            };
            if gc >= tree.get(pc).gc {
                trace!("plan {id} repeats the state of plan {pc}");
                return true;
            }
            if let Some(bucket) = self.states.get_mut(&code) {
                bucket[i] = Some(id);
            }
            return false;
        }
        if let Some(bucket) = self.states.get_mut(&code) {
            bucket.push(Some(id));
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::{end_point, start_point, var_value, EPSILON};
    use crate::plan::{CausalLink, Plan};
    use crate::task::{Action, ActionId, Condition, Duration, OBJECT_FALSE, OBJECT_TRUE};
    use crate::testing::binary_var;

    /// `on` and `off` toggle a light.
    fn toggle_task() -> Task {
        let mut task = Task::new();
        let light = binary_var(&mut task, "light", OBJECT_FALSE);
        for (name, from, to) in [("on", OBJECT_FALSE, OBJECT_TRUE), ("off", OBJECT_TRUE, OBJECT_FALSE)] {
            let a = task.create_action(name);
            a.duration = vec![Duration::fixed(1.0)];
            a.start_cond.push(Condition::new(light, from));
            a.end_eff.push(Condition::new(light, to));
        }
        task.create_goal().start_cond.push(Condition::new(light, OBJECT_TRUE));
        task.finalize().unwrap();
        task
    }

    fn toggle_plan(steps: usize) -> (PlanTree, Vec<PlanId>) {
        let mut initial = Action {
            name: "#initial".to_string(),
            duration: vec![Duration::fixed(EPSILON)],
            ..Action::default()
        };
        initial.end_eff.push(Condition::new(0, OBJECT_FALSE));
        let mut tree = PlanTree::new(initial);
        let mut ids = vec![tree.root()];
        for step in 1..=steps {
            let parent = *ids.last().unwrap();
            let mut plan = Plan::new(ActionId::Task((step - 1) % 2), Some(tree.get(parent)));
            let value = if step % 2 == 1 { OBJECT_FALSE } else { OBJECT_TRUE };
            plan.causal_links
                .push(CausalLink::new(var_value(0, value), end_point(step - 1), start_point(step)));
            plan.orderings
                .push(crate::encoding::ordering(end_point(step - 1), start_point(step)));
            plan.gc = step as f64;
            ids.push(tree.push(plan));
        }
        (tree, ids)
    }

    #[test]
    fn test_initial_state_is_repeated() {
        let task = toggle_task();
        let (tree, ids) = toggle_plan(2);
        let mut memo = Memoization::new(&State::initial(&task));
        let state = State::initial(&task);
        assert!(memo.is_repeated(&task, &tree, ids[2], &state));
    }

    #[test]
    fn test_new_state_is_stored_then_repeated() {
        let task = toggle_task();
        let (mut tree, ids) = toggle_plan(3);
        let mut memo = Memoization::new(&State::initial(&task));
        let mut on = State::initial(&task);
        on.set_value(0, OBJECT_TRUE);
        assert!(!memo.is_repeated(&task, &tree, ids[1], &on));
        assert_eq!(memo.len(), 2);
        // Reached again by a longer plan.
        assert!(memo.is_repeated(&task, &tree, ids[3], &on));
        // A cheaper plan takes the bucket over.
        tree.get_mut(ids[3]).gc = 0.5;
        assert!(!memo.is_repeated(&task, &tree, ids[3], &on));
        assert_eq!(memo.len(), 2);
        memo.clear();
        assert_eq!(memo.len(), 1);
    }

    #[test]
    fn test_unschedulable_entry_is_not_merged() {
        let task = toggle_task();
        let (mut tree, ids) = toggle_plan(3);
        let mut memo = Memoization::new(&State::initial(&task));
        let mut on = State::initial(&task);
        on.set_value(0, OBJECT_TRUE);
        assert!(!memo.is_repeated(&task, &tree, ids[1], &on));
        // The stored plan can no longer be scheduled: its end is pinned far
        // away from where its duration puts it.
        tree.get_mut(ids[1]).fixed_end = Some(50.0);
        assert!(!memo.is_repeated(&task, &tree, ids[3], &on));
        assert_eq!(memo.len(), 3);
    }
}
