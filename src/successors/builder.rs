use crate::encoding::{end_point, first_point, ordering, second_point, step_of, Ordering, TimePoint, VarValue};
use crate::linearizer::Linearizer;
use crate::plan::{CausalLink, OpenCond, Plan, PlanId, PlanTree};
use crate::task::{Action, ActionId};

/// Causal links and orderings collected while a candidate action is being
/// supported. Every ordering is mirrored in the linearizer matrix so later
/// choices see it; removals undo both.
#[derive(Debug, Clone)]
pub struct PlanBuilder<'a> {
    pub id: ActionId,
    pub action: &'a Action,
    pub current_precondition: usize,
    pub current_effect: usize,
    /// Precondition already supported by the last action of the base plan.
    pub set_precondition: Option<usize>,
    pub causal_links: Vec<CausalLink>,
    pub orderings: Vec<Ordering>,
    pub last_time_point: TimePoint,
    /// At-end conditions of the new action left without support.
    pub open_cond: Vec<usize>,
    /// Open conditions of the base plan the new action could not support.
    pub carried_open_cond: Vec<OpenCond>,
    num_orderings_added: Vec<usize>,
}

impl<'a> PlanBuilder<'a> {
    pub fn new(id: ActionId, action: &'a Action, new_step: usize) -> Self {
        PlanBuilder {
            id,
            action,
            current_precondition: 0,
            current_effect: 0,
            set_precondition: None,
            causal_links: Vec::new(),
            orderings: Vec::new(),
            last_time_point: end_point(new_step),
            open_cond: Vec::new(),
            carried_open_cond: Vec::new(),
            num_orderings_added: Vec::new(),
        }
    }

    pub fn add_link(&mut self, lin: &mut Linearizer, vv: VarValue, p1: TimePoint, p2: TimePoint) -> bool {
        if self.add_ordering(lin, p1, p2) {
            self.causal_links.push(CausalLink::new(vv, p1, p2));
            true
        } else {
            false
        }
    }

    /// Adds `p1 -> p2` and every ordering it implies between the points
    /// before `p1` and the points after `p2`. False if it closes a cycle.
    pub fn add_ordering(&mut self, lin: &mut Linearizer, p1: TimePoint, p2: TimePoint) -> bool {
        if p1 == p2 || lin.exist_order(p2, p1) {
            return false;
        }
        if lin.exist_order(p1, p2) {
            self.num_orderings_added.push(0);
            return true;
        }
        let mut prev_points = vec![p1];
        let mut next_points = vec![p2];
        for t in 1..=self.last_time_point {
            if lin.exist_order(t, p1) {
                prev_points.push(t);
            }
            if lin.exist_order(p2, t) {
                next_points.push(t);
            }
        }
        let mut added = 0;
        for &prev in &prev_points {
            for &next in &next_points {
                if prev != next && !lin.exist_order(prev, next) {
                    lin.set_order(prev, next);
                    self.orderings.push(ordering(prev, next));
                    added += 1;
                }
            }
        }
        self.num_orderings_added.push(added);
        true
    }

    pub fn remove_last_link(&mut self, lin: &mut Linearizer) {
        self.causal_links.pop();
        self.remove_last_ordering(lin);
    }

    pub fn remove_last_ordering(&mut self, lin: &mut Linearizer) {
        let added = self.num_orderings_added.pop().unwrap_or(0);
        for _ in 0..added {
            if let Some(o) = self.orderings.pop() {
                lin.clear_order(first_point(o), second_point(o));
            }
        }
    }

    /// Child of `base` with the collected links and orderings. Orderings from
    /// the initial step and from a step start to its own end are implicit.
    pub fn generate_plan(&self, tree: &PlanTree, base: PlanId) -> Plan {
        let mut plan = Plan::new(self.id, Some(tree.get(base)));
        plan.causal_links = self.causal_links.clone();
        plan.orderings = self
            .orderings
            .iter()
            .copied()
            .filter(|o| {
                let (p1, p2) = (first_point(*o), second_point(*o));
                p1 > 1 && (p1 & 1 == 1 || p1 + 1 != p2)
            })
            .collect();
        let step = step_of(self.last_time_point);
        plan.open_cond = self.carried_open_cond.clone();
        plan.open_cond.extend(self.open_cond.iter().map(|c| OpenCond {
            step,
            cond_number: *c,
        }));
        plan
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::{start_point, var_value};
    use crate::state::State;

    fn linearizer_on_root() -> (Linearizer, PlanTree) {
        let tree = PlanTree::new(Action {
            name: "#initial".to_string(),
            ..Action::default()
        });
        let mut lin = Linearizer::new(State::new(1, 0));
        lin.set_current_base_plan(&tree, tree.root());
        (lin, tree)
    }

    #[test]
    fn test_ordering_is_closed_transitively_and_undone() {
        let (mut lin, _) = linearizer_on_root();
        let action = Action::default();
        let mut pb = PlanBuilder::new(ActionId::Task(0), &action, 3);
        assert!(pb.add_ordering(&mut lin, 2, 4));
        assert!(pb.add_ordering(&mut lin, 4, 6));
        assert!(lin.exist_order(2, 6));
        // Would close a cycle.
        assert!(!pb.add_ordering(&mut lin, 6, 2));
        pb.remove_last_ordering(&mut lin);
        assert!(!lin.exist_order(4, 6));
        assert!(!lin.exist_order(2, 6));
        assert!(lin.exist_order(2, 4));
    }

    #[test]
    fn test_generated_plan_skips_implicit_orderings() {
        let (mut lin, tree) = linearizer_on_root();
        let action = Action::default();
        let mut pb = PlanBuilder::new(ActionId::Task(0), &action, 1);
        assert!(pb.add_link(&mut lin, var_value(0, 0), 1, start_point(1)));
        assert!(pb.add_ordering(&mut lin, start_point(1), end_point(1)));
        pb.open_cond.push(0);
        let plan = pb.generate_plan(&tree, tree.root());
        assert_eq!(plan.causal_links.len(), 1);
        assert!(plan.orderings.is_empty());
        assert_eq!(plan.open_cond, vec![OpenCond { step: 1, cond_number: 0 }]);
        assert_eq!(plan.g, 1);
    }
}
