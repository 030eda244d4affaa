use super::{PlanBuilder, Successors};
use crate::encoding::{end_point, start_point, TimePoint};
use crate::plan::PlanTree;
use crate::task::{Action, Condition, Task};

/// The step at `tp` may change `var` while the causal link `p1 -> p2`
/// protects it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct Threat {
    p1: TimePoint,
    p2: TimePoint,
    tp: TimePoint,
    var: usize,
}

/// Condition on `var` required at point `p`, looking at the over-all
/// conditions last.
fn required_value(p: TimePoint, a: &Action, var: usize) -> Option<Condition> {
    let point_cond = if p & 1 == 0 { &a.start_cond } else { &a.end_cond };
    point_cond
        .iter()
        .chain(a.over_cond.iter())
        .find(|c| c.var == var)
        .copied()
}

impl Successors {
    #[inline]
    fn unordered(&self, p1: TimePoint, p2: TimePoint) -> bool {
        !self.linearizer.exist_order(p1, p2) && !self.linearizer.exist_order(p2, p1)
    }

    /// Collects the threats between the new action and the base plan links,
    /// and between the new links and the base plan steps.
    pub(super) fn check_threats(&mut self, task: &Task, tree: &mut PlanTree, pb: &mut PlanBuilder) {
        let mut threats = Vec::new();
        let pc = pb.last_time_point - 1;
        let a = pb.action;
        for p in 1..self.linearizer.num_components() {
            let comp = self.linearizer.component(p);
            for cl in &tree.get(comp).causal_links {
                let (p1, p2) = (cl.first_point(), cl.second_point());
                if self.linearizer.exist_order(pc, p1) || self.linearizer.exist_order(p2, pc) {
                    continue;
                }
                let (var, v) = (cl.var(), cl.value());
                if a.start_eff.iter().any(|e| e.var == var && e.value != v) {
                    threats.push(Threat { p1, p2, tp: pc, var });
                }
                if a.end_eff.iter().any(|e| e.var == var && e.value != v) {
                    threats.push(Threat { p1, p2, tp: pc + 1, var });
                }
            }
        }
        let it = self.linearizer.iteration();
        for cl in &pb.causal_links {
            let (p1, p2) = (cl.first_point(), cl.second_point());
            let (var, v) = (cl.var(), cl.value());
            let vc = &self.var_changes[var];
            if vc.iteration != it {
                continue;
            }
            for (value, tp) in vc.values.iter().zip(vc.time_points.iter()) {
                if *value != v && !self.linearizer.exist_order(*tp, p1) && !self.linearizer.exist_order(p2, *tp) {
                    threats.push(Threat { p1, p2, tp: *tp, var });
                }
            }
        }
        self.solve_threats(task, tree, pb, &threats);
    }

    /// Solves the last threat by demotion or promotion and recurses on the
    /// rest, one branch per valid choice.
    fn solve_threats(&mut self, task: &Task, tree: &mut PlanTree, pb: &mut PlanBuilder, threats: &[Threat]) {
        let Some((t, rest)) = threats.split_last() else {
            self.check_contradictory_effects(task, tree, pb);
            return;
        };
        let t = *t;
        let lin = &self.linearizer;
        if lin.exist_order(t.tp, t.p1) || lin.exist_order(t.p2, t.tp) {
            // Solved by an ordering added for an earlier threat.
            self.solve_threats(task, tree, pb, rest);
            return;
        }
        let (promotion, demotion) = if self.mutex_points(task, tree, pb, t.tp, t.p2, t.var) {
            (false, false)
        } else {
            (t.p1 > 1 && !lin.exist_order(t.p1, t.tp), !lin.exist_order(t.tp, t.p2))
        };
        if demotion && pb.add_ordering(&mut self.linearizer, t.p2, t.tp) {
            self.solve_threats(task, tree, pb, rest);
            pb.remove_last_ordering(&mut self.linearizer);
        }
        if promotion && pb.add_ordering(&mut self.linearizer, t.tp, t.p1) {
            self.solve_threats(task, tree, pb, rest);
            pb.remove_last_ordering(&mut self.linearizer);
        }
    }

    fn point_action<'a>(&self, task: &'a Task, tree: &'a PlanTree, pb: &PlanBuilder<'a>, p: TimePoint) -> &'a Action {
        let step = (p >> 1) as usize;
        if step == self.linearizer.num_components() {
            pb.action
        } else {
            tree.plan_action(task, self.linearizer.component(step))
        }
    }

    /// Both points require the same value of `var` and both steps change
    /// it, so neither can go first.
    fn mutex_points(&self, task: &Task, tree: &PlanTree, pb: &PlanBuilder, p1: TimePoint, p2: TimePoint, var: usize) -> bool {
        let Some(c1) = required_value(p1, self.point_action(task, tree, pb, p1), var).filter(|c| c.is_modified) else {
            return false;
        };
        required_value(p2, self.point_action(task, tree, pb, p2), var)
            .is_some_and(|c2| c2.is_modified && c2.value == c1.value)
    }

    /// Orders each effect of the new action against the unordered base plan
    /// points setting the same variable to another value.
    pub(super) fn check_contradictory_effects(&mut self, task: &Task, tree: &mut PlanTree, pb: &mut PlanBuilder) {
        let a = pb.action;
        let i = pb.current_effect;
        let ns = a.start_eff.len();
        if i < ns {
            self.contradictory_effect(task, tree, pb, a.start_eff[i], start_point(self.new_step));
        } else if i < ns + a.end_eff.len() {
            self.contradictory_effect(task, tree, pb, a.end_eff[i - ns], end_point(self.new_step));
        } else {
            self.generate_successor(task, tree, pb);
        }
    }

    fn contradictory_effect(&mut self, task: &Task, tree: &mut PlanTree, pb: &mut PlanBuilder, c: Condition, eff_point: TimePoint) {
        let vc = &self.var_changes[c.var];
        let conflict = if self.linearizer.check_iteration(vc.iteration) {
            vc.values
                .iter()
                .zip(vc.time_points.iter())
                .find(|(v, p)| **v != c.value && **p > 1 && self.unordered(**p, eff_point))
                .map(|(_, p)| *p)
        } else {
            None
        };
        if let Some(p) = conflict {
            if pb.add_ordering(&mut self.linearizer, p, eff_point) {
                self.contradictory_effect(task, tree, pb, c, eff_point);
                pb.remove_last_ordering(&mut self.linearizer);
            }
            if pb.add_ordering(&mut self.linearizer, eff_point, p) {
                self.contradictory_effect(task, tree, pb, c, eff_point);
                pb.remove_last_ordering(&mut self.linearizer);
            }
            return;
        }
        pb.current_effect += 1;
        self.check_contradictory_effects(task, tree, pb);
        pb.current_effect -= 1;
    }
}
