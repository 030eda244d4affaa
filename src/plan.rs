use crate::encoding::{
    first_point, ordering, second_point, step_of, value_of, var_of, Ordering as PointOrdering,
    TimePoint, VarValue, H_INFINITY,
};
use crate::task::{Action, ActionId, Task};

use std::cmp::Ordering;

pub type PlanId = usize;

/// A producer time point supports `var = value` at a consumer time point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CausalLink {
    pub vv: VarValue,
    pub ordering: PointOrdering,
}

impl CausalLink {
    pub fn new(vv: VarValue, producer: TimePoint, consumer: TimePoint) -> Self {
        CausalLink {
            vv,
            ordering: ordering(producer, consumer),
        }
    }

    #[inline]
    pub fn first_point(&self) -> TimePoint {
        first_point(self.ordering)
    }

    #[inline]
    pub fn second_point(&self) -> TimePoint {
        second_point(self.ordering)
    }

    #[inline]
    pub fn var(&self) -> usize {
        var_of(self.vv)
    }

    #[inline]
    pub fn value(&self) -> usize {
        value_of(self.vv)
    }
}

/// End condition `cond_number` of the action at `step`, still unsupported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenCond {
    pub step: usize,
    pub cond_number: usize,
}

/// Scalarization of `(g, h, h_land, h_aux)` used to order a search queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueKind {
    GHff,
    G2Hff,
    Hff,
    G3Hff,
    GHlandHff,
    GHaux,
    GHland,
    G3Hland,
    Hland,
    G,
}

/// Weight of `h_aux` in plateau queues unless configured otherwise.
pub const DEFAULT_AUX_WEIGHT: f64 = 3.0;

/// Queue kind plus the plateau flag, which breaks ties on metric cost
/// instead of plan length.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchKey {
    pub kind: QueueKind,
    pub plateau: bool,
    /// Only read by [`QueueKind::GHaux`].
    pub aux_weight: f64,
}

impl SearchKey {
    pub fn new(kind: QueueKind) -> Self {
        SearchKey {
            kind,
            plateau: false,
            aux_weight: DEFAULT_AUX_WEIGHT,
        }
    }

    pub fn plateau(kind: QueueKind) -> Self {
        SearchKey {
            plateau: true,
            ..SearchKey::new(kind)
        }
    }

    /// `g + aux_weight * h_aux`
    pub fn aux(aux_weight: f64) -> Self {
        SearchKey {
            aux_weight,
            ..SearchKey::new(QueueKind::GHaux)
        }
    }
}

/// Node of the plan tree: one action added on top of its parent.
#[derive(Debug, Clone)]
pub struct Plan {
    pub id: PlanId,
    pub parent: Option<PlanId>,
    /// `None` until the node is expanded.
    pub children: Option<Vec<PlanId>>,
    pub action: ActionId,
    /// Absolute end time of timed-initial-literal steps.
    pub fixed_end: Option<f64>,
    pub orderings: Vec<PointOrdering>,
    pub causal_links: Vec<CausalLink>,
    pub open_cond: Vec<OpenCond>,
    pub unsatisfied_numeric_conditions: bool,
    pub repeated_state: bool,
    pub g: u16,
    pub gc: f64,
    pub makespan: f64,
    pub h: u16,
    pub h_aux: u16,
    pub h_land: u16,
}

impl Plan {
    pub fn new(action: ActionId, parent: Option<&Plan>) -> Self {
        Plan {
            id: 0,
            parent: parent.map(|p| p.id),
            children: None,
            action,
            fixed_end: None,
            orderings: Vec::new(),
            causal_links: Vec::new(),
            open_cond: Vec::new(),
            unsatisfied_numeric_conditions: false,
            repeated_state: false,
            g: parent.map_or(0, |p| p.g.saturating_add(1)),
            gc: 0.0,
            makespan: 0.0,
            h: H_INFINITY,
            h_aux: H_INFINITY,
            h_land: u16::MAX,
        }
    }

    pub fn expanded(&self) -> bool {
        self.children.is_some()
    }

    pub fn is_goal_action(&self) -> bool {
        matches!(self.action, ActionId::Goal(_))
    }

    pub fn is_solution(&self) -> bool {
        self.is_goal_action() && !self.unsatisfied_numeric_conditions
    }

    fn key_value(&self, key: SearchKey) -> f64 {
        let (g, h, h_land, h_aux) = (
            self.g as f64,
            self.h as f64,
            self.h_land as f64,
            self.h_aux as f64,
        );
        let v = match key.kind {
            QueueKind::GHff => g + h,
            QueueKind::G2Hff => g + 2.0 * h,
            QueueKind::Hff => h,
            QueueKind::G3Hff => g + 3.0 * h,
            QueueKind::GHlandHff => g + h + h_land,
            QueueKind::G => g,
            QueueKind::GHland => g + h_land,
            QueueKind::G3Hland => g + 3.0 * h_land,
            QueueKind::Hland => h_land,
            QueueKind::GHaux => g + key.aux_weight * h_aux,
        };
        if self.unsatisfied_numeric_conditions {
            v + 1.0
        } else {
            v
        }
    }

    /// Queue value and tie breaker under `key`.
    pub fn priority(&self, key: SearchKey) -> (f64, f64) {
        let tie = if key.plateau { self.gc } else { self.g as f64 };
        (self.key_value(key), tie)
    }

    /// `Less` when `self` should be polled before `other`.
    pub fn compare(&self, other: &Plan, key: SearchKey) -> Ordering {
        let (v1, t1) = self.priority(key);
        let (v2, t2) = other.priority(key);
        v1.total_cmp(&v2).then_with(|| t1.total_cmp(&t2))
    }

    /// Heuristic component of the value ordering a queue of `kind`.
    pub fn get_h(&self, kind: QueueKind) -> f64 {
        match kind {
            QueueKind::GHff
            | QueueKind::G2Hff
            | QueueKind::Hff
            | QueueKind::G3Hff
            | QueueKind::G
            | QueueKind::GHlandHff => self.h as f64,
            QueueKind::GHland | QueueKind::G3Hland | QueueKind::Hland => self.h_land as f64,
            QueueKind::GHaux => self.h_aux as f64,
        }
    }
}

/// Arena owning every plan node. Nodes refer to their parent and children
/// by index; the fictitious initial and timed-initial-literal actions live
/// here as well.
#[derive(Debug, Clone)]
pub struct PlanTree {
    plans: Vec<Plan>,
    fictitious: Vec<Action>,
    root: PlanId,
}

impl PlanTree {
    pub fn new(initial: Action) -> Self {
        let root = Plan::new(ActionId::Fictitious(0), None);
        PlanTree {
            plans: vec![root],
            fictitious: vec![initial],
            root: 0,
        }
    }

    /// Chains a step with a fixed end time below the current root, which
    /// it replaces.
    pub fn add_fixed_step(&mut self, action: Action, fixed_end: f64) -> PlanId {
        let index = self.fictitious.len();
        self.fictitious.push(action);
        let mut plan = Plan::new(ActionId::Fictitious(index), Some(&self.plans[self.root]));
        plan.fixed_end = Some(fixed_end);
        let id = self.push(plan);
        self.root = id;
        id
    }

    /// Node the search starts from: the initial plan with every timed
    /// initial literal scheduled.
    pub fn root(&self) -> PlanId {
        self.root
    }

    pub fn push(&mut self, mut plan: Plan) -> PlanId {
        let id = self.plans.len();
        plan.id = id;
        self.plans.push(plan);
        id
    }

    /// Drops the most recently pushed node, which nothing refers to yet.
    pub fn discard_last(&mut self) {
        if self.plans.len() > 1 && self.plans.len() - 1 != self.root {
            self.plans.pop();
        }
    }

    pub fn get(&self, id: PlanId) -> &Plan {
        &self.plans[id]
    }

    pub fn get_mut(&mut self, id: PlanId) -> &mut Plan {
        &mut self.plans[id]
    }

    pub fn len(&self) -> usize {
        self.plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }

    pub fn action<'a>(&'a self, task: &'a Task, id: ActionId) -> &'a Action {
        match id {
            ActionId::Task(i) => &task.actions[i],
            ActionId::Goal(i) => &task.goals[i],
            ActionId::Fictitious(i) => &self.fictitious[i],
        }
    }

    pub fn plan_action<'a>(&'a self, task: &'a Task, id: PlanId) -> &'a Action {
        self.action(task, self.plans[id].action)
    }

    pub fn til_actions(&self) -> Vec<Action> {
        self.fictitious.iter().filter(|a| a.is_til).cloned().collect()
    }

    /// The initial plan or a chain of fixed steps on top of it.
    pub fn is_root(&self, id: PlanId) -> bool {
        let mut current = id;
        loop {
            let plan = &self.plans[current];
            match plan.parent {
                None => return true,
                Some(parent) if plan.fixed_end.is_some() => current = parent,
                Some(_) => return false,
            }
        }
    }

    /// Nodes from the initial plan down to `id`; the position of a node is
    /// its step number.
    pub fn components(&self, id: PlanId) -> Vec<PlanId> {
        let mut res = Vec::with_capacity(self.plans[id].g as usize + 1);
        let mut current = Some(id);
        while let Some(c) = current {
            res.push(c);
            current = self.plans[c].parent;
        }
        res.reverse();
        res
    }

    pub fn set_children(&mut self, id: PlanId, children: Vec<PlanId>) {
        self.plans[id].children = Some(children);
    }

    pub fn children(&self, id: PlanId) -> &[PlanId] {
        self.plans[id].children.as_deref().unwrap_or(&[])
    }

    pub fn to_string(&self, id: PlanId, task: &Task) -> String {
        let mut res = String::new();
        for (step, c) in self.components(id).into_iter().enumerate() {
            let plan = &self.plans[c];
            res += &format!("{step}: {}\n", self.action(task, plan.action).name);
            for cl in &plan.causal_links {
                res += &format!(
                    "  * CL: {} -> {} ({})\n",
                    step_of(cl.first_point()),
                    step_of(cl.second_point()),
                    task.var_value_name(cl.vv)
                );
            }
            for o in &plan.orderings {
                res += &format!("  * O: {} -> {}\n", first_point(*o), second_point(*o));
            }
        }
        res
    }
}
