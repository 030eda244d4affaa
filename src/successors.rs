mod builder;
mod threats;

pub use builder::PlanBuilder;

use crate::encoding::{end_point, start_point, TimePoint, VarValue, EPSILON, H_INFINITY};
use crate::heuristic::Evaluator;
use crate::linearizer::Linearizer;
use crate::memo::Memoization;
use crate::plan::{PlanId, PlanTree};
use crate::state::State;
use crate::task::{Action, ActionId, Condition, Task};

use tracing::{debug, trace};

/// Time points where the base plan produces one `(var, value)`.
#[derive(Debug, Clone, Default)]
struct PlanEffect {
    time_points: Vec<TimePoint>,
    iteration: u32,
}

impl PlanEffect {
    fn add(&mut self, time: TimePoint, iteration: u32) {
        if self.iteration != iteration {
            self.time_points.clear();
            self.iteration = iteration;
        }
        self.time_points.push(time);
    }
}

/// Every value the base plan assigns to one variable, with its time point.
#[derive(Debug, Clone, Default)]
struct VarChange {
    values: Vec<usize>,
    time_points: Vec<TimePoint>,
    iteration: u32,
}

impl VarChange {
    fn add(&mut self, value: usize, time: TimePoint, iteration: u32) {
        if self.iteration != iteration {
            self.values.clear();
            self.time_points.clear();
            self.iteration = iteration;
        }
        self.values.push(value);
        self.time_points.push(time);
    }
}

fn candidate(task: &Task, id: ActionId) -> Option<&Action> {
    match id {
        ActionId::Task(i) => task.actions.get(i),
        ActionId::Goal(i) => task.goals.get(i),
        ActionId::Fictitious(_) => None,
    }
}

/// Expands a base plan into its children: each child adds one action whose
/// conditions are supported by causal links, with every threat on those
/// links solved by an extra ordering.
#[derive(Debug, Clone)]
pub struct Successors {
    force_at_end: bool,
    filter_repeated: bool,
    linearizer: Linearizer,
    evaluator: Evaluator,
    memo: Memoization,
    /// `[var][value]`
    plan_effects: Vec<Vec<PlanEffect>>,
    var_changes: Vec<VarChange>,
    checked_action: Vec<u32>,
    current_iteration: u32,
    base: PlanId,
    new_step: usize,
    successors: Vec<PlanId>,
    pub solution: Option<PlanId>,
    /// Candidates dropped for lack of a valid schedule.
    pub rejected: usize,
}

impl Successors {
    pub fn new(state: &State, task: &Task, tils: Vec<Action>, force_at_end: bool, filter_repeated: bool) -> Self {
        let num_values = task.values.len();
        Successors {
            force_at_end,
            filter_repeated,
            linearizer: Linearizer::new(state.clone()),
            evaluator: Evaluator::new(state, task, tils, force_at_end),
            memo: Memoization::new(state),
            plan_effects: vec![vec![PlanEffect::default(); num_values]; task.variables.len()],
            var_changes: vec![VarChange::default(); task.variables.len()],
            checked_action: vec![0; task.actions.len() + task.goals.len()],
            current_iteration: 0,
            base: 0,
            new_step: 0,
            successors: Vec::new(),
            solution: None,
            rejected: 0,
        }
    }

    pub fn force_at_end(&self) -> bool {
        self.force_at_end
    }

    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    pub fn informative_landmarks(&self, task: &Task) -> bool {
        self.evaluator.informative_landmarks(task)
    }

    pub fn set_priority_goals(&mut self, goals: Option<Vec<VarValue>>) {
        self.evaluator.set_priority_goals(goals);
    }

    pub fn clear_memoization(&mut self) {
        self.memo.clear();
    }

    pub fn clear(&mut self) {
        self.solution = None;
        self.clear_memoization();
    }

    fn action_key(task: &Task, id: ActionId) -> Option<usize> {
        match id {
            ActionId::Task(i) => Some(i),
            ActionId::Goal(i) => Some(task.actions.len() + i),
            ActionId::Fictitious(_) => None,
        }
    }

    fn visited(&self, task: &Task, id: ActionId) -> bool {
        Self::action_key(task, id).map_or(true, |k| self.checked_action[k] == self.current_iteration)
    }

    fn set_visited(&mut self, task: &Task, id: ActionId) {
        if let Some(k) = Self::action_key(task, id) {
            self.checked_action[k] = self.current_iteration;
        }
    }

    fn start_base_plan(&mut self, task: &Task, tree: &PlanTree, base: PlanId) {
        self.linearizer.set_current_base_plan(tree, base);
        self.linearizer.set_current_plan(None);
        self.new_step = self.linearizer.num_components();
        self.base = base;
        self.successors.clear();
        self.compute_base_plan_effects(task, tree);
    }

    /// Children of `base`. The root is expanded with every action; other
    /// plans only try the actions supported by their last step and those of
    /// their unexpanded siblings.
    pub fn compute_successors(&mut self, task: &Task, tree: &mut PlanTree, base: PlanId) -> Vec<PlanId> {
        self.start_base_plan(task, tree, base);
        if !self.meet_deadlines(task, tree) {
            trace!("plan {base} misses a goal deadline");
            return Vec::new();
        }
        if !tree.get(base).repeated_state {
            self.compute_solution_successors(task, tree);
        }
        if self.solution.is_some() {
            return std::mem::take(&mut self.successors);
        }
        self.current_iteration += 1;
        if tree.is_root(base) {
            for i in 0..task.actions.len() {
                self.full_action_check(task, tree, ActionId::Task(i));
            }
        } else {
            self.compute_successors_supported_by_last_actions(task, tree);
            self.compute_successors_through_brother_plans(task, tree);
        }
        std::mem::take(&mut self.successors)
    }

    /// Like [`Successors::compute_successors`], but every action executable
    /// in the frontier state of `base` is tried as well.
    pub fn compute_successors_concurrent(&mut self, task: &Task, tree: &mut PlanTree, base: PlanId) -> Vec<PlanId> {
        if tree.is_root(base) {
            return self.compute_successors(task, tree, base);
        }
        self.current_iteration += 1;
        self.start_base_plan(task, tree, base);
        self.compute_successors_supported_by_last_actions(task, tree);
        self.compute_successors_through_brother_plans(task, tree);
        if let Some(lin) = self.linearizer.frontier_state(tree, task, None) {
            let state = lin.state;
            for var in 0..state.values.len() {
                for &a in task.requirers(var, state.value(var)) {
                    let id = ActionId::Task(a);
                    if !self.visited(task, id) && state.is_executable(&task.actions[a]) {
                        self.set_visited(task, id);
                        self.full_action_check(task, tree, id);
                    }
                }
            }
        }
        if !tree.get(base).repeated_state && self.solution.is_none() {
            self.compute_solution_successors(task, tree);
        }
        std::mem::take(&mut self.successors)
    }

    fn compute_base_plan_effects(&mut self, task: &Task, tree: &PlanTree) {
        let it = self.linearizer.iteration();
        for (i, c) in self.linearizer.components().iter().enumerate() {
            let a = tree.plan_action(task, *c);
            for (effects, time) in [(&a.start_eff, start_point(i)), (&a.end_eff, end_point(i))] {
                for e in effects {
                    self.plan_effects[e.var][e.value].add(time, it);
                    self.var_changes[e.var].add(e.value, time, it);
                }
            }
        }
    }

    /// Goals the base plan has not produced by their deadline make it a
    /// dead end.
    fn meet_deadlines(&self, task: &Task, tree: &PlanTree) -> bool {
        let makespan = tree.get(self.base).makespan;
        task.goal_deadlines()
            .iter()
            .filter(|d| makespan > d.time)
            .flat_map(|d| d.goals.iter())
            .all(|g| {
                let c = Condition::new(crate::encoding::var_of(*g), crate::encoding::value_of(*g));
                self.supported_condition(&c)
            })
    }

    #[inline]
    fn supported_condition(&self, c: &Condition) -> bool {
        self.linearizer
            .check_iteration(self.plan_effects[c.var][c.value].iteration)
    }

    fn supported_action(&self, a: &Action) -> bool {
        a.start_cond
            .iter()
            .chain(a.over_cond.iter())
            .all(|c| self.supported_condition(c))
            && (!self.force_at_end || a.end_cond.iter().all(|c| self.supported_condition(c)))
    }

    fn compute_solution_successors(&mut self, task: &Task, tree: &mut PlanTree) {
        for i in 0..task.goals.len() {
            self.full_action_check(task, tree, ActionId::Goal(i));
        }
    }

    fn full_action_check(&mut self, task: &Task, tree: &mut PlanTree, id: ActionId) {
        let Some(a) = candidate(task, id) else {
            return;
        };
        if self.supported_action(a) {
            let mut pb = PlanBuilder::new(id, a, self.new_step);
            self.full_action_support_check(task, tree, &mut pb);
        }
    }

    fn compute_successors_supported_by_last_actions(&mut self, task: &Task, tree: &mut PlanTree) {
        if tree.get(self.base).repeated_state {
            return;
        }
        let base_action = tree.plan_action(task, self.base).clone();
        let start_new = start_point(self.new_step);
        let start_last = start_new - 2;
        for (effects, effect_time) in [(&base_action.start_eff, start_last), (&base_action.end_eff, start_last + 1)] {
            for e in effects {
                for &req in task.requirers(e.var, e.value) {
                    let id = ActionId::Task(req);
                    if self.visited(task, id) {
                        continue;
                    }
                    self.set_visited(task, id);
                    let mut pb = PlanBuilder::new(id, &task.actions[req], self.new_step);
                    let n = self.add_action_support(&mut pb, e, effect_time, start_new);
                    if n == 0 {
                        continue;
                    }
                    self.full_action_support_check(task, tree, &mut pb);
                    for _ in 0..n {
                        pb.remove_last_link(&mut self.linearizer);
                    }
                }
            }
        }
    }

    fn compute_successors_through_brother_plans(&mut self, task: &Task, tree: &mut PlanTree) {
        let Some(parent) = tree.get(self.base).parent else {
            return;
        };
        let brothers: Vec<PlanId> = tree.children(parent).to_vec();
        for b in brothers {
            let brother = tree.get(b);
            if b == self.base || brother.expanded() || self.visited(task, brother.action) {
                continue;
            }
            let id = brother.action;
            self.set_visited(task, id);
            if let Some(a) = candidate(task, id) {
                let mut pb = PlanBuilder::new(id, a, self.new_step);
                self.full_action_support_check(task, tree, &mut pb);
            }
        }
    }

    /// Links the condition of `pb` supported by `effect` at `effect_time`.
    /// Returns the number of links added.
    fn add_action_support(
        &mut self,
        pb: &mut PlanBuilder,
        effect: &Condition,
        effect_time: TimePoint,
        start_new: TimePoint,
    ) -> usize {
        let a = pb.action;
        let vv = effect.code();
        let matches = |c: &Condition| c.var == effect.var && c.value == effect.value;
        let lin = &mut self.linearizer;
        if let Some(i) = a.start_cond.iter().position(matches) {
            pb.set_precondition = Some(i);
            return usize::from(pb.add_link(lin, vv, effect_time, start_new));
        }
        if let Some(i) = a.over_cond.iter().position(matches) {
            pb.set_precondition = Some(i + a.start_cond.len());
            if pb.add_link(lin, vv, effect_time, start_new) {
                if pb.add_link(lin, vv, effect_time, start_new + 1) {
                    return 2;
                }
                pb.remove_last_link(lin);
            }
            return 0;
        }
        if let Some(i) = a.end_cond.iter().position(matches) {
            pb.set_precondition = Some(i + a.start_cond.len() + a.over_cond.len());
            return usize::from(pb.add_link(lin, vv, effect_time, start_new + 1));
        }
        0
    }

    /// Supports the next precondition of the action in `pb`, branching over
    /// every producer in the base plan.
    fn full_action_support_check(&mut self, task: &Task, tree: &mut PlanTree, pb: &mut PlanBuilder) {
        let a = pb.action;
        let i = pb.current_precondition;
        let (ns, no, ne) = (a.start_cond.len(), a.over_cond.len(), a.end_cond.len());
        let start = start_point(self.new_step);
        if pb.set_precondition == Some(i) {
            pb.current_precondition += 1;
            self.full_action_support_check(task, tree, pb);
            pb.current_precondition -= 1;
        } else if i < ns {
            self.full_condition_support_check(task, tree, pb, a.start_cond[i], start, false, false);
        } else if i < ns + no {
            self.full_condition_support_check(task, tree, pb, a.over_cond[i - ns], start, true, false);
        } else if i < ns + no + ne {
            let can_leave_open = !self.force_at_end;
            self.full_condition_support_check(task, tree, pb, a.end_cond[i - ns - no], start + 1, false, can_leave_open);
        } else {
            self.check_threats(task, tree, pb);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn full_condition_support_check(
        &mut self,
        task: &Task,
        tree: &mut PlanTree,
        pb: &mut PlanBuilder,
        c: Condition,
        cond_point: TimePoint,
        over_all: bool,
        can_leave_open: bool,
    ) {
        let mut support_found = false;
        let effect = &self.plan_effects[c.var][c.value];
        if self.linearizer.check_iteration(effect.iteration) {
            let supports = effect.time_points.clone();
            for p in supports {
                if !pb.add_link(&mut self.linearizer, c.code(), p, cond_point) {
                    continue;
                }
                if !over_all || pb.add_link(&mut self.linearizer, c.code(), p, cond_point + 1) {
                    pb.current_precondition += 1;
                    self.full_action_support_check(task, tree, pb);
                    pb.current_precondition -= 1;
                    if over_all {
                        pb.remove_last_link(&mut self.linearizer);
                    }
                    support_found = true;
                }
                pb.remove_last_link(&mut self.linearizer);
            }
        }
        if !support_found && can_leave_open {
            let a = pb.action;
            let number = pb.current_precondition - a.start_cond.len() - a.over_cond.len();
            debug!("leaving at-end condition {number} of {} open", a.name);
            pb.open_cond.push(number);
            pb.current_precondition += 1;
            self.full_action_support_check(task, tree, pb);
            pb.current_precondition -= 1;
            pb.open_cond.pop();
        }
    }

    fn generate_successor(&mut self, task: &Task, tree: &mut PlanTree, pb: &mut PlanBuilder) {
        let last = pb.last_time_point;
        let ordered = pb.add_ordering(&mut self.linearizer, last - 1, last);
        if tree.get(self.base).open_cond.is_empty() {
            self.emit(task, tree, pb);
        } else {
            self.solve_base_plan_open_condition(task, tree, pb, 0);
        }
        if ordered {
            pb.remove_last_ordering(&mut self.linearizer);
        }
    }

    /// Tries to support open condition `number` of the base plan with an
    /// effect of the new action. Unsupported ones stay open in the child.
    fn solve_base_plan_open_condition(&mut self, task: &Task, tree: &mut PlanTree, pb: &mut PlanBuilder, number: usize) {
        let oc = tree.get(self.base).open_cond[number];
        let comp = self.linearizer.component(oc.step);
        let cond = tree.plan_action(task, comp).end_cond.get(oc.cond_number).copied();
        let a = pb.action;
        let last = pb.last_time_point;
        let produces = |effects: &[Condition], c: &Condition| effects.iter().any(|e| e.var == c.var && e.value == c.value);
        let effect_point = cond.and_then(|c| {
            if produces(&a.start_eff, &c) {
                Some((c, last - 1))
            } else if produces(&a.end_eff, &c) {
                Some((c, last))
            } else {
                None
            }
        });
        let linked = match effect_point {
            Some((c, p)) => pb.add_link(&mut self.linearizer, c.code(), p, end_point(oc.step)),
            None => false,
        };
        if !linked {
            pb.carried_open_cond.push(oc);
        }
        if number + 1 < tree.get(self.base).open_cond.len() {
            self.solve_base_plan_open_condition(task, tree, pb, number + 1);
        } else {
            self.emit(task, tree, pb);
        }
        if linked {
            pb.remove_last_link(&mut self.linearizer);
        } else {
            pb.carried_open_cond.pop();
        }
    }

    fn emit(&mut self, task: &Task, tree: &mut PlanTree, pb: &PlanBuilder) {
        let plan = pb.generate_plan(tree, self.base);
        let id = tree.push(plan);
        if self.postprocess(task, tree, id) {
            self.successors.push(id);
            if tree.get(id).is_solution() {
                debug!("solution plan {id} generated");
                self.solution = Some(id);
            }
        } else {
            self.rejected += 1;
            tree.discard_last();
        }
    }

    /// Linearizes the new plan, rejects it if no valid schedule exists and
    /// fills in its cost and heuristic values.
    fn postprocess(&mut self, task: &Task, tree: &mut PlanTree, id: PlanId) -> bool {
        self.linearizer.set_current_plan(Some(id));
        let res = self
            .linearizer
            .frontier_state(tree, task, Some(self.evaluator.landmarks()));
        self.linearizer.set_current_plan(None);
        let Some(lin) = res else {
            trace!("plan {id} has no valid schedule");
            return false;
        };
        tree.get_mut(id).unsatisfied_numeric_conditions = lin.unsatisfied_numeric_conditions;
        if tree.get(id).is_solution() && !goals_supported(task, &lin.state) {
            return false;
        }
        let gc = task.evaluate_metric(&lin.state.numbers, lin.makespan);
        let eval = self.evaluator.evaluate(task, &lin.state, lin.progress.as_ref());
        {
            let plan = tree.get_mut(id);
            plan.gc = gc;
            plan.makespan = lin.makespan;
            plan.h = eval.h;
            plan.h_aux = eval.h_aux;
            plan.h_land = eval.h_land;
        }
        let repeated = self.filter_repeated && self.memo.is_repeated(task, tree, id, &lin.state);
        tree.get_mut(id).repeated_state = repeated;
        true
    }

    /// Evaluates a plan built outside the generator, such as the root.
    pub fn evaluate(&mut self, task: &Task, tree: &mut PlanTree, id: PlanId) {
        self.linearizer.set_current_base_plan(tree, id);
        self.linearizer.set_current_plan(None);
        let res = self
            .linearizer
            .frontier_state(tree, task, Some(self.evaluator.landmarks()));
        let plan_eval = res.map(|lin| {
            let eval = self.evaluator.evaluate(task, &lin.state, lin.progress.as_ref());
            (task.evaluate_metric(&lin.state.numbers, lin.makespan), lin.makespan, eval)
        });
        let plan = tree.get_mut(id);
        match plan_eval {
            Some((gc, makespan, eval)) => {
                plan.gc = gc;
                plan.makespan = makespan;
                plan.h = eval.h;
                plan.h_aux = eval.h_aux;
                plan.h_land = eval.h_land;
            }
            None => plan.h = H_INFINITY,
        }
    }

    pub fn frontier_state(&mut self, task: &Task, tree: &PlanTree, id: PlanId) -> Option<State> {
        self.linearizer.set_current_base_plan(tree, id);
        self.linearizer.set_current_plan(None);
        self.linearizer
            .frontier_state(tree, task, None)
            .map(|lin| lin.state)
    }

    pub fn linearizer_mut(&mut self) -> &mut Linearizer {
        &mut self.linearizer
    }
}

/// Some goal holds in `state`.
fn goals_supported(task: &Task, state: &State) -> bool {
    task.goals.iter().any(|g| {
        g.all_conditions().all(|c| state.holds(c))
            && g.start_num_cond
                .iter()
                .chain(g.end_num_cond.iter())
                .all(|c| c.holds(&state.numbers, EPSILON))
    })
}
