use super::plateau::Plateau;
use super::profile::DomainProfile;
use super::selector::{QualitySelector, Selector};
use crate::config::PlannerConfig;
use crate::encoding::{var_of, value_of, EPSILON, H_INFINITY};
use crate::heuristic::Rpg;
use crate::plan::{PlanId, PlanTree};
use crate::stat::Stats;
use crate::state::State;
use crate::successors::Successors;
use crate::task::{Action, Assignment, Condition, Duration, NumericEffect, NumericExpression, Task};

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::Instant;
use tracing::{debug, info, instrument};

/// Best-first PoCL search over the plan tree. The domain profile decides
/// which selectors are wired up, whether two of them race and whether a
/// stalled search may escape through a plateau.
///
/// The planner comes out of [`Planner::new`] with its root expanded, so an
/// outside loop can go straight to [`Planner::poll`],
/// [`Planner::possible_successors`] and [`Planner::add_successors`].
#[derive(Debug)]
pub struct Planner {
    task: Task,
    config: PlannerConfig,
    tree: PlanTree,
    initial_state: State,
    successors: Successors,
    profile: DomainProfile,
    has_tils: bool,
    selectors: Vec<Selector>,
    current: usize,
    /// Best expanded plan per selector, where a plateau would start.
    best_plans: Vec<Option<PlanId>>,
    plateau: Option<Plateau>,
    num_goals_in_plateau: usize,
    quality: Option<QualitySelector>,
    solution: Option<PlanId>,
    initial_h: u16,
    rng: StdRng,
    start: Instant,
    stats: Stats,
}

impl Planner {
    #[instrument(skip_all, name = "planner_setup", level = "debug")]
    pub fn new(mut task: Task, config: PlannerConfig) -> crate::task::Result<Self> {
        let start = Instant::now();
        if !task.is_finalized() {
            task.finalize()?;
        }
        let initial_state = State::initial(&task);
        let tree = create_initial_plan(&task);
        let tils = tree.til_actions();
        let force_at_end = check_force_at_end_conditions(&task, &tils);
        let filter_repeated = check_repeated_states(&task);
        if !tils.is_empty() {
            calculate_deadlines(&mut task, &tils, force_at_end);
        }
        let profile = config
            .profile
            .unwrap_or_else(|| DomainProfile::detect(&task, force_at_end, filter_repeated));
        info!(
            "{profile} profile (force at-end conditions: {force_at_end}, filter repeated states: {filter_repeated}, timed literals: {})",
            tils.len()
        );
        let successors = Successors::new(&initial_state, &task, tils.clone(), force_at_end, filter_repeated);
        let mut planner = Planner {
            num_goals_in_plateau: config.plateau.goals,
            rng: StdRng::seed_from_u64(config.seed),
            has_tils: !tils.is_empty(),
            task,
            config,
            tree,
            initial_state,
            successors,
            profile,
            selectors: Vec::new(),
            current: 0,
            best_plans: Vec::new(),
            plateau: None,
            quality: None,
            solution: None,
            initial_h: H_INFINITY,
            start,
            stats: Stats::default(),
        };
        planner.create_root();
        Ok(planner)
    }

    /// Evaluates the root, wires up the selectors of the profile and queues
    /// the children of the root. [`Planner::new`] already calls it; later
    /// calls do nothing.
    pub fn create_root(&mut self) {
        if !self.selectors.is_empty() {
            return;
        }
        let root = self.tree.root();
        self.successors.evaluate(&self.task, &mut self.tree, root);
        let (h, h_land) = (self.tree.get(root).h, self.tree.get(root).h_land);
        let landmarks = self.successors.informative_landmarks(&self.task) || 1.5 * h_land as f64 >= h as f64;
        let keys = self.profile.selector_keys(landmarks, self.has_tils);
        self.selectors = keys.iter().map(|k| Selector::new(k)).collect();
        self.best_plans = vec![None; self.selectors.len()];
        debug!("root h={h} h_land={h_land}, landmark queues: {landmarks}");
        if h == H_INFINITY {
            info!("goals are unreachable from the initial state");
            return;
        }
        let children = self.successors.compute_successors(&self.task, &mut self.tree, root);
        self.stats.generated_nodes += children.len();
        self.tree.set_children(root, children.clone());
        for id in children {
            let plan = self.tree.get(id);
            if plan.is_solution() {
                self.solution = Some(id);
            } else {
                for sel in &mut self.selectors {
                    sel.add(plan);
                }
            }
            self.initial_h = self.initial_h.min(plan.h);
        }
    }

    /// Searches until a solution is found, the open list runs dry or the
    /// time budget is spent.
    #[instrument(skip_all, name = "plan", level = "debug")]
    pub fn plan(&mut self) -> Option<PlanId> {
        while self.solution.is_none() && !self.empty_search_space() && !self.time_exceeded() {
            self.search_step();
        }
        self.update_stats();
        match self.solution {
            Some(s) => info!("solution found: {} steps, cost {:.3}", self.tree.get(s).g, self.tree.get(s).gc),
            None => info!("no solution found"),
        }
        self.solution
    }

    fn search_step(&mut self) {
        let Some(base) = self.poll() else {
            return;
        };
        let Some(children) = self.expand_base_plan(base) else {
            return;
        };
        self.add_to_selectors(base, children);
        if self.profile.uses_plateau(self.has_tils) {
            self.check_plateau();
        }
        if self.profile.races_selectors() {
            self.current = 1 - self.current;
        }
    }

    pub fn empty_search_space(&self) -> bool {
        self.selectors.iter().all(Selector::is_empty)
    }

    pub fn time_exceeded(&self) -> bool {
        self.start.elapsed().as_secs_f64() >= self.config.timeout
    }

    /// Best open plan of the current selector.
    pub fn poll(&mut self) -> Option<PlanId> {
        if self.profile.races_selectors() && self.selectors[self.current].is_empty() {
            self.current = 1 - self.current;
        }
        self.selectors[self.current].poll()
    }

    /// Children of `base` for an outside caller, which later reports the
    /// ones it accepts through [`Planner::add_successors`].
    pub fn possible_successors(&mut self, base: PlanId) -> Vec<PlanId> {
        self.expand_base_plan(base).unwrap_or_default()
    }

    /// Attaches the accepted `candidates` to `base` and queues them.
    pub fn add_successors(&mut self, base: PlanId, candidates: &[PlanId], valid: &[bool]) {
        let accepted: Vec<PlanId> = candidates
            .iter()
            .zip(valid.iter())
            .filter(|(_, ok)| **ok)
            .map(|(id, _)| *id)
            .collect();
        self.add_to_selectors(base, accepted);
        if self.profile.uses_plateau(self.has_tils) {
            self.check_plateau();
        }
        if self.profile.races_selectors() {
            self.current = 1 - self.current;
        }
    }

    /// `None` if `base` was already expanded, in which case its children
    /// are queued again, or if a solution came up.
    fn expand_base_plan(&mut self, base: PlanId) -> Option<Vec<PlanId>> {
        if self.tree.get(base).expanded() {
            let children = self.tree.children(base).to_vec();
            for id in children {
                if self.selectors[self.current].add(self.tree.get(id)) && !self.profile.races_selectors() {
                    self.cancel_plateau();
                }
            }
            return None;
        }
        let children = self.successors.compute_successors(&self.task, &mut self.tree, base);
        self.stats.expanded_nodes += 1;
        self.stats.generated_nodes += children.len();
        self.stats.repeated_states += children.iter().filter(|id| self.tree.get(**id).repeated_state).count();
        if let Some(s) = self.successors.solution {
            self.solution = Some(s);
            return None;
        }
        let plan = self.tree.get(base);
        let best = &mut self.best_plans[self.current];
        let better = match best {
            None => true,
            Some(b) => {
                let b = self.tree.get(*b);
                plan.h < b.h || (plan.h == b.h && plan.g <= b.g)
            }
        };
        if better {
            *best = Some(base);
        }
        Some(children)
    }

    fn add_to_selectors(&mut self, base: PlanId, children: Vec<PlanId>) {
        self.tree.set_children(base, children.clone());
        for id in children {
            let plan = self.tree.get(id);
            if !self.selectors[self.current].add(plan) {
                continue;
            }
            if self.profile.races_selectors() {
                if self.current == 0 && self.selectors[0].best_h() < self.selectors[1].best_h() {
                    self.selectors[1].add(plan);
                }
            } else {
                self.cancel_plateau();
            }
        }
    }

    fn cancel_plateau(&mut self) {
        if let Some(plateau) = self.plateau.take() {
            plateau.export_open_nodes(&self.tree, &mut self.selectors[0]);
            debug!("plateau closed, {} open plans", self.selectors[0].len());
        }
    }

    fn check_plateau(&mut self) {
        let (start, limit) = (self.config.plateau.start, self.config.plateau.limit);
        if !self.selectors[0].in_plateau(start) {
            return;
        }
        let best_h = self.selectors[0].best_h();
        if self.plateau.is_none() {
            if let Some(best) = self.best_plans[0] {
                if self.tree.get(best).h <= best_h.saturating_add(1) {
                    self.plateau = Some(Plateau::new(
                        &self.task,
                        &mut self.tree,
                        &mut self.successors,
                        best,
                        best_h,
                        self.num_goals_in_plateau,
                        &self.config.plateau,
                    ));
                    self.best_plans[0] = None;
                    self.stats.plateaus += 1;
                }
            }
        }
        let Some(plateau) = self.plateau.as_mut() else {
            return;
        };
        let improve = plateau.search_step(
            &self.task,
            &mut self.tree,
            &mut self.successors,
            &mut self.num_goals_in_plateau,
            &mut self.rng,
        );
        if let Some(s) = self.successors.solution {
            self.solution = Some(s);
        }
        if improve || self.selectors[0].in_plateau(limit) || plateau.empty() {
            if improve {
                if let Some(b) = plateau.best_plan() {
                    self.selectors[0].set_best_plan(self.tree.get(b));
                }
            } else {
                self.selectors[0].set_iterations_without_improving(start);
            }
            self.cancel_plateau();
        }
    }

    /// Looks for cheaper solutions than the one found until the time
    /// budget is spent, and returns the best one.
    #[instrument(skip_all, name = "improve", level = "debug")]
    pub fn improve(&mut self) -> Option<PlanId> {
        let mut best = self.solution?;
        let mut first = true;
        loop {
            let (g, gc) = (self.tree.get(best).g, self.tree.get(best).gc);
            match self.improve_solution(g, gc, first) {
                Some(s) => {
                    info!("cheaper solution found: {} steps, cost {:.3}", self.tree.get(s).g, self.tree.get(s).gc);
                    best = s;
                }
                None => break,
            }
            first = false;
        }
        self.solution = Some(best);
        self.update_stats();
        self.solution
    }

    fn improve_solution(&mut self, best_g: u16, best_gc: f64, first: bool) -> Option<PlanId> {
        if first {
            self.quality = Some(QualitySelector::new(best_gc, best_g));
            self.add_frontier_nodes();
        }
        let quality = self.quality.as_mut()?;
        quality.set_best(best_gc, best_g);
        self.successors.solution = None;
        while !quality.is_empty() && self.start.elapsed().as_secs_f64() < self.config.timeout {
            let Some(base) = quality.poll(&self.tree) else {
                break;
            };
            if self.tree.get(base).expanded() {
                for id in self.tree.children(base) {
                    quality.add(self.tree.get(*id));
                }
                continue;
            }
            let children = self.successors.compute_successors(&self.task, &mut self.tree, base);
            self.stats.expanded_nodes += 1;
            self.stats.generated_nodes += children.len();
            if let Some(s) = self.successors.solution.take() {
                if quality.improves(self.tree.get(s)) {
                    return Some(s);
                }
            }
            self.tree.set_children(base, children.clone());
            for id in children {
                let plan = self.tree.get(id);
                if !plan.is_solution() {
                    quality.add(plan);
                }
            }
        }
        None
    }

    /// Queues the open plans of the tree that may still lead to a cheaper
    /// solution.
    fn add_frontier_nodes(&mut self) {
        let Some(quality) = self.quality.as_mut() else {
            return;
        };
        let mut stack = vec![self.tree.root()];
        while let Some(id) = stack.pop() {
            let plan = self.tree.get(id);
            if !quality.improves(plan) {
                continue;
            }
            if plan.expanded() {
                stack.extend(self.tree.children(id).iter().rev());
            } else {
                quality.add(plan);
            }
        }
    }

    fn update_stats(&mut self) {
        self.stats.rejected_plans = self.successors.rejected;
        self.stats.time_ms = self.start.elapsed().as_millis();
    }

    pub fn solution(&self) -> Option<PlanId> {
        self.solution
    }

    pub fn initial_h(&self) -> u16 {
        self.initial_h
    }

    pub fn profile(&self) -> DomainProfile {
        self.profile
    }

    pub fn task(&self) -> &Task {
        &self.task
    }

    pub fn tree(&self) -> &PlanTree {
        &self.tree
    }

    pub fn initial_state(&self) -> &State {
        &self.initial_state
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }
}

/// The `#initial` action produces the values of time 0; every later time
/// with initial values becomes a `#til` action ending at that time.
fn create_initial_plan(task: &Task) -> PlanTree {
    let mut initial = fictitious_action("#initial", EPSILON, false);
    for (var, value) in task.initial_state.iter().enumerate() {
        initial.end_eff.push(Condition::new(var, *value as usize));
    }
    let mut tree = PlanTree::new(initial);

    let mut times: Vec<f64> = task
        .variables
        .iter()
        .flat_map(|v| v.initial_values.iter().map(|(_, t)| *t))
        .chain(task.num_variables.iter().flat_map(|v| v.initial_values.iter().map(|(_, t)| *t)))
        .filter(|t| *t > 0.0)
        .collect();
    times.sort_by(|a, b| a.total_cmp(b));
    times.dedup();
    for time in times {
        let mut til = fictitious_action(&format!("#til{time}"), time, true);
        for var in &task.variables {
            if let Some((value, _)) = var.initial_values.iter().find(|(_, t)| *t == time) {
                til.end_eff.push(Condition::new(var.index, *value));
            }
        }
        for var in &task.num_variables {
            if let Some((value, _)) = var.initial_values.iter().find(|(_, t)| *t == time) {
                til.end_num_eff.push(NumericEffect {
                    op: Assignment::Assign,
                    var: var.index,
                    exp: NumericExpression::Number(*value),
                });
            }
        }
        tree.add_fixed_step(til, time);
    }
    tree
}

fn fictitious_action(name: &str, duration: f64, is_til: bool) -> Action {
    Action {
        name: name.to_string(),
        duration: vec![Duration::fixed(duration)],
        is_til,
        fixed_duration: true,
        fixed_duration_value: duration,
        fixed_cost: true,
        ..Action::default()
    }
}

/// At-end conditions must be supported when added if some goal is
/// reachable that way from the whole domain of each variable.
fn check_force_at_end_conditions(task: &Task, tils: &[Action]) -> bool {
    let values: Vec<Vec<usize>> = task.variables.iter().map(|v| v.possible_values.clone()).collect();
    let rpg = Rpg::from_values(&values, task, true, tils);
    task.goals.iter().any(|g| rpg.is_executable(g))
}

/// Repeated states can be pruned unless some action sets a value at its
/// start, undoes it at its end, and another action needs that value in
/// between.
fn check_repeated_states(task: &Task) -> bool {
    for (i, a) in task.actions.iter().enumerate() {
        for s in &a.start_eff {
            let undone = a.end_eff.iter().any(|e| e.var == s.var && e.value != s.value);
            if undone && task.requirers(s.var, s.value).iter().any(|r| *r != i) {
                return false;
            }
        }
    }
    true
}

/// Goals that stop being reachable once some timed literal happens get a
/// deadline at the time of that literal.
fn calculate_deadlines(task: &mut Task, tils: &[Action], force_at_end: bool) {
    let goals = task.goal_list().to_vec();
    let mut deadlines = vec![f64::INFINITY; goals.len()];
    let mut availability = vec![f64::INFINITY; goals.len()];
    for i in (0..=tils.len()).rev() {
        let mut state = State::initial(task);
        for til in &tils[..i] {
            for e in &til.end_eff {
                state.set_value(e.var, e.value);
            }
        }
        let time = if i == 0 { 0.0 } else { tils[i - 1].fixed_duration_value };
        let rpg = Rpg::from_state(&state, task, force_at_end, &[]);
        for (j, g) in goals.iter().enumerate() {
            if !rpg.is_reachable(var_of(*g), value_of(*g)) {
                if availability[j] == f64::INFINITY {
                    deadlines[j] = time;
                }
            } else {
                availability[j] = time;
            }
        }
    }
    for (j, g) in goals.iter().enumerate() {
        if deadlines[j] < f64::INFINITY {
            debug!("goal {} has deadline {}", task.var_value_name(*g), deadlines[j]);
            task.add_goal_deadline(deadlines[j], *g);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::Schedule;
    use crate::testing::{
        chain_task, independent_task, init_tracing, irreversible_task, numeric_task, shared_resource_task,
        single_action_task, til_task, unreachable_task,
    };

    fn solve(task: Task) -> (Planner, PlanId) {
        init_tracing();
        let mut planner = Planner::new(task, PlannerConfig::default()).unwrap();
        let solution = planner.plan().unwrap();
        (planner, solution)
    }

    fn schedule(planner: &Planner, plan: PlanId) -> Schedule {
        Schedule::build(planner.task(), planner.tree(), planner.initial_state(), plan).unwrap()
    }

    #[test]
    fn test_single_action_plan() {
        let (planner, solution) = solve(single_action_task());
        assert!(planner.tree().get(solution).is_solution());
        let s = schedule(&planner, solution);
        assert_eq!(s.actions.len(), 1);
        assert_eq!(s.actions[0].name, "achieve");
        assert!((s.makespan - 1.0).abs() < 1e-6);
        assert_eq!(planner.profile(), DomainProfile::Reversible);
    }

    #[test]
    fn test_independent_actions_overlap() {
        let (planner, solution) = solve(independent_task());
        let s = schedule(&planner, solution);
        let mut names: Vec<&str> = s.actions.iter().map(|a| a.name.as_str()).collect();
        names.sort();
        assert_eq!(names, vec!["make-a", "make-b"]);
        assert!(s.orderings.is_empty());
        assert!(s.actions.iter().all(|a| a.start.abs() < 1e-6));
        assert!((s.makespan - 3.0).abs() < 0.05);
    }

    #[test]
    fn test_shared_resource_serializes_actions() {
        let (planner, solution) = solve(shared_resource_task());
        let s = schedule(&planner, solution);
        assert_eq!(s.actions.len(), 2);
        assert!((s.makespan - 5.0).abs() < 0.05);
        let (first, second) = (&s.actions[0], &s.actions[1]);
        assert!(second.start >= first.end);
    }

    #[test]
    fn test_unreachable_goal_stops_immediately() {
        init_tracing();
        let config = PlannerConfig {
            timeout: 30.0,
            ..PlannerConfig::default()
        };
        let mut planner = Planner::new(unreachable_task(), config).unwrap();
        assert!(planner.empty_search_space());
        assert_eq!(planner.plan(), None);
        assert_eq!(planner.stats().expanded_nodes, 0);
        assert!(!planner.time_exceeded());
    }

    #[test]
    fn test_chain_plan_follows_dependencies() {
        let (planner, solution) = solve(chain_task(4));
        let s = schedule(&planner, solution);
        let names: Vec<&str> = s.actions.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["step-0", "step-1", "step-2", "step-3"]);
        assert!(s.makespan >= 4.0);
        assert!(planner.stats().expanded_nodes >= 3);
    }

    #[test]
    fn test_timed_literal_delays_action() {
        let (planner, solution) = solve(til_task());
        assert_eq!(planner.tree().til_actions().len(), 1);
        assert!(planner.tree().is_root(planner.tree().root()));
        let s = schedule(&planner, solution);
        assert_eq!(s.actions.len(), 1);
        assert!(s.actions[0].start >= 5.0);
        assert!((s.makespan - 6.0).abs() < 0.05);
    }

    #[test]
    fn test_numeric_plan() {
        let (planner, solution) = solve(numeric_task());
        let s = schedule(&planner, solution);
        assert_eq!(s.actions.len(), 1);
        assert!((s.actions[0].duration - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_dead_ends_profile_solves() {
        let (planner, solution) = solve(irreversible_task());
        assert_eq!(planner.profile(), DomainProfile::DeadEnds);
        let s = schedule(&planner, solution);
        assert_eq!(s.actions.len(), 1);
        assert_eq!(s.actions[0].name, "burn");
    }

    #[test]
    fn test_forced_profile() {
        init_tracing();
        let config = PlannerConfig {
            profile: Some(DomainProfile::Concurrent),
            ..PlannerConfig::default()
        };
        let mut planner = Planner::new(chain_task(2), config).unwrap();
        assert_eq!(planner.profile(), DomainProfile::Concurrent);
        assert!(planner.plan().is_some());
    }

    #[test]
    fn test_driver_interface() {
        init_tracing();
        let mut planner = Planner::new(chain_task(2), PlannerConfig::default()).unwrap();
        let root = planner.tree().root();
        let queued = planner.selectors[0].len();
        planner.create_root();
        assert_eq!(planner.selectors[0].len(), queued);
        assert_eq!(planner.tree().children(root).len(), queued);
        let base = planner.poll().unwrap();
        let candidates = planner.possible_successors(base);
        assert!(!candidates.is_empty());
        let valid = vec![true; candidates.len()];
        planner.add_successors(base, &candidates, &valid);
        assert_eq!(planner.tree().children(base), candidates.as_slice());
        assert!(!planner.empty_search_space());
        assert!(planner.plan().is_some());
    }

    #[test]
    fn test_improve_keeps_solution() {
        init_tracing();
        let config = PlannerConfig {
            timeout: 2.0,
            ..PlannerConfig::default()
        };
        let mut planner = Planner::new(single_action_task(), config).unwrap();
        let first = planner.plan().unwrap();
        let best = planner.improve().unwrap();
        assert!(planner.tree().get(best).gc <= planner.tree().get(first).gc + EPSILON);
        assert!(planner.tree().get(best).is_solution());
    }

    #[test]
    fn test_setting_checks() {
        let task = chain_task(2);
        assert!(check_repeated_states(&task));
        assert!(check_force_at_end_conditions(&task, &[]));
        let tree = create_initial_plan(&til_task());
        let tils = tree.til_actions();
        assert_eq!(tils.len(), 1);
        assert_eq!(tils[0].name, "#til5");
        assert_eq!(tils[0].end_eff.len(), 1);
    }
}
