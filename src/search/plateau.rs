use super::queue::SearchQueue;
use super::selector::Selector;
use crate::config::PlateauConfig;
use crate::encoding::VarValue;
use crate::plan::{PlanId, PlanTree, SearchKey, DEFAULT_AUX_WEIGHT};
use crate::successors::Successors;
use crate::task::Task;

use rand::rngs::StdRng;
use rand::Rng;
use tracing::{debug, trace};

/// Single queue ordered on `g + w * h_aux`.
#[derive(Debug, Clone)]
pub struct PlateauSelector {
    queue: SearchQueue,
}

impl Default for PlateauSelector {
    fn default() -> Self {
        PlateauSelector::new(DEFAULT_AUX_WEIGHT)
    }
}

impl PlateauSelector {
    pub fn new(aux_weight: f64) -> Self {
        PlateauSelector {
            queue: SearchQueue::new(SearchKey::aux(aux_weight)),
        }
    }

    pub fn add(&mut self, tree: &PlanTree, id: PlanId) {
        self.queue.add(tree.get(id));
    }

    pub fn poll(&mut self) -> Option<PlanId> {
        self.queue.poll()
    }

    /// Removes and returns a plan picked uniformly at random.
    pub fn random_poll(&mut self, rng: &mut StdRng) -> Option<PlanId> {
        if self.queue.is_empty() {
            return None;
        }
        let next = self.queue.nth(rng.gen_range(0..self.queue.len()))?;
        self.queue.remove(next);
        Some(next)
    }

    pub fn export_to(&self, tree: &PlanTree, selector: &mut Selector) {
        for id in self.queue.ids() {
            selector.add(tree.get(id));
        }
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

/// Local search started from the best plan of a stalled search. It only
/// looks at the goals that are hardest to reach from that plan and stops
/// as soon as some plan beats `h_to_improve`.
#[derive(Debug, Clone)]
pub struct Plateau {
    selector: PlateauSelector,
    priority_goals: Vec<VarValue>,
    h_to_improve: u16,
    best_plan: Option<PlanId>,
    random_poll: bool,
}

impl Plateau {
    pub fn new(
        task: &Task,
        tree: &mut PlanTree,
        successors: &mut Successors,
        initial: PlanId,
        h_to_improve: u16,
        num_goals: usize,
        config: &PlateauConfig,
    ) -> Self {
        let priority_goals = Self::priority_goals(task, tree, successors, initial, num_goals);
        debug!(
            "plateau from plan {initial} (h={}) to beat h={h_to_improve} with {} priority goals",
            tree.get(initial).h,
            priority_goals.len()
        );
        let mut plateau = Plateau {
            selector: PlateauSelector::new(config.aux_weight),
            priority_goals,
            h_to_improve,
            best_plan: None,
            random_poll: config.random_poll,
        };
        plateau.add_open_nodes(tree, initial);
        plateau
    }

    /// The `num_goals` goal facts with the highest relaxed cost from the
    /// frontier state of `initial`.
    fn priority_goals(
        task: &Task,
        tree: &PlanTree,
        successors: &mut Successors,
        initial: PlanId,
        num_goals: usize,
    ) -> Vec<VarValue> {
        let goals = task.goal_list();
        let Some(state) = successors.frontier_state(task, tree, initial) else {
            return Vec::new();
        };
        let mut costs = successors.evaluator().goal_costs(task, &state);
        let mut res = Vec::with_capacity(num_goals);
        for _ in 0..num_goals.min(goals.len()) {
            let mut max = 0;
            for j in 1..costs.len() {
                if costs[j] > costs[max] {
                    max = j;
                }
            }
            res.push(goals[max]);
            costs[max] = 0;
        }
        res
    }

    /// Queues the open leaves below `id`. Expanded plans without children
    /// are reopened.
    fn add_open_nodes(&mut self, tree: &mut PlanTree, id: PlanId) {
        let mut stack = vec![id];
        while let Some(p) = stack.pop() {
            if tree.get(p).expanded() {
                if !tree.children(p).is_empty() {
                    stack.extend(tree.children(p).iter().rev());
                    continue;
                }
                tree.get_mut(p).children = None;
            }
            let plan = tree.get_mut(p);
            plan.h_aux = plan.h;
            self.selector.add(tree, p);
        }
    }

    /// Expands one plan. Returns true if a child improved `h_to_improve`.
    pub fn search_step(
        &mut self,
        task: &Task,
        tree: &mut PlanTree,
        successors: &mut Successors,
        num_goals: &mut usize,
        rng: &mut StdRng,
    ) -> bool {
        let base = loop {
            let next = if self.random_poll {
                self.selector.random_poll(rng)
            } else {
                self.selector.poll()
            };
            match next {
                None => return false,
                Some(p) if tree.get(p).expanded() => continue,
                Some(p) => break p,
            }
        };
        successors.set_priority_goals(Some(self.priority_goals.clone()));
        let children = successors.compute_successors_concurrent(task, tree, base);
        tree.set_children(base, children.clone());
        let mut improve = false;
        for child in children {
            self.selector.add(tree, child);
            let h = tree.get(child).h;
            if h < self.h_to_improve {
                trace!("plateau plan {child} improves h to {h}");
                improve = true;
                self.best_plan = Some(child);
                self.h_to_improve = h;
                if *num_goals > 1 {
                    *num_goals -= 1;
                }
            }
        }
        successors.set_priority_goals(None);
        improve
    }

    pub fn best_plan(&self) -> Option<PlanId> {
        self.best_plan
    }

    pub fn empty(&self) -> bool {
        self.selector.is_empty()
    }

    /// Hands the unexplored plans back to the main search.
    pub fn export_open_nodes(&self, tree: &PlanTree, selector: &mut Selector) {
        self.selector.export_to(tree, selector);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::State;
    use crate::task::{Action, ActionId};
    use crate::testing::{chain_task, independent_task, initial_action};

    use rand::SeedableRng;

    fn setup(task: &Task) -> (Successors, PlanTree) {
        let state = State::initial(task);
        let mut tree = PlanTree::new(initial_action(task));
        let mut succ = Successors::new(&state, task, Vec::new(), true, true);
        let root = tree.root();
        succ.evaluate(task, &mut tree, root);
        (succ, tree)
    }

    #[test]
    fn test_random_poll_drains_queue() {
        let mut tree = PlanTree::new(Action::default());
        let mut sel = PlateauSelector::default();
        for _ in 0..5 {
            let p = crate::plan::Plan::new(ActionId::Task(0), Some(tree.get(0)));
            let id = tree.push(p);
            sel.add(&tree, id);
        }
        let mut rng = StdRng::seed_from_u64(7);
        let mut polled: Vec<PlanId> = std::iter::from_fn(|| sel.random_poll(&mut rng)).collect();
        polled.sort();
        assert_eq!(polled, vec![1, 2, 3, 4, 5]);
        assert!(sel.is_empty());
    }

    #[test]
    fn test_aux_weight_orders_plateau_queue() {
        let mut tree = PlanTree::new(Action::default());
        let mut ids = Vec::new();
        for (g, h_aux) in [(1, 4), (5, 2)] {
            let mut p = crate::plan::Plan::new(ActionId::Task(0), Some(tree.get(0)));
            p.g = g;
            p.h_aux = h_aux;
            ids.push(tree.push(p));
        }
        // 1 + 3 * 4 = 13 against 5 + 3 * 2 = 11.
        let mut heavy = PlateauSelector::default();
        // 1 + 0.5 * 4 = 3 against 5 + 0.5 * 2 = 6.
        let mut light = PlateauSelector::new(0.5);
        for id in &ids {
            heavy.add(&tree, *id);
            light.add(&tree, *id);
        }
        assert_eq!(heavy.poll(), Some(ids[1]));
        assert_eq!(light.poll(), Some(ids[0]));
    }

    #[test]
    fn test_priority_goals_pick_hardest_goal() {
        let task = independent_task();
        let (mut succ, tree) = setup(&task);
        let root = tree.root();
        let goals = Plateau::priority_goals(&task, &tree, &mut succ, root, 1);
        assert_eq!(goals.len(), 1);
        assert!(task.goal_list().contains(&goals[0]));
        let all = Plateau::priority_goals(&task, &tree, &mut succ, root, 5);
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_search_step_improves_stalled_plan() {
        crate::testing::init_tracing();
        let task = chain_task(3);
        let (mut succ, mut tree) = setup(&task);
        let root = tree.root();
        let h = tree.get(root).h;
        let mut plateau = Plateau::new(&task, &mut tree, &mut succ, root, h, 1, &PlateauConfig::default());
        assert!(!plateau.empty());
        let mut num_goals = 2;
        let mut rng = StdRng::seed_from_u64(0);
        assert!(plateau.search_step(&task, &mut tree, &mut succ, &mut num_goals, &mut rng));
        assert_eq!(num_goals, 1);
        let best = plateau.best_plan().unwrap();
        assert_eq!(tree.plan_action(&task, best).name, "step-0");
        assert!(tree.get(best).h < h);
        assert!(tree.get(root).expanded());
        // Priority goals are only set during the step.
        let state = State::initial(&task);
        let e = succ.evaluator().evaluate(&task, &state, None);
        assert_eq!(e.h_aux, crate::encoding::H_INFINITY);
    }
}
