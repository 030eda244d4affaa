use super::queue::SearchQueue;
use crate::encoding::{EPSILON, H_INFINITY};
use crate::plan::{Plan, PlanId, PlanTree, QueueKind, SearchKey};

use tracing::trace;

/// Open plans kept in one or more queues with different keys. Every plan
/// sits in all of them; `poll` moves on to the next queue whenever the
/// current one stopped improving its heuristic.
#[derive(Debug, Clone)]
pub struct Selector {
    queues: Vec<SearchQueue>,
    current: usize,
    overall_best_h: u16,
    overall_best: Option<PlanId>,
    iterations_without_improving: usize,
}

impl Selector {
    pub fn new(keys: &[SearchKey]) -> Self {
        let queues = keys
            .iter()
            .map(|key| {
                let mut q = SearchQueue::new(*key);
                q.improved_h = true;
                q
            })
            .collect();
        Selector {
            queues,
            current: 0,
            overall_best_h: H_INFINITY,
            overall_best: None,
            iterations_without_improving: 0,
        }
    }

    /// Adds `plan` to every queue. Returns true if it has the best `h` seen
    /// so far.
    pub fn add(&mut self, plan: &Plan) -> bool {
        let q = &mut self.queues[self.current];
        let ph = plan.get_h(q.key().kind);
        if ph < q.best_h {
            q.improved_h = true;
            q.best_h = ph;
        }
        for q in &mut self.queues {
            q.add(plan);
        }
        if plan.h < self.overall_best_h {
            trace!("new best h {} from plan {}", plan.h, plan.id);
            self.iterations_without_improving = 0;
            self.overall_best_h = plan.h;
            self.overall_best = Some(plan.id);
            return true;
        }
        false
    }

    pub fn poll(&mut self) -> Option<PlanId> {
        if !self.queues[self.current].improved_h {
            self.current = (self.current + 1) % self.queues.len();
        }
        let next = self.queues[self.current].poll()?;
        for (i, q) in self.queues.iter_mut().enumerate() {
            if i != self.current {
                q.remove(next);
            }
        }
        self.queues[self.current].improved_h = false;
        self.iterations_without_improving += 1;
        Some(next)
    }

    pub fn in_plateau(&self, plateau_start: usize) -> bool {
        self.iterations_without_improving >= plateau_start
    }

    pub fn best_h(&self) -> u16 {
        self.overall_best_h
    }

    pub fn best_plan(&self) -> Option<PlanId> {
        self.overall_best
    }

    pub fn set_best_plan(&mut self, plan: &Plan) {
        self.iterations_without_improving = 0;
        self.overall_best = Some(plan.id);
        self.overall_best_h = plan.h;
    }

    pub fn set_iterations_without_improving(&mut self, n: usize) {
        self.iterations_without_improving = n;
    }

    pub fn len(&self) -> usize {
        self.queues.first().map_or(0, SearchQueue::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        for q in &mut self.queues {
            q.clear();
        }
    }
}

/// Queue for the search that keeps improving a solution: only plans
/// cheaper than the best solution, or as cheap and shorter, get in.
#[derive(Debug, Clone)]
pub struct QualitySelector {
    queue: SearchQueue,
    best_quality: f64,
    num_actions: u16,
}

impl QualitySelector {
    pub fn new(best_quality: f64, num_actions: u16) -> Self {
        QualitySelector {
            queue: SearchQueue::new(SearchKey::plateau(QueueKind::GHlandHff)),
            best_quality,
            num_actions,
        }
    }

    pub fn set_best(&mut self, best_quality: f64, num_actions: u16) {
        self.best_quality = best_quality;
        self.num_actions = num_actions;
    }

    pub fn improves(&self, plan: &Plan) -> bool {
        let distance = self.best_quality - plan.gc;
        distance > EPSILON || (distance >= 0.0 && plan.g < self.num_actions)
    }

    pub fn add(&mut self, plan: &Plan) {
        if self.improves(plan) {
            self.queue.add(plan);
        }
    }

    /// Next plan that still improves the best solution; the bound may have
    /// tightened since it was added.
    pub fn poll(&mut self, tree: &PlanTree) -> Option<PlanId> {
        while let Some(next) = self.queue.poll() {
            if self.improves(tree.get(next)) {
                return Some(next);
            }
        }
        None
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
