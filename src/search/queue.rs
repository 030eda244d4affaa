use crate::plan::{Plan, PlanId, SearchKey};

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, Copy)]
struct QueueEntry {
    value: f64,
    tie: f64,
    id: PlanId,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value
            .total_cmp(&other.value)
            .then_with(|| self.tie.total_cmp(&other.tie))
            // Older plans first among equals.
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// Open list ordered by one [`SearchKey`]. Plans can be removed by id so a
/// plan polled from one queue leaves the others too.
#[derive(Debug, Clone)]
pub struct SearchQueue {
    key: SearchKey,
    open: BTreeSet<QueueEntry>,
    entries: HashMap<PlanId, QueueEntry>,
    /// Lowest heuristic value added so far, as seen by this queue.
    pub best_h: f64,
    pub improved_h: bool,
}

impl SearchQueue {
    pub fn new(key: SearchKey) -> Self {
        SearchQueue {
            key,
            open: BTreeSet::new(),
            entries: HashMap::new(),
            best_h: f64::INFINITY,
            improved_h: false,
        }
    }

    pub fn key(&self) -> SearchKey {
        self.key
    }

    pub fn add(&mut self, plan: &Plan) {
        let (value, tie) = plan.priority(self.key);
        let entry = QueueEntry {
            value,
            tie,
            id: plan.id,
        };
        if let Some(old) = self.entries.insert(plan.id, entry) {
            self.open.remove(&old);
        }
        self.open.insert(entry);
    }

    pub fn poll(&mut self) -> Option<PlanId> {
        let entry = self.open.pop_first()?;
        self.entries.remove(&entry.id);
        Some(entry.id)
    }

    pub fn peek(&self) -> Option<PlanId> {
        self.open.first().map(|e| e.id)
    }

    pub fn remove(&mut self, id: PlanId) -> bool {
        match self.entries.remove(&id) {
            Some(entry) => self.open.remove(&entry),
            None => false,
        }
    }

    /// Plan at position `index` in queue order.
    pub fn nth(&self, index: usize) -> Option<PlanId> {
        self.open.iter().nth(index).map(|e| e.id)
    }

    pub fn ids(&self) -> impl Iterator<Item = PlanId> + '_ {
        self.open.iter().map(|e| e.id)
    }

    pub fn len(&self) -> usize {
        self.open.len()
    }

    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }

    pub fn clear(&mut self) {
        self.open.clear();
        self.entries.clear();
    }
}
