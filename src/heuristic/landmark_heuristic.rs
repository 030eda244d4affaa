use super::landmarks::Landmarks;
use crate::encoding::{value_of, var_of, VarValue};
use crate::state::State;
use crate::task::{Action, Task};

use tracing::debug;

#[derive(Debug, Clone)]
pub struct LandmarkCheck {
    facts: Vec<VarValue>,
    prev: Vec<usize>,
    next: Vec<usize>,
}

impl LandmarkCheck {
    pub fn is_single(&self) -> bool {
        self.facts.len() == 1
    }

    /// Some fact of the landmark holds in `s`.
    pub fn go_on(&self, s: &State) -> bool {
        self.facts
            .iter()
            .any(|vv| s.value(var_of(*vv)) == value_of(*vv))
    }

    pub fn is_goal(&self, task: &Task) -> bool {
        self.is_single() && task.goal_list().contains(&self.facts[0])
    }

    pub fn next(&self) -> &[usize] {
        &self.next
    }

    pub fn facts(&self) -> &[VarValue] {
        &self.facts
    }
}

/// Landmark graph compiled for counting: landmarks already holding in the
/// initial state are removed and the remaining sources become roots.
#[derive(Debug, Clone, Default)]
pub struct LandmarkHeuristic {
    nodes: Vec<LandmarkCheck>,
    root_nodes: Vec<usize>,
}

impl LandmarkHeuristic {
    pub fn new(state: &State, task: &Task, tils: &[Action]) -> Self {
        let mut landmarks = Landmarks::new(state, task, tils);
        landmarks.filter_transitive_orders();
        let mut nodes: Vec<LandmarkCheck> = landmarks
            .nodes
            .iter()
            .map(|n| LandmarkCheck {
                facts: n.facts.clone(),
                prev: Vec::new(),
                next: Vec::new(),
            })
            .collect();
        for n in &landmarks.nodes {
            for adj in &n.next {
                nodes[n.index].next.push(*adj);
                nodes[*adj].prev.push(n.index);
            }
        }

        let mut to_delete = vec![false; nodes.len()];
        let mut roots: Vec<usize> = Vec::new();
        let sources: Vec<usize> = (0..nodes.len()).filter(|i| nodes[*i].prev.is_empty()).collect();
        let mut stack: Vec<usize> = sources.into_iter().rev().collect();
        while let Some(n) = stack.pop() {
            if nodes[n].go_on(state) {
                if !to_delete[n] {
                    to_delete[n] = true;
                    stack.extend(nodes[n].next.iter().rev());
                }
            } else if !roots.contains(&n) {
                roots.push(n);
            }
        }

        let mut heuristic = LandmarkHeuristic::compact(nodes, &to_delete, &roots);
        let roots = heuristic.root_nodes.clone();
        heuristic
            .root_nodes
            .retain(|r| !has_root_predecessor(&heuristic.nodes, &roots, *r));
        debug!(
            "landmark heuristic: {} nodes, {} roots",
            heuristic.nodes.len(),
            heuristic.root_nodes.len()
        );
        heuristic
    }

    /// Drops deleted nodes and renumbers the rest.
    fn compact(nodes: Vec<LandmarkCheck>, deleted: &[bool], roots: &[usize]) -> Self {
        let mut mapping = vec![None; nodes.len()];
        let mut next_index = 0;
        for (i, d) in deleted.iter().enumerate() {
            if !d {
                mapping[i] = Some(next_index);
                next_index += 1;
            }
        }
        let remap = |v: &[usize]| v.iter().filter_map(|i| mapping[*i]).collect::<Vec<_>>();
        let compacted = nodes
            .iter()
            .enumerate()
            .filter(|(i, _)| !deleted[*i])
            .map(|(_, n)| LandmarkCheck {
                facts: n.facts.clone(),
                prev: remap(&n.prev),
                next: remap(&n.next),
            })
            .collect();
        LandmarkHeuristic {
            nodes: compacted,
            root_nodes: remap(roots),
        }
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn node(&self, index: usize) -> &LandmarkCheck {
        &self.nodes[index]
    }

    pub fn root_nodes(&self) -> &[usize] {
        &self.root_nodes
    }

    /// Single, non-goal landmarks.
    pub fn num_informative_nodes(&self, task: &Task) -> usize {
        self.nodes
            .iter()
            .filter(|n| n.is_single() && !n.is_goal(task))
            .count()
    }

    pub fn to_string(&self, task: &Task) -> String {
        let mut res = String::from("LANDMARKS:\n");
        for n in &self.nodes {
            let facts: Vec<String> = n.facts.iter().map(|vv| task.var_value_name(*vv)).collect();
            res += &format!("* ({}) Next: {}\n", facts.join(","), n.next.len());
        }
        res
    }
}

fn has_root_predecessor(nodes: &[LandmarkCheck], roots: &[usize], n: usize) -> bool {
    let mut visited = vec![false; nodes.len()];
    let mut stack = vec![n];
    while let Some(current) = stack.pop() {
        for p in &nodes[current].prev {
            if roots.contains(p) {
                return true;
            }
            if !visited[*p] {
                visited[*p] = true;
                stack.push(*p);
            }
        }
    }
    false
}

/// Landmarks achieved along one linearization of a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LandmarkProgress {
    checked: Vec<bool>,
    open: Vec<usize>,
}

impl LandmarkProgress {
    pub fn new(heuristic: &LandmarkHeuristic) -> Self {
        LandmarkProgress {
            checked: vec![false; heuristic.num_nodes()],
            open: heuristic.root_nodes.clone(),
        }
    }

    /// Checks the open landmarks holding in `state` and opens their
    /// successors.
    pub fn advance(&mut self, heuristic: &LandmarkHeuristic, state: &State) {
        let mut j = 0;
        while j < self.open.len() {
            let l = self.open[j];
            if heuristic.nodes[l].go_on(state) {
                self.checked[l] = true;
                self.open.remove(j);
                for al in &heuristic.nodes[l].next {
                    if !self.checked[*al] && !self.open.contains(al) {
                        self.open.push(*al);
                    }
                }
            } else {
                j += 1;
            }
        }
    }

    pub fn is_checked(&self, node: usize) -> bool {
        self.checked[node]
    }

    pub fn unchecked(&self) -> u16 {
        self.checked.iter().filter(|c| !**c).count().min(u16::MAX as usize) as u16
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::var_value;
    use crate::task::OBJECT_TRUE;
    use crate::testing::chain_task;

    #[test]
    fn test_initial_landmarks_are_removed() {
        let task = chain_task(3);
        let state = State::initial(&task);
        let h = LandmarkHeuristic::new(&state, &task, &[]);
        // p0 holds initially; p1..p3 remain.
        assert_eq!(h.num_nodes(), 3);
        assert_eq!(h.root_nodes().len(), 1);
        let root = h.node(h.root_nodes()[0]);
        assert_eq!(root.facts(), &[var_value(1, OBJECT_TRUE)]);
        assert_eq!(h.num_informative_nodes(&task), 2);
    }

    #[test]
    fn test_progress_follows_the_chain() {
        let task = chain_task(3);
        let mut state = State::initial(&task);
        let h = LandmarkHeuristic::new(&state, &task, &[]);
        let mut progress = LandmarkProgress::new(&h);
        assert_eq!(progress.unchecked(), 3);

        // Reaching p2 before p1 does not count: p2 is not open yet.
        state.set_value(2, OBJECT_TRUE);
        progress.advance(&h, &state);
        assert_eq!(progress.unchecked(), 3);

        state.set_value(1, OBJECT_TRUE);
        progress.advance(&h, &state);
        assert_eq!(progress.unchecked(), 1);
    }
}
