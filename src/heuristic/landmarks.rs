use super::temporal_rpg::TemporalRpg;
use crate::encoding::{value_of, var_of, var_value, VarValue, FICTITIOUS_FUNCTION};
use crate::state::State;
use crate::task::{Action, Condition, Task};

use std::collections::{HashMap, HashSet};
use tracing::{debug, instrument, trace};

/// Delete-relaxed reachability check of the task goals with some facts or
/// actions forbidden.
pub struct LandmarkRpg<'a> {
    task: &'a Task,
    achieved_fluent: HashSet<VarValue>,
    achieved_action: Vec<bool>,
    remaining_goals: Vec<VarValue>,
}

impl<'a> LandmarkRpg<'a> {
    pub fn new(task: &'a Task) -> Self {
        LandmarkRpg {
            task,
            achieved_fluent: HashSet::new(),
            achieved_action: vec![false; task.actions.len()],
            remaining_goals: Vec::new(),
        }
    }

    /// True if the goals are unreachable once the facts in `excluded` can no
    /// longer be achieved.
    pub fn verify_fluents(&mut self, excluded: &[VarValue], state: &State) -> bool {
        let mut last_level = self.initialize(state);
        for vv in excluded {
            self.achieved_fluent.remove(vv);
        }
        let task = self.task;
        let allowed = |a: &Action| {
            !a.all_effects().any(|e| excluded.contains(&e.code()))
        };
        self.expand(&mut last_level, |vv| !excluded.contains(&vv), allowed, task);
        !self.remaining_goals.is_empty()
    }

    /// True if the goals are unreachable without the actions in `excluded`.
    pub fn verify_actions(&mut self, excluded: &[usize], state: &State) -> bool {
        let mut last_level = self.initialize(state);
        let task = self.task;
        self.expand(
            &mut last_level,
            |_| true,
            |a: &Action| !excluded.contains(&a.index),
            task,
        );
        !self.remaining_goals.is_empty()
    }

    fn initialize(&mut self, state: &State) -> Vec<VarValue> {
        self.achieved_fluent.clear();
        self.achieved_action.iter_mut().for_each(|a| *a = false);
        self.remaining_goals.clear();
        let mut last_level = Vec::with_capacity(state.values.len() * 2);
        for (var, value) in state.values.iter().enumerate() {
            let vv = var_value(var, *value as usize);
            last_level.push(vv);
            self.achieved_fluent.insert(vv);
        }
        for c in self.task.goals.iter().flat_map(|g| g.all_conditions()) {
            let vv = c.code();
            if !self.achieved_fluent.contains(&vv) && !self.remaining_goals.contains(&vv) {
                self.remaining_goals.push(vv);
            }
        }
        last_level
    }

    fn expand(
        &mut self,
        last_level: &mut Vec<VarValue>,
        expandable: impl Fn(VarValue) -> bool,
        allowed: impl Fn(&Action) -> bool,
        task: &Task,
    ) {
        let mut new_level: Vec<VarValue> = Vec::new();
        let mut first = true;
        while !self.remaining_goals.is_empty() && !last_level.is_empty() {
            new_level.clear();
            for vv in last_level.iter() {
                if !expandable(*vv) {
                    continue;
                }
                for &a in task.requirers(var_of(*vv), value_of(*vv)) {
                    self.try_action(&task.actions[a], &allowed, &mut new_level);
                }
            }
            if first {
                for &a in &task.actions_without_conditions {
                    self.try_action(&task.actions[a], &allowed, &mut new_level);
                }
                first = false;
            }
            self.swap_levels(last_level, &mut new_level);
        }
    }

    fn try_action(&mut self, a: &Action, allowed: &impl Fn(&Action) -> bool, new_level: &mut Vec<VarValue>) {
        if self.achieved_action[a.index] || !self.is_executable(a) || !allowed(a) {
            return;
        }
        self.achieved_action[a.index] = true;
        for e in a.all_effects() {
            let code = e.code();
            if !self.achieved_fluent.contains(&code) {
                new_level.push(code);
            }
        }
    }

    fn is_executable(&self, a: &Action) -> bool {
        a.all_conditions()
            .all(|c| self.achieved_fluent.contains(&c.code()))
    }

    fn swap_levels(&mut self, last_level: &mut Vec<VarValue>, new_level: &mut Vec<VarValue>) {
        last_level.clear();
        for code in new_level.drain(..) {
            if self.achieved_fluent.insert(code) {
                last_level.push(code);
            }
        }
        let achieved = &self.achieved_fluent;
        self.remaining_goals.retain(|g| !achieved.contains(g));
    }
}

/// Disjunctive landmark: facts of the same function, at least one of which
/// must be achieved. Facts are indices into the temporal graph.
#[derive(Debug, Clone, PartialEq)]
struct USet {
    id: u32,
    fluents: Vec<usize>,
    node: Option<usize>,
}

impl USet {
    fn new(fluent: usize, id: u32) -> Self {
        USet {
            id,
            fluents: vec![fluent],
            node: None,
        }
    }

    fn add(&mut self, fluent: usize) {
        if !self.fluents.contains(&fluent) {
            self.fluents.push(fluent);
        }
    }

    fn is_equal(&self, other: &USet) -> bool {
        self.id == other.id && self.fluents == other.fluents
    }
}

#[derive(Debug, Clone)]
enum TreeNode {
    Fact(usize),
    Disjunction(usize),
}

/// Necessary orderings between landmarks of the temporal graph.
struct LandmarkTree<'a> {
    task: &'a Task,
    state: &'a State,
    rpg: TemporalRpg<'a>,
    fluent_node: Vec<Option<usize>>,
    objs: Vec<Vec<usize>>,
    disj_objs: Vec<Vec<usize>>,
    sets: Vec<USet>,
    nodes: Vec<TreeNode>,
    edges: Vec<(usize, usize)>,
}

impl<'a> LandmarkTree<'a> {
    fn build(state: &'a State, task: &'a Task, tils: &'a [Action]) -> Self {
        let rpg = TemporalRpg::explore(task, tils, state);
        let num_levels = rpg.num_levels();
        let mut tree = LandmarkTree {
            task,
            state,
            fluent_node: vec![None; rpg.num_fluents()],
            objs: vec![Vec::new(); num_levels],
            disj_objs: vec![Vec::new(); num_levels],
            rpg,
            sets: Vec::new(),
            nodes: Vec::new(),
            edges: Vec::new(),
        };
        let goal_conditions: Vec<Condition> = task
            .goals
            .iter()
            .flat_map(|g| g.all_conditions().copied())
            .collect();
        for c in &goal_conditions {
            tree.add_goal_node(c);
        }
        tree.explore_rpg();
        tree.post_processing();
        tree
    }

    fn add_goal_node(&mut self, c: &Condition) {
        let Some(index) = self.rpg.fluent_index(c.var, c.value) else {
            return;
        };
        if self.fluent_node[index].is_some() {
            return;
        }
        self.rpg.fluent_mut(index).is_goal = true;
        self.fluent_node[index] = Some(self.nodes.len());
        self.nodes.push(TreeNode::Fact(index));
        let level = self.rpg.level_index(self.rpg.fluent(index).level);
        self.objs[level].push(index);
    }

    /// Backwards from the last level of the graph.
    fn explore_rpg(&mut self) {
        for level in (1..self.rpg.num_levels()).rev() {
            let mut i = 0;
            while i < self.objs[level].len() {
                let obj = self.objs[level][i];
                let producers = self.rpg.fluent(obj).producers.clone();
                if let Some(node) = self.fluent_node[obj] {
                    self.action_processing(&producers, node, level);
                }
                i += 1;
            }
            let mut i = 0;
            while i < self.disj_objs[level].len() {
                let set = self.disj_objs[level][i];
                let mut producers = Vec::new();
                let mut initial_state = false;
                for f in &self.sets[set].fluents {
                    let fluent = self.rpg.fluent(*f);
                    if fluent.level == 0.0 {
                        initial_state = true;
                        break;
                    }
                    producers.extend_from_slice(&fluent.producers);
                }
                if !initial_state {
                    if let Some(node) = self.sets[set].node {
                        self.action_processing(&producers, node, level);
                    }
                }
                i += 1;
            }
        }
    }

    fn condition_fluents<'b>(&'b self, a: &'b Action) -> impl Iterator<Item = usize> + 'b {
        a.all_conditions()
            .filter_map(|c| self.rpg.fluent_index(c.var, c.value))
    }

    fn action_processing(&mut self, producers: &[usize], goal_node: usize, level: usize) {
        if producers.is_empty() {
            return;
        }
        let task = self.task;
        let mut common = vec![0usize; self.rpg.num_fluents()];
        for a in producers {
            for f in self.condition_fluents(&task.actions[*a]) {
                common[f] += 1;
            }
        }
        let mut intersection = Vec::new();
        let mut union = Vec::new();
        for (f, count) in common.iter().enumerate() {
            if *count == producers.len() {
                intersection.push(f);
            } else if *count > 0 {
                union.push(f);
            }
        }

        for p in intersection {
            if !self.verify_fluent(p) {
                continue;
            }
            let node = match self.fluent_node[p] {
                Some(node) => node,
                None => {
                    let node = self.nodes.len();
                    self.nodes.push(TreeNode::Fact(p));
                    self.fluent_node[p] = Some(node);
                    trace!("landmark {}", self.fluent_name(p));
                    node
                }
            };
            self.edges.push((node, goal_node));
            let candidate_level = self.rpg.level_index(self.rpg.fluent(p).level);
            if !self.objs[candidate_level].contains(&p) {
                self.objs[candidate_level].push(p);
            }
        }

        for mut d2 in self.group_uset(&union, producers) {
            match self.find_disj_object(&d2, level) {
                Some(d1) => {
                    if let Some(node) = self.sets[d1].node {
                        self.edges.push((node, goal_node));
                    }
                }
                None => {
                    if !self.verify_set(&d2.fluents) {
                        continue;
                    }
                    let node = self.nodes.len();
                    let set = self.sets.len();
                    d2.node = Some(node);
                    let candidate_level = d2
                        .fluents
                        .iter()
                        .map(|f| self.rpg.level_index(self.rpg.fluent(*f).level))
                        .max()
                        .unwrap_or(0);
                    self.sets.push(d2);
                    self.nodes.push(TreeNode::Disjunction(set));
                    self.edges.push((node, goal_node));
                    self.disj_objs[candidate_level].push(set);
                }
            }
        }
    }

    fn find_disj_object(&self, u: &USet, level: usize) -> Option<usize> {
        let top = level.min(self.disj_objs.len().saturating_sub(1));
        (0..=top)
            .rev()
            .flat_map(|l| self.disj_objs[l].iter())
            .copied()
            .find(|s| u.is_equal(&self.sets[*s]))
    }

    fn fnc_index(&self, value: usize) -> u32 {
        self.task.values[value].fnc_index
    }

    fn matches(&self, set: &USet, c: &Condition) -> bool {
        set.fluents.iter().any(|f| {
            let fluent = self.rpg.fluent(*f);
            fluent.var == c.var && fluent.value == c.value
        })
    }

    /// Candidate disjunctions: the facts of `union` grouped by function,
    /// kept when each producer contributes exactly one fact to the group.
    fn group_uset(&self, union: &[usize], producers: &[usize]) -> Vec<USet> {
        let mut groups: Vec<USet> = Vec::new();
        let mut group_of: HashMap<u32, usize> = HashMap::new();
        for l in union {
            let f = self.fnc_index(self.rpg.fluent(*l).value);
            if f == FICTITIOUS_FUNCTION {
                continue;
            }
            match group_of.get(&f) {
                Some(g) => groups[*g].add(*l),
                None => {
                    group_of.insert(f, groups.len());
                    groups.push(USet::new(*l, f));
                }
            }
        }

        let mut res = Vec::new();
        for s in groups {
            if s.fluents.len() == 1 {
                continue;
            }
            let mut instances = 0;
            let mut actions = 0;
            for a in producers {
                let matched = self.task.actions[*a]
                    .all_conditions()
                    .filter(|c| self.matches(&s, c))
                    .count();
                instances += matched;
                if matched > 0 {
                    actions += 1;
                }
            }
            if actions == producers.len() && instances == actions {
                res.push(s);
            } else if actions == producers.len() && instances > producers.len() {
                self.analyze_set(&s, producers, &mut res);
            }
        }
        res
    }

    /// Splits a group that some producer feeds with several facts into sets
    /// holding one fact per producer.
    fn analyze_set(&self, s: &USet, producers: &[usize], res: &mut Vec<USet>) {
        let mut fluent_producers: Vec<Vec<usize>> = producers
            .iter()
            .map(|a| {
                self.task.actions[*a]
                    .all_conditions()
                    .filter(|c| self.fnc_index(c.value) == s.id)
                    .filter_map(|c| self.rpg.fluent_index(c.var, c.value))
                    .collect()
            })
            .collect();
        let Some((first, rest)) = fluent_producers.split_first_mut() else {
            return;
        };
        for l in first.iter() {
            let mut u = USet::new(*l, s.id);
            let mut complete = true;
            for action_fluents in rest.iter_mut() {
                if action_fluents.is_empty() {
                    complete = false;
                    break;
                }
                let k = self.equal_parameters(*l, action_fluents);
                u.add(action_fluents.remove(k));
            }
            if !complete {
                break;
            }
            res.push(u);
        }
    }

    /// Position of the fact in `candidates` whose value is named like the
    /// value of `l`, or the first one.
    fn equal_parameters(&self, l: usize, candidates: &[usize]) -> usize {
        let name = &self.task.values[self.rpg.fluent(l).value].name;
        candidates
            .iter()
            .position(|c| &self.task.values[self.rpg.fluent(*c).value].name == name)
            .unwrap_or(0)
    }

    fn verify_fluent(&self, p: usize) -> bool {
        let fluent = self.rpg.fluent(p);
        if fluent.is_goal {
            return true;
        }
        LandmarkRpg::new(self.task).verify_fluents(&[fluent.code()], self.state)
    }

    fn verify_set(&self, fluents: &[usize]) -> bool {
        let excluded: Vec<VarValue> = fluents
            .iter()
            .map(|f| self.rpg.fluent(*f))
            .filter(|f| !f.is_goal)
            .map(|f| f.code())
            .collect();
        if excluded.is_empty() {
            return true;
        }
        LandmarkRpg::new(self.task).verify_fluents(&excluded, self.state)
    }

    /// Drops the fact orderings whose supporting actions are not needed to
    /// reach the goals.
    fn post_processing(&mut self) {
        let n = self.nodes.len();
        let mut matrix = vec![vec![false; n]; n];
        for (n1, n2) in &self.edges {
            matrix[*n1][*n2] = true;
        }
        let mut verifier = LandmarkRpg::new(self.task);
        for i in 0..n {
            let TreeNode::Fact(l2) = self.nodes[i] else {
                continue;
            };
            for j in 0..n {
                let TreeNode::Fact(l1) = self.nodes[j] else {
                    continue;
                };
                if !matrix[j][i] {
                    continue;
                }
                let actions = self.actions_linking(l1, l2);
                if !verifier.verify_actions(&actions, self.state) {
                    matrix[j][i] = false;
                    self.edges.retain(|e| *e != (j, i));
                }
            }
        }
    }

    /// Producers of `l2` that have `l1` as a condition.
    fn actions_linking(&self, l1: usize, l2: usize) -> Vec<usize> {
        let target = self.rpg.fluent(l2);
        self.task
            .producers(target.var, target.value)
            .iter()
            .copied()
            .filter(|a| self.condition_fluents(&self.task.actions[*a]).any(|f| f == l1))
            .collect()
    }

    fn fluent_name(&self, f: usize) -> String {
        self.task.var_value_name(self.rpg.fluent(f).code())
    }

    fn node_facts(&self, node: usize) -> Vec<VarValue> {
        match &self.nodes[node] {
            TreeNode::Fact(f) => vec![self.rpg.fluent(*f).code()],
            TreeNode::Disjunction(s) => self.sets[*s]
                .fluents
                .iter()
                .map(|f| self.rpg.fluent(*f).code())
                .collect(),
        }
    }
}

/// Landmark with its successors in the landmark graph.
#[derive(Debug, Clone)]
pub struct LandmarkNode {
    pub index: usize,
    pub facts: Vec<VarValue>,
    pub next: Vec<usize>,
}

impl LandmarkNode {
    pub fn is_single(&self) -> bool {
        self.facts.len() == 1
    }
}

/// Landmark graph of a state: nodes are facts or fact disjunctions, edges
/// are necessary orderings.
#[derive(Debug, Clone, Default)]
pub struct Landmarks {
    pub nodes: Vec<LandmarkNode>,
}

impl Landmarks {
    #[instrument(skip_all, name = "landmarks", level = "debug")]
    pub fn new(state: &State, task: &Task, tils: &[Action]) -> Self {
        let tree = LandmarkTree::build(state, task, tils);
        let mut nodes: Vec<LandmarkNode> = (0..tree.nodes.len())
            .map(|i| LandmarkNode {
                index: i,
                facts: tree.node_facts(i),
                next: Vec::new(),
            })
            .collect();
        for (n1, n2) in &tree.edges {
            if !nodes[*n1].next.contains(n2) {
                nodes[*n1].next.push(*n2);
            }
        }
        debug!(
            "{} landmarks, {} orderings",
            nodes.len(),
            nodes.iter().map(|n| n.next.len()).sum::<usize>()
        );
        Landmarks { nodes }
    }

    /// Removes every ordering implied by a longer path.
    pub fn filter_transitive_orders(&mut self) {
        for i in 0..self.nodes.len() {
            let mut j = 0;
            while j < self.nodes[i].next.len() {
                let dst = self.nodes[i].next[j];
                if self.indirectly_reachable(i, dst) {
                    self.nodes[i].next.remove(j);
                } else {
                    j += 1;
                }
            }
        }
    }

    /// `dst` can be reached from `orig` through at least one other node.
    fn indirectly_reachable(&self, orig: usize, dst: usize) -> bool {
        let mut visited = vec![false; self.nodes.len()];
        visited[orig] = true;
        let mut stack: Vec<usize> = Vec::new();
        for adj in &self.nodes[orig].next {
            if *adj != dst && !visited[*adj] {
                visited[*adj] = true;
                stack.push(*adj);
            }
        }
        while let Some(current) = stack.pop() {
            for adj in &self.nodes[current].next {
                if *adj == dst {
                    return true;
                }
                if !visited[*adj] {
                    visited[*adj] = true;
                    stack.push(*adj);
                }
            }
        }
        false
    }

    pub fn to_string(&self, task: &Task) -> String {
        let facts = |n: &LandmarkNode| {
            n.facts
                .iter()
                .map(|vv| task.var_value_name(*vv))
                .collect::<Vec<_>>()
                .join(",")
        };
        let mut res = String::from("LANDMARKS:\n");
        for n in &self.nodes {
            res += &format!("Node {}: {}\n", n.index, facts(n));
            for adj in &n.next {
                res += &format!("    -> Node {}: {}\n", adj, facts(&self.nodes[*adj]));
            }
        }
        res
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::var_value;
    use crate::task::{Duration, OBJECT_FALSE, OBJECT_TRUE};
    use crate::testing::{chain_task, init_tracing};

    #[test]
    fn test_chain_facts_are_landmarks() {
        init_tracing();
        let task = chain_task(3);
        let state = State::initial(&task);
        let mut landmarks = Landmarks::new(&state, &task, &[]);
        landmarks.filter_transitive_orders();
        let facts: Vec<VarValue> = landmarks.nodes.iter().flat_map(|n| n.facts.clone()).collect();
        for var in 1..=3 {
            assert!(facts.contains(&var_value(var, OBJECT_TRUE)));
        }
        // Each step only points to the next one after filtering.
        for n in &landmarks.nodes {
            assert!(n.next.len() <= 1);
        }
    }

    #[test]
    fn test_accepted_landmarks_are_necessary() {
        let task = chain_task(3);
        let state = State::initial(&task);
        let landmarks = Landmarks::new(&state, &task, &[]);
        for n in landmarks.nodes.iter().filter(|n| n.is_single()) {
            let vv = n.facts[0];
            if task.goal_list().contains(&vv) || state.value(var_of(vv)) == value_of(vv) {
                continue;
            }
            assert!(LandmarkRpg::new(&task).verify_fluents(&[vv], &state));
        }
    }

    /// Two ways of reaching `goal`: through `a` or through `b`.
    fn alternative_task() -> Task {
        let mut task = Task::new();
        let a = task.create_variable("a");
        let b = task.create_variable("b");
        let goal = task.create_variable("goal");
        for v in [a, b, goal] {
            task.add_possible_value(v, OBJECT_TRUE).unwrap();
            task.add_possible_value(v, OBJECT_FALSE).unwrap();
            task.add_initial_value(v, OBJECT_FALSE, true, 0.0).unwrap();
        }
        for (name, var) in [("make-a", a), ("make-b", b)] {
            let act = task.create_action(name);
            act.duration = vec![Duration::fixed(1.0)];
            act.end_eff.push(Condition::new(var, OBJECT_TRUE));
        }
        for (name, var) in [("use-a", a), ("use-b", b)] {
            let act = task.create_action(name);
            act.duration = vec![Duration::fixed(1.0)];
            act.start_cond.push(Condition::new(var, OBJECT_TRUE));
            act.end_eff.push(Condition::new(goal, OBJECT_TRUE));
        }
        task.create_goal().start_cond.push(Condition::new(goal, OBJECT_TRUE));
        task.finalize().unwrap();
        task
    }

    #[test]
    fn test_alternatives_are_not_single_landmarks() {
        let task = alternative_task();
        let state = State::initial(&task);
        let mut verifier = LandmarkRpg::new(&task);
        assert!(!verifier.verify_fluents(&[var_value(0, OBJECT_TRUE)], &state));
        assert!(verifier.verify_fluents(
            &[var_value(0, OBJECT_TRUE), var_value(1, OBJECT_TRUE)],
            &state
        ));
        assert!(verifier.verify_actions(&[2, 3], &state));
        assert!(!verifier.verify_actions(&[2], &state));

        let landmarks = Landmarks::new(&state, &task, &[]);
        let singles: Vec<VarValue> = landmarks
            .nodes
            .iter()
            .filter(|n| n.is_single())
            .map(|n| n.facts[0])
            .collect();
        assert!(singles.contains(&var_value(2, OBJECT_TRUE)));
        assert!(!singles.contains(&var_value(0, OBJECT_TRUE)));
        assert!(!singles.contains(&var_value(1, OBJECT_TRUE)));
    }

    /// `at` moves from `l0` to `l1` or `l2`, and `g` needs the rover at one
    /// of them. With `aim`, the way through `l2` also needs `cam = l3`, a
    /// value of the same location function.
    fn location_task(aim: bool) -> Task {
        let mut task = Task::new();
        let at = task.create_variable("at");
        let locations: Vec<usize> = ["l0", "l1", "l2"]
            .iter()
            .map(|name| task.create_value(*name, 7))
            .collect();
        for l in &locations {
            task.add_possible_value(at, *l).unwrap();
        }
        task.add_initial_value(at, locations[0], true, 0.0).unwrap();
        let g = crate::testing::binary_var(&mut task, "g", OBJECT_FALSE);
        let cam = task.create_variable("cam");
        let m0 = task.create_value("m0", 8);
        let l3 = task.create_value("l3", 7);
        task.add_possible_value(cam, m0).unwrap();
        task.add_possible_value(cam, l3).unwrap();
        task.add_initial_value(cam, m0, true, 0.0).unwrap();

        for (name, to) in [("go1", locations[1]), ("go2", locations[2])] {
            let act = task.create_action(name);
            act.duration = vec![Duration::fixed(1.0)];
            act.start_cond.push(Condition::new(at, locations[0]));
            act.end_eff.push(Condition::new(at, to));
        }
        let act = task.create_action("aim");
        act.duration = vec![Duration::fixed(1.0)];
        act.start_cond.push(Condition::new(cam, m0));
        act.end_eff.push(Condition::new(cam, l3));
        for (name, from) in [("w1", locations[1]), ("w2", locations[2])] {
            let act = task.create_action(name);
            act.duration = vec![Duration::fixed(1.0)];
            act.start_cond.push(Condition::new(at, from));
            if aim && name == "w2" {
                act.start_cond.push(Condition::new(cam, l3));
            }
            act.end_eff.push(Condition::new(g, OBJECT_TRUE));
        }
        task.create_goal().start_cond.push(Condition::new(g, OBJECT_TRUE));
        task.finalize().unwrap();
        task
    }

    fn node_with(landmarks: &Landmarks, facts: &[VarValue]) -> Option<usize> {
        landmarks.nodes.iter().position(|n| {
            n.facts.len() == facts.len() && facts.iter().all(|f| n.facts.contains(f))
        })
    }

    #[test]
    fn test_same_function_values_form_disjunction() {
        init_tracing();
        let task = location_task(false);
        let state = State::initial(&task);
        let landmarks = Landmarks::new(&state, &task, &[]);
        let (l0, l1, l2) = (
            task.value_by_name("l0").unwrap(),
            task.value_by_name("l1").unwrap(),
            task.value_by_name("l2").unwrap(),
        );
        let goal = node_with(&landmarks, &[var_value(1, OBJECT_TRUE)]).unwrap();
        let either = node_with(&landmarks, &[var_value(0, l1), var_value(0, l2)]).unwrap();
        assert!(landmarks.nodes[either].next.contains(&goal));
        let start = node_with(&landmarks, &[var_value(0, l0)]).unwrap();
        assert!(landmarks.nodes[start].next.contains(&either));
    }

    #[test]
    fn test_producer_with_two_group_facts_is_split() {
        let task = location_task(true);
        let state = State::initial(&task);
        let landmarks = Landmarks::new(&state, &task, &[]);
        let (l1, l2) = (task.value_by_name("l1").unwrap(), task.value_by_name("l2").unwrap());
        let goal = node_with(&landmarks, &[var_value(1, OBJECT_TRUE)]).unwrap();
        // One fact per producer: `cam = l3` stays out of the disjunction.
        let either = node_with(&landmarks, &[var_value(0, l1), var_value(0, l2)]).unwrap();
        assert!(landmarks.nodes[either].next.contains(&goal));
        assert!(landmarks.nodes.iter().all(|n| n.facts.len() <= 2));
    }
}
