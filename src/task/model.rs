use super::error::{ModelError, Result};
use super::numeric::{Comparator, Metric, MetricType, NumericCondition, NumericEffect, NumericExpression};
use crate::encoding::{var_value, VarValue, EPSILON, FICTITIOUS_FUNCTION, MAX_ENCODED};

use std::collections::{HashMap, HashSet};

pub const OBJECT_TRUE: usize = 0;
pub const OBJECT_FALSE: usize = 1;
pub const OBJECT_UNDEFINED: usize = 2;

#[derive(Debug, Clone)]
pub struct Value {
    pub index: usize,
    /// Predicate or function the value was derived from.
    pub fnc_index: u32,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct Variable {
    pub index: usize,
    pub name: String,
    pub possible_values: Vec<usize>,
    /// `(value, time)` pairs; time 0 is the initial state, later times are
    /// timed initial literals.
    pub initial_values: Vec<(usize, f64)>,
}

impl Variable {
    pub fn add_possible_value(&mut self, value: usize) {
        if !self.possible_values.contains(&value) {
            self.possible_values.push(value);
        }
    }

    pub fn initial_state_value(&self) -> Option<usize> {
        self.initial_values
            .iter()
            .find(|(_, time)| *time == 0.0)
            .map(|(value, _)| *value)
    }

    pub fn opposite_value(&self, value: usize) -> Option<usize> {
        match self.possible_values.as_slice() {
            [a, b] if *a == value => Some(*b),
            [a, b] if *b == value => Some(*a),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NumericVariable {
    pub index: usize,
    pub name: String,
    pub initial_values: Vec<(f64, f64)>,
}

impl NumericVariable {
    /// A repeated time with the same value is ignored.
    pub fn add_initial_value(&mut self, value: f64, time: f64) -> Result<()> {
        if let Some((v, _)) = self.initial_values.iter().find(|(_, t)| *t == time) {
            if *v == value {
                return Ok(());
            }
            return Err(ModelError::ContradictoryNumericValue {
                variable: self.name.clone(),
                value,
                time,
            });
        }
        self.initial_values.push((value, time));
        Ok(())
    }

    pub fn initial_state_value(&self) -> f64 {
        self.initial_values
            .iter()
            .find(|(_, t)| *t == 0.0)
            .map_or(0.0, |(v, _)| *v)
    }
}

/// A `(variable, value)` condition or effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Condition {
    pub var: usize,
    pub value: usize,
    /// The owning action changes `var` to a different value.
    pub is_modified: bool,
}

pub type Effect = Condition;

impl Condition {
    pub fn new(var: usize, value: usize) -> Self {
        Condition {
            var,
            value,
            is_modified: false,
        }
    }

    #[inline]
    pub fn code(&self) -> VarValue {
        var_value(self.var, self.value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationTime {
    AtStart,
    AtEnd,
    OverAll,
    None,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Duration {
    pub time: DurationTime,
    pub comp: Comparator,
    pub exp: NumericExpression,
}

impl Duration {
    pub fn fixed(value: f64) -> Self {
        Duration {
            time: DurationTime::None,
            comp: Comparator::Eq,
            exp: NumericExpression::Number(value),
        }
    }
}

/// Grounded durative action, goal or fictitious action.
#[derive(Debug, Clone, Default)]
pub struct Action {
    pub index: usize,
    pub name: String,
    pub duration: Vec<Duration>,
    pub start_cond: Vec<Condition>,
    pub over_cond: Vec<Condition>,
    pub end_cond: Vec<Condition>,
    pub start_num_cond: Vec<NumericCondition>,
    pub over_num_cond: Vec<NumericCondition>,
    pub end_num_cond: Vec<NumericCondition>,
    pub start_eff: Vec<Effect>,
    pub end_eff: Vec<Effect>,
    pub start_num_eff: Vec<NumericEffect>,
    pub end_num_eff: Vec<NumericEffect>,
    pub is_goal: bool,
    pub is_til: bool,
    pub fixed_duration: bool,
    pub fixed_duration_value: f64,
    pub fixed_cost: bool,
    pub fixed_cost_value: f64,
}

impl Action {
    pub fn has_conditions(&self) -> bool {
        !(self.start_cond.is_empty() && self.over_cond.is_empty() && self.end_cond.is_empty())
    }

    pub fn all_conditions(&self) -> impl Iterator<Item = &Condition> {
        self.start_cond
            .iter()
            .chain(self.over_cond.iter())
            .chain(self.end_cond.iter())
    }

    pub fn all_effects(&self) -> impl Iterator<Item = &Effect> {
        self.start_eff.iter().chain(self.end_eff.iter())
    }

    pub fn has_numeric_conditions(&self) -> bool {
        !(self.start_num_cond.is_empty()
            && self.over_num_cond.is_empty()
            && self.end_num_cond.is_empty())
    }

    fn set_goal_cost(&mut self) {
        self.duration = vec![Duration::fixed(EPSILON)];
        self.fixed_duration = true;
        self.fixed_duration_value = EPSILON;
        self.fixed_cost = true;
        self.fixed_cost_value = 0.0;
    }

    /// Marks every condition whose variable the action sets to another value.
    fn mark_modified_conditions(&mut self) {
        let effects: Vec<Effect> = self.all_effects().copied().collect();
        for c in self
            .start_cond
            .iter_mut()
            .chain(self.over_cond.iter_mut())
            .chain(self.end_cond.iter_mut())
        {
            c.is_modified = effects.iter().any(|e| e.var == c.var && e.value != c.value);
        }
    }
}

/// Reference to an action stored in the task or in the plan tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ActionId {
    Task(usize),
    Goal(usize),
    /// Initial or timed-initial-literal action owned by the plan tree.
    Fictitious(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct GoalDeadline {
    pub time: f64,
    pub goals: Vec<VarValue>,
}

/// SAS+ task. Populated through the `create_*`/`add_*` operations and then
/// frozen by [`Task::finalize`].
#[derive(Debug, Clone)]
pub struct Task {
    pub variables: Vec<Variable>,
    pub values: Vec<Value>,
    pub num_variables: Vec<NumericVariable>,
    pub actions: Vec<Action>,
    pub goals: Vec<Action>,
    pub metric_type: MetricType,
    pub metric: Metric,
    pub metric_depends_on_duration: bool,
    /// `requirers[var][value]`: actions with that condition.
    pub requirers: Vec<Vec<Vec<usize>>>,
    /// `producers[var][value]`: actions with that effect.
    pub producers: Vec<Vec<Vec<usize>>>,
    pub actions_without_conditions: Vec<usize>,
    pub initial_state: Vec<u16>,
    pub num_initial_state: Vec<f64>,
    /// Some action has a cost that depends on the state.
    pub variable_costs: bool,
    pub num_goals_in_plateau: usize,
    pub(super) mutex: HashSet<u64>,
    pub(super) permanent_mutex: HashSet<u64>,
    pub(super) permanent_mutex_actions: HashSet<u64>,
    values_by_name: HashMap<String, usize>,
    goal_list: Vec<VarValue>,
    goal_deadlines: Vec<GoalDeadline>,
    modified_variables: Vec<bool>,
    finalized: bool,
}

impl Default for Task {
    fn default() -> Self {
        Task::new()
    }
}

impl Task {
    pub fn new() -> Self {
        let mut task = Task {
            variables: Vec::new(),
            values: Vec::new(),
            num_variables: Vec::new(),
            actions: Vec::new(),
            goals: Vec::new(),
            metric_type: MetricType::None,
            metric: Metric::default(),
            metric_depends_on_duration: false,
            requirers: Vec::new(),
            producers: Vec::new(),
            actions_without_conditions: Vec::new(),
            initial_state: Vec::new(),
            num_initial_state: Vec::new(),
            variable_costs: false,
            num_goals_in_plateau: 1,
            mutex: HashSet::new(),
            permanent_mutex: HashSet::new(),
            permanent_mutex_actions: HashSet::new(),
            values_by_name: HashMap::new(),
            goal_list: Vec::new(),
            goal_deadlines: Vec::new(),
            modified_variables: Vec::new(),
            finalized: false,
        };
        task.create_value("<true>", FICTITIOUS_FUNCTION);
        task.create_value("<false>", FICTITIOUS_FUNCTION);
        task.create_value("<undefined>", FICTITIOUS_FUNCTION);
        task
    }

    pub fn create_variable(&mut self, name: impl Into<String>) -> usize {
        let index = self.variables.len();
        self.variables.push(Variable {
            index,
            name: name.into(),
            possible_values: Vec::new(),
            initial_values: Vec::new(),
        });
        index
    }

    /// Values are interned by name; an existing name returns its index.
    pub fn create_value(&mut self, name: impl Into<String>, fnc_index: u32) -> usize {
        let name = name.into();
        if let Some(index) = self.values_by_name.get(&name) {
            return *index;
        }
        let index = self.values.len();
        self.values_by_name.insert(name.clone(), index);
        self.values.push(Value {
            index,
            fnc_index,
            name,
        });
        index
    }

    pub fn value_by_name(&self, name: &str) -> Option<usize> {
        self.values_by_name.get(name).copied()
    }

    pub fn create_numeric_variable(&mut self, name: impl Into<String>) -> usize {
        let index = self.num_variables.len();
        self.num_variables.push(NumericVariable {
            index,
            name: name.into(),
            initial_values: Vec::new(),
        });
        index
    }

    pub fn create_action(&mut self, name: impl Into<String>) -> &mut Action {
        let index = self.actions.len();
        self.actions.push(Action {
            index,
            name: name.into(),
            ..Action::default()
        });
        &mut self.actions[index]
    }

    pub fn create_goal(&mut self) -> &mut Action {
        let index = self.goals.len();
        self.goals.push(Action {
            index,
            name: "<goal>".to_string(),
            is_goal: true,
            ..Action::default()
        });
        &mut self.goals[index]
    }

    pub fn add_possible_value(&mut self, var: usize, value: usize) -> Result<()> {
        self.check_value(value)?;
        self.variable_mut(var)?.add_possible_value(value);
        Ok(())
    }

    /// Adds an initial value at `time`. A negated value on a binary variable
    /// stands for the other value of its domain.
    pub fn add_initial_value(&mut self, var: usize, value: usize, is_true: bool, time: f64) -> Result<()> {
        let value_name = self
            .values
            .get(value)
            .map(|v| v.name.clone())
            .ok_or(ModelError::IndexOutOfRange { kind: "value", index: value })?;
        let variable = self.variable_mut(var)?;
        if !variable.possible_values.contains(&value) {
            return Err(ModelError::InvalidInitialValue {
                variable: variable.name.clone(),
                value: value_name,
            });
        }
        let value = if is_true {
            value
        } else {
            variable
                .opposite_value(value)
                .ok_or_else(|| ModelError::NegatedNonBinary(variable.name.clone()))?
        };
        variable.initial_values.push((value, time));
        Ok(())
    }

    pub fn add_numeric_initial_value(&mut self, var: usize, value: f64, time: f64) -> Result<()> {
        self.num_variables
            .get_mut(var)
            .ok_or(ModelError::IndexOutOfRange { kind: "numeric variable", index: var })?
            .add_initial_value(value, time)
    }

    /// Declares `(var1, value1)` and `(var2, value2)` mutually exclusive.
    pub fn add_mutex(&mut self, var1: usize, value1: usize, var2: usize, value2: usize) {
        let vv1 = var_value(var1, value1);
        let vv2 = var_value(var2, value2);
        self.mutex.insert(crate::encoding::mutex_code(vv1, vv2));
        self.mutex.insert(crate::encoding::mutex_code(vv2, vv1));
    }

    pub fn is_mutex(&self, var1: usize, value1: usize, var2: usize, value2: usize) -> bool {
        let code = crate::encoding::mutex_code(var_value(var1, value1), var_value(var2, value2));
        self.mutex.contains(&code)
    }

    pub fn set_metric(&mut self, metric_type: MetricType, metric: Metric) {
        self.metric_type = metric_type;
        self.metric = metric;
    }

    fn variable_mut(&mut self, var: usize) -> Result<&mut Variable> {
        self.variables
            .get_mut(var)
            .ok_or(ModelError::IndexOutOfRange { kind: "variable", index: var })
    }

    fn check_value(&self, value: usize) -> Result<()> {
        if value < self.values.len() {
            Ok(())
        } else {
            Err(ModelError::IndexOutOfRange { kind: "value", index: value })
        }
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Runs the precomputation passes once the task is populated.
    pub fn finalize(&mut self) -> Result<()> {
        if self.finalized {
            return Ok(());
        }
        self.validate()?;
        for action in self.actions.iter_mut().chain(self.goals.iter_mut()) {
            action.mark_modified_conditions();
        }
        self.compute_initial_state()?;
        self.compute_requirers();
        self.compute_producers();
        self.compute_modified_variables();
        self.compute_permanent_mutex();
        self.compute_initial_actions_cost();
        self.compute_goal_list();
        self.finalized = true;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.variables.len() >= MAX_ENCODED || self.values.len() >= MAX_ENCODED {
            return Err(ModelError::EncodingLimit(format!(
                "{} variables, {} values",
                self.variables.len(),
                self.values.len()
            )));
        }
        let num_vars = self.num_variables.len();
        for action in self.actions.iter().chain(self.goals.iter()) {
            for c in action.all_conditions().chain(action.all_effects()) {
                if c.var >= self.variables.len() {
                    return Err(ModelError::IndexOutOfRange { kind: "variable", index: c.var });
                }
                self.check_value(c.value)?;
            }
            for e in action.start_num_eff.iter().chain(action.end_num_eff.iter()) {
                if e.var >= num_vars {
                    return Err(ModelError::IndexOutOfRange { kind: "numeric variable", index: e.var });
                }
            }
            if action.is_goal {
                continue;
            }
            match action.duration.as_slice() {
                [] => {
                    return Err(ModelError::UnsupportedDuration {
                        action: action.name.clone(),
                        reason: "missing duration",
                    })
                }
                [d] => {
                    if matches!(d.time, DurationTime::AtEnd | DurationTime::OverAll) {
                        return Err(ModelError::UnsupportedDuration {
                            action: action.name.clone(),
                            reason: "at-end or over-all durations are not supported",
                        });
                    }
                    if d.comp != Comparator::Eq {
                        return Err(ModelError::UnsupportedDuration {
                            action: action.name.clone(),
                            reason: "inequalities in durations are not supported",
                        });
                    }
                }
                _ => {
                    return Err(ModelError::UnsupportedDuration {
                        action: action.name.clone(),
                        reason: "duration intervals are not supported",
                    })
                }
            }
        }
        Ok(())
    }

    fn compute_initial_state(&mut self) -> Result<()> {
        self.initial_state = self
            .variables
            .iter()
            .map(|v| {
                v.initial_state_value()
                    .map(|value| value as u16)
                    .ok_or_else(|| ModelError::MissingInitialValue(v.name.clone()))
            })
            .collect::<Result<_>>()?;
        self.num_initial_state = self
            .num_variables
            .iter()
            .map(NumericVariable::initial_state_value)
            .collect();
        Ok(())
    }

    fn compute_requirers(&mut self) {
        let mut requirers = vec![vec![Vec::new(); self.values.len()]; self.variables.len()];
        self.actions_without_conditions.clear();
        for action in &self.actions {
            for c in action.all_conditions() {
                let req: &mut Vec<usize> = &mut requirers[c.var][c.value];
                if !req.contains(&action.index) {
                    req.push(action.index);
                }
            }
            if !action.has_conditions() {
                self.actions_without_conditions.push(action.index);
            }
        }
        self.requirers = requirers;
    }

    fn compute_producers(&mut self) {
        let mut producers = vec![vec![Vec::new(); self.values.len()]; self.variables.len()];
        for action in &self.actions {
            for e in action.all_effects() {
                let prod: &mut Vec<usize> = &mut producers[e.var][e.value];
                if !prod.contains(&action.index) {
                    prod.push(action.index);
                }
            }
        }
        self.producers = producers;
    }

    fn compute_modified_variables(&mut self) {
        let mut modified = vec![false; self.variables.len()];
        for e in self.actions.iter().flat_map(|a| a.all_effects()) {
            modified[e.var] = true;
        }
        self.modified_variables = modified;
    }

    fn compute_initial_actions_cost(&mut self) {
        let mut variables_on_metric = vec![false; self.num_variables.len()];
        self.metric_depends_on_duration = self.metric.mark_variables(&mut variables_on_metric);
        self.variable_costs = false;
        for i in 0..self.actions.len() {
            self.compute_fixed_action_cost(i, &variables_on_metric);
            if !self.actions[i].fixed_cost {
                self.variable_costs = true;
            }
        }
        for goal in &mut self.goals {
            goal.set_goal_cost();
        }
    }

    fn compute_fixed_action_cost(&mut self, index: usize, variables_on_metric: &[bool]) {
        let initial = &self.num_initial_state;
        let action = &self.actions[index];
        let fixed_duration = !action.duration.iter().any(|d| d.exp.depends_on_state(None));
        let fixed_duration_value = if fixed_duration {
            action.duration.first().map_or(EPSILON, |d| d.exp.evaluate_fixed(initial))
        } else {
            0.0
        };
        let fixed_cost = (fixed_duration || !self.metric_depends_on_duration)
            && !action
                .start_num_eff
                .iter()
                .chain(action.end_num_eff.iter())
                .any(|e| e.exp.depends_on_state(Some(variables_on_metric)));
        let action = &mut self.actions[index];
        action.fixed_duration = fixed_duration;
        action.fixed_duration_value = fixed_duration_value;
        action.fixed_cost = fixed_cost;
        if fixed_cost {
            let cost = self.action_cost(&self.actions[index], &self.num_initial_state, 0.0);
            self.actions[index].fixed_cost_value = cost;
        }
    }

    /// Increase of the metric caused by applying `action` in `num_state` after
    /// a plan of length `makespan`.
    pub fn action_cost(&self, action: &Action, num_state: &[f64], makespan: f64) -> f64 {
        let start = self.metric.evaluate(num_state, makespan);
        let duration = self.action_duration(action, num_state);
        if action.start_num_eff.is_empty() && action.end_num_eff.is_empty() {
            return self.metric.evaluate(num_state, makespan + duration) - start;
        }
        let mut next = num_state.to_vec();
        for e in action.start_num_eff.iter().chain(action.end_num_eff.iter()) {
            e.apply(&mut next, duration);
        }
        self.metric.evaluate(&next, makespan + duration) - start
    }

    /// Duration of `action` in the numeric state `s`. Duration forms are
    /// validated by [`Task::finalize`].
    pub fn action_duration(&self, action: &Action, s: &[f64]) -> f64 {
        if action.fixed_duration {
            return action.fixed_duration_value;
        }
        action
            .duration
            .first()
            .map_or(EPSILON, |d| d.exp.evaluate(s, 0.0))
    }

    pub fn evaluate_metric(&self, num_state: &[f64], makespan: f64) -> f64 {
        self.metric.evaluate(num_state, makespan)
    }

    fn compute_goal_list(&mut self) {
        let mut list = Vec::new();
        for c in self.goals.iter().flat_map(|g| g.all_conditions()) {
            let vv = c.code();
            if !list.contains(&vv) {
                list.push(vv);
            }
        }
        self.goal_list = list;
    }

    /// Deduplicated goal facts as variable-value codes.
    pub fn goal_list(&self) -> &[VarValue] {
        &self.goal_list
    }

    pub fn add_goal_deadline(&mut self, time: f64, goal: VarValue) {
        match self.goal_deadlines.iter_mut().find(|d| d.time == time) {
            Some(deadline) => deadline.goals.push(goal),
            None => self.goal_deadlines.push(GoalDeadline {
                time,
                goals: vec![goal],
            }),
        }
    }

    pub fn goal_deadlines(&self) -> &[GoalDeadline] {
        &self.goal_deadlines
    }

    pub fn is_modified(&self, var: usize) -> bool {
        self.modified_variables.get(var).copied().unwrap_or(false)
    }

    pub fn requirers(&self, var: usize, value: usize) -> &[usize] {
        &self.requirers[var][value]
    }

    pub fn producers(&self, var: usize, value: usize) -> &[usize] {
        &self.producers[var][value]
    }

    pub fn has_til(&self) -> bool {
        self.variables
            .iter()
            .any(|v| v.initial_values.iter().any(|(_, t)| *t > 0.0))
            || self
                .num_variables
                .iter()
                .any(|v| v.initial_values.iter().any(|(_, t)| *t > 0.0))
    }

    pub fn var_value_name(&self, vv: VarValue) -> String {
        let var = crate::encoding::var_of(vv);
        let value = crate::encoding::value_of(vv);
        format!("{}={}", self.variables[var].name, self.values[value].name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binary_task() -> (Task, usize) {
        let mut task = Task::new();
        let v = task.create_variable("door-open");
        task.add_possible_value(v, OBJECT_TRUE).unwrap();
        task.add_possible_value(v, OBJECT_FALSE).unwrap();
        (task, v)
    }

    #[test]
    fn test_default_values_and_interning() {
        let mut task = Task::new();
        assert_eq!(task.values.len(), 3);
        assert_eq!(task.value_by_name("<undefined>"), Some(OBJECT_UNDEFINED));
        let a = task.create_value("room1", 4);
        let b = task.create_value("room1", 7);
        assert_eq!(a, b);
        assert_eq!(task.values[a].fnc_index, 4);
    }

    #[test]
    fn test_negated_initial_value_on_binary_variable() {
        let (mut task, v) = binary_task();
        task.add_initial_value(v, OBJECT_TRUE, false, 0.0).unwrap();
        assert_eq!(task.variables[v].initial_state_value(), Some(OBJECT_FALSE));
    }

    #[test]
    fn test_negated_initial_value_on_non_binary_variable_fails() {
        let mut task = Task::new();
        let v = task.create_variable("at");
        for name in ["a", "b", "c"] {
            let value = task.create_value(name, 1);
            task.add_possible_value(v, value).unwrap();
        }
        let a = task.value_by_name("a").unwrap();
        assert!(matches!(
            task.add_initial_value(v, a, false, 0.0),
            Err(ModelError::NegatedNonBinary(_))
        ));
    }

    #[test]
    fn test_initial_value_outside_domain_fails() {
        let (mut task, v) = binary_task();
        assert!(matches!(
            task.add_initial_value(v, OBJECT_UNDEFINED, true, 0.0),
            Err(ModelError::InvalidInitialValue { .. })
        ));
    }

    #[test]
    fn test_duration_interval_is_rejected() {
        let (mut task, v) = binary_task();
        task.add_initial_value(v, OBJECT_FALSE, true, 0.0).unwrap();
        let a = task.create_action("open");
        a.duration = vec![Duration::fixed(1.0), Duration::fixed(2.0)];
        assert!(matches!(
            task.finalize(),
            Err(ModelError::UnsupportedDuration { .. })
        ));
    }

    #[test]
    fn test_requirers_producers_and_costs() {
        let (mut task, v) = binary_task();
        task.add_initial_value(v, OBJECT_FALSE, true, 0.0).unwrap();
        let open = task.create_action("open");
        open.duration = vec![Duration::fixed(2.0)];
        open.start_cond.push(Condition::new(v, OBJECT_FALSE));
        open.over_cond.push(Condition::new(v, OBJECT_FALSE));
        open.end_eff.push(Condition::new(v, OBJECT_TRUE));
        let goal = task.create_goal();
        goal.start_cond.push(Condition::new(v, OBJECT_TRUE));
        task.set_metric(MetricType::Minimize, Metric::TotalTime);
        task.finalize().unwrap();

        assert_eq!(task.initial_state, vec![OBJECT_FALSE as u16]);
        assert_eq!(task.requirers(v, OBJECT_FALSE), &[0]);
        assert_eq!(task.producers(v, OBJECT_TRUE), &[0]);
        assert!(task.actions_without_conditions.is_empty());
        assert!(task.actions[0].start_cond[0].is_modified);
        assert!(task.actions[0].fixed_duration);
        assert_eq!(task.actions[0].fixed_cost_value, 2.0);
        assert_eq!(task.goals[0].fixed_duration_value, EPSILON);
        assert_eq!(task.goal_list(), &[var_value(v, OBJECT_TRUE)]);
        assert!(task.is_modified(v));
    }

    #[test]
    fn test_goal_deadlines_merge_by_time() {
        let mut task = Task::new();
        task.add_goal_deadline(5.0, 1);
        task.add_goal_deadline(5.0, 2);
        task.add_goal_deadline(7.0, 3);
        assert_eq!(task.goal_deadlines().len(), 2);
        assert_eq!(task.goal_deadlines()[0].goals, vec![1, 2]);
    }
}
