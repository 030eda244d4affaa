use super::error::{ModelError, Result};
use super::model::{Condition, Duration, DurationTime, Task};
use super::numeric::{
    Assignment, Comparator, Metric, MetricType, NumericCondition, NumericEffect, NumericExpression,
};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Serialized task description, referencing variables and values by name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskFile {
    #[serde(default)]
    pub variables: Vec<VariableSpec>,
    #[serde(default)]
    pub numeric: Vec<NumericSpec>,
    #[serde(default)]
    pub mutex: Vec<(FactSpec, FactSpec)>,
    #[serde(default)]
    pub actions: Vec<ActionSpec>,
    #[serde(default)]
    pub goals: Vec<GoalSpec>,
    #[serde(default)]
    pub metric: Option<MetricSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableSpec {
    pub name: String,
    pub values: Vec<String>,
    /// Function index shared by the values; defaults to the variable index.
    #[serde(default)]
    pub function: Option<u32>,
    pub initial: String,
    #[serde(default)]
    pub timed: Vec<TimedValue<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimedValue<T> {
    pub time: f64,
    pub value: T,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NumericSpec {
    pub name: String,
    #[serde(default)]
    pub initial: f64,
    #[serde(default)]
    pub timed: Vec<TimedValue<f64>>,
}

/// `[variable, value]`
pub type FactSpec = (String, String);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExpressionSpec {
    Number(f64),
    /// `?duration`, `total-time` or a numeric variable name.
    Symbol(String),
    /// Single-entry map from an operator (`+ - * /`) to its operands.
    Apply(BTreeMap<String, Vec<ExpressionSpec>>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NumericConditionSpec {
    pub comp: String,
    pub lhs: ExpressionSpec,
    pub rhs: ExpressionSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NumericEffectSpec {
    pub op: String,
    pub var: String,
    pub exp: ExpressionSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionSpec {
    pub name: String,
    pub duration: ExpressionSpec,
    #[serde(default)]
    pub start: Vec<FactSpec>,
    #[serde(default)]
    pub over: Vec<FactSpec>,
    #[serde(default)]
    pub end: Vec<FactSpec>,
    #[serde(default)]
    pub start_effects: Vec<FactSpec>,
    #[serde(default)]
    pub end_effects: Vec<FactSpec>,
    #[serde(default)]
    pub start_numeric: Vec<NumericConditionSpec>,
    #[serde(default)]
    pub over_numeric: Vec<NumericConditionSpec>,
    #[serde(default)]
    pub end_numeric: Vec<NumericConditionSpec>,
    #[serde(default)]
    pub start_numeric_effects: Vec<NumericEffectSpec>,
    #[serde(default)]
    pub end_numeric_effects: Vec<NumericEffectSpec>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GoalSpec {
    #[serde(default)]
    pub facts: Vec<FactSpec>,
    #[serde(default)]
    pub numeric: Vec<NumericConditionSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricSpec {
    #[serde(rename = "type")]
    pub metric_type: MetricType,
    pub expression: ExpressionSpec,
}

impl TaskFile {
    /// Reads a task description; `.json` files are parsed as JSON, anything
    /// else as YAML.
    pub fn load_from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let reader = BufReader::new(
            File::open(path).with_context(|| format!("cannot open task file {}", path.display()))?,
        );
        let task = if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_reader(reader)?
        } else {
            serde_yaml::from_reader(reader)?
        };
        Ok(task)
    }

    pub fn from_yaml_str(s: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(s)?)
    }

    /// Builds and finalizes the task.
    pub fn into_task(&self) -> Result<Task> {
        let mut task = Task::new();
        let mut vars: BTreeMap<&str, usize> = BTreeMap::new();
        let mut num_vars: BTreeMap<&str, usize> = BTreeMap::new();

        for entry in &self.variables {
            let var = task.create_variable(entry.name.clone());
            let fnc = entry.function.unwrap_or(var as u32);
            for value in &entry.values {
                let value = task.create_value(value.clone(), fnc);
                task.add_possible_value(var, value)?;
            }
            vars.insert(entry.name.as_str(), var);
            let initial = lookup_value(&task, &entry.initial)?;
            task.add_initial_value(var, initial, true, 0.0)?;
            for timed in &entry.timed {
                let value = lookup_value(&task, &timed.value)?;
                task.add_initial_value(var, value, true, timed.time)?;
            }
        }
        for entry in &self.numeric {
            let var = task.create_numeric_variable(entry.name.clone());
            num_vars.insert(entry.name.as_str(), var);
            task.add_numeric_initial_value(var, entry.initial, 0.0)?;
            for timed in &entry.timed {
                task.add_numeric_initial_value(var, timed.value, timed.time)?;
            }
        }

        let names = Names {
            vars: &vars,
            num_vars: &num_vars,
        };
        for (f1, f2) in &self.mutex {
            let c1 = names.fact(&task, f1)?;
            let c2 = names.fact(&task, f2)?;
            task.add_mutex(c1.var, c1.value, c2.var, c2.value);
        }

        for entry in &self.actions {
            let duration = names.expression(&entry.duration)?;
            let start_cond = names.facts(&task, &entry.start)?;
            let over_cond = names.facts(&task, &entry.over)?;
            let end_cond = names.facts(&task, &entry.end)?;
            let start_eff = names.facts(&task, &entry.start_effects)?;
            let end_eff = names.facts(&task, &entry.end_effects)?;
            let start_num_cond = names.numeric_conditions(&entry.start_numeric)?;
            let over_num_cond = names.numeric_conditions(&entry.over_numeric)?;
            let end_num_cond = names.numeric_conditions(&entry.end_numeric)?;
            let start_num_eff = names.numeric_effects(&entry.start_numeric_effects)?;
            let end_num_eff = names.numeric_effects(&entry.end_numeric_effects)?;

            let action = task.create_action(entry.name.clone());
            action.duration = vec![Duration {
                time: DurationTime::AtStart,
                comp: Comparator::Eq,
                exp: duration,
            }];
            action.start_cond = start_cond;
            action.over_cond = over_cond;
            action.end_cond = end_cond;
            action.start_eff = start_eff;
            action.end_eff = end_eff;
            action.start_num_cond = start_num_cond;
            action.over_num_cond = over_num_cond;
            action.end_num_cond = end_num_cond;
            action.start_num_eff = start_num_eff;
            action.end_num_eff = end_num_eff;
        }

        for entry in &self.goals {
            let facts = names.facts(&task, &entry.facts)?;
            let numeric = names.numeric_conditions(&entry.numeric)?;
            let goal = task.create_goal();
            goal.start_cond = facts;
            goal.start_num_cond = numeric;
        }

        if let Some(metric) = &self.metric {
            let expression = names.metric(&metric.expression)?;
            task.set_metric(metric.metric_type, expression);
        }
        task.finalize()?;
        Ok(task)
    }
}

fn lookup_value(task: &Task, name: &str) -> Result<usize> {
    task.value_by_name(name).ok_or_else(|| ModelError::UnknownName {
        kind: "value",
        name: name.to_string(),
    })
}

struct Names<'a> {
    vars: &'a BTreeMap<&'a str, usize>,
    num_vars: &'a BTreeMap<&'a str, usize>,
}

impl Names<'_> {
    fn fact(&self, task: &Task, (var, value): &FactSpec) -> Result<Condition> {
        let var = *self.vars.get(var.as_str()).ok_or_else(|| ModelError::UnknownName {
            kind: "variable",
            name: var.clone(),
        })?;
        let value = lookup_value(task, value)?;
        if !task.variables[var].possible_values.contains(&value) {
            return Err(ModelError::InvalidInitialValue {
                variable: task.variables[var].name.clone(),
                value: task.values[value].name.clone(),
            });
        }
        Ok(Condition::new(var, value))
    }

    fn facts(&self, task: &Task, facts: &[FactSpec]) -> Result<Vec<Condition>> {
        facts.iter().map(|f| self.fact(task, f)).collect()
    }

    fn num_var(&self, name: &str) -> Result<usize> {
        self.num_vars
            .get(name)
            .copied()
            .ok_or_else(|| ModelError::UnknownName {
                kind: "numeric variable",
                name: name.to_string(),
            })
    }

    fn expression(&self, entry: &ExpressionSpec) -> Result<NumericExpression> {
        match entry {
            ExpressionSpec::Number(v) => Ok(NumericExpression::Number(*v)),
            ExpressionSpec::Symbol(s) if s == "?duration" => Ok(NumericExpression::Duration),
            ExpressionSpec::Symbol(s) if s == "#t" => {
                Err(ModelError::UnsupportedExpression("#t".to_string()))
            }
            ExpressionSpec::Symbol(s) => Ok(NumericExpression::Var(self.num_var(s)?)),
            ExpressionSpec::Apply(map) => {
                let (op, args) = single_entry(map)?;
                let terms = args
                    .iter()
                    .map(|a| self.expression(a))
                    .collect::<Result<Vec<_>>>()?;
                match op {
                    "+" => Ok(NumericExpression::Sum(terms)),
                    "-" => Ok(NumericExpression::Sub(terms)),
                    "*" => Ok(NumericExpression::Mul(terms)),
                    "/" => Ok(NumericExpression::Div(terms)),
                    other => Err(ModelError::UnsupportedExpression(other.to_string())),
                }
            }
        }
    }

    fn metric(&self, entry: &ExpressionSpec) -> Result<Metric> {
        match entry {
            ExpressionSpec::Number(v) => Ok(Metric::Number(*v)),
            ExpressionSpec::Symbol(s) if s == "total-time" => Ok(Metric::TotalTime),
            ExpressionSpec::Symbol(s) => Ok(Metric::Fluent(self.num_var(s)?)),
            ExpressionSpec::Apply(map) => {
                let (op, args) = single_entry(map)?;
                let terms = args
                    .iter()
                    .map(|a| self.metric(a))
                    .collect::<Result<Vec<_>>>()?;
                match op {
                    "+" => Ok(Metric::Plus(terms)),
                    "-" => Ok(Metric::Minus(terms)),
                    "*" => Ok(Metric::Mul(terms)),
                    "/" => Ok(Metric::Div(terms)),
                    other => Err(ModelError::UnsupportedExpression(other.to_string())),
                }
            }
        }
    }

    fn numeric_conditions(&self, specs: &[NumericConditionSpec]) -> Result<Vec<NumericCondition>> {
        specs
            .iter()
            .map(|c| {
                Ok(NumericCondition {
                    comp: parse_comparator(&c.comp)?,
                    lhs: self.expression(&c.lhs)?,
                    rhs: self.expression(&c.rhs)?,
                })
            })
            .collect()
    }

    fn numeric_effects(&self, specs: &[NumericEffectSpec]) -> Result<Vec<NumericEffect>> {
        specs
            .iter()
            .map(|e| {
                Ok(NumericEffect {
                    op: parse_assignment(&e.op)?,
                    var: self.num_var(&e.var)?,
                    exp: self.expression(&e.exp)?,
                })
            })
            .collect()
    }
}

fn single_entry(map: &BTreeMap<String, Vec<ExpressionSpec>>) -> Result<(&str, &[ExpressionSpec])> {
    match map.iter().next() {
        Some((op, args)) if map.len() == 1 => Ok((op.as_str(), args.as_slice())),
        _ => Err(ModelError::UnsupportedExpression(format!(
            "expected a single operator, got {:?}",
            map.keys().collect::<Vec<_>>()
        ))),
    }
}

fn parse_comparator(s: &str) -> Result<Comparator> {
    match s {
        "=" | "==" => Ok(Comparator::Eq),
        "<" => Ok(Comparator::Less),
        "<=" => Ok(Comparator::LessEq),
        ">" => Ok(Comparator::Greater),
        ">=" => Ok(Comparator::GreaterEq),
        "!=" => Ok(Comparator::NotEq),
        other => Err(ModelError::UnknownName {
            kind: "comparator",
            name: other.to_string(),
        }),
    }
}

fn parse_assignment(s: &str) -> Result<Assignment> {
    match s {
        "assign" => Ok(Assignment::Assign),
        "increase" => Ok(Assignment::Increase),
        "decrease" => Ok(Assignment::Decrease),
        "scale-up" => Ok(Assignment::ScaleUp),
        "scale-down" => Ok(Assignment::ScaleDown),
        other => Err(ModelError::UnknownName {
            kind: "assignment",
            name: other.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::var_value;

    const ROVER: &str = r#"
variables:
  - name: at
    values: [base, site]
    initial: base
  - name: sampled
    values: ["<true>", "<false>"]
    initial: "<false>"
numeric:
  - name: energy
    initial: 10
actions:
  - name: drive base site
    duration: {"/": [8, 2]}
    start: [[at, base]]
    end_effects: [[at, site]]
    start_numeric:
      - {comp: ">=", lhs: energy, rhs: 3}
    end_numeric_effects:
      - {op: decrease, var: energy, exp: 3}
  - name: sample site
    duration: 1
    over: [[at, site]]
    end_effects: [[sampled, "<true>"]]
goals:
  - facts: [[sampled, "<true>"]]
metric:
  type: minimize
  expression: total-time
"#;

    #[test]
    fn test_load_yaml_task() {
        let task = TaskFile::from_yaml_str(ROVER).unwrap().into_task().unwrap();
        assert_eq!(task.variables.len(), 2);
        assert_eq!(task.actions.len(), 2);
        assert_eq!(task.actions[0].fixed_duration_value, 4.0);
        assert_eq!(task.num_initial_state, vec![10.0]);
        let sampled_true = task.value_by_name("<true>").unwrap();
        assert_eq!(task.goal_list(), &[var_value(1, sampled_true)]);
        assert!(task.metric_depends_on_duration);
        assert_eq!(task.requirers(0, task.value_by_name("base").unwrap()), &[0]);
    }

    #[test]
    fn test_unknown_value_is_reported() {
        let yaml = r#"
variables:
  - name: at
    values: [base]
    initial: moon
"#;
        let err = TaskFile::from_yaml_str(yaml).unwrap().into_task().unwrap_err();
        assert!(matches!(err, ModelError::UnknownName { kind: "value", .. }));
    }

    #[test]
    fn test_sharp_t_is_rejected() {
        let yaml = r##"
variables:
  - name: at
    values: [base]
    initial: base
actions:
  - name: wait
    duration: "#t"
"##;
        let err = TaskFile::from_yaml_str(yaml).unwrap().into_task().unwrap_err();
        assert!(matches!(err, ModelError::UnsupportedExpression(_)));
    }
}
