use crate::encoding::{first_point, second_point, step_of, EPSILON};
use crate::linearizer::Linearizer;
use crate::plan::{PlanId, PlanTree};
use crate::state::State;
use crate::task::Task;

use anyhow::Context;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduledAction {
    pub name: String,
    pub start: f64,
    pub duration: f64,
    pub end: f64,
}

/// `from` is `None` when the initial state or a timed literal supports
/// the fact.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Link {
    pub from: Option<usize>,
    pub to: usize,
    pub fact: String,
}

/// Timed schedule of a solution plan. Times are relative to the first
/// action, or to time 0 when the task has timed literals. Links and
/// orderings refer to positions in `actions`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Schedule {
    pub makespan: f64,
    pub cost: f64,
    pub actions: Vec<ScheduledAction>,
    pub causal_links: Vec<Link>,
    pub orderings: Vec<(usize, usize)>,
}

impl Schedule {
    pub fn build(task: &Task, tree: &PlanTree, initial_state: &State, plan: PlanId) -> Option<Self> {
        let mut linearizer = Linearizer::new(initial_state.clone());
        let (steps, _) = linearizer.timed_steps(tree, task, plan)?;
        let origin = match steps.first() {
            Some(first) if !task.has_til() => first.start,
            _ => 0.0,
        };
        let index: HashMap<usize, usize> = steps.iter().enumerate().map(|(i, s)| (s.step, i)).collect();
        let actions: Vec<ScheduledAction> = steps
            .iter()
            .map(|s| ScheduledAction {
                name: s.name.clone(),
                start: s.start - origin,
                duration: s.duration,
                end: s.start - origin + s.duration,
            })
            .collect();
        let makespan = actions.iter().map(|a| a.end).fold(0.0, f64::max);

        let mut causal_links = Vec::new();
        let mut orderings = Vec::new();
        for c in tree.components(plan) {
            let p = tree.get(c);
            for cl in &p.causal_links {
                let Some(&to) = index.get(&step_of(cl.second_point())) else {
                    continue;
                };
                causal_links.push(Link {
                    from: index.get(&step_of(cl.first_point())).copied(),
                    to,
                    fact: task.var_value_name(cl.vv),
                });
            }
            for o in &p.orderings {
                let first = index.get(&step_of(first_point(*o)));
                let second = index.get(&step_of(second_point(*o)));
                if let (Some(&a), Some(&b)) = (first, second) {
                    if a != b && !orderings.contains(&(a, b)) {
                        orderings.push((a, b));
                    }
                }
            }
        }
        orderings.sort_unstable();

        Some(Schedule {
            makespan,
            cost: tree.get(plan).gc,
            actions,
            causal_links,
            orderings,
        })
    }

    pub fn to_pddl(&self) -> String {
        let mut res = String::new();
        for a in &self.actions {
            res += &format!("{:.3}: ({}) [{:.3}]\n", a.start, a.name, a.duration);
        }
        res += &format!(";Makespan: {}\n", (self.makespan + EPSILON / 2.0) as i64);
        res += &format!(";Actions: {}\n", self.actions.len());
        res
    }

    pub fn write_pddl(&self, path: &str) -> anyhow::Result<()> {
        std::fs::write(path, self.to_pddl()).with_context(|| format!("error writing schedule to {path}"))
    }

    pub fn write_json(&self, path: &str) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).with_context(|| format!("error writing schedule to {path}"))
    }
}
