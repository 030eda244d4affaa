use serde::{Deserialize, Serialize};

/// Numeric expression over the numeric state and the duration of the
/// action being applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumericExpression {
    Number(f64),
    Var(usize),
    Duration,
    Sum(Vec<NumericExpression>),
    Sub(Vec<NumericExpression>),
    Mul(Vec<NumericExpression>),
    Div(Vec<NumericExpression>),
}

impl NumericExpression {
    pub fn evaluate(&self, state: &[f64], duration: f64) -> f64 {
        match self {
            NumericExpression::Number(v) => *v,
            NumericExpression::Var(var) => state[*var],
            NumericExpression::Duration => duration,
            NumericExpression::Sum(terms) => fold(terms, state, duration, |a, b| a + b),
            NumericExpression::Sub(terms) => fold(terms, state, duration, |a, b| a - b),
            NumericExpression::Mul(terms) => fold(terms, state, duration, |a, b| a * b),
            NumericExpression::Div(terms) => fold(terms, state, duration, |a, b| a / b),
        }
    }

    /// Value of the expression when every variable takes its initial value,
    /// as used for fixed durations. A unary minus negates its operand.
    pub fn evaluate_fixed(&self, initial: &[f64]) -> f64 {
        match self {
            NumericExpression::Number(v) => *v,
            NumericExpression::Var(var) => initial.get(*var).copied().unwrap_or(0.0),
            NumericExpression::Duration => 0.0,
            NumericExpression::Sub(terms) if terms.len() == 1 => -terms[0].evaluate_fixed(initial),
            NumericExpression::Sum(terms)
            | NumericExpression::Sub(terms)
            | NumericExpression::Mul(terms)
            | NumericExpression::Div(terms) => {
                let mut iter = terms.iter().map(|t| t.evaluate_fixed(initial));
                let first = iter.next().unwrap_or(0.0);
                iter.fold(first, |acc, t| match self {
                    NumericExpression::Sum(_) => acc + t,
                    NumericExpression::Sub(_) => acc - t,
                    NumericExpression::Mul(_) => acc * t,
                    _ => acc / t,
                })
            }
        }
    }

    /// Whether the expression reads some numeric variable. With a filter, only
    /// the variables flagged in it count.
    pub fn depends_on_state(&self, filter: Option<&[bool]>) -> bool {
        match self {
            NumericExpression::Var(var) => filter.map_or(true, |f| f[*var]),
            NumericExpression::Sum(terms)
            | NumericExpression::Sub(terms)
            | NumericExpression::Mul(terms)
            | NumericExpression::Div(terms) => terms.iter().any(|t| t.depends_on_state(filter)),
            _ => false,
        }
    }

    pub fn collect_vars(&self, out: &mut Vec<usize>) {
        match self {
            NumericExpression::Var(var) => {
                if !out.contains(var) {
                    out.push(*var);
                }
            }
            NumericExpression::Sum(terms)
            | NumericExpression::Sub(terms)
            | NumericExpression::Mul(terms)
            | NumericExpression::Div(terms) => terms.iter().for_each(|t| t.collect_vars(out)),
            _ => {}
        }
    }
}

fn fold(
    terms: &[NumericExpression],
    state: &[f64],
    duration: f64,
    op: impl Fn(f64, f64) -> f64,
) -> f64 {
    let Some((first, rest)) = terms.split_first() else {
        return 0.0;
    };
    rest.iter().fold(first.evaluate(state, duration), |acc, t| {
        op(acc, t.evaluate(state, duration))
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparator {
    Eq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    NotEq,
}

impl Comparator {
    pub fn holds(self, v1: f64, v2: f64) -> bool {
        match self {
            Comparator::Eq => v1 == v2,
            Comparator::Less => v1 < v2,
            Comparator::LessEq => v1 <= v2,
            Comparator::Greater => v1 > v2,
            Comparator::GreaterEq => v1 >= v2,
            Comparator::NotEq => v1 != v2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericCondition {
    pub comp: Comparator,
    pub lhs: NumericExpression,
    pub rhs: NumericExpression,
}

impl NumericCondition {
    pub fn holds(&self, state: &[f64], duration: f64) -> bool {
        self.comp
            .holds(self.lhs.evaluate(state, duration), self.rhs.evaluate(state, duration))
    }

    pub fn collect_vars(&self, out: &mut Vec<usize>) {
        self.lhs.collect_vars(out);
        self.rhs.collect_vars(out);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Assignment {
    Assign,
    Increase,
    Decrease,
    ScaleUp,
    ScaleDown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericEffect {
    pub op: Assignment,
    pub var: usize,
    pub exp: NumericExpression,
}

impl NumericEffect {
    /// Applies the effect in place. The expression reads the state before
    /// the update.
    pub fn apply(&self, state: &mut [f64], duration: f64) {
        let v = self.exp.evaluate(state, duration);
        let target = &mut state[self.var];
        match self.op {
            Assignment::Assign => *target = v,
            Assignment::Increase => *target += v,
            Assignment::Decrease => *target -= v,
            Assignment::ScaleUp => *target *= v,
            Assignment::ScaleDown => *target /= v,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    Minimize,
    Maximize,
    #[default]
    None,
}

/// Plan-quality metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Number(f64),
    TotalTime,
    Fluent(usize),
    /// Preference violation; preferences are not tracked and always count 0.
    Violated(usize),
    Plus(Vec<Metric>),
    Minus(Vec<Metric>),
    Mul(Vec<Metric>),
    Div(Vec<Metric>),
}

impl Default for Metric {
    fn default() -> Self {
        Metric::Number(0.0)
    }
}

impl Metric {
    pub fn evaluate(&self, state: &[f64], makespan: f64) -> f64 {
        match self {
            Metric::Number(v) => *v,
            Metric::TotalTime => makespan,
            Metric::Fluent(var) => state[*var],
            Metric::Violated(_) => 0.0,
            Metric::Plus(terms) | Metric::Minus(terms) | Metric::Mul(terms) | Metric::Div(terms) => {
                let Some((first, rest)) = terms.split_first() else {
                    return 0.0;
                };
                let v = first.evaluate(state, makespan);
                if rest.is_empty() {
                    return if matches!(self, Metric::Minus(_)) { -v } else { v };
                }
                rest.iter().fold(v, |acc, t| {
                    let t = t.evaluate(state, makespan);
                    match self {
                        Metric::Plus(_) => acc + t,
                        Metric::Minus(_) => acc - t,
                        Metric::Mul(_) => acc * t,
                        _ => acc / t,
                    }
                })
            }
        }
    }

    /// Flags the numeric variables read by the metric and returns whether the
    /// metric depends on the plan duration.
    pub fn mark_variables(&self, used: &mut [bool]) -> bool {
        match self {
            Metric::TotalTime => true,
            Metric::Fluent(var) => {
                used[*var] = true;
                false
            }
            Metric::Plus(terms) | Metric::Minus(terms) | Metric::Mul(terms) | Metric::Div(terms) => {
                terms
                    .iter()
                    .fold(false, |acc, t| t.mark_variables(used) || acc)
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expression_evaluation() {
        let e = NumericExpression::Sum(vec![
            NumericExpression::Var(0),
            NumericExpression::Mul(vec![
                NumericExpression::Number(2.0),
                NumericExpression::Duration,
            ]),
        ]);
        assert_eq!(e.evaluate(&[1.5], 3.0), 7.5);
        assert!(e.depends_on_state(None));
        assert!(!e.depends_on_state(Some(&[false])));
    }

    #[test]
    fn test_fixed_expression_uses_initial_values() {
        let e = NumericExpression::Sub(vec![NumericExpression::Var(1)]);
        assert_eq!(e.evaluate_fixed(&[0.0, 4.0]), -4.0);
        let d = NumericExpression::Div(vec![
            NumericExpression::Number(9.0),
            NumericExpression::Number(3.0),
        ]);
        assert_eq!(d.evaluate_fixed(&[]), 3.0);
    }

    #[test]
    fn test_numeric_effects() {
        let mut state = vec![10.0, 2.0];
        let effect = NumericEffect {
            op: Assignment::Decrease,
            var: 0,
            exp: NumericExpression::Var(1),
        };
        effect.apply(&mut state, 0.0);
        assert_eq!(state[0], 8.0);
        let scale = NumericEffect {
            op: Assignment::ScaleDown,
            var: 0,
            exp: NumericExpression::Number(4.0),
        };
        scale.apply(&mut state, 0.0);
        assert_eq!(state[0], 2.0);
    }

    #[test]
    fn test_comparators() {
        let cond = NumericCondition {
            comp: Comparator::GreaterEq,
            lhs: NumericExpression::Var(0),
            rhs: NumericExpression::Number(5.0),
        };
        assert!(cond.holds(&[5.0], 0.0));
        assert!(!cond.holds(&[4.9], 0.0));
        assert!(Comparator::NotEq.holds(1.0, 2.0));
        assert!(!Comparator::Less.holds(2.0, 2.0));
    }

    #[test]
    fn test_metric() {
        let metric = Metric::Plus(vec![
            Metric::TotalTime,
            Metric::Mul(vec![Metric::Number(2.0), Metric::Fluent(0)]),
        ]);
        assert_eq!(metric.evaluate(&[3.0], 1.5), 7.5);
        let mut used = vec![false];
        assert!(metric.mark_variables(&mut used));
        assert!(used[0]);
        assert_eq!(Metric::Minus(vec![Metric::Number(2.0)]).evaluate(&[], 0.0), -2.0);
    }
}
