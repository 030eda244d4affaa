use crate::task::{Action, Assignment, Condition, Task};

/// Discrete and numeric values of every task variable at one instant.
#[derive(Debug, Clone, PartialEq)]
pub struct State {
    pub values: Vec<u16>,
    pub numbers: Vec<f64>,
}

impl State {
    pub fn new(num_vars: usize, num_numeric: usize) -> Self {
        State {
            values: vec![0; num_vars],
            numbers: vec![0.0; num_numeric],
        }
    }

    pub fn initial(task: &Task) -> Self {
        State {
            values: task.initial_state.clone(),
            numbers: task.num_initial_state.clone(),
        }
    }

    #[inline]
    pub fn set_value(&mut self, var: usize, value: usize) {
        self.values[var] = value as u16;
    }

    #[inline]
    pub fn value(&self, var: usize) -> usize {
        self.values[var] as usize
    }

    /// Division by zero saturates to infinity.
    pub fn set_num_value(&mut self, var: usize, op: Assignment, value: f64) {
        let target = &mut self.numbers[var];
        match op {
            Assignment::Assign => *target = value,
            Assignment::Increase => *target += value,
            Assignment::Decrease => *target -= value,
            Assignment::ScaleUp => *target *= value,
            Assignment::ScaleDown => {
                if value != 0.0 {
                    *target /= value
                } else {
                    *target = f64::INFINITY
                }
            }
        }
    }

    #[inline]
    pub fn holds(&self, c: &Condition) -> bool {
        self.values[c.var] as usize == c.value
    }

    pub fn is_executable(&self, a: &Action) -> bool {
        a.all_conditions().all(|c| self.holds(c))
    }

    /// Rolling hash over the discrete values followed by the numeric values
    /// scaled to two decimals. Equal states always share a code.
    pub fn code(&self) -> u64 {
        let code = self
            .values
            .iter()
            .fold(0u64, |code, v| code.wrapping_mul(31).wrapping_add(*v as u64));
        self.numbers.iter().fold(code, |code, n| {
            code.wrapping_mul(31).wrapping_add((100.0 * n) as u64)
        })
    }

    pub fn to_string(&self, task: &Task) -> String {
        let mut s = String::from("STATE\n");
        for (i, v) in self.values.iter().enumerate() {
            s += &format!("* {} = {}\n", task.variables[i].name, task.values[*v as usize].name);
        }
        for (i, n) in self.numbers.iter().enumerate() {
            s += &format!("* {} = {}\n", task.num_variables[i].name, n);
        }
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_is_stable_and_discriminating() {
        let mut a = State::new(3, 1);
        a.values = vec![1, 0, 2];
        a.numbers = vec![1.25];
        let b = a.clone();
        assert_eq!(a.code(), b.code());
        assert_eq!(a, b);

        let mut c = a.clone();
        c.values[2] = 1;
        assert_ne!(a.code(), c.code());
        assert_ne!(a, c);
    }

    #[test]
    fn test_code_matches_rolling_formula() {
        let mut s = State::new(2, 1);
        s.values = vec![3, 4];
        s.numbers = vec![0.5];
        assert_eq!(s.code(), ((3 * 31) + 4) * 31 + 50);
    }

    #[test]
    fn test_set_num_value() {
        let mut s = State::new(0, 1);
        s.set_num_value(0, Assignment::Assign, 4.0);
        s.set_num_value(0, Assignment::Increase, 2.0);
        s.set_num_value(0, Assignment::ScaleUp, 0.5);
        assert_eq!(s.numbers[0], 3.0);
        s.set_num_value(0, Assignment::ScaleDown, 0.0);
        assert!(s.numbers[0].is_infinite());
    }

    #[test]
    fn test_is_executable() {
        let mut s = State::new(2, 0);
        s.values = vec![1, 0];
        let mut a = Action::default();
        a.start_cond.push(Condition::new(0, 1));
        a.end_cond.push(Condition::new(1, 0));
        assert!(s.is_executable(&a));
        s.set_value(1, 1);
        assert!(!s.is_executable(&a));
    }
}
