use crate::encoding::EPSILON;
use crate::task::{
    Action, Assignment, Comparator, Condition, Duration, NumericCondition, NumericEffect,
    NumericExpression, Task, OBJECT_FALSE, OBJECT_TRUE,
};

pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_env_filter("trace").try_init();
}

/// `#initial` action producing the initial discrete state of `task`.
pub(crate) fn initial_action(task: &Task) -> Action {
    let mut initial = Action {
        name: "#initial".to_string(),
        duration: vec![Duration::fixed(EPSILON)],
        ..Action::default()
    };
    for (var, value) in task.initial_state.iter().enumerate() {
        initial.end_eff.push(Condition::new(var, *value as usize));
    }
    initial
}

/// Binary variable with its initial value at time 0.
pub(crate) fn binary_var(task: &mut Task, name: &str, initial: usize) -> usize {
    let v = task.create_variable(name);
    task.add_possible_value(v, OBJECT_TRUE).unwrap();
    task.add_possible_value(v, OBJECT_FALSE).unwrap();
    task.add_initial_value(v, initial, true, 0.0).unwrap();
    v
}

/// `p0..pn`, only `p0` initially true; `step-i` needs `p_i` and produces
/// `p_{i+1}` after one time unit. The goal is `p_n`.
pub(crate) fn chain_task(n: usize) -> Task {
    let mut task = Task::new();
    let vars: Vec<usize> = (0..=n)
        .map(|i| {
            let initial = if i == 0 { OBJECT_TRUE } else { OBJECT_FALSE };
            binary_var(&mut task, &format!("p{i}"), initial)
        })
        .collect();
    for i in 0..n {
        let a = task.create_action(format!("step-{i}"));
        a.duration = vec![Duration::fixed(1.0)];
        a.start_cond.push(Condition::new(vars[i], OBJECT_TRUE));
        a.end_eff.push(Condition::new(vars[i + 1], OBJECT_TRUE));
    }
    task.create_goal()
        .start_cond
        .push(Condition::new(vars[n], OBJECT_TRUE));
    task.finalize().unwrap();
    task
}

/// The goal `g` has no producer; `wait` can always be applied.
pub(crate) fn unreachable_task() -> Task {
    let mut task = Task::new();
    let g = binary_var(&mut task, "g", OBJECT_FALSE);
    let a = task.create_action("wait");
    a.duration = vec![Duration::fixed(1.0)];
    a.start_cond.push(Condition::new(g, OBJECT_FALSE));
    task.create_goal().start_cond.push(Condition::new(g, OBJECT_TRUE));
    task.finalize().unwrap();
    task
}

/// One unconditioned action of duration 1 produces the goal.
pub(crate) fn single_action_task() -> Task {
    let mut task = Task::new();
    let g = binary_var(&mut task, "g", OBJECT_FALSE);
    let a = task.create_action("achieve");
    a.duration = vec![Duration::fixed(1.0)];
    a.end_eff.push(Condition::new(g, OBJECT_TRUE));
    task.create_goal().start_cond.push(Condition::new(g, OBJECT_TRUE));
    task.finalize().unwrap();
    task
}

/// Two goals reached by unrelated actions of durations 2 and 3.
pub(crate) fn independent_task() -> Task {
    let mut task = Task::new();
    let ga = binary_var(&mut task, "ga", OBJECT_FALSE);
    let gb = binary_var(&mut task, "gb", OBJECT_FALSE);
    for (name, var, d) in [("make-a", ga, 2.0), ("make-b", gb, 3.0)] {
        let a = task.create_action(name);
        a.duration = vec![Duration::fixed(d)];
        a.end_eff.push(Condition::new(var, OBJECT_TRUE));
    }
    let goal = task.create_goal();
    goal.start_cond.push(Condition::new(ga, OBJECT_TRUE));
    goal.start_cond.push(Condition::new(gb, OBJECT_TRUE));
    task.finalize().unwrap();
    task
}

/// Same as [`independent_task`] but both actions hold the `free` resource
/// while they run, so they cannot overlap.
pub(crate) fn shared_resource_task() -> Task {
    let mut task = Task::new();
    let free = binary_var(&mut task, "free", OBJECT_TRUE);
    let ga = binary_var(&mut task, "ga", OBJECT_FALSE);
    let gb = binary_var(&mut task, "gb", OBJECT_FALSE);
    for (name, var, d) in [("make-a", ga, 2.0), ("make-b", gb, 3.0)] {
        let a = task.create_action(name);
        a.duration = vec![Duration::fixed(d)];
        a.start_cond.push(Condition::new(free, OBJECT_TRUE));
        a.start_eff.push(Condition::new(free, OBJECT_FALSE));
        a.end_eff.push(Condition::new(free, OBJECT_TRUE));
        a.end_eff.push(Condition::new(var, OBJECT_TRUE));
    }
    let goal = task.create_goal();
    goal.start_cond.push(Condition::new(ga, OBJECT_TRUE));
    goal.start_cond.push(Condition::new(gb, OBJECT_TRUE));
    task.finalize().unwrap();
    task
}

/// The door opens at time 5 through a timed initial literal; `enter` needs
/// it open.
pub(crate) fn til_task() -> Task {
    let mut task = Task::new();
    let open = binary_var(&mut task, "open", OBJECT_FALSE);
    task.add_initial_value(open, OBJECT_TRUE, true, 5.0).unwrap();
    let inside = binary_var(&mut task, "inside", OBJECT_FALSE);
    let a = task.create_action("enter");
    a.duration = vec![Duration::fixed(1.0)];
    a.start_cond.push(Condition::new(open, OBJECT_TRUE));
    a.end_eff.push(Condition::new(inside, OBJECT_TRUE));
    task.create_goal()
        .start_cond
        .push(Condition::new(inside, OBJECT_TRUE));
    task.finalize().unwrap();
    task
}

/// `fly` burns 3 units of fuel out of 10 and needs at least 3 to start.
pub(crate) fn numeric_task() -> Task {
    let mut task = Task::new();
    let at = binary_var(&mut task, "at-dest", OBJECT_FALSE);
    let fuel = task.create_numeric_variable("fuel");
    task.add_numeric_initial_value(fuel, 10.0, 0.0).unwrap();
    let a = task.create_action("fly");
    a.duration = vec![Duration::fixed(2.0)];
    a.start_num_cond.push(NumericCondition {
        comp: Comparator::GreaterEq,
        lhs: NumericExpression::Var(fuel),
        rhs: NumericExpression::Number(3.0),
    });
    a.end_num_eff.push(NumericEffect {
        op: Assignment::Decrease,
        var: fuel,
        exp: NumericExpression::Number(3.0),
    });
    a.end_eff.push(Condition::new(at, OBJECT_TRUE));
    task.create_goal().start_cond.push(Condition::new(at, OBJECT_TRUE));
    task.finalize().unwrap();
    task
}

/// `burn` and `idle` both use up `fuel` for good; only `burn` reaches the
/// goal.
pub(crate) fn irreversible_task() -> Task {
    let mut task = Task::new();
    let fuel = binary_var(&mut task, "fuel", OBJECT_TRUE);
    let done = binary_var(&mut task, "done", OBJECT_FALSE);
    task.add_mutex(fuel, OBJECT_TRUE, fuel, OBJECT_FALSE);

    let burn = task.create_action("burn");
    burn.duration = vec![Duration::fixed(1.0)];
    burn.start_cond.push(Condition::new(fuel, OBJECT_TRUE));
    burn.end_eff.push(Condition::new(fuel, OBJECT_FALSE));
    burn.end_eff.push(Condition::new(done, OBJECT_TRUE));

    let idle = task.create_action("idle");
    idle.duration = vec![Duration::fixed(1.0)];
    idle.start_cond.push(Condition::new(fuel, OBJECT_TRUE));
    idle.end_eff.push(Condition::new(fuel, OBJECT_FALSE));

    task.create_goal().start_cond.push(Condition::new(done, OBJECT_TRUE));
    task.finalize().unwrap();
    task
}
