mod error;
mod loader;
mod model;
mod mutex;
mod numeric;

pub use error::{ModelError, Result};
pub use loader::{ActionSpec, ExpressionSpec, FactSpec, GoalSpec, TaskFile, VariableSpec};
pub use model::{
    Action, ActionId, Condition, Duration, DurationTime, Effect, GoalDeadline, NumericVariable,
    Task, Value, Variable, OBJECT_FALSE, OBJECT_TRUE, OBJECT_UNDEFINED,
};
pub use numeric::{
    Assignment, Comparator, Metric, MetricType, NumericCondition, NumericEffect, NumericExpression,
};
