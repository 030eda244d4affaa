use super::landmark_heuristic::{LandmarkHeuristic, LandmarkProgress};
use super::rpg::Rpg;
use crate::encoding::{VarValue, H_INFINITY};
use crate::state::State;
use crate::task::{Action, Task};

use tracing::trace;

/// Heuristic values of one plan node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluation {
    pub h: u16,
    pub h_aux: u16,
    pub h_land: u16,
}

impl Default for Evaluation {
    fn default() -> Self {
        Evaluation {
            h: H_INFINITY,
            h_aux: H_INFINITY,
            h_land: u16::MAX,
        }
    }
}

/// Computes hFF on frontier states, plus the count of landmarks the
/// linearization left unchecked.
#[derive(Debug, Clone)]
pub struct Evaluator {
    force_at_end: bool,
    tils: Vec<Action>,
    landmarks: LandmarkHeuristic,
    priority_goals: Option<Vec<VarValue>>,
}

impl Evaluator {
    pub fn new(state: &State, task: &Task, tils: Vec<Action>, force_at_end: bool) -> Self {
        let landmarks = LandmarkHeuristic::new(state, task, &tils);
        Evaluator {
            force_at_end,
            tils,
            landmarks,
            priority_goals: None,
        }
    }

    pub fn evaluate(&self, task: &Task, state: &State, progress: Option<&LandmarkProgress>) -> Evaluation {
        let mut rpg = Rpg::from_state(state, task, self.force_at_end, &self.tils);
        let mutex = task.has_permanent_mutex_action();
        let h = rpg.evaluate(mutex);
        let h_aux = match &self.priority_goals {
            Some(goals) => rpg.evaluate_goals(goals, mutex),
            None => H_INFINITY,
        };
        let h_land = progress.map_or(0, LandmarkProgress::unchecked);
        trace!("evaluated state: h={h} h_aux={h_aux} h_land={h_land}");
        Evaluation { h, h_aux, h_land }
    }

    /// Relaxed cost of each goal fact of the task on its own, in
    /// [`Task::goal_list`] order.
    pub fn goal_costs(&self, task: &Task, state: &State) -> Vec<u16> {
        let mut rpg = Rpg::from_state(state, task, self.force_at_end, &self.tils);
        let mutex = task.has_permanent_mutex_action();
        task.goal_list()
            .iter()
            .map(|g| rpg.evaluate_one(*g, mutex))
            .collect()
    }

    pub fn set_priority_goals(&mut self, goals: Option<Vec<VarValue>>) {
        self.priority_goals = goals;
    }

    pub fn landmarks(&self) -> &LandmarkHeuristic {
        &self.landmarks
    }

    pub fn informative_landmarks(&self, task: &Task) -> bool {
        self.landmarks.num_informative_nodes(task) > 0
    }

    pub fn tils(&self) -> &[Action] {
        &self.tils
    }

    pub fn force_at_end(&self) -> bool {
        self.force_at_end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::OBJECT_TRUE;
    use crate::testing::chain_task;

    #[test]
    fn test_evaluation_counts_remaining_landmarks() {
        let task = chain_task(3);
        let mut state = State::initial(&task);
        let evaluator = Evaluator::new(&state, &task, Vec::new(), true);
        let mut progress = LandmarkProgress::new(evaluator.landmarks());
        let e = evaluator.evaluate(&task, &state, Some(&progress));
        assert_eq!(e, Evaluation { h: 3, h_aux: H_INFINITY, h_land: 3 });

        state.set_value(1, OBJECT_TRUE);
        progress.advance(evaluator.landmarks(), &state);
        let e = evaluator.evaluate(&task, &state, Some(&progress));
        assert_eq!(e.h, 2);
        assert_eq!(e.h_land, 2);
        assert!(evaluator.informative_landmarks(&task));
    }

    #[test]
    fn test_priority_goals_fill_h_aux() {
        let task = chain_task(2);
        let state = State::initial(&task);
        let mut evaluator = Evaluator::new(&state, &task, Vec::new(), true);
        evaluator.set_priority_goals(Some(vec![crate::encoding::var_value(1, OBJECT_TRUE)]));
        let e = evaluator.evaluate(&task, &state, None);
        assert_eq!(e.h, 2);
        assert_eq!(e.h_aux, 1);
        assert_eq!(e.h_land, 0);
    }
}
