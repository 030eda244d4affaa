mod evaluator;
mod landmark_heuristic;
mod landmarks;
mod rpg;
mod temporal_rpg;

pub use evaluator::{Evaluation, Evaluator};
pub use landmark_heuristic::{LandmarkCheck, LandmarkHeuristic, LandmarkProgress};
pub use landmarks::{LandmarkNode, LandmarkRpg, Landmarks};
pub use rpg::Rpg;
pub use temporal_rpg::{LmFluent, TemporalRpg};
