mod planner;
mod plateau;
mod profile;
mod queue;
mod selector;

pub use planner::Planner;
pub use plateau::{Plateau, PlateauSelector};
pub use profile::DomainProfile;
pub use queue::SearchQueue;
pub use selector::{QualitySelector, Selector};
