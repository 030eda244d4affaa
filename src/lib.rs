pub mod config;
pub mod encoding;
pub mod heuristic;
pub mod linearizer;
pub mod memo;
pub mod output;
pub mod plan;
pub mod search;
pub mod stat;
pub mod state;
pub mod successors;
pub mod task;

#[cfg(test)]
mod testing;
