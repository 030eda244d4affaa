use tracing::info;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Stats {
    pub expanded_nodes: usize,
    pub generated_nodes: usize,
    pub rejected_plans: usize,
    pub repeated_states: usize,
    pub plateaus: usize,
    pub time_ms: u128,
}

impl Stats {
    pub fn print(&self) {
        info!(
            "Time(ms) {:?} Expanded nodes {:?} Generated nodes {:?} Rejected plans {:?} Repeated states {:?} Plateaus {:?}",
            self.time_ms,
            self.expanded_nodes,
            self.generated_nodes,
            self.rejected_plans,
            self.repeated_states,
            self.plateaus
        );
    }
}
