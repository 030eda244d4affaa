use crate::plan::{QueueKind, SearchKey};
use crate::task::Task;

use serde::{Deserialize, Serialize};

/// Search strategy picked once per task from what the domain allows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum DomainProfile {
    /// Every state can be undone: one adaptive selector with plateau escape.
    Reversible,
    /// Some pair of actions excludes each other forever: two selectors race
    /// so one bad commitment does not stall the search.
    DeadEnds,
    /// Repeated states cannot be filtered or end conditions must stay open.
    Concurrent,
}

impl DomainProfile {
    pub fn detect(task: &Task, force_at_end: bool, filter_repeated: bool) -> Self {
        if !filter_repeated || !force_at_end {
            DomainProfile::Concurrent
        } else if task.has_permanent_mutex_action() {
            DomainProfile::DeadEnds
        } else {
            DomainProfile::Reversible
        }
    }

    /// Keys of each selector; the dead-ends profile runs two of them.
    pub fn selector_keys(self, landmarks: bool, has_tils: bool) -> Vec<Vec<SearchKey>> {
        use QueueKind::*;
        match (self, landmarks) {
            (DomainProfile::Reversible, true) if has_tils => {
                vec![vec![SearchKey::plateau(G2Hff), SearchKey::plateau(G3Hland)]]
            }
            (DomainProfile::Reversible | DomainProfile::Concurrent, true) => {
                vec![vec![SearchKey::new(Hff), SearchKey::new(Hland)]]
            }
            (DomainProfile::Reversible | DomainProfile::Concurrent, false) => {
                vec![vec![SearchKey::new(G3Hff)]]
            }
            (DomainProfile::DeadEnds, true) => {
                vec![vec![SearchKey::new(G2Hff)], vec![SearchKey::new(G3Hland)]]
            }
            (DomainProfile::DeadEnds, false) => {
                vec![vec![SearchKey::new(GHff)], vec![SearchKey::new(Hff)]]
            }
        }
    }

    pub fn uses_plateau(self, has_tils: bool) -> bool {
        match self {
            DomainProfile::Reversible => !has_tils,
            DomainProfile::Concurrent => true,
            DomainProfile::DeadEnds => false,
        }
    }

    pub fn races_selectors(self) -> bool {
        self == DomainProfile::DeadEnds
    }
}

impl std::fmt::Display for DomainProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DomainProfile::Reversible => "reversible",
            DomainProfile::DeadEnds => "dead-ends",
            DomainProfile::Concurrent => "concurrent",
        };
        write!(f, "{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{chain_task, shared_resource_task};

    #[test]
    fn test_detect_profile() {
        let task = chain_task(2);
        assert_eq!(DomainProfile::detect(&task, true, true), DomainProfile::Reversible);
        assert_eq!(DomainProfile::detect(&task, false, true), DomainProfile::Concurrent);
        assert_eq!(DomainProfile::detect(&task, true, false), DomainProfile::Concurrent);
        let task = shared_resource_task();
        assert!(!task.has_permanent_mutex_action());
        assert_eq!(DomainProfile::detect(&task, true, true), DomainProfile::Reversible);
    }

    #[test]
    fn test_selector_keys() {
        let keys = DomainProfile::DeadEnds.selector_keys(false, false);
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[1], vec![SearchKey::new(QueueKind::Hff)]);
        let keys = DomainProfile::Reversible.selector_keys(true, true);
        assert!(keys[0].iter().all(|k| k.plateau));
        assert_eq!(DomainProfile::Concurrent.selector_keys(false, true)[0][0].kind, QueueKind::G3Hff);
        assert!(!DomainProfile::Reversible.uses_plateau(true));
        assert!(DomainProfile::Concurrent.uses_plateau(true));
        assert!(!DomainProfile::DeadEnds.uses_plateau(false));
        assert_eq!(DomainProfile::DeadEnds.to_string(), "dead-ends");
    }
}
