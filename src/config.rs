use crate::plan::DEFAULT_AUX_WEIGHT;
use crate::search::DomainProfile;

use anyhow::anyhow;
use clap::Parser;
use serde::Deserialize;

#[derive(Parser, Debug)]
#[command(
    name = "Temporal PoCL",
    about = "Partial-order causal-link planner for temporal SAS+ tasks.",
    version = "1.0"
)]
pub struct Cli {
    #[arg(long, help = "Path to the YAML config file")]
    pub config: Option<String>,

    #[arg(long, help = "Path to the task file (YAML or JSON)")]
    pub task: Option<String>,

    #[arg(long, help = "Time budget in seconds")]
    pub timeout: Option<f64>,

    #[arg(long, value_enum, help = "Force a search profile instead of detecting it")]
    pub profile: Option<DomainProfile>,

    #[arg(long, help = "Path to the text schedule output")]
    pub output: Option<String>,

    #[arg(long, help = "Path to the JSON schedule output")]
    pub json: Option<String>,

    #[arg(
        long,
        help = "Keep searching for cheaper plans after the first solution",
        default_value_t = false
    )]
    pub improve: bool,

    #[arg(long, help = "Seed for the random number generator")]
    pub seed: Option<u64>,

    #[arg(long, help = "Log filter used when RUST_LOG is not set")]
    pub log_level: Option<String>,
}

/// Thresholds of the plateau escape, in iterations without improvement.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlateauConfig {
    pub start: usize,
    pub limit: usize,
    /// Goals the first plateau focuses on.
    pub goals: usize,
    pub random_poll: bool,
    /// Weight of the plateau heuristic in `g + w * h_aux`.
    pub aux_weight: f64,
}

impl Default for PlateauConfig {
    fn default() -> Self {
        PlateauConfig {
            start: 100,
            limit: 500,
            goals: 1,
            random_poll: false,
            aux_weight: DEFAULT_AUX_WEIGHT,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlannerConfig {
    pub timeout: f64,
    pub profile: Option<DomainProfile>,
    pub plateau: PlateauConfig,
    pub improve: bool,
    pub seed: u64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        PlannerConfig {
            timeout: 60.0,
            profile: None,
            plateau: PlateauConfig::default(),
            improve: false,
            seed: 0,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub task_path: String,
    pub output_path: Option<String>,
    pub json_path: Option<String>,
    pub log_level: String,
    pub planner: PlannerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            task_path: "tasks/task.yaml".to_string(),
            output_path: None,
            json_path: None,
            log_level: "info".to_string(),
            planner: PlannerConfig::default(),
        }
    }
}

impl Config {
    pub fn from_yaml_str(s: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(s)?)
    }

    /// Command line values take precedence over the config file.
    pub fn override_from_command_line(mut self, cli: &Cli) -> anyhow::Result<Self> {
        if let Some(task) = &cli.task {
            self.task_path = task.clone();
        }
        if let Some(timeout) = cli.timeout {
            self.planner.timeout = timeout;
        }
        if cli.profile.is_some() {
            self.planner.profile = cli.profile;
        }
        if cli.output.is_some() {
            self.output_path = cli.output.clone();
        }
        if cli.json.is_some() {
            self.json_path = cli.json.clone();
        }
        if cli.improve {
            self.planner.improve = true;
        }
        if let Some(seed) = cli.seed {
            self.planner.seed = seed;
        }
        if let Some(level) = &cli.log_level {
            self.log_level = level.clone();
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.planner.timeout.is_nan() || self.planner.timeout <= 0.0 {
            return Err(anyhow!(
                "Timeout must be a positive number of seconds, got {}",
                self.planner.timeout
            ));
        }
        let plateau = &self.planner.plateau;
        if plateau.start == 0 || plateau.limit <= plateau.start {
            return Err(anyhow!(
                "Plateau limit must be greater than its start, got start {} and limit {}",
                plateau.start,
                plateau.limit
            ));
        }
        if plateau.goals == 0 {
            return Err(anyhow!("Plateau must focus on at least one goal"));
        }
        if plateau.aux_weight.is_nan() || plateau.aux_weight <= 0.0 {
            return Err(anyhow!(
                "Plateau heuristic weight must be positive, got {}",
                plateau.aux_weight
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = Config::from_yaml_str(
            "task_path: tasks/rovers.yaml\nplanner:\n  timeout: 5.5\n  profile: dead-ends\n  plateau:\n    limit: 800\n",
        )
        .unwrap();
        assert_eq!(config.task_path, "tasks/rovers.yaml");
        assert_eq!(config.planner.timeout, 5.5);
        assert_eq!(config.planner.profile, Some(DomainProfile::DeadEnds));
        assert_eq!(config.planner.plateau.start, 100);
        assert_eq!(config.planner.plateau.limit, 800);
        assert_eq!(config.planner.plateau.aux_weight, 3.0);
        assert_eq!(config.log_level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_command_line_overrides() {
        let cli = Cli::parse_from([
            "temporal_pocl",
            "--task",
            "t.json",
            "--timeout",
            "2",
            "--profile",
            "concurrent",
            "--improve",
        ]);
        let config = Config::default().override_from_command_line(&cli).unwrap();
        assert_eq!(config.task_path, "t.json");
        assert_eq!(config.planner.timeout, 2.0);
        assert_eq!(config.planner.profile, Some(DomainProfile::Concurrent));
        assert!(config.planner.improve);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.planner.timeout = 0.0;
        assert!(config.validate().is_err());
        let mut config = Config::default();
        config.planner.plateau.limit = 50;
        assert!(config.validate().is_err());
        let mut config = Config::default();
        config.planner.plateau.aux_weight = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_yaml_sets_plateau_weight() {
        let config = Config::from_yaml_str("planner:\n  plateau:\n    aux_weight: 1.5\n    random_poll: true\n").unwrap();
        assert_eq!(config.planner.plateau.aux_weight, 1.5);
        assert!(config.planner.plateau.random_poll);
        assert_eq!(config.planner.plateau.start, 100);
        assert!(config.validate().is_ok());
    }
}
