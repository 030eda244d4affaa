use temporal_pocl::config::{Cli, Config};
use temporal_pocl::output::Schedule;
use temporal_pocl::search::Planner;
use temporal_pocl::task::TaskFile;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = if let Some(config_file) = cli.config.as_ref() {
        let config_str = std::fs::read_to_string(config_file)?;
        Config::from_yaml_str(&config_str)
            .with_context(|| format!("error with config file: {config_file}"))?
    } else {
        Config::default()
    }
    .override_from_command_line(&cli)?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    if cli.config.is_none() {
        info!("No config file specified, using default config");
    }

    let task = TaskFile::load_from_file(&config.task_path)?
        .into_task()
        .with_context(|| format!("error with task file: {}", config.task_path))?;
    info!(
        "task loaded: {} variables, {} actions, {} goals",
        task.variables.len(),
        task.actions.len(),
        task.goal_list().len()
    );

    let mut planner = Planner::new(task, config.planner.clone())?;
    let mut solution = planner.plan();
    if solution.is_some() && config.planner.improve {
        solution = planner.improve();
    }

    match solution {
        Some(plan) => {
            let schedule = Schedule::build(planner.task(), planner.tree(), planner.initial_state(), plan)
                .context("solution plan cannot be scheduled")?;
            print!("{}", schedule.to_pddl());
            if let Some(path) = &config.output_path {
                schedule.write_pddl(path)?;
            }
            if let Some(path) = &config.json_path {
                schedule.write_json(path)?;
            }
        }
        None => error!("planner fails to find a solution"),
    }
    planner.stats().print();

    Ok(())
}
