// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

mod args;
mod artifacts;
mod check;
mod config;
mod db;
mod env;
mod format;
mod logging;
mod ops;
mod slurm;
mod state;

use std::time::Duration;

use anyhow::Result;
use clap::Parser;

use args::{CaseCmd, Cli, Cmd, DbCmd, ModuleCmd, ProjectCmd, RegrCmd, SimCmd, TaskCmd};
use db::{RegrStore, SimFilter};
use slurm::Sacct;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let config = config::load(
        cli.config.clone(),
        config::Overrides {
            database_path: cli.database_path.clone(),
            state_file: cli.state_file.clone(),
        },
    )?;
    config::ensure_database_dir(&config.database_path)?;
    let store = RegrStore::open(&config.database_path).await?;
    let user = env::current_user();

    match cli.cmd {
        // Schema bootstrap already ran on open.
        Cmd::Db(args) => match args.cmd {
            DbCmd::Init => {
                println!("database ready at {}", config.database_path.display());
            }
        },
        Cmd::Project(args) => match args.cmd {
            ProjectCmd::Add { name } => {
                let id = store.add_project(&name, &user).await?;
                println!("project {} registered with id {id}", name.to_uppercase());
            }
            ProjectCmd::List => {
                print!("{}", format::project_table(&store.list_projects().await?));
            }
        },
        Cmd::Module(args) => match args.cmd {
            ModuleCmd::Add { project, name } => {
                let project_id = store.require_project_id(&project).await?;
                let id = store.add_module(project_id, &name, &user).await?;
                println!("module {name} registered with id {id}");
            }
            ModuleCmd::List { project } => {
                let project_id = store.require_project_id(&project).await?;
                print!("{}", format::module_table(&store.list_modules(project_id).await?));
            }
        },
        Cmd::Case(args) => match args.cmd {
            CaseCmd::Add { project, module, name } => {
                let module_id = require_module(&store, &project, &module).await?;
                let id = store.add_case(module_id, &name, &user).await?;
                println!("case {name} registered with id {id}");
            }
            CaseCmd::List { project, module } => {
                let module_id = require_module(&store, &project, &module).await?;
                print!("{}", format::case_table(&store.list_cases(module_id).await?));
            }
            CaseCmd::SetFlag { project, module, name, flag, value } => {
                let module_id = require_module(&store, &project, &module).await?;
                let case_id = store
                    .find_case_id(module_id, &name)
                    .await?
                    .ok_or_else(|| anyhow::anyhow!("case {name} not found"))?;
                store.update_case_flag(case_id, flag.as_flag(), value).await?;
                println!("case {name}: flag updated");
            }
            CaseCmd::SetInfo { project, module, name, case_c_name, case_c_group } => {
                let module_id = require_module(&store, &project, &module).await?;
                let case_id = store
                    .find_case_id(module_id, &name)
                    .await?
                    .ok_or_else(|| anyhow::anyhow!("case {name} not found"))?;
                store.update_case_st_info(case_id, &case_c_name, &case_c_group).await?;
                println!("case {name}: catalog names recorded");
            }
        },
        Cmd::Regr(args) => match args.cmd {
            RegrCmd::Add { project, module, regr_type } => {
                ops::regr::add(&config, &store, &project, &module, &regr_type).await?;
            }
            RegrCmd::SetSlurm(a) => {
                ops::regr::set_slurm(
                    &config,
                    &store,
                    &a.part_name,
                    a.part_mode.as_str(),
                    &a.node_name,
                    &a.work_name,
                    &a.work_url,
                    &a.case_list,
                )
                .await?;
            }
            RegrCmd::List { project, module } => {
                ops::regr::list(&store, &project, &module).await?;
            }
            RegrCmd::Delete { regr_id } => {
                ops::regr::delete(&config, &store, regr_id).await?;
            }
            RegrCmd::Status { json } => {
                ops::report::run(&config, json)?;
            }
        },
        Cmd::Task(args) => match args.cmd {
            TaskCmd::Add { project, module, git_de, git_dv } => {
                ops::task::add(&store, &config, &project, &module, &git_de, &git_dv).await?;
            }
            TaskCmd::Attach => {
                ops::task::attach(&config, &store).await?;
            }
            TaskCmd::List { regr_id } => {
                print!("{}", format::task_table(&store.list_tasks(regr_id).await?));
            }
        },
        Cmd::Sim(args) => match args.cmd {
            SimCmd::AddRegr => {
                ops::register::add_basic(&config, &store).await?;
            }
            SimCmd::AddSingle { project, module, sim_log, sim_time } => {
                let probe = Sacct::new(Duration::from_secs(config.scheduler_timeout_secs));
                ops::register::add_single(
                    &config, &store, &probe, &project, &module, &sim_log, sim_time,
                )
                .await?;
            }
            SimCmd::Reconcile => {
                let probe = Sacct::new(Duration::from_secs(config.scheduler_timeout_secs));
                ops::reconcile::run(&config, &store, &probe).await?;
            }
            SimCmd::Check { sim_time } => {
                let probe = Sacct::new(Duration::from_secs(config.scheduler_timeout_secs));
                ops::classify::run(&config, &store, &probe, sim_time).await?;
            }
            SimCmd::List(a) => {
                let sims = store
                    .list_sims(&SimFilter {
                        regr_id: a.regr_id,
                        task_id: a.task_id,
                        case_id: a.case_id,
                        failed_only: a.failed,
                    })
                    .await?;
                if a.json {
                    println!("{}", format::sims_json(&sims)?);
                } else {
                    print!("{}", format::sim_table(&sims));
                }
            }
        },
    }
    Ok(())
}

async fn require_module(store: &RegrStore, project: &str, module: &str) -> Result<i64> {
    let project_id = store.require_project_id(project).await?;
    Ok(store.require_module_id(project_id, module).await?)
}
