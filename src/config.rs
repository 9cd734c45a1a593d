// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use anyhow::{Context, Result};
use serde::Deserialize;
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

const APP_DIR_NAME: &str = "vcm";
const CONFIG_FILE_NAME: &str = "vcm.toml";
const DATABASE_FILE_NAME: &str = "vcm.db";
const STATE_FILE_NAME: &str = "vcm_regr_info.json";
const TASK_FILE_NAME: &str = "vcm_task_info.json";
const DEFAULT_SCHEDULER_TIMEOUT_SECS: u64 = 30;
const DEFAULT_REGR_DIR_NAME: &str = "slurm";

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    database_path: Option<String>,
    state_file: Option<String>,
    task_file: Option<String>,
    exceptions_file: Option<String>,
    scheduler_timeout_secs: Option<u64>,
    state_lock: Option<bool>,
    regr_dir_name: Option<String>,
    #[serde(default)]
    node_map: HashMap<String, String>,
    #[serde(default)]
    timing_tolerance: HashMap<String, u64>,
}

#[derive(Debug)]
pub struct Config {
    pub database_path: PathBuf,
    /// State document path; relative paths stay relative so each working
    /// directory carries its own document.
    pub state_file: PathBuf,
    pub task_file: PathBuf,
    pub exceptions_file: Option<PathBuf>,
    pub scheduler_timeout_secs: u64,
    pub state_lock: bool,
    /// Directory name a regression runs from; checked before reconciling.
    pub regr_dir_name: String,
    /// Compute node name to NFS export directory.
    pub node_map: HashMap<String, String>,
    /// Allowed timing violation count per corner name.
    pub timing_tolerance: HashMap<String, u64>,
    pub config_path: Option<PathBuf>,
}

#[derive(Debug, Default)]
pub struct Overrides {
    pub database_path: Option<PathBuf>,
    pub state_file: Option<PathBuf>,
}

pub fn load(config_path_override: Option<PathBuf>, overrides: Overrides) -> Result<Config> {
    let required = config_path_override.is_some();
    let config_path = match config_path_override {
        Some(path) => Some(expand_path(path)),
        None => default_config_path().ok(),
    };

    let file_config = match config_path.as_deref() {
        Some(path) => read_config_file(path, required)?,
        None => FileConfig::default(),
    };

    let database_path = match overrides.database_path {
        Some(path) => expand_path(path),
        None => match file_config.database_path {
            Some(raw) => resolve_path(&raw, config_path.as_deref().and_then(|p| p.parent())),
            None => PathBuf::from(DATABASE_FILE_NAME),
        },
    };

    let state_file = match overrides.state_file {
        Some(path) => expand_path(path),
        None => match file_config.state_file {
            Some(raw) => PathBuf::from(shellexpand::tilde(&raw).as_ref()),
            None => PathBuf::from(STATE_FILE_NAME),
        },
    };

    let task_file = match file_config.task_file {
        Some(raw) => PathBuf::from(shellexpand::tilde(&raw).as_ref()),
        None => PathBuf::from(TASK_FILE_NAME),
    };

    let exceptions_file = file_config
        .exceptions_file
        .map(|raw| resolve_path(&raw, config_path.as_deref().and_then(|p| p.parent())));

    let node_map = if file_config.node_map.is_empty() {
        default_node_map()
    } else {
        file_config.node_map
    };

    Ok(Config {
        database_path,
        state_file,
        task_file,
        exceptions_file,
        scheduler_timeout_secs: file_config
            .scheduler_timeout_secs
            .unwrap_or(DEFAULT_SCHEDULER_TIMEOUT_SECS),
        state_lock: file_config.state_lock.unwrap_or(true),
        regr_dir_name: file_config
            .regr_dir_name
            .unwrap_or_else(|| DEFAULT_REGR_DIR_NAME.to_string()),
        node_map,
        timing_tolerance: file_config.timing_tolerance,
        config_path,
    })
}

/// One participating compute node: scheduler name plus its NFS export
/// directory under `/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInfo {
    pub node_name: String,
    pub host_dir: String,
}

impl Config {
    /// Resolve which nodes a regression submission touched. Multi mode
    /// fans out over the partition's fixed node set; single mode names
    /// one node directly.
    pub fn nodes_for(
        &self,
        part_name: &str,
        part_mode: &str,
        node_name: &str,
    ) -> Result<Vec<NodeInfo>> {
        let names: Vec<&str> = match part_mode {
            "multi" => match part_name {
                "digit" => vec!["digit01", "digit02", "digit03", "digit04"],
                "edas" => vec!["eda"],
                other => anyhow::bail!(
                    "partition {other:?} has no multi-node layout; only digit and edas do"
                ),
            },
            "single" => vec![node_name],
            other => anyhow::bail!("part_mode {other:?} is not single or multi"),
        };

        names
            .into_iter()
            .map(|name| {
                let host_dir = self
                    .node_map
                    .get(name)
                    .with_context(|| format!("node {name:?} is not in the node map"))?;
                Ok(NodeInfo {
                    node_name: name.to_string(),
                    host_dir: host_dir.clone(),
                })
            })
            .collect()
    }
}

pub fn ensure_database_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create database directory {}", parent.display()))?;
    }
    Ok(())
}

/// The site's compute nodes and their NFS export roots. A config file
/// [node_map] section replaces this wholesale.
pub fn default_node_map() -> HashMap<String, String> {
    let mut map = HashMap::new();
    map.insert("digit01".to_string(), "home_d1".to_string());
    map.insert("digit02".to_string(), "home_d2".to_string());
    map.insert("digit03".to_string(), "home_d3".to_string());
    map.insert("digit04".to_string(), "home_d4".to_string());
    map.insert("eda".to_string(), "home".to_string());
    map.insert("eda4".to_string(), "home204".to_string());
    map.insert("eda5".to_string(), "home205".to_string());
    map.insert("eda6".to_string(), "home206".to_string());
    map.insert("eda7".to_string(), "home207".to_string());
    map.insert("eda8".to_string(), "home208".to_string());
    map.insert("eda9".to_string(), "home209".to_string());
    map.insert("eda10".to_string(), "home210".to_string());
    map.insert("eda11".to_string(), "home211".to_string());
    map.insert("eda12".to_string(), "home212".to_string());
    map
}

fn read_config_file(path: &Path, required: bool) -> Result<FileConfig> {
    if !path.exists() {
        if required {
            anyhow::bail!("config file not found at {}", path.display());
        }
        return Ok(FileConfig::default());
    }

    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file {}", path.display()))
}

fn resolve_path(raw: &str, base_dir: Option<&Path>) -> PathBuf {
    let expanded = shellexpand::tilde(raw);
    let path = PathBuf::from(expanded.as_ref());
    if path.is_absolute() {
        return path;
    }
    match base_dir {
        Some(dir) => dir.join(path),
        None => path,
    }
}

fn expand_path(path: PathBuf) -> PathBuf {
    let path_string = path.to_string_lossy().to_string();
    let expanded = shellexpand::tilde(&path_string);
    PathBuf::from(expanded.as_ref())
}

fn default_config_path() -> Result<PathBuf> {
    let base = dirs::config_dir().context("failed to resolve config directory")?;
    Ok(base.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
}
