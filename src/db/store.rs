// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Row, SqlitePool,
};
use std::{path::Path, str::FromStr, time::Duration};
use thiserror::Error;

use crate::env;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlx error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("empty name")]
    EmptyName,
    #[error("project not found: {0}")]
    ProjectNotFound(String),
    #[error("module not found: {0}")]
    ModuleNotFound(String),
    #[error("case not found: {0}")]
    CaseNotFound(String),
    #[error("regression not found: {0}")]
    RegrNotFound(i64),
}

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectRecord {
    pub id: i64,
    pub name: String,
    pub created_by: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleRecord {
    pub id: i64,
    pub project_id: i64,
    pub name: String,
    pub created_by: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseRecord {
    pub id: i64,
    pub module_id: i64,
    pub name: String,
    /// Localized display name, set once the software-side catalog knows
    /// the case.
    pub case_c_name: Option<String>,
    pub case_c_group: Option<String>,
    pub support_bt: bool,
    pub support_st: bool,
    pub support_regr: bool,
    pub support_post: bool,
    pub support_ams: bool,
    pub created_by: String,
    pub created_at: String,
}

/// Capability flags a case can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseFlag {
    Bt,
    St,
    Regr,
    Post,
    Ams,
}

impl CaseFlag {
    fn column(self) -> &'static str {
        match self {
            CaseFlag::Bt => "support_bt",
            CaseFlag::St => "support_st",
            CaseFlag::Regr => "support_regr",
            CaseFlag::Post => "support_post",
            CaseFlag::Ams => "support_ams",
        }
    }
}

/// Payload for creating a regression row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRegr {
    pub module_id: i64,
    pub regr_type: String,
    pub current_dir: String,
    pub created_by: String,
    pub created_host: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegrRecord {
    pub id: i64,
    pub module_id: i64,
    pub regr_type: String,
    pub current_dir: String,
    pub part_name: Option<String>,
    pub part_mode: Option<String>,
    pub node_name: Option<String>,
    pub work_name: Option<String>,
    pub work_url: Option<String>,
    pub case_list: Option<String>,
    pub created_by: String,
    pub created_host: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub module_id: i64,
    pub git_de: String,
    pub git_dv: String,
    pub created_by: String,
    pub created_host: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRecord {
    pub id: i64,
    pub module_id: i64,
    /// Set once the task is attached to a regression.
    pub regr_id: Option<i64>,
    pub status_post: Option<String>,
    pub status_regr: Option<String>,
    pub status_check: Option<String>,
    pub corner_name: Option<String>,
    pub git_de: String,
    pub git_dv: String,
    pub comp_log_time: Option<String>,
    pub created_by: String,
    pub created_host: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSim {
    /// Absent for single sims launched outside a regression.
    pub regr_id: Option<i64>,
    pub case_id: i64,
    pub task_id: Option<i64>,
    pub case_seed: String,
    pub job_id: i64,
    pub sim_log: Option<String>,
    pub created_by: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimRecord {
    pub id: i64,
    pub regr_id: Option<i64>,
    pub case_id: i64,
    pub task_id: Option<i64>,
    pub case_seed: String,
    pub job_id: i64,
    pub sim_log: Option<String>,
    /// Elapsed wall time in seconds, recorded at check time.
    pub sim_time: Option<i64>,
    pub error_num: Option<i64>,
    pub timing_num: Option<i64>,
    pub is_check: bool,
    pub is_pass: Option<bool>,
    pub created_by: String,
    pub created_at: String,
}

/// Optional filters for sim listing; unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct SimFilter {
    pub regr_id: Option<i64>,
    pub task_id: Option<i64>,
    pub case_id: Option<i64>,
    pub failed_only: bool,
}

/// Async store over the regression catalog.
#[derive(Clone)]
pub struct RegrStore {
    pool: SqlitePool,
}

impl RegrStore {
    /// Open (or create) a file-backed SQLite DB and run bootstrap.
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let url = format!("sqlite://{}", path.as_ref().to_string_lossy());
        let opts = SqliteConnectOptions::from_str(&url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(opts)
            .await?;
        let store = Self { pool };
        store.bootstrap().await?;
        Ok(store)
    }

    /// Open an in-memory store (handy for tests).
    #[allow(dead_code)]
    pub async fn open_memory() -> Result<Self> {
        let opts = SqliteConnectOptions::from_str("sqlite::memory:")?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(opts)
            .await?;
        let store = Self { pool };
        store.bootstrap().await?;
        Ok(store)
    }

    async fn bootstrap(&self) -> Result<()> {
        // Improve concurrency for file DBs.
        let _ = sqlx::query("PRAGMA journal_mode=WAL;")
            .execute(&self.pool)
            .await;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS projects (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              name TEXT NOT NULL UNIQUE,           -- canonical uppercase
              created_by TEXT NOT NULL,
              created_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS modules (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              project_id INTEGER NOT NULL
                REFERENCES projects(id) ON DELETE CASCADE,
              name TEXT NOT NULL,
              created_by TEXT NOT NULL,
              created_at TEXT NOT NULL,
              UNIQUE(project_id, name)
            );
            CREATE INDEX IF NOT EXISTS idx_modules_project_id ON modules(project_id);
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS case_info (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              module_id INTEGER NOT NULL
                REFERENCES modules(id) ON DELETE CASCADE,
              name TEXT NOT NULL,
              case_c_name TEXT,
              case_c_group TEXT,
              support_bt INTEGER NOT NULL DEFAULT 0,
              support_st INTEGER NOT NULL DEFAULT 0,
              support_regr INTEGER NOT NULL DEFAULT 0,
              support_post INTEGER NOT NULL DEFAULT 0,
              support_ams INTEGER NOT NULL DEFAULT 0,
              created_by TEXT NOT NULL,
              created_at TEXT NOT NULL,
              UNIQUE(module_id, name)
            );
            CREATE INDEX IF NOT EXISTS idx_case_info_module_id ON case_info(module_id);
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS regr_info (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              module_id INTEGER NOT NULL
                REFERENCES modules(id) ON DELETE CASCADE,
              regr_type TEXT NOT NULL,
              current_dir TEXT NOT NULL,
              part_name TEXT,
              part_mode TEXT,
              node_name TEXT,
              work_name TEXT,
              work_url TEXT,
              case_list TEXT,
              created_by TEXT NOT NULL,
              created_host TEXT NOT NULL,
              created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_regr_info_module_id ON regr_info(module_id);
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tasks (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              module_id INTEGER NOT NULL
                REFERENCES modules(id) ON DELETE CASCADE,
              regr_id INTEGER
                REFERENCES regr_info(id) ON DELETE SET NULL,
              status_post TEXT,
              status_regr TEXT,
              status_check TEXT,
              corner_name TEXT,
              git_de TEXT NOT NULL,
              git_dv TEXT NOT NULL,
              comp_log_time TEXT,
              created_by TEXT NOT NULL,
              created_host TEXT NOT NULL,
              created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_tasks_module_id ON tasks(module_id);
            CREATE INDEX IF NOT EXISTS idx_tasks_regr_id ON tasks(regr_id);
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sim_info (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              regr_id INTEGER
                REFERENCES regr_info(id) ON DELETE CASCADE,
              case_id INTEGER NOT NULL
                REFERENCES case_info(id) ON DELETE CASCADE,
              task_id INTEGER
                REFERENCES tasks(id) ON DELETE SET NULL,
              case_seed TEXT NOT NULL,
              job_id INTEGER NOT NULL,
              sim_log TEXT,
              sim_time INTEGER,
              error_num INTEGER,
              timing_num INTEGER,
              is_check INTEGER NOT NULL DEFAULT 0,
              is_pass INTEGER,
              created_by TEXT NOT NULL,
              created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_sim_info_regr_id ON sim_info(regr_id);
            CREATE INDEX IF NOT EXISTS idx_sim_info_task_id ON sim_info(task_id);
            CREATE INDEX IF NOT EXISTS idx_sim_info_case_id ON sim_info(case_id);
            "#,
        )
        .execute(&self.pool)
        .await?;

        self.ensure_views().await?;
        Ok(())
    }

    async fn ensure_views(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE VIEW IF NOT EXISTS project_modules_view AS
              SELECT p.name AS project_name, m.id AS module_id, m.name AS module_name
                FROM projects p JOIN modules m ON m.project_id = p.id;

            CREATE VIEW IF NOT EXISTS module_case_view AS
              SELECT m.name AS module_name, c.id AS case_id, c.name AS case_name,
                     c.case_c_name, c.case_c_group, c.support_regr, c.support_post
                FROM modules m JOIN case_info c ON c.module_id = m.id;

            CREATE VIEW IF NOT EXISTS module_task_view AS
              SELECT m.name AS module_name, r.id AS regr_id, t.id AS task_id,
                     t.status_post, t.status_regr, t.status_check
                FROM modules m
                JOIN regr_info r ON r.module_id = m.id
                JOIN tasks t ON t.regr_id = r.id;

            CREATE VIEW IF NOT EXISTS task_sim_view AS
              SELECT t.id AS task_id, s.id AS sim_id, c.name AS case_name,
                     s.case_seed, s.job_id, s.is_check, s.is_pass
                FROM tasks t
                JOIN sim_info s ON s.task_id = t.id
                JOIN case_info c ON c.id = s.case_id;
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // --- projects ---

    /// Insert a project, or return the existing row id. Names are stored
    /// uppercase so PROJ_A and proj_a are the same project.
    pub async fn add_project(&self, name: &str, user: &str) -> Result<i64> {
        let canonical = canonical_project_name(name)?;
        if let Some(id) = self.find_project_id(&canonical).await? {
            return Ok(id);
        }
        let rec = sqlx::query(
            "INSERT INTO projects(name, created_by, created_at) VALUES (?, ?, ?) RETURNING id",
        )
        .bind(&canonical)
        .bind(user)
        .bind(env::now_stamp())
        .fetch_one(&self.pool)
        .await?;
        Ok(rec.try_get::<i64, _>("id")?)
    }

    pub async fn find_project_id(&self, name: &str) -> Result<Option<i64>> {
        let canonical = canonical_project_name(name)?;
        let row = sqlx::query("SELECT id FROM projects WHERE name = ?")
            .bind(&canonical)
            .fetch_optional(&self.pool)
            .await?;
        Ok(match row {
            Some(row) => Some(row.try_get::<i64, _>("id")?),
            None => None,
        })
    }

    pub async fn require_project_id(&self, name: &str) -> Result<i64> {
        self.find_project_id(name)
            .await?
            .ok_or_else(|| StoreError::ProjectNotFound(name.to_string()))
    }

    pub async fn list_projects(&self) -> Result<Vec<ProjectRecord>> {
        let rows = sqlx::query("SELECT id, name, created_by, created_at FROM projects ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_project).collect()
    }

    // --- modules ---

    pub async fn add_module(&self, project_id: i64, name: &str, user: &str) -> Result<i64> {
        if name.trim().is_empty() {
            return Err(StoreError::EmptyName);
        }
        if let Some(id) = self.find_module_id(project_id, name).await? {
            return Ok(id);
        }
        let rec = sqlx::query(
            "INSERT INTO modules(project_id, name, created_by, created_at) VALUES (?, ?, ?, ?) RETURNING id",
        )
        .bind(project_id)
        .bind(name)
        .bind(user)
        .bind(env::now_stamp())
        .fetch_one(&self.pool)
        .await?;
        Ok(rec.try_get::<i64, _>("id")?)
    }

    pub async fn find_module_id(&self, project_id: i64, name: &str) -> Result<Option<i64>> {
        let row = sqlx::query("SELECT id FROM modules WHERE project_id = ? AND name = ?")
            .bind(project_id)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(match row {
            Some(row) => Some(row.try_get::<i64, _>("id")?),
            None => None,
        })
    }

    pub async fn require_module_id(&self, project_id: i64, name: &str) -> Result<i64> {
        self.find_module_id(project_id, name)
            .await?
            .ok_or_else(|| StoreError::ModuleNotFound(name.to_string()))
    }

    pub async fn list_modules(&self, project_id: i64) -> Result<Vec<ModuleRecord>> {
        let rows = sqlx::query(
            "SELECT id, project_id, name, created_by, created_at FROM modules WHERE project_id = ? ORDER BY id",
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_module).collect()
    }

    // --- cases ---

    pub async fn add_case(&self, module_id: i64, name: &str, user: &str) -> Result<i64> {
        if name.trim().is_empty() {
            return Err(StoreError::EmptyName);
        }
        if let Some(id) = self.find_case_id(module_id, name).await? {
            return Ok(id);
        }
        let rec = sqlx::query(
            "INSERT INTO case_info(module_id, name, created_by, created_at) VALUES (?, ?, ?, ?) RETURNING id",
        )
        .bind(module_id)
        .bind(name)
        .bind(user)
        .bind(env::now_stamp())
        .fetch_one(&self.pool)
        .await?;
        Ok(rec.try_get::<i64, _>("id")?)
    }

    pub async fn find_case_id(&self, module_id: i64, name: &str) -> Result<Option<i64>> {
        let row = sqlx::query("SELECT id FROM case_info WHERE module_id = ? AND name = ?")
            .bind(module_id)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(match row {
            Some(row) => Some(row.try_get::<i64, _>("id")?),
            None => None,
        })
    }

    pub async fn update_case_flag(&self, case_id: i64, flag: CaseFlag, value: bool) -> Result<()> {
        let sql = format!("UPDATE case_info SET {} = ? WHERE id = ?", flag.column());
        let res = sqlx::query(&sql)
            .bind(value)
            .bind(case_id)
            .execute(&self.pool)
            .await?;
        if res.rows_affected() == 0 {
            return Err(StoreError::CaseNotFound(case_id.to_string()));
        }
        Ok(())
    }

    /// Record the localized catalog names; a case with them is by
    /// definition software-tracked, so support_st comes along.
    pub async fn update_case_st_info(
        &self,
        case_id: i64,
        case_c_name: &str,
        case_c_group: &str,
    ) -> Result<()> {
        let res = sqlx::query(
            "UPDATE case_info SET support_st = 1, case_c_name = ?, case_c_group = ? WHERE id = ?",
        )
        .bind(case_c_name)
        .bind(case_c_group)
        .bind(case_id)
        .execute(&self.pool)
        .await?;
        if res.rows_affected() == 0 {
            return Err(StoreError::CaseNotFound(case_id.to_string()));
        }
        Ok(())
    }

    pub async fn list_cases(&self, module_id: i64) -> Result<Vec<CaseRecord>> {
        let rows = sqlx::query("SELECT * FROM case_info WHERE module_id = ? ORDER BY id")
            .bind(module_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_case).collect()
    }

    // --- regressions ---

    pub async fn add_regr(&self, regr: &NewRegr) -> Result<i64> {
        let rec = sqlx::query(
            r#"
            INSERT INTO regr_info(module_id, regr_type, current_dir, created_by, created_host, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(regr.module_id)
        .bind(&regr.regr_type)
        .bind(&regr.current_dir)
        .bind(&regr.created_by)
        .bind(&regr.created_host)
        .bind(env::now_stamp())
        .fetch_one(&self.pool)
        .await?;
        Ok(rec.try_get::<i64, _>("id")?)
    }

    pub async fn update_slurm_info(
        &self,
        regr_id: i64,
        part_name: &str,
        part_mode: &str,
        node_name: &str,
        work_name: &str,
        work_url: &str,
        case_list: &str,
    ) -> Result<()> {
        let res = sqlx::query(
            r#"
            UPDATE regr_info SET
              part_name = ?1,
              part_mode = ?2,
              node_name = ?3,
              work_name = ?4,
              work_url = ?5,
              case_list = ?6
            WHERE id = ?7
            "#,
        )
        .bind(part_name)
        .bind(part_mode)
        .bind(node_name)
        .bind(work_name)
        .bind(work_url)
        .bind(case_list)
        .bind(regr_id)
        .execute(&self.pool)
        .await?;
        if res.rows_affected() == 0 {
            return Err(StoreError::RegrNotFound(regr_id));
        }
        Ok(())
    }

    pub async fn exist_regr(&self, regr_id: i64) -> Result<bool> {
        let row = sqlx::query("SELECT id FROM regr_info WHERE id = ?")
            .bind(regr_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    pub async fn find_regr(&self, regr_id: i64) -> Result<Option<RegrRecord>> {
        let row = sqlx::query("SELECT * FROM regr_info WHERE id = ?")
            .bind(regr_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_regr).transpose()
    }

    pub async fn list_regrs(&self, module_id: Option<i64>) -> Result<Vec<RegrRecord>> {
        let rows = match module_id {
            Some(module_id) => {
                sqlx::query("SELECT * FROM regr_info WHERE module_id = ? ORDER BY id")
                    .bind(module_id)
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                sqlx::query("SELECT * FROM regr_info ORDER BY id")
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        rows.iter().map(row_to_regr).collect()
    }

    /// Delete a regression; sims cascade, tasks keep living with the
    /// link nulled. Returns rows affected.
    pub async fn delete_regr(&self, regr_id: i64) -> Result<usize> {
        let res = sqlx::query("DELETE FROM regr_info WHERE id = ?")
            .bind(regr_id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() as usize)
    }

    // --- tasks ---

    pub async fn add_task(&self, task: &NewTask) -> Result<i64> {
        let rec = sqlx::query(
            r#"
            INSERT INTO tasks(module_id, git_de, git_dv, created_by, created_host, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(task.module_id)
        .bind(&task.git_de)
        .bind(&task.git_dv)
        .bind(&task.created_by)
        .bind(&task.created_host)
        .bind(env::now_stamp())
        .fetch_one(&self.pool)
        .await?;
        Ok(rec.try_get::<i64, _>("id")?)
    }

    pub async fn update_task_post(
        &self,
        task_id: i64,
        status_post: &str,
        comp_log_time: &str,
        corner_name: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE tasks SET status_post = ?, comp_log_time = ?, corner_name = ? WHERE id = ?",
        )
        .bind(status_post)
        .bind(comp_log_time)
        .bind(corner_name)
        .bind(task_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Attach a task to a regression and flag it as a regression compile.
    pub async fn update_task_regr(
        &self,
        task_id: i64,
        status_regr: &str,
        regr_id: i64,
    ) -> Result<()> {
        sqlx::query("UPDATE tasks SET status_regr = ?, regr_id = ? WHERE id = ?")
            .bind(status_regr)
            .bind(regr_id)
            .bind(task_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn list_tasks(&self, regr_id: i64) -> Result<Vec<TaskRecord>> {
        let rows = sqlx::query("SELECT * FROM tasks WHERE regr_id = ? ORDER BY id")
            .bind(regr_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_task).collect()
    }

    // --- sims ---

    pub async fn add_sim(&self, sim: &NewSim) -> Result<i64> {
        let rec = sqlx::query(
            r#"
            INSERT INTO sim_info(regr_id, case_id, task_id, case_seed, job_id, sim_log, created_by, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(sim.regr_id)
        .bind(sim.case_id)
        .bind(sim.task_id)
        .bind(&sim.case_seed)
        .bind(sim.job_id)
        .bind(&sim.sim_log)
        .bind(&sim.created_by)
        .bind(env::now_stamp())
        .fetch_one(&self.pool)
        .await?;
        Ok(rec.try_get::<i64, _>("id")?)
    }

    /// Bind a sim to the task that compiled it, once its node is known.
    pub async fn update_sim_task(&self, sim_id: i64, task_id: i64, sim_log: &str) -> Result<()> {
        sqlx::query("UPDATE sim_info SET task_id = ?, sim_log = ? WHERE id = ?")
            .bind(task_id)
            .bind(sim_log)
            .bind(sim_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Record a classification verdict.
    pub async fn update_sim_check(
        &self,
        sim_id: i64,
        sim_time: Option<i64>,
        error_num: i64,
        timing_num: i64,
        is_pass: bool,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE sim_info SET
              sim_time = ?1,
              error_num = ?2,
              timing_num = ?3,
              is_check = 1,
              is_pass = ?4
            WHERE id = ?5
            "#,
        )
        .bind(sim_time)
        .bind(error_num)
        .bind(timing_num)
        .bind(is_pass)
        .bind(sim_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list_sims(&self, filter: &SimFilter) -> Result<Vec<SimRecord>> {
        let mut sql = String::from("SELECT * FROM sim_info WHERE 1=1");
        if filter.regr_id.is_some() {
            sql.push_str(" AND regr_id = ?");
        }
        if filter.task_id.is_some() {
            sql.push_str(" AND task_id = ?");
        }
        if filter.case_id.is_some() {
            sql.push_str(" AND case_id = ?");
        }
        if filter.failed_only {
            sql.push_str(" AND is_check = 1 AND is_pass = 0");
        }
        sql.push_str(" ORDER BY id");

        let mut query = sqlx::query(&sql);
        if let Some(regr_id) = filter.regr_id {
            query = query.bind(regr_id);
        }
        if let Some(task_id) = filter.task_id {
            query = query.bind(task_id);
        }
        if let Some(case_id) = filter.case_id {
            query = query.bind(case_id);
        }

        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(row_to_sim).collect()
    }
}

fn canonical_project_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(StoreError::EmptyName);
    }
    Ok(trimmed.to_ascii_uppercase())
}

fn row_to_project(row: &sqlx::sqlite::SqliteRow) -> Result<ProjectRecord> {
    Ok(ProjectRecord {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        created_by: row.try_get("created_by")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_module(row: &sqlx::sqlite::SqliteRow) -> Result<ModuleRecord> {
    Ok(ModuleRecord {
        id: row.try_get("id")?,
        project_id: row.try_get("project_id")?,
        name: row.try_get("name")?,
        created_by: row.try_get("created_by")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_case(row: &sqlx::sqlite::SqliteRow) -> Result<CaseRecord> {
    Ok(CaseRecord {
        id: row.try_get("id")?,
        module_id: row.try_get("module_id")?,
        name: row.try_get("name")?,
        case_c_name: row.try_get("case_c_name")?,
        case_c_group: row.try_get("case_c_group")?,
        support_bt: row.try_get("support_bt")?,
        support_st: row.try_get("support_st")?,
        support_regr: row.try_get("support_regr")?,
        support_post: row.try_get("support_post")?,
        support_ams: row.try_get("support_ams")?,
        created_by: row.try_get("created_by")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_regr(row: &sqlx::sqlite::SqliteRow) -> Result<RegrRecord> {
    Ok(RegrRecord {
        id: row.try_get("id")?,
        module_id: row.try_get("module_id")?,
        regr_type: row.try_get("regr_type")?,
        current_dir: row.try_get("current_dir")?,
        part_name: row.try_get("part_name")?,
        part_mode: row.try_get("part_mode")?,
        node_name: row.try_get("node_name")?,
        work_name: row.try_get("work_name")?,
        work_url: row.try_get("work_url")?,
        case_list: row.try_get("case_list")?,
        created_by: row.try_get("created_by")?,
        created_host: row.try_get("created_host")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_task(row: &sqlx::sqlite::SqliteRow) -> Result<TaskRecord> {
    Ok(TaskRecord {
        id: row.try_get("id")?,
        module_id: row.try_get("module_id")?,
        regr_id: row.try_get("regr_id")?,
        status_post: row.try_get("status_post")?,
        status_regr: row.try_get("status_regr")?,
        status_check: row.try_get("status_check")?,
        corner_name: row.try_get("corner_name")?,
        git_de: row.try_get("git_de")?,
        git_dv: row.try_get("git_dv")?,
        comp_log_time: row.try_get("comp_log_time")?,
        created_by: row.try_get("created_by")?,
        created_host: row.try_get("created_host")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_sim(row: &sqlx::sqlite::SqliteRow) -> Result<SimRecord> {
    Ok(SimRecord {
        id: row.try_get("id")?,
        regr_id: row.try_get("regr_id")?,
        case_id: row.try_get("case_id")?,
        task_id: row.try_get("task_id")?,
        case_seed: row.try_get("case_seed")?,
        job_id: row.try_get("job_id")?,
        sim_log: row.try_get("sim_log")?,
        sim_time: row.try_get("sim_time")?,
        error_num: row.try_get("error_num")?,
        timing_num: row.try_get("timing_num")?,
        is_check: row.try_get("is_check")?,
        is_pass: row.try_get("is_pass")?,
        created_by: row.try_get("created_by")?,
        created_at: row.try_get("created_at")?,
    })
}
