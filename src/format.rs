// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use serde_json::json;

use crate::db::{CaseRecord, ModuleRecord, ProjectRecord, RegrRecord, SimRecord, TaskRecord};
use crate::ops::report::RegrReport;

fn str_width(value: &str) -> usize {
    value.chars().count()
}

fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| str_width(h)).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(str_width(cell));
        }
    }

    let mut output = String::new();
    for (i, header) in headers.iter().enumerate() {
        if i > 0 {
            output.push_str("  ");
        }
        output.push_str(&format!("{header:<w$}", w = widths[i]));
    }
    output.push('\n');

    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if i > 0 {
                output.push_str("  ");
            }
            output.push_str(&format!("{cell:<w$}", w = widths[i]));
        }
        output.push('\n');
    }
    output
}

fn opt_str(value: Option<&str>) -> String {
    value.unwrap_or("-").to_string()
}

fn opt_i64(value: Option<i64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

pub fn project_table(projects: &[ProjectRecord]) -> String {
    let headers = ["id", "name", "created by", "created at"];
    let rows: Vec<Vec<String>> = projects
        .iter()
        .map(|p| {
            vec![
                p.id.to_string(),
                p.name.clone(),
                p.created_by.clone(),
                p.created_at.clone(),
            ]
        })
        .collect();
    render_table(&headers, &rows)
}

pub fn module_table(modules: &[ModuleRecord]) -> String {
    let headers = ["id", "name", "created by", "created at"];
    let rows: Vec<Vec<String>> = modules
        .iter()
        .map(|m| {
            vec![
                m.id.to_string(),
                m.name.clone(),
                m.created_by.clone(),
                m.created_at.clone(),
            ]
        })
        .collect();
    render_table(&headers, &rows)
}

fn flag(value: bool) -> String {
    if value { "y" } else { "-" }.to_string()
}

pub fn case_table(cases: &[CaseRecord]) -> String {
    let headers = [
        "id", "name", "c name", "c group", "bt", "st", "regr", "post", "ams", "created by",
        "created at",
    ];
    let rows: Vec<Vec<String>> = cases
        .iter()
        .map(|c| {
            vec![
                c.id.to_string(),
                c.name.clone(),
                opt_str(c.case_c_name.as_deref()),
                opt_str(c.case_c_group.as_deref()),
                flag(c.support_bt),
                flag(c.support_st),
                flag(c.support_regr),
                flag(c.support_post),
                flag(c.support_ams),
                c.created_by.clone(),
                c.created_at.clone(),
            ]
        })
        .collect();
    render_table(&headers, &rows)
}

pub fn regr_table(regrs: &[RegrRecord]) -> String {
    let headers = ["id", "type", "partition", "mode", "work", "cases", "created by", "created at"];
    let rows: Vec<Vec<String>> = regrs
        .iter()
        .map(|r| {
            vec![
                r.id.to_string(),
                r.regr_type.clone(),
                opt_str(r.part_name.as_deref()),
                opt_str(r.part_mode.as_deref()),
                opt_str(r.work_name.as_deref()),
                opt_str(r.case_list.as_deref()),
                r.created_by.clone(),
                r.created_at.clone(),
            ]
        })
        .collect();
    render_table(&headers, &rows)
}

pub fn task_table(tasks: &[TaskRecord]) -> String {
    let headers = ["id", "regr", "post", "corner", "git de", "git dv", "host", "created at"];
    let rows: Vec<Vec<String>> = tasks
        .iter()
        .map(|t| {
            vec![
                t.id.to_string(),
                opt_i64(t.regr_id),
                opt_str(t.status_post.as_deref()),
                opt_str(t.corner_name.as_deref()),
                t.git_de.clone(),
                t.git_dv.clone(),
                t.created_host.clone(),
                t.created_at.clone(),
            ]
        })
        .collect();
    render_table(&headers, &rows)
}

pub fn sim_table(sims: &[SimRecord]) -> String {
    let headers = ["id", "task", "seed", "job", "time", "errors", "timing", "checked", "pass"];
    let rows: Vec<Vec<String>> = sims
        .iter()
        .map(|s| {
            vec![
                s.id.to_string(),
                opt_i64(s.task_id),
                s.case_seed.clone(),
                s.job_id.to_string(),
                opt_i64(s.sim_time),
                opt_i64(s.error_num),
                opt_i64(s.timing_num),
                if s.is_check { "yes" } else { "no" }.to_string(),
                match s.is_pass {
                    Some(true) => "pass",
                    Some(false) => "fail",
                    None => "-",
                }
                .to_string(),
            ]
        })
        .collect();
    render_table(&headers, &rows)
}

pub fn sim_to_json(item: &SimRecord) -> serde_json::Value {
    json!({
        "id": item.id,
        "regr_id": item.regr_id,
        "case_id": item.case_id,
        "task_id": item.task_id,
        "case_seed": item.case_seed.as_str(),
        "job_id": item.job_id,
        "sim_log": item.sim_log.as_deref(),
        "sim_time": item.sim_time,
        "error_num": item.error_num,
        "timing_num": item.timing_num,
        "is_check": item.is_check,
        "is_pass": item.is_pass,
        "created_by": item.created_by.as_str(),
        "created_at": item.created_at.as_str(),
    })
}

pub fn sims_json(sims: &[SimRecord]) -> anyhow::Result<String> {
    let data: Vec<serde_json::Value> = sims.iter().map(sim_to_json).collect();
    Ok(serde_json::to_string_pretty(&serde_json::Value::Array(data))?)
}

/// Human-readable rollup: one block per regression with totals, per-task
/// lines, and the failing sims underneath.
pub fn report_text(reports: &[RegrReport]) -> String {
    let mut output = String::new();
    for report in reports {
        let c = &report.counts;
        output.push_str(&format!(
            "regression {} ({}, module {}): {} sims\n",
            report.regr_id,
            report.regr_type,
            report.module_name,
            c.total()
        ));
        output.push_str(&format!(
            "  pending {}  landed {}  todo {}  pass {}  fail {}  unknown {}\n",
            c.pending, c.landed, c.todo, c.pass, c.fail, c.unknown
        ));
        for task in &report.tasks {
            let t = &task.counts;
            output.push_str(&format!(
                "  task {} on {}{}: pass {}  fail {}  unknown {}  todo {}\n",
                opt_i64(task.task_id),
                task.node,
                task.corner
                    .as_deref()
                    .map(|c| format!(" [{c}]"))
                    .unwrap_or_default(),
                t.pass,
                t.fail,
                t.unknown,
                t.todo
            ));
        }
        if !report.failing.is_empty() {
            output.push_str("  failing:\n");
            for sim in &report.failing {
                output.push_str(&format!(
                    "    {} seed {} {} ({})\n",
                    sim.case_name, sim.case_seed, sim.result, sim.sim_log
                ));
            }
        }
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_sim(id: i64, task_id: Option<i64>, is_pass: Option<bool>) -> SimRecord {
        SimRecord {
            id,
            regr_id: Some(1),
            case_id: 2,
            task_id,
            case_seed: "42".to_string(),
            job_id: 900 + id,
            sim_log: Some("/home/work/regr/smoke/smoke_42/smoke_42.log".to_string()),
            sim_time: Some(135),
            error_num: Some(0),
            timing_num: Some(0),
            is_check: is_pass.is_some(),
            is_pass,
            created_by: "tester".to_string(),
            created_at: "2026-03-01 10:00:00".to_string(),
        }
    }

    #[test]
    fn sim_table_includes_headers_and_rows() {
        let output = sim_table(&[sample_sim(1, Some(3), Some(true))]);
        assert!(output.contains("seed"));
        assert!(output.contains("42"));
        assert!(output.contains("pass"));
    }

    #[test]
    fn sim_table_marks_unchecked_rows() {
        let output = sim_table(&[sample_sim(1, None, None)]);
        assert!(output.contains("no"));
        assert!(!output.contains("fail"));
    }

    #[test]
    fn table_columns_align_to_widest_cell() {
        let rows = vec![
            vec!["1".to_string(), "short".to_string()],
            vec!["2".to_string(), "much_longer_cell".to_string()],
        ];
        let output = render_table(&["id", "name"], &rows);
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("id  name"));
        assert!(lines[1].starts_with("1   short"));
    }

    #[test]
    fn case_table_renders_capability_flags() {
        let case = CaseRecord {
            id: 1,
            module_id: 2,
            name: "case_smoke".to_string(),
            case_c_name: Some("uart smoke".to_string()),
            case_c_group: None,
            support_bt: true,
            support_st: true,
            support_regr: true,
            support_post: false,
            support_ams: false,
            created_by: "tester".to_string(),
            created_at: "2026-03-01 10:00:00".to_string(),
        };
        let output = case_table(&[case]);
        assert!(output.contains("case_smoke"));
        assert!(output.contains("uart smoke"));
        assert!(output.contains("y"));
    }

    #[test]
    fn sim_to_json_carries_verdict_fields() {
        let json = sim_to_json(&sample_sim(7, Some(3), Some(false)));
        assert_eq!(json["id"], 7);
        assert_eq!(json["is_check"], true);
        assert_eq!(json["is_pass"], false);
        assert_eq!(json["case_seed"], "42");
    }
}
