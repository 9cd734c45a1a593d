// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

//! Parsers for the files a regression submission leaves behind:
//! `status.log` (job id per case) and `log/reg_info.log` (seed per case).
//! Registration refuses to touch the database until both agree.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("malformed line {line} in {path}: {text:?}")]
    Malformed {
        path: String,
        line: usize,
        text: String,
    },
    #[error("job list has {jobs} entries but seed list has {seeds}")]
    CountMismatch { jobs: usize, seeds: usize },
    #[error("job list and seed list name different cases: {0:?}")]
    CaseSetMismatch(Vec<String>),
    #[error("cases not present in the submitted case list: {0:?}")]
    UnknownCases(Vec<String>),
    #[error("no test name / random seed on the first line of {0}")]
    NoSimIdentity(String),
}

/// One `job <id> <case>` line from status.log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobLine {
    pub job_id: i64,
    pub case_name: String,
}

/// One `<case> <seed>` line from reg_info.log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedLine {
    pub case_name: String,
    pub case_seed: String,
}

/// A job line paired with its seed line, ready to become a sim record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimSubmission {
    pub case_name: String,
    pub case_seed: String,
    pub job_id: i64,
}

fn read(path: &Path) -> Result<String, ArtifactError> {
    fs::read_to_string(path).map_err(|source| ArtifactError::Read {
        path: path.display().to_string(),
        source,
    })
}

/// Parse status.log: one `job <job_id> <case_name>` per line. Lines not
/// starting with the `job` keyword are submission chatter and skipped.
pub fn parse_status_log(path: &Path) -> Result<Vec<JobLine>, ArtifactError> {
    let raw = read(path)?;
    let mut out = Vec::new();
    for (lineno, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut fields = line.split_whitespace();
        if fields.next() != Some("job") {
            continue;
        }
        let (Some(id), Some(case)) = (fields.next(), fields.next()) else {
            return Err(ArtifactError::Malformed {
                path: path.display().to_string(),
                line: lineno + 1,
                text: line.to_string(),
            });
        };
        let job_id = id.parse::<i64>().map_err(|_| ArtifactError::Malformed {
            path: path.display().to_string(),
            line: lineno + 1,
            text: line.to_string(),
        })?;
        out.push(JobLine {
            job_id,
            case_name: case.to_string(),
        });
    }
    Ok(out)
}

/// Parse reg_info.log: one `<case_name> <seed>` per line.
pub fn parse_reg_info_log(path: &Path) -> Result<Vec<SeedLine>, ArtifactError> {
    let raw = read(path)?;
    let mut out = Vec::new();
    for (lineno, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut fields = line.split_whitespace();
        let (Some(case), Some(seed)) = (fields.next(), fields.next()) else {
            return Err(ArtifactError::Malformed {
                path: path.display().to_string(),
                line: lineno + 1,
                text: line.to_string(),
            });
        };
        out.push(SeedLine {
            case_name: case.to_string(),
            case_seed: seed.to_string(),
        });
    }
    Ok(out)
}

/// Extract the case name and random seed from a sim log. The simulator
/// echoes its command line on the first line, carrying the
/// `+UVM_TESTNAME=<case>` and `+ntb_random_seed=<seed>` plusargs.
pub fn parse_sim_header(path: &Path) -> Result<(String, String), ArtifactError> {
    let raw = read(path)?;
    let first = raw.lines().next().unwrap_or("");
    let mut case = None;
    let mut seed = None;
    for token in first.split_whitespace() {
        if let Some(v) = token.strip_prefix("+UVM_TESTNAME=") {
            case = Some(v.to_string());
        } else if let Some(v) = token.strip_prefix("+ntb_random_seed=") {
            seed = Some(v.to_string());
        }
    }
    match (case, seed) {
        (Some(case), Some(seed)) => Ok((case, seed)),
        _ => Err(ArtifactError::NoSimIdentity(path.display().to_string())),
    }
}

/// Split a comma-joined case list into trimmed, non-empty names.
pub fn parse_case_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect()
}

/// Pair job lines with seed lines. All validation happens up front: the
/// two lists must have the same cardinality, name the same case set, and
/// every case must appear in `case_list`. On any mismatch nothing is
/// produced, so callers never insert a partial batch.
pub fn merge_registration(
    jobs: &[JobLine],
    seeds: &[SeedLine],
    case_list: &[String],
) -> Result<Vec<SimSubmission>, ArtifactError> {
    if jobs.len() != seeds.len() {
        return Err(ArtifactError::CountMismatch {
            jobs: jobs.len(),
            seeds: seeds.len(),
        });
    }

    let job_cases: HashSet<&str> = jobs.iter().map(|j| j.case_name.as_str()).collect();
    let seed_cases: HashSet<&str> = seeds.iter().map(|s| s.case_name.as_str()).collect();
    if job_cases != seed_cases {
        let mut diff: Vec<String> = job_cases
            .symmetric_difference(&seed_cases)
            .map(|c| c.to_string())
            .collect();
        diff.sort();
        return Err(ArtifactError::CaseSetMismatch(diff));
    }

    let known: HashSet<&str> = case_list.iter().map(String::as_str).collect();
    let mut unknown: Vec<String> = job_cases
        .iter()
        .filter(|c| !known.contains(**c))
        .map(|c| c.to_string())
        .collect();
    if !unknown.is_empty() {
        unknown.sort();
        return Err(ArtifactError::UnknownCases(unknown));
    }

    // Seed lines are ordered like the job lines for the same case; pair
    // them per case in order of appearance.
    let mut merged = Vec::with_capacity(jobs.len());
    let mut seed_pool: Vec<Option<&SeedLine>> = seeds.iter().map(Some).collect();
    for job in jobs {
        let seed = seed_pool
            .iter_mut()
            .find(|slot| slot.map(|s| s.case_name == job.case_name).unwrap_or(false))
            .and_then(Option::take);
        let Some(seed) = seed else {
            // Cardinality and case sets already matched, so per-case
            // multiplicity is what differs.
            return Err(ArtifactError::CountMismatch {
                jobs: jobs.len(),
                seeds: seeds.len(),
            });
        };
        merged.push(SimSubmission {
            case_name: job.case_name.clone(),
            case_seed: seed.case_seed.clone(),
            job_id: job.job_id,
        });
    }
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use tempfile::NamedTempFile;

    fn file_with(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    fn jobs(pairs: &[(i64, &str)]) -> Vec<JobLine> {
        pairs
            .iter()
            .map(|(id, c)| JobLine {
                job_id: *id,
                case_name: c.to_string(),
            })
            .collect()
    }

    fn seeds(pairs: &[(&str, &str)]) -> Vec<SeedLine> {
        pairs
            .iter()
            .map(|(c, s)| SeedLine {
                case_name: c.to_string(),
                case_seed: s.to_string(),
            })
            .collect()
    }

    #[test]
    fn status_log_skips_chatter_lines() {
        let f = file_with("Submitted batch\njob 101 case_smoke\n\njob 102 case_dma\n");
        let lines = parse_status_log(f.path()).unwrap();
        assert_eq!(
            lines,
            jobs(&[(101, "case_smoke"), (102, "case_dma")])
        );
    }

    #[test]
    fn status_log_rejects_non_numeric_job_id() {
        let f = file_with("job abc case_smoke\n");
        let err = parse_status_log(f.path()).unwrap_err();
        assert!(matches!(err, ArtifactError::Malformed { line: 1, .. }));
    }

    #[test]
    fn reg_info_log_parses_case_seed_pairs() {
        let f = file_with("case_smoke 123\ncase_dma 456\n");
        let lines = parse_reg_info_log(f.path()).unwrap();
        assert_eq!(lines, seeds(&[("case_smoke", "123"), ("case_dma", "456")]));
    }

    #[test]
    fn reg_info_log_rejects_missing_seed() {
        let f = file_with("case_smoke\n");
        let err = parse_reg_info_log(f.path()).unwrap_err();
        assert!(matches!(err, ArtifactError::Malformed { .. }));
    }

    #[test]
    fn sim_header_yields_case_and_seed() {
        let f = file_with(
            "xrun -R +UVM_TESTNAME=case_dma_burst +ntb_random_seed=314159 -l sim.log\nUVM_INFO ...\n",
        );
        let (case, seed) = parse_sim_header(f.path()).unwrap();
        assert_eq!(case, "case_dma_burst");
        assert_eq!(seed, "314159");
    }

    #[test]
    fn sim_header_requires_both_plusargs() {
        let f = file_with("xrun -R +UVM_TESTNAME=case_dma_burst -l sim.log\n");
        let err = parse_sim_header(f.path()).unwrap_err();
        assert!(matches!(err, ArtifactError::NoSimIdentity(_)));
    }

    #[test]
    fn case_list_splits_and_trims() {
        assert_eq!(
            parse_case_list("case_a, case_b ,,case_c"),
            vec!["case_a", "case_b", "case_c"]
        );
        assert!(parse_case_list("").is_empty());
    }

    #[test]
    fn merge_pairs_jobs_with_seeds() {
        let merged = merge_registration(
            &jobs(&[(101, "case_a"), (102, "case_b")]),
            &seeds(&[("case_b", "9"), ("case_a", "7")]),
            &["case_a".into(), "case_b".into()],
        )
        .unwrap();
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].case_name, "case_a");
        assert_eq!(merged[0].case_seed, "7");
        assert_eq!(merged[0].job_id, 101);
        assert_eq!(merged[1].case_seed, "9");
    }

    #[test]
    fn merge_pairs_repeated_case_in_order() {
        let merged = merge_registration(
            &jobs(&[(1, "case_a"), (2, "case_a")]),
            &seeds(&[("case_a", "10"), ("case_a", "20")]),
            &["case_a".into()],
        )
        .unwrap();
        assert_eq!(merged[0].case_seed, "10");
        assert_eq!(merged[1].case_seed, "20");
    }

    #[test]
    fn merge_rejects_count_mismatch() {
        let err = merge_registration(
            &jobs(&[(1, "case_a")]),
            &seeds(&[("case_a", "1"), ("case_a", "2")]),
            &["case_a".into()],
        )
        .unwrap_err();
        assert!(matches!(err, ArtifactError::CountMismatch { jobs: 1, seeds: 2 }));
    }

    #[test]
    fn merge_rejects_case_set_mismatch() {
        let err = merge_registration(
            &jobs(&[(1, "case_a")]),
            &seeds(&[("case_b", "1")]),
            &["case_a".into(), "case_b".into()],
        )
        .unwrap_err();
        match err {
            ArtifactError::CaseSetMismatch(diff) => {
                assert_eq!(diff, vec!["case_a".to_string(), "case_b".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn merge_rejects_cases_outside_submitted_list() {
        let err = merge_registration(
            &jobs(&[(1, "case_rogue")]),
            &seeds(&[("case_rogue", "1")]),
            &["case_a".into()],
        )
        .unwrap_err();
        match err {
            ArtifactError::UnknownCases(cases) => assert_eq!(cases, vec!["case_rogue".to_string()]),
            other => panic!("unexpected error: {other}"),
        }
    }
}
