// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

//! Simulation log classification: functional error counting, timing
//! violation counting with per-corner tolerance, and compile-log probing.

use std::fs;
use std::path::Path;

use tracing::{debug, warn};

/// Substrings that mark a line as a functional error.
const ERROR_PATTERNS: [&str; 4] = ["UVM_ERROR", "UVM_FATAL", "[ERROR]", "[error]"];

const TIMING_PATTERN: &str = "Timing violation";

/// Marker printed at the tail of a compile log when elaboration finished.
const ELAB_DONE_MARKER: &str = "Verdi KDB elaboration done";

/// How many leading compile-log lines to scan for the simulator command.
const COMP_HEAD_LINES: usize = 50;

/// Load exception substrings, one per line, blank lines and `#` comments
/// ignored. A missing file means no exceptions.
pub fn load_exceptions(path: Option<&Path>) -> Vec<String> {
    let Some(path) = path else {
        return Vec::new();
    };
    match fs::read_to_string(path) {
        Ok(raw) => raw
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .map(str::to_string)
            .collect(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "exceptions file unreadable, using none");
            Vec::new()
        }
    }
}

fn read_log(path: &Path) -> Option<String> {
    match fs::read(path) {
        Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "log not readable");
            None
        }
    }
}

fn count_lines_matching(content: &str, pattern: &[&str], exceptions: &[String]) -> u64 {
    content
        .lines()
        .filter(|line| pattern.iter().any(|p| line.contains(p)))
        .filter(|line| !exceptions.iter().any(|e| line.contains(e.as_str())))
        .count() as u64
}

/// Count functional error lines in a sim log. `None` means the log could
/// not be read, which is distinct from a clean log.
pub fn count_function_errors(log: &Path, exceptions: &[String]) -> Option<u64> {
    let content = read_log(log)?;
    Some(count_lines_matching(&content, &ERROR_PATTERNS, exceptions))
}

/// Count raw timing violation lines in a sim log. The exception list is
/// for functional noise only; every timing line counts.
pub fn count_timing_violations(log: &Path) -> Option<u64> {
    let content = read_log(log)?;
    Some(count_lines_matching(&content, &[TIMING_PATTERN], &[]))
}

/// Timing count after applying the per-corner tolerance; never underflows.
pub fn effective_timing(raw: u64, tolerance: u64) -> u64 {
    raw.saturating_sub(tolerance)
}

/// Extract the timing corner from a compile log. The simulator command in
/// the first lines carries an `-sdf:<mode>:<scope>:<file>` option; the
/// corner is the last underscore component of the SDF file stem joined
/// with the mode, e.g. `.../chip_top_ff.sdf` with mode `max` -> `ff_max`.
pub fn find_corner(comp_log: &Path) -> Option<String> {
    let content = read_log(comp_log)?;
    for line in content.lines().take(COMP_HEAD_LINES) {
        for token in line.split_whitespace() {
            if !token.starts_with("-sdf") {
                continue;
            }
            let parts: Vec<&str> = token.split(':').collect();
            if parts.len() != 4 {
                continue;
            }
            let mode = parts[1];
            let stem = Path::new(parts[3]).file_stem()?.to_str()?;
            let speed = stem.rsplit('_').next()?;
            return Some(format!("{speed}_{mode}"));
        }
    }
    None
}

/// A compile succeeded when the elaboration marker sits in the log tail.
pub fn comp_result_ok(comp_log: &Path) -> bool {
    let Some(content) = read_log(comp_log) else {
        return false;
    };
    content
        .lines()
        .rev()
        .take(2)
        .any(|line| line.contains(ELAB_DONE_MARKER))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use tempfile::NamedTempFile;

    fn log_with(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    #[test]
    fn counts_each_error_pattern() {
        let f = log_with(
            "UVM_ERROR @ 100ns: bad parity\n\
             UVM_FATAL @ 200ns: dead\n\
             [ERROR] axi timeout\n\
             [error] lowercase hit\n\
             UVM_INFO nothing here\n",
        );
        assert_eq!(count_function_errors(f.path(), &[]), Some(4));
    }

    #[test]
    fn exception_substring_suppresses_line() {
        let f = log_with(
            "UVM_ERROR known flaky scoreboard\n\
             UVM_ERROR real failure\n",
        );
        let exceptions = vec!["known flaky".to_string()];
        assert_eq!(count_function_errors(f.path(), &exceptions), Some(1));
    }

    #[test]
    fn missing_log_is_none_not_zero() {
        let path = Path::new("/nonexistent/sim.log");
        assert_eq!(count_function_errors(path, &[]), None);
        assert_eq!(count_timing_violations(path), None);
    }

    #[test]
    fn counts_timing_violations() {
        let f = log_with(
            "Timing violation in tb.dut.reg_q\n\
             Timing violation in tb.dut.fifo\n\
             all good otherwise\n",
        );
        assert_eq!(count_timing_violations(f.path()), Some(2));
    }

    #[test]
    fn timing_lines_ignore_the_exception_list() {
        let f = log_with(
            "Timing violation in known flaky path\n\
             UVM_ERROR known flaky scoreboard\n",
        );
        let exceptions = vec!["known flaky".to_string()];
        assert_eq!(count_function_errors(f.path(), &exceptions), Some(0));
        assert_eq!(count_timing_violations(f.path()), Some(1));
    }

    #[test]
    fn tolerance_clamps_at_zero() {
        assert_eq!(effective_timing(5, 2), 3);
        assert_eq!(effective_timing(2, 5), 0);
        assert_eq!(effective_timing(0, 0), 0);
    }

    #[test]
    fn finds_corner_from_sdf_option() {
        let f = log_with(
            "xrun -64bit -licqueue \\\n\
             -sdf:max:tb.dut:/proj/lib/sdf/chip_top_ff.sdf \\\n\
             -input run.tcl\n",
        );
        assert_eq!(find_corner(f.path()).as_deref(), Some("ff_max"));
    }

    #[test]
    fn corner_absent_when_no_sdf_option() {
        let f = log_with("xrun -64bit -input run.tcl\n");
        assert_eq!(find_corner(f.path()), None);
    }

    #[test]
    fn malformed_sdf_token_is_skipped() {
        let f = log_with("-sdf:max:/only/three/parts.sdf\n");
        assert_eq!(find_corner(f.path()), None);
    }

    #[test]
    fn comp_result_checks_log_tail() {
        let good = log_with("compiling...\nVerdi KDB elaboration done\n");
        assert!(comp_result_ok(good.path()));

        let marker_too_early = log_with(
            "Verdi KDB elaboration done\nline\nline\nline\nfinal error\n",
        );
        assert!(!comp_result_ok(marker_too_early.path()));

        assert!(!comp_result_ok(Path::new("/nonexistent/comp.log")));
    }

    #[test]
    fn exceptions_file_parses_and_tolerates_absence() {
        let f = log_with("# comment\n\nknown flaky\ntb.dut.bad_path\n");
        let ex = load_exceptions(Some(f.path()));
        assert_eq!(ex, vec!["known flaky".to_string(), "tb.dut.bad_path".to_string()]);
        assert!(load_exceptions(None).is_empty());
        assert!(load_exceptions(Some(Path::new("/nonexistent"))).is_empty());
    }
}
