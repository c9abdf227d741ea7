//! Typed build results extracted from build-report subjects.

use std::collections::BTreeSet;

use crate::error::{Result, StatusError};

use super::month::MonthKey;

/// Outcome reported by a build subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum BuildResult {
    Pass,
    Fail,
}

impl BuildResult {
    /// Parse the subject token. Only `PASSED` and `FAILED` are accepted.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "PASSED" => Some(Self::Pass),
            "FAILED" => Some(Self::Fail),
            _ => None,
        }
    }
}

/// One build report.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct BuildRecord {
    result: BuildResult,
    host: String,
    buildset: String,
    os: String,
}

impl BuildRecord {
    /// Create a record. `host`, `buildset` and `os` must be non-empty.
    pub fn new(
        result: BuildResult,
        host: impl Into<String>,
        buildset: impl Into<String>,
        os: impl Into<String>,
    ) -> Result<Self> {
        let host = host.into();
        let buildset = buildset.into();
        let os = os.into();
        for (field, value) in [("host", &host), ("buildset", &buildset), ("os", &os)] {
            if value.trim().is_empty() {
                return Err(StatusError::grammar(
                    &format!("{host}: {buildset} on {os}"),
                    format!("empty {field}"),
                ));
            }
        }
        Ok(Self {
            result,
            host,
            buildset,
            os,
        })
    }

    pub fn result(&self) -> BuildResult {
        self.result
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Build configuration identifier, e.g. `123/rtems-testsuite-arm`.
    pub fn buildset(&self) -> &str {
        &self.buildset
    }

    pub fn os(&self) -> &str {
        &self.os
    }
}

/// All build results for one month, partitioned by outcome.
///
/// Built once per extraction pass and never mutated; re-ingesting a month
/// produces a new value.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct MonthResults {
    month: MonthKey,
    passes: Vec<BuildRecord>,
    fails: Vec<BuildRecord>,
}

impl MonthResults {
    /// Partition `records` by result, keeping their order.
    pub fn new(month: MonthKey, records: impl IntoIterator<Item = BuildRecord>) -> Self {
        let (passes, fails): (Vec<_>, Vec<_>) = records
            .into_iter()
            .partition(|r| r.result() == BuildResult::Pass);
        Self {
            month,
            passes,
            fails,
        }
    }

    pub fn month(&self) -> MonthKey {
        self.month
    }

    pub fn year(&self) -> i32 {
        self.month.year()
    }

    pub fn passes(&self) -> &[BuildRecord] {
        &self.passes
    }

    pub fn fails(&self) -> &[BuildRecord] {
        &self.fails
    }

    pub fn total(&self) -> usize {
        self.passes.len() + self.fails.len()
    }

    /// Sorted, distinct hosts with at least one failure.
    pub fn failed_hosts(&self) -> Vec<String> {
        sorted_unique(self.fails.iter().map(BuildRecord::host))
    }

    /// Sorted, distinct buildsets with at least one failure.
    pub fn failed_buildsets(&self) -> Vec<String> {
        sorted_unique(self.fails.iter().map(BuildRecord::buildset))
    }

    /// Buildsets that failed and never passed on any host this month.
    pub fn consistently_failing_buildsets(&self) -> Vec<String> {
        let passed: BTreeSet<&str> = self.passes.iter().map(BuildRecord::buildset).collect();
        self.failed_buildsets()
            .into_iter()
            .filter(|b| !passed.contains(b.as_str()))
            .collect()
    }
}

fn sorted_unique<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    values
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(result: BuildResult, host: &str, buildset: &str) -> BuildRecord {
        BuildRecord::new(result, host, buildset, "linux-gnu").unwrap()
    }

    #[test]
    fn test_result_token() {
        assert_eq!(BuildResult::from_token("PASSED"), Some(BuildResult::Pass));
        assert_eq!(BuildResult::from_token("FAILED"), Some(BuildResult::Fail));
        assert_eq!(BuildResult::from_token("passed"), None);
        assert_eq!(BuildResult::from_token("WARNED"), None);
    }

    #[test]
    fn test_record_rejects_empty_fields() {
        assert!(BuildRecord::new(BuildResult::Pass, "", "1/rtems-arm", "linux").is_err());
        assert!(BuildRecord::new(BuildResult::Pass, "h", " ", "linux").is_err());
        assert!(BuildRecord::new(BuildResult::Pass, "h", "1/rtems-arm", "").is_err());
    }

    #[test]
    fn test_partition_keeps_order() {
        let month = MonthKey::new(2023, 1).unwrap();
        let results = MonthResults::new(
            month,
            vec![
                rec(BuildResult::Fail, "b", "2/rtems-sparc"),
                rec(BuildResult::Pass, "a", "1/rtems-arm"),
                rec(BuildResult::Fail, "a", "3/rtems-mips"),
            ],
        );
        assert_eq!(results.passes().len(), 1);
        let fails: Vec<&str> = results.fails().iter().map(BuildRecord::buildset).collect();
        assert_eq!(fails, vec!["2/rtems-sparc", "3/rtems-mips"]);
        assert_eq!(results.total(), 3);
    }

    #[test]
    fn test_failure_summaries() {
        let month = MonthKey::new(2023, 1).unwrap();
        let results = MonthResults::new(
            month,
            vec![
                rec(BuildResult::Fail, "zeta", "2/rtems-sparc"),
                rec(BuildResult::Fail, "alpha", "2/rtems-sparc"),
                rec(BuildResult::Fail, "alpha", "1/rtems-arm"),
                rec(BuildResult::Pass, "zeta", "1/rtems-arm"),
            ],
        );
        assert_eq!(results.failed_hosts(), vec!["alpha", "zeta"]);
        assert_eq!(results.failed_buildsets(), vec!["1/rtems-arm", "2/rtems-sparc"]);
        assert_eq!(results.consistently_failing_buildsets(), vec!["2/rtems-sparc"]);
    }
}
