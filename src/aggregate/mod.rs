//! Year/month roll-up of build results.

pub mod arch;
pub mod scope;

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::error::{Result, StatusError};
use crate::model::build::{BuildRecord, MonthResults};
use crate::model::month::MonthKey;

pub use arch::{is_recognized, recognized_architecture, ARCHITECTURES};
pub use scope::Scope;

/// Twelve month slots of one year; `None` until the month is ingested.
pub type YearResults = [Option<MonthResults>; 12];

/// Owns every [`MonthResults`] of a reporting session, indexed by year and
/// month. Each month can be inserted only once.
#[derive(Debug, Default)]
pub struct ResultAggregator {
    years: BTreeMap<i32, YearResults>,
}

/// Counts and lists for a scope, as printed by reports.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Summary {
    pub months: Vec<MonthKey>,
    pub builds: usize,
    pub passes: usize,
    pub fails: usize,
    pub hosts: Vec<String>,
    pub buildsets: Vec<String>,
    pub architectures: Vec<String>,
    /// Months in scope with at least one failure.
    pub failures: Vec<MonthFailures>,
}

/// Where a month's failures happened. Covers every buildset of the month,
/// recognized or not.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct MonthFailures {
    pub month: MonthKey,
    pub hosts: Vec<String>,
    pub buildsets: Vec<String>,
    /// Failed on every host that built them this month.
    pub never_passed: Vec<String>,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a month's results. Fails with `DuplicateMonth` if the slot is
    /// already populated.
    pub fn insert(&mut self, results: MonthResults) -> Result<()> {
        let month = results.month();
        let slot = &mut self.years.entry(month.year()).or_default()[month.index()];
        if slot.is_some() {
            return Err(StatusError::DuplicateMonth(month));
        }
        debug!(month = %month, builds = results.total(), "Inserted month results");
        *slot = Some(results);
        Ok(())
    }

    /// Results for one month, or `UnknownMonth` if it was never inserted.
    pub fn get(&self, month: MonthKey) -> Result<&MonthResults> {
        self.years
            .get(&month.year())
            .and_then(|slots| slots[month.index()].as_ref())
            .ok_or_else(|| StatusError::UnknownMonth(month.label()))
    }

    /// The full slot array for a year, if any month of it was inserted.
    pub fn year(&self, year: i32) -> Option<&YearResults> {
        self.years.get(&year)
    }

    /// Years with at least one month inserted, ascending.
    pub fn years(&self) -> Vec<i32> {
        self.years.keys().copied().collect()
    }

    /// Every inserted month, ascending.
    pub fn months(&self) -> Vec<MonthKey> {
        self.cells(&Scope::all()).map(MonthResults::month).collect()
    }

    /// Populated cells covered by `scope`, in (year, month) order.
    fn cells<'a>(&'a self, scope: &'a Scope) -> impl Iterator<Item = &'a MonthResults> + 'a {
        self.years
            .iter()
            .filter(move |(year, _)| scope.covers_year(**year))
            .flat_map(|(_, slots)| slots.iter().flatten())
            .filter(move |results| scope.covers_month(results.month().month()))
    }

    /// Records of the covered cells selected by `pick`, honoring
    /// `recognized_only`.
    fn records<'a>(
        &'a self,
        scope: &'a Scope,
        pick: fn(&MonthResults) -> &[BuildRecord],
    ) -> impl Iterator<Item = &'a BuildRecord> + 'a {
        self.cells(scope)
            .flat_map(move |results| pick(results).iter())
            .filter(move |r| !scope.is_recognized_only() || is_recognized(r.buildset()))
    }

    pub fn count_passes(&self, scope: &Scope) -> usize {
        self.records(scope, MonthResults::passes).count()
    }

    pub fn count_fails(&self, scope: &Scope) -> usize {
        self.records(scope, MonthResults::fails).count()
    }

    /// Passes plus fails.
    pub fn count_builds(&self, scope: &Scope) -> usize {
        self.count_passes(scope) + self.count_fails(scope)
    }

    /// Sorted, distinct hosts that reported builds.
    pub fn list_hosts(&self, scope: &Scope) -> Vec<String> {
        sorted_unique(self.all_records(scope).map(BuildRecord::host))
    }

    /// Sorted, distinct buildsets.
    pub fn list_buildsets(&self, scope: &Scope) -> Vec<String> {
        sorted_unique(self.all_records(scope).map(BuildRecord::buildset))
    }

    /// Sorted, distinct architecture names of recognized buildsets.
    pub fn list_recognized_architectures(&self, scope: &Scope) -> Vec<String> {
        sorted_unique(
            self.all_records(scope)
                .filter_map(|r| recognized_architecture(r.buildset())),
        )
    }

    /// All counts and lists for `scope`.
    pub fn summary(&self, scope: &Scope) -> Summary {
        Summary {
            months: self.cells(scope).map(MonthResults::month).collect(),
            builds: self.count_builds(scope),
            passes: self.count_passes(scope),
            fails: self.count_fails(scope),
            hosts: self.list_hosts(scope),
            buildsets: self.list_buildsets(scope),
            architectures: self.list_recognized_architectures(scope),
            failures: self
                .cells(scope)
                .filter(|results| !results.fails().is_empty())
                .map(|results| MonthFailures {
                    month: results.month(),
                    hosts: results.failed_hosts(),
                    buildsets: results.failed_buildsets(),
                    never_passed: results.consistently_failing_buildsets(),
                })
                .collect(),
        }
    }

    fn all_records<'a>(&'a self, scope: &'a Scope) -> impl Iterator<Item = &'a BuildRecord> + 'a {
        self.records(scope, MonthResults::passes)
            .chain(self.records(scope, MonthResults::fails))
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
    use crate::model::build::BuildResult;

    fn month_results(year: i32, month: u32, passes: usize, fails: usize) -> MonthResults {
        let key = MonthKey::new(year, month).unwrap();
        let records = (0..passes)
            .map(|i| {
                BuildRecord::new(BuildResult::Pass, format!("h{i}"), "1/rtems-arm", "linux").unwrap()
            })
            .chain((0..fails).map(|i| {
                BuildRecord::new(BuildResult::Fail, format!("h{i}"), "2/rtems-sparc", "linux")
                    .unwrap()
            }));
        MonthResults::new(key, records.collect::<Vec<_>>())
    }

    #[test]
    fn test_duplicate_insert_fails() {
        let mut agg = ResultAggregator::new();
        agg.insert(month_results(2023, 11, 1, 0)).unwrap();
        let err = agg.insert(month_results(2023, 11, 2, 0)).unwrap_err();
        assert!(matches!(err, StatusError::DuplicateMonth(m) if m.label() == "2023-November"));
        assert_eq!(agg.count_builds(&Scope::all()), 1);
    }

    #[test]
    fn test_get_unknown_month() {
        let mut agg = ResultAggregator::new();
        agg.insert(month_results(2023, 1, 1, 0)).unwrap();
        assert!(agg.get(MonthKey::new(2023, 1).unwrap()).is_ok());
        assert!(matches!(
            agg.get(MonthKey::new(2023, 2).unwrap()),
            Err(StatusError::UnknownMonth(_))
        ));
        assert!(agg.get(MonthKey::new(2024, 1).unwrap()).is_err());
    }

    #[test]
    fn test_year_fail_count_matches_slots() {
        let mut agg = ResultAggregator::new();
        agg.insert(month_results(2023, 1, 2, 3)).unwrap();
        agg.insert(month_results(2023, 6, 0, 4)).unwrap();
        agg.insert(month_results(2023, 12, 5, 1)).unwrap();
        agg.insert(month_results(2022, 12, 5, 9)).unwrap();

        let expected: usize = agg
            .year(2023)
            .unwrap()
            .iter()
            .flatten()
            .map(|r| r.fails().len())
            .sum();
        assert_eq!(expected, 8);
        assert_eq!(agg.count_fails(&Scope::all().year(2023)), expected);
    }

    #[test]
    fn test_month_across_years() {
        let mut agg = ResultAggregator::new();
        agg.insert(month_results(2022, 12, 1, 1)).unwrap();
        agg.insert(month_results(2023, 12, 2, 0)).unwrap();
        agg.insert(month_results(2023, 11, 7, 7)).unwrap();
        assert_eq!(agg.count_builds(&Scope::all().month(12)), 4);
        assert_eq!(agg.count_passes(&Scope::all().year(2023).month(12)), 2);
        assert_eq!(agg.count_builds(&Scope::all().year(2021)), 0);
    }

    #[test]
    fn test_lists_are_sorted_and_unique() {
        let mut agg = ResultAggregator::new();
        agg.insert(month_results(2023, 2, 3, 2)).unwrap();
        agg.insert(month_results(2023, 1, 1, 1)).unwrap();
        let scope = Scope::all();
        assert_eq!(agg.list_hosts(&scope), vec!["h0", "h1", "h2"]);
        assert_eq!(agg.list_buildsets(&scope), vec!["1/rtems-arm", "2/rtems-sparc"]);
        assert_eq!(agg.list_recognized_architectures(&scope), vec!["arm", "sparc"]);
    }

    #[test]
    fn test_recognized_only_filter() {
        let key = MonthKey::new(2023, 3).unwrap();
        let records = vec![
            BuildRecord::new(BuildResult::Pass, "a", "1/rtems-arm", "linux").unwrap(),
            BuildRecord::new(BuildResult::Fail, "b", "45/rtems-build", "linux").unwrap(),
        ];
        let mut agg = ResultAggregator::new();
        agg.insert(MonthResults::new(key, records)).unwrap();
        let scope = Scope::all().recognized_only();
        assert_eq!(agg.count_builds(&Scope::all()), 2);
        assert_eq!(agg.count_builds(&scope), 1);
        assert_eq!(agg.list_hosts(&scope), vec!["a"]);
    }

    #[test]
    fn test_months_and_summary() {
        let mut agg = ResultAggregator::new();
        agg.insert(month_results(2023, 5, 1, 1)).unwrap();
        agg.insert(month_results(2022, 9, 1, 0)).unwrap();
        assert_eq!(agg.years(), vec![2022, 2023]);
        let labels: Vec<String> = agg.months().iter().map(MonthKey::label).collect();
        assert_eq!(labels, vec!["2022-September", "2023-May"]);
        let summary = agg.summary(&Scope::all());
        assert_eq!(summary.builds, 3);
        assert_eq!(summary.passes, 2);
        assert_eq!(summary.fails, 1);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].month, MonthKey::new(2023, 5).unwrap());
    }

    #[test]
    fn test_summary_failures() {
        let key = MonthKey::new(2023, 4).unwrap();
        let records = vec![
            BuildRecord::new(BuildResult::Pass, "a", "1/rtems-arm", "linux").unwrap(),
            BuildRecord::new(BuildResult::Fail, "b", "1/rtems-arm", "linux").unwrap(),
            BuildRecord::new(BuildResult::Fail, "b", "2/rtems-mips", "linux").unwrap(),
            BuildRecord::new(BuildResult::Fail, "c", "2/rtems-mips", "linux").unwrap(),
        ];
        let mut agg = ResultAggregator::new();
        agg.insert(MonthResults::new(key, records)).unwrap();
        agg.insert(month_results(2023, 5, 2, 0)).unwrap();

        let summary = agg.summary(&Scope::all());
        assert_eq!(
            summary.failures,
            vec![MonthFailures {
                month: key,
                hosts: vec!["b".to_string(), "c".to_string()],
                buildsets: vec!["1/rtems-arm".to_string(), "2/rtems-mips".to_string()],
                never_passed: vec!["2/rtems-mips".to_string()],
            }]
        );
        assert!(agg.summary(&Scope::all().month(5)).failures.is_empty());
    }
}
