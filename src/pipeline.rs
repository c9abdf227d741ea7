//! Month-by-month driver: cache → parse → extract → aggregate.

use tracing::{info, warn};

use crate::aggregate::ResultAggregator;
use crate::cache::{ArchiveCache, ArchiveSource, Progress};
use crate::error::{Result, StatusError};
use crate::extract;
use crate::model::build::MonthResults;
use crate::model::month::MonthKey;
use crate::parser::MailArchive;

/// Everything produced for one month.
#[derive(Debug)]
pub struct MonthReport {
    pub archive: MailArchive,
    pub results: MonthResults,
    /// Build subjects that did not parse (only filled in lenient mode).
    pub skipped: Vec<StatusError>,
}

/// How malformed build subjects are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubjectPolicy {
    /// A malformed subject fails the whole month.
    #[default]
    Strict,
    /// Malformed subjects are skipped and reported.
    Lenient,
}

/// Fetch (if needed), parse and extract a single month.
pub fn process_month<S: ArchiveSource>(
    cache: &mut ArchiveCache<S>,
    month: MonthKey,
    policy: SubjectPolicy,
    progress: Option<Progress<'_>>,
) -> Result<MonthReport> {
    let path = cache.ensure_fresh_with_progress(month, progress)?;
    let archive = MailArchive::parse(&path)?;
    info!(month = %month, messages = archive.len(), "Archive parsed");

    let (results, skipped) = match policy {
        SubjectPolicy::Strict => (extract::extract(month, archive.build_messages())?, Vec::new()),
        SubjectPolicy::Lenient => extract::extract_lenient(month, archive.build_messages()),
    };

    Ok(MonthReport {
        archive,
        results,
        skipped,
    })
}

/// Process `months` in order and insert each into `aggregator`.
///
/// Per-month failures (download, integrity, format, subject grammar) are
/// collected and the run continues with the next month. Storage failures,
/// cancellation and duplicate inserts stop the run.
pub fn run<S: ArchiveSource>(
    cache: &mut ArchiveCache<S>,
    aggregator: &mut ResultAggregator,
    months: &[MonthKey],
    policy: SubjectPolicy,
    progress: Option<Progress<'_>>,
) -> Result<Vec<(MonthKey, StatusError)>> {
    let mut failures = Vec::new();
    for &month in months {
        match process_month(cache, month, policy, progress) {
            Ok(report) => aggregator.insert(report.results)?,
            Err(e) if e.is_per_month() => {
                warn!(month = %month, error = %e, "Skipping month");
                failures.push((month, e));
            }
            Err(e) => return Err(e),
        }
    }
    Ok(failures)
}
