//! Query scopes over the year × month matrix.

use std::collections::BTreeSet;

/// Which cells of the year/month matrix a query covers.
///
/// The covered cells are the product of the requested years and months; an
/// unset dimension means every value present. `recognized_only` restricts
/// counts and lists to recognized architecture builds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scope {
    years: Option<BTreeSet<i32>>,
    months: Option<BTreeSet<u32>>,
    recognized_only: bool,
}

impl Scope {
    /// Every ingested month.
    pub fn all() -> Self {
        Self::default()
    }

    /// Add a year to the scope.
    pub fn year(mut self, year: i32) -> Self {
        self.years.get_or_insert_with(BTreeSet::new).insert(year);
        self
    }

    /// Add a month number (`1..=12`) to the scope. Applies to every year.
    pub fn month(mut self, month: u32) -> Self {
        self.months.get_or_insert_with(BTreeSet::new).insert(month);
        self
    }

    /// Build a scope from optional CLI-style filters.
    pub fn from_filters(year: Option<i32>, month: Option<u32>) -> Self {
        let mut scope = Self::all();
        if let Some(y) = year {
            scope = scope.year(y);
        }
        if let Some(m) = month {
            scope = scope.month(m);
        }
        scope
    }

    /// Only count and list recognized architecture builds.
    pub fn recognized_only(mut self) -> Self {
        self.recognized_only = true;
        self
    }

    pub fn is_recognized_only(&self) -> bool {
        self.recognized_only
    }

    /// Whether `year` is covered.
    pub fn covers_year(&self, year: i32) -> bool {
        self.years.as_ref().is_none_or(|ys| ys.contains(&year))
    }

    /// Whether month number `month` is covered.
    pub fn covers_month(&self, month: u32) -> bool {
        self.months.as_ref().is_none_or(|ms| ms.contains(&month))
    }
}
