//! Aggregator service for word-count statistics

use crate::services::exclusion::ExclusionFilter;
use crate::services::normalizer::LocaleTable;
use crate::types::{AggregateTable, Project, ProjectFetch, ProjectStats, UserTable};

/// Label for records whose source omitted the username
pub const UNKNOWN_IDENTITY: &str = "(unknown)";

/// Folds project outcomes into language × step tables.
///
/// Exclusion runs before normalization and before any cell is touched, so an
/// excluded identity never reaches a table even through a partial outcome.
#[derive(Debug, Clone, Default)]
pub struct Aggregator {
    locales: LocaleTable,
    exclusions: ExclusionFilter,
}

impl Aggregator {
    pub fn new(locales: LocaleTable, exclusions: ExclusionFilter) -> Self {
        Self {
            locales,
            exclusions,
        }
    }

    pub fn locales(&self) -> &LocaleTable {
        &self.locales
    }

    pub fn exclusions(&self) -> &ExclusionFilter {
        &self.exclusions
    }

    /// Aggregate with the exclusion set supplied at construction
    pub fn aggregate<'a, I>(&self, outcomes: I) -> AggregateTable
    where
        I: IntoIterator<Item = &'a ProjectFetch>,
    {
        self.aggregate_excluding(outcomes, &self.exclusions)
    }

    /// Aggregate with an explicit exclusion set for this call only
    pub fn aggregate_excluding<'a, I>(&self, outcomes: I, exclusions: &ExclusionFilter) -> AggregateTable
    where
        I: IntoIterator<Item = &'a ProjectFetch>,
    {
        let mut table = AggregateTable::new();
        for fetch in outcomes {
            for record in exclusions.filter(fetch.outcome.records()) {
                table.add(self.locales.normalize(&record.locale), &record.step, record.words);
            }
        }
        table
    }

    /// Per-user table under the construction-time exclusion set
    pub fn users<'a, I>(&self, outcomes: I) -> UserTable
    where
        I: IntoIterator<Item = &'a ProjectFetch>,
    {
        self.users_excluding(outcomes, &self.exclusions)
    }

    pub fn users_excluding<'a, I>(&self, outcomes: I, exclusions: &ExclusionFilter) -> UserTable
    where
        I: IntoIterator<Item = &'a ProjectFetch>,
    {
        let mut table = UserTable::new();
        for fetch in outcomes {
            for record in exclusions.filter(fetch.outcome.records()) {
                table.add(
                    record.identity.as_deref().unwrap_or(UNKNOWN_IDENTITY),
                    self.locales.normalize(&record.locale),
                    &record.step,
                    record.words,
                );
            }
        }
        table
    }

    /// Count projects by status
    pub fn project_stats<'a, I>(projects: I) -> ProjectStats
    where
        I: IntoIterator<Item = &'a Project>,
    {
        let mut stats = ProjectStats::default();
        for project in projects {
            stats.record(&project.status);
        }
        stats
    }
}
