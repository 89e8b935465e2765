//! Identity exclusion
//!
//! Matching is case-insensitive and exact. Records with no identity are
//! kept: only identities known to be excluded are removed.

use std::collections::BTreeSet;

use crate::types::UserStatisticRecord;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExclusionFilter {
    identities: BTreeSet<String>,
}

impl ExclusionFilter {
    pub fn new<I, S>(identities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            identities: identities
                .into_iter()
                .map(|identity| identity.as_ref().to_lowercase())
                .collect(),
        }
    }

    /// Excludes nobody.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    pub fn is_excluded(&self, identity: Option<&str>) -> bool {
        identity.is_some_and(|id| self.identities.contains(&id.to_lowercase()))
    }

    pub fn retains(&self, record: &UserStatisticRecord) -> bool {
        !self.is_excluded(record.identity.as_deref())
    }

    pub fn filter<'a>(
        &'a self,
        records: &'a [UserStatisticRecord],
    ) -> impl Iterator<Item = &'a UserStatisticRecord> + 'a {
        records.iter().filter(move |record| self.retains(record))
    }
}
