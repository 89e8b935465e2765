//! Aggregate tables produced by the aggregator
//!
//! Only raw cells are stored. Every total is derived from them on demand, so
//! per-cell and total values can never drift apart.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Workflow steps that lead the column order when present.
pub const PREFERRED_STEPS: [&str; 3] = ["translate", "correct", "final review"];

/// Preferred steps first (only those present), then the rest lexically.
pub fn order_steps<'a>(steps: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let present: BTreeSet<&str> = steps.into_iter().collect();
    let mut ordered: Vec<String> = PREFERRED_STEPS
        .iter()
        .filter(|step| present.contains(*step))
        .map(|step| step.to_string())
        .collect();
    ordered.extend(
        present
            .into_iter()
            .filter(|step| !PREFERRED_STEPS.contains(step))
            .map(String::from),
    );
    ordered
}

/// Word counts keyed by (language display name, workflow step).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AggregateTable {
    cells: BTreeMap<String, BTreeMap<String, u64>>,
}

impl AggregateTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, language: &str, step: &str, words: u64) {
        let cell = self
            .cells
            .entry(language.to_string())
            .or_default()
            .entry(step.to_string())
            .or_insert(0);
        *cell = cell.saturating_add(words);
    }

    pub fn get(&self, language: &str, step: &str) -> u64 {
        self.cells
            .get(language)
            .and_then(|steps| steps.get(step))
            .copied()
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn languages(&self) -> impl Iterator<Item = &str> {
        self.cells.keys().map(String::as_str)
    }

    /// Column order for presentation (without the trailing Total)
    pub fn steps(&self) -> Vec<String> {
        order_steps(self.cells.values().flat_map(|s| s.keys().map(String::as_str)))
    }

    pub fn language_total(&self, language: &str) -> u64 {
        self.cells
            .get(language)
            .map(|steps| steps.values().fold(0u64, |acc, w| acc.saturating_add(*w)))
            .unwrap_or(0)
    }

    pub fn step_total(&self, step: &str) -> u64 {
        self.cells
            .values()
            .filter_map(|steps| steps.get(step))
            .fold(0u64, |acc, w| acc.saturating_add(*w))
    }

    pub fn grand_total(&self) -> u64 {
        self.languages()
            .map(|language| self.language_total(language))
            .fold(0u64, u64::saturating_add)
    }

    /// Rows by descending Total, ties broken by language ascending.
    pub fn rows(&self) -> Vec<TableRow> {
        let steps = self.steps();
        let mut rows: Vec<TableRow> = self
            .cells
            .keys()
            .map(|language| TableRow {
                label: language.clone(),
                cells: steps.iter().map(|step| self.get(language, step)).collect(),
                total: self.language_total(language),
            })
            .collect();
        rows.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.label.cmp(&b.label)));
        rows
    }

    /// Presentation view: ordered columns, sorted rows and the total row.
    pub fn view(&self) -> TableView {
        let columns = self.steps();
        let totals = TableRow {
            label: "Total".to_string(),
            cells: columns.iter().map(|step| self.step_total(step)).collect(),
            total: self.grand_total(),
        };
        TableView {
            rows: self.rows(),
            columns,
            totals,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TableRow {
    pub label: String,
    pub cells: Vec<u64>,
    pub total: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TableView {
    /// Step columns; a Total column follows implicitly in each row
    pub columns: Vec<String>,
    pub rows: Vec<TableRow>,
    pub totals: TableRow,
}

/// Word counts keyed by (identity, language) then step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserTable {
    cells: BTreeMap<(String, String), BTreeMap<String, u64>>,
}

impl UserTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, identity: &str, language: &str, step: &str, words: u64) {
        let cell = self
            .cells
            .entry((identity.to_string(), language.to_string()))
            .or_default()
            .entry(step.to_string())
            .or_insert(0);
        *cell = cell.saturating_add(words);
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn get(&self, identity: &str, language: &str, step: &str) -> u64 {
        self.cells
            .get(&(identity.to_string(), language.to_string()))
            .and_then(|steps| steps.get(step))
            .copied()
            .unwrap_or(0)
    }

    /// Rows by descending total, ties by identity then language.
    pub fn view(&self) -> UserTableView {
        let columns = order_steps(self.cells.values().flat_map(|s| s.keys().map(String::as_str)));
        let mut rows: Vec<UserRow> = self
            .cells
            .iter()
            .map(|((identity, language), steps)| UserRow {
                identity: identity.clone(),
                language: language.clone(),
                cells: columns
                    .iter()
                    .map(|step| steps.get(step).copied().unwrap_or(0))
                    .collect(),
                total: steps.values().fold(0u64, |acc, w| acc.saturating_add(*w)),
            })
            .collect();
        rows.sort_by(|a, b| {
            b.total
                .cmp(&a.total)
                .then_with(|| a.identity.cmp(&b.identity))
                .then_with(|| a.language.cmp(&b.language))
        });
        UserTableView { columns, rows }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserRow {
    pub identity: String,
    pub language: String,
    pub cells: Vec<u64>,
    pub total: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserTableView {
    pub columns: Vec<String>,
    pub rows: Vec<UserRow>,
}

/// Project counts by status for one window.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectStats {
    pub total: u64,
    pub completed: u64,
    pub in_progress: u64,
    pub pending: u64,
}

impl ProjectStats {
    pub fn record(&mut self, status: &str) {
        self.total += 1;
        match status {
            "FINISHED" => self.completed += 1,
            "IN_PROGRESS" | "STARTED" => self.in_progress += 1,
            _ => self.pending += 1,
        }
    }
}
